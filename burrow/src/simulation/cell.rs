use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CellType {
    #[default]
    Air,
    Dirt,
    Food,
    Rock,
}

impl CellType {
    pub const ALL: [CellType; 4] = [CellType::Air, CellType::Dirt, CellType::Food, CellType::Rock];

    /// Decodes a persisted index, clamping unknown values to the last variant.
    pub fn from_index(index: u8) -> Self {
        Self::ALL[(index as usize).min(Self::ALL.len() - 1)]
    }

    pub fn index(self) -> u8 {
        self as u8
    }

    #[inline]
    pub fn is_walkable(self) -> bool {
        self == CellType::Air
    }
}

/// Dirt hardness tier. Harder tiers take longer to dig through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DirtType {
    SoftSoil,
    LooseDirt,
    #[default]
    PackedEarth,
    Clay,
    HardClay,
    Compacted,
}

impl DirtType {
    pub const ALL: [DirtType; 6] = [
        DirtType::SoftSoil,
        DirtType::LooseDirt,
        DirtType::PackedEarth,
        DirtType::Clay,
        DirtType::HardClay,
        DirtType::Compacted,
    ];

    pub fn from_index(index: u8) -> Self {
        Self::ALL[(index as usize).min(Self::ALL.len() - 1)]
    }

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn max_health(self) -> f32 {
        match self {
            DirtType::SoftSoil => 4.0,
            DirtType::LooseDirt => 6.0,
            DirtType::PackedEarth => 10.0,
            DirtType::Clay => 16.0,
            DirtType::HardClay => 24.0,
            DirtType::Compacted => 36.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Zone {
    #[default]
    None,
    General,
    Nursery,
    QueenChamber,
    FoodStorage,
    Barracks,
}

impl Zone {
    pub const ALL: [Zone; 6] = [
        Zone::None,
        Zone::General,
        Zone::Nursery,
        Zone::QueenChamber,
        Zone::FoodStorage,
        Zone::Barracks,
    ];

    pub fn from_index(index: u8) -> Self {
        Self::ALL[(index as usize).min(Self::ALL.len() - 1)]
    }

    pub fn index(self) -> u8 {
        self as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_round_trip_and_clamp() {
        for ty in CellType::ALL {
            assert_eq!(CellType::from_index(ty.index()), ty);
        }
        assert_eq!(CellType::from_index(200), CellType::Rock);
        assert_eq!(DirtType::from_index(99), DirtType::Compacted);
        assert_eq!(Zone::from_index(42), Zone::Barracks);
    }

    #[test]
    fn harder_tiers_have_more_health() {
        let healths: Vec<f32> = DirtType::ALL.iter().map(|d| d.max_health()).collect();
        assert!(healths.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(DirtType::PackedEarth.max_health(), 10.0);
    }
}
