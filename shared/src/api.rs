use serde::{Deserialize, Serialize};

pub const MAX_COLONIES: usize = 4;
pub const CASTE_TARGET_COUNT: usize = 4;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Season {
    #[default]
    Spring,
    Summer,
    Autumn,
    Winter,
}

impl Season {
    pub fn from_index(index: u32) -> Self {
        match index % 4 {
            0 => Season::Spring,
            1 => Season::Summer,
            2 => Season::Autumn,
            _ => Season::Winter,
        }
    }

    pub fn index(self) -> u32 {
        self as u32
    }

    /// Whether food blooms can happen during this season.
    pub fn is_growing(self) -> bool {
        matches!(self, Season::Spring | Season::Summer)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NatureEventKind {
    /// Heavy rain washes most pheromone trails away.
    Rainstorm,
    /// A fresh cluster of food appears somewhere on the map.
    FoodBloom,
}

/// How an ant died.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeathKind {
    Combat,
    Starvation,
    OldAge,
}

impl DeathKind {
    pub const COUNT: usize = 3;

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Room function as seen from outside the simulation core.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomKind {
    Home,
    Nursery,
    FoodStorage,
    Barracks,
}

/// Discrete, fire-and-forget notifications emitted by the simulation.
/// Emission order is the order in which things happened during a tick.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum SimEvent {
    AntBorn { colony_id: u8, ant_id: u64, caste: String },
    AntDied { colony_id: u8, ant_id: u64, caste: String, cause: DeathKind },
    FoodCollected { colony_id: u8, amount: u32 },
    DayAdvanced { day: u32 },
    SeasonChanged { season: Season },
    NatureEvent { kind: NatureEventKind, x: u32, y: u32 },
    QueenSucceeded { colony_id: u8, new_queen_id: u64 },
    ColonyConquered { winner: u8, loser: u8, ants_converted: u32 },
    RoomBuilt { colony_id: u8, room_id: u32, kind: RoomKind },
}

/// Advisory instructions coming from the hive-mind service.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum HiveDirective {
    /// Schedule a new room of the given kind next to the colony's home.
    BuildRoom { colony_id: u8, kind: RoomKind },
    /// Dig out an explicit list of cells.
    DigBlueprint { colony_id: u8, cells: Vec<(u32, u32)> },
    /// Thicken the walls around the nest in the given direction (radians).
    Reinforce { colony_id: u8, direction: f32 },
    /// Replace the worker/soldier/nurse/builder target ratios.
    SetCasteTargets { colony_id: u8, ratios: [f32; CASTE_TARGET_COUNT] },
}

impl HiveDirective {
    pub fn colony_id(&self) -> u8 {
        match self {
            HiveDirective::BuildRoom { colony_id, .. }
            | HiveDirective::DigBlueprint { colony_id, .. }
            | HiveDirective::Reinforce { colony_id, .. }
            | HiveDirective::SetCasteTargets { colony_id, .. } => *colony_id,
        }
    }
}
