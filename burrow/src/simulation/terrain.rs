use macroquad::math::Vec2;

use super::cell::{CellType, DirtType, Zone};
use super::navigation::NavCache;
use super::pheromone::PheromoneField;
use super::rooms::Room;
use super::{DEFAULT_FOOD_PER_CELL, MAX_COLONIES};

/// The cell grid and every scalar field laid over it.
///
/// All per-cell data lives in flat row-major arrays indexed by
/// `y * width + x`. Every query is bounds checked and returns a neutral value
/// when out of range. Structural mutations go through [`Terrain::set_cell`],
/// which bumps a generation counter that the lazily rebuilt caches (nest
/// distance fields, food-cell index) compare against.
#[derive(Debug, Clone)]
pub struct Terrain {
    pub width: u32,
    pub height: u32,
    pub(crate) cell_type: Vec<CellType>,
    pub(crate) dirt_type: Vec<DirtType>,
    pub(crate) dirt_health: Vec<f32>,
    pub(crate) food_amount: Vec<u8>,
    pub(crate) zone: Vec<Zone>,
    /// One bit per colony.
    pub(crate) explored: Vec<u8>,
    pub(crate) pheromones: PheromoneField,
    pub(crate) food_scent: Vec<f32>,
    pub(crate) rooms: Vec<Room>,
    pub(crate) next_room_id: u32,
    pub(crate) nests: [Option<(i32, i32)>; MAX_COLONIES],
    pub(crate) version: u64,
    pub(crate) nav: NavCache,
}

impl Terrain {
    /// An all-air grid.
    pub fn new(width: u32, height: u32) -> Self {
        Self::filled(width, height, CellType::Air, DirtType::default())
    }

    pub fn filled(width: u32, height: u32, ty: CellType, dirt: DirtType) -> Self {
        let size = width as usize * height as usize;
        let health = if ty == CellType::Dirt { dirt.max_health() } else { 0.0 };
        let food = if ty == CellType::Food { DEFAULT_FOOD_PER_CELL } else { 0 };
        Self {
            width,
            height,
            cell_type: vec![ty; size],
            dirt_type: vec![dirt; size],
            dirt_health: vec![health; size],
            food_amount: vec![food; size],
            zone: vec![Zone::None; size],
            explored: vec![0; size],
            pheromones: PheromoneField::new(width as usize, height as usize),
            food_scent: vec![0.0; size],
            rooms: Vec::new(),
            next_room_id: 0,
            nests: [None; MAX_COLONIES],
            version: 0,
            nav: NavCache::default(),
        }
    }

    #[inline(always)]
    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.width && (y as u32) < self.height
    }

    #[inline(always)]
    pub fn index(&self, x: i32, y: i32) -> Option<usize> {
        if self.in_bounds(x, y) {
            Some(y as usize * self.width as usize + x as usize)
        } else {
            None
        }
    }

    #[inline(always)]
    pub fn coords(&self, idx: usize) -> (i32, i32) {
        let w = self.width.max(1) as usize;
        ((idx % w) as i32, (idx / w) as i32)
    }

    pub fn size(&self) -> usize {
        self.cell_type.len()
    }

    /// Generation counter bumped on every structural change.
    pub fn version(&self) -> u64 {
        self.version
    }

    #[inline(always)]
    pub fn cell_of(pos: Vec2) -> (i32, i32) {
        (pos.x.floor() as i32, pos.y.floor() as i32)
    }

    #[inline(always)]
    pub fn cell_center(x: i32, y: i32) -> Vec2 {
        Vec2::new(x as f32 + 0.5, y as f32 + 0.5)
    }

    #[inline]
    pub fn cell_type_at(&self, x: i32, y: i32) -> Option<CellType> {
        self.index(x, y).map(|i| self.cell_type[i])
    }

    #[inline]
    pub fn dirt_type_at(&self, x: i32, y: i32) -> Option<DirtType> {
        self.index(x, y).map(|i| self.dirt_type[i])
    }

    #[inline]
    pub fn zone_at(&self, x: i32, y: i32) -> Zone {
        self.index(x, y).map(|i| self.zone[i]).unwrap_or_default()
    }

    #[inline]
    pub fn dirt_health_at(&self, x: i32, y: i32) -> f32 {
        self.index(x, y).map(|i| self.dirt_health[i]).unwrap_or(0.0)
    }

    #[inline]
    pub fn food_amount_at(&self, x: i32, y: i32) -> u8 {
        self.index(x, y).map(|i| self.food_amount[i]).unwrap_or(0)
    }

    #[inline]
    pub fn is_walkable(&self, x: i32, y: i32) -> bool {
        self.cell_type_at(x, y).is_some_and(CellType::is_walkable)
    }

    pub fn set_zone(&mut self, x: i32, y: i32, zone: Zone) -> bool {
        match self.index(x, y) {
            Some(idx) => {
                self.zone[idx] = zone;
                true
            }
            None => false,
        }
    }

    /// Changes the type of a cell. Setting the type a cell already has (and,
    /// for dirt, the same tier or no tier) leaves the terrain untouched.
    pub fn set_cell(&mut self, x: i32, y: i32, ty: CellType, dirt: Option<DirtType>) -> bool {
        let Some(idx) = self.index(x, y) else {
            return false;
        };
        let current = self.cell_type[idx];
        if current == ty && (ty != CellType::Dirt || dirt.is_none_or(|d| d == self.dirt_type[idx]))
        {
            return false;
        }

        self.cell_type[idx] = ty;
        if let Some(d) = dirt {
            self.dirt_type[idx] = d;
        }
        self.dirt_health[idx] = if ty == CellType::Dirt {
            self.dirt_type[idx].max_health()
        } else {
            0.0
        };
        self.food_amount[idx] = match ty {
            CellType::Food if self.food_amount[idx] > 0 => self.food_amount[idx],
            CellType::Food => DEFAULT_FOOD_PER_CELL,
            _ => 0,
        };
        if ty != CellType::Air {
            self.pheromones.clear_cell(idx);
            self.food_scent[idx] = 0.0;
        }
        self.version = self.version.wrapping_add(1);
        true
    }

    /// Subtracts health from a dirt cell. Returns true when the cell collapsed
    /// into air.
    pub fn damage_dirt(&mut self, x: i32, y: i32, amount: f32) -> bool {
        let Some(idx) = self.index(x, y) else {
            return false;
        };
        if self.cell_type[idx] != CellType::Dirt || !(amount > 0.0) {
            return false;
        }
        self.dirt_health[idx] -= amount;
        if self.dirt_health[idx] > 0.0 {
            return false;
        }
        self.set_cell(x, y, CellType::Air, None);
        if self.zone[idx] == Zone::None {
            self.zone[idx] = Zone::General;
        }
        true
    }

    /// Adds food to a cell, turning it into a food cell. Rock cannot hold food.
    pub fn place_food(&mut self, x: i32, y: i32, amount: u8) -> bool {
        let Some(idx) = self.index(x, y) else {
            return false;
        };
        if amount == 0 {
            return false;
        }
        match self.cell_type[idx] {
            CellType::Rock => false,
            CellType::Food => {
                self.food_amount[idx] = self.food_amount[idx].saturating_add(amount);
                true
            }
            _ => {
                self.set_cell(x, y, CellType::Food, None);
                self.food_amount[idx] = amount;
                true
            }
        }
    }

    /// Removes one unit of food. An emptied cell becomes air.
    pub fn take_food(&mut self, x: i32, y: i32) -> bool {
        let Some(idx) = self.index(x, y) else {
            return false;
        };
        if self.cell_type[idx] != CellType::Food {
            return false;
        }
        self.food_amount[idx] = self.food_amount[idx].saturating_sub(1);
        if self.food_amount[idx] == 0 {
            self.set_cell(x, y, CellType::Air, None);
        }
        true
    }

    /// Scatters food over the open and dirt cells of a disc. Returns the number
    /// of cells that received food.
    pub fn spawn_food_cluster(&mut self, center: (i32, i32), radius: i32, amount: u8) -> u32 {
        let mut placed = 0;
        let r_sq = radius * radius;
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy > r_sq {
                    continue;
                }
                let (x, y) = (center.0 + dx, center.1 + dy);
                if matches!(self.cell_type_at(x, y), Some(CellType::Air | CellType::Dirt))
                    && self.place_food(x, y, amount)
                {
                    placed += 1;
                }
            }
        }
        placed
    }

    /// Total food units in the square of `radius` around `center`.
    pub fn food_amount_near(&self, center: (i32, i32), radius: i32) -> u32 {
        let mut total = 0u32;
        for y in (center.1 - radius).max(0)..=(center.1 + radius).min(self.height as i32 - 1) {
            for x in (center.0 - radius).max(0)..=(center.0 + radius).min(self.width as i32 - 1) {
                let idx = y as usize * self.width as usize + x as usize;
                if self.cell_type[idx] == CellType::Food {
                    total += self.food_amount[idx] as u32;
                }
            }
        }
        total
    }

    // Pheromones

    pub fn deposit_food_pheromone(&mut self, x: i32, y: i32, amount: f32, colony: u8) -> bool {
        match self.index(x, y) {
            Some(idx) if self.cell_type[idx] == CellType::Air => {
                self.pheromones.deposit_food(idx, amount, colony as usize)
            }
            _ => false,
        }
    }

    pub fn deposit_home_pheromone(&mut self, x: i32, y: i32, amount: f32, colony: u8) -> bool {
        match self.index(x, y) {
            Some(idx) if self.cell_type[idx] == CellType::Air => {
                self.pheromones.deposit_home(idx, amount, colony as usize)
            }
            _ => false,
        }
    }

    pub fn deposit_blocked(&mut self, x: i32, y: i32, amount: f32) -> bool {
        match self.index(x, y) {
            Some(idx) if self.cell_type[idx] == CellType::Air => {
                self.pheromones.deposit_blocked(idx, amount)
            }
            _ => false,
        }
    }

    #[inline]
    pub fn food_pheromone_at(&self, x: i32, y: i32, colony: u8) -> f32 {
        self.index(x, y)
            .map(|i| self.pheromones.food(i, colony as usize))
            .unwrap_or(0.0)
    }

    #[inline]
    pub fn home_pheromone_at(&self, x: i32, y: i32, colony: u8) -> f32 {
        self.index(x, y)
            .map(|i| self.pheromones.home(i, colony as usize))
            .unwrap_or(0.0)
    }

    #[inline]
    pub fn blocked_at(&self, x: i32, y: i32) -> f32 {
        self.index(x, y).map(|i| self.pheromones.blocked(i)).unwrap_or(0.0)
    }

    #[inline]
    pub fn food_scent_at(&self, x: i32, y: i32) -> f32 {
        self.index(x, y).map(|i| self.food_scent[i]).unwrap_or(0.0)
    }

    /// Decays every live pheromone cell, then pins each nest to a full home trail.
    pub fn decay(&mut self, factor: f32, threshold: f32) {
        self.pheromones.decay(factor, threshold);
        self.reseed_nests();
    }

    fn reseed_nests(&mut self) {
        for colony in 0..MAX_COLONIES {
            if let Some((x, y)) = self.nests[colony] {
                if let Some(idx) = self.index(x, y) {
                    self.pheromones.set_home(idx, 1.0, colony);
                }
            }
        }
    }

    pub fn pheromone_active_len(&self) -> usize {
        self.pheromones.active_len()
    }

    // Nests

    pub fn set_nest(&mut self, colony: u8, x: i32, y: i32) -> bool {
        let c = colony as usize;
        if c >= MAX_COLONIES || !self.in_bounds(x, y) {
            return false;
        }
        self.nests[c] = Some((x, y));
        self.nav.invalidate_nest(c);
        self.reseed_nests();
        true
    }

    pub fn nest(&self, colony: u8) -> Option<(i32, i32)> {
        self.nests.get(colony as usize).copied().flatten()
    }

    pub fn clear_nest(&mut self, colony: u8) {
        let c = colony as usize;
        if c < MAX_COLONIES {
            self.nests[c] = None;
            self.nav.invalidate_nest(c);
            self.pheromones.clear_colony(c);
        }
    }

    // Fog of war

    /// Marks every cell within `radius` of (x, y) as explored by `colony`.
    pub fn reveal(&mut self, x: i32, y: i32, radius: i32, colony: u8) {
        if colony as usize >= MAX_COLONIES {
            return;
        }
        let bit = 1u8 << colony;
        let r_sq = radius * radius;
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy > r_sq {
                    continue;
                }
                if let Some(idx) = self.index(x + dx, y + dy) {
                    self.explored[idx] |= bit;
                }
            }
        }
    }

    pub fn is_explored(&self, x: i32, y: i32, colony: u8) -> bool {
        if colony as usize >= MAX_COLONIES {
            return false;
        }
        self.index(x, y)
            .is_some_and(|i| self.explored[i] & (1u8 << colony) != 0)
    }

    pub fn explored_count(&self, colony: u8) -> usize {
        if colony as usize >= MAX_COLONIES {
            return 0;
        }
        let bit = 1u8 << colony;
        self.explored.iter().filter(|&&b| b & bit != 0).count()
    }

    /// Number of dirt cells whose health disagrees with their type. Always 0
    /// for a consistent terrain.
    pub fn inconsistent_cells(&self) -> usize {
        self.cell_type
            .iter()
            .zip(&self.dirt_health)
            .filter(|&(&ty, &hp)| (hp > 0.0) != (ty == CellType::Dirt))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_bounds_queries_are_neutral() {
        let mut terrain = Terrain::new(4, 4);
        assert_eq!(terrain.cell_type_at(-1, 0), None);
        assert_eq!(terrain.cell_type_at(4, 0), None);
        assert_eq!(terrain.zone_at(9, 9), Zone::None);
        assert_eq!(terrain.food_amount_at(0, 99), 0);
        assert!(!terrain.set_cell(4, 4, CellType::Rock, None));
        assert!(!terrain.damage_dirt(-3, 1, 5.0));
        assert!(!terrain.deposit_food_pheromone(10, 10, 0.5, 0));
    }

    #[test]
    fn damage_collapses_dirt() {
        let mut terrain = Terrain::filled(10, 10, CellType::Dirt, DirtType::PackedEarth);
        assert_eq!(terrain.dirt_health_at(3, 3), 10.0);
        assert!(!terrain.damage_dirt(3, 3, 4.0));
        assert_eq!(terrain.dirt_health_at(3, 3), 6.0);
        assert!(terrain.damage_dirt(3, 3, 15.0));
        assert_eq!(terrain.cell_type_at(3, 3), Some(CellType::Air));
        assert_eq!(terrain.dirt_health_at(3, 3), 0.0);
        assert_eq!(terrain.zone_at(3, 3), Zone::General);
        assert!(!terrain.damage_dirt(3, 3, 15.0));
        assert_eq!(terrain.inconsistent_cells(), 0);
    }

    #[test]
    fn set_cell_is_idempotent() {
        let mut terrain = Terrain::new(5, 5);
        assert!(terrain.set_cell(1, 1, CellType::Dirt, Some(DirtType::Clay)));
        let version = terrain.version();
        assert!(!terrain.set_cell(1, 1, CellType::Dirt, Some(DirtType::Clay)));
        assert!(!terrain.set_cell(1, 1, CellType::Dirt, None));
        assert_eq!(terrain.version(), version);
        assert_eq!(terrain.dirt_health_at(1, 1), 16.0);
        assert!(terrain.set_cell(1, 1, CellType::Dirt, Some(DirtType::SoftSoil)));
        assert_eq!(terrain.dirt_health_at(1, 1), 4.0);
        assert!(terrain.version() > version);
    }

    #[test]
    fn non_air_cells_lose_pheromone() {
        let mut terrain = Terrain::new(5, 5);
        assert!(terrain.deposit_food_pheromone(2, 2, 0.5, 1));
        assert!(terrain.deposit_blocked(2, 2, 0.3));
        terrain.set_cell(2, 2, CellType::Rock, None);
        assert_eq!(terrain.food_pheromone_at(2, 2, 1), 0.0);
        assert_eq!(terrain.blocked_at(2, 2), 0.0);
        assert!(!terrain.deposit_home_pheromone(2, 2, 0.5, 0));
    }

    #[test]
    fn food_is_taken_until_empty() {
        let mut terrain = Terrain::new(5, 5);
        assert!(!terrain.place_food(0, 0, 0));
        assert!(terrain.place_food(1, 1, 2));
        assert_eq!(terrain.food_amount_at(1, 1), 2);
        assert!(terrain.take_food(1, 1));
        assert_eq!(terrain.food_amount_at(1, 1), 1);
        assert!(terrain.take_food(1, 1));
        assert_eq!(terrain.cell_type_at(1, 1), Some(CellType::Air));
        assert!(!terrain.take_food(1, 1));

        terrain.set_cell(3, 3, CellType::Rock, None);
        assert!(!terrain.place_food(3, 3, 5));
        assert!(terrain.place_food(2, 2, 250));
        assert!(terrain.place_food(2, 2, 250));
        assert_eq!(terrain.food_amount_at(2, 2), 255);
    }

    #[test]
    fn decay_reseeds_nest() {
        let mut terrain = Terrain::new(8, 8);
        terrain.set_nest(0, 4, 4);
        terrain.deposit_food_pheromone(1, 1, 0.5, 0);
        terrain.decay(0.9, 0.05);
        assert!((terrain.food_pheromone_at(1, 1, 0) - 0.45).abs() < 1e-6);
        for _ in 0..100 {
            terrain.decay(0.5, 0.05);
        }
        assert_eq!(terrain.food_pheromone_at(1, 1, 0), 0.0);
        assert_eq!(terrain.home_pheromone_at(4, 4, 0), 1.0);
    }

    #[test]
    fn reveal_marks_only_the_colony_bit() {
        let mut terrain = Terrain::new(10, 10);
        terrain.reveal(5, 5, 2, 1);
        assert!(terrain.is_explored(5, 7, 1));
        assert!(!terrain.is_explored(5, 8, 1));
        assert!(!terrain.is_explored(5, 5, 0));
        assert_eq!(terrain.explored_count(1), 13);
    }
}
