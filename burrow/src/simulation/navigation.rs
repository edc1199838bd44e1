//! Lazily rebuilt terrain caches: food-scent diffusion, the food-cell index and
//! per-colony breadth-first distance fields to each nest.

use macroquad::math::Vec2;
use std::collections::VecDeque;

use super::cell::CellType;
use super::terrain::Terrain;
use super::{MAX_COLONIES, SCENT_FALLOFF, SCENT_MAX_HOPS, SCENT_MIN};

const UNREACHABLE: u32 = u32::MAX;

#[derive(Debug, Clone)]
struct NestField {
    version: u64,
    origin: (i32, i32),
    dist: Vec<u32>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct NavCache {
    nest_fields: [Option<NestField>; MAX_COLONIES],
    food_cells: Vec<usize>,
    food_version: Option<u64>,
}

impl NavCache {
    pub(crate) fn invalidate_nest(&mut self, colony: usize) {
        if let Some(slot) = self.nest_fields.get_mut(colony) {
            *slot = None;
        }
    }

    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }
}

const NEIGHBORS_4: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];
const NEIGHBORS_8: [(i32, i32); 8] = [
    (1, 0),
    (-1, 0),
    (0, 1),
    (0, -1),
    (1, 1),
    (1, -1),
    (-1, 1),
    (-1, -1),
];

impl Terrain {
    /// Indices of every food cell, rebuilt when the terrain generation changed.
    pub fn food_cells(&mut self) -> &[usize] {
        if self.nav.food_version != Some(self.version) {
            self.nav.food_cells.clear();
            for (idx, &ty) in self.cell_type.iter().enumerate() {
                if ty == CellType::Food {
                    self.nav.food_cells.push(idx);
                }
            }
            self.nav.food_version = Some(self.version);
        }
        &self.nav.food_cells
    }

    pub fn food_cell_count(&mut self) -> usize {
        self.food_cells().len()
    }

    /// The food cell closest to `from`, if one lies within `max_dist`.
    pub fn nearest_food(&mut self, from: (i32, i32), max_dist: f32) -> Option<(i32, i32)> {
        let width = self.width.max(1) as usize;
        let max_sq = max_dist * max_dist;
        self.food_cells()
            .iter()
            .map(|&idx| ((idx % width) as i32, (idx / width) as i32))
            .map(|(x, y)| {
                let dx = (x - from.0) as f32;
                let dy = (y - from.1) as f32;
                ((x, y), dx * dx + dy * dy)
            })
            .filter(|&(_, d)| d <= max_sq)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(pos, _)| pos)
    }

    /// Floods food scent outward from every food cell through open cells,
    /// weakening per hop. Food cells themselves carry no scent.
    pub fn diffuse_food_scent(&mut self) {
        self.food_scent.fill(0.0);
        let sources: Vec<usize> = self.food_cells().to_vec();
        let mut hops = vec![UNREACHABLE; self.size()];
        let mut queue = VecDeque::new();

        for idx in sources {
            let (x, y) = self.coords(idx);
            for (dx, dy) in NEIGHBORS_4 {
                if let Some(n) = self.index(x + dx, y + dy) {
                    if self.cell_type[n] == CellType::Air && hops[n] == UNREACHABLE {
                        hops[n] = 1;
                        self.food_scent[n] = SCENT_FALLOFF;
                        queue.push_back(n);
                    }
                }
            }
        }

        while let Some(idx) = queue.pop_front() {
            let h = hops[idx];
            let next = self.food_scent[idx] * SCENT_FALLOFF;
            if h >= SCENT_MAX_HOPS || next < SCENT_MIN {
                continue;
            }
            let (x, y) = self.coords(idx);
            for (dx, dy) in NEIGHBORS_4 {
                if let Some(n) = self.index(x + dx, y + dy) {
                    if self.cell_type[n] == CellType::Air && hops[n] == UNREACHABLE {
                        hops[n] = h + 1;
                        self.food_scent[n] = next;
                        queue.push_back(n);
                    }
                }
            }
        }
    }

    fn ensure_nest_field(&mut self, colony: usize) -> Option<&NestField> {
        let origin = (*self.nests.get(colony)?)?;
        let stale = match &self.nav.nest_fields[colony] {
            Some(field) => field.version != self.version || field.origin != origin,
            None => true,
        };
        if stale {
            let field = self.build_nest_field(origin);
            self.nav.nest_fields[colony] = Some(field);
        }
        self.nav.nest_fields[colony].as_ref()
    }

    fn build_nest_field(&self, origin: (i32, i32)) -> NestField {
        let mut dist = vec![UNREACHABLE; self.size()];
        let mut queue = VecDeque::new();
        if let Some(start) = self.index(origin.0, origin.1) {
            dist[start] = 0;
            queue.push_back(start);
        }
        while let Some(idx) = queue.pop_front() {
            let d = dist[idx];
            let (x, y) = self.coords(idx);
            for (dx, dy) in NEIGHBORS_4 {
                if let Some(n) = self.index(x + dx, y + dy) {
                    if self.cell_type[n].is_walkable() && dist[n] == UNREACHABLE {
                        dist[n] = d + 1;
                        queue.push_back(n);
                    }
                }
            }
        }
        NestField {
            version: self.version,
            origin,
            dist,
        }
    }

    /// Breadth-first distance in cells from (x, y) to the colony's nest.
    pub fn nest_distance(&mut self, x: i32, y: i32, colony: u8) -> Option<u32> {
        let idx = self.index(x, y)?;
        let field = self.ensure_nest_field(colony as usize)?;
        match field.dist[idx] {
            UNREACHABLE => None,
            d => Some(d),
        }
    }

    /// Unit direction toward the neighbouring cell that is closest to the nest.
    /// Diagonal steps are only taken when both adjacent orthogonal cells are
    /// open. Returns `None` at the nest or when no path exists.
    pub fn direction_to_nest(&mut self, pos: Vec2, colony: u8) -> Option<Vec2> {
        let (x, y) = Terrain::cell_of(pos);
        let idx = self.index(x, y)?;
        self.ensure_nest_field(colony as usize)?;
        let field = self.nav.nest_fields[colony as usize].as_ref()?;
        let here = field.dist[idx];
        if here == 0 || here == UNREACHABLE {
            return None;
        }

        let mut best: Option<((i32, i32), u32)> = None;
        for (dx, dy) in NEIGHBORS_8 {
            let (nx, ny) = (x + dx, y + dy);
            let Some(n) = self.index(nx, ny) else {
                continue;
            };
            if dx != 0 && dy != 0 && !(self.is_walkable(x + dx, y) && self.is_walkable(x, y + dy)) {
                continue;
            }
            let d = field.dist[n];
            if d < here && best.is_none_or(|(_, b)| d < b) {
                best = Some(((nx, ny), d));
            }
        }
        let ((nx, ny), _) = best?;
        let dir = Terrain::cell_center(nx, ny) - pos;
        (dir.length_squared() > 1e-6).then(|| dir.normalize())
    }
}
