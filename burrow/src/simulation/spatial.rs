use macroquad::math::Vec2;

use super::ant::AntKey;

/// Uniform bucket grid over the map, reused between passes.
#[derive(Debug, Clone)]
pub struct SpatialHash {
    inv_cell_size: f32,
    pub cols: usize,
    pub rows: usize,
    cells: Vec<Vec<(AntKey, Vec2)>>,
}

impl SpatialHash {
    pub fn new(world_w: f32, world_h: f32, cell_size: f32) -> Self {
        let cell_size = cell_size.max(0.1);
        let cols = ((world_w / cell_size).ceil() as usize).max(1);
        let rows = ((world_h / cell_size).ceil() as usize).max(1);
        let cells = (0..cols * rows).map(|_| Vec::with_capacity(4)).collect();
        Self {
            inv_cell_size: 1.0 / cell_size,
            cols,
            rows,
            cells,
        }
    }

    #[inline]
    fn bucket(&self, pos: Vec2) -> (usize, usize) {
        let cx = ((pos.x * self.inv_cell_size).max(0.0) as usize).min(self.cols - 1);
        let cy = ((pos.y * self.inv_cell_size).max(0.0) as usize).min(self.rows - 1);
        (cx, cy)
    }

    /// Clears every bucket and inserts the given ants.
    pub fn rebuild<I>(&mut self, ants: I)
    where
        I: IntoIterator<Item = (AntKey, Vec2)>,
    {
        for cell in &mut self.cells {
            cell.clear();
        }
        for (key, pos) in ants {
            if !pos.is_finite() {
                continue;
            }
            let (cx, cy) = self.bucket(pos);
            self.cells[cy * self.cols + cx].push((key, pos));
        }
    }

    /// Appends to `out` every ant within `radius` of `pos`, in bucket order.
    pub fn query_radius(&self, pos: Vec2, radius: f32, out: &mut Vec<AntKey>) {
        let radius_sq = radius * radius;
        let range = (radius * self.inv_cell_size).ceil() as i32 + 1;
        let (cx, cy) = self.bucket(pos);
        let (cx, cy) = (cx as i32, cy as i32);

        for gy in (cy - range).max(0)..=(cy + range).min(self.rows as i32 - 1) {
            for gx in (cx - range).max(0)..=(cx + range).min(self.cols as i32 - 1) {
                for &(key, other) in &self.cells[gy as usize * self.cols + gx as usize] {
                    if other.distance_squared(pos) <= radius_sq {
                        out.push(key);
                    }
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.cells.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(Vec::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[test]
    fn query_finds_only_ants_in_radius() {
        let mut keys: SlotMap<AntKey, ()> = SlotMap::with_key();
        let a = keys.insert(());
        let b = keys.insert(());
        let c = keys.insert(());

        let mut hash = SpatialHash::new(20.0, 20.0, 2.0);
        hash.rebuild([
            (a, Vec2::new(5.0, 5.0)),
            (b, Vec2::new(5.8, 5.0)),
            (c, Vec2::new(15.0, 15.0)),
        ]);
        assert_eq!(hash.len(), 3);

        let mut found = Vec::new();
        hash.query_radius(Vec2::new(5.0, 5.0), 1.0, &mut found);
        assert_eq!(found.len(), 2);
        assert!(found.contains(&a) && found.contains(&b));

        hash.rebuild(std::iter::empty());
        assert!(hash.is_empty());
    }

    #[test]
    fn positions_outside_the_grid_are_clamped() {
        let mut keys: SlotMap<AntKey, ()> = SlotMap::with_key();
        let a = keys.insert(());
        let mut hash = SpatialHash::new(10.0, 10.0, 1.0);
        hash.rebuild([(a, Vec2::new(-3.0, 25.0)), (a, Vec2::new(f32::NAN, 1.0))]);
        assert_eq!(hash.len(), 1);
    }
}
