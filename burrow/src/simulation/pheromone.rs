use super::MAX_COLONIES;

pub const MAX_PHEROMONE_AMOUNT: f32 = 1.0;

/// Per-colony food and home trails plus a shared "blocked" channel, stored as
/// flat row-major layers. Cells holding any non-zero value are tracked in an
/// active set so decay only touches live cells.
#[derive(Clone, Debug)]
pub struct PheromoneField {
    pub width: usize,
    pub height: usize,
    pub(crate) food: Vec<Vec<f32>>,
    pub(crate) home: Vec<Vec<f32>>,
    pub(crate) blocked: Vec<f32>,
    active: Vec<usize>,
    in_active: Vec<bool>,
}

impl PheromoneField {
    pub fn new(width: usize, height: usize) -> Self {
        let size = width * height;
        Self {
            width,
            height,
            food: vec![vec![0.0; size]; MAX_COLONIES],
            home: vec![vec![0.0; size]; MAX_COLONIES],
            blocked: vec![0.0; size],
            active: Vec::new(),
            in_active: vec![false; size],
        }
    }

    #[inline]
    fn mark_active(&mut self, idx: usize) {
        if !self.in_active[idx] {
            self.in_active[idx] = true;
            self.active.push(idx);
        }
    }

    #[inline(always)]
    fn lay(cell: &mut f32, amount: f32) {
        *cell = (*cell + amount).min(MAX_PHEROMONE_AMOUNT);
    }

    pub fn deposit_food(&mut self, idx: usize, amount: f32, colony: usize) -> bool {
        if colony >= MAX_COLONIES || !(amount > 0.0) || idx >= self.blocked.len() {
            return false;
        }
        Self::lay(&mut self.food[colony][idx], amount);
        self.mark_active(idx);
        true
    }

    pub fn deposit_home(&mut self, idx: usize, amount: f32, colony: usize) -> bool {
        if colony >= MAX_COLONIES || !(amount > 0.0) || idx >= self.blocked.len() {
            return false;
        }
        Self::lay(&mut self.home[colony][idx], amount);
        self.mark_active(idx);
        true
    }

    pub fn deposit_blocked(&mut self, idx: usize, amount: f32) -> bool {
        if !(amount > 0.0) || idx >= self.blocked.len() {
            return false;
        }
        Self::lay(&mut self.blocked[idx], amount);
        self.mark_active(idx);
        true
    }

    /// Overwrites the home trail of one cell, used to pin nests at full strength.
    pub fn set_home(&mut self, idx: usize, value: f32, colony: usize) {
        if colony >= MAX_COLONIES || idx >= self.blocked.len() {
            return;
        }
        self.home[colony][idx] = value.clamp(0.0, MAX_PHEROMONE_AMOUNT);
        if value > 0.0 {
            self.mark_active(idx);
        }
    }

    #[inline]
    pub fn food(&self, idx: usize, colony: usize) -> f32 {
        self.food
            .get(colony)
            .and_then(|layer| layer.get(idx))
            .copied()
            .unwrap_or(0.0)
    }

    #[inline]
    pub fn home(&self, idx: usize, colony: usize) -> f32 {
        self.home
            .get(colony)
            .and_then(|layer| layer.get(idx))
            .copied()
            .unwrap_or(0.0)
    }

    #[inline]
    pub fn blocked(&self, idx: usize) -> f32 {
        self.blocked.get(idx).copied().unwrap_or(0.0)
    }

    /// Zeroes every channel of a cell. The cell is evicted lazily on the next decay.
    pub fn clear_cell(&mut self, idx: usize) {
        if idx >= self.blocked.len() {
            return;
        }
        for layer in self.food.iter_mut().chain(self.home.iter_mut()) {
            layer[idx] = 0.0;
        }
        self.blocked[idx] = 0.0;
    }

    /// Zeroes both trails of a single colony everywhere.
    pub fn clear_colony(&mut self, colony: usize) {
        if colony >= MAX_COLONIES {
            return;
        }
        self.food[colony].fill(0.0);
        self.home[colony].fill(0.0);
    }

    /// Multiplies every active cell by `factor` (the blocked channel by
    /// `factor²`) and zeroes values that fall below `threshold`. Runs in
    /// O(active cells).
    pub fn decay(&mut self, factor: f32, threshold: f32) {
        let factor = if factor.is_nan() { 0.0 } else { factor.clamp(0.0, 1.0) };
        let blocked_factor = factor * factor;
        let active = std::mem::take(&mut self.active);
        let mut kept = Vec::with_capacity(active.len());

        for idx in active {
            let mut alive = false;
            for layer in self.food.iter_mut().chain(self.home.iter_mut()) {
                let cell = &mut layer[idx];
                if *cell > 0.0 {
                    *cell *= factor;
                    if *cell < threshold {
                        *cell = 0.0;
                    } else {
                        alive = true;
                    }
                }
            }
            let cell = &mut self.blocked[idx];
            if *cell > 0.0 {
                *cell *= blocked_factor;
                if *cell < threshold {
                    *cell = 0.0;
                } else {
                    alive = true;
                }
            }

            if alive {
                kept.push(idx);
            } else {
                self.in_active[idx] = false;
            }
        }
        self.active = kept;
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    /// Clamps every channel into [0, 1] and rebuilds the active set. Used after
    /// restoring persisted layers.
    pub fn rebuild_active(&mut self) {
        let size = self.width * self.height;
        for layer in self.food.iter_mut().chain(self.home.iter_mut()) {
            layer.resize(size, 0.0);
            for v in layer.iter_mut() {
                *v = if v.is_nan() { 0.0 } else { v.clamp(0.0, MAX_PHEROMONE_AMOUNT) };
            }
        }
        self.blocked.resize(size, 0.0);
        for v in self.blocked.iter_mut() {
            *v = if v.is_nan() { 0.0 } else { v.clamp(0.0, MAX_PHEROMONE_AMOUNT) };
        }

        self.active.clear();
        self.in_active = vec![false; size];
        for idx in 0..size {
            let live = self.blocked[idx] > 0.0
                || self.food.iter().any(|l| l[idx] > 0.0)
                || self.home.iter().any(|l| l[idx] > 0.0);
            if live {
                self.in_active[idx] = true;
                self.active.push(idx);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deposit_is_additive_and_clamped() {
        let mut field = PheromoneField::new(4, 4);
        field.deposit_food(5, 0.7, 1);
        field.deposit_food(5, 0.7, 1);
        assert_eq!(field.food(5, 1), 1.0);
        assert_eq!(field.food(5, 0), 0.0);
        assert_eq!(field.active_len(), 1);
    }

    #[test]
    fn decay_evicts_dead_cells() {
        let mut field = PheromoneField::new(4, 4);
        field.deposit_home(3, 0.5, 0);
        field.deposit_blocked(7, 0.5);
        field.decay(0.9, 0.05);
        assert!((field.home(3, 0) - 0.45).abs() < 1e-6);
        assert!((field.blocked(7) - 0.405).abs() < 1e-6);
        for _ in 0..60 {
            field.decay(0.9, 0.05);
        }
        assert_eq!(field.home(3, 0), 0.0);
        assert_eq!(field.blocked(7), 0.0);
        assert_eq!(field.active_len(), 0);
    }

    #[test]
    fn invalid_inputs_are_ignored() {
        let mut field = PheromoneField::new(2, 2);
        assert!(!field.deposit_food(0, 0.5, MAX_COLONIES));
        assert!(!field.deposit_food(99, 0.5, 0));
        assert!(!field.deposit_home(0, f32::NAN, 0));
        assert!(!field.deposit_blocked(0, -1.0));
        assert_eq!(field.active_len(), 0);
    }

    #[test]
    fn rebuild_active_sanitizes_values() {
        let mut field = PheromoneField::new(2, 2);
        field.food[0][1] = 3.0;
        field.home[2][2] = f32::NAN;
        field.rebuild_active();
        assert_eq!(field.food(1, 0), 1.0);
        assert_eq!(field.home(2, 2), 0.0);
        assert_eq!(field.active_len(), 1);
    }
}
