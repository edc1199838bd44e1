use serde::{Deserialize, Serialize};

// Count-up timer driving periodic simulation work.
// Counts up from 0 to max_value

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timer {
    pub max_value: f32,
    pub value: f32,
}

impl Timer {
    /// Create a new timer with a max value and an initial value
    pub fn new(max_value: f32, initial_value: f32) -> Self {
        Self {
            max_value: max_value.max(f32::EPSILON),
            value: initial_value.max(0.0),
        }
    }

    /// Returns true if the timer has gone past the max value
    pub fn is_ready(&self) -> bool {
        self.value >= self.max_value
    }

    /// Update the timer by dt (delta time)
    pub fn update(&mut self, dt: f32) {
        if dt.is_finite() && dt > 0.0 {
            self.value += dt;
        }
    }

    /// Wraps the timer value back within bounds.
    pub fn wrap(&mut self) {
        self.value %= self.max_value;
    }

    /// Force the timer to be ready
    pub fn force_ready(&mut self) {
        self.value = self.max_value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timer_fires_and_wraps() {
        let mut timer = Timer::new(1.0, 0.0);
        timer.update(0.6);
        assert!(!timer.is_ready());
        timer.update(0.6);
        assert!(timer.is_ready());
        timer.wrap();
        assert!((timer.value - 0.2).abs() < 1e-5);
    }

    #[test]
    fn timer_ignores_bad_dt() {
        let mut timer = Timer::new(1.0, 0.5);
        timer.update(f32::NAN);
        timer.update(-3.0);
        assert_eq!(timer.value, 0.5);
        timer.force_ready();
        assert!(timer.is_ready());
    }
}
