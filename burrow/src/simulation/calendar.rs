use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use shared::{NatureEventKind, Season};

pub const DAY_LENGTH: f32 = 120.0;
pub const DAYS_PER_SEASON: u32 = 7;
pub const RAINSTORM_CHANCE: f64 = 0.15;
pub const FOOD_BLOOM_CHANCE: f64 = 0.2;
/// Pheromone decay factor applied once by a rainstorm.
pub const RAINSTORM_DECAY: f32 = 0.5;

/// What changed while advancing the clock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CalendarChange {
    pub new_day: Option<u32>,
    pub new_season: Option<Season>,
}

/// In-game day and season clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Calendar {
    pub day: u32,
    pub season: Season,
    pub time_of_day: f32,
}

impl Default for Calendar {
    fn default() -> Self {
        Self {
            day: 1,
            season: Season::Spring,
            time_of_day: 0.0,
        }
    }
}

impl Calendar {
    pub fn advance(&mut self, dt: f32) -> CalendarChange {
        let mut change = CalendarChange::default();
        if !(dt > 0.0) || !dt.is_finite() {
            return change;
        }
        self.time_of_day += dt;
        while self.time_of_day >= DAY_LENGTH {
            self.time_of_day -= DAY_LENGTH;
            self.day += 1;
            change.new_day = Some(self.day);
            let season = Season::from_index((self.day - 1) / DAYS_PER_SEASON);
            if season != self.season {
                self.season = season;
                change.new_season = Some(season);
            }
        }
        change
    }

    /// At most one nature event per new day.
    pub fn roll_nature_event(&self, rng: &mut ChaCha8Rng) -> Option<NatureEventKind> {
        if rng.gen_bool(RAINSTORM_CHANCE) {
            return Some(NatureEventKind::Rainstorm);
        }
        if self.season.is_growing() && rng.gen_bool(FOOD_BLOOM_CHANCE) {
            return Some(NatureEventKind::FoodBloom);
        }
        None
    }

    /// Restores consistency after loading: the season always follows the day.
    pub(crate) fn sanitized(mut self) -> Self {
        self.day = self.day.max(1);
        self.season = Season::from_index((self.day - 1) / DAYS_PER_SEASON);
        self.time_of_day = if self.time_of_day.is_finite() {
            self.time_of_day.clamp(0.0, DAY_LENGTH)
        } else {
            0.0
        };
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn days_and_seasons_roll_over() {
        let mut calendar = Calendar::default();
        assert_eq!(calendar.advance(DAY_LENGTH - 1.0), CalendarChange::default());
        let change = calendar.advance(2.0);
        assert_eq!(change.new_day, Some(2));
        assert_eq!(change.new_season, None);

        let change = calendar.advance(DAY_LENGTH * 6.0);
        assert_eq!(calendar.day, 8);
        assert_eq!(change.new_season, Some(Season::Summer));
    }

    #[test]
    fn winter_has_no_blooms() {
        let calendar = Calendar {
            day: 22,
            season: Season::Winter,
            time_of_day: 0.0,
        };
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        for _ in 0..500 {
            assert_ne!(calendar.roll_nature_event(&mut rng), Some(NatureEventKind::FoodBloom));
        }
    }

    #[test]
    fn sanitized_recomputes_season() {
        let calendar = Calendar {
            day: 0,
            season: Season::Autumn,
            time_of_day: f32::NAN,
        }
        .sanitized();
        assert_eq!(calendar.day, 1);
        assert_eq!(calendar.season, Season::Spring);
        assert_eq!(calendar.time_of_day, 0.0);
    }
}
