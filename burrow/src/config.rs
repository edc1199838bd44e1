use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

use crate::simulation::MAX_COLONIES;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Startup parameters for a simulation run. Every field has a default so a
/// partial TOML file is accepted.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SimulationConfig {
    pub width: u32,
    pub height: u32,
    pub seed: u64,
    pub colonies: u8,
    pub initial_workers: u32,
    pub initial_soldiers: u32,
    pub initial_nurses: u32,
    pub initial_builders: u32,
    pub initial_food_clusters: u32,
    pub rock_density: f32,
    pub surface_rows: u32,
    pub tuning: Tuning,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            width: 160,
            height: 100,
            seed: 42,
            colonies: 2,
            initial_workers: 12,
            initial_soldiers: 3,
            initial_nurses: 2,
            initial_builders: 2,
            initial_food_clusters: 6,
            rock_density: 0.08,
            surface_rows: 6,
            tuning: Tuning::default(),
        }
    }
}

impl SimulationConfig {
    /// Clamps structural values into workable ranges.
    pub fn sanitized(mut self) -> Self {
        self.width = self.width.clamp(16, 2048);
        self.height = self.height.clamp(16, 2048);
        self.colonies = self.colonies.clamp(1, MAX_COLONIES as u8);
        self.rock_density = if self.rock_density.is_finite() {
            self.rock_density.clamp(0.0, 0.25)
        } else {
            0.08
        };
        self.surface_rows = self.surface_rows.min(self.height / 4);
        self.tuning = self.tuning.sanitized();
        self
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: SimulationConfig = toml::from_str(&content)?;
        info!(path = %path.display(), "loaded simulation config");
        Ok(config.sanitized())
    }
}

/// Runtime-tunable behaviour parameters. Values outside their documented
/// range are clamped by [`Tuning::sanitized`].
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct Tuning {
    /// Multiplier on every caste's base speed. 0.25..=4.0
    pub ant_speed: f32,
    /// Distance of the three directional sensors, in cells. 1..=12
    pub sensor_distance: f32,
    /// Half-angle between the front and side sensors, in radians. 0.1..=1.4
    pub sensor_angle: f32,
    /// Pheromone laid per cell entered. 0..=1
    pub pheromone_deposit: f32,
    /// Multiplicative decay applied every decay interval. 0.5..=0.999
    pub pheromone_decay: f32,
    /// Maximum energy of an ant. 20..=500
    pub energy_capacity: f32,
    /// Energy burnt per second while active. 0..=10
    pub energy_decay: f32,
    /// Energy regained per second while resting. 0..=50
    pub energy_recovery: f32,
    /// Share of newborn ants with a strong explorer tendency. 0..=1
    pub explorer_ratio: f32,
    /// Maximum random heading jitter per update, in radians. 0..=1
    pub random_turn: f32,
    /// Sensor distance used when smelling food scent. 1..=20
    pub food_sense_range: f32,
    pub rest_enabled: bool,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            ant_speed: 1.0,
            sensor_distance: 4.0,
            sensor_angle: 0.6,
            pheromone_deposit: 0.15,
            pheromone_decay: 0.96,
            energy_capacity: 100.0,
            energy_decay: 1.0,
            energy_recovery: 8.0,
            explorer_ratio: 0.15,
            random_turn: 0.25,
            food_sense_range: 8.0,
            rest_enabled: true,
        }
    }
}

fn clamp_or(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_nan() {
        return fallback;
    }
    value.clamp(min, max)
}

impl Tuning {
    pub fn sanitized(self) -> Self {
        let d = Tuning::default();
        let out = Self {
            ant_speed: clamp_or(self.ant_speed, 0.25, 4.0, d.ant_speed),
            sensor_distance: clamp_or(self.sensor_distance, 1.0, 12.0, d.sensor_distance),
            sensor_angle: clamp_or(self.sensor_angle, 0.1, 1.4, d.sensor_angle),
            pheromone_deposit: clamp_or(self.pheromone_deposit, 0.0, 1.0, d.pheromone_deposit),
            pheromone_decay: clamp_or(self.pheromone_decay, 0.5, 0.999, d.pheromone_decay),
            energy_capacity: clamp_or(self.energy_capacity, 20.0, 500.0, d.energy_capacity),
            energy_decay: clamp_or(self.energy_decay, 0.0, 10.0, d.energy_decay),
            energy_recovery: clamp_or(self.energy_recovery, 0.0, 50.0, d.energy_recovery),
            explorer_ratio: clamp_or(self.explorer_ratio, 0.0, 1.0, d.explorer_ratio),
            random_turn: clamp_or(self.random_turn, 0.0, 1.0, d.random_turn),
            food_sense_range: clamp_or(self.food_sense_range, 1.0, 20.0, d.food_sense_range),
            rest_enabled: self.rest_enabled,
        };
        if out != self {
            warn!(?self, "tuning values clamped into their documented ranges");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_uses_defaults() {
        let config: SimulationConfig = toml::from_str(
            r#"
            width = 64
            seed = 7

            [tuning]
            ant_speed = 2.0
            "#,
        )
        .unwrap();
        assert_eq!(config.width, 64);
        assert_eq!(config.height, SimulationConfig::default().height);
        assert_eq!(config.seed, 7);
        assert_eq!(config.tuning.ant_speed, 2.0);
        assert_eq!(config.tuning.sensor_angle, Tuning::default().sensor_angle);
    }

    #[test]
    fn tuning_is_clamped() {
        let tuning = Tuning {
            ant_speed: 99.0,
            sensor_distance: 0.0,
            pheromone_decay: f32::NAN,
            explorer_ratio: -1.0,
            ..Tuning::default()
        }
        .sanitized();
        assert_eq!(tuning.ant_speed, 4.0);
        assert_eq!(tuning.sensor_distance, 1.0);
        assert_eq!(tuning.pheromone_decay, Tuning::default().pheromone_decay);
        assert_eq!(tuning.explorer_ratio, 0.0);
    }

    #[test]
    fn config_colonies_are_capped() {
        let config = SimulationConfig {
            colonies: 12,
            ..SimulationConfig::default()
        }
        .sanitized();
        assert_eq!(config.colonies as usize, MAX_COLONIES);
    }
}
