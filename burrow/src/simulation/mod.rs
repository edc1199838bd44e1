pub mod ant;
pub mod calendar;
pub mod castes;
pub mod cell;
pub mod collaborators;
pub mod colony;
pub mod combat;
pub mod intent;
mod navigation;
pub mod pheromone;
pub mod raycast;
pub mod rooms;
mod sim;
pub mod snapshot;
pub mod spatial;
pub mod terrain;
mod timer;
pub mod worldgen;

// Re-export key types for easier imports
pub use ant::{Ant, AntContext, AntKey, AntState, AntSummary, Caste, Neighbors};
pub use calendar::Calendar;
pub use castes::{BuilderTask, NurseTask, Role};
pub use cell::{CellType, DirtType, Zone};
pub use collaborators::{EventSink, NoProgression, NullSink, Progression, RecordingSink};
pub use colony::{ColonyState, DefenseAlert, SpawnKind, SpawnOrder, SpawnQueue};
pub use combat::CombatReport;
pub use intent::Intent;
pub use rooms::{BuildKind, BuildQueue, BuildTask, Room, RoomType, WorkAction, WorkCell};
pub use sim::{DeathCause, Simulation};
pub use snapshot::{Snapshot, SnapshotError};
pub use terrain::Terrain;
pub use timer::Timer;

pub use shared::MAX_COLONIES;

// Time constants
pub const MAX_TICK_DT: f32 = 0.05;
pub const MAX_SUBSTEPS: u32 = 8;
pub const MIN_SPEED_MULTIPLIER: f32 = 0.1;
pub const MAX_SPEED_MULTIPLIER: f32 = 8.0;
pub const PHEROMONE_DECAY_INTERVAL: f32 = 0.25;
pub const PHEROMONE_THRESHOLD: f32 = 0.01;
pub const SCENT_DIFFUSION_INTERVAL: f32 = 1.0;
pub const FOOD_MAINTENANCE_INTERVAL: f32 = 5.0;

// Staggered pass cadence, in ticks
pub const SEPARATION_EVERY: u64 = 2;
pub const COMBAT_EVERY: u64 = 3;
pub const BUILD_QUEUE_EVERY: u64 = 20;
pub const MANAGEMENT_EVERY: u64 = 30;
pub const CULLING_EVERY: u64 = 60;

// Terrain constants
pub const DEFAULT_FOOD_PER_CELL: u8 = 20;
pub const SCENT_FALLOFF: f32 = 0.97;
pub const SCENT_MAX_HOPS: u32 = 48;
pub const SCENT_MIN: f32 = 0.005;
pub const FOG_REVEAL_RADIUS: i32 = 2;
pub const MAX_ROOM_RADIUS: f32 = 12.0;
pub const MIN_ROOM_SCORE: f32 = 0.6;
pub const ROOM_SEARCH_SLACK: f32 = 16.0;
pub const HOME_ROOM_RADIUS: f32 = 4.0;

// Ant behavior constants
pub const NEST_RADIUS: f32 = 2.5;
pub const REST_THRESHOLD: f32 = 0.2; // fraction of energy capacity
pub const STARVATION_DAMAGE: f32 = 2.0; // hp per second at zero energy
pub const DIG_DAMAGE_PER_SECOND: f32 = 12.0;
pub const DIG_ENERGY_PER_SECOND: f32 = 2.0;
pub const SLOWNESS_WITH_FOOD: f32 = 0.9; // Ants are 10% slower when carrying food
pub const STEER_GAIN: f32 = 0.5;
pub const SIGNAL_EPSILON: f32 = 0.002;
pub const BACK_OFF_CHANCE: f32 = 0.9;
pub const STUCK_PHASE_TIME: f32 = 2.0;
pub const STUCK_RESCUE_TIME: f32 = 20.0;
pub const BROOD_JITTER_CHANCE: f32 = 0.002;

// Caste behavior constants
pub const EGG_LAY_INTERVAL: f32 = 8.0;
pub const EGG_FOOD_COST: u32 = 3;
pub const EGG_HATCH_TIME: f32 = 20.0;
pub const LARVA_GROW_TIME: f32 = 30.0;
pub const FED_LARVA_GROWTH_BONUS: f32 = 1.5;
pub const QUEEN_ROAM_RADIUS: f32 = 2.0;
pub const PRINCESS_ROAM_RADIUS: f32 = 6.0;
pub const PATROL_RADIUS: f32 = 7.0;
pub const NURSE_SEARCH_RADIUS: f32 = 24.0;
pub const NURSE_REACH: f32 = 1.25;
pub const NURSE_FEED_COOLDOWN: f32 = 4.0;
pub const FEED_ENERGY: f32 = 40.0;
pub const FEED_HEAL: f32 = 10.0;
pub const BUILDER_REACH: f32 = 1.6;
pub const BUILDER_CELLS_PER_TICK: usize = 3;
pub const BUILDER_DIG_PER_TICK: f32 = 5.0;
pub const BUILDER_GIVE_UP_TIME: f32 = 8.0;
pub const MAX_ANTS_PER_COLONY: u32 = 400;
pub const MAX_PRINCESSES: u32 = 2;

// Reproduction economy
pub const FOOD_PER_EGG_ORDER: u32 = 5;
pub const FOOD_PER_PRINCESS_ORDER: u32 = 60;
pub const EGG_ORDER_WEIGHT: u32 = 1;
pub const PRINCESS_ORDER_WEIGHT: u32 = 3;

// Combat and defense
pub const FIGHT_RADIUS: f32 = 1.0;
pub const SEPARATION_RADIUS: f32 = 0.6;
pub const DEFENDER_DAMAGE_MULTIPLIER: f32 = 1.5;
pub const MIN_DAMAGE: f32 = 0.2;
pub const DEFENSE_RADIUS: f32 = 15.0;
pub const DEFENSE_ALERT_DURATION: f32 = 10.0;
pub const DEFENSE_WALL_DISTANCE: f32 = 5.0;
pub const GUIDANCE_STRENGTH: f32 = 0.2;
pub const GUIDANCE_LENGTH: usize = 12;

// Food maintenance
pub const CRITICAL_FOOD_STOCK: u32 = 5;
pub const LOW_NEARBY_FOOD: u32 = 20;
pub const NEARBY_FOOD_RADIUS: i32 = 25;
pub const EMERGENCY_FOOD_DISTANCE: f32 = 12.0;
pub const FOOD_CLUSTER_RADIUS: i32 = 2;
