//! Real-time core of an underground ant colony simulation: a mutable cell
//! grid with diffusing scalar fields, caste-driven agents and the fixed-step
//! orchestrator that sequences them.

pub mod config;
pub mod simulation;

pub use config::{SimulationConfig, Tuning};
pub use simulation::{
    Ant, AntKey, AntState, Caste, CellType, DirtType, EventSink, Progression, RecordingSink,
    Room, RoomType, Simulation, Snapshot, Terrain, Zone,
};
