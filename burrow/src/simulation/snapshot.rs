//! Full-state snapshots. Derived data (BFS fields, the food-cell list, the
//! active pheromone set) is never stored and is rebuilt on restore.

use macroquad::math::Vec2;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use std::collections::VecDeque;
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

use super::ant::{Ant, AntState, Caste};
use super::calendar::Calendar;
use super::castes::{BroodState, BuilderTask, NurseTask, Role};
use super::cell::{CellType, DirtType, Zone};
use super::colony::{ColonyState, SpawnOrder, SpawnQueue};
use super::rooms::{BuildQueue, BuildTask, Room, WorkCell};
use super::sim::Simulation;
use super::terrain::Terrain;
use super::{EGG_LAY_INTERVAL, MAX_COLONIES};
use crate::config::Tuning;

pub const SNAPSHOT_VERSION: u32 = 1;

const MAX_COMBAT_STAT: f32 = 100.0;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot io error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid snapshot json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] bincode::error::EncodeError),
    #[error("failed to decode snapshot: {0}")]
    Decode(#[from] bincode::error::DecodeError),
    #[error("snapshot layer '{layer}' has {found} cells, expected {expected}")]
    Dimensions {
        layer: &'static str,
        expected: usize,
        found: usize,
    },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct AntRecord {
    pub id: u64,
    pub colony_id: u8,
    pub caste: u8,
    pub pos: (f32, f32),
    pub heading: f32,
    pub energy: f32,
    pub hp: f32,
    pub max_hp: f32,
    pub attack: Option<f32>,
    pub defense: Option<f32>,
    pub aggression: Option<f32>,
    pub explorer: f32,
    pub age: f32,
    pub has_food: bool,
    pub state: u8,
    pub resume_state: u8,
    pub stuck_time: f32,
    pub consecutive_hits: u32,
    pub carried_by: Option<u64>,
    // Caste payload, flattened. Fields unused by the caste stay default.
    pub brood: BroodState,
    pub lay_timer: f32,
    pub nurse_task: u8,
    pub nurse_target: u64,
    pub feed_cooldown: f32,
    pub patrol_angle: f32,
    pub defending: bool,
    pub builder_task: u8,
    pub build_task_id: Option<u64>,
    pub pending: Vec<WorkCell>,
    pub stalled: f32,
}

impl From<&Ant> for AntRecord {
    fn from(ant: &Ant) -> Self {
        let mut record = AntRecord {
            id: ant.id,
            colony_id: ant.colony_id,
            caste: ant.caste().index(),
            pos: (ant.pos.x, ant.pos.y),
            heading: ant.heading,
            energy: ant.energy,
            hp: ant.hp,
            max_hp: ant.max_hp,
            attack: Some(ant.attack),
            defense: Some(ant.defense),
            aggression: Some(ant.aggression),
            explorer: ant.explorer,
            age: ant.age,
            has_food: ant.has_food,
            state: ant.state.index(),
            resume_state: ant.resume_state.index(),
            stuck_time: ant.stuck_time,
            consecutive_hits: ant.consecutive_hits,
            carried_by: ant.carried_by,
            ..Default::default()
        };
        match &ant.role {
            Role::Egg(brood) | Role::Larva(brood) => record.brood = *brood,
            Role::Queen(queen) => record.lay_timer = queen.lay_timer.value,
            Role::Nurse(nurse) => {
                (record.nurse_task, record.nurse_target) = match nurse.task {
                    NurseTask::Idle => (0, 0),
                    NurseTask::FetchEgg { egg } => (1, egg),
                    NurseTask::CarryEgg { egg } => (2, egg),
                    NurseTask::Feed { target } => (3, target),
                };
                record.feed_cooldown = nurse.feed_cooldown;
            }
            Role::Soldier(soldier) => {
                record.patrol_angle = soldier.patrol_angle;
                record.defending = soldier.defending;
            }
            Role::Builder(builder) => {
                record.builder_task = builder.task.index();
                record.build_task_id = builder.task_id;
                record.pending = builder.pending.iter().copied().collect();
                record.stalled = builder.stalled;
            }
            Role::Worker | Role::Drone | Role::Princess => {}
        }
        record
    }
}

impl AntRecord {
    /// Rebuilds the ant, clamping enum indices and non-finite values.
    fn into_ant(self, energy_capacity: f32) -> Ant {
        let caste = Caste::from_index(self.caste);
        let pos = Vec2::new(finite_or(self.pos.0, 0.5), finite_or(self.pos.1, 0.5));
        let mut ant = Ant::new(
            self.id,
            caste,
            self.colony_id.min(MAX_COLONIES as u8 - 1),
            pos,
            finite_or(self.heading, 0.0),
            finite_or(self.energy, energy_capacity).min(energy_capacity),
        );
        if self.max_hp.is_finite() && self.max_hp > 0.0 {
            ant.max_hp = self.max_hp;
        }
        ant.hp = finite_or(self.hp, ant.max_hp).clamp(0.0, ant.max_hp);
        let stats = caste.stats();
        ant.attack = stat_or(self.attack, 0.0, MAX_COMBAT_STAT, stats.attack);
        ant.defense = stat_or(self.defense, 0.0, MAX_COMBAT_STAT, stats.defense);
        ant.aggression = stat_or(self.aggression, 0.0, 1.0, stats.aggression);
        ant.explorer = finite_or(self.explorer, 0.0).clamp(0.0, 1.0);
        ant.age = finite_or(self.age, 0.0).max(0.0);
        ant.has_food = self.has_food;
        ant.state = AntState::from_index(self.state);
        ant.resume_state = AntState::from_index(self.resume_state);
        ant.stuck_time = finite_or(self.stuck_time, 0.0).max(0.0);
        ant.consecutive_hits = self.consecutive_hits;
        ant.carried_by = self.carried_by.filter(|_| caste == Caste::Egg);

        match &mut ant.role {
            Role::Egg(brood) | Role::Larva(brood) => {
                *brood = self.brood;
                brood.growth = finite_or(brood.growth, 0.0).max(0.0);
            }
            Role::Queen(queen) => {
                queen.lay_timer.value = finite_or(self.lay_timer, 0.0).clamp(0.0, EGG_LAY_INTERVAL);
            }
            Role::Nurse(nurse) => {
                nurse.task = match self.nurse_task {
                    1 => NurseTask::FetchEgg { egg: self.nurse_target },
                    2 => NurseTask::CarryEgg { egg: self.nurse_target },
                    3 => NurseTask::Feed { target: self.nurse_target },
                    _ => NurseTask::Idle,
                };
                nurse.feed_cooldown = finite_or(self.feed_cooldown, 0.0).max(0.0);
            }
            Role::Soldier(soldier) => {
                soldier.patrol_angle = finite_or(self.patrol_angle, 0.0);
                soldier.defending = self.defending;
            }
            Role::Builder(builder) => {
                builder.task = BuilderTask::from_index(self.builder_task);
                builder.task_id = self.build_task_id;
                builder.pending = VecDeque::from(self.pending);
                builder.stalled = finite_or(self.stalled, 0.0).max(0.0);
            }
            Role::Worker | Role::Drone | Role::Princess => {}
        }
        ant
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct ColonyRecord {
    pub id: u8,
    pub alive: bool,
    pub nest: Option<(i32, i32)>,
    pub food_stock: u32,
    pub food_delivered: u64,
    pub food_since_egg_order: u32,
    pub food_since_princess_order: u32,
    pub spawn_orders: Vec<SpawnOrder>,
    pub caste_targets: Option<[f32; shared::CASTE_TARGET_COUNT]>,
    pub larvae_matured: u32,
    pub queenless: bool,
    pub deaths: [u32; shared::DeathKind::COUNT],
}

impl From<&ColonyState> for ColonyRecord {
    fn from(colony: &ColonyState) -> Self {
        Self {
            id: colony.id,
            alive: colony.alive,
            nest: colony.nest,
            food_stock: colony.food_stock,
            food_delivered: colony.food_delivered,
            food_since_egg_order: colony.food_since_egg_order,
            food_since_princess_order: colony.food_since_princess_order,
            spawn_orders: colony.spawn_queue.orders().to_vec(),
            caste_targets: Some(colony.caste_targets),
            larvae_matured: colony.larvae_matured,
            queenless: colony.queenless,
            deaths: colony.deaths,
        }
    }
}

/// Serializable copy of a whole simulation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Snapshot {
    pub version: u32,
    pub width: u32,
    pub height: u32,
    pub cell_type: Vec<u8>,
    pub dirt_type: Vec<u8>,
    pub dirt_health: Vec<f32>,
    pub food_amount: Vec<u8>,
    pub zone: Vec<u8>,
    pub explored: Vec<u8>,
    pub food_pheromone: Vec<Vec<f32>>,
    pub home_pheromone: Vec<Vec<f32>>,
    pub blocked_pheromone: Vec<f32>,
    pub food_scent: Vec<f32>,
    pub rooms: Vec<Room>,
    pub next_room_id: u32,
    pub nests: Vec<Option<(i32, i32)>>,
    pub ants: Vec<AntRecord>,
    pub next_ant_id: u64,
    pub colonies: Vec<ColonyRecord>,
    pub build_tasks: Vec<BuildTask>,
    pub next_build_task_id: u64,
    pub calendar: Calendar,
    pub tuning: Tuning,
    pub elapsed: f64,
    pub tick: u64,
    pub seed: u64,
    pub speed_multiplier: f32,
    /// Progress of the decay, scent and food maintenance timers.
    pub timers: [f32; 3],
    pub rng: Option<ChaCha8Rng>,
}

/// Stored combat stat clamped into range, or the caste default when absent
/// or not finite.
fn stat_or(value: Option<f32>, min: f32, max: f32, fallback: f32) -> f32 {
    match value {
        Some(v) if v.is_finite() => v.clamp(min, max),
        _ => fallback,
    }
}

fn finite_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() { value } else { fallback }
}

fn check_len(layer: &'static str, found: usize, expected: usize) -> Result<(), SnapshotError> {
    if found == expected {
        Ok(())
    } else {
        Err(SnapshotError::Dimensions {
            layer,
            expected,
            found,
        })
    }
}

/// A missing optional layer is accepted and replaced with zeros.
fn layer_or_zero<T: Clone + Default>(
    layer: &'static str,
    data: Vec<T>,
    size: usize,
) -> Result<Vec<T>, SnapshotError> {
    if data.is_empty() {
        return Ok(vec![T::default(); size]);
    }
    check_len(layer, data.len(), size)?;
    Ok(data)
}

impl From<&Simulation> for Snapshot {
    fn from(sim: &Simulation) -> Self {
        let terrain = &sim.terrain;
        Self {
            version: SNAPSHOT_VERSION,
            width: terrain.width,
            height: terrain.height,
            cell_type: terrain.cell_type.iter().map(|c| c.index()).collect(),
            dirt_type: terrain.dirt_type.iter().map(|d| d.index()).collect(),
            dirt_health: terrain.dirt_health.clone(),
            food_amount: terrain.food_amount.clone(),
            zone: terrain.zone.iter().map(|z| z.index()).collect(),
            explored: terrain.explored.clone(),
            food_pheromone: terrain.pheromones.food.clone(),
            home_pheromone: terrain.pheromones.home.clone(),
            blocked_pheromone: terrain.pheromones.blocked.clone(),
            food_scent: terrain.food_scent.clone(),
            rooms: terrain.rooms.clone(),
            next_room_id: terrain.next_room_id,
            nests: terrain.nests.to_vec(),
            ants: sim.ants.values().map(AntRecord::from).collect(),
            next_ant_id: sim.next_ant_id,
            colonies: sim.colonies.iter().map(ColonyRecord::from).collect(),
            build_tasks: sim.build_queue.iter().cloned().collect(),
            next_build_task_id: sim.build_queue.next_id(),
            calendar: sim.calendar.clone(),
            tuning: sim.tuning,
            elapsed: sim.elapsed,
            tick: sim.tick_count,
            seed: sim.seed,
            speed_multiplier: sim.speed_multiplier,
            timers: [
                sim.decay_timer.value,
                sim.scent_timer.value,
                sim.food_timer.value,
            ],
            rng: Some(sim.rng.clone()),
        }
    }
}

impl Snapshot {
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, SnapshotError> {
        Ok(bincode::serde::encode_to_vec(self, bincode::config::standard())?)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, SnapshotError> {
        let (snapshot, _len): (Snapshot, usize) =
            bincode::serde::decode_from_slice(data, bincode::config::standard())?;
        Ok(snapshot)
    }

    /// Writes JSON for a `.json` path and the binary encoding otherwise.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), SnapshotError> {
        let path = path.as_ref();
        let data = if is_json(path) {
            self.to_json()?.into_bytes()
        } else {
            self.to_bytes()?
        };
        fs::write(path, data)?;
        info!(path = %path.display(), ants = self.ants.len(), "snapshot saved");
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SnapshotError> {
        let path = path.as_ref();
        let data = fs::read(path)?;
        let snapshot = if is_json(path) {
            serde_json::from_slice(&data)?
        } else {
            Self::from_bytes(&data)?
        };
        info!(path = %path.display(), "snapshot loaded");
        Ok(snapshot)
    }
}

struct TerrainParts {
    width: u32,
    height: u32,
    cell_type: Vec<u8>,
    dirt_type: Vec<u8>,
    dirt_health: Vec<f32>,
    food_amount: Vec<u8>,
    zone: Vec<u8>,
    explored: Vec<u8>,
    food_pheromone: Vec<Vec<f32>>,
    home_pheromone: Vec<Vec<f32>>,
    blocked_pheromone: Vec<f32>,
    food_scent: Vec<f32>,
    rooms: Vec<Room>,
    next_room_id: u32,
    nests: Vec<Option<(i32, i32)>>,
}

impl TerrainParts {
    fn into_terrain(self) -> Result<Terrain, SnapshotError> {
        let TerrainParts {
            width,
            height,
            cell_type,
            dirt_type,
            dirt_health,
            food_amount,
            zone,
            explored,
            food_pheromone,
            home_pheromone,
            blocked_pheromone,
            food_scent,
            rooms,
            next_room_id,
            nests,
        } = self;
        let mut terrain = Terrain::new(width.max(1), height.max(1));
        let size = terrain.size();

        check_len("cell_type", cell_type.len(), size)?;
        terrain.cell_type = cell_type.into_iter().map(CellType::from_index).collect();
        terrain.dirt_type = layer_or_zero("dirt_type", dirt_type, size)?
            .into_iter()
            .map(DirtType::from_index)
            .collect();
        terrain.dirt_health = layer_or_zero("dirt_health", dirt_health, size)?;
        terrain.food_amount = layer_or_zero("food_amount", food_amount, size)?;
        terrain.zone = layer_or_zero("zone", zone, size)?
            .into_iter()
            .map(Zone::from_index)
            .collect();
        terrain.explored = layer_or_zero("explored", explored, size)?;
        terrain.food_scent = layer_or_zero("food_scent", food_scent, size)?;
        terrain.pheromones.blocked = layer_or_zero("blocked_pheromone", blocked_pheromone, size)?;
        for (colony, layer) in food_pheromone.into_iter().take(MAX_COLONIES).enumerate() {
            terrain.pheromones.food[colony] = layer_or_zero("food_pheromone", layer, size)?;
        }
        for (colony, layer) in home_pheromone.into_iter().take(MAX_COLONIES).enumerate() {
            terrain.pheromones.home[colony] = layer_or_zero("home_pheromone", layer, size)?;
        }

        let repaired = repair_cells(&mut terrain);
        if repaired > 0 {
            warn!(repaired, "snapshot cells sanitised on restore");
        }

        for (slot, nest) in nests.into_iter().take(MAX_COLONIES).enumerate() {
            let nest = nest.filter(|&(x, y)| terrain.in_bounds(x, y));
            terrain.nests[slot] = nest;
        }
        let rooms: Vec<Room> = rooms
            .into_iter()
            .filter(|r| {
                (r.colony_id as usize) < MAX_COLONIES && terrain.in_bounds(r.center.0, r.center.1)
            })
            .collect();
        terrain.rooms = rooms;
        let max_id = terrain.rooms.iter().map(|r| r.id + 1).max().unwrap_or(0);
        terrain.next_room_id = next_room_id.max(max_id);

        terrain.pheromones.rebuild_active();
        terrain.nav.clear();
        terrain.version = 1;
        Ok(terrain)
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// Re-establishes the per-cell invariants: dirt has positive health within
/// its tier, food cells hold food, and only air carries trails.
fn repair_cells(terrain: &mut Terrain) -> usize {
    let mut repaired = 0;
    for idx in 0..terrain.size() {
        let mut fixed = false;
        match terrain.cell_type[idx] {
            CellType::Dirt => {
                let max = terrain.dirt_type[idx].max_health();
                let health = terrain.dirt_health[idx];
                if !health.is_finite() || health <= 0.0 || health > max {
                    terrain.dirt_health[idx] = if health.is_finite() && health > max {
                        max
                    } else {
                        terrain.cell_type[idx] = CellType::Air;
                        0.0
                    };
                    fixed = true;
                }
            }
            CellType::Food if terrain.food_amount[idx] == 0 => {
                terrain.cell_type[idx] = CellType::Air;
                fixed = true;
            }
            _ => {}
        }
        if terrain.cell_type[idx] != CellType::Food && terrain.food_amount[idx] != 0 {
            terrain.food_amount[idx] = 0;
            fixed = true;
        }
        if terrain.cell_type[idx] != CellType::Dirt && terrain.dirt_health[idx] != 0.0 {
            terrain.dirt_health[idx] = 0.0;
        }
        if terrain.cell_type[idx] != CellType::Air {
            terrain.pheromones.clear_cell(idx);
            terrain.food_scent[idx] = 0.0;
        }
        if fixed {
            repaired += 1;
        }
    }
    repaired
}

impl Simulation {
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::from(self)
    }

    /// Rebuilds a simulation from a snapshot. Collaborators start as null
    /// implementations; attach real ones with the setters.
    pub fn restore(snapshot: Snapshot) -> Result<Simulation, SnapshotError> {
        let Snapshot {
            width,
            height,
            cell_type,
            dirt_type,
            dirt_health,
            food_amount,
            zone,
            explored,
            food_pheromone,
            home_pheromone,
            blocked_pheromone,
            food_scent,
            rooms,
            next_room_id,
            nests,
            ants,
            next_ant_id,
            colonies,
            build_tasks,
            next_build_task_id,
            calendar,
            tuning,
            elapsed,
            tick,
            seed,
            speed_multiplier,
            timers,
            rng,
            ..
        } = snapshot;

        let terrain = TerrainParts {
            width,
            height,
            cell_type,
            dirt_type,
            dirt_health,
            food_amount,
            zone,
            explored,
            food_pheromone,
            home_pheromone,
            blocked_pheromone,
            food_scent,
            rooms,
            next_room_id,
            nests,
        }
        .into_terrain()?;

        let mut sim = Simulation::from_terrain(terrain, seed, tuning);
        if let Some(rng) = rng {
            sim.rng = rng;
        }
        sim.calendar = calendar.sanitized();
        sim.elapsed = if elapsed.is_finite() { elapsed.max(0.0) } else { 0.0 };
        sim.tick_count = tick;
        sim.set_speed_multiplier(speed_multiplier);
        sim.decay_timer.value = finite_or(timers[0], 0.0).max(0.0);
        sim.scent_timer.value = finite_or(timers[1], 0.0).max(0.0);
        sim.food_timer.value = finite_or(timers[2], 0.0).max(0.0);

        for record in colonies {
            let c = record.id as usize;
            if c >= MAX_COLONIES {
                continue;
            }
            let mut colony = ColonyState::new(record.id);
            colony.alive = record.alive;
            colony.nest = record.nest;
            colony.food_stock = record.food_stock;
            colony.food_delivered = record.food_delivered;
            colony.food_since_egg_order = record.food_since_egg_order;
            colony.food_since_princess_order = record.food_since_princess_order;
            colony.spawn_queue = SpawnQueue::from_orders(record.spawn_orders);
            if let Some(targets) = record.caste_targets {
                colony.set_caste_targets(targets);
            }
            colony.larvae_matured = record.larvae_matured;
            colony.queenless = record.queenless;
            colony.deaths = record.deaths;
            sim.colonies[c] = colony;
        }

        let capacity = sim.tuning.energy_capacity;
        let mut map: SlotMap<_, Ant> = SlotMap::with_key();
        let mut max_id = 0;
        for record in ants {
            let ant = record.into_ant(capacity);
            max_id = max_id.max(ant.id);
            sim.colonies[ant.colony_id as usize].add_caste(ant.caste());
            map.insert(ant);
        }
        sim.ants = map;
        sim.next_ant_id = next_ant_id.max(max_id + 1);

        let max_task = build_tasks.iter().map(|t| t.id + 1).max().unwrap_or(1);
        sim.build_queue = BuildQueue::from_parts(
            build_tasks
                .into_iter()
                .filter(|t| (t.colony_id as usize) < MAX_COLONIES)
                .collect(),
            next_build_task_id.max(max_task),
        );

        info!(
            ants = sim.ants.len(),
            width = sim.terrain.width,
            height = sim.terrain.height,
            "snapshot restored"
        );
        Ok(sim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::rooms::RoomType;

    fn small_sim() -> Simulation {
        let mut terrain = Terrain::filled(30, 20, CellType::Dirt, DirtType::Clay);
        for y in 0..3 {
            for x in 0..30 {
                terrain.set_cell(x, y, CellType::Air, None);
            }
        }
        terrain.place_food(3, 1, 9);
        let mut sim = Simulation::from_terrain(terrain, 11, Tuning::default());
        sim.spawn_colony(0, (15, 10));
        sim.populate_colony(0, 4, 1, 1, 1);
        sim
    }

    #[test]
    fn json_round_trip_keeps_grid_and_ants() {
        let sim = small_sim();
        let json = sim.snapshot().to_json().unwrap();
        let restored = Simulation::restore(Snapshot::from_json(&json).unwrap()).unwrap();

        assert_eq!(restored.terrain().cell_type, sim.terrain().cell_type);
        assert_eq!(restored.terrain().dirt_type, sim.terrain().dirt_type);
        assert_eq!(restored.ant_count(), sim.ant_count());
        assert_eq!(restored.colony(0).unwrap().population(), 8);
        assert!(restored.terrain().home_room(0).is_some());
        assert_eq!(restored.terrain().food_amount_at(3, 1), 9);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let json = r#"{"width":4,"height":2,"cell_type":[0,1,1,9,0,0,0,0],
            "ants":[{"id":5,"caste":42,"pos":[1.5,0.5]}]}"#;
        let sim = Simulation::restore(Snapshot::from_json(json).unwrap()).unwrap();
        assert_eq!(sim.terrain().cell_type_at(3, 0), Some(CellType::Rock));
        // Dirt without stored health collapses to air rather than staying unbreakable.
        assert_eq!(sim.terrain().cell_type_at(1, 0), Some(CellType::Air));
        let (_, ant) = sim.ant_by_id(5).unwrap();
        assert_eq!(ant.caste(), Caste::Builder);
        assert_eq!(sim.colony(0).unwrap().count(Caste::Builder), 1);
        assert_eq!(sim.terrain().inconsistent_cells(), 0);
    }

    #[test]
    fn wrong_layer_size_is_rejected() {
        let mut snapshot = small_sim().snapshot();
        snapshot.cell_type.pop();
        assert!(matches!(
            Simulation::restore(snapshot),
            Err(SnapshotError::Dimensions { layer: "cell_type", .. })
        ));
    }

    #[test]
    fn binary_round_trip_restores_rng() {
        let mut sim = small_sim();
        let home = sim.terrain().room_of_type(0, RoomType::Home).map(|r| r.id);
        assert!(home.is_some());
        let bytes = sim.snapshot().to_bytes().unwrap();
        let mut restored = Simulation::restore(Snapshot::from_bytes(&bytes).unwrap()).unwrap();
        assert_eq!(restored.terrain().room_of_type(0, RoomType::Home).map(|r| r.id), home);

        use rand::Rng;
        let a: u32 = sim.rng.gen_range(0..u32::MAX);
        let b: u32 = restored.rng.gen_range(0..u32::MAX);
        assert_eq!(a, b);
    }

    #[test]
    fn room_ids_keep_counting_after_restore() {
        let sim = small_sim();
        let restored = Simulation::restore(sim.snapshot()).unwrap();
        let mut terrain = restored.terrain().clone();
        let existing: Vec<u32> = terrain.rooms().iter().map(|r| r.id).collect();
        let max_existing = existing.iter().copied().max().unwrap();

        let first = terrain
            .add_room(Room::new(RoomType::Nursery, 0, (4, 12), 2.0))
            .unwrap();
        let second = terrain
            .add_room(Room::new(RoomType::Barracks, 0, (25, 14), 2.0))
            .unwrap();
        assert!(first > max_existing);
        assert!(second > first);
        assert!(!existing.contains(&first));
    }

    #[test]
    fn combat_stats_survive_json_round_trip() {
        let mut sim = small_sim();
        let key = sim
            .ants()
            .find(|(_, a)| a.caste() == Caste::Soldier)
            .map(|(k, _)| k)
            .unwrap();
        {
            let ant = sim.ant_mut(key).unwrap();
            ant.aggression = 1.0;
            ant.attack = 12.5;
            ant.defense = 0.5;
        }
        let id = sim.ant(key).unwrap().id;

        let json = sim.snapshot().to_json().unwrap();
        let restored = Simulation::restore(Snapshot::from_json(&json).unwrap()).unwrap();
        let (_, ant) = restored.ant_by_id(id).unwrap();
        assert_eq!(ant.aggression, 1.0);
        assert_eq!(ant.attack, 12.5);
        assert_eq!(ant.defense, 0.5);
    }

    #[test]
    fn missing_or_bad_combat_stats_use_caste_defaults() {
        let json = r#"{"width":4,"height":2,"cell_type":[0,0,0,0,0,0,0,0],
            "ants":[{"id":1,"caste":1,"pos":[1.5,0.5]},
                    {"id":2,"caste":1,"pos":[2.5,0.5],"aggression":7.0,"attack":-3.0}]}"#;
        let sim = Simulation::restore(Snapshot::from_json(json).unwrap()).unwrap();
        let soldier = Caste::Soldier.stats();
        let (_, plain) = sim.ant_by_id(1).unwrap();
        assert_eq!(plain.aggression, soldier.aggression);
        assert_eq!(plain.attack, soldier.attack);
        assert_eq!(plain.defense, soldier.defense);
        let (_, clamped) = sim.ant_by_id(2).unwrap();
        assert_eq!(clamped.aggression, 1.0);
        assert_eq!(clamped.attack, 0.0);
    }
}
