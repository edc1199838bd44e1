use macroquad::math::Vec2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use shared::{DeathKind, HiveDirective, NatureEventKind, SimEvent, fast_sin_cos};
use slotmap::SlotMap;
use std::collections::HashMap;
use std::f32::consts::TAU;
use tracing::{debug, info, warn};

use super::ant::{Ant, AntContext, AntKey, Caste, Neighbors};
use super::calendar::{Calendar, RAINSTORM_DECAY};
use super::castes::{BuilderState, BuilderTask, NurseState, NurseTask, Role};
use super::cell::CellType;
use super::collaborators::{EventSink, NoProgression, NullSink, Progression};
use super::colony::{ColonyState, DefenseAlert, SpawnKind};
use super::combat::{self, CombatReport};
use super::intent::Intent;
use super::rooms::{BuildKind, BuildQueue, Room, RoomType};
use super::spatial::SpatialHash;
use super::terrain::Terrain;
use super::timer::Timer;
use super::worldgen;
use super::*;
use crate::config::{SimulationConfig, Tuning};

/// Why an ant was removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeathCause {
    Combat { killer: u8 },
    Starvation,
    OldAge,
}

impl DeathCause {
    pub fn kind(self) -> DeathKind {
        match self {
            DeathCause::Combat { .. } => DeathKind::Combat,
            DeathCause::Starvation => DeathKind::Starvation,
            DeathCause::OldAge => DeathKind::OldAge,
        }
    }

    /// Cause of a death that did not come from a fight: ants past their
    /// lifespan die of age, anything else at zero health starved.
    fn natural(ant: &Ant) -> Self {
        if ant.age > ant.stats().lifespan {
            DeathCause::OldAge
        } else {
            DeathCause::Starvation
        }
    }
}

/// The orchestrator: owns the terrain and every ant and advances them in
/// fixed steps.
pub struct Simulation {
    pub(crate) terrain: Terrain,
    pub(crate) ants: SlotMap<AntKey, Ant>,
    pub(crate) colonies: Vec<ColonyState>,
    pub(crate) build_queue: BuildQueue,
    pub(crate) calendar: Calendar,
    pub(crate) tuning: Tuning,
    pub(crate) rng: ChaCha8Rng,
    pub(crate) seed: u64,
    pub(crate) tick_count: u64,
    pub(crate) elapsed: f64,
    pub(crate) next_ant_id: u64,
    pub(crate) speed_multiplier: f32,
    pub(crate) decay_timer: Timer,
    pub(crate) scent_timer: Timer,
    pub(crate) food_timer: Timer,
    pub paused: bool,
    spatial: SpatialHash,
    intents: Vec<Intent>,
    events: Box<dyn EventSink>,
    progression: Box<dyn Progression>,
}

fn report_progression(result: anyhow::Result<()>, hook: &str) {
    if let Err(err) = result {
        warn!(hook, error = %err, "progression hook failed");
    }
}

impl Simulation {
    /// Generates a world from `config` and populates every configured colony.
    pub fn new(
        config: &SimulationConfig,
        events: Box<dyn EventSink>,
        progression: Box<dyn Progression>,
    ) -> Self {
        let config = config.clone().sanitized();
        let terrain = worldgen::generate(&config);
        let mut sim = Self::from_terrain(terrain, config.seed, config.tuning);
        sim.events = events;
        sim.progression = progression;

        for (colony, site) in worldgen::nest_sites(&config).into_iter().enumerate() {
            let colony = colony as u8;
            if sim.spawn_colony(colony, site) {
                sim.populate_colony(
                    colony,
                    config.initial_workers,
                    config.initial_soldiers,
                    config.initial_nurses,
                    config.initial_builders,
                );
            }
        }
        let cells = worldgen::scatter_food(&mut sim.terrain, config.initial_food_clusters, &mut sim.rng);
        sim.terrain.diffuse_food_scent();
        info!(
            width = config.width,
            height = config.height,
            seed = config.seed,
            colonies = config.colonies,
            food_cells = cells,
            "simulation created"
        );
        sim
    }

    /// A generated world with no outside collaborators.
    pub fn headless(config: &SimulationConfig) -> Self {
        Self::new(config, Box::new(NullSink), Box::new(NoProgression))
    }

    /// An empty simulation over an existing terrain. No colonies are spawned.
    pub fn from_terrain(terrain: Terrain, seed: u64, tuning: Tuning) -> Self {
        let spatial = SpatialHash::new(terrain.width as f32, terrain.height as f32, 2.0);
        Self {
            terrain,
            ants: SlotMap::with_key(),
            colonies: (0..MAX_COLONIES as u8).map(ColonyState::new).collect(),
            build_queue: BuildQueue::new(),
            calendar: Calendar::default(),
            tuning: tuning.sanitized(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
            tick_count: 0,
            elapsed: 0.0,
            next_ant_id: 1,
            speed_multiplier: 1.0,
            decay_timer: Timer::new(PHEROMONE_DECAY_INTERVAL, 0.0),
            scent_timer: Timer::new(SCENT_DIFFUSION_INTERVAL, 0.0),
            food_timer: Timer::new(FOOD_MAINTENANCE_INTERVAL, 0.0),
            paused: false,
            spatial,
            intents: Vec::new(),
            events: Box::new(NullSink),
            progression: Box::new(NoProgression),
        }
    }

    pub fn set_event_sink(&mut self, events: Box<dyn EventSink>) {
        self.events = events;
    }

    pub fn set_progression(&mut self, progression: Box<dyn Progression>) {
        self.progression = progression;
    }

    fn emit(&mut self, event: SimEvent) {
        self.events.emit(event);
    }

    // Accessors

    pub fn terrain(&self) -> &Terrain {
        &self.terrain
    }

    pub fn terrain_mut(&mut self) -> &mut Terrain {
        &mut self.terrain
    }

    pub fn ants(&self) -> impl Iterator<Item = (AntKey, &Ant)> {
        self.ants.iter()
    }

    pub fn ant(&self, key: AntKey) -> Option<&Ant> {
        self.ants.get(key)
    }

    pub fn ant_mut(&mut self, key: AntKey) -> Option<&mut Ant> {
        self.ants.get_mut(key)
    }

    pub fn ant_by_id(&self, id: u64) -> Option<(AntKey, &Ant)> {
        self.ants.iter().find(|(_, a)| a.id == id)
    }

    pub fn ant_count(&self) -> usize {
        self.ants.len()
    }

    pub fn count_caste(&self, colony_id: u8, caste: Caste) -> usize {
        self.ants
            .values()
            .filter(|a| a.colony_id == colony_id && a.caste() == caste)
            .count()
    }

    pub fn colony(&self, id: u8) -> Option<&ColonyState> {
        self.colonies.get(id as usize)
    }

    pub fn colony_mut(&mut self, id: u8) -> Option<&mut ColonyState> {
        self.colonies.get_mut(id as usize)
    }

    pub fn colonies(&self) -> &[ColonyState] {
        &self.colonies
    }

    pub fn build_queue(&self) -> &BuildQueue {
        &self.build_queue
    }

    pub fn calendar(&self) -> &Calendar {
        &self.calendar
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    pub fn set_tuning(&mut self, tuning: Tuning) {
        self.tuning = tuning.sanitized();
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn speed_multiplier(&self) -> f32 {
        self.speed_multiplier
    }

    pub fn set_speed_multiplier(&mut self, multiplier: f32) {
        self.speed_multiplier = if multiplier.is_finite() {
            multiplier.clamp(MIN_SPEED_MULTIPLIER, MAX_SPEED_MULTIPLIER)
        } else {
            1.0
        };
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    // Spawning

    /// Brings a colony to life at `site`: carves the nest if needed and
    /// spawns its queen. Fails for an invalid id or a colony already alive.
    pub fn spawn_colony(&mut self, colony_id: u8, site: (i32, i32)) -> bool {
        let c = colony_id as usize;
        if c >= MAX_COLONIES || self.colonies[c].alive || !self.terrain.in_bounds(site.0, site.1) {
            return false;
        }
        if self.terrain.home_room(colony_id).is_none()
            && worldgen::carve_nest(&mut self.terrain, colony_id, site).is_none()
        {
            // Nest without a chamber: clear the cell so the queen can stand.
            self.terrain.set_cell(site.0, site.1, CellType::Air, None);
            self.terrain.set_nest(colony_id, site.0, site.1);
        }
        let nest = self.terrain.nest(colony_id).unwrap_or(site);

        let mut colony = ColonyState::new(colony_id);
        colony.alive = true;
        colony.nest = Some(nest);
        self.colonies[c] = colony;

        self.spawn_ant(Caste::Queen, colony_id, Terrain::cell_center(nest.0, nest.1));
        info!(colony_id, x = nest.0, y = nest.1, "colony spawned");
        true
    }

    /// Spawns the starting adults of a colony around its nest.
    pub fn populate_colony(
        &mut self,
        colony_id: u8,
        workers: u32,
        soldiers: u32,
        nurses: u32,
        builders: u32,
    ) -> u32 {
        let Some(nest) = self.colony(colony_id).and_then(ColonyState::nest_pos) else {
            return 0;
        };
        let plan = [
            (Caste::Worker, workers),
            (Caste::Soldier, soldiers),
            (Caste::Nurse, nurses),
            (Caste::Builder, builders),
        ];
        let mut spawned = 0;
        for (caste, count) in plan {
            for _ in 0..count {
                let pos = self.spot_near(nest, 1.5);
                if self.spawn_ant(caste, colony_id, pos).is_some() {
                    spawned += 1;
                }
            }
        }
        spawned
    }

    /// A random open position within `spread` of `center`, or `center` itself.
    fn spot_near(&mut self, center: Vec2, spread: f32) -> Vec2 {
        let offset = Vec2::new(
            self.rng.gen_range(-spread..=spread),
            self.rng.gen_range(-spread..=spread),
        );
        let candidate = center + offset;
        let (x, y) = Terrain::cell_of(candidate);
        if self.terrain.is_walkable(x, y) { candidate } else { center }
    }

    /// Creates one ant. Returns `None` for an invalid or full colony.
    pub fn spawn_ant(&mut self, caste: Caste, colony_id: u8, pos: Vec2) -> Option<AntKey> {
        let colony = self.colonies.get(colony_id as usize)?;
        if colony.population() >= MAX_ANTS_PER_COLONY || !pos.is_finite() {
            return None;
        }
        let id = self.next_ant_id;
        self.next_ant_id += 1;

        let heading = Ant::random_heading(&mut self.rng);
        let mut ant = Ant::new(id, caste, colony_id, pos, heading, self.tuning.energy_capacity);
        ant.explorer = if self.rng.gen_bool(shared::clamp01(self.tuning.explorer_ratio) as f64) {
            self.rng.gen_range(0.6f32..=1.0)
        } else {
            self.rng.gen_range(0.0f32..=0.2)
        };
        if caste == Caste::Soldier {
            ant.reset_patrol(self.rng.gen_range(0.0..TAU));
        }
        let key = self.ants.insert(ant);
        self.colonies[colony_id as usize].add_caste(caste);
        self.emit(SimEvent::AntBorn {
            colony_id,
            ant_id: id,
            caste: caste.name().to_string(),
        });
        Some(key)
    }

    // Death and succession

    /// Removes an ant and keeps colony bookkeeping in step. Losing a queen
    /// triggers succession.
    pub fn kill_ant(&mut self, key: AntKey, cause: DeathCause) -> bool {
        let Some(ant) = self.ants.remove(key) else {
            return false;
        };
        let caste = ant.caste();
        if let Some(colony) = self.colonies.get_mut(ant.colony_id as usize) {
            colony.remove_caste(caste);
            colony.record_death(cause.kind());
        }
        debug!(ant_id = ant.id, colony_id = ant.colony_id, caste = caste.name(), ?cause, "ant died");
        self.emit(SimEvent::AntDied {
            colony_id: ant.colony_id,
            ant_id: ant.id,
            caste: caste.name().to_string(),
            cause: cause.kind(),
        });
        if caste == Caste::Queen {
            self.handle_queen_loss(ant.colony_id, cause);
        }
        true
    }

    /// The single succession policy for every queen death: the oldest
    /// princess takes over; failing that the killing colony conquers this
    /// one; failing that the colony goes queenless until a larva matures.
    fn handle_queen_loss(&mut self, colony_id: u8, cause: DeathCause) {
        let c = colony_id as usize;
        if c >= MAX_COLONIES || !self.colonies[c].alive {
            return;
        }
        if self.count_caste(colony_id, Caste::Queen) > 0 {
            return;
        }

        let heir = self
            .ants
            .iter()
            .filter(|(_, a)| a.colony_id == colony_id && a.caste() == Caste::Princess)
            .max_by(|(_, a), (_, b)| a.age.total_cmp(&b.age).then(b.id.cmp(&a.id)))
            .map(|(k, _)| k);
        if let Some(heir) = heir {
            self.promote_to_queen(heir);
            return;
        }

        if let DeathCause::Combat { killer } = cause {
            let k = killer as usize;
            if killer != colony_id && k < MAX_COLONIES && self.colonies[k].alive {
                self.takeover(killer, colony_id);
                return;
            }
        }

        self.colonies[c].queenless = true;
        warn!(colony_id, "queen lost with no heir, colony is queenless");
    }

    /// Turns a princess into her colony's queen.
    pub fn promote_to_queen(&mut self, key: AntKey) -> bool {
        let Some(ant) = self.ants.get_mut(key) else {
            return false;
        };
        if ant.caste() != Caste::Princess {
            return false;
        }
        ant.change_caste(Caste::Queen);
        ant.hp = ant.max_hp;
        let (colony_id, id) = (ant.colony_id, ant.id);
        if let Some(colony) = self.colonies.get_mut(colony_id as usize) {
            colony.remove_caste(Caste::Princess);
            colony.add_caste(Caste::Queen);
            colony.queenless = false;
        }
        info!(colony_id, ant_id = id, "princess promoted to queen");
        self.emit(SimEvent::QueenSucceeded {
            colony_id,
            new_queen_id: id,
        });
        true
    }

    /// Hands every ant, the food stock and the spawn queue of `loser` to
    /// `winner`, then dissolves the loser's nest. Returns how many ants
    /// changed sides.
    pub fn takeover(&mut self, winner: u8, loser: u8) -> u32 {
        let (w, l) = (winner as usize, loser as usize);
        if w == l || w >= MAX_COLONIES || l >= MAX_COLONIES {
            return 0;
        }
        let mut converted = 0;
        for ant in self.ants.values_mut().filter(|a| a.colony_id == loser) {
            ant.colony_id = winner;
            match &mut ant.role {
                Role::Builder(builder) => *builder = BuilderState::default(),
                Role::Nurse(nurse) => *nurse = NurseState::default(),
                _ => {}
            }
            converted += 1;
        }

        let mut defeated = std::mem::replace(&mut self.colonies[l], ColonyState::new(loser));
        self.colonies[w].absorb(&mut defeated);
        self.terrain.remove_rooms_of(loser);
        self.terrain.clear_nest(loser);
        let dropped = self.build_queue.drop_colony(loser);

        info!(winner, loser, converted, dropped_tasks = dropped, "colony taken over");
        self.emit(SimEvent::ColonyConquered {
            winner,
            loser,
            ants_converted: converted,
        });
        converted
    }

    // Tick

    /// Advances by `dt` seconds scaled by the speed multiplier, split into
    /// fixed sub-steps of at most `MAX_TICK_DT`.
    pub fn update(&mut self, dt: f32) {
        if self.paused || !dt.is_finite() || dt <= 0.0 {
            return;
        }
        let mut remaining = dt * self.speed_multiplier;
        let mut steps = 0;
        while remaining > 1e-6 && steps < MAX_SUBSTEPS {
            let step = remaining.min(MAX_TICK_DT);
            self.tick(step);
            remaining -= step;
            steps += 1;
        }
    }

    /// One fixed step. `dt` is clamped to `MAX_TICK_DT`.
    pub fn tick(&mut self, dt: f32) {
        let dt = if dt.is_finite() { dt.min(MAX_TICK_DT) } else { 0.0 };
        if dt <= 0.0 {
            return;
        }
        self.tick_count += 1;
        self.elapsed += dt as f64;

        self.decay_timer.update(dt);
        if self.decay_timer.is_ready() {
            self.decay_timer.wrap();
            self.terrain
                .decay(self.tuning.pheromone_decay, PHEROMONE_THRESHOLD);
        }
        self.scent_timer.update(dt);
        if self.scent_timer.is_ready() {
            self.scent_timer.wrap();
            self.terrain.diffuse_food_scent();
        }

        self.advance_calendar(dt);
        self.decay_defense_alerts(dt);

        self.update_ants(dt);
        self.flush_intents();
        self.sweep_dead();

        let t = self.tick_count;
        if t % SEPARATION_EVERY == 0 {
            self.separation_pass();
        }
        if t % COMBAT_EVERY == 0 {
            self.combat_pass();
        }
        if t % BUILD_QUEUE_EVERY == 0 {
            self.build_queue_pass();
        }
        if t % MANAGEMENT_EVERY == 0 {
            self.management_pass();
        }
        if t % CULLING_EVERY == 0 {
            self.culling_pass();
        }

        self.food_timer.update(dt);
        if self.food_timer.is_ready() {
            self.food_timer.wrap();
            self.food_maintenance();
        }
    }

    fn advance_calendar(&mut self, dt: f32) {
        let change = self.calendar.advance(dt);
        if let Some(day) = change.new_day {
            self.emit(SimEvent::DayAdvanced { day });
            report_progression(self.progression.day_advanced(day), "day_advanced");
        }
        if let Some(season) = change.new_season {
            info!(?season, "season changed");
            self.emit(SimEvent::SeasonChanged { season });
        }
        if change.new_day.is_some() {
            if let Some(kind) = self.calendar.roll_nature_event(&mut self.rng) {
                self.apply_nature_event(kind);
            }
        }
    }

    /// Applies a nature event immediately.
    pub fn apply_nature_event(&mut self, kind: NatureEventKind) {
        let (x, y) = match kind {
            NatureEventKind::Rainstorm => {
                self.terrain.decay(RAINSTORM_DECAY, PHEROMONE_THRESHOLD);
                (self.terrain.width / 2, self.terrain.height / 2)
            }
            NatureEventKind::FoodBloom => {
                let Some(site) = worldgen::random_food_site(&self.terrain, &mut self.rng) else {
                    return;
                };
                self.terrain
                    .spawn_food_cluster(site, FOOD_CLUSTER_RADIUS + 1, DEFAULT_FOOD_PER_CELL);
                (site.0 as u32, site.1 as u32)
            }
        };
        info!(?kind, x, y, "nature event");
        self.emit(SimEvent::NatureEvent { kind, x, y });
    }

    fn decay_defense_alerts(&mut self, dt: f32) {
        for colony in &mut self.colonies {
            if let Some(alert) = &mut colony.defense {
                alert.remaining -= dt;
                if alert.remaining <= 0.0 {
                    colony.defense = None;
                }
            }
        }
    }

    fn update_ants(&mut self, dt: f32) {
        let neighbors = Neighbors::new(self.ants.iter().map(|(k, a)| a.summary(k)).collect());
        let mut intents = std::mem::take(&mut self.intents);
        intents.clear();
        {
            let mut ctx = AntContext {
                terrain: &mut self.terrain,
                colonies: &self.colonies,
                neighbors: &neighbors,
                tuning: &self.tuning,
                rng: &mut self.rng,
                dt,
            };
            for summary in neighbors.iter() {
                if let Some(ant) = self.ants.get_mut(summary.key) {
                    ant.update(summary.key, &mut ctx, &mut intents);
                }
            }
        }
        self.intents = intents;
        self.sync_carried_eggs();
    }

    /// Keeps carried eggs on top of their nurse and drops eggs whose nurse is gone.
    fn sync_carried_eggs(&mut self) {
        let carriers: HashMap<u64, Vec2> = self
            .ants
            .values()
            .filter(|a| {
                matches!(
                    a.role,
                    Role::Nurse(NurseState { task: NurseTask::CarryEgg { .. }, .. })
                )
            })
            .map(|a| (a.id, a.pos))
            .collect();
        for ant in self.ants.values_mut() {
            if let Some(carrier) = ant.carried_by {
                match carriers.get(&carrier) {
                    Some(&pos) => ant.pos = pos,
                    None => ant.carried_by = None,
                }
            }
        }
    }

    fn flush_intents(&mut self) {
        if self.intents.is_empty() {
            return;
        }
        let intents = std::mem::take(&mut self.intents);
        let ids: HashMap<u64, AntKey> = self.ants.iter().map(|(k, a)| (a.id, k)).collect();
        for intent in &intents {
            self.apply_intent(intent, &ids);
        }
        self.intents = intents;
        self.intents.clear();
    }

    fn apply_intent(&mut self, intent: &Intent, ids: &HashMap<u64, AntKey>) {
        match *intent {
            Intent::LayEgg { queen } => self.lay_egg(queen),
            Intent::Hatch { egg } => self.hatch(egg),
            Intent::Mature { larva } => self.mature(larva),
            Intent::PickUpEgg { nurse, egg } => {
                let Some(nurse_ant) = self.ants.get(nurse) else {
                    return;
                };
                let (nurse_id, colony) = (nurse_ant.id, nurse_ant.colony_id);
                let picked = ids
                    .get(&egg)
                    .and_then(|&k| self.ants.get_mut(k))
                    .filter(|e| {
                        e.caste() == Caste::Egg && e.carried_by.is_none() && e.colony_id == colony
                    })
                    .map(|e| e.carried_by = Some(nurse_id))
                    .is_some();
                if !picked {
                    if let Some(Role::Nurse(state)) = self.ants.get_mut(nurse).map(|a| &mut a.role) {
                        state.task = NurseTask::Idle;
                    }
                }
            }
            Intent::DropEgg { nurse, egg } => {
                let Some((nurse_id, pos)) = self.ants.get(nurse).map(|a| (a.id, a.pos)) else {
                    return;
                };
                if let Some(egg) = ids.get(&egg).and_then(|&k| self.ants.get_mut(k)) {
                    if egg.carried_by == Some(nurse_id) {
                        egg.carried_by = None;
                        egg.pos = pos;
                    }
                }
            }
            Intent::DeliverFood { ant, amount } => {
                let Some(colony_id) = self.ants.get(ant).map(|a| a.colony_id) else {
                    return;
                };
                let Some(colony) = self.colonies.get_mut(colony_id as usize) else {
                    return;
                };
                colony.record_food_delivery(amount);
                self.emit(SimEvent::FoodCollected { colony_id, amount });
                report_progression(
                    self.progression.food_collected(colony_id, amount),
                    "food_collected",
                );
            }
            Intent::FeedAnt { nurse, target } => {
                let Some(colony_id) = self.ants.get(nurse).map(|a| a.colony_id) else {
                    return;
                };
                let Some(&target_key) = ids.get(&target) else {
                    return;
                };
                let colony = &mut self.colonies[colony_id as usize];
                if colony.food_stock == 0 {
                    return;
                }
                let capacity = self.tuning.energy_capacity;
                if let Some(target) = self.ants.get_mut(target_key) {
                    colony.food_stock -= 1;
                    target.energy = (target.energy + FEED_ENERGY).min(capacity);
                    target.heal(FEED_HEAL);
                    if let Some(brood) = target.role.brood_mut() {
                        brood.fed = true;
                    }
                }
            }
            Intent::BuildComplete { task_id, .. } => self.complete_build_task(task_id),
        }
    }

    fn lay_egg(&mut self, queen: AntKey) {
        let Some((colony_id, pos)) = self
            .ants
            .get(queen)
            .filter(|q| !q.is_dead() && q.caste() == Caste::Queen)
            .map(|q| (q.colony_id, q.pos))
        else {
            return;
        };
        let colony = &mut self.colonies[colony_id as usize];
        if !colony.alive || colony.population() >= MAX_ANTS_PER_COLONY {
            return;
        }
        let destined_princess = match colony.spawn_queue.pop() {
            Some(order) => {
                colony.food_stock = colony.food_stock.saturating_sub(EGG_FOOD_COST);
                order.kind == SpawnKind::Princess
            }
            None if colony.food_stock >= EGG_FOOD_COST => {
                colony.food_stock -= EGG_FOOD_COST;
                false
            }
            None => return,
        };
        let spot = self.spot_near(pos, 1.0);
        if let Some(key) = self.spawn_ant(Caste::Egg, colony_id, spot) {
            if let Some(brood) = self.ants.get_mut(key).and_then(|a| a.role.brood_mut()) {
                brood.destined_princess = destined_princess;
            }
        }
    }

    fn hatch(&mut self, key: AntKey) {
        let Some(egg) = self.ants.get_mut(key) else {
            return;
        };
        let Role::Egg(brood) = egg.role else {
            return;
        };
        egg.change_caste(Caste::Larva);
        egg.carried_by = None;
        if let Some(larva) = egg.role.brood_mut() {
            larva.destined_princess = brood.destined_princess;
        }
        let colony_id = egg.colony_id as usize;
        self.colonies[colony_id].remove_caste(Caste::Egg);
        self.colonies[colony_id].add_caste(Caste::Larva);
    }

    fn mature(&mut self, key: AntKey) {
        let Some(larva) = self.ants.get(key) else {
            return;
        };
        let Role::Larva(brood) = larva.role else {
            return;
        };
        let colony_id = larva.colony_id;
        let colony = &mut self.colonies[colony_id as usize];
        let caste = colony.choose_maturation_caste(brood.destined_princess);
        let promote = caste == Caste::Princess && colony.queenless;
        colony.remove_caste(Caste::Larva);
        colony.add_caste(caste);

        let capacity = self.tuning.energy_capacity;
        let patrol = self.rng.gen_range(0.0..TAU);
        if let Some(ant) = self.ants.get_mut(key) {
            ant.change_caste(caste);
            ant.hp = ant.max_hp;
            ant.energy = capacity;
            ant.age = 0.0;
            ant.reset_patrol(patrol);
        }
        debug!(colony_id, caste = caste.name(), "larva matured");
        if promote {
            self.promote_to_queen(key);
        }
    }

    fn complete_build_task(&mut self, task_id: u64) {
        let Some(task) = self.build_queue.remove(task_id) else {
            return;
        };
        let BuildKind::Room(room_type) = task.kind else {
            debug!(task_id, colony_id = task.colony_id, kind = ?task.kind, "build task finished");
            return;
        };
        let room = Room::new(room_type, task.colony_id, task.target, task.radius);
        match self.terrain.add_room(room) {
            Some(room_id) => {
                info!(room_id, colony_id = task.colony_id, ?room_type, "room built");
                self.emit(SimEvent::RoomBuilt {
                    colony_id: task.colony_id,
                    room_id,
                    kind: room_type.kind(),
                });
            }
            None => debug!(task_id, "finished room no longer fits, dropped"),
        }
    }

    fn sweep_dead(&mut self) {
        let dead: Vec<(AntKey, DeathCause)> = self
            .ants
            .iter()
            .filter(|(_, a)| a.is_dead())
            .map(|(k, a)| (k, DeathCause::natural(a)))
            .collect();
        for (key, cause) in dead {
            self.kill_ant(key, cause);
        }
    }

    // Staggered passes

    /// Pushes overlapping ants apart. Nestmates phase through each other once
    /// either has been stuck for a while.
    pub fn separation_pass(&mut self) {
        self.spatial.rebuild(
            self.ants
                .iter()
                .filter(|(_, a)| a.carried_by.is_none() && !a.caste().is_brood())
                .map(|(k, a)| (k, a.pos)),
        );
        let mut pushes: Vec<(AntKey, Vec2)> = Vec::new();
        let mut nearby = Vec::new();
        for (key, ant) in self.ants.iter() {
            if ant.carried_by.is_some() || ant.caste().is_brood() {
                continue;
            }
            nearby.clear();
            self.spatial
                .query_radius(ant.pos, SEPARATION_RADIUS, &mut nearby);
            let mut push = Vec2::ZERO;
            for &other_key in &nearby {
                if other_key == key {
                    continue;
                }
                let Some(other) = self.ants.get(other_key) else {
                    continue;
                };
                if other.colony_id == ant.colony_id
                    && (ant.stuck_time > STUCK_PHASE_TIME || other.stuck_time > STUCK_PHASE_TIME)
                {
                    continue;
                }
                let delta = ant.pos - other.pos;
                let dist = delta.length();
                let dir = if dist > 1e-4 {
                    delta / dist
                } else {
                    let (s, c) = fast_sin_cos((ant.id % 8) as f32 * TAU / 8.0);
                    Vec2::new(c, s)
                };
                push += dir * (SEPARATION_RADIUS - dist).max(0.0) * 0.5;
            }
            if push != Vec2::ZERO {
                pushes.push((key, push));
            }
        }
        for (key, push) in pushes {
            if let Some(ant) = self.ants.get_mut(key) {
                let target = ant.pos + push;
                let (x, y) = Terrain::cell_of(target);
                if self.terrain.is_walkable(x, y) {
                    ant.pos = target;
                }
            }
        }
    }

    /// Resolves fights and removes the fallen.
    pub fn combat_pass(&mut self) -> CombatReport {
        let report = combat::resolve_combat(&mut self.ants, &mut self.spatial, &mut self.rng);
        for &(key, killer) in &report.casualties {
            self.kill_ant(key, DeathCause::Combat { killer });
        }
        if report.exchanges > 0 {
            report_progression(
                self.progression
                    .combat_resolved(report.exchanges, report.casualties.len() as u32),
                "combat_resolved",
            );
        }
        report
    }

    /// Room occupancy, automatic room scheduling and builder assignment.
    pub fn build_queue_pass(&mut self) {
        self.update_room_occupancy();
        self.schedule_nurseries();
        self.assign_builders();
    }

    fn update_room_occupancy(&mut self) {
        let mut expansions = Vec::new();
        let ants = &self.ants;
        for room in self.terrain.rooms_mut() {
            room.occupancy = ants
                .values()
                .filter(|a| a.colony_id == room.colony_id && room.contains(a.pos))
                .count() as u32;
            let was_over = room.over_capacity;
            room.over_capacity = room.occupancy > room.capacity;
            if room.over_capacity && !was_over {
                expansions.push((room.colony_id, room.id, room.room_type));
            }
        }
        for (colony_id, room_id, room_type) in expansions {
            if room_type == RoomType::Home
                || !self.colonies[colony_id as usize].alive
                || self
                    .build_queue
                    .has_pending(colony_id, BuildKind::Room(room_type))
            {
                continue;
            }
            let radius = room_type.default_radius();
            if let Some(site) = self.terrain.find_new_room_location(colony_id, room_id, radius) {
                self.build_queue
                    .push(colony_id, BuildKind::Room(room_type), site, radius, Vec::new());
                debug!(colony_id, ?room_type, "over-capacity room scheduled an expansion");
            }
        }
    }

    fn schedule_nurseries(&mut self) {
        for colony_id in 0..MAX_COLONIES as u8 {
            let colony = &self.colonies[colony_id as usize];
            if !colony.alive
                || colony.count(Caste::Builder) == 0
                || self.terrain.room_of_type(colony_id, RoomType::Nursery).is_some()
                || self
                    .build_queue
                    .has_pending(colony_id, BuildKind::Room(RoomType::Nursery))
            {
                continue;
            }
            let Some(home) = self.terrain.home_room(colony_id).map(|r| r.id) else {
                continue;
            };
            let radius = RoomType::Nursery.default_radius();
            if let Some(site) = self.terrain.find_new_room_location(colony_id, home, radius) {
                self.build_queue.push(
                    colony_id,
                    BuildKind::Room(RoomType::Nursery),
                    site,
                    radius,
                    Vec::new(),
                );
            }
        }
    }

    fn assign_builders(&mut self) {
        let ids: HashMap<u64, AntKey> = self
            .ants
            .iter()
            .filter(|(_, a)| a.caste() == Caste::Builder)
            .map(|(k, a)| (a.id, k))
            .collect();
        let mut idle: Vec<AntKey> = self
            .ants
            .iter()
            .filter(|(_, a)| {
                matches!(&a.role, Role::Builder(b) if b.task == BuilderTask::Idle)
                    && !a.has_food
            })
            .map(|(k, _)| k)
            .collect();

        for task in self.build_queue.iter_mut() {
            if let Some(builder_id) = task.assigned {
                let still_working = ids
                    .get(&builder_id)
                    .and_then(|&k| self.ants.get(k))
                    .is_some_and(|a| {
                        a.colony_id == task.colony_id
                            && matches!(&a.role, Role::Builder(b) if b.task_id == Some(task.id))
                    });
                if still_working {
                    continue;
                }
                debug!(task_id = task.id, builder_id, "build task reassigned");
                task.assigned = None;
            }

            let Some(pos) = idle
                .iter()
                .position(|&k| self.ants.get(k).is_some_and(|a| a.colony_id == task.colony_id))
            else {
                continue;
            };
            let key = idle.remove(pos);
            let Some(builder) = self.ants.get_mut(key) else {
                continue;
            };
            let job = match task.kind {
                BuildKind::Room(_) => BuilderTask::BuildingRoom,
                BuildKind::Reinforce => BuilderTask::ReinforcingWall,
                BuildKind::EmergencyDefense => BuilderTask::EmergencyDefense,
                BuildKind::Blueprint => BuilderTask::ConstructingBlueprint,
            };
            let pending = task.work_cells(&self.terrain, builder.cell());
            builder.assign_build(job, task.id, pending);
            task.assigned = Some(builder.id);
        }
    }

    /// Queen food guidance and threat detection.
    pub fn management_pass(&mut self) {
        for colony_id in 0..MAX_COLONIES as u8 {
            let colony = &self.colonies[colony_id as usize];
            if !colony.alive {
                continue;
            }
            let Some(nest) = colony.nest else {
                continue;
            };
            if self.count_caste(colony_id, Caste::Queen) > 0 {
                self.lay_guidance_trail(colony_id, nest);
            }
            self.detect_threat(colony_id, nest);
        }
    }

    /// A short food trail from the nest toward the nearest food, strongest at
    /// the food end.
    fn lay_guidance_trail(&mut self, colony_id: u8, nest: (i32, i32)) {
        let Some(food) = self.terrain.nearest_food(nest, 4.0 * GUIDANCE_LENGTH as f32) else {
            return;
        };
        let from = Terrain::cell_center(nest.0, nest.1);
        let to = Terrain::cell_center(food.0, food.1);
        let delta = to - from;
        let len = delta.length();
        if len < 1.0 {
            return;
        }
        let dir = delta / len;
        let steps = (len as usize).min(GUIDANCE_LENGTH);
        for i in 1..=steps {
            let (x, y) = Terrain::cell_of(from + dir * i as f32);
            let strength = GUIDANCE_STRENGTH * i as f32 / steps as f32;
            self.terrain.deposit_food_pheromone(x, y, strength, colony_id);
        }
    }

    fn detect_threat(&mut self, colony_id: u8, nest: (i32, i32)) {
        let center = Terrain::cell_center(nest.0, nest.1);
        let radius_sq = DEFENSE_RADIUS * DEFENSE_RADIUS;
        let intruder = self
            .ants
            .values()
            .filter(|a| a.colony_id != colony_id && !a.caste().is_brood() && !a.is_dead())
            .map(|a| (a.id, a.pos, a.pos.distance_squared(center)))
            .filter(|&(_, _, d)| d <= radius_sq)
            .min_by(|a, b| a.2.total_cmp(&b.2));
        let Some((target_id, target_pos, _)) = intruder else {
            return;
        };

        let colony = &mut self.colonies[colony_id as usize];
        let fresh = colony.defense.is_none();
        colony.defense = Some(DefenseAlert {
            target_id,
            target_pos,
            remaining: DEFENSE_ALERT_DURATION,
        });
        if !fresh || self.build_queue.has_pending(colony_id, BuildKind::EmergencyDefense) {
            return;
        }
        let cells = self.wall_cells(center, target_pos - center, DEFENSE_WALL_DISTANCE);
        if !cells.is_empty() {
            let target = cells[cells.len() / 2];
            self.build_queue
                .push(colony_id, BuildKind::EmergencyDefense, target, 1.0, cells);
            info!(colony_id, intruder = target_id, "defense alert raised");
        }
    }

    /// Five cells across `direction`, `distance` away from `center`.
    fn wall_cells(&self, center: Vec2, direction: Vec2, distance: f32) -> Vec<(i32, i32)> {
        let Some(dir) = direction.try_normalize() else {
            return Vec::new();
        };
        let perp = Vec2::new(-dir.y, dir.x);
        let mid = center + dir * distance;
        let mut cells: Vec<(i32, i32)> = Vec::new();
        for t in -2..=2 {
            let cell = Terrain::cell_of(mid + perp * t as f32);
            if self.terrain.in_bounds(cell.0, cell.1) && !cells.contains(&cell) {
                cells.push(cell);
            }
        }
        cells
    }

    /// Old age deaths, rescue of long-stuck ants and dissolution of empty colonies.
    pub fn culling_pass(&mut self) {
        let old: Vec<AntKey> = self
            .ants
            .iter()
            .filter(|(_, a)| a.age > a.stats().lifespan)
            .map(|(k, _)| k)
            .collect();
        for key in old {
            self.kill_ant(key, DeathCause::OldAge);
        }

        let colonies = &self.colonies;
        for ant in self.ants.values_mut() {
            if ant.stuck_time <= STUCK_RESCUE_TIME {
                continue;
            }
            if let Some(nest) = colonies
                .get(ant.colony_id as usize)
                .and_then(ColonyState::nest_pos)
            {
                debug!(ant_id = ant.id, "stuck ant returned to nest");
                ant.pos = nest;
            }
            ant.stuck_time = 0.0;
            ant.consecutive_hits = 0;
        }

        for colony_id in 0..MAX_COLONIES as u8 {
            let c = colony_id as usize;
            if self.colonies[c].alive && self.colonies[c].population() == 0 {
                self.colonies[c] = ColonyState::new(colony_id);
                self.terrain.remove_rooms_of(colony_id);
                self.terrain.clear_nest(colony_id);
                self.build_queue.drop_colony(colony_id);
                info!(colony_id, "colony died out");
            }
        }
    }

    /// Keeps the world and every colony supplied with food.
    pub fn food_maintenance(&mut self) {
        if self.terrain.food_cell_count() == 0 {
            if let Some(site) = worldgen::random_food_site(&self.terrain, &mut self.rng) {
                let cells = self
                    .terrain
                    .spawn_food_cluster(site, FOOD_CLUSTER_RADIUS, DEFAULT_FOOD_PER_CELL);
                info!(x = site.0, y = site.1, cells, "map out of food, cluster spawned");
            }
        }

        for colony_id in 0..MAX_COLONIES as u8 {
            let colony = &self.colonies[colony_id as usize];
            let Some(nest) = colony.nest.filter(|_| colony.alive) else {
                continue;
            };
            if colony.food_stock >= CRITICAL_FOOD_STOCK
                || self.terrain.food_amount_near(nest, NEARBY_FOOD_RADIUS) >= LOW_NEARBY_FOOD
            {
                continue;
            }
            let start = self.rng.gen_range(0.0..TAU);
            for attempt in 0..8 {
                let (s, c) = fast_sin_cos(start + attempt as f32 * TAU / 8.0);
                let spot = Terrain::cell_center(nest.0, nest.1)
                    + Vec2::new(c, s) * EMERGENCY_FOOD_DISTANCE;
                let (x, y) = Terrain::cell_of(spot);
                if matches!(
                    self.terrain.cell_type_at(x, y),
                    Some(CellType::Air | CellType::Dirt)
                ) {
                    let cells = self.terrain.spawn_food_cluster(
                        (x, y),
                        FOOD_CLUSTER_RADIUS,
                        DEFAULT_FOOD_PER_CELL,
                    );
                    info!(colony_id, x, y, cells, "emergency food spawned");
                    break;
                }
            }
        }
    }

    // Directives

    /// Applies an advisory directive. Returns `false` when it cannot be acted on.
    pub fn apply_directive(&mut self, directive: HiveDirective) -> bool {
        let colony_id = directive.colony_id();
        let alive = self
            .colonies
            .get(colony_id as usize)
            .is_some_and(|c| c.alive);
        if !alive {
            debug!(colony_id, "directive for an unknown or dead colony ignored");
            return false;
        }
        match directive {
            HiveDirective::BuildRoom { kind, .. } => {
                let room_type = RoomType::from_kind(kind);
                if room_type == RoomType::Home {
                    return false;
                }
                let Some(home) = self.terrain.home_room(colony_id).map(|r| r.id) else {
                    return false;
                };
                let radius = room_type.default_radius();
                let Some(site) = self.terrain.find_new_room_location(colony_id, home, radius)
                else {
                    return false;
                };
                self.build_queue
                    .push(colony_id, BuildKind::Room(room_type), site, radius, Vec::new());
                true
            }
            HiveDirective::DigBlueprint { cells, .. } => {
                let cells: Vec<(i32, i32)> = cells
                    .into_iter()
                    .filter_map(|(x, y)| {
                        let (x, y) = (i32::try_from(x).ok()?, i32::try_from(y).ok()?);
                        self.terrain.in_bounds(x, y).then_some((x, y))
                    })
                    .collect();
                let Some(&target) = cells.first() else {
                    return false;
                };
                self.build_queue
                    .push(colony_id, BuildKind::Blueprint, target, 1.0, cells);
                true
            }
            HiveDirective::Reinforce { direction, .. } => {
                if !direction.is_finite() {
                    return false;
                }
                let Some(nest) = self.colonies[colony_id as usize].nest_pos() else {
                    return false;
                };
                let (s, c) = fast_sin_cos(direction);
                let cells = self.wall_cells(nest, Vec2::new(c, s), HOME_ROOM_RADIUS + 2.0);
                let Some(&target) = cells.get(cells.len() / 2) else {
                    return false;
                };
                self.build_queue
                    .push(colony_id, BuildKind::Reinforce, target, 1.0, cells);
                true
            }
            HiveDirective::SetCasteTargets { ratios, .. } => {
                self.colonies[colony_id as usize].set_caste_targets(ratios)
            }
        }
    }
}
