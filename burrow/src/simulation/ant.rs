use macroquad::math::Vec2;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use shared::{fast_sin_cos, wrap_angle};
use slotmap::new_key_type;
use std::collections::HashMap;
use std::f32::consts::{FRAC_PI_4, PI, TAU};

use super::castes::Role;
use super::cell::CellType;
use super::colony::ColonyState;
use super::intent::Intent;
use super::raycast::traverse_segment;
use super::terrain::Terrain;
use super::{
    BACK_OFF_CHANCE, DIG_DAMAGE_PER_SECOND, DIG_ENERGY_PER_SECOND, FOG_REVEAL_RADIUS,
    MAX_COLONIES, NEST_RADIUS, REST_THRESHOLD, SIGNAL_EPSILON, SLOWNESS_WITH_FOOD, STARVATION_DAMAGE,
    STEER_GAIN,
};
use crate::config::Tuning;

new_key_type! {
    /// Key for the ant slotmap.
    pub struct AntKey;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Caste {
    Worker,
    Soldier,
    Nurse,
    Drone,
    Princess,
    Queen,
    Larva,
    Egg,
    Builder,
}

/// Base numbers for a caste.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CasteStats {
    pub max_hp: f32,
    pub attack: f32,
    pub defense: f32,
    pub aggression: f32,
    pub speed: f32,
    /// Seconds of life before dying of old age.
    pub lifespan: f32,
    /// Fraction of energy capacity at which a resting ant wakes.
    pub wake_threshold: f32,
    /// Base probability of following a weaker sensor.
    pub mistake_rate: f32,
}

impl Caste {
    pub const COUNT: usize = 9;
    pub const ALL: [Caste; Caste::COUNT] = [
        Caste::Worker,
        Caste::Soldier,
        Caste::Nurse,
        Caste::Drone,
        Caste::Princess,
        Caste::Queen,
        Caste::Larva,
        Caste::Egg,
        Caste::Builder,
    ];

    pub fn from_index(index: u8) -> Self {
        Self::ALL[(index as usize).min(Self::COUNT - 1)]
    }

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Caste::Worker => "worker",
            Caste::Soldier => "soldier",
            Caste::Nurse => "nurse",
            Caste::Drone => "drone",
            Caste::Princess => "princess",
            Caste::Queen => "queen",
            Caste::Larva => "larva",
            Caste::Egg => "egg",
            Caste::Builder => "builder",
        }
    }

    pub fn is_brood(self) -> bool {
        matches!(self, Caste::Egg | Caste::Larva)
    }

    pub fn stats(self) -> CasteStats {
        let (max_hp, attack, defense, aggression, speed, lifespan, wake_threshold, mistake_rate) =
            match self {
                Caste::Worker => (20.0, 3.0, 1.0, 0.5, 3.0, 900.0, 0.8, 0.05),
                Caste::Soldier => (45.0, 8.0, 4.0, 0.95, 2.6, 1200.0, 0.6, 0.08),
                Caste::Nurse => (18.0, 2.0, 1.0, 0.2, 2.4, 900.0, 0.8, 0.1),
                Caste::Drone => (15.0, 1.0, 0.5, 0.1, 3.2, 400.0, 0.8, 0.2),
                Caste::Princess => (60.0, 4.0, 3.0, 0.4, 2.0, 3000.0, 0.7, 0.1),
                Caste::Queen => (150.0, 6.0, 6.0, 0.6, 0.8, 6000.0, 0.5, 0.0),
                Caste::Larva => (8.0, 0.0, 0.0, 0.0, 0.0, f32::INFINITY, 1.0, 0.0),
                Caste::Egg => (5.0, 0.0, 0.0, 0.0, 0.0, f32::INFINITY, 1.0, 0.0),
                Caste::Builder => (25.0, 3.0, 2.0, 0.4, 2.6, 1000.0, 0.7, 0.05),
            };
        CasteStats {
            max_hp,
            attack,
            defense,
            aggression,
            speed,
            lifespan,
            wake_threshold,
            mistake_rate,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AntState {
    #[default]
    Forage,
    ReturnHome,
    Rest,
}

impl AntState {
    pub const ALL: [AntState; 3] = [AntState::Forage, AntState::ReturnHome, AntState::Rest];

    pub fn from_index(index: u8) -> Self {
        Self::ALL[(index as usize).min(Self::ALL.len() - 1)]
    }

    pub fn index(self) -> u8 {
        self as u8
    }
}

/// Read-only view of an ant, captured before the update pass so ants can
/// look at each other without aliasing the collection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AntSummary {
    pub key: AntKey,
    pub id: u64,
    pub colony_id: u8,
    pub caste: Caste,
    pub pos: Vec2,
    pub hp: f32,
    pub max_hp: f32,
    pub energy: f32,
    pub state: AntState,
    pub carried_by: Option<u64>,
    pub larva_fed: bool,
}

impl AntSummary {
    /// Whether a nurse could have work with this ant: a loose egg, an unfed
    /// larva, or an adult that is resting or badly hurt.
    pub fn needs_care(&self) -> bool {
        match self.caste {
            Caste::Egg => self.carried_by.is_none(),
            Caste::Larva => !self.larva_fed,
            _ => self.state == AntState::Rest || self.hp < self.max_hp * 0.5,
        }
    }
}

/// Summaries of every ant, taken before an update pass, with an id index
/// and per-colony lists of ants that may need a nurse.
#[derive(Debug, Clone, Default)]
pub struct Neighbors {
    summaries: Vec<AntSummary>,
    by_id: HashMap<u64, usize>,
    needing_care: [Vec<usize>; MAX_COLONIES],
}

impl Neighbors {
    pub fn new(summaries: Vec<AntSummary>) -> Self {
        let mut by_id = HashMap::with_capacity(summaries.len());
        let mut needing_care: [Vec<usize>; MAX_COLONIES] = Default::default();
        for (i, s) in summaries.iter().enumerate() {
            by_id.insert(s.id, i);
            if s.needs_care() {
                if let Some(list) = needing_care.get_mut(s.colony_id as usize) {
                    list.push(i);
                }
            }
        }
        Self {
            summaries,
            by_id,
            needing_care,
        }
    }

    pub fn get(&self, id: u64) -> Option<&AntSummary> {
        self.by_id.get(&id).and_then(|&i| self.summaries.get(i))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AntSummary> {
        self.summaries.iter()
    }

    /// Ants of `colony_id` for which [`AntSummary::needs_care`] held.
    pub fn needing_care(&self, colony_id: u8) -> impl Iterator<Item = &AntSummary> {
        self.needing_care
            .get(colony_id as usize)
            .into_iter()
            .flatten()
            .filter_map(|&i| self.summaries.get(i))
    }

    pub fn len(&self) -> usize {
        self.summaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.summaries.is_empty()
    }
}

/// Everything an ant may read or touch while updating.
pub struct AntContext<'a> {
    pub terrain: &'a mut Terrain,
    pub colonies: &'a [ColonyState],
    pub neighbors: &'a Neighbors,
    pub tuning: &'a Tuning,
    pub rng: &'a mut ChaCha8Rng,
    pub dt: f32,
}

impl AntContext<'_> {
    pub fn colony(&self, id: u8) -> Option<&ColonyState> {
        self.colonies.get(id as usize)
    }

    pub fn find(&self, id: u64) -> Option<&AntSummary> {
        self.neighbors.get(id)
    }
}

/// Which scalar field the directional sensors sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenseField {
    FoodTrail,
    HomeTrail,
    FoodScent,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ant {
    pub id: u64,
    pub colony_id: u8,
    pub pos: Vec2,
    /// Radians, always in (-PI, PI].
    pub heading: f32,
    pub energy: f32,
    pub hp: f32,
    pub max_hp: f32,
    pub attack: f32,
    pub defense: f32,
    pub aggression: f32,
    /// Tendency to ignore the strongest signal, 0..=1.
    pub explorer: f32,
    pub age: f32,
    pub has_food: bool,
    pub state: AntState,
    pub resume_state: AntState,
    pub stuck_time: f32,
    pub consecutive_hits: u32,
    /// Id of the nurse carrying this egg.
    pub carried_by: Option<u64>,
    pub role: Role,
}

impl Ant {
    pub fn new(id: u64, caste: Caste, colony_id: u8, pos: Vec2, heading: f32, energy: f32) -> Self {
        let stats = caste.stats();
        Self {
            id,
            colony_id,
            pos,
            heading: wrap_angle(heading),
            energy: energy.max(0.0),
            hp: stats.max_hp,
            max_hp: stats.max_hp,
            attack: stats.attack,
            defense: stats.defense,
            aggression: stats.aggression,
            explorer: 0.0,
            age: 0.0,
            has_food: false,
            state: AntState::Forage,
            resume_state: AntState::Forage,
            stuck_time: 0.0,
            consecutive_hits: 0,
            carried_by: None,
            role: Role::for_caste(caste),
        }
    }

    pub fn caste(&self) -> Caste {
        self.role.caste()
    }

    pub fn stats(&self) -> CasteStats {
        self.caste().stats()
    }

    /// Swaps the behaviour payload and base stats, keeping the current health
    /// fraction.
    pub fn change_caste(&mut self, caste: Caste) {
        let stats = caste.stats();
        let fraction = if self.max_hp > 0.0 { self.hp / self.max_hp } else { 1.0 };
        self.role = Role::for_caste(caste);
        self.max_hp = stats.max_hp;
        self.hp = (stats.max_hp * fraction).clamp(0.0, stats.max_hp).max(1.0);
        self.attack = stats.attack;
        self.defense = stats.defense;
        self.aggression = stats.aggression;
        self.state = AntState::Forage;
        self.resume_state = AntState::Forage;
    }

    pub fn is_dead(&self) -> bool {
        self.hp <= 0.0
    }

    pub fn take_damage(&mut self, amount: f32) {
        if amount > 0.0 {
            self.hp = (self.hp - amount).clamp(0.0, self.max_hp);
        }
    }

    pub fn heal(&mut self, amount: f32) {
        if amount > 0.0 {
            self.hp = (self.hp + amount).clamp(0.0, self.max_hp);
        }
    }

    pub fn cell(&self) -> (i32, i32) {
        Terrain::cell_of(self.pos)
    }

    pub fn speed(&self, tuning: &Tuning) -> f32 {
        let base = self.stats().speed * tuning.ant_speed;
        if self.has_food { base * SLOWNESS_WITH_FOOD } else { base }
    }

    pub fn summary(&self, key: AntKey) -> AntSummary {
        AntSummary {
            key,
            id: self.id,
            colony_id: self.colony_id,
            caste: self.caste(),
            pos: self.pos,
            hp: self.hp,
            max_hp: self.max_hp,
            energy: self.energy,
            state: self.state,
            carried_by: self.carried_by,
            larva_fed: self.role.brood().is_some_and(|b| b.fed),
        }
    }

    /// Runs one update. Structural effects are pushed onto `out`.
    pub fn update(&mut self, key: AntKey, ctx: &mut AntContext, out: &mut Vec<Intent>) {
        if self.is_dead() {
            return;
        }
        self.age += ctx.dt;
        if self.caste().is_brood() {
            self.update_brood(key, ctx, out);
            return;
        }

        if self.state != AntState::Rest {
            self.energy = (self.energy - ctx.tuning.energy_decay * ctx.dt).max(0.0);
        }
        if self.energy <= 0.0 {
            self.take_damage(STARVATION_DAMAGE * ctx.dt);
            if self.is_dead() {
                return;
            }
        }

        match self.caste() {
            Caste::Worker | Caste::Drone => self.update_generic(key, ctx, out),
            Caste::Queen => self.update_queen(key, ctx, out),
            Caste::Princess => self.update_princess(key, ctx, out),
            Caste::Nurse => self.update_nurse(key, ctx, out),
            Caste::Soldier => self.update_soldier(key, ctx, out),
            Caste::Builder => self.update_builder(key, ctx, out),
            Caste::Egg | Caste::Larva => {}
        }
    }

    pub(crate) fn needs_rest(&self, tuning: &Tuning) -> bool {
        tuning.rest_enabled && self.energy < REST_THRESHOLD * tuning.energy_capacity
    }

    pub(crate) fn nest_center(&self, ctx: &AntContext) -> Option<Vec2> {
        ctx.colony(self.colony_id).and_then(ColonyState::nest_pos)
    }

    pub(crate) fn at_nest(&self, ctx: &AntContext) -> bool {
        self.nest_center(ctx)
            .is_some_and(|nest| self.pos.distance(nest) <= NEST_RADIUS)
    }

    /// The forage / return-home / rest loop shared by every caste without a
    /// specialised duty, and by specialists while carrying food or tired.
    pub(crate) fn update_generic(&mut self, key: AntKey, ctx: &mut AntContext, out: &mut Vec<Intent>) {
        if !self.has_food && self.state != AntState::Rest {
            let (x, y) = self.cell();
            if ctx.terrain.cell_type_at(x, y) == Some(CellType::Food) {
                self.pick_up_food(x, y, ctx);
                return;
            }
        }

        match self.state {
            AntState::Forage => {
                if self.needs_rest(ctx.tuning) {
                    self.state = AntState::ReturnHome;
                    return;
                }
                let turn = self
                    .sense(SenseField::FoodTrail, ctx)
                    .or_else(|| self.sense(SenseField::FoodScent, ctx));
                self.steer(turn, ctx);
                self.advance(ctx, true);
            }
            AntState::ReturnHome => {
                if self.at_nest(ctx) {
                    if self.has_food {
                        self.has_food = false;
                        out.push(Intent::DeliverFood { ant: key, amount: 1 });
                    }
                    self.heading = wrap_angle(self.heading + PI);
                    if self.needs_rest(ctx.tuning) {
                        self.resume_state = AntState::Forage;
                        self.state = AntState::Rest;
                    } else {
                        self.state = AntState::Forage;
                    }
                    return;
                }
                match self.sense(SenseField::HomeTrail, ctx) {
                    Some(turn) => self.steer(Some(turn), ctx),
                    None => match ctx.terrain.direction_to_nest(self.pos, self.colony_id) {
                        Some(dir) => self.turn_toward(dir.y.atan2(dir.x), STEER_GAIN, ctx),
                        None => self.steer(None, ctx),
                    },
                }
                self.advance(ctx, true);
            }
            AntState::Rest => self.rest(ctx),
        }
    }

    pub(crate) fn rest(&mut self, ctx: &mut AntContext) {
        let capacity = ctx.tuning.energy_capacity;
        self.energy = (self.energy + ctx.tuning.energy_recovery * ctx.dt).min(capacity);
        if self.energy >= self.stats().wake_threshold * capacity || !ctx.tuning.rest_enabled {
            self.state = self.resume_state;
            if self.state == AntState::Rest {
                self.state = AntState::Forage;
            }
        }
    }

    fn pick_up_food(&mut self, x: i32, y: i32, ctx: &mut AntContext) {
        if ctx.terrain.take_food(x, y) {
            self.has_food = true;
            self.state = AntState::ReturnHome;
            self.heading = wrap_angle(self.heading + PI);
        }
    }

    fn sample(&self, field: SenseField, x: i32, y: i32, terrain: &Terrain) -> f32 {
        let value = match field {
            SenseField::FoodTrail => terrain.food_pheromone_at(x, y, self.colony_id),
            SenseField::HomeTrail => terrain.home_pheromone_at(x, y, self.colony_id),
            SenseField::FoodScent => terrain.food_scent_at(x, y),
        };
        value - terrain.blocked_at(x, y)
    }

    /// Samples left, front and right sensors and returns the heading change
    /// toward the chosen one, or `None` when no sensor picks up a signal.
    pub(crate) fn sense(&self, field: SenseField, ctx: &mut AntContext) -> Option<f32> {
        let angle = ctx.tuning.sensor_angle;
        let distance = match field {
            SenseField::FoodScent => ctx.tuning.food_sense_range,
            _ => ctx.tuning.sensor_distance,
        };
        let offsets = [-angle, 0.0, angle];
        let mut values = [0.0f32; 3];
        for (value, offset) in values.iter_mut().zip(offsets) {
            let (sin_a, cos_a) = fast_sin_cos(self.heading + offset);
            let probe = self.pos + Vec2::new(cos_a, sin_a) * distance;
            let (x, y) = Terrain::cell_of(probe);
            *value = self.sample(field, x, y, ctx.terrain);
        }

        let strongest = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        if !(strongest > SIGNAL_EPSILON) {
            return None;
        }
        let mut choice = if values[1] >= values[0] && values[1] >= values[2] {
            1
        } else if values[0] > values[2] {
            0
        } else {
            2
        };

        let mistake = (self.stats().mistake_rate * (1.0 + 2.0 * self.explorer)).clamp(0.0, 1.0);
        if ctx.rng.gen_bool(mistake as f64) {
            choice = (choice + ctx.rng.gen_range(1..3)) % 3;
        }
        Some(offsets[choice])
    }

    /// Applies a sensed turn, or a random walk step when there is none.
    pub(crate) fn steer(&mut self, turn: Option<f32>, ctx: &mut AntContext) {
        let jitter_strength = ctx.tuning.random_turn * if turn.is_some() { 0.3 } else { 1.0 };
        let jitter = if jitter_strength > 0.0 {
            ctx.rng.gen_range(-jitter_strength..=jitter_strength)
        } else {
            0.0
        };
        let turn = turn.map(|t| t * STEER_GAIN).unwrap_or(0.0);
        self.heading = wrap_angle(self.heading + turn + jitter);
    }

    pub(crate) fn turn_toward(&mut self, target_heading: f32, gain: f32, ctx: &mut AntContext) {
        let diff = wrap_angle(target_heading - self.heading);
        let jitter_strength = ctx.tuning.random_turn * 0.2;
        let jitter = if jitter_strength > 0.0 {
            ctx.rng.gen_range(-jitter_strength..=jitter_strength)
        } else {
            0.0
        };
        self.heading = wrap_angle(self.heading + diff * gain.clamp(0.0, 1.0) + jitter);
    }

    pub(crate) fn turn_toward_point(&mut self, point: Vec2, ctx: &mut AntContext) {
        let d = point - self.pos;
        if d.length_squared() > 1e-6 {
            self.turn_toward(d.y.atan2(d.x), STEER_GAIN * 1.6, ctx);
        }
    }

    /// Moves one step along the heading. The step is traced through the grid
    /// so a fast ant cannot tunnel through undug terrain.
    pub(crate) fn advance(&mut self, ctx: &mut AntContext, can_dig: bool) {
        let speed = self.speed(ctx.tuning);
        if !(speed > 0.0) || ctx.dt <= 0.0 {
            return;
        }
        let (sin_a, cos_a) = fast_sin_cos(self.heading);
        let target = self.pos + Vec2::new(cos_a, sin_a) * speed * ctx.dt;

        let terrain = &*ctx.terrain;
        let hit = traverse_segment(self.pos, target, |x, y| !terrain.is_walkable(x, y));
        let Some(hit) = hit else {
            self.move_to(target, ctx);
            return;
        };

        let (x, y) = hit.cell;
        match ctx.terrain.cell_type_at(x, y) {
            Some(CellType::Dirt) if can_dig => {
                ctx.terrain.damage_dirt(x, y, DIG_DAMAGE_PER_SECOND * ctx.dt);
                self.energy = (self.energy - DIG_ENERGY_PER_SECOND * ctx.dt).max(0.0);
                self.consecutive_hits = 0;
            }
            Some(CellType::Food) if !self.has_food && self.forages() => {
                self.pick_up_food(x, y, ctx);
            }
            _ => self.bump(ctx),
        }
    }

    fn forages(&self) -> bool {
        matches!(self.role, Role::Worker | Role::Drone)
    }

    /// Reaction to an obstacle that cannot be dug or eaten: usually turn
    /// around, otherwise try a wider escape turn the longer the ant is stuck.
    fn bump(&mut self, ctx: &mut AntContext) {
        self.consecutive_hits += 1;
        self.stuck_time += ctx.dt;
        let (x, y) = self.cell();
        ctx.terrain
            .deposit_blocked(x, y, ctx.tuning.pheromone_deposit.max(0.05));

        if ctx.rng.gen_bool(BACK_OFF_CHANCE as f64) {
            let spread = ctx.rng.gen_range(-0.5f32..=0.5);
            self.heading = wrap_angle(self.heading + PI + spread);
        } else {
            let sign = if ctx.rng.gen_bool(0.5) { 1.0 } else { -1.0 };
            let escalation = self.consecutive_hits.min(4) as f32;
            self.heading = wrap_angle(self.heading + sign * FRAC_PI_4 * escalation);
        }
    }

    fn move_to(&mut self, target: Vec2, ctx: &mut AntContext) {
        let old = self.cell();
        self.pos = target;
        self.consecutive_hits = 0;
        self.stuck_time = 0.0;
        let (x, y) = self.cell();
        if (x, y) == old {
            return;
        }
        ctx.terrain.reveal(x, y, FOG_REVEAL_RADIUS, self.colony_id);
        if self.forages() || self.has_food {
            let amount = ctx.tuning.pheromone_deposit * ctx.rng.gen_range(0.8f32..=1.2);
            if self.has_food {
                ctx.terrain
                    .deposit_food_pheromone(x, y, amount, self.colony_id);
            } else {
                ctx.terrain
                    .deposit_home_pheromone(x, y, amount, self.colony_id);
            }
        }
    }

    /// Random heading used for newborn ants.
    pub fn random_heading(rng: &mut ChaCha8Rng) -> f32 {
        wrap_angle(rng.gen_range(0.0..TAU))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::colony::ColonyState;
    use rand::SeedableRng;
    use slotmap::SlotMap;

    fn colonies_with_nest(nest: (i32, i32)) -> Vec<ColonyState> {
        let mut colony = ColonyState::new(0);
        colony.alive = true;
        colony.nest = Some(nest);
        vec![colony]
    }

    fn key() -> AntKey {
        let mut map: SlotMap<AntKey, ()> = SlotMap::with_key();
        map.insert(())
    }

    #[test]
    fn caste_table_and_indices() {
        for caste in Caste::ALL {
            assert_eq!(Caste::from_index(caste.index()), caste);
        }
        assert_eq!(Caste::from_index(200), Caste::Builder);
        assert_eq!(Caste::Queen.stats().max_hp, 150.0);
        assert!(Caste::Egg.is_brood());
        assert!(!Caste::Worker.is_brood());
    }

    #[test]
    fn neighbors_index_by_id_and_care() {
        let mut keys: SlotMap<AntKey, ()> = SlotMap::with_key();
        let healthy = Ant::new(10, Caste::Worker, 0, Vec2::new(1.5, 1.5), 0.0, 100.0);
        let mut resting = Ant::new(11, Caste::Worker, 0, Vec2::new(2.5, 1.5), 0.0, 5.0);
        resting.state = AntState::Rest;
        let egg = Ant::new(12, Caste::Egg, 1, Vec2::new(3.5, 1.5), 0.0, 100.0);
        let mut carried = Ant::new(13, Caste::Egg, 1, Vec2::new(4.5, 1.5), 0.0, 100.0);
        carried.carried_by = Some(99);
        let neighbors = Neighbors::new(
            [&healthy, &resting, &egg, &carried]
                .iter()
                .map(|a| a.summary(keys.insert(())))
                .collect(),
        );

        assert_eq!(neighbors.len(), 4);
        assert_eq!(neighbors.get(12).map(|s| s.caste), Some(Caste::Egg));
        assert!(neighbors.get(42).is_none());
        let care0: Vec<u64> = neighbors.needing_care(0).map(|s| s.id).collect();
        let care1: Vec<u64> = neighbors.needing_care(1).map(|s| s.id).collect();
        assert_eq!(care0, vec![11]);
        assert_eq!(care1, vec![12]);
        assert_eq!(neighbors.needing_care(7).count(), 0);
    }

    #[test]
    fn worker_on_food_picks_it_up() {
        let mut terrain = Terrain::new(10, 10);
        terrain.place_food(5, 5, 1);
        let colonies = colonies_with_nest((1, 1));
        let tuning = Tuning::default();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut ant = Ant::new(1, Caste::Worker, 0, Vec2::new(5.5, 5.5), 0.0, 100.0);
        let mut out = Vec::new();
        let mut ctx = AntContext {
            terrain: &mut terrain,
            colonies: &colonies,
            neighbors: &Neighbors::default(),
            tuning: &tuning,
            rng: &mut rng,
            dt: 1.0 / 60.0,
        };
        ant.update(key(), &mut ctx, &mut out);
        assert!(ant.has_food);
        assert_eq!(ant.state, AntState::ReturnHome);
        assert_eq!(terrain.cell_type_at(5, 5), Some(CellType::Air));
        assert!(out.is_empty());
    }

    #[test]
    fn returning_ant_delivers_at_nest() {
        let mut terrain = Terrain::new(10, 10);
        terrain.set_nest(0, 4, 4);
        let colonies = colonies_with_nest((4, 4));
        let tuning = Tuning::default();
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let mut ant = Ant::new(1, Caste::Worker, 0, Vec2::new(4.6, 4.4), 0.0, 100.0);
        ant.has_food = true;
        ant.state = AntState::ReturnHome;
        let k = key();
        let mut out = Vec::new();
        let mut ctx = AntContext {
            terrain: &mut terrain,
            colonies: &colonies,
            neighbors: &Neighbors::default(),
            tuning: &tuning,
            rng: &mut rng,
            dt: 0.05,
        };
        ant.update(k, &mut ctx, &mut out);
        assert!(!ant.has_food);
        assert_eq!(ant.state, AntState::Forage);
        assert_eq!(out, vec![Intent::DeliverFood { ant: k, amount: 1 }]);
    }

    #[test]
    fn walls_are_never_crossed() {
        let mut terrain = Terrain::new(12, 3);
        for y in 0..3 {
            terrain.set_cell(6, y, CellType::Rock, None);
        }
        let colonies = colonies_with_nest((0, 1));
        let tuning = Tuning { ant_speed: 4.0, ..Tuning::default() };
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut ant = Ant::new(1, Caste::Drone, 0, Vec2::new(5.5, 1.5), 0.0, 100.0);
        let mut ctx = AntContext {
            terrain: &mut terrain,
            colonies: &colonies,
            neighbors: &Neighbors::default(),
            tuning: &tuning,
            rng: &mut rng,
            dt: 0.05,
        };
        for _ in 0..200 {
            ant.heading = 0.0;
            ant.advance(&mut ctx, true);
            assert!(ant.pos.x < 6.0);
            assert!(ant.heading > -PI && ant.heading <= PI);
        }
        assert!(ctx.terrain.blocked_at(5, 1) > 0.0);
    }

    #[test]
    fn digging_opens_dirt() {
        let mut terrain = Terrain::new(6, 1);
        terrain.set_cell(3, 0, CellType::Dirt, Some(crate::simulation::DirtType::SoftSoil));
        let colonies = colonies_with_nest((0, 0));
        let tuning = Tuning::default();
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let mut ant = Ant::new(1, Caste::Worker, 0, Vec2::new(2.9, 0.5), 0.0, 100.0);
        let mut ctx = AntContext {
            terrain: &mut terrain,
            colonies: &colonies,
            neighbors: &Neighbors::default(),
            tuning: &tuning,
            rng: &mut rng,
            dt: 0.05,
        };
        for _ in 0..10 {
            ant.heading = 0.0;
            ant.advance(&mut ctx, true);
        }
        assert_eq!(terrain.cell_type_at(3, 0), Some(CellType::Air));
        assert!(ant.energy < 100.0);
    }

    #[test]
    fn starving_ant_loses_health() {
        let mut terrain = Terrain::new(6, 6);
        let colonies = colonies_with_nest((0, 0));
        let tuning = Tuning { rest_enabled: false, ..Tuning::default() };
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut ant = Ant::new(1, Caste::Worker, 0, Vec2::new(3.5, 3.5), 0.0, 0.0);
        let mut ctx = AntContext {
            terrain: &mut terrain,
            colonies: &colonies,
            neighbors: &Neighbors::default(),
            tuning: &tuning,
            rng: &mut rng,
            dt: 0.5,
        };
        ant.update(key(), &mut ctx, &mut Vec::new());
        assert_eq!(ant.energy, 0.0);
        assert!((ant.hp - 19.0).abs() < 1e-5);
    }
}
