use macroquad::math::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};
use shared::wrap_angle;
use std::collections::VecDeque;
use std::f32::consts::TAU;

use super::ant::{Ant, AntContext, AntKey, AntState, AntSummary, Caste};
use super::cell::{CellType, DirtType};
use super::intent::Intent;
use super::rooms::{RoomType, WorkAction, WorkCell};
use super::terrain::Terrain;
use super::timer::Timer;
use super::{
    BROOD_JITTER_CHANCE, BUILDER_CELLS_PER_TICK, BUILDER_DIG_PER_TICK, BUILDER_GIVE_UP_TIME,
    BUILDER_REACH, DIG_ENERGY_PER_SECOND, EGG_HATCH_TIME, EGG_LAY_INTERVAL,
    FED_LARVA_GROWTH_BONUS, LARVA_GROW_TIME, NEST_RADIUS, NURSE_FEED_COOLDOWN, NURSE_REACH,
    NURSE_SEARCH_RADIUS, PATROL_RADIUS, PRINCESS_ROAM_RADIUS, QUEEN_ROAM_RADIUS,
};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BroodState {
    /// 0..1 progress toward hatching or maturing.
    pub growth: f32,
    pub fed: bool,
    pub destined_princess: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueenState {
    pub lay_timer: Timer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NurseTask {
    #[default]
    Idle,
    FetchEgg { egg: u64 },
    CarryEgg { egg: u64 },
    Feed { target: u64 },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NurseState {
    pub task: NurseTask,
    pub feed_cooldown: f32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SoldierState {
    pub patrol_angle: f32,
    pub defending: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuilderTask {
    #[default]
    Idle,
    BuildingRoom,
    ReinforcingWall,
    EmergencyDefense,
    ConstructingBlueprint,
    ReturningHome,
}

impl BuilderTask {
    pub const ALL: [BuilderTask; 6] = [
        BuilderTask::Idle,
        BuilderTask::BuildingRoom,
        BuilderTask::ReinforcingWall,
        BuilderTask::EmergencyDefense,
        BuilderTask::ConstructingBlueprint,
        BuilderTask::ReturningHome,
    ];

    pub fn from_index(index: u8) -> Self {
        Self::ALL[(index as usize).min(Self::ALL.len() - 1)]
    }

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn is_working(self) -> bool {
        !matches!(self, BuilderTask::Idle | BuilderTask::ReturningHome)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BuilderState {
    pub task: BuilderTask,
    pub task_id: Option<u64>,
    pub pending: VecDeque<WorkCell>,
    /// Seconds spent without finishing the front cell.
    pub stalled: f32,
}

/// Caste-specific behaviour payload of an ant.
#[derive(Debug, Clone, PartialEq)]
pub enum Role {
    Worker,
    Drone,
    Egg(BroodState),
    Larva(BroodState),
    Queen(QueenState),
    Princess,
    Nurse(NurseState),
    Soldier(SoldierState),
    Builder(BuilderState),
}

impl Role {
    pub fn for_caste(caste: Caste) -> Self {
        match caste {
            Caste::Worker => Role::Worker,
            Caste::Drone => Role::Drone,
            Caste::Egg => Role::Egg(BroodState::default()),
            Caste::Larva => Role::Larva(BroodState::default()),
            Caste::Queen => Role::Queen(QueenState {
                lay_timer: Timer::new(EGG_LAY_INTERVAL, 0.0),
            }),
            Caste::Princess => Role::Princess,
            Caste::Nurse => Role::Nurse(NurseState::default()),
            Caste::Soldier => Role::Soldier(SoldierState::default()),
            Caste::Builder => Role::Builder(BuilderState::default()),
        }
    }

    pub fn caste(&self) -> Caste {
        match self {
            Role::Worker => Caste::Worker,
            Role::Drone => Caste::Drone,
            Role::Egg(_) => Caste::Egg,
            Role::Larva(_) => Caste::Larva,
            Role::Queen(_) => Caste::Queen,
            Role::Princess => Caste::Princess,
            Role::Nurse(_) => Caste::Nurse,
            Role::Soldier(_) => Caste::Soldier,
            Role::Builder(_) => Caste::Builder,
        }
    }

    pub fn brood(&self) -> Option<&BroodState> {
        match self {
            Role::Egg(b) | Role::Larva(b) => Some(b),
            _ => None,
        }
    }

    pub fn brood_mut(&mut self) -> Option<&mut BroodState> {
        match self {
            Role::Egg(b) | Role::Larva(b) => Some(b),
            _ => None,
        }
    }
}

impl Ant {
    pub(crate) fn update_brood(&mut self, key: AntKey, ctx: &mut AntContext, out: &mut Vec<Intent>) {
        let dt = ctx.dt;
        let intent = match &mut self.role {
            Role::Egg(brood) => {
                brood.growth = (brood.growth + dt / EGG_HATCH_TIME).min(1.0);
                (brood.growth >= 1.0).then_some(Intent::Hatch { egg: key })
            }
            Role::Larva(brood) => {
                let bonus = if brood.fed { FED_LARVA_GROWTH_BONUS } else { 1.0 };
                brood.growth = (brood.growth + dt * bonus / LARVA_GROW_TIME).min(1.0);
                (brood.growth >= 1.0).then_some(Intent::Mature { larva: key })
            }
            _ => return,
        };
        if let Some(intent) = intent {
            out.push(intent);
            return;
        }
        if self.carried_by.is_none() && ctx.rng.gen_bool(BROOD_JITTER_CHANCE as f64) {
            let nudge = Vec2::new(
                ctx.rng.gen_range(-0.3f32..=0.3),
                ctx.rng.gen_range(-0.3f32..=0.3),
            );
            let (x, y) = Terrain::cell_of(self.pos + nudge);
            if ctx.terrain.is_walkable(x, y) {
                self.pos += nudge;
            }
        }
    }

    pub(crate) fn update_queen(&mut self, key: AntKey, ctx: &mut AntContext, out: &mut Vec<Intent>) {
        let can_lay = ctx.colony(self.colony_id).is_some_and(|c| c.can_lay());
        if let Role::Queen(queen) = &mut self.role {
            queen.lay_timer.update(ctx.dt);
            if queen.lay_timer.is_ready() {
                if can_lay {
                    out.push(Intent::LayEgg { queen: key });
                }
                queen.lay_timer.wrap();
            }
        }
        if self.state == AntState::Rest {
            self.rest(ctx);
            return;
        }
        if self.needs_rest(ctx.tuning) {
            self.resume_state = AntState::Forage;
            self.state = AntState::Rest;
            return;
        }
        self.roam_near_nest(QUEEN_ROAM_RADIUS, ctx, false);
    }

    pub(crate) fn update_princess(&mut self, key: AntKey, ctx: &mut AntContext, out: &mut Vec<Intent>) {
        if self.has_food || self.state != AntState::Forage {
            self.update_generic(key, ctx, out);
            return;
        }
        if self.needs_rest(ctx.tuning) {
            self.state = AntState::ReturnHome;
            return;
        }
        self.roam_near_nest(PRINCESS_ROAM_RADIUS, ctx, true);
    }

    /// Random walk that turns back toward the nest beyond `radius`.
    fn roam_near_nest(&mut self, radius: f32, ctx: &mut AntContext, can_dig: bool) {
        match self.nest_center(ctx) {
            Some(nest) if self.pos.distance(nest) > radius => {
                match ctx.terrain.direction_to_nest(self.pos, self.colony_id) {
                    Some(dir) => self.turn_toward(dir.y.atan2(dir.x), 0.8, ctx),
                    None => self.turn_toward_point(nest, ctx),
                }
            }
            _ => self.steer(None, ctx),
        }
        self.advance(ctx, can_dig);
    }

    fn nursery_center(&self, ctx: &AntContext) -> Option<(Vec2, f32)> {
        ctx.terrain
            .room_of_type(self.colony_id, RoomType::Nursery)
            .map(|room| (room.center_pos(), room.radius))
    }

    pub(crate) fn update_nurse(&mut self, key: AntKey, ctx: &mut AntContext, out: &mut Vec<Intent>) {
        let carrying = matches!(
            &self.role,
            Role::Nurse(NurseState { task: NurseTask::CarryEgg { .. }, .. })
        );
        if self.has_food || (self.state != AntState::Forage && !carrying) {
            self.update_generic(key, ctx, out);
            return;
        }
        let Role::Nurse(nurse) = &mut self.role else {
            return;
        };
        nurse.feed_cooldown = (nurse.feed_cooldown - ctx.dt).max(0.0);
        let task = nurse.task;
        let cooldown = nurse.feed_cooldown;

        let next = match task {
            NurseTask::Idle => {
                if self.needs_rest(ctx.tuning) {
                    self.state = AntState::ReturnHome;
                    return;
                }
                match self.find_nurse_work(cooldown, ctx) {
                    Some(task) => task,
                    None => {
                        let anchor = self
                            .nursery_center(ctx)
                            .map(|(c, _)| c)
                            .or_else(|| self.nest_center(ctx));
                        match anchor {
                            Some(a) if self.pos.distance(a) > NEST_RADIUS * 1.5 => {
                                self.turn_toward_point(a, ctx)
                            }
                            _ => self.steer(None, ctx),
                        }
                        self.advance(ctx, true);
                        NurseTask::Idle
                    }
                }
            }
            NurseTask::FetchEgg { egg } => {
                let target = ctx
                    .find(egg)
                    .filter(|s| s.caste == Caste::Egg && s.carried_by.is_none())
                    .map(|s| s.pos);
                match target {
                    None => NurseTask::Idle,
                    Some(pos) if self.pos.distance(pos) <= NURSE_REACH => {
                        out.push(Intent::PickUpEgg { nurse: key, egg });
                        NurseTask::CarryEgg { egg }
                    }
                    Some(pos) => {
                        self.turn_toward_point(pos, ctx);
                        self.advance(ctx, true);
                        task
                    }
                }
            }
            NurseTask::CarryEgg { egg } => match self.nursery_center(ctx) {
                Some((center, radius)) if self.pos.distance(center) > radius * 0.6 => {
                    self.turn_toward_point(center, ctx);
                    self.advance(ctx, true);
                    task
                }
                _ => {
                    out.push(Intent::DropEgg { nurse: key, egg });
                    NurseTask::Idle
                }
            },
            NurseTask::Feed { target } => match ctx.find(target).map(|s| s.pos) {
                None => NurseTask::Idle,
                Some(pos) if self.pos.distance(pos) <= NURSE_REACH => {
                    out.push(Intent::FeedAnt { nurse: key, target });
                    if let Role::Nurse(nurse) = &mut self.role {
                        nurse.feed_cooldown = NURSE_FEED_COOLDOWN;
                    }
                    NurseTask::Idle
                }
                Some(pos) => {
                    self.turn_toward_point(pos, ctx);
                    self.advance(ctx, true);
                    task
                }
            },
        };
        if let Role::Nurse(nurse) = &mut self.role {
            nurse.task = next;
        }
    }

    /// Eggs lying outside the nursery come first, then ants that need feeding.
    fn find_nurse_work(&self, cooldown: f32, ctx: &AntContext) -> Option<NurseTask> {
        let search_sq = NURSE_SEARCH_RADIUS * NURSE_SEARCH_RADIUS;
        let nursery = ctx.terrain.room_of_type(self.colony_id, RoomType::Nursery);
        let nearest = |pred: &dyn Fn(&AntSummary) -> bool| {
            ctx.neighbors
                .needing_care(self.colony_id)
                .filter(|s| s.id != self.id)
                .filter(|s| pred(s))
                .map(|s| (s.id, s.pos.distance_squared(self.pos)))
                .filter(|&(_, d)| d <= search_sq)
                .min_by(|a, b| a.1.total_cmp(&b.1))
                .map(|(id, _)| id)
        };

        if let Some(nursery) = nursery {
            let stray = nearest(&|s| {
                s.caste == Caste::Egg && s.carried_by.is_none() && !nursery.contains(s.pos)
            });
            if let Some(egg) = stray {
                return Some(NurseTask::FetchEgg { egg });
            }
        }

        let stock = ctx.colony(self.colony_id).map_or(0, |c| c.food_stock);
        if cooldown > 0.0 || stock == 0 {
            return None;
        }
        nearest(&|s| {
            let hungry_adult = !s.caste.is_brood()
                && (s.state == AntState::Rest || s.hp < s.max_hp * 0.5);
            let unfed_larva = s.caste == Caste::Larva && !s.larva_fed;
            hungry_adult || unfed_larva
        })
        .map(|target| NurseTask::Feed { target })
    }

    pub(crate) fn update_soldier(&mut self, key: AntKey, ctx: &mut AntContext, out: &mut Vec<Intent>) {
        if self.has_food || self.state != AntState::Forage {
            if let Role::Soldier(soldier) = &mut self.role {
                soldier.defending = false;
            }
            self.update_generic(key, ctx, out);
            return;
        }

        let alert = ctx.colony(self.colony_id).and_then(|c| c.defense);
        if let Some(alert) = alert {
            let target = ctx
                .find(alert.target_id)
                .map(|s| s.pos)
                .unwrap_or(alert.target_pos);
            if let Role::Soldier(soldier) = &mut self.role {
                soldier.defending = true;
            }
            self.turn_toward_point(target, ctx);
            self.advance(ctx, true);
            return;
        }

        if self.needs_rest(ctx.tuning) {
            self.state = AntState::ReturnHome;
            return;
        }
        let speed = self.speed(ctx.tuning);
        let Some(nest) = self.nest_center(ctx) else {
            self.steer(None, ctx);
            self.advance(ctx, true);
            return;
        };
        let angle = match &mut self.role {
            Role::Soldier(soldier) => {
                soldier.defending = false;
                soldier.patrol_angle =
                    (soldier.patrol_angle + speed * ctx.dt / PATROL_RADIUS).rem_euclid(TAU);
                soldier.patrol_angle
            }
            _ => return,
        };
        let (sin_a, cos_a) = shared::fast_sin_cos(angle);
        let waypoint = nest + Vec2::new(cos_a, sin_a) * PATROL_RADIUS;
        self.turn_toward_point(waypoint, ctx);
        self.advance(ctx, true);
    }

    pub(crate) fn update_builder(&mut self, key: AntKey, ctx: &mut AntContext, out: &mut Vec<Intent>) {
        if self.has_food || self.state != AntState::Forage {
            self.update_generic(key, ctx, out);
            return;
        }
        let task = match &self.role {
            Role::Builder(b) => b.task,
            _ => return,
        };

        match task {
            BuilderTask::Idle => {
                if self.needs_rest(ctx.tuning) {
                    self.state = AntState::ReturnHome;
                    return;
                }
                self.roam_near_nest(PRINCESS_ROAM_RADIUS, ctx, true);
            }
            BuilderTask::ReturningHome => {
                if self.at_nest(ctx) || self.nest_center(ctx).is_none() {
                    if let Role::Builder(b) = &mut self.role {
                        b.task = BuilderTask::Idle;
                    }
                    return;
                }
                match ctx.terrain.direction_to_nest(self.pos, self.colony_id) {
                    Some(dir) => self.turn_toward(dir.y.atan2(dir.x), 0.8, ctx),
                    None => {
                        if let Some(nest) = self.nest_center(ctx) {
                            self.turn_toward_point(nest, ctx);
                        }
                    }
                }
                self.advance(ctx, true);
            }
            _ => self.work(key, ctx, out),
        }
    }

    /// Works through the pending cell list a few cells per tick.
    fn work(&mut self, key: AntKey, ctx: &mut AntContext, out: &mut Vec<Intent>) {
        let own_cell = self.cell();
        let pos = self.pos;
        let dt = ctx.dt;
        let Role::Builder(builder) = &mut self.role else {
            return;
        };

        if builder.pending.is_empty() {
            if let Some(task_id) = builder.task_id.take() {
                out.push(Intent::BuildComplete { builder: key, task_id });
            }
            builder.task = BuilderTask::ReturningHome;
            builder.stalled = 0.0;
            return;
        }

        let mut processed = 0;
        let mut dug = false;
        while processed < BUILDER_CELLS_PER_TICK {
            let Some(&cell) = builder.pending.front() else {
                break;
            };
            if cell.center().distance(pos) > BUILDER_REACH {
                break;
            }
            match cell.action {
                WorkAction::Dig => match ctx.terrain.cell_type_at(cell.x, cell.y) {
                    Some(CellType::Dirt) => {
                        dug = true;
                        if !ctx.terrain.damage_dirt(cell.x, cell.y, BUILDER_DIG_PER_TICK) {
                            break;
                        }
                        builder.pending.pop_front();
                    }
                    _ => {
                        builder.pending.pop_front();
                    }
                },
                WorkAction::Fill => {
                    if (cell.x, cell.y) != own_cell
                        && ctx.terrain.cell_type_at(cell.x, cell.y) == Some(CellType::Air)
                    {
                        ctx.terrain
                            .set_cell(cell.x, cell.y, CellType::Dirt, Some(DirtType::PackedEarth));
                    }
                    builder.pending.pop_front();
                }
            }
            builder.stalled = 0.0;
            processed += 1;
        }

        if dug {
            self.energy = (self.energy - DIG_ENERGY_PER_SECOND * dt).max(0.0);
        }
        if processed > 0 || dug {
            return;
        }

        builder.stalled += dt;
        if builder.stalled > BUILDER_GIVE_UP_TIME {
            builder.pending.pop_front();
            builder.stalled = 0.0;
            return;
        }
        let Some(front) = builder.pending.front().map(WorkCell::center) else {
            return;
        };
        self.turn_toward_point(front, ctx);
        self.advance(ctx, true);
    }

    /// Points a freshly assigned builder at its task.
    pub fn assign_build(&mut self, task: BuilderTask, task_id: u64, pending: VecDeque<WorkCell>) {
        if let Role::Builder(builder) = &mut self.role {
            builder.task = task;
            builder.task_id = Some(task_id);
            builder.pending = pending;
            builder.stalled = 0.0;
        }
    }

    /// Sets where along its circuit a soldier starts patrolling.
    pub(crate) fn reset_patrol(&mut self, angle: f32) {
        if let Role::Soldier(soldier) = &mut self.role {
            soldier.patrol_angle = wrap_angle(angle).rem_euclid(TAU);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Tuning;
    use crate::simulation::ant::Neighbors;
    use crate::simulation::colony::ColonyState;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use slotmap::SlotMap;

    fn key() -> AntKey {
        let mut map: SlotMap<AntKey, ()> = SlotMap::with_key();
        map.insert(())
    }

    fn colony(nest: (i32, i32), stock: u32) -> Vec<ColonyState> {
        let mut colony = ColonyState::new(0);
        colony.alive = true;
        colony.nest = Some(nest);
        colony.food_stock = stock;
        vec![colony]
    }

    #[test]
    fn egg_hatches_after_its_incubation() {
        let mut terrain = Terrain::new(5, 5);
        let colonies = colony((2, 2), 0);
        let tuning = Tuning::default();
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let mut egg = Ant::new(1, Caste::Egg, 0, Vec2::new(2.5, 2.5), 0.0, 100.0);
        let k = key();
        let mut out = Vec::new();
        let mut ctx = AntContext {
            terrain: &mut terrain,
            colonies: &colonies,
            neighbors: &Neighbors::default(),
            tuning: &tuning,
            rng: &mut rng,
            dt: EGG_HATCH_TIME / 2.0,
        };
        egg.update(k, &mut ctx, &mut out);
        assert!(out.is_empty());
        egg.update(k, &mut ctx, &mut out);
        assert_eq!(out, vec![Intent::Hatch { egg: k }]);
    }

    #[test]
    fn queen_lays_only_when_affordable() {
        let mut terrain = Terrain::new(9, 9);
        let tuning = Tuning::default();
        let mut rng = ChaCha8Rng::seed_from_u64(10);
        let k = key();
        let mut queen = Ant::new(1, Caste::Queen, 0, Vec2::new(4.5, 4.5), 0.0, 100.0);

        let broke = colony((4, 4), 0);
        let mut out = Vec::new();
        if let Role::Queen(q) = &mut queen.role {
            q.lay_timer.force_ready();
        }
        let mut ctx = AntContext {
            terrain: &mut terrain,
            colonies: &broke,
            neighbors: &Neighbors::default(),
            tuning: &tuning,
            rng: &mut rng,
            dt: 0.01,
        };
        queen.update(k, &mut ctx, &mut out);
        assert!(out.is_empty());

        let fed = colony((4, 4), 10);
        if let Role::Queen(q) = &mut queen.role {
            q.lay_timer.force_ready();
        }
        ctx.colonies = &fed;
        queen.update(k, &mut ctx, &mut out);
        assert_eq!(out, vec![Intent::LayEgg { queen: k }]);
        assert!(queen.pos.distance(Vec2::new(4.5, 4.5)) <= QUEEN_ROAM_RADIUS + 0.1);
    }

    #[test]
    fn builder_digs_pending_cells_then_reports() {
        let mut terrain = Terrain::filled(8, 3, CellType::Dirt, DirtType::SoftSoil);
        terrain.set_cell(1, 1, CellType::Air, None);
        let colonies = colony((1, 1), 0);
        let tuning = Tuning::default();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let k = key();
        let mut builder = Ant::new(1, Caste::Builder, 0, Vec2::new(1.5, 1.5), 0.0, 100.0);
        builder.assign_build(
            BuilderTask::BuildingRoom,
            7,
            VecDeque::from([WorkCell { x: 2, y: 1, action: WorkAction::Dig }]),
        );
        let mut out = Vec::new();
        let mut ctx = AntContext {
            terrain: &mut terrain,
            colonies: &colonies,
            neighbors: &Neighbors::default(),
            tuning: &tuning,
            rng: &mut rng,
            dt: 0.05,
        };
        builder.update(k, &mut ctx, &mut out);
        assert_eq!(ctx.terrain.cell_type_at(2, 1), Some(CellType::Air));
        builder.update(k, &mut ctx, &mut out);
        assert_eq!(out, vec![Intent::BuildComplete { builder: k, task_id: 7 }]);
        match &builder.role {
            Role::Builder(b) => assert_eq!(b.task, BuilderTask::ReturningHome),
            other => panic!("unexpected role {other:?}"),
        }
    }

    #[test]
    fn builder_fills_walls_but_not_its_own_cell() {
        let mut terrain = Terrain::new(6, 6);
        let colonies = colony((0, 0), 0);
        let tuning = Tuning::default();
        let mut rng = ChaCha8Rng::seed_from_u64(12);
        let k = key();
        let mut builder = Ant::new(1, Caste::Builder, 0, Vec2::new(2.5, 2.5), 0.0, 100.0);
        builder.assign_build(
            BuilderTask::ReinforcingWall,
            3,
            VecDeque::from([
                WorkCell { x: 2, y: 2, action: WorkAction::Fill },
                WorkCell { x: 3, y: 2, action: WorkAction::Fill },
            ]),
        );
        let mut ctx = AntContext {
            terrain: &mut terrain,
            colonies: &colonies,
            neighbors: &Neighbors::default(),
            tuning: &tuning,
            rng: &mut rng,
            dt: 0.05,
        };
        builder.update(k, &mut ctx, &mut Vec::new());
        assert_eq!(terrain.cell_type_at(2, 2), Some(CellType::Air));
        assert_eq!(terrain.cell_type_at(3, 2), Some(CellType::Dirt));
    }

    #[test]
    fn nurse_feeds_resting_ant_from_stock() {
        let mut terrain = Terrain::new(10, 10);
        let colonies = colony((5, 5), 4);
        let tuning = Tuning::default();
        let mut rng = ChaCha8Rng::seed_from_u64(13);
        let k = key();
        let mut nurse = Ant::new(1, Caste::Nurse, 0, Vec2::new(5.5, 5.5), 0.0, 100.0);
        let mut tired = Ant::new(2, Caste::Worker, 0, Vec2::new(6.0, 5.5), 0.0, 5.0);
        tired.state = AntState::Rest;
        let neighbors = Neighbors::new(vec![nurse.summary(k), tired.summary(key())]);
        let mut out = Vec::new();
        let mut ctx = AntContext {
            terrain: &mut terrain,
            colonies: &colonies,
            neighbors: &neighbors,
            tuning: &tuning,
            rng: &mut rng,
            dt: 0.05,
        };
        nurse.update(k, &mut ctx, &mut out);
        nurse.update(k, &mut ctx, &mut out);
        assert!(out.contains(&Intent::FeedAnt { nurse: k, target: 2 }));
    }
}
