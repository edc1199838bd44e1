use macroquad::math::Vec2;
use serde::{Deserialize, Serialize};
use shared::{CASTE_TARGET_COUNT, DeathKind};
use tracing::debug;

use super::ant::Caste;
use super::{
    EGG_FOOD_COST, EGG_ORDER_WEIGHT, FOOD_PER_EGG_ORDER, FOOD_PER_PRINCESS_ORDER,
    MAX_ANTS_PER_COLONY, MAX_PRINCESSES, PRINCESS_ORDER_WEIGHT,
};

pub const DEFAULT_CASTE_TARGETS: [f32; CASTE_TARGET_COUNT] = [0.55, 0.15, 0.15, 0.15];

/// Castes whose share is steered by the colony's target ratios, in ratio order.
pub const TARGET_CASTES: [Caste; CASTE_TARGET_COUNT] =
    [Caste::Worker, Caste::Soldier, Caste::Nurse, Caste::Builder];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpawnKind {
    Egg,
    Princess,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnOrder {
    pub kind: SpawnKind,
    pub weight: u32,
}

/// Food-funded reproduction orders. The heaviest order is served first;
/// orders of equal weight are served in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpawnQueue {
    orders: Vec<SpawnOrder>,
}

impl SpawnQueue {
    pub fn push(&mut self, kind: SpawnKind, weight: u32) {
        self.orders.push(SpawnOrder { kind, weight });
    }

    pub fn pop(&mut self) -> Option<SpawnOrder> {
        let mut best: Option<(usize, u32)> = None;
        for (i, order) in self.orders.iter().enumerate() {
            if best.is_none_or(|(_, w)| order.weight > w) {
                best = Some((i, order.weight));
            }
        }
        best.map(|(i, _)| self.orders.remove(i))
    }

    pub fn count(&self, kind: SpawnKind) -> u32 {
        self.orders.iter().filter(|o| o.kind == kind).count() as u32
    }

    pub fn merge(&mut self, other: SpawnQueue) {
        self.orders.extend(other.orders);
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn orders(&self) -> &[SpawnOrder] {
        &self.orders
    }

    pub(crate) fn from_orders(orders: Vec<SpawnOrder>) -> Self {
        Self { orders }
    }
}

/// The nearest intruder detected around a nest.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DefenseAlert {
    pub target_id: u64,
    pub target_pos: Vec2,
    /// Seconds left before the alert lapses without a fresh sighting.
    pub remaining: f32,
}

/// Aggregate bookkeeping for one colony id.
#[derive(Debug, Clone, PartialEq)]
pub struct ColonyState {
    pub id: u8,
    pub alive: bool,
    pub nest: Option<(i32, i32)>,
    pub food_stock: u32,
    pub food_delivered: u64,
    pub food_since_egg_order: u32,
    pub food_since_princess_order: u32,
    pub spawn_queue: SpawnQueue,
    pub caste_counts: [u32; Caste::COUNT],
    pub caste_targets: [f32; CASTE_TARGET_COUNT],
    pub defense: Option<DefenseAlert>,
    pub larvae_matured: u32,
    pub queenless: bool,
    /// Deaths so far, indexed by [`DeathKind::index`].
    pub deaths: [u32; DeathKind::COUNT],
}

impl ColonyState {
    pub fn new(id: u8) -> Self {
        Self {
            id,
            alive: false,
            nest: None,
            food_stock: 0,
            food_delivered: 0,
            food_since_egg_order: 0,
            food_since_princess_order: 0,
            spawn_queue: SpawnQueue::default(),
            caste_counts: [0; Caste::COUNT],
            caste_targets: DEFAULT_CASTE_TARGETS,
            defense: None,
            larvae_matured: 0,
            queenless: false,
            deaths: [0; DeathKind::COUNT],
        }
    }

    pub fn nest_pos(&self) -> Option<Vec2> {
        self.nest
            .map(|(x, y)| Vec2::new(x as f32 + 0.5, y as f32 + 0.5))
    }

    pub fn population(&self) -> u32 {
        self.caste_counts.iter().sum()
    }

    pub fn count(&self, caste: Caste) -> u32 {
        self.caste_counts[caste.index() as usize]
    }

    pub(crate) fn add_caste(&mut self, caste: Caste) {
        self.caste_counts[caste.index() as usize] += 1;
    }

    pub(crate) fn remove_caste(&mut self, caste: Caste) {
        let slot = &mut self.caste_counts[caste.index() as usize];
        *slot = slot.saturating_sub(1);
    }

    pub(crate) fn record_death(&mut self, kind: DeathKind) {
        self.deaths[kind.index()] += 1;
    }

    pub fn deaths(&self, kind: DeathKind) -> u32 {
        self.deaths[kind.index()]
    }

    /// Whether a queen of this colony may lay right now.
    pub fn can_lay(&self) -> bool {
        self.alive
            && self.population() < MAX_ANTS_PER_COLONY
            && (!self.spawn_queue.is_empty() || self.food_stock >= EGG_FOOD_COST)
    }

    /// Adds delivered food to the stock and converts accumulated deliveries
    /// into spawn orders.
    pub fn record_food_delivery(&mut self, amount: u32) {
        self.food_stock = self.food_stock.saturating_add(amount);
        self.food_delivered += amount as u64;
        self.food_since_egg_order += amount;
        self.food_since_princess_order += amount;

        while self.food_since_egg_order >= FOOD_PER_EGG_ORDER {
            self.food_since_egg_order -= FOOD_PER_EGG_ORDER;
            self.spawn_queue.push(SpawnKind::Egg, EGG_ORDER_WEIGHT);
        }
        while self.food_since_princess_order >= FOOD_PER_PRINCESS_ORDER {
            self.food_since_princess_order -= FOOD_PER_PRINCESS_ORDER;
            let princesses =
                self.count(Caste::Princess) + self.spawn_queue.count(SpawnKind::Princess);
            if princesses < MAX_PRINCESSES {
                self.spawn_queue.push(SpawnKind::Princess, PRINCESS_ORDER_WEIGHT);
                debug!(colony_id = self.id, "princess order queued");
            }
        }
    }

    /// Replaces the target ratios after normalising them. Rejects ratios that
    /// do not sum to a positive value.
    pub fn set_caste_targets(&mut self, ratios: [f32; CASTE_TARGET_COUNT]) -> bool {
        let cleaned = ratios.map(|r| if r.is_finite() { r.max(0.0) } else { 0.0 });
        let sum: f32 = cleaned.iter().sum();
        if !(sum > 0.0) {
            return false;
        }
        self.caste_targets = cleaned.map(|r| r / sum);
        true
    }

    /// Picks the caste a maturing larva grows into. The colony's first larva,
    /// and larvae of a queenless colony, become princesses, as do
    /// princess-destined larvae while under the princess cap. Everything else
    /// fills the steered caste with the largest deficit from its target share.
    pub fn choose_maturation_caste(&mut self, destined_princess: bool) -> Caste {
        let first = self.larvae_matured == 0;
        self.larvae_matured += 1;

        let princesses = self.count(Caste::Princess);
        if self.queenless || (princesses < MAX_PRINCESSES && (first || destined_princess)) {
            return Caste::Princess;
        }

        let total: u32 = TARGET_CASTES.iter().map(|&c| self.count(c)).sum();
        let mut best = (Caste::Worker, f32::NEG_INFINITY);
        for (i, &caste) in TARGET_CASTES.iter().enumerate() {
            let share = if total == 0 {
                0.0
            } else {
                self.count(caste) as f32 / total as f32
            };
            let deficit = self.caste_targets[i] - share;
            if deficit > best.1 {
                best = (caste, deficit);
            }
        }
        best.0
    }

    /// Absorbs the stock and pending orders of a defeated colony.
    pub(crate) fn absorb(&mut self, loser: &mut ColonyState) {
        self.food_stock = self.food_stock.saturating_add(loser.food_stock);
        self.food_since_egg_order += loser.food_since_egg_order;
        self.spawn_queue
            .merge(std::mem::take(&mut loser.spawn_queue));
        for (mine, theirs) in self.caste_counts.iter_mut().zip(loser.caste_counts.iter_mut()) {
            *mine += *theirs;
            *theirs = 0;
        }
        loser.food_stock = 0;
        loser.food_since_egg_order = 0;
        loser.food_since_princess_order = 0;
    }
}
