use rand::Rng;
use rand_chacha::ChaCha8Rng;
use slotmap::SlotMap;
use std::collections::HashSet;

use super::ant::{Ant, AntKey, AntState};
use super::castes::Role;
use super::spatial::SpatialHash;
use super::{DEFENDER_DAMAGE_MULTIPLIER, FIGHT_RADIUS, MIN_DAMAGE};

/// Outcome of one combat pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CombatReport {
    /// Pairs in which at least one side attacked.
    pub exchanges: u32,
    /// Ants killed this pass, with the colony that killed them.
    pub casualties: Vec<(AntKey, u8)>,
}

/// Damage dealt by one blow: attack scaled by a 0.8..1.3 variance minus
/// defense scaled by a 0.3..0.5 mitigation, never below the floor.
pub fn roll_damage(attack: f32, defense: f32, rng: &mut ChaCha8Rng) -> f32 {
    let variance = rng.gen_range(0.8f32..=1.3);
    let mitigation = rng.gen_range(0.3f32..=0.5);
    (attack * variance - defense * mitigation).max(MIN_DAMAGE)
}

fn is_defending(ant: &Ant) -> bool {
    matches!(&ant.role, Role::Soldier(s) if s.defending)
}

fn will_fight(ant: &Ant, rng: &mut ChaCha8Rng) -> bool {
    if is_defending(ant) {
        return true;
    }
    let p = shared::clamp01(ant.aggression);
    p > 0.0 && rng.gen_bool(p as f64)
}

/// Resolves fights between every pair of opposing ants within fight range.
/// Each unordered pair is considered once. Both sides may hit each other in
/// the same exchange. Dead ants stay in the map with zero health; removing
/// them is left to the caller.
pub fn resolve_combat(
    ants: &mut SlotMap<AntKey, Ant>,
    spatial: &mut SpatialHash,
    rng: &mut ChaCha8Rng,
) -> CombatReport {
    spatial.rebuild(
        ants.iter()
            .filter(|(_, a)| !a.is_dead() && a.carried_by.is_none())
            .map(|(k, a)| (k, a.pos)),
    );

    let mut report = CombatReport::default();
    let mut seen: HashSet<(u64, u64)> = HashSet::new();
    let mut nearby = Vec::new();
    let keys: Vec<AntKey> = ants.keys().collect();

    for key in keys {
        let Some(ant) = ants.get(key) else {
            continue;
        };
        if ant.is_dead() || ant.carried_by.is_some() {
            continue;
        }
        let (pos, colony, id) = (ant.pos, ant.colony_id, ant.id);

        nearby.clear();
        spatial.query_radius(pos, FIGHT_RADIUS, &mut nearby);
        for &other_key in &nearby {
            let Some([a, b]) = ants.get_disjoint_mut([key, other_key]) else {
                continue;
            };
            if b.colony_id == colony || a.is_dead() || b.is_dead() {
                continue;
            }
            let pair = (id.min(b.id), id.max(b.id));
            if !seen.insert(pair) {
                continue;
            }

            let a_fights = will_fight(a, rng);
            let b_fights = will_fight(b, rng);
            if !a_fights && !b_fights {
                continue;
            }
            report.exchanges += 1;

            let to_b = if a_fights {
                let mult = if is_defending(a) { DEFENDER_DAMAGE_MULTIPLIER } else { 1.0 };
                roll_damage(a.attack * mult, b.defense, rng)
            } else {
                0.0
            };
            let to_a = if b_fights {
                let mult = if is_defending(b) { DEFENDER_DAMAGE_MULTIPLIER } else { 1.0 };
                roll_damage(b.attack * mult, a.defense, rng)
            } else {
                0.0
            };
            a.take_damage(to_a);
            b.take_damage(to_b);

            match (a.is_dead(), b.is_dead()) {
                (false, true) => {
                    eat_corpse(a);
                    report.casualties.push((other_key, a.colony_id));
                }
                (true, false) => {
                    eat_corpse(b);
                    report.casualties.push((key, b.colony_id));
                }
                (true, true) => {
                    report.casualties.push((other_key, a.colony_id));
                    report.casualties.push((key, b.colony_id));
                }
                (false, false) => {}
            }
            if a.is_dead() {
                break;
            }
        }
    }
    report
}

/// A surviving winner that is not already carrying food takes the corpse home.
fn eat_corpse(winner: &mut Ant) {
    if winner.has_food || winner.caste().is_brood() {
        return;
    }
    winner.has_food = true;
    if winner.state != AntState::Rest {
        winner.state = AntState::ReturnHome;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::ant::Caste;
    use macroquad::math::Vec2;
    use rand::SeedableRng;

    #[test]
    fn damage_respects_the_floor() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..100 {
            let dmg = roll_damage(1.0, 50.0, &mut rng);
            assert_eq!(dmg, MIN_DAMAGE);
            let dmg = roll_damage(10.0, 0.0, &mut rng);
            assert!((8.0..=13.0).contains(&dmg));
        }
    }

    #[test]
    fn each_pair_fights_once() {
        let mut ants: SlotMap<AntKey, Ant> = SlotMap::with_key();
        let mut a = Ant::new(1, Caste::Soldier, 0, Vec2::new(5.0, 5.0), 0.0, 100.0);
        a.aggression = 1.0;
        let mut b = Ant::new(2, Caste::Worker, 1, Vec2::new(5.5, 5.0), 0.0, 100.0);
        b.aggression = 1.0;
        b.hp = 0.5;
        let ka = ants.insert(a);
        let kb = ants.insert(b);

        let mut spatial = SpatialHash::new(10.0, 10.0, 1.0);
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let report = resolve_combat(&mut ants, &mut spatial, &mut rng);
        assert_eq!(report.exchanges, 1);
        assert_eq!(report.casualties, vec![(kb, 0)]);
        assert!(ants[ka].has_food);
        assert_eq!(ants[ka].state, AntState::ReturnHome);
        assert!(ants[kb].is_dead());
    }

    #[test]
    fn allies_and_distant_enemies_do_not_fight() {
        let mut ants: SlotMap<AntKey, Ant> = SlotMap::with_key();
        ants.insert(Ant::new(1, Caste::Soldier, 0, Vec2::new(1.0, 1.0), 0.0, 100.0));
        ants.insert(Ant::new(2, Caste::Soldier, 0, Vec2::new(1.2, 1.0), 0.0, 100.0));
        ants.insert(Ant::new(3, Caste::Soldier, 1, Vec2::new(8.0, 8.0), 0.0, 100.0));
        let mut spatial = SpatialHash::new(10.0, 10.0, 1.0);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let report = resolve_combat(&mut ants, &mut spatial, &mut rng);
        assert_eq!(report.exchanges, 0);
        assert!(report.casualties.is_empty());
    }
}
