use burrow::simulation::{
    BuildKind, Caste, CellType, DeathCause, DirtType, Role, Room, RoomType, Terrain,
};
use burrow::{AntState, RecordingSink, Simulation, Tuning};
use macroquad::math::Vec2;
use shared::{NatureEventKind, SimEvent};

fn open_world(width: u32, height: u32) -> Simulation {
    Simulation::from_terrain(Terrain::new(width, height), 1234, Tuning::default())
}

#[test]
fn heavy_damage_collapses_packed_earth() {
    let mut terrain = Terrain::filled(10, 10, CellType::Dirt, DirtType::PackedEarth);
    assert_eq!(terrain.dirt_health_at(4, 4), 10.0);
    assert!(terrain.damage_dirt(4, 4, 15.0));
    assert_eq!(terrain.cell_type_at(4, 4), Some(CellType::Air));
    assert_eq!(terrain.dirt_health_at(4, 4), 0.0);
    assert_eq!(terrain.inconsistent_cells(), 0);
}

#[test]
fn worker_on_food_picks_it_up() {
    let mut sim = open_world(20, 20);
    let worker = sim
        .spawn_ant(Caste::Worker, 0, Vec2::new(5.5, 5.5))
        .unwrap();
    assert!(sim.terrain_mut().place_food(5, 5, 3));

    sim.tick(1.0 / 60.0);

    let ant = sim.ant(worker).unwrap();
    assert!(ant.has_food);
    assert_eq!(ant.state, AntState::ReturnHome);
    assert_eq!(sim.terrain().food_amount_at(5, 5), 2);
}

#[test]
fn last_food_unit_clears_the_cell() {
    let mut sim = open_world(20, 20);
    let worker = sim
        .spawn_ant(Caste::Worker, 0, Vec2::new(5.5, 5.5))
        .unwrap();
    sim.terrain_mut().place_food(5, 5, 1);

    sim.tick(1.0 / 60.0);

    assert!(sim.ant(worker).unwrap().has_food);
    assert_eq!(sim.terrain().cell_type_at(5, 5), Some(CellType::Air));
    assert_eq!(sim.terrain().food_amount_at(5, 5), 0);
}

#[test]
fn food_trail_decays_then_snaps_to_zero() {
    let mut terrain = Terrain::new(8, 8);
    assert!(terrain.deposit_food_pheromone(3, 3, 0.5, 0));
    terrain.decay(0.9, 0.05);
    assert!((terrain.food_pheromone_at(3, 3, 0) - 0.45).abs() < 1e-6);

    for _ in 0..40 {
        terrain.decay(0.9, 0.05);
    }
    assert_eq!(terrain.food_pheromone_at(3, 3, 0), 0.0);
    assert_eq!(terrain.pheromone_active_len(), 0);
}

#[test]
fn ready_queen_lays_one_egg_nearby() {
    let mut sim = open_world(40, 40);
    assert!(sim.spawn_colony(0, (20, 20)));
    sim.colony_mut(0).unwrap().food_stock = 10;
    let (queen_key, queen_pos) = sim
        .ants()
        .find(|(_, a)| a.caste() == Caste::Queen)
        .map(|(k, a)| (k, a.pos))
        .unwrap();
    if let Role::Queen(queen) = &mut sim.ant_mut(queen_key).unwrap().role {
        queen.lay_timer.force_ready();
    }

    sim.tick(1.0 / 60.0);

    let eggs: Vec<Vec2> = sim
        .ants()
        .filter(|(_, a)| a.caste() == Caste::Egg)
        .map(|(_, a)| a.pos)
        .collect();
    assert_eq!(eggs.len(), 1);
    assert!(eggs[0].distance(queen_pos) <= 2.0);
    assert_eq!(sim.colony(0).unwrap().food_stock, 10 - 3);
    assert_eq!(sim.colony(0).unwrap().count(Caste::Egg), 1);
}

#[test]
fn queen_without_food_or_orders_does_not_lay() {
    let mut sim = open_world(40, 40);
    sim.spawn_colony(0, (20, 20));
    let queen_key = sim
        .ants()
        .find(|(_, a)| a.caste() == Caste::Queen)
        .map(|(k, _)| k)
        .unwrap();
    if let Role::Queen(queen) = &mut sim.ant_mut(queen_key).unwrap().role {
        queen.lay_timer.force_ready();
    }
    sim.tick(1.0 / 60.0);
    assert_eq!(sim.count_caste(0, Caste::Egg), 0);
}

#[test]
fn rival_workers_fight_once_and_winner_eats() {
    let mut sim = open_world(20, 20);
    let winner = sim
        .spawn_ant(Caste::Worker, 0, Vec2::new(5.5, 5.5))
        .unwrap();
    let loser = sim
        .spawn_ant(Caste::Worker, 1, Vec2::new(6.0, 5.5))
        .unwrap();
    for key in [winner, loser] {
        sim.ant_mut(key).unwrap().aggression = 1.0;
    }
    sim.ant_mut(loser).unwrap().hp = 0.1;

    let report = sim.combat_pass();

    assert_eq!(report.exchanges, 1);
    assert_eq!(report.casualties, vec![(loser, 0)]);
    assert!(sim.ant(loser).is_none());
    let survivor = sim.ant(winner).unwrap();
    assert!(survivor.has_food);
    assert_eq!(survivor.state, AntState::ReturnHome);
    assert_eq!(sim.colony(1).unwrap().count(Caste::Worker), 0);
}

#[test]
fn killing_a_queen_in_battle_hands_the_colony_over() {
    let mut sim = open_world(60, 30);
    let sink = RecordingSink::new();
    sim.set_event_sink(Box::new(sink.clone()));
    sim.spawn_colony(0, (15, 15));
    sim.spawn_colony(1, (45, 15));
    sim.populate_colony(0, 5, 1, 1, 1);
    sim.populate_colony(1, 3, 0, 0, 0);

    let queen = sim
        .ants()
        .find(|(_, a)| a.colony_id == 0 && a.caste() == Caste::Queen)
        .map(|(k, a)| (k, a.pos))
        .unwrap();
    let attacker = sim
        .spawn_ant(Caste::Soldier, 1, queen.1 + Vec2::new(0.4, 0.0))
        .unwrap();
    sim.ant_mut(attacker).unwrap().aggression = 1.0;
    {
        let q = sim.ant_mut(queen.0).unwrap();
        q.hp = 0.1;
        q.aggression = 0.0;
    }

    let report = sim.combat_pass();
    assert!(report.casualties.contains(&(queen.0, 1)));

    assert!(sim.ants().all(|(_, a)| a.colony_id == 1));
    assert!(!sim.colony(0).unwrap().alive);
    assert!(sim.terrain().nest(0).is_none());
    assert!(sim.terrain().home_room(0).is_none());
    let expected = sim.ant_count() as u32;
    assert_eq!(sim.colony(1).unwrap().population(), expected);
    assert!(sink.events().iter().any(|e| matches!(
        e,
        SimEvent::ColonyConquered { winner: 1, loser: 0, ants_converted: 8 }
    )));
}

#[test]
fn old_age_queen_death_promotes_princess_instead_of_takeover() {
    let mut sim = open_world(60, 30);
    sim.spawn_colony(0, (15, 15));
    sim.spawn_colony(1, (45, 15));
    let princess = sim
        .spawn_ant(Caste::Princess, 0, Vec2::new(15.5, 15.5))
        .unwrap();
    let queen = sim
        .ants()
        .find(|(_, a)| a.colony_id == 0 && a.caste() == Caste::Queen)
        .map(|(k, _)| k)
        .unwrap();

    assert!(sim.kill_ant(queen, DeathCause::Combat { killer: 1 }));

    assert_eq!(sim.ant(princess).unwrap().caste(), Caste::Queen);
    assert_eq!(sim.ant(princess).unwrap().colony_id, 0);
    assert!(sim.colony(0).unwrap().alive);
    assert!(!sim.colony(0).unwrap().queenless);
}

#[test]
fn intruder_near_nest_raises_alert_and_builder_walls_it_off() {
    let mut sim = open_world(40, 40);
    sim.spawn_colony(0, (20, 20));
    sim.populate_colony(0, 0, 0, 0, 1);
    let intruder = sim
        .spawn_ant(Caste::Worker, 1, Vec2::new(28.5, 20.5))
        .unwrap();
    let intruder_id = sim.ant(intruder).unwrap().id;

    sim.management_pass();

    let alert = sim.colony(0).unwrap().defense.unwrap();
    assert_eq!(alert.target_id, intruder_id);
    let walls: Vec<_> = sim
        .build_queue()
        .iter()
        .filter(|t| t.kind == BuildKind::EmergencyDefense)
        .collect();
    assert_eq!(walls.len(), 1);
    let cells = walls[0].cells.clone();
    assert_eq!(cells.len(), 5);
    // Across the approach, five cells out toward the intruder.
    assert!(cells.iter().all(|&(x, _)| x == 25));

    // A second sighting refreshes the alert without queueing another wall.
    sim.management_pass();
    assert_eq!(
        sim.build_queue()
            .iter()
            .filter(|t| t.kind == BuildKind::EmergencyDefense)
            .count(),
        1
    );

    sim.kill_ant(intruder, DeathCause::Combat { killer: 0 });
    sim.build_queue_pass();
    let filled = |sim: &Simulation| {
        cells
            .iter()
            .filter(|&&(x, y)| sim.terrain().cell_type_at(x, y) == Some(CellType::Dirt))
            .count()
    };
    for _ in 0..3600 {
        if filled(&sim) >= 4 {
            break;
        }
        sim.tick(1.0 / 60.0);
    }
    assert!(filled(&sim) >= 4);
}

#[test]
fn defending_soldier_hits_harder() {
    let mut sim = open_world(20, 20);
    let soldier = sim
        .spawn_ant(Caste::Soldier, 0, Vec2::new(5.5, 5.5))
        .unwrap();
    let target = sim
        .spawn_ant(Caste::Worker, 1, Vec2::new(6.0, 5.5))
        .unwrap();
    sim.ant_mut(soldier).unwrap().aggression = 0.0;
    {
        let t = sim.ant_mut(target).unwrap();
        t.aggression = 0.0;
        t.defense = 0.0;
        t.max_hp = 1000.0;
        t.hp = 1000.0;
    }

    // Neither side is willing to fight.
    assert_eq!(sim.combat_pass().exchanges, 0);

    if let Role::Soldier(state) = &mut sim.ant_mut(soldier).unwrap().role {
        state.defending = true;
    }
    let attack = sim.ant(soldier).unwrap().attack;
    let rounds = 20;
    for _ in 0..rounds {
        assert_eq!(sim.combat_pass().exchanges, 1);
    }
    let dealt = 1000.0 - sim.ant(target).unwrap().hp;
    // Without the bonus a blow never exceeds attack * 1.3.
    assert!(dealt > attack * 1.3 * rounds as f32);
    assert_eq!(sim.ant(soldier).unwrap().hp, sim.ant(soldier).unwrap().max_hp);
}

#[test]
fn separation_pushes_apart_unless_a_nestmate_is_stuck() {
    let mut sim = open_world(20, 20);
    let a = sim.spawn_ant(Caste::Worker, 0, Vec2::new(10.5, 10.5)).unwrap();
    let b = sim.spawn_ant(Caste::Worker, 0, Vec2::new(10.7, 10.5)).unwrap();
    sim.separation_pass();
    let gap = sim.ant(a).unwrap().pos.distance(sim.ant(b).unwrap().pos);
    assert!(gap > 0.3);

    let c = sim.spawn_ant(Caste::Worker, 0, Vec2::new(4.5, 4.5)).unwrap();
    let d = sim.spawn_ant(Caste::Worker, 0, Vec2::new(4.7, 4.5)).unwrap();
    sim.ant_mut(c).unwrap().stuck_time = 3.0;
    sim.separation_pass();
    assert_eq!(sim.ant(c).unwrap().pos, Vec2::new(4.5, 4.5));
    assert_eq!(sim.ant(d).unwrap().pos, Vec2::new(4.7, 4.5));

    // Rivals never phase through each other.
    let e = sim.spawn_ant(Caste::Worker, 1, Vec2::new(15.5, 15.5)).unwrap();
    let f = sim.spawn_ant(Caste::Worker, 0, Vec2::new(15.7, 15.5)).unwrap();
    sim.ant_mut(e).unwrap().stuck_time = 3.0;
    sim.separation_pass();
    assert!(sim.ant(e).unwrap().pos.distance(sim.ant(f).unwrap().pos) > 0.3);
}

#[test]
fn long_stuck_ants_are_sent_back_to_the_nest() {
    let mut sim = open_world(40, 40);
    sim.spawn_colony(0, (20, 20));
    let nest = sim.colony(0).unwrap().nest_pos().unwrap();
    let stuck = sim.spawn_ant(Caste::Worker, 0, Vec2::new(5.5, 5.5)).unwrap();
    let waiting = sim.spawn_ant(Caste::Worker, 0, Vec2::new(8.5, 5.5)).unwrap();
    sim.ant_mut(stuck).unwrap().stuck_time = 25.0;
    sim.ant_mut(waiting).unwrap().stuck_time = 10.0;

    sim.culling_pass();

    let rescued = sim.ant(stuck).unwrap();
    assert_eq!(rescued.pos, nest);
    assert_eq!(rescued.stuck_time, 0.0);
    let other = sim.ant(waiting).unwrap();
    assert_eq!(other.pos, Vec2::new(8.5, 5.5));
    assert_eq!(other.stuck_time, 10.0);
}

#[test]
fn starving_colony_gets_food_nearby() {
    let mut sim = open_world(60, 60);
    sim.spawn_colony(0, (40, 40));
    sim.terrain_mut().place_food(2, 2, 5);
    assert_eq!(sim.colony(0).unwrap().food_stock, 0);
    assert_eq!(sim.terrain().food_amount_near((40, 40), 25), 0);

    sim.food_maintenance();

    assert!(sim.terrain().food_amount_near((40, 40), 25) > 0);
    assert_eq!(sim.terrain().food_amount_at(2, 2), 5);

    // A stocked colony is left alone.
    let mut fed = open_world(60, 60);
    fed.spawn_colony(0, (40, 40));
    fed.terrain_mut().place_food(2, 2, 5);
    fed.colony_mut(0).unwrap().food_stock = 50;
    fed.food_maintenance();
    assert_eq!(fed.terrain().food_amount_near((40, 40), 25), 0);
}

#[test]
fn crowded_room_gets_an_expansion_built() {
    let mut sim = open_world(60, 60);
    let sink = RecordingSink::new();
    sim.set_event_sink(Box::new(sink.clone()));
    sim.spawn_colony(0, (30, 20));
    let nursery = sim
        .terrain_mut()
        .add_room(Room::new(RoomType::Nursery, 0, (30, 32), 3.0))
        .unwrap();
    let capacity = sim.terrain().room(nursery).unwrap().capacity;
    for _ in 0..=capacity {
        sim.spawn_ant(Caste::Worker, 0, Vec2::new(30.5, 32.5)).unwrap();
    }
    let nest = sim.colony(0).unwrap().nest_pos().unwrap();
    sim.spawn_ant(Caste::Builder, 0, nest).unwrap();

    sim.build_queue_pass();

    let room = sim.terrain().room(nursery).unwrap();
    assert_eq!(room.occupancy, capacity + 1);
    assert!(room.over_capacity);
    let task = sim
        .build_queue()
        .iter()
        .find(|t| t.kind == BuildKind::Room(RoomType::Nursery))
        .unwrap();
    assert!(!room.overlaps(task.target, task.radius));
    assert!(task.assigned.is_some());

    // Open ground needs no digging, so the builder finishes at once.
    sim.tick(1.0 / 60.0);
    let nurseries = sim
        .terrain()
        .rooms()
        .iter()
        .filter(|r| r.colony_id == 0 && r.room_type == RoomType::Nursery)
        .count();
    assert_eq!(nurseries, 2);
    assert!(sink.events().iter().any(|e| matches!(
        e,
        SimEvent::RoomBuilt { colony_id: 0, room_id, .. } if *room_id != nursery
    )));
}

#[test]
fn rainstorm_washes_trails_and_bloom_adds_food() {
    let mut sim = open_world(30, 30);
    let sink = RecordingSink::new();
    sim.set_event_sink(Box::new(sink.clone()));
    sim.terrain_mut().deposit_food_pheromone(5, 5, 0.8, 0);
    sim.terrain_mut().deposit_home_pheromone(6, 6, 0.015, 0);

    sim.apply_nature_event(NatureEventKind::Rainstorm);

    assert!((sim.terrain().food_pheromone_at(5, 5, 0) - 0.4).abs() < 1e-6);
    assert_eq!(sim.terrain().home_pheromone_at(6, 6, 0), 0.0);

    assert_eq!(sim.terrain_mut().food_cell_count(), 0);
    sim.apply_nature_event(NatureEventKind::FoodBloom);
    assert!(sim.terrain_mut().food_cell_count() > 0);

    let events = sink.events();
    assert!(events.iter().any(|e| matches!(
        e,
        SimEvent::NatureEvent { kind: NatureEventKind::Rainstorm, .. }
    )));
    let bloom = events.iter().find_map(|e| match e {
        SimEvent::NatureEvent { kind: NatureEventKind::FoodBloom, x, y } => Some((*x, *y)),
        _ => None,
    });
    let (x, y) = bloom.unwrap();
    assert!(sim.terrain().food_amount_at(x as i32, y as i32) > 0);
}
