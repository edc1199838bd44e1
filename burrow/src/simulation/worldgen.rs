use noise::{Fbm, NoiseFn, Perlin};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use super::cell::{CellType, DirtType, Zone};
use super::rooms::{Room, RoomType};
use super::terrain::Terrain;
use super::{DEFAULT_FOOD_PER_CELL, FOOD_CLUSTER_RADIUS, HOME_ROOM_RADIUS};
use crate::config::SimulationConfig;

/// How far below the surface band nests are dug.
pub const NEST_DEPTH: i32 = 8;
/// Food is never generated this close to a nest.
pub const FOOD_NEST_CLEARANCE: f32 = 12.0;
const FOOD_SITE_ATTEMPTS: usize = 32;

/// Builds the initial terrain: open surface rows, dirt whose hardness grows
/// with depth and is perturbed by fractal noise, rock outcrops and a bedrock
/// floor. Nests and food are placed separately.
pub fn generate(config: &SimulationConfig) -> Terrain {
    let (w, h) = (config.width, config.height);
    let mut terrain = Terrain::filled(w, h, CellType::Dirt, DirtType::PackedEarth);
    let seed = config.seed as u32;
    let hardness: Fbm<Perlin> = Fbm::new(seed);
    let outcrops = Perlin::new(seed.wrapping_add(1));
    let rock_threshold = 1.0 - config.rock_density as f64 * 4.0;
    let surface = config.surface_rows as i32;

    for y in 0..h as i32 {
        for x in 0..w as i32 {
            let Some(idx) = terrain.index(x, y) else {
                continue;
            };
            if y < surface {
                terrain.cell_type[idx] = CellType::Air;
                terrain.dirt_health[idx] = 0.0;
                continue;
            }
            if y == h as i32 - 1 {
                terrain.cell_type[idx] = CellType::Rock;
                terrain.dirt_health[idx] = 0.0;
                continue;
            }

            let depth = (y - surface) as f32 / (h as i32 - surface).max(1) as f32;
            let n = hardness.get([x as f64 / w as f64 * 4.0, y as f64 / h as f64 * 4.0]) as f32;
            let tier = (depth * 5.0 + n * 1.5).round().clamp(0.0, 5.0) as u8;
            let dirt = DirtType::from_index(tier);
            terrain.dirt_type[idx] = dirt;

            let rock = outcrops.get([x as f64 * 0.08, y as f64 * 0.08]);
            if y > surface + 2 && rock > rock_threshold {
                terrain.cell_type[idx] = CellType::Rock;
                terrain.dirt_health[idx] = 0.0;
            } else {
                terrain.dirt_health[idx] = dirt.max_health();
            }
        }
    }
    terrain
}

/// Nest positions spread evenly along the band just below the surface.
pub fn nest_sites(config: &SimulationConfig) -> Vec<(i32, i32)> {
    let n = config.colonies.max(1) as i32;
    let y = (config.surface_rows as i32 + NEST_DEPTH).min(config.height as i32 - 6);
    (0..n)
        .map(|i| (config.width as i32 * (i + 1) / (n + 1), y))
        .collect()
}

/// Digs an entrance shaft from the surface down to `site` and carves the home
/// room around it. Returns the home room id.
pub fn carve_nest(terrain: &mut Terrain, colony_id: u8, site: (i32, i32)) -> Option<u32> {
    for y in 0..site.1 {
        if terrain.cell_type_at(site.0, y) != Some(CellType::Air) {
            terrain.set_cell(site.0, y, CellType::Air, None);
            terrain.set_zone(site.0, y, Zone::General);
        }
    }
    // Rock inside the chamber would leave it unusable.
    for (x, y) in super::rooms::circle_cells(site, HOME_ROOM_RADIUS) {
        if terrain.cell_type_at(x, y) == Some(CellType::Rock) && y < terrain.height as i32 - 1 {
            terrain.set_cell(x, y, CellType::Dirt, None);
        }
    }
    let room = terrain.add_room(Room::new(RoomType::Home, colony_id, site, HOME_ROOM_RADIUS))?;
    terrain.set_nest(colony_id, site.0, site.1);
    debug!(colony_id, x = site.0, y = site.1, "nest carved");
    Some(room)
}

/// A random cell that can take food and is not close to any nest.
pub fn random_food_site(terrain: &Terrain, rng: &mut ChaCha8Rng) -> Option<(i32, i32)> {
    let (w, h) = (terrain.width as i32, terrain.height as i32);
    if w < 3 || h < 3 {
        return None;
    }
    for _ in 0..FOOD_SITE_ATTEMPTS {
        let x = rng.gen_range(1..w - 1);
        let y = rng.gen_range(1..h - 1);
        if !matches!(terrain.cell_type_at(x, y), Some(CellType::Air | CellType::Dirt)) {
            continue;
        }
        let clear = terrain.nests.iter().flatten().all(|&(nx, ny)| {
            let dx = (nx - x) as f32;
            let dy = (ny - y) as f32;
            (dx * dx + dy * dy).sqrt() > FOOD_NEST_CLEARANCE
        });
        if clear {
            return Some((x, y));
        }
    }
    None
}

/// Scatters the configured number of food clusters. Returns the cells filled.
pub fn scatter_food(terrain: &mut Terrain, clusters: u32, rng: &mut ChaCha8Rng) -> u32 {
    let mut placed = 0;
    for _ in 0..clusters {
        if let Some(site) = random_food_site(terrain, rng) {
            placed += terrain.spawn_food_cluster(site, FOOD_CLUSTER_RADIUS, DEFAULT_FOOD_PER_CELL);
        }
    }
    placed
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn config() -> SimulationConfig {
        SimulationConfig {
            width: 64,
            height: 48,
            colonies: 2,
            ..SimulationConfig::default()
        }
        .sanitized()
    }

    #[test]
    fn generation_is_deterministic_and_consistent() {
        let a = generate(&config());
        let b = generate(&config());
        assert_eq!(a.cell_type, b.cell_type);
        assert_eq!(a.dirt_type, b.dirt_type);
        assert_eq!(a.inconsistent_cells(), 0);
        assert_eq!(a.cell_type_at(10, 0), Some(CellType::Air));
        assert_eq!(a.cell_type_at(10, 47), Some(CellType::Rock));
    }

    #[test]
    fn nests_are_carved_with_a_shaft() {
        let config = config();
        let mut terrain = generate(&config);
        let sites = nest_sites(&config);
        assert_eq!(sites.len(), 2);
        for (colony, &site) in sites.iter().enumerate() {
            assert!(carve_nest(&mut terrain, colony as u8, site).is_some());
            assert_eq!(terrain.nest(colony as u8), Some(site));
            for y in 0..site.1 {
                assert!(terrain.is_walkable(site.0, y));
            }
            assert!(terrain.home_room(colony as u8).is_some());
        }
        assert!(terrain.nest_distance(sites[0].0, 0, 0).is_some());
    }

    #[test]
    fn food_keeps_clear_of_nests() {
        let config = config();
        let mut terrain = generate(&config);
        let site = nest_sites(&config)[0];
        carve_nest(&mut terrain, 0, site);
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        assert!(scatter_food(&mut terrain, 4, &mut rng) > 0);
        let near = terrain.food_amount_near(site, 7);
        assert_eq!(near, 0);
    }
}
