use std::collections::BTreeMap;

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::Serialize;
use tracing::info;

use crate::config::generation::GenerationParams;
use crate::world::noise::{BIOME_OCTAVES, NoiseField};
use crate::world::structure::{self, StructureRecord};
use crate::world::tile::*;
use crate::world::World;

/// Fractal noise above this value is forest.
const FOREST_THRESHOLD: f64 = 0.1;
const MEADOW_GRASS_CHANCE: f64 = 0.95;
const FOREST_TREE_CHANCE: f64 = 0.7;
const SPAWN_EDGE_MARGIN: i32 = 25;
const SPAWN_ATTEMPTS: u32 = 10_000;

/// Generation phases. Each draws from its own generator seeded with
/// `seed + salt`, so reordering or changing one phase never shifts the
/// random draws of another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Terrain,
    Lakes,
    Rivers,
    Spawn,
    Structure,
    Wildlife,
}

impl Phase {
    fn salt(self) -> u64 {
        match self {
            Phase::Terrain => 1,
            Phase::Lakes => 2,
            Phase::Rivers => 3,
            Phase::Spawn => 4,
            Phase::Structure => 5,
            Phase::Wildlife => 6,
        }
    }

    pub fn seed(self, world_seed: u64) -> u64 {
        world_seed.wrapping_add(self.salt())
    }

    pub fn rng(self, world_seed: u64) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.seed(world_seed))
    }
}

/// Generate a new world from the given parameters.
///
/// If `params.seed` is 0, a random seed is chosen. The actual seed used
/// is stored in the returned World's `generation_params` so it can be
/// shared with peers and replayed.
pub fn generate_world(params: &GenerationParams) -> World {
    let seed = if params.seed == 0 {
        rand::thread_rng().r#gen()
    } else {
        params.seed
    };
    let resolved_params = GenerationParams {
        seed,
        ..params.clone()
    };

    let biomes = classify_biomes(params.width, params.height);
    let mut tiles = fill_terrain(&biomes, Phase::Terrain.seed(seed));
    carve_lakes(&mut tiles, &mut Phase::Lakes.rng(seed));
    carve_rivers(&mut tiles, &mut Phase::Rivers.rng(seed));
    let spawn = pick_spawn_point(&tiles, &mut Phase::Spawn.rng(seed));
    let (hx, hy) = structure::place(&mut tiles, Phase::Structure.seed(seed), spawn.0, spawn.1);

    info!(
        seed,
        width = params.width,
        height = params.height,
        water = tiles.count(Terrain::Water),
        "World generated"
    );

    World {
        generation_params: resolved_params,
        tiles,
        biomes,
        spawn,
        structure: StructureRecord::at(hx, hy),
    }
}

/// Biome map from four octaves of noise. Pure function of dimensions.
pub fn classify_biomes(width: u32, height: u32) -> BiomeGrid {
    let noise = NoiseField::new();
    let mut biomes = BiomeGrid::new(width, height, Biome::Meadow);
    biomes.par_rows_mut().enumerate().for_each(|(y, row)| {
        for (x, cell) in row.iter_mut().enumerate() {
            let value = noise.fractal(x as f64, y as f64, &BIOME_OCTAVES);
            *cell = if value > FOREST_THRESHOLD {
                Biome::Forest
            } else {
                Biome::Meadow
            };
        }
    });
    biomes
}

/// Grass and trees from the biome map. Each row draws from its own ChaCha
/// stream, so rows fill in parallel and the result stays seed-stable.
pub fn fill_terrain(biomes: &BiomeGrid, seed: u64) -> TileGrid {
    let width = biomes.width() as usize;
    let biome_cells = biomes.cells();
    let mut tiles = TileGrid::new(biomes.width(), biomes.height(), Terrain::Grass);
    tiles.par_rows_mut().enumerate().for_each(|(y, row)| {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        rng.set_stream(y as u64);
        let biome_row = &biome_cells[y * width..(y + 1) * width];
        for (cell, biome) in row.iter_mut().zip(biome_row) {
            let r: f64 = rng.r#gen();
            *cell = match biome {
                Biome::Meadow if r < MEADOW_GRASS_CHANCE => Terrain::Grass,
                Biome::Meadow => Terrain::Tree,
                Biome::Forest if r < FOREST_TREE_CHANCE => Terrain::Tree,
                Biome::Forest => Terrain::Grass,
            };
        }
    });
    tiles
}

// --- Water ---

/// Extent of one carved lake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LakeShape {
    pub center_x: i32,
    pub center_y: i32,
    pub radius_x: i32,
    pub radius_y: i32,
}

impl LakeShape {
    /// Squared normalized ellipse distance of `(x, y)` from the center.
    pub fn ellipse_value(&self, x: i32, y: i32) -> f64 {
        let nx = (x - self.center_x) as f64 / self.radius_x as f64;
        let ny = (y - self.center_y) as f64 / self.radius_y as f64;
        nx * nx + ny * ny
    }
}

/// 15 to 24 lakes at random centers.
pub fn carve_lakes<R: Rng + ?Sized>(tiles: &mut TileGrid, rng: &mut R) -> Vec<LakeShape> {
    let count = 15 + (rng.r#gen::<f64>() * 10.0) as usize;
    (0..count)
        .map(|_| {
            let cx = (rng.r#gen::<f64>() * tiles.width() as f64) as i32;
            let cy = (rng.r#gen::<f64>() * tiles.height() as f64) as i32;
            let size = 8 + (rng.r#gen::<f64>() * 20.0) as i32;
            carve_lake(tiles, cx, cy, size, rng)
        })
        .collect()
}

/// Carves one elliptical lake of horizontal radius `size` plus its bays.
///
/// The core (ellipse value < 0.3) is always water; the outer band is water
/// when `1 - ellipse + jitter` exceeds 0.3. One jitter draw is consumed per
/// in-bounds cell of the bounding box, so clipping at the map edge changes
/// the draw sequence but never writes out of bounds.
pub fn carve_lake<R: Rng + ?Sized>(
    tiles: &mut TileGrid,
    cx: i32,
    cy: i32,
    size: i32,
    rng: &mut R,
) -> LakeShape {
    let radius_x = size.max(1);
    let radius_y = ((size as f64 * (0.6 + rng.r#gen::<f64>() * 0.8)) as i32).max(1);
    let shape = LakeShape {
        center_x: cx,
        center_y: cy,
        radius_x,
        radius_y,
    };

    for y in cy - radius_y..=cy + radius_y {
        for x in cx - radius_x..=cx + radius_x {
            if !tiles.in_bounds(x, y) {
                continue;
            }
            let ellipse = shape.ellipse_value(x, y);
            let probability = 1.0 - ellipse + rng.r#gen::<f64>() * 0.4 - 0.2;
            if ellipse < 0.3 || (ellipse < 1.0 && probability > 0.3) {
                tiles.set(x, y, Terrain::Water);
            }
        }
    }

    let bay_count = 3 + (rng.r#gen::<f64>() * 4.0) as i32;
    for _ in 0..bay_count {
        let angle = rng.r#gen::<f64>() * std::f64::consts::TAU;
        let start_x = cx + (angle.cos() * radius_x as f64 * 0.8) as i32;
        let start_y = cy + (angle.sin() * radius_y as f64 * 0.8) as i32;
        carve_bay(tiles, start_x, start_y, angle, rng);
    }
    shape
}

/// Random walk outward from the shore, splashing a ragged disk each step.
fn carve_bay<R: Rng + ?Sized>(
    tiles: &mut TileGrid,
    start_x: i32,
    start_y: i32,
    mut direction: f64,
    rng: &mut R,
) {
    let length = 3 + (rng.r#gen::<f64>() * 8.0) as i32;
    let width = 1 + (rng.r#gen::<f64>() * 3.0) as i32;
    let (mut x, mut y) = (start_x, start_y);

    for _ in 0..length {
        x += (direction.cos() * 1.2) as i32;
        y += (direction.sin() * 1.2) as i32;
        for wy in -width..=width {
            for wx in -width..=width {
                let (tx, ty) = (x + wx, y + wy);
                if !tiles.in_bounds(tx, ty) {
                    continue;
                }
                if wx * wx + wy * wy <= width * width && rng.r#gen::<f64>() < 0.7 {
                    tiles.set(tx, ty, Terrain::Water);
                }
            }
        }
        direction += rng.r#gen::<f64>() * 0.5 - 0.25;
    }
}

/// 5 to 7 rivers entering from random map edges.
pub fn carve_rivers<R: Rng + ?Sized>(tiles: &mut TileGrid, rng: &mut R) -> usize {
    let width = tiles.width() as i32;
    let height = tiles.height() as i32;
    let count = 5 + (rng.r#gen::<f64>() * 3.0) as usize;
    for _ in 0..count {
        let (x, y) = if rng.r#gen::<f64>() < 0.5 {
            let x = (rng.r#gen::<f64>() * width as f64) as i32;
            let y = if rng.r#gen::<f64>() < 0.5 { 0 } else { height - 1 };
            (x, y)
        } else {
            let x = if rng.r#gen::<f64>() < 0.5 { 0 } else { width - 1 };
            let y = (rng.r#gen::<f64>() * height as f64) as i32;
            (x, y)
        };
        carve_river(tiles, x, y, rng);
    }
    count
}

fn random_sign<R: Rng + ?Sized>(rng: &mut R) -> i32 {
    if rng.r#gen::<f64>() < 0.5 { -1 } else { 1 }
}

/// Walks inward from `(start_x, start_y)` for 100 to 299 steps, stopping
/// early once it leaves the map.
pub fn carve_river<R: Rng + ?Sized>(tiles: &mut TileGrid, start_x: i32, start_y: i32, rng: &mut R) {
    let width = tiles.width() as i32;
    let height = tiles.height() as i32;
    let length = 100 + (rng.r#gen::<f64>() * 200.0) as i32;

    let edge_dir = |v: i32, len: i32| {
        if v == 0 {
            1
        } else if v == len - 1 {
            -1
        } else {
            0
        }
    };
    let mut dir_x = edge_dir(start_x, width);
    let mut dir_y = edge_dir(start_y, height);
    if dir_x == 0 && dir_y == 0 {
        if rng.r#gen::<f64>() < 0.5 {
            dir_x = random_sign(rng);
        } else {
            dir_y = random_sign(rng);
        }
    }

    let (mut x, mut y) = (start_x, start_y);
    for _ in 0..length {
        if !tiles.in_bounds(x, y) {
            break;
        }
        let river_width = 1 + (rng.r#gen::<f64>() * 2.0) as i32;
        paint_disk(tiles, x, y, river_width);

        x += dir_x;
        y += dir_y;

        if rng.r#gen::<f64>() < 0.3 {
            if rng.r#gen::<f64>() < 0.5 {
                dir_x = (dir_x + random_sign(rng)).clamp(-1, 1);
            } else {
                dir_y = (dir_y + random_sign(rng)).clamp(-1, 1);
            }
        }
    }
}

fn paint_disk(tiles: &mut TileGrid, x: i32, y: i32, radius: i32) {
    for wy in -radius..=radius {
        for wx in -radius..=radius {
            if wx * wx + wy * wy <= radius * radius {
                tiles.set(x + wx, y + wy, Terrain::Water);
            }
        }
    }
}

// --- Spawn ---

/// Seeded default spawn: a random open grass cell at least 25 cells from
/// every edge. Falls back to scanning outward from the center.
pub fn pick_spawn_point<R: Rng + ?Sized>(tiles: &TileGrid, rng: &mut R) -> (i32, i32) {
    let range = |len: u32| {
        let len = len as i32;
        if len > SPAWN_EDGE_MARGIN * 2 {
            SPAWN_EDGE_MARGIN..len - SPAWN_EDGE_MARGIN
        } else {
            0..len.max(1)
        }
    };
    let ok = |x: i32, y: i32| matches!(tiles.get(x, y), Some(Terrain::Grass));

    let (xs, ys) = (range(tiles.width()), range(tiles.height()));
    for _ in 0..SPAWN_ATTEMPTS {
        let x = rng.gen_range(xs.clone());
        let y = rng.gen_range(ys.clone());
        if ok(x, y) {
            return (x, y);
        }
    }

    let (cx, cy) = (tiles.width() as i32 / 2, tiles.height() as i32 / 2);
    let max_r = tiles.width().max(tiles.height()) as i32;
    for r in 0..max_r {
        for y in cy - r..=cy + r {
            for x in cx - r..=cx + r {
                if ok(x, y) {
                    return (x, y);
                }
            }
        }
    }
    (cx, cy)
}

// --- Reporting ---

/// Counts per terrain and biome, for display or JSON output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorldSummary {
    pub seed: u64,
    pub width: u32,
    pub height: u32,
    pub spawn: (i32, i32),
    pub structure: StructureRecord,
    pub terrain: BTreeMap<&'static str, usize>,
    pub biomes: BTreeMap<&'static str, usize>,
}

pub fn summarize(world: &World) -> WorldSummary {
    let mut terrain = BTreeMap::new();
    for t in world.tiles.cells() {
        *terrain.entry(t.name()).or_insert(0) += 1;
    }
    let mut biomes = BTreeMap::new();
    for b in world.biomes.cells() {
        *biomes.entry(b.name()).or_insert(0) += 1;
    }
    WorldSummary {
        seed: world.seed(),
        width: world.width(),
        height: world.height(),
        spawn: world.spawn,
        structure: world.structure,
        terrain,
        biomes,
    }
}

/// Print a summary of the generated world.
pub fn print_world_summary(world: &World) {
    let summary = summarize(world);
    let total = (summary.width as f32 * summary.height as f32).max(1.0);

    println!("=== World Summary ===");
    println!("Seed: {}", summary.seed);
    println!("Size: {}x{}", summary.width, summary.height);
    println!("Spawn: {}, {}", summary.spawn.0, summary.spawn.1);
    println!(
        "House: {}, {}",
        summary.structure.origin_x, summary.structure.origin_y
    );

    println!("\nTerrain:");
    for (name, count) in &summary.terrain {
        let pct = *count as f32 / total * 100.0;
        println!("  {:<14} {:>8} ({:.1}%)", name, count, pct);
    }
    println!("\nBiomes:");
    for (name, count) in &summary.biomes {
        let pct = *count as f32 / total * 100.0;
        println!("  {:<14} {:>8} ({:.1}%)", name, count, pct);
    }
}

/// Map symbols for a `width` x `height` window centered on `(cx, cy)`.
/// Cells outside the map are blank.
pub fn render_region(world: &World, cx: i32, cy: i32, width: u32, height: u32) -> String {
    let left = cx - width as i32 / 2;
    let top = cy - height as i32 / 2;
    let mut out = String::with_capacity(((width + 1) * height) as usize);
    for y in top..top + height as i32 {
        for x in left..left + width as i32 {
            out.push(world.terrain_at(x, y).map_or(' ', Terrain::symbol));
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_params(seed: u64) -> GenerationParams {
        GenerationParams {
            seed,
            width: 200,
            height: 160,
        }
    }

    #[test]
    fn same_seed_same_world() {
        let a = generate_world(&small_params(42));
        let b = generate_world(&small_params(42));
        assert_eq!(a.tiles, b.tiles);
        assert_eq!(a.biomes, b.biomes);
        assert_eq!(a.spawn, b.spawn);
        assert_eq!(a.structure, b.structure);
    }

    #[test]
    fn full_size_generation_is_deterministic() {
        let params = GenerationParams::with_seed(20240601);
        let a = generate_world(&params);
        let b = generate_world(&params);
        assert_eq!(a.width(), 1000);
        assert_eq!(a.height(), 1000);
        assert!(a.tiles == b.tiles, "tile grids differ for the same seed");
    }

    #[test]
    fn different_seeds_differ() {
        let a = generate_world(&small_params(1));
        let b = generate_world(&small_params(2));
        assert_ne!(a.tiles, b.tiles);
    }

    #[test]
    fn zero_seed_is_resolved() {
        let world = generate_world(&small_params(0));
        assert_ne!(world.seed(), 0);
        let replay = generate_world(&world.generation_params);
        assert_eq!(world.tiles, replay.tiles);
    }

    #[test]
    fn biomes_follow_noise_threshold() {
        let biomes = classify_biomes(120, 90);
        let noise = NoiseField::new();
        for y in 0..90 {
            for x in 0..120 {
                let v = noise.fractal(x as f64, y as f64, &BIOME_OCTAVES);
                let expected = if v > 0.1 { Biome::Forest } else { Biome::Meadow };
                assert_eq!(biomes.get(x, y), Some(expected));
            }
        }
    }

    #[test]
    fn terrain_fill_ratios_track_biome() {
        let biomes = classify_biomes(400, 400);
        let tiles = fill_terrain(&biomes, 99);
        let (mut meadow, mut meadow_grass, mut forest, mut forest_tree) = (0, 0, 0, 0);
        for (t, b) in tiles.cells().iter().zip(biomes.cells()) {
            match b {
                Biome::Meadow => {
                    meadow += 1;
                    meadow_grass += (*t == Terrain::Grass) as usize;
                }
                Biome::Forest => {
                    forest += 1;
                    forest_tree += (*t == Terrain::Tree) as usize;
                }
            }
        }
        assert!(meadow > 1000 && forest > 1000, "both biomes present");
        let grass_ratio = meadow_grass as f64 / meadow as f64;
        let tree_ratio = forest_tree as f64 / forest as f64;
        assert!((0.92..0.98).contains(&grass_ratio), "meadow grass {}", grass_ratio);
        assert!((0.65..0.75).contains(&tree_ratio), "forest trees {}", tree_ratio);
    }

    #[test]
    fn lake_core_is_water_and_reproducible() {
        let carve = || {
            let mut tiles = TileGrid::new(1000, 1000, Terrain::Grass);
            let mut rng = Phase::Lakes.rng(42);
            let shape = carve_lake(&mut tiles, 500, 500, 20, &mut rng);
            (tiles, shape)
        };
        let (tiles, shape) = carve();
        assert_eq!(shape.radius_x, 20);
        assert!((12..=28).contains(&shape.radius_y));
        let mut core = 0;
        for y in 500 - shape.radius_y..=500 + shape.radius_y {
            for x in 480..=520 {
                if shape.ellipse_value(x, y) < 0.3 {
                    core += 1;
                    assert_eq!(tiles.get(x, y), Some(Terrain::Water), "({}, {})", x, y);
                }
            }
        }
        assert!(core > 0);

        let (again, again_shape) = carve();
        assert_eq!(shape, again_shape);
        assert_eq!(tiles, again);
    }

    #[test]
    fn carving_at_corners_stays_in_bounds() {
        let mut tiles = TileGrid::new(64, 64, Terrain::Grass);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        carve_lake(&mut tiles, 0, 0, 27, &mut rng);
        carve_lake(&mut tiles, 63, 63, 27, &mut rng);
        carve_river(&mut tiles, 0, 63, &mut rng);
        carve_river(&mut tiles, 63, 10, &mut rng);
        assert_eq!(tiles.cells().len(), 64 * 64);
        assert!(tiles.get(0, 0) == Some(Terrain::Water));
    }

    #[test]
    fn river_from_top_edge_flows_down() {
        let mut tiles = TileGrid::new(100, 100, Terrain::Grass);
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        carve_river(&mut tiles, 50, 0, &mut rng);
        assert_eq!(tiles.get(50, 0), Some(Terrain::Water));
        assert!(tiles.count(Terrain::Water) > 10);
    }

    #[test]
    fn water_phases_only_add_water() {
        let biomes = classify_biomes(150, 150);
        let dry = fill_terrain(&biomes, 5);
        let mut wet = dry.clone();
        carve_lakes(&mut wet, &mut Phase::Lakes.rng(5));
        carve_rivers(&mut wet, &mut Phase::Rivers.rng(5));
        for (before, after) in dry.cells().iter().zip(wet.cells()) {
            assert!(after == before || *after == Terrain::Water);
        }
        assert!(wet.count(Terrain::Water) > 0);
    }

    #[test]
    fn spawn_is_on_grass_away_from_edges() {
        let world = generate_world(&small_params(8));
        let (x, y) = world.spawn;
        assert!((25..175).contains(&x));
        assert!((25..135).contains(&y));
        // the house may be stamped next to it but never on it
        assert!(world.is_spawnable(x, y));
    }

    #[test]
    fn house_is_stamped() {
        let world = generate_world(&small_params(8));
        let s = world.structure;
        assert!(s.generated);
        assert_eq!(world.terrain_at(s.origin_x + 2, s.origin_y + 4), Some(Terrain::WoodPlank));
        assert_eq!(world.tiles.count(Terrain::Roofed), 9);
    }

    #[test]
    fn summary_counts_every_cell() {
        let world = generate_world(&small_params(31));
        let summary = summarize(&world);
        let cells: usize = summary.terrain.values().sum();
        let biomes: usize = summary.biomes.values().sum();
        assert_eq!(cells, 200 * 160);
        assert_eq!(biomes, 200 * 160);
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["seed"], 31);
    }

    #[test]
    fn render_region_pads_outside_map() {
        let world = generate_world(&small_params(31));
        let view = render_region(&world, 0, 0, 4, 2);
        let lines: Vec<&str> = view.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "    ");
        assert_eq!(lines[1].chars().count(), 4);
        assert!(lines[1].starts_with("  "));
    }
}
