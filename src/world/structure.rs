//! Placement and stamping of the single building every world carries.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::world::tile::{Terrain, TileGrid};

/// Side length of the square house footprint.
pub const HOUSE_SIZE: i32 = 5;

const MAX_ATTEMPTS: u32 = 50;
const EDGE_MARGIN: i32 = 10;
/// Cardinal offsets tried once the random search is exhausted.
const FALLBACK_OFFSETS: [(i32, i32); 4] = [(5, 0), (-5, 0), (0, 5), (0, -5)];
const FORCED_OFFSET: (i32, i32) = (3, 3);

/// Where the building sits, if it was generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StructureRecord {
    pub generated: bool,
    pub origin_x: i32,
    pub origin_y: i32,
}

impl StructureRecord {
    pub fn at(origin_x: i32, origin_y: i32) -> Self {
        StructureRecord {
            generated: true,
            origin_x,
            origin_y,
        }
    }

    /// Whether `(x, y)` falls inside the 5x5 footprint.
    pub fn contains(&self, x: i32, y: i32) -> bool {
        self.generated
            && (self.origin_x..self.origin_x + HOUSE_SIZE).contains(&x)
            && (self.origin_y..self.origin_y + HOUSE_SIZE).contains(&y)
    }
}

/// Finds a site near `(reference_x, reference_y)` and stamps the house there.
/// Never fails: after the random search and the cardinal fallbacks it clears
/// a site by force. Returns the footprint origin (top-left cell).
pub fn place(tiles: &mut TileGrid, seed: u64, reference_x: i32, reference_y: i32) -> (i32, i32) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    for _ in 0..MAX_ATTEMPTS {
        let angle = rng.r#gen::<f64>() * std::f64::consts::TAU;
        let distance = rng.gen_range(10..25) as f64;
        let (x, y) = clamp_origin(
            tiles,
            reference_x + (angle.cos() * distance) as i32,
            reference_y + (angle.sin() * distance) as i32,
        );
        if is_clear_site(tiles, x, y) {
            stamp_house(tiles, x, y);
            debug!(x, y, "House placed");
            return (x, y);
        }
    }

    for (dx, dy) in FALLBACK_OFFSETS {
        let (x, y) = clamp_origin(tiles, reference_x + dx, reference_y + dy);
        if is_clear_site(tiles, x, y) {
            stamp_house(tiles, x, y);
            debug!(x, y, "House placed at fallback offset");
            return (x, y);
        }
    }

    let (x, y) = clamp_origin(
        tiles,
        reference_x + FORCED_OFFSET.0,
        reference_y + FORCED_OFFSET.1,
    );
    warn!(x, y, "No clear site for house, clearing one");
    clear_site(tiles, x, y);
    stamp_house(tiles, x, y);
    (x, y)
}

fn clamp_origin(tiles: &TileGrid, x: i32, y: i32) -> (i32, i32) {
    let clamp = |v: i32, len: u32| {
        let hi = (len as i32 - EDGE_MARGIN).max(0);
        let lo = EDGE_MARGIN.min(hi);
        v.clamp(lo, hi)
    };
    (clamp(x, tiles.width()), clamp(y, tiles.height()))
}

/// The 7x7 clearance square: the footprint plus a one-cell border.
fn site_cells(x: i32, y: i32) -> impl Iterator<Item = (i32, i32)> {
    (y - 1..=y + HOUSE_SIZE).flat_map(move |cy| (x - 1..=x + HOUSE_SIZE).map(move |cx| (cx, cy)))
}

/// A site is clear when the footprint and its border are all grass and in bounds.
pub fn is_clear_site(tiles: &TileGrid, x: i32, y: i32) -> bool {
    site_cells(x, y).all(|(cx, cy)| tiles.get(cx, cy) == Some(Terrain::Grass))
}

fn clear_site(tiles: &mut TileGrid, x: i32, y: i32) {
    for (cx, cy) in site_cells(x, y) {
        tiles.set(cx, cy, Terrain::Grass);
    }
}

/// Terrain of footprint cell `(dx, dy)`, both in `0..5`.
pub fn house_cell(dx: i32, dy: i32) -> Terrain {
    let last = HOUSE_SIZE - 1;
    let on_edge = dx == 0 || dy == 0 || dx == last || dy == last;
    let is_door = dx == HOUSE_SIZE / 2 && dy == last;
    let is_window = (dx == 0 || dx == last) && (dy == 1 || dy == 3);
    if is_door {
        Terrain::WoodPlank
    } else if is_window {
        Terrain::Glass
    } else if on_edge {
        Terrain::Stone
    } else {
        Terrain::Roofed
    }
}

/// Writes the fixed 5x5 layout with its top-left corner at `(x, y)`.
/// Cells falling outside the grid are skipped.
pub fn stamp_house(tiles: &mut TileGrid, x: i32, y: i32) {
    for dy in 0..HOUSE_SIZE {
        for dx in 0..HOUSE_SIZE {
            tiles.set(x + dx, y + dy, house_cell(dx, dy));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_matches_plan() {
        let plan = ["SSSSS", "GRRRG", "SRRRS", "GRRRG", "SSPSS"];
        for (dy, row) in plan.iter().enumerate() {
            for (dx, symbol) in row.chars().enumerate() {
                assert_eq!(
                    house_cell(dx as i32, dy as i32).symbol(),
                    symbol,
                    "cell ({}, {})",
                    dx,
                    dy
                );
            }
        }
    }

    #[test]
    fn door_and_interior_passable_walls_not() {
        let mut tiles = TileGrid::new(64, 64, Terrain::Grass);
        let (x, y) = place(&mut tiles, 9, 32, 32);
        for dy in 0..HOUSE_SIZE {
            for dx in 0..HOUSE_SIZE {
                let t = tiles.get(x + dx, y + dy).unwrap();
                let interior = (1..=3).contains(&dx) && (1..=3).contains(&dy);
                let door = dx == 2 && dy == 4;
                if interior || door {
                    assert!(t.is_structure_passable(), "({}, {}) = {:?}", dx, dy, t);
                } else {
                    assert!(!t.is_structure_passable(), "({}, {}) = {:?}", dx, dy, t);
                }
            }
        }
    }

    #[test]
    fn open_meadow_site_within_search_radius() {
        let mut tiles = TileGrid::new(200, 200, Terrain::Grass);
        let (x, y) = place(&mut tiles, 1234, 100, 100);
        let d = (((x - 100).pow(2) + (y - 100).pow(2)) as f64).sqrt();
        assert!((8.0..=26.0).contains(&d), "distance {}", d);
        assert_eq!(tiles.count(Terrain::Roofed), 9);
    }

    #[test]
    fn placement_is_seeded() {
        let mut a = TileGrid::new(128, 128, Terrain::Grass);
        let mut b = a.clone();
        assert_eq!(place(&mut a, 77, 60, 60), place(&mut b, 77, 60, 60));
        assert_eq!(a, b);
    }

    #[test]
    fn forest_forces_a_cleared_site() {
        let mut tiles = TileGrid::new(100, 100, Terrain::Tree);
        let (x, y) = place(&mut tiles, 5, 50, 50);
        assert_eq!((x, y), (53, 53));
        for (cx, cy) in site_cells(x, y) {
            let t = tiles.get(cx, cy).unwrap();
            assert_ne!(t, Terrain::Tree, "({}, {}) still wooded", cx, cy);
        }
        assert_eq!(tiles.get(x + 2, y + 4), Some(Terrain::WoodPlank));
    }

    #[test]
    fn origin_clamped_away_from_edges() {
        let mut tiles = TileGrid::new(100, 100, Terrain::Tree);
        let (x, y) = place(&mut tiles, 5, 0, 0);
        assert_eq!((x, y), (10, 10));
        let (x, y) = place(&mut tiles, 5, 99, 99);
        assert_eq!((x, y), (90, 90));
        // footprint still fits
        assert!(tiles.in_bounds(x + HOUSE_SIZE - 1, y + HOUSE_SIZE - 1));
    }

    #[test]
    fn record_contains_footprint_only() {
        let record = StructureRecord::at(10, 20);
        assert!(record.contains(10, 20));
        assert!(record.contains(14, 24));
        assert!(!record.contains(15, 24));
        assert!(!StructureRecord::default().contains(0, 0));
    }
}
