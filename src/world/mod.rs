pub mod generation;
pub mod noise;
pub mod structure;
pub mod tile;

use serde::{Deserialize, Serialize};

use crate::config::generation::GenerationParams;
pub use structure::StructureRecord;
pub use tile::{Biome, BiomeGrid, Direction, Grid, Terrain, TileGrid};

/// A generated map: terrain and biome layers plus the placed building.
/// Wildlife is seeded from the same seed but owned by the simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct World {
    pub generation_params: GenerationParams,
    pub tiles: TileGrid,
    pub biomes: BiomeGrid,
    /// Default spawn cell for the local player.
    pub spawn: (i32, i32),
    pub structure: StructureRecord,
}

impl World {
    pub fn seed(&self) -> u64 {
        self.generation_params.seed
    }

    pub fn width(&self) -> u32 {
        self.tiles.width()
    }

    pub fn height(&self) -> u32 {
        self.tiles.height()
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        self.tiles.in_bounds(x, y)
    }

    pub fn terrain_at(&self, x: i32, y: i32) -> Option<Terrain> {
        self.tiles.get(x, y)
    }

    pub fn biome_at(&self, x: i32, y: i32) -> Option<Biome> {
        self.biomes.get(x, y)
    }

    /// Whether the player may stand on cell `(x, y)`.
    pub fn is_walkable(&self, x: i32, y: i32) -> bool {
        self.tiles.get(x, y).is_some_and(Terrain::is_passable)
    }

    /// Whether a player may be dropped on `(x, y)`: in bounds, passable, not a tree.
    pub fn is_spawnable(&self, x: i32, y: i32) -> bool {
        matches!(self.tiles.get(x, y), Some(t) if t.is_passable() && t != Terrain::Tree)
    }
}
