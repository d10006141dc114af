use std::io;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::generation::GenerationParams;
use crate::simulation::player::PlayerRecord;
use crate::simulation::wildlife::RabbitRecord;
use crate::world::{BiomeGrid, StructureRecord, TileGrid, World};

/// Leading bytes of every save blob.
pub const MAGIC: &[u8; 4] = b"WMSV";
/// Bumped whenever the payload layout changes incompatibly.
pub const FORMAT_VERSION: u32 = 1;

const HEADER_LEN: usize = MAGIC.len() + 4;

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("encoding error: {0}")]
    Encode(#[from] bincode::Error),
    #[error("not a save file (bad magic)")]
    BadMagic,
    #[error("save format version {found} is not supported (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("corrupt save: {0}")]
    Corrupt(String),
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("no save named '{0}'")]
    NotFound(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveMetadata {
    pub name: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
    pub format_version: u32,
}

/// Everything needed to put a game back exactly where it was.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveSnapshot {
    pub metadata: SaveMetadata,
    pub player: PlayerRecord,
    pub world_seed: u64,
    pub tiles: TileGrid,
    pub biomes: BiomeGrid,
    pub spawn: (i32, i32),
    pub wildlife: Vec<RabbitRecord>,
    pub structure: StructureRecord,
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

impl SaveSnapshot {
    pub fn capture(
        name: &str,
        world: &World,
        player: PlayerRecord,
        wildlife: Vec<RabbitRecord>,
    ) -> Self {
        SaveSnapshot {
            metadata: SaveMetadata {
                name: name.to_string(),
                timestamp_ms: now_millis(),
                format_version: FORMAT_VERSION,
            },
            player,
            world_seed: world.seed(),
            tiles: world.tiles.clone(),
            biomes: world.biomes.clone(),
            spawn: world.spawn,
            wildlife,
            structure: world.structure,
        }
    }

    /// Rebuilds the world layers exactly as saved, without regenerating.
    pub fn world(&self) -> World {
        World {
            generation_params: GenerationParams {
                seed: self.world_seed,
                width: self.tiles.width(),
                height: self.tiles.height(),
            },
            tiles: self.tiles.clone(),
            biomes: self.biomes.clone(),
            spawn: self.spawn,
            structure: self.structure,
        }
    }

    /// Checks cross-field consistency that the decoder alone cannot.
    pub fn validate(&self) -> Result<(), SaveError> {
        let (w, h) = (self.tiles.width(), self.tiles.height());
        if w == 0 || h == 0 {
            return Err(SaveError::Corrupt("empty tile grid".into()));
        }
        if (self.biomes.width(), self.biomes.height()) != (w, h) {
            return Err(SaveError::Corrupt(format!(
                "biome grid {}x{} does not match tile grid {}x{}",
                self.biomes.width(),
                self.biomes.height(),
                w,
                h
            )));
        }
        if !self.player.x.is_finite() || !self.player.y.is_finite() {
            return Err(SaveError::Corrupt("player position is not finite".into()));
        }
        if !self.tiles.in_bounds(self.spawn.0, self.spawn.1) {
            return Err(SaveError::Corrupt(format!(
                "spawn ({}, {}) outside the map",
                self.spawn.0, self.spawn.1
            )));
        }
        if let Some(r) = self.wildlife.iter().find(|r| !self.tiles.in_bounds(r.x, r.y)) {
            return Err(SaveError::Corrupt(format!(
                "rabbit at ({}, {}) outside the map",
                r.x, r.y
            )));
        }
        Ok(())
    }
}

/// Binary form: magic, little-endian version, then the bincode payload.
pub fn encode(snapshot: &SaveSnapshot) -> Result<Vec<u8>, SaveError> {
    let mut blob = Vec::with_capacity(HEADER_LEN + snapshot.tiles.cells().len() * 2 + 256);
    blob.extend_from_slice(MAGIC);
    blob.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    bincode::serialize_into(&mut blob, snapshot)?;
    Ok(blob)
}

/// Checks the header before touching the payload, so a newer format is
/// rejected instead of misread.
pub fn decode(blob: &[u8]) -> Result<SaveSnapshot, SaveError> {
    if blob.len() < HEADER_LEN || &blob[..MAGIC.len()] != MAGIC {
        return Err(SaveError::BadMagic);
    }
    let mut version = [0u8; 4];
    version.copy_from_slice(&blob[MAGIC.len()..HEADER_LEN]);
    let found = u32::from_le_bytes(version);
    if found != FORMAT_VERSION {
        return Err(SaveError::UnsupportedVersion {
            found,
            expected: FORMAT_VERSION,
        });
    }

    let snapshot: SaveSnapshot = bincode::deserialize(&blob[HEADER_LEN..])?;
    if snapshot.metadata.format_version != found {
        return Err(SaveError::Corrupt(format!(
            "header version {} disagrees with metadata version {}",
            found, snapshot.metadata.format_version
        )));
    }
    snapshot.validate()?;
    Ok(snapshot)
}

/// Line-safe form used for network transfer.
pub fn encode_text(snapshot: &SaveSnapshot) -> Result<String, SaveError> {
    Ok(STANDARD.encode(encode(snapshot)?))
}

pub fn decode_text(text: &str) -> Result<SaveSnapshot, SaveError> {
    let blob = STANDARD.decode(text.trim())?;
    decode(&blob)
}
