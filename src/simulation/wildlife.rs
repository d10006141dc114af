use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::world::generation::Phase;
use crate::world::tile::{Biome, Terrain, TileGrid};
use crate::world::World;

pub const RABBIT_HEALTH: i32 = 4;
pub const RABBIT_EXPERIENCE: i32 = 10;

const PLACEMENT_ATTEMPTS: u32 = 100;
const WANDER_CHANCE: f64 = 0.2;

/// A wandering rabbit. Only ever stands on grass.
#[derive(Debug, Clone)]
pub struct Rabbit {
    x: i32,
    y: i32,
    health: i32,
    move_cooldown: u32,
    rng: ChaCha8Rng,
}

impl Rabbit {
    pub fn new(x: i32, y: i32, rng_seed: u64) -> Self {
        Rabbit {
            x,
            y,
            health: RABBIT_HEALTH,
            move_cooldown: 0,
            rng: ChaCha8Rng::seed_from_u64(rng_seed),
        }
    }

    pub fn x(&self) -> i32 {
        self.x
    }

    pub fn y(&self) -> i32 {
        self.y
    }

    pub fn health(&self) -> i32 {
        self.health
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0
    }

    pub fn take_damage(&mut self, amount: i32) {
        self.health = (self.health - amount.max(0)).max(0);
    }

    /// One tick: count down, or maybe hop to a neighbouring grass cell and
    /// then rest for 20 to 39 ticks whether or not it moved.
    pub fn update(&mut self, tiles: &TileGrid) {
        if self.move_cooldown > 0 {
            self.move_cooldown -= 1;
            return;
        }
        if self.rng.gen_bool(WANDER_CHANCE) {
            let nx = self.x + self.rng.gen_range(-1..=1);
            let ny = self.y + self.rng.gen_range(-1..=1);
            if tiles.get(nx, ny) == Some(Terrain::Grass) {
                self.x = nx;
                self.y = ny;
            }
        }
        self.move_cooldown = self.rng.gen_range(20..40);
    }

    pub fn record(&self) -> RabbitRecord {
        RabbitRecord {
            x: self.x,
            y: self.y,
            health: self.health,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RabbitRecord {
    pub x: i32,
    pub y: i32,
    pub health: i32,
}

/// Result of a melee strike that connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Strike {
    pub remaining_health: i32,
    pub killed: bool,
}

/// The live wildlife collection.
#[derive(Debug, Clone, Default)]
pub struct WildlifePool {
    rabbits: Vec<Rabbit>,
}

impl WildlifePool {
    /// Seeds 30 to 49 rabbits onto meadow grass. A rabbit that finds no spot
    /// within 100 tries is skipped.
    pub fn seed(world: &World) -> Self {
        let mut rng = Phase::Wildlife.rng(world.seed());
        let wanted = 30 + (rng.r#gen::<f64>() * 20.0) as usize;
        let mut rabbits = Vec::with_capacity(wanted);

        for _ in 0..wanted {
            let spot = (0..PLACEMENT_ATTEMPTS).find_map(|_| {
                let x = (rng.r#gen::<f64>() * world.width() as f64) as i32;
                let y = (rng.r#gen::<f64>() * world.height() as f64) as i32;
                let meadow = world.biome_at(x, y) == Some(Biome::Meadow);
                let grass = world.terrain_at(x, y) == Some(Terrain::Grass);
                (meadow && grass).then_some((x, y))
            });
            if let Some((x, y)) = spot {
                rabbits.push(Rabbit::new(x, y, rng.next_u64()));
            }
        }

        debug!(seed = world.seed(), wanted, placed = rabbits.len(), "Wildlife seeded");
        WildlifePool { rabbits }
    }

    /// Rebuilds the pool from saved records; each rabbit gets a fresh
    /// generator derived from `seed` and its index.
    pub fn from_records(records: &[RabbitRecord], seed: u64) -> Self {
        let rabbits = records
            .iter()
            .enumerate()
            .map(|(i, r)| {
                let mut rabbit = Rabbit::new(r.x, r.y, seed.wrapping_add(i as u64));
                rabbit.health = r.health.clamp(0, RABBIT_HEALTH);
                rabbit
            })
            .collect();
        WildlifePool { rabbits }
    }

    pub fn records(&self) -> Vec<RabbitRecord> {
        self.rabbits.iter().map(Rabbit::record).collect()
    }

    pub fn rabbits(&self) -> &[Rabbit] {
        &self.rabbits
    }

    pub fn len(&self) -> usize {
        self.rabbits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rabbits.is_empty()
    }

    pub fn alive_count(&self) -> usize {
        self.rabbits.iter().filter(|r| r.is_alive()).count()
    }

    /// Steps every live rabbit, then drops the dead ones.
    pub fn update_all(&mut self, tiles: &TileGrid) {
        for rabbit in self.rabbits.iter_mut().filter(|r| r.is_alive()) {
            rabbit.update(tiles);
        }
        self.rabbits.retain(Rabbit::is_alive);
    }

    /// Damages the first live rabbit standing exactly on `(x, y)`.
    pub fn strike_at(&mut self, x: i32, y: i32, damage: i32) -> Option<Strike> {
        let rabbit = self
            .rabbits
            .iter_mut()
            .find(|r| r.is_alive() && r.x == x && r.y == y)?;
        rabbit.take_damage(damage);
        Some(Strike {
            remaining_health: rabbit.health,
            killed: !rabbit.is_alive(),
        })
    }
}
