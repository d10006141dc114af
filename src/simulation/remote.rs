use std::collections::BTreeMap;

use crate::net::protocol::PlayerId;
use crate::world::tile::Direction;

/// Last known state of a peer's avatar. Display only; never authoritative.
#[derive(Debug, Clone, PartialEq)]
pub struct RemotePlayer {
    pub id: PlayerId,
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub direction: Direction,
}

impl RemotePlayer {
    pub fn new(id: PlayerId, x: f64, y: f64) -> Self {
        RemotePlayer {
            id,
            name: format!("Player {}", id),
            x,
            y,
            direction: Direction::Down,
        }
    }
}

/// Remote avatars keyed by player id. Owned by the game loop and written
/// only while it drains session events.
#[derive(Debug, Clone, Default)]
pub struct RemoteRegistry {
    players: BTreeMap<PlayerId, RemotePlayer>,
}

impl RemoteRegistry {
    /// Registers a peer at `(x, y)` unless it is already known.
    pub fn add(&mut self, id: PlayerId, x: f64, y: f64) -> bool {
        if self.players.contains_key(&id) {
            return false;
        }
        self.players.insert(id, RemotePlayer::new(id, x, y));
        true
    }

    /// Overwrites a peer's position, creating it on first sight.
    pub fn apply_update(&mut self, id: PlayerId, x: f64, y: f64, direction: Direction) {
        let player = self
            .players
            .entry(id)
            .or_insert_with(|| RemotePlayer::new(id, x, y));
        player.x = x;
        player.y = y;
        player.direction = direction;
    }

    pub fn remove(&mut self, id: PlayerId) -> Option<RemotePlayer> {
        self.players.remove(&id)
    }

    pub fn get(&self, id: PlayerId) -> Option<&RemotePlayer> {
        self.players.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RemotePlayer> {
        self.players.values()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn clear(&mut self) {
        self.players.clear();
    }
}
