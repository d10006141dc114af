pub mod camera;
pub mod player;
pub mod remote;
pub mod wildlife;

use std::f64::consts::TAU;
use std::net::SocketAddr;

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use crate::config::game::GameConfig;
use crate::config::generation::GenerationParams;
use crate::net::protocol::{Message, PlayerId, HOST_ID};
use crate::net::transfer::transfer_messages;
use crate::net::{Role, Session, SessionEvent};
use crate::persistence::{decode_text, encode_text, SaveSnapshot, SaveStore};
use crate::world::generation::generate_world;
use crate::world::tile::Direction;
use crate::world::World;
use camera::Camera;
use player::{Player, ATTACK_DAMAGE, STEP};
use remote::RemoteRegistry;
use wildlife::{WildlifePool, RABBIT_EXPERIENCE};

const CLIENT_SPAWN_ATTEMPTS: u32 = 50;
const CLIENT_SPAWN_MIN: f64 = 5.0;
const CLIENT_SPAWN_MAX: f64 = 15.0;
/// Used when no random candidate near the host is valid.
const CLIENT_SPAWN_FALLBACK: (i32, i32) = (5, 5);

/// What a melee swing did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackOutcome {
    /// Target further than the attack range; nothing happened.
    OutOfRange,
    Miss,
    Hit { remaining_health: i32 },
    Kill,
}

/// One running game: world, local player, wildlife, camera, and an optional
/// multiplayer session. `tick` is the only place state advances; network
/// input is applied at the start of each tick.
pub struct Game {
    config: GameConfig,
    world: World,
    player: Player,
    wildlife: WildlifePool,
    camera: Camera,
    remotes: RemoteRegistry,
    session: Option<Session>,
    store: SaveStore,
    rng: ChaCha8Rng,
    tick_count: u64,
}

impl Game {
    pub fn new(config: GameConfig, params: &GenerationParams) -> Self {
        let world = generate_world(params);
        let wildlife = WildlifePool::seed(&world);
        let player = Player::new(world.spawn.0 as f64, world.spawn.1 as f64);
        let mut camera = Camera::new(config.viewport_width, config.viewport_height);
        camera.center_on(player.x(), player.y(), world.width(), world.height());
        let store = SaveStore::new(&config.save_directory);

        Game {
            config,
            world,
            player,
            wildlife,
            camera,
            remotes: RemoteRegistry::default(),
            session: None,
            store,
            rng: ChaCha8Rng::from_entropy(),
            tick_count: 0,
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn seed(&self) -> u64 {
        self.world.seed()
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn wildlife(&self) -> &WildlifePool {
        &self.wildlife
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn remotes(&self) -> &RemoteRegistry {
        &self.remotes
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn role(&self) -> Option<Role> {
        self.session.as_ref().map(Session::role)
    }

    pub fn is_host(&self) -> bool {
        self.role() == Some(Role::Host)
    }

    /// Our player id in the session, once known.
    pub fn local_id(&self) -> Option<PlayerId> {
        self.session.as_ref().and_then(Session::local_id)
    }

    pub fn session_addr(&self) -> Option<SocketAddr> {
        self.session.as_ref().map(Session::addr)
    }

    /// Advances the game by one fixed step.
    pub fn tick(&mut self) {
        self.tick_count += 1;
        self.apply_session_events();

        self.player.update(&mut self.rng);
        self.wildlife.update_all(&self.world.tiles);
        self.camera.follow(
            self.player.x(),
            self.player.y(),
            self.world.width(),
            self.world.height(),
        );

        self.broadcast_position();
        let interval = self.config.ping_interval_ticks as u64;
        if self.is_host() && interval > 0 && self.tick_count % interval == 0 {
            if let Some(session) = self.session.as_mut() {
                session.broadcast(&Message::Ping);
            }
        }
    }

    /// Takes one step if the cooldown allows it and the destination cell
    /// is walkable: anything but water, stone walls and glass windows.
    pub fn try_move(&mut self, direction: Direction, running: bool) -> bool {
        if !self.player.is_alive() || !self.player.can_move() {
            return false;
        }
        let (dx, dy) = direction.delta();
        let (dx, dy) = (dx * STEP, dy * STEP);
        let nx = (self.player.x() + dx).floor() as i32;
        let ny = (self.player.y() + dy).floor() as i32;
        if !self.world.is_walkable(nx, ny) {
            return false;
        }
        self.player.apply_move(dx, dy, direction, running, &mut self.rng);
        true
    }

    /// Melee swing at a world point. At most one rabbit is affected.
    pub fn attack_at(&mut self, x: f64, y: f64) -> AttackOutcome {
        if !self.player.can_attack_to(x, y) {
            return AttackOutcome::OutOfRange;
        }
        self.player.face_towards(x, y);
        let (cx, cy) = self.player.attack_target_cell(x, y);

        match self.wildlife.strike_at(cx, cy, ATTACK_DAMAGE) {
            None => AttackOutcome::Miss,
            Some(strike) if strike.killed => {
                self.player.add_experience(RABBIT_EXPERIENCE);
                debug!(x = cx, y = cy, "Rabbit killed");
                AttackOutcome::Kill
            }
            Some(strike) => AttackOutcome::Hit {
                remaining_health: strike.remaining_health,
            },
        }
    }

    /// Replaces the world with a fresh one from `seed` (0 picks a random
    /// seed). The player keeps their vitals and stays on the same cell.
    /// A host tells its clients about the new seed.
    pub fn regenerate(&mut self, seed: u64) {
        let params = GenerationParams {
            seed,
            width: self.world.width(),
            height: self.world.height(),
        };
        self.world = generate_world(&params);
        self.wildlife = WildlifePool::seed(&self.world);

        let (x, y) = (self.player.x().floor(), self.player.y().floor());
        self.player.teleport(x, y);
        self.recenter_camera();

        let seed = self.world.seed();
        info!(seed, "World regenerated");
        if self.is_host() {
            if let Some(session) = self.session.as_mut() {
                session.broadcast(&Message::WorldSeed(seed));
            }
        }
    }

    /// Starts over as a fresh player on cell `(x, y)`.
    pub fn set_spawn(&mut self, x: i32, y: i32) {
        self.player = Player::new(x as f64, y as f64);
        self.recenter_camera();
    }

    fn recenter_camera(&mut self) {
        self.camera.center_on(
            self.player.x(),
            self.player.y(),
            self.world.width(),
            self.world.height(),
        );
    }

    // === Multiplayer ===

    /// Hosts on the configured bind address and port.
    pub async fn start_host(&mut self) -> bool {
        let addr = format!("{}:{}", self.config.bind, self.config.port);
        self.start_host_on(&addr).await
    }

    pub async fn start_host_on(&mut self, addr: &str) -> bool {
        self.leave_session();
        match Session::host(addr).await {
            Ok(session) => {
                info!(addr = %session.addr(), seed = self.seed(), "Hosting game");
                self.session = Some(session);
                true
            }
            Err(e) => {
                warn!(%addr, error = %e, "Could not host");
                false
            }
        }
    }

    /// Connects to a host. The world is replaced once the host's
    /// assignment arrives on a later tick.
    pub async fn join(&mut self, addr: &str) -> bool {
        self.leave_session();
        match Session::join(addr).await {
            Ok(session) => {
                self.session = Some(session);
                true
            }
            Err(e) => {
                warn!(%addr, error = %e, "Could not join");
                false
            }
        }
    }

    pub fn leave_session(&mut self) {
        if let Some(session) = self.session.take() {
            session.disconnect();
        }
        self.remotes.clear();
    }

    /// Sends the whole current world to every client as a chunked save.
    pub fn share_world(&mut self) -> bool {
        if !self.is_host() {
            return false;
        }
        let Some(messages) = self.world_transfer() else {
            return false;
        };
        if let Some(session) = self.session.as_mut() {
            for message in &messages {
                session.broadcast(message);
            }
        }
        true
    }

    fn world_transfer(&self) -> Option<Vec<Message>> {
        match encode_text(&self.snapshot("shared")) {
            Ok(text) => Some(transfer_messages(&text)),
            Err(e) => {
                warn!(error = %e, "Could not encode world for transfer");
                None
            }
        }
    }

    fn broadcast_position(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let Some(id) = session.local_id() else {
            return;
        };
        session.broadcast(&Message::PlayerUpdate {
            id,
            x: self.player.x(),
            y: self.player.y(),
            direction: self.player.direction(),
        });
    }

    fn apply_session_events(&mut self) {
        let events = match self.session.as_mut() {
            Some(session) => session.poll_events(),
            None => return,
        };
        for event in events {
            self.apply_event(event);
        }
    }

    fn apply_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::PeerJoined { id } => self.welcome(id),
            SessionEvent::PeerLeft { id } => {
                self.remotes.remove(id);
                if id == HOST_ID && !self.is_host() {
                    info!("Host left, session closed");
                    self.leave_session();
                }
            }
            SessionEvent::PlayerAssigned {
                id,
                spawn_x,
                spawn_y,
                seed,
            } => {
                info!(player_id = id, seed, spawn_x, spawn_y, "Assigned by host");
                if seed != self.seed() {
                    self.regenerate(seed);
                }
                self.set_spawn(spawn_x, spawn_y);
            }
            SessionEvent::WorldSeed(seed) => {
                if seed != self.seed() {
                    self.regenerate(seed);
                }
            }
            SessionEvent::RemoteUpdate { id, x, y, direction } => {
                if Some(id) != self.local_id() {
                    self.remotes.apply_update(id, x, y, direction);
                }
            }
            SessionEvent::WorldTransfer(text) => match decode_text(&text) {
                Ok(snapshot) => self.adopt_world(&snapshot),
                Err(e) => warn!(error = %e, "Discarding received world"),
            },
            SessionEvent::Pong { from } => debug!(player_id = from, "Pong"),
        }
    }

    /// Host side of a new connection: pick a spawn near us, register the
    /// avatar, then send the assignment and seed.
    fn welcome(&mut self, id: PlayerId) {
        let (spawn_x, spawn_y) = self.client_spawn_near();
        let seed = self.seed();
        self.remotes.add(id, spawn_x as f64, spawn_y as f64);
        info!(player_id = id, spawn_x, spawn_y, "Player joined");

        let share = self.config.share_world_on_join;
        let transfer = if share { self.world_transfer() } else { None };
        if let Some(session) = self.session.as_mut() {
            session.send_to(
                id,
                &Message::PlayerAssign {
                    id,
                    spawn_x,
                    spawn_y,
                    seed,
                },
            );
            session.send_to(id, &Message::WorldSeed(seed));
            for message in transfer.iter().flatten() {
                session.send_to(id, message);
            }
        }
    }

    /// A walkable, non-tree cell 5 to 15 tiles from the host, or a fixed
    /// offset from the host's cell when 50 random tries all fail.
    fn client_spawn_near(&mut self) -> (i32, i32) {
        let (hx, hy) = (self.player.x(), self.player.y());
        let (host_cx, host_cy) = (self.player.tile_x(), self.player.tile_y());

        for _ in 0..CLIENT_SPAWN_ATTEMPTS {
            let angle = self.rng.r#gen::<f64>() * TAU;
            let distance =
                CLIENT_SPAWN_MIN + self.rng.r#gen::<f64>() * (CLIENT_SPAWN_MAX - CLIENT_SPAWN_MIN);
            let x = (hx + angle.cos() * distance).floor() as i32;
            let y = (hy + angle.sin() * distance).floor() as i32;
            let (dx, dy) = ((x - host_cx) as f64, (y - host_cy) as f64);
            let cell_distance = (dx * dx + dy * dy).sqrt();
            if self.world.is_spawnable(x, y)
                && (CLIENT_SPAWN_MIN..=CLIENT_SPAWN_MAX).contains(&cell_distance)
            {
                return (x, y);
            }
        }

        warn!("No valid spawn near host, using fixed offset");
        client_spawn_fallback(host_cx, host_cy, &self.world)
    }

    /// Takes over a world sent by the host. Our own player is kept, moved
    /// to the world's spawn if it would otherwise be off the map.
    fn adopt_world(&mut self, snapshot: &SaveSnapshot) {
        self.world = snapshot.world();
        self.wildlife = WildlifePool::from_records(&snapshot.wildlife, self.rng.next_u64());
        if !self.world.in_bounds(self.player.tile_x(), self.player.tile_y()) {
            let (x, y) = self.world.spawn;
            self.player.teleport(x as f64, y as f64);
        }
        self.recenter_camera();
        info!(seed = self.seed(), rabbits = self.wildlife.len(), "Adopted world from host");
    }

    // === Saves ===

    pub fn snapshot(&self, name: &str) -> SaveSnapshot {
        SaveSnapshot::capture(name, &self.world, self.player.record(), self.wildlife.records())
    }

    /// Puts the game back to a saved state. No regeneration happens; the
    /// saved grids are used as-is.
    pub fn restore(&mut self, snapshot: &SaveSnapshot) {
        self.world = snapshot.world();
        self.wildlife = WildlifePool::from_records(&snapshot.wildlife, self.rng.next_u64());
        self.player = Player::restore(&snapshot.player);
        self.recenter_camera();
    }

    pub fn save_game(&self, name: &str) -> bool {
        match self.store.save(&self.snapshot(name)) {
            Ok(path) => {
                info!(path = %path.display(), "Game saved");
                true
            }
            Err(e) => {
                warn!(name, error = %e, "Save failed");
                false
            }
        }
    }

    pub fn load_game(&mut self, name: &str) -> bool {
        match self.store.load(name) {
            Ok(snapshot) => {
                self.restore(&snapshot);
                info!(name, seed = self.seed(), "Game loaded");
                true
            }
            Err(e) => {
                warn!(name, error = %e, "Load failed");
                false
            }
        }
    }

    pub fn delete_game(&self, name: &str) -> bool {
        match self.store.delete(name) {
            Ok(()) => true,
            Err(e) => {
                warn!(name, error = %e, "Delete failed");
                false
            }
        }
    }

    pub fn save_exists(&self, name: &str) -> bool {
        self.store.exists(name)
    }

    pub fn list_saves(&self) -> Vec<String> {
        self.store.list().unwrap_or_else(|e| {
            warn!(error = %e, "Could not list saves");
            Vec::new()
        })
    }
}

fn client_spawn_fallback(host_cx: i32, host_cy: i32, world: &World) -> (i32, i32) {
    let max_x = world.width() as i32 - 1;
    let max_y = world.height() as i32 - 1;
    (
        (host_cx + CLIENT_SPAWN_FALLBACK.0).clamp(0, max_x),
        (host_cy + CLIENT_SPAWN_FALLBACK.1).clamp(0, max_y),
    )
}
