use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::world::tile::Direction;

pub const MAX_HEALTH: i32 = 100;
pub const MAX_HUNGER: i32 = 20;
pub const STARTING_LEVEL: i32 = 1;
/// Ticks between walking steps.
pub const WALK_COOLDOWN: u32 = 15;
/// Ticks between running steps.
pub const RUN_COOLDOWN: u32 = 8;
/// Distance covered by one accepted step, in tiles.
pub const STEP: f64 = 0.5;
/// Melee reach, in tiles.
pub const ATTACK_RANGE: f64 = 3.0;
pub const ATTACK_DAMAGE: i32 = 5;

const RUN_HUNGER_CHANCE: f64 = 0.3;
const RUN_HUNGER_COST: i32 = 2;
const WALK_HUNGER_CHANCE: f64 = 0.15;
const WALK_HUNGER_COST: i32 = 1;
const IDLE_HUNGER_CHANCE: f64 = 0.003;
const STARVATION_DAMAGE: i32 = 1;

/// The local avatar. Position is continuous; the occupied cell is its floor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    x: f64,
    y: f64,
    health: i32,
    hunger: i32,
    experience: i32,
    level: i32,
    direction: Direction,
    move_cooldown: u32,
}

impl Player {
    pub fn new(x: f64, y: f64) -> Self {
        Player {
            x,
            y,
            health: MAX_HEALTH,
            hunger: MAX_HUNGER,
            experience: 0,
            level: STARTING_LEVEL,
            direction: Direction::Down,
            move_cooldown: 0,
        }
    }

    /// Rebuilds a player from saved vitals, clamping them into range.
    pub fn restore(record: &PlayerRecord) -> Self {
        Player {
            x: record.x,
            y: record.y,
            health: record.health.clamp(0, MAX_HEALTH),
            hunger: record.hunger.clamp(0, MAX_HUNGER),
            experience: record.experience.max(0),
            level: record.level.max(STARTING_LEVEL),
            direction: record.direction,
            move_cooldown: 0,
        }
    }

    pub fn record(&self) -> PlayerRecord {
        PlayerRecord {
            x: self.x,
            y: self.y,
            health: self.health,
            hunger: self.hunger,
            experience: self.experience,
            level: self.level,
            direction: self.direction,
        }
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn tile_x(&self) -> i32 {
        self.x.floor() as i32
    }

    pub fn tile_y(&self) -> i32 {
        self.y.floor() as i32
    }

    pub fn health(&self) -> i32 {
        self.health
    }

    pub fn hunger(&self) -> i32 {
        self.hunger
    }

    pub fn experience(&self) -> i32 {
        self.experience
    }

    pub fn level(&self) -> i32 {
        self.level
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn move_cooldown(&self) -> u32 {
        self.move_cooldown
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0
    }

    pub fn can_move(&self) -> bool {
        self.move_cooldown == 0
    }

    /// Applies `(dx, dy)` unconditionally and faces `direction`. Terrain
    /// checks and the `can_move` gate belong to the caller.
    pub fn apply_move<R: Rng + ?Sized>(
        &mut self,
        dx: f64,
        dy: f64,
        direction: Direction,
        running: bool,
        rng: &mut R,
    ) {
        self.x += dx;
        self.y += dy;
        self.direction = direction;
        if running {
            self.move_cooldown = RUN_COOLDOWN;
            if rng.gen_bool(RUN_HUNGER_CHANCE) {
                self.decrease_hunger(RUN_HUNGER_COST);
            }
        } else {
            self.move_cooldown = WALK_COOLDOWN;
            if rng.gen_bool(WALK_HUNGER_CHANCE) {
                self.decrease_hunger(WALK_HUNGER_COST);
            }
        }
    }

    /// Per-tick upkeep: cooldown countdown and slow passive hunger.
    pub fn update<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.move_cooldown = self.move_cooldown.saturating_sub(1);
        if rng.gen_bool(IDLE_HUNGER_CHANCE) {
            self.decrease_hunger(1);
        }
    }

    pub fn take_damage(&mut self, amount: i32) {
        self.health = (self.health - amount.max(0)).max(0);
    }

    pub fn heal(&mut self, amount: i32) {
        self.health = (self.health + amount.max(0)).min(MAX_HEALTH);
    }

    /// Lowers hunger. Starving deals damage once, on the step that reaches 0.
    pub fn decrease_hunger(&mut self, amount: i32) {
        let before = self.hunger;
        self.hunger = (self.hunger - amount.max(0)).max(0);
        if before > 0 && self.hunger == 0 && self.health > 0 {
            self.take_damage(STARVATION_DAMAGE);
        }
    }

    pub fn eat(&mut self, amount: i32) {
        self.hunger = (self.hunger + amount.max(0)).min(MAX_HUNGER);
    }

    pub fn add_experience(&mut self, amount: i32) {
        self.experience = self.experience.saturating_add(amount.max(0));
    }

    pub fn reset_experience(&mut self) {
        self.experience = 0;
    }

    /// Moves the player without side effects, e.g. on spawn or world load.
    pub fn teleport(&mut self, x: f64, y: f64) {
        self.x = x;
        self.y = y;
    }

    pub fn distance_to(&self, x: f64, y: f64) -> f64 {
        ((x - self.x).powi(2) + (y - self.y).powi(2)).sqrt()
    }

    pub fn can_attack_to(&self, x: f64, y: f64) -> bool {
        self.distance_to(x, y) <= ATTACK_RANGE
    }

    /// Cell actually struck when aiming at `(x, y)`: targets beyond reach are
    /// pulled back along the ray to exactly `ATTACK_RANGE`, then floored.
    pub fn attack_target_cell(&self, x: f64, y: f64) -> (i32, i32) {
        let (mut dx, mut dy) = (x - self.x, y - self.y);
        let distance = (dx * dx + dy * dy).sqrt();
        if distance > ATTACK_RANGE {
            dx = dx / distance * ATTACK_RANGE;
            dy = dy / distance * ATTACK_RANGE;
        }
        ((self.x + dx).floor() as i32, (self.y + dy).floor() as i32)
    }

    /// Faces the dominant axis towards `(x, y)`; ties go to the vertical axis.
    pub fn face_towards(&mut self, x: f64, y: f64) {
        let (dx, dy) = (x - self.x, y - self.y);
        self.direction = if dx.abs() > dy.abs() {
            if dx > 0.0 { Direction::Right } else { Direction::Left }
        } else if dy > 0.0 {
            Direction::Down
        } else {
            Direction::Up
        };
    }
}

/// Serializable vitals and position of a player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub x: f64,
    pub y: f64,
    pub health: i32,
    pub hunger: i32,
    pub experience: i32,
    pub level: i32,
    pub direction: Direction,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(1)
    }

    #[test]
    fn new_player_defaults() {
        let p = Player::new(10.0, 20.0);
        assert_eq!(p.health(), MAX_HEALTH);
        assert_eq!(p.hunger(), MAX_HUNGER);
        assert_eq!(p.experience(), 0);
        assert_eq!(p.level(), 1);
        assert_eq!(p.direction(), Direction::Down);
        assert!(p.can_move());
    }

    #[test]
    fn walking_and_running_cooldowns() {
        let mut p = Player::new(10.0, 10.0);
        let mut r = rng();
        p.apply_move(STEP, 0.0, Direction::Right, false, &mut r);
        assert_eq!(p.move_cooldown(), WALK_COOLDOWN);
        assert_eq!(p.x(), 10.5);
        assert_eq!(p.direction(), Direction::Right);
        assert!(!p.can_move());

        for _ in 0..WALK_COOLDOWN {
            p.update(&mut r);
        }
        assert!(p.can_move());

        p.apply_move(0.0, -STEP, Direction::Up, true, &mut r);
        assert_eq!(p.move_cooldown(), RUN_COOLDOWN);
        assert_eq!(p.y(), 9.5);
    }

    #[test]
    fn cooldown_never_underflows() {
        let mut p = Player::new(0.0, 0.0);
        let mut r = rng();
        for _ in 0..5 {
            p.update(&mut r);
        }
        assert_eq!(p.move_cooldown(), 0);
    }

    #[test]
    fn tile_coordinates_floor() {
        let p = Player::new(-0.5, 3.99);
        assert_eq!(p.tile_x(), -1);
        assert_eq!(p.tile_y(), 3);
    }

    #[test]
    fn vitals_stay_clamped() {
        let mut p = Player::new(0.0, 0.0);
        p.heal(50);
        assert_eq!(p.health(), MAX_HEALTH);
        p.take_damage(250);
        assert_eq!(p.health(), 0);
        assert!(!p.is_alive());
        p.eat(100);
        assert_eq!(p.hunger(), MAX_HUNGER);
        p.decrease_hunger(100);
        assert_eq!(p.hunger(), 0);
        p.take_damage(-5);
        assert_eq!(p.health(), 0);
    }

    #[test]
    fn starvation_hurts_once_per_transition() {
        let mut p = Player::new(0.0, 0.0);
        p.decrease_hunger(MAX_HUNGER - 1);
        assert_eq!(p.health(), MAX_HEALTH);
        p.decrease_hunger(1);
        assert_eq!(p.hunger(), 0);
        assert_eq!(p.health(), MAX_HEALTH - 1);

        // already starving: no further damage
        p.decrease_hunger(1);
        p.decrease_hunger(2);
        assert_eq!(p.health(), MAX_HEALTH - 1);

        p.eat(1);
        p.decrease_hunger(2);
        assert_eq!(p.health(), MAX_HEALTH - 2);
    }

    #[test]
    fn random_drain_respects_bounds() {
        let mut p = Player::new(0.0, 0.0);
        let mut r = rng();
        for i in 0..5000 {
            let dir = Direction::from_code((i % 4) as u8).unwrap();
            p.apply_move(0.0, 0.0, dir, i % 2 == 0, &mut r);
            p.update(&mut r);
            assert!((0..=MAX_HUNGER).contains(&p.hunger()));
            assert!((0..=MAX_HEALTH).contains(&p.health()));
        }
        assert_eq!(p.hunger(), 0);
        // one transition into starvation only
        assert_eq!(p.health(), MAX_HEALTH - 1);
    }

    #[test]
    fn attack_range_is_euclidean() {
        let p = Player::new(10.0, 10.0);
        assert!(p.can_attack_to(13.0, 10.0));
        assert!(p.can_attack_to(12.0, 12.0));
        assert!(!p.can_attack_to(12.2, 12.2));
        assert!(!p.can_attack_to(10.0, 13.01));
    }

    #[test]
    fn attack_target_clamped_along_ray() {
        let p = Player::new(10.5, 10.5);
        // within reach: just floors the target
        assert_eq!(p.attack_target_cell(11.7, 9.2), (11, 9));
        // far right: exactly 3 tiles out
        assert_eq!(p.attack_target_cell(50.0, 10.5), (13, 10));
        // far up-left along the diagonal: 3/sqrt(2) on each axis
        let (x, y) = p.attack_target_cell(0.5, 0.5);
        let expected = (10.5 - 3.0 / 2f64.sqrt()).floor() as i32;
        assert_eq!((x, y), (expected, expected));
        assert_eq!(expected, 8);
    }

    #[test]
    fn facing_prefers_vertical_on_ties() {
        let mut p = Player::new(0.0, 0.0);
        p.face_towards(5.0, 1.0);
        assert_eq!(p.direction(), Direction::Right);
        p.face_towards(-5.0, 1.0);
        assert_eq!(p.direction(), Direction::Left);
        p.face_towards(2.0, 2.0);
        assert_eq!(p.direction(), Direction::Down);
        p.face_towards(-2.0, -2.0);
        assert_eq!(p.direction(), Direction::Up);
    }

    #[test]
    fn experience_only_grows_until_reset() {
        let mut p = Player::new(0.0, 0.0);
        p.add_experience(10);
        p.add_experience(-4);
        assert_eq!(p.experience(), 10);
        p.reset_experience();
        assert_eq!(p.experience(), 0);
    }

    #[test]
    fn restore_clamps_saved_vitals() {
        let record = PlayerRecord {
            x: 3.5,
            y: 4.0,
            health: 500,
            hunger: -3,
            experience: 40,
            level: 0,
            direction: Direction::Left,
        };
        let p = Player::restore(&record);
        assert_eq!(p.health(), MAX_HEALTH);
        assert_eq!(p.hunger(), 0);
        assert_eq!(p.level(), 1);
        assert_eq!(p.record().direction, Direction::Left);
        assert_eq!(p.record().x, 3.5);
    }
}
