//! Entity model shared by server simulation and client prediction.
//!
//! `Player` and `Bullet` are plain state holders. They know how to move
//! themselves but never touch the network; rooms and physics live server-side.

use crate::{BulletId, PlayerId};
use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn length(self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn distance(self, other: Vec2) -> f64 {
        (other - self).length()
    }

    /// Unit vector in the same direction, or `None` for a (near) zero vector.
    pub fn normalized(self) -> Option<Vec2> {
        let len = self.length();
        if len < 1e-9 || !len.is_finite() {
            None
        } else {
            Some(Vec2::new(self.x / len, self.y / len))
        }
    }

    /// Clamps into the closed arena rectangle `[0, width] x [0, height]`.
    pub fn clamped(self, width: f64, height: f64) -> Vec2 {
        Vec2::new(self.x.clamp(0.0, width), self.y.clamp(0.0, height))
    }

    pub fn is_within(self, width: f64, height: f64) -> bool {
        (0.0..=width).contains(&self.x) && (0.0..=height).contains(&self.y)
    }

    pub fn lerp(self, other: Vec2, t: f64) -> Vec2 {
        self + (other - self) * t
    }
}

impl Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vec2 {
    type Output = Vec2;

    fn mul(self, rhs: f64) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

/// Four independent movement axes. Serialized with the keyboard letters the
/// protocol has always used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MovementIntent {
    #[serde(rename = "w")]
    pub up: bool,
    #[serde(rename = "a")]
    pub left: bool,
    #[serde(rename = "s")]
    pub down: bool,
    #[serde(rename = "d")]
    pub right: bool,
}

impl MovementIntent {
    pub const IDLE: MovementIntent = MovementIntent {
        up: false,
        left: false,
        down: false,
        right: false,
    };

    pub fn is_moving(&self) -> bool {
        self.up || self.down || self.left || self.right
    }

    /// Velocity produced by this intent at the given scalar speed.
    /// Opposite keys cancel; diagonals are not normalized.
    pub fn velocity(&self, speed: f64) -> Vec2 {
        let mut velocity = Vec2::ZERO;
        if self.up {
            velocity.y -= speed;
        }
        if self.down {
            velocity.y += speed;
        }
        if self.left {
            velocity.x -= speed;
        }
        if self.right {
            velocity.x += speed;
        }
        velocity
    }
}

/// The one movement formula. Client prediction and server simulation both call
/// this; any change here changes both sides at once.
pub fn integrate_position(
    position: Vec2,
    intent: MovementIntent,
    speed: f64,
    dt: f64,
    arena_width: f64,
    arena_height: f64,
) -> Vec2 {
    (position + intent.velocity(speed) * dt).clamped(arena_width, arena_height)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub player_id: PlayerId,
    pub name: String,
    pub health: i32,
    pub max_health: i32,
    pub is_alive: bool,
    pub position: Vec2,
    pub moving_directions: MovementIntent,
    pub slot_index: u32,
    #[serde(default)]
    pub last_update: f64,
}

impl Player {
    pub fn new(player_id: impl Into<PlayerId>, name: impl Into<String>, max_health: i32) -> Self {
        Self {
            player_id: player_id.into(),
            name: name.into(),
            health: max_health,
            max_health,
            is_alive: true,
            position: Vec2::ZERO,
            moving_directions: MovementIntent::IDLE,
            slot_index: 0,
            last_update: 0.0,
        }
    }

    pub fn update_position(&mut self, dt: f64, speed: f64, arena_width: f64, arena_height: f64) {
        self.position = integrate_position(
            self.position,
            self.moving_directions,
            speed,
            dt,
            arena_width,
            arena_height,
        );
    }

    /// Subtracts damage, clamping health at zero. Returns true only on the call
    /// that moves the player from alive to dead.
    pub fn apply_damage(&mut self, damage: i32) -> bool {
        if !self.is_alive {
            return false;
        }
        self.health = (self.health - damage).max(0);
        if self.health == 0 {
            self.is_alive = false;
            return true;
        }
        false
    }

    pub fn restore(&mut self, spawn: Vec2) {
        self.health = self.max_health;
        self.is_alive = true;
        self.position = spawn;
        self.moving_directions = MovementIntent::IDLE;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bullet {
    pub bullet_id: BulletId,
    pub owner_id: PlayerId,
    pub position: Vec2,
    pub velocity: Vec2,
    pub damage: i32,
    /// Room game time at which the bullet was fired.
    pub created_time: f64,
    pub max_lifetime: f64,
}

impl Bullet {
    pub fn advance(&mut self, dt: f64) {
        self.position = self.position + self.velocity * dt;
    }

    pub fn is_expired(&self, game_time: f64) -> bool {
        game_time - self.created_time > self.max_lifetime
    }

    pub fn is_out_of_bounds(&self, arena_width: f64, arena_height: f64) -> bool {
        !self.position.is_within(arena_width, arena_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn test_bullet() -> Bullet {
        Bullet {
            bullet_id: "b1".into(),
            owner_id: "p1".into(),
            position: Vec2::new(100.0, 100.0),
            velocity: Vec2::new(300.0, 0.0),
            damage: 25,
            created_time: 0.0,
            max_lifetime: 5.0,
        }
    }

    #[test]
    fn test_vector_math() {
        let a = Vec2::new(3.0, 4.0);
        assert_eq!(a.length(), 5.0);
        assert_eq!(a.distance(Vec2::ZERO), 5.0);

        let unit = a.normalized().unwrap();
        assert_approx_eq!(unit.x, 0.6, 1e-12);
        assert_approx_eq!(unit.y, 0.8, 1e-12);
        assert!(Vec2::ZERO.normalized().is_none());

        let mid = Vec2::ZERO.lerp(Vec2::new(10.0, -10.0), 0.5);
        assert_eq!(mid, Vec2::new(5.0, -5.0));
    }

    #[test]
    fn test_intent_velocity() {
        let intent = MovementIntent {
            up: true,
            right: true,
            ..MovementIntent::IDLE
        };
        assert_eq!(intent.velocity(300.0), Vec2::new(300.0, -300.0));

        let cancelled = MovementIntent {
            left: true,
            right: true,
            ..MovementIntent::IDLE
        };
        assert_eq!(cancelled.velocity(300.0), Vec2::ZERO);
        assert!(cancelled.is_moving());
        assert!(!MovementIntent::IDLE.is_moving());
    }

    #[test]
    fn test_integrate_position_clamps_to_arena() {
        let intent = MovementIntent {
            left: true,
            up: true,
            ..MovementIntent::IDLE
        };
        let pos = integrate_position(Vec2::new(1.0, 2.0), intent, 300.0, 1.0 / 60.0, 800.0, 600.0);
        assert_eq!(pos, Vec2::ZERO);

        let intent = MovementIntent {
            right: true,
            down: true,
            ..MovementIntent::IDLE
        };
        let pos = integrate_position(Vec2::new(799.0, 599.0), intent, 300.0, 1.0, 800.0, 600.0);
        assert_eq!(pos, Vec2::new(800.0, 600.0));
    }

    #[test]
    fn test_integrate_position_one_tick() {
        let intent = MovementIntent {
            right: true,
            ..MovementIntent::IDLE
        };
        let pos = integrate_position(Vec2::new(100.0, 100.0), intent, 300.0, 1.0 / 60.0, 800.0, 600.0);
        assert_approx_eq!(pos.x, 105.0, 1e-9);
        assert_eq!(pos.y, 100.0);
    }

    #[test]
    fn test_player_damage_and_death_transition_once() {
        let mut player = Player::new("p1", "Alice", 100);
        assert!(!player.apply_damage(25));
        assert_eq!(player.health, 75);
        assert!(!player.apply_damage(50));
        assert!(player.apply_damage(30));
        assert_eq!(player.health, 0);
        assert!(!player.is_alive);
        assert!(!player.apply_damage(25));
        assert_eq!(player.health, 0);
    }

    #[test]
    fn test_player_restore() {
        let mut player = Player::new("p1", "Alice", 100);
        player.apply_damage(100);
        player.moving_directions.up = true;
        player.restore(Vec2::new(100.0, 100.0));
        assert!(player.is_alive);
        assert_eq!(player.health, 100);
        assert_eq!(player.position, Vec2::new(100.0, 100.0));
        assert!(!player.moving_directions.is_moving());
    }

    #[test]
    fn test_bullet_advance_is_deterministic() {
        let mut a = test_bullet();
        let mut b = test_bullet();
        for _ in 0..30 {
            a.advance(1.0 / 60.0);
            b.advance(1.0 / 60.0);
        }
        assert_eq!(a.position, b.position);
        assert_approx_eq!(a.position.x, 250.0, 1e-9);
    }

    #[test]
    fn test_bullet_bounds_and_expiry() {
        let mut bullet = test_bullet();
        assert!(!bullet.is_out_of_bounds(800.0, 600.0));
        bullet.position.x = 800.5;
        assert!(bullet.is_out_of_bounds(800.0, 600.0));
        bullet.position.x = -0.1;
        assert!(bullet.is_out_of_bounds(800.0, 600.0));

        assert!(!bullet.is_expired(5.0));
        assert!(bullet.is_expired(5.01));
    }
}
