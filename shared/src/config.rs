//! Game constants that both sides of the connection must share.
//!
//! Every value here is externally configurable (the binaries expose them as
//! CLI flags and environment variables), but a client and a server talking to
//! each other must be started with identical values or prediction drifts.

use clap::Args;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_ARENA_WIDTH: f64 = 800.0;
pub const DEFAULT_ARENA_HEIGHT: f64 = 600.0;
pub const DEFAULT_TICK_RATE: u32 = 60;
pub const DEFAULT_TANK_SPEED: f64 = 300.0;
pub const DEFAULT_BULLET_SPEED: f64 = 300.0;
pub const DEFAULT_BULLET_DAMAGE: i32 = 25;
pub const DEFAULT_BULLET_LIFETIME: f64 = 5.0;
pub const DEFAULT_MAX_PLAYERS_PER_ROOM: u32 = 8;
pub const DEFAULT_MAX_HEALTH: i32 = 100;
pub const DEFAULT_COLLISION_RADIUS: f64 = 25.0;
pub const GAME_VERSION: &str = "1.0.0";

/// Who decides where a tank is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MovementAuthority {
    /// The server integrates positions from movement intent every tick and
    /// ignores positions reported by clients.
    #[default]
    Server,
    /// The server accepts client-reported positions after clamping them to the
    /// arena. Kept for compatibility with clients that predict their own tank.
    Client,
}

impl std::str::FromStr for MovementAuthority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "server" => Ok(MovementAuthority::Server),
            "client" => Ok(MovementAuthority::Client),
            other => Err(format!("unknown movement authority '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    pub arena_width: f64,
    pub arena_height: f64,
    pub tick_rate: u32,
    pub tank_speed: f64,
    pub bullet_speed: f64,
    pub bullet_damage: i32,
    pub bullet_lifetime: f64,
    pub max_players_per_room: u32,
    pub max_health: i32,
    pub collision_radius: f64,
    pub movement_authority: MovementAuthority,
    /// Full-state fallback sync period for rooms in `waiting`, seconds.
    pub waiting_sync_interval: f64,
    /// Full-state fallback sync period for rooms in `playing`, seconds.
    pub playing_sync_interval: f64,
    /// Farthest a reported shot origin may be from the shooter's server position.
    pub max_shot_origin_offset: f64,
    /// How long a room that never got a player survives, seconds.
    pub empty_room_grace: f64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            arena_width: DEFAULT_ARENA_WIDTH,
            arena_height: DEFAULT_ARENA_HEIGHT,
            tick_rate: DEFAULT_TICK_RATE,
            tank_speed: DEFAULT_TANK_SPEED,
            bullet_speed: DEFAULT_BULLET_SPEED,
            bullet_damage: DEFAULT_BULLET_DAMAGE,
            bullet_lifetime: DEFAULT_BULLET_LIFETIME,
            max_players_per_room: DEFAULT_MAX_PLAYERS_PER_ROOM,
            max_health: DEFAULT_MAX_HEALTH,
            collision_radius: DEFAULT_COLLISION_RADIUS,
            movement_authority: MovementAuthority::Server,
            waiting_sync_interval: 3.0,
            playing_sync_interval: 2.0,
            max_shot_origin_offset: 100.0,
            empty_room_grace: 10.0,
        }
    }
}

impl GameConfig {
    /// Fixed simulation step in seconds.
    pub fn tick_dt(&self) -> f64 {
        1.0 / self.tick_rate.max(1) as f64
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_secs_f64(self.tick_dt())
    }

    /// Converts a period in seconds into a whole number of ticks, at least one.
    pub fn ticks_for(&self, seconds: f64) -> u64 {
        ((seconds * self.tick_rate as f64).round() as u64).max(1)
    }
}

/// Command-line/environment surface for the shared game constants. Both
/// binaries flatten this into their own arguments.
#[derive(Args, Debug, Clone)]
pub struct GameArgs {
    /// Arena width in world units
    #[clap(long, env = "SCREEN_WIDTH", default_value_t = DEFAULT_ARENA_WIDTH)]
    pub arena_width: f64,
    /// Arena height in world units
    #[clap(long, env = "SCREEN_HEIGHT", default_value_t = DEFAULT_ARENA_HEIGHT)]
    pub arena_height: f64,
    /// Simulation ticks per second
    #[clap(long, env = "FPS", default_value_t = DEFAULT_TICK_RATE)]
    pub tick_rate: u32,
    /// Tank speed in units per second
    #[clap(long, env = "TANK_SPEED", default_value_t = DEFAULT_TANK_SPEED)]
    pub tank_speed: f64,
    /// Bullet speed in units per second
    #[clap(long, env = "BULLET_SPEED", default_value_t = DEFAULT_BULLET_SPEED)]
    pub bullet_speed: f64,
    /// Damage dealt by one bullet
    #[clap(long, env = "BULLET_DAMAGE", default_value_t = DEFAULT_BULLET_DAMAGE)]
    pub bullet_damage: i32,
    /// Seconds a bullet stays in flight
    #[clap(long, env = "BULLET_LIFETIME", default_value_t = DEFAULT_BULLET_LIFETIME)]
    pub bullet_lifetime: f64,
    /// Upper bound on a room's capacity
    #[clap(long, env = "MAX_PLAYERS_PER_ROOM", default_value_t = DEFAULT_MAX_PLAYERS_PER_ROOM)]
    pub max_players_per_room: u32,
    /// Who decides tank positions: "server" or "client"
    #[clap(long, env = "MOVEMENT_AUTHORITY", default_value = "server")]
    pub movement_authority: MovementAuthority,
}

impl GameArgs {
    pub fn into_config(self) -> GameConfig {
        GameConfig {
            arena_width: self.arena_width,
            arena_height: self.arena_height,
            tick_rate: self.tick_rate.max(1),
            tank_speed: self.tank_speed,
            bullet_speed: self.bullet_speed,
            bullet_damage: self.bullet_damage,
            bullet_lifetime: self.bullet_lifetime,
            max_players_per_room: self.max_players_per_room.max(1),
            movement_authority: self.movement_authority,
            ..GameConfig::default()
        }
    }
}
