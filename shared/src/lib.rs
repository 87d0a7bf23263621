//! # Shared Game Definitions
//!
//! Types and formulas that the server and the client must agree on bit-for-bit.
//! Movement prediction on the client only converges if both sides integrate
//! positions with the same speed constant and the same clamping rule, so those
//! live here rather than being duplicated.
//!
//! ## Modules
//!
//! - [`config`]: tunable arena/tick/weapon constants shared by both binaries
//! - [`entity`]: `Player`, `Bullet` and the position integration formula
//! - [`protocol`]: the closed set of wire messages and their JSON codec

pub mod config;
pub mod entity;
pub mod protocol;

pub use config::{GameArgs, GameConfig, MovementAuthority};
pub use entity::{integrate_position, Bullet, MovementIntent, Player, Vec2};
pub use protocol::{
    decode, encode, DecodeError, DestroyReason, DisbandReason, EndReason, ErrorCode, LeaveReason,
    Message, MessageKind, Payload, RoomInfo, RoomState,
};

use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub type PlayerId = String;
pub type RoomId = String;
pub type BulletId = String;

/// Current wall-clock time in fractional seconds since the Unix epoch.
pub fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_secs_f64()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_secs_is_monotonic_enough() {
        let t1 = now_secs();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let t2 = now_secs();
        assert!(t2 > t1);
        assert!(t1 > 1_600_000_000.0);
    }
}
