//! Read-only status snapshot for discovery tooling.
//!
//! The mutation loop publishes a fresh snapshot after every tick on a
//! `watch` channel; readers only ever see a copy and never touch rooms.

use crate::registry::RoomRegistry;
use serde::Serialize;
use shared::{GameConfig, RoomState};
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    /// Players in joinable rooms.
    pub players: u32,
    pub max_players: u32,
    /// Joinable rooms: waiting with at least one player.
    pub rooms: u32,
    pub status: String,
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        Self {
            players: 0,
            max_players: 0,
            rooms: 0,
            status: "online".to_string(),
        }
    }
}

impl StatusSnapshot {
    pub fn from_registry(registry: &RoomRegistry, config: &GameConfig) -> Self {
        let joinable = registry
            .rooms()
            .filter(|room| room.state == RoomState::Waiting && !room.is_empty());
        let (rooms, players) = joinable.fold((0u32, 0u32), |(rooms, players), room| {
            (rooms + 1, players + room.player_count())
        });

        Self {
            players,
            max_players: config.max_players_per_room * registry.len() as u32,
            rooms,
            status: "online".to_string(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

pub fn status_channel() -> (watch::Sender<StatusSnapshot>, watch::Receiver<StatusSnapshot>) {
    watch::channel(StatusSnapshot::default())
}
