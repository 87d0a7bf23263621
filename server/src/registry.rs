//! The set of live rooms and the player-to-room index.

use crate::error::GameError;
use crate::room::{Departure, Room};
use log::{debug, info};
use shared::{now_secs, GameConfig, PlayerId, RoomId, RoomInfo, RoomState};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// A player leaving a room, plus what happened to the room.
#[derive(Debug)]
pub struct RoomExit {
    pub room_id: RoomId,
    pub departure: Departure,
    /// The room had no players left and was deleted.
    pub room_deleted: bool,
}

#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: BTreeMap<RoomId, Room>,
    player_rooms: HashMap<PlayerId, RoomId>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn get(&self, room_id: &str) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    pub fn get_mut(&mut self, room_id: &str) -> Option<&mut Room> {
        self.rooms.get_mut(room_id)
    }

    pub fn room_of(&self, player_id: &str) -> Option<&RoomId> {
        self.player_rooms.get(player_id)
    }

    pub fn rooms(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }

    pub fn rooms_mut(&mut self) -> impl Iterator<Item = &mut Room> {
        self.rooms.values_mut()
    }

    /// Players currently seated in some room.
    pub fn total_players(&self) -> u32 {
        self.player_rooms.len() as u32
    }

    /// Creates an empty room with `creator_id` as designated host. The creator
    /// still has to join it like anyone else.
    pub fn create_room(
        &mut self,
        creator_id: &str,
        name: &str,
        max_players: u32,
        game_mode: &str,
        config: &GameConfig,
    ) -> &Room {
        let room_id = format!(
            "room_{}_{}",
            now_secs() as u64,
            &Uuid::new_v4().simple().to_string()[..8]
        );
        let max_players = max_players.clamp(1, config.max_players_per_room.max(1));
        let name = if name.trim().is_empty() {
            format!("Room {}", self.rooms.len() + 1)
        } else {
            name.to_string()
        };

        info!(
            "Created room {} '{}' for host {} ({} players max)",
            room_id, name, creator_id, max_players
        );
        let room = Room::new(room_id.clone(), name, creator_id, max_players, game_mode);
        self.rooms.entry(room_id).or_insert(room)
    }

    /// Rooms worth showing in a lobby: anything with at least one player.
    pub fn list(&self) -> Vec<RoomInfo> {
        self.rooms
            .values()
            .filter(|room| !room.is_empty())
            .map(Room::info)
            .collect()
    }

    /// First waiting room with a free slot, for joins that name no room.
    pub fn find_open_room(&self) -> Option<&RoomId> {
        self.rooms
            .values()
            .find(|room| room.state == RoomState::Waiting && room.first_free_slot().is_some())
            .map(|room| &room.room_id)
    }

    pub fn join(
        &mut self,
        player_id: &str,
        name: &str,
        room_id: &str,
        config: &GameConfig,
    ) -> Result<&Room, GameError> {
        if let Some(current) = self.player_rooms.get(player_id) {
            return Err(GameError::InvalidMessage(format!(
                "player {} is already in room {}",
                player_id, current
            )));
        }
        let room = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| GameError::RoomNotFound(room_id.to_string()))?;
        let slot = room.add_player(player_id, name, config)?.slot_index;

        info!("Player {} joined room {} in slot {}", player_id, room_id, slot);
        self.player_rooms
            .insert(player_id.to_string(), room_id.to_string());
        Ok(&*room)
    }

    /// Takes a player out of whatever room they are in. Deletes the room when
    /// it ends up empty.
    pub fn leave(&mut self, player_id: &str) -> Option<RoomExit> {
        let room_id = self.player_rooms.remove(player_id)?;
        let room = self.rooms.get_mut(&room_id)?;
        let departure = room.remove_player(player_id)?;

        if let Some(new_host) = &departure.new_host {
            info!("Host of room {} passed to {}", room_id, new_host);
        }
        let room_deleted = room.is_empty();
        if room_deleted {
            self.rooms.remove(&room_id);
            info!("Room {} is empty and was deleted", room_id);
        }

        Some(RoomExit {
            room_id,
            departure,
            room_deleted,
        })
    }

    /// Host-only: removes the room and everyone in it. Returns the room so the
    /// caller can notify its former members.
    pub fn disband(&mut self, room_id: &str, requester: &str) -> Result<Room, GameError> {
        let room = self
            .rooms
            .get(room_id)
            .ok_or_else(|| GameError::RoomNotFound(room_id.to_string()))?;
        if !room.is_host(requester) {
            return Err(GameError::NotHost("disband the room"));
        }

        let room = self
            .rooms
            .remove(room_id)
            .ok_or_else(|| GameError::RoomNotFound(room_id.to_string()))?;
        for player_id in room.players.keys() {
            self.player_rooms.remove(player_id);
        }
        info!(
            "Room {} disbanded by {} ({} players removed)",
            room_id,
            requester,
            room.players.len()
        );
        Ok(room)
    }

    /// Drops rooms that have sat empty for longer than `grace` seconds.
    /// Returns the ids removed.
    pub fn reap_empty(&mut self, grace: f64) -> Vec<RoomId> {
        let stale: Vec<RoomId> = self
            .rooms
            .values()
            .filter(|room| room.is_empty() && room.empty_for >= grace)
            .map(|room| room.room_id.clone())
            .collect();
        for room_id in &stale {
            self.rooms.remove(room_id);
            debug!("Reaped room {} that nobody joined", room_id);
        }
        stale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with_room(config: &GameConfig) -> (RoomRegistry, RoomId) {
        let mut registry = RoomRegistry::new();
        let room_id = registry
            .create_room("host", "Arena", 2, "classic", config)
            .room_id
            .clone();
        (registry, room_id)
    }

    #[test]
    fn test_create_room_clamps_capacity_and_names() {
        let config = GameConfig::default();
        let mut registry = RoomRegistry::new();
        let room = registry.create_room("p", "", 0, "classic", &config);
        assert_eq!(room.max_players, 1);
        assert_eq!(room.name, "Room 1");
        assert!(room.room_id.starts_with("room_"));

        let room = registry.create_room("p", "Big", 99, "classic", &config);
        assert_eq!(room.max_players, config.max_players_per_room);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_join_and_list() {
        let config = GameConfig::default();
        let (mut registry, room_id) = registry_with_room(&config);
        assert!(registry.list().is_empty());

        registry.join("host", "Host", &room_id, &config).unwrap();
        registry.join("guest", "Guest", &room_id, &config).unwrap();
        assert_eq!(registry.room_of("guest"), Some(&room_id));
        assert_eq!(registry.total_players(), 2);

        let list = registry.list();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].current_players, 2);
        assert_eq!(list[0].host_player_id, "host");

        assert!(matches!(
            registry.join("third", "T", &room_id, &config),
            Err(GameError::RoomFull(_))
        ));
        assert!(matches!(
            registry.join("third", "T", "nope", &config),
            Err(GameError::RoomNotFound(_))
        ));
        assert!(registry.join("guest", "Guest", &room_id, &config).is_err());
        assert!(registry.room_of("third").is_none());
    }

    #[test]
    fn test_leave_transfers_host_then_deletes_room() {
        let config = GameConfig::default();
        let (mut registry, room_id) = registry_with_room(&config);
        registry.join("host", "Host", &room_id, &config).unwrap();
        registry.join("guest", "Guest", &room_id, &config).unwrap();

        let exit = registry.leave("host").unwrap();
        assert_eq!(exit.departure.new_host.as_deref(), Some("guest"));
        assert!(!exit.room_deleted);
        assert!(registry.get(&room_id).unwrap().is_host("guest"));

        let exit = registry.leave("guest").unwrap();
        assert!(exit.room_deleted);
        assert!(registry.get(&room_id).is_none());
        assert!(registry.leave("guest").is_none());
    }

    #[test]
    fn test_disband_is_host_only() {
        let config = GameConfig::default();
        let (mut registry, room_id) = registry_with_room(&config);
        registry.join("host", "Host", &room_id, &config).unwrap();
        registry.join("guest", "Guest", &room_id, &config).unwrap();

        assert_eq!(
            registry.disband(&room_id, "guest").unwrap_err(),
            GameError::NotHost("disband the room")
        );
        let room = registry.disband(&room_id, "host").unwrap();
        assert_eq!(room.players.len(), 2);
        assert!(registry.is_empty());
        assert!(registry.room_of("guest").is_none());
        assert_eq!(registry.total_players(), 0);
    }

    #[test]
    fn test_reap_only_stale_empty_rooms() {
        let config = GameConfig::default();
        let (mut registry, empty_id) = registry_with_room(&config);
        let busy_id = registry
            .create_room("p", "Busy", 4, "classic", &config)
            .room_id
            .clone();
        registry.join("p", "P", &busy_id, &config).unwrap();

        registry.get_mut(&empty_id).unwrap().empty_for = 3.0;
        assert!(registry.reap_empty(10.0).is_empty());

        registry.get_mut(&empty_id).unwrap().empty_for = 10.5;
        assert_eq!(registry.reap_empty(10.0), vec![empty_id]);
        assert!(registry.get(&busy_id).is_some());
    }

    #[test]
    fn test_find_open_room_skips_started_games() {
        let config = GameConfig::default();
        let (mut registry, room_id) = registry_with_room(&config);
        registry.join("host", "Host", &room_id, &config).unwrap();
        assert_eq!(registry.find_open_room(), Some(&room_id));

        registry.get_mut(&room_id).unwrap().start_game("host").unwrap();
        assert!(registry.find_open_room().is_none());
    }
}
