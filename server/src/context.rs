//! The server's single mutation context.
//!
//! `ServerContext` owns every session and every room. The network layer feeds
//! it connection events and decoded frames one at a time from a single task,
//! and calls [`ServerContext::tick`] on the fixed schedule, so no state here
//! needs a lock. Tests build their own context and drive it directly.

use crate::broadcast::{broadcast_to_room, deliver_events, flush_room};
use crate::error::GameError;
use crate::registry::RoomRegistry;
use crate::room::Room;
use crate::scheduler::{self, SyncPolicy};
use crate::session::SessionManager;
use crate::status::StatusSnapshot;
use log::{debug, info, warn};
use shared::config::GAME_VERSION;
use shared::{
    decode, encode, now_secs, BulletId, DisbandReason, ErrorCode, GameConfig, LeaveReason, Message,
    MovementIntent, Payload, RoomId, Vec2,
};
use tokio::sync::mpsc;
use uuid::Uuid;

pub struct ServerContext {
    config: GameConfig,
    sessions: SessionManager,
    rooms: RoomRegistry,
    sync_policy: SyncPolicy,
}

impl ServerContext {
    pub fn new(config: GameConfig, max_sessions: usize) -> Self {
        let sync_policy = SyncPolicy::from_config(&config);
        Self {
            config,
            sessions: SessionManager::new(max_sessions),
            rooms: RoomRegistry::new(),
            sync_policy,
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn rooms(&self) -> &RoomRegistry {
        &self.rooms
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot::from_registry(&self.rooms, &self.config)
    }

    /// Registers a new connection and acknowledges it with its player id.
    /// Returns false if the server is full; the connection gets an error
    /// frame and should be closed.
    pub fn connect(&mut self, player_id: &str, outbound: mpsc::Sender<String>) -> bool {
        if self.sessions.register(player_id.to_string(), outbound.clone()).is_none() {
            let rejection = Message::error(ErrorCode::InternalError, "server is full");
            let _ = outbound.try_send(encode(&rejection));
            return false;
        }

        let ack = Message::new(Payload::ConnectionAck {
            client_id: player_id.to_string(),
            server_time: now_secs(),
            game_version: GAME_VERSION.to_string(),
            assigned_player_id: player_id.to_string(),
        });
        self.sessions.send(player_id, &ack);
        true
    }

    /// Decodes and dispatches one inbound frame. Any failure is answered with
    /// an error message on the same connection; the connection stays open.
    pub fn handle_frame(&mut self, player_id: &str, frame: &str) {
        if !self.sessions.contains(player_id) {
            warn!("Frame from unknown session {}", player_id);
            return;
        }

        let result = decode(frame)
            .map_err(GameError::from)
            .and_then(|message| self.dispatch(player_id, message));

        if let Err(err) = result {
            match err {
                GameError::Internal(_) => warn!("Internal error handling frame from {}: {}", player_id, err),
                _ => debug!("Rejected frame from {}: {}", player_id, err),
            }
            self.sessions.send(player_id, &err.to_message());
        }
    }

    /// Routes a decoded message to its handler. Every message kind is listed
    /// so a new kind cannot be added without deciding how the server treats it.
    pub fn dispatch(&mut self, player_id: &str, message: Message) -> Result<(), GameError> {
        let kind = message.kind();
        match message.payload {
            Payload::Ping {
                client_id,
                sequence,
            } => self.handle_ping(player_id, client_id, sequence),
            Payload::PlayerJoin {
                player_name,
                room_id,
                ..
            } => self.handle_join(player_id, player_name, room_id),
            Payload::PlayerLeave { .. } => self.handle_leave(player_id),
            Payload::PlayerMove {
                direction,
                position,
                ..
            } => self.handle_move(player_id, direction, position),
            Payload::PlayerStop { position, .. } => self.handle_stop(player_id, position),
            Payload::PlayerShoot {
                position,
                direction,
                bullet_id,
                ..
            } => self.handle_shoot(player_id, position, direction, bullet_id),
            Payload::CreateRoomRequest {
                room_name,
                max_players,
                game_mode,
                ..
            } => self.handle_create_room(player_id, &room_name, max_players, &game_mode),
            Payload::RoomListRequest { .. } => self.handle_room_list(player_id),
            Payload::RoomDisbanded { room_id, .. } => self.handle_disband(player_id, &room_id),
            Payload::RoomStartGame { room_id, .. } => self.handle_start_game(player_id, &room_id),
            Payload::RoomEndGame { room_id, .. } => self.handle_end_game(player_id, &room_id),
            Payload::RoomReset { room_id, .. } => self.handle_reset(player_id, &room_id),
            Payload::SlotChangeRequest {
                target_slot,
                room_id,
                ..
            } => self.handle_slot_change(player_id, &room_id, target_slot),
            Payload::ConnectionAck { .. }
            | Payload::Pong { .. }
            | Payload::Error { .. }
            | Payload::GameStateUpdate { .. }
            | Payload::BulletFired { .. }
            | Payload::BulletDestroyed { .. }
            | Payload::Collision { .. }
            | Payload::PlayerDeath { .. }
            | Payload::GameVictory { .. }
            | Payload::GameDefeat { .. }
            | Payload::RoomCreated { .. }
            | Payload::RoomList { .. }
            | Payload::RoomUpdate { .. }
            | Payload::SlotChanged { .. } => Err(GameError::InvalidMessage(format!(
                "`{}` is only sent by the server",
                kind
            ))),
        }
    }

    /// Cleans up after a closed connection: leaves the room (which may pass
    /// the host role on or delete the room) and drops the session.
    pub fn disconnect(&mut self, player_id: &str) {
        self.leave_room(player_id, LeaveReason::Disconnected);
        self.sessions.remove(player_id);
    }

    /// One scheduler tick: advance every room and deliver what it produced.
    pub fn tick(&mut self) {
        let outcomes = scheduler::run_tick(&mut self.rooms, &self.config, &self.sync_policy);

        for outcome in outcomes {
            let Some(room) = self.rooms.get(&outcome.room_id) else {
                continue;
            };
            let decided = outcome.events.iter().any(|event| {
                matches!(
                    event.payload,
                    Payload::GameVictory { .. } | Payload::RoomEndGame { .. }
                )
            });

            deliver_events(&self.sessions, room, outcome.events);
            if let Some(snapshot) = outcome.sync {
                broadcast_to_room(&self.sessions, room, &Message::new(snapshot), None);
            }
            if decided {
                info!("Game in room {} is over", room.room_id);
                announce_room(&self.sessions, room);
            }
        }
    }

    fn player_room_mut<'a>(rooms: &'a mut RoomRegistry, player_id: &str) -> Result<&'a mut Room, GameError> {
        let room_id = rooms
            .room_of(player_id)
            .cloned()
            .ok_or_else(|| GameError::PlayerNotFound(player_id.to_string()))?;
        rooms
            .get_mut(&room_id)
            .ok_or(GameError::RoomNotFound(room_id))
    }

    fn room_mut<'a>(rooms: &'a mut RoomRegistry, room_id: &str) -> Result<&'a mut Room, GameError> {
        rooms
            .get_mut(room_id)
            .ok_or_else(|| GameError::RoomNotFound(room_id.to_string()))
    }

    fn handle_ping(&mut self, player_id: &str, client_id: String, sequence: u32) -> Result<(), GameError> {
        if let Some(session) = self.sessions.get_mut(player_id) {
            session.last_ping_sequence = Some(sequence);
        }
        let pong = Message::new(Payload::Pong {
            client_id,
            sequence,
            server_timestamp: now_secs(),
        });
        self.sessions.send(player_id, &pong);
        Ok(())
    }

    fn handle_join(
        &mut self,
        player_id: &str,
        player_name: String,
        room_id: Option<RoomId>,
    ) -> Result<(), GameError> {
        let target = match room_id {
            Some(room_id) => room_id,
            None => self
                .rooms
                .find_open_room()
                .cloned()
                .ok_or_else(|| GameError::RoomNotFound("(any open room)".to_string()))?,
        };

        if let Some(current) = self.rooms.room_of(player_id).cloned() {
            if current == target {
                if let Some(room) = self.rooms.get(&current) {
                    self.sessions.send(player_id, &Message::new(room.snapshot()));
                }
                return Ok(());
            }
            // The old room is only left once the new one is sure to take us.
            self.rooms
                .get(&target)
                .ok_or_else(|| GameError::RoomNotFound(target.clone()))?
                .admission_slot(player_id)?;
            self.leave_room(player_id, LeaveReason::Normal);
        }

        let name = if player_name.trim().is_empty() {
            format!("Player {}", player_id.chars().take(6).collect::<String>())
        } else {
            player_name
        };

        let room = self.rooms.join(player_id, &name, &target, &self.config)?;
        if let Some(session) = self.sessions.get_mut(player_id) {
            session.display_name = Some(name.clone());
        }

        let spawn_position = room.players.get(player_id).map(|p| p.position);
        let joined = Message::new(Payload::PlayerJoin {
            player_id: player_id.to_string(),
            player_name: name,
            room_id: Some(target),
            spawn_position,
        });
        broadcast_to_room(&self.sessions, room, &joined, Some(player_id));
        // The summary goes first so the joiner knows which room the snapshot
        // belongs to.
        announce_room(&self.sessions, room);
        self.sessions.send(player_id, &Message::new(room.snapshot()));
        Ok(())
    }

    fn handle_leave(&mut self, player_id: &str) -> Result<(), GameError> {
        self.leave_room(player_id, LeaveReason::Normal)
            .map(|_| ())
            .ok_or_else(|| GameError::PlayerNotFound(player_id.to_string()))
    }

    /// Removes a player from their room and tells whoever is left.
    fn leave_room(&mut self, player_id: &str, reason: LeaveReason) -> Option<RoomId> {
        let exit = self.rooms.leave(player_id)?;
        info!(
            "Player {} left room {} ({:?})",
            player_id, exit.room_id, reason
        );
        if exit.room_deleted {
            return Some(exit.room_id);
        }

        if let Some(room) = self.rooms.get_mut(&exit.room_id) {
            let left = Message::new(Payload::PlayerLeave {
                player_id: player_id.to_string(),
                reason,
            });
            broadcast_to_room(&self.sessions, room, &left, None);
            flush_room(&self.sessions, room);
            announce_room(&self.sessions, room);
        }
        Some(exit.room_id)
    }

    fn handle_move(&mut self, player_id: &str, intent: MovementIntent, reported: Vec2) -> Result<(), GameError> {
        let room = Self::player_room_mut(&mut self.rooms, player_id)?;
        let position = room.apply_move(player_id, intent, reported, &self.config)?;

        let moved = Message::new(Payload::PlayerMove {
            player_id: player_id.to_string(),
            direction: intent,
            position,
        });
        broadcast_to_room(&self.sessions, room, &moved, Some(player_id));
        Ok(())
    }

    fn handle_stop(&mut self, player_id: &str, reported: Vec2) -> Result<(), GameError> {
        let room = Self::player_room_mut(&mut self.rooms, player_id)?;
        let position = room.apply_move(player_id, MovementIntent::IDLE, reported, &self.config)?;

        let stopped = Message::new(Payload::PlayerStop {
            player_id: player_id.to_string(),
            position,
        });
        broadcast_to_room(&self.sessions, room, &stopped, Some(player_id));
        Ok(())
    }

    fn handle_shoot(
        &mut self,
        player_id: &str,
        origin: Vec2,
        direction: Vec2,
        bullet_id: BulletId,
    ) -> Result<(), GameError> {
        let room = Self::player_room_mut(&mut self.rooms, player_id)?;
        let bullet_id = if bullet_id.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            bullet_id
        };

        if room.fire(player_id, origin, direction, bullet_id, &self.config)? {
            flush_room(&self.sessions, room);
        } else {
            debug!("Ignored shot from {} in room {}", player_id, room.room_id);
        }
        Ok(())
    }

    fn handle_create_room(
        &mut self,
        player_id: &str,
        room_name: &str,
        max_players: u32,
        game_mode: &str,
    ) -> Result<(), GameError> {
        let room = self
            .rooms
            .create_room(player_id, room_name, max_players, game_mode, &self.config);
        let created = Message::new(Payload::RoomCreated {
            room_id: room.room_id.clone(),
            room_name: room.name.clone(),
            creator_id: player_id.to_string(),
            max_players: room.max_players,
            game_mode: room.game_mode.clone(),
        });
        self.sessions.send(player_id, &created);
        Ok(())
    }

    fn handle_room_list(&mut self, player_id: &str) -> Result<(), GameError> {
        let list = Message::new(Payload::RoomList {
            rooms: self.rooms.list(),
            total_players: self.rooms.total_players(),
        });
        self.sessions.send(player_id, &list);
        Ok(())
    }

    fn handle_disband(&mut self, player_id: &str, room_id: &str) -> Result<(), GameError> {
        let room = self.rooms.disband(room_id, player_id)?;
        let disbanded = Message::new(Payload::RoomDisbanded {
            room_id: room.room_id.clone(),
            disbanded_by: player_id.to_string(),
            reason: DisbandReason::HostQuit,
        });
        broadcast_to_room(&self.sessions, &room, &disbanded, Some(player_id));
        Ok(())
    }

    fn handle_start_game(&mut self, player_id: &str, room_id: &str) -> Result<(), GameError> {
        let room = Self::room_mut(&mut self.rooms, room_id)?;
        room.start_game(player_id)?;
        info!("Game started in room {} by {}", room_id, player_id);

        flush_room(&self.sessions, room);
        announce_room(&self.sessions, room);
        Ok(())
    }

    fn handle_end_game(&mut self, player_id: &str, room_id: &str) -> Result<(), GameError> {
        let room = Self::room_mut(&mut self.rooms, room_id)?;
        room.end_game(player_id)?;

        flush_room(&self.sessions, room);
        announce_room(&self.sessions, room);
        Ok(())
    }

    fn handle_reset(&mut self, player_id: &str, room_id: &str) -> Result<(), GameError> {
        let room = Self::room_mut(&mut self.rooms, room_id)?;
        room.reset_for_new_game(player_id, &self.config)?;

        flush_room(&self.sessions, room);
        let snapshot = Message::new(room.snapshot());
        broadcast_to_room(&self.sessions, room, &snapshot, None);
        announce_room(&self.sessions, room);
        Ok(())
    }

    fn handle_slot_change(&mut self, player_id: &str, room_id: &str, target_slot: u32) -> Result<(), GameError> {
        let room = Self::room_mut(&mut self.rooms, room_id)?;
        let old_slot = room.change_slot(player_id, target_slot, &self.config)?;

        let changed = Message::new(Payload::SlotChanged {
            player_id: player_id.to_string(),
            old_slot,
            new_slot: target_slot,
            room_id: room_id.to_string(),
        });
        let snapshot = Message::new(room.snapshot());
        broadcast_to_room(&self.sessions, room, &changed, None);
        broadcast_to_room(&self.sessions, room, &snapshot, None);
        Ok(())
    }
}

/// Tells every member the room's current summary.
fn announce_room(sessions: &SessionManager, room: &Room) {
    let update = Message::new(Payload::RoomUpdate { room: room.info() });
    broadcast_to_room(sessions, room, &update, None);
}
