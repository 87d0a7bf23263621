//! Wire protocol: one JSON object per WebSocket text frame.
//!
//! Every frame carries a `type` tag from a closed set and a `timestamp`
//! (fractional Unix seconds). The remaining keys depend on the tag. Decoding
//! never panics: malformed JSON, a missing or unknown tag, and a known tag with
//! bad fields each map to their own [`DecodeError`] variant.

use crate::entity::{Bullet, MovementIntent, Player, Vec2};
use crate::{now_secs, BulletId, PlayerId, RoomId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub timestamp: f64,
    #[serde(flatten)]
    pub payload: Payload,
}

impl Message {
    /// Stamps the payload with the current wall-clock time.
    pub fn new(payload: Payload) -> Self {
        Self::at(now_secs(), payload)
    }

    pub fn at(timestamp: f64, payload: Payload) -> Self {
        Self { timestamp, payload }
    }

    pub fn error(code: ErrorCode, text: impl Into<String>) -> Self {
        Self::new(Payload::Error {
            error_code: code,
            error_message: text.into(),
        })
    }

    pub fn kind(&self) -> MessageKind {
        self.payload.kind()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomState {
    Waiting,
    Playing,
    Finished,
}

impl RoomState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomState::Waiting => "waiting",
            RoomState::Playing => "playing",
            RoomState::Finished => "finished",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidMessage,
    RoomNotFound,
    RoomFull,
    SlotUnavailable,
    NotHost,
    PlayerNotFound,
    CannotStart,
    GameInProgress,
    InternalError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveReason {
    #[default]
    Normal,
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestroyReason {
    Expired,
    Boundary,
    Collision,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisbandReason {
    #[default]
    HostQuit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    #[default]
    HostEnded,
    AllPlayersDead,
}

/// Lobby-facing summary of a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomInfo {
    pub room_id: RoomId,
    pub name: String,
    pub current_players: u32,
    pub max_players: u32,
    pub room_state: RoomState,
    pub host_player_id: PlayerId,
}

fn default_game_mode() -> String {
    "classic".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    // System
    ConnectionAck {
        client_id: String,
        server_time: f64,
        game_version: String,
        assigned_player_id: PlayerId,
    },
    Ping {
        client_id: String,
        sequence: u32,
    },
    Pong {
        client_id: String,
        sequence: u32,
        server_timestamp: f64,
    },
    Error {
        error_code: ErrorCode,
        error_message: String,
    },

    // Player actions
    PlayerJoin {
        player_id: PlayerId,
        player_name: String,
        #[serde(default)]
        room_id: Option<RoomId>,
        #[serde(default)]
        spawn_position: Option<Vec2>,
    },
    PlayerLeave {
        player_id: PlayerId,
        #[serde(default)]
        reason: LeaveReason,
    },
    PlayerMove {
        player_id: PlayerId,
        direction: MovementIntent,
        position: Vec2,
    },
    PlayerStop {
        player_id: PlayerId,
        position: Vec2,
    },
    PlayerShoot {
        player_id: PlayerId,
        position: Vec2,
        direction: Vec2,
        bullet_id: BulletId,
    },

    // Game state and events
    GameStateUpdate {
        players: Vec<Player>,
        bullets: Vec<Bullet>,
        game_time: f64,
        frame_id: u64,
    },
    BulletFired {
        bullet_id: BulletId,
        owner_id: PlayerId,
        start_position: Vec2,
        velocity: Vec2,
        damage: i32,
    },
    BulletDestroyed {
        bullet_id: BulletId,
        reason: DestroyReason,
    },
    Collision {
        bullet_id: BulletId,
        target_player_id: PlayerId,
        damage_dealt: i32,
        new_health: i32,
        collision_position: Vec2,
    },
    PlayerDeath {
        player_id: PlayerId,
        killer_id: PlayerId,
        death_position: Vec2,
    },
    GameVictory {
        winner_player_id: PlayerId,
        winner_player_name: String,
        room_id: RoomId,
        game_duration: f64,
        total_players: u32,
    },
    GameDefeat {
        eliminated_player_id: PlayerId,
        eliminated_player_name: String,
        killer_id: PlayerId,
        killer_name: String,
        room_id: RoomId,
        survival_time: f64,
    },

    // Rooms
    CreateRoomRequest {
        room_name: String,
        max_players: u32,
        creator_id: PlayerId,
        #[serde(default = "default_game_mode")]
        game_mode: String,
    },
    RoomCreated {
        room_id: RoomId,
        room_name: String,
        creator_id: PlayerId,
        max_players: u32,
        game_mode: String,
    },
    RoomListRequest {
        client_id: String,
    },
    RoomList {
        rooms: Vec<RoomInfo>,
        total_players: u32,
    },
    RoomUpdate {
        room: RoomInfo,
    },
    RoomDisbanded {
        room_id: RoomId,
        disbanded_by: PlayerId,
        #[serde(default)]
        reason: DisbandReason,
    },
    RoomStartGame {
        room_id: RoomId,
        host_player_id: PlayerId,
    },
    RoomEndGame {
        room_id: RoomId,
        #[serde(default)]
        reason: EndReason,
    },
    RoomReset {
        room_id: RoomId,
        host_player_id: PlayerId,
    },
    SlotChangeRequest {
        player_id: PlayerId,
        target_slot: u32,
        room_id: RoomId,
    },
    SlotChanged {
        player_id: PlayerId,
        old_slot: u32,
        new_slot: u32,
        room_id: RoomId,
    },
}

/// The closed set of `type` tags, usable without a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    ConnectionAck,
    Ping,
    Pong,
    Error,
    PlayerJoin,
    PlayerLeave,
    PlayerMove,
    PlayerStop,
    PlayerShoot,
    GameStateUpdate,
    BulletFired,
    BulletDestroyed,
    Collision,
    PlayerDeath,
    GameVictory,
    GameDefeat,
    CreateRoomRequest,
    RoomCreated,
    RoomListRequest,
    RoomList,
    RoomUpdate,
    RoomDisbanded,
    RoomStartGame,
    RoomEndGame,
    RoomReset,
    SlotChangeRequest,
    SlotChanged,
}

impl MessageKind {
    pub const ALL: [MessageKind; 27] = [
        MessageKind::ConnectionAck,
        MessageKind::Ping,
        MessageKind::Pong,
        MessageKind::Error,
        MessageKind::PlayerJoin,
        MessageKind::PlayerLeave,
        MessageKind::PlayerMove,
        MessageKind::PlayerStop,
        MessageKind::PlayerShoot,
        MessageKind::GameStateUpdate,
        MessageKind::BulletFired,
        MessageKind::BulletDestroyed,
        MessageKind::Collision,
        MessageKind::PlayerDeath,
        MessageKind::GameVictory,
        MessageKind::GameDefeat,
        MessageKind::CreateRoomRequest,
        MessageKind::RoomCreated,
        MessageKind::RoomListRequest,
        MessageKind::RoomList,
        MessageKind::RoomUpdate,
        MessageKind::RoomDisbanded,
        MessageKind::RoomStartGame,
        MessageKind::RoomEndGame,
        MessageKind::RoomReset,
        MessageKind::SlotChangeRequest,
        MessageKind::SlotChanged,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::ConnectionAck => "connection_ack",
            MessageKind::Ping => "ping",
            MessageKind::Pong => "pong",
            MessageKind::Error => "error",
            MessageKind::PlayerJoin => "player_join",
            MessageKind::PlayerLeave => "player_leave",
            MessageKind::PlayerMove => "player_move",
            MessageKind::PlayerStop => "player_stop",
            MessageKind::PlayerShoot => "player_shoot",
            MessageKind::GameStateUpdate => "game_state_update",
            MessageKind::BulletFired => "bullet_fired",
            MessageKind::BulletDestroyed => "bullet_destroyed",
            MessageKind::Collision => "collision",
            MessageKind::PlayerDeath => "player_death",
            MessageKind::GameVictory => "game_victory",
            MessageKind::GameDefeat => "game_defeat",
            MessageKind::CreateRoomRequest => "create_room_request",
            MessageKind::RoomCreated => "room_created",
            MessageKind::RoomListRequest => "room_list_request",
            MessageKind::RoomList => "room_list",
            MessageKind::RoomUpdate => "room_update",
            MessageKind::RoomDisbanded => "room_disbanded",
            MessageKind::RoomStartGame => "room_start_game",
            MessageKind::RoomEndGame => "room_end_game",
            MessageKind::RoomReset => "room_reset",
            MessageKind::SlotChangeRequest => "slot_change_request",
            MessageKind::SlotChanged => "slot_changed",
        }
    }

    pub fn from_tag(tag: &str) -> Option<MessageKind> {
        MessageKind::ALL.iter().copied().find(|kind| kind.as_str() == tag)
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Payload {
    pub fn kind(&self) -> MessageKind {
        match self {
            Payload::ConnectionAck { .. } => MessageKind::ConnectionAck,
            Payload::Ping { .. } => MessageKind::Ping,
            Payload::Pong { .. } => MessageKind::Pong,
            Payload::Error { .. } => MessageKind::Error,
            Payload::PlayerJoin { .. } => MessageKind::PlayerJoin,
            Payload::PlayerLeave { .. } => MessageKind::PlayerLeave,
            Payload::PlayerMove { .. } => MessageKind::PlayerMove,
            Payload::PlayerStop { .. } => MessageKind::PlayerStop,
            Payload::PlayerShoot { .. } => MessageKind::PlayerShoot,
            Payload::GameStateUpdate { .. } => MessageKind::GameStateUpdate,
            Payload::BulletFired { .. } => MessageKind::BulletFired,
            Payload::BulletDestroyed { .. } => MessageKind::BulletDestroyed,
            Payload::Collision { .. } => MessageKind::Collision,
            Payload::PlayerDeath { .. } => MessageKind::PlayerDeath,
            Payload::GameVictory { .. } => MessageKind::GameVictory,
            Payload::GameDefeat { .. } => MessageKind::GameDefeat,
            Payload::CreateRoomRequest { .. } => MessageKind::CreateRoomRequest,
            Payload::RoomCreated { .. } => MessageKind::RoomCreated,
            Payload::RoomListRequest { .. } => MessageKind::RoomListRequest,
            Payload::RoomList { .. } => MessageKind::RoomList,
            Payload::RoomUpdate { .. } => MessageKind::RoomUpdate,
            Payload::RoomDisbanded { .. } => MessageKind::RoomDisbanded,
            Payload::RoomStartGame { .. } => MessageKind::RoomStartGame,
            Payload::RoomEndGame { .. } => MessageKind::RoomEndGame,
            Payload::RoomReset { .. } => MessageKind::RoomReset,
            Payload::SlotChangeRequest { .. } => MessageKind::SlotChangeRequest,
            Payload::SlotChanged { .. } => MessageKind::SlotChanged,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("malformed frame: {0}")]
    Malformed(String),
    #[error("frame has no string `type` tag")]
    MissingType,
    #[error("unknown message type `{0}`")]
    UnknownType(String),
    #[error("invalid `{kind}` payload: {reason}")]
    InvalidPayload { kind: MessageKind, reason: String },
}

// Decodes as a valid error message, so a peer always gets a parseable frame.
const ENCODE_FAILURE_FRAME: &str = r#"{"timestamp":0.0,"type":"error","error_code":"INTERNAL_ERROR","error_message":"failed to encode message"}"#;

pub fn encode(message: &Message) -> String {
    // No message contains a map with non-string keys, the only thing that
    // makes serde_json refuse to serialize.
    serde_json::to_string(message).unwrap_or_else(|_| ENCODE_FAILURE_FRAME.to_string())
}

pub fn decode(frame: &str) -> Result<Message, DecodeError> {
    let value: Value =
        serde_json::from_str(frame).map_err(|e| DecodeError::Malformed(e.to_string()))?;

    let tag = match &value {
        Value::Object(map) => map.get("type").and_then(Value::as_str),
        _ => return Err(DecodeError::Malformed("frame is not a JSON object".into())),
    }
    .ok_or(DecodeError::MissingType)?;

    let kind =
        MessageKind::from_tag(tag).ok_or_else(|| DecodeError::UnknownType(tag.to_string()))?;

    serde_json::from_value(value).map_err(|e| DecodeError::InvalidPayload {
        kind,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(message: Message) {
        let frame = encode(&message);
        let decoded = decode(&frame).unwrap_or_else(|e| panic!("{} failed: {}", frame, e));
        assert_eq!(decoded, message, "frame: {}", frame);
    }

    fn sample_player() -> Player {
        Player {
            player_id: "p-1".into(),
            name: String::new(),
            health: 0,
            max_health: 100,
            is_alive: false,
            position: Vec2::new(-0.0, 599.75),
            moving_directions: MovementIntent {
                up: true,
                left: false,
                down: true,
                right: false,
            },
            slot_index: 7,
            last_update: 1_700_000_000.125,
        }
    }

    #[test]
    fn test_frame_layout() {
        let message = Message::at(
            12.5,
            Payload::PlayerMove {
                player_id: "abc".into(),
                direction: MovementIntent {
                    up: true,
                    ..MovementIntent::IDLE
                },
                position: Vec2::new(1.0, 2.0),
            },
        );
        let value: Value = serde_json::from_str(&encode(&message)).unwrap();
        assert_eq!(value["type"], "player_move");
        assert_eq!(value["timestamp"], 12.5);
        assert_eq!(value["direction"]["w"], true);
        assert_eq!(value["direction"]["d"], false);
        assert_eq!(value["position"]["x"], 1.0);
    }

    #[test]
    fn test_roundtrip_system_messages() {
        roundtrip(Message::at(
            1.0,
            Payload::ConnectionAck {
                client_id: "c".into(),
                server_time: 1_700_000_000.123_456,
                game_version: "1.0.0".into(),
                assigned_player_id: "c".into(),
            },
        ));
        roundtrip(Message::at(
            0.0,
            Payload::Ping {
                client_id: String::new(),
                sequence: u32::MAX,
            },
        ));
        roundtrip(Message::at(
            2.0,
            Payload::Pong {
                client_id: "c".into(),
                sequence: 0,
                server_timestamp: 3.25,
            },
        ));
        roundtrip(Message::error(ErrorCode::SlotUnavailable, ""));
    }

    #[test]
    fn test_roundtrip_player_actions() {
        roundtrip(Message::at(
            3.0,
            Payload::PlayerJoin {
                player_id: "p".into(),
                player_name: String::new(),
                room_id: None,
                spawn_position: None,
            },
        ));
        roundtrip(Message::at(
            3.0,
            Payload::PlayerJoin {
                player_id: "p".into(),
                player_name: "Tank Commander".into(),
                room_id: Some("room_1".into()),
                spawn_position: Some(Vec2::new(-5.5, 0.0)),
            },
        ));
        roundtrip(Message::at(
            4.0,
            Payload::PlayerLeave {
                player_id: "p".into(),
                reason: LeaveReason::Disconnected,
            },
        ));
        for bits in 0u8..16 {
            roundtrip(Message::at(
                5.0,
                Payload::PlayerMove {
                    player_id: "p".into(),
                    direction: MovementIntent {
                        up: bits & 1 != 0,
                        left: bits & 2 != 0,
                        down: bits & 4 != 0,
                        right: bits & 8 != 0,
                    },
                    position: Vec2::new(-12.75, 0.1),
                },
            ));
        }
        roundtrip(Message::at(
            6.0,
            Payload::PlayerStop {
                player_id: "p".into(),
                position: Vec2::ZERO,
            },
        ));
        roundtrip(Message::at(
            7.0,
            Payload::PlayerShoot {
                player_id: "p".into(),
                position: Vec2::new(400.0, 300.0),
                direction: Vec2::new(0.6, -0.8),
                bullet_id: "b".into(),
            },
        ));
    }

    #[test]
    fn test_roundtrip_game_events() {
        roundtrip(Message::at(
            8.0,
            Payload::GameStateUpdate {
                players: vec![sample_player()],
                bullets: vec![Bullet {
                    bullet_id: "b".into(),
                    owner_id: "p-1".into(),
                    position: Vec2::new(0.3, 0.7),
                    velocity: Vec2::new(-300.0, 0.0),
                    damage: 25,
                    created_time: 1.0 / 60.0,
                    max_lifetime: 5.0,
                }],
                game_time: 123.456,
                frame_id: u64::from(u32::MAX) + 1,
            },
        ));
        roundtrip(Message::at(
            8.0,
            Payload::GameStateUpdate {
                players: vec![],
                bullets: vec![],
                game_time: 0.0,
                frame_id: 0,
            },
        ));
        roundtrip(Message::at(
            9.0,
            Payload::BulletFired {
                bullet_id: "b".into(),
                owner_id: "p".into(),
                start_position: Vec2::new(1.0, 1.0),
                velocity: Vec2::new(0.0, -300.0),
                damage: 25,
            },
        ));
        for reason in [
            DestroyReason::Expired,
            DestroyReason::Boundary,
            DestroyReason::Collision,
        ] {
            roundtrip(Message::at(
                10.0,
                Payload::BulletDestroyed {
                    bullet_id: "b".into(),
                    reason,
                },
            ));
        }
        roundtrip(Message::at(
            11.0,
            Payload::Collision {
                bullet_id: "b".into(),
                target_player_id: "q".into(),
                damage_dealt: 25,
                new_health: -5,
                collision_position: Vec2::new(10.0, 20.0),
            },
        ));
        roundtrip(Message::at(
            12.0,
            Payload::PlayerDeath {
                player_id: "q".into(),
                killer_id: "p".into(),
                death_position: Vec2::new(10.0, 20.0),
            },
        ));
        roundtrip(Message::at(
            13.0,
            Payload::GameVictory {
                winner_player_id: "p".into(),
                winner_player_name: "P".into(),
                room_id: "r".into(),
                game_duration: 0.0,
                total_players: 1,
            },
        ));
        roundtrip(Message::at(
            14.0,
            Payload::GameDefeat {
                eliminated_player_id: "q".into(),
                eliminated_player_name: "Q".into(),
                killer_id: "p".into(),
                killer_name: "P".into(),
                room_id: "r".into(),
                survival_time: 42.5,
            },
        ));
    }

    #[test]
    fn test_roundtrip_room_messages() {
        let info = RoomInfo {
            room_id: "r".into(),
            name: String::new(),
            current_players: 2,
            max_players: 8,
            room_state: RoomState::Playing,
            host_player_id: "p".into(),
        };
        roundtrip(Message::at(
            1.0,
            Payload::CreateRoomRequest {
                room_name: "Arena".into(),
                max_players: 2,
                creator_id: "p".into(),
                game_mode: "classic".into(),
            },
        ));
        roundtrip(Message::at(
            1.0,
            Payload::RoomCreated {
                room_id: "r".into(),
                room_name: "Arena".into(),
                creator_id: "p".into(),
                max_players: 2,
                game_mode: "classic".into(),
            },
        ));
        roundtrip(Message::at(
            1.0,
            Payload::RoomListRequest {
                client_id: "p".into(),
            },
        ));
        roundtrip(Message::at(
            1.0,
            Payload::RoomList {
                rooms: vec![info.clone()],
                total_players: 2,
            },
        ));
        roundtrip(Message::at(1.0, Payload::RoomUpdate { room: info }));
        roundtrip(Message::at(
            1.0,
            Payload::RoomDisbanded {
                room_id: "r".into(),
                disbanded_by: "p".into(),
                reason: DisbandReason::HostQuit,
            },
        ));
        roundtrip(Message::at(
            1.0,
            Payload::RoomStartGame {
                room_id: "r".into(),
                host_player_id: "p".into(),
            },
        ));
        roundtrip(Message::at(
            1.0,
            Payload::RoomEndGame {
                room_id: "r".into(),
                reason: EndReason::AllPlayersDead,
            },
        ));
        roundtrip(Message::at(
            1.0,
            Payload::RoomReset {
                room_id: "r".into(),
                host_player_id: "p".into(),
            },
        ));
        roundtrip(Message::at(
            1.0,
            Payload::SlotChangeRequest {
                player_id: "p".into(),
                target_slot: 0,
                room_id: "r".into(),
            },
        ));
        roundtrip(Message::at(
            1.0,
            Payload::SlotChanged {
                player_id: "p".into(),
                old_slot: 0,
                new_slot: 7,
                room_id: "r".into(),
            },
        ));
    }

    #[test]
    fn test_optional_fields_default() {
        let message = decode(
            r#"{"type":"create_room_request","timestamp":1,"room_name":"x","max_players":4,"creator_id":"p"}"#,
        )
        .unwrap();
        match message.payload {
            Payload::CreateRoomRequest { game_mode, .. } => assert_eq!(game_mode, "classic"),
            other => panic!("unexpected payload {:?}", other),
        }

        let message =
            decode(r#"{"type":"player_leave","timestamp":1.5,"player_id":"p"}"#).unwrap();
        assert_eq!(message.timestamp, 1.5);
        assert_eq!(
            message.payload,
            Payload::PlayerLeave {
                player_id: "p".into(),
                reason: LeaveReason::Normal,
            }
        );
    }

    #[test]
    fn test_decode_errors_are_distinguishable() {
        assert!(matches!(decode("not json"), Err(DecodeError::Malformed(_))));
        assert!(matches!(decode("[1,2]"), Err(DecodeError::Malformed(_))));
        assert_eq!(
            decode(r#"{"timestamp":1.0}"#),
            Err(DecodeError::MissingType)
        );
        assert_eq!(
            decode(r#"{"type":7,"timestamp":1.0}"#),
            Err(DecodeError::MissingType)
        );
        assert_eq!(
            decode(r#"{"type":"teleport","timestamp":1.0}"#),
            Err(DecodeError::UnknownType("teleport".into()))
        );

        match decode(r#"{"type":"ping","timestamp":1.0,"client_id":"c"}"#) {
            Err(DecodeError::InvalidPayload { kind, .. }) => assert_eq!(kind, MessageKind::Ping),
            other => panic!("expected invalid payload, got {:?}", other),
        }
        match decode(r#"{"type":"ping","client_id":"c","sequence":1}"#) {
            Err(DecodeError::InvalidPayload { kind, reason }) => {
                assert_eq!(kind, MessageKind::Ping);
                assert!(reason.contains("timestamp"));
            }
            other => panic!("expected invalid payload, got {:?}", other),
        }
    }

    #[test]
    fn test_reason_values_are_closed_sets() {
        let leave = |reason: &str| {
            decode(&format!(
                r#"{{"type":"player_leave","timestamp":1.0,"player_id":"p","reason":"{}"}}"#,
                reason
            ))
        };
        assert!(leave("disconnected").is_ok());
        for unused in ["timeout", "kicked"] {
            assert!(matches!(
                leave(unused),
                Err(DecodeError::InvalidPayload { kind: MessageKind::PlayerLeave, .. })
            ));
        }
        assert!(decode(
            r#"{"type":"room_end_game","timestamp":1.0,"room_id":"r","reason":"timeout"}"#
        )
        .is_err());
        assert!(decode(
            r#"{"type":"room_disbanded","timestamp":1.0,"room_id":"r","disbanded_by":"p","reason":"host_disconnected"}"#
        )
        .is_err());
    }

    #[test]
    fn test_message_kind_tags_match_serde_tags() {
        for kind in MessageKind::ALL {
            assert_eq!(MessageKind::from_tag(kind.as_str()), Some(kind));
        }
        assert_eq!(MessageKind::from_tag("debug"), None);

        let message = Message::at(
            0.0,
            Payload::SlotChanged {
                player_id: "p".into(),
                old_slot: 1,
                new_slot: 2,
                room_id: "r".into(),
            },
        );
        let value: Value = serde_json::from_str(&encode(&message)).unwrap();
        assert_eq!(value["type"], message.kind().as_str());
    }

    #[test]
    fn test_encode_failure_frame_decodes() {
        let message = decode(ENCODE_FAILURE_FRAME).unwrap();
        assert_eq!(message.kind(), MessageKind::Error);
    }
}
