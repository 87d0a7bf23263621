//! Fan-out of room events to connected players.
//!
//! Each message is encoded once and queued on every recipient's outbound
//! channel. Delivery is best effort: a recipient whose queue is full or closed
//! is skipped and the rest still get the frame.

use crate::room::{Audience, Room, RoomEvent};
use crate::session::SessionManager;
use log::debug;
use shared::{encode, Message, MessageKind, PlayerId};

/// Sends `message` to every member except `exclude`. Returns how many
/// recipients it was queued for.
pub fn broadcast<'a>(
    sessions: &SessionManager,
    members: impl IntoIterator<Item = &'a PlayerId>,
    message: &Message,
    exclude: Option<&str>,
) -> usize {
    let frame = encode(message);
    members
        .into_iter()
        .filter(|id| Some(id.as_str()) != exclude)
        .filter(|id| sessions.send_frame(id, &frame))
        .count()
}

/// Broadcasts to the current members of `room`.
pub fn broadcast_to_room(
    sessions: &SessionManager,
    room: &Room,
    message: &Message,
    exclude: Option<&str>,
) -> usize {
    broadcast(sessions, room.players.keys(), message, exclude)
}

/// Delivers drained room events in order. Targeted events (victory, defeat)
/// go only to their player.
pub fn deliver_events(sessions: &SessionManager, room: &Room, events: Vec<RoomEvent>) {
    for event in events {
        let message = Message::new(event.payload);
        let kind = message.kind();
        let delivered = match &event.audience {
            Audience::Room => broadcast_to_room(sessions, room, &message, None),
            Audience::RoomExcept(excluded) => {
                broadcast_to_room(sessions, room, &message, Some(excluded.as_str()))
            }
            Audience::Player(player_id) => usize::from(sessions.send(player_id, &message)),
        };
        if kind != MessageKind::BulletDestroyed {
            debug!(
                "Event {} in room {} delivered to {} player(s)",
                kind, room.room_id, delivered
            );
        }
    }
}

/// Drains whatever the room queued and delivers it.
pub fn flush_room(sessions: &SessionManager, room: &mut Room) {
    let events = room.take_events();
    if !events.is_empty() {
        deliver_events(sessions, room, events);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{decode, GameConfig, Payload};
    use tokio::sync::mpsc;

    fn setup(ids: &[&str]) -> (SessionManager, Room, Vec<mpsc::Receiver<String>>) {
        let config = GameConfig::default();
        let mut sessions = SessionManager::new(16);
        let mut room = Room::new("r", "Arena", ids[0], 8, "classic");
        let mut receivers = Vec::new();
        for id in ids {
            let (tx, rx) = mpsc::channel(8);
            sessions.register(id.to_string(), tx);
            room.add_player(*id, *id, &config).unwrap();
            receivers.push(rx);
        }
        (sessions, room, receivers)
    }

    fn kinds(rx: &mut mpsc::Receiver<String>) -> Vec<MessageKind> {
        let mut kinds = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            kinds.push(decode(&frame).unwrap().kind());
        }
        kinds
    }

    #[test]
    fn test_broadcast_respects_exclude() {
        let (sessions, room, mut rx) = setup(&["a", "b", "c"]);
        let message = Message::new(Payload::RoomStartGame {
            room_id: "r".into(),
            host_player_id: "a".into(),
        });

        assert_eq!(broadcast_to_room(&sessions, &room, &message, Some("a")), 2);
        assert!(kinds(&mut rx[0]).is_empty());
        assert_eq!(kinds(&mut rx[1]), vec![MessageKind::RoomStartGame]);
        assert_eq!(kinds(&mut rx[2]), vec![MessageKind::RoomStartGame]);
    }

    #[test]
    fn test_failed_recipient_does_not_block_others() {
        let (sessions, room, mut rx) = setup(&["a", "b", "c"]);
        drop(rx.remove(1));
        let message = Message::error(shared::ErrorCode::InternalError, "x");

        assert_eq!(broadcast_to_room(&sessions, &room, &message, None), 2);
        assert_eq!(kinds(&mut rx[0]).len(), 1);
        assert_eq!(kinds(&mut rx[1]).len(), 1);
    }

    #[test]
    fn test_targeted_events_reach_only_their_player() {
        let (sessions, room, mut rx) = setup(&["a", "b"]);
        let events = vec![
            RoomEvent::to_room(Payload::PlayerDeath {
                player_id: "b".into(),
                killer_id: "a".into(),
                death_position: shared::Vec2::ZERO,
            }),
            RoomEvent::to_player(
                "a",
                Payload::GameVictory {
                    winner_player_id: "a".into(),
                    winner_player_name: "a".into(),
                    room_id: "r".into(),
                    game_duration: 1.0,
                    total_players: 2,
                },
            ),
        ];

        deliver_events(&sessions, &room, events);
        assert_eq!(
            kinds(&mut rx[0]),
            vec![MessageKind::PlayerDeath, MessageKind::GameVictory]
        );
        assert_eq!(kinds(&mut rx[1]), vec![MessageKind::PlayerDeath]);
    }
}
