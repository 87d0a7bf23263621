//! Fixed-step simulation for one room.
//!
//! [`step_room`] is the only place simulation time advances. It is infallible
//! by construction: nothing in it can fail, so one room's tick can never take
//! down the loop that drives the others.

use crate::room::{Room, RoomEvent};
use shared::{Bullet, DestroyReason, GameConfig, MovementAuthority, Payload, Player, PlayerId, RoomState};
use std::collections::BTreeMap;

/// Advances a room by one tick of `config.tick_dt()` seconds.
///
/// Rooms without players are left untouched. The frame counter and game time
/// advance for every other room; movement, bullets and collisions only run
/// while the room is playing. Bullets still in flight once a game has ended
/// are cleared on the next tick.
pub fn step_room(room: &mut Room, config: &GameConfig) {
    if room.is_empty() {
        return;
    }

    let dt = config.tick_dt();
    room.frame_id += 1;
    room.game_time += dt;

    if room.state == RoomState::Playing {
        move_players(room, config, dt);
        advance_bullets(room, config, dt);
        resolve_collisions(room, config);
    } else {
        clear_bullets(room);
    }
}

fn move_players(room: &mut Room, config: &GameConfig, dt: f64) {
    // Under client authority, positions arrive with the movement messages.
    if config.movement_authority != MovementAuthority::Server {
        return;
    }
    for player in room.players.values_mut() {
        if player.is_alive && player.moving_directions.is_moving() {
            player.update_position(dt, config.tank_speed, config.arena_width, config.arena_height);
        }
    }
}

fn advance_bullets(room: &mut Room, config: &GameConfig, dt: f64) {
    let game_time = room.game_time;
    let mut removed = Vec::new();

    for bullet in room.bullets.values_mut() {
        bullet.advance(dt);
        if bullet.is_out_of_bounds(config.arena_width, config.arena_height) {
            removed.push((bullet.bullet_id.clone(), DestroyReason::Boundary));
        } else if bullet.is_expired(game_time) {
            removed.push((bullet.bullet_id.clone(), DestroyReason::Expired));
        }
    }

    for (bullet_id, reason) in removed {
        room.bullets.remove(&bullet_id);
        room.push_event(RoomEvent::to_room(Payload::BulletDestroyed { bullet_id, reason }));
    }
}

fn clear_bullets(room: &mut Room) {
    let bullets = std::mem::take(&mut room.bullets);
    for bullet_id in bullets.into_keys() {
        room.push_event(RoomEvent::to_room(Payload::BulletDestroyed {
            bullet_id,
            reason: DestroyReason::Expired,
        }));
    }
}

/// First living non-owner within `radius` of the bullet, in player id order.
fn find_target(players: &BTreeMap<PlayerId, Player>, bullet: &Bullet, radius: f64) -> Option<PlayerId> {
    players
        .values()
        .find(|p| {
            p.is_alive
                && p.player_id != bullet.owner_id
                && p.position.distance(bullet.position) <= radius
        })
        .map(|p| p.player_id.clone())
}

fn resolve_collisions(room: &mut Room, config: &GameConfig) {
    let bullet_ids: Vec<_> = room.bullets.keys().cloned().collect();

    for bullet_id in bullet_ids {
        // A decided game stops resolving hits; leftovers expire next tick.
        if room.state != RoomState::Playing {
            break;
        }
        let Some(bullet) = room.bullets.get(&bullet_id) else {
            continue;
        };
        let Some(target_id) = find_target(&room.players, bullet, config.collision_radius) else {
            continue;
        };
        if let Some(bullet) = room.bullets.remove(&bullet_id) {
            apply_hit(room, bullet, &target_id);
        }
    }
}

fn apply_hit(room: &mut Room, bullet: Bullet, target_id: &str) {
    let Some(target) = room.players.get_mut(target_id) else {
        return;
    };
    let died = target.apply_damage(bullet.damage);
    let collision = Payload::Collision {
        bullet_id: bullet.bullet_id.clone(),
        target_player_id: target.player_id.clone(),
        damage_dealt: bullet.damage,
        new_health: target.health,
        collision_position: bullet.position,
    };

    room.push_event(RoomEvent::to_room(collision));
    room.push_event(RoomEvent::to_room(Payload::BulletDestroyed {
        bullet_id: bullet.bullet_id,
        reason: DestroyReason::Collision,
    }));
    if died {
        room.record_elimination(target_id, &bullet.owner_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::Audience;
    use assert_approx_eq::assert_approx_eq;
    use shared::{MovementIntent, Vec2};

    fn playing_room(ids: &[&str]) -> (Room, GameConfig) {
        let config = GameConfig::default();
        let mut room = Room::new("r", "Arena", ids[0], 8, "classic");
        for id in ids {
            room.add_player(*id, id.to_uppercase(), &config).unwrap();
        }
        room.start_game(ids[0]).unwrap();
        room.take_events();
        (room, config)
    }

    fn place(room: &mut Room, id: &str, x: f64, y: f64) {
        room.players.get_mut(id).unwrap().position = Vec2::new(x, y);
    }

    fn bullet(id: &str, owner: &str, position: Vec2, velocity: Vec2) -> Bullet {
        Bullet {
            bullet_id: id.into(),
            owner_id: owner.into(),
            position,
            velocity,
            damage: 25,
            created_time: 0.0,
            max_lifetime: 5.0,
        }
    }

    fn destroyed(events: &[RoomEvent]) -> Vec<(String, DestroyReason)> {
        events
            .iter()
            .filter_map(|e| match &e.payload {
                Payload::BulletDestroyed { bullet_id, reason } => Some((bullet_id.clone(), *reason)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_empty_room_does_not_advance() {
        let config = GameConfig::default();
        let mut room = Room::new("r", "Arena", "a", 4, "classic");
        step_room(&mut room, &config);
        assert_eq!(room.frame_id, 0);
        assert_eq!(room.game_time, 0.0);
    }

    #[test]
    fn test_waiting_room_advances_time_without_physics() {
        let config = GameConfig::default();
        let mut room = Room::new("r", "Arena", "a", 4, "classic");
        room.add_player("a", "A", &config).unwrap();
        room.players.get_mut("a").unwrap().moving_directions.right = true;
        let before = room.players["a"].position;

        step_room(&mut room, &config);
        assert_eq!(room.frame_id, 1);
        assert_approx_eq!(room.game_time, 1.0 / 60.0, 1e-12);
        assert_eq!(room.players["a"].position, before);
    }

    #[test]
    fn test_server_authority_integrates_intent() {
        let (mut room, config) = playing_room(&["a", "b"]);
        place(&mut room, "a", 400.0, 300.0);
        room.players.get_mut("a").unwrap().moving_directions = MovementIntent {
            up: true,
            ..MovementIntent::IDLE
        };

        step_room(&mut room, &config);
        assert_approx_eq!(room.players["a"].position.y, 295.0, 1e-9);
        assert_eq!(room.players["a"].position.x, 400.0);
    }

    #[test]
    fn test_bullets_leave_by_boundary_and_expiry() {
        let (mut room, config) = playing_room(&["a", "b"]);
        place(&mut room, "a", 100.0, 100.0);
        place(&mut room, "b", 700.0, 500.0);
        room.bullets.insert(
            "edge".into(),
            bullet("edge", "a", Vec2::new(799.0, 300.0), Vec2::new(300.0, 0.0)),
        );
        let mut old = bullet("old", "a", Vec2::new(400.0, 300.0), Vec2::ZERO);
        old.created_time = room.game_time - 5.0;
        room.bullets.insert("old".into(), old);
        room.bullets.insert(
            "fresh".into(),
            bullet("fresh", "a", Vec2::new(400.0, 200.0), Vec2::ZERO),
        );
        room.bullets.get_mut("fresh").unwrap().created_time = room.game_time;

        step_room(&mut room, &config);
        let gone = destroyed(&room.take_events());
        assert!(gone.contains(&("edge".into(), DestroyReason::Boundary)));
        assert!(gone.contains(&("old".into(), DestroyReason::Expired)));
        assert_eq!(room.bullets.len(), 1);
        assert!(room.bullets.contains_key("fresh"));
    }

    #[test]
    fn test_bullet_never_hits_owner() {
        let (mut room, config) = playing_room(&["a", "b"]);
        place(&mut room, "a", 400.0, 300.0);
        place(&mut room, "b", 100.0, 100.0);
        room.bullets.insert(
            "b1".into(),
            bullet("b1", "a", Vec2::new(400.0, 300.0), Vec2::ZERO),
        );

        step_room(&mut room, &config);
        assert_eq!(room.players["a"].health, 100);
        assert!(room.bullets.contains_key("b1"));
    }

    #[test]
    fn test_bullet_hits_at_most_one_player() {
        let (mut room, config) = playing_room(&["a", "b", "c"]);
        place(&mut room, "a", 100.0, 100.0);
        place(&mut room, "b", 400.0, 300.0);
        place(&mut room, "c", 405.0, 300.0);
        room.bullets.insert(
            "shot".into(),
            bullet("shot", "a", Vec2::new(402.0, 300.0), Vec2::ZERO),
        );

        step_room(&mut room, &config);
        assert_eq!(room.players["b"].health, 75);
        assert_eq!(room.players["c"].health, 100);
        assert!(room.bullets.is_empty());

        let events = room.take_events();
        assert!(events.iter().any(|e| matches!(
            &e.payload,
            Payload::Collision { target_player_id, new_health: 75, .. } if target_player_id == "b"
        )));
        assert_eq!(destroyed(&events), vec![("shot".into(), DestroyReason::Collision)]);
    }

    #[test]
    fn test_lethal_hit_emits_one_death_and_decides_game() {
        let (mut room, config) = playing_room(&["a", "b"]);
        place(&mut room, "a", 100.0, 100.0);
        place(&mut room, "b", 400.0, 300.0);
        room.players.get_mut("b").unwrap().health = 10;
        for id in ["s1", "s2"] {
            room.bullets.insert(
                id.into(),
                bullet(id, "a", Vec2::new(400.0, 300.0), Vec2::ZERO),
            );
        }

        step_room(&mut room, &config);
        let b = &room.players["b"];
        assert!(!b.is_alive);
        assert_eq!(b.health, 0);
        assert_eq!(room.state, RoomState::Finished);

        let events = room.take_events();
        let deaths = events
            .iter()
            .filter(|e| matches!(e.payload, Payload::PlayerDeath { .. }))
            .count();
        assert_eq!(deaths, 1);
        assert!(events.iter().any(|e| e.audience == Audience::Player("b".into())
            && matches!(e.payload, Payload::GameDefeat { .. })));
        assert!(events.iter().any(|e| e.audience == Audience::Player("a".into())
            && matches!(e.payload, Payload::GameVictory { total_players: 2, .. })));

        // The second bullet outlived the game and is cleared next tick.
        assert!(room.bullets.contains_key("s2"));
        step_room(&mut room, &config);
        assert!(room.bullets.is_empty());
        assert_eq!(
            destroyed(&room.take_events()),
            vec![("s2".into(), DestroyReason::Expired)]
        );
    }

    #[test]
    fn test_bullet_integration_is_deterministic() {
        let (mut first, config) = playing_room(&["a", "b"]);
        let (mut second, _) = playing_room(&["a", "b"]);
        for room in [&mut first, &mut second] {
            place(room, "a", 100.0, 100.0);
            place(room, "b", 700.0, 500.0);
            room.bullets.insert(
                "b1".into(),
                bullet("b1", "a", Vec2::new(200.0, 550.0), Vec2::new(180.0, -240.0)),
            );
        }
        for _ in 0..45 {
            step_room(&mut first, &config);
            step_room(&mut second, &config);
        }
        assert_eq!(first.bullets["b1"].position, second.bullets["b1"].position);
        assert_eq!(first.game_time, second.game_time);
    }
}
