//! Input sources and the rate-limited movement sender.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{MovementIntent, Payload, PlayerId, Vec2};
use std::time::Duration;

/// Position drift that counts as "moved" for the send gate.
const MOVE_SEND_DISTANCE: f64 = 5.0;
const MIN_MOVE_SEND_INTERVAL: Duration = Duration::from_millis(50);
/// Movement is resent at least this often so a lost frame heals itself.
const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(250);

/// One frame's worth of player intent.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct InputFrame {
    pub intent: MovementIntent,
    /// Aim direction when the player pulls the trigger this frame.
    pub fire: Option<Vec2>,
}

/// Anything that can drive a tank: a keyboard, a script, a bot.
pub trait InputSource {
    fn poll(&mut self, now: f64, position: Vec2) -> InputFrame;
}

/// Decides when movement is worth a frame on the wire.
pub struct MovementSender {
    last_intent: MovementIntent,
    last_position: Option<Vec2>,
    last_sent_at: Option<f64>,
    sent: u64,
}

impl MovementSender {
    pub fn new() -> Self {
        Self {
            last_intent: MovementIntent::IDLE,
            last_position: None,
            last_sent_at: None,
            sent: 0,
        }
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }

    fn should_send(&self, intent: MovementIntent, position: Vec2, now: f64) -> bool {
        let Some(last_sent_at) = self.last_sent_at else {
            return true;
        };
        let elapsed = now - last_sent_at;

        if intent != self.last_intent {
            return true;
        }
        let drifted = self
            .last_position
            .map_or(true, |last| last.distance(position) > MOVE_SEND_DISTANCE);
        if drifted && elapsed >= MIN_MOVE_SEND_INTERVAL.as_secs_f64() {
            return true;
        }
        elapsed >= HEARTBEAT_INTERVAL.as_secs_f64()
    }

    /// Returns the movement message to send this frame, if any. A stopped tank
    /// reports `player_stop`, a moving one `player_move`.
    pub fn next_message(
        &mut self,
        player_id: &PlayerId,
        intent: MovementIntent,
        position: Vec2,
        now: f64,
    ) -> Option<Payload> {
        if !self.should_send(intent, position, now) {
            return None;
        }
        self.last_intent = intent;
        self.last_position = Some(position);
        self.last_sent_at = Some(now);
        self.sent += 1;

        let payload = if intent.is_moving() {
            Payload::PlayerMove {
                player_id: player_id.clone(),
                direction: intent,
                position,
            }
        } else {
            Payload::PlayerStop {
                player_id: player_id.clone(),
                position,
            }
        };
        Some(payload)
    }
}

impl Default for MovementSender {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives a tank around the arena at random, turning every so often and
/// firing in random directions. Seeded so runs are reproducible.
pub struct WanderingBot {
    rng: StdRng,
    intent: MovementIntent,
    next_turn: f64,
    next_shot: f64,
    fire_interval: f64,
    arena: Vec2,
}

impl WanderingBot {
    pub fn new(seed: u64, fire_interval: f64, arena_width: f64, arena_height: f64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            intent: MovementIntent::IDLE,
            next_turn: 0.0,
            next_shot: fire_interval,
            fire_interval,
            arena: Vec2::new(arena_width, arena_height),
        }
    }

    fn random_intent(&mut self) -> MovementIntent {
        MovementIntent {
            up: self.rng.gen_bool(0.3),
            left: self.rng.gen_bool(0.3),
            down: self.rng.gen_bool(0.3),
            right: self.rng.gen_bool(0.3),
        }
    }

    /// Heads back toward the middle when hugging a wall.
    fn steer_off_walls(&self, mut intent: MovementIntent, position: Vec2) -> MovementIntent {
        let margin = 40.0;
        if position.x < margin {
            intent.left = false;
            intent.right = true;
        } else if position.x > self.arena.x - margin {
            intent.right = false;
            intent.left = true;
        }
        if position.y < margin {
            intent.up = false;
            intent.down = true;
        } else if position.y > self.arena.y - margin {
            intent.down = false;
            intent.up = true;
        }
        intent
    }
}

impl InputSource for WanderingBot {
    fn poll(&mut self, now: f64, position: Vec2) -> InputFrame {
        if now >= self.next_turn {
            self.intent = self.random_intent();
            self.next_turn = now + self.rng.gen_range(0.5..2.0);
        }
        self.intent = self.steer_off_walls(self.intent, position);

        let fire = if self.fire_interval > 0.0 && now >= self.next_shot {
            self.next_shot = now + self.fire_interval;
            let angle: f64 = self.rng.gen_range(0.0..std::f64::consts::TAU);
            Some(Vec2::new(angle.cos(), angle.sin()))
        } else {
            None
        };

        InputFrame {
            intent: self.intent,
            fire,
        }
    }
}
