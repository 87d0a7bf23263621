//! Smoothing of server-reported positions into what the player sees.
//!
//! Every tank the client knows about is an [`EntityView`]. Server samples
//! (snapshots, move and stop relays) set the authoritative position; each
//! frame the displayed position is pulled toward it, optionally leaning ahead
//! along the tank's movement intent so a moving tank does not visibly lag.
//!
//! How hard a sample corrects the display depends on how far off it is:
//!
//! | divergence                        | result                         |
//! |-----------------------------------|--------------------------------|
//! | above the snap threshold          | display jumps to the sample    |
//! | inside the stable band            | nothing visible happens        |
//! | anywhere in between               | bounded blend over a few ticks |
//!
//! The snap threshold is larger while the tank is moving, since latency alone
//! puts a moving tank tens of units away from its last sample. When many
//! corrections arrive in a short window the stable band widens for a while so
//! small noisy divergences stop fighting each other.

use log::debug;
use shared::{integrate_position, GameConfig, MovementIntent, Vec2};
use std::collections::VecDeque;

/// Below this distance the blend simply lands on its target.
const SETTLE_DISTANCE: f64 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileConfig {
    pub stable_threshold: f64,
    pub minor_threshold: f64,
    pub snap_threshold_idle: f64,
    pub snap_threshold_moving: f64,
    pub interpolation_speed: f64,
    pub dampening: f64,
    /// Upper bound on blend movement, units per second.
    pub max_blend_rate: f64,
    /// Longest dead-reckoning lookahead, frame step included, seconds.
    pub prediction_horizon: f64,
    /// Samples older than this are not extrapolated at all, seconds.
    pub prediction_window: f64,
    pub max_prediction_weight: f64,
    /// More corrections than this inside `oscillation_window` widens the band.
    pub oscillation_limit: usize,
    pub oscillation_window: f64,
    pub oscillation_widening: f64,
    pub oscillation_cooldown: f64,
    pub tank_speed: f64,
    pub arena_width: f64,
    pub arena_height: f64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self::from_game(&GameConfig::default())
    }
}

impl ReconcileConfig {
    /// Ladder defaults, with speed and arena taken from the game constants so
    /// that extrapolation agrees with the server's integration.
    pub fn from_game(game: &GameConfig) -> Self {
        Self {
            stable_threshold: 3.0,
            minor_threshold: 15.0,
            snap_threshold_idle: 150.0,
            snap_threshold_moving: 300.0,
            interpolation_speed: 12.0,
            dampening: 0.3,
            max_blend_rate: 200.0,
            prediction_horizon: 0.15,
            prediction_window: 1.5,
            max_prediction_weight: 0.6,
            oscillation_limit: 4,
            oscillation_window: 1.0,
            oscillation_widening: 3.0,
            oscillation_cooldown: 1.0,
            tank_speed: game.tank_speed,
            arena_width: game.arena_width,
            arena_height: game.arena_height,
        }
    }

    fn integrate(&self, position: Vec2, intent: MovementIntent, dt: f64) -> Vec2 {
        integrate_position(
            position,
            intent,
            self.tank_speed,
            dt,
            self.arena_width,
            self.arena_height,
        )
    }
}

/// An authoritative position report for one tank.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServerSample {
    pub position: Vec2,
    pub intent: MovementIntent,
    /// Server send time of the carrying message, seconds.
    pub timestamp: f64,
}

/// What a sample did to the displayed position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Correction {
    Snapped { distance: f64 },
    Interpolating { distance: f64 },
    InSync,
    /// Older than a sample already applied; ignored.
    Stale,
    /// The entity is moved locally and server samples never override it.
    LocalAuthority,
}

impl Correction {
    pub fn is_correction(&self) -> bool {
        matches!(
            self,
            Correction::Snapped { .. } | Correction::Interpolating { .. }
        )
    }
}

#[derive(Debug, Clone)]
pub struct EntityView {
    server_position: Vec2,
    server_intent: MovementIntent,
    last_sample_time: f64,
    /// Local clock when the last sample arrived.
    received_at: f64,
    display_position: Vec2,
    target: Vec2,
    local_authority: bool,
    recent_corrections: VecDeque<f64>,
    widened_until: f64,
}

impl EntityView {
    pub fn new(position: Vec2, now: f64) -> Self {
        Self {
            server_position: position,
            server_intent: MovementIntent::IDLE,
            last_sample_time: f64::NEG_INFINITY,
            received_at: now,
            display_position: position,
            target: position,
            local_authority: false,
            recent_corrections: VecDeque::new(),
            widened_until: f64::NEG_INFINITY,
        }
    }

    /// A view the client moves itself, for the own tank when clients are the
    /// movement authority.
    pub fn locally_driven(position: Vec2, now: f64) -> Self {
        Self {
            local_authority: true,
            ..Self::new(position, now)
        }
    }

    pub fn display_position(&self) -> Vec2 {
        self.display_position
    }

    pub fn server_position(&self) -> Vec2 {
        self.server_position
    }

    pub fn intent(&self) -> MovementIntent {
        self.server_intent
    }

    pub fn is_locally_driven(&self) -> bool {
        self.local_authority
    }

    /// Replaces the intent used for extrapolation. The own tank calls this on
    /// every input change so prediction does not wait for the round trip.
    pub fn set_intent(&mut self, intent: MovementIntent) {
        self.server_intent = intent;
    }

    /// Places the view without any smoothing, e.g. on a fresh spawn.
    pub fn teleport(&mut self, position: Vec2) {
        self.server_position = position;
        self.display_position = position;
        self.target = position;
    }

    pub fn is_widened(&self, now: f64) -> bool {
        now < self.widened_until
    }

    fn stable_band(&self, config: &ReconcileConfig, now: f64) -> f64 {
        if self.is_widened(now) {
            config.stable_threshold * config.oscillation_widening
        } else {
            config.stable_threshold
        }
    }

    pub fn apply_server_sample(
        &mut self,
        sample: ServerSample,
        config: &ReconcileConfig,
        now: f64,
    ) -> Correction {
        if sample.timestamp < self.last_sample_time {
            return Correction::Stale;
        }
        self.last_sample_time = sample.timestamp;
        self.received_at = now;

        if self.local_authority {
            self.server_position = sample.position;
            return Correction::LocalAuthority;
        }

        self.server_position = sample.position;
        self.server_intent = sample.intent;

        let distance = self.display_position.distance(sample.position);
        let snap_threshold = if sample.intent.is_moving() {
            config.snap_threshold_moving
        } else {
            config.snap_threshold_idle
        };

        if distance > snap_threshold {
            self.teleport(sample.position);
            self.record_correction(config, now);
            debug!("Snapped entity by {:.1} units", distance);
            return Correction::Snapped { distance };
        }

        self.target = sample.position;
        if distance <= self.stable_band(config, now) {
            return Correction::InSync;
        }

        self.record_correction(config, now);
        Correction::Interpolating { distance }
    }

    fn record_correction(&mut self, config: &ReconcileConfig, now: f64) {
        self.recent_corrections.push_back(now);
        while let Some(&oldest) = self.recent_corrections.front() {
            if now - oldest > config.oscillation_window {
                self.recent_corrections.pop_front();
            } else {
                break;
            }
        }
        if self.recent_corrections.len() > config.oscillation_limit {
            if !self.is_widened(now) {
                debug!(
                    "{} corrections within {:.1}s, widening stable band",
                    self.recent_corrections.len(),
                    config.oscillation_window
                );
            }
            self.widened_until = now + config.oscillation_cooldown;
        }
    }

    /// Per-frame step of the displayed position.
    pub fn update(&mut self, dt: f64, config: &ReconcileConfig, now: f64) {
        if self.local_authority {
            self.display_position = config.integrate(self.display_position, self.server_intent, dt);
            self.target = self.display_position;
            return;
        }

        self.target = self.blended_target(dt, config, now);
        self.step_toward_target(dt, config);
    }

    /// The server position, leaned toward a short extrapolation along the
    /// current intent. The lean grows with the age of the sample and halves
    /// while the display is still far from the server.
    fn blended_target(&self, dt: f64, config: &ReconcileConfig, now: f64) -> Vec2 {
        let since_sample = (now - self.received_at).max(0.0);
        if !self.server_intent.is_moving() || since_sample >= config.prediction_window {
            return self.server_position;
        }

        let lookahead = (dt + since_sample * 0.3).min(config.prediction_horizon);
        let predicted = config.integrate(self.server_position, self.server_intent, lookahead);

        let mut weight = config.max_prediction_weight * (since_sample / 0.5).min(1.0);
        if self.display_position.distance(self.server_position) > config.minor_threshold {
            weight *= 0.5;
        }
        self.server_position.lerp(predicted, weight)
    }

    fn step_toward_target(&mut self, dt: f64, config: &ReconcileConfig) {
        let offset = self.target - self.display_position;
        let distance = offset.length();
        if distance < SETTLE_DISTANCE {
            self.display_position = self.target;
            return;
        }

        let speed = if distance > config.minor_threshold {
            config.interpolation_speed * (1.0 + distance / 50.0)
        } else {
            config.interpolation_speed * 0.6
        };
        let step = (speed * distance * dt * config.dampening)
            .min(distance)
            .min(config.max_blend_rate * dt);

        if let Some(direction) = offset.normalized() {
            self.display_position = self.display_position + direction * step;
        }
    }
}
