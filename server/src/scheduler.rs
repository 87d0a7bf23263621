//! Fixed-rate tick pacing and the per-tick room sweep.
//!
//! The loop never steps twice to catch up. If a tick runs late, the next one
//! is scheduled a full period after the late tick started, so the simulation
//! falls behind wall-clock time under overload instead of bursting.

use crate::physics;
use crate::registry::RoomRegistry;
use crate::room::RoomEvent;
use log::warn;
use shared::{GameConfig, Payload, RoomId, RoomState};
use std::time::Duration;
use tokio::time::Instant;

/// Tracks when the next tick is due.
#[derive(Debug)]
pub struct TickClock {
    period: Duration,
    last_start: Instant,
    ticks: u64,
    overruns: u64,
}

impl TickClock {
    pub fn new(period: Duration, now: Instant) -> Self {
        Self {
            period,
            last_start: now,
            ticks: 0,
            overruns: 0,
        }
    }

    pub fn deadline(&self) -> Instant {
        self.last_start + self.period
    }

    /// Marks the start of a tick and returns how late it is.
    pub fn begin_tick(&mut self, now: Instant) -> Duration {
        let lateness = now.saturating_duration_since(self.deadline());
        self.last_start = now;
        self.ticks += 1;
        if lateness > self.period {
            self.overruns += 1;
            if self.overruns % 60 == 1 {
                warn!(
                    "Tick {} started {:.1}ms late ({} overruns so far)",
                    self.ticks,
                    lateness.as_secs_f64() * 1000.0,
                    self.overruns
                );
            }
        }
        lateness
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn overruns(&self) -> u64 {
        self.overruns
    }
}

/// How often each room gets a full-state fallback sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncPolicy {
    pub waiting_ticks: u64,
    pub playing_ticks: u64,
}

impl SyncPolicy {
    pub fn from_config(config: &GameConfig) -> Self {
        Self {
            waiting_ticks: config.ticks_for(config.waiting_sync_interval),
            playing_ticks: config.ticks_for(config.playing_sync_interval),
        }
    }

    /// Playing rooms sync on every interval. Other rooms only sync when
    /// something changed since the last one.
    pub fn is_due(&self, state: RoomState, ticks_since_sync: u64, dirty: bool) -> bool {
        match state {
            RoomState::Playing => ticks_since_sync >= self.playing_ticks,
            RoomState::Waiting | RoomState::Finished => {
                dirty && ticks_since_sync >= self.waiting_ticks
            }
        }
    }
}

/// What one room produced during a tick.
#[derive(Debug)]
pub struct TickOutcome {
    pub room_id: RoomId,
    pub events: Vec<RoomEvent>,
    /// Full snapshot to broadcast, when the fallback sync came due.
    pub sync: Option<Payload>,
}

/// Runs one tick over every room: physics for occupied rooms, the fallback
/// sync decision, and reaping of rooms nobody ever joined.
pub fn run_tick(registry: &mut RoomRegistry, config: &GameConfig, policy: &SyncPolicy) -> Vec<TickOutcome> {
    let dt = config.tick_dt();
    let mut outcomes = Vec::new();

    for room in registry.rooms_mut() {
        if room.is_empty() {
            room.empty_for += dt;
            continue;
        }

        physics::step_room(room, config);
        room.ticks_since_sync += 1;

        let sync = if policy.is_due(room.state, room.ticks_since_sync, room.dirty) {
            room.ticks_since_sync = 0;
            room.dirty = false;
            Some(room.snapshot())
        } else {
            None
        };

        let events = room.take_events();
        if !events.is_empty() || sync.is_some() {
            outcomes.push(TickOutcome {
                room_id: room.room_id.clone(),
                events,
                sync,
            });
        }
    }

    registry.reap_empty(config.empty_room_grace);
    outcomes
}
