//! A single game room: membership, slots, host, and the
//! `waiting -> playing -> finished` lifecycle.
//!
//! `Room` never touches the network. Anything room members must hear about is
//! queued as a [`RoomEvent`] and drained by whoever drives the room (a message
//! handler or the tick loop), which hands the events to the broadcaster.
//!
//! Players and bullets live in `BTreeMap`s so iteration order, and therefore
//! collision tie-breaking and host transfer, is deterministic.

use crate::error::GameError;
use rand::{rngs::StdRng, Rng, SeedableRng};
use shared::{
    now_secs, Bullet, BulletId, EndReason, GameConfig, MovementAuthority, MovementIntent, Payload,
    Player, PlayerId, RoomId, RoomInfo, RoomState, Vec2,
};
use std::collections::BTreeMap;

/// Who a queued event is addressed to.
#[derive(Debug, Clone, PartialEq)]
pub enum Audience {
    Room,
    RoomExcept(PlayerId),
    Player(PlayerId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoomEvent {
    pub audience: Audience,
    pub payload: Payload,
}

impl RoomEvent {
    pub fn to_room(payload: Payload) -> Self {
        Self {
            audience: Audience::Room,
            payload,
        }
    }

    pub fn to_room_except(exclude: impl Into<PlayerId>, payload: Payload) -> Self {
        Self {
            audience: Audience::RoomExcept(exclude.into()),
            payload,
        }
    }

    pub fn to_player(player_id: impl Into<PlayerId>, payload: Payload) -> Self {
        Self {
            audience: Audience::Player(player_id.into()),
            payload,
        }
    }
}

/// Result of removing a player from a room.
#[derive(Debug)]
pub struct Departure {
    pub player: Player,
    /// Set when the departing player was host and someone inherited the role.
    pub new_host: Option<PlayerId>,
}

/// Spawn point for a slot. The first eight slots use fixed points near the
/// arena corners and edge midpoints; later slots get a position from an RNG
/// seeded with the slot index, so the same slot always spawns in the same place.
pub fn spawn_position(slot: u32, config: &GameConfig) -> Vec2 {
    const EDGE: f64 = 100.0;
    const FALLBACK_MARGIN: f64 = 50.0;

    let (w, h) = (config.arena_width, config.arena_height);
    let table = [
        Vec2::new(EDGE, EDGE),
        Vec2::new(w - EDGE, EDGE),
        Vec2::new(EDGE, h - EDGE),
        Vec2::new(w - EDGE, h - EDGE),
        Vec2::new(w / 2.0, EDGE),
        Vec2::new(w / 2.0, h - EDGE),
        Vec2::new(EDGE, h / 2.0),
        Vec2::new(w - EDGE, h / 2.0),
    ];

    match table.get(slot as usize) {
        Some(point) => point.clamped(w, h),
        None => {
            let mut rng = StdRng::seed_from_u64(u64::from(slot));
            let max_x = (w - FALLBACK_MARGIN).max(FALLBACK_MARGIN);
            let max_y = (h - FALLBACK_MARGIN).max(FALLBACK_MARGIN);
            Vec2::new(
                rng.gen_range(FALLBACK_MARGIN..=max_x),
                rng.gen_range(FALLBACK_MARGIN..=max_y),
            )
            .clamped(w, h)
        }
    }
}

#[derive(Debug)]
pub struct Room {
    pub room_id: RoomId,
    pub name: String,
    pub host_player_id: PlayerId,
    pub max_players: u32,
    pub game_mode: String,
    pub players: BTreeMap<PlayerId, Player>,
    pub bullets: BTreeMap<BulletId, Bullet>,
    /// Advances once per tick while the room has players. Never reset.
    pub frame_id: u64,
    /// Accumulated simulation time in seconds.
    pub game_time: f64,
    pub state: RoomState,
    /// Wall-clock creation time.
    pub created_at: f64,
    /// `game_time` at which the current game started.
    pub game_started_at: f64,
    /// Set by any change the fallback sync should pick up while waiting.
    pub dirty: bool,
    pub ticks_since_sync: u64,
    /// Seconds spent with no players, used to reap rooms nobody joined.
    pub empty_for: f64,
    pending_events: Vec<RoomEvent>,
}

impl Room {
    pub fn new(
        room_id: impl Into<RoomId>,
        name: impl Into<String>,
        host_player_id: impl Into<PlayerId>,
        max_players: u32,
        game_mode: impl Into<String>,
    ) -> Self {
        Self {
            room_id: room_id.into(),
            name: name.into(),
            host_player_id: host_player_id.into(),
            max_players,
            game_mode: game_mode.into(),
            players: BTreeMap::new(),
            bullets: BTreeMap::new(),
            frame_id: 0,
            game_time: 0.0,
            state: RoomState::Waiting,
            created_at: now_secs(),
            game_started_at: 0.0,
            dirty: false,
            ticks_since_sync: 0,
            empty_for: 0.0,
            pending_events: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn player_count(&self) -> u32 {
        self.players.len() as u32
    }

    pub fn is_host(&self, player_id: &str) -> bool {
        self.host_player_id == player_id
    }

    pub fn alive_count(&self) -> usize {
        self.players.values().filter(|p| p.is_alive).count()
    }

    pub fn info(&self) -> RoomInfo {
        RoomInfo {
            room_id: self.room_id.clone(),
            name: self.name.clone(),
            current_players: self.player_count(),
            max_players: self.max_players,
            room_state: self.state,
            host_player_id: self.host_player_id.clone(),
        }
    }

    /// Full-state snapshot used for joins and the fallback sync.
    pub fn snapshot(&self) -> Payload {
        Payload::GameStateUpdate {
            players: self.players.values().cloned().collect(),
            bullets: self.bullets.values().cloned().collect(),
            game_time: self.game_time,
            frame_id: self.frame_id,
        }
    }

    pub fn push_event(&mut self, event: RoomEvent) {
        self.pending_events.push(event);
    }

    pub fn take_events(&mut self) -> Vec<RoomEvent> {
        std::mem::take(&mut self.pending_events)
    }

    /// Lowest slot in `[0, max_players)` nobody holds.
    pub fn first_free_slot(&self) -> Option<u32> {
        (0..self.max_players).find(|slot| !self.players.values().any(|p| p.slot_index == *slot))
    }

    fn require_host(&self, requester: &str, action: &'static str) -> Result<(), GameError> {
        if self.is_host(requester) {
            Ok(())
        } else {
            Err(GameError::NotHost(action))
        }
    }

    /// The slot a joining player would get, or why they cannot join.
    pub fn admission_slot(&self, player_id: &str) -> Result<u32, GameError> {
        if self.state != RoomState::Waiting {
            return Err(GameError::GameInProgress(self.room_id.clone()));
        }
        if self.players.contains_key(player_id) {
            return Err(GameError::InvalidMessage(format!(
                "player {} is already in room {}",
                player_id, self.room_id
            )));
        }
        self.first_free_slot()
            .ok_or_else(|| GameError::RoomFull(self.room_id.clone()))
    }

    pub fn add_player(
        &mut self,
        player_id: impl Into<PlayerId>,
        name: impl Into<String>,
        config: &GameConfig,
    ) -> Result<&Player, GameError> {
        let player_id = player_id.into();
        let slot = self.admission_slot(&player_id)?;

        let mut player = Player::new(player_id.clone(), name, config.max_health);
        player.slot_index = slot;
        player.position = spawn_position(slot, config);
        player.last_update = now_secs();

        // The designated host may never have joined; the first player to
        // actually show up takes the role instead.
        if !self.players.contains_key(&self.host_player_id) {
            self.host_player_id = player_id.clone();
        }
        self.empty_for = 0.0;
        self.dirty = true;

        Ok(self.players.entry(player_id).or_insert(player))
    }

    /// Removes a player, handing the host role to the lowest remaining id if
    /// needed. A departure mid-game can decide the game.
    pub fn remove_player(&mut self, player_id: &str) -> Option<Departure> {
        let player = self.players.remove(player_id)?;
        self.dirty = true;

        let mut new_host = None;
        if self.host_player_id == player.player_id {
            if let Some(next) = self.players.keys().next() {
                self.host_player_id = next.clone();
                new_host = Some(next.clone());
            }
        }

        if !self.players.is_empty() {
            self.check_last_standing();
        }

        Some(Departure { player, new_host })
    }

    /// Moves a player to another slot while the room is waiting. Returns the
    /// slot the player held before.
    pub fn change_slot(
        &mut self,
        player_id: &str,
        target_slot: u32,
        config: &GameConfig,
    ) -> Result<u32, GameError> {
        if !self.players.contains_key(player_id) {
            return Err(GameError::PlayerNotFound(player_id.to_string()));
        }
        if self.state != RoomState::Waiting || target_slot >= self.max_players {
            return Err(GameError::SlotUnavailable(target_slot));
        }
        let taken = self
            .players
            .values()
            .any(|p| p.slot_index == target_slot && p.player_id != player_id);
        if taken {
            return Err(GameError::SlotUnavailable(target_slot));
        }

        let player = self
            .players
            .get_mut(player_id)
            .ok_or_else(|| GameError::PlayerNotFound(player_id.to_string()))?;
        let old_slot = player.slot_index;
        player.slot_index = target_slot;
        player.position = spawn_position(target_slot, config);
        self.dirty = true;
        Ok(old_slot)
    }

    pub fn start_game(&mut self, requester: &str) -> Result<(), GameError> {
        self.require_host(requester, "start the game")?;
        if self.state != RoomState::Waiting {
            return Err(GameError::CannotStart(format!(
                "start a game while the room is {}",
                self.state.as_str()
            )));
        }
        if self.players.is_empty() {
            return Err(GameError::CannotStart("start a game with no players".into()));
        }

        self.state = RoomState::Playing;
        self.game_started_at = self.game_time;
        self.bullets.clear();
        self.dirty = true;
        self.push_event(RoomEvent::to_room(Payload::RoomStartGame {
            room_id: self.room_id.clone(),
            host_player_id: self.host_player_id.clone(),
        }));

        // A lone player has nobody to beat.
        if self.players.len() == 1 {
            self.check_last_standing();
        }
        Ok(())
    }

    pub fn end_game(&mut self, requester: &str) -> Result<(), GameError> {
        self.require_host(requester, "end the game")?;
        if self.state != RoomState::Playing {
            return Err(GameError::CannotStart(format!(
                "end a game while the room is {}",
                self.state.as_str()
            )));
        }
        self.finish(EndReason::HostEnded);
        Ok(())
    }

    /// `finished -> waiting`: clears bullets and puts every player back on
    /// their slot's spawn point at full health.
    pub fn reset_for_new_game(&mut self, requester: &str, config: &GameConfig) -> Result<(), GameError> {
        self.require_host(requester, "reset the room")?;
        if self.state != RoomState::Finished {
            return Err(GameError::CannotStart(format!(
                "reset a room that is {}",
                self.state.as_str()
            )));
        }

        self.bullets.clear();
        for player in self.players.values_mut() {
            player.restore(spawn_position(player.slot_index, config));
        }
        self.state = RoomState::Waiting;
        self.game_started_at = self.game_time;
        self.dirty = true;
        self.push_event(RoomEvent::to_room(Payload::RoomReset {
            room_id: self.room_id.clone(),
            host_player_id: self.host_player_id.clone(),
        }));
        Ok(())
    }

    /// Records movement intent. Returns the position the rest of the room
    /// should see for this player.
    pub fn apply_move(
        &mut self,
        player_id: &str,
        intent: MovementIntent,
        reported: Vec2,
        config: &GameConfig,
    ) -> Result<Vec2, GameError> {
        let player = self
            .players
            .get_mut(player_id)
            .ok_or_else(|| GameError::PlayerNotFound(player_id.to_string()))?;

        if player.is_alive {
            player.moving_directions = intent;
            if config.movement_authority == MovementAuthority::Client
                && reported.x.is_finite()
                && reported.y.is_finite()
            {
                player.position = reported.clamped(config.arena_width, config.arena_height);
            }
        }
        player.last_update = now_secs();
        self.dirty = true;
        Ok(player.position)
    }

    /// Spawns a bullet for `player_id`. Returns `Ok(false)` when the shot is
    /// silently ignored: room not playing, shooter dead, zero direction, or a
    /// bullet id that is already in flight.
    pub fn fire(
        &mut self,
        player_id: &str,
        origin: Vec2,
        direction: Vec2,
        bullet_id: BulletId,
        config: &GameConfig,
    ) -> Result<bool, GameError> {
        let shooter = self
            .players
            .get(player_id)
            .ok_or_else(|| GameError::PlayerNotFound(player_id.to_string()))?;

        if self.state != RoomState::Playing || !shooter.is_alive {
            return Ok(false);
        }
        let Some(direction) = direction.normalized() else {
            return Ok(false);
        };
        if self.bullets.contains_key(&bullet_id) {
            return Ok(false);
        }

        let mut start = origin.clamped(config.arena_width, config.arena_height);
        let origin_valid = origin.x.is_finite() && origin.y.is_finite();
        if !origin_valid || start.distance(shooter.position) > config.max_shot_origin_offset {
            start = shooter.position;
        }

        let bullet = Bullet {
            bullet_id: bullet_id.clone(),
            owner_id: player_id.to_string(),
            position: start,
            velocity: direction * config.bullet_speed,
            damage: config.bullet_damage,
            created_time: self.game_time,
            max_lifetime: config.bullet_lifetime,
        };

        self.push_event(RoomEvent::to_room(Payload::BulletFired {
            bullet_id: bullet.bullet_id.clone(),
            owner_id: bullet.owner_id.clone(),
            start_position: bullet.position,
            velocity: bullet.velocity,
            damage: bullet.damage,
        }));
        self.bullets.insert(bullet_id, bullet);
        self.dirty = true;
        Ok(true)
    }

    /// Queues the death broadcast and the victim's defeat, then checks whether
    /// the game is over.
    pub fn record_elimination(&mut self, victim_id: &str, killer_id: &str) {
        let Some(victim) = self.players.get(victim_id) else {
            return;
        };
        let killer_name = self
            .players
            .get(killer_id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| "Unknown".to_string());

        let death = Payload::PlayerDeath {
            player_id: victim.player_id.clone(),
            killer_id: killer_id.to_string(),
            death_position: victim.position,
        };
        let defeat = Payload::GameDefeat {
            eliminated_player_id: victim.player_id.clone(),
            eliminated_player_name: victim.name.clone(),
            killer_id: killer_id.to_string(),
            killer_name,
            room_id: self.room_id.clone(),
            survival_time: self.game_time - self.game_started_at,
        };

        self.push_event(RoomEvent::to_room(death));
        self.push_event(RoomEvent::to_player(victim_id, defeat));
        self.check_last_standing();
    }

    /// Finishes a playing room when at most one player is left alive. The
    /// survivor, if any, gets a unicast victory.
    fn check_last_standing(&mut self) {
        if self.state != RoomState::Playing {
            return;
        }

        let mut alive = self.players.values().filter(|p| p.is_alive);
        match (alive.next(), alive.next()) {
            (Some(winner), None) => {
                let victory = Payload::GameVictory {
                    winner_player_id: winner.player_id.clone(),
                    winner_player_name: winner.name.clone(),
                    room_id: self.room_id.clone(),
                    game_duration: self.game_time - self.game_started_at,
                    total_players: self.player_count(),
                };
                let winner_id = winner.player_id.clone();
                self.state = RoomState::Finished;
                self.dirty = true;
                self.push_event(RoomEvent::to_player(winner_id, victory));
            }
            (None, _) => self.finish(EndReason::AllPlayersDead),
            _ => {}
        }
    }

    fn finish(&mut self, reason: EndReason) {
        self.state = RoomState::Finished;
        self.dirty = true;
        self.push_event(RoomEvent::to_room(Payload::RoomEndGame {
            room_id: self.room_id.clone(),
            reason,
        }));
    }
}
