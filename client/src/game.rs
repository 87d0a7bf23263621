//! Client-side view of the room, fed by decoded server messages.

use crate::reconcile::{Correction, EntityView, ReconcileConfig, ServerSample};
use log::{debug, info, warn};
use shared::{
    Bullet, BulletId, ErrorCode, GameConfig, Message, MovementAuthority, MovementIntent, Payload,
    Player, PlayerId, RoomId, RoomInfo, RoomState, Vec2,
};
use std::collections::{BTreeMap, HashMap};

/// How the last game ended for this client.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Victory {
        game_duration: f64,
        total_players: u32,
    },
    Defeat {
        killer_name: String,
        survival_time: f64,
    },
}

#[derive(Debug, Clone)]
pub struct TrackedPlayer {
    pub player: Player,
    pub view: EntityView,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CorrectionStats {
    pub snapped: u64,
    pub interpolated: u64,
    pub stale: u64,
}

pub struct ClientGameState {
    config: GameConfig,
    reconcile: ReconcileConfig,
    pub player_id: Option<PlayerId>,
    pub room: Option<RoomInfo>,
    pub players: BTreeMap<PlayerId, TrackedPlayer>,
    pub bullets: BTreeMap<BulletId, Bullet>,
    pub frame_id: u64,
    pub game_time: f64,
    pub outcome: Option<Outcome>,
    pub room_list: Vec<RoomInfo>,
    pub created_room: Option<RoomId>,
    pub last_error: Option<(ErrorCode, String)>,
    pub stats: CorrectionStats,
    local_intent: MovementIntent,
    pending_pings: HashMap<u32, f64>,
    rtt: Option<f64>,
}

impl ClientGameState {
    pub fn new(config: GameConfig) -> Self {
        let reconcile = ReconcileConfig::from_game(&config);
        Self::with_reconcile(config, reconcile)
    }

    pub fn with_reconcile(config: GameConfig, reconcile: ReconcileConfig) -> Self {
        Self {
            config,
            reconcile,
            player_id: None,
            room: None,
            players: BTreeMap::new(),
            bullets: BTreeMap::new(),
            frame_id: 0,
            game_time: 0.0,
            outcome: None,
            room_list: Vec::new(),
            created_room: None,
            last_error: None,
            stats: CorrectionStats::default(),
            local_intent: MovementIntent::IDLE,
            pending_pings: HashMap::new(),
            rtt: None,
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn room_id(&self) -> Option<&RoomId> {
        self.room.as_ref().map(|room| &room.room_id)
    }

    pub fn room_state(&self) -> Option<RoomState> {
        self.room.as_ref().map(|room| room.room_state)
    }

    pub fn is_host(&self) -> bool {
        match (&self.room, &self.player_id) {
            (Some(room), Some(me)) => room.host_player_id == *me,
            _ => false,
        }
    }

    pub fn own_player(&self) -> Option<&TrackedPlayer> {
        self.player_id.as_ref().and_then(|id| self.players.get(id))
    }

    /// Where the own tank is drawn, which is also the position reported to
    /// the server with movement messages.
    pub fn own_position(&self) -> Option<Vec2> {
        self.own_player().map(|tracked| tracked.view.display_position())
    }

    /// Smoothed round-trip time in seconds, once a pong has come back.
    pub fn rtt(&self) -> Option<f64> {
        self.rtt
    }

    pub fn record_ping(&mut self, sequence: u32, now: f64) {
        self.pending_pings.insert(sequence, now);
        // Pongs that never arrive should not pile up.
        self.pending_pings.retain(|_, sent| now - *sent < 10.0);
    }

    /// Applies local input to the own tank so prediction starts right away.
    pub fn set_local_intent(&mut self, intent: MovementIntent) {
        self.local_intent = intent;
        if let Some(id) = self.player_id.clone() {
            if let Some(tracked) = self.players.get_mut(&id) {
                if tracked.player.is_alive {
                    tracked.view.set_intent(intent);
                    tracked.player.moving_directions = intent;
                }
            }
        }
    }

    fn is_me(&self, player_id: &str) -> bool {
        self.player_id.as_deref() == Some(player_id)
    }

    fn new_view(&self, player_id: &str, position: Vec2, now: f64) -> EntityView {
        if self.is_me(player_id) && self.config.movement_authority == MovementAuthority::Client {
            EntityView::locally_driven(position, now)
        } else {
            EntityView::new(position, now)
        }
    }

    fn apply_sample(&mut self, player_id: &str, sample: ServerSample, now: f64) {
        let own = self.is_me(player_id);
        let local_intent = self.local_intent;
        let Some(tracked) = self.players.get_mut(player_id) else {
            return;
        };

        let correction = tracked.view.apply_server_sample(sample, &self.reconcile, now);
        match correction {
            Correction::Snapped { .. } => self.stats.snapped += 1,
            Correction::Interpolating { .. } => self.stats.interpolated += 1,
            Correction::Stale => self.stats.stale += 1,
            Correction::InSync | Correction::LocalAuthority => {}
        }
        if correction != Correction::Stale {
            tracked.player.position = sample.position;
            if !own {
                tracked.player.moving_directions = sample.intent;
            }
        }
        // The server's copy of our intent lags our own input by a round trip.
        if own && tracked.player.is_alive {
            tracked.view.set_intent(local_intent);
        }
    }

    fn upsert_player(&mut self, player: Player, now: f64) {
        if let Some(tracked) = self.players.get_mut(&player.player_id) {
            let position = tracked.player.position;
            let moving = tracked.player.moving_directions;
            tracked.player = Player {
                position,
                moving_directions: moving,
                ..player
            };
            return;
        }
        let view = self.new_view(&player.player_id, player.position, now);
        self.players
            .insert(player.player_id.clone(), TrackedPlayer { player, view });
    }

    /// Forgets everything tied to the current room. Frame ids count per room,
    /// so the staleness check starts over too.
    fn clear_room(&mut self) {
        self.room = None;
        self.players.clear();
        self.bullets.clear();
        self.outcome = None;
        self.frame_id = 0;
    }

    fn set_room_state(&mut self, room_id: &str, state: RoomState) {
        if let Some(room) = self.room.as_mut() {
            if room.room_id == room_id {
                room.room_state = state;
            }
        }
    }

    pub fn apply(&mut self, message: &Message, now: f64) {
        let timestamp = message.timestamp;
        match &message.payload {
            Payload::ConnectionAck {
                assigned_player_id,
                game_version,
                ..
            } => {
                info!(
                    "Connected as {} (server version {})",
                    assigned_player_id, game_version
                );
                self.player_id = Some(assigned_player_id.clone());
            }

            Payload::Pong { sequence, .. } => {
                if let Some(sent) = self.pending_pings.remove(sequence) {
                    let sample = (now - sent).max(0.0);
                    self.rtt = Some(match self.rtt {
                        Some(rtt) => rtt * 0.8 + sample * 0.2,
                        None => sample,
                    });
                }
            }

            Payload::Error {
                error_code,
                error_message,
            } => {
                warn!("Server error {:?}: {}", error_code, error_message);
                self.last_error = Some((*error_code, error_message.clone()));
            }

            Payload::PlayerJoin {
                player_id,
                player_name,
                spawn_position,
                ..
            } => {
                let mut player = Player::new(player_id.clone(), player_name.clone(), self.config.max_health);
                player.position = spawn_position.unwrap_or(Vec2::ZERO);
                info!("{} joined the room", player_name);
                self.upsert_player(player, now);
            }

            Payload::PlayerLeave { player_id, reason } => {
                debug!("{} left ({:?})", player_id, reason);
                self.players.remove(player_id);
            }

            Payload::PlayerMove {
                player_id,
                direction,
                position,
            } => {
                let sample = ServerSample {
                    position: *position,
                    intent: *direction,
                    timestamp,
                };
                self.apply_sample(player_id, sample, now);
            }

            Payload::PlayerStop {
                player_id,
                position,
            } => {
                let sample = ServerSample {
                    position: *position,
                    intent: MovementIntent::IDLE,
                    timestamp,
                };
                self.apply_sample(player_id, sample, now);
            }

            Payload::GameStateUpdate {
                players,
                bullets,
                game_time,
                frame_id,
            } => {
                if *frame_id < self.frame_id {
                    debug!("Ignoring snapshot {} older than {}", frame_id, self.frame_id);
                    return;
                }
                self.frame_id = *frame_id;
                self.game_time = *game_time;

                self.players
                    .retain(|id, _| players.iter().any(|p| p.player_id == *id));
                for player in players {
                    let sample = ServerSample {
                        position: player.position,
                        intent: player.moving_directions,
                        timestamp,
                    };
                    let id = player.player_id.clone();
                    self.upsert_player(player.clone(), now);
                    self.apply_sample(&id, sample, now);
                }

                self.bullets = bullets
                    .iter()
                    .map(|bullet| (bullet.bullet_id.clone(), bullet.clone()))
                    .collect();
            }

            Payload::BulletFired {
                bullet_id,
                owner_id,
                start_position,
                velocity,
                damage,
            } => {
                let bullet = Bullet {
                    bullet_id: bullet_id.clone(),
                    owner_id: owner_id.clone(),
                    position: *start_position,
                    velocity: *velocity,
                    damage: *damage,
                    created_time: self.game_time,
                    max_lifetime: self.config.bullet_lifetime,
                };
                self.bullets.insert(bullet_id.clone(), bullet);
            }

            Payload::BulletDestroyed { bullet_id, .. } => {
                self.bullets.remove(bullet_id);
            }

            Payload::Collision {
                target_player_id,
                new_health,
                ..
            } => {
                if let Some(tracked) = self.players.get_mut(target_player_id) {
                    tracked.player.health = *new_health;
                }
            }

            Payload::PlayerDeath {
                player_id,
                killer_id,
                death_position,
            } => {
                info!("{} was destroyed by {}", player_id, killer_id);
                if let Some(tracked) = self.players.get_mut(player_id) {
                    tracked.player.health = 0;
                    tracked.player.is_alive = false;
                    tracked.player.moving_directions = MovementIntent::IDLE;
                    tracked.view.set_intent(MovementIntent::IDLE);
                    tracked.view.teleport(*death_position);
                }
            }

            Payload::GameVictory {
                game_duration,
                total_players,
                ..
            } => {
                info!("Victory after {:.1}s against {} players", game_duration, total_players);
                self.outcome = Some(Outcome::Victory {
                    game_duration: *game_duration,
                    total_players: *total_players,
                });
            }

            Payload::GameDefeat {
                killer_name,
                survival_time,
                ..
            } => {
                info!("Defeated by {} after {:.1}s", killer_name, survival_time);
                self.outcome = Some(Outcome::Defeat {
                    killer_name: killer_name.clone(),
                    survival_time: *survival_time,
                });
            }

            Payload::RoomCreated { room_id, room_name, .. } => {
                info!("Room '{}' created ({})", room_name, room_id);
                self.created_room = Some(room_id.clone());
            }

            Payload::RoomList { rooms, total_players } => {
                debug!("{} rooms listed, {} players in total", rooms.len(), total_players);
                self.room_list = rooms.clone();
            }

            Payload::RoomUpdate { room } => {
                if self.room_id() != Some(&room.room_id) {
                    debug!("Now in room {}", room.room_id);
                    self.clear_room();
                }
                self.room = Some(room.clone());
            }

            Payload::RoomDisbanded {
                room_id,
                disbanded_by,
                ..
            } => {
                if self.room_id() == Some(room_id) {
                    info!("Room {} disbanded by {}", room_id, disbanded_by);
                    self.clear_room();
                }
            }

            Payload::RoomStartGame { room_id, .. } => {
                info!("Game started in room {}", room_id);
                self.outcome = None;
                self.set_room_state(room_id, RoomState::Playing);
            }

            Payload::RoomEndGame { room_id, reason } => {
                info!("Game in room {} ended ({:?})", room_id, reason);
                self.set_room_state(room_id, RoomState::Finished);
            }

            Payload::RoomReset { room_id, .. } => {
                self.outcome = None;
                self.bullets.clear();
                self.set_room_state(room_id, RoomState::Waiting);
            }

            Payload::SlotChanged {
                player_id,
                new_slot,
                ..
            } => {
                if let Some(tracked) = self.players.get_mut(player_id) {
                    tracked.player.slot_index = *new_slot;
                }
            }

            Payload::Ping { .. }
            | Payload::PlayerShoot { .. }
            | Payload::CreateRoomRequest { .. }
            | Payload::RoomListRequest { .. }
            | Payload::SlotChangeRequest { .. } => {
                debug!("Ignoring client-bound {} from server", message.kind());
            }
        }
    }

    /// Per-frame update: smooth every tank and advance bullets locally until
    /// the server reports them gone.
    pub fn update(&mut self, dt: f64, now: f64) {
        for tracked in self.players.values_mut() {
            tracked.view.update(dt, &self.reconcile, now);
        }

        if self.room_state() == Some(RoomState::Playing) {
            let (width, height) = (self.config.arena_width, self.config.arena_height);
            for bullet in self.bullets.values_mut() {
                bullet.advance(dt);
            }
            self.bullets
                .retain(|_, bullet| !bullet.is_out_of_bounds(width, height));
        }
    }
}
