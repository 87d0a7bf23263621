use crate::game::{ClientGameState, Outcome};
use crate::input::{InputSource, MovementSender};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{decode, encode, now_secs, GameConfig, Message, Payload, RoomId, RoomState};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use uuid::Uuid;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, WsMessage>;

const PING_INTERVAL: Duration = Duration::from_secs(2);
const FRAME_INTERVAL: Duration = Duration::from_millis(16);
const STATS_INTERVAL: Duration = Duration::from_secs(10);

/// What the client should do once connected.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomPlan {
    /// Create a room and join it as host.
    Create { name: String, max_players: u32 },
    /// Join a specific room.
    Join(RoomId),
    /// Join the first open waiting room.
    JoinAny,
}

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub server_url: String,
    pub player_name: String,
    pub plan: RoomPlan,
    /// As host, start the game once this many players are in the room.
    /// Zero never starts.
    pub start_with: u32,
    /// Disconnect after the first victory or defeat.
    pub exit_on_outcome: bool,
    /// Artificial one-way delay added before every send, milliseconds.
    pub fake_ping_ms: u64,
}

pub struct Client {
    options: ClientOptions,
    game_state: ClientGameState,
    movement: MovementSender,
    input: Box<dyn InputSource + Send>,
    ping_sequence: u32,
    start_requested: bool,
    join_sent: bool,
}

impl Client {
    pub fn new(options: ClientOptions, config: GameConfig, input: Box<dyn InputSource + Send>) -> Self {
        Client {
            options,
            game_state: ClientGameState::new(config),
            movement: MovementSender::new(),
            input,
            ping_sequence: 0,
            start_requested: false,
            join_sent: false,
        }
    }

    pub fn game_state(&self) -> &ClientGameState {
        &self.game_state
    }

    async fn send(&self, sink: &mut WsSink, payload: Payload) -> Result<(), Box<dyn std::error::Error>> {
        if self.options.fake_ping_ms > 0 {
            sleep(Duration::from_millis(self.options.fake_ping_ms / 2)).await;
        }
        let frame = encode(&Message::new(payload));
        sink.send(WsMessage::Text(frame)).await?;
        Ok(())
    }

    /// Requests the connection answers to, once identity or the room changes.
    fn follow_up(&mut self, message: &Message) -> Vec<Payload> {
        let mut replies = Vec::new();
        let Some(me) = self.game_state.player_id.clone() else {
            return replies;
        };

        match &message.payload {
            Payload::ConnectionAck { .. } => match &self.options.plan {
                RoomPlan::Create { name, max_players } => {
                    replies.push(Payload::CreateRoomRequest {
                        room_name: name.clone(),
                        max_players: *max_players,
                        creator_id: me.clone(),
                        game_mode: "classic".to_string(),
                    });
                }
                RoomPlan::Join(room_id) => {
                    replies.push(self.join_request(&me, Some(room_id.clone())));
                }
                RoomPlan::JoinAny => {
                    replies.push(self.join_request(&me, None));
                }
            },
            Payload::RoomCreated { room_id, creator_id, .. } if *creator_id == me => {
                replies.push(self.join_request(&me, Some(room_id.clone())));
            }
            Payload::RoomUpdate { room } => {
                let ready = self.options.start_with > 0
                    && room.current_players >= self.options.start_with
                    && room.room_state == RoomState::Waiting;
                if self.game_state.is_host() && ready && !self.start_requested {
                    info!("{} players present, starting the game", room.current_players);
                    self.start_requested = true;
                    replies.push(Payload::RoomStartGame {
                        room_id: room.room_id.clone(),
                        host_player_id: me.clone(),
                    });
                }
                if room.room_state != RoomState::Waiting {
                    self.start_requested = false;
                }
            }
            _ => {}
        }

        if matches!(replies.last(), Some(Payload::PlayerJoin { .. })) {
            self.join_sent = true;
        }
        replies
    }

    fn join_request(&self, me: &str, room_id: Option<RoomId>) -> Payload {
        Payload::PlayerJoin {
            player_id: me.to_string(),
            player_name: self.options.player_name.clone(),
            room_id,
            spawn_position: None,
        }
    }

    /// One input/prediction frame. Returns the messages to send.
    fn frame(&mut self, dt: f64, now: f64) -> Vec<Payload> {
        let mut outgoing = Vec::new();
        let Some(me) = self.game_state.player_id.clone() else {
            return outgoing;
        };
        let playing = self.game_state.room_state() == Some(RoomState::Playing);
        let alive = self
            .game_state
            .own_player()
            .map_or(false, |tracked| tracked.player.is_alive);

        if let (true, true, Some(position)) = (playing, alive, self.game_state.own_position()) {
            let input = self.input.poll(now, position);
            self.game_state.set_local_intent(input.intent);

            if let Some(direction) = input.fire {
                outgoing.push(Payload::PlayerShoot {
                    player_id: me.clone(),
                    position,
                    direction,
                    bullet_id: Uuid::new_v4().to_string(),
                });
            }
        }

        self.game_state.update(dt, now);

        if playing && alive {
            if let (Some(tracked), Some(position)) =
                (self.game_state.own_player(), self.game_state.own_position())
            {
                let intent = tracked.view.intent();
                if let Some(payload) = self.movement.next_message(&me, intent, position, now) {
                    outgoing.push(payload);
                }
            }
        }
        outgoing
    }

    fn log_stats(&self) {
        let stats = self.game_state.stats;
        info!(
            "Room {:?}: {} players, {} bullets, rtt {}, {} moves sent, corrections {} snapped / {} blended / {} stale",
            self.game_state.room_state(),
            self.game_state.players.len(),
            self.game_state.bullets.len(),
            self.game_state
                .rtt()
                .map_or_else(|| "n/a".to_string(), |rtt| format!("{:.0}ms", rtt * 1000.0)),
            self.movement.sent(),
            stats.snapped,
            stats.interpolated,
            stats.stale
        );
    }

    /// Connects and plays until the server closes the connection or, with
    /// `exit_on_outcome`, until the game is decided.
    pub async fn run(&mut self) -> Result<Option<Outcome>, Box<dyn std::error::Error>> {
        info!("Connecting to {}", self.options.server_url);
        let (ws, _) = connect_async(self.options.server_url.as_str()).await?;
        let (mut sink, mut source) = ws.split();

        let mut ping_interval = interval(PING_INTERVAL);
        let mut frame_interval = interval(FRAME_INTERVAL);
        frame_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut stats_interval = interval(STATS_INTERVAL);
        let mut last_frame = now_secs();

        loop {
            tokio::select! {
                incoming = source.next() => {
                    let text = match incoming {
                        Some(Ok(WsMessage::Text(text))) => text,
                        Some(Ok(WsMessage::Binary(bytes))) => String::from_utf8_lossy(&bytes).into_owned(),
                        Some(Ok(WsMessage::Close(_))) | None => {
                            info!("Server closed the connection");
                            break;
                        }
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => {
                            error!("Error receiving frame: {}", e);
                            break;
                        }
                    };

                    if self.options.fake_ping_ms > 0 {
                        sleep(Duration::from_millis(self.options.fake_ping_ms / 2)).await;
                    }

                    let message = match decode(&text) {
                        Ok(message) => message,
                        Err(e) => {
                            warn!("Dropping undecodable frame: {}", e);
                            continue;
                        }
                    };
                    self.game_state.apply(&message, now_secs());

                    for payload in self.follow_up(&message) {
                        self.send(&mut sink, payload).await?;
                    }

                    if self.options.exit_on_outcome && self.game_state.outcome.is_some() {
                        info!("Game decided, disconnecting");
                        break;
                    }
                }

                _ = frame_interval.tick() => {
                    let now = now_secs();
                    let dt = (now - last_frame).clamp(0.0, 0.1);
                    last_frame = now;
                    for payload in self.frame(dt, now) {
                        self.send(&mut sink, payload).await?;
                    }
                }

                _ = ping_interval.tick() => {
                    let Some(me) = self.game_state.player_id.clone() else {
                        continue;
                    };
                    self.ping_sequence = self.ping_sequence.wrapping_add(1);
                    self.game_state.record_ping(self.ping_sequence, now_secs());
                    debug!("Ping {}", self.ping_sequence);
                    self.send(&mut sink, Payload::Ping { client_id: me, sequence: self.ping_sequence }).await?;
                }

                _ = stats_interval.tick() => {
                    if self.join_sent {
                        self.log_stats();
                    }
                }
            }
        }

        if let Some(me) = self.game_state.player_id.clone() {
            if self.game_state.room.is_some() {
                let _ = self
                    .send(
                        &mut sink,
                        Payload::PlayerLeave {
                            player_id: me,
                            reason: shared::LeaveReason::Normal,
                        },
                    )
                    .await;
            }
        }
        let _ = sink.close().await;

        Ok(self.game_state.outcome.clone())
    }
}
