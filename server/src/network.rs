//! WebSocket transport and the server's main loop.
//!
//! Each accepted connection runs two tasks: a reader that forwards text frames
//! to the main loop, and a writer that drains the connection's outbound queue
//! onto the socket. The main loop is the only place game state is touched. It
//! selects between inbound connection events and the next tick deadline.

use crate::context::ServerContext;
use crate::scheduler::TickClock;
use crate::session::OUTBOUND_QUEUE_DEPTH;
use crate::status::{status_channel, StatusSnapshot};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{GameConfig, PlayerId};
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, Duration, Instant};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use uuid::Uuid;

/// Events sent from connection tasks to the main loop.
#[derive(Debug)]
pub enum Inbound {
    Connected {
        player_id: PlayerId,
        outbound: mpsc::Sender<String>,
    },
    Frame {
        player_id: PlayerId,
        text: String,
    },
    Closed {
        player_id: PlayerId,
    },
}

pub struct Server {
    listener: TcpListener,
    context: ServerContext,
    inbound_tx: mpsc::UnboundedSender<Inbound>,
    inbound_rx: mpsc::UnboundedReceiver<Inbound>,
    status_tx: watch::Sender<StatusSnapshot>,
    status_rx: watch::Receiver<StatusSnapshot>,
}

impl Server {
    pub async fn bind(
        addr: &str,
        config: GameConfig,
        max_connections: usize,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(addr).await?;
        info!("Server listening on ws://{}", listener.local_addr()?);

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = status_channel();

        Ok(Server {
            listener,
            context: ServerContext::new(config, max_connections),
            inbound_tx,
            inbound_rx,
            status_tx,
            status_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Read-only view of the joinable-room counts, refreshed every tick.
    pub fn status(&self) -> watch::Receiver<StatusSnapshot> {
        self.status_rx.clone()
    }

    /// Runs until the inbound channel closes, which only happens if the
    /// accept loop dies.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        let Server {
            listener,
            mut context,
            inbound_tx,
            mut inbound_rx,
            status_tx,
            ..
        } = self;

        tokio::spawn(accept_loop(listener, inbound_tx));

        let tick_rate = u64::from(context.config().tick_rate.max(1));
        let mut clock = TickClock::new(context.config().tick_period(), Instant::now());
        info!(
            "Server started: {} Hz, arena {}x{}, {:?} movement authority",
            tick_rate,
            context.config().arena_width,
            context.config().arena_height,
            context.config().movement_authority
        );

        loop {
            tokio::select! {
                inbound = inbound_rx.recv() => {
                    match inbound {
                        Some(Inbound::Connected { player_id, outbound }) => {
                            context.connect(&player_id, outbound);
                        }
                        Some(Inbound::Frame { player_id, text }) => {
                            context.handle_frame(&player_id, &text);
                        }
                        Some(Inbound::Closed { player_id }) => {
                            context.disconnect(&player_id);
                        }
                        None => {
                            info!("Inbound channel closed, server shutting down");
                            break;
                        }
                    }
                }

                _ = sleep_until(clock.deadline()) => {
                    clock.begin_tick(Instant::now());
                    context.tick();
                    status_tx.send_replace(context.status());

                    if clock.ticks() % (tick_rate * 60) == 0 {
                        debug!(
                            "Tick {}: {} sessions, {} rooms, {} overruns",
                            clock.ticks(),
                            context.sessions().len(),
                            context.rooms().len(),
                            clock.overruns()
                        );
                    }
                }
            }
        }

        Ok(())
    }
}

async fn accept_loop(listener: TcpListener, inbound: mpsc::UnboundedSender<Inbound>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let inbound = inbound.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, addr, inbound).await {
                        debug!("Connection from {} ended with error: {}", addr, e);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {}", e);
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    inbound: mpsc::UnboundedSender<Inbound>,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    let ws = tokio_tungstenite::accept_async(stream).await?;
    let player_id = Uuid::new_v4().to_string();
    info!("WebSocket connection from {} assigned id {}", addr, player_id);

    let (mut sink, mut source) = ws.split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(OUTBOUND_QUEUE_DEPTH);

    let connected = Inbound::Connected {
        player_id: player_id.clone(),
        outbound: outbound_tx,
    };
    if inbound.send(connected).is_err() {
        return Ok(());
    }

    // Ends once the session is dropped by the main loop or the peer goes away.
    tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            if sink.send(WsMessage::Text(frame)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    while let Some(message) = source.next().await {
        let text = match message {
            Ok(WsMessage::Text(text)) => text,
            Ok(WsMessage::Binary(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                warn!("Read error on connection {}: {}", player_id, e);
                break;
            }
        };
        let frame = Inbound::Frame {
            player_id: player_id.clone(),
            text,
        };
        if inbound.send(frame).is_err() {
            break;
        }
    }

    info!("Connection {} from {} closed", player_id, addr);
    let _ = inbound.send(Inbound::Closed { player_id });
    Ok(())
}
