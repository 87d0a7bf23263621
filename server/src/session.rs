//! Connection/session bookkeeping for the server.
//!
//! Each WebSocket connection gets a session keyed by the player id the server
//! assigned it. A session owns the sending half of that connection's outbound
//! queue; the connection's writer task drains the other half onto the socket.
//!
//! Sends never block the mutation loop. A full queue means the peer is not
//! keeping up, and the frame is dropped for that peer only.

use log::{debug, info, warn};
use shared::{encode, Message, PlayerId};
use std::collections::HashMap;
use std::time::Instant;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Frames that may queue up for one connection before new ones are dropped.
pub const OUTBOUND_QUEUE_DEPTH: usize = 256;

#[derive(Debug)]
pub struct Session {
    pub player_id: PlayerId,
    /// Name given with the most recent join, if any.
    pub display_name: Option<String>,
    pub connected_at: Instant,
    /// Last ping sequence seen from this connection.
    pub last_ping_sequence: Option<u32>,
    outbound: mpsc::Sender<String>,
}

impl Session {
    pub fn new(player_id: PlayerId, outbound: mpsc::Sender<String>) -> Self {
        Self {
            player_id,
            display_name: None,
            connected_at: Instant::now(),
            last_ping_sequence: None,
            outbound,
        }
    }

    /// Queues an already-encoded frame. Returns false if it was dropped.
    pub fn send_frame(&self, frame: &str) -> bool {
        match self.outbound.try_send(frame.to_owned()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("Outbound queue full for {}, dropping frame", self.player_id);
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Connection {} already closed, dropping frame", self.player_id);
                false
            }
        }
    }
}

#[derive(Debug)]
pub struct SessionManager {
    sessions: HashMap<PlayerId, Session>,
    max_sessions: usize,
}

impl SessionManager {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: HashMap::new(),
            max_sessions,
        }
    }

    /// Registers a new connection. Returns `None` when the server is full.
    pub fn register(&mut self, player_id: PlayerId, outbound: mpsc::Sender<String>) -> Option<&Session> {
        if self.sessions.len() >= self.max_sessions && !self.sessions.contains_key(&player_id) {
            warn!("Rejecting connection {}: server full", player_id);
            return None;
        }
        info!("Session {} connected", player_id);
        let session = Session::new(player_id.clone(), outbound);
        self.sessions.insert(player_id.clone(), session);
        self.sessions.get(&player_id)
    }

    pub fn remove(&mut self, player_id: &str) -> Option<Session> {
        let session = self.sessions.remove(player_id)?;
        info!(
            "Session {} closed after {:.1}s",
            player_id,
            session.connected_at.elapsed().as_secs_f64()
        );
        Some(session)
    }

    pub fn get(&self, player_id: &str) -> Option<&Session> {
        self.sessions.get(player_id)
    }

    pub fn get_mut(&mut self, player_id: &str) -> Option<&mut Session> {
        self.sessions.get_mut(player_id)
    }

    pub fn contains(&self, player_id: &str) -> bool {
        self.sessions.contains_key(player_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn send_frame(&self, player_id: &str, frame: &str) -> bool {
        match self.sessions.get(player_id) {
            Some(session) => session.send_frame(frame),
            None => false,
        }
    }

    pub fn send(&self, player_id: &str, message: &Message) -> bool {
        self.send_frame(player_id, &encode(message))
    }
}
