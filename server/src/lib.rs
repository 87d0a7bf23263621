//! # Tank Arena Server
//!
//! Authoritative server for the multiplayer tank arena. It owns every room,
//! runs the fixed-tick simulation, and pushes events and periodic full-state
//! snapshots to connected players over WebSocket.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! Bullets, collisions, damage and (by default) tank movement are computed
//! here. Clients predict locally with the same integration formula from the
//! `shared` crate and reconcile against what the server reports.
//!
//! ### Room Lifecycle
//! Rooms move through `waiting`, `playing` and `finished`. A finished room can
//! be reset to `waiting` by its host. Each room has exactly one host while it
//! has players; when the host leaves, the role passes to the remaining player
//! with the lowest id.
//!
//! ### Event Delivery
//! Anything a handler or a tick changes is queued on the room as an event and
//! then fanned out to the room's members. Victory and defeat go only to the
//! player concerned. A full snapshot is broadcast on a slower fallback
//! schedule to repair any lost incremental update.
//!
//! ## Architecture
//!
//! ### Single Mutation Loop
//! One task owns all game state inside a [`context::ServerContext`]. Connection
//! tasks only forward frames to it over a channel, and the same task runs the
//! tick, so there are no locks around rooms or sessions.
//!
//! ### Non-blocking Sends
//! Every connection has a bounded outbound queue drained by its own writer
//! task. The mutation loop only ever `try_send`s, so a slow client loses
//! frames instead of stalling everyone else.
//!
//! ## Module Organization
//!
//! - [`error`]: handler failures and their wire error codes
//! - [`room`]: one room's membership, slots, host and lifecycle
//! - [`physics`]: per-tick movement, bullets and collision resolution
//! - [`registry`]: the set of rooms and the player-to-room index
//! - [`session`]: connected players and their outbound queues
//! - [`broadcast`]: fan-out of room events to members
//! - [`scheduler`]: tick pacing and fallback sync policy
//! - [`status`]: read-only joinable-room counts for discovery tooling
//! - [`context`]: message dispatch and cleanup, the glue between the above
//! - [`network`]: WebSocket accept loop and the main select loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::Server;
//! use shared::GameConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind("127.0.0.1:8765", GameConfig::default(), 64).await?;
//!     server.run().await
//! }
//! ```

pub mod broadcast;
pub mod context;
pub mod error;
pub mod network;
pub mod physics;
pub mod registry;
pub mod room;
pub mod scheduler;
pub mod session;
pub mod status;
