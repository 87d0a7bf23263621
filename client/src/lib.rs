//! # Tank Arena Client Library
//!
//! Headless client for the tank arena server. It keeps a local copy of the
//! room built from server messages, smooths every tank's position between
//! authoritative samples, and drives its own tank from a pluggable input
//! source. Drawing the arena is left to whoever embeds the library.
//!
//! ## Prediction and Reconciliation
//!
//! Server samples arrive at irregular intervals and sometimes out of order.
//! Each tank is an [`reconcile::EntityView`]: large divergences snap, small
//! ones are ignored, and everything in between is blended at a bounded rate,
//! leaning slightly ahead along the tank's movement intent. The own tank
//! starts moving on local input immediately, using the same integration
//! formula the server uses.
//!
//! ## Module Organization
//!
//! - [`reconcile`]: per-entity correction ladder and anti-oscillation
//! - [`game`]: client world state and the handling of each server message
//! - [`input`]: the [`input::InputSource`] seam, a wandering bot, and the
//!   rate-limited movement sender
//! - [`network`]: WebSocket connection, room flow and the frame loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::input::WanderingBot;
//! use client::network::{Client, ClientOptions, RoomPlan};
//! use shared::GameConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = ClientOptions {
//!         server_url: "ws://127.0.0.1:8765".into(),
//!         player_name: "bot".into(),
//!         plan: RoomPlan::JoinAny,
//!         start_with: 0,
//!         exit_on_outcome: true,
//!         fake_ping_ms: 0,
//!     };
//!     let bot = WanderingBot::new(1, 1.0, 800.0, 600.0);
//!     let mut client = Client::new(options, GameConfig::default(), Box::new(bot));
//!     let outcome = client.run().await?;
//!     println!("{:?}", outcome);
//!     Ok(())
//! }
//! ```

pub mod game;
pub mod input;
pub mod network;
pub mod reconcile;
