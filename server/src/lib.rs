//! # Coin Collector Server Library
//!
//! Authoritative server for a two-player coin collection game. It owns the
//! canonical game state, applies client movement intents, resolves coin
//! pickups and broadcasts the full state to every connected client.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! Positions, scores and coins only change on the server. Clients send
//! intents (`dx`, `dy` in {-1, 0, 1}) and mode requests; everything else
//! arrives through `state_update` snapshots.
//!
//! ### Session Lifecycle
//! The session moves through `Empty`, `WaitingForSecondPlayer`, `LobbyReady`
//! and `Playing`. A sprint game ends the tick a player reaches ten coins; the
//! result is broadcast and the session drops back to the lobby.
//!
//! ### Simulated Latency
//! Every connection gets its own delay line in each direction, so the
//! configured one-way delay applies to that client only and never stalls
//! the tick loop.
//!
//! ## Architecture Design
//!
//! ### Single Owner Event Loop
//! [`network::Server::run`] is the only place that mutates [`game::GameState`].
//! Connection tasks decode JSON and forward events over a channel; the loop
//! interleaves those events with fixed-rate ticks, so a tick always sees one
//! consistent set of velocities.
//!
//! ### WebSocket Transport
//! One JSON text message per packet, tagged by `type`. Malformed messages are
//! logged and dropped without closing the connection.
//!
//! ## Module Organization
//!
//! - `client_manager`: connected clients, capacity and broadcast delivery
//! - `entity`: server-side player state and random spawning
//! - `game`: session phases, tick pipeline and snapshots
//! - `identity`: the name and color roster handed to joining players
//! - `latency`: per-connection delay lines
//! - `network`: listener, connection tasks and the main loop
//! - `physics`: movement and coin pickup resolution
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::new(ServerConfig::default()).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod entity;
pub mod game;
pub mod identity;
pub mod latency;
pub mod network;
pub mod physics;
