//! # Coin Collector Client Library
//!
//! Client side of the coin collector game. The client never simulates the
//! game: it sends movement intent and mode requests, keeps the latest
//! authoritative snapshot, and smooths player positions between snapshots so
//! movement looks continuous despite the simulated network delay.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! Client view of the session built from server packets:
//! - Connection status (`Connecting`, `Connected`, `Disconnected`)
//! - Latest roster, coins, mode and game-over results
//! - One interpolated view per player seen in the last snapshot
//!
//! ### Interpolation Module (`interpolation`)
//! Exponential smoothing toward the last authoritative position, either by a
//! fixed fraction per frame or by a factor derived from elapsed time.
//!
//! ### Input Module (`input`)
//! Keyboard sampling. Intents are sent only when they change and mode keys
//! fire once per press.
//!
//! ### Network Module (`network`)
//! WebSocket connection on a background thread, exchanging JSON packets with
//! the render loop through channels.
//!
//! ### Rendering Module (`rendering`)
//! Arena, coins, players, lobby and game-over screens, and a HUD with FPS,
//! simulated latency and connection state.
//!
//! ## Usage Example
//!
//! ```rust
//! use client::game::ClientGameState;
//! use client::interpolation::Smoothing;
//! use shared::{Coin, GameMode, Player};
//!
//! let mut state = ClientGameState::new(Smoothing::frame_locked());
//! state.apply_snapshot(
//!     vec![Player::new("conn-1", "Alice", 100.0, 100.0, [255, 100, 100])],
//!     vec![Coin::new(0, 300.0, 200.0)],
//!     false,
//!     GameMode::Endless,
//! );
//!
//! // Each frame: step display positions toward the latest snapshot
//! state.interpolate(1.0 / 60.0);
//! assert_eq!(state.display_position("conn-1"), Some((100.0, 100.0)));
//! ```

pub mod game;
pub mod input;
pub mod interpolation;
pub mod network;
pub mod rendering;
