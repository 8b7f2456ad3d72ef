//! Rooms for the Marquee title-guessing game.
//!
//! Each room runs as an isolated Tokio task (actor model) that owns the
//! room's membership, chooser rotation, current round, scores, and its
//! guess timer.
//!
//! # Key types
//!
//! - [`RoomController`]: the round state machine, synchronous and
//!   testable without a runtime
//! - [`RoomRegistry`]: creates rooms on first join, routes connections,
//!   reclaims empty rooms
//! - [`RoomHandle`]: sends commands to a running room actor
//! - [`RoomState`]: the per-room session record
//! - [`GameConfig`]: timings, penalty word, clue, and rewards
//! - [`Broadcaster`]: where a controller sends its events

mod broadcast;
mod config;
mod controller;
mod error;
mod manager;
pub mod mask;
mod room;
pub mod state;

pub use broadcast::{Broadcaster, Outbox, Recipient};
pub use config::GameConfig;
pub use controller::RoomController;
pub use error::RoomError;
pub use manager::{DEFAULT_CHANNEL_SIZE, RoomRegistry};
pub use room::{PlayerSender, RoomHandle, RoomInfo, RoomOutbound};
pub use state::{Phase, Player, RoomState, Round};
