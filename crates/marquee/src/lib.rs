//! # Marquee
//!
//! A real-time multiplayer movie-title guessing game server.
//!
//! Players join named rooms over WebSocket. One member at a time (the
//! chooser) picks a secret title; everyone else reveals it letter by
//! letter or guesses it outright, racing a 30-second idle timer and a
//! nine-strike budget that spells `KOLLYWOOD`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use marquee::prelude::*;
//!
//! # async fn start() -> Result<(), MarqueeError> {
//! let server = MarqueeServer::builder()
//!     .bind("0.0.0.0:5000")
//!     .game_config(GameConfig::default())
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod server;

pub use error::MarqueeError;
pub use server::{DEFAULT_IDLE_TIMEOUT, MarqueeServer, MarqueeServerBuilder};

/// Everything needed to run a server or write a client against it.
pub mod prelude {
    pub use crate::{MarqueeError, MarqueeServer, MarqueeServerBuilder};
    pub use marquee_protocol::{
        ClientEvent, Codec, Envelope, JsonCodec, Member, PROTOCOL_VERSION, PlayerId, RoomId,
        RoundResult, Scoreboard, ServerEvent,
    };
    pub use marquee_room::GameConfig;
}
