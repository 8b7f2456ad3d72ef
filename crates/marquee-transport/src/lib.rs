//! Sockets for the Marquee game server.
//!
//! The server accepts players through a [`Transport`] and talks to each
//! one through a [`Connection`]. A connection carries whole frames: one
//! JSON envelope out per `send`, one client event in per `recv`. Nothing
//! above this crate sees a socket, only the [`ConnectionId`] that doubles
//! as the player's id.
//!
//! # Feature Flags
//!
//! - `websocket` (default): [`WebSocketTransport`] on `tokio-tungstenite`,
//!   which also answers plain HTTP `GET`s with a status page.

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketTransport};

use std::fmt;

/// Numbers sockets in accept order, starting at 1. There are no
/// accounts, so this is also who the player is until they disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Where players come from.
pub trait Transport: Send + Sync + 'static {
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync;

    /// Resolves with the next player to finish connecting.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;

    /// Stops taking new players. Open connections are unaffected.
    async fn shutdown(&self) -> Result<(), Self::Error>;
}

/// One player's frame pipe.
///
/// `send` and `recv` must be usable at the same time from one task:
/// the handler sits in `recv` while room events are pushed out.
pub trait Connection: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// `Ok(None)` once the player has closed the socket.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    async fn close(&self) -> Result<(), Self::Error>;

    fn id(&self) -> ConnectionId;
}
