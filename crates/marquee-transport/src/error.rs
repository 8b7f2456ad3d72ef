use std::net::SocketAddr;

use crate::ConnectionId;

/// Socket-level failures between the game server and a player.
///
/// None of these reach a client. The server logs them and drops the
/// connection (or, for `Bind`, refuses to start).
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("could not listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("accept failed: {0}")]
    Accept(#[source] std::io::Error),

    /// The peer connected but never became a WebSocket player.
    #[error("handshake with {peer} failed: {reason}")]
    Handshake { peer: SocketAddr, reason: String },

    #[error("send to {conn} failed: {reason}")]
    Send { conn: ConnectionId, reason: String },

    #[error("receive from {conn} failed: {reason}")]
    Receive { conn: ConnectionId, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_error_names_the_connection() {
        let err = TransportError::Send {
            conn: ConnectionId::new(3),
            reason: "broken pipe".into(),
        };
        assert_eq!(err.to_string(), "send to conn-3 failed: broken pipe");
    }

    #[test]
    fn test_bind_error_keeps_io_source() {
        let err = TransportError::Bind {
            addr: "0.0.0.0:5000".into(),
            source: std::io::Error::from(std::io::ErrorKind::AddrInUse),
        };
        assert!(err.to_string().starts_with("could not listen on 0.0.0.0:5000"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
