//! Unified error type for the Marquee server.

use marquee_protocol::ProtocolError;
use marquee_room::RoomError;
use marquee_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum MarqueeError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A room-level error (not found, duplicate join, actor gone).
    #[error(transparent)]
    Room(#[from] RoomError),
}

#[cfg(test)]
mod tests {
    use marquee_protocol::{PlayerId, RoomId};

    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::Send {
            conn: marquee_transport::ConnectionId::new(1),
            reason: "gone".into(),
        };
        let marquee_err: MarqueeError = err.into();
        assert!(matches!(marquee_err, MarqueeError::Transport(_)));
        assert!(marquee_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidMessage("bad".into());
        let marquee_err: MarqueeError = err.into();
        assert!(matches!(marquee_err, MarqueeError::Protocol(_)));
    }

    #[test]
    fn test_from_room_error() {
        let err = RoomError::AlreadyInRoom(PlayerId(7), RoomId::from("R1"));
        let marquee_err: MarqueeError = err.into();
        assert!(matches!(marquee_err, MarqueeError::Room(_)));
        assert_eq!(marquee_err.to_string(), "player P-7 already in room R1");
    }
}
