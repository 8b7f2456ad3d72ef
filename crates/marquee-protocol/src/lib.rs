//! Wire protocol for Marquee.
//!
//! This crate defines the events clients and the server exchange:
//!
//! - **Types** ([`ClientEvent`], [`ServerEvent`], [`Envelope`], ids):
//!   the structures that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those structures
//!   are converted to/from bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong while doing so.
//!
//! The protocol layer knows nothing about rooms or rounds. It only
//! describes the shapes; `marquee-room` decides when to send them.

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    ClientEvent, Envelope, Member, PlayerId, RoomId, RoundResult, Scoreboard, ServerEvent,
    PROTOCOL_VERSION,
};
