//! Core protocol types for Marquee's wire format.
//!
//! Everything here is serialized as JSON, internally tagged by `type`,
//! so a browser client can `switch (msg.type)` without unwrapping.

use std::collections::BTreeMap;
use std::fmt;

use marquee_transport::ConnectionId;
use serde::{Deserialize, Serialize};

/// The current protocol version, announced in [`ServerEvent::Welcome`].
pub const PROTOCOL_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Identifies a player. One per connection; there are no accounts.
///
/// `#[serde(transparent)]` keeps it a plain number on the wire so clients
/// can compare it against `chooser_id` directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

impl From<ConnectionId> for PlayerId {
    fn from(id: ConnectionId) -> Self {
        Self(id.into_inner())
    }
}

/// A caller-chosen room name. Any string is a valid room; rooms are
/// created on first join.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RoomId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for RoomId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Shared payload pieces
// ---------------------------------------------------------------------------

/// One entry of a room's membership list, in join order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub player_id: PlayerId,
    pub display_name: String,
}

/// Points per player. A `BTreeMap` so the JSON object has a stable key
/// order (`{"1": 10, "2": 0}`).
pub type Scoreboard = BTreeMap<PlayerId, u32>;

/// How a round ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundResult {
    Win,
    Lose,
}

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// Events a client sends. The sender is implied by the connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Enter a room, creating it if nobody is there yet.
    JoinRoom { room_id: RoomId, display_name: String },

    /// The chooser submits the secret title for the next round.
    SelectTitle { room_id: RoomId, title: String },

    /// A single letter or a whole-title guess.
    SubmitGuess { room_id: RoomId, guess: String },

    /// Leave one room but keep the connection open.
    LeaveRoom { room_id: RoomId },

    /// Keep-alive. `client_time` is echoed back untouched.
    Heartbeat { client_time: u64 },
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// Events the server sends, either to a whole room or to one connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// First frame on every connection: who you are.
    Welcome { player_id: PlayerId, protocol_version: u32 },

    HeartbeatAck { client_time: u64, server_time: u64 },

    /// Full membership list after any join or leave.
    MembershipChanged { members: Vec<Member> },

    MemberJoined { display_name: String },

    MemberLeft { display_name: String },

    /// A new secret was chosen. Also sent to late joiners as a snapshot,
    /// in which case `strikes` and `clue` may already be populated.
    RoundStarted {
        chooser_id: PlayerId,
        masked_title: String,
        strikes: Vec<char>,
        clue: Option<String>,
    },

    LettersRevealed { masked_title: String, scores: Scoreboard },

    StrikesUpdated { strikes: Vec<char> },

    ClueRevealed { clue: String },

    RoundResolved {
        result: RoundResult,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        winner_id: Option<PlayerId>,
        correct_title: String,
        scores: Scoreboard,
    },

    /// Whose turn it is to choose. Clients compare against their own id.
    ChooserAdvanced { chooser_id: PlayerId },

    SessionEnded { message: String },
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// The outer frame around every server event.
///
/// - `seq` increases by one per frame on a connection.
/// - `timestamp` is milliseconds since the connection was accepted.
/// - `room_id` says which room produced the event; absent for
///   connection-level events like `Welcome`. A connection may sit in
///   several rooms at once, so clients need it to route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub seq: u64,
    pub timestamp: u64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub room_id: Option<RoomId>,
    pub event: ServerEvent,
}

// =========================================================================
// Tests
// =========================================================================
