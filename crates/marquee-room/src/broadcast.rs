//! The outbound side of a room: where controller events go.
//!
//! The controller never holds sockets or channels. It is handed a
//! [`Broadcaster`] and calls it; the room actor plugs in real
//! per-connection channels, tests plug in an [`Outbox`].

use marquee_protocol::{PlayerId, RoomId, ServerEvent};

/// Delivery capability injected into the controller.
///
/// Fire-and-forget: there is no acknowledgement and no backpressure.
pub trait Broadcaster {
    /// Sends `event` to every current member of `room_id`.
    fn send_to_room(&mut self, room_id: &RoomId, event: ServerEvent);

    /// Sends `event` to one connection only.
    fn send_to_connection(&mut self, player_id: PlayerId, event: ServerEvent);
}

/// Who an [`Outbox`] entry was addressed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    Room(RoomId),
    Player(PlayerId),
}

/// A [`Broadcaster`] that just records what was sent, in order.
#[derive(Debug, Default)]
pub struct Outbox {
    sent: Vec<(Recipient, ServerEvent)>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything sent so far.
    pub fn sent(&self) -> &[(Recipient, ServerEvent)] {
        &self.sent
    }

    /// Events multicast to the room, in order.
    pub fn room_events(&self) -> Vec<&ServerEvent> {
        self.sent
            .iter()
            .filter(|(to, _)| matches!(to, Recipient::Room(_)))
            .map(|(_, event)| event)
            .collect()
    }

    /// Events sent privately to `player_id`, in order.
    pub fn events_for(&self, player_id: PlayerId) -> Vec<&ServerEvent> {
        self.sent
            .iter()
            .filter(|(to, _)| *to == Recipient::Player(player_id))
            .map(|(_, event)| event)
            .collect()
    }

    /// Takes the recorded events, leaving the outbox empty.
    pub fn drain(&mut self) -> Vec<(Recipient, ServerEvent)> {
        std::mem::take(&mut self.sent)
    }

    pub fn is_empty(&self) -> bool {
        self.sent.is_empty()
    }
}

impl Broadcaster for Outbox {
    fn send_to_room(&mut self, room_id: &RoomId, event: ServerEvent) {
        self.sent.push((Recipient::Room(room_id.clone()), event));
    }

    fn send_to_connection(&mut self, player_id: PlayerId, event: ServerEvent) {
        self.sent.push((Recipient::Player(player_id), event));
    }
}
