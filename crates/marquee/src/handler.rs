//! Per-connection handler: welcome, event routing, and outbound delivery.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Send `Welcome` with the connection's player id
//!   2. Loop: decode inbound client events and route them to rooms,
//!      while forwarding room events back out as envelopes
//!   3. On close, error, or idle timeout: leave every joined room

use std::sync::Arc;

use marquee_protocol::{
    ClientEvent, Codec, Envelope, PROTOCOL_VERSION, PlayerId, RoomId, ServerEvent,
};
use marquee_room::RoomOutbound;
use marquee_transport::{Connection, WebSocketConnection};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::MarqueeError;
use crate::server::ServerState;

/// Drop guard that removes a connection from all its rooms when the
/// handler exits.
///
/// This ensures cleanup happens even if the handler panics. Since `Drop`
/// is synchronous, we spawn a fire-and-forget task for the async lock.
struct DisconnectGuard<C: Codec> {
    player_id: PlayerId,
    state: Arc<ServerState<C>>,
}

impl<C: Codec> Drop for DisconnectGuard<C> {
    fn drop(&mut self) {
        let player_id = self.player_id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let left = state.rooms.lock().await.disconnect(player_id).await;
            if !left.is_empty() {
                tracing::debug!(%player_id, rooms = left.len(), "left rooms on disconnect");
            }
        });
    }
}

/// Writes envelopes to one connection, numbering them as it goes.
struct Outgoing<'a, C: Codec> {
    conn: &'a WebSocketConnection,
    codec: &'a C,
    seq: u64,
    start: Instant,
}

impl<C: Codec> Outgoing<'_, C> {
    fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.start.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    async fn send(&mut self, room_id: Option<RoomId>, event: ServerEvent) -> Result<(), MarqueeError> {
        let envelope = Envelope {
            seq: next_seq(&mut self.seq),
            timestamp: self.elapsed_ms(),
            room_id,
            event,
        };
        let bytes = self.codec.encode(&envelope)?;
        self.conn.send(&bytes).await?;
        Ok(())
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), MarqueeError> {
    let conn_id = conn.id();
    let player_id = PlayerId::from(conn_id);
    tracing::info!(%conn_id, %player_id, "player connected");

    let mut out = Outgoing {
        conn: &conn,
        codec: &state.codec,
        seq: 0,
        start: Instant::now(),
    };
    out.send(
        None,
        ServerEvent::Welcome {
            player_id,
            protocol_version: PROTOCOL_VERSION,
        },
    )
    .await?;

    let _guard = DisconnectGuard {
        player_id,
        state: Arc::clone(&state),
    };

    // Every room this connection joins gets a clone of `room_tx`.
    let (room_tx, mut room_rx) = mpsc::unbounded_channel::<RoomOutbound>();
    let idle = tokio::time::sleep(state.idle_timeout);
    tokio::pin!(idle);

    loop {
        tokio::select! {
            received = conn.recv() => {
                let data = match received {
                    Ok(Some(data)) => data,
                    Ok(None) => {
                        tracing::info!(%player_id, "connection closed cleanly");
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(%player_id, error = %e, "recv error");
                        break;
                    }
                };
                idle.as_mut().reset(Instant::now() + state.idle_timeout);

                let event: ClientEvent = match state.codec.decode(&data) {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::debug!(%player_id, error = %e, "failed to decode client event");
                        continue;
                    }
                };
                handle_client_event(&state, player_id, &room_tx, &mut out, event).await?;
            }

            Some(outbound) = room_rx.recv() => {
                out.send(Some(outbound.room_id), outbound.event).await?;
            }

            () = &mut idle => {
                tracing::info!(
                    %player_id,
                    idle_secs = state.idle_timeout.as_secs(),
                    "connection timed out"
                );
                let _ = conn.close().await;
                break;
            }
        }
    }

    // _guard drops here → the connection leaves its rooms.
    Ok(())
}

/// Routes one decoded client event.
///
/// Room errors (duplicate join, unknown room) are logged and otherwise
/// ignored; nothing is reported back to the client.
async fn handle_client_event<C: Codec>(
    state: &ServerState<C>,
    player_id: PlayerId,
    room_tx: &mpsc::UnboundedSender<RoomOutbound>,
    out: &mut Outgoing<'_, C>,
    event: ClientEvent,
) -> Result<(), MarqueeError> {
    let result = match event {
        ClientEvent::Heartbeat { client_time } => {
            let server_time = out.elapsed_ms();
            return out
                .send(
                    None,
                    ServerEvent::HeartbeatAck {
                        client_time,
                        server_time,
                    },
                )
                .await;
        }

        ClientEvent::JoinRoom {
            room_id,
            display_name,
        } => {
            // PERF: the registry lock is held while the room replies.
            // Fine while rooms answer in microseconds.
            let mut rooms = state.rooms.lock().await;
            rooms
                .join(player_id, room_id, display_name, room_tx.clone())
                .await
        }

        ClientEvent::SelectTitle { room_id, title } => {
            let rooms = state.rooms.lock().await;
            rooms.select_title(player_id, &room_id, title).await
        }

        ClientEvent::SubmitGuess { room_id, guess } => {
            let rooms = state.rooms.lock().await;
            rooms.submit_guess(player_id, &room_id, guess).await
        }

        ClientEvent::LeaveRoom { room_id } => {
            let mut rooms = state.rooms.lock().await;
            rooms.leave(player_id, &room_id).await
        }
    };

    if let Err(e) = result {
        tracing::debug!(%player_id, error = %e, "client event rejected");
    }
    Ok(())
}

/// Increments and returns the next sequence number.
fn next_seq(seq: &mut u64) -> u64 {
    let current = *seq;
    *seq += 1;
    current
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_next_seq_counts_from_current() {
        let mut seq = 0;
        assert_eq!(next_seq(&mut seq), 0);
        assert_eq!(next_seq(&mut seq), 1);
        assert_eq!(seq, 2);
    }

    #[test]
    fn test_idle_timeout_default_is_a_minute() {
        assert_eq!(crate::server::DEFAULT_IDLE_TIMEOUT, Duration::from_secs(60));
    }
}
