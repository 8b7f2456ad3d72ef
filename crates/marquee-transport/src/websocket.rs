//! WebSocket transport implementation using `tokio-tungstenite`.
//!
//! Browsers open the game socket with an HTTP upgrade on `/`. A plain
//! `GET` on the same port (a load balancer or someone checking the
//! server with curl) gets a short text status page instead and is never
//! handed to the game.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;

use crate::{Connection, ConnectionId, Transport, TransportError};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// How long a new socket may take to send its request head.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Large enough for any browser's upgrade request head.
const PEEK_LEN: usize = 2048;

const STATUS_BODY: &str = "Marquee game server is running\n";

/// Listens for players. Each accepted socket becomes a
/// [`WebSocketConnection`] with a fresh [`ConnectionId`].
pub struct WebSocketTransport {
    listener: TcpListener,
}

impl WebSocketTransport {
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| TransportError::Bind {
                addr: addr.to_owned(),
                source,
            })?;
        tracing::info!(addr, "WebSocket transport listening");
        Ok(Self { listener })
    }

    /// The bound address. Tests bind port 0 and read the real port here.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    /// Waits for the next player. Status-page requests are answered
    /// inline and skipped.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        loop {
            let (stream, peer) = self
                .listener
                .accept()
                .await
                .map_err(TransportError::Accept)?;

            let upgraded = tokio::time::timeout(HANDSHAKE_TIMEOUT, upgrade(stream, peer))
                .await
                .map_err(|_| TransportError::Handshake {
                    peer,
                    reason: "timed out".into(),
                })??;
            let Some(ws) = upgraded else {
                continue;
            };

            let id = ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
            tracing::debug!(%id, %peer, "accepted WebSocket connection");

            let (sink, stream) = ws.split();
            return Ok(WebSocketConnection {
                id,
                sink: Mutex::new(sink),
                stream: Mutex::new(stream),
            });
        }
    }

    async fn shutdown(&self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Completes the WebSocket upgrade, or serves the status page and
/// returns `None`.
async fn upgrade(
    mut stream: TcpStream,
    peer: SocketAddr,
) -> Result<Option<WebSocketStream<TcpStream>>, TransportError> {
    let mut head = [0u8; PEEK_LEN];
    let n = stream.peek(&mut head).await.map_err(TransportError::Accept)?;

    if is_status_request(&head[..n]) {
        // Consume the request so closing sends FIN rather than RST.
        stream
            .read_exact(&mut head[..n])
            .await
            .map_err(TransportError::Accept)?;
        tracing::debug!(%peer, "served status page");
        let response = format!(
            "HTTP/1.1 200 OK\r\n\
             Content-Type: text/plain; charset=utf-8\r\n\
             Content-Length: {}\r\n\
             Connection: close\r\n\r\n{STATUS_BODY}",
            STATUS_BODY.len()
        );
        stream
            .write_all(response.as_bytes())
            .await
            .map_err(TransportError::Accept)?;
        let _ = stream.shutdown().await;
        return Ok(None);
    }

    tokio_tungstenite::accept_async(stream)
        .await
        .map(Some)
        .map_err(|e| TransportError::Handshake {
            peer,
            reason: e.to_string(),
        })
}

/// A complete `GET` request head with no `Upgrade: websocket` header.
///
/// A head that has not fully arrived yet is left to the WebSocket
/// handshake, which reads the rest itself.
fn is_status_request(peeked: &[u8]) -> bool {
    let text = String::from_utf8_lossy(peeked);
    let Some((head, _)) = text.split_once("\r\n\r\n") else {
        return false;
    };
    if !head.starts_with("GET ") {
        return false;
    }
    !head.lines().skip(1).any(|line| {
        line.split_once(':').is_some_and(|(name, value)| {
            name.trim().eq_ignore_ascii_case("upgrade")
                && value.trim().eq_ignore_ascii_case("websocket")
        })
    })
}

/// One player's socket.
///
/// Split into halves so the handler can wait in `recv` while room
/// broadcasts go out through `send`.
pub struct WebSocketConnection {
    id: ConnectionId,
    sink: Mutex<SplitSink<WebSocketStream<TcpStream>, Message>>,
    stream: Mutex<SplitStream<WebSocketStream<TcpStream>>>,
}

impl Connection for WebSocketConnection {
    type Error = TransportError;

    /// Envelopes are JSON, so they go out as text frames. Non-UTF-8
    /// payloads fall back to binary.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        let msg = match std::str::from_utf8(data) {
            Ok(text) => Message::Text(text.to_owned().into()),
            Err(_) => Message::Binary(data.to_vec().into()),
        };
        self.sink
            .lock()
            .await
            .send(msg)
            .await
            .map_err(|e| TransportError::Send {
                conn: self.id,
                reason: e.to_string(),
            })
    }

    /// Next text or binary frame. Control frames are skipped.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text.as_bytes().to_vec())),
                Some(Ok(Message::Binary(data))) => return Ok(Some(data.into())),
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    return Err(TransportError::Receive {
                        conn: self.id,
                        reason: e.to_string(),
                    });
                }
            }
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.sink
            .lock()
            .await
            .close()
            .await
            .map_err(|e| TransportError::Send {
                conn: self.id,
                reason: e.to_string(),
            })
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_get_is_a_status_request() {
        assert!(is_status_request(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n"));
        assert!(is_status_request(b"GET /health HTTP/1.1\r\n\r\n"));
    }

    #[test]
    fn test_upgrade_request_goes_to_the_game() {
        let head = b"GET / HTTP/1.1\r\n\
            Host: localhost:5000\r\n\
            Connection: Upgrade\r\n\
            upgrade: WebSocket\r\n\
            Sec-WebSocket-Version: 13\r\n\r\n";
        assert!(!is_status_request(head));
    }

    #[test]
    fn test_partial_or_non_get_head_goes_to_the_game() {
        assert!(!is_status_request(b"GET / HTTP/1.1\r\nHost: loc"));
        assert!(!is_status_request(b"POST / HTTP/1.1\r\n\r\n"));
        assert!(!is_status_request(b""));
    }
}
