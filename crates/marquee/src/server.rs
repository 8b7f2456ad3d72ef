//! `MarqueeServer` builder and server loop.
//!
//! This is the entry point for running a Marquee game server. It ties
//! together the layers: transport → protocol → rooms.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use marquee_protocol::{Codec, JsonCodec};
use marquee_room::{DEFAULT_CHANNEL_SIZE, GameConfig, RoomRegistry};
use marquee_transport::{Transport, TransportError, WebSocketTransport};
use tokio::sync::Mutex;

use crate::MarqueeError;
use crate::handler::handle_connection;

/// How long a connection may stay silent before it is dropped.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) rooms: Mutex<RoomRegistry>,
    pub(crate) codec: C,
    pub(crate) idle_timeout: Duration,
}

/// Builder for configuring and starting a Marquee server.
///
/// # Example
///
/// ```rust,no_run
/// use marquee::prelude::*;
///
/// # async fn start() -> Result<(), MarqueeError> {
/// let server = MarqueeServer::builder()
///     .bind("0.0.0.0:5000")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct MarqueeServerBuilder {
    bind_addr: String,
    game_config: GameConfig,
    idle_timeout: Duration,
    room_channel_size: usize,
}

impl MarqueeServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:5000".to_string(),
            game_config: GameConfig::default(),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            room_channel_size: DEFAULT_CHANNEL_SIZE,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the rules every room plays by.
    pub fn game_config(mut self, config: GameConfig) -> Self {
        self.game_config = config;
        self
    }

    /// Sets how long a client may go without sending anything.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Sets the command queue length of each room actor.
    pub fn room_channel_size(mut self, size: usize) -> Self {
        self.room_channel_size = size;
        self
    }

    /// Binds the listener and prepares the server.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build(self) -> Result<MarqueeServer<JsonCodec>, MarqueeError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let rooms = RoomRegistry::new(self.game_config).with_channel_size(self.room_channel_size);
        let state = Arc::new(ServerState {
            rooms: Mutex::new(rooms),
            codec: JsonCodec,
            idle_timeout: self.idle_timeout,
        });

        Ok(MarqueeServer { transport, state })
    }
}

impl Default for MarqueeServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Marquee game server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct MarqueeServer<C: Codec = JsonCodec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
}

impl MarqueeServer<JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> MarqueeServerBuilder {
        MarqueeServerBuilder::new()
    }
}

impl<C> MarqueeServer<C>
where
    C: Codec,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the server accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), MarqueeError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` completes.
    ///
    /// Each accepted connection gets its own handler task. Handlers that
    /// are still running when the loop stops keep going until their
    /// client disconnects.
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<(), MarqueeError>
    where
        F: Future<Output = ()>,
    {
        match self.local_addr() {
            Ok(addr) => tracing::info!(%addr, "Marquee server running"),
            Err(_) => tracing::info!("Marquee server running"),
        }
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(conn, state).await {
                                tracing::debug!(error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(e @ TransportError::Handshake { .. }) => {
                        tracing::debug!(error = %e, "client never finished connecting");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
                () = &mut shutdown => {
                    tracing::info!("shutdown requested, no longer accepting");
                    break;
                }
            }
        }

        self.transport.shutdown().await?;
        Ok(())
    }
}
