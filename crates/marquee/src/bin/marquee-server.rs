//! Marquee game server.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin marquee-server
//! MARQUEE_BIND=127.0.0.1:8080 RUST_LOG=marquee=debug cargo run --bin marquee-server
//! ```
//!
//! Environment:
//! - `MARQUEE_BIND`: listen address, default `0.0.0.0:5000`
//! - `MARQUEE_IDLE_TIMEOUT_SECS`: drop silent clients after this many
//!   seconds, default 60
//! - `RUST_LOG`: tracing filter, default `marquee=info,marquee_room=info`

use std::time::Duration;

use marquee::{DEFAULT_IDLE_TIMEOUT, MarqueeError, MarqueeServer};
use marquee_room::GameConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_BIND: &str = "0.0.0.0:5000";

/// Installs the tracing subscriber. `RUST_LOG` overrides `default_level`.
fn setup_logger(default_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("marquee={default_level},marquee_room={default_level}").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn idle_timeout_from_env() -> Duration {
    match std::env::var("MARQUEE_IDLE_TIMEOUT_SECS") {
        Ok(raw) => match raw.trim().parse::<u64>() {
            Ok(secs) if secs > 0 => Duration::from_secs(secs),
            _ => {
                tracing::warn!(value = %raw, "invalid MARQUEE_IDLE_TIMEOUT_SECS, using default");
                DEFAULT_IDLE_TIMEOUT
            }
        },
        Err(_) => DEFAULT_IDLE_TIMEOUT,
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> Result<(), MarqueeError> {
    setup_logger("info");

    let bind = std::env::var("MARQUEE_BIND").unwrap_or_else(|_| DEFAULT_BIND.to_string());
    let idle_timeout = idle_timeout_from_env();

    let server = MarqueeServer::builder()
        .bind(&bind)
        .game_config(GameConfig::default())
        .idle_timeout(idle_timeout)
        .build()
        .await?;

    server.run_until(shutdown_signal()).await?;
    tracing::info!("server shutdown complete");
    Ok(())
}
