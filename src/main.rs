//! Chat Relay - Entry Point
//!
//! Binds the listener, starts the fan-out loop, and serves until SIGINT/SIGTERM.

use std::env;

use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use chat_relay::config::{ServerConfig, WS_PATH};
use chat_relay::server::{self, shutdown_signal};
use chat_relay::{AppError, Relay};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=chat_relay=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chat_relay=info")),
        )
        .init();

    // Bind address from command line or default
    let config = ServerConfig::from_args(env::args().skip(1));

    let listener = TcpListener::bind(&config.addr).await.map_err(|e| {
        error!("Failed to bind {}: {}", config.addr, e);
        AppError::from(e)
    })?;
    info!("Chat relay listening on ws://{}{}", config.addr, WS_PATH);

    let (relay, fanout) = Relay::new();
    tokio::spawn(fanout.run());

    if let Err(e) = server::serve(listener, relay, &config, shutdown_signal()).await {
        error!("Server shutdown failed: {}", e);
        return Err(e);
    }

    info!("Server closed normally");
    Ok(())
}
