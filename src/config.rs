//! Server configuration
//!
//! The only external knob is the bind address, taken from the first
//! command-line argument.

use std::time::Duration;

/// Default server address
pub const DEFAULT_ADDR: &str = "0.0.0.0:8082";

/// HTTP path accepted for the WebSocket upgrade
pub const WS_PATH: &str = "/ws";

/// How long connection tasks get to finish after a shutdown signal
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the listener to
    pub addr: String,
    /// Drain timeout for graceful shutdown
    pub shutdown_timeout: Duration,
}

impl ServerConfig {
    /// Build from command-line arguments (program name already skipped)
    pub fn from_args<I>(args: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let addr = args
            .into_iter()
            .next()
            .unwrap_or_else(|| DEFAULT_ADDR.to_string());
        Self {
            addr,
            ..Self::default()
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            shutdown_timeout: SHUTDOWN_TIMEOUT,
        }
    }
}
