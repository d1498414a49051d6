//! Error types for the relay
//!
//! Per-connection failures (`DecodeError`, `SendError`) never leave the
//! connection they belong to. Only `AppError::Shutdown` is fatal for the process.

use std::time::Duration;

use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    /// WebSocket handshake failed; the connection was never registered
    #[error("WebSocket upgrade failed: {0}")]
    Upgrade(#[source] tungstenite::Error),

    /// Inbound frame could not be turned into a message
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Broadcast queue receiver is gone (fan-out task stopped)
    #[error("Broadcast queue closed")]
    QueueClosed,

    /// Connection tasks were still running when the drain timeout elapsed (fatal)
    #[error("Shutdown timed out after {timeout:?} with {pending} connection(s) still open")]
    Shutdown { timeout: Duration, pending: usize },

    /// Listener could not be bound
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Inbound frame errors
///
/// Every variant ends the connection the same way: deregister, close, exit.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Payload was not a `{"username", "message"}` object
    #[error("Invalid message format: {0}")]
    Json(#[from] serde_json::Error),

    /// Transport-level failure (reset, protocol violation)
    #[error("WebSocket error: {0}")]
    Transport(#[from] tungstenite::Error),

    /// Peer sent a close frame or the stream ended
    #[error("Connection closed by peer")]
    Closed,
}

/// Outbound frame errors
#[derive(Debug, Error)]
pub enum SendError {
    /// Writing the frame to the peer failed
    #[error("WebSocket write failed: {0}")]
    WebSocket(#[from] tungstenite::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown_error_message() {
        let err = AppError::Shutdown {
            timeout: Duration::from_secs(5),
            pending: 2,
        };
        assert_eq!(
            err.to_string(),
            "Shutdown timed out after 5s with 2 connection(s) still open"
        );
    }

    #[test]
    fn test_bind_failure_is_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::AddrInUse, "address in use");
        let err: AppError = io.into();
        assert!(matches!(err, AppError::Io(_)));
        assert_eq!(err.to_string(), "IO error: address in use");
    }

    #[test]
    fn test_decode_error_wraps_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: AppError = DecodeError::from(json_err).into();
        assert!(matches!(err, AppError::Decode(DecodeError::Json(_))));
        assert!(err.to_string().starts_with("Decode error: Invalid message format"));
    }
}
