//! Connection struct definition
//!
//! The write half of one client's WebSocket, as stored in the registry.
//! The read half stays with the connection task in `handler`.

use std::fmt;
use std::pin::Pin;

use futures_util::{Sink, SinkExt};
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::debug;

use crate::error::SendError;
use crate::types::ConnectionId;

/// Outbound frame sink (the split write half of a WebSocket)
pub type FrameSink = Pin<Box<dyn Sink<Message, Error = tungstenite::Error> + Send>>;

/// Registered connection
pub struct Connection {
    /// Unique identifier for this connection
    pub id: ConnectionId,
    /// Peer address, for logging only
    pub peer: String,
    sink: FrameSink,
}

impl Connection {
    /// Create a new connection around an outbound sink
    pub fn new(id: ConnectionId, peer: impl Into<String>, sink: FrameSink) -> Self {
        Self {
            id,
            peer: peer.into(),
            sink,
        }
    }

    /// Send one text frame to this client
    pub async fn send_text(&mut self, text: &str) -> Result<(), SendError> {
        self.sink.send(Message::text(text)).await?;
        Ok(())
    }

    /// Close the connection, sending a close frame if the peer is still there
    ///
    /// Consumes the handle so it can only happen once.
    pub async fn close(mut self) {
        if let Err(e) = self.sink.close().await {
            debug!("Close for {} failed: {}", self.id, e);
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .finish_non_exhaustive()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;

    #[tokio::test]
    async fn test_send_text() {
        let (mut conn, mut rx) = recording();
        conn.send_text("alice: hi").await.unwrap();
        assert_eq!(texts(&mut rx), vec!["alice: hi".to_string()]);
    }

    #[tokio::test]
    async fn test_send_to_failing_connection() {
        let mut conn = failing();
        assert!(conn.send_text("alice: hi").await.is_err());
    }

    #[tokio::test]
    async fn test_close_is_quiet_on_error() {
        let conn = failing();
        conn.close().await;
    }
}
