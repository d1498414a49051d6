//! Basic type definitions for the relay
//!
//! Provides a newtype wrapper for connection identity.

use uuid::Uuid;

/// Unique connection identifier (newtype pattern)
///
/// Wraps a UUID v4. Used as the registry key, so every accepted
/// WebSocket gets its own identity even when the same peer reconnects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Create a new random connection ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
