//! Connection registry
//!
//! The set of connections currently eligible for broadcasts, behind a single
//! coarse lock. `for_each` holds the lock for the whole pass: every member is
//! tried once, failures are removed and closed before the lock is released,
//! and connections added concurrently join only after the current broadcast.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::connection::Connection;
use crate::types::ConnectionId;

/// Outcome of one `for_each` pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Members the delivery function reported success for
    pub delivered: usize,
    /// Members removed and closed because delivery failed
    pub dropped: usize,
}

/// Shared registry handle
///
/// Cloning is cheap; all clones see the same set.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    connections: Arc<Mutex<HashMap<ConnectionId, Connection>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection
    ///
    /// An id is never present twice; re-adding replaces the handle.
    pub async fn add(&self, conn: Connection) {
        let mut connections = self.connections.lock().await;
        let id = conn.id;
        if connections.insert(id, conn).is_some() {
            warn!("Connection {} was already registered", id);
        }
        debug!("Registered {}, total connections: {}", id, connections.len());
    }

    /// Remove a connection if present
    ///
    /// Does not close it: the caller owns the returned handle and must close it.
    /// Removing an absent id is a no-op.
    pub async fn remove(&self, id: ConnectionId) -> Option<Connection> {
        let mut connections = self.connections.lock().await;
        let removed = connections.remove(&id);
        if removed.is_some() {
            debug!("Deregistered {}, total connections: {}", id, connections.len());
        }
        removed
    }

    /// Run `deliver` against every member under the lock
    ///
    /// Each member is tried once. Members for which `deliver` returns `false`
    /// are removed and closed before the lock is released.
    pub async fn for_each<F>(&self, mut deliver: F) -> Delivery
    where
        F: for<'a> FnMut(&'a mut Connection) -> BoxFuture<'a, bool>,
    {
        let mut connections = self.connections.lock().await;
        let mut delivery = Delivery::default();
        let mut failed = Vec::new();

        for (id, conn) in connections.iter_mut() {
            if deliver(conn).await {
                delivery.delivered += 1;
            } else {
                failed.push(*id);
            }
        }

        for id in failed {
            if let Some(conn) = connections.remove(&id) {
                warn!("Dropping connection {} ({}) after failed delivery", id, conn.peer);
                conn.close().await;
                delivery.dropped += 1;
            }
        }

        delivery
    }

    /// Number of registered connections
    pub async fn len(&self) -> usize {
        self.connections.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.connections.lock().await.is_empty()
    }

    pub async fn contains(&self, id: ConnectionId) -> bool {
        self.connections.lock().await.contains_key(&id)
    }
}
