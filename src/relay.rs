//! Relay context and fan-out loop
//!
//! `Relay` is handed to every connection task: it owns the registry handle and
//! the producer side of the broadcast queue. `FanOut` is the single consumer
//! that renders each queued message and delivers it to every member.

use futures_util::FutureExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::connection::Connection;
use crate::error::AppError;
use crate::message::ChatMessage;
use crate::registry::Registry;

/// Shared relay context
#[derive(Debug, Clone)]
pub struct Relay {
    registry: Registry,
    queue: mpsc::UnboundedSender<ChatMessage>,
}

impl Relay {
    /// Create a relay and the fan-out worker that drains its queue
    ///
    /// The caller spawns `FanOut::run` exactly once.
    pub fn new() -> (Self, FanOut) {
        let registry = Registry::new();
        let (queue, receiver) = mpsc::unbounded_channel();
        let relay = Self {
            registry: registry.clone(),
            queue,
        };
        let fanout = FanOut { registry, receiver };
        (relay, fanout)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Enqueue a message for broadcast
    ///
    /// Never blocks. Fails only when the fan-out worker is gone.
    pub fn publish(&self, msg: ChatMessage) -> Result<(), AppError> {
        self.queue.send(msg).map_err(|_| AppError::QueueClosed)
    }
}

/// The broadcast worker
pub struct FanOut {
    registry: Registry,
    receiver: mpsc::UnboundedReceiver<ChatMessage>,
}

impl FanOut {
    /// Run the fan-out loop
    ///
    /// Broadcasts queued messages in FIFO order until every `Relay` clone is dropped.
    pub async fn run(mut self) {
        info!("Fan-out loop started");

        while let Some(msg) = self.receiver.recv().await {
            self.broadcast(&msg).await;
        }

        info!("Fan-out loop stopped");
    }

    #[cfg(test)]
    pub(crate) fn into_receiver(self) -> mpsc::UnboundedReceiver<ChatMessage> {
        self.receiver
    }

    async fn broadcast(&self, msg: &ChatMessage) {
        let payload = msg.render();
        let delivery = self
            .registry
            .for_each(|conn| {
                let payload = payload.clone();
                async move { deliver(conn, &payload).await }.boxed()
            })
            .await;

        debug!(
            "Broadcast from '{}' delivered to {}, dropped {}",
            msg.username, delivery.delivered, delivery.dropped
        );
    }
}

/// Write one payload to one member, logging why it failed
async fn deliver(conn: &mut Connection, payload: &str) -> bool {
    match conn.send_text(payload).await {
        Ok(()) => true,
        Err(e) => {
            warn!("Send to {} ({}) failed: {}", conn.id, conn.peer, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::testing::{failing, recording, texts};

    #[tokio::test]
    async fn test_messages_delivered_in_order() {
        let (relay, fanout) = Relay::new();
        let (c1, mut rx1) = recording();
        let (c2, mut rx2) = recording();
        relay.registry().add(c1).await;
        relay.registry().add(c2).await;

        relay.publish(ChatMessage::new("alice", "one")).unwrap();
        relay.publish(ChatMessage::new("bob", "two")).unwrap();
        relay.publish(ChatMessage::new("alice", "three")).unwrap();
        drop(relay);

        // Queue drains, then the loop ends because the last sender is gone
        fanout.run().await;

        let expected = vec![
            "alice: one".to_string(),
            "bob: two".to_string(),
            "alice: three".to_string(),
        ];
        assert_eq!(texts(&mut rx1), expected);
        assert_eq!(texts(&mut rx2), expected);
    }

    #[tokio::test]
    async fn test_failing_member_does_not_stop_broadcast() {
        let (relay, fanout) = Relay::new();
        let registry = relay.registry().clone();
        let (good, mut good_rx) = recording();
        registry.add(failing()).await;
        registry.add(good).await;

        relay.publish(ChatMessage::new("alice", "hi")).unwrap();
        relay.publish(ChatMessage::new("alice", "bye")).unwrap();
        drop(relay);
        fanout.run().await;

        assert_eq!(registry.len().await, 1);
        assert_eq!(
            texts(&mut good_rx),
            vec!["alice: hi".to_string(), "alice: bye".to_string()]
        );
    }

    #[tokio::test]
    async fn test_deliver_reports_write_failure() {
        let (mut good, mut rx) = recording();
        let mut bad = failing();

        assert!(deliver(&mut good, "alice: hi").await);
        assert!(!deliver(&mut bad, "alice: hi").await);
        assert_eq!(texts(&mut rx), vec!["alice: hi".to_string()]);
    }

    #[tokio::test]
    async fn test_publish_after_fanout_gone() {
        let (relay, fanout) = Relay::new();
        drop(fanout);
        let err = relay.publish(ChatMessage::new("alice", "hi")).unwrap_err();
        assert!(matches!(err, AppError::QueueClosed));
    }
}
