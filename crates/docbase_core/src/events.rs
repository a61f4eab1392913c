//! Change events and the non-blocking publisher pipeline.
//!
//! Every successful mutation produces a [`ChangeEvent`] on the channel
//! `{namespace}:{tenant}:{collection}`. Publishing is fire-and-forget:
//! events pass through a bounded queue drained by a background task, and
//! a full queue drops the event with a warning rather than stalling the
//! originating request.

use crate::types::TenantId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

/// The kind of mutation a change event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    /// A document was created.
    Insert,
    /// A document was patched.
    Update,
    /// A document was removed.
    Delete,
}

impl ChangeType {
    /// Returns the wire name of the change type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// One mutation, as delivered to subscribers.
///
/// `data` carries the full document after the mutation, except for
/// deletes, which carry the document as it was before removal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// The kind of mutation.
    #[serde(rename = "type")]
    pub change_type: ChangeType,
    /// The collection the document lives in.
    pub collection: String,
    /// The document payload.
    pub data: Value,
}

impl ChangeEvent {
    /// Creates a change event.
    #[must_use]
    pub fn new(change_type: ChangeType, collection: impl Into<String>, data: Value) -> Self {
        Self {
            change_type,
            collection: collection.into(),
            data,
        }
    }
}

/// Builds the channel name for a tenant's collection:
/// `{namespace}:{tenant}:{collection}`.
#[must_use]
pub fn channel_name(namespace: &str, tenant: &TenantId, collection: &str) -> String {
    format!("{namespace}:{}:{collection}", tenant.as_str())
}

/// A destination for serialized change events.
///
/// Implementations must not block: the publisher's drain task calls
/// [`publish`] inline and a slow bus would back up the queue.
///
/// [`publish`]: EventBus::publish
pub trait EventBus: Send + Sync {
    /// Delivers a payload to every subscriber of `channel`.
    ///
    /// # Errors
    ///
    /// Returns an error if the bus has shut down. Having no subscribers
    /// is not an error.
    fn publish(&self, channel: &str, payload: &[u8]) -> crate::error::EngineResult<()>;
}

/// A channel-tagged payload as carried by [`InProcessBus`].
#[derive(Debug, Clone)]
pub struct BusMessage {
    /// The channel the payload was published on.
    pub channel: String,
    /// The serialized event.
    pub payload: Vec<u8>,
}

/// An in-process event bus over a tokio broadcast channel.
///
/// Every subscriber sees every message on every channel; filtering by
/// channel name is the subscriber's job. Slow subscribers lag and lose
/// messages rather than applying backpressure.
#[derive(Debug)]
pub struct InProcessBus {
    sender: broadcast::Sender<BusMessage>,
}

impl InProcessBus {
    /// Creates a bus that retains up to `capacity` undelivered messages
    /// per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Opens a new subscription receiving all future messages.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<BusMessage> {
        self.sender.subscribe()
    }
}

impl EventBus for InProcessBus {
    fn publish(&self, channel: &str, payload: &[u8]) -> crate::error::EngineResult<()> {
        // A send error only means there are no receivers right now.
        let _ = self.sender.send(BusMessage {
            channel: channel.to_string(),
            payload: payload.to_vec(),
        });
        Ok(())
    }
}

/// Fire-and-forget change event publisher.
///
/// Events are serialized on the caller's thread, then handed to a
/// bounded queue drained by a background task. The store's request path
/// never waits on the bus, and a publisher failure never fails the
/// mutation that produced the event.
#[derive(Debug)]
pub struct EventPublisher {
    namespace: String,
    queue: mpsc::Sender<QueuedEvent>,
}

#[derive(Debug)]
struct QueuedEvent {
    channel: String,
    payload: Vec<u8>,
}

impl EventPublisher {
    /// Creates a publisher draining into `bus`.
    ///
    /// Spawns the drain task on the current tokio runtime; callers must
    /// construct the publisher from within one.
    #[must_use]
    pub fn new(namespace: impl Into<String>, bus: Arc<dyn EventBus>, capacity: usize) -> Self {
        let (queue, mut receiver) = mpsc::channel::<QueuedEvent>(capacity);
        tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                if let Err(error) = bus.publish(&event.channel, &event.payload) {
                    tracing::warn!(channel = %event.channel, %error, "event bus rejected change event");
                }
            }
        });
        Self {
            namespace: namespace.into(),
            queue,
        }
    }

    /// Enqueues a change event for delivery.
    ///
    /// Never blocks. If the queue is full or the drain task has stopped,
    /// the event is dropped with a warning.
    pub fn publish(&self, tenant: &TenantId, event: &ChangeEvent) {
        let channel = channel_name(&self.namespace, tenant, &event.collection);
        let payload = match serde_json::to_vec(event) {
            Ok(payload) => payload,
            Err(error) => {
                tracing::warn!(%channel, %error, "failed to serialize change event");
                return;
            }
        };

        if let Err(error) = self.queue.try_send(QueuedEvent { channel, payload }) {
            match error {
                mpsc::error::TrySendError::Full(dropped) => {
                    tracing::warn!(channel = %dropped.channel, "event queue full, dropping change event");
                }
                mpsc::error::TrySendError::Closed(_) => {
                    tracing::warn!("event drain task stopped, dropping change event");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tenant() -> TenantId {
        TenantId::new("acme")
    }

    #[test]
    fn channel_name_format() {
        assert_eq!(
            channel_name("docbase", &tenant(), "users"),
            "docbase:acme:users"
        );
    }

    #[test]
    fn change_event_wire_shape() {
        let event = ChangeEvent::new(ChangeType::Insert, "users", json!({"_id": "k1"}));
        let wire = serde_json::to_value(&event).unwrap();

        assert_eq!(
            wire,
            json!({"type": "insert", "collection": "users", "data": {"_id": "k1"}})
        );
    }

    #[tokio::test]
    async fn publisher_delivers_through_bus() {
        let bus = Arc::new(InProcessBus::new(16));
        let mut subscription = bus.subscribe();
        let publisher = EventPublisher::new("docbase", bus, 16);

        let event = ChangeEvent::new(ChangeType::Update, "users", json!({"_id": "k1"}));
        publisher.publish(&tenant(), &event);

        let message = subscription.recv().await.unwrap();
        assert_eq!(message.channel, "docbase:acme:users");

        let decoded: ChangeEvent = serde_json::from_slice(&message.payload).unwrap();
        assert_eq!(decoded.change_type, ChangeType::Update);
        assert_eq!(decoded.collection, "users");
    }

    #[tokio::test]
    async fn bus_without_subscribers_accepts_publishes() {
        let bus = InProcessBus::new(4);
        assert!(bus.publish("docbase:acme:users", b"{}").is_ok());
    }

    #[tokio::test]
    async fn full_queue_drops_without_blocking() {
        struct NullBus;
        impl EventBus for NullBus {
            fn publish(&self, _: &str, _: &[u8]) -> crate::error::EngineResult<()> {
                Ok(())
            }
        }

        let publisher = EventPublisher::new("docbase", Arc::new(NullBus), 1);
        let event = ChangeEvent::new(ChangeType::Insert, "users", json!({}));

        // Flood well past capacity; publish must return promptly every time.
        for _ in 0..64 {
            publisher.publish(&tenant(), &event);
        }
    }
}
