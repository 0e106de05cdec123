//! Notification bus plumbing.
//!
//! The external transport is push-based and at-least-once: a message may be
//! redelivered, and cross-partition ordering is not guaranteed. Publishers
//! and consumers only see the [`EventPublisher`] trait and the
//! [`Delivery`] envelope; the daemon wires an in-process bus with the same
//! contract (redelivery on nack, attempt counters), so the scanner and
//! consumer compose identically against a managed broker.

use async_trait::async_trait;
use lockbox_events::{Delivery, EventError, NotificationEvent};
use lockbox_id::EventId;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum BusError {
    /// The event could not be encoded for the wire.
    #[error("failed to encode event: {0}")]
    Encode(#[from] EventError),

    /// The transport refused the message.
    #[error("bus unavailable: {0}")]
    Unavailable(String),
}

/// Outbound side of the notification bus.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &NotificationEvent) -> Result<(), BusError>;
}

/// In-process at-least-once bus.
///
/// Every published event gets a fresh transport message id plus an
/// application-level event id attribute; redeliveries keep both, so the
/// consumer's idempotency key is stable across attempts.
#[derive(Clone)]
pub struct InProcessBus {
    tx: mpsc::UnboundedSender<Delivery>,
}

/// Receiving end of the in-process bus. Held by the consumer worker.
pub struct BusReceiver {
    rx: mpsc::UnboundedReceiver<Delivery>,
    redeliver_tx: mpsc::UnboundedSender<Delivery>,
}

impl InProcessBus {
    /// Creates a connected publisher/receiver pair.
    pub fn channel() -> (Self, BusReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let receiver = BusReceiver {
            rx,
            redeliver_tx: tx.clone(),
        };
        (Self { tx }, receiver)
    }
}

#[async_trait]
impl EventPublisher for InProcessBus {
    async fn publish(&self, event: &NotificationEvent) -> Result<(), BusError> {
        let payload = event.to_json_bytes()?;
        let delivery = Delivery::new(
            Uuid::new_v4().to_string(),
            Some(EventId::new().to_string()),
            payload,
        );
        self.tx
            .send(delivery)
            .map_err(|_| BusError::Unavailable("all receivers dropped".to_string()))
    }
}

impl BusReceiver {
    /// Next delivery, or `None` once all publishers are gone.
    pub async fn recv(&mut self) -> Option<Delivery> {
        self.rx.recv().await
    }

    /// Requeues a nacked delivery for another attempt.
    pub fn redeliver(&self, delivery: Delivery) -> Result<(), BusError> {
        self.redeliver_tx
            .send(delivery.next_attempt())
            .map_err(|_| BusError::Unavailable("bus closed".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lockbox_id::UserId;
    use lockbox_events::NotificationType;

    fn sample_event() -> NotificationEvent {
        NotificationEvent::builder()
            .event_type(NotificationType::secret_expiring())
            .recipient(UserId::new())
            .title("t")
            .message("m")
            .build()
    }

    #[tokio::test]
    async fn test_publish_recv_roundtrip() {
        let (bus, mut receiver) = InProcessBus::channel();
        bus.publish(&sample_event()).await.unwrap();

        let delivery = receiver.recv().await.unwrap();
        assert_eq!(delivery.attempt, 1);
        assert!(delivery.event_id.as_deref().unwrap().starts_with("evt_"));

        let event = NotificationEvent::from_json_bytes(&delivery.payload).unwrap();
        assert_eq!(event.title, "t");
    }

    #[tokio::test]
    async fn test_redelivery_keeps_idempotency_key() {
        let (bus, mut receiver) = InProcessBus::channel();
        bus.publish(&sample_event()).await.unwrap();

        let first = receiver.recv().await.unwrap();
        let key = first.idempotency_key().to_string();
        receiver.redeliver(first).unwrap();

        let second = receiver.recv().await.unwrap();
        assert_eq!(second.attempt, 2);
        assert_eq!(second.idempotency_key(), key);
    }

    #[tokio::test]
    async fn test_distinct_events_get_distinct_keys() {
        let (bus, mut receiver) = InProcessBus::channel();
        bus.publish(&sample_event()).await.unwrap();
        bus.publish(&sample_event()).await.unwrap();

        let a = receiver.recv().await.unwrap();
        let b = receiver.recv().await.unwrap();
        assert_ne!(a.idempotency_key(), b.idempotency_key());
    }
}
