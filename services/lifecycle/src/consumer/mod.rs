//! Notification bus consumer.
//!
//! The bus is at-least-once, so every delivery is reconciled against the
//! idempotency ledger before it is allowed any side effects. One policy
//! applies to every message class:
//!
//! - success, duplicate, or terminal failure (after dead-lettering) → ack
//! - transient failure with retry budget left → nack for bus redelivery
//! - transient failure at the budget → dead-letter, then ack
//!
//! Decode and validation failures are terminal: redelivering a payload that
//! cannot be decoded can never succeed. Nothing is dropped without a
//! dead-letter record, and nothing is retried forever.

mod worker;

pub use worker::ConsumerWorker;

use std::sync::Arc;

use lockbox_events::{Delivery, NotificationEvent};
use tracing::{debug, error, info, instrument, warn};

use crate::stores::{DeliveryLedger, LedgerOutcome, Mailer};

/// Default retry budget per logical message.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// The consumer's verdict on one delivery attempt. Exactly one is returned
/// per attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Done with this message; the bus must not redeliver it.
    Ack,
    /// Transient failure; the bus should redeliver.
    Nack,
}

/// Applies inbound notification events idempotently.
///
/// Safe under arbitrary concurrent delivery of distinct messages and under
/// duplicate delivery of the same message; the safety comes from the
/// ledger's atomic check-and-record, not from serializing deliveries.
pub struct NotificationConsumer<L, M> {
    ledger: Arc<L>,
    mailer: Arc<M>,
    max_attempts: u32,
}

impl<L: DeliveryLedger, M: Mailer> NotificationConsumer<L, M> {
    pub fn new(ledger: Arc<L>, mailer: Arc<M>, max_attempts: u32) -> Self {
        Self {
            ledger,
            mailer,
            max_attempts,
        }
    }

    /// Handles one delivery attempt.
    #[instrument(
        skip(self, delivery),
        fields(message_id = %delivery.message_id, attempt = delivery.attempt)
    )]
    pub async fn handle(&self, delivery: &Delivery) -> Disposition {
        let event = match NotificationEvent::from_json_bytes(&delivery.payload) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "Undecodable notification payload");
                return self.terminal(delivery, &format!("decode failed: {e}")).await;
            }
        };

        if let Err(e) = event.validate() {
            warn!(error = %e, "Invalid notification event");
            return self.terminal(delivery, &format!("invalid event: {e}")).await;
        }

        if !event.event_type.is_known() {
            info!(
                event_type = %event.event_type,
                "Recording notification of unknown type"
            );
        }

        let key = delivery.idempotency_key();
        match self.ledger.apply_once(key, &event).await {
            Ok(LedgerOutcome::AlreadyHandled) => {
                debug!(idempotency_key = key, "Duplicate delivery, already handled");
                Disposition::Ack
            }
            Ok(LedgerOutcome::Applied) => {
                // The inbox rows are the durable effect; mail is best-effort
                // and a failure here must not trigger a re-apply.
                for recipient in &event.recipient_user_ids {
                    if let Err(e) = self
                        .mailer
                        .send(*recipient, &event.title, &event.message)
                        .await
                    {
                        warn!(
                            recipient = %recipient,
                            error = %e,
                            "Email trigger failed, inbox record stands"
                        );
                    }
                }
                debug!(idempotency_key = key, "Notification applied");
                Disposition::Ack
            }
            Err(e) if delivery.attempt < self.max_attempts => {
                warn!(
                    error = %e,
                    max_attempts = self.max_attempts,
                    "Transient handler failure, requesting redelivery"
                );
                Disposition::Nack
            }
            Err(e) => {
                self.terminal(delivery, &format!("retry budget exhausted: {e}"))
                    .await
            }
        }
    }

    /// Dead-letters the message, then acks it. If even the dead-letter write
    /// fails, the message is nacked so the bus keeps it.
    async fn terminal(&self, delivery: &Delivery, reason: &str) -> Disposition {
        match self
            .ledger
            .dead_letter(
                delivery.idempotency_key(),
                &delivery.payload,
                reason,
                delivery.attempt,
            )
            .await
        {
            Ok(()) => {
                warn!(reason, "Dead-lettered notification");
                Disposition::Ack
            }
            Err(e) => {
                error!(error = %e, "Failed to write dead letter, nacking delivery");
                Disposition::Nack
            }
        }
    }
}
