//! Bus delivery envelope.
//!
//! The notification bus is an at-least-once transport: the same message may
//! be delivered more than once, and cross-partition ordering is not
//! guaranteed. The envelope carries just enough to dedupe and retry.

/// A single push delivery from the notification bus.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Transport-assigned opaque message identifier.
    pub message_id: String,

    /// Application-level event identifier attribute, when the publisher set
    /// one. Redeliveries of the same logical event carry the same value.
    pub event_id: Option<String>,

    /// Delivery attempt, starting at 1 for the first delivery.
    pub attempt: u32,

    /// Raw event payload.
    pub payload: Vec<u8>,
}

impl Delivery {
    /// Creates a first-attempt delivery.
    pub fn new(
        message_id: impl Into<String>,
        event_id: Option<String>,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            event_id,
            attempt: 1,
            payload,
        }
    }

    /// The idempotency key for this delivery: the `eventId` attribute when
    /// present, otherwise the transport message id.
    pub fn idempotency_key(&self) -> &str {
        self.event_id.as_deref().unwrap_or(&self.message_id)
    }

    /// Returns the envelope for the next redelivery attempt.
    #[must_use]
    pub fn next_attempt(mut self) -> Self {
        self.attempt += 1;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idempotency_key_prefers_event_id() {
        let d = Delivery::new("m-1", Some("evt-1".to_string()), vec![]);
        assert_eq!(d.idempotency_key(), "evt-1");

        let d = Delivery::new("m-2", None, vec![]);
        assert_eq!(d.idempotency_key(), "m-2");
    }

    #[test]
    fn test_next_attempt_increments() {
        let d = Delivery::new("m-1", None, vec![]);
        assert_eq!(d.attempt, 1);
        let d = d.next_attempt();
        assert_eq!(d.attempt, 2);
        assert_eq!(d.message_id, "m-1");
    }
}
