//! Error types for event handling.

use thiserror::Error;

/// Errors that can occur when decoding or validating events.
#[derive(Debug, Error, Clone)]
pub enum EventError {
    /// The event payload could not be decoded.
    #[error("invalid event payload: {0}")]
    InvalidPayload(String),

    /// The event names no recipients.
    #[error("notification event has no recipients")]
    NoRecipients,

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for EventError {
    fn from(err: serde_json::Error) -> Self {
        EventError::Serialization(err.to_string())
    }
}
