//! # lockbox-events
//!
//! Notification event definitions and serialization for the lockbox
//! secrets manager.
//!
//! ## Design Principles
//!
//! - Events are immutable once published; they are consumed, never updated
//! - Events never contain secret values (only keys and metadata)
//! - The wire form is JSON with camelCase field names
//! - Unknown event types are preserved for forward compatibility, not rejected
//!
//! ## Bus Envelope
//!
//! The bus delivers events wrapped in a transport envelope carrying an opaque
//! `messageId`, an optional application-level `eventId` attribute, and the
//! delivery attempt count. The idempotency key of a delivery is the `eventId`
//! attribute when present, falling back to the `messageId`.

mod envelope;
mod error;
mod types;

pub use envelope::Delivery;
pub use error::EventError;
pub use types::*;
