//! Best-effort audit emission.
//!
//! Audit records are dispatched on a detached task with a hard timeout; the
//! caller's primary operation never blocks on, or fails because of, the
//! audit sink. Failures are logged and the record is discarded; the audit
//! channel is decoupled from the correctness of the mutation it describes.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

/// Default bound on the outbound audit call.
pub const DEFAULT_AUDIT_TIMEOUT: Duration = Duration::from_millis(5000);

/// A single audit record. Produced once per completed mutation; never
/// mutated afterwards.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub action: String,
    pub resource_key: String,
    pub actor_username: String,
    pub timestamp: DateTime<Utc>,
}

/// Wire form POSTed to the audit endpoint. Response body is ignored.
#[derive(Serialize)]
struct AuditWireRecord<'a> {
    action: &'a str,
    #[serde(rename = "secretKey")]
    secret_key: &'a str,
    username: &'a str,
}

/// Fire-and-forget dispatcher for audit records.
#[derive(Clone)]
pub struct AuditDispatcher {
    client: reqwest::Client,
    endpoint: Option<String>,
    timeout: Duration,
}

impl AuditDispatcher {
    pub fn new(endpoint: Option<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            timeout,
        }
    }

    /// Dispatcher with no configured sink; records are logged and dropped.
    pub fn disabled() -> Self {
        Self::new(None, DEFAULT_AUDIT_TIMEOUT)
    }

    /// Emits an audit record and returns immediately.
    ///
    /// The outbound POST runs on a detached task bounded by the configured
    /// timeout; on timeout the in-flight request is dropped, which cancels
    /// it and releases its connection. No retry at this layer.
    pub fn emit(&self, action: &str, resource_key: &str, actor_username: &str) {
        let event = AuditEvent {
            action: action.to_string(),
            resource_key: resource_key.to_string(),
            actor_username: actor_username.to_string(),
            timestamp: Utc::now(),
        };

        let Some(endpoint) = self.endpoint.clone() else {
            debug!(action = %event.action, resource_key = %event.resource_key, "No audit sink configured, dropping audit event");
            return;
        };

        let client = self.client.clone();
        let timeout = self.timeout;
        tokio::spawn(async move {
            let body = AuditWireRecord {
                action: &event.action,
                secret_key: &event.resource_key,
                username: &event.actor_username,
            };
            let send = client.post(&endpoint).json(&body).send();

            match tokio::time::timeout(timeout, send).await {
                Ok(Ok(response)) if response.status().is_success() => {
                    debug!(action = %event.action, "Audit event dispatched");
                }
                Ok(Ok(response)) => {
                    warn!(
                        action = %event.action,
                        status = %response.status(),
                        "Audit sink rejected event, discarding"
                    );
                }
                Ok(Err(e)) => {
                    warn!(action = %event.action, error = %e, "Audit sink unavailable, discarding event");
                }
                Err(_) => {
                    warn!(
                        action = %event.action,
                        timeout_ms = timeout.as_millis() as u64,
                        "Audit dispatch timed out, discarding event"
                    );
                }
            }
        });
    }
}
