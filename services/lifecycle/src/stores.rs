//! Trait seams to the out-of-scope collaborators.
//!
//! CRUD, membership management, and mail delivery live in other services;
//! the lifecycle core only depends on the operations below. Production
//! implementations are in [`crate::db`]; tests substitute in-memory ones.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lockbox_events::NotificationEvent;
use lockbox_id::{ProjectId, SecretId, TeamId, UserId};
use thiserror::Error;
use tracing::debug;

use crate::db::DbError;

/// A stored secret, as the lifecycle core sees it.
#[derive(Debug, Clone)]
pub struct SecretRecord {
    pub id: SecretId,
    pub project_id: ProjectId,
    pub secret_key: String,
    /// Only ever produced by `EncryptionGateway::encrypt`.
    pub encrypted_value: String,
    pub strategy_type: String,
    pub expires_at: Option<DateTime<Utc>>,
    /// Monotonic mutation counter backing the optimistic rotation check.
    pub version: i64,
}

/// Project context for notifications.
#[derive(Debug, Clone)]
pub struct ProjectRecord {
    pub id: ProjectId,
    pub name: String,
    pub team_id: Option<TeamId>,
    pub member_user_ids: Vec<UserId>,
}

#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn fetch(&self, id: SecretId) -> Result<Option<SecretRecord>, DbError>;

    /// Persists a new encrypted value iff the stored version still matches
    /// `expected_version`. Returns `false` on a version conflict; the caller
    /// decides whether to retry.
    async fn update_value(
        &self,
        id: SecretId,
        encrypted_value: &str,
        expected_version: i64,
    ) -> Result<bool, DbError>;

    /// All secrets whose expiry falls inside the inclusive window.
    async fn list_expiring(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<SecretRecord>, DbError>;
}

#[async_trait]
pub trait ProjectDirectory: Send + Sync {
    async fn project(&self, id: ProjectId) -> Result<Option<ProjectRecord>, DbError>;
}

/// Whether applying a delivery had an effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerOutcome {
    /// First time this key was seen; effects were applied.
    Applied,
    /// The key was already recorded; nothing was done.
    AlreadyHandled,
}

/// The idempotency ledger plus the durable effects it guards.
#[async_trait]
pub trait DeliveryLedger: Send + Sync {
    /// Applies the event's effects (inbox rows) and records the idempotency
    /// key in one atomic step. Returns `AlreadyHandled` without side effects
    /// if an earlier delivery recorded the key.
    async fn apply_once(
        &self,
        idempotency_key: &str,
        event: &NotificationEvent,
    ) -> Result<LedgerOutcome, DbError>;

    /// Routes an undeliverable message to the dead-letter sink.
    async fn dead_letter(
        &self,
        idempotency_key: &str,
        payload: &[u8],
        reason: &str,
        attempts: u32,
    ) -> Result<(), DbError>;

    /// Removes ledger entries older than the retention window, returning the
    /// number removed.
    async fn sweep_expired(&self, older_than_days: i32) -> Result<u64, DbError>;
}

#[derive(Debug, Error)]
#[error("mail delivery failed: {0}")]
pub struct MailerError(pub String);

/// Downstream email trigger. Best-effort: failures after the ledger commit
/// are logged, not retried (the inbox row is the durable effect).
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, recipient: UserId, title: &str, body: &str) -> Result<(), MailerError>;
}

/// Mailer used when no provider is configured.
pub struct NoopMailer;

#[async_trait]
impl Mailer for NoopMailer {
    async fn send(&self, recipient: UserId, title: &str, _body: &str) -> Result<(), MailerError> {
        debug!(recipient = %recipient, title = title, "No mail provider configured, dropping email");
        Ok(())
    }
}
