//! Expiration scanning.
//!
//! A scan sweeps the secret store for values expiring inside the warning
//! window and publishes one notification event per qualifying secret. The
//! scanner is either Idle or Scanning; a trigger that fires while a scan is
//! in flight is rejected instead of overlapping it. One bad secret never
//! aborts the batch: per-item failures are logged and counted, and the scan
//! reports completion regardless.

mod worker;

pub use worker::{ScannerWorker, DEFAULT_SCAN_HOUR};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{Duration, Utc};
use lockbox_events::{NotificationEvent, NotificationType};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::bus::{BusError, EventPublisher};
use crate::db::DbError;
use crate::stores::{ProjectDirectory, SecretRecord, SecretStore};

/// Default width of the expiry warning window.
pub const DEFAULT_WARNING_DAYS: i64 = 7;

#[derive(Debug, Error)]
pub enum ScanError {
    /// A scan was triggered while one is still running.
    #[error("a scan is already in progress")]
    AlreadyRunning,

    /// The window query itself failed; no per-secret work was done.
    #[error(transparent)]
    Store(#[from] DbError),
}

#[derive(Debug, Error)]
enum ScanItemError {
    #[error(transparent)]
    Store(#[from] DbError),
    #[error(transparent)]
    Bus(#[from] BusError),
}

/// Completion stats for one scan.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanStats {
    /// Secrets whose expiry fell inside the window.
    pub scanned: usize,
    /// Notification events published.
    pub published: usize,
    /// Secrets skipped (unresolvable project, no recipients, item failure).
    pub skipped: usize,
}

/// Periodic sweep over soon-to-expire secrets.
pub struct ExpirationScanner<S, P, B> {
    secrets: Arc<S>,
    projects: Arc<P>,
    bus: Arc<B>,
    warning_days: i64,
    scanning: AtomicBool,
}

impl<S, P, B> ExpirationScanner<S, P, B>
where
    S: SecretStore,
    P: ProjectDirectory,
    B: EventPublisher,
{
    pub fn new(secrets: Arc<S>, projects: Arc<P>, bus: Arc<B>, warning_days: i64) -> Self {
        Self {
            secrets,
            projects,
            bus,
            warning_days,
            scanning: AtomicBool::new(false),
        }
    }

    /// Runs one scan cycle. Fails fast with `AlreadyRunning` if a cycle is
    /// still in flight.
    #[instrument(skip(self))]
    pub async fn run_scan(&self) -> Result<ScanStats, ScanError> {
        if self.scanning.swap(true, Ordering::SeqCst) {
            return Err(ScanError::AlreadyRunning);
        }
        let result = self.sweep().await;
        self.scanning.store(false, Ordering::SeqCst);
        result
    }

    async fn sweep(&self) -> Result<ScanStats, ScanError> {
        let now = Utc::now();
        let until = now + Duration::days(self.warning_days);
        let expiring = self.secrets.list_expiring(now, until).await?;

        let mut stats = ScanStats {
            scanned: expiring.len(),
            ..Default::default()
        };

        for secret in &expiring {
            match self.notify_expiring(secret).await {
                Ok(true) => stats.published += 1,
                Ok(false) => stats.skipped += 1,
                Err(e) => {
                    warn!(
                        secret_id = %secret.id,
                        error = %e,
                        "Failed to notify for expiring secret, continuing scan"
                    );
                    stats.skipped += 1;
                }
            }
        }

        info!(
            scanned = stats.scanned,
            published = stats.published,
            skipped = stats.skipped,
            warning_days = self.warning_days,
            "Expiration scan complete"
        );
        Ok(stats)
    }

    /// Publishes the expiry notification for one secret. Returns `Ok(false)`
    /// when the secret is skipped without an error (no project, no members).
    async fn notify_expiring(&self, secret: &SecretRecord) -> Result<bool, ScanItemError> {
        let Some(expires_at) = secret.expires_at else {
            // list_expiring only returns dated secrets; a race with a
            // concurrent update can still surface one without a date.
            return Ok(false);
        };

        let Some(project) = self.projects.project(secret.project_id).await? else {
            warn!(
                secret_id = %secret.id,
                project_id = %secret.project_id,
                "Owning project not found, skipping secret"
            );
            return Ok(false);
        };

        if project.member_user_ids.is_empty() {
            warn!(
                secret_id = %secret.id,
                project_id = %project.id,
                "Project has no members to notify, skipping secret"
            );
            return Ok(false);
        }

        let mut builder = NotificationEvent::builder()
            .event_type(NotificationType::secret_expiring())
            .recipients(project.member_user_ids.iter().copied())
            .project_id(project.id)
            .secret_id(secret.id)
            .title("Secret expiring soon")
            .message(format!(
                "Secret '{}' in project '{}' expires on {}",
                secret.secret_key,
                project.name,
                expires_at.format("%Y-%m-%d")
            ))
            .metadata("secretKey", secret.secret_key.clone())
            .metadata("expiresAt", expires_at.to_rfc3339());
        if let Some(team_id) = project.team_id {
            builder = builder.team_id(team_id);
        }

        self.bus.publish(&builder.build()).await?;
        Ok(true)
    }
}
