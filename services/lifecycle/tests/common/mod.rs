//! In-memory collaborator implementations shared by the integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lockbox_events::NotificationEvent;
use lockbox_id::{ProjectId, SecretId, UserId};
use lockbox_lifecycle::bus::{BusError, EventPublisher};
use lockbox_lifecycle::crypto::{EncryptionGateway, MasterKey};
use lockbox_lifecycle::db::DbError;
use lockbox_lifecycle::stores::{
    DeliveryLedger, LedgerOutcome, Mailer, MailerError, ProjectDirectory, ProjectRecord,
    SecretRecord, SecretStore,
};

pub fn test_gateway() -> EncryptionGateway {
    EncryptionGateway::new(MasterKey::from_bytes("test-key", [42u8; 32]))
}

/// A secret row encrypted under the test gateway.
pub fn make_secret(
    gateway: &EncryptionGateway,
    project_id: ProjectId,
    key: &str,
    strategy_type: &str,
    plaintext: &str,
    expires_at: Option<DateTime<Utc>>,
) -> SecretRecord {
    let id = SecretId::new();
    let encrypted_value = gateway
        .encrypt(plaintext, id.to_string().as_bytes())
        .unwrap();
    SecretRecord {
        id,
        project_id,
        secret_key: key.to_string(),
        encrypted_value,
        strategy_type: strategy_type.to_string(),
        expires_at,
        version: 1,
    }
}

#[derive(Default)]
pub struct InMemorySecretStore {
    rows: Mutex<HashMap<SecretId, SecretRecord>>,
    /// Errors injected into `update_value`, consumed one per call.
    pub failing_updates: AtomicU32,
    /// Rendezvous awaited inside `fetch`, for racing two rotations.
    pub fetch_barrier: Mutex<Option<Arc<tokio::sync::Barrier>>>,
    /// Artificial latency for `list_expiring`, for overlap-guard tests.
    pub list_delay: Mutex<Option<Duration>>,
}

impl InMemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: SecretRecord) {
        self.rows.lock().unwrap().insert(record.id, record);
    }

    pub fn get(&self, id: SecretId) -> Option<SecretRecord> {
        self.rows.lock().unwrap().get(&id).cloned()
    }
}

#[async_trait]
impl SecretStore for InMemorySecretStore {
    async fn fetch(&self, id: SecretId) -> Result<Option<SecretRecord>, DbError> {
        let row = self.rows.lock().unwrap().get(&id).cloned();
        let barrier = self.fetch_barrier.lock().unwrap().clone();
        if let Some(barrier) = barrier {
            barrier.wait().await;
        }
        Ok(row)
    }

    async fn update_value(
        &self,
        id: SecretId,
        encrypted_value: &str,
        expected_version: i64,
    ) -> Result<bool, DbError> {
        if self
            .failing_updates
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(DbError::Unavailable("injected update failure".to_string()));
        }

        let mut rows = self.rows.lock().unwrap();
        match rows.get_mut(&id) {
            Some(row) if row.version == expected_version => {
                row.encrypted_value = encrypted_value.to_string();
                row.version += 1;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Ok(false),
        }
    }

    async fn list_expiring(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<SecretRecord>, DbError> {
        let delay = *self.list_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let rows = self.rows.lock().unwrap();
        let mut hits: Vec<SecretRecord> = rows
            .values()
            .filter(|row| {
                row.expires_at
                    .map(|at| at >= from && at <= until)
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        hits.sort_by_key(|row| row.expires_at);
        Ok(hits)
    }
}

#[derive(Default)]
pub struct InMemoryProjects {
    rows: Mutex<HashMap<ProjectId, ProjectRecord>>,
}

impl InMemoryProjects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: ProjectRecord) {
        self.rows.lock().unwrap().insert(record.id, record);
    }

    pub fn with_project(members: usize) -> (Self, ProjectRecord) {
        let record = ProjectRecord {
            id: ProjectId::new(),
            name: "payments".to_string(),
            team_id: None,
            member_user_ids: (0..members).map(|_| UserId::new()).collect(),
        };
        let projects = Self::new();
        projects.insert(record.clone());
        (projects, record)
    }
}

#[async_trait]
impl ProjectDirectory for InMemoryProjects {
    async fn project(&self, id: ProjectId) -> Result<Option<ProjectRecord>, DbError> {
        Ok(self.rows.lock().unwrap().get(&id).cloned())
    }
}

/// An inbox row captured by the in-memory ledger.
#[derive(Debug, Clone)]
pub struct InboxRow {
    pub recipient: UserId,
    pub event_type: String,
    pub title: String,
}

#[derive(Debug, Clone)]
pub struct DeadLetterRow {
    pub idempotency_key: String,
    pub reason: String,
    pub attempts: u32,
}

#[derive(Default)]
pub struct InMemoryLedger {
    handled: Mutex<HashSet<String>>,
    pub inbox: Mutex<Vec<InboxRow>>,
    pub dead_letters: Mutex<Vec<DeadLetterRow>>,
    /// Errors injected into `apply_once`, consumed one per call.
    pub failing_applies: AtomicU32,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inbox_len(&self) -> usize {
        self.inbox.lock().unwrap().len()
    }

    pub fn dead_letter_len(&self) -> usize {
        self.dead_letters.lock().unwrap().len()
    }
}

#[async_trait]
impl DeliveryLedger for InMemoryLedger {
    async fn apply_once(
        &self,
        idempotency_key: &str,
        event: &NotificationEvent,
    ) -> Result<LedgerOutcome, DbError> {
        if self
            .failing_applies
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(DbError::Unavailable("injected apply failure".to_string()));
        }

        let mut handled = self.handled.lock().unwrap();
        if !handled.insert(idempotency_key.to_string()) {
            return Ok(LedgerOutcome::AlreadyHandled);
        }
        let mut inbox = self.inbox.lock().unwrap();
        for recipient in &event.recipient_user_ids {
            inbox.push(InboxRow {
                recipient: *recipient,
                event_type: event.event_type.as_str().to_string(),
                title: event.title.clone(),
            });
        }
        Ok(LedgerOutcome::Applied)
    }

    async fn dead_letter(
        &self,
        idempotency_key: &str,
        _payload: &[u8],
        reason: &str,
        attempts: u32,
    ) -> Result<(), DbError> {
        self.dead_letters.lock().unwrap().push(DeadLetterRow {
            idempotency_key: idempotency_key.to_string(),
            reason: reason.to_string(),
            attempts,
        });
        Ok(())
    }

    async fn sweep_expired(&self, _older_than_days: i32) -> Result<u64, DbError> {
        Ok(0)
    }
}

#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<(UserId, String)>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent_len(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, recipient: UserId, title: &str, _body: &str) -> Result<(), MailerError> {
        self.sent
            .lock()
            .unwrap()
            .push((recipient, title.to_string()));
        Ok(())
    }
}

/// Publisher capturing events, with per-secret failure injection.
#[derive(Default)]
pub struct RecordingPublisher {
    pub events: Mutex<Vec<NotificationEvent>>,
    pub fail_for: Mutex<HashSet<SecretId>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published_len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn fail_for_secret(&self, id: SecretId) {
        self.fail_for.lock().unwrap().insert(id);
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: &NotificationEvent) -> Result<(), BusError> {
        if let Some(secret_id) = event.secret_id {
            if self.fail_for.lock().unwrap().contains(&secret_id) {
                return Err(BusError::Unavailable("injected publish failure".to_string()));
            }
        }
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}
