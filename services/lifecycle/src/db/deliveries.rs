//! Notification delivery ledger.
//!
//! The ledger records which inbound events have already produced their side
//! effects. The record and the effects (inbox rows) are written in a single
//! transaction; the insert races through `ON CONFLICT DO NOTHING`, so a
//! duplicate delivery observes zero affected rows and applies nothing.
//!
//! Ledger rows outlive the event that created them and are swept only after
//! a retention window, so late redeliveries stay deduplicated.

use async_trait::async_trait;
use lockbox_events::NotificationEvent;
use sqlx::postgres::PgPool;

use super::DbError;
use crate::stores::{DeliveryLedger, LedgerOutcome};

#[derive(Clone)]
pub struct PgDeliveryLedger {
    pool: PgPool,
}

impl PgDeliveryLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeliveryLedger for PgDeliveryLedger {
    async fn apply_once(
        &self,
        idempotency_key: &str,
        event: &NotificationEvent,
    ) -> Result<LedgerOutcome, DbError> {
        let mut tx = self.pool.begin().await.map_err(DbError::Query)?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO notification_deliveries (idempotency_key, event_type)
            VALUES ($1, $2)
            ON CONFLICT (idempotency_key) DO NOTHING
            "#,
        )
        .bind(idempotency_key)
        .bind(event.event_type.as_str())
        .execute(&mut *tx)
        .await
        .map_err(DbError::Query)?;

        if inserted.rows_affected() == 0 {
            tx.rollback().await.map_err(DbError::Query)?;
            return Ok(LedgerOutcome::AlreadyHandled);
        }

        for recipient in &event.recipient_user_ids {
            sqlx::query(
                r#"
                INSERT INTO inbox_notifications
                    (recipient_user_id, event_type, title, message, project_id, secret_id, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(recipient.to_string())
            .bind(event.event_type.as_str())
            .bind(&event.title)
            .bind(&event.message)
            .bind(event.project_id.map(|id| id.to_string()))
            .bind(event.secret_id.map(|id| id.to_string()))
            .bind(event.created_at)
            .execute(&mut *tx)
            .await
            .map_err(DbError::Query)?;
        }

        tx.commit().await.map_err(DbError::Query)?;
        Ok(LedgerOutcome::Applied)
    }

    async fn dead_letter(
        &self,
        idempotency_key: &str,
        payload: &[u8],
        reason: &str,
        attempts: u32,
    ) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO dead_letters (idempotency_key, payload, reason, attempts)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(idempotency_key)
        .bind(payload)
        .bind(reason)
        .bind(attempts as i32)
        .execute(&self.pool)
        .await
        .map_err(DbError::Query)?;

        Ok(())
    }

    async fn sweep_expired(&self, older_than_days: i32) -> Result<u64, DbError> {
        let result = sqlx::query(
            r#"
            DELETE FROM notification_deliveries
            WHERE handled_at < now() - make_interval(days => $1)
            "#,
        )
        .bind(older_than_days)
        .execute(&self.pool)
        .await
        .map_err(DbError::Query)?;

        Ok(result.rows_affected())
    }
}
