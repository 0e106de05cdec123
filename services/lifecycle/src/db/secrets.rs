//! Postgres-backed secret store.
//!
//! Rotation persists through `update_value`, which is guarded by an
//! optimistic version check: the UPDATE only matches when the stored version
//! equals the version the rotation read. A lost race affects zero rows and
//! surfaces as a conflict, never a silent overwrite.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lockbox_id::{ProjectId, SecretId};
use sqlx::{postgres::PgPool, postgres::PgRow, Row};

use super::DbError;
use crate::stores::{SecretRecord, SecretStore};

impl<'r> sqlx::FromRow<'r, PgRow> for SecretRecord {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let raw_id: String = row.try_get("id")?;
        let raw_project_id: String = row.try_get("project_id")?;
        Ok(Self {
            id: SecretId::parse(&raw_id).map_err(|e| sqlx::Error::ColumnDecode {
                index: "id".to_string(),
                source: Box::new(e),
            })?,
            project_id: ProjectId::parse(&raw_project_id).map_err(|e| {
                sqlx::Error::ColumnDecode {
                    index: "project_id".to_string(),
                    source: Box::new(e),
                }
            })?,
            secret_key: row.try_get("secret_key")?,
            encrypted_value: row.try_get("encrypted_value")?,
            strategy_type: row.try_get("strategy_type")?,
            expires_at: row.try_get("expires_at")?,
            version: row.try_get("version")?,
        })
    }
}

/// Store for reading and mutating secret rows.
#[derive(Clone)]
pub struct PgSecretStore {
    pool: PgPool,
}

impl PgSecretStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SecretStore for PgSecretStore {
    async fn fetch(&self, id: SecretId) -> Result<Option<SecretRecord>, DbError> {
        sqlx::query_as::<_, SecretRecord>(
            r#"
            SELECT id, project_id, secret_key, encrypted_value, strategy_type, expires_at, version
            FROM secrets
            WHERE id = $1
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::Query)
    }

    async fn update_value(
        &self,
        id: SecretId,
        encrypted_value: &str,
        expected_version: i64,
    ) -> Result<bool, DbError> {
        let result = sqlx::query(
            r#"
            UPDATE secrets
            SET encrypted_value = $2,
                version = version + 1,
                updated_at = now()
            WHERE id = $1
              AND version = $3
            "#,
        )
        .bind(id.to_string())
        .bind(encrypted_value)
        .bind(expected_version)
        .execute(&self.pool)
        .await
        .map_err(DbError::Query)?;

        Ok(result.rows_affected() == 1)
    }

    async fn list_expiring(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<SecretRecord>, DbError> {
        sqlx::query_as::<_, SecretRecord>(
            r#"
            SELECT id, project_id, secret_key, encrypted_value, strategy_type, expires_at, version
            FROM secrets
            WHERE expires_at IS NOT NULL
              AND expires_at >= $1
              AND expires_at <= $2
            ORDER BY expires_at
            "#,
        )
        .bind(from)
        .bind(until)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::Query)
    }
}
