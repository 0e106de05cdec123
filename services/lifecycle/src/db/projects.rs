//! Postgres-backed project directory.
//!
//! Read-only view over the project CRUD service's tables; the scanner uses
//! it to resolve notification recipients.

use async_trait::async_trait;
use lockbox_id::{ProjectId, TeamId, UserId};
use sqlx::{postgres::PgPool, Row};

use super::DbError;
use crate::stores::{ProjectDirectory, ProjectRecord};

#[derive(Clone)]
pub struct PgProjectDirectory {
    pool: PgPool,
}

impl PgProjectDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProjectDirectory for PgProjectDirectory {
    async fn project(&self, id: ProjectId) -> Result<Option<ProjectRecord>, DbError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, team_id
            FROM projects
            WHERE id = $1
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::Query)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let name: String = row.try_get("name").map_err(DbError::Query)?;
        let team_id: Option<String> = row.try_get("team_id").map_err(DbError::Query)?;
        let team_id = team_id
            .map(|raw| TeamId::parse(&raw))
            .transpose()
            .map_err(|e| DbError::CorruptRow {
                table: "projects",
                message: e.to_string(),
            })?;

        let member_rows = sqlx::query(
            r#"
            SELECT user_id
            FROM project_members
            WHERE project_id = $1
            "#,
        )
        .bind(id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::Query)?;

        let mut member_user_ids = Vec::with_capacity(member_rows.len());
        for member in member_rows {
            let raw: String = member.try_get("user_id").map_err(DbError::Query)?;
            let user_id = UserId::parse(&raw).map_err(|e| DbError::CorruptRow {
                table: "project_members",
                message: e.to_string(),
            })?;
            member_user_ids.push(user_id);
        }

        Ok(Some(ProjectRecord {
            id,
            name,
            team_id,
            member_user_ids,
        }))
    }
}
