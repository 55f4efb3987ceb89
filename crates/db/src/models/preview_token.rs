use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

/// Opaque token granting unauthenticated read access to a project's
/// generated website preview.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct PreviewToken {
    pub token: String,
    pub project_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl PreviewToken {
    pub async fn create(
        pool: &SqlitePool,
        token: &str,
        project_id: Uuid,
        ttl_hours: i64,
    ) -> Result<Self, sqlx::Error> {
        let expires_at = Utc::now() + Duration::hours(ttl_hours);
        sqlx::query_as::<_, PreviewToken>(
            r#"INSERT INTO preview_tokens (token, project_id, expires_at)
               VALUES ($1, $2, $3)
               RETURNING *"#,
        )
        .bind(token)
        .bind(project_id)
        .bind(expires_at)
        .fetch_one(pool)
        .await
    }

    /// Look up a token that has not expired.
    pub async fn find_valid(pool: &SqlitePool, token: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, PreviewToken>(
            r#"SELECT * FROM preview_tokens
               WHERE token = $1 AND datetime(expires_at) > datetime('now')"#,
        )
        .bind(token)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete_for_project(
        pool: &SqlitePool,
        project_id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM preview_tokens WHERE project_id = $1")
            .bind(project_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
