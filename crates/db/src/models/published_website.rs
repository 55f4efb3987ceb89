use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

/// Mirrors the hosting provider's deployment lifecycle; refreshed by
/// polling, never pushed.
#[derive(
    Debug, Clone, Type, Serialize, Deserialize, PartialEq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "publish_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PublishStatus {
    #[default]
    Deploying,
    Published,
    Failed,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct PublishedWebsite {
    pub id: Uuid,
    pub project_id: Uuid,
    pub subdomain: String,
    pub deployment_id: Option<String>,
    pub status: PublishStatus,
    pub url: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PublishedWebsite {
    /// Claim a subdomain. A UNIQUE violation on `subdomain` (or a second
    /// publication for the project) surfaces as a database error the caller
    /// maps to a conflict.
    pub async fn create(
        pool: &SqlitePool,
        project_id: Uuid,
        subdomain: &str,
    ) -> Result<Self, sqlx::Error> {
        let id = Uuid::new_v4();
        sqlx::query_as::<_, PublishedWebsite>(
            r#"INSERT INTO published_websites (id, project_id, subdomain)
               VALUES ($1, $2, $3)
               RETURNING *"#,
        )
        .bind(id)
        .bind(project_id)
        .bind(subdomain)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_project_id(
        pool: &SqlitePool,
        project_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, PublishedWebsite>(
            "SELECT * FROM published_websites WHERE project_id = $1",
        )
        .bind(project_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_subdomain(
        pool: &SqlitePool,
        subdomain: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, PublishedWebsite>(
            "SELECT * FROM published_websites WHERE subdomain = $1",
        )
        .bind(subdomain)
        .fetch_optional(pool)
        .await
    }

    pub async fn set_deployment(
        pool: &SqlitePool,
        id: Uuid,
        deployment_id: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"UPDATE published_websites
               SET deployment_id = $2, updated_at = datetime('now', 'subsec')
               WHERE id = $1"#,
        )
        .bind(id)
        .bind(deployment_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn update_status(
        pool: &SqlitePool,
        id: Uuid,
        status: PublishStatus,
        url: Option<&str>,
        error_message: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"UPDATE published_websites
               SET status = $2, url = $3, error_message = $4,
                   updated_at = datetime('now', 'subsec')
               WHERE id = $1"#,
        )
        .bind(id)
        .bind(status)
        .bind(url)
        .bind(error_message)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM published_websites WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
