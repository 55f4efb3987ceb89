use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

/// One artifact row exists per (project, type); tool completions overwrite
/// it wholesale, last write wins.
#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, Hash, TS, EnumString, Display,
)]
#[sqlx(type_name = "artifact_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ArtifactType {
    MarketResearch,
    BrandIdentity,
    Website,
    Leads,
    Ads,
    Outreach,
    CrmSnapshot,
    LeadWebsite,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Artifact {
    pub id: Uuid,
    pub project_id: Uuid,
    pub artifact_type: ArtifactType,
    pub data: String, // JSON payload
    pub previous_data: Option<String>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Artifact {
    /// Parse the stored payload.
    pub fn parsed<T: DeserializeOwned>(&self) -> Option<T> {
        serde_json::from_str(&self.data).ok()
    }

    pub fn parsed_value(&self) -> Option<serde_json::Value> {
        self.parsed()
    }

    /// Write the payload for (project, type). The prior payload is moved
    /// into `previous_data` and `version` is bumped in the same statement.
    pub async fn upsert(
        pool: &SqlitePool,
        project_id: Uuid,
        artifact_type: ArtifactType,
        data: &serde_json::Value,
    ) -> Result<Self, sqlx::Error> {
        let id = Uuid::new_v4();
        let json = data.to_string();
        sqlx::query_as::<_, Artifact>(
            r#"INSERT INTO artifacts (id, project_id, artifact_type, data)
               VALUES ($1, $2, $3, $4)
               ON CONFLICT(project_id, artifact_type) DO UPDATE SET
                   previous_data = artifacts.data,
                   data = excluded.data,
                   version = artifacts.version + 1,
                   updated_at = datetime('now', 'subsec')
               RETURNING *"#,
        )
        .bind(id)
        .bind(project_id)
        .bind(artifact_type)
        .bind(json)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_project_and_type(
        pool: &SqlitePool,
        project_id: Uuid,
        artifact_type: ArtifactType,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Artifact>(
            "SELECT * FROM artifacts WHERE project_id = $1 AND artifact_type = $2",
        )
        .bind(project_id)
        .bind(artifact_type)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_project_id(
        pool: &SqlitePool,
        project_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Artifact>(
            "SELECT * FROM artifacts WHERE project_id = $1 ORDER BY updated_at DESC",
        )
        .bind(project_id)
        .fetch_all(pool)
        .await
    }

    pub async fn delete_by_type(
        pool: &SqlitePool,
        project_id: Uuid,
        artifact_type: ArtifactType,
    ) -> Result<u64, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM artifacts WHERE project_id = $1 AND artifact_type = $2")
                .bind(project_id)
                .bind(artifact_type)
                .execute(pool)
                .await?;
        Ok(result.rows_affected())
    }
}
