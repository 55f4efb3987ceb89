use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

#[derive(
    Debug, Clone, Type, Serialize, Deserialize, PartialEq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "lead_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LeadStatus {
    #[default]
    New,
    Contacted,
    Responded,
    Converted,
    Rejected,
}

/// A scored outreach target found by the lead generation tool. `place_id`
/// is the source identity; re-running generation upserts on it.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Lead {
    pub id: Uuid,
    pub project_id: Uuid,
    pub place_id: String,
    pub name: String,
    pub category: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub rating: Option<f64>,
    pub review_count: i64,
    pub score: i64,
    pub status: LeadStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateLead {
    pub place_id: String,
    pub name: String,
    pub category: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub rating: Option<f64>,
    pub review_count: i64,
    pub score: i64,
}

#[derive(Debug, Serialize, Deserialize, TS)]
pub struct UpdateLead {
    pub status: Option<LeadStatus>,
    pub notes: Option<String>,
}

impl Lead {
    /// Insert or refresh a lead by source identity. Search-sourced fields
    /// are refreshed; user-owned fields (status, notes) are kept.
    pub async fn upsert(
        pool: &SqlitePool,
        project_id: Uuid,
        data: &CreateLead,
    ) -> Result<Self, sqlx::Error> {
        let id = Uuid::new_v4();
        sqlx::query_as::<_, Lead>(
            r#"INSERT INTO leads (id, project_id, place_id, name, category, address, phone, website, rating, review_count, score)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
               ON CONFLICT(project_id, place_id) DO UPDATE SET
                   name = excluded.name,
                   category = excluded.category,
                   address = excluded.address,
                   phone = excluded.phone,
                   website = excluded.website,
                   rating = excluded.rating,
                   review_count = excluded.review_count,
                   score = excluded.score,
                   updated_at = datetime('now', 'subsec')
               RETURNING *"#,
        )
        .bind(id)
        .bind(project_id)
        .bind(&data.place_id)
        .bind(&data.name)
        .bind(&data.category)
        .bind(&data.address)
        .bind(&data.phone)
        .bind(&data.website)
        .bind(data.rating)
        .bind(data.review_count)
        .bind(data.score)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Lead>("SELECT * FROM leads WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_for_project(
        pool: &SqlitePool,
        id: Uuid,
        project_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Lead>("SELECT * FROM leads WHERE id = $1 AND project_id = $2")
            .bind(id)
            .bind(project_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_project_id(
        pool: &SqlitePool,
        project_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Lead>(
            r#"SELECT * FROM leads
               WHERE project_id = $1
               ORDER BY score DESC, created_at ASC"#,
        )
        .bind(project_id)
        .fetch_all(pool)
        .await
    }

    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        project_id: Uuid,
        data: &UpdateLead,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Lead>(
            r#"UPDATE leads
               SET status = COALESCE($3, status),
                   notes = COALESCE($4, notes),
                   updated_at = datetime('now', 'subsec')
               WHERE id = $1 AND project_id = $2
               RETURNING *"#,
        )
        .bind(id)
        .bind(project_id)
        .bind(&data.status)
        .bind(&data.notes)
        .fetch_optional(pool)
        .await
    }

    pub async fn update_status(
        pool: &SqlitePool,
        id: Uuid,
        status: LeadStatus,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE leads SET status = $2, updated_at = datetime('now', 'subsec') WHERE id = $1",
        )
        .bind(id)
        .bind(status)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid, project_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM leads WHERE id = $1 AND project_id = $2")
            .bind(id)
            .bind(project_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
