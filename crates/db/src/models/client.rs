use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

#[derive(
    Debug, Clone, Type, Serialize, Deserialize, PartialEq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "client_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ClientStatus {
    #[default]
    Lead,
    Active,
    Past,
}

#[derive(Debug, Clone, Type, Serialize, Deserialize, PartialEq, TS, EnumString, Display)]
#[sqlx(type_name = "activity_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ActivityType {
    Note,
    Call,
    Email,
    Meeting,
    StatusChange,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Client {
    pub id: Uuid,
    pub project_id: Uuid,
    pub lead_id: Option<Uuid>,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub status: ClientStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateClient {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub notes: Option<String>,
    pub lead_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize, TS)]
pub struct UpdateClient {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub status: Option<ClientStatus>,
    pub notes: Option<String>,
}

/// Append-only activity log row for a client.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct ClientActivity {
    pub id: Uuid,
    pub client_id: Uuid,
    pub activity_type: ActivityType,
    pub summary: String,
    pub created_at: DateTime<Utc>,
}

impl Client {
    pub async fn create(
        pool: &SqlitePool,
        project_id: Uuid,
        data: &CreateClient,
    ) -> Result<Self, sqlx::Error> {
        let id = Uuid::new_v4();
        sqlx::query_as::<_, Client>(
            r#"INSERT INTO clients (id, project_id, lead_id, name, email, phone, company, notes)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
               RETURNING *"#,
        )
        .bind(id)
        .bind(project_id)
        .bind(data.lead_id)
        .bind(&data.name)
        .bind(&data.email)
        .bind(&data.phone)
        .bind(&data.company)
        .bind(&data.notes)
        .fetch_one(pool)
        .await
    }

    pub async fn find_for_project(
        pool: &SqlitePool,
        id: Uuid,
        project_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Client>("SELECT * FROM clients WHERE id = $1 AND project_id = $2")
            .bind(id)
            .bind(project_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_project_id(
        pool: &SqlitePool,
        project_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Client>(
            "SELECT * FROM clients WHERE project_id = $1 ORDER BY created_at DESC",
        )
        .bind(project_id)
        .fetch_all(pool)
        .await
    }

    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        project_id: Uuid,
        data: &UpdateClient,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Client>(
            r#"UPDATE clients
               SET name = COALESCE($3, name),
                   email = COALESCE($4, email),
                   phone = COALESCE($5, phone),
                   company = COALESCE($6, company),
                   status = COALESCE($7, status),
                   notes = COALESCE($8, notes),
                   updated_at = datetime('now', 'subsec')
               WHERE id = $1 AND project_id = $2
               RETURNING *"#,
        )
        .bind(id)
        .bind(project_id)
        .bind(&data.name)
        .bind(&data.email)
        .bind(&data.phone)
        .bind(&data.company)
        .bind(&data.status)
        .bind(&data.notes)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid, project_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM clients WHERE id = $1 AND project_id = $2")
            .bind(id)
            .bind(project_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

impl ClientActivity {
    pub async fn create(
        pool: &SqlitePool,
        client_id: Uuid,
        activity_type: ActivityType,
        summary: &str,
    ) -> Result<Self, sqlx::Error> {
        let id = Uuid::new_v4();
        sqlx::query_as::<_, ClientActivity>(
            r#"INSERT INTO client_activities (id, client_id, activity_type, summary)
               VALUES ($1, $2, $3, $4)
               RETURNING *"#,
        )
        .bind(id)
        .bind(client_id)
        .bind(activity_type)
        .bind(summary)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_client_id(
        pool: &SqlitePool,
        client_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, ClientActivity>(
            r#"SELECT * FROM client_activities
               WHERE client_id = $1
               ORDER BY created_at DESC
               LIMIT $2"#,
        )
        .bind(client_id)
        .bind(limit)
        .fetch_all(pool)
        .await
    }
}
