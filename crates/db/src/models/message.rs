use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, Type, Serialize, Deserialize, PartialEq, TS, EnumString, Display)]
#[sqlx(type_name = "message_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// One entry in a project's chat transcript. `tool` records which tool an
/// assistant turn invoked, if any.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Message {
    pub id: Uuid,
    pub project_id: Uuid,
    pub role: MessageRole,
    pub content: String,
    pub tool: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateMessage {
    pub role: MessageRole,
    pub content: String,
    pub tool: Option<String>,
}

impl Message {
    pub async fn create(
        pool: &SqlitePool,
        project_id: Uuid,
        data: &CreateMessage,
    ) -> Result<Self, sqlx::Error> {
        let id = Uuid::new_v4();
        sqlx::query_as::<_, Message>(
            r#"INSERT INTO messages (id, project_id, role, content, tool)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING *"#,
        )
        .bind(id)
        .bind(project_id)
        .bind(&data.role)
        .bind(&data.content)
        .bind(&data.tool)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_project_id(
        pool: &SqlitePool,
        project_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Message>(
            r#"SELECT * FROM messages
               WHERE project_id = $1
               ORDER BY created_at ASC
               LIMIT $2"#,
        )
        .bind(project_id)
        .bind(limit)
        .fetch_all(pool)
        .await
    }
}
