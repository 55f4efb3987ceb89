use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

#[derive(
    Debug, Clone, Type, Serialize, Deserialize, PartialEq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "project_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProjectStatus {
    #[default]
    Active,
    Archived,
}

/// Which product surface a project was created from
#[derive(Debug, Clone, Type, Serialize, Deserialize, PartialEq, TS, EnumString, Display)]
#[sqlx(type_name = "project_mode", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProjectMode {
    Agency,
    Commerce,
    Playground,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Project {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub status: ProjectStatus,
    pub mode: ProjectMode,
    pub agency_type: Option<String>,
    pub idea: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateProject {
    pub name: Option<String>,
    pub mode: ProjectMode,
    pub agency_type: Option<String>,
    pub idea: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, TS)]
pub struct UpdateProject {
    pub name: Option<String>,
    pub status: Option<ProjectStatus>,
    pub idea: Option<String>,
}

/// Display names for known agency verticals.
fn agency_name(agency_type: &str) -> &'static str {
    match agency_type {
        "web-design" => "Web Design Agency",
        "marketing" => "Marketing Agency",
        "seo" => "SEO Agency",
        "social-media" => "Social Media Agency",
        "branding" => "Branding Agency",
        "content" => "Content Agency",
        _ => "Agency",
    }
}

impl Project {
    /// Resolve the project name at creation time. An explicit name always
    /// wins; otherwise it is derived from the mode and agency vertical.
    pub fn resolve_name(data: &CreateProject) -> String {
        if let Some(name) = data.name.as_ref().filter(|n| !n.trim().is_empty()) {
            return name.trim().to_string();
        }
        match data.mode {
            ProjectMode::Agency => data
                .agency_type
                .as_deref()
                .map(agency_name)
                .unwrap_or("Agency")
                .to_string(),
            ProjectMode::Commerce => "Commerce Project".to_string(),
            ProjectMode::Playground => "Playground".to_string(),
        }
    }

    pub async fn create(
        pool: &SqlitePool,
        owner_id: Uuid,
        data: &CreateProject,
        id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        let name = Self::resolve_name(data);
        sqlx::query_as::<_, Project>(
            r#"INSERT INTO projects (id, owner_id, name, status, mode, agency_type, idea)
               VALUES ($1, $2, $3, 'active', $4, $5, $6)
               RETURNING *"#,
        )
        .bind(id)
        .bind(owner_id)
        .bind(name)
        .bind(&data.mode)
        .bind(&data.agency_type)
        .bind(&data.idea)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_for_owner(
        pool: &SqlitePool,
        id: Uuid,
        owner_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_all_for_owner(
        pool: &SqlitePool,
        owner_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Project>(
            "SELECT * FROM projects WHERE owner_id = $1 ORDER BY created_at DESC",
        )
        .bind(owner_id)
        .fetch_all(pool)
        .await
    }

    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        owner_id: Uuid,
        data: &UpdateProject,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Project>(
            r#"UPDATE projects
               SET name = COALESCE($3, name),
                   status = COALESCE($4, status),
                   idea = COALESCE($5, idea),
                   updated_at = datetime('now', 'subsec')
               WHERE id = $1 AND owner_id = $2
               RETURNING *"#,
        )
        .bind(id)
        .bind(owner_id)
        .bind(&data.name)
        .bind(&data.status)
        .bind(&data.idea)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid, owner_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(mode: ProjectMode, name: Option<&str>, agency_type: Option<&str>) -> CreateProject {
        CreateProject {
            name: name.map(String::from),
            mode,
            agency_type: agency_type.map(String::from),
            idea: None,
        }
    }

    #[test]
    fn test_explicit_name_wins() {
        let data = create(ProjectMode::Agency, Some("Acme"), Some("web-design"));
        assert_eq!(Project::resolve_name(&data), "Acme");
    }

    #[test]
    fn test_agency_name_derived_from_vertical() {
        let data = create(ProjectMode::Agency, None, Some("web-design"));
        assert_eq!(Project::resolve_name(&data), "Web Design Agency");
        let data = create(ProjectMode::Agency, None, Some("seo"));
        assert_eq!(Project::resolve_name(&data), "SEO Agency");
    }

    #[test]
    fn test_unknown_vertical_falls_back() {
        let data = create(ProjectMode::Agency, None, Some("time-travel"));
        assert_eq!(Project::resolve_name(&data), "Agency");
    }

    #[test]
    fn test_blank_name_is_ignored() {
        let data = create(ProjectMode::Commerce, Some("   "), None);
        assert_eq!(Project::resolve_name(&data), "Commerce Project");
    }
}
