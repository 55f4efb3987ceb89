//! Routes for reading artifacts. Writes happen through tool runs only.

use std::str::FromStr;

use axum::{
    Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::get,
};
use chrono::{DateTime, Utc};
use db::models::{
    artifact::{Artifact, ArtifactType},
    project::Project,
};
use deployment::Deployment;
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, auth::AuthUser, error::ApiError};

/// Artifact with its payload parsed for the client.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ArtifactResponse {
    pub id: Uuid,
    pub project_id: Uuid,
    pub artifact_type: ArtifactType,
    pub data: serde_json::Value,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Artifact> for ArtifactResponse {
    fn from(artifact: Artifact) -> Self {
        let data = artifact.parsed_value().unwrap_or(serde_json::Value::Null);
        Self {
            id: artifact.id,
            project_id: artifact.project_id,
            artifact_type: artifact.artifact_type,
            data,
            version: artifact.version,
            created_at: artifact.created_at,
            updated_at: artifact.updated_at,
        }
    }
}

pub async fn list_artifacts(
    State(deployment): State<DeploymentImpl>,
    auth: AuthUser,
    Path(project_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<ArtifactResponse>>>, ApiError> {
    let pool = &deployment.db().pool;
    Project::find_for_owner(pool, project_id, auth.user_id)
        .await?
        .ok_or(ApiError::NotFound("Project"))?;

    let artifacts = Artifact::find_by_project_id(pool, project_id).await?;
    Ok(ResponseJson(ApiResponse::success(
        artifacts.into_iter().map(ArtifactResponse::from).collect(),
    )))
}

pub async fn get_artifact(
    State(deployment): State<DeploymentImpl>,
    auth: AuthUser,
    Path((project_id, artifact_type)): Path<(Uuid, String)>,
) -> Result<ResponseJson<ApiResponse<ArtifactResponse>>, ApiError> {
    let artifact_type = ArtifactType::from_str(&artifact_type)
        .map_err(|_| ApiError::BadRequest(format!("unknown artifact type '{artifact_type}'")))?;

    let pool = &deployment.db().pool;
    Project::find_for_owner(pool, project_id, auth.user_id)
        .await?
        .ok_or(ApiError::NotFound("Project"))?;

    let artifact = Artifact::find_by_project_and_type(pool, project_id, artifact_type)
        .await?
        .ok_or(ApiError::NotFound("Artifact"))?;

    Ok(ResponseJson(ApiResponse::success(artifact.into())))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().nest(
        "/projects/{project_id}/artifacts",
        Router::new()
            .route("/", get(list_artifacts))
            .route("/{artifact_type}", get(get_artifact)),
    )
}
