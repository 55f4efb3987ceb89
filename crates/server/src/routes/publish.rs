//! Routes for publishing the generated website and preview access.

use axum::{
    Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::{
    artifact::{Artifact, ArtifactType},
    preview_token::PreviewToken,
    project::Project,
    published_website::PublishedWebsite,
};
use deployment::Deployment;
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utils::{response::ApiResponse, tokens::generate_token};
use uuid::Uuid;

use crate::{DeploymentImpl, auth::AuthUser, error::ApiError};
use crate::routes::artifacts::ArtifactResponse;

const PREVIEW_TOKEN_TTL_HOURS: i64 = 72;

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct PublishRequest {
    pub subdomain: String,
}

pub async fn publish(
    State(deployment): State<DeploymentImpl>,
    auth: AuthUser,
    Path(project_id): Path<Uuid>,
    axum::Json(payload): axum::Json<PublishRequest>,
) -> Result<ResponseJson<ApiResponse<PublishedWebsite>>, ApiError> {
    let pool = &deployment.db().pool;
    Project::find_for_owner(pool, project_id, auth.user_id)
        .await?
        .ok_or(ApiError::NotFound("Project"))?;

    let record = deployment
        .publisher()
        .publish(project_id, &payload.subdomain)
        .await?;

    Ok(ResponseJson(ApiResponse::success(record)))
}

pub async fn get_publication(
    State(deployment): State<DeploymentImpl>,
    auth: AuthUser,
    Path(project_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<PublishedWebsite>>, ApiError> {
    let pool = &deployment.db().pool;
    Project::find_for_owner(pool, project_id, auth.user_id)
        .await?
        .ok_or(ApiError::NotFound("Project"))?;

    let record = deployment.publisher().refresh(project_id).await?;
    Ok(ResponseJson(ApiResponse::success(record)))
}

pub async fn unpublish(
    State(deployment): State<DeploymentImpl>,
    auth: AuthUser,
    Path(project_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let pool = &deployment.db().pool;
    Project::find_for_owner(pool, project_id, auth.user_id)
        .await?
        .ok_or(ApiError::NotFound("Project"))?;

    deployment.publisher().unpublish(project_id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub async fn create_preview_token(
    State(deployment): State<DeploymentImpl>,
    auth: AuthUser,
    Path(project_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<PreviewToken>>, ApiError> {
    let pool = &deployment.db().pool;
    Project::find_for_owner(pool, project_id, auth.user_id)
        .await?
        .ok_or(ApiError::NotFound("Project"))?;

    // The preview shows the website artifact, so require one.
    Artifact::find_by_project_and_type(pool, project_id, ArtifactType::Website)
        .await?
        .ok_or(ApiError::BadRequest(
            "Generate a website before creating a preview link".to_string(),
        ))?;

    let token =
        PreviewToken::create(pool, &generate_token(), project_id, PREVIEW_TOKEN_TTL_HOURS).await?;
    Ok(ResponseJson(ApiResponse::success(token)))
}

/// Unauthenticated: the opaque token is the capability.
pub async fn preview(
    State(deployment): State<DeploymentImpl>,
    Path(token): Path<String>,
) -> Result<ResponseJson<ApiResponse<ArtifactResponse>>, ApiError> {
    let pool = &deployment.db().pool;

    let preview_token = PreviewToken::find_valid(pool, &token)
        .await?
        .ok_or(ApiError::NotFound("Preview"))?;

    let artifact =
        Artifact::find_by_project_and_type(pool, preview_token.project_id, ArtifactType::Website)
            .await?
            .ok_or(ApiError::NotFound("Preview"))?;

    Ok(ResponseJson(ApiResponse::success(artifact.into())))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route(
            "/projects/{project_id}/publish",
            post(publish).get(get_publication).delete(unpublish),
        )
        .route(
            "/projects/{project_id}/preview-token",
            post(create_preview_token),
        )
        .route("/preview/{token}", get(preview))
}
