//! Routes for the project chat transcript.

use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::get,
};
use db::models::{
    message::{CreateMessage, Message},
    project::Project,
};
use deployment::Deployment;
use serde::Deserialize;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, auth::AuthUser, error::ApiError};

const DEFAULT_LIMIT: i64 = 200;

#[derive(Debug, Deserialize)]
pub struct ListMessagesQuery {
    pub limit: Option<i64>,
}

pub async fn list_messages(
    State(deployment): State<DeploymentImpl>,
    auth: AuthUser,
    Path(project_id): Path<Uuid>,
    Query(query): Query<ListMessagesQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<Message>>>, ApiError> {
    let pool = &deployment.db().pool;
    Project::find_for_owner(pool, project_id, auth.user_id)
        .await?
        .ok_or(ApiError::NotFound("Project"))?;

    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, 1000);
    let messages = Message::find_by_project_id(pool, project_id, limit).await?;
    Ok(ResponseJson(ApiResponse::success(messages)))
}

pub async fn create_message(
    State(deployment): State<DeploymentImpl>,
    auth: AuthUser,
    Path(project_id): Path<Uuid>,
    axum::Json(payload): axum::Json<CreateMessage>,
) -> Result<ResponseJson<ApiResponse<Message>>, ApiError> {
    if payload.content.trim().is_empty() {
        return Err(ApiError::BadRequest("message content is required".to_string()));
    }

    let pool = &deployment.db().pool;
    Project::find_for_owner(pool, project_id, auth.user_id)
        .await?
        .ok_or(ApiError::NotFound("Project"))?;

    let message = Message::create(pool, project_id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(message)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().route(
        "/projects/{project_id}/messages",
        get(list_messages).post(create_message),
    )
}
