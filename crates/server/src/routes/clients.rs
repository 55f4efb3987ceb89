//! Routes for the lightweight CRM.

use axum::{
    Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::get,
};
use db::models::{
    client::{ActivityType, Client, ClientActivity, CreateClient, UpdateClient},
    project::Project,
};
use deployment::Deployment;
use serde::{Deserialize, Serialize};
use services::services::crm;
use tracing::warn;
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, auth::AuthUser, error::ApiError};

const ACTIVITY_LIMIT: i64 = 100;

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateActivityRequest {
    pub activity_type: ActivityType,
    pub summary: String,
}

pub async fn list_clients(
    State(deployment): State<DeploymentImpl>,
    auth: AuthUser,
    Path(project_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<Client>>>, ApiError> {
    let pool = &deployment.db().pool;
    Project::find_for_owner(pool, project_id, auth.user_id)
        .await?
        .ok_or(ApiError::NotFound("Project"))?;

    let clients = Client::find_by_project_id(pool, project_id).await?;
    Ok(ResponseJson(ApiResponse::success(clients)))
}

pub async fn create_client(
    State(deployment): State<DeploymentImpl>,
    auth: AuthUser,
    Path(project_id): Path<Uuid>,
    axum::Json(payload): axum::Json<CreateClient>,
) -> Result<ResponseJson<ApiResponse<Client>>, ApiError> {
    if payload.name.trim().is_empty() {
        return Err(ApiError::BadRequest("client name is required".to_string()));
    }

    let pool = &deployment.db().pool;
    Project::find_for_owner(pool, project_id, auth.user_id)
        .await?
        .ok_or(ApiError::NotFound("Project"))?;

    let client = Client::create(pool, project_id, &payload).await?;

    if let Err(e) =
        ClientActivity::create(pool, client.id, ActivityType::Note, "Client created").await
    {
        warn!(client_id = %client.id, error = %e, "failed to record creation activity");
    }

    crm::rebuild_crm_snapshot_best_effort(pool, project_id).await;

    Ok(ResponseJson(ApiResponse::success(client)))
}

pub async fn get_client(
    State(deployment): State<DeploymentImpl>,
    auth: AuthUser,
    Path((project_id, client_id)): Path<(Uuid, Uuid)>,
) -> Result<ResponseJson<ApiResponse<Client>>, ApiError> {
    let pool = &deployment.db().pool;
    Project::find_for_owner(pool, project_id, auth.user_id)
        .await?
        .ok_or(ApiError::NotFound("Project"))?;

    let client = Client::find_for_project(pool, client_id, project_id)
        .await?
        .ok_or(ApiError::NotFound("Client"))?;

    Ok(ResponseJson(ApiResponse::success(client)))
}

pub async fn update_client(
    State(deployment): State<DeploymentImpl>,
    auth: AuthUser,
    Path((project_id, client_id)): Path<(Uuid, Uuid)>,
    axum::Json(payload): axum::Json<UpdateClient>,
) -> Result<ResponseJson<ApiResponse<Client>>, ApiError> {
    let pool = &deployment.db().pool;
    Project::find_for_owner(pool, project_id, auth.user_id)
        .await?
        .ok_or(ApiError::NotFound("Project"))?;

    let status_changed = payload.status.is_some();

    let client = Client::update(pool, client_id, project_id, &payload)
        .await?
        .ok_or(ApiError::NotFound("Client"))?;

    if status_changed {
        if let Err(e) = ClientActivity::create(
            pool,
            client.id,
            ActivityType::StatusChange,
            &format!("Status changed to {}", client.status),
        )
        .await
        {
            warn!(client_id = %client.id, error = %e, "failed to record status activity");
        }
    }

    crm::rebuild_crm_snapshot_best_effort(pool, project_id).await;

    Ok(ResponseJson(ApiResponse::success(client)))
}

pub async fn delete_client(
    State(deployment): State<DeploymentImpl>,
    auth: AuthUser,
    Path((project_id, client_id)): Path<(Uuid, Uuid)>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let pool = &deployment.db().pool;
    Project::find_for_owner(pool, project_id, auth.user_id)
        .await?
        .ok_or(ApiError::NotFound("Project"))?;

    let deleted = Client::delete(pool, client_id, project_id).await?;
    if deleted == 0 {
        return Err(ApiError::NotFound("Client"));
    }

    crm::rebuild_crm_snapshot_best_effort(pool, project_id).await;

    Ok(ResponseJson(ApiResponse::success(())))
}

pub async fn list_activities(
    State(deployment): State<DeploymentImpl>,
    auth: AuthUser,
    Path((project_id, client_id)): Path<(Uuid, Uuid)>,
) -> Result<ResponseJson<ApiResponse<Vec<ClientActivity>>>, ApiError> {
    let pool = &deployment.db().pool;
    Project::find_for_owner(pool, project_id, auth.user_id)
        .await?
        .ok_or(ApiError::NotFound("Project"))?;

    Client::find_for_project(pool, client_id, project_id)
        .await?
        .ok_or(ApiError::NotFound("Client"))?;

    let activities = ClientActivity::find_by_client_id(pool, client_id, ACTIVITY_LIMIT).await?;
    Ok(ResponseJson(ApiResponse::success(activities)))
}

pub async fn create_activity(
    State(deployment): State<DeploymentImpl>,
    auth: AuthUser,
    Path((project_id, client_id)): Path<(Uuid, Uuid)>,
    axum::Json(payload): axum::Json<CreateActivityRequest>,
) -> Result<ResponseJson<ApiResponse<ClientActivity>>, ApiError> {
    if payload.summary.trim().is_empty() {
        return Err(ApiError::BadRequest("activity summary is required".to_string()));
    }

    let pool = &deployment.db().pool;
    Project::find_for_owner(pool, project_id, auth.user_id)
        .await?
        .ok_or(ApiError::NotFound("Project"))?;

    Client::find_for_project(pool, client_id, project_id)
        .await?
        .ok_or(ApiError::NotFound("Client"))?;

    let activity =
        ClientActivity::create(pool, client_id, payload.activity_type, &payload.summary).await?;
    Ok(ResponseJson(ApiResponse::success(activity)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().nest(
        "/projects/{project_id}/clients",
        Router::new()
            .route("/", get(list_clients).post(create_client))
            .route(
                "/{client_id}",
                get(get_client).put(update_client).delete(delete_client),
            )
            .route(
                "/{client_id}/activities",
                get(list_activities).post(create_activity),
            ),
    )
}
