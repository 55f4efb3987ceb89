//! Routes for project CRUD.

use axum::{
    Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::get,
};
use db::models::project::{CreateProject, Project, UpdateProject};
use deployment::Deployment;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, auth::AuthUser, error::ApiError};

pub async fn create_project(
    State(deployment): State<DeploymentImpl>,
    auth: AuthUser,
    axum::Json(payload): axum::Json<CreateProject>,
) -> Result<ResponseJson<ApiResponse<Project>>, ApiError> {
    let project = Project::create(
        &deployment.db().pool,
        auth.user_id,
        &payload,
        Uuid::new_v4(),
    )
    .await?;

    Ok(ResponseJson(ApiResponse::success(project)))
}

pub async fn list_projects(
    State(deployment): State<DeploymentImpl>,
    auth: AuthUser,
) -> Result<ResponseJson<ApiResponse<Vec<Project>>>, ApiError> {
    let projects = Project::find_all_for_owner(&deployment.db().pool, auth.user_id).await?;
    Ok(ResponseJson(ApiResponse::success(projects)))
}

pub async fn get_project(
    State(deployment): State<DeploymentImpl>,
    auth: AuthUser,
    Path(project_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Project>>, ApiError> {
    let project = Project::find_for_owner(&deployment.db().pool, project_id, auth.user_id)
        .await?
        .ok_or(ApiError::NotFound("Project"))?;
    Ok(ResponseJson(ApiResponse::success(project)))
}

pub async fn update_project(
    State(deployment): State<DeploymentImpl>,
    auth: AuthUser,
    Path(project_id): Path<Uuid>,
    axum::Json(payload): axum::Json<UpdateProject>,
) -> Result<ResponseJson<ApiResponse<Project>>, ApiError> {
    let project = Project::update(&deployment.db().pool, project_id, auth.user_id, &payload)
        .await?
        .ok_or(ApiError::NotFound("Project"))?;
    Ok(ResponseJson(ApiResponse::success(project)))
}

pub async fn delete_project(
    State(deployment): State<DeploymentImpl>,
    auth: AuthUser,
    Path(project_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let deleted = Project::delete(&deployment.db().pool, project_id, auth.user_id).await?;
    if deleted == 0 {
        return Err(ApiError::NotFound("Project"));
    }
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route("/projects", get(list_projects).post(create_project))
        .route(
            "/projects/{project_id}",
            get(get_project)
                .put(update_project)
                .delete(delete_project),
        )
}
