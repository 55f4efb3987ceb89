//! Routes for lead management. Lead creation happens through the lead
//! generation tool; these routes manage what it found.

use axum::{
    Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{get, post, put},
};
use db::models::{
    client::{ActivityType, Client, ClientActivity, CreateClient},
    lead::{Lead, LeadStatus, UpdateLead},
    project::Project,
};
use deployment::Deployment;
use services::services::{crm, lead_finder};
use tracing::warn;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, auth::AuthUser, error::ApiError};

pub async fn list_leads(
    State(deployment): State<DeploymentImpl>,
    auth: AuthUser,
    Path(project_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<Lead>>>, ApiError> {
    let pool = &deployment.db().pool;
    Project::find_for_owner(pool, project_id, auth.user_id)
        .await?
        .ok_or(ApiError::NotFound("Project"))?;

    let leads = Lead::find_by_project_id(pool, project_id).await?;
    Ok(ResponseJson(ApiResponse::success(leads)))
}

pub async fn update_lead(
    State(deployment): State<DeploymentImpl>,
    auth: AuthUser,
    Path((project_id, lead_id)): Path<(Uuid, Uuid)>,
    axum::Json(payload): axum::Json<UpdateLead>,
) -> Result<ResponseJson<ApiResponse<Lead>>, ApiError> {
    let pool = &deployment.db().pool;
    Project::find_for_owner(pool, project_id, auth.user_id)
        .await?
        .ok_or(ApiError::NotFound("Project"))?;

    let lead = Lead::update(pool, lead_id, project_id, &payload)
        .await?
        .ok_or(ApiError::NotFound("Lead"))?;

    // The leads artifact is a cached projection of the table; rebuild it
    // best-effort after the canonical write.
    if let Err(e) = lead_finder::rebuild_leads_artifact(pool, project_id).await {
        warn!(project_id = %project_id, error = %e, "failed to rebuild leads artifact");
    }

    Ok(ResponseJson(ApiResponse::success(lead)))
}

/// Delete a lead and clean up artifact references. Idempotent: deleting a
/// lead that is already gone succeeds without touching anything.
pub async fn delete_lead(
    State(deployment): State<DeploymentImpl>,
    auth: AuthUser,
    Path((project_id, lead_id)): Path<(Uuid, Uuid)>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let pool = &deployment.db().pool;
    Project::find_for_owner(pool, project_id, auth.user_id)
        .await?
        .ok_or(ApiError::NotFound("Project"))?;

    let deleted = Lead::delete(pool, lead_id, project_id).await?;
    if deleted > 0 {
        lead_finder::cleanup_lead_artifacts(pool, project_id, lead_id).await;
    }

    Ok(ResponseJson(ApiResponse::success(())))
}

/// Promote a lead to a CRM client and mark it converted.
pub async fn convert_lead(
    State(deployment): State<DeploymentImpl>,
    auth: AuthUser,
    Path((project_id, lead_id)): Path<(Uuid, Uuid)>,
) -> Result<ResponseJson<ApiResponse<Client>>, ApiError> {
    let pool = &deployment.db().pool;
    Project::find_for_owner(pool, project_id, auth.user_id)
        .await?
        .ok_or(ApiError::NotFound("Project"))?;

    let lead = Lead::find_for_project(pool, lead_id, project_id)
        .await?
        .ok_or(ApiError::NotFound("Lead"))?;

    let client = Client::create(
        pool,
        project_id,
        &CreateClient {
            name: lead.name.clone(),
            email: None,
            phone: lead.phone.clone(),
            company: Some(lead.name.clone()),
            notes: lead.notes.clone(),
            lead_id: Some(lead.id),
        },
    )
    .await?;

    Lead::update_status(pool, lead.id, LeadStatus::Converted).await?;

    // Activity log writes are best-effort; the conversion already happened.
    if let Err(e) = ClientActivity::create(
        pool,
        client.id,
        ActivityType::StatusChange,
        "Converted from lead",
    )
    .await
    {
        warn!(client_id = %client.id, error = %e, "failed to record conversion activity");
    }

    if let Err(e) = lead_finder::rebuild_leads_artifact(pool, project_id).await {
        warn!(project_id = %project_id, error = %e, "failed to rebuild leads artifact");
    }
    crm::rebuild_crm_snapshot_best_effort(pool, project_id).await;

    Ok(ResponseJson(ApiResponse::success(client)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().nest(
        "/projects/{project_id}/leads",
        Router::new()
            .route("/", get(list_leads))
            .route("/{lead_id}", put(update_lead).delete(delete_lead))
            .route("/{lead_id}/convert", post(convert_lead)),
    )
}
