//! CRM snapshot projection: a cached rollup of the clients table stored as
//! the `crm_snapshot` artifact, rebuilt after client mutations.

use db::models::{
    artifact::{Artifact, ArtifactType},
    client::{Client, ClientStatus},
};
use sqlx::SqlitePool;
use tracing::warn;
use uuid::Uuid;

/// Rebuild the `crm_snapshot` artifact from the canonical clients table.
pub async fn rebuild_crm_snapshot(
    pool: &SqlitePool,
    project_id: Uuid,
) -> Result<serde_json::Value, sqlx::Error> {
    let clients = Client::find_by_project_id(pool, project_id).await?;

    let active = clients
        .iter()
        .filter(|c| c.status == ClientStatus::Active)
        .count();
    let value = serde_json::json!({
        "total": clients.len(),
        "active": active,
        "clients": clients,
    });

    Artifact::upsert(pool, project_id, ArtifactType::CrmSnapshot, &value).await?;
    Ok(value)
}

/// Best-effort variant for callers where the primary write already
/// succeeded; a stale snapshot is tolerable until the next mutation.
pub async fn rebuild_crm_snapshot_best_effort(pool: &SqlitePool, project_id: Uuid) {
    if let Err(e) = rebuild_crm_snapshot(pool, project_id).await {
        warn!(project_id = %project_id, error = %e, "failed to rebuild crm snapshot");
    }
}
