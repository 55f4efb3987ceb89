//! Outreach scripts: per-lead cold call, email, and DM scripts grounded in
//! the brand voice, persisted as the `outreach` artifact.

use db::models::{
    artifact::{Artifact, ArtifactType},
    lead::Lead,
    project::Project,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;
use ts_rs::TS;
use utils::sse::ToolStage;
use uuid::Uuid;

use super::{
    brand_identity::BrandIdentityPayload,
    gateway::{GatewayClient, GatewayError},
    progress::ProgressReporter,
};

/// Scripts are generated for the highest-scored leads only; outreach to a
/// long tail is not useful.
const MAX_LEADS: usize = 10;

#[derive(Debug, Error)]
pub enum OutreachError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),
    #[error("project not found")]
    ProjectNotFound,
    #[error("generate leads before writing outreach scripts")]
    NoLeads,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct OutreachScript {
    pub lead_id: Uuid,
    pub lead_name: String,
    pub call_script: String,
    pub email: String,
    pub dm: String,
}

/// Payload stored in the `outreach` artifact.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct OutreachPayload {
    pub scripts: Vec<OutreachScript>,
}

#[derive(Clone)]
pub struct OutreachService {
    pool: SqlitePool,
    gateway: GatewayClient,
}

impl OutreachService {
    pub fn new(pool: SqlitePool, gateway: GatewayClient) -> Self {
        Self { pool, gateway }
    }

    pub async fn run(
        &self,
        project_id: Uuid,
        owner_id: Uuid,
        progress: &ProgressReporter,
    ) -> Result<serde_json::Value, OutreachError> {
        progress
            .stage(ToolStage::Validation, "Checking project")
            .await;

        let project = Project::find_for_owner(&self.pool, project_id, owner_id)
            .await?
            .ok_or(OutreachError::ProjectNotFound)?;

        progress.stage(ToolStage::Fetch, "Loading leads").await;

        let leads = Lead::find_by_project_id(&self.pool, project_id).await?;
        if leads.is_empty() {
            return Err(OutreachError::NoLeads);
        }
        let leads: Vec<&Lead> = leads.iter().take(MAX_LEADS).collect();

        let brand: Option<BrandIdentityPayload> =
            Artifact::find_by_project_and_type(&self.pool, project_id, ArtifactType::BrandIdentity)
                .await?
                .and_then(|a| a.parsed());

        progress
            .stage(ToolStage::Generation, "Writing outreach scripts")
            .await;

        let scripts = self.write_scripts(&project, &leads, brand.as_ref()).await?;

        progress.stage(ToolStage::Database, "Saving scripts").await;

        let payload = OutreachPayload { scripts };
        let value = serde_json::to_value(&payload)
            .map_err(|e| GatewayError::Serde(e.to_string()))?;
        let artifact =
            Artifact::upsert(&self.pool, project_id, ArtifactType::Outreach, &value).await?;

        info!(
            project_id = %project_id,
            version = artifact.version,
            script_count = payload.scripts.len(),
            "outreach generation complete"
        );

        Ok(value)
    }

    async fn write_scripts(
        &self,
        project: &Project,
        leads: &[&Lead],
        brand: Option<&BrandIdentityPayload>,
    ) -> Result<Vec<OutreachScript>, OutreachError> {
        #[derive(Deserialize)]
        struct ScriptsResponse {
            scripts: Vec<RawScript>,
        }

        #[derive(Deserialize)]
        struct RawScript {
            lead_id: String,
            call_script: String,
            email: String,
            dm: String,
        }

        #[derive(Serialize)]
        struct LeadContext<'a> {
            id: String,
            name: &'a str,
            category: Option<&'a str>,
            has_website: bool,
            rating: Option<f64>,
            review_count: i64,
        }

        let lead_contexts: Vec<LeadContext> = leads
            .iter()
            .map(|l| LeadContext {
                id: l.id.to_string(),
                name: &l.name,
                category: l.category.as_deref(),
                has_website: l.website.is_some(),
                rating: l.rating,
                review_count: l.review_count,
            })
            .collect();

        let leads_json = serde_json::to_string_pretty(&lead_contexts)
            .map_err(|e| GatewayError::Serde(e.to_string()))?;

        let sender = brand
            .map(|b| b.brand_name.clone())
            .unwrap_or_else(|| project.name.clone());
        let voice = brand
            .map(|b| b.voice.clone())
            .unwrap_or_else(|| "friendly, direct".to_string());

        let prompt = format!(
            r#"Write personalized outreach scripts from "{sender}" to each of these local businesses.

## Sender
{sender} — voice: {voice}
Offer: {idea}

## Leads
{leads_json}

## Instructions
1. For EACH lead, write a 30-second cold call script, a short email (subject + body), and a 2-3 sentence DM
2. Reference what you know about the lead (no website, review count) without being condescending
3. One concrete ask per script: a 15-minute chat

## Output Format
Return ONLY valid JSON, one entry per lead, echoing the lead's id:
```json
{{
  "scripts": [
    {{"lead_id": "uuid", "call_script": "...", "email": "Subject: ...\n\n...", "dm": "..."}}
  ]
}}
```"#,
            idea = project.idea.as_deref().unwrap_or("(not described)"),
        );

        let system = "You write outreach that gets replies: specific, short, zero fluff. \
                      Output valid JSON only.";

        let response: ScriptsResponse = self
            .gateway
            .ask_json_with_max_tokens(&prompt, Some(system), 8192)
            .await?;

        // Keep only scripts the model attributed to real leads.
        let scripts = response
            .scripts
            .into_iter()
            .filter_map(|raw| {
                let lead_id = Uuid::parse_str(&raw.lead_id).ok()?;
                let lead = leads.iter().find(|l| l.id == lead_id)?;
                Some(OutreachScript {
                    lead_id,
                    lead_name: lead.name.clone(),
                    call_script: raw.call_script,
                    email: raw.email,
                    dm: raw.dm,
                })
            })
            .collect();

        Ok(scripts)
    }
}
