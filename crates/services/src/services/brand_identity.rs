//! Brand identity tool: structured gateway call plus a best-effort logo
//! render, persisted as the `brand_identity` artifact.

use db::models::{
    artifact::{Artifact, ArtifactType},
    project::Project,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{info, warn};
use ts_rs::TS;
use utils::sse::ToolStage;
use uuid::Uuid;

use super::{
    gateway::{GatewayClient, GatewayError},
    progress::ProgressReporter,
};

#[derive(Debug, Error)]
pub enum BrandIdentityError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),
    #[error("project not found")]
    ProjectNotFound,
    #[error("describe the business idea before generating a brand")]
    MissingIdea,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct Typography {
    pub heading: String,
    pub body: String,
}

/// Payload stored in the `brand_identity` artifact. `palette` is ordered:
/// primary first, then supporting colors, as hex strings.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct BrandIdentityPayload {
    pub brand_name: String,
    pub tagline: String,
    pub mission: String,
    pub voice: String,
    pub palette: Vec<String>,
    pub typography: Typography,
    pub logo_prompt: String,
    pub logo_image: Option<String>,
}

#[derive(Clone)]
pub struct BrandIdentityService {
    pool: SqlitePool,
    gateway: GatewayClient,
}

impl BrandIdentityService {
    pub fn new(pool: SqlitePool, gateway: GatewayClient) -> Self {
        Self { pool, gateway }
    }

    pub async fn run(
        &self,
        project_id: Uuid,
        owner_id: Uuid,
        progress: &ProgressReporter,
    ) -> Result<serde_json::Value, BrandIdentityError> {
        progress
            .stage(ToolStage::Validation, "Checking project")
            .await;

        let project = Project::find_for_owner(&self.pool, project_id, owner_id)
            .await?
            .ok_or(BrandIdentityError::ProjectNotFound)?;

        let idea = project
            .idea
            .clone()
            .filter(|i| !i.trim().is_empty())
            .ok_or(BrandIdentityError::MissingIdea)?;

        progress
            .stage(ToolStage::Generation, "Designing the brand")
            .await;

        let mut payload = self.design(&project.name, &idea).await?;

        // Logo rendering is a nice-to-have; a provider failure must not
        // fail the whole brand.
        match self.gateway.generate_image(&payload.logo_prompt).await {
            Ok(image) => payload.logo_image = Some(image),
            Err(e) => {
                warn!(project_id = %project_id, error = %e, "logo render failed, keeping prompt only");
            }
        }

        progress.stage(ToolStage::Database, "Saving brand").await;

        let value = serde_json::to_value(&payload)
            .map_err(|e| GatewayError::Serde(e.to_string()))?;
        let artifact =
            Artifact::upsert(&self.pool, project_id, ArtifactType::BrandIdentity, &value).await?;

        info!(
            project_id = %project_id,
            version = artifact.version,
            brand_name = %payload.brand_name,
            "brand identity complete"
        );

        Ok(value)
    }

    async fn design(
        &self,
        project_name: &str,
        idea: &str,
    ) -> Result<BrandIdentityPayload, BrandIdentityError> {
        let prompt = format!(
            r##"Design a complete brand identity for this business.

## Business
Name: {project_name}
Idea: {idea}

## Instructions
1. Propose a brand name (keep the given name if it already works as a brand)
2. Write a tagline under 8 words and a one-sentence mission
3. Describe the brand voice in 2-4 adjectives (e.g. "warm, direct, playful")
4. Pick a palette of 4-5 hex colors, primary first
5. Pick a heading font and a body font from widely available web fonts
6. Write a logo prompt suitable for an image model: subject, style, colors, plain background

## Output Format
Return ONLY valid JSON:
```json
{{
  "brand_name": "...",
  "tagline": "...",
  "mission": "...",
  "voice": "...",
  "palette": ["#1A2B3C", "..."],
  "typography": {{"heading": "...", "body": "..."}},
  "logo_prompt": "...",
  "logo_image": null
}}
```"##
        );

        let system = "You are a brand designer for small businesses. Favor distinctive but \
                      practical choices over trends. Output valid JSON only.";

        Ok(self.gateway.ask_json(&prompt, Some(system)).await?)
    }
}
