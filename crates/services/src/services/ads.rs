//! Ad generation: structured gateway call for copy variants, best-effort
//! image renders, persisted as the `ads` artifact.

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
    brand_identity::BrandIdentityPayload,
    gateway::{GatewayClient, GatewayError},
    progress::ProgressReporter,
};

const DEFAULT_VARIANTS: usize = 4;
const MAX_VARIANTS: usize = 8;

#[derive(Debug, Error)]
pub enum AdStudioError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),
    #[error("project not found")]
    ProjectNotFound,
    #[error("describe the business idea before generating ads")]
    MissingIdea,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct AdRequest {
    pub platform: Option<String>,
    pub count: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct AdVariant {
    pub headline: String,
    pub body: String,
    pub cta: String,
    pub image_prompt: String,
    pub image: Option<String>,
}

/// Payload stored in the `ads` artifact.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct AdsPayload {
    pub platform: String,
    pub ads: Vec<AdVariant>,
}

#[derive(Clone)]
pub struct AdStudioService {
    pool: SqlitePool,
    gateway: GatewayClient,
}

impl AdStudioService {
    pub fn new(pool: SqlitePool, gateway: GatewayClient) -> Self {
        Self { pool, gateway }
    }

    pub async fn run(
        &self,
        project_id: Uuid,
        owner_id: Uuid,
        request: AdRequest,
        progress: &ProgressReporter,
    ) -> Result<serde_json::Value, AdStudioError> {
        progress
            .stage(ToolStage::Validation, "Checking project")
            .await;

        let project = Project::find_for_owner(&self.pool, project_id, owner_id)
            .await?
            .ok_or(AdStudioError::ProjectNotFound)?;

        let idea = project
            .idea
            .clone()
            .filter(|i| !i.trim().is_empty())
            .ok_or(AdStudioError::MissingIdea)?;

        // Brand context sharpens the copy but is not required.
        let brand: Option<BrandIdentityPayload> =
            Artifact::find_by_project_and_type(&self.pool, project_id, ArtifactType::BrandIdentity)
                .await?
                .and_then(|a| a.parsed());

        let platform = request
            .platform
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| "instagram".to_string());
        let count = request.count.unwrap_or(DEFAULT_VARIANTS).min(MAX_VARIANTS);

        progress
            .stage(ToolStage::Generation, "Writing ad variants")
            .await;

        let mut ads = self
            .write_variants(&project.name, &idea, brand.as_ref(), &platform, count)
            .await?;

        // Render the hero image for the first variant only; the rest keep
        // their prompts for on-demand rendering.
        if let Some(first) = ads.first_mut() {
            match self.gateway.generate_image(&first.image_prompt).await {
                Ok(image) => first.image = Some(image),
                Err(e) => {
                    warn!(project_id = %project_id, error = %e, "ad image render failed");
                }
            }
        }

        progress.stage(ToolStage::Database, "Saving ads").await;

        let payload = AdsPayload { platform, ads };
        let value = serde_json::to_value(&payload)
            .map_err(|e| GatewayError::Serde(e.to_string()))?;
        let artifact = Artifact::upsert(&self.pool, project_id, ArtifactType::Ads, &value).await?;

        info!(
            project_id = %project_id,
            version = artifact.version,
            variant_count = payload.ads.len(),
            "ad generation complete"
        );

        Ok(value)
    }

    async fn write_variants(
        &self,
        project_name: &str,
        idea: &str,
        brand: Option<&BrandIdentityPayload>,
        platform: &str,
        count: usize,
    ) -> Result<Vec<AdVariant>, AdStudioError> {
        #[derive(Deserialize)]
        struct AdsResponse {
            ads: Vec<AdVariant>,
        }

        let brand_context = brand
            .map(|b| {
                format!(
                    "Brand: {} — \"{}\". Voice: {}.",
                    b.brand_name, b.tagline, b.voice
                )
            })
            .unwrap_or_else(|| "No brand identity yet; infer a sensible tone.".to_string());

        let prompt = format!(
            r#"Write {count} ad variants for {platform}.

## Business
Name: {project_name}
Idea: {idea}
{brand_context}

## Instructions
1. Each variant: a headline under 40 characters, 1-2 sentences of body copy, a short CTA
2. Vary the angle across variants (pain point, social proof, offer, curiosity)
3. Each variant gets an image prompt for an image model: concrete subject, composition, style

## Output Format
Return ONLY valid JSON:
```json
{{
  "ads": [
    {{"headline": "...", "body": "...", "cta": "...", "image_prompt": "...", "image": null}}
  ]
}}
```"#
        );

        let system = "You are a direct-response copywriter. Every word earns its place. \
                      Output valid JSON only.";

        let response: AdsResponse = self
            .gateway
            .ask_json_with_max_tokens(&prompt, Some(system), 8192)
            .await?;
        Ok(response.ads.into_iter().take(count).collect())
    }
}
