//! Market research tool: one structured gateway call, persisted as the
//! `market_research` artifact.

use db::models::{
    artifact::{Artifact, ArtifactType},
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
    gateway::{GatewayClient, GatewayError},
    progress::ProgressReporter,
};

#[derive(Debug, Error)]
pub enum MarketResearchError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),
    #[error("project not found")]
    ProjectNotFound,
    #[error("describe the business idea before running research")]
    MissingIdea,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct Competitor {
    pub name: String,
    pub positioning: String,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct PricingBand {
    pub tier: String,
    pub price: String,
    pub rationale: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct SwotSummary {
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub opportunities: Vec<String>,
    pub threats: Vec<String>,
}

/// Payload stored in the `market_research` artifact.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct MarketResearchPayload {
    pub audience: String,
    pub positioning: String,
    pub competitors: Vec<Competitor>,
    pub pricing: Vec<PricingBand>,
    pub swot: SwotSummary,
    pub summary: String,
}

#[derive(Clone)]
pub struct MarketResearchService {
    pool: SqlitePool,
    gateway: GatewayClient,
}

impl MarketResearchService {
    pub fn new(pool: SqlitePool, gateway: GatewayClient) -> Self {
        Self { pool, gateway }
    }

    pub async fn run(
        &self,
        project_id: Uuid,
        owner_id: Uuid,
        idea_override: Option<String>,
        progress: &ProgressReporter,
    ) -> Result<serde_json::Value, MarketResearchError> {
        progress
            .stage(ToolStage::Validation, "Checking project")
            .await;

        let project = Project::find_for_owner(&self.pool, project_id, owner_id)
            .await?
            .ok_or(MarketResearchError::ProjectNotFound)?;

        let idea = idea_override
            .or_else(|| project.idea.clone())
            .filter(|i| !i.trim().is_empty())
            .ok_or(MarketResearchError::MissingIdea)?;

        progress
            .stage(ToolStage::Analysis, "Researching the market")
            .await;

        let payload = self.research(&project.name, &idea).await?;

        progress
            .stage(ToolStage::Database, "Saving research")
            .await;

        let value = serde_json::to_value(&payload)
            .map_err(|e| GatewayError::Serde(e.to_string()))?;
        let artifact =
            Artifact::upsert(&self.pool, project_id, ArtifactType::MarketResearch, &value).await?;

        info!(
            project_id = %project_id,
            version = artifact.version,
            competitor_count = payload.competitors.len(),
            "market research complete"
        );

        Ok(value)
    }

    async fn research(
        &self,
        project_name: &str,
        idea: &str,
    ) -> Result<MarketResearchPayload, MarketResearchError> {
        let prompt = format!(
            r#"Research the market for the following business idea.

## Business
Name: {project_name}
Idea: {idea}

## Instructions
1. Describe the ideal customer audience in one tight paragraph
2. Identify 3-5 realistic competitors with their positioning and honest strengths/weaknesses
3. Recommend a positioning statement that differentiates this business
4. Suggest 2-3 pricing tiers with concrete prices and a one-line rationale each
5. Provide a SWOT summary with 2-4 bullet points per quadrant

## Output Format
Return ONLY valid JSON:
```json
{{
  "audience": "...",
  "positioning": "...",
  "competitors": [
    {{"name": "...", "positioning": "...", "strengths": ["..."], "weaknesses": ["..."]}}
  ],
  "pricing": [
    {{"tier": "...", "price": "...", "rationale": "..."}}
  ],
  "swot": {{
    "strengths": ["..."],
    "weaknesses": ["..."],
    "opportunities": ["..."],
    "threats": ["..."]
  }},
  "summary": "..."
}}
```"#
        );

        let system = "You are a pragmatic market analyst. Ground every claim in how small \
                      businesses in this space actually operate. Be specific, avoid hedging. \
                      Output valid JSON only.";

        Ok(self
            .gateway
            .ask_json_with_max_tokens(&prompt, Some(system), 8192)
            .await?)
    }
}
