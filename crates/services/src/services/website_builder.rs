//! Website generation: extract design DNA from the brand identity, map it
//! onto a template kind, then have the model emit the site files.

use db::models::{
    artifact::{Artifact, ArtifactType},
    project::Project,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use strum_macros::{Display, EnumString};
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

#[derive(Debug, Error)]
pub enum WebsiteBuilderError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),
    #[error("project not found")]
    ProjectNotFound,
    #[error("lead not found")]
    LeadNotFound,
    #[error("generate a brand identity before building the website")]
    MissingBrandIdentity,
}

/// Template families a brand can map onto.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, EnumString, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TemplateKind {
    Minimal,
    Vibrant,
    Editorial,
    Corporate,
}

/// Design tokens extracted from a brand identity. Deterministic, so the
/// same brand always produces the same template.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct DesignDna {
    pub template: TemplateKind,
    pub primary_color: String,
    pub secondary_color: String,
    pub heading_font: String,
    pub body_font: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct SiteFile {
    pub path: String,
    pub content: String,
}

/// Payload stored in the `website` artifact.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct WebsitePayload {
    pub design: DesignDna,
    pub files: Vec<SiteFile>,
}

/// Payload stored in the `lead_website` artifact: a demo site built for one
/// specific lead, used as an outreach asset.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct LeadWebsitePayload {
    pub lead_id: Uuid,
    pub lead_name: String,
    pub design: DesignDna,
    pub files: Vec<SiteFile>,
}

/// Map the brand voice onto a template family. The classifier is keyword
/// driven on purpose: product wants a predictable brand -> template mapping.
pub fn extract_design_dna(brand: &BrandIdentityPayload) -> DesignDna {
    let voice = brand.voice.to_lowercase();

    let template = if ["playful", "fun", "bold", "energetic", "quirky"]
        .iter()
        .any(|k| voice.contains(k))
    {
        TemplateKind::Vibrant
    } else if ["luxury", "elegant", "premium", "refined", "sophisticated"]
        .iter()
        .any(|k| voice.contains(k))
    {
        TemplateKind::Editorial
    } else if ["professional", "trustworthy", "technical", "reliable", "corporate"]
        .iter()
        .any(|k| voice.contains(k))
    {
        TemplateKind::Corporate
    } else {
        TemplateKind::Minimal
    };

    let primary_color = brand
        .palette
        .first()
        .cloned()
        .unwrap_or_else(|| "#111827".to_string());
    let secondary_color = brand
        .palette
        .get(1)
        .cloned()
        .unwrap_or_else(|| "#6B7280".to_string());

    DesignDna {
        template,
        primary_color,
        secondary_color,
        heading_font: brand.typography.heading.clone(),
        body_font: brand.typography.body.clone(),
    }
}

#[derive(Clone)]
pub struct WebsiteBuilderService {
    pool: SqlitePool,
    gateway: GatewayClient,
}

impl WebsiteBuilderService {
    pub fn new(pool: SqlitePool, gateway: GatewayClient) -> Self {
        Self { pool, gateway }
    }

    pub async fn run(
        &self,
        project_id: Uuid,
        owner_id: Uuid,
        progress: &ProgressReporter,
    ) -> Result<serde_json::Value, WebsiteBuilderError> {
        progress
            .stage(ToolStage::Validation, "Checking project")
            .await;

        let project = Project::find_for_owner(&self.pool, project_id, owner_id)
            .await?
            .ok_or(WebsiteBuilderError::ProjectNotFound)?;

        progress
            .stage(ToolStage::Fetch, "Loading brand identity")
            .await;

        let brand: BrandIdentityPayload =
            Artifact::find_by_project_and_type(&self.pool, project_id, ArtifactType::BrandIdentity)
                .await?
                .and_then(|a| a.parsed())
                .ok_or(WebsiteBuilderError::MissingBrandIdentity)?;

        progress
            .stage(ToolStage::Analysis, "Extracting design DNA")
            .await;

        let design = extract_design_dna(&brand);

        progress
            .stage(ToolStage::Generation, "Generating site files")
            .await;

        let files = self.generate_files(&project, &brand, &design).await?;
        let payload = WebsitePayload { design, files };

        progress.stage(ToolStage::Database, "Saving website").await;

        let value = serde_json::to_value(&payload)
            .map_err(|e| GatewayError::Serde(e.to_string()))?;
        let artifact =
            Artifact::upsert(&self.pool, project_id, ArtifactType::Website, &value).await?;

        info!(
            project_id = %project_id,
            version = artifact.version,
            file_count = payload.files.len(),
            template = %payload.design.template,
            "website generation complete"
        );

        Ok(value)
    }

    /// Build a single-page demo site pitched at one lead's business. The
    /// demo shows the lead what they could have; it does not use the
    /// project's own brand.
    pub async fn run_lead_site(
        &self,
        project_id: Uuid,
        owner_id: Uuid,
        lead_id: Uuid,
        progress: &ProgressReporter,
    ) -> Result<serde_json::Value, WebsiteBuilderError> {
        use db::models::lead::Lead;

        progress
            .stage(ToolStage::Validation, "Checking project")
            .await;

        Project::find_for_owner(&self.pool, project_id, owner_id)
            .await?
            .ok_or(WebsiteBuilderError::ProjectNotFound)?;

        progress.stage(ToolStage::Fetch, "Loading lead").await;

        let lead = Lead::find_for_project(&self.pool, lead_id, project_id)
            .await?
            .ok_or(WebsiteBuilderError::LeadNotFound)?;

        let design = DesignDna {
            template: TemplateKind::Minimal,
            primary_color: "#111827".to_string(),
            secondary_color: "#6B7280".to_string(),
            heading_font: "Inter".to_string(),
            body_font: "Inter".to_string(),
        };

        progress
            .stage(ToolStage::Generation, "Generating demo site")
            .await;

        let prompt = format!(
            r#"Generate a complete single-page demo website for this local business. It will be
shown to the owner as a pitch, so it must look finished and specific to them.

## Business
Name: {name}
Category: {category}
Address: {address}
Phone: {phone}
Rating: {rating} ({reviews} reviews)

## Constraints
- One self-contained index.html (inline CSS is fine), plus styles.css if cleaner
- Sections: hero with the business name, services implied by the category, contact block
  with the real phone and address, simple call-to-action
- Heading font {heading_font}, body font {body_font}, primary color {primary}
- Semantic HTML, responsive, no external JS

## Output Format
Return ONLY valid JSON:
```json
{{"files": [{{"path": "index.html", "content": "<!doctype html>..."}}]}}
```"#,
            name = lead.name,
            category = lead.category.as_deref().unwrap_or("local business"),
            address = lead.address.as_deref().unwrap_or("(address on request)"),
            phone = lead.phone.as_deref().unwrap_or("(phone on request)"),
            rating = lead
                .rating
                .map(|r| r.to_string())
                .unwrap_or_else(|| "unrated".to_string()),
            reviews = lead.review_count,
            heading_font = design.heading_font,
            body_font = design.body_font,
            primary = design.primary_color,
        );

        #[derive(Deserialize)]
        struct FilesResponse {
            files: Vec<SiteFile>,
        }

        let system = "You are a front-end developer producing production-quality static sites. \
                      Every file must be complete and valid, no placeholders or TODOs. \
                      Output valid JSON only.";

        let response: FilesResponse = self
            .gateway
            .ask_json_with_max_tokens(&prompt, Some(system), 16384)
            .await?;

        progress.stage(ToolStage::Database, "Saving demo site").await;

        let payload = LeadWebsitePayload {
            lead_id: lead.id,
            lead_name: lead.name.clone(),
            design,
            files: response.files,
        };
        let value = serde_json::to_value(&payload)
            .map_err(|e| GatewayError::Serde(e.to_string()))?;
        let artifact =
            Artifact::upsert(&self.pool, project_id, ArtifactType::LeadWebsite, &value).await?;

        info!(
            project_id = %project_id,
            lead_id = %lead.id,
            version = artifact.version,
            "lead demo site complete"
        );

        Ok(value)
    }

    async fn generate_files(
        &self,
        project: &Project,
        brand: &BrandIdentityPayload,
        design: &DesignDna,
    ) -> Result<Vec<SiteFile>, WebsiteBuilderError> {
        #[derive(Deserialize)]
        struct FilesResponse {
            files: Vec<SiteFile>,
        }

        let prompt = format!(
            r#"Generate a complete static marketing website for this business.

## Business
Name: {name}
Idea: {idea}
Brand: {brand_name} — "{tagline}"
Voice: {voice}

## Design Constraints (MUST FOLLOW)
- Template family: {template}
- Primary color: {primary}, secondary color: {secondary}
- Heading font: {heading_font}, body font: {body_font} (load from Google Fonts)
- Single self-contained site: index.html plus styles.css, optionally script.js
- Sections: hero with the tagline, features/services, social proof, contact/CTA
- Semantic HTML, responsive layout, no external JS frameworks

## Output Format
Return ONLY valid JSON:
```json
{{
  "files": [
    {{"path": "index.html", "content": "<!doctype html>..."}},
    {{"path": "styles.css", "content": "..."}}
  ]
}}
```"#,
            name = project.name,
            idea = project.idea.as_deref().unwrap_or("(not described)"),
            brand_name = brand.brand_name,
            tagline = brand.tagline,
            voice = brand.voice,
            template = design.template,
            primary = design.primary_color,
            secondary = design.secondary_color,
            heading_font = design.heading_font,
            body_font = design.body_font,
        );

        let system = "You are a front-end developer producing production-quality static sites. \
                      Every file must be complete and valid, no placeholders or TODOs. \
                      Output valid JSON only.";

        let response: FilesResponse = self
            .gateway
            .ask_json_with_max_tokens(&prompt, Some(system), 16384)
            .await?;
        Ok(response.files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::brand_identity::Typography;

    fn brand(voice: &str, palette: Vec<&str>) -> BrandIdentityPayload {
        BrandIdentityPayload {
            brand_name: "Test".to_string(),
            tagline: "t".to_string(),
            mission: "m".to_string(),
            voice: voice.to_string(),
            palette: palette.into_iter().map(String::from).collect(),
            typography: Typography {
                heading: "Inter".to_string(),
                body: "Inter".to_string(),
            },
            logo_prompt: "p".to_string(),
            logo_image: None,
        }
    }

    #[test]
    fn test_playful_voice_maps_to_vibrant() {
        let dna = extract_design_dna(&brand("warm, playful, direct", vec!["#111", "#222"]));
        assert_eq!(dna.template, TemplateKind::Vibrant);
    }

    #[test]
    fn test_luxury_voice_maps_to_editorial() {
        let dna = extract_design_dna(&brand("Elegant and premium", vec!["#111"]));
        assert_eq!(dna.template, TemplateKind::Editorial);
    }

    #[test]
    fn test_professional_voice_maps_to_corporate() {
        let dna = extract_design_dna(&brand("professional, reliable", vec![]));
        assert_eq!(dna.template, TemplateKind::Corporate);
    }

    #[test]
    fn test_unclassified_voice_falls_back_to_minimal() {
        let dna = extract_design_dna(&brand("calm, thoughtful", vec![]));
        assert_eq!(dna.template, TemplateKind::Minimal);
    }

    #[test]
    fn test_palette_maps_to_colors_with_defaults() {
        let dna = extract_design_dna(&brand("calm", vec!["#ABCDEF"]));
        assert_eq!(dna.primary_color, "#ABCDEF");
        assert_eq!(dna.secondary_color, "#6B7280"); // default when palette is short
    }
}
