//! Lead generation: business search, fixed-weight scoring, upsert into the
//! canonical `leads` table, then rebuild the `leads` artifact as a derived
//! projection of the table.

use db::models::{
    artifact::{Artifact, ArtifactType},
    lead::{CreateLead, Lead},
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
    business_search::{BusinessHit, BusinessSearchClient, SearchError},
    progress::ProgressReporter,
};

const DEFAULT_LIMIT: usize = 20;

#[derive(Debug, Error)]
pub enum LeadFinderError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("search error: {0}")]
    Search(#[from] SearchError),
    #[error("project not found")]
    ProjectNotFound,
    #[error("a search location is required")]
    MissingLocation,
    #[error("no businesses found for that search")]
    NoResults,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct LeadSearchRequest {
    pub query: Option<String>,
    pub location: String,
    pub limit: Option<usize>,
}

/// Score a business as an outreach target on a 1-100 scale.
///
/// The weights encode the product's judgment: businesses without a website
/// are the best targets, low review counts mean under-marketed, and a
/// middling rating suggests an owner who would pay for help.
pub fn score_lead(hit: &BusinessHit) -> i64 {
    let mut score: i64 = 50;

    if hit.website.is_none() {
        score += 30;
    }

    score += match hit.review_count {
        0 => 5,
        1..=20 => 15,
        21..=100 => 10,
        _ => 0,
    };

    score += match hit.rating {
        Some(r) if r < 3.0 => 5,
        Some(r) if r <= 4.0 => 10,
        Some(_) => 5,
        None => 0,
    };

    score.clamp(1, 100)
}

/// Rebuild the `leads` artifact from the canonical table. The artifact is a
/// cached projection; callers that mutate leads re-run this and tolerate
/// failure.
pub async fn rebuild_leads_artifact(
    pool: &SqlitePool,
    project_id: Uuid,
) -> Result<serde_json::Value, sqlx::Error> {
    let leads = Lead::find_by_project_id(pool, project_id).await?;
    let value = serde_json::json!({
        "count": leads.len(),
        "leads": leads,
    });
    Artifact::upsert(pool, project_id, ArtifactType::Leads, &value).await?;
    Ok(value)
}

#[derive(Clone)]
pub struct LeadFinderService {
    pool: SqlitePool,
    search: BusinessSearchClient,
}

impl LeadFinderService {
    pub fn new(pool: SqlitePool, search: BusinessSearchClient) -> Self {
        Self { pool, search }
    }

    pub async fn run(
        &self,
        project_id: Uuid,
        owner_id: Uuid,
        request: LeadSearchRequest,
        progress: &ProgressReporter,
    ) -> Result<serde_json::Value, LeadFinderError> {
        progress
            .stage(ToolStage::Validation, "Checking project")
            .await;

        let project = Project::find_for_owner(&self.pool, project_id, owner_id)
            .await?
            .ok_or(LeadFinderError::ProjectNotFound)?;

        let location = request.location.trim();
        if location.is_empty() {
            return Err(LeadFinderError::MissingLocation);
        }

        let query = request
            .query
            .filter(|q| !q.trim().is_empty())
            .or_else(|| project.agency_type.clone())
            .unwrap_or_else(|| project.name.clone());
        let limit = request.limit.unwrap_or(DEFAULT_LIMIT).min(50);

        progress
            .stage(ToolStage::Fetch, "Searching for businesses")
            .await;

        let hits = self.search.search(&query, location, limit).await?;
        if hits.is_empty() {
            return Err(LeadFinderError::NoResults);
        }

        progress
            .stage(ToolStage::Analysis, "Scoring leads")
            .await;

        let mut upserted = 0usize;
        for hit in &hits {
            let score = score_lead(hit);
            let create = CreateLead {
                place_id: hit.place_id.clone(),
                name: hit.name.clone(),
                category: hit.category.clone(),
                address: hit.address.clone(),
                phone: hit.phone.clone(),
                website: hit.website.clone(),
                rating: hit.rating,
                review_count: hit.review_count,
                score,
            };
            Lead::upsert(&self.pool, project_id, &create).await?;
            upserted += 1;
        }

        progress
            .stage(ToolStage::Database, "Saving leads")
            .await;

        let value = rebuild_leads_artifact(&self.pool, project_id).await?;

        info!(
            project_id = %project_id,
            found = hits.len(),
            upserted,
            "lead generation complete"
        );

        Ok(value)
    }
}

/// Best-effort cleanup of artifact projections after a lead is deleted.
/// Failures are logged and swallowed; the canonical table delete already
/// succeeded.
pub async fn cleanup_lead_artifacts(pool: &SqlitePool, project_id: Uuid, lead_id: Uuid) {
    if let Err(e) = rebuild_leads_artifact(pool, project_id).await {
        warn!(project_id = %project_id, error = %e, "failed to rebuild leads artifact");
    }

    // Drop any per-lead website artifact that references the deleted lead.
    match Artifact::find_by_project_and_type(pool, project_id, ArtifactType::LeadWebsite).await {
        Ok(Some(artifact)) => {
            let references = artifact
                .parsed_value()
                .and_then(|v| {
                    v.get("lead_id")
                        .and_then(|id| id.as_str().map(String::from))
                })
                .map(|id| id == lead_id.to_string())
                .unwrap_or(false);
            if references {
                if let Err(e) =
                    Artifact::delete_by_type(pool, project_id, ArtifactType::LeadWebsite).await
                {
                    warn!(project_id = %project_id, error = %e, "failed to delete lead_website artifact");
                }
            }
        }
        Ok(None) => {}
        Err(e) => {
            warn!(project_id = %project_id, error = %e, "failed to load lead_website artifact");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(website: Option<&str>, rating: Option<f64>, review_count: i64) -> BusinessHit {
        BusinessHit {
            place_id: "p1".to_string(),
            name: "Biz".to_string(),
            category: None,
            address: None,
            phone: None,
            website: website.map(String::from),
            rating,
            review_count,
        }
    }

    #[test]
    fn test_no_website_scores_higher() {
        let with = score_lead(&hit(Some("https://biz.com"), Some(4.5), 10));
        let without = score_lead(&hit(None, Some(4.5), 10));
        assert!(without > with);
        assert_eq!(without - with, 30);
    }

    #[test]
    fn test_few_reviews_beat_many_reviews() {
        let few = score_lead(&hit(None, Some(4.0), 5));
        let many = score_lead(&hit(None, Some(4.0), 500));
        assert!(few > many);
    }

    #[test]
    fn test_score_is_clamped_to_100() {
        // best case: no website, few reviews, middling rating
        let s = score_lead(&hit(None, Some(3.5), 10));
        assert!(s <= 100, "score {s} out of range");
        assert!(s >= 1);
    }

    #[test]
    fn test_established_business_scores_lowest_band() {
        let s = score_lead(&hit(Some("https://big.com"), Some(4.9), 2000));
        assert_eq!(s, 55); // base 50 + rating 5
    }
}
