//! Streaming tool endpoints. Each POST opens a `text/event-stream`, charges
//! credits up front, pushes named `progress` stages while the tool runs,
//! and finishes with a `success` or `error` event. Client disconnect drops
//! the stream, which cancels the in-flight run and refunds the charge.

use std::{convert::Infallible, future::Future};

use axum::{
    Router,
    extract::{Path, State},
    response::{
        IntoResponse,
        sse::{Event, KeepAlive, Sse},
    },
    routing::post,
};
use deployment::Deployment;
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use services::services::{
    ads::{AdRequest, AdStudioError},
    brand_identity::BrandIdentityError,
    credits::{CreditError, CreditService, ToolKind},
    lead_finder::{LeadFinderError, LeadSearchRequest},
    market_research::MarketResearchError,
    outreach::OutreachError,
    progress::{ProgressReporter, ToolEvent},
    website_builder::WebsiteBuilderError,
};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};
use ts_rs::TS;
use utils::sse::CancelOnDrop;
use uuid::Uuid;

use crate::{DeploymentImpl, auth::AuthUser};

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct ResearchRequest {
    pub idea: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct LeadWebsiteRequest {
    pub lead_id: Uuid,
}

fn to_event(name: &str, data: &impl Serialize) -> Event {
    match serde_json::to_string(data) {
        Ok(json) => Event::default().event(name).data(json),
        Err(_) => Event::default().event(name).data("{}"),
    }
}

/// Charge, run, stream. The generation future runs in a spawned task under
/// a `select!` with the cancellation token; the token is cancelled when the
/// response stream is dropped.
fn sse_tool<F, Fut>(
    credits: CreditService,
    user_id: Uuid,
    tool: ToolKind,
    run: F,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    F: FnOnce(ProgressReporter) -> Fut + Send + 'static,
    Fut: Future<Output = Result<serde_json::Value, String>> + Send + 'static,
{
    let (reporter, rx) = ProgressReporter::channel(32);
    let token = CancellationToken::new();
    let task_token = token.clone();

    tokio::spawn(async move {
        let charge = match credits.charge(user_id, tool).await {
            Ok(charge) => charge,
            Err(CreditError::Insufficient { .. }) => {
                reporter.error("Insufficient credits").await;
                return;
            }
            Err(e) => {
                error!(error = %e, "credit charge failed");
                reporter.error("Internal server error").await;
                return;
            }
        };

        tokio::select! {
            _ = task_token.cancelled() => {
                debug!(user_id = %user_id, tool = %tool, "client disconnected, run cancelled");
                if let Err(e) = credits.refund(user_id, &charge).await {
                    warn!(error = %e, "refund after cancellation failed");
                }
            }
            result = run(reporter.clone()) => match result {
                Ok(data) => reporter.success(data).await,
                Err(message) => {
                    if let Err(e) = credits.refund(user_id, &charge).await {
                        warn!(error = %e, "refund after failure failed");
                    }
                    reporter.error(message).await;
                }
            }
        }
    });

    let guard = CancelOnDrop(token);
    let stream = ReceiverStream::new(rx).map(move |event| {
        let _ = &guard; // dropped with the stream; cancels the run
        Ok(match event {
            ToolEvent::Progress(p) => to_event("progress", &p),
            ToolEvent::Success(v) => to_event("success", &v),
            ToolEvent::Error(e) => to_event("error", &e),
        })
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

pub async fn run_market_research(
    State(deployment): State<DeploymentImpl>,
    auth: AuthUser,
    Path(project_id): Path<Uuid>,
    payload: Option<axum::Json<ResearchRequest>>,
) -> impl IntoResponse {
    let service = deployment.market_research().clone();
    let idea = payload.and_then(|axum::Json(b)| b.idea);
    let user_id = auth.user_id;

    sse_tool(
        deployment.credits().clone(),
        user_id,
        ToolKind::MarketResearch,
        move |progress| async move {
            service
                .run(project_id, user_id, idea, &progress)
                .await
                .map_err(|e| match &e {
                    MarketResearchError::Gateway(g) => g.user_message().to_string(),
                    MarketResearchError::Database(inner) => {
                        error!(error = %inner, "market research db error");
                        "Internal server error".to_string()
                    }
                    other => other.to_string(),
                })
        },
    )
}

pub async fn run_brand_identity(
    State(deployment): State<DeploymentImpl>,
    auth: AuthUser,
    Path(project_id): Path<Uuid>,
) -> impl IntoResponse {
    let service = deployment.brand_identity().clone();
    let user_id = auth.user_id;

    sse_tool(
        deployment.credits().clone(),
        user_id,
        ToolKind::BrandIdentity,
        move |progress| async move {
            service
                .run(project_id, user_id, &progress)
                .await
                .map_err(|e| match &e {
                    BrandIdentityError::Gateway(g) => g.user_message().to_string(),
                    BrandIdentityError::Database(inner) => {
                        error!(error = %inner, "brand identity db error");
                        "Internal server error".to_string()
                    }
                    other => other.to_string(),
                })
        },
    )
}

pub async fn run_website(
    State(deployment): State<DeploymentImpl>,
    auth: AuthUser,
    Path(project_id): Path<Uuid>,
) -> impl IntoResponse {
    let service = deployment.website_builder().clone();
    let user_id = auth.user_id;

    sse_tool(
        deployment.credits().clone(),
        user_id,
        ToolKind::Website,
        move |progress| async move {
            service
                .run(project_id, user_id, &progress)
                .await
                .map_err(|e| match &e {
                    WebsiteBuilderError::Gateway(g) => g.user_message().to_string(),
                    WebsiteBuilderError::Database(inner) => {
                        error!(error = %inner, "website builder db error");
                        "Internal server error".to_string()
                    }
                    other => other.to_string(),
                })
        },
    )
}

pub async fn run_lead_website(
    State(deployment): State<DeploymentImpl>,
    auth: AuthUser,
    Path(project_id): Path<Uuid>,
    axum::Json(payload): axum::Json<LeadWebsiteRequest>,
) -> impl IntoResponse {
    let service = deployment.website_builder().clone();
    let user_id = auth.user_id;

    sse_tool(
        deployment.credits().clone(),
        user_id,
        ToolKind::LeadWebsite,
        move |progress| async move {
            service
                .run_lead_site(project_id, user_id, payload.lead_id, &progress)
                .await
                .map_err(|e| match &e {
                    WebsiteBuilderError::Gateway(g) => g.user_message().to_string(),
                    WebsiteBuilderError::Database(inner) => {
                        error!(error = %inner, "lead website db error");
                        "Internal server error".to_string()
                    }
                    other => other.to_string(),
                })
        },
    )
}

pub async fn run_leads(
    State(deployment): State<DeploymentImpl>,
    auth: AuthUser,
    Path(project_id): Path<Uuid>,
    axum::Json(payload): axum::Json<LeadSearchRequest>,
) -> impl IntoResponse {
    let service = deployment.lead_finder().clone();
    let user_id = auth.user_id;

    sse_tool(
        deployment.credits().clone(),
        user_id,
        ToolKind::Leads,
        move |progress| async move {
            service
                .run(project_id, user_id, payload, &progress)
                .await
                .map_err(|e| match &e {
                    LeadFinderError::Search(inner) => {
                        warn!(error = %inner, "business search failed");
                        "Business search failed. Please try again.".to_string()
                    }
                    LeadFinderError::Database(inner) => {
                        error!(error = %inner, "lead finder db error");
                        "Internal server error".to_string()
                    }
                    other => other.to_string(),
                })
        },
    )
}

pub async fn run_ads(
    State(deployment): State<DeploymentImpl>,
    auth: AuthUser,
    Path(project_id): Path<Uuid>,
    payload: Option<axum::Json<AdRequest>>,
) -> impl IntoResponse {
    let service = deployment.ad_studio().clone();
    let request = payload.map(|axum::Json(b)| b).unwrap_or(AdRequest {
        platform: None,
        count: None,
    });
    let user_id = auth.user_id;

    sse_tool(
        deployment.credits().clone(),
        user_id,
        ToolKind::Ads,
        move |progress| async move {
            service
                .run(project_id, user_id, request, &progress)
                .await
                .map_err(|e| match &e {
                    AdStudioError::Gateway(g) => g.user_message().to_string(),
                    AdStudioError::Database(inner) => {
                        error!(error = %inner, "ad studio db error");
                        "Internal server error".to_string()
                    }
                    other => other.to_string(),
                })
        },
    )
}

pub async fn run_outreach(
    State(deployment): State<DeploymentImpl>,
    auth: AuthUser,
    Path(project_id): Path<Uuid>,
) -> impl IntoResponse {
    let service = deployment.outreach().clone();
    let user_id = auth.user_id;

    sse_tool(
        deployment.credits().clone(),
        user_id,
        ToolKind::Outreach,
        move |progress| async move {
            service
                .run(project_id, user_id, &progress)
                .await
                .map_err(|e| match &e {
                    OutreachError::Gateway(g) => g.user_message().to_string(),
                    OutreachError::Database(inner) => {
                        error!(error = %inner, "outreach db error");
                        "Internal server error".to_string()
                    }
                    other => other.to_string(),
                })
        },
    )
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().nest(
        "/projects/{project_id}/tools",
        Router::new()
            .route("/market-research", post(run_market_research))
            .route("/brand-identity", post(run_brand_identity))
            .route("/website", post(run_website))
            .route("/lead-website", post(run_lead_website))
            .route("/leads", post(run_leads))
            .route("/ads", post(run_ads))
            .route("/outreach", post(run_outreach)),
    )
}
