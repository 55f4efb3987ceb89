//! Payment provider webhook. Signature verification runs against the raw
//! body before anything is parsed.

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::Json as ResponseJson,
    routing::post,
};
use deployment::Deployment;
use services::services::billing::WebhookOutcome;
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError};

pub async fn webhook(
    State(deployment): State<DeploymentImpl>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<ResponseJson<ApiResponse<WebhookOutcome>>, ApiError> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest("missing signature header".to_string()))?;

    let outcome = deployment
        .billing()
        .process_webhook(deployment.credits(), &body, signature)
        .await?;

    Ok(ResponseJson(ApiResponse::success(outcome)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().route("/billing/webhook", post(webhook))
}
