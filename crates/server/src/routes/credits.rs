//! Routes for the credit ledger and checkout.

use axum::{
    Router,
    extract::State,
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::user_profile::{CreditTransaction, UserProfile};
use deployment::Deployment;
use serde::{Deserialize, Serialize};
use services::services::billing::{CheckoutSession, CreditPack};
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{DeploymentImpl, auth::AuthUser, error::ApiError};

const TRANSACTION_LIMIT: i64 = 100;

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CheckoutRequest {
    pub pack: CreditPack,
}

pub async fn get_profile(
    State(deployment): State<DeploymentImpl>,
    auth: AuthUser,
) -> Result<ResponseJson<ApiResponse<UserProfile>>, ApiError> {
    let profile = deployment.credits().profile(auth.user_id).await?;
    Ok(ResponseJson(ApiResponse::success(profile)))
}

pub async fn list_transactions(
    State(deployment): State<DeploymentImpl>,
    auth: AuthUser,
) -> Result<ResponseJson<ApiResponse<Vec<CreditTransaction>>>, ApiError> {
    let transactions = deployment
        .credits()
        .transactions(auth.user_id, TRANSACTION_LIMIT)
        .await?;
    Ok(ResponseJson(ApiResponse::success(transactions)))
}

pub async fn create_checkout(
    State(deployment): State<DeploymentImpl>,
    auth: AuthUser,
    axum::Json(payload): axum::Json<CheckoutRequest>,
) -> Result<ResponseJson<ApiResponse<CheckoutSession>>, ApiError> {
    // The profile must exist before the webhook can credit it.
    deployment.credits().profile(auth.user_id).await?;

    let session = deployment
        .billing()
        .create_checkout_session(auth.user_id, payload.pack)
        .await?;
    Ok(ResponseJson(ApiResponse::success(session)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route("/credits", get(get_profile))
        .route("/credits/transactions", get(list_transactions))
        .route("/credits/checkout", post(create_checkout))
}
