use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use services::services::{
    billing::{CheckoutError, WebhookError},
    credits::CreditError,
    publisher::PublishError,
};
use thiserror::Error;
use tracing::error;
use utils::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Credits(#[from] CreditError),
    #[error(transparent)]
    Publish(#[from] PublishError),
    #[error(transparent)]
    Webhook(#[from] WebhookError),
    #[error(transparent)]
    Checkout(#[from] CheckoutError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            Self::NotFound(what) => (StatusCode::NOT_FOUND, format!("{what} not found")),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            Self::Database(sqlx::Error::RowNotFound) => {
                (StatusCode::NOT_FOUND, "Not found".to_string())
            }
            Self::Database(e) => {
                error!(error = %e, "database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            Self::Credits(CreditError::Insufficient { .. }) => {
                (StatusCode::BAD_REQUEST, "Insufficient credits".to_string())
            }
            Self::Credits(e) => {
                error!(error = %e, "credit error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            Self::Publish(PublishError::SubdomainTaken) => (
                StatusCode::CONFLICT,
                "Subdomain is already taken".to_string(),
            ),
            Self::Publish(PublishError::AlreadyPublished) => (
                StatusCode::CONFLICT,
                "Project is already published".to_string(),
            ),
            Self::Publish(PublishError::InvalidSubdomain(e)) => {
                (StatusCode::BAD_REQUEST, e.to_string())
            }
            Self::Publish(PublishError::MissingWebsite) => (
                StatusCode::BAD_REQUEST,
                "Generate a website before publishing".to_string(),
            ),
            Self::Publish(PublishError::NotPublished) => {
                (StatusCode::NOT_FOUND, "Publication not found".to_string())
            }
            Self::Publish(e) => {
                error!(error = %e, "publish error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Publishing failed, please try again".to_string(),
                )
            }
            Self::Webhook(WebhookError::Credits(e)) => {
                error!(error = %e, "webhook credit error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            Self::Webhook(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            Self::Checkout(CheckoutError::UnknownPack) => {
                (StatusCode::BAD_REQUEST, "Unknown credit pack".to_string())
            }
            Self::Checkout(e) => {
                error!(error = %e, "checkout error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Could not start checkout".to_string(),
                )
            }
            Self::Other(e) => {
                error!(error = %e, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        (status, Json(ApiResponse::<()>::error(message))).into_response()
    }
}
