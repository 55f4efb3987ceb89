//! Bearer-token auth. Token issuance is the auth provider's job; here the
//! shared-secret signature is verified and the user id claim extracted.

use axum::{extract::FromRequestParts, http::header::AUTHORIZATION, http::request::Parts};
use deployment::Deployment;
use utils::jwt;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError};

#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub user_id: Uuid,
}

impl FromRequestParts<DeploymentImpl> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &DeploymentImpl,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(ApiError::Unauthorized)?;

        let user_id = jwt::verify(token, &state.config().auth_secret)
            .map_err(|_| ApiError::Unauthorized)?;

        Ok(AuthUser { user_id })
    }
}
