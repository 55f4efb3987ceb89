//! Bearer token verification. Token issuance belongs to the upstream auth
//! provider; the service only validates the shared-secret HS256 signature
//! and reads the subject claim.

use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("invalid token: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),
    #[error("subject claim is not a uuid")]
    BadSubject,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
}

/// Extract the user id from a bearer token.
pub fn verify(token: &str, secret: &str) -> Result<Uuid, JwtError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Uuid::parse_str(&data.claims.sub).map_err(|_| JwtError::BadSubject)
}

/// Mint a token for a user. Used by tests and local tooling only.
pub fn sign(user_id: Uuid, secret: &str, ttl_seconds: i64) -> Result<String, JwtError> {
    let claims = Claims {
        sub: user_id.to_string(),
        exp: Utc::now().timestamp() + ttl_seconds,
    };
    Ok(encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify_roundtrip() {
        let user = Uuid::new_v4();
        let token = sign(user, "secret", 3600).unwrap();
        assert_eq!(verify(&token, "secret").unwrap(), user);
    }

    #[test]
    fn test_verify_rejects_wrong_secret() {
        let token = sign(Uuid::new_v4(), "secret", 3600).unwrap();
        assert!(verify(&token, "other").is_err());
    }

    #[test]
    fn test_verify_rejects_expired() {
        let token = sign(Uuid::new_v4(), "secret", -60).unwrap();
        assert!(verify(&token, "secret").is_err());
    }
}
