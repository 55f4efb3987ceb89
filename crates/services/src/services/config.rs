//! Environment-driven configuration, loaded once at startup.

use secrecy::SecretString;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {0}")]
    Invalid(&'static str),
}

#[derive(Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Shared secret for verifying bearer tokens issued by the auth provider.
    pub auth_secret: String,
    pub openrouter_api_key: Option<SecretString>,
    pub openrouter_base_url: Option<String>,
    pub serpapi_key: Option<SecretString>,
    pub serpapi_base_url: Option<String>,
    pub stripe_secret_key: Option<SecretString>,
    pub stripe_webhook_secret: String,
    pub stripe_base_url: Option<String>,
    pub vercel_token: Option<SecretString>,
    pub vercel_base_url: Option<String>,
    pub vercel_team_id: Option<String>,
    /// Root domain published sites hang off, e.g. `anything.site`.
    pub publish_root_domain: String,
    pub checkout_success_url: String,
    pub checkout_cancel_url: String,
    pub signup_credit_grant: i64,
}

fn var(name: &'static str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn secret(name: &'static str) -> Option<SecretString> {
    var(name).map(SecretString::from)
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            host: var("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: var("PORT")
                .map(|p| p.parse().map_err(|_| ConfigError::Invalid("PORT")))
                .transpose()?
                .unwrap_or(3001),
            database_url: var("DATABASE_URL").unwrap_or_else(|| "sqlite:anything.db".to_string()),
            auth_secret: var("AUTH_JWT_SECRET").ok_or(ConfigError::Missing("AUTH_JWT_SECRET"))?,
            openrouter_api_key: secret("OPENROUTER_API_KEY"),
            openrouter_base_url: var("OPENROUTER_BASE_URL"),
            serpapi_key: secret("SERPAPI_KEY"),
            serpapi_base_url: var("SERPAPI_BASE_URL"),
            stripe_secret_key: secret("STRIPE_SECRET_KEY"),
            stripe_webhook_secret: var("STRIPE_WEBHOOK_SECRET")
                .ok_or(ConfigError::Missing("STRIPE_WEBHOOK_SECRET"))?,
            stripe_base_url: var("STRIPE_BASE_URL"),
            vercel_token: secret("VERCEL_TOKEN"),
            vercel_base_url: var("VERCEL_BASE_URL"),
            vercel_team_id: var("VERCEL_TEAM_ID"),
            publish_root_domain: var("PUBLISH_ROOT_DOMAIN")
                .unwrap_or_else(|| "anything.site".to_string()),
            checkout_success_url: var("CHECKOUT_SUCCESS_URL")
                .unwrap_or_else(|| "http://localhost:3000/billing/success".to_string()),
            checkout_cancel_url: var("CHECKOUT_CANCEL_URL")
                .unwrap_or_else(|| "http://localhost:3000/billing/cancel".to_string()),
            signup_credit_grant: var("SIGNUP_CREDIT_GRANT")
                .map(|v| v.parse().map_err(|_| ConfigError::Invalid("SIGNUP_CREDIT_GRANT")))
                .transpose()?
                .unwrap_or(50),
        })
    }

    /// Minimal configuration for integration tests: in-memory database,
    /// fixed secrets, no provider keys.
    pub fn for_tests() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            database_url: "sqlite::memory:".to_string(),
            auth_secret: "test-secret".to_string(),
            openrouter_api_key: None,
            openrouter_base_url: None,
            serpapi_key: None,
            serpapi_base_url: None,
            stripe_secret_key: None,
            stripe_webhook_secret: "whsec_test".to_string(),
            stripe_base_url: None,
            vercel_token: None,
            vercel_base_url: None,
            vercel_team_id: None,
            publish_root_domain: "anything.test".to_string(),
            checkout_success_url: "http://localhost/success".to_string(),
            checkout_cancel_url: "http://localhost/cancel".to_string(),
            signup_credit_grant: 50,
        }
    }
}
