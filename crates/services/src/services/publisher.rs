//! Publishing: push the generated site files to the static-hosting
//! provider and mirror the deployment lifecycle locally, refreshed by
//! polling.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use db::models::{
    artifact::{Artifact, ArtifactType},
    published_website::{PublishStatus, PublishedWebsite},
};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{info, warn};
use utils::slug::{SlugError, sanitize_subdomain};
use uuid::Uuid;

use super::website_builder::WebsitePayload;

const DEFAULT_BASE_URL: &str = "https://api.vercel.com";

#[derive(Debug, Clone, Error)]
pub enum DeployError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("timeout")]
    Timeout,
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("rate limited")]
    RateLimited,
    #[error("invalid token")]
    InvalidToken,
    #[error("json error: {0}")]
    Serde(String),
    #[error("missing token: VERCEL_TOKEN is not configured")]
    MissingToken,
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("deploy error: {0}")]
    Deploy(#[from] DeployError),
    #[error("{0}")]
    InvalidSubdomain(#[from] SlugError),
    #[error("subdomain is already taken")]
    SubdomainTaken,
    #[error("project is already published")]
    AlreadyPublished,
    #[error("generate a website before publishing")]
    MissingWebsite,
    #[error("nothing is published for this project")]
    NotPublished,
}

/// Deployment state as reported by the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct DeploymentInfo {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(rename = "readyState")]
    pub ready_state: String,
}

#[derive(Debug, Serialize)]
struct InlineFile {
    file: String,
    data: String,
    encoding: &'static str,
}

#[derive(Clone)]
pub struct DeployClient {
    http: Client,
    token: Option<SecretString>,
    base_url: String,
    team_id: Option<String>,
}

impl DeployClient {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

    pub fn new(
        token: Option<SecretString>,
        base_url: Option<String>,
        team_id: Option<String>,
    ) -> Result<Self, DeployError> {
        let http = Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .user_agent(concat!("anything/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DeployError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            token,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            team_id,
        })
    }

    fn token(&self) -> Result<&SecretString, DeployError> {
        self.token.as_ref().ok_or(DeployError::MissingToken)
    }

    fn team_query(&self) -> Vec<(&'static str, String)> {
        self.team_id
            .as_ref()
            .map(|t| vec![("teamId", t.clone())])
            .unwrap_or_default()
    }

    /// Create a deployment from inline base64 files.
    pub async fn create_deployment(
        &self,
        name: &str,
        files: &[(String, String)],
    ) -> Result<DeploymentInfo, DeployError> {
        let token = self.token()?;

        let inline: Vec<InlineFile> = files
            .iter()
            .map(|(path, content)| InlineFile {
                file: path.clone(),
                data: BASE64.encode(content.as_bytes()),
                encoding: "base64",
            })
            .collect();

        let body = json!({
            "name": name,
            "files": inline,
            "target": "production",
            "projectSettings": { "framework": null },
        });

        let res = self
            .http
            .post(format!("{}/v13/deployments", self.base_url))
            .query(&self.team_query())
            .bearer_auth(token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        Self::parse_deployment(res).await
    }

    pub async fn get_deployment(&self, deployment_id: &str) -> Result<DeploymentInfo, DeployError> {
        let token = self.token()?;

        let res = self
            .http
            .get(format!(
                "{}/v13/deployments/{}",
                self.base_url, deployment_id
            ))
            .query(&self.team_query())
            .bearer_auth(token.expose_secret())
            .send()
            .await
            .map_err(map_reqwest_error)?;

        Self::parse_deployment(res).await
    }

    pub async fn delete_deployment(&self, deployment_id: &str) -> Result<(), DeployError> {
        let token = self.token()?;

        let res = self
            .http
            .delete(format!(
                "{}/v13/deployments/{}",
                self.base_url, deployment_id
            ))
            .query(&self.team_query())
            .bearer_auth(token.expose_secret())
            .send()
            .await
            .map_err(map_reqwest_error)?;

        match res.status() {
            s if s.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Ok(()), // already gone
            s => Err(status_error(s, res.text().await.unwrap_or_default())),
        }
    }

    async fn parse_deployment(res: reqwest::Response) -> Result<DeploymentInfo, DeployError> {
        match res.status() {
            s if s.is_success() => res
                .json::<DeploymentInfo>()
                .await
                .map_err(|e| DeployError::Serde(e.to_string())),
            s => Err(status_error(s, res.text().await.unwrap_or_default())),
        }
    }
}

fn status_error(status: StatusCode, body: String) -> DeployError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => DeployError::InvalidToken,
        StatusCode::TOO_MANY_REQUESTS => DeployError::RateLimited,
        s => DeployError::Http {
            status: s.as_u16(),
            body,
        },
    }
}

fn map_reqwest_error(e: reqwest::Error) -> DeployError {
    if e.is_timeout() {
        DeployError::Timeout
    } else {
        DeployError::Transport(e.to_string())
    }
}

#[derive(Clone)]
pub struct PublisherService {
    pool: SqlitePool,
    client: DeployClient,
    root_domain: String,
}

impl PublisherService {
    pub fn new(pool: SqlitePool, client: DeployClient, root_domain: String) -> Self {
        Self {
            pool,
            client,
            root_domain,
        }
    }

    /// Claim the subdomain, then push the site to the provider. The row is
    /// created first so a collision is rejected before anything is uploaded.
    pub async fn publish(
        &self,
        project_id: Uuid,
        requested_subdomain: &str,
    ) -> Result<PublishedWebsite, PublishError> {
        let website: WebsitePayload =
            Artifact::find_by_project_and_type(&self.pool, project_id, ArtifactType::Website)
                .await?
                .and_then(|a| a.parsed())
                .ok_or(PublishError::MissingWebsite)?;

        if PublishedWebsite::find_by_project_id(&self.pool, project_id)
            .await?
            .is_some()
        {
            return Err(PublishError::AlreadyPublished);
        }

        let subdomain = sanitize_subdomain(requested_subdomain)?;

        let record = match PublishedWebsite::create(&self.pool, project_id, &subdomain).await {
            Ok(record) => record,
            Err(e) => {
                if e.as_database_error()
                    .map(|d| d.is_unique_violation())
                    .unwrap_or(false)
                {
                    return Err(PublishError::SubdomainTaken);
                }
                return Err(e.into());
            }
        };

        let files: Vec<(String, String)> = website
            .files
            .iter()
            .map(|f| (f.path.clone(), f.content.clone()))
            .collect();

        let deployment = match self.client.create_deployment(&subdomain, &files).await {
            Ok(deployment) => deployment,
            Err(e) => {
                PublishedWebsite::update_status(
                    &self.pool,
                    record.id,
                    PublishStatus::Failed,
                    None,
                    Some(&e.to_string()),
                )
                .await?;
                return Err(e.into());
            }
        };

        PublishedWebsite::set_deployment(&self.pool, record.id, &deployment.id).await?;

        info!(
            project_id = %project_id,
            subdomain = %subdomain,
            deployment_id = %deployment.id,
            "deployment created"
        );

        PublishedWebsite::find_by_project_id(&self.pool, project_id)
            .await?
            .ok_or(PublishError::NotPublished)
    }

    /// Return the current record, polling the provider once while a
    /// deployment is still in flight. A failed poll leaves the record
    /// untouched; the next request tries again.
    pub async fn refresh(&self, project_id: Uuid) -> Result<PublishedWebsite, PublishError> {
        let record = PublishedWebsite::find_by_project_id(&self.pool, project_id)
            .await?
            .ok_or(PublishError::NotPublished)?;

        if record.status != PublishStatus::Deploying {
            return Ok(record);
        }
        let Some(deployment_id) = record.deployment_id.as_deref() else {
            return Ok(record);
        };

        match self.client.get_deployment(deployment_id).await {
            Ok(deployment) => match deployment.ready_state.as_str() {
                "READY" => {
                    let url = format!("https://{}.{}", record.subdomain, self.root_domain);
                    PublishedWebsite::update_status(
                        &self.pool,
                        record.id,
                        PublishStatus::Published,
                        Some(&url),
                        None,
                    )
                    .await?;
                }
                "ERROR" | "CANCELED" => {
                    PublishedWebsite::update_status(
                        &self.pool,
                        record.id,
                        PublishStatus::Failed,
                        None,
                        Some("deployment failed at the provider"),
                    )
                    .await?;
                }
                _ => {} // still building
            },
            Err(e) => {
                warn!(project_id = %project_id, error = %e, "deployment status poll failed");
            }
        }

        PublishedWebsite::find_by_project_id(&self.pool, project_id)
            .await?
            .ok_or(PublishError::NotPublished)
    }

    /// Remove the publication. The provider delete is best-effort: the
    /// local record is the source of truth for the subdomain claim.
    pub async fn unpublish(&self, project_id: Uuid) -> Result<(), PublishError> {
        let record = PublishedWebsite::find_by_project_id(&self.pool, project_id)
            .await?
            .ok_or(PublishError::NotPublished)?;

        if let Some(deployment_id) = record.deployment_id.as_deref() {
            if let Err(e) = self.client.delete_deployment(deployment_id).await {
                warn!(project_id = %project_id, error = %e, "provider deployment delete failed");
            }
        }

        PublishedWebsite::delete(&self.pool, record.id).await?;
        Ok(())
    }
}
