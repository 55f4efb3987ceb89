//! Local-business search client (SerpAPI Google Maps engine).

use std::time::Duration;

use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

const DEFAULT_BASE_URL: &str = "https://serpapi.com";

#[derive(Debug, Clone, Error)]
pub enum SearchError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("timeout")]
    Timeout,
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("rate limited")]
    RateLimited,
    #[error("invalid api key")]
    InvalidApiKey,
    #[error("json error: {0}")]
    Serde(String),
    #[error("missing api key: SERPAPI_KEY is not configured")]
    MissingApiKey,
}

/// One business returned by the search provider.
#[derive(Debug, Clone)]
pub struct BusinessHit {
    pub place_id: String,
    pub name: String,
    pub category: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub rating: Option<f64>,
    pub review_count: i64,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    local_results: Vec<LocalResult>,
}

#[derive(Debug, Deserialize)]
struct LocalResult {
    place_id: Option<String>,
    title: String,
    #[serde(rename = "type")]
    category: Option<String>,
    address: Option<String>,
    phone: Option<String>,
    website: Option<String>,
    rating: Option<f64>,
    #[serde(default)]
    reviews: Option<i64>,
}

impl From<LocalResult> for BusinessHit {
    fn from(r: LocalResult) -> Self {
        Self {
            place_id: r.place_id.unwrap_or_default(),
            name: r.title,
            category: r.category,
            address: r.address,
            phone: r.phone,
            website: r.website,
            rating: r.rating,
            review_count: r.reviews.unwrap_or(0),
        }
    }
}

#[derive(Clone)]
pub struct BusinessSearchClient {
    http: Client,
    api_key: Option<SecretString>,
    base_url: String,
}

impl BusinessSearchClient {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(
        api_key: Option<SecretString>,
        base_url: Option<String>,
    ) -> Result<Self, SearchError> {
        let http = Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .user_agent(concat!("anything/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SearchError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            api_key,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        })
    }

    /// Search for businesses matching `query` near `location`. Hits without
    /// a place id are dropped; they cannot be deduplicated across runs.
    pub async fn search(
        &self,
        query: &str,
        location: &str,
        limit: usize,
    ) -> Result<Vec<BusinessHit>, SearchError> {
        let api_key = self.api_key.as_ref().ok_or(SearchError::MissingApiKey)?;

        let res = self
            .http
            .get(format!("{}/search", self.base_url))
            .query(&[
                ("engine", "google_maps"),
                ("q", query),
                ("location", location),
                ("api_key", api_key.expose_secret()),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SearchError::Timeout
                } else {
                    SearchError::Transport(e.to_string())
                }
            })?;

        let body = match res.status() {
            s if s.is_success() => res
                .json::<SearchResponse>()
                .await
                .map_err(|e| SearchError::Serde(e.to_string()))?,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(SearchError::InvalidApiKey);
            }
            StatusCode::TOO_MANY_REQUESTS => return Err(SearchError::RateLimited),
            s => {
                let status = s.as_u16();
                let body = res.text().await.unwrap_or_default();
                return Err(SearchError::Http { status, body });
            }
        };

        Ok(body
            .local_results
            .into_iter()
            .map(BusinessHit::from)
            .filter(|hit| !hit.place_id.is_empty())
            .take(limit)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_local_results() {
        let json = r#"{
            "local_results": [
                {
                    "position": 1,
                    "title": "Joe's Plumbing",
                    "place_id": "ChIJabc123",
                    "rating": 4.2,
                    "reviews": 18,
                    "type": "Plumber",
                    "address": "12 Main St",
                    "phone": "+1 555 0100"
                },
                {
                    "position": 2,
                    "title": "No Place Id Cafe"
                }
            ]
        }"#;
        let parsed: SearchResponse = serde_json::from_str(json).unwrap();
        let hits: Vec<BusinessHit> = parsed
            .local_results
            .into_iter()
            .map(BusinessHit::from)
            .filter(|h| !h.place_id.is_empty())
            .collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Joe's Plumbing");
        assert_eq!(hits[0].review_count, 18);
        assert_eq!(hits[0].website, None);
    }
}
