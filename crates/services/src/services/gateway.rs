//! LLM gateway client. All model calls go through an OpenRouter-compatible
//! chat-completions endpoint so text and image-capable models share one
//! client.

use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
const DEFAULT_TEXT_MODEL: &str = "anthropic/claude-sonnet-4";
const DEFAULT_IMAGE_MODEL: &str = "google/gemini-2.5-flash-image-preview";

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
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
    #[error("missing api key: OPENROUTER_API_KEY is not configured")]
    MissingApiKey,
}

impl GatewayError {
    /// Returns true if the error is transient and should be retried.
    pub fn should_retry(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout | Self::RateLimited => true,
            Self::Http { status, .. } => (500..=599).contains(status),
            _ => false,
        }
    }

    /// Short message safe to surface to the end user.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::RateLimited => "The AI service is busy right now. Please try again in a minute.",
            Self::Timeout | Self::Transport(_) => {
                "The AI service took too long to respond. Please try again."
            }
            Self::InvalidApiKey | Self::MissingApiKey => {
                "The AI service is not configured correctly."
            }
            _ => "Generation failed. Please try again.",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    modalities: Option<Vec<&'static str>>,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub id: String,
    pub model: String,
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseMessage {
    pub content: Option<String>,
    #[serde(default)]
    pub images: Vec<ImageOutput>,
}

#[derive(Debug, Deserialize)]
pub struct ImageOutput {
    pub image_url: ImageUrl,
}

#[derive(Debug, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl ChatResponse {
    pub fn text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
    }

    pub fn image(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.images.first())
            .map(|i| i.image_url.url.as_str())
    }
}

#[derive(Clone)]
pub struct GatewayClient {
    http: Client,
    api_key: Option<SecretString>,
    base_url: String,
    text_model: String,
    image_model: String,
}

impl GatewayClient {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

    pub fn new(
        api_key: Option<SecretString>,
        base_url: Option<String>,
    ) -> Result<Self, GatewayError> {
        let http = Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .user_agent(concat!("anything/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            api_key,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
        })
    }

    pub fn with_models(mut self, text_model: Option<String>, image_model: Option<String>) -> Self {
        if let Some(m) = text_model {
            self.text_model = m;
        }
        if let Some(m) = image_model {
            self.image_model = m;
        }
        self
    }

    /// Send a completion request, retrying transient failures.
    pub async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        max_tokens: u32,
    ) -> Result<ChatResponse, GatewayError> {
        let request = ChatRequest {
            model: self.text_model.clone(),
            max_tokens,
            messages,
            modalities: None,
        };
        self.send_with_retry(&request).await
    }

    async fn send_with_retry(&self, request: &ChatRequest) -> Result<ChatResponse, GatewayError> {
        (|| async { self.send_request(request).await })
            .retry(
                &ExponentialBuilder::default()
                    .with_min_delay(Duration::from_secs(1))
                    .with_max_delay(Duration::from_secs(30))
                    .with_max_times(3)
                    .with_jitter(),
            )
            .when(|e: &GatewayError| e.should_retry())
            .notify(|e, dur| {
                warn!(
                    "gateway call failed, retrying after {:.2}s: {}",
                    dur.as_secs_f64(),
                    e
                )
            })
            .await
    }

    async fn send_request(&self, request: &ChatRequest) -> Result<ChatResponse, GatewayError> {
        let api_key = self.api_key.as_ref().ok_or(GatewayError::MissingApiKey)?;

        let res = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key.expose_secret())
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        match res.status() {
            s if s.is_success() => res
                .json::<ChatResponse>()
                .await
                .map_err(|e| GatewayError::Serde(e.to_string())),
            StatusCode::UNAUTHORIZED => Err(GatewayError::InvalidApiKey),
            StatusCode::TOO_MANY_REQUESTS => Err(GatewayError::RateLimited),
            s => {
                let status = s.as_u16();
                let body = res.text().await.unwrap_or_default();
                Err(GatewayError::Http { status, body })
            }
        }
    }

    /// Send a single user message and return the text response.
    pub async fn ask(&self, prompt: &str, system: Option<&str>) -> Result<String, GatewayError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(ChatMessage::system(system));
        }
        messages.push(ChatMessage::user(prompt));

        let response = self.complete(messages, 4096).await?;
        response
            .text()
            .map(|s| s.to_string())
            .ok_or_else(|| GatewayError::Serde("No text content in response".to_string()))
    }

    /// Send a prompt expecting JSON in the response.
    pub async fn ask_json<T: for<'de> Deserialize<'de>>(
        &self,
        prompt: &str,
        system: Option<&str>,
    ) -> Result<T, GatewayError> {
        self.ask_json_with_max_tokens(prompt, system, 4096).await
    }

    /// Send a prompt expecting JSON in the response with custom max_tokens.
    pub async fn ask_json_with_max_tokens<T: for<'de> Deserialize<'de>>(
        &self,
        prompt: &str,
        system: Option<&str>,
        max_tokens: u32,
    ) -> Result<T, GatewayError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(ChatMessage::system(system));
        }
        messages.push(ChatMessage::user(prompt));

        let response = self
            .complete(messages, max_tokens)
            .await?
            .text()
            .map(|s| s.to_string())
            .ok_or_else(|| GatewayError::Serde("No text content in response".to_string()))?;

        if response.trim().is_empty() {
            tracing::error!("gateway returned an empty response");
            return Err(GatewayError::Serde("Empty response from model".to_string()));
        }

        // The model may wrap JSON in markdown code fences
        let json_str = extract_json(&response);

        serde_json::from_str(json_str).map_err(|e| {
            tracing::error!(
                json_error = %e,
                response_length = response.len(),
                extracted_json_preview = %json_str.chars().take(500).collect::<String>(),
                "failed to parse JSON response from model"
            );
            GatewayError::Serde(format!(
                "{} (response preview: {})",
                e,
                json_str.chars().take(500).collect::<String>()
            ))
        })
    }

    /// Generate an image with an image-capable model. Returns the image as
    /// a data URL or https URL, whatever the provider emits.
    pub async fn generate_image(&self, prompt: &str) -> Result<String, GatewayError> {
        let request = ChatRequest {
            model: self.image_model.clone(),
            max_tokens: 1024,
            messages: vec![ChatMessage::user(prompt)],
            modalities: Some(vec!["image", "text"]),
        };

        let response = self.send_with_retry(&request).await?;
        response
            .image()
            .map(|s| s.to_string())
            .ok_or_else(|| GatewayError::Serde("No image in response".to_string()))
    }
}

fn map_reqwest_error(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Transport(e.to_string())
    }
}

/// Extract JSON from a string that might contain markdown code fences.
pub fn extract_json(text: &str) -> &str {
    let text = text.trim();

    if let Some(start) = text.find("```json") {
        let content_start = start + 7;
        if let Some(end) = text[content_start..].find("```") {
            return text[content_start..content_start + end].trim();
        }
    }

    if let Some(start) = text.find("```") {
        let content_start = start + 3;
        // Skip past any language identifier on the same line
        let content_start = text[content_start..]
            .find('\n')
            .map(|i| content_start + i + 1)
            .unwrap_or(content_start);
        if let Some(end) = text[content_start..].find("```") {
            return text[content_start..content_start + end].trim();
        }
    }

    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_plain() {
        let input = r#"{"key": "value"}"#;
        assert_eq!(extract_json(input), r#"{"key": "value"}"#);
    }

    #[test]
    fn test_extract_json_code_block() {
        let input = "Here's the JSON:\n```json\n{\"key\": \"value\"}\n```";
        assert_eq!(extract_json(input), r#"{"key": "value"}"#);
    }

    #[test]
    fn test_extract_json_generic_code_block() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(extract_json(input), r#"{"key": "value"}"#);
    }

    #[test]
    fn test_should_retry_classification() {
        assert!(GatewayError::RateLimited.should_retry());
        assert!(
            GatewayError::Http {
                status: 503,
                body: String::new()
            }
            .should_retry()
        );
        assert!(!GatewayError::InvalidApiKey.should_retry());
        assert!(
            !GatewayError::Http {
                status: 400,
                body: String::new()
            }
            .should_retry()
        );
    }

    #[test]
    fn test_response_text_and_image_accessors() {
        let json = r#"{
            "id": "gen-1",
            "model": "test",
            "choices": [{
                "message": {
                    "content": "hello",
                    "images": [{"image_url": {"url": "data:image/png;base64,AAAA"}}]
                },
                "finish_reason": "stop"
            }]
        }"#;
        let response: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.text(), Some("hello"));
        assert_eq!(response.image(), Some("data:image/png;base64,AAAA"));
    }
}
