//! Payments: webhook signature verification and processing, plus the thin
//! checkout-session client call. Payment state itself lives with the
//! provider; only credit grants land here.

use std::time::Duration;

use chrono::Utc;
use db::models::user_profile::TransactionType;
use hmac::{Hmac, Mac};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{info, warn};
use ts_rs::TS;
use uuid::Uuid;

use super::credits::{CreditError, CreditService};

const DEFAULT_BASE_URL: &str = "https://api.stripe.com";

/// Signatures older than this are rejected to blunt replay.
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("invalid signature header")]
    MalformedHeader,
    #[error("signature verification failed")]
    InvalidSignature,
    #[error("signature timestamp outside tolerance")]
    StaleTimestamp,
    #[error("malformed event payload: {0}")]
    MalformedPayload(String),
    #[error("credit error: {0}")]
    Credits(#[from] CreditError),
}

#[derive(Debug, Clone, Error)]
pub enum CheckoutError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("invalid api key")]
    InvalidApiKey,
    #[error("json error: {0}")]
    Serde(String),
    #[error("missing api key: STRIPE_SECRET_KEY is not configured")]
    MissingApiKey,
    #[error("unknown credit pack")]
    UnknownPack,
}

/// Credit bundles offered at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
pub enum CreditPack {
    Starter,
    Growth,
    Scale,
}

impl CreditPack {
    pub fn credits(&self) -> i64 {
        match self {
            Self::Starter => 100,
            Self::Growth => 500,
            Self::Scale => 2000,
        }
    }

    pub fn price_cents(&self) -> i64 {
        match self {
            Self::Starter => 900,
            Self::Growth => 3900,
            Self::Scale => 12900,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Starter => "Starter pack",
            Self::Growth => "Growth pack",
            Self::Scale => "Scale pack",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

/// What a processed webhook did.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum WebhookOutcome {
    CreditsGranted { user_id: Uuid, credits: i64 },
    PaymentFailed,
    Ignored { event_type: String },
}

/// Verify a `t=<unix>,v1=<hex>` signature header against the raw body.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now_unix: i64,
) -> Result<(), WebhookError> {
    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<Vec<u8>> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => {
                timestamp = value.parse().ok();
            }
            Some(("v1", value)) => {
                if let Ok(bytes) = hex::decode(value) {
                    signatures.push(bytes);
                }
            }
            _ => {} // ignore unknown schemes
        }
    }

    let timestamp = timestamp.ok_or(WebhookError::MalformedHeader)?;
    if signatures.is_empty() {
        return Err(WebhookError::MalformedHeader);
    }

    if (now_unix - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(WebhookError::StaleTimestamp);
    }

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| WebhookError::InvalidSignature)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    let expected = mac.finalize().into_bytes();

    let matched = signatures
        .iter()
        .any(|sig| sig.ct_eq(expected.as_slice()).into());

    if matched {
        Ok(())
    } else {
        Err(WebhookError::InvalidSignature)
    }
}

#[derive(Clone)]
pub struct BillingService {
    http: Client,
    api_key: Option<SecretString>,
    webhook_secret: String,
    base_url: String,
    success_url: String,
    cancel_url: String,
}

impl BillingService {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(
        api_key: Option<SecretString>,
        webhook_secret: String,
        base_url: Option<String>,
        success_url: String,
        cancel_url: String,
    ) -> Result<Self, CheckoutError> {
        let http = Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .user_agent(concat!("anything/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CheckoutError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            api_key,
            webhook_secret,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            success_url,
            cancel_url,
        })
    }

    /// Verify the signature and apply the event. Unknown event types are
    /// acknowledged and ignored so the provider stops redelivering them.
    pub async fn process_webhook(
        &self,
        credits: &CreditService,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<WebhookOutcome, WebhookError> {
        verify_signature(
            payload,
            signature_header,
            &self.webhook_secret,
            Utc::now().timestamp(),
        )?;

        #[derive(Deserialize)]
        struct Event {
            #[serde(rename = "type")]
            event_type: String,
            data: EventData,
        }

        #[derive(Deserialize)]
        struct EventData {
            object: Value,
        }

        let event: Event = serde_json::from_slice(payload)
            .map_err(|e| WebhookError::MalformedPayload(e.to_string()))?;

        match event.event_type.as_str() {
            "checkout.session.completed" => {
                let metadata = &event.data.object["metadata"];
                let user_id = metadata["user_id"]
                    .as_str()
                    .and_then(|s| Uuid::parse_str(s).ok())
                    .ok_or_else(|| {
                        WebhookError::MalformedPayload("missing metadata.user_id".to_string())
                    })?;
                let granted = metadata["credits"]
                    .as_str()
                    .and_then(|s| s.parse::<i64>().ok())
                    .ok_or_else(|| {
                        WebhookError::MalformedPayload("missing metadata.credits".to_string())
                    })?;

                credits
                    .add(user_id, granted, TransactionType::Purchase, "Credit purchase")
                    .await?;

                if let Some(customer) = event.data.object["customer"].as_str() {
                    // Linking the billing customer is best-effort bookkeeping.
                    if let Err(e) = db::models::user_profile::UserProfile::set_billing_customer(
                        credits_pool(credits),
                        user_id,
                        customer,
                    )
                    .await
                    {
                        warn!(user_id = %user_id, error = %e, "failed to link billing customer");
                    }
                }

                info!(user_id = %user_id, credits = granted, "checkout completed, credits granted");
                Ok(WebhookOutcome::CreditsGranted {
                    user_id,
                    credits: granted,
                })
            }
            "payment_intent.payment_failed" => {
                warn!("payment failed webhook received");
                Ok(WebhookOutcome::PaymentFailed)
            }
            other => Ok(WebhookOutcome::Ignored {
                event_type: other.to_string(),
            }),
        }
    }

    /// Create a provider checkout session for a credit pack.
    pub async fn create_checkout_session(
        &self,
        user_id: Uuid,
        pack: CreditPack,
    ) -> Result<CheckoutSession, CheckoutError> {
        let api_key = self.api_key.as_ref().ok_or(CheckoutError::MissingApiKey)?;

        let credits = pack.credits().to_string();
        let amount = pack.price_cents().to_string();
        let user = user_id.to_string();

        let form: Vec<(&str, &str)> = vec![
            ("mode", "payment"),
            ("success_url", &self.success_url),
            ("cancel_url", &self.cancel_url),
            ("line_items[0][price_data][currency]", "usd"),
            ("line_items[0][price_data][product_data][name]", pack.label()),
            ("line_items[0][price_data][unit_amount]", &amount),
            ("line_items[0][quantity]", "1"),
            ("metadata[user_id]", &user),
            ("metadata[credits]", &credits),
        ];

        let res = self
            .http
            .post(format!("{}/v1/checkout/sessions", self.base_url))
            .basic_auth(api_key.expose_secret(), None::<&str>)
            .form(&form)
            .send()
            .await
            .map_err(|e| CheckoutError::Transport(e.to_string()))?;

        match res.status() {
            s if s.is_success() => res
                .json::<CheckoutSession>()
                .await
                .map_err(|e| CheckoutError::Serde(e.to_string())),
            StatusCode::UNAUTHORIZED => Err(CheckoutError::InvalidApiKey),
            s => Err(CheckoutError::Http {
                status: s.as_u16(),
                body: res.text().await.unwrap_or_default(),
            }),
        }
    }
}

/// The credit service owns the pool; reach through it for the one
/// profile-linking write the webhook does outside the ledger.
fn credits_pool(credits: &CreditService) -> &sqlx::SqlitePool {
    credits.pool()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(payload: &[u8], secret: &str, timestamp: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        let sig = hex::encode(mac.finalize().into_bytes());
        format!("t={timestamp},v1={sig}")
    }

    #[test]
    fn test_valid_signature_accepted() {
        let payload = br#"{"type":"checkout.session.completed"}"#;
        let header = sign(payload, "whsec_test", 1_700_000_000);
        assert!(verify_signature(payload, &header, "whsec_test", 1_700_000_000).is_ok());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let payload = b"{}";
        let header = sign(payload, "whsec_test", 1_700_000_000);
        assert!(matches!(
            verify_signature(payload, &header, "whsec_other", 1_700_000_000),
            Err(WebhookError::InvalidSignature)
        ));
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let header = sign(b"{}", "whsec_test", 1_700_000_000);
        assert!(matches!(
            verify_signature(b"{\"a\":1}", &header, "whsec_test", 1_700_000_000),
            Err(WebhookError::InvalidSignature)
        ));
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let payload = b"{}";
        let header = sign(payload, "whsec_test", 1_700_000_000);
        assert!(matches!(
            verify_signature(payload, &header, "whsec_test", 1_700_000_000 + 3600),
            Err(WebhookError::StaleTimestamp)
        ));
    }

    #[test]
    fn test_missing_parts_rejected() {
        assert!(matches!(
            verify_signature(b"{}", "v1=abcd", "s", 0),
            Err(WebhookError::MalformedHeader)
        ));
        assert!(matches!(
            verify_signature(b"{}", "t=123", "s", 123),
            Err(WebhookError::MalformedHeader)
        ));
    }

    #[test]
    fn test_second_v1_signature_accepted() {
        // During secret rotation the provider sends multiple v1 entries.
        let payload = b"{}";
        let good = sign(payload, "whsec_test", 1_700_000_000);
        let good_sig = good.split("v1=").nth(1).unwrap();
        let header = format!("t=1700000000,v1={},v1={good_sig}", "00".repeat(32));
        assert!(verify_signature(payload, &header, "whsec_test", 1_700_000_000).is_ok());
    }

    #[test]
    fn test_pack_amounts() {
        assert_eq!(CreditPack::Starter.credits(), 100);
        assert!(CreditPack::Scale.price_cents() > CreditPack::Growth.price_cents());
    }
}
