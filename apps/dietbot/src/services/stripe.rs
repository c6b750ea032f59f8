use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;
use tracing::{debug, info};

type HmacSha256 = Hmac<Sha256>;

pub const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Opens a one-item checkout session tagged with the Telegram user id.
    async fn create_checkout_session(
        &self,
        tg_id: i64,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<CheckoutSession>;

    async fn is_session_paid(&self, session_id: &str) -> Result<bool>;
}

pub struct StripeClient {
    client: reqwest::Client,
    secret_key: String,
    price_id: String,
    api_base: String,
}

impl StripeClient {
    pub fn new(secret_key: String, price_id: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            secret_key,
            price_id,
            api_base: STRIPE_API_BASE.to_string(),
        }
    }

    async fn read_json(resp: reqwest::Response) -> Result<serde_json::Value> {
        let status = resp.status();
        let body: serde_json::Value = resp
            .json()
            .await
            .context("Failed to decode Stripe response")?;
        if !status.is_success() {
            let message = body["error"]["message"].as_str().unwrap_or("unknown error");
            return Err(anyhow!("Stripe Error ({}): {}", status, message));
        }
        Ok(body)
    }
}

#[async_trait]
impl PaymentGateway for StripeClient {
    async fn create_checkout_session(
        &self,
        tg_id: i64,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<CheckoutSession> {
        info!("Creating Stripe Session for user {}", tg_id);

        let reference = tg_id.to_string();
        let params = [
            ("mode", "payment"),
            ("payment_method_types[]", "card"),
            ("line_items[0][price]", self.price_id.as_str()),
            ("line_items[0][quantity]", "1"),
            ("success_url", success_url),
            ("cancel_url", cancel_url),
            ("client_reference_id", reference.as_str()),
        ];

        let resp = self
            .client
            .post(format!("{}/checkout/sessions", self.api_base))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&params)
            .send()
            .await
            .context("Stripe checkout request failed")?;

        let body = Self::read_json(resp).await?;
        match (body["id"].as_str(), body["url"].as_str()) {
            (Some(id), Some(url)) => Ok(CheckoutSession {
                id: id.to_string(),
                url: url.to_string(),
            }),
            _ => Err(anyhow!("Stripe Error: session without id or url: {:?}", body)),
        }
    }

    async fn is_session_paid(&self, session_id: &str) -> Result<bool> {
        let resp = self
            .client
            .get(format!(
                "{}/checkout/sessions/{}",
                self.api_base,
                urlencoding::encode(session_id)
            ))
            .basic_auth(&self.secret_key, None::<&str>)
            .send()
            .await
            .context("Stripe session lookup failed")?;

        let body = Self::read_json(resp).await?;
        let status = body["payment_status"].as_str().unwrap_or_default();
        debug!("Stripe session {} payment_status={}", session_id, status);
        Ok(status == "paid")
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing Stripe-Signature header")]
    MissingHeader,
    #[error("missing timestamp in signature")]
    MissingTimestamp,
    #[error("missing v1 signature")]
    MissingSignature,
    #[error("signature timestamp outside tolerance")]
    StaleTimestamp,
    #[error("invalid Stripe signature")]
    Mismatch,
}

/// Checks a `Stripe-Signature` header (`t=<unix>,v1=<hex>[,v1=...]`) against
/// HMAC-SHA256 of `"{t}.{payload}"`. Any matching `v1` entry is accepted.
pub fn verify_signature(
    payload: &[u8],
    header: Option<&str>,
    secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> Result<(), SignatureError> {
    let header = header.ok_or(SignatureError::MissingHeader)?;

    let mut timestamp = None;
    let mut candidates = Vec::new();
    for part in header.split(',') {
        let part = part.trim();
        if let Some(val) = part.strip_prefix("t=") {
            timestamp = val.parse::<i64>().ok();
        } else if let Some(val) = part.strip_prefix("v1=") {
            candidates.push(val);
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::MissingTimestamp)?;
    if candidates.is_empty() {
        return Err(SignatureError::MissingSignature);
    }
    let stale = now
        .checked_sub(timestamp)
        .and_then(i64::checked_abs)
        .map_or(true, |skew| skew > tolerance_secs);
    if stale {
        return Err(SignatureError::StaleTimestamp);
    }

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::Mismatch)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);

    let matched = candidates.iter().any(|candidate| match hex::decode(candidate) {
        Ok(bytes) => mac.clone().verify_slice(&bytes).is_ok(),
        Err(_) => false,
    });

    if matched {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

#[derive(Debug, Deserialize)]
pub struct StripeEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: EventData,
}

#[derive(Debug, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

#[cfg(test)]
pub fn sign_payload(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{}.", timestamp).as_bytes());
    mac.update(payload);
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}
