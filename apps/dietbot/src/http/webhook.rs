use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::services::completion::CompletionOutcome;
use crate::services::stripe::{verify_signature, SignatureError, StripeEvent};
use crate::AppState;

pub const ACCEPTED: &str = "Webhook received";

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("webhook secret is not configured")]
    NotConfigured,
    #[error(transparent)]
    Signature(#[from] SignatureError),
    #[error("unparsable event: {0}")]
    InvalidEvent(String),
    #[error("missing or invalid client_reference_id")]
    InvalidReference,
    #[error("missing checkout session id")]
    MissingSession,
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match self {
            WebhookError::NotConfigured => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        };
        (status, self.to_string()).into_response()
    }
}

fn client_reference(object: &serde_json::Value) -> Option<i64> {
    let value = &object["client_reference_id"];
    value
        .as_str()
        .and_then(|v| v.trim().parse().ok())
        .or_else(|| value.as_i64())
}

pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<&'static str, WebhookError> {
    let secret = state.config.stripe_webhook_secret.as_str();
    if secret.is_empty() {
        error!("Stripe webhook called but no webhook secret is configured");
        return Err(WebhookError::NotConfigured);
    }

    let signature = headers
        .get("stripe-signature")
        .and_then(|h| h.to_str().ok());
    if let Err(e) = verify_signature(
        &body,
        signature,
        secret,
        state.config.webhook_tolerance_secs,
        Utc::now().timestamp(),
    ) {
        warn!("Rejected Stripe webhook: {}", e);
        return Err(e.into());
    }

    let event: StripeEvent =
        serde_json::from_slice(&body).map_err(|e| WebhookError::InvalidEvent(e.to_string()))?;
    let object = &event.data.object;

    match event.kind.as_str() {
        "checkout.session.completed" => {
            let user_id = client_reference(object).ok_or(WebhookError::InvalidReference)?;
            let session_ref = object["id"]
                .as_str()
                .ok_or(WebhookError::MissingSession)?
                .to_string();
            info!(
                "Checkout session {} completed for user {}",
                session_ref, user_id
            );

            let completion = state.completion.clone();
            tokio::spawn(async move {
                match completion.on_payment_confirmed(user_id, &session_ref).await {
                    Ok(CompletionOutcome::Delivered) => {
                        info!("Plan delivered to user {} via webhook", user_id)
                    }
                    Ok(CompletionOutcome::AlreadyCompleted) => {
                        info!("Webhook for {} arrived after completion", session_ref)
                    }
                    Err(e) => error!("Completion for user {} failed: {}", user_id, e),
                }
            });
        }
        "payment_intent.succeeded" => {
            info!("Payment intent {} succeeded", object["id"].as_str().unwrap_or("?"));
        }
        "payment_intent.payment_failed" => {
            error!(
                "Payment intent {} failed: {}",
                object["id"].as_str().unwrap_or("?"),
                object["last_payment_error"]["message"]
                    .as_str()
                    .unwrap_or("no failure message")
            );
        }
        other => debug!("Ignoring Stripe event {}", other),
    }

    Ok(ACCEPTED)
}
