use anyhow::{Context, Result};
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::AppState;

pub mod health;
pub mod webhook;

/// Stripe events are small; anything larger is not a webhook.
const MAX_BODY_BYTES: usize = 1024 * 1024;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/webhook/stripe", post(webhook::stripe_webhook))
        .route("/health", get(health::health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
}

pub async fn bind(port: u16) -> Result<TcpListener> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on {}", addr);
    Ok(listener)
}

pub async fn serve(
    listener: TcpListener,
    state: AppState,
    mut shutdown_signal: tokio::sync::broadcast::Receiver<()>,
) -> Result<()> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown_signal.recv().await;
            info!("HTTP server received shutdown signal, stopping...");
        })
        .await
        .context("HTTP server failed")?;
    Ok(())
}
