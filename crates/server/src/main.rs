use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Router,
};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use user_sync::WebhookVerifier;

mod app_state;
mod config;
mod db;
mod webhook;

use app_state::AppState;
use config::{load_settings, prepare_database_url};
use db::LazyStorage;

const MAX_WEBHOOK_BODY_BYTES: usize = 1024 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let settings = load_settings();
    let database_url = prepare_database_url(&settings.database_url)?;
    let secret = settings
        .signing_secret
        .as_deref()
        .context("SIGNING_SECRET is not configured; webhook deliveries cannot be verified")?;
    let verifier = WebhookVerifier::new(secret)
        .context("SIGNING_SECRET is not a usable webhook secret")?
        .with_tolerance(Duration::from_secs(settings.signature_tolerance_seconds));

    let state = AppState {
        storage: Arc::new(LazyStorage::new(database_url)),
        verifier,
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route(
            "/api/clerk",
            post(webhook::clerk_webhook).layer(RequestBodyLimitLayer::new(MAX_WEBHOOK_BODY_BYTES)),
        )
        .with_state(state)
}

async fn healthz(State(state): State<Arc<AppState>>) -> Result<&'static str, StatusCode> {
    let storage = state.storage.get().await.map_err(|error| {
        error!(error = %format!("{error:#}"), "healthz: user store unavailable");
        StatusCode::SERVICE_UNAVAILABLE
    })?;
    storage.health_check().await.map_err(|error| {
        error!(error = %format!("{error:#}"), "healthz: ping failed");
        StatusCode::SERVICE_UNAVAILABLE
    })?;
    Ok("ok")
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
