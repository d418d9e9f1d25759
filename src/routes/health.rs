// src/routes/health.rs
//! Liveness endpoint for the energy dashboard service.
//!
//! `GET /health` reports that the process is serving requests, how many
//! upload sessions are currently retained, and whether the remote data
//! source is configured. It never touches the remote source itself.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::{Config, SessionStore};

/// JSON response body for the `/health` endpoint.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    sessions: usize,
    remote_configured: bool,
}

/// Handle `GET /health`.
async fn health(State((sessions, config)): State<(SessionStore, Config)>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        sessions: sessions.len().await,
        remote_configured: config.data_url.is_some(),
    })
}

/// Subrouter containing the `/health` route.
pub fn router() -> Router<(SessionStore, Config)> {
    Router::new().route("/health", get(health))
}
