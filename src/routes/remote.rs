//! Fixed remote source: fetch the configured `DATA_URL` on demand.

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use super::{load_table, ApiError, PeriodQuery};
use crate::{build_dashboard, ingest, Config, Dashboard, DashboardError, SessionStore, Upload};

// ---

pub fn router() -> Router<(SessionStore, Config)> {
    // ---
    Router::new().route("/api/remote", post(handler))
}

#[derive(Debug, Serialize)]
pub struct RemoteResponse {
    session_id: Uuid,
    source: String,
    dashboard: Dashboard,
}

/// Handle `POST /api/remote?period=D&reducer=sum`: fetch the configured
/// `DATA_URL` into a new session and return its dashboard.
async fn handler(
    query: Result<Query<PeriodQuery>, QueryRejection>,
    State((sessions, config)): State<(SessionStore, Config)>,
) -> Result<Json<RemoteResponse>, ApiError> {
    // ---
    info!("POST /api/remote - Starting pipeline");
    let Query(params) = query?;

    let url = config
        .data_url
        .clone()
        .ok_or(DashboardError::RemoteNotConfigured)?;
    let bucket = params.bucket()?;
    let reducer = params.reducer()?;

    // Step 1: Fetch
    debug!("POST /api/remote - Step 1");
    let bytes = ingest::fetch_remote(&url, config.fetch_timeout).await?;

    // Step 2: Ingest
    debug!("POST /api/remote - Step 2");
    let table = load_table(&bytes, &config)?;

    // Step 3: Store and build
    debug!("POST /api/remote - Step 3");
    let session_id = sessions.create(Upload::new(url.clone(), bytes)).await;
    let dashboard = build_dashboard(&table, &config.dashboard_settings(), bucket, reducer);

    info!(
        "Remote dataset loaded into session {} ({} rows)",
        session_id, dashboard.row_count
    );
    Ok(Json(RemoteResponse {
        session_id,
        source: url,
        dashboard,
    }))
}
