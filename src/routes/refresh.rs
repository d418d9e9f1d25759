//! Control-change endpoints: recompute from the session's stored upload.

use axum::{
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, Query, State,
    },
    routing::get,
    Json, Router,
};
use tracing::{debug, info};

use super::{load_table, ApiError, PeriodQuery};
use crate::{
    build_dashboard, parse_session_id, timeseries, AggregatedRow, Config, Dashboard, SessionStore,
    Table,
};

// ---

pub fn router() -> Router<(SessionStore, Config)> {
    // ---
    Router::new()
        .route("/api/sessions/{id}/dashboard", get(dashboard_handler))
        .route("/api/sessions/{id}/timeseries", get(timeseries_handler))
}

/// Re-ingest the bytes held by session `raw_id`.
async fn session_table(sessions: &SessionStore, config: &Config, raw_id: &str) -> Result<Table, ApiError> {
    // ---
    let id = parse_session_id(raw_id)?;
    let upload = sessions.get(id).await?;
    debug!("Session {} holds '{}' ({} bytes)", id, upload.source, upload.bytes.len());
    Ok(load_table(&upload.bytes, config)?)
}

async fn dashboard_handler(
    path: Result<Path<String>, PathRejection>,
    query: Result<Query<PeriodQuery>, QueryRejection>,
    State((sessions, config)): State<(SessionStore, Config)>,
) -> Result<Json<Dashboard>, ApiError> {
    // ---
    let Path(id) = path?;
    let Query(params) = query?;
    info!("GET /api/sessions/{}/dashboard - {:?}", id, params);

    let bucket = params.bucket()?;
    let reducer = params.reducer()?;
    let table = session_table(&sessions, &config, &id).await?;
    Ok(Json(build_dashboard(
        &table,
        &config.dashboard_settings(),
        bucket,
        reducer,
    )))
}

/// Only the resampled series, for the period selector.
async fn timeseries_handler(
    path: Result<Path<String>, PathRejection>,
    query: Result<Query<PeriodQuery>, QueryRejection>,
    State((sessions, config)): State<(SessionStore, Config)>,
) -> Result<Json<Vec<AggregatedRow>>, ApiError> {
    // ---
    let Path(id) = path?;
    let Query(params) = query?;
    info!("GET /api/sessions/{}/timeseries - {:?}", id, params);

    let bucket = params.bucket()?;
    let reducer = params.reducer()?;
    let table = session_table(&sessions, &config, &id).await?;
    let series = timeseries(&table, &config.dashboard_settings(), bucket, reducer)?;

    debug!("Returning {} buckets", series.rows.len());
    Ok(Json(series.rows))
}
