//! Single-file CSV upload: decode the data URL, store it in a session and
//! answer with the full dashboard.

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use super::{load_table, ApiError};
use crate::{
    build_dashboard, ingest, parse_session_id, Bucket, Config, Dashboard, DashboardError, Reducer,
    SessionStore, Upload,
};

// ---

pub fn router() -> Router<(SessionStore, Config)> {
    // ---
    Router::new().route("/api/upload", post(handler))
}

/// A field that may carry one value or, for multi-file uploads, several.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

/// Body of `POST /api/upload`.
#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    /// `data:<mime>;base64,<payload>`
    contents: OneOrMany,
    filename: Option<OneOrMany>,
    /// Existing session to overwrite; a new session is created when absent.
    session_id: Option<String>,
    period: Option<String>,
    /// `sum` (default) or `mean` for the time series chart.
    reducer: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    session_id: Uuid,
    filename: String,
    dashboard: Dashboard,
}

async fn handler(
    State((sessions, config)): State<(SessionStore, Config)>,
    payload: Result<Json<UploadRequest>, JsonRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    // ---
    info!("POST /api/upload - Starting pipeline");
    let Json(req) = payload?;

    let contents = match req.contents {
        OneOrMany::One(contents) => contents,
        OneOrMany::Many(_) => {
            return Err(DashboardError::InvalidUpload(
                "multi-file upload is not supported, send one file per request".into(),
            )
            .into())
        }
    };
    let filename = match req.filename {
        Some(OneOrMany::One(name)) => name,
        _ => "upload.csv".to_string(),
    };
    let bucket = match req.period.as_deref() {
        Some(code) => code.parse::<Bucket>()?,
        None => Bucket::default(),
    };
    let reducer = match req.reducer.as_deref() {
        Some(name) => name.parse::<Reducer>()?,
        None => Reducer::default(),
    };

    // Step 1: Decode and ingest. A failed upload leaves the session slot unchanged
    debug!("POST /api/upload - Step 1: decode '{}'", filename);
    let bytes = ingest::decode_upload(&contents)?;
    let table = load_table(&bytes, &config)?;

    // Step 2: Store the raw bytes in the caller's session slot
    debug!("POST /api/upload - Step 2: store {} bytes", bytes.len());
    let upload = Upload::new(filename.clone(), bytes);
    let session_id = match req.session_id.as_deref() {
        Some(raw) => {
            let id = parse_session_id(raw)?;
            sessions.replace(id, upload).await?;
            id
        }
        None => sessions.create(upload).await,
    };

    // Step 3: Build every chart
    debug!("POST /api/upload - Step 3: build dashboard");
    let dashboard = build_dashboard(&table, &config.dashboard_settings(), bucket, reducer);

    info!(
        "Upload '{}' loaded into session {} ({} rows)",
        filename, session_id, dashboard.row_count
    );
    Ok(Json(UploadResponse {
        session_id,
        filename,
        dashboard,
    }))
}
