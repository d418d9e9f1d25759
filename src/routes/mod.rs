//! Route gateway for the energy dashboard API (EMBP).
//!
//! Each sibling module exports a subrouter; this gateway merges them, applies
//! the upload body limit and attaches the shared `(SessionStore, Config)`
//! state. Library errors are converted to JSON `{"error": ...}` responses
//! here so no handler ever panics on bad input.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        DefaultBodyLimit,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::{Bucket, Config, DashboardError, Reducer, SessionStore, Table};

mod health;
mod refresh;
mod remote;
mod upload;

// ---

pub fn router(sessions: SessionStore, config: Config) -> Router {
    // ---
    let body_limit = config.max_upload_bytes;

    Router::new()
        .merge(upload::router())
        .merge(remote::router())
        .merge(refresh::router())
        .merge(health::router())
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state((sessions, config))
}

/// JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Handler error: a [`DashboardError`] rendered as a status code plus message.
#[derive(Debug)]
pub struct ApiError(DashboardError);

impl From<DashboardError> for ApiError {
    fn from(err: DashboardError) -> Self {
        ApiError(err)
    }
}

// Extractor rejections become DashboardError variants and share the JSON shape.

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        // ---
        let msg = rejection.body_text();
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError(DashboardError::PayloadTooLarge(msg))
        } else {
            ApiError(DashboardError::InvalidUpload(msg))
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError(DashboardError::InvalidRequest(rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError(DashboardError::InvalidRequest(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // ---
        let status = match &self.0 {
            DashboardError::Encoding(_)
            | DashboardError::Parse(_)
            | DashboardError::InvalidBucket(_)
            | DashboardError::InvalidReducer(_)
            | DashboardError::InvalidUpload(_)
            | DashboardError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            DashboardError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            DashboardError::MissingColumn(_) => StatusCode::UNPROCESSABLE_ENTITY,
            DashboardError::UnknownSession(_) => StatusCode::NOT_FOUND,
            DashboardError::SourceUnavailable(_) => StatusCode::BAD_GATEWAY,
            DashboardError::RemoteNotConfigured => StatusCode::SERVICE_UNAVAILABLE,
        };

        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        } else {
            warn!("Request rejected: {}", self.0);
        }

        let body = ErrorResponse {
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Query parameters shared by the dashboard endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct PeriodQuery {
    /// Bucket code: `D` (default), `W` or `M`.
    period: Option<String>,
    /// `sum` (default) or `mean`.
    reducer: Option<String>,
}

impl PeriodQuery {
    // ---
    fn bucket(&self) -> Result<Bucket, DashboardError> {
        self.period.as_deref().map_or(Ok(Bucket::default()), str::parse)
    }

    fn reducer(&self) -> Result<Reducer, DashboardError> {
        self.reducer.as_deref().map_or(Ok(Reducer::default()), str::parse)
    }
}

/// Re-run ingestion on raw bytes with the configured options.
fn load_table(bytes: &[u8], config: &Config) -> Result<Table, DashboardError> {
    crate::ingest::ingest(bytes, &config.ingest_options())
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const CSV: &str = "\
id,date,energy_kWh,temperature,weather_type
1,2024-01-01,10,1.5,sunny
2,2024-01-01,20,2.5,cloudy
3,2024-01-09,150,3.5,sunny
";

    fn app() -> Router {
        let config = Config {
            drop_column: Some("id".into()),
            ..Config::default()
        };
        router(SessionStore::new(8), config)
    }

    fn data_url(csv: &str) -> String {
        format!("data:text/csv;base64,{}", STANDARD.encode(csv))
    }

    async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
        // ---
        let response = app.oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        // ---
        let (status, body) = send(app(), get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"status": "ok", "sessions": 0, "remote_configured": false})
        );
    }

    #[tokio::test]
    async fn test_upload_returns_dashboard() {
        // ---
        let req = post_json(
            "/api/upload",
            json!({"contents": data_url(CSV), "filename": "solar.csv"}),
        );
        let (status, body) = send(app(), req).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["filename"], "solar.csv");
        assert!(body["session_id"].is_string());

        let dash = &body["dashboard"];
        assert_eq!(dash["row_count"], 3);
        assert_eq!(
            dash["preview"]["columns"],
            json!(["date", "energy_kWh", "temperature", "weather_type"])
        );
        assert_eq!(dash["timeseries"]["status"], "ok");
        assert_eq!(
            dash["timeseries"]["data"]["rows"][0],
            json!({"bucket": "2024-01-01T00:00:00", "value": 30.0})
        );
        assert_eq!(dash["indicators"]["data"]["mean"], "60.00");
    }

    #[tokio::test]
    async fn test_multi_file_upload_rejected() {
        // ---
        let req = post_json(
            "/api/upload",
            json!({"contents": [data_url(CSV), data_url(CSV)], "filename": ["a.csv", "b.csv"]}),
        );
        let (status, body) = send(app(), req).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("multi-file"));
    }

    #[tokio::test]
    async fn test_malformed_csv_rejected() {
        // ---
        let req = post_json(
            "/api/upload",
            json!({"contents": data_url("date,energy_kWh\n2024-01-01,1,2\n")}),
        );
        let (status, body) = send(app(), req).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("parse error"));
    }

    #[tokio::test]
    async fn test_invalid_period_rejected() {
        // ---
        let req = post_json(
            "/api/upload",
            json!({"contents": data_url(CSV), "period": "Y"}),
        );
        let (status, body) = send(app(), req).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("invalid bucket"));
    }

    #[tokio::test]
    async fn test_refresh_uses_session_upload() {
        // ---
        let app = app();
        let req = post_json("/api/upload", json!({"contents": data_url(CSV)}));
        let (_, body) = send(app.clone(), req).await;
        let id = body["session_id"].as_str().unwrap().to_string();

        let uri = format!("/api/sessions/{id}/timeseries?period=W&reducer=mean");
        let (status, body) = send(app.clone(), get(&uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!([
                {"bucket": "2024-01-01T00:00:00", "value": 15.0},
                {"bucket": "2024-01-08T00:00:00", "value": 150.0}
            ])
        );

        let uri = format!("/api/sessions/{id}/dashboard?period=M");
        let (status, body) = send(app, get(&uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["timeseries"]["data"]["period"], "M");
        assert_eq!(body["timeseries"]["data"]["rows"][0]["value"], 180.0);
    }

    #[tokio::test]
    async fn test_unknown_session() {
        // ---
        let uri = format!("/api/sessions/{}/dashboard", uuid::Uuid::new_v4());
        let (status, _) = send(app(), get(&uri)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(app(), get("/api/sessions/garbage/timeseries")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_remote_not_configured() {
        // ---
        let req = Request::post("/api/remote").body(Body::empty()).unwrap();
        let (status, body) = send(app(), req).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["error"].as_str().unwrap().contains("remote"));
    }

    #[tokio::test]
    async fn test_malformed_upload_bodies_get_json_errors() {
        // ---
        let missing_contents = post_json("/api/upload", json!({"filename": "a.csv"}));
        let not_json = Request::post("/api/upload")
            .header("content-type", "application/json")
            .body(Body::from("contents=abc"))
            .unwrap();
        let no_content_type = Request::post("/api/upload")
            .body(Body::from(json!({"contents": data_url(CSV)}).to_string()))
            .unwrap();

        for req in [missing_contents, not_json, no_content_type] {
            let (status, body) = send(app(), req).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert!(body["error"].as_str().unwrap().starts_with("invalid upload"));
        }
    }

    #[tokio::test]
    async fn test_bad_query_string_gets_json_error() {
        // ---
        let req = Request::post("/api/remote?period=D&period=W")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(app(), req).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("invalid request"));
    }

    #[tokio::test]
    async fn test_oversized_upload_rejected() {
        // ---
        let config = Config {
            max_upload_bytes: 64,
            ..Config::default()
        };
        let app = router(SessionStore::new(8), config);
        let req = post_json("/api/upload", json!({"contents": data_url(CSV)}));
        let (status, body) = send(app, req).await;

        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert!(body["error"].as_str().unwrap().starts_with("payload too large"));
    }

    #[tokio::test]
    async fn test_missing_measure_column_is_unprocessable() {
        // ---
        let app = app();
        let csv = "date,solar_radiation\n2024-01-01,1\n";
        let req = post_json("/api/upload", json!({"contents": data_url(csv)}));
        let (status, body) = send(app.clone(), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["dashboard"]["timeseries"]["status"], "error");
        let id = body["session_id"].as_str().unwrap().to_string();

        let uri = format!("/api/sessions/{id}/timeseries");
        let (status, body) = send(app, get(&uri)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"].as_str().unwrap().contains("energy_kWh"));
    }

    #[tokio::test]
    async fn test_dashboard_honours_reducer() {
        // ---
        let app = app();
        let req = post_json(
            "/api/upload",
            json!({"contents": data_url(CSV), "reducer": "mean"}),
        );
        let (status, body) = send(app.clone(), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["dashboard"]["timeseries"]["data"]["reducer"], "mean");
        let id = body["session_id"].as_str().unwrap().to_string();

        let uri = format!("/api/sessions/{id}/dashboard?period=W&reducer=mean");
        let (status, body) = send(app, get(&uri)).await;
        assert_eq!(status, StatusCode::OK);

        let series = &body["timeseries"]["data"];
        assert_eq!(series["reducer"], "mean");
        assert_eq!(
            series["rows"],
            json!([
                {"bucket": "2024-01-01T00:00:00", "value": 15.0},
                {"bucket": "2024-01-08T00:00:00", "value": 150.0}
            ])
        );
    }
}
