//! Backend for the energy dashboard.
//!
//! A user uploads (or the service fetches) a CSV of energy/weather readings;
//! the service normalizes it into a [`Table`], resamples the measure into
//! day/week/month buckets, and derives every chart the dashboard shows.
//!
//! Module boundaries follow the Explicit Module Boundary Pattern (EMBP): the
//! HTTP layer under `routes` uses the library only through crate-root items
//! (the re-exports below and the `ingest` module), while the library modules
//! import each other's types directly.
//!
//! - `ingest` – data-URL decoding, CSV parsing, timestamp normalization, remote fetch
//! - `aggregate` – time-bucketed reduction, categorization, summaries, chart data
//! - `dashboard` – assembly of the JSON document handed to the UI layer
//! - `session` – per-session upload slots
//! - `routes` – HTTP API
//! - `config` – environment configuration

pub mod aggregate;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod ingest;
pub mod models;
pub mod routes;
pub mod session;

pub use aggregate::{aggregate, categorize, summarize};
pub use config::Config;
pub use dashboard::{build_dashboard, timeseries, Dashboard, DashboardSettings, Section};
pub use error::{DashboardError, Result};
pub use ingest::{ingest, IngestOptions};
pub use models::{AggregatedRow, Bucket, CategoryCount, Reducer, Summary, Table, Value};
pub use session::{parse_session_id, SessionStore, Upload};

/// Build the full HTTP application for `config` with a fresh session store.
pub fn app(config: Config) -> axum::Router {
    // ---
    let sessions = SessionStore::new(config.session_capacity);
    routes::router(sessions, config)
}
