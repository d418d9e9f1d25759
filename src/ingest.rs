//! Ingestion and normalization of uploaded or fetched CSV data.
//!
//! The pipeline is: data URL → bytes → UTF-8 text → CSV rows → [`Table`]
//! with a parsed timestamp column. Unparseable timestamps become
//! [`Value::Null`] instead of failing the whole upload; malformed CSV or
//! undecodable bytes fail with a typed error so the caller never sees a
//! silently empty table.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use csv::ReaderBuilder;
use tracing::{debug, warn};

use crate::error::{DashboardError, Result};
use crate::models::{Bucket, Table, Value};

/// Name of the derived date-only column.
pub const DAY_COLUMN: &str = "day";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d.%m.%Y", "%Y/%m/%d"];

// ---

/// Knobs for [`ingest`].
#[derive(Debug, Clone)]
pub struct IngestOptions {
    // ---
    /// Designated timestamp column. If absent, the first column is renamed.
    pub time_column: String,

    /// Identifier column to discard when present.
    pub drop_column: Option<String>,

    /// Append a [`DAY_COLUMN`] holding each timestamp truncated to midnight.
    pub derive_day_column: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            time_column: "date".to_string(),
            drop_column: None,
            derive_day_column: false,
        }
    }
}

/// Decode a single-file upload of the form `data:<mime>;base64,<payload>`.
pub fn decode_upload(contents: &str) -> Result<Vec<u8>> {
    // ---
    let (header, payload) = contents.split_once(',').ok_or_else(|| {
        DashboardError::InvalidUpload("expected a data URL of the form 'data:<mime>;base64,<payload>'".into())
    })?;

    if !header.ends_with(";base64") {
        return Err(DashboardError::InvalidUpload(format!(
            "payload is not base64-encoded (header '{header}')"
        )));
    }

    STANDARD
        .decode(payload.trim())
        .map_err(|e| DashboardError::InvalidUpload(format!("invalid base64 payload: {e}")))
}

/// Decode bytes as UTF-8, stripping a leading byte order mark.
pub fn decode_text(bytes: &[u8]) -> Result<String> {
    // ---
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    Ok(String::from_utf8(bytes.to_vec())?)
}

/// Parse raw CSV bytes into a normalized [`Table`].
///
/// Fails with `Encoding` for non-UTF-8 input and `Parse` for malformed CSV
/// (no header row, ragged rows).
pub fn ingest(bytes: &[u8], options: &IngestOptions) -> Result<Table> {
    // ---
    let text = decode_text(bytes)?;

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .trim(csv::Trim::Headers)
        .from_reader(text.as_bytes());

    let mut columns: Vec<String> = reader.headers()?.iter().map(String::from).collect();
    if columns.is_empty() || columns.iter().all(|c| c.is_empty()) {
        return Err(DashboardError::Parse("input has no header row".into()));
    }

    // Locate the timestamp column, falling back to the first column
    let ts_idx = match columns.iter().position(|c| *c == options.time_column) {
        Some(idx) => idx,
        None => {
            debug!(
                "Column '{}' not found, renaming first column '{}'",
                options.time_column, columns[0]
            );
            columns[0] = options.time_column.clone();
            0
        }
    };

    let mut rows = Vec::new();
    let mut bad_timestamps = 0usize;
    for record in reader.records() {
        let record = record?;
        let row: Vec<Value> = record
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                if i != ts_idx {
                    return Value::from_cell(cell);
                }
                match parse_timestamp(cell) {
                    Some(ts) => Value::Timestamp(ts),
                    None => {
                        if !cell.trim().is_empty() {
                            bad_timestamps += 1;
                        }
                        Value::Null
                    }
                }
            })
            .collect();
        rows.push(row);
    }

    if bad_timestamps > 0 {
        warn!(
            "{} value(s) in '{}' could not be parsed as timestamps and were set to null",
            bad_timestamps, options.time_column
        );
    }

    let mut table = Table::new(columns, rows, options.time_column.clone());

    if let Some(drop) = options.drop_column.as_deref() {
        table = drop_column(&table, drop);
    }
    if options.derive_day_column {
        table = with_day_column(&table);
    }

    debug!(
        "Ingested {} rows x {} columns",
        table.len(),
        table.columns().len()
    );
    Ok(table)
}

/// Copy of `table` without column `name`. The timestamp column is never dropped.
pub fn drop_column(table: &Table, name: &str) -> Table {
    // ---
    if name == table.time_column() {
        warn!("Refusing to drop timestamp column '{}'", name);
        return table.clone();
    }
    let Ok(idx) = table.column_index(name) else {
        return table.clone();
    };

    let columns = table
        .columns()
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != idx)
        .map(|(_, c)| c.clone())
        .collect();
    let rows = table
        .rows()
        .iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .filter(|(i, _)| *i != idx)
                .map(|(_, v)| v.clone())
                .collect()
        })
        .collect();

    Table::new(columns, rows, table.time_column())
}

/// Copy of `table` with a [`DAY_COLUMN`] appended, unless one already exists.
pub fn with_day_column(table: &Table) -> Table {
    // ---
    if table.has_column(DAY_COLUMN) {
        return table.clone();
    }
    let Ok(ts_idx) = table.column_index(table.time_column()) else {
        return table.clone();
    };

    let mut columns = table.columns().to_vec();
    columns.push(DAY_COLUMN.to_string());

    let rows = table
        .rows()
        .iter()
        .map(|row| {
            let day = row[ts_idx]
                .as_timestamp()
                .map(|ts| Value::Timestamp(Bucket::Day.truncate(ts)))
                .unwrap_or(Value::Null);
            let mut row = row.clone();
            row.push(day);
            row
        })
        .collect();

    Table::new(columns, rows, table.time_column())
}

/// Parse a timestamp cell. RFC 3339 values are converted to UTC.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    // ---
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

/// Fetch the CSV at `url`. Network errors, timeouts and non-2xx statuses are
/// reported as `SourceUnavailable`; there is no retry.
pub async fn fetch_remote(url: &str, timeout: Duration) -> Result<Vec<u8>> {
    // ---
    let client = reqwest::Client::builder().timeout(timeout).build()?;

    debug!("Fetching remote dataset from: {}", url);
    let response = client.get(url).send().await?.error_for_status()?;
    let bytes = response.bytes().await?;

    debug!("Fetched {} bytes from {}", bytes.len(), url);
    Ok(bytes.to_vec())
}
