//! Error taxonomy for ingestion, aggregation and the session layer.
//!
//! Every fallible library operation returns [`DashboardError`]. The HTTP layer
//! maps each variant to a status code and a user-visible message; the binary
//! edge (`main.rs`, `config.rs`) keeps using `anyhow`.

use thiserror::Error;

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, DashboardError>;

#[derive(Debug, Error)]
pub enum DashboardError {
    // ---
    /// The byte stream is not valid UTF-8.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// The text is not well-formed delimited data.
    #[error("parse error: {0}")]
    Parse(String),

    /// The remote source could not be fetched (network, timeout, HTTP status).
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    /// A column required by the operation is absent.
    #[error("missing required column: '{0}'")]
    MissingColumn(String),

    /// Unrecognized bucket granularity code.
    #[error("invalid bucket '{0}' (expected D, W or M)")]
    InvalidBucket(String),

    /// Unrecognized reducer name.
    #[error("invalid reducer '{0}' (expected sum or mean)")]
    InvalidReducer(String),

    /// The upload payload is not a single base64 data URL.
    #[error("invalid upload: {0}")]
    InvalidUpload(String),

    /// Query string or path segment could not be decoded.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Request body exceeds the configured upload limit.
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("unknown session '{0}'")]
    UnknownSession(String),

    #[error("no remote data URL is configured")]
    RemoteNotConfigured,
}

impl From<csv::Error> for DashboardError {
    fn from(err: csv::Error) -> Self {
        // ---
        match err.kind() {
            csv::ErrorKind::Utf8 { .. } => DashboardError::Encoding(err.to_string()),
            _ => DashboardError::Parse(err.to_string()),
        }
    }
}

impl From<std::string::FromUtf8Error> for DashboardError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        DashboardError::Encoding(err.to_string())
    }
}

impl From<reqwest::Error> for DashboardError {
    fn from(err: reqwest::Error) -> Self {
        // ---
        if err.is_timeout() {
            DashboardError::SourceUnavailable(format!("request timed out: {err}"))
        } else {
            DashboardError::SourceUnavailable(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_missing_column_display() {
        // ---
        let msg = DashboardError::MissingColumn("energy_kWh".to_string()).to_string();
        assert!(msg.contains("missing required column"));
        assert!(msg.contains("energy_kWh"));
    }

    #[test]
    fn test_utf8_error_maps_to_encoding() {
        // ---
        let err = String::from_utf8(vec![0xff, 0xfe, 0x00]).unwrap_err();
        match DashboardError::from(err) {
            DashboardError::Encoding(_) => {}
            other => panic!("Expected Encoding error, got {other:?}"),
        }
    }

    #[test]
    fn test_csv_error_maps_to_parse() {
        // ---
        let data = "a,b\n1,2,3\n";
        let mut reader = csv::ReaderBuilder::new()
            .flexible(false)
            .from_reader(data.as_bytes());
        let err = reader
            .records()
            .find_map(|r| r.err())
            .expect("ragged row should fail");

        match DashboardError::from(err) {
            DashboardError::Parse(msg) => assert!(!msg.is_empty()),
            other => panic!("Expected Parse error, got {other:?}"),
        }
    }
}
