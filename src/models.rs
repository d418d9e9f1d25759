//! Data models for the energy dashboard.
//!
//! A [`Table`] is the in-memory form of an uploaded CSV: ordered column names,
//! ordered rows of [`Value`] cells, and the name of the designated timestamp
//! column. Tables are never mutated after construction; every transformation
//! in `ingest` and `aggregate` builds a new one.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Days, NaiveDateTime, NaiveTime};
use serde::Serialize;

use crate::error::{DashboardError, Result};

// ---

/// A single table cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    // ---
    Null,
    Number(f64),
    Text(String),
    Timestamp(NaiveDateTime),
}

impl Value {
    // ---
    /// Type a raw CSV cell: empty → null, finite float → number, else text.
    pub fn from_cell(raw: &str) -> Self {
        // ---
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Value::Null;
        }
        match trimmed.parse::<f64>() {
            Ok(v) if v.is_finite() => Value::Number(v),
            Ok(_) => Value::Null,
            Err(_) => Value::Text(trimmed.to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Number(v) => write!(f, "{v}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%dT%H:%M:%S")),
        }
    }
}

/// Tabular dataset with a designated timestamp column.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    // ---
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    time_column: String,
}

impl Table {
    // ---
    /// Build a table. Rows shorter than the header are padded with nulls and
    /// longer rows are truncated, so every row has exactly one cell per column.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>, time_column: impl Into<String>) -> Self {
        // ---
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Value::Null);
                row
            })
            .collect();

        Self {
            columns,
            rows,
            time_column: time_column.into(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn time_column(&self) -> &str {
        &self.time_column
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Validated schema lookup: position of `name`, or `MissingColumn`.
    pub fn column_index(&self, name: &str) -> Result<usize> {
        // ---
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| DashboardError::MissingColumn(name.to_string()))
    }

    /// All cells of one column, in row order.
    pub fn column(&self, name: &str) -> Result<impl Iterator<Item = &Value> + '_> {
        // ---
        let idx = self.column_index(name)?;
        Ok(self.rows.iter().map(move |row| &row[idx]))
    }

    /// Numeric view of one column; non-numeric cells come back as `None`.
    pub fn numbers(&self, name: &str) -> Result<impl Iterator<Item = Option<f64>> + '_> {
        Ok(self.column(name)?.map(Value::as_f64))
    }

    /// Timestamp column cells paired with the `measure` cells of the same row.
    pub fn timestamps_with(
        &self,
        measure: &str,
    ) -> Result<impl Iterator<Item = (Option<NaiveDateTime>, Option<f64>)> + '_> {
        // ---
        let ts_idx = self.column_index(&self.time_column)?;
        let m_idx = self.column_index(measure)?;
        Ok(self
            .rows
            .iter()
            .map(move |row| (row[ts_idx].as_timestamp(), row[m_idx].as_f64())))
    }
}

// ---

/// Time bucket granularity used for resampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Bucket {
    #[default]
    Day,
    /// ISO week, starting Monday 00:00.
    Week,
    /// Calendar month, starting on the 1st at 00:00.
    Month,
}

impl Bucket {
    // ---
    /// Truncate `ts` to the start of its bucket. Idempotent.
    pub fn truncate(self, ts: NaiveDateTime) -> NaiveDateTime {
        // ---
        let date = ts.date();
        let start = match self {
            Bucket::Day => date,
            Bucket::Week => date - Days::new(u64::from(date.weekday().num_days_from_monday())),
            Bucket::Month => date - Days::new(u64::from(date.day0())),
        };
        start.and_time(NaiveTime::MIN)
    }

    pub fn code(self) -> &'static str {
        match self {
            Bucket::Day => "D",
            Bucket::Week => "W",
            Bucket::Month => "M",
        }
    }
}

impl FromStr for Bucket {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self> {
        // ---
        match s.trim() {
            "D" | "day" => Ok(Bucket::Day),
            "W" | "week" => Ok(Bucket::Week),
            "M" | "month" => Ok(Bucket::Month),
            other => Err(DashboardError::InvalidBucket(other.to_string())),
        }
    }
}

/// Reduction applied to the measure values inside a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Reducer {
    #[default]
    Sum,
    Mean,
}

impl Reducer {
    // ---
    /// Reduce the numeric values of one bucket.
    ///
    /// An empty bucket sums to `0` and has no mean (`None`).
    pub fn reduce(self, values: &[f64]) -> Option<f64> {
        // ---
        let total: f64 = values.iter().sum();
        match self {
            Reducer::Sum => Some(total),
            Reducer::Mean if values.is_empty() => None,
            Reducer::Mean => Some(total / values.len() as f64),
        }
    }
}

impl FromStr for Reducer {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "sum" => Ok(Reducer::Sum),
            "mean" => Ok(Reducer::Mean),
            other => Err(DashboardError::InvalidReducer(other.to_string())),
        }
    }
}

// ---

/// One row of a resampled time series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedRow {
    pub bucket: NaiveDateTime,
    pub value: Option<f64>,
}

/// One slice of the two-way proportion chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub label: String,
    pub count: usize,
}

/// Sum of the measure for one value of a categorical column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTotal {
    pub category: String,
    pub total: f64,
}

/// Mean and max over the non-null values of a column. `None` means no data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub mean: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBin {
    pub start: f64,
    pub end: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScatterPoint {
    pub x: f64,
    pub y: f64,
}

/// Ordinary least squares fit `y = slope * x + intercept`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrendLine {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
}

/// First rows of a table, as shown in the dashboard preview.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TablePreview {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}
