//! Assembly of the dashboard document returned to the UI layer.
//!
//! Ingestion failures abort the request before this module is reached. Once
//! a table exists, every chart is computed independently: a chart whose own
//! inputs are missing becomes an error [`Section`] carrying a user-visible
//! message, and the remaining charts still render.

use serde::Serialize;
use tracing::warn;

use crate::aggregate;
use crate::error::Result;
use crate::models::{
    AggregatedRow, Bucket, CategoryCount, CategoryTotal, HistogramBin, Reducer, ScatterPoint,
    Table, TablePreview, TrendLine,
};

/// Indicator text shown when a column has no numeric values.
pub const NO_DATA: &str = "no data";

// ---

/// Column names and chart parameters used to build a [`Dashboard`].
#[derive(Debug, Clone)]
pub struct DashboardSettings {
    // ---
    pub measure_column: String,
    pub temperature_column: String,
    pub category_column: String,
    pub category_threshold: f64,
    pub preview_rows: usize,
    pub histogram_bins: usize,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            measure_column: "energy_kWh".to_string(),
            temperature_column: "temperature".to_string(),
            category_column: "weather_type".to_string(),
            category_threshold: 100.0,
            preview_rows: 5,
            histogram_bins: 30,
        }
    }
}

/// One independently computed part of the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Section<T> {
    Ok { data: T },
    Error { message: String },
}

impl<T> Section<T> {
    /// Wrap a chart result, logging failures under `name`.
    fn from_result(name: &str, result: Result<T>) -> Self {
        // ---
        match result {
            Ok(data) => Section::Ok { data },
            Err(e) => {
                warn!("Chart '{}' unavailable: {}", name, e);
                Section::Error {
                    message: e.to_string(),
                }
            }
        }
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Section::Ok { data } => Some(data),
            Section::Error { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeries {
    pub period: &'static str,
    pub reducer: Reducer,
    pub rows: Vec<AggregatedRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScatterChart {
    pub points: Vec<ScatterPoint>,
    pub trend_line: Option<TrendLine>,
}

/// Mean and max formatted to two decimals, or [`NO_DATA`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Indicators {
    pub mean: String,
    pub max: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    // ---
    pub row_count: usize,
    pub preview: TablePreview,
    pub timeseries: Section<TimeSeries>,
    pub histogram: Section<Vec<HistogramBin>>,
    pub scatter: Section<ScatterChart>,
    pub proportions: Section<[CategoryCount; 2]>,
    pub category_totals: Section<Vec<CategoryTotal>>,
    pub indicators: Section<Indicators>,
}

/// Resampled series of the configured measure.
pub fn timeseries(
    table: &Table,
    settings: &DashboardSettings,
    bucket: Bucket,
    reducer: Reducer,
) -> Result<TimeSeries> {
    // ---
    let rows = aggregate::aggregate(table, &settings.measure_column, bucket, reducer)?;
    Ok(TimeSeries {
        period: bucket.code(),
        reducer,
        rows,
    })
}

/// Build every section of the dashboard from one normalized table.
pub fn build_dashboard(
    table: &Table,
    settings: &DashboardSettings,
    bucket: Bucket,
    reducer: Reducer,
) -> Dashboard {
    // ---
    let measure = settings.measure_column.as_str();

    let scatter = aggregate::scatter(table, &settings.temperature_column, measure).map(|points| {
        let trend_line = aggregate::trend_line(&points);
        ScatterChart { points, trend_line }
    });

    let indicators = aggregate::summarize(table, measure).map(|s| Indicators {
        mean: format_indicator(s.mean),
        max: format_indicator(s.max),
    });

    Dashboard {
        row_count: table.len(),
        preview: aggregate::preview(table, settings.preview_rows),
        timeseries: Section::from_result(
            "timeseries",
            timeseries(table, settings, bucket, reducer),
        ),
        histogram: Section::from_result(
            "histogram",
            aggregate::histogram(table, measure, settings.histogram_bins),
        ),
        scatter: Section::from_result("scatter", scatter),
        proportions: Section::from_result(
            "proportions",
            aggregate::categorize(table, measure, settings.category_threshold),
        ),
        category_totals: Section::from_result(
            "category_totals",
            aggregate::totals_by_category(table, &settings.category_column, measure),
        ),
        indicators: Section::from_result("indicators", indicators),
    }
}

pub fn format_indicator(value: Option<f64>) -> String {
    value.map_or_else(|| NO_DATA.to_string(), |v| format!("{v:.2}"))
}
