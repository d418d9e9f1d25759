//! Aggregations that turn a normalized [`Table`] into chart-sized data.
//!
//! All functions are pure and single-pass over the input table. Column
//! access goes through [`Table::column_index`], so a missing column is a
//! `MissingColumn` error rather than a panic.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;

use crate::error::Result;
use crate::models::{
    AggregatedRow, Bucket, CategoryCount, CategoryTotal, HistogramBin, Reducer, ScatterPoint,
    Summary, Table, TablePreview, TrendLine, Value,
};

// ---

/// Resample `measure` into `bucket`-sized intervals reduced with `reducer`.
///
/// Rows with a null timestamp belong to no bucket and are skipped. Null or
/// non-numeric measures are ignored within their bucket. Output is sorted by
/// bucket start; buckets absent from the input are not filled in.
pub fn aggregate(
    table: &Table,
    measure: &str,
    bucket: Bucket,
    reducer: Reducer,
) -> Result<Vec<AggregatedRow>> {
    // ---
    let mut buckets: BTreeMap<NaiveDateTime, Vec<f64>> = BTreeMap::new();

    for (ts, value) in table.timestamps_with(measure)? {
        let Some(ts) = ts else { continue };
        let values = buckets.entry(bucket.truncate(ts)).or_default();
        if let Some(v) = value {
            values.push(v);
        }
    }

    Ok(buckets
        .into_iter()
        .map(|(bucket, values)| AggregatedRow {
            bucket,
            value: reducer.reduce(&values),
        })
        .collect())
}

/// Split rows into `< threshold` and `>= threshold` by `measure`.
///
/// Always returns both categories, lower first. Rows with a null measure are
/// not counted, so the counts sum to the number of numeric measure values.
pub fn categorize(table: &Table, measure: &str, threshold: f64) -> Result<[CategoryCount; 2]> {
    // ---
    let (mut below, mut above) = (0usize, 0usize);
    for v in table.numbers(measure)?.flatten() {
        if v < threshold {
            below += 1;
        } else {
            above += 1;
        }
    }

    Ok([
        CategoryCount {
            label: format!("< {threshold}"),
            count: below,
        },
        CategoryCount {
            label: format!(">= {threshold}"),
            count: above,
        },
    ])
}

/// Mean and max of the numeric values in `measure`; `None` when there are none.
pub fn summarize(table: &Table, measure: &str) -> Result<Summary> {
    // ---
    let mut count = 0usize;
    let mut total = 0.0;
    let mut max: Option<f64> = None;

    for v in table.numbers(measure)?.flatten() {
        count += 1;
        total += v;
        max = Some(max.map_or(v, |m| m.max(v)));
    }

    Ok(Summary {
        mean: (count > 0).then(|| total / count as f64),
        max,
    })
}

/// Equal-width histogram of `measure` over `[min, max]` with `bins` bins.
///
/// The last bin is closed on the right. A column with one distinct value
/// produces a single zero-width bin; a column without numbers produces none.
pub fn histogram(table: &Table, measure: &str, bins: usize) -> Result<Vec<HistogramBin>> {
    // ---
    let values: Vec<f64> = table.numbers(measure)?.flatten().collect();
    if values.is_empty() || bins == 0 {
        return Ok(Vec::new());
    }

    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    if min == max {
        return Ok(vec![HistogramBin {
            start: min,
            end: max,
            count: values.len(),
        }]);
    }

    // Halved operands keep `max - min` finite even when the range spans
    // most of f64.
    let half_span = max / 2.0 - min / 2.0;
    let mut counts = vec![0usize; bins];
    for v in values {
        let fraction = (v / 2.0 - min / 2.0) / half_span;
        let idx = ((fraction * bins as f64) as usize).min(bins - 1);
        counts[idx] += 1;
    }

    let edge = |i: usize| {
        let t = i as f64 / bins as f64;
        min * (1.0 - t) + max * t
    };
    Ok(counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| HistogramBin {
            start: edge(i),
            end: if i + 1 == bins { max } else { edge(i + 1) },
            count,
        })
        .collect())
}

/// Points `(x, y)` for every row where both columns are numeric.
pub fn scatter(table: &Table, x_column: &str, y_column: &str) -> Result<Vec<ScatterPoint>> {
    // ---
    let points = table
        .numbers(x_column)?
        .zip(table.numbers(y_column)?)
        .filter_map(|(x, y)| Some(ScatterPoint { x: x?, y: y? }))
        .collect();
    Ok(points)
}

/// Ordinary least squares fit over `points`.
///
/// Returns `None` with fewer than two points or when every x is equal.
pub fn trend_line(points: &[ScatterPoint]) -> Option<TrendLine> {
    // ---
    if points.len() < 2 {
        return None;
    }

    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.x).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.y).sum::<f64>() / n;

    let (mut sxx, mut sxy, mut syy) = (0.0, 0.0, 0.0);
    for p in points {
        let dx = p.x - mean_x;
        let dy = p.y - mean_y;
        sxx += dx * dx;
        sxy += dx * dy;
        syy += dy * dy;
    }

    if sxx == 0.0 {
        return None;
    }

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;
    // Constant y is fit perfectly by the horizontal line
    let r_squared = if syy == 0.0 { 1.0 } else { (sxy * sxy) / (sxx * syy) };

    Some(TrendLine {
        slope,
        intercept,
        r_squared,
    })
}

/// Sum of `measure` per distinct value of `category`, in order of first
/// appearance. Rows with a null category are skipped.
pub fn totals_by_category(table: &Table, category: &str, measure: &str) -> Result<Vec<CategoryTotal>> {
    // ---
    let mut totals: Vec<CategoryTotal> = Vec::new();

    for (cat, value) in table.column(category)?.zip(table.numbers(measure)?) {
        if cat.is_null() {
            continue;
        }
        let name = cat.to_string();
        let amount = value.unwrap_or(0.0);
        match totals.iter_mut().find(|t| t.category == name) {
            Some(t) => t.total += amount,
            None => totals.push(CategoryTotal {
                category: name,
                total: amount,
            }),
        }
    }

    Ok(totals)
}

/// The first `n` rows of `table`.
pub fn preview(table: &Table, n: usize) -> TablePreview {
    // ---
    TablePreview {
        columns: table.columns().to_vec(),
        rows: table.rows().iter().take(n).cloned().collect::<Vec<Vec<Value>>>(),
    }
}
