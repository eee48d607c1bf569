//! Ranking heuristic for autodetected charts and their measures.
//!
//! Pure functions of counters collected during ingestion.

use crate::charts::processed::ProcessedChart;

const VALID_ROW_WEIGHT: i64 = 5;
const DISTINCT_VALUE_WEIGHT: i64 = 20;
const ROWS_ADDED_WEIGHT: i64 = 2;
const INVALID_ROW_PENALTY: i64 = 50;
const CHART_ROWS_WEIGHT: i64 = 5;

/// `5 * valid + 20 * distinct + 2 * rows - 50 * invalid`
pub fn measure_score(chart: &ProcessedChart, field: &str) -> i64 {
    let valid = chart.valid_y_rows.get(field).copied().unwrap_or(0) as i64;
    let invalid = chart.invalid_y_rows.get(field).copied().unwrap_or(0) as i64;
    let distinct = chart.distinct_value_count(field) as i64;
    VALID_ROW_WEIGHT * valid + DISTINCT_VALUE_WEIGHT * distinct
        + ROWS_ADDED_WEIGHT * chart.rows_added as i64
        - INVALID_ROW_PENALTY * invalid
}

/// `5 * rows` plus the best `measures_limit` measure scores.
pub fn chart_score(chart: &ProcessedChart, measures_limit: usize) -> i64 {
    let mut scores: Vec<i64> = chart
        .definition
        .ydefs
        .iter()
        .map(|ydef| measure_score(chart, &ydef.field))
        .collect();
    scores.sort_unstable_by(|a, b| b.cmp(a));
    scores.truncate(measures_limit);
    CHART_ROWS_WEIGHT * chart.rows_added as i64 + scores.iter().sum::<i64>()
}
