//! Engine-wide constants.
//!
//! Centralizes the limits and defaults used by the chart engine so that
//! `config` can fall back to them and tests can refer to them by name.

use crate::types::{SortOrder, WindowAlign};

// ============================================================================
// Autodetection
// ============================================================================

/// Maximum number of autodetected charts (creation cap and final keep count)
pub const AUTODETECT_CHART_LIMIT: usize = 10;

/// Maximum number of measures on an autodetected chart
pub const AUTODETECT_MEASURES_LIMIT: usize = 10;

/// Rows after which no new autodetected charts or measures are created
pub const APPLY_LIMIT_AFTER_ROWS: usize = 100;

/// Maximum distinct values sampled per measure (feeds the scoring heuristic)
pub const MAX_DISTINCT_VALUES: usize = 10;

/// Minimum valid/total row ratio for keeping an autodetected measure
pub const VALID_VALUE_RATIO_LIMIT: f64 = 0.5;

/// Maximum string length for a value to be classified as a short string
pub const MAX_STRING_COLUMN_LEN: usize = 100;

// ============================================================================
// Pie Charts
// ============================================================================

/// Buckets whose share of total cardinality is below this go to "Other"
pub const PIE_RATIO_LIMIT: f64 = 0.05;

/// Maximum number of pie slices before the tail goes to "Other"
pub const PIE_COUNT_LIMIT: usize = 10;

/// Bucket key used for collapsed pie slices
pub const OTHER_BUCKET_KEY: &str = "Other";

// ============================================================================
// Hard Ceilings
// ============================================================================

/// Maximum buckets per chart; exceeding it fails the chart
pub const CHART_FILL_LIMIT: usize = 10_000;

/// Maximum distinct grouping values per chart; exceeding it fails the chart
pub const CHART_GROUP_LIMIT: usize = 32;

// ============================================================================
// Chart Defaults
// ============================================================================

/// Default min/max distance (in granularity units) before a timeline rolls up
pub const PARENT_AGGREGATE_LIMIT: i64 = 200;

/// Sort order used when a definition does not name one
pub const DEFAULT_SORT_ORDER: SortOrder = SortOrder::AscKeys;

/// Window alignment (reserved for windowing, not consumed by the engine)
pub const DEFAULT_WINDOW_ALIGN: WindowAlign = WindowAlign::End;

/// Window size (reserved for windowing, not consumed by the engine)
pub const DEFAULT_WINDOW_SIZE: usize = 100;

/// Separator between a group value and the X key in grouped bucket keys
pub const GROUP_KEY_SEPARATOR: &str = "::";

// ============================================================================
// Data Loading
// ============================================================================

/// Maximum number of rows read from a single input file
pub const MAX_INPUT_ROWS: usize = 1_000_000;

/// Maximum input file size in MB
pub const MAX_INPUT_SIZE_MB: usize = 512;

// ============================================================================
// Profiling Thresholds
// ============================================================================

/// Finalize taking longer than this is logged as slow
pub const FINALIZE_WARN_MS: f64 = 50.0;

/// A single rollup pass taking longer than this is logged as slow
pub const ROLLUP_WARN_MS: f64 = 5.0;
