//! Engine configuration.
//!
//! Every limit has a named default in [`crate::constants`]. A JSON file may
//! override any subset of them; missing keys keep their defaults.
//!
//! ```json
//! { "limits": { "pieRatioLimit": 0.1, "chartFillLimit": 5000 } }
//! ```

use crate::constants::*;
use crate::data::{DataError, DataResult};
use crate::types::{SortOrder, WindowAlign};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Count, ratio and ceiling limits applied during ingestion and finalization
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChartLimits {
    pub autodetect_chart_limit: usize,
    pub autodetect_measures_limit: usize,
    pub apply_limit_after_rows: usize,
    pub max_distinct_values: usize,
    pub valid_value_ratio_limit: f64,
    pub pie_ratio_limit: f64,
    pub pie_count_limit: usize,
    pub chart_fill_limit: usize,
    pub chart_group_limit: usize,
}

impl Default for ChartLimits {
    fn default() -> Self {
        Self {
            autodetect_chart_limit: AUTODETECT_CHART_LIMIT,
            autodetect_measures_limit: AUTODETECT_MEASURES_LIMIT,
            apply_limit_after_rows: APPLY_LIMIT_AFTER_ROWS,
            max_distinct_values: MAX_DISTINCT_VALUES,
            valid_value_ratio_limit: VALID_VALUE_RATIO_LIMIT,
            pie_ratio_limit: PIE_RATIO_LIMIT,
            pie_count_limit: PIE_COUNT_LIMIT,
            chart_fill_limit: CHART_FILL_LIMIT,
            chart_group_limit: CHART_GROUP_LIMIT,
        }
    }
}

/// Defaults for definition fields a caller left unset
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChartDefaults {
    pub sort_order: SortOrder,
    pub window_align: WindowAlign,
    pub window_size: usize,
    pub parent_aggregate_limit: i64,
}

impl Default for ChartDefaults {
    fn default() -> Self {
        Self {
            sort_order: DEFAULT_SORT_ORDER,
            window_align: DEFAULT_WINDOW_ALIGN,
            window_size: DEFAULT_WINDOW_SIZE,
            parent_aggregate_limit: PARENT_AGGREGATE_LIMIT,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub limits: ChartLimits,
    pub defaults: ChartDefaults,
}

impl EngineConfig {
    /// Load configuration from a JSON file.
    pub fn load(path: &Path) -> DataResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> DataResult<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> DataResult<()> {
        let limits = &self.limits;
        if !(0.0..=1.0).contains(&limits.valid_value_ratio_limit) {
            return Err(DataError::InvalidData(format!(
                "validValueRatioLimit must be within 0..=1, got {}",
                limits.valid_value_ratio_limit
            )));
        }
        if !(0.0..=1.0).contains(&limits.pie_ratio_limit) {
            return Err(DataError::InvalidData(format!(
                "pieRatioLimit must be within 0..=1, got {}",
                limits.pie_ratio_limit
            )));
        }
        if self.defaults.parent_aggregate_limit < 1 {
            return Err(DataError::InvalidData(
                "parentAggregateLimit must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
