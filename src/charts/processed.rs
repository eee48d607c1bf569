//! Accumulation state of a single chart.
//!
//! A [`ProcessedChart`] is created when ingestion starts, mutated by every
//! row, trimmed by the finalizer and then read by consumers. Once
//! `error_message` is set the chart is frozen and ignores further rows.

use crate::charts::aggregate::AggregateRecord;
use crate::charts::date_bucket::{
    ChartDate, DateGranularity, bucket_distance, join_group_key, parent_bucket_key,
    parse_chart_date,
};
use crate::charts::error::ChartResult;
use crate::charts::processor::ClassifiedRow;
use crate::config::ChartLimits;
use crate::constants::{DEFAULT_SORT_ORDER, ROLLUP_WARN_MS};
use crate::perf;
use crate::types::{
    AvailableColumn, ChartDefinition, ChartType, ChartXTransform, RowValue, SortOrder,
};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, warn};

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedChart {
    pub definition: ChartDefinition,
    /// Supplied by the caller: never discarded, never pruned
    pub is_given_definition: bool,
    pub rows_added: usize,
    /// Bucket key (optionally `group::x`) to aggregate record
    pub buckets: BTreeMap<String, AggregateRecord>,
    /// X keys in output order (insertion order while ingesting `natural` charts)
    pub bucket_keys_ordered: Vec<String>,
    #[serde(skip)]
    pub bucket_keys_set: HashSet<String>,
    #[serde(skip)]
    pub bucket_key_date_parsed: HashMap<String, ChartDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_x: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_x: Option<String>,
    pub invalid_x_rows: usize,
    pub invalid_y_rows: BTreeMap<String, usize>,
    pub valid_y_rows: BTreeMap<String, usize>,
    #[serde(skip)]
    pub top_distinct_values: HashMap<String, HashSet<u64>>,
    pub groups: Vec<String>,
    #[serde(skip)]
    pub group_set: HashSet<String>,
    pub available_columns: Vec<AvailableColumn>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ProcessedChart {
    pub fn new(definition: ChartDefinition, is_given_definition: bool) -> Self {
        Self {
            definition,
            is_given_definition,
            ..Default::default()
        }
    }

    pub fn granularity(&self) -> Option<DateGranularity> {
        self.definition.xdef.transform.granularity()
    }

    pub fn sort_order(&self) -> SortOrder {
        self.definition.xdef.sort_order.unwrap_or(DEFAULT_SORT_ORDER)
    }

    /// Timeline chart bucketed by a date transform
    pub fn is_date_timeline(&self) -> bool {
        self.definition.chart_type == ChartType::Timeline && self.granularity().is_some()
    }

    pub fn is_frozen(&self) -> bool {
        self.error_message.is_some()
    }

    /// Put the chart into its terminal error state.
    pub fn fail(&mut self, message: String) {
        warn!(
            x_field = %self.definition.xdef.field,
            rows_added = self.rows_added,
            "Chart failed: {}",
            message
        );
        self.error_message = Some(message);
    }

    pub fn distinct_value_count(&self, field: &str) -> usize {
        self.top_distinct_values.get(field).map_or(0, HashSet::len)
    }

    /// Bucket keys holding data for an X key: one per group, or the key itself.
    pub fn bucket_keys_for_x(&self, x_key: &str) -> Vec<String> {
        if self.definition.grouping_field.is_some() {
            self.groups
                .iter()
                .map(|group| join_group_key(Some(group), x_key))
                .collect()
        } else {
            vec![x_key.to_string()]
        }
    }

    /// Cardinality of an X key summed over all its groups.
    pub fn x_key_cardinality(&self, x_key: &str) -> f64 {
        self.bucket_keys_for_x(x_key)
            .iter()
            .filter_map(|key| self.buckets.get(key))
            .map(AggregateRecord::cardinality)
            .sum()
    }

    /// Route one classified row into this chart.
    pub(crate) fn add_row(&mut self, row: &ClassifiedRow<'_>, limits: &ChartLimits) {
        if self.is_frozen() {
            return;
        }

        let Some((x_key, x_parsed)) = self.compute_x_key(row) else {
            self.invalid_x_rows += 1;
            return;
        };

        let group = match self.definition.grouping_field.as_deref() {
            Some(field) => {
                let group = group_value(row, field, self.definition.group_transform);
                if !self.group_set.contains(&group) {
                    if self.groups.len() >= limits.chart_group_limit {
                        self.fail(format!(
                            "Too many groups (more than {}) for grouping field {}",
                            limits.chart_group_limit, field
                        ));
                        return;
                    }
                    self.group_set.insert(group.clone());
                    self.groups.push(group.clone());
                }
                Some(group)
            }
            None => None,
        };

        let bucket_key = join_group_key(group.as_deref(), &x_key);
        if !self.buckets.contains_key(&bucket_key) && self.buckets.len() >= limits.chart_fill_limit
        {
            self.fail(format!(
                "Chart has too many buckets (more than {})",
                limits.chart_fill_limit
            ));
            return;
        }

        let natural = self.sort_order() == SortOrder::Natural;
        self.track_x_key(&x_key, x_parsed, natural);

        let record = self.buckets.entry(bucket_key).or_default();
        for ydef in &self.definition.ydefs {
            let field = ydef.field.as_str();
            let present = row.row.get(field).is_some_and(|v| !v.is_null());
            match row.number(field) {
                Some(value) => {
                    *self.valid_y_rows.entry(ydef.field.clone()).or_default() += 1;
                    record_distinct(
                        &mut self.top_distinct_values,
                        field,
                        value,
                        limits.max_distinct_values,
                    );
                    record.apply(field, ydef.aggregate_function, value);
                }
                None if present => {
                    *self.invalid_y_rows.entry(ydef.field.clone()).or_default() += 1;
                }
                None => {}
            }
        }

        self.rows_added += 1;
    }

    fn compute_x_key(&self, row: &ClassifiedRow<'_>) -> Option<(String, Option<ChartDate>)> {
        let field = self.definition.xdef.field.as_str();
        match self.granularity() {
            None => row
                .row
                .get(field)
                .and_then(RowValue::to_key_string)
                .map(|key| (key, None)),
            Some(granularity) => {
                let parsed = row.date(field)?.truncate(granularity);
                Some((parsed.to_bucket_key(granularity), Some(parsed)))
            }
        }
    }

    fn track_x_key(&mut self, x_key: &str, parsed: Option<ChartDate>, natural: bool) {
        if self.min_x.as_deref().is_none_or(|min| x_key < min) {
            self.min_x = Some(x_key.to_string());
        }
        if self.max_x.as_deref().is_none_or(|max| x_key > max) {
            self.max_x = Some(x_key.to_string());
        }
        if self.bucket_keys_set.contains(x_key) {
            return;
        }
        self.bucket_keys_set.insert(x_key.to_string());
        if let Some(parsed) = parsed {
            self.bucket_key_date_parsed.insert(x_key.to_string(), parsed);
        }
        if natural {
            self.bucket_keys_ordered.push(x_key.to_string());
        }
    }

    /// Distance between the smallest and largest X key in granularity units.
    pub fn x_distance(&self) -> Option<i64> {
        let granularity = self.granularity()?;
        let min = self.bucket_key_date_parsed.get(self.min_x.as_deref()?)?;
        let max = self.bucket_key_date_parsed.get(self.max_x.as_deref()?)?;
        Some(bucket_distance(min, max, granularity))
    }

    /// Coarser granularity this chart should roll up to, if it is wider
    /// than `limit` units.
    pub fn rollup_target(&self, limit: i64) -> Option<DateGranularity> {
        if self.x_distance()? <= limit {
            return None;
        }
        self.granularity()?.parent()
    }

    /// Replace this chart with coarser snapshots until its key range fits.
    ///
    /// Bounded by the granularity ladder: at most four hops.
    pub fn roll_up_to_limit(&mut self, limit: i64) -> ChartResult<()> {
        while let Some(parent) = self.rollup_target(limit) {
            let next = perf::measure_and_log("chart_rollup", ROLLUP_WARN_MS, || {
                self.rolled_up(parent)
            })?;
            debug!(
                x_field = %self.definition.xdef.field,
                from = ?self.definition.xdef.transform,
                to = ?next.definition.xdef.transform,
                buckets = next.buckets.len(),
                "Rolled up chart"
            );
            *self = next;
        }
        Ok(())
    }

    /// Build a new chart at the parent granularity, merging child buckets.
    pub fn rolled_up(&self, parent: DateGranularity) -> ChartResult<ProcessedChart> {
        let grouped = self.definition.grouping_field.is_some();
        let mut definition = self.definition.clone();
        definition.xdef.transform = ChartXTransform::from_granularity(parent);

        let mut next = ProcessedChart {
            definition,
            is_given_definition: self.is_given_definition,
            rows_added: self.rows_added,
            invalid_x_rows: self.invalid_x_rows,
            invalid_y_rows: self.invalid_y_rows.clone(),
            valid_y_rows: self.valid_y_rows.clone(),
            top_distinct_values: self.top_distinct_values.clone(),
            groups: self.groups.clone(),
            group_set: self.group_set.clone(),
            min_x: self
                .min_x
                .as_deref()
                .map(|key| parent_bucket_key(key, parent, false)),
            max_x: self
                .max_x
                .as_deref()
                .map(|key| parent_bucket_key(key, parent, false)),
            ..Default::default()
        };

        for (key, record) in &self.buckets {
            next.buckets
                .entry(parent_bucket_key(key, parent, grouped))
                .or_default()
                .merge_child(record, &self.definition)?;
        }

        let natural = self.sort_order() == SortOrder::Natural;
        let child_keys: Box<dyn Iterator<Item = &String>> = if natural {
            Box::new(self.bucket_keys_ordered.iter())
        } else {
            Box::new(self.bucket_keys_set.iter())
        };
        for key in child_keys {
            let parsed = self
                .bucket_key_date_parsed
                .get(key)
                .map(|date| date.truncate(parent));
            let parent_key = parent_bucket_key(key, parent, false);
            next.track_x_key(&parent_key, parsed, natural);
        }

        Ok(next)
    }
}

fn group_value(row: &ClassifiedRow<'_>, field: &str, transform: Option<ChartXTransform>) -> String {
    let raw = row.row.get(field);
    if let Some(granularity) = transform.and_then(|t| t.granularity()) {
        if let Some(parsed) = raw.and_then(parse_chart_date) {
            return parsed.to_bucket_key(granularity);
        }
    }
    raw.and_then(RowValue::to_key_string).unwrap_or_default()
}

fn record_distinct(
    samples: &mut HashMap<String, HashSet<u64>>,
    field: &str,
    value: f64,
    capacity: usize,
) {
    // -0.0 and 0.0 are the same observation
    let normalized = if value == 0.0 { 0.0f64 } else { value };
    let set = samples.entry(field.to_string()).or_default();
    if set.len() < capacity {
        set.insert(normalized.to_bits());
    }
}
