//! Post-ingestion pass over every chart.
//!
//! Order per chart: rollup and gap-fill for timelines, sort, measure
//! pruning for autodetected charts, X trim, pie "Other" collapsing. Then the
//! whole result set is ranked.

use crate::charts::aggregate::AggregateRecord;
use crate::charts::date_bucket::join_group_key;
use crate::charts::error::ChartResult;
use crate::charts::processed::ProcessedChart;
use crate::charts::scoring::{chart_score, measure_score};
use crate::config::{ChartLimits, EngineConfig};
use crate::constants::OTHER_BUCKET_KEY;
use crate::types::{ChartType, SortOrder};
use std::cmp::{Ordering, Reverse};
use std::collections::HashSet;
use tracing::debug;

/// Run every finalization step on one chart. Frozen charts pass through.
pub fn finalize_chart(mut chart: ProcessedChart, config: &EngineConfig) -> ChartResult<ProcessedChart> {
    if chart.is_frozen() {
        return Ok(chart);
    }
    let limits = &config.limits;

    if chart.is_date_timeline() && chart.sort_order().is_key_based() {
        if !chart.is_given_definition {
            chart.roll_up_to_limit(config.defaults.parent_aggregate_limit)?;
        }
        fill_gaps(&mut chart, limits.chart_fill_limit);
        if chart.is_frozen() {
            return Ok(chart);
        }
    }

    sort_keys(&mut chart);

    if !chart.is_given_definition {
        prune_measures(&mut chart, limits);
    }

    if let Some(count) = chart.definition.trim_x_count_limit {
        trim_x(&mut chart, count);
    }

    if chart.definition.chart_type == ChartType::Pie {
        let ratio = chart
            .definition
            .pie_ratio_limit
            .unwrap_or(limits.pie_ratio_limit);
        let count = chart
            .definition
            .pie_count_limit
            .unwrap_or(limits.pie_count_limit);
        collapse_pie(&mut chart, ratio, count);
    }

    debug!(
        x_field = %chart.definition.xdef.field,
        keys = chart.bucket_keys_ordered.len(),
        buckets = chart.buckets.len(),
        "Finalized chart"
    );
    Ok(chart)
}

// ============================================================================
// Gap Fill
// ============================================================================

/// Insert empty buckets for every missing step between min and max.
///
/// Grouped charts get one bucket per seen group at every step.
pub fn fill_gaps(chart: &mut ProcessedChart, fill_limit: usize) {
    let Some(granularity) = chart.granularity() else {
        return;
    };
    let (Some(min), Some(max)) = (
        chart
            .min_x
            .as_ref()
            .and_then(|key| chart.bucket_key_date_parsed.get(key))
            .copied(),
        chart
            .max_x
            .as_ref()
            .and_then(|key| chart.bucket_key_date_parsed.get(key))
            .copied(),
    ) else {
        return;
    };

    let mut current = Some(min);
    while let Some(date) = current.filter(|date| *date <= max) {
        let key = date.to_bucket_key(granularity);
        let missing: Vec<String> = chart
            .bucket_keys_for_x(&key)
            .into_iter()
            .filter(|bucket_key| !chart.buckets.contains_key(bucket_key))
            .collect();
        if chart.buckets.len() + missing.len() > fill_limit {
            chart.fail(format!(
                "Filling gaps would exceed the bucket limit ({})",
                fill_limit
            ));
            return;
        }
        for bucket_key in missing {
            chart.buckets.insert(bucket_key, AggregateRecord::new());
        }
        if chart.bucket_keys_set.insert(key.clone()) {
            chart.bucket_key_date_parsed.insert(key.clone(), date);
            if chart.sort_order() == SortOrder::Natural {
                chart.bucket_keys_ordered.push(key);
            }
        }
        current = date.next(granularity);
    }
}

// ============================================================================
// Sorting
// ============================================================================

pub fn sort_keys(chart: &mut ProcessedChart) {
    let order = chart.sort_order();
    if order == SortOrder::Natural {
        return;
    }

    let mut keys: Vec<String> = chart.bucket_keys_set.iter().cloned().collect();
    match order {
        SortOrder::AscKeys => keys.sort(),
        SortOrder::DescKeys => keys.sort_by(|a, b| b.cmp(a)),
        SortOrder::AscValues | SortOrder::DescValues => {
            let mut weighted: Vec<(f64, String)> = keys
                .into_iter()
                .map(|key| (chart.x_key_cardinality(&key), key))
                .collect();
            weighted.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
            if order == SortOrder::DescValues {
                weighted.reverse();
            }
            keys = weighted.into_iter().map(|(_, key)| key).collect();
        }
        SortOrder::Natural => {}
    }
    chart.bucket_keys_ordered = keys;
}

// ============================================================================
// Measure Pruning
// ============================================================================

/// Drop weak measures from an autodetected chart, and their bucket values.
pub fn prune_measures(chart: &mut ProcessedChart, limits: &ChartLimits) {
    let rows = chart.rows_added;
    let snapshot: &ProcessedChart = chart;
    let mut candidates: Vec<(usize, i64)> = snapshot
        .definition
        .ydefs
        .iter()
        .enumerate()
        .filter(|(_, ydef)| {
            let invalid = snapshot.invalid_y_rows.get(&ydef.field).copied().unwrap_or(0);
            let valid = snapshot.valid_y_rows.get(&ydef.field).copied().unwrap_or(0);
            invalid == 0
                && rows > 0
                && valid as f64 / rows as f64 >= limits.valid_value_ratio_limit
        })
        .map(|(index, ydef)| (index, measure_score(snapshot, &ydef.field)))
        .collect();
    candidates.sort_by_key(|(_, score)| Reverse(*score));
    candidates.truncate(limits.autodetect_measures_limit);
    let kept: HashSet<usize> = candidates.into_iter().map(|(index, _)| index).collect();

    let ydefs = std::mem::take(&mut chart.definition.ydefs);
    let (keep, dropped): (Vec<_>, Vec<_>) = ydefs
        .into_iter()
        .enumerate()
        .partition(|(index, _)| kept.contains(index));
    chart.definition.ydefs = keep.into_iter().map(|(_, ydef)| ydef).collect();

    if dropped.is_empty() {
        return;
    }
    debug!(
        x_field = %chart.definition.xdef.field,
        dropped = dropped.len(),
        kept = chart.definition.ydefs.len(),
        "Pruned measures"
    );
    for (_, ydef) in dropped {
        for record in chart.buckets.values_mut() {
            record.remove(&ydef.field);
        }
    }
}

// ============================================================================
// Trimming
// ============================================================================

/// Keep only the first `count` ordered X keys.
pub fn trim_x(chart: &mut ProcessedChart, count: usize) {
    if chart.bucket_keys_ordered.len() <= count {
        return;
    }
    let removed = chart.bucket_keys_ordered.split_off(count);
    for key in &removed {
        chart.bucket_keys_set.remove(key);
        chart.bucket_key_date_parsed.remove(key);
        for bucket_key in chart.bucket_keys_for_x(key) {
            chart.buckets.remove(&bucket_key);
        }
    }
}

// ============================================================================
// Pie Collapsing
// ============================================================================

/// Fold long-tail keys into a single "Other" bucket.
///
/// First pass folds keys whose share of the total is below `ratio_limit`.
/// Second pass keeps only the `count_limit` largest remaining keys.
pub fn collapse_pie(chart: &mut ProcessedChart, ratio_limit: f64, count_limit: usize) {
    let weighted: Vec<(String, f64)> = chart
        .bucket_keys_ordered
        .iter()
        .map(|key| (key.clone(), chart.x_key_cardinality(key)))
        .collect();
    let total: f64 = weighted.iter().map(|(_, c)| c).sum();

    let mut folded: HashSet<String> = HashSet::new();
    if total > 0.0 {
        for (key, cardinality) in &weighted {
            if cardinality / total < ratio_limit {
                folded.insert(key.clone());
            }
        }
    }

    let mut remaining: Vec<&(String, f64)> = weighted
        .iter()
        .filter(|(key, _)| !folded.contains(key))
        .collect();
    if remaining.len() > count_limit {
        remaining.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        for (key, _) in remaining.drain(count_limit..) {
            folded.insert(key.clone());
        }
    }

    if folded.is_empty() {
        return;
    }

    let definition = chart.definition.clone();
    let grouped = definition.grouping_field.is_some();
    let groups: Vec<Option<String>> = if grouped {
        chart.groups.iter().cloned().map(Some).collect()
    } else {
        vec![None]
    };

    // Take folded records out first: the data may already contain "Other"
    let mut others: Vec<(String, AggregateRecord)> = groups
        .iter()
        .map(|group| {
            (
                join_group_key(group.as_deref(), OTHER_BUCKET_KEY),
                AggregateRecord::new(),
            )
        })
        .collect();
    for key in chart
        .bucket_keys_ordered
        .iter()
        .filter(|key| folded.contains(*key))
    {
        for (group, (_, other)) in groups.iter().zip(others.iter_mut()) {
            let bucket_key = join_group_key(group.as_deref(), key);
            if let Some(record) = chart.buckets.remove(&bucket_key) {
                other.absorb(&record, &definition);
            }
        }
    }
    chart.bucket_keys_ordered.retain(|key| !folded.contains(key));
    for key in &folded {
        chart.bucket_keys_set.remove(key);
    }

    let mut has_other = chart.bucket_keys_set.contains(OTHER_BUCKET_KEY);
    for (bucket_key, record) in others {
        if record.is_empty() {
            continue;
        }
        chart
            .buckets
            .entry(bucket_key)
            .or_default()
            .absorb(&record, &definition);
        has_other = true;
    }
    if has_other && chart.bucket_keys_set.insert(OTHER_BUCKET_KEY.to_string()) {
        chart.bucket_keys_ordered.push(OTHER_BUCKET_KEY.to_string());
    }

    debug!(
        x_field = %chart.definition.xdef.field,
        folded = folded.len(),
        remaining = chart.bucket_keys_ordered.len(),
        "Collapsed pie tail into Other"
    );
}

// ============================================================================
// Ranking
// ============================================================================

/// Given charts first in given order, then the best autodetected charts.
///
/// Autodetected charts without rows or measures are dropped.
pub fn rank_charts(charts: Vec<ProcessedChart>, limits: &ChartLimits) -> Vec<ProcessedChart> {
    let (mut given, detected): (Vec<_>, Vec<_>) =
        charts.into_iter().partition(|chart| chart.is_given_definition);

    let mut scored: Vec<(i64, ProcessedChart)> = detected
        .into_iter()
        .filter(|chart| chart.rows_added > 0 && !chart.definition.ydefs.is_empty())
        .map(|chart| (chart_score(&chart, limits.autodetect_measures_limit), chart))
        .collect();
    scored.sort_by_key(|(score, _)| Reverse(*score));
    scored.truncate(limits.autodetect_chart_limit);

    given.extend(scored.into_iter().map(|(_, chart)| chart));
    given
}
