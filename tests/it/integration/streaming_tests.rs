//! End-to-end streaming tests: rows in, finalized charts out.

use crate::helpers::{
    category_row, dated_row, day_range, keys, measure_fields, run, run_with_config,
    total_cardinality, value,
};
use chrono::NaiveDate;
use streamchart::charts::{AggregateValue, ChartDate, ChartProcessor, DateGranularity, parse_chart_date};
use streamchart::config::EngineConfig;
use streamchart::types::{
    AggregateFunction, ChartDefinition, ChartType, ChartXTransform, ColumnDataType, Row, RowValue,
    SortOrder,
};

/// Hour keys (`YYYY-MM-DD HH`) need minutes appended to parse as a date.
fn parse_hour_key(key: &str) -> ChartDate {
    parse_chart_date(&RowValue::from(format!("{key}:00"))).expect("bucket key should parse")
}

// ============================================================================
// Autodetection
// ============================================================================

#[test]
fn test_three_days_autodetect_daily_timeline() {
    let rows = [
        dated_row("2023-10-01", 42.5),
        dated_row("2023-10-02", 12.0),
        dated_row("2023-10-03", 57.0),
    ];
    let charts = run(Vec::new(), &rows);

    assert_eq!(charts.len(), 1);
    let chart = &charts[0];
    assert!(!chart.is_given_definition);
    assert_eq!(chart.definition.chart_type, ChartType::Timeline);
    assert_eq!(chart.definition.xdef.transform, ChartXTransform::DateDay);
    assert_eq!(keys(chart), vec!["2023-10-01", "2023-10-02", "2023-10-03"]);
    assert_eq!(value(chart, "2023-10-01", "value"), Some(42.5));
    assert_eq!(value(chart, "2023-10-02", "value"), Some(12.0));
    assert_eq!(value(chart, "2023-10-03", "value"), Some(57.0));
    assert!(chart.error_message.is_none());
}

#[test]
fn test_identifier_columns_are_not_measures() {
    let rows: Vec<Row> = (1..=3)
        .map(|i| {
            Row::new()
                .with("id", i)
                .with("created", format!("2024-01-0{i}"))
                .with("customer_id", 100 + i)
                .with("orderId", 7)
                .with("total", i as f64 * 10.0)
        })
        .collect();
    let charts = run(Vec::new(), &rows);

    assert_eq!(charts.len(), 1);
    assert_eq!(measure_fields(&charts[0]), vec!["total"]);
}

#[test]
fn test_weak_measures_are_pruned() {
    let rows = [
        Row::new().with("d", "2023-10-01").with("a", 1).with("b", 1).with("c", 1),
        Row::new().with("d", "2023-10-02").with("a", 2).with("b", "n/a"),
        Row::new().with("d", "2023-10-03").with("a", 3).with("b", 3),
        Row::new().with("d", "2023-10-04").with("a", 4).with("b", 4),
    ];
    let charts = run(Vec::new(), &rows);

    let chart = &charts[0];
    // b had an invalid value, c was present in only a quarter of the rows
    assert_eq!(measure_fields(chart), vec!["a"]);
    for record in chart.buckets.values() {
        assert!(record.get("b").is_none());
        assert!(record.get("c").is_none());
    }
    assert_eq!(chart.invalid_y_rows.get("b"), Some(&1));
}

#[test]
fn test_autodetected_charts_ranked_by_score() {
    let mut rows = vec![Row::new().with("shipped", "2023-01-01").with("v", 1)];
    for day in day_range(NaiveDate::from_ymd_opt(2023, 2, 1).unwrap(), 5) {
        rows.push(Row::new().with("ordered", day).with("v", 2));
    }

    let charts = run(Vec::new(), &rows);
    let fields: Vec<&str> = charts
        .iter()
        .map(|c| c.definition.xdef.field.as_str())
        .collect();
    assert_eq!(fields, vec!["ordered", "shipped"]);
    assert_eq!(charts[1].invalid_x_rows, 5);

    // The same cap bounds creation, so the first date column wins
    let mut config = EngineConfig::default();
    config.limits.autodetect_chart_limit = 1;
    let charts = run_with_config(Vec::new(), &rows, config);
    assert_eq!(charts.len(), 1);
    assert_eq!(charts[0].definition.xdef.field, "shipped");
}

#[test]
fn test_chart_without_measures_is_dropped() {
    let rows = [
        Row::new().with("d", "2023-10-01").with("label", "x"),
        Row::new().with("d", "2023-10-02").with("label", "y"),
    ];
    assert!(run(Vec::new(), &rows).is_empty());
}

#[test]
fn test_available_columns_are_reported() {
    let rows = [
        Row::new()
            .with("d", "2023-10-01")
            .with("v", 1)
            .with("tag", "a")
            .with("w", 2),
        Row::new()
            .with("d", "2023-10-02")
            .with("v", "x")
            .with("tag", RowValue::Null)
            .with("w", 3),
    ];
    let charts = run(Vec::new(), &rows);
    let columns: Vec<(&str, ColumnDataType)> = charts[0]
        .available_columns
        .iter()
        .map(|c| (c.field.as_str(), c.data_type))
        .collect();
    assert_eq!(
        columns,
        vec![
            ("d", ColumnDataType::Date),
            ("v", ColumnDataType::Mixed),
            ("tag", ColumnDataType::String),
            ("w", ColumnDataType::Number),
        ]
    );
    assert_eq!(measure_fields(&charts[0]), vec!["w"]);
}

// ============================================================================
// Rollup
// ============================================================================

#[test]
fn test_wide_daily_range_rolls_up_to_months() {
    let rows = [
        dated_row("2023-10-01", 1.0),
        dated_row("2023-10-20", 2.0),
        dated_row("2024-01-15", 3.0),
        dated_row("2024-08-03", 4.0),
    ];

    let mut processor = ChartProcessor::new(Vec::new());
    processor.add_rows(&rows).unwrap();
    assert_eq!(
        processor.charts_processing()[0].definition.xdef.transform,
        ChartXTransform::DateMonth
    );

    processor.finalize().unwrap();
    let chart = &processor.charts()[0];
    assert_eq!(
        keys(chart),
        vec![
            "2023-10", "2023-11", "2023-12", "2024-01", "2024-02", "2024-03", "2024-04",
            "2024-05", "2024-06", "2024-07", "2024-08",
        ]
    );
    assert_eq!(value(chart, "2023-10", "value"), Some(3.0));
    assert_eq!(total_cardinality(chart), 10.0);
}

#[test]
fn test_rollup_stops_within_limit() {
    let rows = [
        dated_row("1900-01-01", 1.0),
        dated_row("1950-06-01", 1.0),
        dated_row("2020-12-31", 1.0),
    ];
    let mut processor = ChartProcessor::new(Vec::new());
    processor.add_rows(&rows).unwrap();

    let chart = &processor.charts_processing()[0];
    assert_eq!(chart.granularity(), Some(DateGranularity::Year));
    assert!(chart.x_distance().unwrap() <= 200);
    assert_eq!(chart.min_x.as_deref(), Some("1900"));
    assert_eq!(chart.max_x.as_deref(), Some("2020"));
}

#[test]
fn test_configured_rollup_limit() {
    let rows = [dated_row("2023-10-01", 1.0), dated_row("2023-10-20", 2.0)];

    let mut config = EngineConfig::default();
    config.defaults.parent_aggregate_limit = 10;
    let charts = run_with_config(Vec::new(), &rows, config);
    assert_eq!(keys(&charts[0]), vec!["2023-10"]);
    assert_eq!(value(&charts[0], "2023-10", "value"), Some(3.0));
}

#[test]
fn test_given_definition_never_rolls_up() {
    let definition = ChartDefinition::new(ChartType::Timeline, "date")
        .with_transform(ChartXTransform::DateDay)
        .with_measure("value", AggregateFunction::First);
    let rows = [dated_row("2023-01-01", 1.0), dated_row("2024-06-30", 2.0)];
    let charts = run(vec![definition], &rows);

    let chart = &charts[0];
    assert_eq!(chart.definition.xdef.transform, ChartXTransform::DateDay);
    assert_eq!(chart.bucket_keys_ordered.len(), 547);
    assert_eq!(value(chart, "2023-01-01", "value"), Some(1.0));
    assert!(chart.buckets["2023-01-02"].is_empty());
}

// ============================================================================
// Limits
// ============================================================================

#[test]
fn test_bucket_overflow_freezes_only_that_chart() {
    let mut config = EngineConfig::default();
    config.limits.chart_fill_limit = 5;
    let by_category = ChartDefinition::new(ChartType::Bar, "category")
        .with_measure("amount", AggregateFunction::Sum);
    let by_region = ChartDefinition::new(ChartType::Bar, "region")
        .with_measure("amount", AggregateFunction::Sum);

    let rows: Vec<Row> = (0..10)
        .map(|i| category_row(&format!("c{i}"), 1.0).with("region", "north"))
        .collect();
    let charts = run_with_config(vec![by_category, by_region], &rows, config);

    assert!(charts[0].error_message.is_some());
    assert!(charts[0].buckets.len() <= 5);
    assert_eq!(charts[0].rows_added, 5);

    assert!(charts[1].error_message.is_none());
    assert_eq!(value(&charts[1], "north", "amount"), Some(10.0));
}

#[test]
fn test_group_overflow_sets_error() {
    let mut config = EngineConfig::default();
    config.limits.chart_group_limit = 3;
    let definition = ChartDefinition::new(ChartType::Bar, "category")
        .with_measure("amount", AggregateFunction::Sum)
        .with_grouping("seller", None);
    let rows: Vec<Row> = (0..5)
        .map(|i| category_row("a", 1.0).with("seller", format!("s{i}")))
        .collect();
    let charts = run_with_config(vec![definition], &rows, config);

    assert_eq!(charts[0].groups, vec!["s0", "s1", "s2"]);
    assert!(charts[0].error_message.is_some());
}

// ============================================================================
// Finalization
// ============================================================================

#[test]
fn test_gap_fill_produces_contiguous_keys() {
    let definition = ChartDefinition::new(ChartType::Timeline, "date")
        .with_transform(ChartXTransform::DateHour)
        .with_measure("value", AggregateFunction::Max);
    let rows = [
        dated_row("2024-02-28 22:15", 1.0),
        dated_row("2024-02-29T03:00:00", 4.0),
        dated_row("2024-02-28 23:59:59", 2.0),
        dated_row("2024-03-01 01:30", 3.0),
    ];
    let charts = run(vec![definition], &rows);
    let chart = &charts[0];

    let ordered = keys(chart);
    assert_eq!(ordered.first(), Some(&"2024-02-28 22"));
    assert_eq!(ordered.last(), Some(&"2024-03-01 01"));
    for pair in ordered.windows(2) {
        let next = parse_hour_key(pair[0]).next(DateGranularity::Hour).unwrap();
        assert_eq!(next.to_bucket_key(DateGranularity::Hour), pair[1]);
    }
    assert_eq!(ordered.len(), 28);
}

#[test]
fn test_grouped_gap_fill_fills_every_group() {
    let definition = ChartDefinition::new(ChartType::Timeline, "date")
        .with_transform(ChartXTransform::DateDay)
        .with_measure("value", AggregateFunction::Sum)
        .with_grouping("team", None);
    let rows = [
        dated_row("2023-10-01", 1.0).with("team", "red"),
        dated_row("2023-10-03", 2.0).with("team", "blue"),
    ];
    let charts = run(vec![definition], &rows);
    let chart = &charts[0];

    assert_eq!(keys(chart), vec!["2023-10-01", "2023-10-02", "2023-10-03"]);
    assert_eq!(chart.buckets.len(), 6);
    assert!(chart.buckets["red::2023-10-02"].is_empty());
    assert_eq!(value(chart, "blue::2023-10-03", "value"), Some(2.0));
}

#[test]
fn test_natural_order_keeps_arrival_order() {
    let definition = ChartDefinition::new(ChartType::Bar, "category")
        .with_measure("amount", AggregateFunction::Sum)
        .with_sort_order(SortOrder::Natural);
    let rows = [
        category_row("zeta", 1.0),
        category_row("alpha", 1.0),
        category_row("zeta", 1.0),
        category_row("mid", 1.0),
    ];
    let charts = run(vec![definition], &rows);
    assert_eq!(keys(&charts[0]), vec!["zeta", "alpha", "mid"]);
}

#[test]
fn test_trim_and_desc_values() {
    let definition = ChartDefinition::new(ChartType::Bar, "category")
        .with_measure("amount", AggregateFunction::Sum)
        .with_sort_order(SortOrder::DescValues)
        .with_trim_x_count(2);
    let rows = [
        category_row("a", 1.0),
        category_row("b", 5.0),
        category_row("c", 3.0),
        category_row("a", 1.0),
    ];
    let charts = run(vec![definition], &rows);
    assert_eq!(keys(&charts[0]), vec!["b", "c"]);
    assert!(!charts[0].buckets.contains_key("a"));
}

#[test]
fn test_pie_folds_small_slices_into_other() {
    let definition = ChartDefinition::new(ChartType::Pie, "category")
        .with_measure("amount", AggregateFunction::Sum)
        .with_pie_limits(Some(0.1), None);
    let rows = [
        category_row("alpha", 1_980_067.0),
        category_row("beta", 405_452.0),
        category_row("gamma", 2_233.0),
        category_row("delta", 1_122.0),
    ];
    let charts = run(vec![definition], &rows);
    let chart = &charts[0];

    assert_eq!(keys(chart), vec!["alpha", "beta", "Other"]);
    assert_eq!(value(chart, "Other", "amount"), Some(3_355.0));
    assert_eq!(chart.buckets.len(), 3);
}

#[test]
fn test_pie_conserves_additive_totals() {
    let definition = ChartDefinition::new(ChartType::Pie, "category")
        .with_measure("amount", AggregateFunction::Sum)
        .with_measure("orders", AggregateFunction::Count)
        .with_pie_limits(Some(0.05), Some(4));
    let rows: Vec<Row> = (0..40)
        .map(|i| {
            let category = format!("cat{:02}", i % 13);
            category_row(&category, ((i * 37) % 101) as f64).with("orders", 1)
        })
        .collect();
    let input_total: f64 = (0..40).map(|i| ((i * 37) % 101) as f64).sum::<f64>() + 40.0;

    let charts = run(vec![definition], &rows);
    let chart = &charts[0];

    assert_eq!(total_cardinality(chart), input_total);
    assert!(chart.bucket_keys_ordered.len() <= 5);
    assert_eq!(chart.bucket_keys_ordered.last().map(String::as_str), Some("Other"));
    let orders: f64 = chart
        .buckets
        .values()
        .filter_map(|record| record.get("orders"))
        .map(AggregateValue::cardinality)
        .sum();
    assert_eq!(orders, 40.0);
}

#[test]
fn test_avg_pair_survives_to_output() {
    let definition = ChartDefinition::new(ChartType::Bar, "category")
        .with_measure("amount", AggregateFunction::Avg);
    let rows = [category_row("a", 2.0), category_row("a", 6.0)];
    let charts = run(vec![definition], &rows);

    assert_eq!(
        charts[0].buckets["a"].get("amount"),
        Some(&AggregateValue::SumCount(8.0, 2.0))
    );
    assert_eq!(value(&charts[0], "a", "amount"), Some(4.0));
}

#[test]
fn test_given_charts_come_first() {
    let given = ChartDefinition::new(ChartType::Bar, "category")
        .with_measure("amount", AggregateFunction::Sum);
    let rows = [category_row("a", 1.0).with("d", "2023-10-01")];
    let charts = run(vec![given], &rows);

    // Given definitions disable autodetection entirely
    assert_eq!(charts.len(), 1);
    assert!(charts[0].is_given_definition);
}

// ============================================================================
// Determinism
// ============================================================================

#[test]
fn test_same_rows_same_output() {
    let rows: Vec<Row> = day_range(NaiveDate::from_ymd_opt(2022, 12, 20).unwrap(), 400)
        .into_iter()
        .enumerate()
        .map(|(i, day)| {
            Row::new()
                .with("day", day)
                .with("sales", (i % 17) as f64)
                .with("visits", (i % 5) as f64 + 0.5)
                .with("store", format!("s{}", i % 3))
        })
        .collect();

    let first = serde_json::to_string(&run(Vec::new(), &rows)).unwrap();
    let second = serde_json::to_string(&run(Vec::new(), &rows)).unwrap();
    assert_eq!(first, second);
}
