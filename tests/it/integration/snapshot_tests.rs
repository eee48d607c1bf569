//! Snapshot tests using the insta crate.
//!
//! Finalized charts are rendered to a small text form (one line per bucket)
//! so the whole shape of a result is visible in one assertion.
//!
//! To update snapshots after intentional changes:
//! ```sh
//! cargo insta test --accept
//! ```

use crate::helpers::{category_row, dated_row, run};
use streamchart::charts::ProcessedChart;
use streamchart::types::{AggregateFunction, ChartDefinition, ChartType};

/// `key field=value ...` for every bucket, in bucket-map order.
fn render_buckets(chart: &ProcessedChart) -> String {
    chart
        .buckets
        .iter()
        .map(|(key, record)| {
            let fields: Vec<String> = record
                .iter()
                .map(|(field, value)| format!("{}={}", field, value.resolve().unwrap_or(f64::NAN)))
                .collect();
            format!("{} {}", key, fields.join(" ")).trim_end().to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ============================================================================
// Autodetected Definition
// ============================================================================

#[test]
fn snapshot_autodetected_definition() {
    let rows = [
        dated_row("2023-10-01", 42.5),
        dated_row("2023-10-02", 12.0),
    ];
    let charts = run(Vec::new(), &rows);
    let json = serde_json::to_string(&charts[0].definition).unwrap();
    insta::assert_snapshot!(json, @r#"{"chartType":"timeline","xdef":{"field":"date","transformFunction":"date:day","sortOrder":"ascKeys"},"ydefs":[{"field":"value","aggregateFunction":"sum"}]}"#);
}

// ============================================================================
// Bucket Shapes
// ============================================================================

#[test]
fn snapshot_pie_with_other() {
    let definition = ChartDefinition::new(ChartType::Pie, "category")
        .with_measure("amount", AggregateFunction::Sum)
        .with_pie_limits(Some(0.1), None);
    let rows = [
        category_row("alpha", 50.0),
        category_row("beta", 30.0),
        category_row("gamma", 15.0),
        category_row("delta", 3.0),
        category_row("epsilon", 2.0),
    ];
    let charts = run(vec![definition], &rows);

    insta::assert_snapshot!(charts[0].bucket_keys_ordered.join(","), @"alpha,beta,gamma,Other");
    insta::assert_snapshot!(render_buckets(&charts[0]), @r"
    Other amount=5
    alpha amount=50
    beta amount=30
    gamma amount=15
    ");
}

#[test]
fn snapshot_grouped_measures() {
    let definition = ChartDefinition::new(ChartType::Bar, "category")
        .with_measure("amount", AggregateFunction::Avg)
        .with_measure("amount_max", AggregateFunction::Max)
        .with_grouping("quarter", None);
    let rows = [
        category_row("north", 10.0)
            .with("quarter", "q1")
            .with("amount_max", 10.0),
        category_row("south", 4.0)
            .with("quarter", "q1")
            .with("amount_max", 4.0),
        category_row("north", 6.0)
            .with("quarter", "q2")
            .with("amount_max", 6.0),
        category_row("north", 2.0)
            .with("quarter", "q2")
            .with("amount_max", 2.0),
    ];
    let charts = run(vec![definition], &rows);

    insta::assert_snapshot!(charts[0].groups.join(","), @"q1,q2");
    insta::assert_snapshot!(render_buckets(&charts[0]), @r"
    q1::north amount=10 amount_max=10
    q1::south amount=4 amount_max=4
    q2::north amount=4 amount_max=6
    ");
}
