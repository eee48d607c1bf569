//! Streaming chart aggregation engine
//!
//! Turns an ordered stream of rows into bounded, bucketed chart datasets.
//!
//! - `date_bucket`: date parsing, bucket keys and rollup key arithmetic
//! - `aggregate`: per-bucket aggregate records
//! - `processed`: per-chart accumulation state and rollup
//! - `processor`: row classification, autodetection and routing
//! - `finalize`: gap-fill, sort, pruning, pie collapsing and ranking
//! - `scoring`: the ranking heuristic

pub mod aggregate;
pub mod date_bucket;
mod error;
pub mod finalize;
pub mod processed;
pub mod processor;
pub mod scoring;

pub use aggregate::{AggregateRecord, AggregateValue};
pub use date_bucket::{ChartDate, DateGranularity, parse_chart_date};
pub use error::*;
pub use processed::ProcessedChart;
pub use processor::{ChartProcessor, ClassifiedRow, ColumnRegistry};
