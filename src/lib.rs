//! streamchart: streaming chart aggregation.
//!
//! Feed rows into a [`charts::ChartProcessor`], call `finalize`, read the
//! resulting [`charts::ProcessedChart`]s.

pub mod charts;
pub mod config;
pub mod constants;
pub mod data;
pub mod perf;
pub mod types;
