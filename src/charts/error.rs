//! Hard failures of the chart engine.
//!
//! Bucket and group overflows are not errors at this level: they freeze a
//! single chart through its `error_message`. What remains here are
//! configuration mistakes the engine refuses to resolve silently.

use crate::types::AggregateFunction;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChartError {
    /// `first`/`last` have no meaning across a granularity boundary
    #[error("cannot roll up measure `{field}`: {} has no cross-granularity merge", .function.label())]
    UnsupportedRollupMerge {
        field: String,
        function: AggregateFunction,
    },
}

pub type ChartResult<T> = Result<T, ChartError>;
