//! Loader errors
//!
//! One error type for everything read from disk: row files, chart
//! definition files and engine configuration.

use thiserror::Error;

pub use crate::constants::{MAX_INPUT_ROWS, MAX_INPUT_SIZE_MB};

#[derive(Error, Debug)]
pub enum DataError {
    /// Reading an input, definitions or config file failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed delimited text, e.g. an unbalanced quote
    #[error("CSV parse error: {0}")]
    Csv(String),

    /// Rows, definitions or config that are not valid JSON for their schema
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Input above [`MAX_INPUT_SIZE_MB`], rejected before reading
    #[error("File too large: {size_mb}MB (max {max_mb}MB)")]
    TooLarge { size_mb: u64, max_mb: usize },

    /// Input above [`MAX_INPUT_ROWS`] rows
    #[error("Too many rows: {rows} (max {max_rows})")]
    TooManyRows { rows: usize, max_rows: usize },

    /// CSV input without even a header line
    #[error("Empty file")]
    EmptyFile,

    /// CSV header with no named column
    #[error("No columns found")]
    NoColumns,

    /// Unsupported extension, JSON of the wrong shape or out-of-range config
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

pub type DataResult<T> = Result<T, DataError>;

impl From<String> for DataError {
    fn from(s: String) -> Self {
        DataError::InvalidData(s)
    }
}

impl From<&str> for DataError {
    fn from(s: &str) -> Self {
        DataError::InvalidData(s.to_string())
    }
}
