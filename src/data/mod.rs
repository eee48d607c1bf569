//! Row sources
//!
//! Loaders that turn CSV, TSV and JSON input into the [`Row`]s the chart
//! engine consumes, plus the JSON reader for chart definitions.
//!
//! ## Error Handling
//!
//! All loaders return `DataResult<T>` which uses the `DataError` type.
//! Common errors include:
//! - `TooLarge`: File exceeds size limits
//! - `TooManyRows`: Input exceeds row limits
//! - `Io`: File system errors
//! - `Csv`/`Json`: Parse errors

mod csv_parser;
mod error;
mod json_parser;

pub use csv_parser::*;
pub use error::*;
pub use json_parser::*;

use crate::types::Row;
use std::path::Path;

/// Input formats recognised by file extension
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputFormat {
    Csv,
    Tsv,
    Json,
}

impl InputFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "csv" | "txt" => Some(InputFormat::Csv),
            "tsv" => Some(InputFormat::Tsv),
            "json" => Some(InputFormat::Json),
            _ => None,
        }
    }
}

/// Check if a file path is a supported data file (CSV/TSV/JSON)
pub fn is_data_file(path: &Path) -> bool {
    InputFormat::from_path(path).is_some()
}

/// Load every row of a data file, choosing the parser by extension.
pub fn load_rows(path: &Path) -> DataResult<Vec<Row>> {
    match InputFormat::from_path(path) {
        Some(InputFormat::Csv | InputFormat::Tsv) => parse_csv_file(path),
        Some(InputFormat::Json) => parse_json_file(path),
        None => Err(DataError::InvalidData(format!(
            "Unsupported input file: {}",
            path.display()
        ))),
    }
}
