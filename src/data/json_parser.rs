//! JSON row source
//!
//! Parses JSON arrays of objects into [`Row`]s, and JSON arrays of chart
//! definitions into [`ChartDefinition`]s.

use crate::constants::MAX_INPUT_ROWS;
use crate::data::csv_parser::check_file_size;
use crate::data::error::{DataError, DataResult};
use crate::types::{ChartDefinition, Row, RowValue};
use serde_json::{Map, Value};
use std::path::Path;

/// Parse a JSON file into rows
pub fn parse_json_file(path: &Path) -> DataResult<Vec<Row>> {
    check_file_size(path)?;
    let content = std::fs::read_to_string(path)?;
    parse_json_content(&content)
}

/// Parse JSON content from a string
///
/// Accepts a top-level array or an object wrapping one under a common key.
/// Field order follows each object's key order.
pub fn parse_json_content(json: &str) -> DataResult<Vec<Row>> {
    let value: Value = serde_json::from_str(json)?;
    let array = extract_array(&value)?;

    if array.len() > MAX_INPUT_ROWS {
        return Err(DataError::TooManyRows {
            rows: array.len(),
            max_rows: MAX_INPUT_ROWS,
        });
    }

    array
        .iter()
        .map(|item| {
            item.as_object()
                .map(row_from_object)
                .ok_or_else(|| DataError::from("Array elements must be objects"))
        })
        .collect()
}

/// Read chart definitions from a JSON file
pub fn parse_definitions_file(path: &Path) -> DataResult<Vec<ChartDefinition>> {
    let content = std::fs::read_to_string(path)?;
    parse_definitions(&content)
}

/// Parse a JSON array of chart definitions
pub fn parse_definitions(json: &str) -> DataResult<Vec<ChartDefinition>> {
    Ok(serde_json::from_str(json)?)
}

/// Convert a JSON object into a row
pub fn row_from_object(object: &Map<String, Value>) -> Row {
    object
        .iter()
        .map(|(key, value)| (key.clone(), json_value_to_row_value(value)))
        .collect()
}

/// Extract the array from JSON value, handling common wrapper patterns
fn extract_array(value: &Value) -> DataResult<&Vec<Value>> {
    match value {
        Value::Array(arr) => Ok(arr),
        Value::Object(obj) => {
            let wrapper_keys = ["data", "rows", "items", "records", "results"];
            for key in wrapper_keys {
                if let Some(Value::Array(arr)) = obj.get(key) {
                    return Ok(arr);
                }
            }
            Err(DataError::from(
                "JSON must be an array or have a data/rows/items/records/results array",
            ))
        }
        _ => Err(DataError::from("JSON must be an array of objects")),
    }
}

/// Convert a JSON value to a row value
///
/// Booleans become `"true"`/`"false"`; nested arrays and objects keep their
/// JSON text.
fn json_value_to_row_value(value: &Value) -> RowValue {
    match value {
        Value::Null => RowValue::Null,
        Value::Bool(b) => RowValue::String(b.to_string()),
        Value::Number(n) => n.as_f64().map(RowValue::Number).unwrap_or(RowValue::Null),
        Value::String(s) => RowValue::String(s.clone()),
        Value::Array(_) | Value::Object(_) => RowValue::String(value.to_string()),
    }
}
