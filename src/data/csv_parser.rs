//! CSV and TSV row source
//!
//! Parses delimited text into [`Row`]s with per-column type inference.
//!
//! ## Memory Limits
//!
//! To prevent unbounded memory growth:
//! - Files larger than [`MAX_INPUT_SIZE_MB`] are rejected
//! - Inputs with more than [`MAX_INPUT_ROWS`] rows are rejected

use crate::charts::date_bucket::parse_chart_date;
use crate::constants::{MAX_INPUT_ROWS, MAX_INPUT_SIZE_MB};
use crate::data::error::{DataError, DataResult};
use crate::types::{ColumnDataType, Row, RowValue};
use std::path::Path;

/// Parse a CSV or TSV file into rows
///
/// Detects the delimiter from the file extension (.tsv uses tab) or from
/// content (whichever delimiter appears most often).
pub fn parse_csv_file(path: &Path) -> DataResult<Vec<Row>> {
    check_file_size(path)?;
    let content = std::fs::read_to_string(path)?;
    let delimiter = detect_delimiter(path, &content);
    parse_csv_content(&content, delimiter)
}

/// Reject files above [`MAX_INPUT_SIZE_MB`] before reading them.
pub(crate) fn check_file_size(path: &Path) -> DataResult<()> {
    let metadata = std::fs::metadata(path)?;
    let size_mb = metadata.len() / (1024 * 1024);
    if size_mb > MAX_INPUT_SIZE_MB as u64 {
        return Err(DataError::TooLarge {
            size_mb,
            max_mb: MAX_INPUT_SIZE_MB,
        });
    }
    Ok(())
}

/// Parse CSV/TSV content from a string
///
/// Empty cells become [`RowValue::Null`]. Columns whose sampled values all
/// look like numbers (or dates) are converted; everything else stays text.
pub fn parse_csv_content(content: &str, delimiter: char) -> DataResult<Vec<Row>> {
    let mut lines = content.lines();

    let header_line = lines.next().ok_or(DataError::EmptyFile)?;
    // Unnamed columns are skipped but keep their position
    let headers: Vec<(usize, String)> = split_csv_line(header_line, delimiter)
        .into_iter()
        .enumerate()
        .filter(|(_, name)| !name.is_empty())
        .collect();
    if headers.is_empty() {
        return Err(DataError::NoColumns);
    }

    let mut records: Vec<Vec<String>> = Vec::new();
    for (index, line) in lines.enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        if line.matches('"').count() % 2 == 1 {
            return Err(DataError::Csv(format!(
                "unbalanced quotes on line {}",
                index + 2
            )));
        }
        if records.len() >= MAX_INPUT_ROWS {
            return Err(DataError::TooManyRows {
                rows: records.len() + 1,
                max_rows: MAX_INPUT_ROWS,
            });
        }
        records.push(split_csv_line(line, delimiter));
    }

    let kinds: Vec<ColumnDataType> = headers
        .iter()
        .map(|(i, _)| infer_column_type(&records, *i))
        .collect();

    let rows = records
        .iter()
        .map(|record| {
            headers
                .iter()
                .zip(&kinds)
                .map(|((i, name), kind)| {
                    let cell = record.get(*i).map(String::as_str).unwrap_or("");
                    (name.clone(), parse_cell(cell, *kind))
                })
                .collect::<Row>()
        })
        .collect();

    Ok(rows)
}

/// Detect the delimiter to use for parsing
pub fn detect_delimiter(path: &Path, content: &str) -> char {
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        if ext.eq_ignore_ascii_case("tsv") {
            return '\t';
        }
    }

    let first_lines: String = content.lines().take(5).collect::<Vec<_>>().join("\n");

    let comma_count = first_lines.matches(',').count();
    let tab_count = first_lines.matches('\t').count();
    let semicolon_count = first_lines.matches(';').count();

    if tab_count > comma_count && tab_count > semicolon_count {
        '\t'
    } else if semicolon_count > comma_count {
        ';'
    } else {
        ','
    }
}

/// Split a CSV line respecting quoted fields
fn split_csv_line(line: &str, delimiter: char) -> Vec<String> {
    let mut result = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;

    for (i, c) in line.char_indices() {
        if c == '"' {
            in_quotes = !in_quotes;
        } else if c == delimiter && !in_quotes {
            result.push(unquote(&line[start..i]));
            start = i + c.len_utf8();
        }
    }
    result.push(unquote(&line[start..]));

    result
}

/// Remove surrounding quotes and collapse doubled inner quotes
fn unquote(s: &str) -> String {
    let trimmed = s.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        trimmed[1..trimmed.len() - 1].replace("\"\"", "\"")
    } else {
        trimmed.to_string()
    }
}

/// Check if a string looks like a number
///
/// Accepts a single currency or percent symbol and at most one thousands
/// separator.
///
/// # Examples
/// - `"123"` -> true
/// - `"$123.45"` -> true
/// - `"1,2,3"` -> false (too many separators)
/// - `"abc"` -> false
fn looks_like_number(s: &str) -> bool {
    parse_number(s).is_some()
}

fn parse_number(s: &str) -> Option<f64> {
    let cleaned = s.trim();
    if cleaned.is_empty() || !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let symbol_count = cleaned.matches(['$', '%', '€', '£']).count();
    if symbol_count > 1 || cleaned.matches(',').count() > 1 {
        return None;
    }

    let cleaned = cleaned.replace(['$', '%', '€', '£', ','], "");
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Infer the data type for a column by sampling values
fn infer_column_type(records: &[Vec<String>], col_idx: usize) -> ColumnDataType {
    let sample: Vec<&str> = records
        .iter()
        .take(100)
        .filter_map(|r| r.get(col_idx).map(String::as_str))
        .filter(|s| !s.is_empty())
        .collect();

    if sample.is_empty() {
        return ColumnDataType::None;
    }
    if sample.iter().all(|s| looks_like_number(s)) {
        return ColumnDataType::Number;
    }
    if sample
        .iter()
        .all(|s| parse_chart_date(&RowValue::from(*s)).is_some())
    {
        return ColumnDataType::Date;
    }
    ColumnDataType::String
}

fn parse_cell(cell: &str, kind: ColumnDataType) -> RowValue {
    if cell.is_empty() {
        return RowValue::Null;
    }
    match kind {
        ColumnDataType::Number => parse_number(cell)
            .map(RowValue::Number)
            .unwrap_or_else(|| RowValue::from(cell)),
        ColumnDataType::Date => parse_chart_date(&RowValue::from(cell))
            .and_then(|date| date.to_naive())
            .map(RowValue::Date)
            .unwrap_or_else(|| RowValue::from(cell)),
        _ => RowValue::from(cell),
    }
}
