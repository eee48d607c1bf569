//! Core types for the streamchart engine.
//!
//! This module defines the row model fed into the engine and the chart
//! definitions that describe what the engine should aggregate.

use crate::charts::date_bucket::DateGranularity;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ============================================================================
// Row Types
// ============================================================================

/// A single field value in an incoming row.
#[derive(Clone, Debug, PartialEq)]
pub enum RowValue {
    String(String),
    Number(f64),
    Date(NaiveDateTime),
    Null,
}

impl RowValue {
    pub fn is_null(&self) -> bool {
        matches!(self, RowValue::Null)
    }

    /// Render the value as an identity bucket key.
    ///
    /// Whole numbers are printed without a trailing fraction so that `3.0`
    /// and `3` land in the same bucket. Null has no key.
    pub fn to_key_string(&self) -> Option<String> {
        match self {
            RowValue::String(s) => Some(s.clone()),
            RowValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    Some(format!("{}", *n as i64))
                } else {
                    Some(format!("{}", n))
                }
            }
            RowValue::Date(d) => Some(d.format("%Y-%m-%d %H:%M:%S").to_string()),
            RowValue::Null => None,
        }
    }

    /// Numeric view of the value: finite numbers and numeric strings.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            RowValue::Number(n) if n.is_finite() => Some(*n),
            RowValue::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return None;
                }
                trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
            }
            _ => None,
        }
    }
}

impl From<&str> for RowValue {
    fn from(value: &str) -> Self {
        RowValue::String(value.to_string())
    }
}

impl From<String> for RowValue {
    fn from(value: String) -> Self {
        RowValue::String(value)
    }
}

impl From<f64> for RowValue {
    fn from(value: f64) -> Self {
        RowValue::Number(value)
    }
}

impl From<i64> for RowValue {
    fn from(value: i64) -> Self {
        RowValue::Number(value as f64)
    }
}

impl From<i32> for RowValue {
    fn from(value: i32) -> Self {
        RowValue::Number(value as f64)
    }
}

impl From<NaiveDateTime> for RowValue {
    fn from(value: NaiveDateTime) -> Self {
        RowValue::Date(value)
    }
}

impl From<NaiveDate> for RowValue {
    fn from(value: NaiveDate) -> Self {
        RowValue::Date(value.and_time(chrono::NaiveTime::MIN))
    }
}

impl<T: Into<RowValue>> From<Option<T>> for RowValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(RowValue::Null)
    }
}

/// An incoming row: field names mapped to values, in source column order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Row {
    fields: Vec<(String, RowValue)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, used heavily by tests and loaders.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<RowValue>) -> Self {
        self.insert(field, value);
        self
    }

    /// Set a field, replacing any previous value for the same name.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<RowValue>) {
        let field = field.into();
        let value = value.into();
        if let Some(slot) = self.fields.iter_mut().find(|(name, _)| *name == field) {
            slot.1 = value;
        } else {
            self.fields.push((field, value));
        }
    }

    pub fn get(&self, field: &str) -> Option<&RowValue> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RowValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<RowValue>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (field, value) in iter {
            row.insert(field, value);
        }
        row
    }
}

// ============================================================================
// Column Registry Types
// ============================================================================

/// Inferred type of a column across all rows seen so far
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ColumnDataType {
    #[default]
    None,
    String,
    Number,
    Date,
    Mixed,
}

impl ColumnDataType {
    /// Combine an existing inference with a new observation.
    pub fn merge(self, observed: ColumnDataType) -> ColumnDataType {
        match (self, observed) {
            (current, ColumnDataType::None) => current,
            (ColumnDataType::None, observed) => observed,
            (current, observed) if current == observed => current,
            _ => ColumnDataType::Mixed,
        }
    }
}

/// A column observed in the input, with its inferred type
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableColumn {
    pub field: String,
    pub data_type: ColumnDataType,
}

// ============================================================================
// Chart Definition Types
// ============================================================================

/// Types of charts the engine can prepare data for
#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChartType {
    #[default]
    Bar,
    Line,
    Timeline,
    Pie,
    PolarArea,
}

impl ChartType {
    pub fn label(&self) -> &'static str {
        match self {
            ChartType::Bar => "Bar",
            ChartType::Line => "Line",
            ChartType::Timeline => "Timeline",
            ChartType::Pie => "Pie",
            ChartType::PolarArea => "Polar Area",
        }
    }
}

/// Transform applied to the X (or grouping) field before bucketing
#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChartXTransform {
    #[default]
    #[serde(rename = "identity")]
    Identity,
    #[serde(rename = "date:minute")]
    DateMinute,
    #[serde(rename = "date:hour")]
    DateHour,
    #[serde(rename = "date:day")]
    DateDay,
    #[serde(rename = "date:month")]
    DateMonth,
    #[serde(rename = "date:year")]
    DateYear,
}

impl ChartXTransform {
    /// Date granularity of this transform, `None` for identity.
    pub fn granularity(&self) -> Option<DateGranularity> {
        match self {
            ChartXTransform::Identity => None,
            ChartXTransform::DateMinute => Some(DateGranularity::Minute),
            ChartXTransform::DateHour => Some(DateGranularity::Hour),
            ChartXTransform::DateDay => Some(DateGranularity::Day),
            ChartXTransform::DateMonth => Some(DateGranularity::Month),
            ChartXTransform::DateYear => Some(DateGranularity::Year),
        }
    }

    pub fn from_granularity(granularity: DateGranularity) -> Self {
        match granularity {
            DateGranularity::Minute => ChartXTransform::DateMinute,
            DateGranularity::Hour => ChartXTransform::DateHour,
            DateGranularity::Day => ChartXTransform::DateDay,
            DateGranularity::Month => ChartXTransform::DateMonth,
            DateGranularity::Year => ChartXTransform::DateYear,
        }
    }

    pub fn is_date(&self) -> bool {
        self.granularity().is_some()
    }
}

/// Aggregation applied to a measure within a bucket
#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateFunction {
    #[default]
    Sum,
    First,
    Last,
    Min,
    Max,
    Count,
    /// Kept as a `[sum, count]` pair; consumers divide
    Avg,
}

impl AggregateFunction {
    pub fn label(&self) -> &'static str {
        match self {
            AggregateFunction::Sum => "Sum",
            AggregateFunction::First => "First",
            AggregateFunction::Last => "Last",
            AggregateFunction::Min => "Min",
            AggregateFunction::Max => "Max",
            AggregateFunction::Count => "Count",
            AggregateFunction::Avg => "Average",
        }
    }
}

/// Sort order for the X axis buckets
#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortOrder {
    /// Keep insertion order
    Natural,
    /// Sort by bucket key ascending
    #[default]
    AscKeys,
    /// Sort by bucket key descending
    DescKeys,
    /// Sort by bucket cardinality ascending
    AscValues,
    /// Sort by bucket cardinality descending
    DescValues,
}

impl SortOrder {
    pub fn label(&self) -> &'static str {
        match self {
            SortOrder::Natural => "Original",
            SortOrder::AscKeys => "Label A→Z",
            SortOrder::DescKeys => "Label Z→A",
            SortOrder::AscValues => "Value ↑",
            SortOrder::DescValues => "Value ↓",
        }
    }

    /// Whether the order is derived from bucket keys
    pub fn is_key_based(&self) -> bool {
        matches!(self, SortOrder::AscKeys | SortOrder::DescKeys)
    }
}

/// Window alignment for windowed charts
#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WindowAlign {
    Start,
    #[default]
    End,
}

/// X axis definition
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XAxisDefinition {
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, rename = "transformFunction")]
    pub transform: ChartXTransform,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<SortOrder>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_align: Option<WindowAlign>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_size: Option<usize>,
}

/// Measure (Y axis) definition
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YAxisDefinition {
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub aggregate_function: AggregateFunction,
}

impl YAxisDefinition {
    pub fn new(field: impl Into<String>, aggregate_function: AggregateFunction) -> Self {
        Self {
            field: field.into(),
            title: None,
            aggregate_function,
        }
    }
}

/// Chart definition: what to aggregate and how.
///
/// Either supplied by the caller or synthesized by autodetection.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartDefinition {
    pub chart_type: ChartType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub xdef: XAxisDefinition,
    #[serde(default)]
    pub ydefs: Vec<YAxisDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grouping_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_transform: Option<ChartXTransform>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pie_ratio_limit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pie_count_limit: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trim_x_count_limit: Option<usize>,
}

impl ChartDefinition {
    pub fn new(chart_type: ChartType, x_field: impl Into<String>) -> Self {
        Self {
            chart_type,
            xdef: XAxisDefinition {
                field: x_field.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn with_transform(mut self, transform: ChartXTransform) -> Self {
        self.xdef.transform = transform;
        self
    }

    pub fn with_sort_order(mut self, sort_order: SortOrder) -> Self {
        self.xdef.sort_order = Some(sort_order);
        self
    }

    pub fn with_measure(mut self, field: impl Into<String>, function: AggregateFunction) -> Self {
        self.ydefs.push(YAxisDefinition::new(field, function));
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_grouping(mut self, field: impl Into<String>, transform: Option<ChartXTransform>) -> Self {
        self.grouping_field = Some(field.into());
        self.group_transform = transform;
        self
    }

    pub fn with_pie_limits(mut self, ratio: Option<f64>, count: Option<usize>) -> Self {
        self.pie_ratio_limit = ratio;
        self.pie_count_limit = count;
        self
    }

    pub fn with_trim_x_count(mut self, count: usize) -> Self {
        self.trim_x_count_limit = Some(count);
        self
    }

    /// Aggregate function configured for a measure field.
    pub fn measure_function(&self, field: &str) -> Option<AggregateFunction> {
        self.ydefs
            .iter()
            .find(|y| y.field == field)
            .map(|y| y.aggregate_function)
    }

    pub fn has_measure(&self, field: &str) -> bool {
        self.ydefs.iter().any(|y| y.field == field)
    }
}
