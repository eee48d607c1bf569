//! Per-bucket aggregate records.
//!
//! A bucket holds one [`AggregateValue`] per measure field. Most functions
//! keep a single running number; `avg` keeps a `[sum, count]` pair that is
//! never resolved here. Consumers call [`AggregateValue::resolve`] when they
//! want the mean.

use crate::charts::error::{ChartError, ChartResult};
use crate::types::{AggregateFunction, ChartDefinition};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Running aggregate of one measure in one bucket
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AggregateValue {
    Scalar(f64),
    /// `avg` accumulation: `(sum, count)`
    SumCount(f64, f64),
}

impl AggregateValue {
    /// Contribution of this value to a bucket's cardinality.
    pub fn cardinality(&self) -> f64 {
        match self {
            AggregateValue::Scalar(v) => *v,
            AggregateValue::SumCount(sum, _) => *sum,
        }
    }

    /// Scalar view for consumers: the value itself, or the mean of a pair.
    pub fn resolve(&self) -> Option<f64> {
        match self {
            AggregateValue::Scalar(v) => Some(*v),
            AggregateValue::SumCount(_, count) if *count == 0.0 => None,
            AggregateValue::SumCount(sum, count) => Some(sum / count),
        }
    }

    fn as_pair(&self) -> (f64, f64) {
        match self {
            AggregateValue::Scalar(v) => (*v, 1.0),
            AggregateValue::SumCount(sum, count) => (*sum, *count),
        }
    }

    /// Combine two partial aggregates of an order-independent function.
    fn combine(self, other: AggregateValue, function: AggregateFunction) -> AggregateValue {
        match function {
            AggregateFunction::Sum | AggregateFunction::Count => {
                AggregateValue::Scalar(self.cardinality() + other.cardinality())
            }
            AggregateFunction::Min => {
                AggregateValue::Scalar(self.cardinality().min(other.cardinality()))
            }
            AggregateFunction::Max => {
                AggregateValue::Scalar(self.cardinality().max(other.cardinality()))
            }
            AggregateFunction::Avg => {
                let (s1, c1) = self.as_pair();
                let (s2, c2) = other.as_pair();
                AggregateValue::SumCount(s1 + s2, c1 + c2)
            }
            // Callers handle order-dependent functions before combining
            AggregateFunction::First => self,
            AggregateFunction::Last => other,
        }
    }
}

/// Aggregates of all measures in a single bucket
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateRecord {
    values: BTreeMap<String, AggregateValue>,
}

impl AggregateRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&AggregateValue> {
        self.values.get(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AggregateValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn remove(&mut self, field: &str) -> Option<AggregateValue> {
        self.values.remove(field)
    }

    /// Sum of every numeric value in the record.
    pub fn cardinality(&self) -> f64 {
        self.values.values().map(AggregateValue::cardinality).sum()
    }

    /// Apply one source value to the running aggregate of `field`.
    ///
    /// For `count` the value itself is ignored.
    pub fn apply(&mut self, field: &str, function: AggregateFunction, value: f64) {
        let current = self.values.get(field).copied();
        let next = match (function, current) {
            (AggregateFunction::Sum, Some(AggregateValue::Scalar(total))) => {
                AggregateValue::Scalar(total + value)
            }
            (AggregateFunction::Sum, _) => AggregateValue::Scalar(value),
            (AggregateFunction::Count, Some(AggregateValue::Scalar(total))) => {
                AggregateValue::Scalar(total + 1.0)
            }
            (AggregateFunction::Count, _) => AggregateValue::Scalar(1.0),
            (AggregateFunction::First, Some(existing)) => existing,
            (AggregateFunction::First, None) => AggregateValue::Scalar(value),
            (AggregateFunction::Last, _) => AggregateValue::Scalar(value),
            (AggregateFunction::Min, Some(AggregateValue::Scalar(current))) => {
                AggregateValue::Scalar(current.min(value))
            }
            (AggregateFunction::Max, Some(AggregateValue::Scalar(current))) => {
                AggregateValue::Scalar(current.max(value))
            }
            (AggregateFunction::Min | AggregateFunction::Max, _) => AggregateValue::Scalar(value),
            (AggregateFunction::Avg, Some(AggregateValue::SumCount(sum, count))) => {
                AggregateValue::SumCount(sum + value, count + 1.0)
            }
            (AggregateFunction::Avg, _) => AggregateValue::SumCount(value, 1.0),
        };
        self.values.insert(field.to_string(), next);
    }

    /// Merge a finer-granularity child bucket into this (parent) bucket.
    ///
    /// Fails for `first`/`last`: which child came first is not recorded.
    pub fn merge_child(
        &mut self,
        child: &AggregateRecord,
        definition: &ChartDefinition,
    ) -> ChartResult<()> {
        for (field, value) in &child.values {
            let Some(function) = definition.measure_function(field) else {
                continue;
            };
            if matches!(function, AggregateFunction::First | AggregateFunction::Last) {
                return Err(ChartError::UnsupportedRollupMerge {
                    field: field.clone(),
                    function,
                });
            }
            self.merge_value(field, *value, function);
        }
        Ok(())
    }

    /// Fold another bucket into this one, used for the pie "Other" slice.
    ///
    /// Buckets are absorbed in key order, so `first` keeps the value already
    /// present and `last` takes the incoming one.
    pub fn absorb(&mut self, other: &AggregateRecord, definition: &ChartDefinition) {
        for (field, value) in &other.values {
            let function = definition
                .measure_function(field)
                .unwrap_or(AggregateFunction::Sum);
            self.merge_value(field, *value, function);
        }
    }

    fn merge_value(&mut self, field: &str, value: AggregateValue, function: AggregateFunction) {
        let merged = match self.values.get(field) {
            Some(existing) => existing.combine(value, function),
            None => value,
        };
        self.values.insert(field.to_string(), merged);
    }
}
