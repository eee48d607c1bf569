//! Streaming chart processor.
//!
//! Rows are fed one at a time. Each row is classified once, optionally used
//! to synthesize chart definitions (when the caller supplied none), then
//! routed into every live chart. Call [`ChartProcessor::finalize`] after the
//! last row to sort, fill, collapse and rank the results.
//!
//! ```ignore
//! let mut processor = ChartProcessor::new(Vec::new());
//! for row in rows {
//!     processor.add_row(&row)?;
//! }
//! processor.finalize()?;
//! for chart in processor.charts() { /* render */ }
//! ```

use crate::charts::date_bucket::{ChartDate, parse_chart_date};
use crate::charts::error::ChartResult;
use crate::charts::finalize;
use crate::charts::processed::ProcessedChart;
use crate::config::EngineConfig;
use crate::constants::{FINALIZE_WARN_MS, MAX_STRING_COLUMN_LEN};
use crate::perf::ScopedTimer;
use crate::profile_scope;
use crate::types::{
    AggregateFunction, AvailableColumn, ChartDefinition, ChartType, ChartXTransform,
    ColumnDataType, Row, RowValue, SortOrder, YAxisDefinition,
};
use std::collections::HashMap;
use tracing::{debug, trace};

// ============================================================================
// Column Registry
// ============================================================================

/// Inferred type of every column seen so far, in first-seen order.
///
/// Upgrade-only: a column seen with two different types becomes `mixed`
/// and stays that way.
#[derive(Clone, Debug, Default)]
pub struct ColumnRegistry {
    order: Vec<String>,
    types: HashMap<String, ColumnDataType>,
}

impl ColumnRegistry {
    pub fn observe(&mut self, field: &str, observed: ColumnDataType) {
        match self.types.get_mut(field) {
            Some(current) => *current = current.merge(observed),
            None => {
                self.order.push(field.to_string());
                self.types.insert(field.to_string(), observed);
            }
        }
    }

    pub fn data_type(&self, field: &str) -> Option<ColumnDataType> {
        self.types.get(field).copied()
    }

    pub fn columns(&self) -> Vec<AvailableColumn> {
        self.order
            .iter()
            .map(|field| AvailableColumn {
                field: field.clone(),
                data_type: self.types.get(field).copied().unwrap_or_default(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

// ============================================================================
// Row Classification
// ============================================================================

/// A row with every field classified exactly once.
#[derive(Debug)]
pub struct ClassifiedRow<'a> {
    pub row: &'a Row,
    pub dates: Vec<(&'a str, ChartDate)>,
    pub numbers: Vec<(&'a str, f64)>,
    /// Numeric fields that do not look like identifiers
    pub measures: Vec<&'a str>,
    pub strings: Vec<&'a str>,
}

impl<'a> ClassifiedRow<'a> {
    /// Classify each field as date, number or short string, in that priority.
    pub fn classify(row: &'a Row, registry: &mut ColumnRegistry) -> Self {
        let mut classified = ClassifiedRow {
            row,
            dates: Vec::new(),
            numbers: Vec::new(),
            measures: Vec::new(),
            strings: Vec::new(),
        };

        for (field, value) in row.iter() {
            let observed = if value.is_null() {
                ColumnDataType::None
            } else if let Some(date) = parse_chart_date(value) {
                classified.dates.push((field, date));
                ColumnDataType::Date
            } else if let Some(number) = value.as_number() {
                classified.numbers.push((field, number));
                if !looks_like_identifier(field) {
                    classified.measures.push(field);
                }
                ColumnDataType::Number
            } else {
                if let RowValue::String(s) = value {
                    if s.chars().count() < MAX_STRING_COLUMN_LEN {
                        classified.strings.push(field);
                    }
                }
                ColumnDataType::String
            };
            registry.observe(field, observed);
        }

        classified
    }

    pub fn date(&self, field: &str) -> Option<ChartDate> {
        self.dates
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, date)| *date)
    }

    pub fn number(&self, field: &str) -> Option<f64> {
        self.numbers
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, number)| *number)
    }
}

/// Identifiers make poor measures: `id`, `*_id` and `*Id`.
pub fn looks_like_identifier(field: &str) -> bool {
    field == "id" || field.ends_with("_id") || field.ends_with("Id")
}

// ============================================================================
// Processor
// ============================================================================

pub struct ChartProcessor {
    charts_processing: Vec<ProcessedChart>,
    charts: Vec<ProcessedChart>,
    columns: ColumnRegistry,
    config: EngineConfig,
    auto_detect_charts: bool,
    rows_added: usize,
    finalized: bool,
}

impl ChartProcessor {
    /// Create a processor. With no definitions, charts are autodetected.
    pub fn new(definitions: Vec<ChartDefinition>) -> Self {
        Self::with_config(definitions, EngineConfig::default())
    }

    pub fn with_config(definitions: Vec<ChartDefinition>, config: EngineConfig) -> Self {
        let auto_detect_charts = definitions.is_empty();
        let charts_processing = definitions
            .into_iter()
            .map(|mut definition| {
                if definition.xdef.sort_order.is_none() {
                    definition.xdef.sort_order = Some(config.defaults.sort_order);
                }
                ProcessedChart::new(definition, true)
            })
            .collect();

        debug!(auto_detect_charts, "Created chart processor");

        Self {
            charts_processing,
            charts: Vec::new(),
            columns: ColumnRegistry::default(),
            config,
            auto_detect_charts,
            rows_added: 0,
            finalized: false,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Charts still accumulating rows.
    pub fn charts_processing(&self) -> &[ProcessedChart] {
        &self.charts_processing
    }

    /// Finalized, ranked charts. Empty until [`Self::finalize`] ran.
    pub fn charts(&self) -> &[ProcessedChart] {
        &self.charts
    }

    pub fn into_charts(self) -> Vec<ProcessedChart> {
        self.charts
    }

    pub fn available_columns(&self) -> Vec<AvailableColumn> {
        self.columns.columns()
    }

    pub fn rows_added(&self) -> usize {
        self.rows_added
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Feed one row.
    ///
    /// Fails only when a rollup meets a measure that cannot be merged across
    /// granularities. Rows arriving after finalize are ignored.
    pub fn add_row(&mut self, row: &Row) -> ChartResult<()> {
        profile_scope!("chart_add_row");
        if self.finalized {
            trace!("Ignoring row added after finalize");
            return Ok(());
        }

        let classified = ClassifiedRow::classify(row, &mut self.columns);
        if self.auto_detect_charts {
            self.autodetect(&classified);
        }

        let limits = &self.config.limits;
        for chart in &mut self.charts_processing {
            chart.add_row(&classified, limits);
        }

        let default_limit = self.config.defaults.parent_aggregate_limit;
        for chart in &mut self.charts_processing {
            if !chart.is_given_definition && chart.is_date_timeline() && !chart.is_frozen() {
                chart.roll_up_to_limit(default_limit)?;
            }
        }

        self.rows_added += 1;
        trace!(
            rows_added = self.rows_added,
            charts = self.charts_processing.len(),
            "Routed row"
        );
        Ok(())
    }

    pub fn add_rows<'a>(&mut self, rows: impl IntoIterator<Item = &'a Row>) -> ChartResult<()> {
        for row in rows {
            self.add_row(row)?;
        }
        Ok(())
    }

    fn autodetect(&mut self, row: &ClassifiedRow<'_>) {
        let limits = &self.config.limits;
        let in_grace_period = self.rows_added < limits.apply_limit_after_rows;

        for (date_field, _) in &row.dates {
            let existing = self.charts_processing.iter().position(|chart| {
                !chart.is_given_definition
                    && chart.definition.chart_type == ChartType::Timeline
                    && chart.definition.xdef.field == *date_field
            });

            let index = match existing {
                Some(index) => index,
                None => {
                    if !in_grace_period
                        || self.charts_processing.len() >= limits.autodetect_chart_limit
                    {
                        continue;
                    }
                    let definition = ChartDefinition::new(ChartType::Timeline, *date_field)
                        .with_transform(ChartXTransform::DateDay)
                        .with_sort_order(SortOrder::AscKeys);
                    debug!(x_field = %date_field, "Autodetected timeline chart");
                    self.charts_processing
                        .push(ProcessedChart::new(definition, false));
                    self.charts_processing.len() - 1
                }
            };

            if !in_grace_period {
                continue;
            }
            let definition = &mut self.charts_processing[index].definition;
            for field in &row.measures {
                if definition.has_measure(field) {
                    continue;
                }
                if definition.ydefs.len() >= limits.autodetect_measures_limit {
                    break;
                }
                trace!(x_field = %date_field, measure = %field, "Autodetected measure");
                definition
                    .ydefs
                    .push(YAxisDefinition::new(*field, AggregateFunction::Sum));
            }
        }
    }

    /// Finish ingestion: roll up, gap-fill, sort, prune and rank.
    ///
    /// Calling it twice is a no-op.
    pub fn finalize(&mut self) -> ChartResult<()> {
        if self.finalized {
            return Ok(());
        }
        let _timer = ScopedTimer::new("chart_finalize", FINALIZE_WARN_MS);

        let mut finished = Vec::with_capacity(self.charts_processing.len());
        for chart in std::mem::take(&mut self.charts_processing) {
            finished.push(finalize::finalize_chart(chart, &self.config)?);
        }

        let columns = self.columns.columns();
        let mut charts = finalize::rank_charts(finished, &self.config.limits);
        for chart in &mut charts {
            chart.available_columns = columns.clone();
        }

        debug!(
            rows = self.rows_added,
            charts = charts.len(),
            columns = columns.len(),
            "Finalized charts"
        );
        self.charts = charts;
        self.finalized = true;
        Ok(())
    }
}
