//! Reshape per-day query results into a dates-as-columns grid.

use crate::dates::DateKey;
use crate::models::{BreakdownKey, BreakdownTable, DailyAggregate};
use std::collections::BTreeSet;

pub const MISSING_VALUE: &str = "0";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PivotRow {
    pub label: String,
    /// One cell per column date, same order as [`PivotGrid::dates`].
    pub cells: Vec<String>,
}

impl PivotRow {
    fn spacer(width: usize) -> Self {
        Self {
            label: String::new(),
            cells: vec![String::new(); width],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PivotGrid {
    pub dates: Vec<DateKey>,
    /// Aggregate row, spacer row, then one row per breakdown key.
    pub rows: Vec<PivotRow>,
    /// Observed keys outside the priority list, in output order.
    pub extra_keys: Vec<BreakdownKey>,
}

impl PivotGrid {
    pub fn column_count(&self) -> usize {
        self.dates.len()
    }

    /// Rows emitted for the priority list.
    pub fn priority_row_count(&self) -> usize {
        self.rows.len() - 2 - self.extra_keys.len()
    }
}

/// Build the grid. Dates absent from `dates` are never visited, so backend
/// keys outside the requested range are dropped silently.
pub fn assemble(
    dates: &[DateKey],
    aggregate: &DailyAggregate,
    breakdown: &BreakdownTable,
    priority: &[BreakdownKey],
    aggregate_label: &str,
) -> PivotGrid {
    let mut rows = Vec::with_capacity(2 + priority.len());

    rows.push(PivotRow {
        label: aggregate_label.to_string(),
        cells: dates
            .iter()
            .map(|d| aggregate.get(d).cloned().unwrap_or_else(|| MISSING_VALUE.to_string()))
            .collect(),
    });
    rows.push(PivotRow::spacer(dates.len()));

    let observed: BTreeSet<&BreakdownKey> =
        breakdown.values().flat_map(|by_key| by_key.keys()).collect();
    let extra_keys: Vec<BreakdownKey> = observed
        .into_iter()
        .filter(|key| !priority.contains(*key))
        .cloned()
        .collect();

    for key in priority.iter().chain(&extra_keys) {
        rows.push(breakdown_row(dates, breakdown, key));
    }

    PivotGrid {
        dates: dates.to_vec(),
        rows,
        extra_keys,
    }
}

fn breakdown_row(dates: &[DateKey], breakdown: &BreakdownTable, key: &str) -> PivotRow {
    PivotRow {
        label: key.to_string(),
        cells: dates
            .iter()
            .map(|d| {
                breakdown
                    .get(d)
                    .and_then(|by_key| by_key.get(key))
                    .cloned()
                    .unwrap_or_else(|| MISSING_VALUE.to_string())
            })
            .collect(),
    }
}
