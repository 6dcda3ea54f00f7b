use crate::dates::DateKey;
use crate::error::ReportError;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A secondary-dimension value such as a language code or `(not set)`.
pub type BreakdownKey = String;

/// Aggregate metric value per day, as returned by the backend.
pub type DailyAggregate = BTreeMap<DateKey, String>;

/// Metric value per day and breakdown key.
pub type BreakdownTable = BTreeMap<DateKey, BTreeMap<BreakdownKey, String>>;

pub(crate) const DATE_DIMENSION: &str = "date";
pub(crate) const EVENT_NAME_FIELD: &str = "eventName";

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunReportRequest {
    pub date_ranges: Vec<DateRange>,
    pub dimensions: Vec<Dimension>,
    pub metrics: Vec<Metric>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimension_filter: Option<FilterExpression>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Dimension {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Metric {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FilterExpression {
    pub filter: Filter,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    pub field_name: String,
    pub string_filter: StringFilter,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StringFilter {
    pub value: String,
    pub match_type: MatchType,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchType {
    Exact,
}

impl RunReportRequest {
    pub fn new(start_date: &str, end_date: &str, dimensions: &[&str], metric: &str) -> Self {
        Self {
            date_ranges: vec![DateRange {
                start_date: start_date.to_string(),
                end_date: end_date.to_string(),
            }],
            dimensions: dimensions
                .iter()
                .map(|name| Dimension {
                    name: name.to_string(),
                })
                .collect(),
            metrics: vec![Metric {
                name: metric.to_string(),
            }],
            dimension_filter: None,
        }
    }

    /// Restrict rows to an exact event name. An empty name leaves the
    /// request unfiltered.
    pub fn with_event_name(mut self, event_name: Option<&str>) -> Self {
        self.dimension_filter = event_name
            .filter(|name| !name.is_empty())
            .map(|name| FilterExpression {
                filter: Filter {
                    field_name: EVENT_NAME_FIELD.to_string(),
                    string_filter: StringFilter {
                        value: name.to_string(),
                        match_type: MatchType::Exact,
                    },
                },
            });
        self
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReportResponse {
    #[serde(default)]
    pub rows: Vec<Row>,
    #[serde(default)]
    pub row_count: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Row {
    #[serde(default)]
    pub dimension_values: Vec<Value>,
    #[serde(default)]
    pub metric_values: Vec<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Value {
    #[serde(default)]
    pub value: String,
}

impl Row {
    fn dimension(&self, idx: usize) -> Result<&str, ReportError> {
        self.dimension_values
            .get(idx)
            .map(|v| v.value.as_str())
            .ok_or(ReportError::InvalidResponse)
    }

    fn metric(&self, idx: usize) -> Result<&str, ReportError> {
        self.metric_values
            .get(idx)
            .map(|v| v.value.as_str())
            .ok_or(ReportError::InvalidResponse)
    }
}

impl RunReportResponse {
    /// Rows keyed by the first dimension (date).
    pub fn daily_aggregate(&self) -> Result<DailyAggregate, ReportError> {
        let mut out = DailyAggregate::new();
        for row in &self.rows {
            out.insert(row.dimension(0)?.to_string(), row.metric(0)?.to_string());
        }
        Ok(out)
    }

    /// Rows keyed by date, then by the second dimension.
    pub fn breakdown_table(&self) -> Result<BreakdownTable, ReportError> {
        let mut out = BreakdownTable::new();
        for row in &self.rows {
            let date = row.dimension(0)?;
            let key = row.dimension(1)?;
            let value = row.metric(0)?;
            out.entry(date.to_string())
                .or_default()
                .insert(key.to_string(), value.to_string());
        }
        Ok(out)
    }
}

/// Google API error envelope: `{"error": {"code", "message", "status"}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub code: Option<u16>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: Option<String>,
}

pub fn parse_run_report(data: &str) -> Result<RunReportResponse, ReportError> {
    let parsed: RunReportResponse =
        serde_json::from_str(data).map_err(|_| ReportError::InvalidResponse)?;
    debug!("Parsed report with {} rows", parsed.rows.len());
    Ok(parsed)
}

pub fn parse_daily_aggregate(data: &str) -> Result<DailyAggregate, ReportError> {
    parse_run_report(data)?.daily_aggregate()
}

pub fn parse_breakdown_table(data: &str) -> Result<BreakdownTable, ReportError> {
    parse_run_report(data)?.breakdown_table()
}

/// Best-effort extraction of the error body; `None` when the payload is not
/// a Google error envelope.
pub fn parse_error_body(data: &str) -> Option<ErrorBody> {
    serde_json::from_str::<ErrorEnvelope>(data)
        .ok()
        .map(|e| e.error)
}
