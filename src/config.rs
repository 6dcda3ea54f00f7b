use crate::client::property_resource;
use crate::dates::{DateKey, date_keys, iso_date, parse_date};
use crate::error::{ApiError, ReportError};
use chrono::NaiveDate;
use std::path::PathBuf;

pub const DEFAULT_PROPERTY_ID: &str = "509200578";
pub const DEFAULT_START_DATE: &str = "2025-11-01";
pub const DEFAULT_END_DATE: &str = "2025-11-30";
pub const DEFAULT_BREAKDOWN_DIMENSION: &str = "customEvent:selected_language";
pub const DEFAULT_PRIORITY_ROWS: [&str; 6] = ["(not set)", "en", "ja", "ko", "zh-CN", "zh-TW"];
pub const DEFAULT_OUTPUT_PATH: &str = "ga4_daily_report_pivot.csv";
pub const DEFAULT_AGGREGATE_METRIC: &str = "activeUsers";
pub const DEFAULT_BREAKDOWN_METRIC: &str = "eventCount";

/// Fixed text placed in the CSV besides dates and breakdown keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Labels {
    /// First cell of the header row.
    pub item_header: String,
    /// Label of the aggregate metric row.
    pub aggregate_row: String,
}

impl Default for Labels {
    fn default() -> Self {
        Self {
            item_header: "項目".to_string(),
            aggregate_row: "アクティブユーザー数".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportConfig {
    pub property_id: String,
    /// Inclusive, `YYYY-MM-DD`.
    pub start_date: String,
    /// Inclusive, `YYYY-MM-DD`.
    pub end_date: String,
    /// Exact event name to count; empty counts every event.
    pub event_name_filter: String,
    pub breakdown_dimension: String,
    /// Breakdown keys emitted first, in this order, observed or not.
    pub priority_rows: Vec<String>,
    pub output_path: PathBuf,
    pub aggregate_metric: String,
    pub breakdown_metric: String,
    pub labels: Labels,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            property_id: DEFAULT_PROPERTY_ID.to_string(),
            start_date: DEFAULT_START_DATE.to_string(),
            end_date: DEFAULT_END_DATE.to_string(),
            event_name_filter: String::new(),
            breakdown_dimension: DEFAULT_BREAKDOWN_DIMENSION.to_string(),
            priority_rows: DEFAULT_PRIORITY_ROWS.iter().map(|s| s.to_string()).collect(),
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            aggregate_metric: DEFAULT_AGGREGATE_METRIC.to_string(),
            breakdown_metric: DEFAULT_BREAKDOWN_METRIC.to_string(),
            labels: Labels::default(),
        }
    }
}

impl ReportConfig {
    /// The event filter to send, `None` when it is empty.
    pub fn event_name(&self) -> Option<&str> {
        Some(self.event_name_filter.as_str()).filter(|name| !name.is_empty())
    }

    /// Parsed inclusive bounds.
    pub fn date_bounds(&self) -> Result<(NaiveDate, NaiveDate), ReportError> {
        Ok((parse_date(&self.start_date)?, parse_date(&self.end_date)?))
    }

    /// Bounds re-rendered as `YYYY-MM-DD`, free of surrounding whitespace.
    pub fn request_dates(&self) -> Result<(String, String), ReportError> {
        let (start, end) = self.date_bounds()?;
        Ok((iso_date(start), iso_date(end)))
    }

    /// Every requested day, as column keys.
    pub fn date_keys(&self) -> Result<Vec<DateKey>, ReportError> {
        let (start, end) = self.date_bounds()?;
        Ok(date_keys(start, end)?)
    }

    /// Local checks that need no backend round trip.
    pub fn validate(&self) -> Result<(), ReportError> {
        self.date_keys()?;
        property_resource(&self.property_id)?;
        for (what, name) in [
            ("aggregate metric", &self.aggregate_metric),
            ("breakdown metric", &self.breakdown_metric),
            ("breakdown dimension", &self.breakdown_dimension),
        ] {
            if name.trim().is_empty() {
                return Err(ApiError::InvalidField(format!("{what} name is empty")).into());
            }
        }
        Ok(())
    }
}

/// Split a comma-separated list of breakdown keys, dropping blanks.
pub fn parse_priority_rows(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .collect()
}
