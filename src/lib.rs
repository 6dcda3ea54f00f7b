//! Daily Google Analytics 4 metrics as a pivoted CSV report.
//! Fetches one aggregate metric and one broken-down metric for a date range
//! and lays them out with dates as columns and metrics/breakdown keys as rows.

pub mod auth;
pub mod client;
pub mod config;
pub mod dates;
pub mod error;
pub mod models;
pub mod output;
pub mod pivot;
pub mod report;

pub use auth::{Credentials, ServiceAccountKey};
pub use client::{Client, ReportSource};
pub use config::{Labels, ReportConfig};
pub use dates::{DateKey, date_range};
pub use error::{ApiError, RangeError, ReportError};
pub use models::{BreakdownKey, BreakdownTable, DailyAggregate};
pub use pivot::{PivotGrid, PivotRow};
pub use report::ReportSummary;
