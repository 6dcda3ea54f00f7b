//! Generate dates, query the backend, pivot, and write the CSV.
//!
//! Both queries finish before the output file is opened, so a failed run
//! leaves any previous report untouched.

use crate::client::ReportSource;
use crate::config::ReportConfig;
use crate::error::ReportError;
use crate::output::write_csv;
use crate::pivot::{PivotGrid, assemble};
use log::info;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSummary {
    pub output_path: PathBuf,
    pub date_columns: usize,
    pub priority_rows: usize,
    pub extra_rows: usize,
}

/// Fetch both result sets, one after the other, and pivot them.
pub async fn build_grid<S: ReportSource>(
    source: &S,
    config: &ReportConfig,
) -> Result<PivotGrid, ReportError> {
    config.validate()?;
    let dates = config.date_keys()?;
    let (start_date, end_date) = config.request_dates()?;

    info!(
        "1/2: fetching daily {} for {}..{}",
        config.aggregate_metric, start_date, end_date
    );
    let aggregate = source
        .fetch_daily_aggregate(
            &config.property_id,
            &start_date,
            &end_date,
            &config.aggregate_metric,
        )
        .await?;

    info!(
        "2/2: fetching {} by {}",
        config.breakdown_metric, config.breakdown_dimension
    );
    let breakdown = source
        .fetch_daily_breakdown(
            &config.property_id,
            &start_date,
            &end_date,
            &config.breakdown_metric,
            &config.breakdown_dimension,
            config.event_name(),
        )
        .await?;

    Ok(assemble(
        &dates,
        &aggregate,
        &breakdown,
        &config.priority_rows,
        &config.labels.aggregate_row,
    ))
}

/// Run the whole report and write it to `config.output_path`.
pub async fn run<S: ReportSource>(
    source: &S,
    config: &ReportConfig,
) -> Result<ReportSummary, ReportError> {
    let grid = build_grid(source, config).await?;
    write_csv(&grid, &config.labels.item_header, &config.output_path)?;
    info!("Saved pivot report to {}", config.output_path.display());

    Ok(ReportSummary {
        output_path: config.output_path.clone(),
        date_columns: grid.column_count(),
        priority_rows: grid.priority_row_count(),
        extra_rows: grid.extra_keys.len(),
    })
}
