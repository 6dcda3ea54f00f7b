use clap::Parser;
use ga4pivot::config::{
    DEFAULT_AGGREGATE_METRIC, DEFAULT_BREAKDOWN_DIMENSION, DEFAULT_BREAKDOWN_METRIC,
    DEFAULT_END_DATE, DEFAULT_OUTPUT_PATH, DEFAULT_PROPERTY_ID, DEFAULT_START_DATE,
    parse_priority_rows,
};
use ga4pivot::{
    Client, Credentials, Labels, ReportConfig, ReportError, ReportSummary, ServiceAccountKey,
    report,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(
    name = "ga4pivot",
    about = "Write daily GA4 metrics as a pivot CSV (dates as columns)"
)]
struct Cli {
    /// GA4 property id, bare or as properties/<id>
    #[arg(long, env = "GA4_PROPERTY_ID", default_value = DEFAULT_PROPERTY_ID)]
    property_id: String,

    /// First day, YYYY-MM-DD (inclusive)
    #[arg(long, env = "GA4_START_DATE", default_value = DEFAULT_START_DATE)]
    start: String,

    /// Last day, YYYY-MM-DD (inclusive)
    #[arg(long, env = "GA4_END_DATE", default_value = DEFAULT_END_DATE)]
    end: String,

    /// Count only this event name (exact match); empty counts every event
    #[arg(long, env = "GA4_EVENT_NAME", default_value = "")]
    event_name: String,

    /// Dimension to break the event metric down by
    #[arg(long, env = "GA4_DIMENSION", default_value = DEFAULT_BREAKDOWN_DIMENSION)]
    dimension: String,

    /// Comma-separated breakdown keys emitted first, in order
    #[arg(long, env = "GA4_PRIORITY_ROWS")]
    priority_rows: Option<String>,

    /// Metric for the first row
    #[arg(long, default_value = DEFAULT_AGGREGATE_METRIC)]
    aggregate_metric: String,

    /// Metric for the breakdown rows
    #[arg(long, default_value = DEFAULT_BREAKDOWN_METRIC)]
    breakdown_metric: String,

    /// Output CSV path; overwritten if present
    #[arg(short, long, env = "GA4_OUTPUT", default_value = DEFAULT_OUTPUT_PATH)]
    output: PathBuf,

    /// Header cell above the row labels
    #[arg(long)]
    item_header: Option<String>,

    /// Label of the aggregate metric row
    #[arg(long)]
    aggregate_label: Option<String>,

    /// Service account key file
    #[arg(long, env = "GOOGLE_APPLICATION_CREDENTIALS")]
    credentials: Option<PathBuf>,

    /// Pre-issued OAuth access token; takes precedence over --credentials
    #[arg(long, env = "GA4_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// Override the Analytics Data API base URL
    #[arg(long, env = "GA4_BASE_URL")]
    base_url: Option<String>,

    /// Request timeout in seconds; none by default
    #[arg(long)]
    timeout_secs: Option<u64>,
}

impl Cli {
    fn report_config(&self) -> ReportConfig {
        let defaults = ReportConfig::default();
        let labels = Labels {
            item_header: self
                .item_header
                .clone()
                .unwrap_or(defaults.labels.item_header),
            aggregate_row: self
                .aggregate_label
                .clone()
                .unwrap_or(defaults.labels.aggregate_row),
        };
        ReportConfig {
            property_id: self.property_id.clone(),
            start_date: self.start.clone(),
            end_date: self.end.clone(),
            event_name_filter: self.event_name.clone(),
            breakdown_dimension: self.dimension.clone(),
            priority_rows: self
                .priority_rows
                .as_deref()
                .map(parse_priority_rows)
                .unwrap_or(defaults.priority_rows),
            output_path: self.output.clone(),
            aggregate_metric: self.aggregate_metric.clone(),
            breakdown_metric: self.breakdown_metric.clone(),
            labels,
        }
    }

    fn credentials(&self) -> Result<Credentials, ReportError> {
        if let Some(token) = &self.access_token {
            return Ok(Credentials::AccessToken(token.clone()));
        }
        match &self.credentials {
            Some(path) => ServiceAccountKey::from_file(path).map(Credentials::ServiceAccount),
            None => Credentials::from_env(),
        }
    }

    fn client(&self) -> Result<Client, ReportError> {
        let mut client = Client::new(self.credentials()?)?;
        if let Some(url) = &self.base_url {
            client = client.with_base_url(url);
        }
        if let Some(secs) = self.timeout_secs {
            client = client.with_timeout(Duration::from_secs(secs))?;
        }
        Ok(client)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = cli.report_config();

    match run(&cli, &config).await {
        Ok(summary) => {
            print_summary(&summary, &config);
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("\nError: {err}");
            if err.is_invalid_field() {
                eprintln!("\n{}", invalid_field_hint(&config));
            }
            ExitCode::FAILURE
        }
    }
}

/// Local checks run before credentials are touched.
async fn run(cli: &Cli, config: &ReportConfig) -> Result<ReportSummary, ReportError> {
    config.validate()?;
    let client = cli.client()?;
    report::run(&client, config).await
}

fn invalid_field_hint(config: &ReportConfig) -> String {
    format!(
        "Hint: a dimension or metric name was rejected; check dimension '{}' \
         and metrics '{}' / '{}'.",
        config.breakdown_dimension, config.aggregate_metric, config.breakdown_metric
    )
}

fn print_summary(summary: &ReportSummary, config: &ReportConfig) {
    println!(
        "\nDone: pivot report saved to '{}'",
        summary.output_path.display()
    );
    println!(
        "Date columns: {} (every day in range, with or without data)",
        summary.date_columns
    );
    println!(
        "Rows: {} + spacer + {} priority keys + others ({})",
        config.aggregate_metric, summary.priority_rows, summary.extra_rows
    );
}
