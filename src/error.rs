use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("invalid date range: {0}")]
    InvalidRange(#[from] RangeError),

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid or unexpected response format")]
    InvalidResponse,

    #[error("api rejected request: {0}")]
    Api(#[from] ApiError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

impl ReportError {
    /// True when the backend rejected a dimension or metric name.
    pub fn is_invalid_field(&self) -> bool {
        matches!(self, ReportError::Api(ApiError::InvalidField(_)))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RangeError {
    #[error("'{0}' is not a valid YYYY-MM-DD calendar date")]
    InvalidDate(String),

    #[error("start {start} must be before or equal to end {end}")]
    Reversed {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid field: {0}")]
    InvalidField(String),

    #[error("invalid property: {0}")]
    InvalidProperty(String),

    #[error("not authorized: {0}")]
    Authentication(String),

    #[error("transient backend failure ({status}): {message}")]
    Transient {
        status: reqwest::StatusCode,
        message: String,
    },

    #[error("unexpected status {status}: {message}")]
    UnexpectedStatus {
        status: reqwest::StatusCode,
        message: String,
    },
}
