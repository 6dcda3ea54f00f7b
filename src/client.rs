use crate::auth::Credentials;
use crate::error::{ApiError, ReportError};
use crate::models::{
    BreakdownTable, DATE_DIMENSION, DailyAggregate, RunReportRequest, RunReportResponse,
    parse_error_body, parse_run_report,
};
use log::{debug, info};
use reqwest::{Client as HttpClient, StatusCode};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::sync::OnceCell;

const BASE_URL: &str = "https://analyticsdata.googleapis.com";
const PROPERTY_PREFIX: &str = "properties/";

/// The two read-only queries the report needs from an analytics backend.
pub trait ReportSource {
    /// One metric grouped by date. The result may cover only part of the
    /// requested range.
    fn fetch_daily_aggregate(
        &self,
        property_id: &str,
        start_date: &str,
        end_date: &str,
        metric: &str,
    ) -> impl Future<Output = Result<DailyAggregate, ReportError>> + Send;

    /// One metric grouped by date and `dimension`, restricted to an exact
    /// event name when `event_name` is non-empty.
    fn fetch_daily_breakdown(
        &self,
        property_id: &str,
        start_date: &str,
        end_date: &str,
        metric: &str,
        dimension: &str,
        event_name: Option<&str>,
    ) -> impl Future<Output = Result<BreakdownTable, ReportError>> + Send;
}

/// Resource name for a property given either as `123` or `properties/123`.
pub fn property_resource(property_id: &str) -> Result<String, ApiError> {
    let id = property_id.trim();
    let id = id.strip_prefix(PROPERTY_PREFIX).unwrap_or(id);
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ApiError::InvalidProperty(format!(
            "'{property_id}' is not a numeric property identifier"
        )));
    }
    Ok(format!("{PROPERTY_PREFIX}{id}"))
}

#[derive(Clone)]
pub struct Client {
    credentials: Credentials,
    http: HttpClient,
    base_url: String,
    token: OnceCell<String>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("credentials", &self.credentials)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Create a new client with the default base URL and no request timeout.
    pub fn new(credentials: Credentials) -> Result<Self, ReportError> {
        let http = HttpClient::builder().build()?;
        info!("Initialized analytics client with default base URL");
        Ok(Self {
            credentials,
            http,
            base_url: BASE_URL.to_string(),
            token: OnceCell::new(),
        })
    }

    /// Create a client from the key file named by `GOOGLE_APPLICATION_CREDENTIALS`.
    pub fn from_env() -> Result<Self, ReportError> {
        Self::new(Credentials::from_env()?)
    }

    /// Override the base URL (useful for tests or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        info!("Updated analytics base URL to {}", self.base_url);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, ReportError> {
        self.http = HttpClient::builder().timeout(timeout).build()?;
        Ok(self)
    }

    /// Run a raw `runReport` request against a property.
    pub async fn run_report(
        &self,
        property_id: &str,
        request: &RunReportRequest,
    ) -> Result<RunReportResponse, ReportError> {
        let resource = property_resource(property_id)?;
        let url = format!("{}/v1beta/{}:runReport", self.base_url, resource);
        let token = self.access_token().await?;
        debug!("POST request to {}", url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(request)
            .send()
            .await?;
        let status = response.status();
        debug!("Received status {}", status);
        let body = response.text().await?;
        handle_status(status, &body)?;
        parse_run_report(&body)
    }

    async fn access_token(&self) -> Result<&str, ReportError> {
        let token = self
            .token
            .get_or_try_init(|| self.credentials.access_token(&self.http))
            .await?;
        Ok(token.as_str())
    }
}

impl ReportSource for Client {
    async fn fetch_daily_aggregate(
        &self,
        property_id: &str,
        start_date: &str,
        end_date: &str,
        metric: &str,
    ) -> Result<DailyAggregate, ReportError> {
        debug!(
            "Fetching daily {} for {} from {} to {}",
            metric, property_id, start_date, end_date
        );
        let request = RunReportRequest::new(start_date, end_date, &[DATE_DIMENSION], metric);
        self.run_report(property_id, &request)
            .await?
            .daily_aggregate()
    }

    async fn fetch_daily_breakdown(
        &self,
        property_id: &str,
        start_date: &str,
        end_date: &str,
        metric: &str,
        dimension: &str,
        event_name: Option<&str>,
    ) -> Result<BreakdownTable, ReportError> {
        debug!(
            "Fetching daily {} by {} for {} from {} to {} (event filter: {:?})",
            metric, dimension, property_id, start_date, end_date, event_name
        );
        let request =
            RunReportRequest::new(start_date, end_date, &[DATE_DIMENSION, dimension], metric)
                .with_event_name(event_name);
        self.run_report(property_id, &request)
            .await?
            .breakdown_table()
    }
}

fn handle_status(status: StatusCode, body: &str) -> Result<(), ReportError> {
    if status.is_success() {
        return Ok(());
    }
    let parsed = parse_error_body(body);
    let message = parsed
        .as_ref()
        .map(|b| b.message.clone())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.trim().to_string());
    let google_status = parsed.and_then(|b| b.status);
    let api_error = match (status, google_status.as_deref()) {
        (_, Some("INVALID_ARGUMENT")) | (StatusCode::BAD_REQUEST, _) => {
            ApiError::InvalidField(message)
        }
        (_, Some("NOT_FOUND")) | (StatusCode::NOT_FOUND, _) => ApiError::InvalidProperty(message),
        (_, Some("UNAUTHENTICATED" | "PERMISSION_DENIED"))
        | (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN, _) => {
            ApiError::Authentication(message)
        }
        (StatusCode::TOO_MANY_REQUESTS, _) => ApiError::Transient { status, message },
        (s, _) if s.is_server_error() => ApiError::Transient { status, message },
        _ => ApiError::UnexpectedStatus { status, message },
    };
    Err(ReportError::Api(api_error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    const PATH: &str = "/v1beta/properties/509200578:runReport";

    fn client(server: &MockServer) -> Client {
        Client::new(Credentials::AccessToken("test-token".to_string()))
            .unwrap()
            .with_base_url(server.base_url())
    }

    fn google_error(code: u16, status: &str, message: &str) -> serde_json::Value {
        json!({ "error": { "code": code, "message": message, "status": status } })
    }

    #[test]
    fn property_resource_accepts_bare_and_prefixed_ids() {
        assert_eq!(property_resource("509200578").unwrap(), "properties/509200578");
        assert_eq!(
            property_resource("properties/509200578").unwrap(),
            "properties/509200578"
        );
        assert!(matches!(
            property_resource("G-ABC123"),
            Err(ApiError::InvalidProperty(_))
        ));
        assert!(property_resource("").is_err());
    }

    #[tokio::test]
    async fn fetch_daily_aggregate_groups_by_date() {
        let server = MockServer::start_async().await;
        let report_mock = server.mock(|when, then| {
            when.method(POST)
                .path(PATH)
                .header("authorization", "Bearer test-token")
                .json_body(json!({
                    "dateRanges": [{ "startDate": "2025-11-01", "endDate": "2025-11-02" }],
                    "dimensions": [{ "name": "date" }],
                    "metrics": [{ "name": "activeUsers" }]
                }));
            then.status(200).json_body(json!({
                "rows": [
                    { "dimensionValues": [{ "value": "20251101" }], "metricValues": [{ "value": "100" }] }
                ],
                "rowCount": 1
            }));
        });

        let agg = client(&server)
            .fetch_daily_aggregate("509200578", "2025-11-01", "2025-11-02", "activeUsers")
            .await
            .unwrap();

        assert_eq!(agg.len(), 1);
        assert_eq!(agg["20251101"], "100");
        report_mock.assert_calls(1);
    }

    #[tokio::test]
    async fn fetch_daily_breakdown_sends_exact_event_filter() {
        let server = MockServer::start_async().await;
        let report_mock = server.mock(|when, then| {
            when.method(POST).path(PATH).json_body(json!({
                "dateRanges": [{ "startDate": "2025-11-01", "endDate": "2025-11-30" }],
                "dimensions": [{ "name": "date" }, { "name": "customEvent:selected_language" }],
                "metrics": [{ "name": "eventCount" }],
                "dimensionFilter": {
                    "filter": {
                        "fieldName": "eventName",
                        "stringFilter": { "value": "select_language", "matchType": "EXACT" }
                    }
                }
            }));
            then.status(200).json_body(json!({
                "rows": [
                    { "dimensionValues": [{ "value": "20251101" }, { "value": "ja" }], "metricValues": [{ "value": "10" }] },
                    { "dimensionValues": [{ "value": "20251101" }, { "value": "en" }], "metricValues": [{ "value": "5" }] }
                ]
            }));
        });

        let table = client(&server)
            .fetch_daily_breakdown(
                "509200578",
                "2025-11-01",
                "2025-11-30",
                "eventCount",
                "customEvent:selected_language",
                Some("select_language"),
            )
            .await
            .unwrap();

        assert_eq!(table["20251101"]["ja"], "10");
        assert_eq!(table["20251101"]["en"], "5");
        report_mock.assert_calls(1);
    }

    #[tokio::test]
    async fn fetch_daily_breakdown_without_event_name_is_unfiltered() {
        let server = MockServer::start_async().await;
        let report_mock = server.mock(|when, then| {
            when.method(POST).path(PATH).json_body(json!({
                "dateRanges": [{ "startDate": "2025-11-01", "endDate": "2025-11-01" }],
                "dimensions": [{ "name": "date" }, { "name": "language" }],
                "metrics": [{ "name": "eventCount" }]
            }));
            then.status(200).json_body(json!({ "rowCount": 0 }));
        });

        let table = client(&server)
            .fetch_daily_breakdown(
                "509200578",
                "2025-11-01",
                "2025-11-01",
                "eventCount",
                "language",
                None,
            )
            .await
            .unwrap();

        assert!(table.is_empty());
        report_mock.assert_calls(1);
    }

    #[tokio::test]
    async fn unknown_dimension_is_invalid_field() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path(PATH);
            then.status(400).json_body(google_error(
                400,
                "INVALID_ARGUMENT",
                "Field customEvent:nope is not a valid dimension.",
            ));
        });

        let err = client(&server)
            .fetch_daily_breakdown(
                "509200578",
                "2025-11-01",
                "2025-11-30",
                "eventCount",
                "customEvent:nope",
                None,
            )
            .await
            .unwrap_err();

        assert!(err.is_invalid_field());
        assert!(err.to_string().contains("customEvent:nope is not a valid dimension"));
    }

    #[tokio::test]
    async fn backend_statuses_are_classified() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/v1beta/properties/404:runReport");
            then.status(404)
                .json_body(google_error(404, "NOT_FOUND", "Property not found"));
        });
        server.mock(|when, then| {
            when.method(POST).path("/v1beta/properties/403:runReport");
            then.status(403).json_body(google_error(
                403,
                "PERMISSION_DENIED",
                "User does not have sufficient permissions for this property.",
            ));
        });
        server.mock(|when, then| {
            when.method(POST).path("/v1beta/properties/503:runReport");
            then.status(503).body("upstream unavailable");
        });
        server.mock(|when, then| {
            when.method(POST).path("/v1beta/properties/418:runReport");
            then.status(418).body("teapot");
        });
        let client = client(&server);
        let fetch = |id: &'static str| {
            let client = client.clone();
            async move {
                client
                    .fetch_daily_aggregate(id, "2025-11-01", "2025-11-01", "activeUsers")
                    .await
                    .unwrap_err()
            }
        };

        assert!(matches!(
            fetch("404").await,
            ReportError::Api(ApiError::InvalidProperty(msg)) if msg == "Property not found"
        ));
        assert!(matches!(
            fetch("403").await,
            ReportError::Api(ApiError::Authentication(_))
        ));
        assert!(matches!(
            fetch("503").await,
            ReportError::Api(ApiError::Transient { status, message })
                if status == StatusCode::SERVICE_UNAVAILABLE && message == "upstream unavailable"
        ));
        assert!(matches!(
            fetch("418").await,
            ReportError::Api(ApiError::UnexpectedStatus { .. })
        ));
    }

    #[tokio::test]
    async fn malformed_property_fails_before_any_request() {
        let server = MockServer::start_async().await;
        let report_mock = server.mock(|when, then| {
            when.method(POST);
            then.status(200).json_body(json!({}));
        });

        let err = client(&server)
            .fetch_daily_aggregate("UA-1234-5", "2025-11-01", "2025-11-01", "activeUsers")
            .await
            .unwrap_err();

        assert!(matches!(err, ReportError::Api(ApiError::InvalidProperty(_))));
        report_mock.assert_calls(0);
    }

    #[tokio::test]
    async fn service_account_token_is_fetched_once() {
        let server = MockServer::start_async().await;
        let token_mock = server.mock(|when, then| {
            when.method(POST).path("/token");
            then.status(200)
                .json_body(json!({ "access_token": "ya29.cached", "expires_in": 3599 }));
        });
        let report_mock = server.mock(|when, then| {
            when.method(POST)
                .path(PATH)
                .header("authorization", "Bearer ya29.cached");
            then.status(200).json_body(json!({ "rows": [] }));
        });

        let key = crate::auth::ServiceAccountKey::from_json(include_str!(
            "../tests/fixtures/service_account.json"
        ))
        .unwrap()
        .with_token_uri(server.url("/token"));
        let client = Client::new(Credentials::ServiceAccount(key))
            .unwrap()
            .with_base_url(server.base_url());

        client
            .fetch_daily_aggregate("509200578", "2025-11-01", "2025-11-01", "activeUsers")
            .await
            .unwrap();
        client
            .fetch_daily_breakdown(
                "509200578",
                "2025-11-01",
                "2025-11-01",
                "eventCount",
                "language",
                None,
            )
            .await
            .unwrap();

        token_mock.assert_calls(1);
        report_mock.assert_calls(2);
    }
}
