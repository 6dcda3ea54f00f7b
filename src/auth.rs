//! Service-account credentials and OAuth2 access-token exchange.
//!
//! The key file path is discovered through `GOOGLE_APPLICATION_CREDENTIALS`
//! unless given explicitly. A signed RS256 assertion is traded for a bearer
//! token at the key's `token_uri`.

use crate::error::ReportError;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

pub const CREDENTIALS_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";
pub const ANALYTICS_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/analytics.readonly";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;

#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key_id", &self.private_key_id)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct TokenError {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

impl ServiceAccountKey {
    pub fn from_json(data: &str) -> Result<Self, ReportError> {
        serde_json::from_str(data).map_err(|e| {
            ReportError::Authentication(format!("malformed service account key: {e}"))
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ReportError> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|e| {
            ReportError::Authentication(format!(
                "cannot read credential file '{}': {e}",
                path.display()
            ))
        })?;
        debug!("Loaded service account key from {}", path.display());
        Self::from_json(&data)
    }

    /// Load the key named by `GOOGLE_APPLICATION_CREDENTIALS`.
    pub fn from_env() -> Result<Self, ReportError> {
        let path = std::env::var_os(CREDENTIALS_ENV).ok_or_else(|| {
            ReportError::Authentication(format!("{CREDENTIALS_ENV} is not set"))
        })?;
        Self::from_file(path)
    }

    /// Override the token endpoint (useful for tests or proxies).
    pub fn with_token_uri(mut self, token_uri: impl Into<String>) -> Self {
        self.token_uri = token_uri.into();
        self
    }

    pub(crate) fn assertion(&self, issued_at: i64) -> Result<String, ReportError> {
        let claims = AssertionClaims {
            iss: &self.client_email,
            scope: ANALYTICS_READONLY_SCOPE,
            aud: &self.token_uri,
            iat: issued_at,
            exp: issued_at + ASSERTION_LIFETIME_SECS,
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.private_key_id.clone();
        let key = EncodingKey::from_rsa_pem(self.private_key.as_bytes())
            .map_err(|e| ReportError::Authentication(format!("invalid private key: {e}")))?;
        jsonwebtoken::encode(&header, &claims, &key)
            .map_err(|e| ReportError::Authentication(format!("cannot sign assertion: {e}")))
    }

    /// Exchange a freshly signed assertion for an access token.
    pub async fn fetch_access_token(&self, http: &reqwest::Client) -> Result<String, ReportError> {
        let assertion = self.assertion(chrono::Utc::now().timestamp())?;
        debug!(
            "Requesting access token for {} from {}",
            self.client_email, self.token_uri
        );
        let response = http
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let reason = match serde_json::from_str::<TokenError>(&body) {
                Ok(TokenError {
                    error,
                    error_description: Some(desc),
                }) => format!("{error}: {desc}"),
                Ok(TokenError { error, .. }) => error,
                Err(_) => body,
            };
            return Err(ReportError::Authentication(format!(
                "token endpoint returned {status}: {reason}"
            )));
        }
        let token: TokenResponse =
            serde_json::from_str(&body).map_err(|_| ReportError::InvalidResponse)?;
        Ok(token.access_token)
    }
}

/// How the report client authorizes itself.
#[derive(Clone)]
pub enum Credentials {
    ServiceAccount(ServiceAccountKey),
    /// A pre-issued bearer token, e.g. from `gcloud auth print-access-token`.
    AccessToken(String),
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::ServiceAccount(key) => f.debug_tuple("ServiceAccount").field(key).finish(),
            Credentials::AccessToken(_) => f.write_str("AccessToken(<redacted>)"),
        }
    }
}

impl Credentials {
    pub fn from_env() -> Result<Self, ReportError> {
        ServiceAccountKey::from_env().map(Credentials::ServiceAccount)
    }

    pub(crate) async fn access_token(&self, http: &reqwest::Client) -> Result<String, ReportError> {
        match self {
            Credentials::ServiceAccount(key) => key.fetch_access_token(http).await,
            Credentials::AccessToken(token) => Ok(token.clone()),
        }
    }
}
