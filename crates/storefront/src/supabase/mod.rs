//! Client for the managed backend (Supabase).
//!
//! # Architecture
//!
//! - One `reqwest::Client` shared behind an `Arc`; cloning the client is cheap
//! - Every call sends the anon key as `apikey`; the bearer token is the anon
//!   key for public reads or the visitor's access token once they signed in
//!   (see [`SupabaseClient::as_user`])
//! - The backend is the source of truth; nothing is synced locally
//!
//! # APIs
//!
//! ## `PostgREST` (`/rest/v1`)
//! - Table reads and writes through [`Query`] and [`TableRequest`]
//!
//! ## `GoTrue` (`/auth/v1`)
//! - Sign-up, password and refresh grants, logout, user metadata updates
//!
//! ## Storage (`/storage/v1`)
//! - Image uploads and public object URLs
//!
//! # Example
//!
//! ```rust,ignore
//! use shopfront_storefront::supabase::{Query, SupabaseClient};
//!
//! let client = SupabaseClient::new(&config.supabase);
//! let rows: Vec<ProductRow> = client
//!     .select(&Query::table("products").eq("flash_sale", true).limit(6))
//!     .await?;
//! ```

mod auth;
mod rest;
mod storage;

pub use auth::{AdminUserAttributes, AuthSessionTokens, AuthUser, UserAttributes, UserMetadata};
pub use rest::{Condition, Query, TableRequest};

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::config::SupabaseConfig;

/// `PostgREST` error code for "no rows" under single-object responses.
pub const NO_ROWS_CODE: &str = "PGRST116";

/// SQLSTATE for unique constraint violations.
pub const UNIQUE_VIOLATION_CODE: &str = "23505";

/// Errors that can occur when talking to the managed backend.
#[derive(Debug, Error)]
pub enum SupabaseError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with an error.
    #[error("API error ({status}{}): {message}", .code.as_deref().map(|c| format!(", {c}")).unwrap_or_default())]
    Api {
        /// HTTP status.
        status: u16,
        /// `PostgREST` / `GoTrue` error code, when present.
        code: Option<String>,
        /// Human readable message.
        message: String,
    },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Building a request URL failed.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unique constraint or duplicate resource.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Rate limited by the backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Missing, expired or rejected credentials.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// A table request used a method the abstraction does not map.
    #[error("unsupported method: {0}")]
    UnsupportedMethod(String),

    /// A table request was malformed.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl SupabaseError {
    /// Whether this error is a unique violation (lost an id race).
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        match self {
            Self::Conflict(_) => true,
            Self::Api { status, code, .. } => {
                *status == 409 || code.as_deref() == Some(UNIQUE_VIOLATION_CODE)
            }
            _ => false,
        }
    }

    /// Whether this error means the requested row does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Api { code, .. } => code.as_deref() == Some(NO_ROWS_CODE),
            _ => false,
        }
    }

    /// Classify an error response body from any of the three services.
    fn from_response(status: reqwest::StatusCode, body: &str) -> Self {
        let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
        let code = parsed.error_code.or_else(|| {
            parsed.code.map(|c| match c {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            })
        });
        let message = parsed
            .message
            .or(parsed.msg)
            .or(parsed.error_description)
            .or(parsed.error)
            .unwrap_or_else(|| body.chars().take(200).collect());

        match (status.as_u16(), code.as_deref()) {
            (_, Some(NO_ROWS_CODE)) | (404, _) => Self::NotFound(message),
            (409, _) | (_, Some(UNIQUE_VIOLATION_CODE | "user_already_exists")) => {
                Self::Conflict(message)
            }
            (401, _) => Self::Unauthorized(message),
            (status, _) => Self::Api {
                status,
                code,
                message,
            },
        }
    }
}

/// Union of the error shapes returned by `PostgREST`, `GoTrue` and Storage.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    code: Option<serde_json::Value>,
    message: Option<String>,
    msg: Option<String>,
    error: Option<String>,
    error_code: Option<String>,
    error_description: Option<String>,
}

// =============================================================================
// SupabaseClient
// =============================================================================

/// Client for the managed backend.
///
/// Cheap to clone. A clone made with [`as_user`](Self::as_user) sends the
/// visitor's access token so row level security applies to them.
#[derive(Clone)]
pub struct SupabaseClient {
    inner: Arc<SupabaseClientInner>,
    bearer: Option<Arc<str>>,
}

struct SupabaseClientInner {
    http: reqwest::Client,
    base_url: Url,
    anon_key: SecretString,
    service_role_key: Option<SecretString>,
}

impl std::fmt::Debug for SupabaseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("as_user", &self.bearer.is_some())
            .finish_non_exhaustive()
    }
}

impl SupabaseClient {
    /// Create a new client.
    #[must_use]
    pub fn new(config: &SupabaseConfig) -> Self {
        Self {
            inner: Arc::new(SupabaseClientInner {
                http: reqwest::Client::new(),
                base_url: config.url.clone(),
                anon_key: config.anon_key.clone(),
                service_role_key: config.service_role_key.clone(),
            }),
            bearer: None,
        }
    }

    /// A clone of this client that authenticates as the holder of `access_token`.
    #[must_use]
    pub fn as_user(&self, access_token: &str) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            bearer: Some(Arc::from(access_token)),
        }
    }

    /// A clone of this client that authenticates with the service role key.
    ///
    /// # Errors
    ///
    /// Returns `SupabaseError::Unauthorized` if no service role key was configured.
    pub fn as_service_role(&self) -> Result<Self, SupabaseError> {
        let key = self
            .inner
            .service_role_key
            .as_ref()
            .ok_or_else(|| SupabaseError::Unauthorized("service role key not configured".into()))?;
        Ok(Self {
            inner: Arc::clone(&self.inner),
            bearer: Some(Arc::from(key.expose_secret())),
        })
    }

    /// Whether requests carry a user (or service role) token.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.bearer.is_some()
    }

    /// Project base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Resolve a path relative to the project URL.
    fn endpoint(&self, path: &str) -> Result<Url, SupabaseError> {
        Ok(self.inner.base_url.join(path)?)
    }

    /// Start a request with the `apikey` and bearer headers set.
    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        let anon = self.inner.anon_key.expose_secret();
        let token = self.bearer.as_deref().unwrap_or(anon);
        self.inner
            .http
            .request(method, url)
            .header("apikey", anon)
            .bearer_auth(token)
    }

    /// Send a request, turning non-success statuses into `SupabaseError`.
    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, SupabaseError> {
        let response = builder.send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(SupabaseError::RateLimited(retry_after));
        }

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await?;
        let error = SupabaseError::from_response(status, &body);
        if status.is_server_error() {
            tracing::error!(
                status = %status,
                body = %body.chars().take(500).collect::<String>(),
                "Backend returned server error"
            );
        } else {
            tracing::debug!(status = %status, error = %error, "Backend rejected request");
        }
        Err(error)
    }

    /// Read a JSON body, logging the raw text when it does not parse.
    async fn json<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, SupabaseError> {
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %text.chars().take(500).collect::<String>(),
                "Failed to parse backend response"
            );
            SupabaseError::Parse(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use super::*;

    #[test]
    fn test_postgrest_no_rows_is_not_found() {
        let body = r#"{"code":"PGRST116","details":"The result contains 0 rows","hint":null,"message":"JSON object requested, multiple (or no) rows returned"}"#;
        let err = SupabaseError::from_response(StatusCode::NOT_ACCEPTABLE, body);
        assert!(err.is_not_found());
        assert!(matches!(err, SupabaseError::NotFound(_)));
    }

    #[test]
    fn test_unique_violation_is_conflict() {
        let body = r#"{"code":"23505","details":"Key (order_id)=(ORD00042) already exists.","hint":null,"message":"duplicate key value violates unique constraint \"orders_pkey\""}"#;
        let err = SupabaseError::from_response(StatusCode::CONFLICT, body);
        assert!(err.is_conflict());
        assert!(err.to_string().contains("duplicate key"));
    }

    #[test]
    fn test_gotrue_error_shapes() {
        let body = r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#;
        let err = SupabaseError::from_response(StatusCode::BAD_REQUEST, body);
        match err {
            SupabaseError::Api {
                status, message, ..
            } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Invalid login credentials");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let body = r#"{"code":422,"error_code":"user_already_exists","msg":"User already registered"}"#;
        let err = SupabaseError::from_response(StatusCode::UNPROCESSABLE_ENTITY, body);
        assert!(err.is_conflict());
    }

    #[test]
    fn test_unparseable_body_keeps_text() {
        let err = SupabaseError::from_response(StatusCode::BAD_GATEWAY, "upstream down");
        assert_eq!(err.to_string(), "API error (502): upstream down");
    }

    #[test]
    fn test_as_user_shares_inner() {
        let config = SupabaseConfig::new("http://localhost:54321", "anon").unwrap_or_else(|e| panic!("{e}"));
        let client = SupabaseClient::new(&config);
        let user = client.as_user("token");
        assert!(!client.is_authenticated());
        assert!(user.is_authenticated());
        assert!(Arc::ptr_eq(&client.inner, &user.inner));
        assert!(client.as_service_role().is_err());
    }
}
