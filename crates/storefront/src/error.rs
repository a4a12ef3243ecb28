//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server errors to Sentry
//! before responding to the client with `{"error": "<message>"}`. All route
//! handlers should return `Result<T, AppError>`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::services::ServiceError;
use crate::services::auth::AuthError;
use crate::supabase::SupabaseError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Data-access service failed.
    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Managed backend call failed outside a service.
    #[error("Backend error: {0}")]
    Backend(#[from] SupabaseError),

    /// Session store failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User lacks the role for this resource.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Upload or body too large.
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

const INTERNAL_MESSAGE: &str = "Internal server error";
const BACKEND_MESSAGE: &str = "External service error";

fn classify_backend(err: &SupabaseError) -> (StatusCode, String) {
    match err {
        SupabaseError::Unauthorized(_) => {
            (StatusCode::UNAUTHORIZED, "Session expired, please sign in again".into())
        }
        SupabaseError::RateLimited(_) => (StatusCode::TOO_MANY_REQUESTS, "Too many requests".into()),
        e if e.is_not_found() => (StatusCode::NOT_FOUND, "Not found".into()),
        e if e.is_conflict() => (StatusCode::CONFLICT, "Conflict".into()),
        _ => (StatusCode::BAD_GATEWAY, BACKEND_MESSAGE.into()),
    }
}

impl AppError {
    /// Status code and client-facing message.
    ///
    /// Internal details are never part of the message.
    fn classify(&self) -> (StatusCode, String) {
        match self {
            Self::Backend(err) | Self::Service(ServiceError::Backend(err)) => classify_backend(err),
            Self::Auth(AuthError::Backend(err)) => classify_backend(err),
            Self::Service(err) => match err {
                ServiceError::NotFound(what) => (StatusCode::NOT_FOUND, format!("Not found: {what}")),
                ServiceError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
                ServiceError::Invalid(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
                ServiceError::Cart(e) => (StatusCode::BAD_REQUEST, e.to_string()),
                ServiceError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
                ServiceError::TooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, err.to_string()),
                ServiceError::Backend(_) => (StatusCode::BAD_GATEWAY, BACKEND_MESSAGE.into()),
            },
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => {
                    (StatusCode::UNAUTHORIZED, "Invalid credentials".into())
                }
                AuthError::UserAlreadyExists => (StatusCode::CONFLICT, "User already exists".into()),
                AuthError::WeakPassword(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
                AuthError::InvalidEmail(_) => (StatusCode::BAD_REQUEST, "Invalid email address".into()),
                AuthError::MissingField(_) => (StatusCode::BAD_REQUEST, err.to_string()),
                AuthError::RoleNotAllowed(_) => (StatusCode::FORBIDDEN, err.to_string()),
                AuthError::SessionExpired => (
                    StatusCode::UNAUTHORIZED,
                    "Session expired, please sign in again".into(),
                ),
                AuthError::Backend(_) => (StatusCode::BAD_GATEWAY, BACKEND_MESSAGE.into()),
            },
            Self::Session(_) | Self::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE.into())
            }
            Self::NotFound(what) => (StatusCode::NOT_FOUND, format!("Not found: {what}")),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg.clone()),
            Self::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "Too many requests".into()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = self.classify();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added to cart", Some(&[("product_id", "PRD00001")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
