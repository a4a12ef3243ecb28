//! Authentication error types.

use thiserror::Error;

use crate::supabase::SupabaseError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] shopfront_core::EmailError),

    /// Invalid credentials (wrong password or unknown email).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// An account with this email exists.
    #[error("user already exists")]
    UserAlreadyExists,

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// A required form field is blank.
    #[error("{0} is required")]
    MissingField(&'static str),

    /// Self sign-up as this role is not allowed.
    #[error("cannot sign up as {0}")]
    RoleNotAllowed(shopfront_core::Role),

    /// The stored session can no longer be refreshed.
    #[error("session expired")]
    SessionExpired,

    /// The managed backend call failed.
    #[error("backend error: {0}")]
    Backend(#[from] SupabaseError),
}
