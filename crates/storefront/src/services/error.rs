//! Errors shared by the data-access services.

use shopfront_core::CartError;
use thiserror::Error;

use crate::supabase::SupabaseError;

/// Errors that can occur in catalog, cart, order, seller and admin services.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The managed backend call failed.
    #[error("backend error: {0}")]
    Backend(#[from] SupabaseError),

    /// The requested row does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The caller may not touch this resource.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Input failed validation.
    #[error("invalid input: {0}")]
    Invalid(String),

    /// Id allocation kept colliding.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Uploaded file exceeds the configured limit.
    #[error("upload of {size} bytes exceeds the {max} byte limit")]
    TooLarge { size: usize, max: usize },

    /// Cart mutation rejected.
    #[error(transparent)]
    Cart(#[from] CartError),
}
