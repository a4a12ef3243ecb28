//! Raw table access through the generic `{table, method, body}` request.
//!
//! # Usage
//!
//! ```bash
//! shopfront-cli table dump products > products.json
//! ```
//!
//! Runs with the service role so row-level security does not hide rows.

use shopfront_storefront::config::{ConfigError, SupabaseConfig};
use shopfront_storefront::supabase::{SupabaseClient, SupabaseError, TableRequest};
use thiserror::Error;

/// Errors that can occur while dumping a table.
#[derive(Debug, Error)]
pub enum TableError {
    /// Configuration is missing or invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Backend call failed.
    #[error("Backend error: {0}")]
    Backend(#[from] SupabaseError),

    /// Output encoding failed.
    #[error("Failed to encode rows: {0}")]
    Json(#[from] serde_json::Error),
}

/// Print every row of `table` as pretty JSON on stdout.
///
/// # Errors
///
/// Returns an error if configuration is missing or the request fails.
pub async fn dump(table: &str) -> Result<(), TableError> {
    let config = SupabaseConfig::from_env_with_service_role()?;
    let client = SupabaseClient::new(&config).as_service_role()?;

    let rows = client
        .base_query(&TableRequest::new(table, "GET", None))
        .await?;
    let count = rows.as_array().map_or(0, Vec::len);

    #[allow(clippy::print_stdout)]
    {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    }
    tracing::info!("Dumped {} rows from {}", count, table);
    Ok(())
}
