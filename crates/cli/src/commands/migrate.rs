//! Session store migration.
//!
//! # Usage
//!
//! ```bash
//! shopfront-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `STOREFRONT_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL`
//!   connection string of the Supabase database

use secrecy::SecretString;
use shopfront_storefront::db;
use thiserror::Error;

/// Errors that can occur while migrating.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: STOREFRONT_DATABASE_URL or DATABASE_URL")]
    MissingDatabaseUrl,

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

fn database_url() -> Result<SecretString, MigrationError> {
    dotenvy::dotenv().ok();
    std::env::var("STOREFRONT_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| MigrationError::MissingDatabaseUrl)
}

/// Create the `tower_sessions` schema and session table.
///
/// # Errors
///
/// Returns an error if the database URL is missing or a statement fails.
pub async fn sessions() -> Result<(), MigrationError> {
    let url = database_url()?;

    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&url).await?;

    tracing::info!("Creating session table...");
    db::migrate_sessions(&pool).await?;

    tracing::info!("Session store migration complete");
    Ok(())
}
