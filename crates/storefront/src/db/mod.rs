//! `PostgreSQL` access for the session store.
//!
//! Products, orders and accounts live in the managed backend and are reached
//! over its REST API. The only table this service owns directly is
//! `tower_sessions.session`, created by [`migrate_sessions`] and run via:
//! ```bash
//! cargo run -p shopfront-cli -- migrate
//! ```

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tower_sessions_sqlx_store::PostgresStore;

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Create the session schema and table if they do not exist.
///
/// # Errors
///
/// Returns `sqlx::Error` if the migration statements fail.
pub async fn migrate_sessions(pool: &PgPool) -> Result<(), sqlx::Error> {
    PostgresStore::new(pool.clone()).migrate().await
}
