//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::cache::QueryCache;
use crate::config::StorefrontConfig;
use crate::supabase::SupabaseClient;

/// Entries kept in the query cache.
const CACHE_CAPACITY: u64 = 10_000;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// the session pool, the anonymous backend client and the query cache.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    supabase: SupabaseClient,
    cache: QueryCache,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Storefront configuration
    /// * `pool` - `PostgreSQL` connection pool for the session store
    #[must_use]
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Self {
        let supabase = SupabaseClient::new(&config.supabase);
        let cache = QueryCache::new(CACHE_CAPACITY, config.cache_ttl);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                supabase,
                cache,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Anonymous backend client. Use [`SupabaseClient::as_user`] for
    /// requests on behalf of a signed-in user.
    #[must_use]
    pub fn supabase(&self) -> &SupabaseClient {
        &self.inner.supabase
    }

    /// Shared query cache.
    #[must_use]
    pub fn cache(&self) -> &QueryCache {
        &self.inner.cache
    }
}
