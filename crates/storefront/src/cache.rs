//! In-process query cache.
//!
//! Entries are keyed by query identity (see [`Query::cache_key`]) and carry
//! tags. Mutations invalidate the tags they affect; optimistic mutations
//! patch an entry first and restore it with [`PatchHandle::undo`] if the
//! backend call fails.
//!
//! [`Query::cache_key`]: crate::supabase::Query::cache_key

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use serde::Serialize;
use serde::de::DeserializeOwned;
use shopfront_core::{ProductId, UserId};
use tracing::{debug, warn};

/// What a cached entry depends on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheTag {
    /// Any listing of products (home rails, categories, search, admin lists).
    ProductList,
    /// One product.
    Product(ProductId),
    /// One seller's products and stats.
    SellerProducts(UserId),
    /// One user's server cart.
    Cart(UserId),
    /// One user's profile.
    Profile(UserId),
    /// Order listings and store statistics.
    Orders,
}

#[derive(Clone)]
struct CachedEntry {
    value: Arc<serde_json::Value>,
    tags: Arc<[CacheTag]>,
}

/// Shared query cache. Cheap to clone.
#[derive(Clone)]
pub struct QueryCache {
    entries: Cache<String, CachedEntry>,
}

/// Undo information for an optimistic patch.
#[must_use = "call `undo` when the mutation fails"]
pub struct PatchHandle {
    key: String,
    previous: CachedEntry,
}

impl QueryCache {
    /// Create a cache holding at most `capacity` entries for `ttl` each.
    #[must_use]
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        let entries = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .support_invalidation_closures()
            .build();
        Self { entries }
    }

    /// Cached value for `key`, if present and readable as `T`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let entry = self.entries.get(key).await?;
        match serde_json::from_value(entry.value.as_ref().clone()) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "Dropping unreadable cache entry");
                self.entries.invalidate(key).await;
                None
            }
        }
    }

    /// Store `value` under `key` with `tags`.
    pub async fn insert<T: Serialize>(&self, key: String, tags: Vec<CacheTag>, value: &T) {
        match serde_json::to_value(value) {
            Ok(value) => {
                self.entries
                    .insert(
                        key,
                        CachedEntry {
                            value: Arc::new(value),
                            tags: tags.into(),
                        },
                    )
                    .await;
            }
            Err(e) => warn!(key, error = %e, "Value not cacheable"),
        }
    }

    /// Return the cached value for `key` or run `fetch` and cache its result.
    ///
    /// # Errors
    ///
    /// Returns whatever `fetch` returns; failures are not cached.
    pub async fn get_or_fetch<T, E, F, Fut>(
        &self,
        key: String,
        tags: Vec<CacheTag>,
        fetch: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(value) = self.get(&key).await {
            debug!(key, "Cache hit");
            return Ok(value);
        }
        let value = fetch().await?;
        self.insert(key, tags, &value).await;
        Ok(value)
    }

    /// Drop one entry.
    pub async fn remove(&self, key: &str) {
        self.entries.invalidate(key).await;
    }

    /// Drop every entry carrying any of `tags`.
    pub fn invalidate(&self, tags: &[CacheTag]) {
        if tags.is_empty() {
            return;
        }
        let tags: Arc<[CacheTag]> = tags.into();
        let result = self
            .entries
            .invalidate_entries_if(move |_, entry| entry.tags.iter().any(|t| tags.contains(t)));
        if let Err(e) = result {
            warn!(error = %e, "Tag invalidation failed, clearing cache");
            self.entries.invalidate_all();
        }
    }

    /// Apply `update` to the cached value for `key` ahead of a mutation.
    ///
    /// Returns `None` when nothing is cached under `key` (there is nothing
    /// to show early or to undo).
    pub async fn patch<T, F>(&self, key: &str, update: F) -> Option<PatchHandle>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&mut T),
    {
        let previous = self.entries.get(key).await?;
        let mut value: T = serde_json::from_value(previous.value.as_ref().clone()).ok()?;
        update(&mut value);
        let patched = serde_json::to_value(&value).ok()?;
        self.entries
            .insert(
                key.to_owned(),
                CachedEntry {
                    value: Arc::new(patched),
                    tags: Arc::clone(&previous.tags),
                },
            )
            .await;
        Some(PatchHandle {
            key: key.to_owned(),
            previous,
        })
    }

    /// Run moka's pending maintenance (used by tests to observe invalidation).
    pub async fn sync(&self) {
        self.entries.run_pending_tasks().await;
    }
}

impl PatchHandle {
    /// Restore the value the entry had before the patch.
    pub async fn undo(self, cache: &QueryCache) {
        debug!(key = %self.key, "Undoing optimistic patch");
        cache.entries.insert(self.key, self.previous).await;
    }
}
