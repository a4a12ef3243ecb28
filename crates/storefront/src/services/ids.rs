//! Order and product id allocation.
//!
//! `uuid` codes (`ORD-<32 hex>`) never collide. `sequential` codes
//! (`ORD00042`) are derived from the latest stored id, which races with
//! concurrent writers; a unique violation on insert is treated as a lost
//! race and the insert is retried with a fresh candidate.

use std::fmt;
use std::future::Future;
use std::str::FromStr;

use serde::Serialize;
use serde::de::DeserializeOwned;
use shopfront_core::{OrderId, ProductId};
use tracing::{debug, instrument, warn};

use super::ServiceError;
use crate::supabase::{Query, SupabaseClient, SupabaseError};

/// Inserts attempted before giving up on a sequential id.
pub const MAX_ATTEMPTS: u32 = 5;

/// How new order and product ids are chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IdStrategy {
    /// Random UUID-backed codes.
    #[default]
    Uuid,
    /// Latest stored code plus one.
    Sequential,
}

impl IdStrategy {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Uuid => "uuid",
            Self::Sequential => "sequential",
        }
    }
}

impl fmt::Display for IdStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "uuid" => Ok(Self::Uuid),
            "sequential" => Ok(Self::Sequential),
            other => Err(format!("expected `uuid` or `sequential`, got `{other}`")),
        }
    }
}

/// A prefixed code stored as the primary key of a table.
pub trait CodeId: Clone + fmt::Display + DeserializeOwned + Send + Sync {
    /// Table the code keys.
    const TABLE: &'static str;
    /// Column holding the code.
    const COLUMN: &'static str;
    /// Column whose descending order puts the latest row first.
    const LATEST_BY: &'static str;

    fn next_after(latest: Option<&Self>) -> Self;
    fn generate() -> Self;
    fn sequence_number(&self) -> Option<u32>;
    fn from_sequence(n: u32) -> Self;
}

impl CodeId for OrderId {
    const TABLE: &'static str = "orders";
    const COLUMN: &'static str = "order_id";
    const LATEST_BY: &'static str = "created_at";

    fn next_after(latest: Option<&Self>) -> Self {
        Self::next_after(latest)
    }
    fn generate() -> Self {
        Self::generate()
    }
    fn sequence_number(&self) -> Option<u32> {
        Self::sequence_number(self)
    }
    fn from_sequence(n: u32) -> Self {
        Self::from_sequence(n)
    }
}

impl CodeId for ProductId {
    const TABLE: &'static str = "products";
    const COLUMN: &'static str = "product_id";
    const LATEST_BY: &'static str = "product_id";

    fn next_after(latest: Option<&Self>) -> Self {
        Self::next_after(latest)
    }
    fn generate() -> Self {
        Self::generate()
    }
    fn sequence_number(&self) -> Option<u32> {
        Self::sequence_number(self)
    }
    fn from_sequence(n: u32) -> Self {
        Self::from_sequence(n)
    }
}

/// Chooses ids and inserts rows keyed by them.
pub struct IdAllocator<'a> {
    client: &'a SupabaseClient,
    strategy: IdStrategy,
}

impl<'a> IdAllocator<'a> {
    #[must_use]
    pub const fn new(client: &'a SupabaseClient, strategy: IdStrategy) -> Self {
        Self { client, strategy }
    }

    /// The next candidate id.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the latest id fails.
    pub async fn next<I: CodeId>(&self) -> Result<I, SupabaseError> {
        match self.strategy {
            IdStrategy::Uuid => Ok(I::generate()),
            IdStrategy::Sequential => {
                let query = Query::table(I::TABLE)
                    .select(I::COLUMN)
                    .order(I::LATEST_BY, false)
                    .limit(1);
                let rows: Vec<serde_json::Value> = self.client.select(&query).await?;
                let latest = rows
                    .into_iter()
                    .next()
                    .and_then(|mut row| row.get_mut(I::COLUMN).map(serde_json::Value::take))
                    .map(serde_json::from_value::<I>)
                    .transpose()?;
                Ok(I::next_after(latest.as_ref()))
            }
        }
    }

    /// Insert the row built by `prepare` for a fresh id, retrying on unique
    /// violations.
    ///
    /// `prepare` runs once per attempt, including for ids that turn out to
    /// be taken, so it must not write anything keyed by the id.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Conflict` when every attempt collided, or the
    /// first non-conflict error.
    #[instrument(skip(self, prepare), fields(table = I::TABLE, strategy = %self.strategy))]
    pub async fn insert_with_id<I, R, T, F, Fut>(&self, prepare: F) -> Result<T, ServiceError>
    where
        I: CodeId,
        R: Serialize + Send + Sync,
        T: DeserializeOwned,
        F: Fn(I) -> Fut,
        Fut: Future<Output = Result<R, ServiceError>>,
    {
        let mut candidate: I = self.next().await?;
        for attempt in 1..=MAX_ATTEMPTS {
            let row = prepare(candidate.clone()).await?;
            match self.client.insert::<R, T>(I::TABLE, &row).await {
                Ok(rows) => {
                    debug!(id = %candidate, attempt, "Inserted row");
                    return rows.into_iter().next().ok_or_else(|| {
                        ServiceError::NotFound(format!("{} row {candidate}", I::TABLE))
                    });
                }
                Err(e) if e.is_conflict() && attempt < MAX_ATTEMPTS => {
                    warn!(id = %candidate, attempt, "Id already taken, retrying");
                    candidate = self.after_conflict(&candidate).await?;
                }
                Err(e) if e.is_conflict() => break,
                Err(e) => return Err(e.into()),
            }
        }
        Err(ServiceError::Conflict(format!(
            "could not allocate a free {} id after {MAX_ATTEMPTS} attempts",
            I::TABLE
        )))
    }

    /// Candidate after `taken` collided: re-read the latest id, but never go
    /// backwards.
    async fn after_conflict<I: CodeId>(&self, taken: &I) -> Result<I, SupabaseError> {
        let fresh: I = self.next().await?;
        Ok(match (fresh.sequence_number(), taken.sequence_number()) {
            (Some(fresh_n), Some(taken_n)) if fresh_n <= taken_n => {
                I::from_sequence(taken_n.saturating_add(1))
            }
            _ => fresh,
        })
    }
}
