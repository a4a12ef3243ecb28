//! Product catalog reads: home rails, product pages, categories and search.
//!
//! Every read goes through the query cache under the key of the backend
//! query it issues, tagged so product mutations can invalidate it.

use rust_decimal::Decimal;
use serde::Deserialize;
use shopfront_core::{PageRequest, Paginated, ProductId};
use tracing::instrument;

use super::ServiceError;
use crate::cache::{CacheTag, QueryCache};
use crate::models::Product;
use crate::supabase::{Condition, Query, SupabaseClient};

/// Products shown in the flash sale rail.
pub const FLASH_SALE_LIMIT: u64 = 6;
/// Products shown in the "just for you" rail.
pub const JUST_FOR_YOU_LIMIT: u64 = 10;
/// Related products shown under a product.
pub const RELATED_LIMIT: u64 = 6;
/// Category name that lists every product.
pub const ALL_CATEGORIES: &str = "all";

/// Result ordering for search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortBy {
    /// Backend order.
    #[default]
    Relevance,
    PriceLowHigh,
    PriceHighLow,
}

/// Inclusive price bounds, parsed from `min-max` or `min-`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceRange {
    pub min: Decimal,
    pub max: Option<Decimal>,
}

impl PriceRange {
    /// Parse `"10-50"` or `"100-"`.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Invalid` for anything else.
    pub fn parse(raw: &str) -> Result<Self, ServiceError> {
        let invalid = || ServiceError::Invalid(format!("invalid price range `{raw}`"));
        let (min, max) = raw.trim().split_once('-').ok_or_else(invalid)?;
        let min: Decimal = min.trim().parse().map_err(|_| invalid())?;
        let max = match max.trim() {
            "" => None,
            max => Some(max.parse::<Decimal>().map_err(|_| invalid())?),
        };
        if min.is_sign_negative() || max.is_some_and(|max| max < min) {
            return Err(invalid());
        }
        Ok(Self { min, max })
    }
}

/// Search form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub price_range: Option<String>,
    #[serde(default)]
    pub sort_by: SortBy,
}

/// Read-only catalog access.
pub struct CatalogService<'a> {
    client: &'a SupabaseClient,
    cache: &'a QueryCache,
}

impl<'a> CatalogService<'a> {
    #[must_use]
    pub const fn new(client: &'a SupabaseClient, cache: &'a QueryCache) -> Self {
        Self { client, cache }
    }

    /// Products on flash sale.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails.
    #[instrument(skip(self))]
    pub async fn flash_sale(&self) -> Result<Vec<Product>, ServiceError> {
        let query = Query::table("products")
            .select("*")
            .eq("flash_sale", true)
            .limit(FLASH_SALE_LIMIT);
        self.list(query).await
    }

    /// The "just for you" rail.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails.
    #[instrument(skip(self))]
    pub async fn just_for_you(&self) -> Result<Vec<Product>, ServiceError> {
        let query = Query::table("products")
            .select("*")
            .limit(JUST_FOR_YOU_LIMIT);
        self.list(query).await
    }

    /// One product, `None` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails.
    #[instrument(skip(self))]
    pub async fn product(&self, id: &ProductId) -> Result<Option<Product>, ServiceError> {
        let query = Query::table("products")
            .select("*")
            .eq("product_id", id);
        self.cache
            .get_or_fetch(
                query.cache_key(),
                vec![CacheTag::Product(id.clone()), CacheTag::ProductList],
                || async { Ok::<_, ServiceError>(self.client.select_single(&query).await?) },
            )
            .await
    }

    /// Products sharing a category with `product`, excluding it.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails.
    #[instrument(skip(self, product), fields(product_id = %product.product_id))]
    pub async fn related(&self, product: &Product) -> Result<Vec<Product>, ServiceError> {
        if product.product_category.is_empty() {
            return Ok(Vec::new());
        }
        let query = Query::table("products")
            .select("*")
            .neq("product_id", &product.product_id)
            .any_of(
                product
                    .product_category
                    .iter()
                    .map(|category| Condition::contains("product_category", category)),
            )
            .limit(RELATED_LIMIT);
        self.list(query).await
    }

    /// One page of a category, sorted by name. `"all"` lists every product.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails.
    #[instrument(skip(self))]
    pub async fn category(
        &self,
        name: &str,
        page: PageRequest,
    ) -> Result<Paginated<Product>, ServiceError> {
        let mut query = Query::table("products").select("*");
        if !name.eq_ignore_ascii_case(ALL_CATEGORIES) {
            query = query.contains("product_category", name);
        }
        let (from, to) = page.range();
        let query = query.order("product_name", true).range(from, to);

        let (items, total) = self
            .cache
            .get_or_fetch(query.cache_key(), vec![CacheTag::ProductList], || async {
                Ok::<_, ServiceError>(self.client.select_with_count::<Product>(&query).await?)
            })
            .await?;
        Ok(Paginated::new(items, total, page))
    }

    /// Products whose name matches `params.q`, optionally narrowed by
    /// category and price and sorted by price.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Invalid` for a malformed price range, or an
    /// error if the backend call fails.
    #[instrument(skip(self))]
    pub async fn search(&self, params: &SearchParams) -> Result<Vec<Product>, ServiceError> {
        let mut query = Query::table("products").select("*");
        let term = params.q.trim();
        if !term.is_empty() {
            query = query.contains("product_name", term);
        }
        if let Some(category) = params
            .category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty() && !c.eq_ignore_ascii_case(ALL_CATEGORIES))
        {
            query = query.contains("product_category", category);
        }
        if let Some(range) = params
            .price_range
            .as_deref()
            .filter(|r| !r.trim().is_empty())
        {
            let range = PriceRange::parse(range)?;
            query = query.gte("product_price", range.min);
            if let Some(max) = range.max {
                query = query.lte("product_price", max);
            }
        }
        query = match params.sort_by {
            SortBy::Relevance => query,
            SortBy::PriceLowHigh => query.order("product_price", true),
            SortBy::PriceHighLow => query.order("product_price", false),
        };
        self.list(query).await
    }

    /// Products with the given ids, in backend order.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails.
    #[instrument(skip(self), fields(count = ids.len()))]
    pub async fn multiple(&self, ids: &[ProductId]) -> Result<Vec<Product>, ServiceError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = Query::table("products")
            .select("*")
            .is_in("product_id", ids);
        self.list(query).await
    }

    async fn list(&self, query: Query) -> Result<Vec<Product>, ServiceError> {
        self.cache
            .get_or_fetch(query.cache_key(), vec![CacheTag::ProductList], || async {
                Ok::<_, ServiceError>(self.client.select(&query).await?)
            })
            .await
    }
}
