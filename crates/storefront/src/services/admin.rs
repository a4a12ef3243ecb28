//! Store-wide administration: statistics, product and order tables.

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use shopfront_core::{OrderId, OrderState, PageRequest, Paginated, Price, ProductId};
use tracing::{info, instrument};

use super::ServiceError;
use crate::cache::{CacheTag, QueryCache};
use crate::models::{Order, OrderWithProducts, Product};
use crate::supabase::{Query, SupabaseClient};

/// Days covered by the sales chart.
pub const SALES_WINDOW_DAYS: u32 = 30;

/// One point of the sales chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySales {
    /// `Day 1` (oldest) to `Day 30` (today).
    pub label: String,
    pub date: NaiveDate,
    pub sales: Price,
}

/// Admin dashboard numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminStats {
    pub total_products: u64,
    pub total_orders: u64,
    /// Σ `total_count` over all orders.
    pub total_sales: Price,
    pub daily_sales: Vec<DailySales>,
}

/// Daily sales for the window ending on `today`, oldest first.
///
/// Orders outside the window are ignored.
#[must_use]
pub fn daily_series<I>(today: NaiveDate, orders: I) -> Vec<DailySales>
where
    I: IntoIterator<Item = (DateTime<Utc>, Price)>,
{
    let first = today
        .checked_sub_days(Days::new(u64::from(SALES_WINDOW_DAYS - 1)))
        .unwrap_or(today);
    let mut series: Vec<DailySales> = first
        .iter_days()
        .take(SALES_WINDOW_DAYS as usize)
        .enumerate()
        .map(|(i, date)| DailySales {
            label: format!("Day {}", i + 1),
            date,
            sales: Price::ZERO,
        })
        .collect();

    for (created_at, total) in orders {
        let day = created_at.date_naive();
        if let Some(point) = series.iter_mut().find(|p| p.date == day) {
            point.sales = point.sales + total;
        }
    }
    series
}

#[derive(Deserialize)]
struct OrderTotal {
    #[serde(default)]
    total_count: Option<Price>,
}

#[derive(Deserialize)]
struct DatedTotal {
    created_at: DateTime<Utc>,
    #[serde(default)]
    total_count: Option<Price>,
}

/// Listing filters for the admin tables.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub search: Option<String>,
}

impl ListParams {
    #[must_use]
    pub fn page(&self) -> PageRequest {
        PageRequest::new(self.page, self.limit)
    }

    fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Admin operations. The client must carry an admin's access token.
pub struct AdminService<'a> {
    client: &'a SupabaseClient,
    cache: &'a QueryCache,
}

impl<'a> AdminService<'a> {
    #[must_use]
    pub const fn new(client: &'a SupabaseClient, cache: &'a QueryCache) -> Self {
        Self { client, cache }
    }

    /// Product and order counts, total sales and the last 30 days of sales.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the backend calls fails.
    #[instrument(skip(self))]
    pub async fn stats(&self) -> Result<AdminStats, ServiceError> {
        let now = Utc::now();
        let since = now
            .date_naive()
            .checked_sub_days(Days::new(u64::from(SALES_WINDOW_DAYS - 1)))
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map_or(now, |d| d.and_utc());

        let products = Query::table("products");
        let orders = Query::table("orders");
        let totals = Query::table("orders").select("total_count");
        let recent = Query::table("orders")
            .select("created_at,total_count")
            .gte("created_at", since.to_rfc3339());

        let (total_products, total_orders, totals, recent) = tokio::try_join!(
            self.client.count(&products),
            self.client.count(&orders),
            self.client.select::<OrderTotal>(&totals),
            self.client.select::<DatedTotal>(&recent),
        )?;

        Ok(AdminStats {
            total_products,
            total_orders,
            total_sales: totals
                .into_iter()
                .filter_map(|row| row.total_count)
                .sum(),
            daily_sales: daily_series(
                now.date_naive(),
                recent
                    .into_iter()
                    .map(|row| (row.created_at, row.total_count.unwrap_or_default())),
            ),
        })
    }

    /// Products by id, optionally filtered by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails.
    #[instrument(skip(self))]
    pub async fn products(&self, params: &ListParams) -> Result<Paginated<Product>, ServiceError> {
        let page = params.page();
        let mut query = Query::table("products").select("*");
        if let Some(term) = params.search_term() {
            query = query.contains("product_name", term);
        }
        let (from, to) = page.range();
        let query = query.order("product_id", true).range(from, to);
        let (items, total) = self.client.select_with_count(&query).await?;
        Ok(Paginated::new(items, total, page))
    }

    /// Orders newest first, optionally filtered by order id.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails.
    #[instrument(skip(self))]
    pub async fn orders(&self, params: &ListParams) -> Result<Paginated<Order>, ServiceError> {
        let page = params.page();
        let mut query = Query::table("orders").select("*");
        if let Some(term) = params.search_term() {
            query = query.contains("order_id", term);
        }
        let (from, to) = page.range();
        let query = query.order("created_at", false).range(from, to);
        let (items, total) = self.client.select_with_count(&query).await?;
        Ok(Paginated::new(items, total, page))
    }

    /// Flip a product's flash sale flag.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` for an unknown product, or a backend
    /// error.
    #[instrument(skip(self))]
    pub async fn toggle_flash_sale(&self, id: &ProductId) -> Result<Product, ServiceError> {
        let query = Query::table("products").eq("product_id", id);
        let current: Product = self
            .client
            .select_single(&query.clone().select("*"))
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("product {id}")))?;
        let product = self
            .client
            .update::<_, Product>(
                &query,
                &serde_json::json!({ "flash_sale": !current.flash_sale }),
            )
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::NotFound(format!("product {id}")))?;

        self.invalidate_product(id);
        info!(product_id = %id, flash_sale = product.flash_sale, "Flash sale toggled");
        Ok(product)
    }

    /// Delete any product.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if nothing was deleted, or a backend
    /// error.
    #[instrument(skip(self))]
    pub async fn delete_product(&self, id: &ProductId) -> Result<(), ServiceError> {
        let query = Query::table("products").eq("product_id", id);
        if self.client.delete(&query).await? == 0 {
            return Err(ServiceError::NotFound(format!("product {id}")));
        }
        self.invalidate_product(id);
        info!(product_id = %id, "Product deleted by admin");
        Ok(())
    }

    /// One order with the rows of its products.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` for an unknown order, or a backend
    /// error.
    #[instrument(skip(self))]
    pub async fn order_detail(&self, id: &OrderId) -> Result<OrderWithProducts, ServiceError> {
        let query = Query::table("orders").select("*").eq("order_id", id);
        let order: Order = self
            .client
            .select_single(&query)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("order {id}")))?;
        let products = if order.products_id.ids().is_empty() {
            Vec::new()
        } else {
            let query = Query::table("products")
                .select("*")
                .is_in("product_id", order.products_id.ids());
            self.client.select(&query).await?
        };
        Ok(OrderWithProducts { order, products })
    }

    /// Move an order to `state`.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` for an unknown order, or a backend
    /// error.
    #[instrument(skip(self))]
    pub async fn update_order_status(
        &self,
        id: &OrderId,
        state: OrderState,
    ) -> Result<Order, ServiceError> {
        let query = Query::table("orders").eq("order_id", id);
        let order = self
            .client
            .update::<_, Order>(&query, &serde_json::json!({ "order_state": state }))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::NotFound(format!("order {id}")))?;
        self.cache.invalidate(&[CacheTag::Orders]);
        info!(order_id = %id, state = %state, "Order status updated");
        Ok(order)
    }

    fn invalidate_product(&self, id: &ProductId) {
        self.cache
            .invalidate(&[CacheTag::Product(id.clone()), CacheTag::ProductList]);
    }
}
