//! Buyer order history, order tracking and checkout.

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use shopfront_core::{Cart, OrderId, OrderState, PaymentMethod, Price, ProductId, UserId};
use tracing::{info, instrument};

use super::ServiceError;
use super::ids::{IdAllocator, IdStrategy};
use crate::cache::{CacheTag, QueryCache};
use crate::models::{NewOrder, Order, Product, ProductIdList, ShippingAddress};
use crate::supabase::{Query, SupabaseClient};

/// An order in the buyer's history, with its products and total.
#[derive(Debug, Clone, Serialize)]
pub struct BuyerOrder {
    #[serde(flatten)]
    pub order: Order,
    pub products: Vec<Product>,
    /// Sum of the prices of the order's products.
    pub total: Price,
}

/// The buyer dashboard: every order plus the lifetime spend.
#[derive(Debug, Clone, Serialize)]
pub struct OrderHistory {
    pub orders: Vec<BuyerOrder>,
    pub total_spend: Price,
}

/// One product line on the tracking page.
#[derive(Debug, Clone, Serialize)]
pub struct TrackedItem {
    pub product: Product,
    pub quantity: u32,
}

/// An order as shown on the tracking page.
#[derive(Debug, Clone, Serialize)]
pub struct OrderTracking {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<TrackedItem>,
}

/// Checkout form.
#[derive(Debug, Clone, Deserialize)]
pub struct Checkout {
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
}

/// Order reads and checkout for one signed-in buyer.
pub struct OrderService<'a> {
    client: &'a SupabaseClient,
    cache: &'a QueryCache,
}

impl<'a> OrderService<'a> {
    /// `client` must carry the buyer's access token.
    #[must_use]
    pub const fn new(client: &'a SupabaseClient, cache: &'a QueryCache) -> Self {
        Self { client, cache }
    }

    /// Every order of `buyer`, newest first, with per-order totals.
    ///
    /// # Errors
    ///
    /// Returns an error if a backend call fails.
    #[instrument(skip(self))]
    pub async fn history(&self, buyer: UserId) -> Result<OrderHistory, ServiceError> {
        let query = Query::table("orders")
            .select("*")
            .eq("buyer_id", buyer)
            .order("created_at", false);
        let orders: Vec<Order> = self.client.select(&query).await?;

        let products = self
            .products_by_id(orders.iter().flat_map(|o| o.products_id.ids()))
            .await?;

        let orders: Vec<BuyerOrder> = orders
            .into_iter()
            .map(|order| {
                let products: Vec<Product> = order
                    .products_id
                    .ids()
                    .iter()
                    .filter_map(|id| products.get(id).cloned())
                    .collect();
                let total = products.iter().map(|p| p.product_price).sum();
                BuyerOrder {
                    order,
                    products,
                    total,
                }
            })
            .collect();
        let total_spend = orders.iter().map(|o| o.total).sum();

        Ok(OrderHistory {
            orders,
            total_spend,
        })
    }

    /// Tracking view of one order. Only the buyer who placed it may see it.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` for an unknown order and
    /// `ServiceError::Forbidden` when `viewer` did not place it.
    #[instrument(skip(self))]
    pub async fn tracking(
        &self,
        order_id: &OrderId,
        viewer: UserId,
    ) -> Result<OrderTracking, ServiceError> {
        let query = Query::table("orders")
            .select("*")
            .eq("order_id", order_id);
        let order: Order = self
            .client
            .select_single(&query)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("order {order_id}")))?;
        if order.buyer_id != viewer {
            return Err(ServiceError::Forbidden(
                "this order belongs to another account".into(),
            ));
        }

        let products = self.products_by_id(order.products_id.ids()).await?;
        let items = order
            .products_id
            .ids()
            .iter()
            .filter_map(|id| products.get(id).cloned())
            .map(|product| TrackedItem {
                product,
                quantity: 1,
            })
            .collect();
        Ok(OrderTracking { order, items })
    }

    /// Place an order for everything in `cart`.
    ///
    /// The total is computed here from current prices. The caller clears the
    /// cart once this returns.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Invalid` for an empty cart, missing address
    /// fields or products that no longer exist, and `ServiceError::Conflict`
    /// if no free order id could be allocated.
    #[instrument(skip(self, cart, checkout), fields(lines = cart.len()))]
    pub async fn place_order(
        &self,
        buyer: UserId,
        cart: &Cart,
        checkout: &Checkout,
        strategy: IdStrategy,
    ) -> Result<Order, ServiceError> {
        if cart.is_empty() {
            return Err(ServiceError::Invalid("cart is empty".into()));
        }
        let missing = checkout.shipping_address.missing_fields();
        if !missing.is_empty() {
            return Err(ServiceError::Invalid(format!(
                "shipping address is missing {}",
                missing.join(", ")
            )));
        }

        let products = self.products_by_id(cart.product_ids()).await?;
        if let Some(gone) = cart.product_ids().find(|id| !products.contains_key(*id)) {
            return Err(ServiceError::Invalid(format!(
                "product {gone} is no longer available"
            )));
        }
        let total = cart.total(|id| products.get(id).map(|p| p.product_price));
        let product_ids = ProductIdList(cart.product_ids().cloned().collect());

        let order: Order = IdAllocator::new(self.client, strategy)
            .insert_with_id(|order_id: OrderId| {
                let row = NewOrder {
                    order_id,
                    created_at: Utc::now(),
                    products_id: product_ids.clone(),
                    buyer_id: buyer,
                    order_state: OrderState::Pending,
                    total_count: total,
                    shipping_address: checkout.shipping_address.clone(),
                    payment_method: checkout.payment_method,
                };
                async move { Ok(row) }
            })
            .await?;

        self.cache.invalidate(&[CacheTag::Orders]);
        info!(order_id = %order.order_id, total = %order.total_count, "Order placed");
        Ok(order)
    }

    async fn products_by_id<'i, I>(&self, ids: I) -> Result<HashMap<ProductId, Product>, ServiceError>
    where
        I: IntoIterator<Item = &'i ProductId>,
    {
        let mut ids: Vec<&ProductId> = ids.into_iter().collect();
        ids.sort();
        ids.dedup();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let query = Query::table("products")
            .select("*")
            .is_in("product_id", ids);
        let products: Vec<Product> = self.client.select(&query).await?;
        Ok(products
            .into_iter()
            .map(|p| (p.product_id.clone(), p))
            .collect())
    }
}
