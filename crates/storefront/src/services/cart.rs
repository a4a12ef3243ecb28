//! Server cart of a signed-in user.
//!
//! The cart lives in the account's `user_metadata.cart`. Mutations patch the
//! cached copy first and roll the patch back when the backend write fails.
//! Visitors who are not signed in keep a local cart in their session; that
//! cart uses the same [`Cart`] type and is folded in by [`CartService::merge`].

use serde::Serialize;
use shopfront_core::{Cart, Price, ProductId, UserId};
use tracing::{info, instrument, warn};

use super::ServiceError;
use crate::cache::{CacheTag, QueryCache};
use crate::models::Product;
use crate::supabase::{SupabaseClient, UserAttributes};

/// One cart line priced against the current catalog.
#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    pub product: Product,
    pub quantity: u32,
    pub line_total: Price,
}

/// Cart lines with totals.
#[derive(Debug, Clone, Serialize)]
pub struct CartSummary {
    pub lines: Vec<CartLine>,
    pub total_quantity: u64,
    pub total: Price,
}

impl CartSummary {
    /// Price `cart` with `products`. Lines whose product is gone are dropped.
    #[must_use]
    pub fn new(cart: &Cart, products: Vec<Product>) -> Self {
        let lines: Vec<CartLine> = products
            .into_iter()
            .filter_map(|product| {
                let quantity = cart.quantity(&product.product_id);
                (quantity > 0).then(|| CartLine {
                    line_total: product.product_price.times(quantity),
                    product,
                    quantity,
                })
            })
            .collect();
        let total = lines.iter().map(|line| line.line_total).sum();
        let total_quantity = lines.iter().map(|line| u64::from(line.quantity)).sum();
        Self {
            lines,
            total_quantity,
            total,
        }
    }
}

/// Cart operations for one signed-in user.
pub struct CartService<'a> {
    client: &'a SupabaseClient,
    cache: &'a QueryCache,
    user: UserId,
}

impl<'a> CartService<'a> {
    /// `client` must carry the user's access token.
    #[must_use]
    pub const fn new(client: &'a SupabaseClient, cache: &'a QueryCache, user: UserId) -> Self {
        Self {
            client,
            cache,
            user,
        }
    }

    fn cache_key(&self) -> String {
        format!("cart:{}", self.user)
    }

    /// The server cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails.
    pub async fn get(&self) -> Result<Cart, ServiceError> {
        self.cache
            .get_or_fetch(self.cache_key(), vec![CacheTag::Cart(self.user)], || async {
                Ok::<_, ServiceError>(self.client.get_user().await?.cart())
            })
            .await
    }

    /// Add `quantity` units of `product`.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Cart` for invalid quantities, or an error if
    /// the backend call fails.
    #[instrument(skip(self), fields(user_id = %self.user))]
    pub async fn add(&self, product: ProductId, quantity: u32) -> Result<Cart, ServiceError> {
        self.mutate(|cart| cart.add(product.clone(), quantity).map(drop))
            .await
    }

    /// Set the quantity of `product`; zero removes the line.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Cart` for invalid quantities, or an error if
    /// the backend call fails.
    #[instrument(skip(self), fields(user_id = %self.user))]
    pub async fn set_quantity(
        &self,
        product: ProductId,
        quantity: u32,
    ) -> Result<Cart, ServiceError> {
        self.mutate(|cart| cart.set_quantity(product.clone(), quantity).map(drop))
            .await
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails.
    #[instrument(skip(self), fields(user_id = %self.user))]
    pub async fn clear(&self) -> Result<Cart, ServiceError> {
        self.mutate(|cart| {
            cart.clear();
            Ok(())
        })
        .await
    }

    /// Fold the local (pre-login) cart into the server cart by summing
    /// quantities per product.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails; the caller keeps the
    /// local cart so the merge can be retried.
    #[instrument(skip(self, local), fields(user_id = %self.user, lines = local.len()))]
    pub async fn merge(&self, local: &Cart) -> Result<Cart, ServiceError> {
        let merged = self
            .mutate(|cart| {
                cart.merge(local);
                Ok(())
            })
            .await?;
        info!(lines = merged.len(), "Merged local cart");
        Ok(merged)
    }

    /// Apply `change` optimistically to the cached cart, then to the backend.
    async fn mutate<F>(&self, change: F) -> Result<Cart, ServiceError>
    where
        F: Fn(&mut Cart) -> Result<(), shopfront_core::CartError>,
    {
        let key = self.cache_key();
        let patch = self
            .cache
            .patch::<Cart, _>(&key, |cart| {
                let _ = change(cart);
            })
            .await;

        match self.write(&change).await {
            Ok(cart) => {
                self.cache
                    .insert(key, vec![CacheTag::Cart(self.user)], &cart)
                    .await;
                Ok(cart)
            }
            Err(e) => {
                if let Some(patch) = patch {
                    warn!(error = %e, "Cart update failed, restoring cached cart");
                    patch.undo(self.cache).await;
                }
                Err(e)
            }
        }
    }

    async fn write<F>(&self, change: &F) -> Result<Cart, ServiceError>
    where
        F: Fn(&mut Cart) -> Result<(), shopfront_core::CartError>,
    {
        let mut cart = self.client.get_user().await?.cart();
        change(&mut cart)?;
        let attributes = UserAttributes {
            data: Some(serde_json::json!({ "cart": cart })),
            ..UserAttributes::default()
        };
        let user = self.client.update_user(&attributes).await?;
        Ok(user.cart())
    }
}
