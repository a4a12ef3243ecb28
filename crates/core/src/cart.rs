//! Shopping cart: a map from product id to quantity.
//!
//! The same shape is used for the server cart (stored in the account's
//! metadata, authoritative once logged in) and the local cart kept in the
//! visitor's session before login. Serialized as a JSON object:
//! `{"PRD00001": 2, "PRD00007": 1}`.
//!
//! Quantities are always at least 1; a line whose quantity drops to zero is
//! removed.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::types::{Price, ProductId};

/// Errors returned by cart mutations.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CartError {
    /// Adding zero units is meaningless.
    #[error("quantity must be at least 1")]
    ZeroQuantity,
    /// A single line cannot exceed [`Cart::MAX_LINE_QUANTITY`].
    #[error("quantity must be at most {max}")]
    TooMany {
        /// Maximum units per line.
        max: u32,
    },
}

/// Product id to quantity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Cart(BTreeMap<ProductId, u32>);

impl Cart {
    /// Maximum units of one product in a cart.
    pub const MAX_LINE_QUANTITY: u32 = 999;

    /// An empty cart.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `quantity` units of `product`, accumulating with any existing line.
    ///
    /// Returns the new quantity of the line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::ZeroQuantity` when `quantity` is zero and
    /// `CartError::TooMany` when the line would exceed the per-line cap.
    pub fn add(&mut self, product: ProductId, quantity: u32) -> Result<u32, CartError> {
        if quantity == 0 {
            return Err(CartError::ZeroQuantity);
        }
        let current = self.0.get(&product).copied().unwrap_or(0);
        let next = current.saturating_add(quantity);
        if next > Self::MAX_LINE_QUANTITY {
            return Err(CartError::TooMany {
                max: Self::MAX_LINE_QUANTITY,
            });
        }
        self.0.insert(product, next);
        Ok(next)
    }

    /// Replace the quantity of a line. Zero removes the line.
    ///
    /// Returns the previous quantity, if the line existed.
    ///
    /// # Errors
    ///
    /// Returns `CartError::TooMany` when `quantity` exceeds the per-line cap.
    pub fn set_quantity(
        &mut self,
        product: ProductId,
        quantity: u32,
    ) -> Result<Option<u32>, CartError> {
        if quantity > Self::MAX_LINE_QUANTITY {
            return Err(CartError::TooMany {
                max: Self::MAX_LINE_QUANTITY,
            });
        }
        if quantity == 0 {
            return Ok(self.0.remove(&product));
        }
        Ok(self.0.insert(product, quantity))
    }

    /// Remove a line entirely.
    pub fn remove(&mut self, product: &ProductId) -> Option<u32> {
        self.0.remove(product)
    }

    /// Fold `other` into this cart by summing quantities per product.
    ///
    /// Lines that would exceed the per-line cap are clamped to it.
    pub fn merge(&mut self, other: &Self) {
        for (product, quantity) in &other.0 {
            let line = self.0.entry(product.clone()).or_insert(0);
            *line = line.saturating_add(*quantity).min(Self::MAX_LINE_QUANTITY);
        }
    }

    /// Drop every line.
    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Quantity of one product, zero when absent.
    #[must_use]
    pub fn quantity(&self, product: &ProductId) -> u32 {
        self.0.get(product).copied().unwrap_or(0)
    }

    /// Number of distinct products.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Total units across all lines (the navbar badge).
    #[must_use]
    pub fn total_quantity(&self) -> u64 {
        self.0.values().map(|q| u64::from(*q)).sum()
    }

    /// Product ids in the cart, in id order.
    pub fn product_ids(&self) -> impl Iterator<Item = &ProductId> {
        self.0.keys()
    }

    /// Lines as `(product, quantity)` pairs, in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&ProductId, u32)> {
        self.0.iter().map(|(id, q)| (id, *q))
    }

    /// Sum of price × quantity across lines.
    ///
    /// Products without a known price contribute nothing.
    pub fn total<F>(&self, price_of: F) -> Price
    where
        F: Fn(&ProductId) -> Option<Price>,
    {
        self.iter()
            .filter_map(|(id, quantity)| price_of(id).map(|price| price.times(quantity)))
            .sum()
    }
}

impl<'de> Deserialize<'de> for Cart {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<ProductId, u32>::deserialize(deserializer)?;
        Ok(Self(
            raw.into_iter()
                .filter(|(_, quantity)| *quantity > 0)
                .map(|(id, quantity)| (id, quantity.min(Self::MAX_LINE_QUANTITY)))
                .collect(),
        ))
    }
}

impl FromIterator<(ProductId, u32)> for Cart {
    fn from_iter<I: IntoIterator<Item = (ProductId, u32)>>(iter: I) -> Self {
        let mut cart = Self::new();
        for (id, quantity) in iter {
            if quantity > 0 {
                let line = cart.0.entry(id).or_insert(0);
                *line = line.saturating_add(quantity).min(Self::MAX_LINE_QUANTITY);
            }
        }
        cart
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn id(s: &str) -> ProductId {
        ProductId::new(s)
    }

    #[test]
    fn test_add_accumulates() {
        let mut cart = Cart::new();
        assert_eq!(cart.add(id("PRD00001"), 1).unwrap(), 1);
        assert_eq!(cart.add(id("PRD00001"), 2).unwrap(), 3);
        assert_eq!(cart.quantity(&id("PRD00001")), 3);
        assert_eq!(cart.len(), 1);
    }

    #[test]
    fn test_add_zero_rejected() {
        let mut cart = Cart::new();
        assert_eq!(cart.add(id("PRD00001"), 0), Err(CartError::ZeroQuantity));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_add_over_cap_leaves_line_untouched() {
        let mut cart = Cart::new();
        cart.add(id("PRD00001"), 998).unwrap();
        assert!(matches!(
            cart.add(id("PRD00001"), 5),
            Err(CartError::TooMany { .. })
        ));
        assert_eq!(cart.quantity(&id("PRD00001")), 998);
    }

    #[test]
    fn test_set_quantity_zero_removes() {
        let mut cart: Cart = [(id("PRD00001"), 2)].into_iter().collect();
        assert_eq!(cart.set_quantity(id("PRD00001"), 0).unwrap(), Some(2));
        assert!(cart.is_empty());
        assert_eq!(cart.set_quantity(id("PRD00009"), 0).unwrap(), None);
    }

    #[test]
    fn test_set_quantity_replaces() {
        let mut cart: Cart = [(id("PRD00001"), 2)].into_iter().collect();
        cart.set_quantity(id("PRD00001"), 5).unwrap();
        assert_eq!(cart.quantity(&id("PRD00001")), 5);
    }

    #[test]
    fn test_merge_sums_per_product() {
        let mut server: Cart = [(id("PRD00001"), 2), (id("PRD00002"), 1)]
            .into_iter()
            .collect();
        let local: Cart = [(id("PRD00001"), 3), (id("PRD00003"), 4)]
            .into_iter()
            .collect();

        server.merge(&local);

        assert_eq!(server.quantity(&id("PRD00001")), 5);
        assert_eq!(server.quantity(&id("PRD00002")), 1);
        assert_eq!(server.quantity(&id("PRD00003")), 4);
        assert_eq!(server.total_quantity(), 10);
    }

    #[test]
    fn test_merge_into_empty_copies() {
        let mut server = Cart::new();
        let local: Cart = [(id("PRD00004"), 2)].into_iter().collect();
        server.merge(&local);
        assert_eq!(server, local);
    }

    #[test]
    fn test_total_is_sum_of_price_times_quantity() {
        let cart: Cart = [(id("PRD00001"), 2), (id("PRD00002"), 3), (id("PRD00003"), 1)]
            .into_iter()
            .collect();
        let prices: HashMap<ProductId, Price> = [
            (id("PRD00001"), Price::from_cents(1000)),
            (id("PRD00002"), Price::from_cents(250)),
        ]
        .into_iter()
        .collect();

        // PRD00003 has no known price and contributes nothing.
        let total = cart.total(|p| prices.get(p).copied());
        assert_eq!(total, Price::from_cents(2750));
    }

    #[test]
    fn test_serde_object_form() {
        let cart: Cart = [(id("PRD00002"), 1), (id("PRD00001"), 2)]
            .into_iter()
            .collect();
        let json = serde_json::to_string(&cart).unwrap();
        assert_eq!(json, r#"{"PRD00001":2,"PRD00002":1}"#);
    }

    #[test]
    fn test_deserialize_drops_empty_lines() {
        let cart: Cart = serde_json::from_str(r#"{"PRD00001":0,"PRD00002":4}"#).unwrap();
        assert_eq!(cart.len(), 1);
        assert_eq!(cart.quantity(&id("PRD00002")), 4);
    }
}
