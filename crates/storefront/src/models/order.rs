//! Order rows.
//!
//! `products_id` and `shipping_address` are text columns holding JSON. They
//! are read in either form (text or native JSON) and written back as text.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use shopfront_core::{OrderId, OrderState, PaymentMethod, Price, ProductId, UserId};

use super::Product;

/// Ordered list of product ids in an order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ProductIdList(pub Vec<ProductId>);

impl ProductIdList {
    /// Ids in order.
    #[must_use]
    pub fn ids(&self) -> &[ProductId] {
        &self.0
    }
}

impl<'de> Deserialize<'de> for ProductIdList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        json_text_or_value(deserializer).map(|ids: Option<Vec<ProductId>>| Self(ids.unwrap_or_default()))
    }
}

/// Where an order ships to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub full_name: String,
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

impl ShippingAddress {
    /// Names of required fields that are blank.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("fullName", &self.full_name),
            ("address", &self.address),
            ("city", &self.city),
            ("postalCode", &self.postal_code),
            ("country", &self.country),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }
}

/// A row of the `orders` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub products_id: ProductIdList,
    pub buyer_id: UserId,
    pub order_state: OrderState,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub total_count: Price,
    #[serde(default, deserialize_with = "json_text_or_value")]
    pub shipping_address: Option<ShippingAddress>,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
}

/// Insert payload for a new order.
#[derive(Debug, Clone, Serialize)]
pub struct NewOrder {
    pub order_id: OrderId,
    pub created_at: DateTime<Utc>,
    #[serde(serialize_with = "as_json_text")]
    pub products_id: ProductIdList,
    pub buyer_id: UserId,
    pub order_state: OrderState,
    pub total_count: Price,
    #[serde(serialize_with = "as_json_text")]
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
}

/// An order with the rows of its products.
#[derive(Debug, Clone, Serialize)]
pub struct OrderWithProducts {
    #[serde(flatten)]
    pub order: Order,
    pub products: Vec<Product>,
}

fn as_json_text<S: Serializer, T: Serialize>(value: &T, serializer: S) -> Result<S::Ok, S::Error> {
    let text = serde_json::to_string(value).map_err(serde::ser::Error::custom)?;
    serializer.serialize_str(&text)
}

fn null_as_zero<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Price, D::Error> {
    Ok(Option::<Price>::deserialize(deserializer)?.unwrap_or_default())
}

/// Read a value stored either as JSON text or as native JSON.
fn json_text_or_value<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    match raw {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(text)) if text.trim().is_empty() => Ok(None),
        Some(serde_json::Value::String(text)) => {
            serde_json::from_str(&text).map(Some).map_err(serde::de::Error::custom)
        }
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}
