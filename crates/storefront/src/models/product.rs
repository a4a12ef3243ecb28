//! Product rows.

use serde::{Deserialize, Deserializer, Serialize};
use shopfront_core::{CategoryList, Price, ProductId, UserId};

/// A row of the `products` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub product_id: ProductId,
    #[serde(default)]
    pub seller_id: Option<UserId>,
    pub product_name: String,
    pub product_price: Price,
    #[serde(default)]
    pub featured_image: Option<String>,
    #[serde(default, deserialize_with = "image_list")]
    pub other_images: Vec<String>,
    #[serde(default)]
    pub product_desc: Option<String>,
    #[serde(default)]
    pub product_category: CategoryList,
    #[serde(default, deserialize_with = "null_as_default")]
    pub flash_sale: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_sales: u32,
}

/// Columns shown in the seller's product table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub product_id: ProductId,
    pub product_name: String,
    pub product_price: Price,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_sales: u32,
}

impl ProductSummary {
    /// Columns to select for this shape.
    pub const COLUMNS: &'static str = "product_id,product_name,product_price,total_sales";
}

/// Insert payload for a new product.
#[derive(Debug, Clone, Serialize)]
pub struct NewProduct {
    pub product_id: ProductId,
    pub seller_id: UserId,
    pub product_name: String,
    pub product_price: Price,
    pub total_sales: u32,
    pub flash_sale: bool,
    pub product_desc: String,
    pub product_category: CategoryList,
}

/// Image URLs of a product, written once its uploads have finished.
#[derive(Debug, Clone, Serialize)]
pub struct ProductImages {
    pub featured_image: String,
    pub other_images: Vec<String>,
}

/// Update payload for an edited product.
#[derive(Debug, Clone, Serialize)]
pub struct ProductChanges {
    pub product_name: String,
    pub product_price: Price,
    pub featured_image: Option<String>,
    pub other_images: Vec<String>,
    pub product_desc: String,
    pub product_category: CategoryList,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// `other_images` is a text array on newer rows and JSON text on older ones.
fn image_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        List(Vec<String>),
        Text(String),
        Missing(()),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::List(list) => list,
        Raw::Text(text) if text.trim_start().starts_with('[') => {
            serde_json::from_str(&text).map_err(serde::de::Error::custom)?
        }
        Raw::Text(text) if text.trim().is_empty() => Vec::new(),
        Raw::Text(text) => vec![text],
        Raw::Missing(()) => Vec::new(),
    })
}
