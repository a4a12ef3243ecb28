//! Row builders for seeding the backend double.
//!
//! Rows are written the way the production tables hold them: categories as
//! bracketed text, order product lists and addresses as JSON text.

use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use uuid::Uuid;

/// Password given to every fixture account.
pub const PASSWORD: &str = "correct-horse";

/// A product row.
#[derive(Debug, Clone)]
pub struct ProductRow {
    pub id: String,
    pub seller: Option<Uuid>,
    pub name: String,
    pub price: String,
    pub categories: Vec<String>,
    pub flash_sale: bool,
    pub total_sales: u32,
    pub other_images: usize,
}

impl ProductRow {
    /// A product with one category, no sales and no seller.
    #[must_use]
    pub fn new(id: &str, name: &str, price: &str, category: &str) -> Self {
        Self {
            id: id.to_owned(),
            seller: None,
            name: name.to_owned(),
            price: price.to_owned(),
            categories: vec![category.to_owned()],
            flash_sale: false,
            total_sales: 0,
            other_images: 0,
        }
    }

    #[must_use]
    pub const fn seller(mut self, seller: Uuid) -> Self {
        self.seller = Some(seller);
        self
    }

    #[must_use]
    pub fn categories(mut self, categories: &[&str]) -> Self {
        self.categories = categories.iter().map(|c| (*c).to_owned()).collect();
        self
    }

    #[must_use]
    pub const fn flash_sale(mut self) -> Self {
        self.flash_sale = true;
        self
    }

    #[must_use]
    pub const fn sold(mut self, units: u32) -> Self {
        self.total_sales = units;
        self
    }

    /// Give the product `count` other images, `other_image_0` onwards.
    #[must_use]
    pub const fn other_images(mut self, count: usize) -> Self {
        self.other_images = count;
        self
    }

    /// The stored row.
    #[must_use]
    pub fn build(&self) -> Value {
        let categories = self
            .categories
            .iter()
            .map(|c| format!("'{c}'"))
            .collect::<Vec<_>>()
            .join(", ");
        json!({
            "product_id": self.id,
            "seller_id": self.seller,
            "product_name": self.name,
            "product_price": self.price,
            "featured_image": format!("https://cdn.example.com/{}/featured_image", self.id),
            "other_images": (0..self.other_images)
                .map(|i| format!("https://cdn.example.com/{}/other_image_{i}", self.id))
                .collect::<Vec<_>>(),
            "product_desc": format!("About {}", self.name),
            "product_category": format!("[{categories}]"),
            "flash_sale": self.flash_sale,
            "total_sales": self.total_sales,
        })
    }
}

/// An order row in state `pending`.
#[must_use]
pub fn order(id: &str, buyer: Uuid, created_at: DateTime<Utc>, total: &str, products: &[&str]) -> Value {
    json!({
        "order_id": id,
        "created_at": created_at,
        "products_id": serde_json::to_string(products).unwrap_or_default(),
        "buyer_id": buyer,
        "order_state": "pending",
        "total_count": total,
        "shipping_address": json!({
            "fullName": "Ada Lovelace",
            "address": "12 Analytical Row",
            "city": "London",
            "postalCode": "N1 9GU",
            "country": "UK",
        })
        .to_string(),
        "payment_method": "credit_card",
    })
}

/// A complete checkout body.
#[must_use]
pub fn checkout() -> Value {
    json!({
        "shipping_address": {
            "fullName": "Ada Lovelace",
            "address": "12 Analytical Row",
            "city": "London",
            "postalCode": "N1 9GU",
            "country": "UK",
        },
        "payment_method": "paypal",
    })
}
