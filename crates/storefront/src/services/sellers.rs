//! Seller dashboard: statistics and product management.
//!
//! Every query is scoped to the signed-in seller's `seller_id`, so a seller
//! can neither see nor touch another seller's products.

use serde::{Deserialize, Serialize};
use shopfront_core::{CategoryList, Price, ProductId, UserId};
use tracing::{info, instrument, warn};

use super::ServiceError;
use super::ids::{IdAllocator, IdStrategy};
use super::images::{ImageUpload, validate_all};
use crate::cache::{CacheTag, QueryCache};
use crate::models::{NewProduct, Product, ProductChanges, ProductImages, ProductSummary};
use crate::supabase::{Query, SupabaseClient};

/// Storage bucket for product images.
pub const PRODUCT_BUCKET: &str = "products";

/// Headline numbers on the seller dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellerStats {
    pub total_products: u64,
    /// Σ round(price × units sold, 2).
    pub total_sales: Price,
    /// Units sold across all products.
    pub total_orders: u64,
}

impl SellerStats {
    /// Aggregate `(price, units sold)` pairs.
    #[must_use]
    pub fn from_sales<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = (Price, u32)>,
    {
        rows.into_iter().fold(
            Self {
                total_products: 0,
                total_sales: Price::ZERO,
                total_orders: 0,
            },
            |acc, (price, sold)| Self {
                total_products: acc.total_products + 1,
                total_sales: acc.total_sales + price.times(sold).round_cents(),
                total_orders: acc.total_orders + u64::from(sold),
            },
        )
    }
}

/// Product fields entered by the seller.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductForm {
    pub product_name: String,
    pub product_price: Price,
    #[serde(default)]
    pub product_desc: String,
    #[serde(default)]
    pub product_category: CategoryList,
}

impl ProductForm {
    fn validate(&self) -> Result<(), ServiceError> {
        if self.product_name.trim().is_empty() {
            return Err(ServiceError::Invalid("product name is required".into()));
        }
        if self.product_category.is_empty() {
            return Err(ServiceError::Invalid(
                "at least one category is required".into(),
            ));
        }
        Ok(())
    }
}

/// Images sent with a product edit.
#[derive(Debug, Clone, Default)]
pub struct ImageChanges {
    /// Replacement featured image.
    pub featured: Option<ImageUpload>,
    /// Other image URLs to keep, in order.
    pub keep_other_images: Vec<String>,
    /// Other images to add after the kept ones.
    pub new_other_images: Vec<ImageUpload>,
}

/// Storage path of a product's featured image.
#[must_use]
pub fn featured_image_path(id: &ProductId) -> String {
    format!("{id}/featured_image")
}

/// Storage path of a product's `index`-th other image.
#[must_use]
pub fn other_image_path(id: &ProductId, index: usize) -> String {
    format!("{id}/other_image_{index}")
}

/// Index `n` of an `.../other_image_{n}` URL.
fn other_image_index(url: &str) -> Option<usize> {
    url.rsplit_once("/other_image_")?.1.parse().ok()
}

/// Seller operations for one signed-in seller.
pub struct SellerService<'a> {
    client: &'a SupabaseClient,
    cache: &'a QueryCache,
    seller: UserId,
}

impl<'a> SellerService<'a> {
    /// `client` must carry the seller's access token.
    #[must_use]
    pub const fn new(client: &'a SupabaseClient, cache: &'a QueryCache, seller: UserId) -> Self {
        Self {
            client,
            cache,
            seller,
        }
    }

    fn tags(&self) -> Vec<CacheTag> {
        vec![CacheTag::SellerProducts(self.seller)]
    }

    /// Product count, sales value and units sold.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails.
    #[instrument(skip(self), fields(seller_id = %self.seller))]
    pub async fn stats(&self) -> Result<SellerStats, ServiceError> {
        let query = Query::table("products")
            .select("product_price,total_sales")
            .eq("seller_id", self.seller);
        self.cache
            .get_or_fetch(format!("stats:{}", query.cache_key()), self.tags(), || async {
                let rows: Vec<SalesRow> = self.client.select(&query).await?;
                Ok::<_, ServiceError>(SellerStats::from_sales(
                    rows.into_iter()
                        .map(|r| (r.product_price, r.total_sales.unwrap_or(0))),
                ))
            })
            .await
    }

    /// The seller's products, as shown in the product table.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails.
    #[instrument(skip(self), fields(seller_id = %self.seller))]
    pub async fn products(&self) -> Result<Vec<ProductSummary>, ServiceError> {
        let query = Query::table("products")
            .select(ProductSummary::COLUMNS)
            .eq("seller_id", self.seller)
            .order("product_id", true);
        self.cache
            .get_or_fetch(query.cache_key(), self.tags(), || async {
                Ok::<_, ServiceError>(self.client.select(&query).await?)
            })
            .await
    }

    /// One of the seller's products, `None` when missing or not theirs.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails.
    #[instrument(skip(self), fields(seller_id = %self.seller))]
    pub async fn product(&self, id: &ProductId) -> Result<Option<Product>, ServiceError> {
        let query = Query::table("products")
            .select("*")
            .eq("product_id", id)
            .eq("seller_id", self.seller);
        Ok(self.client.select_single(&query).await?)
    }

    /// List a new product.
    ///
    /// Allocates the id and inserts the row with no sales and no flash sale,
    /// then uploads the images under the id the insert won. The row is
    /// removed again if an upload fails.
    ///
    /// # Errors
    ///
    /// Returns a validation error for bad fields or images, or an error if
    /// a backend call fails.
    #[instrument(skip_all, fields(seller_id = %self.seller))]
    pub async fn add_product(
        &self,
        form: &ProductForm,
        featured: &ImageUpload,
        other_images: &[ImageUpload],
        strategy: IdStrategy,
        max_bytes: usize,
    ) -> Result<Product, ServiceError> {
        form.validate()?;
        validate_all(std::iter::once(featured).chain(other_images), max_bytes)?;

        let inserted: Product = IdAllocator::new(self.client, strategy)
            .insert_with_id(|product_id: ProductId| async move {
                Ok(NewProduct {
                    product_id,
                    seller_id: self.seller,
                    product_name: form.product_name.trim().to_owned(),
                    product_price: form.product_price,
                    total_sales: 0,
                    flash_sale: false,
                    product_desc: form.product_desc.clone(),
                    product_category: form.product_category.clone(),
                })
            })
            .await?;
        let id = inserted.product_id;

        let product = match self.attach_images(&id, featured, other_images).await {
            Ok(product) => product,
            Err(e) => {
                if let Err(cleanup) = self.delete_product(&id).await {
                    warn!(
                        product_id = %id,
                        error = %cleanup,
                        "Could not remove product after failed upload"
                    );
                }
                return Err(e);
            }
        };

        self.invalidate(&id);
        info!(product_id = %id, "Product added");
        Ok(product)
    }

    async fn attach_images(
        &self,
        id: &ProductId,
        featured: &ImageUpload,
        other_images: &[ImageUpload],
    ) -> Result<Product, ServiceError> {
        let featured_image = self.upload(&featured_image_path(id), featured).await?;
        let mut other_urls = Vec::with_capacity(other_images.len());
        for (index, image) in other_images.iter().enumerate() {
            other_urls.push(self.upload(&other_image_path(id, index), image).await?);
        }
        let images = ProductImages {
            featured_image,
            other_images: other_urls,
        };
        let query = Query::table("products")
            .eq("product_id", id)
            .eq("seller_id", self.seller);
        self.client
            .update::<_, Product>(&query, &images)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::NotFound(format!("product {id}")))
    }

    /// Edit one of the seller's products.
    ///
    /// Only newly supplied images are uploaded (replacing objects at the
    /// same path); kept images retain their URLs.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the product is missing or not the
    /// seller's, a validation error for bad input, or a backend error.
    #[instrument(skip(self, form, images), fields(seller_id = %self.seller))]
    pub async fn update_product(
        &self,
        id: &ProductId,
        form: &ProductForm,
        images: &ImageChanges,
        max_bytes: usize,
    ) -> Result<Product, ServiceError> {
        form.validate()?;
        validate_all(
            images.featured.iter().chain(&images.new_other_images),
            max_bytes,
        )?;
        let existing = self
            .product(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("product {id}")))?;

        let featured_image = match &images.featured {
            Some(image) => Some(self.upload(&featured_image_path(id), image).await?),
            None => existing.featured_image,
        };
        let mut next_index = existing
            .other_images
            .iter()
            .chain(&images.keep_other_images)
            .filter_map(|url| other_image_index(url))
            .max()
            .map_or(0, |highest| highest + 1);
        let mut other_images = images.keep_other_images.clone();
        for image in &images.new_other_images {
            let path = other_image_path(id, next_index);
            other_images.push(self.upload(&path, image).await?);
            next_index += 1;
        }

        let changes = ProductChanges {
            product_name: form.product_name.trim().to_owned(),
            product_price: form.product_price,
            featured_image,
            other_images,
            product_desc: form.product_desc.clone(),
            product_category: form.product_category.clone(),
        };
        let query = Query::table("products")
            .eq("product_id", id)
            .eq("seller_id", self.seller);
        let product = self
            .client
            .update::<_, Product>(&query, &changes)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::NotFound(format!("product {id}")))?;

        self.invalidate(id);
        info!(product_id = %id, "Product updated");
        Ok(product)
    }

    /// Delete one of the seller's products.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if nothing was deleted, or a
    /// backend error.
    #[instrument(skip(self), fields(seller_id = %self.seller))]
    pub async fn delete_product(&self, id: &ProductId) -> Result<(), ServiceError> {
        let query = Query::table("products")
            .eq("product_id", id)
            .eq("seller_id", self.seller);
        if self.client.delete(&query).await? == 0 {
            return Err(ServiceError::NotFound(format!("product {id}")));
        }
        self.invalidate(id);
        info!(product_id = %id, "Product deleted");
        Ok(())
    }

    /// Upload to the product bucket, replacing any object at `path`.
    async fn upload(&self, path: &str, image: &ImageUpload) -> Result<String, ServiceError> {
        let url = self
            .client
            .upload(
                PRODUCT_BUCKET,
                path,
                image.bytes.clone(),
                &image.content_type,
                true,
            )
            .await?;
        Ok(url.into())
    }

    fn invalidate(&self, id: &ProductId) {
        self.cache.invalidate(&[
            CacheTag::SellerProducts(self.seller),
            CacheTag::Product(id.clone()),
            CacheTag::ProductList,
        ]);
    }
}

#[derive(Deserialize)]
struct SalesRow {
    product_price: Price,
    #[serde(default)]
    total_sales: Option<u32>,
}
