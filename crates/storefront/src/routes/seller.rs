//! Seller dashboard route handlers.
//!
//! Product create and edit take multipart forms:
//!
//! | Field               | Kind            | Create   | Edit     |
//! |---------------------|-----------------|----------|----------|
//! | `product_name`      | text            | required | required |
//! | `product_price`     | text (decimal)  | required | required |
//! | `product_desc`      | text            | optional | optional |
//! | `product_category`  | text, repeated  | required | required |
//! | `featured_image`    | file            | required | optional |
//! | `other_images`      | file, repeated  | optional | optional |
//! | `keep_other_images` | text, repeated  |          | optional |

use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use shopfront_core::{CategoryList, Price, ProductId};
use tracing::instrument;

use crate::error::AppError;
use crate::middleware::{CurrentUser, RequireSeller};
use crate::models::{Product, ProductSummary, Profile};
use crate::routes::account::{read_profile, store_avatar, write_profile};
use crate::routes::uploads::UploadForm;
use crate::services::profile::{ProfileService, ProfileUpdate};
use crate::services::sellers::{ImageChanges, ProductForm, SellerService, SellerStats};
use crate::state::AppState;

/// Password change body.
#[derive(Debug, Deserialize)]
pub struct PasswordChange {
    pub password: String,
}

fn sellers<'a>(state: &'a AppState, user: &'a CurrentUser) -> SellerService<'a> {
    SellerService::new(&user.client, state.cache(), user.id())
}

/// Build the product fields from a multipart form.
fn product_form(form: &UploadForm) -> Result<ProductForm, AppError> {
    let product_name = form
        .text("product_name")
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing `product_name`".into()))?
        .to_owned();
    let price_text = form
        .text("product_price")
        .ok_or_else(|| AppError::BadRequest("Missing `product_price`".into()))?;
    let product_price = price_text
        .trim()
        .parse::<Decimal>()
        .ok()
        .and_then(|amount| Price::new(amount).ok())
        .ok_or_else(|| AppError::BadRequest(format!("Invalid price `{price_text}`")))?;

    Ok(ProductForm {
        product_name,
        product_price,
        product_desc: form.text("product_desc").unwrap_or_default().to_owned(),
        product_category: CategoryList::parse(&form.texts("product_category").join(",")),
    })
}

/// GET /api/seller/stats
///
/// # Errors
///
/// 401/403 unless signed in as a seller.
pub async fn stats(
    State(state): State<AppState>,
    RequireSeller(user): RequireSeller,
) -> Result<Json<SellerStats>, AppError> {
    Ok(Json(sellers(&state, &user).stats().await?))
}

/// GET /api/seller/products
///
/// # Errors
///
/// 401/403 unless signed in as a seller.
pub async fn products(
    State(state): State<AppState>,
    RequireSeller(user): RequireSeller,
) -> Result<Json<Vec<ProductSummary>>, AppError> {
    Ok(Json(sellers(&state, &user).products().await?))
}

/// One of the seller's products; `null` when missing or not theirs.
///
/// GET /api/seller/products/{id}
///
/// # Errors
///
/// 401/403 unless signed in as a seller.
pub async fn product(
    State(state): State<AppState>,
    RequireSeller(user): RequireSeller,
    Path(id): Path<ProductId>,
) -> Result<Json<Option<Product>>, AppError> {
    Ok(Json(sellers(&state, &user).product(&id).await?))
}

/// POST /api/seller/products (multipart)
///
/// # Errors
///
/// 400 for missing fields or images, 413 for oversized images, 409 when no
/// product id could be allocated.
#[instrument(skip_all)]
pub async fn create_product(
    State(state): State<AppState>,
    RequireSeller(user): RequireSeller,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Product>), AppError> {
    let mut form = UploadForm::read(multipart).await?;
    let fields = product_form(&form)?;
    let featured = form
        .take_file("featured_image")
        .ok_or_else(|| AppError::BadRequest("Missing `featured_image` file".into()))?;
    let others = form.take_files("other_images");

    let config = state.config();
    let product = sellers(&state, &user)
        .add_product(
            &fields,
            &featured,
            &others,
            config.id_strategy,
            config.max_upload_bytes,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// PUT /api/seller/products/{id} (multipart)
///
/// # Errors
///
/// 404 when the product is missing or not the seller's, 400/413 for bad
/// fields or images.
#[instrument(skip(state, user, multipart))]
pub async fn update_product(
    State(state): State<AppState>,
    RequireSeller(user): RequireSeller,
    Path(id): Path<ProductId>,
    multipart: Multipart,
) -> Result<Json<Product>, AppError> {
    let mut form = UploadForm::read(multipart).await?;
    let fields = product_form(&form)?;
    let images = ImageChanges {
        featured: form.take_file("featured_image"),
        keep_other_images: form
            .texts("keep_other_images")
            .iter()
            .filter(|url| !url.trim().is_empty())
            .cloned()
            .collect(),
        new_other_images: form.take_files("other_images"),
    };

    let product = sellers(&state, &user)
        .update_product(&id, &fields, &images, state.config().max_upload_bytes)
        .await?;
    Ok(Json(product))
}

/// DELETE /api/seller/products/{id}
///
/// # Errors
///
/// 404 when the product is missing or not the seller's.
#[instrument(skip(state, user))]
pub async fn delete_product(
    State(state): State<AppState>,
    RequireSeller(user): RequireSeller,
    Path(id): Path<ProductId>,
) -> Result<StatusCode, AppError> {
    sellers(&state, &user).delete_product(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/seller/profile
///
/// # Errors
///
/// 401/403 unless signed in as a seller.
pub async fn profile(
    State(state): State<AppState>,
    RequireSeller(user): RequireSeller,
) -> Result<Json<Profile>, AppError> {
    Ok(Json(read_profile(&state, &user).await?))
}

/// Update display name and phone.
///
/// PUT /api/seller/profile
///
/// # Errors
///
/// 400 for a blank display name.
#[instrument(skip_all)]
pub async fn update_profile(
    State(state): State<AppState>,
    RequireSeller(user): RequireSeller,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<Profile>, AppError> {
    Ok(Json(write_profile(&state, &user, &update).await?))
}

/// PUT /api/seller/password
///
/// # Errors
///
/// 400 for a password that is too short.
#[instrument(skip_all)]
pub async fn change_password(
    State(state): State<AppState>,
    RequireSeller(user): RequireSeller,
    Json(body): Json<PasswordChange>,
) -> Result<StatusCode, AppError> {
    ProfileService::new(&user.client, state.cache(), user.id())
        .change_password(&body.password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/seller/avatar (multipart, `avatar` file)
///
/// # Errors
///
/// 400 for a missing or non-image file, 413 for an oversized one.
#[instrument(skip_all)]
pub async fn upload_avatar(
    State(state): State<AppState>,
    RequireSeller(user): RequireSeller,
    multipart: Multipart,
) -> Result<Json<Profile>, AppError> {
    Ok(Json(store_avatar(&state, &user, multipart).await?))
}
