//! Admin dashboard route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use shopfront_core::{OrderId, OrderState, Paginated, ProductId};
use tracing::instrument;

use crate::error::AppError;
use crate::middleware::{CurrentUser, RequireAdmin};
use crate::models::{Order, OrderWithProducts, Product};
use crate::services::admin::{AdminService, AdminStats, ListParams};
use crate::state::AppState;

/// Order status body.
#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub order_state: OrderState,
}

fn admin<'a>(state: &'a AppState, user: &'a CurrentUser) -> AdminService<'a> {
    AdminService::new(&user.client, state.cache())
}

/// GET /api/admin/stats
///
/// # Errors
///
/// 401/403 unless signed in as an admin.
pub async fn stats(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
) -> Result<Json<AdminStats>, AppError> {
    Ok(Json(admin(&state, &user).stats().await?))
}

/// GET /api/admin/products?page&limit&search
///
/// # Errors
///
/// 401/403 unless signed in as an admin.
#[instrument(skip(state, user))]
pub async fn products(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    Query(params): Query<ListParams>,
) -> Result<Json<Paginated<Product>>, AppError> {
    Ok(Json(admin(&state, &user).products(&params).await?))
}

/// DELETE /api/admin/products/{id}
///
/// # Errors
///
/// 404 for an unknown product.
#[instrument(skip(state, user))]
pub async fn delete_product(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    Path(id): Path<ProductId>,
) -> Result<StatusCode, AppError> {
    admin(&state, &user).delete_product(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/admin/products/{id}/flash-sale
///
/// # Errors
///
/// 404 for an unknown product.
#[instrument(skip(state, user))]
pub async fn toggle_flash_sale(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>, AppError> {
    Ok(Json(admin(&state, &user).toggle_flash_sale(&id).await?))
}

/// GET /api/admin/orders?page&limit&search
///
/// # Errors
///
/// 401/403 unless signed in as an admin.
#[instrument(skip(state, user))]
pub async fn orders(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    Query(params): Query<ListParams>,
) -> Result<Json<Paginated<Order>>, AppError> {
    Ok(Json(admin(&state, &user).orders(&params).await?))
}

/// GET /api/admin/orders/{id}
///
/// # Errors
///
/// 404 for an unknown order.
#[instrument(skip(state, user))]
pub async fn order(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderWithProducts>, AppError> {
    Ok(Json(admin(&state, &user).order_detail(&id).await?))
}

/// PUT /api/admin/orders/{id}/status
///
/// # Errors
///
/// 404 for an unknown order.
#[instrument(skip(state, user))]
pub async fn update_order_status(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    Path(id): Path<OrderId>,
    Json(body): Json<StatusUpdate>,
) -> Result<Json<Order>, AppError> {
    let order = admin(&state, &user)
        .update_order_status(&id, body.order_state)
        .await?;
    Ok(Json(order))
}
