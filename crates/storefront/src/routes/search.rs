//! Search route handler.

use axum::{
    Json,
    extract::{Query, State},
};
use tracing::instrument;

use crate::error::AppError;
use crate::models::Product;
use crate::services::catalog::{CatalogService, SearchParams};
use crate::state::AppState;

/// Search products by name with optional category, price range and sort.
///
/// GET /api/search?q=lamp&category=home&price_range=10-50&sort_by=price-low-high
///
/// # Errors
///
/// 400 for a malformed price range.
#[instrument(skip(state))]
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<Product>>, AppError> {
    let products = CatalogService::new(state.supabase(), state.cache())
        .search(&params)
        .await?;
    Ok(Json(products))
}
