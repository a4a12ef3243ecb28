//! Catalog route handlers: home rails, product detail, categories.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use shopfront_core::{PageRequest, Paginated, ProductId};
use tracing::instrument;

use crate::error::AppError;
use crate::models::Product;
use crate::services::catalog::CatalogService;
use crate::state::AppState;

/// Query for `GET /api/products`.
#[derive(Debug, Deserialize)]
pub struct IdsQuery {
    /// Comma-separated product ids.
    #[serde(default)]
    pub ids: String,
}

impl IdsQuery {
    fn parse(&self) -> Vec<ProductId> {
        self.ids
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(ProductId::from)
            .collect()
    }
}

/// Query for category listings.
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

fn catalog(state: &AppState) -> CatalogService<'_> {
    CatalogService::new(state.supabase(), state.cache())
}

/// GET /api/products/flash-sale
///
/// # Errors
///
/// Returns an error if the backend call fails.
pub async fn flash_sale(State(state): State<AppState>) -> Result<Json<Vec<Product>>, AppError> {
    Ok(Json(catalog(&state).flash_sale().await?))
}

/// GET /api/products/just-for-you
///
/// # Errors
///
/// Returns an error if the backend call fails.
pub async fn just_for_you(State(state): State<AppState>) -> Result<Json<Vec<Product>>, AppError> {
    Ok(Json(catalog(&state).just_for_you().await?))
}

/// Several products by id (cart and wishlist views).
///
/// GET /api/products?ids=PRD00001,PRD00002
///
/// # Errors
///
/// Returns an error if the backend call fails.
#[instrument(skip(state))]
pub async fn multiple(
    State(state): State<AppState>,
    Query(query): Query<IdsQuery>,
) -> Result<Json<Vec<Product>>, AppError> {
    Ok(Json(catalog(&state).multiple(&query.parse()).await?))
}

/// Product detail. A missing product is `null`, not 404.
///
/// GET /api/products/{id}
///
/// # Errors
///
/// Returns an error if the backend call fails.
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<Option<Product>>, AppError> {
    Ok(Json(catalog(&state).product(&id).await?))
}

/// Products sharing a category with `id`.
///
/// GET /api/products/{id}/related
///
/// # Errors
///
/// 404 if the product does not exist.
pub async fn related(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<Vec<Product>>, AppError> {
    let catalog = catalog(&state);
    let product = catalog
        .product(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;
    Ok(Json(catalog.related(&product).await?))
}

/// One page of a category (`all` for every product), sorted by name.
///
/// GET /api/categories/{name}?page&page_size
///
/// # Errors
///
/// Returns an error if the backend call fails.
#[instrument(skip(state))]
pub async fn category(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Paginated<Product>>, AppError> {
    let page = PageRequest::new(query.page, query.page_size);
    Ok(Json(catalog(&state).category(&name, page).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_query_skips_blanks() {
        let query = IdsQuery {
            ids: "PRD00001, ,PRD00002,".into(),
        };
        assert_eq!(
            query.parse(),
            vec![ProductId::from("PRD00001"), ProductId::from("PRD00002")]
        );
    }
}
