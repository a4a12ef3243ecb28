//! Cart and checkout route handlers.
//!
//! Anonymous visitors keep a local cart in their session. Signed-in buyers
//! use the cart stored on their user record. The first cart request after a
//! sign-in folds the local cart into the server cart; when that write fails
//! the local cart and the pending flag stay so the next request retries.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use shopfront_core::{Cart, ProductId};
use tower_sessions::Session;
use tracing::{error, info, instrument, warn};

use crate::error::AppError;
use crate::middleware::{BuyerAccess, CurrentUser, local_cart, store_local_cart};
use crate::models::{Order, session_keys};
use crate::services::ServiceError;
use crate::services::cart::{CartService, CartSummary};
use crate::services::catalog::CatalogService;
use crate::services::orders::{Checkout, OrderService};
use crate::state::AppState;

/// Cart contents with the badge count.
#[derive(Debug, Serialize)]
pub struct CartResponse {
    pub items: Cart,
    pub total_quantity: u64,
}

impl From<Cart> for CartResponse {
    fn from(items: Cart) -> Self {
        Self {
            total_quantity: items.total_quantity(),
            items,
        }
    }
}

/// Add-to-cart body.
#[derive(Debug, Deserialize)]
pub struct AddItem {
    pub product_id: ProductId,
    #[serde(default = "one")]
    pub quantity: u32,
}

const fn one() -> u32 {
    1
}

/// Quantity update body.
#[derive(Debug, Deserialize)]
pub struct UpdateItem {
    pub quantity: u32,
}

/// Result of an explicit merge.
#[derive(Debug, Serialize)]
pub struct MergeResponse {
    /// A local cart was folded in by this request.
    pub merged: bool,
    pub cart: CartResponse,
}

enum MergeOutcome {
    NotPending,
    Merged(Cart),
}

/// Fold the local cart into the server cart if a sign-in left one pending.
async fn merge_local_cart(
    carts: &CartService<'_>,
    user: &CurrentUser,
) -> Result<MergeOutcome, AppError> {
    if !user.auth.is_first_login {
        return Ok(MergeOutcome::NotPending);
    }
    let local = local_cart(&user.session).await?;
    let outcome = if local.is_empty() {
        MergeOutcome::NotPending
    } else {
        MergeOutcome::Merged(carts.merge(&local).await?)
    };

    store_local_cart(&user.session, &Cart::new()).await?;
    let mut auth = user.auth.clone();
    auth.is_first_login = false;
    user.session.insert(session_keys::AUTH, &auth).await?;
    Ok(outcome)
}

/// Merge before a cart operation; a failed backend write leaves the merge
/// pending instead of failing the request.
async fn merge_if_pending(
    carts: &CartService<'_>,
    user: &CurrentUser,
) -> Result<Option<Cart>, AppError> {
    match merge_local_cart(carts, user).await {
        Ok(MergeOutcome::Merged(cart)) => Ok(Some(cart)),
        Ok(MergeOutcome::NotPending) => Ok(None),
        Err(AppError::Service(e)) => {
            warn!(user_id = %user.id(), error = %e, "Cart merge failed, will retry");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

async fn server_cart(state: &AppState, user: &CurrentUser) -> Result<Cart, AppError> {
    let carts = CartService::new(&user.client, state.cache(), user.id());
    if let Some(cart) = merge_if_pending(&carts, user).await? {
        return Ok(cart);
    }
    Ok(carts.get().await?)
}

async fn current_cart(
    state: &AppState,
    user: Option<&CurrentUser>,
    session: &Session,
) -> Result<Cart, AppError> {
    match user {
        Some(user) => server_cart(state, user).await,
        None => Ok(local_cart(session).await?),
    }
}

/// GET /api/cart
///
/// # Errors
///
/// 403 for sellers and admins, or an error if the cart cannot be loaded.
#[instrument(skip_all)]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    BuyerAccess(user): BuyerAccess,
) -> Result<Json<CartResponse>, AppError> {
    let cart = current_cart(&state, user.as_ref(), &session).await?;
    Ok(Json(cart.into()))
}

/// GET /api/cart/summary
///
/// # Errors
///
/// 403 for sellers and admins, or an error if a backend call fails.
#[instrument(skip_all)]
pub async fn summary(
    State(state): State<AppState>,
    session: Session,
    BuyerAccess(user): BuyerAccess,
) -> Result<Json<CartSummary>, AppError> {
    let cart = current_cart(&state, user.as_ref(), &session).await?;
    let ids: Vec<ProductId> = cart.product_ids().cloned().collect();
    let products = CatalogService::new(state.supabase(), state.cache())
        .multiple(&ids)
        .await?;
    Ok(Json(CartSummary::new(&cart, products)))
}

/// POST /api/cart/items
///
/// # Errors
///
/// 400 for a zero or overflowing quantity, 403 for sellers and admins.
#[instrument(skip(state, session, user))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    BuyerAccess(user): BuyerAccess,
    Json(item): Json<AddItem>,
) -> Result<Json<CartResponse>, AppError> {
    let cart = match user {
        Some(user) => {
            let carts = CartService::new(&user.client, state.cache(), user.id());
            merge_if_pending(&carts, &user).await?;
            carts.add(item.product_id, item.quantity).await?
        }
        None => {
            let mut cart = local_cart(&session).await?;
            cart.add(item.product_id, item.quantity)
                .map_err(ServiceError::from)?;
            store_local_cart(&session, &cart).await?;
            cart
        }
    };
    Ok(Json(cart.into()))
}

/// Set a line's quantity; zero removes it.
///
/// PUT /api/cart/items/{id}
///
/// # Errors
///
/// 403 for sellers and admins, or an error if the cart cannot be saved.
#[instrument(skip(state, session, user))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    BuyerAccess(user): BuyerAccess,
    Path(product_id): Path<ProductId>,
    Json(item): Json<UpdateItem>,
) -> Result<Json<CartResponse>, AppError> {
    let cart = match user {
        Some(user) => {
            let carts = CartService::new(&user.client, state.cache(), user.id());
            merge_if_pending(&carts, &user).await?;
            carts.set_quantity(product_id, item.quantity).await?
        }
        None => {
            let mut cart = local_cart(&session).await?;
            cart.set_quantity(product_id, item.quantity)
                .map_err(ServiceError::from)?;
            store_local_cart(&session, &cart).await?;
            cart
        }
    };
    Ok(Json(cart.into()))
}

/// DELETE /api/cart
///
/// # Errors
///
/// 403 for sellers and admins, or an error if the cart cannot be saved.
#[instrument(skip_all)]
pub async fn clear(
    State(state): State<AppState>,
    session: Session,
    BuyerAccess(user): BuyerAccess,
) -> Result<StatusCode, AppError> {
    match user {
        Some(user) => {
            CartService::new(&user.client, state.cache(), user.id())
                .clear()
                .await?;
        }
        None => store_local_cart(&session, &Cart::new()).await?,
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Merge the local cart now. A no-op when nothing is pending.
///
/// POST /api/cart/merge
///
/// # Errors
///
/// 401 when signed out; a failed backend write is returned and the merge
/// stays pending.
#[instrument(skip_all)]
pub async fn merge(
    State(state): State<AppState>,
    BuyerAccess(user): BuyerAccess,
) -> Result<Json<MergeResponse>, AppError> {
    let user = user.ok_or_else(|| AppError::Unauthorized("Sign in to merge the cart".into()))?;
    let carts = CartService::new(&user.client, state.cache(), user.id());
    let response = match merge_local_cart(&carts, &user).await? {
        MergeOutcome::Merged(cart) => MergeResponse {
            merged: true,
            cart: cart.into(),
        },
        MergeOutcome::NotPending => MergeResponse {
            merged: false,
            cart: carts.get().await?.into(),
        },
    };
    Ok(Json(response))
}

/// Place an order for the signed-in buyer's cart, then empty the cart.
///
/// POST /api/checkout
///
/// # Errors
///
/// 401 when signed out, 400 for an empty cart or incomplete address.
#[instrument(skip_all)]
pub async fn checkout(
    State(state): State<AppState>,
    BuyerAccess(user): BuyerAccess,
    Json(checkout): Json<Checkout>,
) -> Result<(StatusCode, Json<Order>), AppError> {
    let user = user.ok_or_else(|| AppError::Unauthorized("Sign in to check out".into()))?;
    let cart = server_cart(&state, &user).await?;

    let order = OrderService::new(&user.client, state.cache())
        .place_order(user.id(), &cart, &checkout, state.config().id_strategy)
        .await?;

    // The order stands even if emptying the cart fails.
    if let Err(e) = CartService::new(&user.client, state.cache(), user.id())
        .clear()
        .await
    {
        error!(order_id = %order.order_id, error = %e, "Failed to clear cart after checkout");
    }
    info!(order_id = %order.order_id, "Checkout complete");
    Ok((StatusCode::CREATED, Json(order)))
}
