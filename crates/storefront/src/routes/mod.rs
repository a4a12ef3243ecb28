//! HTTP route handlers for the storefront JSON API.
//!
//! # Route Structure
//!
//! ```text
//! # Auth (sign-up and sign-in are rate limited per client IP)
//! POST /api/auth/sign-up
//! POST /api/auth/sign-in
//! POST /api/auth/sign-out
//! GET  /api/auth/session
//!
//! # Catalog
//! GET  /api/products?ids=PRD00001,PRD00002
//! GET  /api/products/flash-sale
//! GET  /api/products/just-for-you
//! GET  /api/products/{id}
//! GET  /api/products/{id}/related
//! GET  /api/categories/{name}?page&page_size
//! GET  /api/search?q&category&price_range&sort_by
//!
//! # Cart and checkout (anonymous visitors and buyers)
//! GET    /api/cart
//! DELETE /api/cart
//! GET    /api/cart/summary
//! POST   /api/cart/items
//! PUT    /api/cart/items/{id}
//! POST   /api/cart/merge
//! POST   /api/checkout
//!
//! # Account (signed in)
//! GET  /api/account/profile
//! PUT  /api/account/profile
//! POST /api/account/avatar
//! GET  /api/account/orders
//! GET  /api/orders/{id}/tracking
//!
//! # Seller
//! GET    /api/seller/stats
//! GET    /api/seller/products
//! POST   /api/seller/products
//! GET    /api/seller/products/{id}
//! PUT    /api/seller/products/{id}
//! DELETE /api/seller/products/{id}
//! GET    /api/seller/profile
//! PUT    /api/seller/profile
//! PUT    /api/seller/password
//! POST   /api/seller/avatar
//!
//! # Admin
//! GET    /api/admin/stats
//! GET    /api/admin/products?page&limit&search
//! DELETE /api/admin/products/{id}
//! PUT    /api/admin/products/{id}/flash-sale
//! GET    /api/admin/orders?page&limit&search
//! GET    /api/admin/orders/{id}
//! PUT    /api/admin/orders/{id}/status
//!
//! # Browser guards
//! GET  /api/navigation?path=/seller/products
//! ```

pub mod account;
pub mod admin;
pub mod auth;
pub mod cart;
pub mod navigation;
pub mod products;
pub mod search;
pub mod seller;
pub mod uploads;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post, put},
};

use crate::config::StorefrontConfig;
use crate::middleware::auth_rate_limiter;
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    let limited = Router::new()
        .route("/sign-up", post(auth::sign_up))
        .route("/sign-in", post(auth::sign_in))
        .layer(auth_rate_limiter());

    Router::new()
        .merge(limited)
        .route("/sign-out", post(auth::sign_out))
        .route("/session", get(auth::session_info))
}

/// Create the catalog routes router.
pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(products::multiple))
        .route("/products/flash-sale", get(products::flash_sale))
        .route("/products/just-for-you", get(products::just_for_you))
        .route("/products/{id}", get(products::show))
        .route("/products/{id}/related", get(products::related))
        .route("/categories/{name}", get(products::category))
        .route("/search", get(search::search))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).delete(cart::clear))
        .route("/summary", get(cart::summary))
        .route("/items", post(cart::add))
        .route("/items/{id}", put(cart::update))
        .route("/merge", post(cart::merge))
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/profile",
            get(account::profile).put(account::update_profile),
        )
        .route("/avatar", post(account::upload_avatar))
        .route("/orders", get(account::orders))
}

/// Create the seller routes router.
pub fn seller_routes() -> Router<AppState> {
    Router::new()
        .route("/stats", get(seller::stats))
        .route(
            "/products",
            get(seller::products).post(seller::create_product),
        )
        .route(
            "/products/{id}",
            get(seller::product)
                .put(seller::update_product)
                .delete(seller::delete_product),
        )
        .route(
            "/profile",
            get(seller::profile).put(seller::update_profile),
        )
        .route("/password", put(seller::change_password))
        .route("/avatar", post(seller::upload_avatar))
}

/// Create the admin routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/stats", get(admin::stats))
        .route("/products", get(admin::products))
        .route("/products/{id}", axum::routing::delete(admin::delete_product))
        .route("/products/{id}/flash-sale", put(admin::toggle_flash_sale))
        .route("/orders", get(admin::orders))
        .route("/orders/{id}", get(admin::order))
        .route("/orders/{id}/status", put(admin::update_order_status))
}

/// Create all API routes.
///
/// Account and seller routes accept image uploads, so their body limit
/// follows the configured upload size.
pub fn routes(config: &StorefrontConfig) -> Router<AppState> {
    let upload_limit = DefaultBodyLimit::max(uploads::body_limit(config.max_upload_bytes));

    let api = Router::new()
        .nest("/auth", auth_routes())
        .merge(catalog_routes())
        .nest("/cart", cart_routes())
        .route("/checkout", post(cart::checkout))
        .nest("/account", account_routes().layer(upload_limit.clone()))
        .route("/orders/{id}/tracking", get(account::tracking))
        .nest("/seller", seller_routes().layer(upload_limit))
        .nest("/admin", admin_routes())
        .route("/navigation", get(navigation::check));

    Router::new().nest("/api", api)
}
