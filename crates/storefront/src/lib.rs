//! Shopfront storefront library.
//!
//! A JSON backend-for-frontend over a Supabase project: catalog, cart and
//! checkout for buyers, product management for sellers, and statistics and
//! moderation for admins. The binary in `main.rs` wires it to a session
//! store and a listener; tests drive [`build_router`] directly.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod navigation;
pub mod routes;
pub mod services;
pub mod state;
pub mod supabase;

use axum::{Router, extract::State, http::StatusCode, middleware::from_fn, routing::get};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the application router: health checks, the JSON API, request ids
/// and request tracing.
///
/// The session layer is added by the caller, so tests can use an in-memory
/// store.
pub fn build_router(state: AppState) -> Router {
    let api = routes::routes(state.config());

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(api)
        .layer(from_fn(middleware::request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Verifies the session database is reachable; 503 otherwise.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
