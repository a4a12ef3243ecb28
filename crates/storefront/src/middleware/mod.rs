//! HTTP middleware stack for the storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request spans)
//! 3. Request ID (add unique ID to each request)
//! 4. Session layer (tower-sessions, `PostgreSQL` store)
//! 5. Rate limiting on `/api/auth` (governor)
//!
//! Role checks are extractors in [`auth`], not layers.

pub mod auth;
pub mod rate_limit;
pub mod request_id;
pub mod session;

pub use auth::{
    BuyerAccess, CurrentUser, OptionalAuth, RequireAdmin, RequireAuth, RequireSeller,
    clear_session, local_cart, sign_in_session, store_local_cart,
};
pub use rate_limit::auth_rate_limiter;
pub use request_id::request_id_middleware;
pub use session::{create_session_layer, session_layer};
