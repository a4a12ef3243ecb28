//! Integration tests for Shopfront.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p shopfront-integration-tests
//! ```
//!
//! No external services are needed: [`FakeSupabase`] stands in for the
//! managed backend and sessions live in memory. The session database pool
//! is lazy and never connected.
//!
//! # Test Categories
//!
//! - `services` - Data-access services against the backend double
//! - `storefront_api` - The JSON API over HTTP, with a cookie-carrying client
//! - `guards` - Role gates and browser navigation decisions

pub mod backend;
pub mod fixtures;

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::SecretString;
use serde_json::{Value, json};
use shopfront_storefront::build_router;
use shopfront_storefront::config::{LogFormat, StorefrontConfig};
use shopfront_storefront::middleware::session_layer;
use shopfront_storefront::services::ids::IdStrategy;
use shopfront_storefront::state::AppState;
use sqlx::postgres::PgPoolOptions;
use tower_sessions::MemoryStore;

pub use backend::FakeSupabase;

/// Upload limit used by test servers.
pub const MAX_UPLOAD_BYTES: usize = 64 * 1024;

static NEXT_CLIENT: AtomicU32 = AtomicU32::new(1);

/// A storefront served on an ephemeral port over a fresh backend double.
pub struct TestContext {
    pub backend: FakeSupabase,
    pub state: AppState,
    base_url: String,
    server: tokio::task::JoinHandle<()>,
}

impl Drop for TestContext {
    fn drop(&mut self) {
        self.server.abort();
    }
}

impl TestContext {
    /// Storefront with random order and product ids.
    pub async fn new() -> Self {
        Self::with_strategy(IdStrategy::Uuid).await
    }

    /// Storefront allocating ids with `strategy`.
    ///
    /// # Panics
    ///
    /// Panics if a local port cannot be bound.
    pub async fn with_strategy(strategy: IdStrategy) -> Self {
        let backend = FakeSupabase::start().await;
        let config = config(&backend, strategy);
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://shopfront@localhost/unused")
            .unwrap_or_else(|e| panic!("lazy pool: {e}"));
        let state = AppState::new(config, pool);

        let app = build_router(state.clone()).layer(session_layer(MemoryStore::default(), false));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap_or_else(|e| panic!("bind storefront: {e}"));
        let addr = listener
            .local_addr()
            .unwrap_or_else(|e| panic!("storefront address: {e}"));
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            backend,
            state,
            base_url: format!("http://{addr}"),
            server,
        }
    }

    /// Absolute URL of `path` on the storefront.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// A new browser: its own cookie jar and its own client address, so
    /// rate limits never leak between tests.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built.
    #[must_use]
    pub fn browser(&self) -> reqwest::Client {
        let n = NEXT_CLIENT.fetch_add(1, Ordering::Relaxed);
        let ip = format!("10.{}.{}.{}", (n >> 16) & 0xff, (n >> 8) & 0xff, n & 0xff);
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&ip) {
            headers.insert("x-forwarded-for", value);
        }
        reqwest::Client::builder()
            .cookie_store(true)
            .default_headers(headers)
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|e| panic!("HTTP client: {e}"))
    }

    /// Sign `browser` in and return the session body.
    ///
    /// # Panics
    ///
    /// Panics unless the sign-in succeeds.
    pub async fn sign_in(&self, browser: &reqwest::Client, email: &str, password: &str) -> Value {
        let response = browser
            .post(self.url("/api/auth/sign-in"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .unwrap_or_else(|e| panic!("sign-in request: {e}"));
        assert_eq!(response.status(), reqwest::StatusCode::OK, "sign-in failed");
        response
            .json()
            .await
            .unwrap_or_else(|e| panic!("sign-in body: {e}"))
    }
}

/// Storefront configuration pointing at `backend`.
#[must_use]
pub fn config(backend: &FakeSupabase, id_strategy: IdStrategy) -> StorefrontConfig {
    StorefrontConfig {
        database_url: SecretString::from("postgres://shopfront@localhost/unused".to_owned()),
        host: std::net::IpAddr::from([127, 0, 0, 1]),
        port: 0,
        base_url: "http://localhost".to_owned(),
        supabase: backend.config(),
        id_strategy,
        cache_ttl: Duration::from_secs(60),
        max_upload_bytes: MAX_UPLOAD_BYTES,
        log_format: LogFormat::Text,
        sentry_dsn: None,
        sentry_environment: None,
    }
}
