//! The storefront JSON API over HTTP.
//!
//! Each test starts its own storefront and backend double; browsers carry
//! session cookies like a real one would.
//!
//! Run with: cargo test -p shopfront-integration-tests --test storefront_api

#![allow(clippy::unwrap_used)]

use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use serde_json::{Value, json};
use shopfront_core::Role;
use shopfront_integration_tests::fixtures::{self, PASSWORD, ProductRow};
use shopfront_integration_tests::{MAX_UPLOAD_BYTES, TestContext};
use shopfront_storefront::services::ids::IdStrategy;

async fn get_json(browser: &reqwest::Client, url: String) -> (StatusCode, Value) {
    let response = browser.get(url).send().await.unwrap();
    let status = response.status();
    (status, response.json().await.unwrap_or(Value::Null))
}

fn seed_catalog(ctx: &TestContext) {
    ctx.backend.seed(
        "products",
        [
            ProductRow::new("PRD00001", "Desk Lamp", "12.50", "Home").build(),
            ProductRow::new("PRD00002", "Notebook", "5.00", "Office").build(),
        ],
    );
}

// ============================================================================
// Auth
// ============================================================================

#[tokio::test]
async fn test_sign_up_signs_in() {
    let ctx = TestContext::new().await;
    let browser = ctx.browser();

    let response = browser
        .post(ctx.url("/api/auth/sign-up"))
        .json(&json!({
            "email": "new@example.com",
            "password": PASSWORD,
            "display_name": "Newcomer",
            "role": "seller",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["user"]["role"], "seller");
    assert_eq!(body["user"]["display_name"], "Newcomer");

    let (status, session) = get_json(&browser, ctx.url("/api/auth/session")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["user"]["email"], "new@example.com");
    assert_eq!(ctx.backend.rows("users").len(), 1);
}

#[tokio::test]
async fn test_sign_up_rejections() {
    let ctx = TestContext::new().await;
    ctx.backend
        .create_user("taken@example.com", PASSWORD, "Taken", Role::Buyer);

    let cases = [
        (json!({ "email": "taken@example.com", "password": PASSWORD, "display_name": "Again" }), StatusCode::CONFLICT),
        (json!({ "email": "boss@example.com", "password": PASSWORD, "display_name": "Boss", "role": "admin" }), StatusCode::FORBIDDEN),
        (json!({ "email": "short@example.com", "password": "abc", "display_name": "Short" }), StatusCode::BAD_REQUEST),
        (json!({ "email": "not-an-email", "password": PASSWORD, "display_name": "Nobody" }), StatusCode::BAD_REQUEST),
    ];
    for (body, expected) in cases {
        let response = ctx
            .browser()
            .post(ctx.url("/api/auth/sign-up"))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), expected, "{body}");
    }
    assert_eq!(ctx.backend.rows("users").len(), 1);
}

#[tokio::test]
async fn test_wrong_password_is_unauthorized() {
    let ctx = TestContext::new().await;
    ctx.backend
        .create_user("buyer@example.com", PASSWORD, "Buyer", Role::Buyer);

    let response = ctx
        .browser()
        .post(ctx.url("/api/auth/sign-in"))
        .json(&json!({ "email": "buyer@example.com", "password": "wrong-password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_sign_in_is_rate_limited() {
    let ctx = TestContext::new().await;
    let browser = ctx.browser();

    let mut statuses = Vec::new();
    for _ in 0..8 {
        let response = browser
            .post(ctx.url("/api/auth/sign-in"))
            .json(&json!({ "email": "nobody@example.com", "password": "whatever" }))
            .send()
            .await
            .unwrap();
        statuses.push(response.status());
    }
    assert!(statuses.contains(&StatusCode::TOO_MANY_REQUESTS), "{statuses:?}");

    // Other clients are unaffected.
    let response = ctx
        .browser()
        .post(ctx.url("/api/auth/sign-in"))
        .json(&json!({ "email": "nobody@example.com", "password": "whatever" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_sign_out_clears_session() {
    let ctx = TestContext::new().await;
    ctx.backend
        .create_user("buyer@example.com", PASSWORD, "Buyer", Role::Buyer);
    let browser = ctx.browser();
    ctx.sign_in(&browser, "buyer@example.com", PASSWORD).await;

    let response = browser
        .post(ctx.url("/api/auth/sign-out"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let (_, session) = get_json(&browser, ctx.url("/api/auth/session")).await;
    assert_eq!(session["user"], Value::Null);
    let (status, _) = get_json(&browser, ctx.url("/api/account/profile")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_expiring_token_is_refreshed() {
    let ctx = TestContext::new().await;
    ctx.backend.set_token_lifetime(10);
    ctx.backend
        .create_user("buyer@example.com", PASSWORD, "Buyer", Role::Buyer);
    let browser = ctx.browser();
    ctx.sign_in(&browser, "buyer@example.com", PASSWORD).await;

    for _ in 0..2 {
        let (status, profile) = get_json(&browser, ctx.url("/api/account/profile")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(profile["display_name"], "Buyer");
    }
}

#[tokio::test]
async fn test_rejected_refresh_signs_out() {
    let ctx = TestContext::new().await;
    ctx.backend.set_token_lifetime(10);
    ctx.backend
        .create_user("buyer@example.com", PASSWORD, "Buyer", Role::Buyer);
    let browser = ctx.browser();
    ctx.sign_in(&browser, "buyer@example.com", PASSWORD).await;

    ctx.backend.revoke_refresh_tokens();

    let (status, _) = get_json(&browser, ctx.url("/api/account/profile")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (_, session) = get_json(&browser, ctx.url("/api/auth/session")).await;
    assert_eq!(session["user"], Value::Null);
}

// ============================================================================
// Catalog
// ============================================================================

#[tokio::test]
async fn test_catalog_reads() {
    let ctx = TestContext::new().await;
    ctx.backend.seed(
        "products",
        [
            ProductRow::new("PRD00001", "Desk Lamp", "12.50", "Home").flash_sale().build(),
            ProductRow::new("PRD00002", "Floor Lamp", "40.00", "Home").build(),
            ProductRow::new("PRD00003", "Notebook", "5.00", "Office").build(),
        ],
    );
    let browser = ctx.browser();

    let (status, product) = get_json(&browser, ctx.url("/api/products/PRD00001")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(product["product_name"], "Desk Lamp");
    assert_eq!(product["product_category"], "['Home']");

    let (status, missing) = get_json(&browser, ctx.url("/api/products/PRD09999")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(missing, Value::Null);

    let (status, _) = get_json(&browser, ctx.url("/api/products/PRD09999/related")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, related) = get_json(&browser, ctx.url("/api/products/PRD00001/related")).await;
    assert_eq!(related.as_array().unwrap().len(), 1);
    assert_eq!(related[0]["product_id"], "PRD00002");

    let (_, flash) = get_json(&browser, ctx.url("/api/products/flash-sale")).await;
    assert_eq!(flash.as_array().unwrap().len(), 1);

    let (_, page) = get_json(&browser, ctx.url("/api/categories/home?page=1&page_size=1")).await;
    assert_eq!(page["total_count"], 2);
    assert_eq!(page["total_pages"], 2);
    assert_eq!(page["items"][0]["product_name"], "Desk Lamp");

    let (_, found) = get_json(
        &browser,
        ctx.url("/api/search?q=lamp&sort_by=price-high-low"),
    )
    .await;
    let names: Vec<&str> = found
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|p| p["product_name"].as_str())
        .collect();
    assert_eq!(names, ["Floor Lamp", "Desk Lamp"]);

    let (status, _) = get_json(&browser, ctx.url("/api/search?price_range=abc")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, picked) = get_json(&browser, ctx.url("/api/products?ids=PRD00003,PRD00001")).await;
    assert_eq!(picked.as_array().unwrap().len(), 2);
}

// ============================================================================
// Cart and checkout
// ============================================================================

#[tokio::test]
async fn test_local_cart_merges_after_sign_in() {
    let ctx = TestContext::new().await;
    seed_catalog(&ctx);
    let buyer = ctx
        .backend
        .create_user("buyer@example.com", PASSWORD, "Buyer", Role::Buyer);
    ctx.backend
        .set_user_metadata(buyer, "cart", json!({ "PRD00001": 1 }));
    let browser = ctx.browser();

    for (id, quantity) in [("PRD00001", 2), ("PRD00002", 1)] {
        let response = browser
            .post(ctx.url("/api/cart/items"))
            .json(&json!({ "product_id": id, "quantity": quantity }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
    let (_, local) = get_json(&browser, ctx.url("/api/cart")).await;
    assert_eq!(local["total_quantity"], 3);

    let session = ctx.sign_in(&browser, "buyer@example.com", PASSWORD).await;
    assert_eq!(session["merge_pending"], true);

    let (status, cart) = get_json(&browser, ctx.url("/api/cart")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["items"], json!({ "PRD00001": 3, "PRD00002": 1 }));
    assert_eq!(cart["total_quantity"], 4);
    assert_eq!(
        ctx.backend.user_metadata(buyer)["cart"],
        json!({ "PRD00001": 3, "PRD00002": 1 })
    );

    let (_, session) = get_json(&browser, ctx.url("/api/auth/session")).await;
    assert_eq!(session["merge_pending"], false);

    // Already merged: a second request does not add the local cart again.
    let (_, cart) = get_json(&browser, ctx.url("/api/cart")).await;
    assert_eq!(cart["total_quantity"], 4);
}

#[tokio::test]
async fn test_failed_merge_stays_pending() {
    let ctx = TestContext::new().await;
    seed_catalog(&ctx);
    let buyer = ctx
        .backend
        .create_user("buyer@example.com", PASSWORD, "Buyer", Role::Buyer);
    let browser = ctx.browser();
    browser
        .post(ctx.url("/api/cart/items"))
        .json(&json!({ "product_id": "PRD00002" }))
        .send()
        .await
        .unwrap();
    ctx.sign_in(&browser, "buyer@example.com", PASSWORD).await;

    ctx.backend.fail_user_updates(true);
    let (status, cart) = get_json(&browser, ctx.url("/api/cart")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["total_quantity"], 0);
    let (_, session) = get_json(&browser, ctx.url("/api/auth/session")).await;
    assert_eq!(session["merge_pending"], true);

    ctx.backend.fail_user_updates(false);
    let response = browser
        .post(ctx.url("/api/cart/merge"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let merged: Value = response.json().await.unwrap();
    assert_eq!(merged["merged"], true);
    assert_eq!(merged["cart"]["items"], json!({ "PRD00002": 1 }));
    assert_eq!(ctx.backend.user_metadata(buyer)["cart"], json!({ "PRD00002": 1 }));

    let again: Value = browser
        .post(ctx.url("/api/cart/merge"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(again["merged"], false);
    assert_eq!(again["cart"]["total_quantity"], 1);
}

#[tokio::test]
async fn test_cart_quantity_rules() {
    let ctx = TestContext::new().await;
    seed_catalog(&ctx);
    let browser = ctx.browser();

    let response = browser
        .post(ctx.url("/api/cart/items"))
        .json(&json!({ "product_id": "PRD00001", "quantity": 0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    browser
        .post(ctx.url("/api/cart/items"))
        .json(&json!({ "product_id": "PRD00001", "quantity": 2 }))
        .send()
        .await
        .unwrap();
    let (_, summary) = get_json(&browser, ctx.url("/api/cart/summary")).await;
    assert_eq!(summary["total_quantity"], 2);
    assert_eq!(summary["total"], "25.00");

    let cart: Value = browser
        .put(ctx.url("/api/cart/items/PRD00001"))
        .json(&json!({ "quantity": 0 }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(cart["items"], json!({}));
    assert_eq!(cart["total_quantity"], 0);
}

#[tokio::test]
async fn test_checkout_places_order_and_clears_cart() {
    let ctx = TestContext::with_strategy(IdStrategy::Sequential).await;
    seed_catalog(&ctx);
    let buyer = ctx
        .backend
        .create_user("buyer@example.com", PASSWORD, "Buyer", Role::Buyer);
    ctx.backend.set_user_metadata(
        buyer,
        "cart",
        json!({ "PRD00001": 2, "PRD00002": 1 }),
    );
    let browser = ctx.browser();
    ctx.sign_in(&browser, "buyer@example.com", PASSWORD).await;

    let response = browser
        .post(ctx.url("/api/checkout"))
        .json(&fixtures::checkout())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let order: Value = response.json().await.unwrap();
    assert_eq!(order["order_id"], "ORD00001");
    assert_eq!(order["order_state"], "pending");
    assert_eq!(order["payment_method"], "paypal");
    let total: f64 = order["total_count"].as_str().unwrap().parse().unwrap();
    assert!((total - 30.0).abs() < f64::EPSILON);

    let (_, cart) = get_json(&browser, ctx.url("/api/cart")).await;
    assert_eq!(cart["total_quantity"], 0);

    let (status, tracking) =
        get_json(&browser, ctx.url("/api/orders/ORD00001/tracking")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tracking["items"].as_array().unwrap().len(), 2);

    let (_, history) = get_json(&browser, ctx.url("/api/account/orders")).await;
    assert_eq!(history["orders"].as_array().unwrap().len(), 1);

    let response = browser
        .post(ctx.url("/api/checkout"))
        .json(&fixtures::checkout())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_anonymous_checkout_requires_sign_in() {
    let ctx = TestContext::new().await;
    let response = ctx
        .browser()
        .post(ctx.url("/api/checkout"))
        .json(&fixtures::checkout())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ============================================================================
// Account
// ============================================================================

#[tokio::test]
async fn test_profile_and_avatar() {
    let ctx = TestContext::new().await;
    let buyer = ctx
        .backend
        .create_user("buyer@example.com", PASSWORD, "Buyer", Role::Buyer);
    let browser = ctx.browser();
    ctx.sign_in(&browser, "buyer@example.com", PASSWORD).await;

    let profile: Value = browser
        .put(ctx.url("/api/account/profile"))
        .json(&json!({ "display_name": "Ada", "phone": "+44 20 7946 0000" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(profile["display_name"], "Ada");
    assert_eq!(ctx.backend.user_metadata(buyer)["phone"], "+44 20 7946 0000");

    let form = Form::new().part(
        "avatar",
        Part::bytes(vec![1_u8; 512])
            .file_name("me.png")
            .mime_str("image/png")
            .unwrap(),
    );
    let response = browser
        .post(ctx.url("/api/account/avatar"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let profile: Value = response.json().await.unwrap();
    assert!(
        profile["avatar_url"]
            .as_str()
            .unwrap()
            .contains("/storage/v1/object/public/users/")
    );
}

// ============================================================================
// Seller products
// ============================================================================

fn image(name: &str, mime: &str, bytes: usize) -> Part {
    Part::bytes(vec![9_u8; bytes])
        .file_name(name.to_owned())
        .mime_str(mime)
        .unwrap()
}

fn product_form() -> Form {
    Form::new()
        .text("product_name", "Walnut Stool")
        .text("product_price", "49.90")
        .text("product_desc", "Hand finished")
        .text("product_category", "Home")
        .text("product_category", "Seating")
}

async fn signed_in_seller(ctx: &TestContext) -> (reqwest::Client, uuid::Uuid) {
    let seller = ctx
        .backend
        .create_user("seller@example.com", PASSWORD, "Seller", Role::Seller);
    let browser = ctx.browser();
    ctx.sign_in(&browser, "seller@example.com", PASSWORD).await;
    (browser, seller)
}

#[tokio::test]
async fn test_seller_creates_lists_and_deletes_product() {
    let ctx = TestContext::with_strategy(IdStrategy::Sequential).await;
    let (browser, seller) = signed_in_seller(&ctx).await;

    let form = product_form()
        .part("featured_image", image("stool.png", "image/png", 2048))
        .part("other_images", image("side.png", "image/png", 1024));
    let response = browser
        .post(ctx.url("/api/seller/products"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let product: Value = response.json().await.unwrap();
    assert_eq!(product["product_id"], "PRD00001");
    assert_eq!(product["seller_id"], seller.to_string());
    assert_eq!(product["product_category"], "['Home', 'Seating']");
    assert!(
        product["featured_image"]
            .as_str()
            .unwrap()
            .ends_with("/storage/v1/object/public/products/PRD00001/featured_image")
    );
    let stored = ctx
        .backend
        .object("products/PRD00001/featured_image")
        .unwrap();
    assert_eq!(stored.content_type, "image/png");
    assert_eq!(stored.bytes.len(), 2048);
    assert!(ctx.backend.object("products/PRD00001/other_image_0").is_some());

    let (_, listed) = get_json(&browser, ctx.url("/api/seller/products")).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
    let (_, stats) = get_json(&browser, ctx.url("/api/seller/stats")).await;
    assert_eq!(stats["total_products"], 1);

    let response = browser
        .delete(ctx.url("/api/seller/products/PRD00001"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(ctx.backend.rows("products").is_empty());
}

#[tokio::test]
async fn test_seller_edit_keeps_unchanged_images() {
    let ctx = TestContext::new().await;
    let (browser, seller) = signed_in_seller(&ctx).await;
    ctx.backend.seed(
        "products",
        [ProductRow::new("PRD00007", "Old Stool", "20.00", "Home").seller(seller).build()],
    );

    let form = product_form()
        .text("keep_other_images", "https://cdn.example.com/kept.png")
        .part("other_images", image("new.png", "image/png", 100));
    let response = browser
        .put(ctx.url("/api/seller/products/PRD00007"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let product: Value = response.json().await.unwrap();
    assert_eq!(product["product_name"], "Walnut Stool");
    assert_eq!(
        product["featured_image"],
        "https://cdn.example.com/PRD00007/featured_image"
    );
    let others = product["other_images"].as_array().unwrap();
    assert_eq!(others.len(), 2);
    assert_eq!(others[0], "https://cdn.example.com/kept.png");
    assert!(ctx.backend.object("products/PRD00007/other_image_0").is_some());
}

#[tokio::test]
async fn test_seller_upload_rejections() {
    let ctx = TestContext::new().await;
    let (browser, _) = signed_in_seller(&ctx).await;

    let cases = [
        (product_form(), StatusCode::BAD_REQUEST),
        (
            product_form().part("featured_image", image("notes.txt", "text/plain", 100)),
            StatusCode::BAD_REQUEST,
        ),
        (
            product_form().part(
                "featured_image",
                image("huge.png", "image/png", MAX_UPLOAD_BYTES + 1),
            ),
            StatusCode::PAYLOAD_TOO_LARGE,
        ),
        (
            Form::new()
                .text("product_name", "No Price")
                .text("product_category", "Home")
                .part("featured_image", image("a.png", "image/png", 10)),
            StatusCode::BAD_REQUEST,
        ),
    ];
    for (form, expected) in cases {
        let response = browser
            .post(ctx.url("/api/seller/products"))
            .multipart(form)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), expected);
    }
    assert!(ctx.backend.rows("products").is_empty());
    assert!(ctx.backend.object_paths().is_empty());
}

// ============================================================================
// Admin
// ============================================================================

#[tokio::test]
async fn test_admin_console() {
    let ctx = TestContext::new().await;
    seed_catalog(&ctx);
    let buyer = ctx
        .backend
        .create_user("buyer@example.com", PASSWORD, "Buyer", Role::Buyer);
    ctx.backend.seed(
        "orders",
        [fixtures::order(
            "ORD00001",
            buyer,
            chrono::Utc::now(),
            "17.50",
            &["PRD00001", "PRD00002"],
        )],
    );
    ctx.backend
        .create_user("admin@example.com", PASSWORD, "Admin", Role::Admin);
    let browser = ctx.browser();
    ctx.sign_in(&browser, "admin@example.com", PASSWORD).await;

    let (_, stats) = get_json(&browser, ctx.url("/api/admin/stats")).await;
    assert_eq!(stats["total_products"], 2);
    assert_eq!(stats["total_orders"], 1);
    assert_eq!(stats["daily_sales"].as_array().unwrap().len(), 30);

    let (_, products) = get_json(&browser, ctx.url("/api/admin/products?limit=1&page=2")).await;
    assert_eq!(products["current_page"], 2);
    assert_eq!(products["items"][0]["product_id"], "PRD00002");

    let toggled: Value = browser
        .put(ctx.url("/api/admin/products/PRD00002/flash-sale"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(toggled["flash_sale"], true);

    let (_, detail) = get_json(&browser, ctx.url("/api/admin/orders/ORD00001")).await;
    assert_eq!(detail["products"].as_array().unwrap().len(), 2);

    let response = browser
        .put(ctx.url("/api/admin/orders/ORD00001/status"))
        .json(&json!({ "order_state": "confirmed" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        ctx.backend.row("orders", "ORD00001").unwrap()["order_state"],
        "confirmed"
    );

    let response = browser
        .put(ctx.url("/api/admin/orders/ORD00001/status"))
        .json(&json!({ "order_state": "lost" }))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_client_error());

    let response = browser
        .delete(ctx.url("/api/admin/products/PRD00001"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}
