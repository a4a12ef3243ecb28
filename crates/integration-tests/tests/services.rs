//! Data-access services against the backend double.
//!
//! Run with: cargo test -p shopfront-integration-tests --test services

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use chrono::{Days, Utc};
use serde_json::json;
use shopfront_core::{
    Cart, CategoryList, OrderId, OrderState, PageRequest, Price, ProductId, Role, UserId,
};
use shopfront_integration_tests::FakeSupabase;
use shopfront_integration_tests::fixtures::{self, PASSWORD, ProductRow};
use shopfront_storefront::cache::QueryCache;
use shopfront_storefront::services::ServiceError;
use shopfront_storefront::services::admin::{AdminService, ListParams};
use shopfront_storefront::services::cart::CartService;
use shopfront_storefront::services::catalog::{CatalogService, SearchParams, SortBy};
use shopfront_storefront::services::ids::IdStrategy;
use shopfront_storefront::services::images::ImageUpload;
use shopfront_storefront::services::orders::{Checkout, OrderService};
use shopfront_storefront::services::profile::{ProfileService, ProfileUpdate};
use shopfront_storefront::services::sellers::{ImageChanges, ProductForm, SellerService};

const MAX_BYTES: usize = 64 * 1024;

fn cache() -> QueryCache {
    QueryCache::new(1_000, Duration::from_secs(60))
}

fn checkout() -> Checkout {
    serde_json::from_value(fixtures::checkout()).unwrap()
}

fn cart(lines: &[(&str, u32)]) -> Cart {
    let mut cart = Cart::new();
    for (id, quantity) in lines {
        cart.add(ProductId::from(*id), *quantity).unwrap();
    }
    cart
}

fn png(bytes: usize) -> ImageUpload {
    ImageUpload::new(Some("photo.png".into()), "image/png", vec![7; bytes])
}

fn form(name: &str, price_cents: u32, categories: &str) -> ProductForm {
    ProductForm {
        product_name: name.into(),
        product_price: Price::from_cents(price_cents),
        product_desc: String::new(),
        product_category: CategoryList::parse(categories),
    }
}

// ============================================================================
// Id allocation
// ============================================================================

async fn buyer_with_catalog() -> (FakeSupabase, uuid::Uuid) {
    let backend = FakeSupabase::start().await;
    let buyer = backend.create_user("buyer@example.com", PASSWORD, "Buyer", Role::Buyer);
    backend.seed(
        "products",
        [
            ProductRow::new("PRD00001", "Desk Lamp", "12.50", "Home").build(),
            ProductRow::new("PRD00002", "Notebook", "5.00", "Office").build(),
        ],
    );
    let yesterday = Utc::now() - chrono::Duration::days(1);
    backend.seed(
        "orders",
        [fixtures::order("ORD00041", buyer, yesterday, "12.50", &["PRD00001"])],
    );
    (backend, buyer)
}

#[tokio::test]
async fn test_sequential_order_id_follows_latest() {
    let (backend, buyer) = buyer_with_catalog().await;
    let client = backend.client_for(buyer);
    let cache = cache();

    let order = OrderService::new(&client, &cache)
        .place_order(
            UserId::new(buyer),
            &cart(&[("PRD00001", 2), ("PRD00002", 1)]),
            &checkout(),
            IdStrategy::Sequential,
        )
        .await
        .unwrap();

    assert_eq!(order.order_id.as_str(), "ORD00042");
    assert_eq!(order.total_count, Price::from_cents(3000));
    assert_eq!(order.order_state, OrderState::Pending);
    assert_eq!(order.products_id.ids().len(), 2);
    assert!(backend.row("orders", "ORD00042").is_some());
}

#[tokio::test]
async fn test_sequential_order_id_retries_after_lost_race() {
    let (backend, buyer) = buyer_with_catalog().await;
    backend.hold_key("orders", "ORD00042");
    let client = backend.client_for(buyer);
    let cache = cache();

    let order = OrderService::new(&client, &cache)
        .place_order(
            UserId::new(buyer),
            &cart(&[("PRD00001", 1)]),
            &checkout(),
            IdStrategy::Sequential,
        )
        .await
        .unwrap();

    assert_eq!(order.order_id.as_str(), "ORD00043");
}

#[tokio::test]
async fn test_sequential_order_id_gives_up_after_five_collisions() {
    let (backend, buyer) = buyer_with_catalog().await;
    for n in 42..=46 {
        backend.hold_key("orders", OrderId::from_sequence(n).as_str());
    }
    let client = backend.client_for(buyer);
    let cache = cache();

    let err = OrderService::new(&client, &cache)
        .place_order(
            UserId::new(buyer),
            &cart(&[("PRD00001", 1)]),
            &checkout(),
            IdStrategy::Sequential,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::Conflict(_)), "got {err:?}");
    assert_eq!(backend.rows("orders").len(), 1);
}

#[tokio::test]
async fn test_uuid_order_ids_are_prefixed() {
    let (backend, buyer) = buyer_with_catalog().await;
    let client = backend.client_for(buyer);
    let cache = cache();

    let order = OrderService::new(&client, &cache)
        .place_order(
            UserId::new(buyer),
            &cart(&[("PRD00002", 3)]),
            &checkout(),
            IdStrategy::Uuid,
        )
        .await
        .unwrap();

    assert!(order.order_id.as_str().starts_with("ORD-"));
    assert_eq!(order.total_count, Price::from_cents(1500));
}

// ============================================================================
// Checkout validation and tracking
// ============================================================================

#[tokio::test]
async fn test_place_order_rejects_bad_input() {
    let (backend, buyer) = buyer_with_catalog().await;
    let client = backend.client_for(buyer);
    let cache = cache();
    let orders = OrderService::new(&client, &cache);
    let buyer = UserId::new(buyer);

    let err = orders
        .place_order(buyer, &Cart::new(), &checkout(), IdStrategy::Uuid)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Invalid(_)));

    let mut incomplete = checkout();
    incomplete.shipping_address.city = "  ".into();
    let err = orders
        .place_order(buyer, &cart(&[("PRD00001", 1)]), &incomplete, IdStrategy::Uuid)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("city"), "got {err}");

    let err = orders
        .place_order(buyer, &cart(&[("PRD09999", 1)]), &checkout(), IdStrategy::Uuid)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Invalid(_)));
    assert_eq!(backend.rows("orders").len(), 1);
}

#[tokio::test]
async fn test_tracking_is_limited_to_the_buyer() {
    let (backend, buyer) = buyer_with_catalog().await;
    let other = backend.create_user("other@example.com", PASSWORD, "Other", Role::Buyer);
    let cache = cache();
    let order_id = OrderId::from("ORD00041");

    let client = backend.client_for(buyer);
    let tracking = OrderService::new(&client, &cache)
        .tracking(&order_id, UserId::new(buyer))
        .await
        .unwrap();
    assert_eq!(tracking.items.len(), 1);
    assert_eq!(tracking.items[0].product.product_name, "Desk Lamp");

    let client = backend.client_for(other);
    let err = OrderService::new(&client, &cache)
        .tracking(&order_id, UserId::new(other))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));

    let err = OrderService::new(&client, &cache)
        .tracking(&OrderId::from("ORD09999"), UserId::new(other))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn test_history_totals() {
    let (backend, buyer) = buyer_with_catalog().await;
    backend.seed(
        "orders",
        [fixtures::order(
            "ORD00042",
            buyer,
            Utc::now(),
            "17.50",
            &["PRD00001", "PRD00002"],
        )],
    );
    let client = backend.client_for(buyer);
    let cache = cache();

    let history = OrderService::new(&client, &cache)
        .history(UserId::new(buyer))
        .await
        .unwrap();

    assert_eq!(history.orders.len(), 2);
    assert_eq!(history.orders[0].order.order_id.as_str(), "ORD00042");
    assert_eq!(history.orders[0].total, Price::from_cents(1750));
    assert_eq!(history.total_spend, Price::from_cents(3000));
}

// ============================================================================
// Cart and profile
// ============================================================================

#[tokio::test]
async fn test_cart_merge_sums_quantities() {
    let backend = FakeSupabase::start().await;
    let buyer = backend.create_user("buyer@example.com", PASSWORD, "Buyer", Role::Buyer);
    backend.set_user_metadata(buyer, "cart", json!({ "PRD00001": 1 }));
    let client = backend.client_for(buyer);
    let cache = cache();
    let carts = CartService::new(&client, &cache, UserId::new(buyer));

    let merged = carts
        .merge(&cart(&[("PRD00001", 2), ("PRD00002", 1)]))
        .await
        .unwrap();

    assert_eq!(merged, cart(&[("PRD00001", 3), ("PRD00002", 1)]));
    assert_eq!(
        backend.user_metadata(buyer)["cart"],
        json!({ "PRD00001": 3, "PRD00002": 1 })
    );
    assert_eq!(carts.get().await.unwrap().total_quantity(), 4);
}

#[tokio::test]
async fn test_cart_write_failure_keeps_cached_cart() {
    let backend = FakeSupabase::start().await;
    let buyer = backend.create_user("buyer@example.com", PASSWORD, "Buyer", Role::Buyer);
    backend.set_user_metadata(buyer, "cart", json!({ "PRD00001": 1 }));
    let client = backend.client_for(buyer);
    let cache = cache();
    let carts = CartService::new(&client, &cache, UserId::new(buyer));
    assert_eq!(carts.get().await.unwrap().total_quantity(), 1);

    backend.fail_user_updates(true);
    assert!(carts.add(ProductId::from("PRD00001"), 4).await.is_err());
    assert_eq!(carts.get().await.unwrap().total_quantity(), 1);

    backend.fail_user_updates(false);
    assert_eq!(carts.set_quantity(ProductId::from("PRD00001"), 0).await.unwrap(), Cart::new());
}

#[tokio::test]
async fn test_profile_update_rolls_back_on_failure() {
    let backend = FakeSupabase::start().await;
    let user = backend.create_user("kim@example.com", PASSWORD, "Kim", Role::Buyer);
    let client = backend.client_for(user);
    let cache = cache();
    let profiles = ProfileService::new(&client, &cache, UserId::new(user));
    assert_eq!(profiles.get().await.unwrap().display_name, "Kim");

    backend.fail_user_updates(true);
    let update = ProfileUpdate {
        display_name: Some("Kimberly".into()),
        phone: None,
    };
    assert!(profiles.update(&update).await.is_err());
    assert_eq!(profiles.get().await.unwrap().display_name, "Kim");

    backend.fail_user_updates(false);
    let profile = profiles.update(&update).await.unwrap();
    assert_eq!(profile.display_name, "Kimberly");
    assert_eq!(backend.user_metadata(user)["display_name"], "Kimberly");

    let blank = ProfileUpdate {
        display_name: Some(" ".into()),
        phone: None,
    };
    assert!(matches!(
        profiles.update(&blank).await,
        Err(ServiceError::Invalid(_))
    ));
}

#[tokio::test]
async fn test_avatar_upload_updates_profile() {
    let backend = FakeSupabase::start().await;
    let user = backend.create_user("kim@example.com", PASSWORD, "Kim", Role::Seller);
    let client = backend.client_for(user);
    let cache = cache();

    let profile = ProfileService::new(&client, &cache, UserId::new(user))
        .upload_avatar(png(128), MAX_BYTES)
        .await
        .unwrap();

    let url = profile.avatar_url.unwrap();
    assert!(url.contains("/storage/v1/object/public/users/"), "{url}");
    let paths = backend.object_paths();
    assert_eq!(paths.len(), 1);
    assert!(paths[0].starts_with(&format!("users/{user}-")));
    assert!(paths[0].ends_with(".webp"));
}

// ============================================================================
// Seller
// ============================================================================

#[tokio::test]
async fn test_seller_stats_and_scoping() {
    let backend = FakeSupabase::start().await;
    let seller = backend.create_user("seller@example.com", PASSWORD, "Seller", Role::Seller);
    let rival = backend.create_user("rival@example.com", PASSWORD, "Rival", Role::Seller);
    backend.seed(
        "products",
        [
            ProductRow::new("PRD00001", "Kettle", "10.00", "Kitchen").seller(seller).sold(3).build(),
            ProductRow::new("PRD00002", "Mug", "2.50", "Kitchen").seller(seller).sold(4).build(),
            ProductRow::new("PRD00003", "Teapot", "30.00", "Kitchen").seller(rival).sold(9).build(),
        ],
    );
    let client = backend.client_for(seller);
    let cache = cache();
    let sellers = SellerService::new(&client, &cache, UserId::new(seller));

    let stats = sellers.stats().await.unwrap();
    assert_eq!(stats.total_products, 2);
    assert_eq!(stats.total_orders, 7);
    assert_eq!(stats.total_sales, Price::from_cents(4000));

    let products = sellers.products().await.unwrap();
    let ids: Vec<&str> = products.iter().map(|p| p.product_id.as_str()).collect();
    assert_eq!(ids, ["PRD00001", "PRD00002"]);

    let theirs = ProductId::from("PRD00003");
    assert!(sellers.product(&theirs).await.unwrap().is_none());
    assert!(matches!(
        sellers.delete_product(&theirs).await,
        Err(ServiceError::NotFound(_))
    ));
    assert!(backend.row("products", "PRD00003").is_some());
}

#[tokio::test]
async fn test_add_product_sequential_uploads_under_the_id() {
    let backend = FakeSupabase::start().await;
    let seller = backend.create_user("seller@example.com", PASSWORD, "Seller", Role::Seller);
    backend.seed(
        "products",
        [
            ProductRow::new("PRD00009", "Chair", "45.00", "Home").build(),
            ProductRow::new("PRD00010", "Table", "120.00", "Home").build(),
        ],
    );
    backend.hold_key("products", "PRD00011");
    let client = backend.client_for(seller);
    let cache = cache();

    let product = SellerService::new(&client, &cache, UserId::new(seller))
        .add_product(
            &form("Stool", 1999, "['Home', 'Seating']"),
            &png(256),
            &[png(64), png(64)],
            IdStrategy::Sequential,
            MAX_BYTES,
        )
        .await
        .unwrap();

    assert_eq!(product.product_id.as_str(), "PRD00012");
    assert_eq!(product.total_sales, 0);
    assert!(!product.flash_sale);
    assert_eq!(product.seller_id, Some(UserId::new(seller)));
    assert!(
        product
            .featured_image
            .as_deref()
            .unwrap()
            .ends_with("/storage/v1/object/public/products/PRD00012/featured_image")
    );
    assert_eq!(product.other_images.len(), 2);
    assert!(backend.object("products/PRD00012/other_image_1").is_some());
    assert_eq!(
        backend.row("products", "PRD00012").unwrap()["product_category"],
        "['Home', 'Seating']"
    );
}

#[tokio::test]
async fn test_add_product_lost_race_leaves_the_winner_untouched() {
    let backend = FakeSupabase::start().await;
    let seller = backend.create_user("seller@example.com", PASSWORD, "Seller", Role::Seller);
    backend.seed(
        "products",
        [ProductRow::new("PRD00010", "Table", "120.00", "Home").build()],
    );
    backend.hold_key("products", "PRD00011");
    backend.put_object("products/PRD00011/featured_image", "image/png", vec![1; 10]);
    backend.put_object("products/PRD00011/other_image_0", "image/png", vec![2; 10]);
    let client = backend.client_for(seller);
    let cache = cache();

    let product = SellerService::new(&client, &cache, UserId::new(seller))
        .add_product(
            &form("Stool", 1999, "Home"),
            &png(32),
            &[png(16)],
            IdStrategy::Sequential,
            MAX_BYTES,
        )
        .await
        .unwrap();

    assert_eq!(product.product_id.as_str(), "PRD00012");
    assert_eq!(
        backend.object("products/PRD00011/featured_image").unwrap().bytes,
        vec![1; 10]
    );
    assert_eq!(
        backend.object("products/PRD00011/other_image_0").unwrap().bytes,
        vec![2; 10]
    );
    assert_eq!(
        backend.object("products/PRD00012/featured_image").unwrap().bytes,
        vec![7; 32]
    );
    let row = backend.row("products", "PRD00012").unwrap();
    assert!(
        row["featured_image"]
            .as_str()
            .unwrap()
            .ends_with("/products/PRD00012/featured_image")
    );
    assert_eq!(row["other_images"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_update_product_appends_after_highest_kept_image() {
    let backend = FakeSupabase::start().await;
    let seller = backend.create_user("seller@example.com", PASSWORD, "Seller", Role::Seller);
    backend.seed(
        "products",
        [ProductRow::new("PRD00004", "Shelf", "60.00", "Home")
            .seller(seller)
            .other_images(3)
            .build()],
    );
    for (index, fill) in [(0_usize, 1_u8), (1, 2), (2, 3)] {
        backend.put_object(
            &format!("products/PRD00004/other_image_{index}"),
            "image/png",
            vec![fill; 32],
        );
    }
    let client = backend.client_for(seller);
    let cache = cache();
    let kept = vec![
        "https://cdn.example.com/PRD00004/other_image_1".to_owned(),
        "https://cdn.example.com/PRD00004/other_image_2".to_owned(),
    ];

    let product = SellerService::new(&client, &cache, UserId::new(seller))
        .update_product(
            &ProductId::from("PRD00004"),
            &form("Shelf", 6000, "Home"),
            &ImageChanges {
                featured: None,
                keep_other_images: kept.clone(),
                new_other_images: vec![png(8)],
            },
            MAX_BYTES,
        )
        .await
        .unwrap();

    assert_eq!(product.other_images.len(), 3);
    assert_eq!(product.other_images[..2], kept[..]);
    assert!(product.other_images[2].ends_with("/products/PRD00004/other_image_3"));
    assert_eq!(
        backend.object("products/PRD00004/other_image_2").unwrap().bytes,
        vec![3; 32]
    );
    assert_eq!(
        backend.object("products/PRD00004/other_image_3").unwrap().bytes,
        vec![7; 8]
    );
}

#[tokio::test]
async fn test_add_product_validates_before_writing() {
    let backend = FakeSupabase::start().await;
    let seller = backend.create_user("seller@example.com", PASSWORD, "Seller", Role::Seller);
    let client = backend.client_for(seller);
    let cache = cache();
    let sellers = SellerService::new(&client, &cache, UserId::new(seller));

    let err = sellers
        .add_product(&form("Stool", 1999, ""), &png(10), &[], IdStrategy::Uuid, MAX_BYTES)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Invalid(_)));

    let err = sellers
        .add_product(
            &form("Stool", 1999, "Home"),
            &png(MAX_BYTES + 1),
            &[],
            IdStrategy::Uuid,
            MAX_BYTES,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::TooLarge { .. }));

    let text = ImageUpload::new(Some("notes.txt".into()), "text/plain", vec![1; 10]);
    let err = sellers
        .add_product(&form("Stool", 1999, "Home"), &text, &[], IdStrategy::Uuid, MAX_BYTES)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Invalid(_)));

    assert!(backend.rows("products").is_empty());
    assert!(backend.object_paths().is_empty());
}

// ============================================================================
// Catalog
// ============================================================================

async fn catalog_backend() -> FakeSupabase {
    let backend = FakeSupabase::start().await;
    backend.seed(
        "products",
        [
            ProductRow::new("PRD00001", "Wireless Headphones", "89.99", "Audio")
                .categories(&["Audio", "Gadgets"])
                .flash_sale()
                .build(),
            ProductRow::new("PRD00002", "Bluetooth Speaker", "45.00", "Audio").build(),
            ProductRow::new("PRD00003", "Smart Watch", "199.00", "Gadgets").build(),
            ProductRow::new("PRD00004", "Desk Lamp", "12.50", "Home").build(),
            ProductRow::new("PRD00005", "Earbuds", "29.00", "Audio").flash_sale().build(),
        ],
    );
    backend
}

#[tokio::test]
async fn test_related_products_share_a_category() {
    let backend = catalog_backend().await;
    let client = backend.client();
    let cache = cache();
    let catalog = CatalogService::new(&client, &cache);

    let headphones = catalog
        .product(&ProductId::from("PRD00001"))
        .await
        .unwrap()
        .unwrap();
    let mut related: Vec<String> = catalog
        .related(&headphones)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.product_id.into_inner())
        .collect();
    related.sort();

    assert_eq!(related, ["PRD00002", "PRD00003", "PRD00005"]);
    assert!(
        catalog
            .product(&ProductId::from("PRD09999"))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_category_pages_sorted_by_name() {
    let backend = catalog_backend().await;
    let client = backend.client();
    let cache = cache();
    let catalog = CatalogService::new(&client, &cache);

    let page = catalog
        .category("audio", PageRequest::new(Some(1), Some(2)))
        .await
        .unwrap();
    let names: Vec<&str> = page.items.iter().map(|p| p.product_name.as_str()).collect();
    assert_eq!(names, ["Bluetooth Speaker", "Earbuds"]);
    assert_eq!(page.total_count, 3);
    assert_eq!(page.total_pages, 2);

    let all = catalog
        .category("all", PageRequest::new(Some(3), Some(2)))
        .await
        .unwrap();
    assert_eq!(all.total_count, 5);
    assert_eq!(all.items.len(), 1);
    assert_eq!(all.items[0].product_name, "Wireless Headphones");
}

#[tokio::test]
async fn test_search_filters_and_sorts() {
    let backend = catalog_backend().await;
    let client = backend.client();
    let cache = cache();
    let catalog = CatalogService::new(&client, &cache);

    let results = catalog
        .search(&SearchParams {
            q: String::new(),
            category: Some("audio".into()),
            price_range: Some("20-100".into()),
            sort_by: SortBy::PriceHighLow,
        })
        .await
        .unwrap();
    let ids: Vec<&str> = results.iter().map(|p| p.product_id.as_str()).collect();
    assert_eq!(ids, ["PRD00001", "PRD00002", "PRD00005"]);

    let results = catalog
        .search(&SearchParams {
            q: "LAMP".into(),
            ..SearchParams::default()
        })
        .await
        .unwrap();
    assert_eq!(results.len(), 1);

    let err = catalog
        .search(&SearchParams {
            price_range: Some("cheap".into()),
            ..SearchParams::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Invalid(_)));

    let flash: Vec<String> = catalog
        .flash_sale()
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.product_id.into_inner())
        .collect();
    assert_eq!(flash, ["PRD00001", "PRD00005"]);
}

#[tokio::test]
async fn test_search_treats_underscore_literally() {
    let backend = FakeSupabase::start().await;
    backend.seed(
        "products",
        [
            ProductRow::new("PRD00001", "Desk_Lamp", "12.50", "Home").build(),
            ProductRow::new("PRD00002", "DeskXLamp", "14.00", "Home").build(),
        ],
    );
    let client = backend.client();
    let cache = cache();
    let catalog = CatalogService::new(&client, &cache);

    let results = catalog
        .search(&SearchParams {
            q: "desk_lamp".into(),
            ..SearchParams::default()
        })
        .await
        .unwrap();
    let ids: Vec<&str> = results.iter().map(|p| p.product_id.as_str()).collect();
    assert_eq!(ids, ["PRD00001"]);
}

// ============================================================================
// Admin
// ============================================================================

#[tokio::test]
async fn test_admin_product_pages_and_search() {
    let backend = FakeSupabase::start().await;
    let admin = backend.create_user("admin@example.com", PASSWORD, "Admin", Role::Admin);
    backend.seed(
        "products",
        (1..=25).map(|n| {
            let name = if n % 5 == 0 { "Floor Lamp" } else { "Cushion" };
            ProductRow::new(ProductId::from_sequence(n).as_str(), name, "9.99", "Home").build()
        }),
    );
    let client = backend.client_for(admin);
    let cache = cache();
    let admin = AdminService::new(&client, &cache);

    let page = admin
        .products(&ListParams {
            page: Some(2),
            limit: Some(10),
            search: None,
        })
        .await
        .unwrap();
    assert_eq!(page.total_count, 25);
    assert_eq!(page.total_pages, 3);
    assert_eq!(page.items.len(), 10);
    assert_eq!(page.items[0].product_id.as_str(), "PRD00011");

    let lamps = admin
        .products(&ListParams {
            search: Some("lamp".into()),
            ..ListParams::default()
        })
        .await
        .unwrap();
    assert_eq!(lamps.total_count, 5);
}

#[tokio::test]
async fn test_admin_stats_window() {
    let backend = FakeSupabase::start().await;
    let admin = backend.create_user("admin@example.com", PASSWORD, "Admin", Role::Admin);
    let buyer = backend.create_user("buyer@example.com", PASSWORD, "Buyer", Role::Buyer);
    backend.seed(
        "products",
        [ProductRow::new("PRD00001", "Lamp", "10.00", "Home").build()],
    );
    let now = Utc::now();
    let long_ago = now.checked_sub_days(Days::new(40)).unwrap();
    backend.seed(
        "orders",
        [
            fixtures::order("ORD00001", buyer, long_ago, "100.00", &["PRD00001"]),
            fixtures::order("ORD00002", buyer, now, "20.00", &["PRD00001"]),
            fixtures::order("ORD00003", buyer, now, "5.50", &["PRD00001"]),
        ],
    );
    let client = backend.client_for(admin);
    let cache = cache();

    let stats = AdminService::new(&client, &cache).stats().await.unwrap();

    assert_eq!(stats.total_products, 1);
    assert_eq!(stats.total_orders, 3);
    assert_eq!(stats.total_sales, Price::from_cents(12_550));
    assert_eq!(stats.daily_sales.len(), 30);
    let today = stats.daily_sales.last().unwrap();
    assert_eq!(today.date, now.date_naive());
    assert_eq!(today.sales, Price::from_cents(2550));
    let window: Price = stats.daily_sales.iter().map(|d| d.sales).sum();
    assert_eq!(window, Price::from_cents(2550));
}

#[tokio::test]
async fn test_admin_moderation() {
    let backend = FakeSupabase::start().await;
    let admin = backend.create_user("admin@example.com", PASSWORD, "Admin", Role::Admin);
    let buyer = backend.create_user("buyer@example.com", PASSWORD, "Buyer", Role::Buyer);
    backend.seed(
        "products",
        [
            ProductRow::new("PRD00001", "Lamp", "10.00", "Home").build(),
            ProductRow::new("PRD00002", "Rug", "60.00", "Home").build(),
        ],
    );
    backend.seed(
        "orders",
        [fixtures::order("ORD00001", buyer, Utc::now(), "70.00", &["PRD00001", "PRD00002"])],
    );
    let client = backend.client_for(admin);
    let cache = cache();
    let admin = AdminService::new(&client, &cache);

    let lamp = ProductId::from("PRD00001");
    assert!(admin.toggle_flash_sale(&lamp).await.unwrap().flash_sale);
    assert!(!admin.toggle_flash_sale(&lamp).await.unwrap().flash_sale);

    let detail = admin.order_detail(&OrderId::from("ORD00001")).await.unwrap();
    assert_eq!(detail.products.len(), 2);
    assert_eq!(
        detail.order.shipping_address.map(|a| a.city),
        Some("London".to_owned())
    );

    let order = admin
        .update_order_status(&OrderId::from("ORD00001"), OrderState::Delivered)
        .await
        .unwrap();
    assert_eq!(order.order_state, OrderState::Delivered);
    assert_eq!(backend.row("orders", "ORD00001").unwrap()["order_state"], "delivered");

    admin.delete_product(&ProductId::from("PRD00002")).await.unwrap();
    assert!(backend.row("products", "PRD00002").is_none());
    assert!(matches!(
        admin.delete_product(&ProductId::from("PRD00002")).await,
        Err(ServiceError::NotFound(_))
    ));
    assert!(matches!(
        admin
            .update_order_status(&OrderId::from("ORD09999"), OrderState::Cancelled)
            .await,
        Err(ServiceError::NotFound(_))
    ));
}
