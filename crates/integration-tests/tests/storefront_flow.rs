//! Integration tests for the storefront path: catalog, cart, checkout,
//! order fulfilment, and payments.
//!
//! These tests require:
//! - A running `PostgreSQL` database with migrations applied
//! - The server running (cargo run -p merchkins-server)
//!
//! Run with: cargo test -p merchkins-integration-tests -- --ignored

use merchkins_integration_tests::TestApp;
use serde_json::{Value, json};

/// Build an org with one product ("tee") carrying one variant, and return
/// (org slug, variant id).
async fn seed_catalog(owner: &TestApp) -> (String, i64) {
    let org = owner.register_with_org("store").await;
    let slug = org["slug"].as_str().expect("org slug").to_string();

    let resp = owner
        .post(
            &format!("/orgs/{slug}/products"),
            &json!({ "title": "Tee", "slug": "tee", "description": "A tee" }),
        )
        .await;
    assert_eq!(resp.status(), 201);

    let resp = owner
        .post(
            &format!("/orgs/{slug}/products/tee/variants"),
            &json!({ "name": "Large", "price": "19.00", "currency": "USD", "stock": 10 }),
        )
        .await;
    assert_eq!(resp.status(), 201);
    let variant: Value = resp.json().await.expect("variant JSON");
    let variant_id = variant["id"].as_i64().expect("variant id");

    (slug, variant_id)
}

#[tokio::test]
#[ignore = "Requires running merchkins-server and PostgreSQL"]
async fn test_cart_checkout_and_fulfilment() {
    let owner = TestApp::new();
    let (slug, variant_id) = seed_catalog(&owner).await;

    // A customer fills a cart and checks out.
    let customer = TestApp::new();
    customer
        .register(&TestApp::unique_email("buyer"), "Buyer", "integration-pass-1")
        .await;

    let resp = customer
        .post(
            &format!("/orgs/{slug}/cart/items"),
            &json!({ "variant_id": variant_id, "quantity": 2 }),
        )
        .await;
    assert_eq!(resp.status(), 200);

    let cart = customer.get_ok(&format!("/orgs/{slug}/cart")).await;
    assert_eq!(cart["item_count"], 2);
    assert_eq!(cart["subtotal"], "38.00");

    let resp = customer
        .post(&format!("/orgs/{slug}/checkout"), &json!({}))
        .await;
    assert_eq!(resp.status(), 201);
    let order: Value = resp.json().await.expect("order JSON");
    let order_id = order["id"].as_i64().expect("order id");
    assert_eq!(order["status"], "pending");
    assert_eq!(order["total"], "38.00");

    // Checkout emptied the cart.
    let cart = customer.get_ok(&format!("/orgs/{slug}/cart")).await;
    assert_eq!(cart["item_count"], 0);

    // The customer sees the order.
    let mine = customer.get_ok("/me/orders").await;
    assert!(mine.as_array().expect("order list").iter().any(|o| o["id"] == order_id));

    // A wrong-amount payment is rejected.
    let resp = owner
        .post(
            &format!("/orgs/{slug}/orders/{order_id}/payments"),
            &json!({ "method": "card", "amount": "1.00", "status": "succeeded" }),
        )
        .await;
    assert_eq!(resp.status(), 400);

    // A succeeded payment moves the order to processing.
    let resp = owner
        .post(
            &format!("/orgs/{slug}/orders/{order_id}/payments"),
            &json!({ "method": "card", "amount": "38.00", "status": "succeeded" }),
        )
        .await;
    assert_eq!(resp.status(), 201);
    let order = owner
        .get_ok(&format!("/orgs/{slug}/orders/{order_id}"))
        .await;
    assert_eq!(order["status"], "processing");

    // Payments are only taken while pending.
    let resp = owner
        .post(
            &format!("/orgs/{slug}/orders/{order_id}/payments"),
            &json!({ "method": "card", "amount": "38.00", "status": "succeeded" }),
        )
        .await;
    assert_eq!(resp.status(), 400);

    // Skipping a step is rejected; the next step works.
    let resp = owner
        .client
        .patch(format!("{}/orgs/{slug}/orders/{order_id}/status", owner.base_url))
        .json(&json!({ "status": "delivered" }))
        .send()
        .await
        .expect("status request failed");
    assert_eq!(resp.status(), 409);

    let resp = owner
        .client
        .patch(format!("{}/orgs/{slug}/orders/{order_id}/status", owner.base_url))
        .json(&json!({ "status": "shipped" }))
        .send()
        .await
        .expect("status request failed");
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
#[ignore = "Requires running merchkins-server and PostgreSQL"]
async fn test_checkout_with_voucher() {
    let owner = TestApp::new();
    let (slug, variant_id) = seed_catalog(&owner).await;

    let resp = owner
        .post(
            &format!("/orgs/{slug}/vouchers"),
            &json!({ "code": "save10", "discount_percent": 10 }),
        )
        .await;
    assert_eq!(resp.status(), 201);

    let customer = TestApp::new();
    customer
        .register(&TestApp::unique_email("vbuyer"), "Buyer", "integration-pass-1")
        .await;
    let resp = customer
        .post(
            &format!("/orgs/{slug}/cart/items"),
            &json!({ "variant_id": variant_id, "quantity": 1 }),
        )
        .await;
    assert_eq!(resp.status(), 200);

    // Code lookup is case-insensitive.
    let resp = customer
        .post(
            &format!("/orgs/{slug}/checkout"),
            &json!({ "voucher_code": "SAVE10" }),
        )
        .await;
    assert_eq!(resp.status(), 201);
    let order: Value = resp.json().await.expect("order JSON");
    assert_eq!(order["subtotal"], "19.00");
    assert_eq!(order["discount"], "1.90");
    assert_eq!(order["total"], "17.10");
}

#[tokio::test]
#[ignore = "Requires running merchkins-server and PostgreSQL"]
async fn test_checkout_rejects_empty_cart_and_excess_quantity() {
    let owner = TestApp::new();
    let (slug, variant_id) = seed_catalog(&owner).await;

    let customer = TestApp::new();
    customer
        .register(&TestApp::unique_email("ebuyer"), "Buyer", "integration-pass-1")
        .await;

    // An empty cart (created by viewing it) cannot be checked out.
    let cart = customer.get_ok(&format!("/orgs/{slug}/cart")).await;
    assert_eq!(cart["item_count"], 0);
    let resp = customer
        .post(&format!("/orgs/{slug}/checkout"), &json!({}))
        .await;
    assert_eq!(resp.status(), 400);

    // Stock is 10; asking for more fails.
    let resp = customer
        .post(
            &format!("/orgs/{slug}/cart/items"),
            &json!({ "variant_id": variant_id, "quantity": 11 }),
        )
        .await;
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
#[ignore = "Requires running merchkins-server and PostgreSQL"]
async fn test_verified_purchase_review() {
    let owner = TestApp::new();
    let (slug, variant_id) = seed_catalog(&owner).await;

    let customer = TestApp::new();
    customer
        .register(&TestApp::unique_email("rev"), "Reviewer", "integration-pass-1")
        .await;

    // No purchase yet: review is rejected.
    let resp = customer
        .post(
            &format!("/orgs/{slug}/products/tee/reviews"),
            &json!({ "rating": 5, "body": "great" }),
        )
        .await;
    assert_eq!(resp.status(), 400);

    // Buy it and have the order delivered, then review.
    let resp = customer
        .post(
            &format!("/orgs/{slug}/cart/items"),
            &json!({ "variant_id": variant_id, "quantity": 1 }),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let resp = customer
        .post(&format!("/orgs/{slug}/checkout"), &json!({}))
        .await;
    assert_eq!(resp.status(), 201);
    let order: Value = resp.json().await.expect("order JSON");
    let order_id = order["id"].as_i64().expect("order id");

    let resp = owner
        .post(
            &format!("/orgs/{slug}/orders/{order_id}/payments"),
            &json!({ "method": "card", "amount": "19.00", "status": "succeeded" }),
        )
        .await;
    assert_eq!(resp.status(), 201);
    for status in ["shipped", "delivered"] {
        let resp = owner
            .client
            .patch(format!("{}/orgs/{slug}/orders/{order_id}/status", owner.base_url))
            .json(&json!({ "status": status }))
            .send()
            .await
            .expect("status request failed");
        assert_eq!(resp.status(), 200, "advancing to {status}");
    }

    let resp = customer
        .post(
            &format!("/orgs/{slug}/products/tee/reviews"),
            &json!({ "rating": 4, "body": "good tee" }),
        )
        .await;
    assert_eq!(resp.status(), 201);

    // One review per product per user.
    let resp = customer
        .post(
            &format!("/orgs/{slug}/products/tee/reviews"),
            &json!({ "rating": 5, "body": "again" }),
        )
        .await;
    assert_eq!(resp.status(), 409);

    // The product detail reflects the rating.
    let product = customer.get_ok(&format!("/orgs/{slug}/products/tee")).await;
    assert_eq!(product["rating_count"], 1);
}

#[tokio::test]
#[ignore = "Requires running merchkins-server and PostgreSQL"]
async fn test_variant_validation_rejects_bad_currency_and_negatives() {
    let owner = TestApp::new();
    let (slug, variant_id) = seed_catalog(&owner).await;

    // Unknown currency code.
    let resp = owner
        .post(
            &format!("/orgs/{slug}/products/tee/variants"),
            &json!({ "name": "Odd", "price": "5.00", "currency": "XYZ", "stock": 1 }),
        )
        .await;
    assert_eq!(resp.status(), 400);

    // Negative price.
    let resp = owner
        .post(
            &format!("/orgs/{slug}/products/tee/variants"),
            &json!({ "name": "Odd", "price": "-1.00", "currency": "USD", "stock": 1 }),
        )
        .await;
    assert_eq!(resp.status(), 400);

    // Negative stock on update.
    let resp = owner
        .client
        .patch(format!("{}/orgs/{slug}/variants/{variant_id}", owner.base_url))
        .json(&json!({ "stock": -3 }))
        .send()
        .await
        .expect("variant update request failed");
    assert_eq!(resp.status(), 400);
}
