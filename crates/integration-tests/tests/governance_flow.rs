//! Integration tests for membership roles, permission overrides, refund
//! decisions, and the audit trail.
//!
//! These tests require:
//! - A running `PostgreSQL` database with migrations applied
//! - The server running (cargo run -p merchkins-server)
//!
//! Run with: cargo test -p merchkins-integration-tests -- --ignored

use merchkins_integration_tests::TestApp;
use serde_json::{Value, json};

/// Register a member and join them to the org; returns their user id.
async fn join_member(owner: &TestApp, slug: &str, prefix: &str) -> (TestApp, i64) {
    let member = TestApp::new();
    let user = member
        .register(&TestApp::unique_email(prefix), "Joined Member", "integration-pass-1")
        .await;
    let user_id = user["id"].as_i64().expect("user id");

    let resp = owner
        .post(&format!("/orgs/{slug}/invite/rotate"), &json!({}))
        .await;
    assert_eq!(resp.status(), 200);
    let rotated: Value = resp.json().await.expect("rotate JSON");
    let code = rotated["invite_code"].as_str().expect("invite code");

    let resp = member
        .post(&format!("/orgs/{slug}/join"), &json!({ "invite_code": code }))
        .await;
    assert_eq!(resp.status(), 201);

    (member, user_id)
}

#[tokio::test]
#[ignore = "Requires running merchkins-server and PostgreSQL"]
async fn test_permission_override_grants_and_revokes() {
    let owner = TestApp::new();
    let org = owner.register_with_org("perm").await;
    let slug = org["slug"].as_str().expect("org slug").to_string();

    let (member, user_id) = join_member(&owner, &slug, "perm").await;

    // A plain member cannot publish announcements.
    let publish = json!({ "title": "Hello", "body": "text", "audience": "public" });
    let resp = member
        .post(&format!("/orgs/{slug}/announcements"), &publish)
        .await;
    assert_eq!(resp.status(), 403);

    // Grant the permission via override.
    let resp = owner
        .client
        .put(format!(
            "{}/orgs/{slug}/members/{user_id}/permissions",
            owner.base_url
        ))
        .json(&json!({ "permission": "manage_announcements", "allowed": true }))
        .send()
        .await
        .expect("override request failed");
    assert_eq!(resp.status(), 204);

    let resp = member
        .post(&format!("/orgs/{slug}/announcements"), &publish)
        .await;
    assert_eq!(resp.status(), 201);

    // Clearing the override restores the role default.
    let resp = owner
        .client
        .delete(format!(
            "{}/orgs/{slug}/members/{user_id}/permissions/manage_announcements",
            owner.base_url
        ))
        .send()
        .await
        .expect("clear request failed");
    assert_eq!(resp.status(), 204);

    let resp = member
        .post(&format!("/orgs/{slug}/announcements"), &publish)
        .await;
    assert_eq!(resp.status(), 403);
}

#[tokio::test]
#[ignore = "Requires running merchkins-server and PostgreSQL"]
async fn test_last_admin_cannot_leave_or_be_demoted() {
    let owner = TestApp::new();
    let org = owner.register_with_org("admin").await;
    let slug = org["slug"].as_str().expect("org slug").to_string();

    let resp = owner.post(&format!("/orgs/{slug}/leave"), &json!({})).await;
    assert_eq!(resp.status(), 409);

    // Promote a second admin, then the founder may leave.
    let (_member, user_id) = join_member(&owner, &slug, "second").await;
    let resp = owner
        .client
        .patch(format!(
            "{}/orgs/{slug}/members/{user_id}/role",
            owner.base_url
        ))
        .json(&json!({ "role": "admin" }))
        .send()
        .await
        .expect("role request failed");
    assert_eq!(resp.status(), 200);

    let resp = owner.post(&format!("/orgs/{slug}/leave"), &json!({})).await;
    assert_eq!(resp.status(), 204);
}

#[tokio::test]
#[ignore = "Requires running merchkins-server and PostgreSQL"]
async fn test_refund_request_and_decision() {
    let owner = TestApp::new();
    let org = owner.register_with_org("refund").await;
    let slug = org["slug"].as_str().expect("org slug").to_string();

    // Catalog with one variant.
    let resp = owner
        .post(
            &format!("/orgs/{slug}/products"),
            &json!({ "title": "Mug", "slug": "mug" }),
        )
        .await;
    assert_eq!(resp.status(), 201);
    let resp = owner
        .post(
            &format!("/orgs/{slug}/products/mug/variants"),
            &json!({ "name": "Standard", "price": "12.50", "currency": "USD", "stock": 5 }),
        )
        .await;
    assert_eq!(resp.status(), 201);
    let variant: Value = resp.json().await.expect("variant JSON");
    let variant_id = variant["id"].as_i64().expect("variant id");

    // Customer buys the mug.
    let customer = TestApp::new();
    customer
        .register(&TestApp::unique_email("rcust"), "Customer", "integration-pass-1")
        .await;
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

    // A refund before payment is rejected.
    let resp = customer
        .post(
            &format!("/me/orders/{order_id}/refund"),
            &json!({ "reason": "changed my mind" }),
        )
        .await;
    assert_eq!(resp.status(), 400);

    // Record payment, then request again.
    let resp = owner
        .post(
            &format!("/orgs/{slug}/orders/{order_id}/payments"),
            &json!({ "method": "cash", "amount": "12.50", "status": "succeeded" }),
        )
        .await;
    assert_eq!(resp.status(), 201);

    let resp = customer
        .post(
            &format!("/me/orders/{order_id}/refund"),
            &json!({ "reason": "changed my mind" }),
        )
        .await;
    assert_eq!(resp.status(), 201);
    let request: Value = resp.json().await.expect("refund JSON");
    let refund_id = request["id"].as_i64().expect("refund id");

    // A second open request conflicts.
    let resp = customer
        .post(
            &format!("/me/orders/{order_id}/refund"),
            &json!({ "reason": "again" }),
        )
        .await;
    assert_eq!(resp.status(), 409);

    // Approve, then settle.
    let resp = owner
        .post(
            &format!("/orgs/{slug}/refunds/{refund_id}/decide"),
            &json!({ "approve": true }),
        )
        .await;
    assert_eq!(resp.status(), 200);

    let resp = owner
        .post(&format!("/orgs/{slug}/refunds/{refund_id}/settle"), &json!({}))
        .await;
    assert_eq!(resp.status(), 200);
    let settled: Value = resp.json().await.expect("settle JSON");
    assert_eq!(settled["status"], "refunded");

    let mine = customer.get_ok("/me/refunds").await;
    assert_eq!(mine.as_array().expect("list")[0]["status"], "refunded");
}

#[tokio::test]
#[ignore = "Requires running merchkins-server and PostgreSQL"]
async fn test_audit_trail_records_mutations() {
    let owner = TestApp::new();
    let org = owner.register_with_org("audit").await;
    let slug = org["slug"].as_str().expect("org slug").to_string();

    let resp = owner
        .post(
            &format!("/orgs/{slug}/products"),
            &json!({ "title": "Pen", "slug": "pen" }),
        )
        .await;
    assert_eq!(resp.status(), 201);

    // Audit writes are async fire-and-forget; give the worker a moment.
    tokio::time::sleep(std::time::Duration::from_millis(300)).await;

    let trail = owner.get_ok(&format!("/orgs/{slug}/audit")).await;
    let actions: Vec<&str> = trail
        .as_array()
        .expect("trail")
        .iter()
        .filter_map(|e| e["action"].as_str())
        .collect();
    assert!(actions.contains(&"org.created"), "actions: {actions:?}");
    assert!(actions.contains(&"product.created"), "actions: {actions:?}");
}

#[tokio::test]
#[ignore = "Requires running merchkins-server and PostgreSQL"]
async fn test_join_rejects_foreign_invite_code_without_side_effects() {
    let owner_a = TestApp::new();
    let org_a = owner_a.register_with_org("joina").await;
    let slug_a = org_a["slug"].as_str().expect("org slug").to_string();

    let owner_b = TestApp::new();
    let org_b = owner_b.register_with_org("joinb").await;
    let slug_b = org_b["slug"].as_str().expect("org slug").to_string();
    let code_b = org_b["invite_code"].as_str().expect("invite code");

    let joiner = TestApp::new();
    joiner
        .register(&TestApp::unique_email("joiner"), "Joiner", "integration-pass-1")
        .await;

    // B's code presented on A's URL is rejected.
    let resp = joiner
        .post(&format!("/orgs/{slug_a}/join"), &json!({ "invite_code": code_b }))
        .await;
    assert_eq!(resp.status(), 400);

    // The rejection wrote nothing: joining B with its own code still
    // succeeds, which it would not if a membership already existed.
    let resp = joiner
        .post(&format!("/orgs/{slug_b}/join"), &json!({ "invite_code": code_b }))
        .await;
    assert_eq!(resp.status(), 201);
}

#[tokio::test]
#[ignore = "Requires running merchkins-server and PostgreSQL"]
async fn test_deleted_org_releases_its_slug() {
    let owner = TestApp::new();
    let org = owner.register_with_org("reslug").await;
    let slug = org["slug"].as_str().expect("org slug").to_string();

    let resp = owner
        .client
        .delete(format!("{}/orgs/{slug}", owner.base_url))
        .send()
        .await
        .expect("delete request failed");
    assert_eq!(resp.status(), 204);

    // A fresh org may reuse the slug of a soft-deleted one.
    let resp = owner
        .post("/orgs", &json!({ "name": "Reborn", "slug": slug }))
        .await;
    assert_eq!(resp.status(), 201);
}
