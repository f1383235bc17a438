//! Integration tests for registration, login, and session handling.
//!
//! These tests require:
//! - A running `PostgreSQL` database with migrations applied
//! - The server running (cargo run -p merchkins-server)
//!
//! Run with: cargo test -p merchkins-integration-tests -- --ignored

use merchkins_integration_tests::TestApp;
use serde_json::json;

#[tokio::test]
#[ignore = "Requires running merchkins-server and PostgreSQL"]
async fn test_register_login_me_logout() {
    let app = TestApp::new();
    let email = TestApp::unique_email("auth");

    let user = app.register(&email, "Auth Tester", "integration-pass-1").await;
    assert_eq!(user["email"], email);
    assert_eq!(user["display_name"], "Auth Tester");

    // Registration sets the session; /auth/me works immediately.
    let me = app.get_ok("/auth/me").await;
    assert_eq!(me["email"], email);

    let resp = app.post("/auth/logout", &json!({})).await;
    assert_eq!(resp.status(), 204);

    // Session gone.
    let resp = app
        .client
        .get(format!("{}/auth/me", app.base_url))
        .send()
        .await
        .expect("me request failed");
    assert_eq!(resp.status(), 401);

    // Fresh login restores the session.
    let resp = app
        .post(
            "/auth/login",
            &json!({ "email": email, "password": "integration-pass-1" }),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let me = app.get_ok("/auth/me").await;
    assert_eq!(me["email"], email);
}

#[tokio::test]
#[ignore = "Requires running merchkins-server and PostgreSQL"]
async fn test_register_rejects_duplicate_email() {
    let app = TestApp::new();
    let email = TestApp::unique_email("dup");
    app.register(&email, "First", "integration-pass-1").await;

    let other = TestApp::new();
    let resp = other
        .post(
            "/auth/register",
            &json!({ "email": email, "display_name": "Second", "password": "integration-pass-1" }),
        )
        .await;
    assert_eq!(resp.status(), 409);
}

#[tokio::test]
#[ignore = "Requires running merchkins-server and PostgreSQL"]
async fn test_register_rejects_weak_password() {
    let app = TestApp::new();
    let resp = app
        .post(
            "/auth/register",
            &json!({
                "email": TestApp::unique_email("weak"),
                "display_name": "Weak",
                "password": "short",
            }),
        )
        .await;
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
#[ignore = "Requires running merchkins-server and PostgreSQL"]
async fn test_change_password_requires_current() {
    let app = TestApp::new();
    let email = TestApp::unique_email("pw");
    app.register(&email, "Pw Tester", "integration-pass-1").await;

    // Wrong current password.
    let resp = app
        .post(
            "/auth/password",
            &json!({ "current_password": "wrong-password-1", "new_password": "integration-pass-2" }),
        )
        .await;
    assert_eq!(resp.status(), 401);

    // Correct current password.
    let resp = app
        .post(
            "/auth/password",
            &json!({ "current_password": "integration-pass-1", "new_password": "integration-pass-2" }),
        )
        .await;
    assert_eq!(resp.status(), 200);

    // Old password no longer works.
    let fresh = TestApp::new();
    let resp = fresh
        .post(
            "/auth/login",
            &json!({ "email": email, "password": "integration-pass-1" }),
        )
        .await;
    assert_eq!(resp.status(), 401);

    let resp = fresh
        .post(
            "/auth/login",
            &json!({ "email": email, "password": "integration-pass-2" }),
        )
        .await;
    assert_eq!(resp.status(), 200);
}
