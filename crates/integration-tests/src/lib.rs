//! Integration test support for Merchkins.
//!
//! These tests exercise the JSON API of a running server; they are marked
//! `#[ignore]` so `cargo test` stays hermetic.
//!
//! # Running
//!
//! ```bash
//! # Start PostgreSQL, migrate, and run the server
//! cargo run -p merchkins-cli -- migrate
//! cargo run -p merchkins-server
//!
//! # Then, in another shell
//! cargo test -p merchkins-integration-tests -- --ignored
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::missing_panics_doc)]

use reqwest::Client;
use serde_json::{Value, json};
use uuid::Uuid;

/// A cookie-holding client bound to one test account.
pub struct TestApp {
    pub client: Client,
    pub base_url: String,
}

impl TestApp {
    /// Build a client against `MERCHKINS_BASE_URL` (default localhost:3000).
    #[must_use]
    pub fn new() -> Self {
        let base_url = std::env::var("MERCHKINS_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string());
        let client = Client::builder()
            .cookie_store(true)
            .build()
            .expect("Failed to create HTTP client");
        Self { client, base_url }
    }

    /// A unique email address for this test run.
    #[must_use]
    pub fn unique_email(prefix: &str) -> String {
        format!("{prefix}-{}@test.merchkins.dev", Uuid::new_v4().simple())
    }

    /// A unique slug for this test run.
    #[must_use]
    pub fn unique_slug(prefix: &str) -> String {
        format!("{prefix}-{}", Uuid::new_v4().simple())
    }

    /// Register a fresh account; the session cookie lands in the jar.
    pub async fn register(&self, email: &str, display_name: &str, password: &str) -> Value {
        let resp = self
            .client
            .post(format!("{}/auth/register", self.base_url))
            .json(&json!({
                "email": email,
                "display_name": display_name,
                "password": password,
            }))
            .send()
            .await
            .expect("register request failed");
        assert_eq!(resp.status(), 201, "registration should succeed");
        resp.json().await.expect("register response not JSON")
    }

    /// Register a fresh account and create an organization it administers.
    /// Returns the organization JSON (including its slug).
    pub async fn register_with_org(&self, prefix: &str) -> Value {
        let email = Self::unique_email(prefix);
        self.register(&email, "Test Owner", "integration-pass-1").await;

        let slug = Self::unique_slug(prefix);
        let resp = self
            .client
            .post(format!("{}/orgs", self.base_url))
            .json(&json!({
                "name": format!("{prefix} org"),
                "slug": slug,
            }))
            .send()
            .await
            .expect("org create request failed");
        assert_eq!(resp.status(), 201, "org creation should succeed");
        resp.json().await.expect("org response not JSON")
    }

    /// GET a path and return the parsed body, asserting 200.
    pub async fn get_ok(&self, path: &str) -> Value {
        let resp = self
            .client
            .get(format!("{}{path}", self.base_url))
            .send()
            .await
            .expect("GET request failed");
        assert_eq!(resp.status(), 200, "GET {path}");
        resp.json().await.expect("response not JSON")
    }

    /// POST a JSON body and return the response for the caller to assert on.
    pub async fn post(&self, path: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(format!("{}{path}", self.base_url))
            .json(body)
            .send()
            .await
            .expect("POST request failed")
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}
