//! Integration tests for announcements (including search), support
//! tickets, and chat.
//!
//! These tests require:
//! - A running `PostgreSQL` database with migrations applied
//! - The server running (cargo run -p merchkins-server)
//!
//! Run with: cargo test -p merchkins-integration-tests -- --ignored

use merchkins_integration_tests::TestApp;
use serde_json::{Value, json};

#[tokio::test]
#[ignore = "Requires running merchkins-server and PostgreSQL"]
async fn test_announcement_audience_scoping() {
    let owner = TestApp::new();
    let org = owner.register_with_org("ann").await;
    let slug = org["slug"].as_str().expect("org slug").to_string();

    for (title, audience) in [
        ("Public news", "public"),
        ("Member news", "members"),
        ("Staff memo", "staff"),
    ] {
        let resp = owner
            .post(
                &format!("/orgs/{slug}/announcements"),
                &json!({ "title": title, "body": "body text", "audience": audience }),
            )
            .await;
        assert_eq!(resp.status(), 201);
    }

    // The admin sees all three.
    let all = owner.get_ok(&format!("/orgs/{slug}/announcements")).await;
    assert_eq!(all.as_array().expect("list").len(), 3);

    // An anonymous visitor sees only the public one.
    let anon = TestApp::new();
    let visible = anon.get_ok(&format!("/orgs/{slug}/announcements")).await;
    let visible = visible.as_array().expect("list");
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0]["title"], "Public news");

    // A joined member sees public + members.
    let member = TestApp::new();
    member
        .register(&TestApp::unique_email("member"), "Member", "integration-pass-1")
        .await;
    // invite_code is never serialized; rotating returns the fresh one.
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

    let visible = member.get_ok(&format!("/orgs/{slug}/announcements")).await;
    assert_eq!(visible.as_array().expect("list").len(), 2);
}

#[tokio::test]
#[ignore = "Requires running merchkins-server and PostgreSQL"]
async fn test_announcement_search_respects_audience() {
    let owner = TestApp::new();
    let org = owner.register_with_org("search").await;
    let slug = org["slug"].as_str().expect("org slug").to_string();

    let resp = owner
        .post(
            &format!("/orgs/{slug}/announcements"),
            &json!({
                "title": "Warehouse relocation",
                "body": "We are moving the warehouse in October",
                "audience": "staff",
            }),
        )
        .await;
    assert_eq!(resp.status(), 201);

    // The admin finds it.
    let hits = owner
        .get_ok(&format!("/orgs/{slug}/announcements/search?q=warehouse"))
        .await;
    assert_eq!(hits.as_array().expect("hits").len(), 1);

    // Anonymous search over the same org returns nothing.
    let anon = TestApp::new();
    let hits = anon
        .get_ok(&format!("/orgs/{slug}/announcements/search?q=warehouse"))
        .await;
    assert!(hits.as_array().expect("hits").is_empty());
}

#[tokio::test]
#[ignore = "Requires running merchkins-server and PostgreSQL"]
async fn test_ticket_thread_lifecycle() {
    let owner = TestApp::new();
    let org = owner.register_with_org("tick").await;
    let slug = org["slug"].as_str().expect("org slug").to_string();

    let customer = TestApp::new();
    customer
        .register(&TestApp::unique_email("tcust"), "Customer", "integration-pass-1")
        .await;

    let resp = customer
        .post(
            &format!("/orgs/{slug}/tickets"),
            &json!({ "subject": "Order missing", "body": "Where is it?", "priority": "high" }),
        )
        .await;
    assert_eq!(resp.status(), 201);
    let thread: Value = resp.json().await.expect("thread JSON");
    let ticket_id = thread["id"].as_i64().expect("ticket id");
    assert_eq!(thread["messages"].as_array().expect("messages").len(), 1);

    // Staff replies and resolves.
    let resp = owner
        .post(
            &format!("/orgs/{slug}/tickets/{ticket_id}/messages"),
            &json!({ "body": "Shipping tomorrow" }),
        )
        .await;
    assert_eq!(resp.status(), 201);

    let resp = owner
        .client
        .patch(format!("{}/orgs/{slug}/tickets/{ticket_id}", owner.base_url))
        .json(&json!({ "status": "in_progress" }))
        .send()
        .await
        .expect("patch failed");
    assert_eq!(resp.status(), 200);

    // The customer replying to someone else's ticket is forbidden.
    let stranger = TestApp::new();
    stranger
        .register(&TestApp::unique_email("stranger"), "Stranger", "integration-pass-1")
        .await;
    let resp = stranger
        .post(
            &format!("/orgs/{slug}/tickets/{ticket_id}/messages"),
            &json!({ "body": "me too" }),
        )
        .await;
    assert_eq!(resp.status(), 403);

    // The opener sees the full thread.
    let thread = customer
        .get_ok(&format!("/orgs/{slug}/tickets/{ticket_id}"))
        .await;
    assert_eq!(thread["status"], "in_progress");
    assert_eq!(thread["messages"].as_array().expect("messages").len(), 2);
}

#[tokio::test]
#[ignore = "Requires running merchkins-server and PostgreSQL"]
async fn test_chat_round_trip() {
    let owner = TestApp::new();
    let org = owner.register_with_org("chat").await;
    let slug = org["slug"].as_str().expect("org slug").to_string();

    let customer = TestApp::new();
    customer
        .register(&TestApp::unique_email("ccust"), "Customer", "integration-pass-1")
        .await;

    let resp = customer
        .post(
            &format!("/orgs/{slug}/chat"),
            &json!({ "subject": "Sizing question" }),
        )
        .await;
    assert_eq!(resp.status(), 201);
    let room: Value = resp.json().await.expect("room JSON");
    let room_id = room["id"].as_i64().expect("room id");

    let resp = customer
        .post(
            &format!("/orgs/{slug}/chat/messages"),
            &json!({ "body": "Does the tee run small?" }),
        )
        .await;
    assert_eq!(resp.status(), 201);

    // Staff sees the room in the inbox with one unread.
    let inbox = owner.get_ok(&format!("/orgs/{slug}/chats")).await;
    let entry = inbox
        .as_array()
        .expect("inbox")
        .iter()
        .find(|r| r["id"] == room_id)
        .expect("room in inbox")
        .clone();
    assert_eq!(entry["unread_for_staff"], 1);

    // Reading as staff resets the counter; replying bumps the customer's.
    let messages = owner
        .get_ok(&format!("/orgs/{slug}/chats/{room_id}/messages"))
        .await;
    assert_eq!(messages.as_array().expect("messages").len(), 1);

    let resp = owner
        .post(
            &format!("/orgs/{slug}/chats/{room_id}/messages"),
            &json!({ "body": "True to size." }),
        )
        .await;
    assert_eq!(resp.status(), 201);

    let rooms = customer.get_ok("/me/chats").await;
    let entry = rooms
        .as_array()
        .expect("rooms")
        .iter()
        .find(|r| r["id"] == room_id)
        .expect("room listed")
        .clone();
    assert_eq!(entry["unread_for_customer"], 1);
}
