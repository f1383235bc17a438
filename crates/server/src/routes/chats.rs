//! Customer-to-staff chat handlers.
//!
//! Customers have one room per storefront; staff work an inbox ordered by
//! most recent activity. Unread counters are maintained by the repository.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::instrument;

use merchkins_core::{ChatRoomId, Permission};

use crate::db::chats::ChatRepository;
use crate::error::{AppError, Result};
use crate::middleware::auth::RequireAuth;
use crate::models::chat::{ChatMessage, ChatRoom, ChatSide};
use crate::state::AppState;

use super::{Pagination, load_org, require_permission};

#[derive(Debug, Deserialize)]
pub struct OpenRoomPayload {
    #[serde(default)]
    pub subject: String,
}

#[derive(Debug, Deserialize)]
pub struct PostMessagePayload {
    pub body: String,
}

/// Open (or return) the caller's room with this storefront.
#[instrument(skip_all, fields(slug = %slug))]
pub async fn open_own(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(slug): Path<String>,
    Json(payload): Json<OpenRoomPayload>,
) -> Result<(StatusCode, Json<ChatRoom>)> {
    let org = load_org(&state, &slug).await?;

    let room = ChatRepository::new(state.pool())
        .open_room(org.id, user.id, payload.subject.trim())
        .await?;

    Ok((StatusCode::CREATED, Json(room)))
}

/// The caller's room messages, oldest first. Reading clears the customer
/// unread counter.
#[instrument(skip_all, fields(slug = %slug))]
pub async fn own_messages(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(slug): Path<String>,
    Query(page): Query<Pagination>,
) -> Result<Json<Vec<ChatMessage>>> {
    let org = load_org(&state, &slug).await?;

    let repo = ChatRepository::new(state.pool());
    let room = repo.open_room(org.id, user.id, "").await?;
    let messages = repo
        .get_messages(room.id, ChatSide::Customer, page.limit(), page.offset())
        .await?;

    Ok(Json(messages))
}

/// Post into the caller's own room.
#[instrument(skip_all, fields(slug = %slug))]
pub async fn post_own(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(slug): Path<String>,
    Json(payload): Json<PostMessagePayload>,
) -> Result<(StatusCode, Json<ChatMessage>)> {
    let org = load_org(&state, &slug).await?;

    let repo = ChatRepository::new(state.pool());
    let room = repo.open_room(org.id, user.id, "").await?;
    let message = repo
        .post_message(room.id, user.id, ChatSide::Customer, &payload.body)
        .await?;

    Ok((StatusCode::CREATED, Json(message)))
}

/// The caller's rooms across storefronts.
#[instrument(skip_all)]
pub async fn list_mine(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<ChatRoom>>> {
    let rooms = ChatRepository::new(state.pool())
        .list_rooms_for_customer(user.id)
        .await?;
    Ok(Json(rooms))
}

/// Staff inbox: an organization's rooms, most recently active first
/// (`manage_tickets`).
#[instrument(skip_all, fields(slug = %slug))]
pub async fn staff_inbox(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(slug): Path<String>,
    Query(page): Query<Pagination>,
) -> Result<Json<Vec<ChatRoom>>> {
    let org = load_org(&state, &slug).await?;
    require_permission(&state, &org, &user, Permission::ManageTickets).await?;

    let rooms = ChatRepository::new(state.pool())
        .list_rooms_for_org(org.id, page.limit(), page.offset())
        .await?;
    Ok(Json(rooms))
}

/// Read a room as staff (`manage_tickets`). Clears the staff unread
/// counter.
#[instrument(skip_all, fields(slug = %slug, room_id = %room_id))]
pub async fn staff_messages(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path((slug, room_id)): Path<(String, ChatRoomId)>,
    Query(page): Query<Pagination>,
) -> Result<Json<Vec<ChatMessage>>> {
    let org = load_org(&state, &slug).await?;
    require_permission(&state, &org, &user, Permission::ManageTickets).await?;

    let repo = ChatRepository::new(state.pool());
    repo.get_room(org.id, room_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("chat room {room_id}")))?;

    let messages = repo
        .get_messages(room_id, ChatSide::Staff, page.limit(), page.offset())
        .await?;
    Ok(Json(messages))
}

/// Post into a room as staff (`manage_tickets`).
#[instrument(skip_all, fields(slug = %slug, room_id = %room_id))]
pub async fn staff_post(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path((slug, room_id)): Path<(String, ChatRoomId)>,
    Json(payload): Json<PostMessagePayload>,
) -> Result<(StatusCode, Json<ChatMessage>)> {
    let org = load_org(&state, &slug).await?;
    require_permission(&state, &org, &user, Permission::ManageTickets).await?;

    let repo = ChatRepository::new(state.pool());
    repo.get_room(org.id, room_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("chat room {room_id}")))?;

    let message = repo
        .post_message(room_id, user.id, ChatSide::Staff, &payload.body)
        .await?;

    Ok((StatusCode::CREATED, Json(message)))
}
