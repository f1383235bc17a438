//! Announcement handlers, including full-text search.
//!
//! Visibility is audience-based: public posts are open to everyone,
//! members posts to active members, staff posts to staff and admins.
//! Mutations keep the search index current; index write failures are
//! logged and never fail the request (the background rebuild catches up).

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{instrument, warn};

use merchkins_core::{AnnouncementId, Audience, MemberRole, Permission};

use crate::db::announcements::AnnouncementRepository;
use crate::error::{AppError, Result};
use crate::middleware::auth::{OptionalAuth, RequireAuth};
use crate::models::announcement::Announcement;
use crate::models::organization::Organization;
use crate::search::SearchHit;
use crate::state::AppState;

use super::{Pagination, load_org, require_permission};

/// Search result cap.
const SEARCH_LIMIT: usize = 20;

#[derive(Debug, Deserialize)]
pub struct CreateAnnouncementPayload {
    pub title: String,
    pub body: String,
    pub audience: Audience,
    #[serde(default)]
    pub is_pinned: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAnnouncementPayload {
    pub title: Option<String>,
    pub body: Option<String>,
    pub audience: Option<Audience>,
    pub is_pinned: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
}

/// The caller's role in the organization, for audience filtering.
async fn viewer_role(
    state: &AppState,
    org: &Organization,
    user: Option<&crate::models::CurrentUser>,
) -> Result<Option<MemberRole>> {
    let Some(user) = user else {
        return Ok(None);
    };
    if user.is_platform_admin {
        return Ok(Some(MemberRole::Admin));
    }
    Ok(state
        .permissions()
        .resolve(org.id, user.id)
        .await?
        .map(|m| m.role))
}

/// Announcements visible to the caller, pinned first.
#[instrument(skip_all, fields(slug = %slug))]
pub async fn list(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    Path(slug): Path<String>,
    Query(page): Query<Pagination>,
) -> Result<Json<Vec<Announcement>>> {
    let org = load_org(&state, &slug).await?;
    let role = viewer_role(&state, &org, user.as_ref()).await?;

    let announcements = AnnouncementRepository::new(state.pool())
        .list_visible(org.id, role, page.limit(), page.offset())
        .await?;
    Ok(Json(announcements))
}

/// Full-text search over announcements visible to the caller.
#[instrument(skip_all, fields(slug = %slug, q = %query.q))]
pub async fn search(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    Path(slug): Path<String>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<SearchHit>>> {
    let org = load_org(&state, &slug).await?;
    let role = viewer_role(&state, &org, user.as_ref()).await?;

    if !state.search().is_ready() {
        // Index still building after startup; empty rather than an error.
        return Ok(Json(Vec::new()));
    }

    let hits = state
        .search()
        .search(org.id, role, &query.q, SEARCH_LIMIT)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(Json(hits))
}

/// Publish an announcement (`manage_announcements`).
#[instrument(skip_all, fields(slug = %slug))]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(slug): Path<String>,
    Json(payload): Json<CreateAnnouncementPayload>,
) -> Result<(StatusCode, Json<Announcement>)> {
    let org = load_org(&state, &slug).await?;
    require_permission(&state, &org, &user, Permission::ManageAnnouncements).await?;

    let title = payload.title.trim();
    if title.is_empty() {
        return Err(AppError::BadRequest("title must not be empty".to_string()));
    }
    if payload.body.trim().is_empty() {
        return Err(AppError::BadRequest("body must not be empty".to_string()));
    }

    let announcement = AnnouncementRepository::new(state.pool())
        .create(
            org.id,
            &org.name,
            user.id,
            title,
            &payload.body,
            payload.audience,
            payload.is_pinned,
        )
        .await?;

    if let Err(e) = state.search().upsert(&announcement) {
        warn!(error = %e, announcement_id = %announcement.id, "Search index update failed");
    }

    state.audit().record(
        org.id,
        Some(user.id),
        "announcement.created",
        "announcement",
        announcement.id.as_i64(),
        json!({ "title": announcement.title, "audience": announcement.audience }),
    );

    Ok((StatusCode::CREATED, Json(announcement)))
}

/// Edit an announcement (`manage_announcements`).
#[instrument(skip_all, fields(slug = %slug, announcement_id = %id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path((slug, id)): Path<(String, AnnouncementId)>,
    Json(payload): Json<UpdateAnnouncementPayload>,
) -> Result<Json<Announcement>> {
    let org = load_org(&state, &slug).await?;
    require_permission(&state, &org, &user, Permission::ManageAnnouncements).await?;

    let announcement = AnnouncementRepository::new(state.pool())
        .update(
            org.id,
            id,
            payload.title.as_deref(),
            payload.body.as_deref(),
            payload.audience,
            payload.is_pinned,
        )
        .await?;

    if let Err(e) = state.search().upsert(&announcement) {
        warn!(error = %e, announcement_id = %id, "Search index update failed");
    }

    state.audit().record(
        org.id,
        Some(user.id),
        "announcement.updated",
        "announcement",
        id.as_i64(),
        json!({ "title": payload.title, "audience": payload.audience }),
    );

    Ok(Json(announcement))
}

/// Delete an announcement (`manage_announcements`).
#[instrument(skip_all, fields(slug = %slug, announcement_id = %id))]
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path((slug, id)): Path<(String, AnnouncementId)>,
) -> Result<StatusCode> {
    let org = load_org(&state, &slug).await?;
    require_permission(&state, &org, &user, Permission::ManageAnnouncements).await?;

    AnnouncementRepository::new(state.pool())
        .soft_delete(org.id, id)
        .await?;

    if let Err(e) = state.search().remove(id) {
        warn!(error = %e, announcement_id = %id, "Search index removal failed");
    }

    state.audit().record(
        org.id,
        Some(user.id),
        "announcement.deleted",
        "announcement",
        id.as_i64(),
        json!({}),
    );

    Ok(StatusCode::NO_CONTENT)
}
