//! Organization, membership, and permission override handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};

use merchkins_core::{MemberRole, Permission, Slug, UserId};

use crate::db::organizations::OrganizationRepository;
use crate::error::{AppError, Result};
use crate::middleware::auth::RequireAuth;
use crate::models::organization::{
    MemberPermission, MemberWithUser, Organization, OrganizationMember,
};
use crate::state::AppState;

use super::{Pagination, load_org, require_permission};

#[derive(Debug, Deserialize)]
pub struct CreateOrgPayload {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrgPayload {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct JoinPayload {
    pub invite_code: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangeRolePayload {
    pub role: MemberRole,
}

#[derive(Debug, Deserialize)]
pub struct SetOverridePayload {
    pub permission: Permission,
    pub allowed: bool,
}

/// Create an organization; the caller becomes its first admin.
#[instrument(skip_all, fields(slug = %payload.slug))]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(payload): Json<CreateOrgPayload>,
) -> Result<(StatusCode, Json<Organization>)> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("name must not be empty".to_string()));
    }
    let slug = Slug::parse(&payload.slug).map_err(|e| AppError::BadRequest(e.to_string()))?;

    let org = OrganizationRepository::new(state.pool())
        .create(name, &slug, payload.description.as_deref(), user.id)
        .await?;

    state.audit().record(
        org.id,
        Some(user.id),
        "org.created",
        "organization",
        org.id.as_i64(),
        json!({ "name": org.name, "slug": org.slug }),
    );
    info!(org_id = %org.id, "organization created");

    Ok((StatusCode::CREATED, Json(org)))
}

/// List active organizations.
#[instrument(skip_all)]
pub async fn list(
    State(state): State<AppState>,
    Query(page): Query<Pagination>,
) -> Result<Json<Vec<Organization>>> {
    let orgs = OrganizationRepository::new(state.pool())
        .list(page.limit(), page.offset())
        .await?;
    Ok(Json(orgs))
}

/// Organization detail.
#[instrument(skip_all, fields(slug = %slug))]
pub async fn show(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Organization>> {
    let org = load_org(&state, &slug).await?;
    Ok(Json(org))
}

/// Update organization name/description (`manage_org`).
#[instrument(skip_all, fields(slug = %slug))]
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(slug): Path<String>,
    Json(payload): Json<UpdateOrgPayload>,
) -> Result<Json<Organization>> {
    let org = load_org(&state, &slug).await?;
    require_permission(&state, &org, &user, Permission::ManageOrg).await?;

    let updated = OrganizationRepository::new(state.pool())
        .update(org.id, payload.name.as_deref(), payload.description.as_deref())
        .await?;

    state.audit().record(
        org.id,
        Some(user.id),
        "org.updated",
        "organization",
        org.id.as_i64(),
        json!({ "name": payload.name, "description": payload.description }),
    );

    Ok(Json(updated))
}

/// Soft-delete an organization (`manage_org`).
#[instrument(skip_all, fields(slug = %slug))]
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(slug): Path<String>,
) -> Result<StatusCode> {
    let org = load_org(&state, &slug).await?;
    require_permission(&state, &org, &user, Permission::ManageOrg).await?;

    OrganizationRepository::new(state.pool())
        .soft_delete(org.id)
        .await?;

    state.audit().record(
        org.id,
        Some(user.id),
        "org.deleted",
        "organization",
        org.id.as_i64(),
        json!({}),
    );
    info!(org_id = %org.id, "organization soft-deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// Join an organization with its invite code.
#[instrument(skip_all, fields(slug = %slug))]
pub async fn join(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(slug): Path<String>,
    Json(payload): Json<JoinPayload>,
) -> Result<(StatusCode, Json<OrganizationMember>)> {
    let org = load_org(&state, &slug).await?;

    let member = OrganizationRepository::new(state.pool())
        .join_by_invite(org.id, payload.invite_code.trim(), user.id)
        .await?;

    state.permissions().invalidate(org.id, user.id).await;
    state.audit().record(
        org.id,
        Some(user.id),
        "member.joined",
        "member",
        user.id.as_i64(),
        json!({}),
    );

    Ok((StatusCode::CREATED, Json(member)))
}

/// Leave an organization. The last admin cannot leave.
#[instrument(skip_all, fields(slug = %slug))]
pub async fn leave(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(slug): Path<String>,
) -> Result<StatusCode> {
    let org = load_org(&state, &slug).await?;

    OrganizationRepository::new(state.pool())
        .leave(org.id, user.id)
        .await?;

    state.permissions().invalidate(org.id, user.id).await;
    state.audit().record(
        org.id,
        Some(user.id),
        "member.left",
        "member",
        user.id.as_i64(),
        json!({}),
    );

    Ok(StatusCode::NO_CONTENT)
}

/// Rotate the invite code (`manage_org`).
#[instrument(skip_all, fields(slug = %slug))]
pub async fn rotate_invite(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(slug): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let org = load_org(&state, &slug).await?;
    require_permission(&state, &org, &user, Permission::ManageOrg).await?;

    let code = OrganizationRepository::new(state.pool())
        .rotate_invite_code(org.id)
        .await?;

    state.audit().record(
        org.id,
        Some(user.id),
        "org.invite_rotated",
        "organization",
        org.id.as_i64(),
        json!({}),
    );

    Ok(Json(json!({ "invite_code": code })))
}

/// List active members (`manage_org`).
#[instrument(skip_all, fields(slug = %slug))]
pub async fn members(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(slug): Path<String>,
) -> Result<Json<Vec<MemberWithUser>>> {
    let org = load_org(&state, &slug).await?;
    require_permission(&state, &org, &user, Permission::ManageOrg).await?;

    let members = OrganizationRepository::new(state.pool())
        .list_members(org.id)
        .await?;
    Ok(Json(members))
}

/// Remove a member (`manage_org`). Same last-admin rule as leaving.
#[instrument(skip_all, fields(slug = %slug, target = %user_id))]
pub async fn remove_member(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path((slug, user_id)): Path<(String, UserId)>,
) -> Result<StatusCode> {
    let org = load_org(&state, &slug).await?;
    require_permission(&state, &org, &user, Permission::ManageOrg).await?;

    OrganizationRepository::new(state.pool())
        .remove_member(org.id, user_id)
        .await?;

    state.permissions().invalidate(org.id, user_id).await;
    state.audit().record(
        org.id,
        Some(user.id),
        "member.removed",
        "member",
        user_id.as_i64(),
        json!({}),
    );

    Ok(StatusCode::NO_CONTENT)
}

/// Change a member's role (`manage_org`).
#[instrument(skip_all, fields(slug = %slug, target = %user_id))]
pub async fn change_role(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path((slug, user_id)): Path<(String, UserId)>,
    Json(payload): Json<ChangeRolePayload>,
) -> Result<Json<OrganizationMember>> {
    let org = load_org(&state, &slug).await?;
    require_permission(&state, &org, &user, Permission::ManageOrg).await?;

    let member = OrganizationRepository::new(state.pool())
        .change_role(org.id, user_id, payload.role)
        .await?;

    state.permissions().invalidate(org.id, user_id).await;
    state.audit().record(
        org.id,
        Some(user.id),
        "member.role_changed",
        "member",
        user_id.as_i64(),
        json!({ "role": payload.role }),
    );

    Ok(Json(member))
}

/// List a member's permission overrides (`manage_org`).
#[instrument(skip_all, fields(slug = %slug, target = %user_id))]
pub async fn list_overrides(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path((slug, user_id)): Path<(String, UserId)>,
) -> Result<Json<Vec<MemberPermission>>> {
    let org = load_org(&state, &slug).await?;
    require_permission(&state, &org, &user, Permission::ManageOrg).await?;

    let overrides = OrganizationRepository::new(state.pool())
        .list_permission_overrides(org.id, user_id)
        .await?;
    Ok(Json(overrides))
}

/// Set a permission override for a member (`manage_org`).
#[instrument(skip_all, fields(slug = %slug, target = %user_id))]
pub async fn set_override(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path((slug, user_id)): Path<(String, UserId)>,
    Json(payload): Json<SetOverridePayload>,
) -> Result<StatusCode> {
    let org = load_org(&state, &slug).await?;
    require_permission(&state, &org, &user, Permission::ManageOrg).await?;

    let repo = OrganizationRepository::new(state.pool());
    if repo.get_member(org.id, user_id).await?.is_none() {
        return Err(AppError::NotFound(format!("member {user_id}")));
    }
    repo.set_permission_override(org.id, user_id, payload.permission, payload.allowed)
        .await?;

    state.permissions().invalidate(org.id, user_id).await;
    state.audit().record(
        org.id,
        Some(user.id),
        "member.permission_set",
        "member",
        user_id.as_i64(),
        json!({ "permission": payload.permission.as_str(), "allowed": payload.allowed }),
    );

    Ok(StatusCode::NO_CONTENT)
}

/// Clear a permission override (`manage_org`).
#[instrument(skip_all, fields(slug = %slug, target = %user_id))]
pub async fn clear_override(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path((slug, user_id, permission)): Path<(String, UserId, String)>,
) -> Result<StatusCode> {
    let org = load_org(&state, &slug).await?;
    require_permission(&state, &org, &user, Permission::ManageOrg).await?;

    let permission: Permission = permission
        .parse()
        .map_err(|e: String| AppError::BadRequest(e))?;

    OrganizationRepository::new(state.pool())
        .clear_permission_override(org.id, user_id, permission)
        .await?;

    state.permissions().invalidate(org.id, user_id).await;
    state.audit().record(
        org.id,
        Some(user.id),
        "member.permission_cleared",
        "member",
        user_id.as_i64(),
        json!({ "permission": permission.as_str() }),
    );

    Ok(StatusCode::NO_CONTENT)
}
