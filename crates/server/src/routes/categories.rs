//! Category tree handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use merchkins_core::{CategoryId, Permission};

use crate::db::categories::CategoryRepository;
use crate::error::{AppError, Result};
use crate::middleware::auth::RequireAuth;
use crate::models::catalog::Category;
use crate::state::AppState;

use super::{load_org, require_permission};

#[derive(Debug, Deserialize)]
pub struct CreateCategoryPayload {
    pub name: String,
    pub parent_id: Option<CategoryId>,
}

/// Rename and/or move. `parent_id` is double-optional: absent leaves the
/// parent alone, `null` moves to the root.
#[derive(Debug, Deserialize)]
pub struct UpdateCategoryPayload {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "super::double_option")]
    pub parent_id: Option<Option<CategoryId>>,
}

/// List an organization's categories, parents before children.
#[instrument(skip_all, fields(slug = %slug))]
pub async fn list(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Vec<Category>>> {
    let org = load_org(&state, &slug).await?;
    let categories = CategoryRepository::new(state.pool()).list(org.id).await?;
    Ok(Json(categories))
}

/// Create a category (`manage_products`).
#[instrument(skip_all, fields(slug = %slug))]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(slug): Path<String>,
    Json(payload): Json<CreateCategoryPayload>,
) -> Result<(StatusCode, Json<Category>)> {
    let org = load_org(&state, &slug).await?;
    require_permission(&state, &org, &user, Permission::ManageProducts).await?;

    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("name must not be empty".to_string()));
    }

    let category = CategoryRepository::new(state.pool())
        .create(org.id, payload.parent_id, name)
        .await?;

    state.audit().record(
        org.id,
        Some(user.id),
        "category.created",
        "category",
        category.id.as_i64(),
        json!({ "name": category.name }),
    );

    Ok((StatusCode::CREATED, Json(category)))
}

/// Rename and/or move a category (`manage_products`).
#[instrument(skip_all, fields(slug = %slug, category_id = %id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path((slug, id)): Path<(String, CategoryId)>,
    Json(payload): Json<UpdateCategoryPayload>,
) -> Result<Json<Category>> {
    let org = load_org(&state, &slug).await?;
    require_permission(&state, &org, &user, Permission::ManageProducts).await?;

    let repo = CategoryRepository::new(state.pool());

    let mut category = None;
    if let Some(new_parent) = payload.parent_id {
        category = Some(repo.move_category(org.id, id, new_parent).await?);
    }
    if let Some(name) = payload.name.as_deref() {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::BadRequest("name must not be empty".to_string()));
        }
        category = Some(repo.rename(org.id, id, name).await?);
    }

    let category = category.ok_or_else(|| {
        AppError::BadRequest("nothing to update: provide name and/or parent_id".to_string())
    })?;

    state.audit().record(
        org.id,
        Some(user.id),
        "category.updated",
        "category",
        id.as_i64(),
        json!({ "name": payload.name }),
    );

    Ok(Json(category))
}

/// Delete an empty leaf category (`manage_products`).
#[instrument(skip_all, fields(slug = %slug, category_id = %id))]
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path((slug, id)): Path<(String, CategoryId)>,
) -> Result<StatusCode> {
    let org = load_org(&state, &slug).await?;
    require_permission(&state, &org, &user, Permission::ManageProducts).await?;

    CategoryRepository::new(state.pool()).delete(org.id, id).await?;

    state.audit().record(
        org.id,
        Some(user.id),
        "category.deleted",
        "category",
        id.as_i64(),
        json!({}),
    );

    Ok(StatusCode::NO_CONTENT)
}
