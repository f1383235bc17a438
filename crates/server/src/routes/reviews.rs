//! Product review handlers.
//!
//! Creating a review requires a delivered order containing the product.
//! Authors manage their own reviews; `manage_products` holders may remove
//! any review in their storefront.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use merchkins_core::{Permission, ReviewId, Slug};

use crate::db::products::ProductRepository;
use crate::db::reviews::ReviewRepository;
use crate::error::{AppError, Result};
use crate::middleware::auth::RequireAuth;
use crate::models::catalog::Product;
use crate::models::review::Review;
use crate::state::AppState;

use super::{Pagination, load_org, require_permission};

#[derive(Debug, Deserialize)]
pub struct CreateReviewPayload {
    pub rating: i16,
    pub body: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateReviewPayload {
    pub rating: i16,
    pub body: Option<String>,
}

async fn load_product(state: &AppState, slug: &str, product_slug: &str) -> Result<Product> {
    let org = load_org(state, slug).await?;
    let product_slug =
        Slug::parse(product_slug).map_err(|e| AppError::BadRequest(e.to_string()))?;
    ProductRepository::new(state.pool())
        .get_by_slug(org.id, &product_slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {product_slug}")))
}

/// List a product's reviews, newest first.
#[instrument(skip_all, fields(slug = %slug, product = %product_slug))]
pub async fn list(
    State(state): State<AppState>,
    Path((slug, product_slug)): Path<(String, String)>,
    Query(page): Query<Pagination>,
) -> Result<Json<Vec<Review>>> {
    let product = load_product(&state, &slug, &product_slug).await?;

    let reviews = ReviewRepository::new(state.pool())
        .list_for_product(product.id, page.limit(), page.offset())
        .await?;
    Ok(Json(reviews))
}

/// Review a product the caller has received.
#[instrument(skip_all, fields(slug = %slug, product = %product_slug))]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path((slug, product_slug)): Path<(String, String)>,
    Json(payload): Json<CreateReviewPayload>,
) -> Result<(StatusCode, Json<Review>)> {
    let product = load_product(&state, &slug, &product_slug).await?;

    let review = ReviewRepository::new(state.pool())
        .create(user.id, product.id, payload.rating, payload.body.as_deref())
        .await?;

    state.audit().record(
        product.org_id,
        Some(user.id),
        "review.created",
        "review",
        review.id.as_i64(),
        json!({ "product_id": product.id, "rating": payload.rating }),
    );

    Ok((StatusCode::CREATED, Json(review)))
}

/// Edit the caller's own review.
#[instrument(skip_all, fields(slug = %slug, review_id = %id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path((slug, id)): Path<(String, ReviewId)>,
    Json(payload): Json<UpdateReviewPayload>,
) -> Result<Json<Review>> {
    let org = load_org(&state, &slug).await?;

    let review = ReviewRepository::new(state.pool())
        .update(user.id, id, payload.rating, payload.body.as_deref())
        .await?;

    state.audit().record(
        org.id,
        Some(user.id),
        "review.updated",
        "review",
        id.as_i64(),
        json!({ "rating": payload.rating }),
    );

    Ok(Json(review))
}

/// Delete a review: the author removes their own, `manage_products`
/// holders moderate any.
#[instrument(skip_all, fields(slug = %slug, review_id = %id))]
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path((slug, id)): Path<(String, ReviewId)>,
) -> Result<StatusCode> {
    let org = load_org(&state, &slug).await?;

    let moderator = user.is_platform_admin
        || state
            .permissions()
            .has(org.id, user.id, Permission::ManageProducts)
            .await?;
    let require_owner = if moderator { None } else { Some(user.id) };

    ReviewRepository::new(state.pool())
        .delete(id, require_owner)
        .await?;

    state.audit().record(
        org.id,
        Some(user.id),
        "review.deleted",
        "review",
        id.as_i64(),
        json!({ "moderated": moderator }),
    );

    Ok(StatusCode::NO_CONTENT)
}
