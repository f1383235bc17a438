//! Cart handlers.
//!
//! Carts are per user per organization and live behind authentication.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use tracing::instrument;

use merchkins_core::VariantId;

use crate::db::carts::CartRepository;
use crate::error::Result;
use crate::middleware::auth::RequireAuth;
use crate::models::cart::{Cart, CartWithItems};
use crate::state::AppState;

use super::load_org;

#[derive(Debug, Deserialize)]
pub struct AddItemPayload {
    pub variant_id: VariantId,
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
pub struct SetQuantityPayload {
    pub quantity: i32,
}

/// The caller's cart for this storefront, created on first use.
#[instrument(skip_all, fields(slug = %slug))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(slug): Path<String>,
) -> Result<Json<CartWithItems>> {
    let org = load_org(&state, &slug).await?;

    let repo = CartRepository::new(state.pool());
    let cart = repo.get_or_create(user.id, org.id).await?;
    let cart = repo.get_with_items(cart.id).await?;

    Ok(Json(cart))
}

/// Add a variant to the cart.
#[instrument(skip_all, fields(slug = %slug, variant_id = %payload.variant_id))]
pub async fn add_item(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(slug): Path<String>,
    Json(payload): Json<AddItemPayload>,
) -> Result<Json<Cart>> {
    let org = load_org(&state, &slug).await?;

    let repo = CartRepository::new(state.pool());
    let cart = repo.get_or_create(user.id, org.id).await?;
    let cart = repo
        .add_item(cart.id, org.id, payload.variant_id, payload.quantity)
        .await?;

    Ok(Json(cart))
}

/// Set a line's quantity; zero removes the line.
#[instrument(skip_all, fields(slug = %slug, variant_id = %variant_id))]
pub async fn set_quantity(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path((slug, variant_id)): Path<(String, VariantId)>,
    Json(payload): Json<SetQuantityPayload>,
) -> Result<Json<Cart>> {
    let org = load_org(&state, &slug).await?;

    let repo = CartRepository::new(state.pool());
    let cart = repo.get_or_create(user.id, org.id).await?;
    let cart = repo
        .set_quantity(cart.id, variant_id, payload.quantity)
        .await?;

    Ok(Json(cart))
}

/// Clear the cart.
#[instrument(skip_all, fields(slug = %slug))]
pub async fn clear(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(slug): Path<String>,
) -> Result<Json<Cart>> {
    let org = load_org(&state, &slug).await?;

    let repo = CartRepository::new(state.pool());
    let cart = repo.get_or_create(user.id, org.id).await?;
    let cart = repo.clear(cart.id).await?;

    Ok(Json(cart))
}
