//! Product and variant handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::instrument;

use merchkins_core::{CategoryId, CurrencyCode, Permission, Slug, VariantId};

use crate::db::products::ProductRepository;
use crate::error::{AppError, Result};
use crate::middleware::auth::{OptionalAuth, RequireAuth};
use crate::models::catalog::{Product, ProductVariant};
use crate::state::AppState;

use super::{Pagination, load_org, require_permission};

#[derive(Debug, Deserialize)]
pub struct CreateProductPayload {
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub category_id: Option<CategoryId>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProductPayload {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "super::double_option")]
    pub category_id: Option<Option<CategoryId>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub include_inactive: bool,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ListQuery {
    fn page(&self) -> Pagination {
        Pagination::from_parts(self.limit, self.offset)
    }
}

#[derive(Debug, Deserialize)]
pub struct AddVariantPayload {
    pub name: String,
    pub price: Decimal,
    pub currency: String,
    pub stock: i32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateVariantPayload {
    pub price: Option<Decimal>,
    pub stock: Option<i32>,
    pub is_active: Option<bool>,
}

/// Reject negative prices and stock before they reach the database.
fn validate_variant_numbers(price: Option<Decimal>, stock: Option<i32>) -> Result<()> {
    if price.is_some_and(|p| p < Decimal::ZERO) {
        return Err(AppError::BadRequest("price must not be negative".to_string()));
    }
    if stock.is_some_and(|s| s < 0) {
        return Err(AppError::BadRequest("stock must not be negative".to_string()));
    }
    Ok(())
}

/// Product detail with its variants.
#[derive(Debug, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    pub variants: Vec<ProductVariant>,
}

/// List a storefront's products.
///
/// `include_inactive` requires `manage_products`; anonymous callers always
/// see the live listing only.
#[instrument(skip_all, fields(slug = %slug))]
pub async fn list(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    Path(slug): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Product>>> {
    let org = load_org(&state, &slug).await?;

    let include_inactive = if query.include_inactive {
        let user = user.ok_or_else(|| {
            AppError::Unauthorized("login required to view inactive products".to_string())
        })?;
        require_permission(&state, &org, &user, Permission::ManageProducts).await?;
        true
    } else {
        false
    };

    let products = ProductRepository::new(state.pool())
        .list(
            org.id,
            query.category_id,
            include_inactive,
            query.page().limit(),
            query.page().offset(),
        )
        .await?;

    Ok(Json(products))
}

/// Create a product (`manage_products`).
#[instrument(skip_all, fields(slug = %slug))]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(slug): Path<String>,
    Json(payload): Json<CreateProductPayload>,
) -> Result<(StatusCode, Json<Product>)> {
    let org = load_org(&state, &slug).await?;
    require_permission(&state, &org, &user, Permission::ManageProducts).await?;

    let title = payload.title.trim();
    if title.is_empty() {
        return Err(AppError::BadRequest("title must not be empty".to_string()));
    }
    let product_slug =
        Slug::parse(&payload.slug).map_err(|e| AppError::BadRequest(e.to_string()))?;

    let product = ProductRepository::new(state.pool())
        .create(
            org.id,
            &org.name,
            payload.category_id,
            title,
            &product_slug,
            payload.description.as_deref(),
        )
        .await?;

    state.audit().record(
        org.id,
        Some(user.id),
        "product.created",
        "product",
        product.id.as_i64(),
        json!({ "title": product.title, "slug": product.slug }),
    );

    Ok((StatusCode::CREATED, Json(product)))
}

/// Product detail with variants.
#[instrument(skip_all, fields(slug = %slug, product = %product_slug))]
pub async fn show(
    State(state): State<AppState>,
    Path((slug, product_slug)): Path<(String, String)>,
) -> Result<Json<ProductDetail>> {
    let org = load_org(&state, &slug).await?;
    let product_slug =
        Slug::parse(&product_slug).map_err(|e| AppError::BadRequest(e.to_string()))?;

    let repo = ProductRepository::new(state.pool());
    let product = repo
        .get_by_slug(org.id, &product_slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {product_slug}")))?;
    let variants = repo.list_variants(product.id).await?;

    Ok(Json(ProductDetail { product, variants }))
}

/// Update a product (`manage_products`).
#[instrument(skip_all, fields(slug = %slug, product = %product_slug))]
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path((slug, product_slug)): Path<(String, String)>,
    Json(payload): Json<UpdateProductPayload>,
) -> Result<Json<Product>> {
    let org = load_org(&state, &slug).await?;
    require_permission(&state, &org, &user, Permission::ManageProducts).await?;
    let product_slug =
        Slug::parse(&product_slug).map_err(|e| AppError::BadRequest(e.to_string()))?;

    let repo = ProductRepository::new(state.pool());
    let product = repo
        .get_by_slug(org.id, &product_slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {product_slug}")))?;

    let updated = repo
        .update(
            product.id,
            payload.title.as_deref(),
            payload.description.as_deref(),
            payload.category_id,
            payload.is_active,
        )
        .await?;

    state.audit().record(
        org.id,
        Some(user.id),
        "product.updated",
        "product",
        product.id.as_i64(),
        json!({ "title": payload.title, "is_active": payload.is_active }),
    );

    Ok(Json(updated))
}

/// Soft-delete a product (`manage_products`).
#[instrument(skip_all, fields(slug = %slug, product = %product_slug))]
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path((slug, product_slug)): Path<(String, String)>,
) -> Result<StatusCode> {
    let org = load_org(&state, &slug).await?;
    require_permission(&state, &org, &user, Permission::ManageProducts).await?;
    let product_slug =
        Slug::parse(&product_slug).map_err(|e| AppError::BadRequest(e.to_string()))?;

    let repo = ProductRepository::new(state.pool());
    let product = repo
        .get_by_slug(org.id, &product_slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {product_slug}")))?;
    repo.soft_delete(product.id).await?;

    state.audit().record(
        org.id,
        Some(user.id),
        "product.deleted",
        "product",
        product.id.as_i64(),
        json!({}),
    );

    Ok(StatusCode::NO_CONTENT)
}

/// Add a variant to a product (`manage_products`).
#[instrument(skip_all, fields(slug = %slug, product = %product_slug))]
pub async fn add_variant(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path((slug, product_slug)): Path<(String, String)>,
    Json(payload): Json<AddVariantPayload>,
) -> Result<(StatusCode, Json<ProductVariant>)> {
    let org = load_org(&state, &slug).await?;
    require_permission(&state, &org, &user, Permission::ManageProducts).await?;
    let product_slug =
        Slug::parse(&product_slug).map_err(|e| AppError::BadRequest(e.to_string()))?;

    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("name must not be empty".to_string()));
    }
    let currency: CurrencyCode = payload.currency.parse().map_err(AppError::BadRequest)?;
    validate_variant_numbers(Some(payload.price), Some(payload.stock))?;

    let repo = ProductRepository::new(state.pool());
    let product = repo
        .get_by_slug(org.id, &product_slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {product_slug}")))?;

    let variant = repo
        .add_variant(product.id, name, payload.price, currency.code(), payload.stock)
        .await?;

    state.audit().record(
        org.id,
        Some(user.id),
        "variant.created",
        "variant",
        variant.id.as_i64(),
        json!({ "name": variant.name, "product_id": product.id }),
    );

    Ok((StatusCode::CREATED, Json(variant)))
}

/// Update a variant's price, stock, or active flag (`manage_products`).
#[instrument(skip_all, fields(slug = %slug, variant_id = %id))]
pub async fn update_variant(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path((slug, id)): Path<(String, VariantId)>,
    Json(payload): Json<UpdateVariantPayload>,
) -> Result<Json<ProductVariant>> {
    let org = load_org(&state, &slug).await?;
    require_permission(&state, &org, &user, Permission::ManageProducts).await?;
    validate_variant_numbers(payload.price, payload.stock)?;

    let repo = ProductRepository::new(state.pool());

    // Scope check: the variant's product must belong to this org.
    let variant = repo
        .get_variant(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("variant {id}")))?;
    let product = repo
        .get_by_id(variant.product_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("variant {id}")))?;
    if product.org_id != org.id {
        return Err(AppError::NotFound(format!("variant {id}")));
    }

    let updated = repo
        .update_variant(id, payload.price, payload.stock, payload.is_active)
        .await?;

    state.audit().record(
        org.id,
        Some(user.id),
        "variant.updated",
        "variant",
        id.as_i64(),
        json!({ "price": payload.price, "stock": payload.stock, "is_active": payload.is_active }),
    );

    Ok(Json(updated))
}
