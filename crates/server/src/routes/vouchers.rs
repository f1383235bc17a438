//! Voucher administration handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use merchkins_core::{Permission, VoucherId};

use crate::db::vouchers::VoucherRepository;
use crate::error::{AppError, Result};
use crate::middleware::auth::RequireAuth;
use crate::models::voucher::Voucher;
use crate::state::AppState;

use super::{load_org, require_permission};

#[derive(Debug, Deserialize)]
pub struct CreateVoucherPayload {
    pub code: String,
    pub discount_percent: Option<i16>,
    pub discount_fixed: Option<Decimal>,
    #[serde(default)]
    pub min_subtotal: Decimal,
    pub usage_limit: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct SetActivePayload {
    pub is_active: bool,
}

/// List an organization's vouchers (`manage_orders`).
#[instrument(skip_all, fields(slug = %slug))]
pub async fn list(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(slug): Path<String>,
) -> Result<Json<Vec<Voucher>>> {
    let org = load_org(&state, &slug).await?;
    require_permission(&state, &org, &user, Permission::ManageOrders).await?;

    let vouchers = VoucherRepository::new(state.pool()).list(org.id).await?;
    Ok(Json(vouchers))
}

/// Create a voucher (`manage_orders`).
#[instrument(skip_all, fields(slug = %slug, code = %payload.code))]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(slug): Path<String>,
    Json(payload): Json<CreateVoucherPayload>,
) -> Result<(StatusCode, Json<Voucher>)> {
    let org = load_org(&state, &slug).await?;
    require_permission(&state, &org, &user, Permission::ManageOrders).await?;

    let code = payload.code.trim();
    if code.is_empty() {
        return Err(AppError::BadRequest("code must not be empty".to_string()));
    }

    let voucher = VoucherRepository::new(state.pool())
        .create(
            org.id,
            code,
            payload.discount_percent,
            payload.discount_fixed,
            payload.min_subtotal,
            payload.usage_limit,
            payload.expires_at,
        )
        .await?;

    state.audit().record(
        org.id,
        Some(user.id),
        "voucher.created",
        "voucher",
        voucher.id.as_i64(),
        json!({ "code": voucher.code }),
    );

    Ok((StatusCode::CREATED, Json(voucher)))
}

/// Enable or disable a voucher (`manage_orders`).
#[instrument(skip_all, fields(slug = %slug, voucher_id = %id))]
pub async fn set_active(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path((slug, id)): Path<(String, VoucherId)>,
    Json(payload): Json<SetActivePayload>,
) -> Result<Json<Voucher>> {
    let org = load_org(&state, &slug).await?;
    require_permission(&state, &org, &user, Permission::ManageOrders).await?;

    let voucher = VoucherRepository::new(state.pool())
        .set_active(org.id, id, payload.is_active)
        .await?;

    state.audit().record(
        org.id,
        Some(user.id),
        "voucher.toggled",
        "voucher",
        id.as_i64(),
        json!({ "is_active": payload.is_active }),
    );

    Ok(Json(voucher))
}
