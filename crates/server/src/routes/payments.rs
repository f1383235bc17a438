//! Payment record handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};

use merchkins_core::{OrderId, PaymentMethod, PaymentStatus, Permission};

use crate::db::orders::OrderRepository;
use crate::db::payments::PaymentRepository;
use crate::error::Result;
use crate::middleware::auth::RequireAuth;
use crate::models::payment::Payment;
use crate::state::AppState;

use super::{load_org, require_permission};

#[derive(Debug, Deserialize)]
pub struct RecordPaymentPayload {
    pub method: PaymentMethod,
    pub amount: Decimal,
    pub status: PaymentStatus,
    pub reference: Option<String>,
}

/// Record a payment attempt against a pending order (`manage_orders`).
///
/// A succeeded payment moves the order to processing.
#[instrument(skip_all, fields(slug = %slug, order_id = %order_id))]
pub async fn record(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path((slug, order_id)): Path<(String, OrderId)>,
    Json(payload): Json<RecordPaymentPayload>,
) -> Result<(StatusCode, Json<Payment>)> {
    let org = load_org(&state, &slug).await?;
    require_permission(&state, &org, &user, Permission::ManageOrders).await?;

    let payment = PaymentRepository::new(state.pool())
        .record(
            org.id,
            order_id,
            payload.method,
            payload.amount,
            payload.status,
            payload.reference.as_deref(),
        )
        .await?;

    state.audit().record(
        org.id,
        Some(user.id),
        "payment.recorded",
        "payment",
        payment.id.as_i64(),
        json!({
            "order_id": order_id,
            "method": payload.method,
            "status": payload.status,
            "amount": payload.amount,
        }),
    );
    info!(payment_id = %payment.id, status = %payload.status, "payment recorded");

    Ok((StatusCode::CREATED, Json(payment)))
}

/// List an order's payment attempts (`view_reports`).
#[instrument(skip_all, fields(slug = %slug, order_id = %order_id))]
pub async fn list(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path((slug, order_id)): Path<(String, OrderId)>,
) -> Result<Json<Vec<Payment>>> {
    let org = load_org(&state, &slug).await?;
    require_permission(&state, &org, &user, Permission::ViewReports).await?;

    // Scope the order to this organization before listing.
    OrderRepository::new(state.pool())
        .get_for_org(org.id, order_id)
        .await?;

    let payments = PaymentRepository::new(state.pool())
        .list_for_order(order_id)
        .await?;
    Ok(Json(payments))
}
