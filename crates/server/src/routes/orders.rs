//! Checkout and order handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};

use merchkins_core::{OrderId, OrderStatus, Permission};

use crate::db::orders::OrderRepository;
use crate::error::Result;
use crate::middleware::auth::RequireAuth;
use crate::models::order::{Order, OrderWithItems};
use crate::services::email::EmailService;
use crate::state::AppState;

use super::{Pagination, load_org, require_permission};

#[derive(Debug, Deserialize)]
pub struct CheckoutPayload {
    pub voucher_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusPayload {
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<OrderStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Place an order from the caller's cart.
#[instrument(skip_all, fields(slug = %slug))]
pub async fn checkout(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(slug): Path<String>,
    Json(payload): Json<CheckoutPayload>,
) -> Result<(StatusCode, Json<OrderWithItems>)> {
    let org = load_org(&state, &slug).await?;

    let placed = OrderRepository::new(state.pool())
        .checkout(user.id, org.id, payload.voucher_code.as_deref())
        .await?;

    state.audit().record(
        org.id,
        Some(user.id),
        "order.placed",
        "order",
        placed.order.id.as_i64(),
        json!({
            "order_number": placed.order.order_number,
            "total": placed.order.total,
            "voucher_code": placed.order.voucher_code,
        }),
    );
    info!(
        order_id = %placed.order.id,
        order_number = placed.order.order_number,
        "order placed"
    );

    if let Some(email) = state.email() {
        let email = email.clone();
        let to = user.email.as_str().to_string();
        let name = user.display_name.clone();
        let org_name = org.name.clone();
        let order_number = placed.order.order_number;
        let total = placed.order.total.to_string();
        EmailService::spawn_send(async move {
            email
                .send_order_confirmation(&to, &name, &org_name, order_number, &total)
                .await
        });
    }

    Ok((StatusCode::CREATED, Json(placed)))
}

/// The caller's order history across storefronts.
#[instrument(skip_all)]
pub async fn list_mine(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Query(page): Query<Pagination>,
) -> Result<Json<Vec<Order>>> {
    let orders = OrderRepository::new(state.pool())
        .list_for_user(user.id, page.limit(), page.offset())
        .await?;
    Ok(Json(orders))
}

/// One of the caller's own orders, with lines.
#[instrument(skip_all, fields(order_id = %id))]
pub async fn get_mine(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderWithItems>> {
    let order = OrderRepository::new(state.pool())
        .get_for_user(user.id, id)
        .await?;
    Ok(Json(order))
}

/// An organization's orders (`view_reports`).
#[instrument(skip_all, fields(slug = %slug))]
pub async fn list_for_org(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(slug): Path<String>,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<Vec<Order>>> {
    let org = load_org(&state, &slug).await?;
    require_permission(&state, &org, &user, Permission::ViewReports).await?;

    let page = Pagination::from_parts(query.limit, query.offset);
    let orders = OrderRepository::new(state.pool())
        .list_for_org(org.id, query.status, page.limit(), page.offset())
        .await?;
    Ok(Json(orders))
}

/// An organization's order detail (`view_reports`).
#[instrument(skip_all, fields(slug = %slug, order_id = %id))]
pub async fn get_for_org(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path((slug, id)): Path<(String, OrderId)>,
) -> Result<Json<OrderWithItems>> {
    let org = load_org(&state, &slug).await?;
    require_permission(&state, &org, &user, Permission::ViewReports).await?;

    let order = OrderRepository::new(state.pool())
        .get_for_org(org.id, id)
        .await?;
    Ok(Json(order))
}

/// Advance an order's status (`manage_orders`).
///
/// Cancelling restocks the order's lines. The customer is notified by
/// email, best-effort.
#[instrument(skip_all, fields(slug = %slug, order_id = %id))]
pub async fn update_status(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path((slug, id)): Path<(String, OrderId)>,
    Json(payload): Json<UpdateStatusPayload>,
) -> Result<Json<Order>> {
    let org = load_org(&state, &slug).await?;
    require_permission(&state, &org, &user, Permission::ManageOrders).await?;

    let order = OrderRepository::new(state.pool())
        .update_status(org.id, id, payload.status)
        .await?;

    state.audit().record(
        org.id,
        Some(user.id),
        "order.status_changed",
        "order",
        id.as_i64(),
        json!({ "status": payload.status }),
    );
    info!(order_id = %id, status = %payload.status, "order status changed");

    if let Some(email) = state.email()
        && let Ok(Some(customer)) = crate::db::users::UserRepository::new(state.pool())
            .get_by_id(order.user_id)
            .await
    {
        let email = email.clone();
        let to = customer.email.as_str().to_string();
        let name = customer.display_name;
        let org_name = org.name.clone();
        let order_number = order.order_number;
        let status = payload.status.to_string();
        EmailService::spawn_send(async move {
            email
                .send_order_status(&to, &name, &org_name, order_number, &status)
                .await
        });
    }

    Ok(Json(order))
}
