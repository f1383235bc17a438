//! Refund request handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};

use merchkins_core::{OrderId, Permission, RefundRequestId};

use crate::db::orders::OrderRepository;
use crate::db::refunds::RefundRepository;
use crate::error::{AppError, Result};
use crate::middleware::auth::RequireAuth;
use crate::models::refund::RefundRequest;
use crate::services::email::EmailService;
use crate::state::AppState;

use super::{Pagination, load_org, require_permission};

#[derive(Debug, Deserialize)]
pub struct RequestRefundPayload {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct DecidePayload {
    pub approve: bool,
}

/// Open a refund request against one of the caller's paid orders.
#[instrument(skip_all, fields(order_id = %order_id))]
pub async fn request(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(order_id): Path<OrderId>,
    Json(payload): Json<RequestRefundPayload>,
) -> Result<(StatusCode, Json<RefundRequest>)> {
    let reason = payload.reason.trim();
    if reason.is_empty() {
        return Err(AppError::BadRequest("reason must not be empty".to_string()));
    }

    let request = RefundRepository::new(state.pool())
        .create(user.id, order_id, reason)
        .await?;

    state.audit().record(
        request.org_id,
        Some(user.id),
        "refund.requested",
        "refund_request",
        request.id.as_i64(),
        json!({ "order_id": order_id }),
    );
    info!(refund_id = %request.id, "refund requested");

    Ok((StatusCode::CREATED, Json(request)))
}

/// The caller's refund requests.
#[instrument(skip_all)]
pub async fn list_mine(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<RefundRequest>>> {
    let requests = RefundRepository::new(state.pool())
        .list_for_user(user.id)
        .await?;
    Ok(Json(requests))
}

/// An organization's refund requests, open ones first (`manage_refunds`).
#[instrument(skip_all, fields(slug = %slug))]
pub async fn list_for_org(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(slug): Path<String>,
    Query(page): Query<Pagination>,
) -> Result<Json<Vec<RefundRequest>>> {
    let org = load_org(&state, &slug).await?;
    require_permission(&state, &org, &user, Permission::ManageRefunds).await?;

    let requests = RefundRepository::new(state.pool())
        .list_for_org(org.id, page.limit(), page.offset())
        .await?;
    Ok(Json(requests))
}

/// Approve or reject a refund request (`manage_refunds`).
#[instrument(skip_all, fields(slug = %slug, refund_id = %id))]
pub async fn decide(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path((slug, id)): Path<(String, RefundRequestId)>,
    Json(payload): Json<DecidePayload>,
) -> Result<Json<RefundRequest>> {
    let org = load_org(&state, &slug).await?;
    require_permission(&state, &org, &user, Permission::ManageRefunds).await?;

    let request = RefundRepository::new(state.pool())
        .decide(org.id, id, payload.approve, user.id)
        .await?;

    let decision = if payload.approve { "approved" } else { "rejected" };
    state.audit().record(
        org.id,
        Some(user.id),
        "refund.decided",
        "refund_request",
        id.as_i64(),
        json!({ "decision": decision }),
    );
    info!(refund_id = %id, decision, "refund decided");

    notify_customer(&state, &org.name, &request, decision).await;

    Ok(Json(request))
}

/// Settle an approved refund (`manage_refunds`): the payment flips to
/// refunded, the order is cancelled and its lines restocked.
#[instrument(skip_all, fields(slug = %slug, refund_id = %id))]
pub async fn settle(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path((slug, id)): Path<(String, RefundRequestId)>,
) -> Result<Json<RefundRequest>> {
    let org = load_org(&state, &slug).await?;
    require_permission(&state, &org, &user, Permission::ManageRefunds).await?;

    let request = RefundRepository::new(state.pool())
        .mark_refunded(org.id, id)
        .await?;

    state.audit().record(
        org.id,
        Some(user.id),
        "refund.settled",
        "refund_request",
        id.as_i64(),
        json!({ "order_id": request.order_id }),
    );
    info!(refund_id = %id, "refund settled");

    notify_customer(&state, &org.name, &request, "refunded").await;

    Ok(Json(request))
}

/// Best-effort refund decision email to the requesting customer.
async fn notify_customer(
    state: &AppState,
    org_name: &str,
    request: &RefundRequest,
    decision: &str,
) {
    let Some(email) = state.email() else {
        return;
    };

    let order_number = match OrderRepository::new(state.pool())
        .get_for_org(request.org_id, request.order_id)
        .await
    {
        Ok(order) => order.order.order_number,
        Err(_) => return,
    };
    let Ok(Some(customer)) = crate::db::users::UserRepository::new(state.pool())
        .get_by_id(request.user_id)
        .await
    else {
        return;
    };

    let email = email.clone();
    let to = customer.email.as_str().to_string();
    let name = customer.display_name;
    let org_name = org_name.to_string();
    let decision = decision.to_string();
    EmailService::spawn_send(async move {
        email
            .send_refund_decision(&to, &name, &org_name, order_number, &decision)
            .await
    });
}
