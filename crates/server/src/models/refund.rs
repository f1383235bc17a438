//! Refund request model.

use chrono::{DateTime, Utc};
use merchkins_core::{OrderId, OrgId, RefundRequestId, RefundStatus, UserId};
use serde::Serialize;

/// A customer's request to refund a paid order.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct RefundRequest {
    pub id: RefundRequestId,
    pub order_id: OrderId,
    pub org_id: OrgId,
    pub user_id: UserId,
    pub reason: String,
    pub status: RefundStatus,
    pub decided_by: Option<UserId>,
    pub decided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
