//! Payment record model.

use chrono::{DateTime, Utc};
use merchkins_core::{OrderId, PaymentId, PaymentMethod, PaymentStatus};
use rust_decimal::Decimal;
use serde::Serialize;

/// A payment recorded against an order.
///
/// No gateway integration: payments are recorded facts. At most one
/// succeeded payment exists per order (partial unique index).
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Payment {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
}
