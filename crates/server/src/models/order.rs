//! Order models.

use chrono::{DateTime, Utc};
use merchkins_core::{OrderId, OrderStatus, OrgId, UserId, VariantId};
use rust_decimal::Decimal;
use serde::Serialize;

/// A placed order.
///
/// `order_number` is sequential per organization, assigned inside the
/// checkout transaction. `total = subtotal - discount` always holds.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Order {
    pub id: OrderId,
    pub org_id: OrgId,
    pub user_id: UserId,
    pub order_number: i64,
    pub status: OrderStatus,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    pub voucher_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An immutable line snapshot copied from the cart at checkout.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderItem {
    pub order_id: OrderId,
    pub variant_id: VariantId,
    pub product_title: String,
    pub variant_name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
}

/// Order with its line items.
#[derive(Debug, Clone, Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}
