//! Cart models.

use chrono::{DateTime, Utc};
use merchkins_core::{CartId, OrgId, UserId, VariantId};
use rust_decimal::Decimal;
use serde::Serialize;

/// A user's active cart within one organization's storefront.
///
/// `subtotal` and `item_count` are denormalized; every cart mutation
/// recomputes them from the line items in the same transaction.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Cart {
    pub id: CartId,
    pub user_id: UserId,
    pub org_id: OrgId,
    pub subtotal: Decimal,
    pub item_count: i32,
    pub updated_at: DateTime<Utc>,
}

/// A line item. `unit_price`, `product_title`, and `variant_name` are
/// snapshots taken when the item was added.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CartItem {
    pub cart_id: CartId,
    pub variant_id: VariantId,
    pub product_title: String,
    pub variant_name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
}

impl CartItem {
    /// Line total.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Cart with its line items, as returned to clients.
#[derive(Debug, Clone, Serialize)]
pub struct CartWithItems {
    #[serde(flatten)]
    pub cart: Cart,
    pub items: Vec<CartItem>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_line_total() {
        let item = CartItem {
            cart_id: CartId::new(1),
            variant_id: VariantId::new(2),
            product_title: "Widget".to_string(),
            variant_name: "Large".to_string(),
            unit_price: "4.50".parse().unwrap(),
            quantity: 3,
        };
        assert_eq!(item.line_total(), "13.50".parse::<Decimal>().unwrap());
    }
}
