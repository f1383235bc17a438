//! Order repository.
//!
//! Checkout is a single transaction: it locks the cart, decrements variant
//! stock, redeems the voucher, draws the per-organization order number and
//! snapshots the lines. Either all of it lands or none of it does.

use chrono::Utc;
use merchkins_core::{OrderId, OrderStatus, OrgId, UserId};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};

use super::RepositoryError;
use crate::models::cart::CartItem;
use crate::models::order::{Order, OrderItem, OrderWithItems};
use crate::models::voucher::Voucher;

const SELECT_ORDER: &str = r"
    SELECT id, org_id, user_id, order_number, status, subtotal, discount,
           total, voucher_code, created_at, updated_at
    FROM orders
";

/// Repository for orders.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Place an order from the user's cart in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Invariant` for an empty cart, insufficient
    /// stock, or a voucher that cannot be redeemed;
    /// `RepositoryError::NotFound` if the user has no cart for this org.
    pub async fn checkout(
        &self,
        user_id: UserId,
        org_id: OrgId,
        voucher_code: Option<&str>,
    ) -> Result<OrderWithItems, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let cart_id = sqlx::query_scalar::<_, merchkins_core::CartId>(
            "SELECT id FROM carts WHERE user_id = $1 AND org_id = $2 FOR UPDATE",
        )
        .bind(user_id)
        .bind(org_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        let lines = sqlx::query_as::<_, CartItem>(
            r"
            SELECT cart_id, variant_id, product_title, variant_name,
                   unit_price, quantity
            FROM cart_items
            WHERE cart_id = $1
            ORDER BY variant_id
            ",
        )
        .bind(cart_id)
        .fetch_all(&mut *tx)
        .await?;

        if lines.is_empty() {
            return Err(RepositoryError::Invariant("cart is empty".to_string()));
        }

        // Decrement stock line by line; a failed decrement means another
        // checkout got there first.
        for line in &lines {
            let result = sqlx::query(
                r"
                UPDATE product_variants
                SET stock = stock - $1
                WHERE id = $2 AND is_active AND stock >= $1
                ",
            )
            .bind(line.quantity)
            .bind(line.variant_id)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                return Err(RepositoryError::Invariant(format!(
                    "insufficient stock for {} ({})",
                    line.product_title, line.variant_name
                )));
            }
        }

        let subtotal: Decimal = lines.iter().map(CartItem::line_total).sum();

        let (discount, redeemed_code) = match voucher_code {
            None => (Decimal::ZERO, None),
            Some(code) => {
                let voucher = redeem_voucher(&mut tx, org_id, code, subtotal).await?;
                let amount = voucher
                    .discount()
                    .map(|d| d.amount_off(subtotal))
                    .unwrap_or_default();
                (amount, Some(voucher.code))
            }
        };

        let total = subtotal - discount;

        // Per-org sequential order number, serialized by the org row lock.
        let order_number = sqlx::query_scalar::<_, i64>(
            r"
            UPDATE organizations
            SET order_seq = order_seq + 1
            WHERE id = $1
            RETURNING order_seq
            ",
        )
        .bind(org_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        let order = sqlx::query_as::<_, Order>(
            r"
            INSERT INTO orders (org_id, user_id, order_number, subtotal,
                                discount, total, voucher_code)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, org_id, user_id, order_number, status, subtotal,
                      discount, total, voucher_code, created_at, updated_at
            ",
        )
        .bind(org_id)
        .bind(user_id)
        .bind(order_number)
        .bind(subtotal)
        .bind(discount)
        .bind(total)
        .bind(redeemed_code)
        .fetch_one(&mut *tx)
        .await?;

        let mut items = Vec::with_capacity(lines.len());
        for line in &lines {
            let item = sqlx::query_as::<_, OrderItem>(
                r"
                INSERT INTO order_items (order_id, variant_id, product_title,
                                         variant_name, unit_price, quantity)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING order_id, variant_id, product_title, variant_name,
                          unit_price, quantity
                ",
            )
            .bind(order.id)
            .bind(line.variant_id)
            .bind(&line.product_title)
            .bind(&line.variant_name)
            .bind(line.unit_price)
            .bind(line.quantity)
            .fetch_one(&mut *tx)
            .await?;
            items.push(item);
        }

        sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
            .bind(cart_id)
            .execute(&mut *tx)
            .await?;
        super::carts::recompute_totals(&mut tx, cart_id).await?;

        tx.commit().await?;

        Ok(OrderWithItems { order, items })
    }

    /// Advance an order's status along the allowed transitions.
    ///
    /// Cancelling restocks every line in the same transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` for a disallowed transition,
    /// `RepositoryError::NotFound` if the order isn't in this organization.
    pub async fn update_status(
        &self,
        org_id: OrgId,
        order_id: OrderId,
        new_status: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_scalar::<_, OrderStatus>(
            "SELECT status FROM orders WHERE id = $1 AND org_id = $2 FOR UPDATE",
        )
        .bind(order_id)
        .bind(org_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        if !current.can_transition_to(new_status) {
            return Err(RepositoryError::Conflict(format!(
                "cannot move order from {current} to {new_status}"
            )));
        }

        if new_status == OrderStatus::Cancelled {
            restock_order(&mut tx, order_id).await?;
        }

        let order = sqlx::query_as::<_, Order>(
            r"
            UPDATE orders
            SET status = $1, updated_at = now()
            WHERE id = $2
            RETURNING id, org_id, user_id, order_number, status, subtotal,
                      discount, total, voucher_code, created_at, updated_at
            ",
        )
        .bind(new_status)
        .bind(order_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(order)
    }

    /// Load an order with its lines, scoped to an organization.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order isn't in this
    /// organization.
    pub async fn get_for_org(
        &self,
        org_id: OrgId,
        order_id: OrderId,
    ) -> Result<OrderWithItems, RepositoryError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "{SELECT_ORDER} WHERE id = $1 AND org_id = $2"
        ))
        .bind(order_id)
        .bind(org_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        self.with_items(order).await
    }

    /// Load one of the user's own orders with its lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order doesn't belong to
    /// the user.
    pub async fn get_for_user(
        &self,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<OrderWithItems, RepositoryError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "{SELECT_ORDER} WHERE id = $1 AND user_id = $2"
        ))
        .bind(order_id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        self.with_items(order).await
    }

    /// List an organization's orders, newest first, optionally filtered by
    /// status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_org(
        &self,
        org_id: OrgId,
        status: Option<OrderStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Order>, RepositoryError> {
        let orders = sqlx::query_as::<_, Order>(&format!(
            "{SELECT_ORDER}
             WHERE org_id = $1 AND ($2::order_status IS NULL OR status = $2)
             ORDER BY created_at DESC
             LIMIT $3 OFFSET $4"
        ))
        .bind(org_id)
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        Ok(orders)
    }

    /// List a user's own orders across organizations, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(
        &self,
        user_id: UserId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Order>, RepositoryError> {
        let orders = sqlx::query_as::<_, Order>(&format!(
            "{SELECT_ORDER}
             WHERE user_id = $1
             ORDER BY created_at DESC
             LIMIT $2 OFFSET $3"
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        Ok(orders)
    }

    async fn with_items(&self, order: Order) -> Result<OrderWithItems, RepositoryError> {
        let items = sqlx::query_as::<_, OrderItem>(
            r"
            SELECT order_id, variant_id, product_title, variant_name,
                   unit_price, quantity
            FROM order_items
            WHERE order_id = $1
            ORDER BY variant_id
            ",
        )
        .bind(order.id)
        .fetch_all(self.pool)
        .await?;

        Ok(OrderWithItems { order, items })
    }
}

/// Lock and redeem a voucher inside the checkout transaction.
async fn redeem_voucher(
    tx: &mut Transaction<'_, Postgres>,
    org_id: OrgId,
    code: &str,
    subtotal: Decimal,
) -> Result<Voucher, RepositoryError> {
    let voucher = sqlx::query_as::<_, Voucher>(
        r"
        SELECT id, org_id, code, discount_percent, discount_fixed,
               min_subtotal, usage_limit, used_count, expires_at, is_active,
               created_at
        FROM vouchers
        WHERE org_id = $1 AND code = UPPER($2)
        FOR UPDATE
        ",
    )
    .bind(org_id)
    .bind(code)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| RepositoryError::Invariant("unknown voucher code".to_string()))?;

    voucher
        .check_redeemable(subtotal, Utc::now())
        .map_err(|reason| RepositoryError::Invariant(reason.to_string()))?;

    sqlx::query("UPDATE vouchers SET used_count = used_count + 1 WHERE id = $1")
        .bind(voucher.id)
        .execute(&mut **tx)
        .await?;

    Ok(voucher)
}

/// Return every line's quantity to variant stock.
pub(crate) async fn restock_order(
    tx: &mut Transaction<'_, Postgres>,
    order_id: OrderId,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE product_variants v
        SET stock = v.stock + oi.quantity
        FROM order_items oi
        WHERE oi.order_id = $1 AND oi.variant_id = v.id
        ",
    )
    .bind(order_id)
    .execute(&mut **tx)
    .await?;

    Ok(())
}
