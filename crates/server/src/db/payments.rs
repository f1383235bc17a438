//! Payment repository.
//!
//! A payment is recorded against a pending order for exactly the order
//! total. At most one succeeded payment can exist per order (partial unique
//! index); a succeeded payment moves the order to processing in the same
//! transaction.

use merchkins_core::{OrderId, OrderStatus, OrgId, PaymentId, PaymentMethod, PaymentStatus};
use rust_decimal::Decimal;
use sqlx::PgPool;

use super::RepositoryError;
use crate::models::payment::Payment;

/// Repository for order payments.
pub struct PaymentRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PaymentRepository<'a> {
    /// Create a new payment repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Record a payment attempt against a pending order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Invariant` if the order isn't pending or
    /// the amount doesn't match the order total,
    /// `RepositoryError::Conflict` if a succeeded payment already exists,
    /// `RepositoryError::NotFound` if the order isn't in this organization.
    pub async fn record(
        &self,
        org_id: OrgId,
        order_id: OrderId,
        method: PaymentMethod,
        amount: Decimal,
        status: PaymentStatus,
        reference: Option<&str>,
    ) -> Result<Payment, RepositoryError> {
        if status == PaymentStatus::Refunded {
            return Err(RepositoryError::Invariant(
                "payments cannot be recorded as refunded".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        #[derive(sqlx::FromRow)]
        struct OrderHead {
            status: OrderStatus,
            total: Decimal,
        }

        let head = sqlx::query_as::<_, OrderHead>(
            "SELECT status, total FROM orders WHERE id = $1 AND org_id = $2 FOR UPDATE",
        )
        .bind(order_id)
        .bind(org_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        if head.status != OrderStatus::Pending {
            return Err(RepositoryError::Invariant(format!(
                "order is {}, payments are only taken while pending",
                head.status
            )));
        }
        if amount != head.total {
            return Err(RepositoryError::Invariant(format!(
                "payment amount {amount} does not match order total {}",
                head.total
            )));
        }

        let payment = sqlx::query_as::<_, Payment>(
            r"
            INSERT INTO payments (order_id, amount, method, status, reference)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, order_id, amount, method, status, reference,
                      created_at
            ",
        )
        .bind(order_id)
        .bind(amount)
        .bind(method)
        .bind(status)
        .bind(reference)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "succeeded payment"))?;

        if status == PaymentStatus::Succeeded {
            sqlx::query(
                r"
                UPDATE orders
                SET status = $1, updated_at = now()
                WHERE id = $2
                ",
            )
            .bind(OrderStatus::Processing)
            .bind(order_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(payment)
    }

    /// Get a payment by ID, scoped through its order's organization.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        org_id: OrgId,
        id: PaymentId,
    ) -> Result<Option<Payment>, RepositoryError> {
        let payment = sqlx::query_as::<_, Payment>(
            r"
            SELECT p.id, p.order_id, p.amount, p.method, p.status,
                   p.reference, p.created_at
            FROM payments p
            JOIN orders o ON o.id = p.order_id
            WHERE p.id = $1 AND o.org_id = $2
            ",
        )
        .bind(id)
        .bind(org_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(payment)
    }

    /// List an order's payment attempts, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_order(
        &self,
        order_id: OrderId,
    ) -> Result<Vec<Payment>, RepositoryError> {
        let payments = sqlx::query_as::<_, Payment>(
            r"
            SELECT id, order_id, amount, method, status, reference, created_at
            FROM payments
            WHERE order_id = $1
            ORDER BY created_at
            ",
        )
        .bind(order_id)
        .fetch_all(self.pool)
        .await?;

        Ok(payments)
    }
}
