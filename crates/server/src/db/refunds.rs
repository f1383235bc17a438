//! Refund request repository.
//!
//! Customers raise a refund request against a paid order; staff decide it
//! and, on approval, mark it refunded. Marking refunded flips the succeeded
//! payment, cancels the order and restocks its lines in one transaction.

use chrono::Utc;
use merchkins_core::{OrderId, OrderStatus, OrgId, PaymentStatus, RefundRequestId, RefundStatus, UserId};
use sqlx::PgPool;

use super::RepositoryError;
use crate::models::refund::RefundRequest;

const SELECT_REFUND: &str = r"
    SELECT id, order_id, org_id, user_id, reason, status, decided_by,
           decided_at, created_at
    FROM refund_requests
";

/// Repository for refund requests.
pub struct RefundRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> RefundRepository<'a> {
    /// Create a new refund repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Open a refund request against one of the user's paid orders.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order isn't the user's,
    /// `RepositoryError::Invariant` if the order has no succeeded payment,
    /// `RepositoryError::Conflict` if an open request already exists.
    pub async fn create(
        &self,
        user_id: UserId,
        order_id: OrderId,
        reason: &str,
    ) -> Result<RefundRequest, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let org_id = sqlx::query_scalar::<_, OrgId>(
            "SELECT org_id FROM orders WHERE id = $1 AND user_id = $2 FOR UPDATE",
        )
        .bind(order_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        let paid = sqlx::query_scalar::<_, bool>(
            r"
            SELECT EXISTS (
                SELECT 1 FROM payments
                WHERE order_id = $1 AND status = $2
            )
            ",
        )
        .bind(order_id)
        .bind(PaymentStatus::Succeeded)
        .fetch_one(&mut *tx)
        .await?;

        if !paid {
            return Err(RepositoryError::Invariant(
                "order has no successful payment to refund".to_string(),
            ));
        }

        let open = sqlx::query_scalar::<_, bool>(
            r"
            SELECT EXISTS (
                SELECT 1 FROM refund_requests
                WHERE order_id = $1 AND status IN ($2, $3)
            )
            ",
        )
        .bind(order_id)
        .bind(RefundStatus::Requested)
        .bind(RefundStatus::Approved)
        .fetch_one(&mut *tx)
        .await?;

        if open {
            return Err(RepositoryError::Conflict(
                "order already has an open refund request".to_string(),
            ));
        }

        let request = sqlx::query_as::<_, RefundRequest>(
            r"
            INSERT INTO refund_requests (order_id, org_id, user_id, reason)
            VALUES ($1, $2, $3, $4)
            RETURNING id, order_id, org_id, user_id, reason, status,
                      decided_by, decided_at, created_at
            ",
        )
        .bind(order_id)
        .bind(org_id)
        .bind(user_id)
        .bind(reason)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(request)
    }

    /// Approve or reject a requested refund.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the request isn't in the
    /// requested state, `RepositoryError::NotFound` if it isn't in this
    /// organization.
    pub async fn decide(
        &self,
        org_id: OrgId,
        id: RefundRequestId,
        approve: bool,
        decided_by: UserId,
    ) -> Result<RefundRequest, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_scalar::<_, RefundStatus>(
            "SELECT status FROM refund_requests WHERE id = $1 AND org_id = $2 FOR UPDATE",
        )
        .bind(id)
        .bind(org_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        let next = if approve {
            RefundStatus::Approved
        } else {
            RefundStatus::Rejected
        };
        if !current.can_transition_to(next) {
            return Err(RepositoryError::Conflict(format!(
                "cannot move refund from {current} to {next}"
            )));
        }

        let request = sqlx::query_as::<_, RefundRequest>(
            r"
            UPDATE refund_requests
            SET status = $1, decided_by = $2, decided_at = $3
            WHERE id = $4
            RETURNING id, order_id, org_id, user_id, reason, status,
                      decided_by, decided_at, created_at
            ",
        )
        .bind(next)
        .bind(decided_by)
        .bind(Utc::now())
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(request)
    }

    /// Settle an approved refund: flip the succeeded payment to refunded,
    /// cancel the order and restock its lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the request isn't approved,
    /// `RepositoryError::NotFound` if it isn't in this organization.
    pub async fn mark_refunded(
        &self,
        org_id: OrgId,
        id: RefundRequestId,
    ) -> Result<RefundRequest, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        #[derive(sqlx::FromRow)]
        struct Head {
            status: RefundStatus,
            order_id: OrderId,
        }

        let head = sqlx::query_as::<_, Head>(
            "SELECT status, order_id FROM refund_requests WHERE id = $1 AND org_id = $2 FOR UPDATE",
        )
        .bind(id)
        .bind(org_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        if !head.status.can_transition_to(RefundStatus::Refunded) {
            return Err(RepositoryError::Conflict(format!(
                "cannot settle a refund in the {} state",
                head.status
            )));
        }

        sqlx::query(
            r"
            UPDATE payments
            SET status = $1
            WHERE order_id = $2 AND status = $3
            ",
        )
        .bind(PaymentStatus::Refunded)
        .bind(head.order_id)
        .bind(PaymentStatus::Succeeded)
        .execute(&mut *tx)
        .await?;

        let order_status = sqlx::query_scalar::<_, OrderStatus>(
            "SELECT status FROM orders WHERE id = $1 FOR UPDATE",
        )
        .bind(head.order_id)
        .fetch_one(&mut *tx)
        .await?;

        if !order_status.is_terminal() {
            super::orders::restock_order(&mut tx, head.order_id).await?;
            sqlx::query(
                r"
                UPDATE orders
                SET status = $1, updated_at = now()
                WHERE id = $2
                ",
            )
            .bind(OrderStatus::Cancelled)
            .bind(head.order_id)
            .execute(&mut *tx)
            .await?;
        }

        let request = sqlx::query_as::<_, RefundRequest>(
            r"
            UPDATE refund_requests
            SET status = $1
            WHERE id = $2
            RETURNING id, order_id, org_id, user_id, reason, status,
                      decided_by, decided_at, created_at
            ",
        )
        .bind(RefundStatus::Refunded)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(request)
    }

    /// Get a refund request scoped to an organization.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        org_id: OrgId,
        id: RefundRequestId,
    ) -> Result<Option<RefundRequest>, RepositoryError> {
        let request = sqlx::query_as::<_, RefundRequest>(&format!(
            "{SELECT_REFUND} WHERE id = $1 AND org_id = $2"
        ))
        .bind(id)
        .bind(org_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(request)
    }

    /// List an organization's refund requests, open ones first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_org(
        &self,
        org_id: OrgId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<RefundRequest>, RepositoryError> {
        let requests = sqlx::query_as::<_, RefundRequest>(&format!(
            "{SELECT_REFUND}
             WHERE org_id = $1
             ORDER BY (status IN ($2, $3)) DESC, created_at DESC
             LIMIT $4 OFFSET $5"
        ))
        .bind(org_id)
        .bind(RefundStatus::Requested)
        .bind(RefundStatus::Approved)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        Ok(requests)
    }

    /// List the user's own refund requests, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<RefundRequest>, RepositoryError> {
        let requests = sqlx::query_as::<_, RefundRequest>(&format!(
            "{SELECT_REFUND} WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(requests)
    }
}
