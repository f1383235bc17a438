//! Voucher repository.
//!
//! Redemption itself happens inside the checkout transaction (see the
//! orders repository); this repository covers voucher administration.

use chrono::{DateTime, Utc};
use merchkins_core::{OrgId, VoucherId};
use rust_decimal::Decimal;
use sqlx::PgPool;

use super::RepositoryError;
use crate::models::voucher::Voucher;

const SELECT_VOUCHER: &str = r"
    SELECT id, org_id, code, discount_percent, discount_fixed, min_subtotal,
           usage_limit, used_count, expires_at, is_active, created_at
    FROM vouchers
";

/// Repository for discount vouchers.
pub struct VoucherRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> VoucherRepository<'a> {
    /// Create a new voucher repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create a voucher. Exactly one of `discount_percent` /
    /// `discount_fixed` must be given.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Invariant` for an invalid discount,
    /// `RepositoryError::Conflict` if the code is taken within the org.
    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        &self,
        org_id: OrgId,
        code: &str,
        discount_percent: Option<i16>,
        discount_fixed: Option<Decimal>,
        min_subtotal: Decimal,
        usage_limit: Option<i32>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Voucher, RepositoryError> {
        match (discount_percent, discount_fixed) {
            (Some(pct), None) => {
                if !(1..=100).contains(&pct) {
                    return Err(RepositoryError::Invariant(
                        "percent discount must be between 1 and 100".to_string(),
                    ));
                }
            }
            (None, Some(fixed)) => {
                if fixed <= Decimal::ZERO {
                    return Err(RepositoryError::Invariant(
                        "fixed discount must be positive".to_string(),
                    ));
                }
            }
            _ => {
                return Err(RepositoryError::Invariant(
                    "voucher needs exactly one of a percent or fixed discount".to_string(),
                ));
            }
        }
        if min_subtotal < Decimal::ZERO {
            return Err(RepositoryError::Invariant(
                "minimum subtotal cannot be negative".to_string(),
            ));
        }
        if let Some(limit) = usage_limit
            && limit <= 0
        {
            return Err(RepositoryError::Invariant(
                "usage limit must be positive".to_string(),
            ));
        }

        let voucher = sqlx::query_as::<_, Voucher>(
            r"
            INSERT INTO vouchers (org_id, code, discount_percent, discount_fixed,
                                  min_subtotal, usage_limit, expires_at)
            VALUES ($1, UPPER($2), $3, $4, $5, $6, $7)
            RETURNING id, org_id, code, discount_percent, discount_fixed,
                      min_subtotal, usage_limit, used_count, expires_at,
                      is_active, created_at
            ",
        )
        .bind(org_id)
        .bind(code)
        .bind(discount_percent)
        .bind(discount_fixed)
        .bind(min_subtotal)
        .bind(usage_limit)
        .bind(expires_at)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "voucher code"))?;

        Ok(voucher)
    }

    /// Look up a voucher by code within an organization.
    ///
    /// Codes are stored uppercase; lookup is case-insensitive.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_code(
        &self,
        org_id: OrgId,
        code: &str,
    ) -> Result<Option<Voucher>, RepositoryError> {
        let voucher = sqlx::query_as::<_, Voucher>(&format!(
            "{SELECT_VOUCHER} WHERE org_id = $1 AND code = UPPER($2)"
        ))
        .bind(org_id)
        .bind(code)
        .fetch_optional(self.pool)
        .await?;

        Ok(voucher)
    }

    /// List an organization's vouchers, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, org_id: OrgId) -> Result<Vec<Voucher>, RepositoryError> {
        let vouchers = sqlx::query_as::<_, Voucher>(&format!(
            "{SELECT_VOUCHER} WHERE org_id = $1 ORDER BY created_at DESC"
        ))
        .bind(org_id)
        .fetch_all(self.pool)
        .await?;

        Ok(vouchers)
    }

    /// Enable or disable a voucher.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the voucher doesn't exist in
    /// this organization.
    pub async fn set_active(
        &self,
        org_id: OrgId,
        id: VoucherId,
        is_active: bool,
    ) -> Result<Voucher, RepositoryError> {
        let voucher = sqlx::query_as::<_, Voucher>(
            r"
            UPDATE vouchers
            SET is_active = $1
            WHERE id = $2 AND org_id = $3
            RETURNING id, org_id, code, discount_percent, discount_fixed,
                      min_subtotal, usage_limit, used_count, expires_at,
                      is_active, created_at
            ",
        )
        .bind(is_active)
        .bind(id)
        .bind(org_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(voucher)
    }
}
