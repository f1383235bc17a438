//! Voucher model.

use chrono::{DateTime, Utc};
use merchkins_core::{Discount, OrgId, VoucherId};
use rust_decimal::Decimal;
use serde::Serialize;

/// A discount voucher scoped to one organization.
///
/// Exactly one of `discount_percent` / `discount_fixed` is set (enforced by
/// a table CHECK constraint).
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Voucher {
    pub id: VoucherId,
    pub org_id: OrgId,
    pub code: String,
    pub discount_percent: Option<i16>,
    pub discount_fixed: Option<Decimal>,
    pub min_subtotal: Decimal,
    pub usage_limit: Option<i32>,
    pub used_count: i32,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Voucher {
    /// The discount this voucher applies.
    #[must_use]
    pub fn discount(&self) -> Option<Discount> {
        match (self.discount_percent, self.discount_fixed) {
            (Some(pct), _) => u8::try_from(pct).ok().map(Discount::Percent),
            (None, Some(fixed)) => Some(Discount::Fixed(fixed)),
            (None, None) => None,
        }
    }

    /// Check whether the voucher can be redeemed against a subtotal now.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when redemption is not possible.
    pub fn check_redeemable(
        &self,
        subtotal: Decimal,
        now: DateTime<Utc>,
    ) -> Result<(), &'static str> {
        if !self.is_active {
            return Err("voucher is not active");
        }
        if let Some(expires_at) = self.expires_at
            && now >= expires_at
        {
            return Err("voucher has expired");
        }
        if let Some(limit) = self.usage_limit
            && self.used_count >= limit
        {
            return Err("voucher usage limit reached");
        }
        if subtotal < self.min_subtotal {
            return Err("subtotal below voucher minimum");
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn voucher() -> Voucher {
        Voucher {
            id: VoucherId::new(1),
            org_id: OrgId::new(1),
            code: "SAVE10".to_string(),
            discount_percent: Some(10),
            discount_fixed: None,
            min_subtotal: "20".parse().unwrap(),
            usage_limit: Some(5),
            used_count: 0,
            expires_at: None,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_discount_percent() {
        assert_eq!(voucher().discount(), Some(Discount::Percent(10)));
    }

    #[test]
    fn test_discount_fixed() {
        let mut v = voucher();
        v.discount_percent = None;
        v.discount_fixed = Some("5".parse().unwrap());
        assert_eq!(
            v.discount(),
            Some(Discount::Fixed("5".parse().unwrap()))
        );
    }

    #[test]
    fn test_redeemable_ok() {
        assert!(voucher().check_redeemable("25".parse().unwrap(), Utc::now()).is_ok());
    }

    #[test]
    fn test_redeemable_below_minimum() {
        let err = voucher()
            .check_redeemable("19.99".parse().unwrap(), Utc::now())
            .unwrap_err();
        assert_eq!(err, "subtotal below voucher minimum");
    }

    #[test]
    fn test_redeemable_expired() {
        let mut v = voucher();
        v.expires_at = Some(Utc::now() - Duration::hours(1));
        assert!(v.check_redeemable("25".parse().unwrap(), Utc::now()).is_err());
    }

    #[test]
    fn test_redeemable_usage_limit() {
        let mut v = voucher();
        v.used_count = 5;
        assert!(v.check_redeemable("25".parse().unwrap(), Utc::now()).is_err());
    }

    #[test]
    fn test_redeemable_inactive() {
        let mut v = voucher();
        v.is_active = false;
        assert!(v.check_redeemable("25".parse().unwrap(), Utc::now()).is_err());
    }
}
