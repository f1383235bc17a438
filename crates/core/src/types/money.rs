//! Money types backed by decimal arithmetic.
//!
//! All amounts are [`Decimal`] in the currency's standard unit (dollars,
//! not cents). Floats never touch money.

use rust_decimal::Decimal;
use rust_decimal::prelude::RoundingStrategy;
use serde::{Deserialize, Serialize};

/// ISO 4217 currency codes accepted by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    USD,
    EUR,
    GBP,
    CAD,
    AUD,
}

impl CurrencyCode {
    /// Three-letter ISO code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::USD => "USD",
            Self::EUR => "EUR",
            Self::GBP => "GBP",
            Self::CAD => "CAD",
            Self::AUD => "AUD",
        }
    }
}

impl std::str::FromStr for CurrencyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USD" => Ok(Self::USD),
            "EUR" => Ok(Self::EUR),
            "GBP" => Ok(Self::GBP),
            "CAD" => Ok(Self::CAD),
            "AUD" => Ok(Self::AUD),
            _ => Err(format!("unknown currency code: {s}")),
        }
    }
}

impl std::fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// A voucher discount: a percentage of the subtotal or a fixed amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Discount {
    /// Percentage off the subtotal, 1..=100.
    Percent(u8),
    /// Fixed amount off, clamped to the subtotal.
    Fixed(Decimal),
}

impl Discount {
    /// Compute the amount taken off a subtotal.
    ///
    /// Percentages round half-away-from-zero to cents; fixed discounts are
    /// clamped so the resulting total never goes negative.
    #[must_use]
    pub fn amount_off(&self, subtotal: Decimal) -> Decimal {
        let off = match *self {
            Self::Percent(pct) => (subtotal * Decimal::from(pct) / Decimal::from(100u8))
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
            Self::Fixed(amount) => amount,
        };
        off.clamp(Decimal::ZERO, subtotal)
    }

    /// Whether the discount parameters are sane (percent in 1..=100,
    /// fixed amount positive).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        match *self {
            Self::Percent(pct) => (1..=100).contains(&pct),
            Self::Fixed(amount) => amount > Decimal::ZERO,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_currency_code_parse() {
        assert_eq!("EUR".parse::<CurrencyCode>().unwrap(), CurrencyCode::EUR);
        assert!("XYZ".parse::<CurrencyCode>().is_err());
    }

    #[test]
    fn test_percent_discount_rounds_to_cents() {
        // 15% of 33.33 = 4.9995 -> 5.00
        let disc = Discount::Percent(15);
        assert_eq!(disc.amount_off(d("33.33")), d("5.00"));
    }

    #[test]
    fn test_fixed_discount_clamped_to_subtotal() {
        let disc = Discount::Fixed(d("50"));
        assert_eq!(disc.amount_off(d("20")), d("20"));
        assert_eq!(disc.amount_off(d("80")), d("50"));
    }

    #[test]
    fn test_discount_never_negative() {
        let disc = Discount::Fixed(d("10"));
        assert_eq!(disc.amount_off(Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn test_discount_validity() {
        assert!(Discount::Percent(100).is_valid());
        assert!(!Discount::Percent(0).is_valid());
        assert!(!Discount::Percent(101).is_valid());
        assert!(Discount::Fixed(d("1")).is_valid());
        assert!(!Discount::Fixed(Decimal::ZERO).is_valid());
    }

    #[test]
    fn test_full_percent_discount() {
        let disc = Discount::Percent(100);
        assert_eq!(disc.amount_off(d("42.50")), d("42.50"));
    }
}
