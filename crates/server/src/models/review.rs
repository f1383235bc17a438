//! Product review model.

use chrono::{DateTime, Utc};
use merchkins_core::{ProductId, ReviewId, UserId};
use serde::Serialize;

/// A verified-purchase product review, one per user per product.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Review {
    pub id: ReviewId,
    pub product_id: ProductId,
    pub user_id: UserId,
    pub rating: i16,
    pub body: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Inclusive rating bounds.
pub const MIN_RATING: i16 = 1;
/// Inclusive rating bounds.
pub const MAX_RATING: i16 = 5;

/// Whether a rating value is within bounds.
#[must_use]
pub const fn rating_in_range(rating: i16) -> bool {
    rating >= MIN_RATING && rating <= MAX_RATING
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_bounds() {
        assert!(rating_in_range(1));
        assert!(rating_in_range(5));
        assert!(!rating_in_range(0));
        assert!(!rating_in_range(6));
    }
}
