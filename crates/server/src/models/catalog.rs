//! Product, variant, and category models.

use chrono::{DateTime, Utc};
use merchkins_core::{CategoryId, OrgId, ProductId, Slug, VariantId};
use rust_decimal::Decimal;
use serde::Serialize;

/// A product in an organization's catalog.
///
/// `org_name` is a denormalized snapshot refreshed when the organization is
/// renamed. `rating_sum` / `rating_count` are maintained by the review
/// mutations; the average is computed on read.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Product {
    pub id: ProductId,
    pub org_id: OrgId,
    pub org_name: String,
    pub category_id: Option<CategoryId>,
    pub title: String,
    pub slug: Slug,
    pub description: Option<String>,
    pub is_active: bool,
    pub is_deleted: bool,
    pub rating_sum: i64,
    pub rating_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Average rating, or `None` with no reviews yet.
    #[must_use]
    pub fn average_rating(&self) -> Option<Decimal> {
        if self.rating_count == 0 {
            return None;
        }
        Some((Decimal::from(self.rating_sum) / Decimal::from(self.rating_count)).round_dp(2))
    }
}

/// A purchasable variant of a product.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProductVariant {
    pub id: VariantId,
    pub product_id: ProductId,
    pub name: String,
    pub price: Decimal,
    pub currency: String,
    pub stock: i32,
    pub is_active: bool,
}

/// A category in an organization's (max three levels deep) category tree.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Category {
    pub id: CategoryId,
    pub org_id: OrgId,
    pub parent_id: Option<CategoryId>,
    pub name: String,
    pub depth: i16,
}

/// Maximum category nesting depth (root = 1).
pub const MAX_CATEGORY_DEPTH: i16 = 3;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use merchkins_core::Slug;

    fn product(rating_sum: i64, rating_count: i32) -> Product {
        Product {
            id: ProductId::new(1),
            org_id: OrgId::new(1),
            org_name: "Acme".to_string(),
            category_id: None,
            title: "Widget".to_string(),
            slug: Slug::parse("widget").unwrap(),
            description: None,
            is_active: true,
            is_deleted: false,
            rating_sum,
            rating_count,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_average_rating_none_without_reviews() {
        assert_eq!(product(0, 0).average_rating(), None);
    }

    #[test]
    fn test_average_rating_rounds() {
        // 11 / 3 = 3.67
        let avg = product(11, 3).average_rating().unwrap();
        assert_eq!(avg, "3.67".parse().unwrap());
    }
}
