//! Product review repository.
//!
//! Reviews are verified-purchase only: the user must have a delivered order
//! containing the product. The product's rating aggregates are kept in step
//! inside the same transaction as each mutation.

use merchkins_core::{OrderStatus, ProductId, ReviewId, UserId};
use sqlx::{PgPool, Postgres, Transaction};

use super::RepositoryError;
use crate::models::review::{Review, rating_in_range};

const SELECT_REVIEW: &str = r"
    SELECT id, product_id, user_id, rating, body, created_at, updated_at
    FROM reviews
";

/// Repository for product reviews.
pub struct ReviewRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReviewRepository<'a> {
    /// Create a new review repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create a review for a product the user has received.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Invariant` for an out-of-range rating or
    /// no delivered purchase, `RepositoryError::Conflict` if the user has
    /// already reviewed the product.
    pub async fn create(
        &self,
        user_id: UserId,
        product_id: ProductId,
        rating: i16,
        body: Option<&str>,
    ) -> Result<Review, RepositoryError> {
        check_rating(rating)?;

        let mut tx = self.pool.begin().await?;

        if !has_delivered_purchase(&mut tx, user_id, product_id).await? {
            return Err(RepositoryError::Invariant(
                "reviews require a delivered order for this product".to_string(),
            ));
        }

        let review = sqlx::query_as::<_, Review>(
            r"
            INSERT INTO reviews (product_id, user_id, rating, body)
            VALUES ($1, $2, $3, $4)
            RETURNING id, product_id, user_id, rating, body, created_at,
                      updated_at
            ",
        )
        .bind(product_id)
        .bind(user_id)
        .bind(rating)
        .bind(body)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "review"))?;

        adjust_aggregates(&mut tx, product_id, i64::from(rating), 1).await?;

        tx.commit().await?;

        Ok(review)
    }

    /// Update the user's own review.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user has no review with
    /// this ID, `RepositoryError::Invariant` for an out-of-range rating.
    pub async fn update(
        &self,
        user_id: UserId,
        id: ReviewId,
        rating: i16,
        body: Option<&str>,
    ) -> Result<Review, RepositoryError> {
        check_rating(rating)?;

        let mut tx = self.pool.begin().await?;

        let old = sqlx::query_as::<_, Review>(&format!(
            "{SELECT_REVIEW} WHERE id = $1 AND user_id = $2 FOR UPDATE"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        let review = sqlx::query_as::<_, Review>(
            r"
            UPDATE reviews
            SET rating = $1, body = $2, updated_at = now()
            WHERE id = $3
            RETURNING id, product_id, user_id, rating, body, created_at,
                      updated_at
            ",
        )
        .bind(rating)
        .bind(body)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        adjust_aggregates(
            &mut tx,
            old.product_id,
            i64::from(rating) - i64::from(old.rating),
            0,
        )
        .await?;

        tx.commit().await?;

        Ok(review)
    }

    /// Delete a review. `require_owner` restricts deletion to the author;
    /// staff moderation passes `None`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the review doesn't exist or
    /// belongs to someone else.
    pub async fn delete(
        &self,
        id: ReviewId,
        require_owner: Option<UserId>,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let old = sqlx::query_as::<_, Review>(&format!(
            "{SELECT_REVIEW} WHERE id = $1 AND ($2::BIGINT IS NULL OR user_id = $2) FOR UPDATE"
        ))
        .bind(id)
        .bind(require_owner)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        adjust_aggregates(&mut tx, old.product_id, -i64::from(old.rating), -1).await?;

        tx.commit().await?;

        Ok(())
    }

    /// List a product's reviews, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_product(
        &self,
        product_id: ProductId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Review>, RepositoryError> {
        let reviews = sqlx::query_as::<_, Review>(&format!(
            "{SELECT_REVIEW}
             WHERE product_id = $1
             ORDER BY created_at DESC
             LIMIT $2 OFFSET $3"
        ))
        .bind(product_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        Ok(reviews)
    }

    /// The user's review of a product, if any.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_user_review(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<Option<Review>, RepositoryError> {
        let review = sqlx::query_as::<_, Review>(&format!(
            "{SELECT_REVIEW} WHERE user_id = $1 AND product_id = $2"
        ))
        .bind(user_id)
        .bind(product_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(review)
    }
}

fn check_rating(rating: i16) -> Result<(), RepositoryError> {
    if rating_in_range(rating) {
        Ok(())
    } else {
        Err(RepositoryError::Invariant(
            "rating must be between 1 and 5".to_string(),
        ))
    }
}

async fn has_delivered_purchase(
    tx: &mut Transaction<'_, Postgres>,
    user_id: UserId,
    product_id: ProductId,
) -> Result<bool, RepositoryError> {
    let found = sqlx::query_scalar::<_, bool>(
        r"
        SELECT EXISTS (
            SELECT 1
            FROM orders o
            JOIN order_items oi ON oi.order_id = o.id
            JOIN product_variants v ON v.id = oi.variant_id
            WHERE o.user_id = $1 AND o.status = $2 AND v.product_id = $3
        )
        ",
    )
    .bind(user_id)
    .bind(OrderStatus::Delivered)
    .bind(product_id)
    .fetch_one(&mut **tx)
    .await?;

    Ok(found)
}

async fn adjust_aggregates(
    tx: &mut Transaction<'_, Postgres>,
    product_id: ProductId,
    sum_delta: i64,
    count_delta: i32,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE products
        SET rating_sum = rating_sum + $1,
            rating_count = rating_count + $2
        WHERE id = $3
        ",
    )
    .bind(sum_delta)
    .bind(count_delta)
    .bind(product_id)
    .execute(&mut **tx)
    .await?;

    Ok(())
}
