//! Product and variant repository.

use merchkins_core::{CategoryId, OrgId, ProductId, Slug, VariantId};
use rust_decimal::Decimal;
use sqlx::PgPool;

use super::RepositoryError;
use crate::models::catalog::{Product, ProductVariant};

const SELECT_PRODUCT: &str = r"
    SELECT id, org_id, org_name, category_id, title, slug, description,
           is_active, is_deleted, rating_sum, rating_count,
           created_at, updated_at
    FROM products
";

const SELECT_VARIANT: &str = r"
    SELECT id, product_id, name, price, currency, stock, is_active
    FROM product_variants
";

/// Repository for products and their variants.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create a product, snapshotting the organization name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken within the
    /// organization.
    pub async fn create(
        &self,
        org_id: OrgId,
        org_name: &str,
        category_id: Option<CategoryId>,
        title: &str,
        slug: &Slug,
        description: Option<&str>,
    ) -> Result<Product, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(
            r"
            INSERT INTO products (org_id, org_name, category_id, title, slug,
                                  description)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, org_id, org_name, category_id, title, slug,
                      description, is_active, is_deleted, rating_sum,
                      rating_count, created_at, updated_at
            ",
        )
        .bind(org_id)
        .bind(org_name)
        .bind(category_id)
        .bind(title)
        .bind(slug)
        .bind(description)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "product slug"))?;

        Ok(product)
    }

    /// Get a live product by org and slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_slug(
        &self,
        org_id: OrgId,
        slug: &Slug,
    ) -> Result<Option<Product>, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "{SELECT_PRODUCT} WHERE org_id = $1 AND slug = $2 AND NOT is_deleted"
        ))
        .bind(org_id)
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;

        Ok(product)
    }

    /// Get a live product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "{SELECT_PRODUCT} WHERE id = $1 AND NOT is_deleted"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(product)
    }

    /// List live products for a storefront, newest first, optionally
    /// filtered by category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        org_id: OrgId,
        category_id: Option<CategoryId>,
        include_inactive: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Product>, RepositoryError> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "{SELECT_PRODUCT}
             WHERE org_id = $1 AND NOT is_deleted
               AND ($2::BIGINT IS NULL OR category_id = $2)
               AND (is_active OR $3)
             ORDER BY created_at DESC
             LIMIT $4 OFFSET $5"
        ))
        .bind(org_id)
        .bind(category_id)
        .bind(include_inactive)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        Ok(products)
    }

    /// Update product fields. `None` leaves a field untouched.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    pub async fn update(
        &self,
        id: ProductId,
        title: Option<&str>,
        description: Option<&str>,
        category_id: Option<Option<CategoryId>>,
        is_active: Option<bool>,
    ) -> Result<Product, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(
            r"
            UPDATE products
            SET title = COALESCE($1, title),
                description = COALESCE($2, description),
                category_id = CASE WHEN $3 THEN $4 ELSE category_id END,
                is_active = COALESCE($5, is_active),
                updated_at = now()
            WHERE id = $6 AND NOT is_deleted
            RETURNING id, org_id, org_name, category_id, title, slug,
                      description, is_active, is_deleted, rating_sum,
                      rating_count, created_at, updated_at
            ",
        )
        .bind(title)
        .bind(description)
        .bind(category_id.is_some())
        .bind(category_id.flatten())
        .bind(is_active)
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(product)
    }

    /// Soft-delete a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    pub async fn soft_delete(&self, id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE products
            SET is_deleted = TRUE, is_active = FALSE, updated_at = now()
            WHERE id = $1 AND NOT is_deleted
            ",
        )
        .bind(id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    // =========================================================================
    // Variants
    // =========================================================================

    /// Add a variant to a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Invariant` for a non-positive price or
    /// negative stock.
    pub async fn add_variant(
        &self,
        product_id: ProductId,
        name: &str,
        price: Decimal,
        currency: &str,
        stock: i32,
    ) -> Result<ProductVariant, RepositoryError> {
        if price <= Decimal::ZERO {
            return Err(RepositoryError::Invariant(
                "variant price must be positive".to_string(),
            ));
        }
        if stock < 0 {
            return Err(RepositoryError::Invariant(
                "variant stock cannot be negative".to_string(),
            ));
        }

        let variant = sqlx::query_as::<_, ProductVariant>(
            r"
            INSERT INTO product_variants (product_id, name, price, currency, stock)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, product_id, name, price, currency, stock, is_active
            ",
        )
        .bind(product_id)
        .bind(name)
        .bind(price)
        .bind(currency)
        .bind(stock)
        .fetch_one(self.pool)
        .await?;

        Ok(variant)
    }

    /// Get a variant by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_variant(
        &self,
        id: VariantId,
    ) -> Result<Option<ProductVariant>, RepositoryError> {
        let variant = sqlx::query_as::<_, ProductVariant>(&format!(
            "{SELECT_VARIANT} WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(variant)
    }

    /// List a product's variants.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_variants(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<ProductVariant>, RepositoryError> {
        let variants = sqlx::query_as::<_, ProductVariant>(&format!(
            "{SELECT_VARIANT} WHERE product_id = $1 ORDER BY id"
        ))
        .bind(product_id)
        .fetch_all(self.pool)
        .await?;

        Ok(variants)
    }

    /// Update a variant's price, stock, or active flag.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the variant doesn't exist,
    /// `RepositoryError::Invariant` for invalid values.
    pub async fn update_variant(
        &self,
        id: VariantId,
        price: Option<Decimal>,
        stock: Option<i32>,
        is_active: Option<bool>,
    ) -> Result<ProductVariant, RepositoryError> {
        if let Some(p) = price
            && p <= Decimal::ZERO
        {
            return Err(RepositoryError::Invariant(
                "variant price must be positive".to_string(),
            ));
        }
        if let Some(s) = stock
            && s < 0
        {
            return Err(RepositoryError::Invariant(
                "variant stock cannot be negative".to_string(),
            ));
        }

        let variant = sqlx::query_as::<_, ProductVariant>(
            r"
            UPDATE product_variants
            SET price = COALESCE($1, price),
                stock = COALESCE($2, stock),
                is_active = COALESCE($3, is_active)
            WHERE id = $4
            RETURNING id, product_id, name, price, currency, stock, is_active
            ",
        )
        .bind(price)
        .bind(stock)
        .bind(is_active)
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(variant)
    }
}
