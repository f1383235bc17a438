//! Cart repository.
//!
//! Every mutation recomputes the denormalized `subtotal` / `item_count`
//! from the line items inside the same transaction, so the cart header can
//! never drift from its lines.

use merchkins_core::{CartId, OrgId, UserId, VariantId};
use sqlx::{PgPool, Postgres, Transaction};

use super::RepositoryError;
use crate::models::cart::{Cart, CartItem, CartWithItems};

const SELECT_CART: &str = r"
    SELECT id, user_id, org_id, subtotal, item_count, updated_at
    FROM carts
";

/// Repository for carts and cart items.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get the user's cart for an organization, creating it on first use.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_or_create(
        &self,
        user_id: UserId,
        org_id: OrgId,
    ) -> Result<Cart, RepositoryError> {
        let cart = sqlx::query_as::<_, Cart>(
            r"
            INSERT INTO carts (user_id, org_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, org_id) DO UPDATE SET user_id = EXCLUDED.user_id
            RETURNING id, user_id, org_id, subtotal, item_count, updated_at
            ",
        )
        .bind(user_id)
        .bind(org_id)
        .fetch_one(self.pool)
        .await?;

        Ok(cart)
    }

    /// Load a cart with its line items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the cart doesn't exist.
    pub async fn get_with_items(&self, cart_id: CartId) -> Result<CartWithItems, RepositoryError> {
        let cart = sqlx::query_as::<_, Cart>(&format!("{SELECT_CART} WHERE id = $1"))
            .bind(cart_id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        let items = sqlx::query_as::<_, CartItem>(
            r"
            SELECT cart_id, variant_id, product_title, variant_name,
                   unit_price, quantity
            FROM cart_items
            WHERE cart_id = $1
            ORDER BY variant_id
            ",
        )
        .bind(cart_id)
        .fetch_all(self.pool)
        .await?;

        Ok(CartWithItems { cart, items })
    }

    /// Add a variant to the cart (or increase its quantity), snapshotting
    /// price and titles at add time.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Invariant` if the requested quantity
    /// exceeds available stock or the variant is inactive,
    /// `RepositoryError::NotFound` if the variant isn't sold by this org.
    pub async fn add_item(
        &self,
        cart_id: CartId,
        org_id: OrgId,
        variant_id: VariantId,
        quantity: i32,
    ) -> Result<Cart, RepositoryError> {
        if quantity <= 0 {
            return Err(RepositoryError::Invariant(
                "quantity must be positive".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        #[derive(sqlx::FromRow)]
        struct VariantSnapshot {
            product_title: String,
            variant_name: String,
            unit_price: rust_decimal::Decimal,
            stock: i32,
        }

        // Variant must belong to a live product of this org.
        let snapshot = sqlx::query_as::<_, VariantSnapshot>(
            r"
            SELECT p.title AS product_title, v.name AS variant_name,
                   v.price AS unit_price, v.stock
            FROM product_variants v
            JOIN products p ON p.id = v.product_id
            WHERE v.id = $1 AND p.org_id = $2
              AND v.is_active AND p.is_active AND NOT p.is_deleted
            FOR UPDATE OF v
            ",
        )
        .bind(variant_id)
        .bind(org_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        let existing_qty = sqlx::query_scalar::<_, i32>(
            "SELECT quantity FROM cart_items WHERE cart_id = $1 AND variant_id = $2",
        )
        .bind(cart_id)
        .bind(variant_id)
        .fetch_optional(&mut *tx)
        .await?
        .unwrap_or(0);

        if existing_qty + quantity > snapshot.stock {
            return Err(RepositoryError::Invariant(format!(
                "only {} in stock",
                snapshot.stock
            )));
        }

        sqlx::query(
            r"
            INSERT INTO cart_items (cart_id, variant_id, product_title,
                                    variant_name, unit_price, quantity)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (cart_id, variant_id)
            DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity
            ",
        )
        .bind(cart_id)
        .bind(variant_id)
        .bind(&snapshot.product_title)
        .bind(&snapshot.variant_name)
        .bind(snapshot.unit_price)
        .bind(quantity)
        .execute(&mut *tx)
        .await?;

        let cart = recompute_totals(&mut tx, cart_id).await?;
        tx.commit().await?;

        Ok(cart)
    }

    /// Set a line's quantity; zero removes the line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Invariant` if the quantity exceeds stock,
    /// `RepositoryError::NotFound` if the line doesn't exist.
    pub async fn set_quantity(
        &self,
        cart_id: CartId,
        variant_id: VariantId,
        quantity: i32,
    ) -> Result<Cart, RepositoryError> {
        if quantity < 0 {
            return Err(RepositoryError::Invariant(
                "quantity cannot be negative".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        if quantity == 0 {
            let result =
                sqlx::query("DELETE FROM cart_items WHERE cart_id = $1 AND variant_id = $2")
                    .bind(cart_id)
                    .bind(variant_id)
                    .execute(&mut *tx)
                    .await?;
            if result.rows_affected() == 0 {
                return Err(RepositoryError::NotFound);
            }
        } else {
            let stock = sqlx::query_scalar::<_, i32>(
                "SELECT stock FROM product_variants WHERE id = $1 FOR UPDATE",
            )
            .bind(variant_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(RepositoryError::NotFound)?;

            if quantity > stock {
                return Err(RepositoryError::Invariant(format!("only {stock} in stock")));
            }

            let result = sqlx::query(
                r"
                UPDATE cart_items
                SET quantity = $1
                WHERE cart_id = $2 AND variant_id = $3
                ",
            )
            .bind(quantity)
            .bind(cart_id)
            .bind(variant_id)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                return Err(RepositoryError::NotFound);
            }
        }

        let cart = recompute_totals(&mut tx, cart_id).await?;
        tx.commit().await?;

        Ok(cart)
    }

    /// Remove all lines from the cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn clear(&self, cart_id: CartId) -> Result<Cart, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
            .bind(cart_id)
            .execute(&mut *tx)
            .await?;

        let cart = recompute_totals(&mut tx, cart_id).await?;
        tx.commit().await?;

        Ok(cart)
    }
}

/// Recompute the cart header from its lines.
///
/// Shared with the checkout path in the orders repository.
pub(crate) async fn recompute_totals(
    tx: &mut Transaction<'_, Postgres>,
    cart_id: CartId,
) -> Result<Cart, RepositoryError> {
    let cart = sqlx::query_as::<_, Cart>(
        r"
        UPDATE carts c
        SET subtotal = COALESCE(agg.subtotal, 0),
            item_count = COALESCE(agg.item_count, 0),
            updated_at = now()
        FROM (
            SELECT $1::BIGINT AS cart_id,
                   SUM(unit_price * quantity) AS subtotal,
                   SUM(quantity)::INT AS item_count
            FROM cart_items
            WHERE cart_id = $1
        ) agg
        WHERE c.id = agg.cart_id
        RETURNING c.id, c.user_id, c.org_id, c.subtotal, c.item_count,
                  c.updated_at
        ",
    )
    .bind(cart_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or(RepositoryError::NotFound)?;

    Ok(cart)
}
