//! Category tree repository.
//!
//! Categories form a per-organization tree at most three levels deep
//! (root = depth 1). Create and move validate against the limit and
//! recompute subtree depths transactionally; deletes are refused while
//! children or products still reference the category.

use merchkins_core::{CategoryId, OrgId};
use sqlx::{PgPool, Postgres, Transaction};

use super::RepositoryError;
use crate::models::catalog::{Category, MAX_CATEGORY_DEPTH};

/// Repository for category trees.
pub struct CategoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CategoryRepository<'a> {
    /// Create a new category repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create a category under an optional parent.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Invariant` if the resulting depth would
    /// exceed the limit, `RepositoryError::NotFound` for a missing parent.
    pub async fn create(
        &self,
        org_id: OrgId,
        parent_id: Option<CategoryId>,
        name: &str,
    ) -> Result<Category, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let depth = match parent_id {
            None => 1,
            Some(parent) => {
                let parent_depth = fetch_depth(&mut tx, org_id, parent).await?;
                if parent_depth >= MAX_CATEGORY_DEPTH {
                    return Err(RepositoryError::Invariant(format!(
                        "category nesting deeper than {MAX_CATEGORY_DEPTH} levels"
                    )));
                }
                parent_depth + 1
            }
        };

        let category = sqlx::query_as::<_, Category>(
            r"
            INSERT INTO categories (org_id, parent_id, name, depth)
            VALUES ($1, $2, $3, $4)
            RETURNING id, org_id, parent_id, name, depth
            ",
        )
        .bind(org_id)
        .bind(parent_id)
        .bind(name)
        .bind(depth)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(category)
    }

    /// Rename a category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category doesn't exist.
    pub async fn rename(
        &self,
        org_id: OrgId,
        id: CategoryId,
        name: &str,
    ) -> Result<Category, RepositoryError> {
        let category = sqlx::query_as::<_, Category>(
            r"
            UPDATE categories
            SET name = $1
            WHERE id = $2 AND org_id = $3
            RETURNING id, org_id, parent_id, name, depth
            ",
        )
        .bind(name)
        .bind(id)
        .bind(org_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(category)
    }

    /// Move a category (and its subtree) under a new parent.
    ///
    /// The whole subtree's depths are recomputed in one transaction; the
    /// move is rejected if any descendant would land below the depth limit
    /// or if the new parent is inside the moved subtree.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Invariant` for depth or cycle violations.
    pub async fn move_category(
        &self,
        org_id: OrgId,
        id: CategoryId,
        new_parent: Option<CategoryId>,
    ) -> Result<Category, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let old_depth = fetch_depth(&mut tx, org_id, id).await?;

        let new_depth = match new_parent {
            None => 1,
            Some(parent) => {
                if parent == id || is_descendant(&mut tx, org_id, id, parent).await? {
                    return Err(RepositoryError::Invariant(
                        "cannot move a category into its own subtree".to_string(),
                    ));
                }
                fetch_depth(&mut tx, org_id, parent).await? + 1
            }
        };

        // Height of the moved subtree relative to its root.
        let height = sqlx::query_scalar::<_, i16>(
            r"
            WITH RECURSIVE subtree AS (
                SELECT id, depth FROM categories WHERE id = $1 AND org_id = $2
                UNION ALL
                SELECT c.id, c.depth FROM categories c
                JOIN subtree s ON c.parent_id = s.id
            )
            SELECT MAX(depth) - MIN(depth) FROM subtree
            ",
        )
        .bind(id)
        .bind(org_id)
        .fetch_one(&mut *tx)
        .await?;

        if new_depth + height > MAX_CATEGORY_DEPTH {
            return Err(RepositoryError::Invariant(format!(
                "move would nest categories deeper than {MAX_CATEGORY_DEPTH} levels"
            )));
        }

        // Shift the whole subtree by the depth delta.
        sqlx::query(
            r"
            WITH RECURSIVE subtree AS (
                SELECT id FROM categories WHERE id = $1 AND org_id = $2
                UNION ALL
                SELECT c.id FROM categories c
                JOIN subtree s ON c.parent_id = s.id
            )
            UPDATE categories
            SET depth = depth + $3
            WHERE id IN (SELECT id FROM subtree)
            ",
        )
        .bind(id)
        .bind(org_id)
        .bind(new_depth - old_depth)
        .execute(&mut *tx)
        .await?;

        let category = sqlx::query_as::<_, Category>(
            r"
            UPDATE categories
            SET parent_id = $1
            WHERE id = $2 AND org_id = $3
            RETURNING id, org_id, parent_id, name, depth
            ",
        )
        .bind(new_parent)
        .bind(id)
        .bind(org_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(category)
    }

    /// Delete an empty leaf category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if children or products still
    /// reference it, `RepositoryError::NotFound` if it doesn't exist.
    pub async fn delete(&self, org_id: OrgId, id: CategoryId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let child_count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM categories WHERE parent_id = $1 AND org_id = $2",
        )
        .bind(id)
        .bind(org_id)
        .fetch_one(&mut *tx)
        .await?;

        if child_count > 0 {
            return Err(RepositoryError::Conflict(
                "category has child categories".to_string(),
            ));
        }

        let product_count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM products WHERE category_id = $1 AND NOT is_deleted",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        if product_count > 0 {
            return Err(RepositoryError::Conflict(
                "category still has products".to_string(),
            ));
        }

        let result = sqlx::query("DELETE FROM categories WHERE id = $1 AND org_id = $2")
            .bind(id)
            .bind(org_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        tx.commit().await?;

        Ok(())
    }

    /// List an organization's categories, parents before children.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, org_id: OrgId) -> Result<Vec<Category>, RepositoryError> {
        let categories = sqlx::query_as::<_, Category>(
            r"
            SELECT id, org_id, parent_id, name, depth
            FROM categories
            WHERE org_id = $1
            ORDER BY depth, name
            ",
        )
        .bind(org_id)
        .fetch_all(self.pool)
        .await?;

        Ok(categories)
    }
}

/// Fetch a category's depth or `NotFound`.
async fn fetch_depth(
    tx: &mut Transaction<'_, Postgres>,
    org_id: OrgId,
    id: CategoryId,
) -> Result<i16, RepositoryError> {
    sqlx::query_scalar::<_, i16>(
        "SELECT depth FROM categories WHERE id = $1 AND org_id = $2 FOR UPDATE",
    )
    .bind(id)
    .bind(org_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or(RepositoryError::NotFound)
}

/// Whether `candidate` lies inside the subtree rooted at `root`.
async fn is_descendant(
    tx: &mut Transaction<'_, Postgres>,
    org_id: OrgId,
    root: CategoryId,
    candidate: CategoryId,
) -> Result<bool, RepositoryError> {
    let found = sqlx::query_scalar::<_, bool>(
        r"
        WITH RECURSIVE subtree AS (
            SELECT id FROM categories WHERE id = $1 AND org_id = $2
            UNION ALL
            SELECT c.id FROM categories c
            JOIN subtree s ON c.parent_id = s.id
        )
        SELECT EXISTS (SELECT 1 FROM subtree WHERE id = $3)
        ",
    )
    .bind(root)
    .bind(org_id)
    .bind(candidate)
    .fetch_one(&mut **tx)
    .await?;

    Ok(found)
}
