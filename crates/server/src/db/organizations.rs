//! Organization and membership repository.
//!
//! Membership mutations maintain the denormalized `member_count` /
//! `admin_count` columns and enforce the last-admin rule: no mutation may
//! leave an active organization without an active admin. Renames refresh
//! the `org_name` snapshots embedded on products, announcements, and
//! tickets in the same transaction.

use merchkins_core::{MemberRole, OrgId, Permission, Slug, UserId};
use rand::Rng;
use rand::distr::Alphanumeric;
use sqlx::{PgPool, Postgres, Transaction};

use super::RepositoryError;
use crate::models::organization::{
    MemberPermission, MemberWithUser, Organization, OrganizationMember,
};

const INVITE_CODE_LENGTH: usize = 12;

const SELECT_ORG: &str = r"
    SELECT id, name, slug, description, invite_code, is_active, is_deleted,
           member_count, admin_count, order_seq, created_at, updated_at
    FROM organizations
";

/// Generate a fresh invite code.
fn generate_invite_code() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(INVITE_CODE_LENGTH)
        .map(char::from)
        .collect()
}

/// Repository for organizations, memberships, and permission overrides.
pub struct OrganizationRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrganizationRepository<'a> {
    /// Create a new organization repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create an organization; the creator becomes its first admin.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn create(
        &self,
        name: &str,
        slug: &Slug,
        description: Option<&str>,
        creator: UserId,
    ) -> Result<Organization, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let org = sqlx::query_as::<_, Organization>(
            r"
            INSERT INTO organizations (name, slug, description, invite_code,
                                       member_count, admin_count)
            VALUES ($1, $2, $3, $4, 1, 1)
            RETURNING id, name, slug, description, invite_code, is_active,
                      is_deleted, member_count, admin_count, order_seq,
                      created_at, updated_at
            ",
        )
        .bind(name)
        .bind(slug)
        .bind(description)
        .bind(generate_invite_code())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "organization slug"))?;

        sqlx::query(
            r"
            INSERT INTO organization_members (org_id, user_id, role)
            VALUES ($1, $2, 'admin')
            ",
        )
        .bind(org.id)
        .bind(creator)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(org)
    }

    /// Get an organization by slug, excluding soft-deleted ones.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_slug(&self, slug: &Slug) -> Result<Option<Organization>, RepositoryError> {
        let org = sqlx::query_as::<_, Organization>(&format!(
            "{SELECT_ORG} WHERE slug = $1 AND NOT is_deleted"
        ))
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;

        Ok(org)
    }

    /// Get an organization by ID, excluding soft-deleted ones.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: OrgId) -> Result<Option<Organization>, RepositoryError> {
        let org = sqlx::query_as::<_, Organization>(&format!(
            "{SELECT_ORG} WHERE id = $1 AND NOT is_deleted"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(org)
    }

    /// List active organizations, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Organization>, RepositoryError> {
        let orgs = sqlx::query_as::<_, Organization>(&format!(
            "{SELECT_ORG} WHERE NOT is_deleted AND is_active
             ORDER BY created_at DESC LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        Ok(orgs)
    }

    /// Update name and/or description. A rename refreshes every denormalized
    /// `org_name` snapshot in the same transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the organization doesn't exist.
    pub async fn update(
        &self,
        org_id: OrgId,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<Organization, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let org = sqlx::query_as::<_, Organization>(
            r"
            UPDATE organizations
            SET name = COALESCE($1, name),
                description = COALESCE($2, description),
                updated_at = now()
            WHERE id = $3 AND NOT is_deleted
            RETURNING id, name, slug, description, invite_code, is_active,
                      is_deleted, member_count, admin_count, order_seq,
                      created_at, updated_at
            ",
        )
        .bind(name)
        .bind(description)
        .bind(org_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        if name.is_some() {
            refresh_org_name_snapshots(&mut tx, org_id, &org.name).await?;
        }

        tx.commit().await?;

        Ok(org)
    }

    /// Soft-delete an organization.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the organization doesn't exist.
    pub async fn soft_delete(&self, org_id: OrgId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE organizations
            SET is_deleted = TRUE, is_active = FALSE, updated_at = now()
            WHERE id = $1 AND NOT is_deleted
            ",
        )
        .bind(org_id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    /// Replace the invite code and return the new one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the organization doesn't exist.
    pub async fn rotate_invite_code(&self, org_id: OrgId) -> Result<String, RepositoryError> {
        let code = generate_invite_code();

        let result = sqlx::query(
            r"
            UPDATE organizations
            SET invite_code = $1, updated_at = now()
            WHERE id = $2 AND NOT is_deleted
            ",
        )
        .bind(&code)
        .bind(org_id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(code)
    }

    // =========================================================================
    // Membership
    // =========================================================================

    /// Get a user's membership row.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_member(
        &self,
        org_id: OrgId,
        user_id: UserId,
    ) -> Result<Option<OrganizationMember>, RepositoryError> {
        let member = sqlx::query_as::<_, OrganizationMember>(
            r"
            SELECT org_id, user_id, role, is_active, joined_at
            FROM organization_members
            WHERE org_id = $1 AND user_id = $2 AND is_active
            ",
        )
        .bind(org_id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(member)
    }

    /// List active members with user identity, admins first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_members(&self, org_id: OrgId) -> Result<Vec<MemberWithUser>, RepositoryError> {
        let members = sqlx::query_as::<_, MemberWithUser>(
            r"
            SELECT m.user_id, u.display_name, u.email, m.role, m.is_active,
                   m.joined_at
            FROM organization_members m
            JOIN users u ON u.id = m.user_id
            WHERE m.org_id = $1 AND m.is_active AND NOT u.is_deleted
            ORDER BY m.role, m.joined_at
            ",
        )
        .bind(org_id)
        .fetch_all(self.pool)
        .await?;

        Ok(members)
    }

    /// Join an organization as a member using its invite code.
    ///
    /// Rejoining after leaving re-activates the old membership row.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the invite code matches no
    /// active organization, `RepositoryError::Invariant` if the code belongs
    /// to a different organization than `org_id`, and
    /// `RepositoryError::Conflict` if already a member.
    pub async fn join_by_invite(
        &self,
        org_id: OrgId,
        invite_code: &str,
        user_id: UserId,
    ) -> Result<OrganizationMember, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let invite_org_id = sqlx::query_scalar::<_, OrgId>(
            r"
            SELECT id FROM organizations
            WHERE invite_code = $1 AND is_active AND NOT is_deleted
            FOR UPDATE
            ",
        )
        .bind(invite_code)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        // Checked before any row is written so a mismatched code cannot
        // leave a committed membership behind.
        if invite_org_id != org_id {
            return Err(RepositoryError::Invariant(
                "invite code does not belong to this organization".to_string(),
            ));
        }

        let existing = sqlx::query_as::<_, OrganizationMember>(
            r"
            SELECT org_id, user_id, role, is_active, joined_at
            FROM organization_members
            WHERE org_id = $1 AND user_id = $2
            ",
        )
        .bind(org_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let member = match existing {
            Some(m) if m.is_active => {
                return Err(RepositoryError::Conflict("already a member".to_string()));
            }
            Some(_) => {
                sqlx::query_as::<_, OrganizationMember>(
                    r"
                    UPDATE organization_members
                    SET is_active = TRUE, role = 'member', joined_at = now()
                    WHERE org_id = $1 AND user_id = $2
                    RETURNING org_id, user_id, role, is_active, joined_at
                    ",
                )
                .bind(org_id)
                .bind(user_id)
                .fetch_one(&mut *tx)
                .await?
            }
            None => {
                sqlx::query_as::<_, OrganizationMember>(
                    r"
                    INSERT INTO organization_members (org_id, user_id, role)
                    VALUES ($1, $2, 'member')
                    RETURNING org_id, user_id, role, is_active, joined_at
                    ",
                )
                .bind(org_id)
                .bind(user_id)
                .fetch_one(&mut *tx)
                .await?
            }
        };

        sqlx::query(
            r"
            UPDATE organizations
            SET member_count = member_count + 1, updated_at = now()
            WHERE id = $1
            ",
        )
        .bind(org_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(member)
    }

    /// Leave an organization. The last active admin cannot leave.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the user is the last admin,
    /// `RepositoryError::NotFound` if not an active member.
    pub async fn leave(&self, org_id: OrgId, user_id: UserId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        deactivate_member(&mut tx, org_id, user_id).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Remove a member (admin action). Same last-admin protection as leave.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the target is the last admin,
    /// `RepositoryError::NotFound` if not an active member.
    pub async fn remove_member(
        &self,
        org_id: OrgId,
        user_id: UserId,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        deactivate_member(&mut tx, org_id, user_id).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Change a member's role, maintaining `admin_count` and refusing to
    /// demote the last active admin.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` for a last-admin demotion,
    /// `RepositoryError::NotFound` if not an active member.
    pub async fn change_role(
        &self,
        org_id: OrgId,
        user_id: UserId,
        new_role: MemberRole,
    ) -> Result<OrganizationMember, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let (old_role, admin_count) = lock_member_and_counts(&mut tx, org_id, user_id).await?;

        if old_role == MemberRole::Admin && new_role != MemberRole::Admin && admin_count <= 1 {
            return Err(RepositoryError::Conflict(
                "cannot demote the last admin".to_string(),
            ));
        }

        let member = sqlx::query_as::<_, OrganizationMember>(
            r"
            UPDATE organization_members
            SET role = $1
            WHERE org_id = $2 AND user_id = $3
            RETURNING org_id, user_id, role, is_active, joined_at
            ",
        )
        .bind(new_role)
        .bind(org_id)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        let admin_delta = i32::from(new_role == MemberRole::Admin)
            - i32::from(old_role == MemberRole::Admin);
        if admin_delta != 0 {
            sqlx::query(
                r"
                UPDATE organizations
                SET admin_count = admin_count + $1, updated_at = now()
                WHERE id = $2
                ",
            )
            .bind(admin_delta)
            .bind(org_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(member)
    }

    // =========================================================================
    // Permission overrides
    // =========================================================================

    /// Upsert a permission override for a member.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_permission_override(
        &self,
        org_id: OrgId,
        user_id: UserId,
        permission: Permission,
        allowed: bool,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO member_permissions (org_id, user_id, permission, allowed)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (org_id, user_id, permission)
            DO UPDATE SET allowed = EXCLUDED.allowed
            ",
        )
        .bind(org_id)
        .bind(user_id)
        .bind(permission)
        .bind(allowed)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Remove a permission override, restoring the role default.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn clear_permission_override(
        &self,
        org_id: OrgId,
        user_id: UserId,
        permission: Permission,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            DELETE FROM member_permissions
            WHERE org_id = $1 AND user_id = $2 AND permission = $3
            ",
        )
        .bind(org_id)
        .bind(user_id)
        .bind(permission)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// List a member's permission overrides.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_permission_overrides(
        &self,
        org_id: OrgId,
        user_id: UserId,
    ) -> Result<Vec<MemberPermission>, RepositoryError> {
        let overrides = sqlx::query_as::<_, MemberPermission>(
            r"
            SELECT org_id, user_id, permission, allowed
            FROM member_permissions
            WHERE org_id = $1 AND user_id = $2
            ",
        )
        .bind(org_id)
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(overrides)
    }
}

/// Lock the member row and org counters; returns (role, `admin_count`).
async fn lock_member_and_counts(
    tx: &mut Transaction<'_, Postgres>,
    org_id: OrgId,
    user_id: UserId,
) -> Result<(MemberRole, i32), RepositoryError> {
    // Lock the org row first so concurrent membership mutations serialize.
    let admin_count = sqlx::query_scalar::<_, i32>(
        r"
        SELECT admin_count FROM organizations
        WHERE id = $1 AND NOT is_deleted
        FOR UPDATE
        ",
    )
    .bind(org_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or(RepositoryError::NotFound)?;

    let role = sqlx::query_scalar::<_, MemberRole>(
        r"
        SELECT role FROM organization_members
        WHERE org_id = $1 AND user_id = $2 AND is_active
        FOR UPDATE
        ",
    )
    .bind(org_id)
    .bind(user_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or(RepositoryError::NotFound)?;

    Ok((role, admin_count))
}

/// Deactivate a membership, maintaining counters and the last-admin rule.
async fn deactivate_member(
    tx: &mut Transaction<'_, Postgres>,
    org_id: OrgId,
    user_id: UserId,
) -> Result<(), RepositoryError> {
    let (role, admin_count) = lock_member_and_counts(tx, org_id, user_id).await?;

    if role == MemberRole::Admin && admin_count <= 1 {
        return Err(RepositoryError::Conflict(
            "cannot remove the last admin".to_string(),
        ));
    }

    sqlx::query(
        r"
        UPDATE organization_members
        SET is_active = FALSE
        WHERE org_id = $1 AND user_id = $2
        ",
    )
    .bind(org_id)
    .bind(user_id)
    .execute(&mut **tx)
    .await?;

    sqlx::query(
        r"
        UPDATE organizations
        SET member_count = member_count - 1,
            admin_count = admin_count - $1,
            updated_at = now()
        WHERE id = $2
        ",
    )
    .bind(i32::from(role == MemberRole::Admin))
    .bind(org_id)
    .execute(&mut **tx)
    .await?;

    // Overrides make no sense for a non-member.
    sqlx::query(
        r"
        DELETE FROM member_permissions
        WHERE org_id = $1 AND user_id = $2
        ",
    )
    .bind(org_id)
    .bind(user_id)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Refresh the denormalized `org_name` snapshots after a rename.
async fn refresh_org_name_snapshots(
    tx: &mut Transaction<'_, Postgres>,
    org_id: OrgId,
    new_name: &str,
) -> Result<(), RepositoryError> {
    for table in ["products", "announcements", "tickets"] {
        sqlx::query(&format!(
            "UPDATE {table} SET org_name = $1 WHERE org_id = $2"
        ))
        .bind(new_name)
        .bind(org_id)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invite_code_shape() {
        let code = generate_invite_code();
        assert_eq!(code.len(), INVITE_CODE_LENGTH);
        assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_invite_codes_differ() {
        assert_ne!(generate_invite_code(), generate_invite_code());
    }
}
