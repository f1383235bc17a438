//! Permission resolution with in-memory caching.
//!
//! A member's effective permissions are the role's base grants adjusted by
//! per-member overrides. Resolutions are cached with a short TTL via `moka`;
//! membership and override mutations invalidate the entry explicitly.

use std::collections::HashSet;
use std::time::Duration;

use merchkins_core::{MemberRole, OrgId, Permission, UserId};
use moka::future::Cache;
use sqlx::PgPool;

use crate::db::RepositoryError;
use crate::db::organizations::OrganizationRepository;

/// How long a cached resolution stays valid without invalidation.
const CACHE_TTL: Duration = Duration::from_secs(5 * 60);

const CACHE_CAPACITY: u64 = 10_000;

/// A member's resolved standing within an organization.
#[derive(Debug, Clone)]
pub struct ResolvedMember {
    pub role: MemberRole,
    pub permissions: HashSet<Permission>,
}

impl ResolvedMember {
    /// Whether this member holds a permission.
    #[must_use]
    pub fn has(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }
}

/// Cached permission resolution service.
#[derive(Clone)]
pub struct PermissionService {
    pool: PgPool,
    cache: Cache<(OrgId, UserId), Option<ResolvedMember>>,
}

impl PermissionService {
    /// Create a new permission service.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            cache: Cache::builder()
                .max_capacity(CACHE_CAPACITY)
                .time_to_live(CACHE_TTL)
                .build(),
        }
    }

    /// Resolve a user's membership and effective permissions in an
    /// organization. `None` means not an active member.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the lookup fails.
    pub async fn resolve(
        &self,
        org_id: OrgId,
        user_id: UserId,
    ) -> Result<Option<ResolvedMember>, RepositoryError> {
        if let Some(cached) = self.cache.get(&(org_id, user_id)).await {
            return Ok(cached);
        }

        let resolved = self.resolve_uncached(org_id, user_id).await?;
        self.cache.insert((org_id, user_id), resolved.clone()).await;

        Ok(resolved)
    }

    /// Whether the user holds a permission in the organization.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the lookup fails.
    pub async fn has(
        &self,
        org_id: OrgId,
        user_id: UserId,
        permission: Permission,
    ) -> Result<bool, RepositoryError> {
        Ok(self
            .resolve(org_id, user_id)
            .await?
            .is_some_and(|m| m.has(permission)))
    }

    /// Drop the cached resolution after a membership or override change.
    pub async fn invalidate(&self, org_id: OrgId, user_id: UserId) {
        self.cache.invalidate(&(org_id, user_id)).await;
    }

    async fn resolve_uncached(
        &self,
        org_id: OrgId,
        user_id: UserId,
    ) -> Result<Option<ResolvedMember>, RepositoryError> {
        let orgs = OrganizationRepository::new(&self.pool);

        let Some(member) = orgs.get_member(org_id, user_id).await? else {
            return Ok(None);
        };
        if !member.is_active {
            return Ok(None);
        }

        let mut permissions: HashSet<Permission> = Permission::ALL
            .iter()
            .copied()
            .filter(|p| p.granted_by_role(member.role))
            .collect();

        for over in orgs.list_permission_overrides(org_id, user_id).await? {
            if over.allowed {
                permissions.insert(over.permission);
            } else {
                permissions.remove(&over.permission);
            }
        }

        Ok(Some(ResolvedMember {
            role: member.role,
            permissions,
        }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_resolved_member_has() {
        let member = ResolvedMember {
            role: MemberRole::Staff,
            permissions: [Permission::ManageProducts].into_iter().collect(),
        };
        assert!(member.has(Permission::ManageProducts));
        assert!(!member.has(Permission::ManageOrg));
    }
}
