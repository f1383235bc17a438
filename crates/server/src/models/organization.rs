//! Organization and membership models.

use chrono::{DateTime, Utc};
use merchkins_core::{MemberRole, OrgId, Permission, Slug, UserId};
use serde::Serialize;

/// A tenant organization (storefront owner).
///
/// `member_count` and `admin_count` are denormalized and maintained by the
/// membership mutations; `order_seq` feeds per-org order numbers.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Organization {
    pub id: OrgId,
    pub name: String,
    pub slug: Slug,
    pub description: Option<String>,
    #[serde(skip_serializing)]
    pub invite_code: String,
    pub is_active: bool,
    pub is_deleted: bool,
    pub member_count: i32,
    pub admin_count: i32,
    #[serde(skip_serializing)]
    pub order_seq: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user's membership in an organization.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrganizationMember {
    pub org_id: OrgId,
    pub user_id: UserId,
    pub role: MemberRole,
    pub is_active: bool,
    pub joined_at: DateTime<Utc>,
}

/// Membership joined with user identity, for member listings.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MemberWithUser {
    pub user_id: UserId,
    pub display_name: String,
    pub email: String,
    pub role: MemberRole,
    pub is_active: bool,
    pub joined_at: DateTime<Utc>,
}

/// A per-member permission override. `allowed = true` grants a permission
/// the role lacks; `false` revokes one the role grants.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MemberPermission {
    pub org_id: OrgId,
    pub user_id: UserId,
    pub permission: Permission,
    pub allowed: bool,
}
