//! Permission codes for organization-scoped authorization.

use serde::{Deserialize, Serialize};

use super::status::MemberRole;

/// A permission code checked before organization-scoped mutations.
///
/// Roles grant a base set (see [`Permission::granted_by_role`]);
/// per-member overrides stored in the database win over the role default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "permission_code", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Organization settings, membership, roles, invite codes.
    ManageOrg,
    /// Products, variants, and categories.
    ManageProducts,
    /// Order status transitions and payment records.
    ManageOrders,
    /// Refund request decisions.
    ManageRefunds,
    /// Announcement CRUD.
    ManageAnnouncements,
    /// Ticket assignment, priority, and status.
    ManageTickets,
    /// Audit logs and order listings.
    ViewReports,
}

impl Permission {
    /// All permission codes.
    pub const ALL: [Self; 7] = [
        Self::ManageOrg,
        Self::ManageProducts,
        Self::ManageOrders,
        Self::ManageRefunds,
        Self::ManageAnnouncements,
        Self::ManageTickets,
        Self::ViewReports,
    ];

    /// Whether the given role grants this permission by default.
    ///
    /// Admin holds everything; staff holds everything operational but not
    /// [`Permission::ManageOrg`]; members hold nothing.
    #[must_use]
    pub const fn granted_by_role(self, role: MemberRole) -> bool {
        match role {
            MemberRole::Admin => true,
            MemberRole::Staff => !matches!(self, Self::ManageOrg),
            MemberRole::Member => false,
        }
    }

    /// Stable string form used in audit log entries.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ManageOrg => "manage_org",
            Self::ManageProducts => "manage_products",
            Self::ManageOrders => "manage_orders",
            Self::ManageRefunds => "manage_refunds",
            Self::ManageAnnouncements => "manage_announcements",
            Self::ManageTickets => "manage_tickets",
            Self::ViewReports => "view_reports",
        }
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manage_org" => Ok(Self::ManageOrg),
            "manage_products" => Ok(Self::ManageProducts),
            "manage_orders" => Ok(Self::ManageOrders),
            "manage_refunds" => Ok(Self::ManageRefunds),
            "manage_announcements" => Ok(Self::ManageAnnouncements),
            "manage_tickets" => Ok(Self::ManageTickets),
            "view_reports" => Ok(Self::ViewReports),
            _ => Err(format!("invalid permission code: {s}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_holds_everything() {
        for p in Permission::ALL {
            assert!(p.granted_by_role(MemberRole::Admin), "{p} missing for admin");
        }
    }

    #[test]
    fn test_staff_holds_all_but_manage_org() {
        assert!(!Permission::ManageOrg.granted_by_role(MemberRole::Staff));
        assert!(Permission::ManageProducts.granted_by_role(MemberRole::Staff));
        assert!(Permission::ManageTickets.granted_by_role(MemberRole::Staff));
        assert!(Permission::ViewReports.granted_by_role(MemberRole::Staff));
    }

    #[test]
    fn test_member_holds_nothing() {
        for p in Permission::ALL {
            assert!(!p.granted_by_role(MemberRole::Member), "{p} leaked to member");
        }
    }

    #[test]
    fn test_string_roundtrip() {
        for p in Permission::ALL {
            let parsed: Permission = p.as_str().parse().unwrap();
            assert_eq!(parsed, p);
        }
        assert!("manage_everything".parse::<Permission>().is_err());
    }
}
