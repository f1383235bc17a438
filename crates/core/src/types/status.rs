//! Status and role enums shared across the platform.
//!
//! Enums that are persisted derive `sqlx::Type` behind the `postgres`
//! feature and map to Postgres enum types created by the migrations.

use serde::{Deserialize, Serialize};

/// Role of a user inside an organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "member_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    /// Full control of the organization, including membership and settings.
    Admin,
    /// Operational access: catalog, orders, refunds, announcements, tickets.
    Staff,
    /// A customer of the organization's storefront.
    Member,
}

impl std::fmt::Display for MemberRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Admin => write!(f, "admin"),
            Self::Staff => write!(f, "staff"),
            Self::Member => write!(f, "member"),
        }
    }
}

impl std::str::FromStr for MemberRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "staff" => Ok(Self::Staff),
            "member" => Ok(Self::Member),
            _ => Err(format!("invalid member role: {s}")),
        }
    }
}

/// Order lifecycle status.
///
/// Transitions: `Pending -> Processing -> Shipped -> Delivered`, with
/// cancellation allowed from `Pending` and `Processing` only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        })
    }
}

impl OrderStatus {
    /// Whether this status may transition to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing | Self::Cancelled)
                | (Self::Processing, Self::Shipped | Self::Cancelled)
                | (Self::Shipped, Self::Delivered)
        )
    }

    /// Terminal states accept no further transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }
}

/// Payment method used for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "payment_method", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    BankTransfer,
    Cash,
}

/// Payment record status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "payment_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Succeeded,
    Failed,
    Refunded,
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
        })
    }
}

/// Refund request lifecycle.
///
/// Transitions: `Requested -> Approved -> Refunded` and
/// `Requested -> Rejected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "refund_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    #[default]
    Requested,
    Approved,
    Rejected,
    Refunded,
}

impl std::fmt::Display for RefundStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Requested => "requested",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Refunded => "refunded",
        })
    }
}

impl RefundStatus {
    /// Whether this status may transition to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Requested, Self::Approved | Self::Rejected)
                | (Self::Approved, Self::Refunded)
        )
    }

    /// An open request blocks filing another for the same order.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Requested | Self::Approved)
    }
}

/// Support ticket status.
///
/// Transitions: `Open -> InProgress -> Resolved -> Closed`, plus reopening
/// a resolved ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "ticket_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    #[default]
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Open => "open",
            Self::InProgress => "in progress",
            Self::Resolved => "resolved",
            Self::Closed => "closed",
        })
    }
}

impl TicketStatus {
    /// Whether this status may transition to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Open, Self::InProgress | Self::Resolved)
                | (Self::InProgress, Self::Resolved)
                | (Self::Resolved, Self::Closed | Self::Open)
        )
    }

    /// Closed tickets accept no replies.
    #[must_use]
    pub const fn accepts_replies(self) -> bool {
        !matches!(self, Self::Closed)
    }
}

/// Support ticket priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default, PartialOrd, Ord)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "ticket_priority", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum TicketPriority {
    Low,
    #[default]
    Normal,
    High,
}

/// Who may see an announcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "announcement_audience", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    /// Anyone, including anonymous visitors.
    #[default]
    Public,
    /// Any active member of the organization.
    Members,
    /// Staff and admins only.
    Staff,
}

impl Audience {
    /// Whether a viewer with the given role (None = not a member) may see
    /// content with this audience.
    #[must_use]
    pub const fn visible_to(self, role: Option<MemberRole>) -> bool {
        match self {
            Self::Public => true,
            Self::Members => role.is_some(),
            Self::Staff => matches!(role, Some(MemberRole::Admin | MemberRole::Staff)),
        }
    }

    /// Stable string form, matching the database enum labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Members => "members",
            Self::Staff => "staff",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_happy_path() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Processing));
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Shipped));
        assert!(OrderStatus::Shipped.can_transition_to(OrderStatus::Delivered));
    }

    #[test]
    fn test_order_status_cancellation_window() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Cancelled));
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Cancelled));
    }

    #[test]
    fn test_order_status_no_backwards_moves() {
        assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Pending));
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Processing));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Pending));
    }

    #[test]
    fn test_order_terminal_states() {
        assert!(OrderStatus::Delivered.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(!OrderStatus::Processing.is_terminal());
    }

    #[test]
    fn test_refund_status_flow() {
        assert!(RefundStatus::Requested.can_transition_to(RefundStatus::Approved));
        assert!(RefundStatus::Requested.can_transition_to(RefundStatus::Rejected));
        assert!(RefundStatus::Approved.can_transition_to(RefundStatus::Refunded));
        assert!(!RefundStatus::Rejected.can_transition_to(RefundStatus::Approved));
        assert!(!RefundStatus::Refunded.can_transition_to(RefundStatus::Requested));
    }

    #[test]
    fn test_refund_open_states() {
        assert!(RefundStatus::Requested.is_open());
        assert!(RefundStatus::Approved.is_open());
        assert!(!RefundStatus::Rejected.is_open());
        assert!(!RefundStatus::Refunded.is_open());
    }

    #[test]
    fn test_ticket_status_flow() {
        assert!(TicketStatus::Open.can_transition_to(TicketStatus::InProgress));
        assert!(TicketStatus::InProgress.can_transition_to(TicketStatus::Resolved));
        assert!(TicketStatus::Resolved.can_transition_to(TicketStatus::Closed));
        // Reopening is allowed from resolved only
        assert!(TicketStatus::Resolved.can_transition_to(TicketStatus::Open));
        assert!(!TicketStatus::Closed.can_transition_to(TicketStatus::Open));
    }

    #[test]
    fn test_ticket_replies() {
        assert!(TicketStatus::Open.accepts_replies());
        assert!(TicketStatus::Resolved.accepts_replies());
        assert!(!TicketStatus::Closed.accepts_replies());
    }

    #[test]
    fn test_ticket_priority_ordering() {
        assert!(TicketPriority::High > TicketPriority::Normal);
        assert!(TicketPriority::Normal > TicketPriority::Low);
    }

    #[test]
    fn test_audience_visibility() {
        assert!(Audience::Public.visible_to(None));
        assert!(!Audience::Members.visible_to(None));
        assert!(Audience::Members.visible_to(Some(MemberRole::Member)));
        assert!(!Audience::Staff.visible_to(Some(MemberRole::Member)));
        assert!(Audience::Staff.visible_to(Some(MemberRole::Staff)));
        assert!(Audience::Staff.visible_to(Some(MemberRole::Admin)));
    }

    #[test]
    fn test_member_role_parse() {
        assert_eq!("admin".parse::<MemberRole>(), Ok(MemberRole::Admin));
        assert_eq!("staff".parse::<MemberRole>(), Ok(MemberRole::Staff));
        assert!("owner".parse::<MemberRole>().is_err());
    }
}
