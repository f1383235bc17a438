//! Shared domain types.

pub mod email;
pub mod id;
pub mod money;
pub mod permission;
pub mod slug;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use money::{CurrencyCode, Discount};
pub use permission::Permission;
pub use slug::{Slug, SlugError};
pub use status::{
    Audience, MemberRole, OrderStatus, PaymentMethod, PaymentStatus, RefundStatus, TicketPriority,
    TicketStatus,
};
