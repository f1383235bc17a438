//! Support ticket models.

use chrono::{DateTime, Utc};
use merchkins_core::{OrgId, TicketId, TicketMessageId, TicketPriority, TicketStatus, UserId};
use serde::Serialize;

/// A support ticket opened against an organization.
///
/// `org_name` is a denormalized snapshot refreshed on organization rename.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Ticket {
    pub id: TicketId,
    pub org_id: OrgId,
    pub org_name: String,
    pub opened_by: UserId,
    pub assigned_to: Option<UserId>,
    pub subject: String,
    pub status: TicketStatus,
    pub priority: TicketPriority,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A message on a ticket thread.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TicketMessage {
    pub id: TicketMessageId,
    pub ticket_id: TicketId,
    pub sender_id: UserId,
    pub body: String,
    pub created_at: DateTime<Utc>,
}
