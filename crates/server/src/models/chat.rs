//! Chat room and message models.

use chrono::{DateTime, Utc};
use merchkins_core::{ChatMessageId, ChatRoomId, OrgId, UserId};
use serde::Serialize;

/// A conversation between a customer and an organization's staff.
///
/// The unread counters are denormalized: posting a message increments the
/// counterpart's counter, fetching messages as that side resets it.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ChatRoom {
    pub id: ChatRoomId,
    pub org_id: OrgId,
    pub customer_id: UserId,
    pub subject: String,
    pub last_message_at: Option<DateTime<Utc>>,
    pub unread_for_customer: i32,
    pub unread_for_staff: i32,
    pub created_at: DateTime<Utc>,
}

/// A single chat message.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ChatMessage {
    pub id: ChatMessageId,
    pub room_id: ChatRoomId,
    pub sender_id: UserId,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Which side of the conversation is acting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatSide {
    Customer,
    Staff,
}
