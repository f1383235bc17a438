//! Chat repository.
//!
//! One room per (organization, customer) pair. Posting bumps the other
//! side's unread counter and the room's `last_message_at`; reading as a
//! side resets that side's counter. Both happen in the message transaction.

use merchkins_core::{ChatRoomId, OrgId, UserId};
use sqlx::PgPool;

use super::RepositoryError;
use crate::models::chat::{ChatMessage, ChatRoom, ChatSide};

const SELECT_ROOM: &str = r"
    SELECT id, org_id, customer_id, subject, last_message_at,
           unread_for_customer, unread_for_staff, created_at
    FROM chat_rooms
";

/// Repository for customer-to-staff chat.
pub struct ChatRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ChatRepository<'a> {
    /// Create a new chat repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Open the customer's room with an organization, creating it on first
    /// contact. The subject sticks from the first open.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn open_room(
        &self,
        org_id: OrgId,
        customer_id: UserId,
        subject: &str,
    ) -> Result<ChatRoom, RepositoryError> {
        let room = sqlx::query_as::<_, ChatRoom>(
            r"
            INSERT INTO chat_rooms (org_id, customer_id, subject)
            VALUES ($1, $2, $3)
            ON CONFLICT (org_id, customer_id)
            DO UPDATE SET org_id = EXCLUDED.org_id
            RETURNING id, org_id, customer_id, subject, last_message_at,
                      unread_for_customer, unread_for_staff, created_at
            ",
        )
        .bind(org_id)
        .bind(customer_id)
        .bind(subject)
        .fetch_one(self.pool)
        .await?;

        Ok(room)
    }

    /// Get a room scoped to an organization.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_room(
        &self,
        org_id: OrgId,
        room_id: ChatRoomId,
    ) -> Result<Option<ChatRoom>, RepositoryError> {
        let room = sqlx::query_as::<_, ChatRoom>(&format!(
            "{SELECT_ROOM} WHERE id = $1 AND org_id = $2"
        ))
        .bind(room_id)
        .bind(org_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(room)
    }

    /// Post a message into a room, bumping the counterpart's unread count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the room doesn't exist.
    pub async fn post_message(
        &self,
        room_id: ChatRoomId,
        sender_id: UserId,
        side: ChatSide,
        body: &str,
    ) -> Result<ChatMessage, RepositoryError> {
        if body.trim().is_empty() {
            return Err(RepositoryError::Invariant(
                "message body cannot be empty".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        let message = sqlx::query_as::<_, ChatMessage>(
            r"
            INSERT INTO chat_messages (room_id, sender_id, body)
            VALUES ($1, $2, $3)
            RETURNING id, room_id, sender_id, body, created_at
            ",
        )
        .bind(room_id)
        .bind(sender_id)
        .bind(body)
        .fetch_one(&mut *tx)
        .await?;

        let bump = match side {
            ChatSide::Customer => "unread_for_staff = unread_for_staff + 1",
            ChatSide::Staff => "unread_for_customer = unread_for_customer + 1",
        };
        let result = sqlx::query(&format!(
            "UPDATE chat_rooms SET {bump}, last_message_at = $1 WHERE id = $2"
        ))
        .bind(message.created_at)
        .bind(room_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        tx.commit().await?;

        Ok(message)
    }

    /// Fetch a room's messages oldest first, resetting the reader's unread
    /// counter.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_messages(
        &self,
        room_id: ChatRoomId,
        reader: ChatSide,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let reset = match reader {
            ChatSide::Customer => "unread_for_customer = 0",
            ChatSide::Staff => "unread_for_staff = 0",
        };
        sqlx::query(&format!("UPDATE chat_rooms SET {reset} WHERE id = $1"))
            .bind(room_id)
            .execute(&mut *tx)
            .await?;

        let messages = sqlx::query_as::<_, ChatMessage>(
            r"
            SELECT id, room_id, sender_id, body, created_at
            FROM chat_messages
            WHERE room_id = $1
            ORDER BY created_at, id
            LIMIT $2 OFFSET $3
            ",
        )
        .bind(room_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(messages)
    }

    /// List an organization's rooms for the staff inbox, most recently
    /// active first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_rooms_for_org(
        &self,
        org_id: OrgId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ChatRoom>, RepositoryError> {
        let rooms = sqlx::query_as::<_, ChatRoom>(&format!(
            "{SELECT_ROOM}
             WHERE org_id = $1
             ORDER BY last_message_at DESC NULLS LAST, created_at DESC
             LIMIT $2 OFFSET $3"
        ))
        .bind(org_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        Ok(rooms)
    }

    /// List the customer's rooms across organizations.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_rooms_for_customer(
        &self,
        customer_id: UserId,
    ) -> Result<Vec<ChatRoom>, RepositoryError> {
        let rooms = sqlx::query_as::<_, ChatRoom>(&format!(
            "{SELECT_ROOM}
             WHERE customer_id = $1
             ORDER BY last_message_at DESC NULLS LAST, created_at DESC"
        ))
        .bind(customer_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rooms)
    }
}
