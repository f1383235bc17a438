//! Support ticket repository.

use merchkins_core::{OrgId, TicketId, TicketPriority, TicketStatus, UserId};
use sqlx::PgPool;

use super::RepositoryError;
use crate::models::ticket::{Ticket, TicketMessage};

const SELECT_TICKET: &str = r"
    SELECT id, org_id, org_name, opened_by, assigned_to, subject, status,
           priority, created_at, updated_at
    FROM tickets
";

/// Repository for support tickets.
pub struct TicketRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> TicketRepository<'a> {
    /// Create a new ticket repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Open a ticket with its first message in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Invariant` for an empty subject or body.
    pub async fn open(
        &self,
        org_id: OrgId,
        org_name: &str,
        opened_by: UserId,
        subject: &str,
        body: &str,
        priority: TicketPriority,
    ) -> Result<(Ticket, TicketMessage), RepositoryError> {
        if subject.trim().is_empty() {
            return Err(RepositoryError::Invariant(
                "ticket subject cannot be empty".to_string(),
            ));
        }
        if body.trim().is_empty() {
            return Err(RepositoryError::Invariant(
                "ticket body cannot be empty".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        let ticket = sqlx::query_as::<_, Ticket>(
            r"
            INSERT INTO tickets (org_id, org_name, opened_by, subject, priority)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, org_id, org_name, opened_by, assigned_to, subject,
                      status, priority, created_at, updated_at
            ",
        )
        .bind(org_id)
        .bind(org_name)
        .bind(opened_by)
        .bind(subject)
        .bind(priority)
        .fetch_one(&mut *tx)
        .await?;

        let message = sqlx::query_as::<_, TicketMessage>(
            r"
            INSERT INTO ticket_messages (ticket_id, sender_id, body)
            VALUES ($1, $2, $3)
            RETURNING id, ticket_id, sender_id, body, created_at
            ",
        )
        .bind(ticket.id)
        .bind(opened_by)
        .bind(body)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok((ticket, message))
    }

    /// Reply on a ticket thread. Closed tickets refuse replies; replying to
    /// a resolved ticket reopens it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` for a closed ticket,
    /// `RepositoryError::NotFound` if the ticket isn't in this organization.
    pub async fn reply(
        &self,
        org_id: OrgId,
        ticket_id: TicketId,
        sender_id: UserId,
        body: &str,
    ) -> Result<TicketMessage, RepositoryError> {
        if body.trim().is_empty() {
            return Err(RepositoryError::Invariant(
                "reply body cannot be empty".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        let status = sqlx::query_scalar::<_, TicketStatus>(
            "SELECT status FROM tickets WHERE id = $1 AND org_id = $2 FOR UPDATE",
        )
        .bind(ticket_id)
        .bind(org_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        if !status.accepts_replies() {
            return Err(RepositoryError::Conflict(
                "ticket is closed".to_string(),
            ));
        }

        let message = sqlx::query_as::<_, TicketMessage>(
            r"
            INSERT INTO ticket_messages (ticket_id, sender_id, body)
            VALUES ($1, $2, $3)
            RETURNING id, ticket_id, sender_id, body, created_at
            ",
        )
        .bind(ticket_id)
        .bind(sender_id)
        .bind(body)
        .fetch_one(&mut *tx)
        .await?;

        let next = if status == TicketStatus::Resolved {
            TicketStatus::Open
        } else {
            status
        };
        sqlx::query(
            r"
            UPDATE tickets
            SET status = $1, updated_at = now()
            WHERE id = $2
            ",
        )
        .bind(next)
        .bind(ticket_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(message)
    }

    /// Assign the ticket to a staff member (or unassign with `None`).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the ticket isn't in this
    /// organization.
    pub async fn assign(
        &self,
        org_id: OrgId,
        ticket_id: TicketId,
        assigned_to: Option<UserId>,
    ) -> Result<Ticket, RepositoryError> {
        let ticket = sqlx::query_as::<_, Ticket>(
            r"
            UPDATE tickets
            SET assigned_to = $1, updated_at = now()
            WHERE id = $2 AND org_id = $3
            RETURNING id, org_id, org_name, opened_by, assigned_to, subject,
                      status, priority, created_at, updated_at
            ",
        )
        .bind(assigned_to)
        .bind(ticket_id)
        .bind(org_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(ticket)
    }

    /// Change a ticket's priority.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the ticket isn't in this
    /// organization.
    pub async fn set_priority(
        &self,
        org_id: OrgId,
        ticket_id: TicketId,
        priority: TicketPriority,
    ) -> Result<Ticket, RepositoryError> {
        let ticket = sqlx::query_as::<_, Ticket>(
            r"
            UPDATE tickets
            SET priority = $1, updated_at = now()
            WHERE id = $2 AND org_id = $3
            RETURNING id, org_id, org_name, opened_by, assigned_to, subject,
                      status, priority, created_at, updated_at
            ",
        )
        .bind(priority)
        .bind(ticket_id)
        .bind(org_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(ticket)
    }

    /// Move a ticket along the allowed status transitions.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` for a disallowed transition,
    /// `RepositoryError::NotFound` if the ticket isn't in this organization.
    pub async fn set_status(
        &self,
        org_id: OrgId,
        ticket_id: TicketId,
        new_status: TicketStatus,
    ) -> Result<Ticket, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_scalar::<_, TicketStatus>(
            "SELECT status FROM tickets WHERE id = $1 AND org_id = $2 FOR UPDATE",
        )
        .bind(ticket_id)
        .bind(org_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        if !current.can_transition_to(new_status) {
            return Err(RepositoryError::Conflict(format!(
                "cannot move ticket from {current} to {new_status}"
            )));
        }

        let ticket = sqlx::query_as::<_, Ticket>(
            r"
            UPDATE tickets
            SET status = $1, updated_at = now()
            WHERE id = $2
            RETURNING id, org_id, org_name, opened_by, assigned_to, subject,
                      status, priority, created_at, updated_at
            ",
        )
        .bind(new_status)
        .bind(ticket_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(ticket)
    }

    /// Get a ticket scoped to an organization.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        org_id: OrgId,
        ticket_id: TicketId,
    ) -> Result<Option<Ticket>, RepositoryError> {
        let ticket = sqlx::query_as::<_, Ticket>(&format!(
            "{SELECT_TICKET} WHERE id = $1 AND org_id = $2"
        ))
        .bind(ticket_id)
        .bind(org_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(ticket)
    }

    /// A ticket's thread, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_messages(
        &self,
        ticket_id: TicketId,
    ) -> Result<Vec<TicketMessage>, RepositoryError> {
        let messages = sqlx::query_as::<_, TicketMessage>(
            r"
            SELECT id, ticket_id, sender_id, body, created_at
            FROM ticket_messages
            WHERE ticket_id = $1
            ORDER BY created_at, id
            ",
        )
        .bind(ticket_id)
        .fetch_all(self.pool)
        .await?;

        Ok(messages)
    }

    /// List an organization's tickets for the staff queue: open ones first,
    /// then by priority, then most recently touched.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_org(
        &self,
        org_id: OrgId,
        status: Option<TicketStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Ticket>, RepositoryError> {
        let tickets = sqlx::query_as::<_, Ticket>(&format!(
            "{SELECT_TICKET}
             WHERE org_id = $1 AND ($2::ticket_status IS NULL OR status = $2)
             ORDER BY (status IN ($3, $4)) DESC, priority DESC, updated_at DESC
             LIMIT $5 OFFSET $6"
        ))
        .bind(org_id)
        .bind(status)
        .bind(TicketStatus::Open)
        .bind(TicketStatus::InProgress)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        Ok(tickets)
    }

    /// List the tickets a user has opened, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Ticket>, RepositoryError> {
        let tickets = sqlx::query_as::<_, Ticket>(&format!(
            "{SELECT_TICKET} WHERE opened_by = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(tickets)
    }
}
