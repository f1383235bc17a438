//! Support ticket handlers.
//!
//! Anyone logged in can open a ticket against a storefront and reply on
//! their own threads. Assignment, priority, and status changes require
//! `manage_tickets`.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument};

use merchkins_core::{Permission, TicketId, TicketPriority, TicketStatus, UserId};

use crate::db::tickets::TicketRepository;
use crate::error::{AppError, Result};
use crate::middleware::auth::RequireAuth;
use crate::models::ticket::{Ticket, TicketMessage};
use crate::services::email::EmailService;
use crate::state::AppState;

use super::{Pagination, load_org, require_permission};

#[derive(Debug, Deserialize)]
pub struct OpenTicketPayload {
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub priority: TicketPriority,
}

#[derive(Debug, Deserialize)]
pub struct ReplyPayload {
    pub body: String,
}

/// Assignment, priority, and status in one PATCH; absent fields are left
/// alone. `assigned_to` uses explicit null to unassign.
#[derive(Debug, Deserialize)]
pub struct UpdateTicketPayload {
    #[serde(default, deserialize_with = "super::double_option")]
    pub assigned_to: Option<Option<UserId>>,
    pub priority: Option<TicketPriority>,
    pub status: Option<TicketStatus>,
}

#[derive(Debug, Deserialize)]
pub struct TicketListQuery {
    pub status: Option<TicketStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Ticket thread: the ticket and its messages.
#[derive(Debug, Serialize)]
pub struct TicketThread {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub messages: Vec<TicketMessage>,
}

/// Open a ticket with its first message.
#[instrument(skip_all, fields(slug = %slug))]
pub async fn open(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(slug): Path<String>,
    Json(payload): Json<OpenTicketPayload>,
) -> Result<(StatusCode, Json<TicketThread>)> {
    let org = load_org(&state, &slug).await?;

    let (ticket, message) = TicketRepository::new(state.pool())
        .open(
            org.id,
            &org.name,
            user.id,
            payload.subject.trim(),
            &payload.body,
            payload.priority,
        )
        .await?;

    state.audit().record(
        org.id,
        Some(user.id),
        "ticket.opened",
        "ticket",
        ticket.id.as_i64(),
        json!({ "subject": ticket.subject, "priority": ticket.priority }),
    );
    info!(ticket_id = %ticket.id, "ticket opened");

    Ok((
        StatusCode::CREATED,
        Json(TicketThread {
            ticket,
            messages: vec![message],
        }),
    ))
}

/// The caller's tickets across storefronts.
#[instrument(skip_all)]
pub async fn list_mine(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<Ticket>>> {
    let tickets = TicketRepository::new(state.pool())
        .list_for_user(user.id)
        .await?;
    Ok(Json(tickets))
}

/// Staff queue (`manage_tickets`): open tickets first, then priority.
#[instrument(skip_all, fields(slug = %slug))]
pub async fn list_for_org(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(slug): Path<String>,
    Query(query): Query<TicketListQuery>,
) -> Result<Json<Vec<Ticket>>> {
    let org = load_org(&state, &slug).await?;
    require_permission(&state, &org, &user, Permission::ManageTickets).await?;

    let page = Pagination::from_parts(query.limit, query.offset);
    let tickets = TicketRepository::new(state.pool())
        .list_for_org(org.id, query.status, page.limit(), page.offset())
        .await?;
    Ok(Json(tickets))
}

/// A ticket thread. Visible to its opener and to `manage_tickets` holders.
#[instrument(skip_all, fields(slug = %slug, ticket_id = %id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path((slug, id)): Path<(String, TicketId)>,
) -> Result<Json<TicketThread>> {
    let org = load_org(&state, &slug).await?;

    let repo = TicketRepository::new(state.pool());
    let ticket = repo
        .get(org.id, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("ticket {id}")))?;

    if ticket.opened_by != user.id {
        require_permission(&state, &org, &user, Permission::ManageTickets).await?;
    }

    let messages = repo.get_messages(id).await?;
    Ok(Json(TicketThread { ticket, messages }))
}

/// Reply on a ticket. The opener and `manage_tickets` holders may reply;
/// replying to a resolved ticket reopens it.
#[instrument(skip_all, fields(slug = %slug, ticket_id = %id))]
pub async fn reply(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path((slug, id)): Path<(String, TicketId)>,
    Json(payload): Json<ReplyPayload>,
) -> Result<(StatusCode, Json<TicketMessage>)> {
    let org = load_org(&state, &slug).await?;

    let repo = TicketRepository::new(state.pool());
    let ticket = repo
        .get(org.id, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("ticket {id}")))?;

    let is_staff = ticket.opened_by != user.id;
    if is_staff {
        require_permission(&state, &org, &user, Permission::ManageTickets).await?;
    }

    let message = repo.reply(org.id, id, user.id, &payload.body).await?;

    // Staff replies notify the customer, best-effort.
    if is_staff
        && let Some(email) = state.email()
        && let Ok(Some(opener)) = crate::db::users::UserRepository::new(state.pool())
            .get_by_id(ticket.opened_by)
            .await
    {
        let email = email.clone();
        let to = opener.email.as_str().to_string();
        let name = opener.display_name;
        let org_name = org.name.clone();
        let subject = ticket.subject.clone();
        EmailService::spawn_send(async move {
            email
                .send_ticket_update(&to, &name, &org_name, &subject, "You have a new reply")
                .await
        });
    }

    Ok((StatusCode::CREATED, Json(message)))
}

/// Assign, reprioritize, or move a ticket (`manage_tickets`).
#[instrument(skip_all, fields(slug = %slug, ticket_id = %id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path((slug, id)): Path<(String, TicketId)>,
    Json(payload): Json<UpdateTicketPayload>,
) -> Result<Json<Ticket>> {
    let org = load_org(&state, &slug).await?;
    require_permission(&state, &org, &user, Permission::ManageTickets).await?;

    let repo = TicketRepository::new(state.pool());

    let mut ticket = None;
    if let Some(assigned_to) = payload.assigned_to {
        ticket = Some(repo.assign(org.id, id, assigned_to).await?);
    }
    if let Some(priority) = payload.priority {
        ticket = Some(repo.set_priority(org.id, id, priority).await?);
    }
    if let Some(status) = payload.status {
        ticket = Some(repo.set_status(org.id, id, status).await?);
    }

    let ticket = ticket.ok_or_else(|| {
        AppError::BadRequest(
            "nothing to update: provide assigned_to, priority, and/or status".to_string(),
        )
    })?;

    state.audit().record(
        org.id,
        Some(user.id),
        "ticket.updated",
        "ticket",
        id.as_i64(),
        json!({
            "assigned_to": payload.assigned_to,
            "priority": payload.priority,
            "status": payload.status,
        }),
    );

    // Status changes notify the opener, best-effort.
    if let Some(status) = payload.status
        && ticket.opened_by != user.id
        && let Some(email) = state.email()
        && let Ok(Some(opener)) = crate::db::users::UserRepository::new(state.pool())
            .get_by_id(ticket.opened_by)
            .await
    {
        let email = email.clone();
        let to = opener.email.as_str().to_string();
        let name = opener.display_name;
        let org_name = org.name.clone();
        let subject = ticket.subject.clone();
        let update = format!("Your ticket is now {status}");
        EmailService::spawn_send(async move {
            email
                .send_ticket_update(&to, &name, &org_name, &subject, &update)
                .await
        });
    }

    Ok(Json(ticket))
}
