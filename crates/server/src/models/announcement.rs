//! Announcement model.

use chrono::{DateTime, Utc};
use merchkins_core::{AnnouncementId, Audience, OrgId, UserId};
use serde::Serialize;

/// An organization announcement.
///
/// `org_name` is a denormalized snapshot refreshed on organization rename.
/// Title and body are mirrored into the full-text index; the database row
/// remains the source of truth.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Announcement {
    pub id: AnnouncementId,
    pub org_id: OrgId,
    pub org_name: String,
    pub author_id: UserId,
    pub title: String,
    pub body: String,
    pub audience: Audience,
    pub is_pinned: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
