//! Audit log model.

use chrono::{DateTime, Utc};
use merchkins_core::{AuditLogId, OrgId, UserId};
use serde::Serialize;

/// An append-only audit record for an organization-scoped mutation.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AuditLog {
    pub id: AuditLogId,
    pub org_id: OrgId,
    pub actor_id: Option<UserId>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: i64,
    pub detail: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
