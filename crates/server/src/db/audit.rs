//! Audit log repository. Append-only.

use merchkins_core::{OrgId, UserId};
use sqlx::PgPool;

use super::RepositoryError;
use crate::models::audit::AuditLog;

/// Repository for the per-organization audit trail.
pub struct AuditRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AuditRepository<'a> {
    /// Create a new audit repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Append an audit record.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn append(
        &self,
        org_id: OrgId,
        actor_id: Option<UserId>,
        action: &str,
        entity_type: &str,
        entity_id: i64,
        detail: serde_json::Value,
    ) -> Result<AuditLog, RepositoryError> {
        let entry = sqlx::query_as::<_, AuditLog>(
            r"
            INSERT INTO audit_logs (org_id, actor_id, action, entity_type,
                                    entity_id, detail)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, org_id, actor_id, action, entity_type, entity_id,
                      detail, created_at
            ",
        )
        .bind(org_id)
        .bind(actor_id)
        .bind(action)
        .bind(entity_type)
        .bind(entity_id)
        .bind(detail)
        .fetch_one(self.pool)
        .await?;

        Ok(entry)
    }

    /// Page through an organization's audit trail, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_org(
        &self,
        org_id: OrgId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AuditLog>, RepositoryError> {
        let entries = sqlx::query_as::<_, AuditLog>(
            r"
            SELECT id, org_id, actor_id, action, entity_type, entity_id,
                   detail, created_at
            FROM audit_logs
            WHERE org_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            ",
        )
        .bind(org_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        Ok(entries)
    }
}
