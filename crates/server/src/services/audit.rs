//! Audit trail recording.
//!
//! Writes are fire-and-forget: a failed audit insert is logged but never
//! fails the mutation it describes.

use merchkins_core::{OrgId, UserId};
use sqlx::PgPool;

use crate::db::audit::AuditRepository;

/// Records organization-scoped mutations to the audit trail.
#[derive(Clone)]
pub struct AuditService {
    pool: PgPool,
}

impl AuditService {
    /// Create a new audit service.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Record a mutation in the background.
    pub fn record(
        &self,
        org_id: OrgId,
        actor_id: Option<UserId>,
        action: &str,
        entity_type: &str,
        entity_id: i64,
        detail: serde_json::Value,
    ) {
        let pool = self.pool.clone();
        let action = action.to_string();
        let entity_type = entity_type.to_string();

        tokio::spawn(async move {
            let repo = AuditRepository::new(&pool);
            if let Err(e) = repo
                .append(org_id, actor_id, &action, &entity_type, entity_id, detail)
                .await
            {
                tracing::warn!(
                    error = %e,
                    action = %action,
                    entity_type = %entity_type,
                    "Audit record failed"
                );
            }
        });
    }
}
