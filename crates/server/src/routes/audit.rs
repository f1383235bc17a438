//! Audit trail handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use tracing::instrument;

use merchkins_core::Permission;

use crate::db::audit::AuditRepository;
use crate::error::Result;
use crate::middleware::auth::RequireAuth;
use crate::models::audit::AuditLog;
use crate::state::AppState;

use super::{Pagination, load_org, require_permission};

/// Page through an organization's audit trail (`view_reports`).
#[instrument(skip_all, fields(slug = %slug))]
pub async fn list(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(slug): Path<String>,
    Query(page): Query<Pagination>,
) -> Result<Json<Vec<AuditLog>>> {
    let org = load_org(&state, &slug).await?;
    require_permission(&state, &org, &user, Permission::ViewReports).await?;

    let entries = AuditRepository::new(state.pool())
        .list_for_org(org.id, page.limit(), page.offset())
        .await?;
    Ok(Json(entries))
}
