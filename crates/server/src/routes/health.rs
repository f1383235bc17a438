//! Health and readiness probes.

use axum::{Json, extract::State, http::StatusCode};
use serde_json::{Value, json};

use crate::state::AppState;

/// Liveness probe. Always returns 200 while the process is up.
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Readiness probe: checks the database and reports search index state.
///
/// The search index builds in the background after startup, so readiness
/// does not gate on it; its state is reported for operators.
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let db_ok = sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(state.pool())
        .await
        .is_ok();

    let status = if db_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "database": if db_ok { "ok" } else { "unavailable" },
            "search": if state.search().is_ready() { "ready" } else { "building" },
        })),
    )
}
