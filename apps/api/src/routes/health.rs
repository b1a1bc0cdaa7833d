use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use rx_db::migrations::migration_status;

use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: bool,
    pub migrations_applied: usize,
    pub migrations_total: usize,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

/// `{ "status": "ok" }` while the database answers, 503 otherwise.
async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let database = state.db.health_check().await;
    let (total, applied) = migration_status(state.db.pool()).await.unwrap_or((0, 0));

    let (code, status) = if database {
        (StatusCode::OK, "ok")
    } else {
        tracing::warn!("Health check failed: database unavailable");
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        code,
        Json(HealthResponse {
            status,
            database,
            migrations_applied: applied,
            migrations_total: total,
        }),
    )
}
