//! Scanner history, verification and confirmation.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;

use rx_core::receiving::{NewScan, StockReceipt};
use rx_core::ScanRecord;
use rx_db::{ConfirmOutcome, RECENT_SCANS_LIMIT};

use super::BranchQuery;
use crate::error::ApiResult;
use crate::{ApiJson, AppState, AuthUser};

#[derive(Debug, Serialize)]
pub struct ScansResponse {
    pub scans: Vec<ScanRecord>,
}

#[derive(Debug, Serialize)]
pub struct ScanResponse {
    pub scan: ScanRecord,
}

#[derive(Debug, Serialize)]
pub struct ConfirmResponse {
    pub message: &'static str,
    #[serde(flatten)]
    pub outcome: ConfirmOutcome,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_scans))
        .route("/verify", post(verify))
        .route("/{id}/confirm", post(confirm))
}

/// `GET /api/scanner?branchId=` → the 100 most recent scans.
async fn list_scans(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<BranchQuery>,
) -> ApiResult<Json<ScansResponse>> {
    let scans = state
        .db
        .scans()
        .list_scans(user.scope(query.branch_id.as_deref()), RECENT_SCANS_LIMIT)
        .await?;

    Ok(Json(ScansResponse { scans }))
}

/// `POST /api/scanner/verify` → `201 { scan }` in PENDING.
async fn verify(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(new_scan): ApiJson<NewScan>,
) -> ApiResult<(StatusCode, Json<ScanResponse>)> {
    let scan = state.db.scans().record_scan(&new_scan, Some(&user.user_id)).await?;
    Ok((StatusCode::CREATED, Json(ScanResponse { scan })))
}

/// `POST /api/scanner/{id}/confirm` with a stock receipt body.
async fn confirm(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<String>,
    ApiJson(receipt): ApiJson<StockReceipt>,
) -> ApiResult<Json<ConfirmResponse>> {
    let outcome = state.db.scans().confirm(&id, &receipt, state.today()).await?;

    Ok(Json(ConfirmResponse {
        message: "Scan confirmed",
        outcome,
    }))
}
