//! Stock entry, write-offs, the expiry tracker and reconciliation.

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tracing::info;

use rx_core::receiving::{StockEntryRequest, WriteOffRequest};
use rx_core::stock_status::{expiry_report, ExpiryReport};
use rx_db::{ReceiptOutcome, StockReconciliation, WriteOffOutcome};

use super::BranchQuery;
use crate::error::ApiResult;
use crate::{ApiJson, AppState, AuthUser};

#[derive(Debug, Serialize)]
pub struct StockEntryResponse {
    pub message: &'static str,
    pub entries: Vec<ReceiptOutcome>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/stock-entry", post(stock_entry))
        .route("/write-off", post(write_off))
        .route("/expiry", get(expiry))
        .route("/reconcile/{product_id}", get(reconcile))
}

/// `POST /api/inventory/stock-entry` with `{ entries: [...] }`, all-or-nothing.
async fn stock_entry(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(request): ApiJson<StockEntryRequest>,
) -> ApiResult<Json<StockEntryResponse>> {
    let plans = request.resolve(state.today())?;
    let entries = state.db.batches().receive_all(&plans).await?;

    info!(user_id = %user.user_id, rows = entries.len(), "Stock entries recorded");

    Ok(Json(StockEntryResponse {
        message: "Stock entries recorded",
        entries,
    }))
}

async fn write_off(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(request): ApiJson<WriteOffRequest>,
) -> ApiResult<Json<WriteOffOutcome>> {
    let outcome = state.db.batches().write_off(&request).await?;

    info!(
        user_id = %user.user_id,
        product_id = %request.product_id,
        removed = outcome.adjustment.removed_quantity,
        "Write-off recorded"
    );

    Ok(Json(outcome))
}

/// `GET /api/inventory/expiry?branchId=`
async fn expiry(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<BranchQuery>,
) -> ApiResult<Json<ExpiryReport>> {
    let stock = state
        .db
        .products()
        .list_with_batches(user.scope(query.branch_id.as_deref()))
        .await?;

    Ok(Json(expiry_report(&stock, state.today())))
}

async fn reconcile(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(product_id): Path<String>,
) -> ApiResult<Json<StockReconciliation>> {
    let recon = state.db.batches().stock_discrepancy(&product_id).await?;
    Ok(Json(recon))
}
