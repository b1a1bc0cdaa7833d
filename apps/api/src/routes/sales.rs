//! Checkout and sale history.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tracing::info;

use rx_core::checkout::CheckoutRequest;
use rx_core::{CoreError, SaleDetail};
use rx_db::{DbError, RECENT_SALES_LIMIT};

use super::BranchQuery;
use crate::error::{ApiError, ApiResult};
use crate::{ApiJson, AppState, AuthUser};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub sale_id: String,
}

#[derive(Debug, Serialize)]
pub struct SalesResponse {
    pub sales: Vec<SaleDetail>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_sales))
        .route("/checkout", post(checkout))
        .route("/{id}", get(get_sale))
}

/// `POST /api/sales/checkout` → `201 { saleId }`.
async fn checkout(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(request): ApiJson<CheckoutRequest>,
) -> ApiResult<(StatusCode, Json<CheckoutResponse>)> {
    let sale_id = state
        .db
        .sales()
        .checkout(&request, Some(&user.user_id), state.config.total_policy)
        .await
        .map_err(checkout_error)?;

    info!(sale_id = %sale_id, user_id = %user.user_id, "Sale recorded");

    Ok((StatusCode::CREATED, Json(CheckoutResponse { sale_id })))
}

/// Unknown cart products are a bad request, not a missing resource.
fn checkout_error(error: DbError) -> ApiError {
    let not_found = matches!(error, DbError::Domain(CoreError::ProductNotFound { .. }));
    let api: ApiError = error.into();
    if not_found {
        api.with_status(StatusCode::BAD_REQUEST)
    } else {
        api
    }
}

/// `GET /api/sales?branchId=` → the 50 most recent sales with items.
async fn list_sales(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<BranchQuery>,
) -> ApiResult<Json<SalesResponse>> {
    let sales = state
        .db
        .sales()
        .list_recent(user.scope(query.branch_id.as_deref()), RECENT_SALES_LIMIT)
        .await?;

    Ok(Json(SalesResponse { sales }))
}

async fn get_sale(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<SaleDetail>> {
    let sale = state
        .db
        .sales()
        .get_sale(&id)
        .await?
        .ok_or(CoreError::SaleNotFound(id))?;

    Ok(Json(sale))
}
