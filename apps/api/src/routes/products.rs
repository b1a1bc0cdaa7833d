//! Product cards: products with batches and their traffic-light status.

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use rx_core::stock_status::{expiring_products, summarize, StockSummary};
use rx_core::{Batch, CoreError, Product, ProductStock};

use crate::error::ApiResult;
use crate::{AppState, AuthUser};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductQuery {
    pub branch_id: Option<String>,
    /// Only products with a batch expiring within this many days.
    pub expiring_within: Option<i64>,
}

/// One product card.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductCard {
    #[serde(flatten)]
    pub product: Product,
    pub batches: Vec<Batch>,
    #[serde(flatten)]
    pub summary: StockSummary,
}

#[derive(Debug, Serialize)]
pub struct ProductsResponse {
    pub products: Vec<ProductCard>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products))
        .route("/{id}", get(get_product))
}

fn card(stock: ProductStock, state: &AppState) -> ProductCard {
    let summary = summarize(&stock, &state.config.expiry, state.today());
    ProductCard {
        product: stock.product,
        batches: stock.batches,
        summary,
    }
}

/// `GET /api/products?branchId=&expiringWithin=`
async fn list_products(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ProductQuery>,
) -> ApiResult<Json<ProductsResponse>> {
    let stock = state
        .db
        .products()
        .list_with_batches(user.scope(query.branch_id.as_deref()))
        .await?;

    let stock = match query.expiring_within {
        Some(days) => expiring_products(&stock, days, state.today())
            .into_iter()
            .cloned()
            .collect(),
        None => stock,
    };

    let products = stock.into_iter().map(|s| card(s, &state)).collect();
    Ok(Json(ProductsResponse { products }))
}

async fn get_product(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<ProductCard>> {
    let stock = state
        .db
        .products()
        .get_with_batches(&id)
        .await?
        .ok_or_else(|| CoreError::product_not_found(id))?;

    Ok(Json(card(stock, &state)))
}
