//! HTTP routes.
//!
//! Every module exposes `routes()`; [`api_routes`] nests them under `/api`.

pub mod health;
pub mod inventory;
pub mod products;
pub mod sales;
pub mod scanner;

use axum::Router;
use serde::Deserialize;

use crate::AppState;

/// `?branchId=` filter shared by the list endpoints.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchQuery {
    pub branch_id: Option<String>,
}

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/sales", sales::routes())
        .nest("/products", products::routes())
        .nest("/inventory", inventory::routes())
        .nest("/scanner", scanner::routes())
}
