//! # RxPOS API
//!
//! REST server for the pharmacy storefront: checkout, products with stock
//! status, stock entry, write-offs, the expiry tracker and the scanner.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                            RxPOS API                                    │
//! │                                                                         │
//! │  GET  /health                                  (no auth)                │
//! │                                                                         │
//! │  /api  ── AuthUser (Bearer JWT) ──┐                                     │
//! │    sales      checkout, list, get │                                     │
//! │    products   list + status       ├──► rx-db repositories ──► SQLite    │
//! │    inventory  stock-entry, write- │                                     │
//! │               off, expiry, recon. │                                     │
//! │    scanner    list, verify,       │                                     │
//! │               confirm ────────────┘                                     │
//! │                                                                         │
//! │  TraceLayer: one span per request          CorsLayer: any origin        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! Environment variables:
//! - `JWT_SECRET` - Secret for JWT signing (required, at least 16 characters)
//! - `PORT` - HTTP port (default: 4000)
//! - `DATABASE_PATH` - SQLite file (default: ./rxpos.db)
//! - `DB_MAX_CONNECTIONS` - Pool size (default: 5)
//! - `EXPIRY_WARNING_DAYS` / `EXPIRY_CRITICAL_DAYS` - (default: 90 / 180)
//! - `CHECKOUT_TOTAL_POLICY` - `require_match` (default) or `trust`

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::extract::FromRequest;
use axum::response::{IntoResponse, Response};
use axum::Router;
use chrono::{Local, NaiveDate};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use rx_db::Database;

// Re-exports
pub use auth::{AuthUser, JwtManager};
pub use config::{ApiConfig, ConfigError};
pub use error::{ApiError, ApiResult};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<ApiConfig>,
    pub jwt: Arc<JwtManager>,
}

impl AppState {
    pub fn new(db: Database, config: ApiConfig) -> Self {
        let jwt = JwtManager::new(&config.jwt_secret, config.token_lifetime_secs);
        AppState {
            db,
            config: Arc::new(config),
            jwt: Arc::new(jwt),
        }
    }

    /// The calendar date expiry math runs against.
    pub fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// JSON body extractor whose rejection is an [`ApiError`].
#[derive(Debug, Clone, Copy, Default, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

impl<T: serde::Serialize> IntoResponse for ApiJson<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

/// Builds the application router with all routes and middleware.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(routes::health::routes())
        .nest("/api", routes::api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
