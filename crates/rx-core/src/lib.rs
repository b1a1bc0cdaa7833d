//! # rx-core: Pure Business Logic for RxPOS
//!
//! This crate contains the pharmacy rules as pure functions with zero I/O
//! dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         RxPOS Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Storefront (browser)                         │   │
//! │  │    POS ──► Stock Entry ──► Scanner ──► Expiry Tracker           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ REST (apps/api)                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ rx-core (THIS CRATE) ★                          │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌──────────────┐  ┌───────────┐  ┌─────────┐  │   │
//! │  │   │   types   │  │ stock_status │  │ checkout  │  │receiving│  │   │
//! │  │   │  Product  │  │  classifier  │  │  rules    │  │ batches │  │   │
//! │  │   │  Batch    │  │  expiry math │  │  totals   │  │ numbers │  │   │
//! │  │   └───────────┘  └──────────────┘  └───────────┘  └─────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    rx-db (Database Layer)                       │   │
//! │  │        Batch ledger, checkout transaction, scanner sync         │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain records (Product, Batch, Sale, LedgerEntry, ScanRecord)
//! - [`money`] - Integer money in the smallest currency unit
//! - [`error`] - Domain error types
//! - [`validation`] - Field-level input rules
//! - [`stock_status`] - Traffic-light classifier and expiry predicates
//! - [`checkout`] - Checkout request validation and stock verification
//! - [`receiving`] - Stock receipt resolution and batch number derivation
//! - [`cart`] - Branch-scoped client store cache and cart
//!
//! ## Example Usage
//!
//! ```rust
//! use chrono::NaiveDate;
//! use rx_core::stock_status::{is_near_expiry, days_until};
//!
//! let today = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
//! let expiry = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
//! assert_eq!(days_until(expiry, today), 59);
//! ```

pub mod cart;
pub mod checkout;
pub mod error;
pub mod money;
pub mod receiving;
pub mod stock_status;
pub mod types;
pub mod validation;

pub use error::{CoreError, CoreResult, ErrorKind, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Low-stock threshold applied when a product does not set its own.
pub const DEFAULT_MIN_STOCK_LEVEL: i64 = 10;

/// Days ahead at which the POS warns (but still allows) adding a batch to the cart.
pub const DEFAULT_EXPIRY_WARNING_DAYS: i64 = 90;

/// Days ahead at which the classifier reports a product as `expired`.
pub const DEFAULT_EXPIRY_CRITICAL_DAYS: i64 = 180;

/// Maximum quantity accepted by a single stock receipt row.
pub const MAX_RECEIPT_QUANTITY: i64 = 1_000_000;
