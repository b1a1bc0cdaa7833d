//! # rx-db: Database Layer for RxPOS
//!
//! This crate provides database access for the RxPOS pharmacy system.
//! It uses SQLite with sqlx for async operations and owns every
//! transaction boundary: checkout, stock entry, scan confirmation, write-off.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         RxPOS Data Flow                                 │
//! │                                                                         │
//! │  rx-api handler (POST /api/sales/checkout)                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                      rx-db (THIS CRATE)                         │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ ProductRepo   │    │ 001_initial  │  │   │
//! │  │   │ SqlitePool    │◄───│ BatchLedger   │    │   _schema    │  │   │
//! │  │   │ WAL, FKs,     │    │ SaleRepo      │    │              │  │   │
//! │  │   │ busy_timeout  │    │ LedgerRepo    │    │              │  │   │
//! │  │   │               │    │ ScanRepo      │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (./rxpos.db)                │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rx_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("./rxpos.db")).await?;
//!
//! let stock = db.products().list_with_batches(Some("branch-1")).await?;
//! let sale_id = db.sales().checkout(&request, Some(&user_id), TotalPolicy::default()).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::batch::{BatchLedger, ReceiptOutcome, StockReconciliation, WriteOffOutcome};
pub use repository::ledger::{LedgerRepository, NewLedgerEntry};
pub use repository::product::ProductRepository;
pub use repository::sale::{SaleRepository, RECENT_SALES_LIMIT};
pub use repository::scanner::{ConfirmOutcome, ScanRepository, RECENT_SCANS_LIMIT, SYNCED_MESSAGE};
