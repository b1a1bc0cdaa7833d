//! # Repository Module
//!
//! Database repository implementations for RxPOS.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repositories and Transactions                        │
//! │                                                                         │
//! │  REST handler                                                           │
//! │       │  db.sales().checkout(&request, cashier, policy)                │
//! │       ▼                                                                 │
//! │  SaleRepository::checkout                                              │
//! │       │  let mut tx = begin_write(pool)        ← BEGIN IMMEDIATE        │
//! │       ├── product::fetch_by_ids(&mut tx)                               │
//! │       ├── batch::consume_in(&mut tx)                                   │
//! │       │     ├── product::adjust_stock       ← conditional UPDATE       │
//! │       │     └── batch::consume_batch                                   │
//! │       ├── sale::create_sale + create_sale_items                        │
//! │       ├── ledger::create_ledger_entry(&mut tx)                         │
//! │       └── tx.commit()        (any `?` before this drops tx → ROLLBACK) │
//! │                                                                         │
//! │  Every repository exposes pool-level methods for callers, and          │
//! │  connection-level helpers (`&mut SqliteConnection`) so one transaction │
//! │  can span several repositories.                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`](product::ProductRepository) - Products and product/batch views
//! - [`BatchLedger`](batch::BatchLedger) - Receive, consume, write off, reconcile
//! - [`SaleRepository`](sale::SaleRepository) - Checkout transaction and sale reads
//! - [`LedgerRepository`](ledger::LedgerRepository) - Financial ledger entries
//! - [`ScanRepository`](scanner::ScanRepository) - Scan verification and confirmation

use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::error::DbResult;

pub mod batch;
pub mod ledger;
pub mod product;
pub mod sale;
pub mod scanner;

/// Opens a write transaction with `BEGIN IMMEDIATE`.
///
/// The write lock is taken before the first read, so a second writer waits
/// on the busy timeout rather than failing on a stale WAL snapshot.
pub(crate) async fn begin_write(pool: &SqlitePool) -> DbResult<Transaction<'static, Sqlite>> {
    Ok(pool.begin_with("BEGIN IMMEDIATE").await?)
}

/// Generates a new record ID.
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
