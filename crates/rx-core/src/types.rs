//! # Domain Types
//!
//! Core domain records used throughout RxPOS.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐ 1   * ┌─────────────────┐                          │
//! │  │    Product      │───────│     Batch       │                          │
//! │  │  ─────────────  │       │  ─────────────  │                          │
//! │  │  stock_level    │       │  batch_number   │ UNIQUE(product, number)  │
//! │  │  min_stock_level│       │  quantity ≥ 0   │                          │
//! │  │  unit_price     │       │  expiry_date    │                          │
//! │  └─────────────────┘       └─────────────────┘                          │
//! │                                                                         │
//! │  ┌─────────────────┐ 1   * ┌─────────────────┐   ┌─────────────────┐    │
//! │  │      Sale       │───────│    SaleItem     │   │  LedgerEntry    │    │
//! │  │  payment_method │       │  batch_id?      │   │  INCOME "Sales" │    │
//! │  │  total          │       │  unit_price     │   │  amount = total │    │
//! │  └─────────────────┘       └─────────────────┘   └─────────────────┘    │
//! │                                                                         │
//! │  ┌─────────────────┐ 1   * ┌─────────────────┐   ┌─────────────────┐    │
//! │  │   ScanRecord    │───────│    SyncLog      │   │ StockAdjustment │    │
//! │  │  PENDING→SYNCED │       │  old/new qty    │   │ WRITEOFF/RETURN │    │
//! │  └─────────────────┘       └─────────────────┘   └─────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Wire format is camelCase; enums are SCREAMING_SNAKE_CASE on the wire and
//! lowercase snake_case in the database.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::stock_status;

// =============================================================================
// Product
// =============================================================================

/// A product stocked by one branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Product {
    pub id: String,

    /// Branch that owns this product.
    pub branch_id: String,

    /// English display name.
    pub name_en: String,

    /// Myanmar display name.
    pub name_mm: Option<String>,

    pub category: String,

    /// Price in the smallest currency unit.
    pub unit_price: i64,

    /// Unit of measure ("strip", "bottle", "tablet").
    pub unit: String,

    /// Aggregate sellable quantity. Authoritative for sale eligibility.
    pub stock_level: i64,

    /// At or below this level the product is classified `low`.
    pub min_stock_level: i64,

    /// Shelf location.
    pub location: Option<String>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the unit price as Money.
    #[inline]
    pub fn price(&self) -> Money {
        Money::new(self.unit_price)
    }

    /// Checks if `quantity` can be sold from the current stock level.
    pub fn can_sell(&self, quantity: i64) -> bool {
        self.stock_level >= quantity
    }
}

// =============================================================================
// Batch
// =============================================================================

/// A dated, costed quantity of one product received together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Batch {
    pub id: String,
    pub product_id: String,
    pub batch_number: String,
    pub quantity: i64,
    #[ts(as = "String")]
    pub expiry_date: NaiveDate,
    /// Cost per unit in the smallest currency unit.
    pub cost_price: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Batch {
    /// Whole calendar days from `today` until this batch expires (negative once past).
    #[inline]
    pub fn days_until_expiry(&self, today: NaiveDate) -> i64 {
        stock_status::days_until(self.expiry_date, today)
    }

    /// True once the expiry date is strictly before `today`.
    #[inline]
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.expiry_date < today
    }

    #[inline]
    pub fn cost(&self) -> Money {
        Money::new(self.cost_price)
    }
}

/// A product together with all of its batches.
///
/// This is the view the classifier, the POS product cards and the expiry
/// tracker read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProductStock {
    pub product: Product,
    pub batches: Vec<Batch>,
}

// =============================================================================
// Payment Method
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum PaymentMethod {
    Cash,
    Card,
    /// KBZPay mobile wallet.
    KbzPay,
    /// Sold on account.
    Credit,
}

// =============================================================================
// Sale
// =============================================================================

/// The status of a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum SaleStatus {
    /// Paid and stock already decremented.
    Completed,
    /// Reversed by a refund flow.
    Refunded,
}

impl Default for SaleStatus {
    fn default() -> Self {
        SaleStatus::Completed
    }
}

/// A completed checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Sale {
    pub id: String,
    pub branch_id: String,
    pub customer_id: Option<String>,
    /// Authenticated user who rang up the sale.
    pub cashier_id: Option<String>,
    pub payment_method: PaymentMethod,
    pub total: i64,
    pub status: SaleStatus,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Sale {
    #[inline]
    pub fn total(&self) -> Money {
        Money::new(self.total)
    }
}

/// A line item of a sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    pub quantity: i64,
    /// Unit price charged, frozen at checkout.
    pub unit_price: i64,
    /// Batch the units were taken from, when the cashier picked one.
    pub batch_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl SaleItem {
    pub fn line_total(&self) -> Money {
        Money::new(self.unit_price) * self.quantity
    }
}

/// A sale with its line items, as returned to the receipt printer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SaleDetail {
    pub sale: Sale,
    pub items: Vec<SaleItem>,
}

// =============================================================================
// Financial Ledger
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum LedgerEntryType {
    Income,
    Expense,
}

/// Category used for ledger rows written by checkout.
pub const SALES_LEDGER_CATEGORY: &str = "Sales";

/// An append-only financial ledger row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LedgerEntry {
    pub id: String,
    pub branch_id: String,
    #[serde(rename = "type")]
    pub entry_type: LedgerEntryType,
    pub category: String,
    pub amount: i64,
    pub description: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    pub sale_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Scanner
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum SyncStatus {
    /// Scanned, waiting for a cashier to confirm.
    Pending,
    /// Confirmed into the batch ledger.
    Synced,
    Failed,
}

/// A barcode scan awaiting (or past) confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ScanRecord {
    pub id: String,
    pub branch_id: String,
    pub user_id: Option<String>,
    pub gtin: Option<String>,
    pub product_name: Option<String>,
    pub batch_number: Option<String>,
    #[ts(as = "Option<String>")]
    pub expiry_date: Option<NaiveDate>,
    pub quantity: i64,
    pub unit: Option<String>,
    /// Undecoded scanner payload.
    pub raw_data: String,
    pub verified: bool,
    pub sync_status: SyncStatus,
    pub sync_message: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum SyncAction {
    /// The confirm created the product.
    Create,
    /// The confirm added stock to an existing product.
    Update,
}

/// Audit row written when a scan is confirmed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SyncLog {
    pub id: String,
    pub scan_id: String,
    pub action: SyncAction,
    pub product_name: Option<String>,
    /// Product stock level before the confirm; `None` when the product was created.
    pub old_quantity: Option<i64>,
    pub new_quantity: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Stock Adjustments
// =============================================================================

/// Why batch quantity left the shelf without a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
pub enum AdjustmentReason {
    /// Destroyed (expired or damaged).
    #[serde(rename = "WRITEOFF")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "writeoff"))]
    WriteOff,
    /// Sent back to the supplier.
    #[serde(rename = "RETURN")]
    Return,
}

/// Audit row written by every write-off or return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct StockAdjustment {
    pub id: String,
    pub product_id: String,
    pub batch_id: String,
    pub batch_number: String,
    pub reason: AdjustmentReason,
    pub requested_quantity: i64,
    /// What was actually removed after clamping at zero.
    pub removed_quantity: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}
