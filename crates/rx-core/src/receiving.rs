//! # Stock Receiving
//!
//! Request types for stock entry, scan confirmation, scan verification and
//! write-offs, and the pure rules that turn them into batch-ledger writes.
//!
//! ## Receipt Resolution
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  StockReceipt (stock entry row or scan confirm body)                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  resolve()                                                              │
//! │       ├── product_id        → ProductRef::Existing                      │
//! │       └── new_product       → ProductRef::New (created, stock 0)        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ReceiptPlan                                                            │
//! │       ├── batch_number_for(product_id)                                  │
//! │       │     given number, or AUTO-{productId}-{YYYYMMDD} of the expiry  │
//! │       ├── create: expiry or today, cost or 0                            │
//! │       └── update: expiry / cost only when given                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreResult, ValidationError};
use crate::types::AdjustmentReason;
use crate::validation::{
    validate_batch_number, validate_id, validate_price, validate_product_name, validate_raw_scan,
    validate_receipt_quantity, ValidationResult,
};
use crate::DEFAULT_MIN_STOCK_LEVEL;

/// Unit used when a new product does not name one.
pub const DEFAULT_UNIT: &str = "pcs";

/// Deterministic batch number for receipts that carry none.
///
/// ## Example
/// ```rust
/// use chrono::NaiveDate;
/// use rx_core::receiving::derive_batch_number;
///
/// let expiry = NaiveDate::from_ymd_opt(2027, 3, 31).unwrap();
/// assert_eq!(derive_batch_number("p1", expiry), "AUTO-p1-20270331");
/// ```
pub fn derive_batch_number(product_id: &str, expiry: NaiveDate) -> String {
    format!("AUTO-{}-{}", product_id, expiry.format("%Y%m%d"))
}

// =============================================================================
// Stock Receipt
// =============================================================================

/// A product to create on first receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewProduct {
    pub branch_id: String,
    pub name_en: String,
    #[serde(default)]
    pub name_mm: Option<String>,
    pub category: String,
    pub unit_price: i64,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub min_stock_level: Option<i64>,
}

impl NewProduct {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_id("branchId", &self.branch_id)?;
        validate_product_name(&self.name_en)?;
        if self.category.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "category".to_string(),
            });
        }
        validate_price("unitPrice", self.unit_price)?;
        if let Some(min) = self.min_stock_level {
            validate_price("minStockLevel", min)?;
        }
        Ok(())
    }

    pub fn min_stock_level(&self) -> i64 {
        self.min_stock_level.unwrap_or(DEFAULT_MIN_STOCK_LEVEL)
    }
}

/// Which product a receipt lands on.
#[derive(Debug, Clone, PartialEq)]
pub enum ProductRef {
    Existing(String),
    New(NewProduct),
}

/// One stock entry row, also the body of a scan confirmation.
///
/// Exactly one of `product_id` and `new_product` must be set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct StockReceipt {
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub new_product: Option<NewProduct>,
    pub quantity: i64,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub batch_number: Option<String>,
    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub expiry_date: Option<NaiveDate>,
    #[serde(default)]
    pub cost_price: Option<i64>,
    #[serde(default)]
    pub location: Option<String>,
}

impl StockReceipt {
    /// Receipt of `quantity` units onto an existing product.
    pub fn existing(product_id: impl Into<String>, quantity: i64) -> Self {
        Self {
            product_id: Some(product_id.into()),
            new_product: None,
            quantity,
            unit: None,
            batch_number: None,
            expiry_date: None,
            cost_price: None,
            location: None,
        }
    }

    pub fn with_batch(mut self, batch_number: impl Into<String>) -> Self {
        self.batch_number = Some(batch_number.into());
        self
    }

    pub fn with_expiry(mut self, expiry: NaiveDate) -> Self {
        self.expiry_date = Some(expiry);
        self
    }

    pub fn with_cost(mut self, cost_price: i64) -> Self {
        self.cost_price = Some(cost_price);
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Validates the row and fixes the defaults that depend on `today`.
    pub fn resolve(&self, today: NaiveDate) -> CoreResult<ReceiptPlan> {
        let product = match (&self.product_id, &self.new_product) {
            (Some(id), None) => {
                validate_id("productId", id)?;
                ProductRef::Existing(id.clone())
            }
            (None, Some(new_product)) => {
                new_product.validate()?;
                let mut new_product = new_product.clone();
                if new_product.unit.is_none() {
                    new_product.unit = self.unit.clone();
                }
                ProductRef::New(new_product)
            }
            (Some(_), Some(_)) => {
                return Err(ValidationError::InvalidFormat {
                    field: "productId".to_string(),
                    reason: "give either productId or newProduct, not both".to_string(),
                }
                .into())
            }
            (None, None) => {
                return Err(ValidationError::Required {
                    field: "productId".to_string(),
                }
                .into())
            }
        };

        validate_receipt_quantity(self.quantity)?;
        if let Some(cost) = self.cost_price {
            validate_price("costPrice", cost)?;
        }
        let batch_number = match &self.batch_number {
            Some(number) if !number.trim().is_empty() => {
                validate_batch_number(number)?;
                Some(number.trim().to_string())
            }
            _ => None,
        };

        Ok(ReceiptPlan {
            product,
            batch_number,
            quantity: self.quantity,
            expiry_date: self.expiry_date,
            cost_price: self.cost_price,
            location: self.location.clone().filter(|l| !l.trim().is_empty()),
            today,
        })
    }
}

/// A validated receipt ready for the batch ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptPlan {
    pub product: ProductRef,
    pub batch_number: Option<String>,
    pub quantity: i64,
    /// Only set on update when the receipt named one.
    pub expiry_date: Option<NaiveDate>,
    /// Only set on update when the receipt named one.
    pub cost_price: Option<i64>,
    pub location: Option<String>,
    pub today: NaiveDate,
}

impl ReceiptPlan {
    /// Expiry written when the batch is created.
    pub fn create_expiry(&self) -> NaiveDate {
        self.expiry_date.unwrap_or(self.today)
    }

    /// Cost written when the batch is created.
    pub fn create_cost(&self) -> i64 {
        self.cost_price.unwrap_or(0)
    }

    pub fn batch_number_for(&self, product_id: &str) -> String {
        match &self.batch_number {
            Some(number) => number.clone(),
            None => derive_batch_number(product_id, self.create_expiry()),
        }
    }
}

/// Bulk stock entry body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct StockEntryRequest {
    pub entries: Vec<StockReceipt>,
}

impl StockEntryRequest {
    pub fn resolve(&self, today: NaiveDate) -> CoreResult<Vec<ReceiptPlan>> {
        if self.entries.is_empty() {
            return Err(ValidationError::Empty {
                field: "entries".to_string(),
            }
            .into());
        }
        self.entries.iter().map(|e| e.resolve(today)).collect()
    }
}

// =============================================================================
// Write-Off
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct WriteOffRequest {
    pub product_id: String,
    pub batch_number: String,
    pub quantity: i64,
    pub reason: AdjustmentReason,
}

impl WriteOffRequest {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_id("productId", &self.product_id)?;
        validate_batch_number(&self.batch_number)?;
        validate_receipt_quantity(self.quantity)
    }
}

// =============================================================================
// Scan Verification
// =============================================================================

/// A raw scan submitted for later confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewScan {
    pub branch_id: String,
    #[serde(default)]
    pub gtin: Option<String>,
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub batch_number: Option<String>,
    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub expiry_date: Option<NaiveDate>,
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub unit: Option<String>,
    pub raw_data: String,
}

impl NewScan {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_id("branchId", &self.branch_id)?;
        validate_raw_scan(&self.raw_data)?;
        if let Some(quantity) = self.quantity {
            validate_price("quantity", quantity)?;
        }
        Ok(())
    }

    /// Quantity stored on the pending record.
    pub fn quantity(&self) -> i64 {
        self.quantity.unwrap_or(0)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
