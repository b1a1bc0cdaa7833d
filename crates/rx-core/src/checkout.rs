//! # Checkout Rules
//!
//! The pure half of the checkout transaction: request shape validation, the
//! total policy, and the per-line stock sufficiency check. The database half
//! (one transaction that re-checks and decrements) lives in rx-db.
//!
//! ## Checkout Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CheckoutRequest                                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  validate(policy)        ← cart size, quantities, prices, total         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  distinct_product_ids    ← one batch read in rx-db                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  verify_stock            ← cart order, first shortfall wins             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  rx-db: decrement + sale + items + ledger entry, all or nothing         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{PaymentMethod, Product};
use crate::validation::{validate_cart_size, validate_id, validate_price, validate_quantity};

// =============================================================================
// Request Types
// =============================================================================

/// One line of a checkout cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CheckoutLine {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price: i64,
    #[serde(default)]
    pub batch_id: Option<String>,
}

impl CheckoutLine {
    pub fn line_total(&self) -> Option<Money> {
        Money::new(self.unit_price).checked_line_total(self.quantity)
    }
}

/// A checkout as submitted by the POS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CheckoutRequest {
    pub branch_id: String,
    #[serde(default)]
    pub customer_id: Option<String>,
    pub payment_method: PaymentMethod,
    pub items: Vec<CheckoutLine>,
    pub total: i64,
}

/// How the declared total is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TotalPolicy {
    /// Recompute Σ quantity × unit_price and reject a mismatch.
    #[default]
    RequireMatch,
    /// Accept the caller's total as is.
    Trust,
}

impl std::str::FromStr for TotalPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "require_match" => Ok(TotalPolicy::RequireMatch),
            "trust" => Ok(TotalPolicy::Trust),
            other => Err(format!("unknown total policy '{}'", other)),
        }
    }
}

// =============================================================================
// Validation
// =============================================================================

impl CheckoutRequest {
    /// Validates request shape and, under `RequireMatch`, the declared total.
    ///
    /// Runs before any read, so a malformed cart never touches the database.
    pub fn validate(&self, policy: TotalPolicy) -> CoreResult<()> {
        validate_id("branchId", &self.branch_id)?;
        if let Some(customer_id) = &self.customer_id {
            validate_id("customerId", customer_id)?;
        }
        validate_cart_size(self.items.len())?;

        for line in &self.items {
            validate_id("productId", &line.product_id)?;
            validate_quantity(line.quantity)?;
            validate_price("unitPrice", line.unit_price)?;
            if let Some(batch_id) = &line.batch_id {
                validate_id("batchId", batch_id)?;
            }
        }

        validate_price("total", self.total)?;

        if policy == TotalPolicy::RequireMatch {
            let computed = self.computed_total()?;
            if computed.amount() != self.total {
                return Err(CoreError::TotalMismatch {
                    declared: self.total,
                    computed: computed.amount(),
                });
            }
        }

        Ok(())
    }

    /// Σ quantity × unit_price over all lines.
    pub fn computed_total(&self) -> CoreResult<Money> {
        self.items.iter().try_fold(Money::zero(), |acc, line| {
            line.line_total()
                .and_then(|t| acc.checked_add(t))
                .ok_or_else(|| {
                    CoreError::Validation(ValidationError::OutOfRange {
                        field: "total".to_string(),
                        min: 0,
                        max: i64::MAX,
                    })
                })
        })
    }

    /// Distinct product ids in first-seen cart order.
    pub fn distinct_product_ids(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.items
            .iter()
            .filter(|line| seen.insert(line.product_id.as_str()))
            .map(|line| line.product_id.clone())
            .collect()
    }

    /// Number of cart lines, used in the ledger description.
    pub fn item_count(&self) -> usize {
        self.items.len()
    }
}

/// Description of the ledger entry written for a sale.
pub fn ledger_description(line_count: usize) -> String {
    format!("POS Sale ({} items)", line_count)
}

// =============================================================================
// Stock Verification
// =============================================================================

/// Returns the requested ids that did not resolve, in request order.
pub fn missing_products(requested: &[String], found: &[Product]) -> Vec<String> {
    let found: HashSet<&str> = found.iter().map(|p| p.id.as_str()).collect();
    requested
        .iter()
        .filter(|id| !found.contains(id.as_str()))
        .cloned()
        .collect()
}

/// Checks each line against the resolved products, in cart order.
///
/// Lines for the same product are checked individually, matching the
/// per-line rule; the conditional decrement in rx-db catches a cumulative
/// shortfall across duplicate lines.
pub fn verify_stock(items: &[CheckoutLine], products: &[Product]) -> CoreResult<()> {
    let by_id: HashMap<&str, &Product> = products.iter().map(|p| (p.id.as_str(), p)).collect();

    for line in items {
        let product = by_id
            .get(line.product_id.as_str())
            .ok_or_else(|| CoreError::product_not_found(line.product_id.clone()))?;

        if !product.can_sell(line.quantity) {
            return Err(CoreError::InsufficientStock {
                product_id: product.id.clone(),
                product_name: product.name_en.clone(),
                available: product.stock_level,
                requested: line.quantity,
            });
        }
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
