//! # Validation Module
//!
//! Input validation utilities for RxPOS.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Storefront                                                    │
//! │  ├── Basic format checks (empty, length)                               │
//! │  └── Immediate user feedback                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: REST handler                                                  │
//! │  ├── Type validation (deserialization)                                 │
//! │  └── THIS MODULE: field rules, run before any stock is touched         │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (stock_level >= 0), CHECK (quantity >= 0)                   │
//! │  ├── UNIQUE (product_id, batch_number)                                 │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use rx_core::validation::{validate_id, validate_quantity};
//!
//! validate_id("productId", "prod-amox-250").unwrap();
//! validate_quantity(5).unwrap();
//! assert!(validate_quantity(0).is_err());
//! ```

use crate::error::ValidationError;
use crate::MAX_RECEIPT_QUANTITY;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Minimum length of an undecoded scanner payload.
pub const MIN_RAW_SCAN_LENGTH: usize = 4;

// =============================================================================
// Identifier Validators
// =============================================================================

/// Validates an opaque identifier (product ids accept any non-empty string).
pub fn validate_id(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.len() > 64 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 64,
        });
    }

    Ok(())
}

// =============================================================================
// String Validators
// =============================================================================

/// Validates a product display name.
///
/// ## Rules
/// - Must not be empty
/// - At most 200 characters
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.chars().count() > 200 {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates a supplier batch (lot) number.
///
/// ## Rules
/// - Must not be empty
/// - At most 64 characters
/// - No whitespace inside the number
pub fn validate_batch_number(batch_number: &str) -> ValidationResult<()> {
    let trimmed = batch_number.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::Required {
            field: "batchNumber".to_string(),
        });
    }

    if trimmed.len() > 64 {
        return Err(ValidationError::TooLong {
            field: "batchNumber".to_string(),
            max: 64,
        });
    }

    if trimmed.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidFormat {
            field: "batchNumber".to_string(),
            reason: "must not contain spaces".to_string(),
        });
    }

    Ok(())
}

/// Validates the raw payload read by the barcode scanner.
pub fn validate_raw_scan(raw: &str) -> ValidationResult<()> {
    if raw.trim().chars().count() < MIN_RAW_SCAN_LENGTH {
        return Err(ValidationError::TooShort {
            field: "rawData".to_string(),
            min: MIN_RAW_SCAN_LENGTH,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a checkout line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - No upper bound; stock sufficiency is checked against the store
///
/// ## Example
/// ```rust
/// use rx_core::validation::validate_quantity;
///
/// assert!(validate_quantity(1).is_ok());
/// assert!(validate_quantity(0).is_err());
/// assert!(validate_quantity(-1).is_err());
/// ```
pub fn validate_quantity(quantity: i64) -> ValidationResult<()> {
    if quantity <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    Ok(())
}

/// Validates the quantity of a stock receipt row.
pub fn validate_receipt_quantity(quantity: i64) -> ValidationResult<()> {
    if quantity <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if quantity > MAX_RECEIPT_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_RECEIPT_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price or cost in the smallest currency unit.
///
/// Zero is allowed (free samples, unknown cost).
pub fn validate_price(field: &str, amount: i64) -> ValidationResult<()> {
    if amount < 0 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates the number of lines in a checkout. Any non-empty cart is accepted.
pub fn validate_cart_size(lines: usize) -> ValidationResult<()> {
    if lines == 0 {
        return Err(ValidationError::Empty {
            field: "items".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_id() {
        assert!(validate_id("productId", "p1").is_ok());
        assert!(validate_id("productId", "").is_err());
        assert!(validate_id("productId", "   ").is_err());
        assert!(validate_id("productId", &"x".repeat(65)).is_err());
    }

    #[test]
    fn test_validate_product_name() {
        assert!(validate_product_name("Paracetamol 500mg").is_ok());
        assert!(validate_product_name("").is_err());
        assert!(validate_product_name(&"a".repeat(201)).is_err());
    }

    #[test]
    fn test_validate_batch_number() {
        assert!(validate_batch_number("LOT-2026-A").is_ok());
        assert!(validate_batch_number("").is_err());
        assert!(validate_batch_number("LOT 1").is_err());
        assert!(validate_batch_number(&"9".repeat(65)).is_err());
    }

    #[test]
    fn test_validate_raw_scan() {
        assert!(validate_raw_scan("0109501101530008").is_ok());
        assert!(validate_raw_scan("abcd").is_ok());
        assert!(validate_raw_scan("abc").is_err());
        assert!(validate_raw_scan("  ab  ").is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(10_000).is_ok());
        assert!(validate_quantity(250_000).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-3).is_err());
    }

    #[test]
    fn test_validate_receipt_quantity() {
        assert!(validate_receipt_quantity(500).is_ok());
        assert!(validate_receipt_quantity(0).is_err());
        assert!(validate_receipt_quantity(MAX_RECEIPT_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_validate_price() {
        assert!(validate_price("unitPrice", 0).is_ok());
        assert!(validate_price("unitPrice", 1500).is_ok());
        assert!(validate_price("costPrice", -1).is_err());
    }

    #[test]
    fn test_validate_cart_size() {
        assert!(validate_cart_size(1).is_ok());
        assert!(validate_cart_size(250).is_ok());
        assert!(matches!(
            validate_cart_size(0),
            Err(ValidationError::Empty { .. })
        ));
    }
}
