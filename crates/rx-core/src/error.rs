//! # Error Types
//!
//! Domain-specific error types for rx-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  rx-core errors (this file)                                            │
//! │  ├── CoreError        - Domain failures (not found, stock, totals)     │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  rx-db errors (separate crate)                                         │
//! │  └── DbError          - Persistence failures, wraps CoreError          │
//! │                                                                         │
//! │  REST errors (apps/api)                                                │
//! │  └── ApiError         - What the storefront sees (code + message)      │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ApiError → Storefront   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Error Kind
// =============================================================================

/// Coarse classification callers use to pick a status code or UI treatment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or missing input.
    Validation,
    /// A referenced record does not exist.
    NotFound,
    /// Requested quantity exceeds sellable stock.
    InsufficientStock,
    /// The operation conflicts with the record's current state.
    Conflict,
}

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// One or more products referenced by a request do not exist.
    ///
    /// ## When This Occurs
    /// - A cart line points at a product id that was never created
    /// - A stock entry row references a product from another database
    #[error("Product not found: {}", .ids.join(", "))]
    ProductNotFound { ids: Vec<String> },

    /// Insufficient stock to complete a sale or consumption.
    ///
    /// ## User Workflow
    /// ```text
    /// Checkout line (qty: 5)
    ///      │
    ///      ▼
    /// Check stock_level: 3
    ///      │
    ///      ▼
    /// InsufficientStock { product_name: "Paracetamol 500mg", available: 3, requested: 5 }
    ///      │
    ///      ▼
    /// Nothing is written. UI shows the message.
    /// ```
    #[error("Insufficient stock for {product_name}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        product_name: String,
        available: i64,
        requested: i64,
    },

    /// A batch reference does not exist or belongs to another product.
    #[error("Batch {batch} not found for product {product_id}")]
    BatchNotFound { product_id: String, batch: String },

    /// Sale not found.
    #[error("Sale not found: {0}")]
    SaleNotFound(String),

    /// Scan record not found.
    #[error("Scan not found: {0}")]
    ScanNotFound(String),

    /// A scan can only be confirmed into the ledger once.
    #[error("Scan {0} has already been confirmed")]
    ScanAlreadySynced(String),

    /// The declared checkout total differs from the sum of its lines.
    #[error("Total {declared} does not match line total {computed}")]
    TotalMismatch { declared: i64, computed: i64 },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates a not-found error for a single product id.
    pub fn product_not_found(id: impl Into<String>) -> Self {
        CoreError::ProductNotFound {
            ids: vec![id.into()],
        }
    }

    /// Returns the coarse kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::ProductNotFound { .. }
            | CoreError::BatchNotFound { .. }
            | CoreError::SaleNotFound(_)
            | CoreError::ScanNotFound(_) => ErrorKind::NotFound,
            CoreError::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            CoreError::ScanAlreadySynced(_) => ErrorKind::Conflict,
            CoreError::TotalMismatch { .. } | CoreError::Validation(_) => ErrorKind::Validation,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when input doesn't meet requirements.
/// Used for early validation before any stock is touched.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too short.
    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, invalid date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Collection must contain at least one element.
    #[error("{field} must not be empty")]
    Empty { field: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
