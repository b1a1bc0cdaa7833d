//! # Money Module
//!
//! Provides the `Money` type for prices, costs and sale totals.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Every price in the pharmacy is an integer in the smallest currency     │
//! │  unit. The storefront formats it, the database stores INTEGER, and      │
//! │  checkout totals are exact sums of quantity × unit price.               │
//! │                                                                         │
//! │    3 × 500 = 1500        (never 1499.9999)                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use rx_core::money::Money;
//!
//! let unit_price = Money::new(500);
//! let line = unit_price.checked_line_total(3).unwrap();
//! assert_eq!(line.amount(), 1500);
//! assert_eq!(line.to_string(), "1,500");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub};
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit.
///
/// Signed so cost/price differences and refunds can be represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from an amount in the smallest currency unit.
    #[inline]
    pub const fn new(amount: i64) -> Self {
        Money(amount)
    }

    /// Returns the raw amount.
    #[inline]
    pub const fn amount(&self) -> i64 {
        self.0
    }

    /// Zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies a unit price by a quantity, returning `None` on overflow.
    ///
    /// ## User Workflow
    /// ```text
    /// Line: Amoxicillin 250mg @ 500, qty 3
    ///      │
    ///      ▼
    /// checked_line_total(3) ← THIS FUNCTION
    ///      │
    ///      ▼
    /// 1,500 (summed into the checkout total)
    /// ```
    #[inline]
    pub const fn checked_line_total(&self, quantity: i64) -> Option<Money> {
        match self.0.checked_mul(quantity) {
            Some(v) => Some(Money(v)),
            None => None,
        }
    }

    /// Adds two amounts, returning `None` on overflow.
    #[inline]
    pub const fn checked_add(&self, other: Money) -> Option<Money> {
        match self.0.checked_add(other.0) {
            Some(v) => Some(Money(v)),
            None => None,
        }
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Groups thousands with commas: `1234567` → `1,234,567`.
///
/// Currency symbols are left to the storefront.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.0.unsigned_abs().to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }
        if self.0 < 0 {
            write!(f, "-{}", grouped)
        } else {
            write!(f, "{}", grouped)
        }
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl From<i64> for Money {
    fn from(amount: i64) -> Self {
        Money(amount)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_groups_thousands() {
        assert_eq!(Money::new(0).to_string(), "0");
        assert_eq!(Money::new(999).to_string(), "999");
        assert_eq!(Money::new(1500).to_string(), "1,500");
        assert_eq!(Money::new(1234567).to_string(), "1,234,567");
        assert_eq!(Money::new(-25000).to_string(), "-25,000");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::new(1000);
        let b = Money::new(500);

        assert_eq!((a + b).amount(), 1500);
        assert_eq!((a - b).amount(), 500);
        assert_eq!((a * 3).amount(), 3000);
    }

    #[test]
    fn test_sum_of_lines() {
        let total: Money = [Money::new(1500), Money::new(250), Money::new(0)]
            .into_iter()
            .sum();
        assert_eq!(total.amount(), 1750);
    }

    #[test]
    fn test_checked_line_total_overflow() {
        assert_eq!(Money::new(500).checked_line_total(3), Some(Money::new(1500)));
        assert_eq!(Money::new(i64::MAX).checked_line_total(2), None);
        assert_eq!(Money::new(i64::MAX).checked_add(Money::new(1)), None);
    }
}
