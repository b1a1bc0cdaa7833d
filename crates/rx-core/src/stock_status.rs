//! # Stock Status Classifier
//!
//! Maps a product's stock level and batch expiry dates to the traffic-light
//! status shown on POS product cards and the expiry tracker.
//!
//! ## Priority Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  First match wins:                                                      │
//! │                                                                         │
//! │   1. EXPIRED  any batch with days ≤ critical_days (negatives included)  │
//! │   2. OUT      stock_level ≤ 0                                           │
//! │   3. LOW      stock_level ≤ min_stock_level                             │
//! │   4. GOOD     otherwise                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Cart-Add Predicates
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  is_near_expiry    ANY batch with 0 < days ≤ warning_days   warn + add  │
//! │  is_fully_expired  EVERY batch expired (empty list = false)  block      │
//! │  days_until_expiry smallest strictly positive days, else None           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The classifier and the predicates use different day conventions on
//! purpose. Keep them apart.
//!
//! Nothing here reads the clock: `today` is always a parameter.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::types::{Batch, ProductStock};
use crate::{DEFAULT_EXPIRY_CRITICAL_DAYS, DEFAULT_EXPIRY_WARNING_DAYS};

// =============================================================================
// Thresholds
// =============================================================================

/// Day thresholds used by the classifier and the cart-add warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpiryThresholds {
    /// Cart-add warns when a batch expires within this many days.
    pub warning_days: i64,
    /// Classifier reports `expired` when a batch expires within this many days.
    pub critical_days: i64,
}

impl Default for ExpiryThresholds {
    fn default() -> Self {
        Self {
            warning_days: DEFAULT_EXPIRY_WARNING_DAYS,
            critical_days: DEFAULT_EXPIRY_CRITICAL_DAYS,
        }
    }
}

/// Whole calendar days from `today` until `expiry`. Negative once expired.
#[inline]
pub fn days_until(expiry: NaiveDate, today: NaiveDate) -> i64 {
    (expiry - today).num_days()
}

// =============================================================================
// Classifier
// =============================================================================

/// Traffic-light status of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum StockStatus {
    Good,
    Low,
    Out,
    Expired,
}

/// Display tone paired with each status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum StatusTone {
    Green,
    Yellow,
    Red,
}

impl StockStatus {
    pub fn tone(&self) -> StatusTone {
        match self {
            StockStatus::Good => StatusTone::Green,
            StockStatus::Low => StatusTone::Yellow,
            StockStatus::Out | StockStatus::Expired => StatusTone::Red,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StockStatus::Good => "In Stock",
            StockStatus::Low => "Low Stock",
            StockStatus::Out => "Out of Stock",
            StockStatus::Expired => "Expiring",
        }
    }
}

/// Classifies a product from its raw levels and batches.
pub fn classify_levels(
    stock_level: i64,
    min_stock_level: i64,
    batches: &[Batch],
    thresholds: &ExpiryThresholds,
    today: NaiveDate,
) -> StockStatus {
    let expiring = batches
        .iter()
        .any(|b| b.days_until_expiry(today) <= thresholds.critical_days);

    if expiring {
        StockStatus::Expired
    } else if stock_level <= 0 {
        StockStatus::Out
    } else if stock_level <= min_stock_level {
        StockStatus::Low
    } else {
        StockStatus::Good
    }
}

/// Classifies a product with its batches.
///
/// ## Example
/// ```rust,ignore
/// // stock_level = 0 and a batch expiring in 10 days
/// assert_eq!(classify(&stock, &ExpiryThresholds::default(), today), StockStatus::Expired);
/// ```
pub fn classify(stock: &ProductStock, thresholds: &ExpiryThresholds, today: NaiveDate) -> StockStatus {
    classify_levels(
        stock.product.stock_level,
        stock.product.min_stock_level,
        &stock.batches,
        thresholds,
        today,
    )
}

// =============================================================================
// Cart-Add Predicates
// =============================================================================

/// True if any batch expires in `1..=warning_days` days.
pub fn is_near_expiry(batches: &[Batch], warning_days: i64, today: NaiveDate) -> bool {
    batches.iter().any(|b| {
        let days = b.days_until_expiry(today);
        days > 0 && days <= warning_days
    })
}

/// True only when there is at least one batch and every batch expired before `today`.
pub fn is_fully_expired(batches: &[Batch], today: NaiveDate) -> bool {
    !batches.is_empty() && batches.iter().all(|b| b.is_expired(today))
}

/// Smallest strictly positive days-until-expiry across batches.
pub fn days_until_expiry(batches: &[Batch], today: NaiveDate) -> Option<i64> {
    batches
        .iter()
        .map(|b| b.days_until_expiry(today))
        .filter(|days| *days > 0)
        .min()
}

/// Products with at least one batch expiring within `days` days (already expired excluded).
pub fn expiring_products<'a>(
    products: &'a [ProductStock],
    days: i64,
    today: NaiveDate,
) -> Vec<&'a ProductStock> {
    products
        .iter()
        .filter(|p| is_near_expiry(&p.batches, days, today))
        .collect()
}

/// Outcome of adding a product to the POS cart.
///
/// ## User Workflow
/// ```text
/// Cashier taps product card
///      │
///      ▼
/// check_cart_add ← THIS FUNCTION
///      │
///      ├── Expired      → confirmation prompt, add only if confirmed
///      ├── NearExpiry   → toast "expires in N days", item added
///      └── Allowed      → item added
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum CartAddCheck {
    Allowed,
    NearExpiry { days: i64 },
    Expired,
}

impl CartAddCheck {
    /// Whether the item goes into the cart without a confirmation.
    pub fn adds_without_confirmation(&self) -> bool {
        !matches!(self, CartAddCheck::Expired)
    }
}

pub fn check_cart_add(batches: &[Batch], warning_days: i64, today: NaiveDate) -> CartAddCheck {
    if is_fully_expired(batches, today) {
        return CartAddCheck::Expired;
    }

    if is_near_expiry(batches, warning_days, today) {
        if let Some(days) = days_until_expiry(batches, today) {
            return CartAddCheck::NearExpiry { days };
        }
    }

    CartAddCheck::Allowed
}

/// Everything a product card needs, computed in one pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct StockSummary {
    pub status: StockStatus,
    pub tone: StatusTone,
    pub near_expiry: bool,
    pub fully_expired: bool,
    pub days_until_expiry: Option<i64>,
}

pub fn summarize(stock: &ProductStock, thresholds: &ExpiryThresholds, today: NaiveDate) -> StockSummary {
    let status = classify(stock, thresholds, today);
    StockSummary {
        status,
        tone: status.tone(),
        near_expiry: is_near_expiry(&stock.batches, thresholds.warning_days, today),
        fully_expired: is_fully_expired(&stock.batches, today),
        days_until_expiry: days_until_expiry(&stock.batches, today),
    }
}

// =============================================================================
// Expiry Tracker
// =============================================================================

/// Urgency bucket on the expiry tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum ExpiryBucket {
    /// 30 days or less, including already expired.
    Critical,
    /// 31 to 60 days.
    Warning,
    /// 61 to 90 days.
    Watch,
    Good,
}

impl ExpiryBucket {
    pub fn for_days(days: i64) -> Self {
        match days {
            d if d <= 30 => ExpiryBucket::Critical,
            d if d <= 60 => ExpiryBucket::Warning,
            d if d <= 90 => ExpiryBucket::Watch,
            _ => ExpiryBucket::Good,
        }
    }
}

/// One batch row on the expiry tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ExpiryItem {
    pub product_id: String,
    pub product_name: String,
    pub batch_id: String,
    pub batch_number: String,
    pub quantity: i64,
    #[ts(as = "String")]
    pub expiry_date: NaiveDate,
    pub days_remaining: i64,
    pub bucket: ExpiryBucket,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ExpiryReport {
    pub items: Vec<ExpiryItem>,
    pub critical: usize,
    pub warning: usize,
    pub watch: usize,
    pub good: usize,
}

/// Builds the expiry tracker: one row per batch still holding stock, soonest first.
pub fn expiry_report(products: &[ProductStock], today: NaiveDate) -> ExpiryReport {
    let mut items: Vec<ExpiryItem> = products
        .iter()
        .flat_map(|stock| {
            stock
                .batches
                .iter()
                .filter(|b| b.quantity > 0)
                .map(move |b| {
                    let days = b.days_until_expiry(today);
                    ExpiryItem {
                        product_id: stock.product.id.clone(),
                        product_name: stock.product.name_en.clone(),
                        batch_id: b.id.clone(),
                        batch_number: b.batch_number.clone(),
                        quantity: b.quantity,
                        expiry_date: b.expiry_date,
                        days_remaining: days,
                        bucket: ExpiryBucket::for_days(days),
                    }
                })
        })
        .collect();

    items.sort_by_key(|item| item.days_remaining);

    let mut report = ExpiryReport::default();
    for item in &items {
        match item.bucket {
            ExpiryBucket::Critical => report.critical += 1,
            ExpiryBucket::Warning => report.warning += 1,
            ExpiryBucket::Watch => report.watch += 1,
            ExpiryBucket::Good => report.good += 1,
        }
    }
    report.items = items;
    report
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Product;
    use chrono::{Duration, Utc};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 15).unwrap()
    }

    fn batch(number: &str, quantity: i64, days: i64) -> Batch {
        let now = Utc::now();
        Batch {
            id: format!("batch-{}", number),
            product_id: "p1".to_string(),
            batch_number: number.to_string(),
            quantity,
            expiry_date: today() + Duration::days(days),
            cost_price: 100,
            created_at: now,
            updated_at: now,
        }
    }

    fn stock(stock_level: i64, min_stock_level: i64, batches: Vec<Batch>) -> ProductStock {
        let now = Utc::now();
        ProductStock {
            product: Product {
                id: "p1".to_string(),
                branch_id: "b1".to_string(),
                name_en: "Paracetamol 500mg".to_string(),
                name_mm: None,
                category: "Analgesic".to_string(),
                unit_price: 500,
                unit: "strip".to_string(),
                stock_level,
                min_stock_level,
                location: None,
                created_at: now,
                updated_at: now,
            },
            batches,
        }
    }

    #[test]
    fn test_expired_takes_priority_over_out() {
        let s = stock(0, 10, vec![batch("A", 0, 10)]);
        assert_eq!(classify(&s, &ExpiryThresholds::default(), today()), StockStatus::Expired);
    }

    #[test]
    fn test_critical_window_includes_past_and_boundary() {
        let thresholds = ExpiryThresholds::default();
        let past = stock(50, 10, vec![batch("A", 5, -3)]);
        let boundary = stock(50, 10, vec![batch("A", 5, 180)]);
        let beyond = stock(50, 10, vec![batch("A", 5, 181)]);

        assert_eq!(classify(&past, &thresholds, today()), StockStatus::Expired);
        assert_eq!(classify(&boundary, &thresholds, today()), StockStatus::Expired);
        assert_eq!(classify(&beyond, &thresholds, today()), StockStatus::Good);
    }

    #[test]
    fn test_out_low_good() {
        let thresholds = ExpiryThresholds::default();
        assert_eq!(classify(&stock(0, 10, vec![]), &thresholds, today()), StockStatus::Out);
        assert_eq!(classify(&stock(-2, 10, vec![]), &thresholds, today()), StockStatus::Out);
        assert_eq!(classify(&stock(10, 10, vec![]), &thresholds, today()), StockStatus::Low);
        assert_eq!(classify(&stock(11, 10, vec![]), &thresholds, today()), StockStatus::Good);
    }

    #[test]
    fn test_custom_critical_threshold() {
        let thresholds = ExpiryThresholds {
            warning_days: 30,
            critical_days: 7,
        };
        let s = stock(50, 10, vec![batch("A", 5, 10)]);
        assert_eq!(classify(&s, &thresholds, today()), StockStatus::Good);
    }

    #[test]
    fn test_tones() {
        assert_eq!(StockStatus::Good.tone(), StatusTone::Green);
        assert_eq!(StockStatus::Low.tone(), StatusTone::Yellow);
        assert_eq!(StockStatus::Out.tone(), StatusTone::Red);
        assert_eq!(StockStatus::Expired.tone(), StatusTone::Red);
    }

    #[test]
    fn test_is_near_expiry_boundaries() {
        assert!(is_near_expiry(&[batch("A", 1, 90)], 90, today()));
        assert!(!is_near_expiry(&[batch("A", 1, 91)], 90, today()));
        assert!(!is_near_expiry(&[batch("A", 1, 0)], 90, today()));
        assert!(!is_near_expiry(&[batch("A", 1, -5)], 90, today()));
        assert!(is_near_expiry(&[batch("A", 1, -5), batch("B", 1, 1)], 90, today()));
    }

    #[test]
    fn test_is_fully_expired() {
        assert!(!is_fully_expired(&[], today()));
        assert!(is_fully_expired(&[batch("A", 1, -1), batch("B", 1, -40)], today()));
        assert!(!is_fully_expired(&[batch("A", 1, -1), batch("B", 1, 2)], today()));
        // expiring today is not yet expired
        assert!(!is_fully_expired(&[batch("A", 1, 0)], today()));
    }

    #[test]
    fn test_days_until_expiry_ignores_expired() {
        let batches = vec![batch("A", 1, -4), batch("B", 1, 45), batch("C", 1, 12)];
        assert_eq!(days_until_expiry(&batches, today()), Some(12));
        assert_eq!(days_until_expiry(&[batch("A", 1, -4), batch("B", 1, 0)], today()), None);
        assert_eq!(days_until_expiry(&[], today()), None);
    }

    #[test]
    fn test_expiring_products() {
        let soon = stock(20, 10, vec![batch("A", 5, 20)]);
        let later = stock(20, 10, vec![batch("B", 5, 200)]);
        let gone = stock(20, 10, vec![batch("C", 5, -1)]);
        let products = vec![soon, later, gone];

        let hits = expiring_products(&products, 30, today());
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].batches[0].batch_number, "A");
    }

    #[test]
    fn test_check_cart_add() {
        assert_eq!(
            check_cart_add(&[batch("A", 1, -1)], 90, today()),
            CartAddCheck::Expired
        );
        assert_eq!(
            check_cart_add(&[batch("A", 1, 40), batch("B", 1, 12)], 90, today()),
            CartAddCheck::NearExpiry { days: 12 }
        );
        assert_eq!(
            check_cart_add(&[batch("A", 1, 365)], 90, today()),
            CartAddCheck::Allowed
        );
        assert_eq!(check_cart_add(&[], 90, today()), CartAddCheck::Allowed);
        assert!(!CartAddCheck::Expired.adds_without_confirmation());
    }

    #[test]
    fn test_summarize() {
        let s = stock(0, 10, vec![batch("A", 3, 10)]);
        let summary = summarize(&s, &ExpiryThresholds::default(), today());
        assert_eq!(summary.status, StockStatus::Expired);
        assert_eq!(summary.tone, StatusTone::Red);
        assert!(summary.near_expiry);
        assert!(!summary.fully_expired);
        assert_eq!(summary.days_until_expiry, Some(10));
    }

    #[test]
    fn test_expiry_buckets() {
        assert_eq!(ExpiryBucket::for_days(-3), ExpiryBucket::Critical);
        assert_eq!(ExpiryBucket::for_days(30), ExpiryBucket::Critical);
        assert_eq!(ExpiryBucket::for_days(31), ExpiryBucket::Warning);
        assert_eq!(ExpiryBucket::for_days(60), ExpiryBucket::Warning);
        assert_eq!(ExpiryBucket::for_days(90), ExpiryBucket::Watch);
        assert_eq!(ExpiryBucket::for_days(91), ExpiryBucket::Good);
    }

    #[test]
    fn test_expiry_report_skips_empty_batches_and_sorts() {
        let products = vec![
            stock(
                30,
                10,
                vec![batch("LATE", 10, 120), batch("EMPTY", 0, 5), batch("SOON", 4, 20)],
            ),
            stock(30, 10, vec![batch("MID", 2, 45), batch("WATCH", 2, 75)]),
        ];

        let report = expiry_report(&products, today());
        let numbers: Vec<&str> = report.items.iter().map(|i| i.batch_number.as_str()).collect();

        assert_eq!(numbers, vec!["SOON", "MID", "WATCH", "LATE"]);
        assert_eq!(report.critical, 1);
        assert_eq!(report.warning, 1);
        assert_eq!(report.watch, 1);
        assert_eq!(report.good, 1);
    }
}
