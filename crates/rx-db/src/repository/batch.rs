//! # Batch Ledger
//!
//! Quantity, cost and expiry per (product, batch number), kept in step with
//! the product's aggregate `stock_level`.
//!
//! ## Operations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Batch Ledger                                    │
//! │                                                                         │
//! │  receive_stock ──► upsert (product_id, batch_number)                    │
//! │                    ├── new:      quantity, expiry or today, cost or 0  │
//! │                    └── existing: quantity += n, expiry/cost if given   │
//! │                    stock_level += n                                     │
//! │                                                                         │
//! │  consume_stock ──► stock_level -= n     (InsufficientStock if short)    │
//! │                    batch quantity -= n  (clamped at 0, optional)        │
//! │                                                                         │
//! │  write_off ──────► batch quantity -= min(n, quantity)                   │
//! │                    stock_level -= removed (clamped at 0)                │
//! │                    StockAdjustment row                                  │
//! │                                                                         │
//! │  stock_discrepancy ► stock_level − Σ batch.quantity                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each operation is one transaction. Receipts and write-offs touch both
//! books; checkout lines without a batch id touch only `stock_level`, which
//! is where the two books drift apart.

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use rx_core::receiving::{ProductRef, ReceiptPlan, StockReceipt, WriteOffRequest};
use rx_core::validation::validate_quantity;
use rx_core::{Batch, CoreError, StockAdjustment};

use super::{begin_write, generate_id};
use super::product;
use crate::error::DbResult;

pub(crate) const BATCH_COLUMNS: &str =
    "id, product_id, batch_number, quantity, expiry_date, cost_price, created_at, updated_at";

// =============================================================================
// Outcomes
// =============================================================================

/// What a single receipt did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptOutcome {
    pub product_id: String,
    pub product_name: String,
    /// True when the receipt created the product.
    pub product_created: bool,
    pub batch: Batch,
    pub old_stock_level: i64,
    pub new_stock_level: i64,
}

/// What a write-off or return did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteOffOutcome {
    pub adjustment: StockAdjustment,
    pub batch: Batch,
    pub stock_level: i64,
}

/// Reconciliation of the two books for one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockReconciliation {
    pub product_id: String,
    pub stock_level: i64,
    pub batch_total: i64,
    /// `stock_level − batch_total`. Zero when the books agree.
    pub discrepancy: i64,
}

// =============================================================================
// Connection-level helpers
// =============================================================================

pub(crate) async fn fetch_batch(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Batch>> {
    let sql = format!("SELECT {} FROM product_batches WHERE id = ?1", BATCH_COLUMNS);
    let batch = sqlx::query_as::<_, Batch>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(batch)
}

pub(crate) async fn fetch_by_number(
    conn: &mut SqliteConnection,
    product_id: &str,
    batch_number: &str,
) -> DbResult<Option<Batch>> {
    let sql = format!(
        "SELECT {} FROM product_batches WHERE product_id = ?1 AND batch_number = ?2",
        BATCH_COLUMNS
    );
    let batch = sqlx::query_as::<_, Batch>(&sql)
        .bind(product_id)
        .bind(batch_number)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(batch)
}

/// Creates the batch or adds to it.
///
/// On conflict the quantity accumulates; expiry and cost are only replaced
/// when the receipt named them.
pub(crate) async fn upsert_batch(
    conn: &mut SqliteConnection,
    product_id: &str,
    batch_number: &str,
    plan: &ReceiptPlan,
) -> DbResult<Batch> {
    let sql = format!(
        r#"
        INSERT INTO product_batches (
            id, product_id, batch_number, quantity, expiry_date, cost_price, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
        ON CONFLICT (product_id, batch_number) DO UPDATE SET
            quantity = quantity + excluded.quantity,
            expiry_date = COALESCE(?8, expiry_date),
            cost_price = COALESCE(?9, cost_price),
            updated_at = excluded.updated_at
        RETURNING {}
        "#,
        BATCH_COLUMNS
    );

    let batch = sqlx::query_as::<_, Batch>(&sql)
        .bind(generate_id())
        .bind(product_id)
        .bind(batch_number)
        .bind(plan.quantity)
        .bind(plan.create_expiry())
        .bind(plan.create_cost())
        .bind(Utc::now())
        .bind(plan.expiry_date)
        .bind(plan.cost_price)
        .fetch_one(&mut *conn)
        .await?;

    Ok(batch)
}

/// Applies one receipt: create the product if needed, upsert the batch,
/// raise `stock_level`.
pub(crate) async fn receive_in(conn: &mut SqliteConnection, plan: &ReceiptPlan) -> DbResult<ReceiptOutcome> {
    let (product, product_created) = match &plan.product {
        ProductRef::Existing(id) => {
            let product = product::fetch_one(&mut *conn, id)
                .await?
                .ok_or_else(|| CoreError::product_not_found(id.clone()))?;
            (product, false)
        }
        ProductRef::New(new_product) => (product::insert(&mut *conn, new_product).await?, true),
    };

    let batch_number = plan.batch_number_for(&product.id);
    let batch = upsert_batch(&mut *conn, &product.id, &batch_number, plan).await?;
    let new_stock_level =
        product::adjust_stock(&mut *conn, &product.id, plan.quantity, plan.location.as_deref()).await?;

    debug!(
        product_id = %product.id,
        batch_number = %batch.batch_number,
        quantity = plan.quantity,
        batch_quantity = batch.quantity,
        "Stock received"
    );

    Ok(ReceiptOutcome {
        product_id: product.id,
        product_name: product.name_en,
        product_created,
        batch,
        old_stock_level: product.stock_level,
        new_stock_level,
    })
}

/// Decrements a batch, clamped at zero. The batch must belong to the product.
pub(crate) async fn consume_batch(
    conn: &mut SqliteConnection,
    product_id: &str,
    batch_id: &str,
    quantity: i64,
) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE product_batches
        SET quantity = MAX(quantity - ?1, 0),
            updated_at = ?2
        WHERE id = ?3 AND product_id = ?4
        "#,
    )
    .bind(quantity)
    .bind(Utc::now())
    .bind(batch_id)
    .bind(product_id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(CoreError::BatchNotFound {
            product_id: product_id.to_string(),
            batch: batch_id.to_string(),
        }
        .into());
    }

    Ok(())
}

/// Decrements `stock_level` and, when given, the batch.
pub(crate) async fn consume_in(
    conn: &mut SqliteConnection,
    product_id: &str,
    quantity: i64,
    batch_id: Option<&str>,
) -> DbResult<i64> {
    let remaining = product::adjust_stock(&mut *conn, product_id, -quantity, None).await?;
    if let Some(batch_id) = batch_id {
        consume_batch(&mut *conn, product_id, batch_id, quantity).await?;
    }
    Ok(remaining)
}

// =============================================================================
// Repository
// =============================================================================

/// The batch ledger.
///
/// ## Usage
/// ```rust,ignore
/// let receipt = StockReceipt::existing(product_id, 20)
///     .with_batch("BATCH-A")
///     .with_expiry(expiry)
///     .with_cost(100);
/// let outcome = db.batches().receive_stock(&receipt, today).await?;
/// ```
#[derive(Debug, Clone)]
pub struct BatchLedger {
    pool: SqlitePool,
}

impl BatchLedger {
    pub fn new(pool: SqlitePool) -> Self {
        BatchLedger { pool }
    }

    /// Receives one row of stock.
    pub async fn receive_stock(&self, receipt: &StockReceipt, today: NaiveDate) -> DbResult<ReceiptOutcome> {
        let plan = receipt.resolve(today)?;

        let mut tx = begin_write(&self.pool).await?;
        let outcome = receive_in(&mut *tx, &plan).await?;
        tx.commit().await?;

        Ok(outcome)
    }

    /// Applies a list of receipts all-or-nothing.
    ///
    /// Every row is validated before the transaction starts.
    pub async fn receive_all(&self, plans: &[ReceiptPlan]) -> DbResult<Vec<ReceiptOutcome>> {
        let mut tx = begin_write(&self.pool).await?;
        let mut outcomes = Vec::with_capacity(plans.len());
        for plan in plans {
            outcomes.push(receive_in(&mut *tx, plan).await?);
        }
        tx.commit().await?;

        info!(rows = outcomes.len(), "Stock entry recorded");
        Ok(outcomes)
    }

    /// Removes `quantity` from the product's stock level, and from `batch_id` when given.
    ///
    /// Returns the remaining stock level. Fails with `InsufficientStock` and
    /// leaves state unchanged when the product has fewer units.
    pub async fn consume_stock(&self, product_id: &str, quantity: i64, batch_id: Option<&str>) -> DbResult<i64> {
        validate_quantity(quantity)?;

        let mut tx = begin_write(&self.pool).await?;
        let remaining = consume_in(&mut *tx, product_id, quantity, batch_id).await?;
        tx.commit().await?;

        Ok(remaining)
    }

    /// Writes off or returns part of a batch.
    pub async fn write_off(&self, request: &WriteOffRequest) -> DbResult<WriteOffOutcome> {
        request.validate()?;

        let mut tx = begin_write(&self.pool).await?;

        let batch = fetch_by_number(&mut *tx, &request.product_id, &request.batch_number)
            .await?
            .ok_or_else(|| CoreError::BatchNotFound {
                product_id: request.product_id.clone(),
                batch: request.batch_number.clone(),
            })?;

        let removed = request.quantity.min(batch.quantity);
        if removed < request.quantity {
            warn!(
                batch_id = %batch.id,
                requested = request.quantity,
                available = batch.quantity,
                "Write-off clamped to batch quantity"
            );
        }

        let now = Utc::now();
        let sql = format!(
            "UPDATE product_batches SET quantity = quantity - ?1, updated_at = ?2 WHERE id = ?3 RETURNING {}",
            BATCH_COLUMNS
        );
        let batch = sqlx::query_as::<_, Batch>(&sql)
            .bind(removed)
            .bind(now)
            .bind(&batch.id)
            .fetch_one(&mut *tx)
            .await?;

        let stock_level: i64 = sqlx::query_scalar(
            r#"
            UPDATE products
            SET stock_level = MAX(stock_level - ?1, 0),
                updated_at = ?2
            WHERE id = ?3
            RETURNING stock_level
            "#,
        )
        .bind(removed)
        .bind(now)
        .bind(&request.product_id)
        .fetch_one(&mut *tx)
        .await?;

        let adjustment = StockAdjustment {
            id: generate_id(),
            product_id: request.product_id.clone(),
            batch_id: batch.id.clone(),
            batch_number: batch.batch_number.clone(),
            reason: request.reason,
            requested_quantity: request.quantity,
            removed_quantity: removed,
            created_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO stock_adjustments (
                id, product_id, batch_id, batch_number, reason,
                requested_quantity, removed_quantity, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&adjustment.id)
        .bind(&adjustment.product_id)
        .bind(&adjustment.batch_id)
        .bind(&adjustment.batch_number)
        .bind(adjustment.reason)
        .bind(adjustment.requested_quantity)
        .bind(adjustment.removed_quantity)
        .bind(adjustment.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            product_id = %adjustment.product_id,
            batch_number = %adjustment.batch_number,
            reason = ?adjustment.reason,
            removed = removed,
            "Stock written off"
        );

        Ok(WriteOffOutcome {
            adjustment,
            batch,
            stock_level,
        })
    }

    /// `stock_level − Σ batch.quantity` for one product.
    pub async fn stock_discrepancy(&self, product_id: &str) -> DbResult<StockReconciliation> {
        let row: Option<(i64, i64)> = sqlx::query_as(
            r#"
            SELECT p.stock_level,
                   COALESCE((SELECT SUM(b.quantity) FROM product_batches b WHERE b.product_id = p.id), 0)
            FROM products p
            WHERE p.id = ?1
            "#,
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        let (stock_level, batch_total) = row.ok_or_else(|| CoreError::product_not_found(product_id))?;

        Ok(StockReconciliation {
            product_id: product_id.to_string(),
            stock_level,
            batch_total,
            discrepancy: stock_level - batch_total,
        })
    }

    pub async fn get_batch(&self, id: &str) -> DbResult<Option<Batch>> {
        let mut conn = self.pool.acquire().await?;
        fetch_batch(&mut *conn, id).await
    }

    pub async fn find_batch(&self, product_id: &str, batch_number: &str) -> DbResult<Option<Batch>> {
        let mut conn = self.pool.acquire().await?;
        fetch_by_number(&mut *conn, product_id, batch_number).await
    }

    /// All batches of a product, soonest expiry first.
    pub async fn list_for_product(&self, product_id: &str) -> DbResult<Vec<Batch>> {
        let sql = format!(
            "SELECT {} FROM product_batches WHERE product_id = ?1 ORDER BY expiry_date, batch_number",
            BATCH_COLUMNS
        );
        let batches = sqlx::query_as::<_, Batch>(&sql)
            .bind(product_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(batches)
    }

    /// Write-off and return history of a product, newest first.
    pub async fn adjustments_for_product(&self, product_id: &str) -> DbResult<Vec<StockAdjustment>> {
        let adjustments = sqlx::query_as::<_, StockAdjustment>(
            r#"
            SELECT id, product_id, batch_id, batch_number, reason,
                   requested_quantity, removed_quantity, created_at
            FROM stock_adjustments
            WHERE product_id = ?1
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(adjustments)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::repository::test_support::{in_days, new_product, stocked_product, test_db, today};
    use rx_core::receiving::{derive_batch_number, StockEntryRequest};
    use rx_core::AdjustmentReason;

    #[tokio::test]
    async fn test_receive_stock_accumulates_same_batch() {
        let db = test_db().await;
        let p = stocked_product(&db, "Ibuprofen 400mg", 400, 0).await;

        let first = StockReceipt::existing(p.id.clone(), 5).with_batch("BATCH-A");
        let second = StockReceipt::existing(p.id.clone(), 7).with_batch("BATCH-A");
        db.batches().receive_stock(&first, today()).await.unwrap();
        let outcome = db.batches().receive_stock(&second, today()).await.unwrap();

        assert_eq!(outcome.batch.quantity, 12);
        assert_eq!(outcome.old_stock_level, 5);
        assert_eq!(outcome.new_stock_level, 12);
        assert_eq!(db.batches().list_for_product(&p.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_receive_stock_defaults_and_updates() {
        let db = test_db().await;
        let p = stocked_product(&db, "Vitamin C", 200, 0).await;

        let receipt = StockReceipt::existing(p.id.clone(), 20)
            .with_batch("BATCH-A")
            .with_expiry(in_days(200))
            .with_cost(100);
        db.batches().receive_stock(&receipt, today()).await.unwrap();

        // No expiry or cost on the second receipt: both are kept.
        let more = StockReceipt::existing(p.id.clone(), 5).with_batch("BATCH-A");
        let outcome = db.batches().receive_stock(&more, today()).await.unwrap();
        assert_eq!(outcome.batch.quantity, 25);
        assert_eq!(outcome.batch.expiry_date, in_days(200));
        assert_eq!(outcome.batch.cost_price, 100);

        // A fresh batch without expiry or cost gets today and 0.
        let fresh = StockReceipt::existing(p.id.clone(), 1).with_batch("BATCH-B");
        let outcome = db.batches().receive_stock(&fresh, today()).await.unwrap();
        assert_eq!(outcome.batch.expiry_date, today());
        assert_eq!(outcome.batch.cost_price, 0);
    }

    #[tokio::test]
    async fn test_derived_batch_numbers_accumulate() {
        let db = test_db().await;
        let p = stocked_product(&db, "ORS Sachet", 150, 0).await;
        let expiry = in_days(300);

        let a = StockReceipt::existing(p.id.clone(), 4).with_expiry(expiry);
        let b = StockReceipt::existing(p.id.clone(), 6).with_expiry(expiry);
        db.batches().receive_stock(&a, today()).await.unwrap();
        db.batches().receive_stock(&b, today()).await.unwrap();

        let batches = db.batches().list_for_product(&p.id).await.unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].quantity, 10);
        assert_eq!(batches[0].batch_number, derive_batch_number(&p.id, expiry));
    }

    #[tokio::test]
    async fn test_receive_creates_missing_product() {
        let db = test_db().await;
        let mut receipt = StockReceipt::existing("unused", 30).with_batch("LOT-1").with_location("Shelf B2");
        receipt.product_id = None;
        receipt.new_product = Some(new_product("Metformin 500mg", 350));

        let outcome = db.batches().receive_stock(&receipt, today()).await.unwrap();
        assert!(outcome.product_created);
        assert_eq!(outcome.old_stock_level, 0);
        assert_eq!(outcome.new_stock_level, 30);

        let product = db.products().get_by_id(&outcome.product_id).await.unwrap().unwrap();
        assert_eq!(product.location.as_deref(), Some("Shelf B2"));
    }

    #[tokio::test]
    async fn test_receive_unknown_product_fails() {
        let db = test_db().await;
        let err = db
            .batches()
            .receive_stock(&StockReceipt::existing("p99", 1), today())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::ProductNotFound { .. })));
    }

    #[tokio::test]
    async fn test_receive_all_is_all_or_nothing() {
        let db = test_db().await;
        let p = stocked_product(&db, "Salbutamol Inhaler", 4500, 0).await;

        let request = StockEntryRequest {
            entries: vec![
                StockReceipt::existing(p.id.clone(), 10).with_batch("LOT-1"),
                StockReceipt::existing("p99", 5).with_batch("LOT-2"),
            ],
        };
        let plans = request.resolve(today()).unwrap();
        assert!(db.batches().receive_all(&plans).await.is_err());

        let after = db.products().get_by_id(&p.id).await.unwrap().unwrap();
        assert_eq!(after.stock_level, 0);
        assert!(db.batches().list_for_product(&p.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_consume_stock_never_negative() {
        let db = test_db().await;
        let p = stocked_product(&db, "Omeprazole 20mg", 600, 5).await;
        let batch = db.batches().find_batch(&p.id, "BATCH-A").await.unwrap().unwrap();

        let remaining = db.batches().consume_stock(&p.id, 3, Some(&batch.id)).await.unwrap();
        assert_eq!(remaining, 2);
        assert_eq!(db.batches().get_batch(&batch.id).await.unwrap().unwrap().quantity, 2);

        let err = db.batches().consume_stock(&p.id, 3, Some(&batch.id)).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InsufficientStock { .. })));

        // Unchanged after the failure.
        let after = db.products().get_by_id(&p.id).await.unwrap().unwrap();
        assert_eq!(after.stock_level, 2);
        assert_eq!(db.batches().get_batch(&batch.id).await.unwrap().unwrap().quantity, 2);
    }

    #[tokio::test]
    async fn test_consume_stock_takes_bulk_quantities() {
        let db = test_db().await;
        let p = stocked_product(&db, "Cetirizine loose", 3, 25_000).await;

        let remaining = db.batches().consume_stock(&p.id, 12_000, None).await.unwrap();
        assert_eq!(remaining, 13_000);
        assert!(db.batches().consume_stock(&p.id, 0, None).await.is_err());
    }

    #[tokio::test]
    async fn test_consume_stock_rejects_foreign_batch() {
        let db = test_db().await;
        let a = stocked_product(&db, "A", 100, 5).await;
        let b = stocked_product(&db, "B", 100, 5).await;
        let b_batch = db.batches().find_batch(&b.id, "BATCH-A").await.unwrap().unwrap();

        let err = db.batches().consume_stock(&a.id, 1, Some(&b_batch.id)).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::BatchNotFound { .. })));

        // Rolled back with the batch failure.
        let after = db.products().get_by_id(&a.id).await.unwrap().unwrap();
        assert_eq!(after.stock_level, 5);
    }

    #[tokio::test]
    async fn test_write_off_clamps_and_keeps_books_balanced() {
        let db = test_db().await;
        let p = stocked_product(&db, "Amoxicillin 250mg", 800, 8).await;

        let request = WriteOffRequest {
            product_id: p.id.clone(),
            batch_number: "BATCH-A".to_string(),
            quantity: 20,
            reason: AdjustmentReason::WriteOff,
        };
        let outcome = db.batches().write_off(&request).await.unwrap();

        assert_eq!(outcome.adjustment.removed_quantity, 8);
        assert_eq!(outcome.adjustment.requested_quantity, 20);
        assert_eq!(outcome.batch.quantity, 0);
        assert_eq!(outcome.stock_level, 0);

        let recon = db.batches().stock_discrepancy(&p.id).await.unwrap();
        assert_eq!(recon.discrepancy, 0);

        let history = db.batches().adjustments_for_product(&p.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].reason, AdjustmentReason::WriteOff);
    }

    #[tokio::test]
    async fn test_return_reduces_stock_level_too() {
        let db = test_db().await;
        let p = stocked_product(&db, "Loratadine", 250, 10).await;

        let request = WriteOffRequest {
            product_id: p.id.clone(),
            batch_number: "BATCH-A".to_string(),
            quantity: 4,
            reason: AdjustmentReason::Return,
        };
        let outcome = db.batches().write_off(&request).await.unwrap();
        assert_eq!(outcome.batch.quantity, 6);
        assert_eq!(outcome.stock_level, 6);
    }

    #[tokio::test]
    async fn test_write_off_unknown_batch() {
        let db = test_db().await;
        let p = stocked_product(&db, "Zinc Syrup", 900, 3).await;

        let request = WriteOffRequest {
            product_id: p.id.clone(),
            batch_number: "NOPE".to_string(),
            quantity: 1,
            reason: AdjustmentReason::WriteOff,
        };
        let err = db.batches().write_off(&request).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::BatchNotFound { .. })));
    }

    #[tokio::test]
    async fn test_discrepancy_after_batchless_consumption() {
        let db = test_db().await;
        let p = stocked_product(&db, "Aspirin 81mg", 100, 10).await;

        // Sold without picking a batch: only stock_level moves.
        db.batches().consume_stock(&p.id, 4, None).await.unwrap();

        let recon = db.batches().stock_discrepancy(&p.id).await.unwrap();
        assert_eq!(recon.stock_level, 6);
        assert_eq!(recon.batch_total, 10);
        assert_eq!(recon.discrepancy, -4);

        let err = db.batches().stock_discrepancy("p99").await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::ProductNotFound { .. })));
    }
}
