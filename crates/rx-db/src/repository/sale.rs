//! # Sale Repository
//!
//! The checkout transaction engine plus sale reads.
//!
//! ## Checkout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Checkout Transaction                              │
//! │                                                                         │
//! │  0. request.validate(policy)          shape, cart size, total policy   │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │  1. fetch_by_ids(distinct ids)        one read                         │
//! │     └── missing ids? ──────────────► ProductNotFound { ids }           │
//! │  2. verify_stock(lines)               cart order                        │
//! │     └── stock_level < quantity? ───► InsufficientStock                 │
//! │  3. per line:                                                           │
//! │     ├── stock_level -= qty WHERE stock_level - qty >= 0                │
//! │     └── batch quantity -= qty (clamped, when batch_id given)           │
//! │  4. INSERT sale (completed)                                            │
//! │  5. INSERT sale_items                                                  │
//! │  6. INSERT ledger entry: INCOME / Sales / "POS Sale (N items)"         │
//! │  COMMIT                                                                 │
//! │                                                                         │
//! │  Any error before COMMIT drops the transaction → ROLLBACK.             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The conditional decrement in step 3 catches a checkout that raced this one
//! between the read in step 1 and the write, and duplicate lines whose sum
//! exceeds stock.

use std::collections::HashMap;

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info};

use rx_core::checkout::{ledger_description, missing_products, verify_stock, CheckoutRequest, TotalPolicy};
use rx_core::{
    CoreError, LedgerEntryType, Sale, SaleDetail, SaleItem, SaleStatus, SALES_LEDGER_CATEGORY,
};

use super::batch::consume_in;
use super::{begin_write, generate_id};
use super::ledger::{create_ledger_entry, NewLedgerEntry};
use super::product::fetch_by_ids;
use crate::error::DbResult;

const SALE_COLUMNS: &str =
    "id, branch_id, customer_id, cashier_id, payment_method, total, status, created_at";
const SALE_ITEM_COLUMNS: &str = "id, sale_id, product_id, quantity, unit_price, batch_id, created_at";

/// Default page size of [`SaleRepository::list_recent`].
pub const RECENT_SALES_LIMIT: i64 = 50;

// =============================================================================
// Connection-level helpers
// =============================================================================

pub(crate) async fn create_sale(conn: &mut SqliteConnection, sale: &Sale) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO sales (
            id, branch_id, customer_id, cashier_id, payment_method, total, status, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&sale.id)
    .bind(&sale.branch_id)
    .bind(&sale.customer_id)
    .bind(&sale.cashier_id)
    .bind(sale.payment_method)
    .bind(sale.total)
    .bind(sale.status)
    .bind(sale.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub(crate) async fn create_sale_items(conn: &mut SqliteConnection, items: &[SaleItem]) -> DbResult<()> {
    for item in items {
        sqlx::query(
            r#"
            INSERT INTO sale_items (
                id, sale_id, product_id, quantity, unit_price, batch_id, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&item.id)
        .bind(&item.sale_id)
        .bind(&item.product_id)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(&item.batch_id)
        .bind(item.created_at)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for sales.
///
/// ## Usage
/// ```rust,ignore
/// let sale_id = db.sales().checkout(&request, Some(&user_id), TotalPolicy::RequireMatch).await?;
/// let detail = db.sales().get_sale(&sale_id).await?;
/// ```
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Runs a checkout and returns the new sale id.
    ///
    /// ## Errors
    /// - `Validation` / `TotalMismatch`: malformed request, nothing read
    /// - `ProductNotFound`: one or more ids did not resolve, nothing written
    /// - `InsufficientStock`: a line asks for more than `stock_level`, nothing written
    /// - `BatchNotFound`: a line names a batch of another product, nothing written
    pub async fn checkout(
        &self,
        request: &CheckoutRequest,
        cashier_id: Option<&str>,
        policy: TotalPolicy,
    ) -> DbResult<String> {
        request.validate(policy)?;

        let mut tx = begin_write(&self.pool).await?;

        let ids = request.distinct_product_ids();
        let products = fetch_by_ids(&mut *tx, &ids).await?;
        let missing = missing_products(&ids, &products);
        if !missing.is_empty() {
            return Err(CoreError::ProductNotFound { ids: missing }.into());
        }
        verify_stock(&request.items, &products)?;

        for line in &request.items {
            consume_in(&mut *tx, &line.product_id, line.quantity, line.batch_id.as_deref()).await?;
        }

        let now = Utc::now();
        let sale = Sale {
            id: generate_id(),
            branch_id: request.branch_id.clone(),
            customer_id: request.customer_id.clone(),
            cashier_id: cashier_id.map(str::to_string),
            payment_method: request.payment_method,
            total: request.total,
            status: SaleStatus::Completed,
            created_at: now,
        };
        create_sale(&mut *tx, &sale).await?;

        let items: Vec<SaleItem> = request
            .items
            .iter()
            .map(|line| SaleItem {
                id: generate_id(),
                sale_id: sale.id.clone(),
                product_id: line.product_id.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price,
                batch_id: line.batch_id.clone(),
                created_at: now,
            })
            .collect();
        create_sale_items(&mut *tx, &items).await?;

        create_ledger_entry(
            &mut *tx,
            NewLedgerEntry {
                branch_id: &sale.branch_id,
                entry_type: LedgerEntryType::Income,
                category: SALES_LEDGER_CATEGORY,
                amount: sale.total,
                description: Some(ledger_description(request.item_count())),
                payment_method: Some(sale.payment_method),
                sale_id: Some(&sale.id),
            },
        )
        .await?;

        tx.commit().await?;

        info!(
            sale_id = %sale.id,
            branch_id = %sale.branch_id,
            lines = items.len(),
            total = sale.total,
            payment_method = ?sale.payment_method,
            "Checkout completed"
        );

        Ok(sale.id)
    }

    /// Gets a sale with its items.
    pub async fn get_sale(&self, id: &str) -> DbResult<Option<SaleDetail>> {
        let sql = format!("SELECT {} FROM sales WHERE id = ?1", SALE_COLUMNS);
        let Some(sale) = sqlx::query_as::<_, Sale>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        let items = self.get_items(&sale.id).await?;
        Ok(Some(SaleDetail { sale, items }))
    }

    /// Gets the items of a sale in cart order.
    pub async fn get_items(&self, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        let sql = format!(
            "SELECT {} FROM sale_items WHERE sale_id = ?1 ORDER BY rowid",
            SALE_ITEM_COLUMNS
        );
        let items = sqlx::query_as::<_, SaleItem>(&sql)
            .bind(sale_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(items)
    }

    /// Most recent sales with their items, newest first.
    pub async fn list_recent(&self, branch_id: Option<&str>, limit: i64) -> DbResult<Vec<SaleDetail>> {
        let sql = format!(
            "SELECT {} FROM sales WHERE (?1 IS NULL OR branch_id = ?1) \
             ORDER BY created_at DESC, rowid DESC LIMIT ?2",
            SALE_COLUMNS
        );
        let sales = sqlx::query_as::<_, Sale>(&sql)
            .bind(branch_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        if sales.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {} FROM sale_items WHERE sale_id IN (",
            SALE_ITEM_COLUMNS
        ));
        let mut separated = qb.separated(", ");
        for sale in &sales {
            separated.push_bind(sale.id.clone());
        }
        separated.push_unseparated(") ORDER BY rowid");
        let items = qb.build_query_as::<SaleItem>().fetch_all(&self.pool).await?;

        let mut by_sale: HashMap<String, Vec<SaleItem>> = HashMap::new();
        for item in items {
            by_sale.entry(item.sale_id.clone()).or_default().push(item);
        }

        debug!(count = sales.len(), "Listed recent sales");

        Ok(sales
            .into_iter()
            .map(|sale| {
                let items = by_sale.remove(&sale.id).unwrap_or_default();
                SaleDetail { sale, items }
            })
            .collect())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::repository::test_support::{file_db, stocked_product, test_db};
    use rx_core::checkout::CheckoutLine;
    use rx_core::PaymentMethod;

    fn line(product_id: &str, quantity: i64, unit_price: i64) -> CheckoutLine {
        CheckoutLine {
            product_id: product_id.to_string(),
            quantity,
            unit_price,
            batch_id: None,
        }
    }

    fn request(items: Vec<CheckoutLine>) -> CheckoutRequest {
        let total = items.iter().map(|l| l.quantity * l.unit_price).sum();
        CheckoutRequest {
            branch_id: "branch-1".to_string(),
            customer_id: None,
            payment_method: PaymentMethod::Cash,
            items,
            total,
        }
    }

    async fn sale_count(db: &crate::Database) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM sales")
            .fetch_one(db.pool())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_checkout_writes_sale_items_and_ledger() {
        let db = test_db().await;
        let p1 = stocked_product(&db, "Paracetamol 500mg", 500, 5).await;

        let sale_id = db
            .sales()
            .checkout(&request(vec![line(&p1.id, 3, 500)]), Some("user-1"), TotalPolicy::RequireMatch)
            .await
            .unwrap();

        let after = db.products().get_by_id(&p1.id).await.unwrap().unwrap();
        assert_eq!(after.stock_level, 2);

        let detail = db.sales().get_sale(&sale_id).await.unwrap().unwrap();
        assert_eq!(detail.sale.total, 1500);
        assert_eq!(detail.sale.status, SaleStatus::Completed);
        assert_eq!(detail.sale.cashier_id.as_deref(), Some("user-1"));
        assert_eq!(detail.items.len(), 1);
        assert_eq!(detail.items[0].line_total().amount(), 1500);

        let entries = db.ledger().list_for_sale(&sale_id).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].amount, 1500);
        assert_eq!(entries[0].entry_type, LedgerEntryType::Income);
        assert_eq!(entries[0].category, "Sales");
        assert_eq!(entries[0].description.as_deref(), Some("POS Sale (1 items)"));
        assert_eq!(entries[0].payment_method, Some(PaymentMethod::Cash));
    }

    #[tokio::test]
    async fn test_checkout_is_atomic() {
        let db = test_db().await;
        let a = stocked_product(&db, "Cetirizine", 300, 10).await;
        let b = stocked_product(&db, "Insulin Pen", 15000, 1).await;

        let err = db
            .sales()
            .checkout(
                &request(vec![line(&a.id, 2, 300), line(&b.id, 2, 15000)]),
                None,
                TotalPolicy::RequireMatch,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InsufficientStock { ref product_id, .. }) if *product_id == b.id));

        assert_eq!(db.products().get_by_id(&a.id).await.unwrap().unwrap().stock_level, 10);
        assert_eq!(db.products().get_by_id(&b.id).await.unwrap().unwrap().stock_level, 1);
        assert_eq!(sale_count(&db).await, 0);
    }

    #[tokio::test]
    async fn test_checkout_unknown_product() {
        let db = test_db().await;
        let a = stocked_product(&db, "Cetirizine", 300, 10).await;

        let err = db
            .sales()
            .checkout(
                &request(vec![line(&a.id, 1, 300), line("p99", 1, 100)]),
                None,
                TotalPolicy::RequireMatch,
            )
            .await
            .unwrap_err();
        match err {
            DbError::Domain(CoreError::ProductNotFound { ids }) => assert_eq!(ids, vec!["p99".to_string()]),
            other => panic!("expected ProductNotFound, got {:?}", other),
        }
        assert_eq!(sale_count(&db).await, 0);
    }

    #[tokio::test]
    async fn test_duplicate_lines_cannot_oversell() {
        let db = test_db().await;
        let p = stocked_product(&db, "Vitamin D3", 700, 5).await;

        // Each line passes the per-line check; their sum does not.
        let err = db
            .sales()
            .checkout(
                &request(vec![line(&p.id, 3, 700), line(&p.id, 3, 700)]),
                None,
                TotalPolicy::RequireMatch,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InsufficientStock { .. })));
        assert_eq!(db.products().get_by_id(&p.id).await.unwrap().unwrap().stock_level, 5);
    }

    #[tokio::test]
    async fn test_total_policy() {
        let db = test_db().await;
        let p = stocked_product(&db, "Antacid", 200, 10).await;

        let mut req = request(vec![line(&p.id, 2, 200)]);
        req.total = 100;

        let err = db
            .sales()
            .checkout(&req, None, TotalPolicy::RequireMatch)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::TotalMismatch { declared: 100, computed: 400 })));
        assert_eq!(sale_count(&db).await, 0);

        let sale_id = db.sales().checkout(&req, None, TotalPolicy::Trust).await.unwrap();
        let detail = db.sales().get_sale(&sale_id).await.unwrap().unwrap();
        assert_eq!(detail.sale.total, 100);
    }

    #[tokio::test]
    async fn test_checkout_with_batch_decrements_both_books() {
        let db = test_db().await;
        let p = stocked_product(&db, "Amoxicillin 250mg", 800, 6).await;
        let batch = db.batches().find_batch(&p.id, "BATCH-A").await.unwrap().unwrap();

        let mut picked = line(&p.id, 4, 800);
        picked.batch_id = Some(batch.id.clone());
        db.sales()
            .checkout(&request(vec![picked]), None, TotalPolicy::RequireMatch)
            .await
            .unwrap();

        assert_eq!(db.batches().get_batch(&batch.id).await.unwrap().unwrap().quantity, 2);
        assert_eq!(db.batches().stock_discrepancy(&p.id).await.unwrap().discrepancy, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_checkouts_never_oversell() {
        let (_dir, db) = file_db().await;
        let p = stocked_product(&db, "Oseltamivir", 2500, 5).await;

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let db = db.clone();
                let req = request(vec![line(&p.id, 3, 2500)]);
                tokio::spawn(async move { db.sales().checkout(&req, None, TotalPolicy::RequireMatch).await })
            })
            .collect();

        let mut succeeded = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(err) => assert!(
                    matches!(err, DbError::Domain(CoreError::InsufficientStock { .. })),
                    "unexpected error: {err:?}"
                ),
            }
        }

        assert_eq!(succeeded, 1);
        assert_eq!(db.products().get_by_id(&p.id).await.unwrap().unwrap().stock_level, 2);
        assert_eq!(sale_count(&db).await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_checkouts_on_distinct_products_all_succeed() {
        let (_dir, db) = file_db().await;
        let mut products = Vec::new();
        for i in 0..8 {
            products.push(stocked_product(&db, &format!("Product {}", i), 100, 10).await);
        }

        let handles: Vec<_> = products
            .iter()
            .map(|p| {
                let db = db.clone();
                let req = request(vec![line(&p.id, 2, 100)]);
                tokio::spawn(async move { db.sales().checkout(&req, None, TotalPolicy::RequireMatch).await })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        for p in &products {
            assert_eq!(db.products().get_by_id(&p.id).await.unwrap().unwrap().stock_level, 8);
        }
        assert_eq!(sale_count(&db).await, 8);
    }

    #[tokio::test]
    async fn test_checkout_accepts_bulk_quantities() {
        let db = test_db().await;
        let p = stocked_product(&db, "Paracetamol 500mg loose", 5, 20_000).await;

        db.sales()
            .checkout(&request(vec![line(&p.id, 10_000, 5)]), None, TotalPolicy::RequireMatch)
            .await
            .unwrap();

        assert_eq!(db.products().get_by_id(&p.id).await.unwrap().unwrap().stock_level, 10_000);
    }

    #[tokio::test]
    async fn test_list_recent_newest_first_with_items() {
        let db = test_db().await;
        let p = stocked_product(&db, "Saline Drops", 450, 20).await;

        let first = db
            .sales()
            .checkout(&request(vec![line(&p.id, 1, 450)]), None, TotalPolicy::RequireMatch)
            .await
            .unwrap();
        let second = db
            .sales()
            .checkout(
                &request(vec![line(&p.id, 2, 450), line(&p.id, 1, 450)]),
                None,
                TotalPolicy::RequireMatch,
            )
            .await
            .unwrap();

        let recent = db.sales().list_recent(Some("branch-1"), RECENT_SALES_LIMIT).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].sale.id, second);
        assert_eq!(recent[0].items.len(), 2);
        assert_eq!(recent[1].sale.id, first);

        assert_eq!(db.sales().list_recent(None, 1).await.unwrap().len(), 1);
        assert!(db.sales().list_recent(Some("branch-2"), 50).await.unwrap().is_empty());
        assert!(db.sales().get_sale("missing").await.unwrap().is_none());
    }
}
