//! # Product Repository
//!
//! Database operations for products and the product + batches view read by
//! the stock status classifier.
//!
//! ## Stock Level Updates
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Every stock_level change is a single guarded UPDATE:                   │
//! │                                                                         │
//! │    UPDATE products                                                      │
//! │       SET stock_level = stock_level + :delta                            │
//! │     WHERE id = :id AND stock_level + :delta >= 0                        │
//! │                                                                         │
//! │  0 rows → re-read to tell ProductNotFound from InsufficientStock.       │
//! │  The CHECK (stock_level >= 0) column constraint backs this up.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use rx_core::receiving::{NewProduct, DEFAULT_UNIT};
use rx_core::{Batch, CoreError, Product, ProductStock};

use super::batch::BATCH_COLUMNS;
use super::generate_id;
use crate::error::DbResult;

pub(crate) const PRODUCT_COLUMNS: &str = "id, branch_id, name_en, name_mm, category, unit_price, unit, \
     stock_level, min_stock_level, location, created_at, updated_at";

// =============================================================================
// Connection-level helpers
// =============================================================================

pub(crate) async fn fetch_one(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Product>> {
    let sql = format!("SELECT {} FROM products WHERE id = ?1", PRODUCT_COLUMNS);
    let product = sqlx::query_as::<_, Product>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(product)
}

/// Resolves a set of product ids in one read.
pub(crate) async fn fetch_by_ids(conn: &mut SqliteConnection, ids: &[String]) -> DbResult<Vec<Product>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
        "SELECT {} FROM products WHERE id IN (",
        PRODUCT_COLUMNS
    ));
    let mut separated = qb.separated(", ");
    for id in ids {
        separated.push_bind(id.clone());
    }
    separated.push_unseparated(")");

    let products = qb.build_query_as::<Product>().fetch_all(&mut *conn).await?;
    Ok(products)
}

/// Inserts a product with `stock_level = 0`.
pub(crate) async fn insert(conn: &mut SqliteConnection, new: &NewProduct) -> DbResult<Product> {
    new.validate()?;

    let now = Utc::now();
    let product = Product {
        id: generate_id(),
        branch_id: new.branch_id.clone(),
        name_en: new.name_en.trim().to_string(),
        name_mm: new.name_mm.clone(),
        category: new.category.trim().to_string(),
        unit_price: new.unit_price,
        unit: new.unit.clone().unwrap_or_else(|| DEFAULT_UNIT.to_string()),
        stock_level: 0,
        min_stock_level: new.min_stock_level(),
        location: None,
        created_at: now,
        updated_at: now,
    };

    debug!(id = %product.id, name = %product.name_en, "Inserting product");

    sqlx::query(
        r#"
        INSERT INTO products (
            id, branch_id, name_en, name_mm, category, unit_price, unit,
            stock_level, min_stock_level, location, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        "#,
    )
    .bind(&product.id)
    .bind(&product.branch_id)
    .bind(&product.name_en)
    .bind(&product.name_mm)
    .bind(&product.category)
    .bind(product.unit_price)
    .bind(&product.unit)
    .bind(product.stock_level)
    .bind(product.min_stock_level)
    .bind(&product.location)
    .bind(product.created_at)
    .bind(product.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(product)
}

/// Applies `delta` to `stock_level`, refusing to go below zero.
///
/// Returns the new stock level. `location` is only overwritten when given.
pub(crate) async fn adjust_stock(
    conn: &mut SqliteConnection,
    id: &str,
    delta: i64,
    location: Option<&str>,
) -> DbResult<i64> {
    debug!(id = %id, delta = delta, "Adjusting stock level");

    let new_level: Option<i64> = sqlx::query_scalar(
        r#"
        UPDATE products
        SET stock_level = stock_level + ?1,
            location = COALESCE(?2, location),
            updated_at = ?3
        WHERE id = ?4 AND stock_level + ?1 >= 0
        RETURNING stock_level
        "#,
    )
    .bind(delta)
    .bind(location)
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    match new_level {
        Some(level) => Ok(level),
        None => match fetch_one(conn, id).await? {
            None => Err(CoreError::product_not_found(id).into()),
            Some(product) => Err(CoreError::InsufficientStock {
                product_id: product.id,
                product_name: product.name_en,
                available: product.stock_level,
                requested: -delta,
            }
            .into()),
        },
    }
}

/// Groups batches under their products, keeping product order.
pub(crate) fn attach_batches(products: Vec<Product>, batches: Vec<Batch>) -> Vec<ProductStock> {
    let mut by_product: HashMap<String, Vec<Batch>> = HashMap::new();
    for batch in batches {
        by_product.entry(batch.product_id.clone()).or_default().push(batch);
    }

    products
        .into_iter()
        .map(|product| {
            let batches = by_product.remove(&product.id).unwrap_or_default();
            ProductStock { product, batches }
        })
        .collect()
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let stock = db.products().list_with_batches(Some("branch-1")).await?;
/// let product = db.products().get_by_id("uuid-here").await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let mut conn = self.pool.acquire().await?;
        fetch_one(&mut *conn, id).await
    }

    /// Resolves a set of product ids. Missing ids are simply absent from the result.
    pub async fn find_products_by_ids(&self, ids: &[String]) -> DbResult<Vec<Product>> {
        let mut conn = self.pool.acquire().await?;
        fetch_by_ids(&mut *conn, ids).await
    }

    /// Lists products, optionally scoped to one branch, by English name.
    pub async fn list(&self, branch_id: Option<&str>) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {} FROM products WHERE (?1 IS NULL OR branch_id = ?1) ORDER BY name_en",
            PRODUCT_COLUMNS
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(branch_id)
            .fetch_all(&self.pool)
            .await?;

        debug!(count = products.len(), "Listed products");
        Ok(products)
    }

    /// Lists products with all of their batches (soonest expiry first).
    pub async fn list_with_batches(&self, branch_id: Option<&str>) -> DbResult<Vec<ProductStock>> {
        let products = self.list(branch_id).await?;

        let sql = format!(
            "SELECT {} FROM product_batches b \
             JOIN products p ON p.id = b.product_id \
             WHERE (?1 IS NULL OR p.branch_id = ?1) \
             ORDER BY b.expiry_date, b.batch_number",
            prefixed(BATCH_COLUMNS, "b")
        );
        let batches = sqlx::query_as::<_, Batch>(&sql)
            .bind(branch_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(attach_batches(products, batches))
    }

    /// Gets one product with its batches.
    pub async fn get_with_batches(&self, id: &str) -> DbResult<Option<ProductStock>> {
        let Some(product) = self.get_by_id(id).await? else {
            return Ok(None);
        };

        let sql = format!(
            "SELECT {} FROM product_batches WHERE product_id = ?1 ORDER BY expiry_date, batch_number",
            BATCH_COLUMNS
        );
        let batches = sqlx::query_as::<_, Batch>(&sql)
            .bind(id)
            .fetch_all(&self.pool)
            .await?;

        Ok(Some(ProductStock { product, batches }))
    }

    /// Creates a product with zero stock.
    pub async fn insert(&self, new: &NewProduct) -> DbResult<Product> {
        let mut conn = self.pool.acquire().await?;
        insert(&mut *conn, new).await
    }

    /// Atomically adds `delta` (negative to remove) to a product's stock level.
    ///
    /// Fails with `InsufficientStock` rather than going below zero.
    pub async fn update_product_stock(&self, id: &str, delta: i64) -> DbResult<i64> {
        let mut conn = self.pool.acquire().await?;
        adjust_stock(&mut *conn, id, delta, None).await
    }

    /// Counts products (for the seed binary and diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

/// `"a, b"` → `"t.a, t.b"`.
fn prefixed(columns: &str, table: &str) -> String {
    columns
        .split(',')
        .map(|c| format!("{}.{}", table, c.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::repository::test_support::{new_product, stocked_product, test_db};

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = test_db().await;
        let created = db
            .products()
            .insert(&new_product("Paracetamol 500mg", 500))
            .await
            .unwrap();

        let fetched = db.products().get_by_id(&created.id).await.unwrap().unwrap();
        assert_eq!(fetched.name_en, "Paracetamol 500mg");
        assert_eq!(fetched.stock_level, 0);
        assert_eq!(fetched.min_stock_level, rx_core::DEFAULT_MIN_STOCK_LEVEL);
        assert_eq!(fetched.unit, "strip");
    }

    #[tokio::test]
    async fn test_insert_rejects_invalid_product() {
        let db = test_db().await;
        let err = db.products().insert(&new_product("", 500)).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_find_products_by_ids_skips_missing() {
        let db = test_db().await;
        let a = stocked_product(&db, "A", 100, 1).await;
        let b = stocked_product(&db, "B", 100, 1).await;

        let found = db
            .products()
            .find_products_by_ids(&[a.id.clone(), "p99".to_string(), b.id.clone()])
            .await
            .unwrap();
        assert_eq!(found.len(), 2);

        let none = db.products().find_products_by_ids(&[]).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_update_product_stock_never_negative() {
        let db = test_db().await;
        let p = stocked_product(&db, "Cetirizine", 300, 5).await;

        assert_eq!(db.products().update_product_stock(&p.id, -3).await.unwrap(), 2);

        let err = db.products().update_product_stock(&p.id, -3).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InsufficientStock {
                available: 2,
                requested: 3,
                ..
            })
        ));

        let after = db.products().get_by_id(&p.id).await.unwrap().unwrap();
        assert_eq!(after.stock_level, 2);

        let missing = db.products().update_product_stock("p99", 1).await.unwrap_err();
        assert!(matches!(missing, DbError::Domain(CoreError::ProductNotFound { .. })));
    }

    #[tokio::test]
    async fn test_list_with_batches_scopes_branch() {
        let db = test_db().await;
        let p = stocked_product(&db, "Amoxicillin 250mg", 800, 12).await;

        let mut other = new_product("Other Branch Syrup", 900);
        other.branch_id = "branch-2".to_string();
        db.products().insert(&other).await.unwrap();

        let stock = db.products().list_with_batches(Some("branch-1")).await.unwrap();
        assert_eq!(stock.len(), 1);
        assert_eq!(stock[0].product.id, p.id);
        assert_eq!(stock[0].batches.len(), 1);
        assert_eq!(stock[0].batches[0].quantity, 12);

        let all = db.products().list_with_batches(None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(db.products().count().await.unwrap(), 2);
    }

    #[test]
    fn test_prefixed_columns() {
        assert_eq!(prefixed("id, quantity", "b"), "b.id, b.quantity");
    }
}
