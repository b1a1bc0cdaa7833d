//! # Scan Repository
//!
//! Pending barcode scans and their confirmation into the batch ledger.
//!
//! ## Scan Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  record_scan()  ──► scanner_history { verified: 0, sync_status: pending }│
//! │                                                                         │
//! │  confirm(scan_id, receipt)          one transaction                     │
//! │       ├── scan missing?        ──► ScanNotFound                        │
//! │       ├── already verified?    ──► ScanAlreadySynced                   │
//! │       ├── receive_in(receipt)      product created if new, batch upsert │
//! │       ├── scan → verified, synced, "Stock updated"                     │
//! │       └── sync_logs { action, old_quantity, new_quantity }             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use rx_core::receiving::{NewScan, StockReceipt};
use rx_core::{CoreError, ScanRecord, SyncAction, SyncLog, SyncStatus};

use super::batch::{receive_in, ReceiptOutcome};
use super::{begin_write, generate_id};
use crate::error::DbResult;

const SCAN_COLUMNS: &str = "id, branch_id, user_id, gtin, product_name, batch_number, expiry_date, \
     quantity, unit, raw_data, verified, sync_status, sync_message, created_at, updated_at";
const SYNC_LOG_COLUMNS: &str = "id, scan_id, action, product_name, old_quantity, new_quantity, created_at";

/// Message stored on a scan once its stock is in the ledger.
pub const SYNCED_MESSAGE: &str = "Stock updated";

/// Default page size of [`ScanRepository::list_scans`].
pub const RECENT_SCANS_LIMIT: i64 = 100;

/// Result of confirming a scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmOutcome {
    pub scan: ScanRecord,
    pub receipt: ReceiptOutcome,
    pub sync_log: SyncLog,
}

async fn fetch_scan(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<ScanRecord>> {
    let sql = format!("SELECT {} FROM scanner_history WHERE id = ?1", SCAN_COLUMNS);
    let scan = sqlx::query_as::<_, ScanRecord>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(scan)
}

/// Repository for scanner history.
#[derive(Debug, Clone)]
pub struct ScanRepository {
    pool: SqlitePool,
}

impl ScanRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ScanRepository { pool }
    }

    /// Stores a raw scan as pending.
    pub async fn record_scan(&self, new: &NewScan, user_id: Option<&str>) -> DbResult<ScanRecord> {
        new.validate()?;

        let now = Utc::now();
        let scan = ScanRecord {
            id: generate_id(),
            branch_id: new.branch_id.clone(),
            user_id: user_id.map(str::to_string),
            gtin: new.gtin.clone(),
            product_name: new.product_name.clone(),
            batch_number: new.batch_number.clone(),
            expiry_date: new.expiry_date,
            quantity: new.quantity(),
            unit: new.unit.clone(),
            raw_data: new.raw_data.clone(),
            verified: false,
            sync_status: SyncStatus::Pending,
            sync_message: None,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO scanner_history (
                id, branch_id, user_id, gtin, product_name, batch_number, expiry_date,
                quantity, unit, raw_data, verified, sync_status, sync_message, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
        )
        .bind(&scan.id)
        .bind(&scan.branch_id)
        .bind(&scan.user_id)
        .bind(&scan.gtin)
        .bind(&scan.product_name)
        .bind(&scan.batch_number)
        .bind(scan.expiry_date)
        .bind(scan.quantity)
        .bind(&scan.unit)
        .bind(&scan.raw_data)
        .bind(scan.verified)
        .bind(scan.sync_status)
        .bind(&scan.sync_message)
        .bind(scan.created_at)
        .bind(scan.updated_at)
        .execute(&self.pool)
        .await?;

        debug!(id = %scan.id, gtin = ?scan.gtin, "Scan recorded");
        Ok(scan)
    }

    pub async fn get_scan(&self, id: &str) -> DbResult<Option<ScanRecord>> {
        let mut conn = self.pool.acquire().await?;
        fetch_scan(&mut *conn, id).await
    }

    /// Most recent scans, newest first.
    pub async fn list_scans(&self, branch_id: Option<&str>, limit: i64) -> DbResult<Vec<ScanRecord>> {
        let sql = format!(
            "SELECT {} FROM scanner_history WHERE (?1 IS NULL OR branch_id = ?1) \
             ORDER BY created_at DESC, rowid DESC LIMIT ?2",
            SCAN_COLUMNS
        );
        let scans = sqlx::query_as::<_, ScanRecord>(&sql)
            .bind(branch_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(scans)
    }

    pub async fn sync_logs(&self, scan_id: &str) -> DbResult<Vec<SyncLog>> {
        let sql = format!(
            "SELECT {} FROM sync_logs WHERE scan_id = ?1 ORDER BY created_at",
            SYNC_LOG_COLUMNS
        );
        let logs = sqlx::query_as::<_, SyncLog>(&sql)
            .bind(scan_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(logs)
    }

    /// Confirms a pending scan into the batch ledger.
    ///
    /// ## Errors
    /// - `ScanNotFound`: no such scan
    /// - `ScanAlreadySynced`: the scan was confirmed before; nothing is written
    /// - anything `receive_stock` can fail with
    pub async fn confirm(&self, scan_id: &str, receipt: &StockReceipt, today: NaiveDate) -> DbResult<ConfirmOutcome> {
        let plan = receipt.resolve(today)?;

        let mut tx = begin_write(&self.pool).await?;

        let scan = fetch_scan(&mut *tx, scan_id)
            .await?
            .ok_or_else(|| CoreError::ScanNotFound(scan_id.to_string()))?;
        if scan.verified {
            return Err(CoreError::ScanAlreadySynced(scan.id).into());
        }

        let outcome = receive_in(&mut *tx, &plan).await?;

        let now = Utc::now();
        let sql = format!(
            r#"
            UPDATE scanner_history
            SET verified = 1, sync_status = ?1, sync_message = ?2, updated_at = ?3
            WHERE id = ?4 AND verified = 0
            RETURNING {}
            "#,
            SCAN_COLUMNS
        );
        let scan = sqlx::query_as::<_, ScanRecord>(&sql)
            .bind(SyncStatus::Synced)
            .bind(SYNCED_MESSAGE)
            .bind(now)
            .bind(scan_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| CoreError::ScanAlreadySynced(scan_id.to_string()))?;

        let sync_log = SyncLog {
            id: generate_id(),
            scan_id: scan.id.clone(),
            action: if outcome.product_created {
                SyncAction::Create
            } else {
                SyncAction::Update
            },
            product_name: Some(outcome.product_name.clone()),
            old_quantity: (!outcome.product_created).then_some(outcome.old_stock_level),
            new_quantity: outcome.new_stock_level,
            created_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO sync_logs (
                id, scan_id, action, product_name, old_quantity, new_quantity, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&sync_log.id)
        .bind(&sync_log.scan_id)
        .bind(sync_log.action)
        .bind(&sync_log.product_name)
        .bind(sync_log.old_quantity)
        .bind(sync_log.new_quantity)
        .bind(sync_log.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            scan_id = %scan.id,
            product_id = %outcome.product_id,
            action = ?sync_log.action,
            new_quantity = sync_log.new_quantity,
            "Scan confirmed"
        );

        Ok(ConfirmOutcome {
            scan,
            receipt: outcome,
            sync_log,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::repository::test_support::{in_days, new_product, stocked_product, test_db, today};

    fn scan(raw: &str) -> NewScan {
        NewScan {
            branch_id: "branch-1".to_string(),
            gtin: Some("09501101530008".to_string()),
            product_name: Some("Paracetamol 500mg".to_string()),
            batch_number: Some("LOT-77".to_string()),
            expiry_date: Some(in_days(400)),
            quantity: None,
            unit: Some("strip".to_string()),
            raw_data: raw.to_string(),
        }
    }

    #[tokio::test]
    async fn test_record_scan_is_pending() {
        let db = test_db().await;
        let recorded = db
            .scans()
            .record_scan(&scan("0109501101530008"), Some("user-1"))
            .await
            .unwrap();

        assert_eq!(recorded.quantity, 0);
        assert!(!recorded.verified);
        assert_eq!(recorded.sync_status, SyncStatus::Pending);

        let fetched = db.scans().get_scan(&recorded.id).await.unwrap().unwrap();
        assert_eq!(fetched, recorded);
    }

    #[tokio::test]
    async fn test_record_scan_rejects_short_payload() {
        let db = test_db().await;
        let err = db.scans().record_scan(&scan("abc"), None).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_confirm_updates_stock_and_logs_once() {
        let db = test_db().await;
        let p = stocked_product(&db, "Paracetamol 500mg", 500, 5).await;
        let pending = db.scans().record_scan(&scan("0109501101530008"), None).await.unwrap();

        let receipt = StockReceipt::existing(p.id.clone(), 10)
            .with_batch("LOT-77")
            .with_expiry(in_days(400));
        let outcome = db.scans().confirm(&pending.id, &receipt, today()).await.unwrap();

        assert!(outcome.scan.verified);
        assert_eq!(outcome.scan.sync_status, SyncStatus::Synced);
        assert_eq!(outcome.scan.sync_message.as_deref(), Some(SYNCED_MESSAGE));
        assert_eq!(outcome.sync_log.action, SyncAction::Update);
        assert_eq!(outcome.sync_log.old_quantity, Some(5));
        assert_eq!(outcome.sync_log.new_quantity, 15);

        let err = db.scans().confirm(&pending.id, &receipt, today()).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::ScanAlreadySynced(_))));
        assert_eq!(err.as_domain().map(CoreError::kind), Some(rx_core::ErrorKind::Conflict));

        assert_eq!(db.scans().sync_logs(&pending.id).await.unwrap().len(), 1);
        let after = db.products().get_by_id(&p.id).await.unwrap().unwrap();
        assert_eq!(after.stock_level, 15);
    }

    #[tokio::test]
    async fn test_confirm_creates_product() {
        let db = test_db().await;
        let pending = db.scans().record_scan(&scan("0109501101530008"), None).await.unwrap();

        let mut receipt = StockReceipt::existing("unused", 12).with_batch("LOT-77");
        receipt.product_id = None;
        receipt.new_product = Some(new_product("Paracetamol 500mg", 500));

        let outcome = db.scans().confirm(&pending.id, &receipt, today()).await.unwrap();
        assert_eq!(outcome.sync_log.action, SyncAction::Create);
        assert_eq!(outcome.sync_log.old_quantity, None);
        assert_eq!(outcome.sync_log.new_quantity, 12);
        assert!(outcome.receipt.product_created);
    }

    #[tokio::test]
    async fn test_confirm_failure_leaves_scan_pending() {
        let db = test_db().await;
        let pending = db.scans().record_scan(&scan("0109501101530008"), None).await.unwrap();

        let receipt = StockReceipt::existing("p99", 3);
        let err = db.scans().confirm(&pending.id, &receipt, today()).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::ProductNotFound { .. })));

        let after = db.scans().get_scan(&pending.id).await.unwrap().unwrap();
        assert!(!after.verified);
        assert!(db.scans().sync_logs(&pending.id).await.unwrap().is_empty());

        let missing = db.scans().confirm("nope", &receipt, today()).await.unwrap_err();
        assert!(matches!(missing, DbError::Domain(CoreError::ScanNotFound(_))));
    }

    #[tokio::test]
    async fn test_list_scans_newest_first() {
        let db = test_db().await;
        let first = db.scans().record_scan(&scan("AAAA-1"), None).await.unwrap();
        let second = db.scans().record_scan(&scan("AAAA-2"), None).await.unwrap();

        let scans = db.scans().list_scans(Some("branch-1"), RECENT_SCANS_LIMIT).await.unwrap();
        assert_eq!(scans.len(), 2);
        assert_eq!(scans[0].id, second.id);
        assert_eq!(scans[1].id, first.id);
        assert!(db.scans().list_scans(Some("branch-9"), 10).await.unwrap().is_empty());
    }
}
