//! # Ledger Repository
//!
//! Append-only financial ledger. Checkout writes one INCOME row per sale
//! inside its own transaction; nothing here updates or deletes.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use rx_core::{LedgerEntry, LedgerEntryType, PaymentMethod};

use super::generate_id;
use crate::error::DbResult;

const LEDGER_COLUMNS: &str =
    "id, branch_id, entry_type, category, amount, description, payment_method, sale_id, created_at";

/// Fields of a ledger row before it is written.
#[derive(Debug, Clone)]
pub struct NewLedgerEntry<'a> {
    pub branch_id: &'a str,
    pub entry_type: LedgerEntryType,
    pub category: &'a str,
    pub amount: i64,
    pub description: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    pub sale_id: Option<&'a str>,
}

/// Appends a ledger row on the caller's connection or transaction.
pub(crate) async fn create_ledger_entry(
    conn: &mut SqliteConnection,
    new: NewLedgerEntry<'_>,
) -> DbResult<LedgerEntry> {
    let entry = LedgerEntry {
        id: generate_id(),
        branch_id: new.branch_id.to_string(),
        entry_type: new.entry_type,
        category: new.category.to_string(),
        amount: new.amount,
        description: new.description,
        payment_method: new.payment_method,
        sale_id: new.sale_id.map(str::to_string),
        created_at: Utc::now(),
    };

    debug!(
        id = %entry.id,
        entry_type = ?entry.entry_type,
        amount = entry.amount,
        "Appending ledger entry"
    );

    sqlx::query(
        r#"
        INSERT INTO ledger_entries (
            id, branch_id, entry_type, category, amount,
            description, payment_method, sale_id, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&entry.id)
    .bind(&entry.branch_id)
    .bind(entry.entry_type)
    .bind(&entry.category)
    .bind(entry.amount)
    .bind(&entry.description)
    .bind(entry.payment_method)
    .bind(&entry.sale_id)
    .bind(entry.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(entry)
}

/// Repository for the financial ledger.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: SqlitePool,
}

impl LedgerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        LedgerRepository { pool }
    }

    /// Appends a row outside any checkout (manual income or expense).
    pub async fn create_entry(&self, new: NewLedgerEntry<'_>) -> DbResult<LedgerEntry> {
        let mut conn = self.pool.acquire().await?;
        create_ledger_entry(&mut *conn, new).await
    }

    /// Rows written for one sale.
    pub async fn list_for_sale(&self, sale_id: &str) -> DbResult<Vec<LedgerEntry>> {
        let sql = format!(
            "SELECT {} FROM ledger_entries WHERE sale_id = ?1 ORDER BY created_at",
            LEDGER_COLUMNS
        );
        let entries = sqlx::query_as::<_, LedgerEntry>(&sql)
            .bind(sale_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(entries)
    }

    /// Most recent rows of a branch, newest first.
    pub async fn list_for_branch(&self, branch_id: &str, limit: i64) -> DbResult<Vec<LedgerEntry>> {
        let sql = format!(
            "SELECT {} FROM ledger_entries WHERE branch_id = ?1 \
             ORDER BY created_at DESC, rowid DESC LIMIT ?2",
            LEDGER_COLUMNS
        );
        let entries = sqlx::query_as::<_, LedgerEntry>(&sql)
            .bind(branch_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(entries)
    }

    /// Σ amount of a branch's rows of one type.
    pub async fn total(&self, branch_id: &str, entry_type: LedgerEntryType) -> DbResult<i64> {
        let total: Option<i64> = sqlx::query_scalar(
            "SELECT SUM(amount) FROM ledger_entries WHERE branch_id = ?1 AND entry_type = ?2",
        )
        .bind(branch_id)
        .bind(entry_type)
        .fetch_one(&self.pool)
        .await?;

        Ok(total.unwrap_or(0))
    }
}
