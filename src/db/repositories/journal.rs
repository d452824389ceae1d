//! Journal repository
//!
//! Database operations for journal entries and their lines. Posting writes
//! the entry header and every line inside one database transaction: the
//! write is all-or-nothing even if the process dies mid-way, because
//! atomicity is delegated to the database's transaction primitive.
//!
//! The period lock is re-checked inside that transaction. The service layer
//! checks it earlier for a fast client error, but a period can be locked by
//! a concurrent request between validation and commit, so the in-transaction
//! check is the authoritative one.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{
    AccountType, EntryWithLines, JournalEntry, JournalLine, JournalLineInput, ListParams,
    PagedResult,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

/// Error returned by the posting path.
///
/// `Database` wraps the raw sqlx error so the caller can decide whether the
/// failure is a transient lock conflict worth retrying.
#[derive(Debug, thiserror::Error)]
pub enum PostError {
    /// The target period is flagged locked
    #[error("period is locked")]
    PeriodLocked,
    /// The target period does not exist in this organization
    #[error("accounting period not found")]
    PeriodMissing,
    /// Any database failure, including transient lock conflicts
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Per-account debit/credit totals over a period
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TrialBalanceRow {
    pub account_id: i64,
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    pub total_debit: f64,
    pub total_credit: f64,
}

/// One row of an account's activity listing
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ActivityRow {
    pub entry_id: i64,
    pub entry_date: NaiveDate,
    pub memo: Option<String>,
    pub debit: f64,
    pub credit: f64,
}

/// Journal repository trait
#[async_trait]
pub trait JournalRepository: Send + Sync {
    /// Atomically persist an entry header and all of its lines.
    ///
    /// The period lock is re-checked inside the transaction; a locked or
    /// missing period aborts with nothing written.
    async fn post(
        &self,
        entry: &JournalEntry,
        lines: &[JournalLineInput],
    ) -> Result<EntryWithLines, PostError>;

    /// Get an entry with its lines
    async fn get_entry(&self, org_id: i64, id: i64) -> Result<Option<EntryWithLines>>;

    /// List entry headers, newest first, optionally filtered by period
    async fn list_entries(
        &self,
        org_id: i64,
        params: &ListParams,
        period_id: Option<i64>,
    ) -> Result<PagedResult<JournalEntry>>;

    /// Count all journal lines of an organization
    async fn count_lines(&self, org_id: i64) -> Result<i64>;

    /// Count all entries of an organization
    async fn count_entries(&self, org_id: i64) -> Result<i64>;

    /// Per-account debit/credit totals for a period
    async fn trial_balance(&self, org_id: i64, period_id: i64) -> Result<Vec<TrialBalanceRow>>;

    /// Line-level activity of one account within a period
    async fn account_activity(
        &self,
        org_id: i64,
        account_id: i64,
        period_id: i64,
    ) -> Result<Vec<ActivityRow>>;
}

/// SQLx-based journal repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxJournalRepository {
    pool: DynDatabasePool,
}

impl SqlxJournalRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn JournalRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl JournalRepository for SqlxJournalRepository {
    async fn post(
        &self,
        entry: &JournalEntry,
        lines: &[JournalLineInput],
    ) -> Result<EntryWithLines, PostError> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => post_sqlite(self.pool.as_sqlite().unwrap(), entry, lines).await,
            DatabaseDriver::Mysql => post_mysql(self.pool.as_mysql().unwrap(), entry, lines).await,
        }
    }

    async fn get_entry(&self, org_id: i64, id: i64) -> Result<Option<EntryWithLines>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_entry_sqlite(self.pool.as_sqlite().unwrap(), org_id, id).await
            }
            DatabaseDriver::Mysql => {
                get_entry_mysql(self.pool.as_mysql().unwrap(), org_id, id).await
            }
        }
    }

    async fn list_entries(
        &self,
        org_id: i64,
        params: &ListParams,
        period_id: Option<i64>,
    ) -> Result<PagedResult<JournalEntry>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_entries_sqlite(self.pool.as_sqlite().unwrap(), org_id, params, period_id).await
            }
            DatabaseDriver::Mysql => {
                list_entries_mysql(self.pool.as_mysql().unwrap(), org_id, params, period_id).await
            }
        }
    }

    async fn count_lines(&self, org_id: i64) -> Result<i64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => count_lines_sqlite(self.pool.as_sqlite().unwrap(), org_id).await,
            DatabaseDriver::Mysql => count_lines_mysql(self.pool.as_mysql().unwrap(), org_id).await,
        }
    }

    async fn count_entries(&self, org_id: i64) -> Result<i64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                count_entries_sqlite(self.pool.as_sqlite().unwrap(), org_id).await
            }
            DatabaseDriver::Mysql => {
                count_entries_mysql(self.pool.as_mysql().unwrap(), org_id).await
            }
        }
    }

    async fn trial_balance(&self, org_id: i64, period_id: i64) -> Result<Vec<TrialBalanceRow>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                trial_balance_sqlite(self.pool.as_sqlite().unwrap(), org_id, period_id).await
            }
            DatabaseDriver::Mysql => {
                trial_balance_mysql(self.pool.as_mysql().unwrap(), org_id, period_id).await
            }
        }
    }

    async fn account_activity(
        &self,
        org_id: i64,
        account_id: i64,
        period_id: i64,
    ) -> Result<Vec<ActivityRow>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                account_activity_sqlite(self.pool.as_sqlite().unwrap(), org_id, account_id, period_id)
                    .await
            }
            DatabaseDriver::Mysql => {
                account_activity_mysql(self.pool.as_mysql().unwrap(), org_id, account_id, period_id)
                    .await
            }
        }
    }
}

const ENTRY_COLUMNS: &str =
    "id, org_id, period_id, entry_date, memo, reference, posted_by, created_at";

const TRIAL_BALANCE_SQL: &str = r#"
    SELECT a.id as account_id, a.code, a.name, a.account_type,
           COALESCE(SUM(l.debit), 0) as total_debit,
           COALESCE(SUM(l.credit), 0) as total_credit
    FROM journal_lines l
    INNER JOIN journal_entries e ON e.id = l.entry_id
    INNER JOIN accounts a ON a.id = l.account_id
    WHERE e.org_id = ? AND e.period_id = ?
    GROUP BY a.id, a.code, a.name, a.account_type
    ORDER BY a.code
"#;

const ACTIVITY_SQL: &str = r#"
    SELECT e.id as entry_id, e.entry_date, e.memo, l.debit, l.credit
    FROM journal_lines l
    INNER JOIN journal_entries e ON e.id = l.entry_id
    WHERE e.org_id = ? AND l.account_id = ? AND e.period_id = ?
    ORDER BY e.entry_date, e.id, l.position
"#;

// ============================================================================
// SQLite implementations
// ============================================================================

async fn post_sqlite(
    pool: &SqlitePool,
    entry: &JournalEntry,
    lines: &[JournalLineInput],
) -> Result<EntryWithLines, PostError> {
    let now = Utc::now();

    // The transaction rolls back on drop, so any early return below leaves
    // nothing behind.
    let mut tx = pool.begin().await?;

    // Authoritative period-lock check
    let locked: Option<bool> =
        sqlx::query_scalar("SELECT locked FROM accounting_periods WHERE org_id = ? AND id = ?")
            .bind(entry.org_id)
            .bind(entry.period_id)
            .fetch_optional(&mut *tx)
            .await?;

    match locked {
        None => {
            tx.rollback().await?;
            return Err(PostError::PeriodMissing);
        }
        Some(true) => {
            tx.rollback().await?;
            return Err(PostError::PeriodLocked);
        }
        Some(false) => {}
    }

    let result = sqlx::query(
        r#"
        INSERT INTO journal_entries (org_id, period_id, entry_date, memo, reference, posted_by, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(entry.org_id)
    .bind(entry.period_id)
    .bind(entry.entry_date)
    .bind(&entry.memo)
    .bind(&entry.reference)
    .bind(entry.posted_by)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    let entry_id = result.last_insert_rowid();

    let mut stored_lines = Vec::with_capacity(lines.len());
    for (position, line) in lines.iter().enumerate() {
        let line_result = sqlx::query(
            "INSERT INTO journal_lines (entry_id, account_id, debit, credit, position) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(entry_id)
        .bind(line.account_id)
        .bind(line.debit)
        .bind(line.credit)
        .bind(position as i32)
        .execute(&mut *tx)
        .await?;

        stored_lines.push(JournalLine {
            id: line_result.last_insert_rowid(),
            entry_id,
            account_id: line.account_id,
            debit: line.debit,
            credit: line.credit,
            position: position as i32,
        });
    }

    // Commit all changes atomically
    tx.commit().await?;

    Ok(EntryWithLines {
        entry: JournalEntry {
            id: entry_id,
            org_id: entry.org_id,
            period_id: entry.period_id,
            entry_date: entry.entry_date,
            memo: entry.memo.clone(),
            reference: entry.reference.clone(),
            posted_by: entry.posted_by,
            created_at: now,
        },
        lines: stored_lines,
    })
}

async fn get_entry_sqlite(
    pool: &SqlitePool,
    org_id: i64,
    id: i64,
) -> Result<Option<EntryWithLines>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM journal_entries WHERE org_id = ? AND id = ?",
        ENTRY_COLUMNS
    ))
    .bind(org_id)
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get journal entry")?;

    let Some(row) = row else {
        return Ok(None);
    };
    let entry = row_to_entry_sqlite(&row)?;

    let line_rows = sqlx::query(
        "SELECT id, entry_id, account_id, debit, credit, position FROM journal_lines \
         WHERE entry_id = ? ORDER BY position",
    )
    .bind(id)
    .fetch_all(pool)
    .await
    .context("Failed to get journal lines")?;

    let lines = line_rows.iter().map(row_to_line_sqlite).collect();

    Ok(Some(EntryWithLines { entry, lines }))
}

async fn list_entries_sqlite(
    pool: &SqlitePool,
    org_id: i64,
    params: &ListParams,
    period_id: Option<i64>,
) -> Result<PagedResult<JournalEntry>> {
    let (total, rows) = match period_id {
        Some(period_id) => {
            let total: i64 = sqlx::query(
                "SELECT COUNT(*) as count FROM journal_entries WHERE org_id = ? AND period_id = ?",
            )
            .bind(org_id)
            .bind(period_id)
            .fetch_one(pool)
            .await
            .context("Failed to count journal entries")?
            .get("count");

            let rows = sqlx::query(&format!(
                "SELECT {} FROM journal_entries WHERE org_id = ? AND period_id = ? \
                 ORDER BY entry_date DESC, id DESC LIMIT ? OFFSET ?",
                ENTRY_COLUMNS
            ))
            .bind(org_id)
            .bind(period_id)
            .bind(params.limit())
            .bind(params.offset())
            .fetch_all(pool)
            .await
            .context("Failed to list journal entries")?;

            (total, rows)
        }
        None => {
            let total: i64 =
                sqlx::query("SELECT COUNT(*) as count FROM journal_entries WHERE org_id = ?")
                    .bind(org_id)
                    .fetch_one(pool)
                    .await
                    .context("Failed to count journal entries")?
                    .get("count");

            let rows = sqlx::query(&format!(
                "SELECT {} FROM journal_entries WHERE org_id = ? \
                 ORDER BY entry_date DESC, id DESC LIMIT ? OFFSET ?",
                ENTRY_COLUMNS
            ))
            .bind(org_id)
            .bind(params.limit())
            .bind(params.offset())
            .fetch_all(pool)
            .await
            .context("Failed to list journal entries")?;

            (total, rows)
        }
    };

    let mut entries = Vec::new();
    for row in rows {
        entries.push(row_to_entry_sqlite(&row)?);
    }

    Ok(PagedResult::new(entries, total, params))
}

async fn count_lines_sqlite(pool: &SqlitePool, org_id: i64) -> Result<i64> {
    let row = sqlx::query(
        "SELECT COUNT(*) as count FROM journal_lines l \
         INNER JOIN journal_entries e ON e.id = l.entry_id WHERE e.org_id = ?",
    )
    .bind(org_id)
    .fetch_one(pool)
    .await
    .context("Failed to count journal lines")?;

    Ok(row.get("count"))
}

async fn count_entries_sqlite(pool: &SqlitePool, org_id: i64) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) as count FROM journal_entries WHERE org_id = ?")
        .bind(org_id)
        .fetch_one(pool)
        .await
        .context("Failed to count journal entries")?;

    Ok(row.get("count"))
}

async fn trial_balance_sqlite(
    pool: &SqlitePool,
    org_id: i64,
    period_id: i64,
) -> Result<Vec<TrialBalanceRow>> {
    let rows = sqlx::query(TRIAL_BALANCE_SQL)
        .bind(org_id)
        .bind(period_id)
        .fetch_all(pool)
        .await
        .context("Failed to compute trial balance")?;

    let mut balances = Vec::new();
    for row in rows {
        let account_type: String = row.get("account_type");
        balances.push(TrialBalanceRow {
            account_id: row.get("account_id"),
            code: row.get("code"),
            name: row.get("name"),
            account_type: AccountType::from_str(&account_type)?,
            total_debit: row.get("total_debit"),
            total_credit: row.get("total_credit"),
        });
    }

    Ok(balances)
}

async fn account_activity_sqlite(
    pool: &SqlitePool,
    org_id: i64,
    account_id: i64,
    period_id: i64,
) -> Result<Vec<ActivityRow>> {
    let rows = sqlx::query(ACTIVITY_SQL)
        .bind(org_id)
        .bind(account_id)
        .bind(period_id)
        .fetch_all(pool)
        .await
        .context("Failed to load account activity")?;

    Ok(rows
        .iter()
        .map(|row| ActivityRow {
            entry_id: row.get("entry_id"),
            entry_date: row.get("entry_date"),
            memo: row.get("memo"),
            debit: row.get("debit"),
            credit: row.get("credit"),
        })
        .collect())
}

fn row_to_entry_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<JournalEntry> {
    Ok(JournalEntry {
        id: row.get("id"),
        org_id: row.get("org_id"),
        period_id: row.get("period_id"),
        entry_date: row.get("entry_date"),
        memo: row.get("memo"),
        reference: row.get("reference"),
        posted_by: row.get("posted_by"),
        created_at: row.get("created_at"),
    })
}

fn row_to_line_sqlite(row: &sqlx::sqlite::SqliteRow) -> JournalLine {
    JournalLine {
        id: row.get("id"),
        entry_id: row.get("entry_id"),
        account_id: row.get("account_id"),
        debit: row.get("debit"),
        credit: row.get("credit"),
        position: row.get("position"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn post_mysql(
    pool: &MySqlPool,
    entry: &JournalEntry,
    lines: &[JournalLineInput],
) -> Result<EntryWithLines, PostError> {
    let now = Utc::now();

    let mut tx = pool.begin().await?;

    // Authoritative period-lock check
    let locked: Option<bool> =
        sqlx::query_scalar("SELECT locked FROM accounting_periods WHERE org_id = ? AND id = ?")
            .bind(entry.org_id)
            .bind(entry.period_id)
            .fetch_optional(&mut *tx)
            .await?;

    match locked {
        None => {
            tx.rollback().await?;
            return Err(PostError::PeriodMissing);
        }
        Some(true) => {
            tx.rollback().await?;
            return Err(PostError::PeriodLocked);
        }
        Some(false) => {}
    }

    let result = sqlx::query(
        r#"
        INSERT INTO journal_entries (org_id, period_id, entry_date, memo, reference, posted_by, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(entry.org_id)
    .bind(entry.period_id)
    .bind(entry.entry_date)
    .bind(&entry.memo)
    .bind(&entry.reference)
    .bind(entry.posted_by)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    let entry_id = result.last_insert_id() as i64;

    let mut stored_lines = Vec::with_capacity(lines.len());
    for (position, line) in lines.iter().enumerate() {
        let line_result = sqlx::query(
            "INSERT INTO journal_lines (entry_id, account_id, debit, credit, position) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(entry_id)
        .bind(line.account_id)
        .bind(line.debit)
        .bind(line.credit)
        .bind(position as i32)
        .execute(&mut *tx)
        .await?;

        stored_lines.push(JournalLine {
            id: line_result.last_insert_id() as i64,
            entry_id,
            account_id: line.account_id,
            debit: line.debit,
            credit: line.credit,
            position: position as i32,
        });
    }

    tx.commit().await?;

    Ok(EntryWithLines {
        entry: JournalEntry {
            id: entry_id,
            org_id: entry.org_id,
            period_id: entry.period_id,
            entry_date: entry.entry_date,
            memo: entry.memo.clone(),
            reference: entry.reference.clone(),
            posted_by: entry.posted_by,
            created_at: now,
        },
        lines: stored_lines,
    })
}

async fn get_entry_mysql(pool: &MySqlPool, org_id: i64, id: i64) -> Result<Option<EntryWithLines>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM journal_entries WHERE org_id = ? AND id = ?",
        ENTRY_COLUMNS
    ))
    .bind(org_id)
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get journal entry")?;

    let Some(row) = row else {
        return Ok(None);
    };
    let entry = row_to_entry_mysql(&row)?;

    let line_rows = sqlx::query(
        "SELECT id, entry_id, account_id, debit, credit, position FROM journal_lines \
         WHERE entry_id = ? ORDER BY position",
    )
    .bind(id)
    .fetch_all(pool)
    .await
    .context("Failed to get journal lines")?;

    let lines = line_rows.iter().map(row_to_line_mysql).collect();

    Ok(Some(EntryWithLines { entry, lines }))
}

async fn list_entries_mysql(
    pool: &MySqlPool,
    org_id: i64,
    params: &ListParams,
    period_id: Option<i64>,
) -> Result<PagedResult<JournalEntry>> {
    let (total, rows) = match period_id {
        Some(period_id) => {
            let total: i64 = sqlx::query(
                "SELECT COUNT(*) as count FROM journal_entries WHERE org_id = ? AND period_id = ?",
            )
            .bind(org_id)
            .bind(period_id)
            .fetch_one(pool)
            .await
            .context("Failed to count journal entries")?
            .get("count");

            let rows = sqlx::query(&format!(
                "SELECT {} FROM journal_entries WHERE org_id = ? AND period_id = ? \
                 ORDER BY entry_date DESC, id DESC LIMIT ? OFFSET ?",
                ENTRY_COLUMNS
            ))
            .bind(org_id)
            .bind(period_id)
            .bind(params.limit())
            .bind(params.offset())
            .fetch_all(pool)
            .await
            .context("Failed to list journal entries")?;

            (total, rows)
        }
        None => {
            let total: i64 =
                sqlx::query("SELECT COUNT(*) as count FROM journal_entries WHERE org_id = ?")
                    .bind(org_id)
                    .fetch_one(pool)
                    .await
                    .context("Failed to count journal entries")?
                    .get("count");

            let rows = sqlx::query(&format!(
                "SELECT {} FROM journal_entries WHERE org_id = ? \
                 ORDER BY entry_date DESC, id DESC LIMIT ? OFFSET ?",
                ENTRY_COLUMNS
            ))
            .bind(org_id)
            .bind(params.limit())
            .bind(params.offset())
            .fetch_all(pool)
            .await
            .context("Failed to list journal entries")?;

            (total, rows)
        }
    };

    let mut entries = Vec::new();
    for row in rows {
        entries.push(row_to_entry_mysql(&row)?);
    }

    Ok(PagedResult::new(entries, total, params))
}

async fn count_lines_mysql(pool: &MySqlPool, org_id: i64) -> Result<i64> {
    let row = sqlx::query(
        "SELECT COUNT(*) as count FROM journal_lines l \
         INNER JOIN journal_entries e ON e.id = l.entry_id WHERE e.org_id = ?",
    )
    .bind(org_id)
    .fetch_one(pool)
    .await
    .context("Failed to count journal lines")?;

    Ok(row.get("count"))
}

async fn count_entries_mysql(pool: &MySqlPool, org_id: i64) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) as count FROM journal_entries WHERE org_id = ?")
        .bind(org_id)
        .fetch_one(pool)
        .await
        .context("Failed to count journal entries")?;

    Ok(row.get("count"))
}

async fn trial_balance_mysql(
    pool: &MySqlPool,
    org_id: i64,
    period_id: i64,
) -> Result<Vec<TrialBalanceRow>> {
    let rows = sqlx::query(TRIAL_BALANCE_SQL)
        .bind(org_id)
        .bind(period_id)
        .fetch_all(pool)
        .await
        .context("Failed to compute trial balance")?;

    let mut balances = Vec::new();
    for row in rows {
        let account_type: String = row.get("account_type");
        balances.push(TrialBalanceRow {
            account_id: row.get("account_id"),
            code: row.get("code"),
            name: row.get("name"),
            account_type: AccountType::from_str(&account_type)?,
            total_debit: row.get("total_debit"),
            total_credit: row.get("total_credit"),
        });
    }

    Ok(balances)
}

async fn account_activity_mysql(
    pool: &MySqlPool,
    org_id: i64,
    account_id: i64,
    period_id: i64,
) -> Result<Vec<ActivityRow>> {
    let rows = sqlx::query(ACTIVITY_SQL)
        .bind(org_id)
        .bind(account_id)
        .bind(period_id)
        .fetch_all(pool)
        .await
        .context("Failed to load account activity")?;

    Ok(rows
        .iter()
        .map(|row| ActivityRow {
            entry_id: row.get("entry_id"),
            entry_date: row.get("entry_date"),
            memo: row.get("memo"),
            debit: row.get("debit"),
            credit: row.get("credit"),
        })
        .collect())
}

fn row_to_entry_mysql(row: &sqlx::mysql::MySqlRow) -> Result<JournalEntry> {
    Ok(JournalEntry {
        id: row.get("id"),
        org_id: row.get("org_id"),
        period_id: row.get("period_id"),
        entry_date: row.get("entry_date"),
        memo: row.get("memo"),
        reference: row.get("reference"),
        posted_by: row.get("posted_by"),
        created_at: row.get("created_at"),
    })
}

fn row_to_line_mysql(row: &sqlx::mysql::MySqlRow) -> JournalLine {
    JournalLine {
        id: row.get("id"),
        entry_id: row.get("entry_id"),
        account_id: row.get("account_id"),
        debit: row.get("debit"),
        credit: row.get("credit"),
        position: row.get("position"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> SqlxJournalRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        pool.execute("INSERT INTO organizations (name, slug) VALUES ('Test Org', 'test-org')")
            .await
            .unwrap();
        pool.execute(
            "INSERT INTO users (org_id, username, email, password_hash, role) \
             VALUES (1, 'alice', 'alice@test', 'x', 'accountant')",
        )
        .await
        .unwrap();
        pool.execute(
            "INSERT INTO accounts (org_id, code, name, account_type) VALUES (1, '1000', 'Cash', 'asset')",
        )
        .await
        .unwrap();
        pool.execute(
            "INSERT INTO accounts (org_id, code, name, account_type) VALUES (1, '4000', 'Revenue', 'income')",
        )
        .await
        .unwrap();
        pool.execute(
            "INSERT INTO accounting_periods (org_id, name, start_date, end_date, locked) \
             VALUES (1, '2026-03', '2026-03-01', '2026-03-31', 0)",
        )
        .await
        .unwrap();
        pool.execute(
            "INSERT INTO accounting_periods (org_id, name, start_date, end_date, locked) \
             VALUES (1, '2026-02', '2026-02-01', '2026-02-28', 1)",
        )
        .await
        .unwrap();
        SqlxJournalRepository::new(pool)
    }

    fn entry(period_id: i64) -> JournalEntry {
        JournalEntry {
            id: 0,
            org_id: 1,
            period_id,
            entry_date: chrono::NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
            memo: Some("Invoice payment".into()),
            reference: None,
            posted_by: 1,
            created_at: Utc::now(),
        }
    }

    fn line(account_id: i64, debit: f64, credit: f64) -> JournalLineInput {
        JournalLineInput {
            account_id,
            debit,
            credit,
        }
    }

    #[tokio::test]
    async fn test_post_persists_entry_and_lines() {
        let repo = setup_test_repo().await;
        let lines = vec![line(1, 100.0, 0.0), line(2, 0.0, 100.0)];

        let posted = repo.post(&entry(1), &lines).await.expect("Posting failed");

        assert!(posted.entry.id > 0);
        assert_eq!(posted.lines.len(), 2);
        assert_eq!(posted.lines[0].position, 0);
        assert_eq!(posted.lines[1].position, 1);

        let reloaded = repo
            .get_entry(1, posted.entry.id)
            .await
            .unwrap()
            .expect("Entry should exist");
        assert_eq!(reloaded.lines.len(), 2);
        assert_eq!(reloaded.lines[0].debit, 100.0);
        assert_eq!(reloaded.lines[1].credit, 100.0);
    }

    #[tokio::test]
    async fn test_post_into_locked_period_rejected() {
        let repo = setup_test_repo().await;
        let lines = vec![line(1, 50.0, 0.0), line(2, 0.0, 50.0)];

        let result = repo.post(&entry(2), &lines).await;
        assert!(matches!(result, Err(PostError::PeriodLocked)));

        // Nothing persisted
        assert_eq!(repo.count_lines(1).await.unwrap(), 0);
        assert_eq!(repo.count_entries(1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_post_into_missing_period_rejected() {
        let repo = setup_test_repo().await;
        let lines = vec![line(1, 50.0, 0.0), line(2, 0.0, 50.0)];

        let result = repo.post(&entry(999), &lines).await;
        assert!(matches!(result, Err(PostError::PeriodMissing)));
        assert_eq!(repo.count_lines(1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_post_is_all_or_nothing_on_mid_write_failure() {
        let repo = setup_test_repo().await;
        // The second line references a nonexistent account; the foreign key
        // violation fires after the header and first line were written.
        let lines = vec![line(1, 75.0, 0.0), line(999, 0.0, 75.0)];

        let result = repo.post(&entry(1), &lines).await;
        assert!(matches!(result, Err(PostError::Database(_))));

        // The transaction rolled back: zero lines and zero entries visible
        assert_eq!(repo.count_lines(1).await.unwrap(), 0);
        assert_eq!(repo.count_entries(1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_entries_filters_by_period() {
        let repo = setup_test_repo().await;
        repo.post(&entry(1), &[line(1, 10.0, 0.0), line(2, 0.0, 10.0)])
            .await
            .unwrap();
        repo.post(&entry(1), &[line(1, 20.0, 0.0), line(2, 0.0, 20.0)])
            .await
            .unwrap();

        let in_period = repo
            .list_entries(1, &ListParams::default(), Some(1))
            .await
            .unwrap();
        assert_eq!(in_period.total, 2);

        let other_period = repo
            .list_entries(1, &ListParams::default(), Some(2))
            .await
            .unwrap();
        assert_eq!(other_period.total, 0);
    }

    #[tokio::test]
    async fn test_trial_balance_aggregates_per_account() {
        let repo = setup_test_repo().await;
        repo.post(&entry(1), &[line(1, 100.0, 0.0), line(2, 0.0, 100.0)])
            .await
            .unwrap();
        repo.post(&entry(1), &[line(1, 50.0, 0.0), line(2, 0.0, 50.0)])
            .await
            .unwrap();

        let balances = repo.trial_balance(1, 1).await.unwrap();
        assert_eq!(balances.len(), 2);

        let cash = balances.iter().find(|b| b.code == "1000").unwrap();
        assert_eq!(cash.total_debit, 150.0);
        assert_eq!(cash.total_credit, 0.0);

        let revenue = balances.iter().find(|b| b.code == "4000").unwrap();
        assert_eq!(revenue.total_credit, 150.0);
    }

    #[tokio::test]
    async fn test_account_activity_lists_lines_in_order() {
        let repo = setup_test_repo().await;
        repo.post(&entry(1), &[line(1, 100.0, 0.0), line(2, 0.0, 100.0)])
            .await
            .unwrap();
        repo.post(&entry(1), &[line(1, 0.0, 25.0), line(2, 25.0, 0.0)])
            .await
            .unwrap();

        let activity = repo.account_activity(1, 1, 1).await.unwrap();
        assert_eq!(activity.len(), 2);
        assert_eq!(activity[0].debit, 100.0);
        assert_eq!(activity[1].credit, 25.0);
    }
}
