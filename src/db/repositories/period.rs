//! Accounting period repository
//!
//! Database operations for accounting periods, including the lock flag that
//! gates journal postings.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::AccountingPeriod;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Accounting period repository trait
#[async_trait]
pub trait PeriodRepository: Send + Sync {
    /// Create a new period
    async fn create(&self, period: &AccountingPeriod) -> Result<AccountingPeriod>;

    /// Get a period by ID within an organization
    async fn get_by_id(&self, org_id: i64, id: i64) -> Result<Option<AccountingPeriod>>;

    /// Find the period covering a date
    async fn find_for_date(&self, org_id: i64, date: NaiveDate) -> Result<Option<AccountingPeriod>>;

    /// List all periods, newest first
    async fn list(&self, org_id: i64) -> Result<Vec<AccountingPeriod>>;

    /// Set the lock flag
    async fn set_locked(&self, org_id: i64, id: i64, locked: bool) -> Result<()>;

    /// Check whether any existing period overlaps the given date range
    async fn overlaps(&self, org_id: i64, start: NaiveDate, end: NaiveDate) -> Result<bool>;
}

/// SQLx-based period repository implementation
pub struct SqlxPeriodRepository {
    pool: DynDatabasePool,
}

impl SqlxPeriodRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PeriodRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl PeriodRepository for SqlxPeriodRepository {
    async fn create(&self, period: &AccountingPeriod) -> Result<AccountingPeriod> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_sqlite(self.pool.as_sqlite().unwrap(), period).await,
            DatabaseDriver::Mysql => create_mysql(self.pool.as_mysql().unwrap(), period).await,
        }
    }

    async fn get_by_id(&self, org_id: i64, id: i64) -> Result<Option<AccountingPeriod>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_by_id_sqlite(self.pool.as_sqlite().unwrap(), org_id, id).await
            }
            DatabaseDriver::Mysql => {
                get_by_id_mysql(self.pool.as_mysql().unwrap(), org_id, id).await
            }
        }
    }

    async fn find_for_date(
        &self,
        org_id: i64,
        date: NaiveDate,
    ) -> Result<Option<AccountingPeriod>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                find_for_date_sqlite(self.pool.as_sqlite().unwrap(), org_id, date).await
            }
            DatabaseDriver::Mysql => {
                find_for_date_mysql(self.pool.as_mysql().unwrap(), org_id, date).await
            }
        }
    }

    async fn list(&self, org_id: i64) -> Result<Vec<AccountingPeriod>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_sqlite(self.pool.as_sqlite().unwrap(), org_id).await,
            DatabaseDriver::Mysql => list_mysql(self.pool.as_mysql().unwrap(), org_id).await,
        }
    }

    async fn set_locked(&self, org_id: i64, id: i64, locked: bool) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                set_locked_sqlite(self.pool.as_sqlite().unwrap(), org_id, id, locked).await
            }
            DatabaseDriver::Mysql => {
                set_locked_mysql(self.pool.as_mysql().unwrap(), org_id, id, locked).await
            }
        }
    }

    async fn overlaps(&self, org_id: i64, start: NaiveDate, end: NaiveDate) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                overlaps_sqlite(self.pool.as_sqlite().unwrap(), org_id, start, end).await
            }
            DatabaseDriver::Mysql => {
                overlaps_mysql(self.pool.as_mysql().unwrap(), org_id, start, end).await
            }
        }
    }
}

const PERIOD_COLUMNS: &str = "id, org_id, name, start_date, end_date, locked, created_at";

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_sqlite(pool: &SqlitePool, period: &AccountingPeriod) -> Result<AccountingPeriod> {
    let now = Utc::now();

    let result = sqlx::query(
        "INSERT INTO accounting_periods (org_id, name, start_date, end_date, locked, created_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(period.org_id)
    .bind(&period.name)
    .bind(period.start_date)
    .bind(period.end_date)
    .bind(period.locked)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create accounting period")?;

    let id = result.last_insert_rowid();
    get_by_id_sqlite(pool, period.org_id, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Period not found after insert"))
}

async fn get_by_id_sqlite(
    pool: &SqlitePool,
    org_id: i64,
    id: i64,
) -> Result<Option<AccountingPeriod>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM accounting_periods WHERE org_id = ? AND id = ?",
        PERIOD_COLUMNS
    ))
    .bind(org_id)
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get period by ID")?;

    match row {
        Some(row) => Ok(Some(row_to_period_sqlite(&row)?)),
        None => Ok(None),
    }
}

async fn find_for_date_sqlite(
    pool: &SqlitePool,
    org_id: i64,
    date: NaiveDate,
) -> Result<Option<AccountingPeriod>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM accounting_periods \
         WHERE org_id = ? AND start_date <= ? AND end_date >= ? \
         ORDER BY start_date LIMIT 1",
        PERIOD_COLUMNS
    ))
    .bind(org_id)
    .bind(date)
    .bind(date)
    .fetch_optional(pool)
    .await
    .context("Failed to find period for date")?;

    match row {
        Some(row) => Ok(Some(row_to_period_sqlite(&row)?)),
        None => Ok(None),
    }
}

async fn list_sqlite(pool: &SqlitePool, org_id: i64) -> Result<Vec<AccountingPeriod>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM accounting_periods WHERE org_id = ? ORDER BY start_date DESC",
        PERIOD_COLUMNS
    ))
    .bind(org_id)
    .fetch_all(pool)
    .await
    .context("Failed to list periods")?;

    let mut periods = Vec::new();
    for row in rows {
        periods.push(row_to_period_sqlite(&row)?);
    }

    Ok(periods)
}

async fn set_locked_sqlite(pool: &SqlitePool, org_id: i64, id: i64, locked: bool) -> Result<()> {
    let result =
        sqlx::query("UPDATE accounting_periods SET locked = ? WHERE org_id = ? AND id = ?")
            .bind(locked)
            .bind(org_id)
            .bind(id)
            .execute(pool)
            .await
            .context("Failed to update period lock")?;

    if result.rows_affected() == 0 {
        anyhow::bail!("Period not found");
    }

    Ok(())
}

async fn overlaps_sqlite(
    pool: &SqlitePool,
    org_id: i64,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<bool> {
    let row = sqlx::query(
        "SELECT COUNT(*) as count FROM accounting_periods \
         WHERE org_id = ? AND start_date <= ? AND end_date >= ?",
    )
    .bind(org_id)
    .bind(end)
    .bind(start)
    .fetch_one(pool)
    .await
    .context("Failed to check period overlap")?;

    let count: i64 = row.get("count");
    Ok(count > 0)
}

fn row_to_period_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<AccountingPeriod> {
    Ok(AccountingPeriod {
        id: row.get("id"),
        org_id: row.get("org_id"),
        name: row.get("name"),
        start_date: row.get("start_date"),
        end_date: row.get("end_date"),
        locked: row.get("locked"),
        created_at: row.get("created_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_mysql(pool: &MySqlPool, period: &AccountingPeriod) -> Result<AccountingPeriod> {
    let now = Utc::now();

    let result = sqlx::query(
        "INSERT INTO accounting_periods (org_id, name, start_date, end_date, locked, created_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(period.org_id)
    .bind(&period.name)
    .bind(period.start_date)
    .bind(period.end_date)
    .bind(period.locked)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create accounting period")?;

    let id = result.last_insert_id() as i64;
    get_by_id_mysql(pool, period.org_id, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Period not found after insert"))
}

async fn get_by_id_mysql(
    pool: &MySqlPool,
    org_id: i64,
    id: i64,
) -> Result<Option<AccountingPeriod>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM accounting_periods WHERE org_id = ? AND id = ?",
        PERIOD_COLUMNS
    ))
    .bind(org_id)
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get period by ID")?;

    match row {
        Some(row) => Ok(Some(row_to_period_mysql(&row)?)),
        None => Ok(None),
    }
}

async fn find_for_date_mysql(
    pool: &MySqlPool,
    org_id: i64,
    date: NaiveDate,
) -> Result<Option<AccountingPeriod>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM accounting_periods \
         WHERE org_id = ? AND start_date <= ? AND end_date >= ? \
         ORDER BY start_date LIMIT 1",
        PERIOD_COLUMNS
    ))
    .bind(org_id)
    .bind(date)
    .bind(date)
    .fetch_optional(pool)
    .await
    .context("Failed to find period for date")?;

    match row {
        Some(row) => Ok(Some(row_to_period_mysql(&row)?)),
        None => Ok(None),
    }
}

async fn list_mysql(pool: &MySqlPool, org_id: i64) -> Result<Vec<AccountingPeriod>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM accounting_periods WHERE org_id = ? ORDER BY start_date DESC",
        PERIOD_COLUMNS
    ))
    .bind(org_id)
    .fetch_all(pool)
    .await
    .context("Failed to list periods")?;

    let mut periods = Vec::new();
    for row in rows {
        periods.push(row_to_period_mysql(&row)?);
    }

    Ok(periods)
}

async fn set_locked_mysql(pool: &MySqlPool, org_id: i64, id: i64, locked: bool) -> Result<()> {
    let result =
        sqlx::query("UPDATE accounting_periods SET locked = ? WHERE org_id = ? AND id = ?")
            .bind(locked)
            .bind(org_id)
            .bind(id)
            .execute(pool)
            .await
            .context("Failed to update period lock")?;

    if result.rows_affected() == 0 {
        anyhow::bail!("Period not found");
    }

    Ok(())
}

async fn overlaps_mysql(
    pool: &MySqlPool,
    org_id: i64,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<bool> {
    let row = sqlx::query(
        "SELECT COUNT(*) as count FROM accounting_periods \
         WHERE org_id = ? AND start_date <= ? AND end_date >= ?",
    )
    .bind(org_id)
    .bind(end)
    .bind(start)
    .fetch_one(pool)
    .await
    .context("Failed to check period overlap")?;

    let count: i64 = row.get("count");
    Ok(count > 0)
}

fn row_to_period_mysql(row: &sqlx::mysql::MySqlRow) -> Result<AccountingPeriod> {
    Ok(AccountingPeriod {
        id: row.get("id"),
        org_id: row.get("org_id"),
        name: row.get("name"),
        start_date: row.get("start_date"),
        end_date: row.get("end_date"),
        locked: row.get("locked"),
        created_at: row.get("created_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> SqlxPeriodRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        pool.execute("INSERT INTO organizations (name, slug) VALUES ('Test Org', 'test-org')")
            .await
            .unwrap();
        SqlxPeriodRepository::new(pool)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn march() -> AccountingPeriod {
        AccountingPeriod::new(1, "2026-03".into(), date(2026, 3, 1), date(2026, 3, 31))
    }

    #[tokio::test]
    async fn test_create_and_find_for_date() {
        let repo = setup_test_repo().await;
        let created = repo.create(&march()).await.unwrap();
        assert!(!created.locked);

        let found = repo
            .find_for_date(1, date(2026, 3, 15))
            .await
            .unwrap()
            .expect("period should cover the date");
        assert_eq!(found.id, created.id);

        assert!(repo.find_for_date(1, date(2026, 4, 1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lock_and_unlock() {
        let repo = setup_test_repo().await;
        let created = repo.create(&march()).await.unwrap();

        repo.set_locked(1, created.id, true).await.unwrap();
        let locked = repo.get_by_id(1, created.id).await.unwrap().unwrap();
        assert!(locked.locked);

        repo.set_locked(1, created.id, false).await.unwrap();
        let unlocked = repo.get_by_id(1, created.id).await.unwrap().unwrap();
        assert!(!unlocked.locked);
    }

    #[tokio::test]
    async fn test_set_locked_missing_period_fails() {
        let repo = setup_test_repo().await;
        assert!(repo.set_locked(1, 999, true).await.is_err());
    }

    #[tokio::test]
    async fn test_overlap_detection() {
        let repo = setup_test_repo().await;
        repo.create(&march()).await.unwrap();

        // Overlapping window
        assert!(repo
            .overlaps(1, date(2026, 3, 20), date(2026, 4, 20))
            .await
            .unwrap());
        // Disjoint window
        assert!(!repo
            .overlaps(1, date(2026, 4, 1), date(2026, 4, 30))
            .await
            .unwrap());
    }
}
