//! Currency repository
//!
//! Reference data maintained by the `seed-currencies` CLI tool.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::Currency;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Currency repository trait
#[async_trait]
pub trait CurrencyRepository: Send + Sync {
    /// Insert or update a currency by code
    async fn upsert(&self, currency: &Currency) -> Result<()>;

    /// Get a currency by ISO code
    async fn get_by_code(&self, code: &str) -> Result<Option<Currency>>;

    /// List all currencies ordered by code
    async fn list(&self) -> Result<Vec<Currency>>;

    /// Count seeded currencies
    async fn count(&self) -> Result<i64>;
}

/// SQLx-based currency repository implementation
pub struct SqlxCurrencyRepository {
    pool: DynDatabasePool,
}

impl SqlxCurrencyRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CurrencyRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CurrencyRepository for SqlxCurrencyRepository {
    async fn upsert(&self, currency: &Currency) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => upsert_sqlite(self.pool.as_sqlite().unwrap(), currency).await,
            DatabaseDriver::Mysql => upsert_mysql(self.pool.as_mysql().unwrap(), currency).await,
        }
    }

    async fn get_by_code(&self, code: &str) -> Result<Option<Currency>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_by_code_sqlite(self.pool.as_sqlite().unwrap(), code).await,
            DatabaseDriver::Mysql => get_by_code_mysql(self.pool.as_mysql().unwrap(), code).await,
        }
    }

    async fn list(&self) -> Result<Vec<Currency>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_sqlite(self.pool.as_sqlite().unwrap()).await,
            DatabaseDriver::Mysql => list_mysql(self.pool.as_mysql().unwrap()).await,
        }
    }

    async fn count(&self) -> Result<i64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => count_sqlite(self.pool.as_sqlite().unwrap()).await,
            DatabaseDriver::Mysql => count_mysql(self.pool.as_mysql().unwrap()).await,
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn upsert_sqlite(pool: &SqlitePool, currency: &Currency) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO currencies (code, name, symbol, decimal_places) VALUES (?, ?, ?, ?)
        ON CONFLICT(code) DO UPDATE SET name = excluded.name, symbol = excluded.symbol,
            decimal_places = excluded.decimal_places
        "#,
    )
    .bind(&currency.code)
    .bind(&currency.name)
    .bind(&currency.symbol)
    .bind(currency.decimal_places)
    .execute(pool)
    .await
    .context("Failed to upsert currency")?;

    Ok(())
}

async fn get_by_code_sqlite(pool: &SqlitePool, code: &str) -> Result<Option<Currency>> {
    let row = sqlx::query(
        "SELECT code, name, symbol, decimal_places FROM currencies WHERE code = ?",
    )
    .bind(code)
    .fetch_optional(pool)
    .await
    .context("Failed to get currency")?;

    Ok(row.map(|row| row_to_currency_sqlite(&row)))
}

async fn list_sqlite(pool: &SqlitePool) -> Result<Vec<Currency>> {
    let rows = sqlx::query("SELECT code, name, symbol, decimal_places FROM currencies ORDER BY code")
        .fetch_all(pool)
        .await
        .context("Failed to list currencies")?;

    Ok(rows.iter().map(row_to_currency_sqlite).collect())
}

async fn count_sqlite(pool: &SqlitePool) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) as count FROM currencies")
        .fetch_one(pool)
        .await
        .context("Failed to count currencies")?;

    Ok(row.get("count"))
}

fn row_to_currency_sqlite(row: &sqlx::sqlite::SqliteRow) -> Currency {
    Currency {
        code: row.get("code"),
        name: row.get("name"),
        symbol: row.get("symbol"),
        decimal_places: row.get("decimal_places"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn upsert_mysql(pool: &MySqlPool, currency: &Currency) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO currencies (code, name, symbol, decimal_places) VALUES (?, ?, ?, ?)
        ON DUPLICATE KEY UPDATE name = VALUES(name), symbol = VALUES(symbol),
            decimal_places = VALUES(decimal_places)
        "#,
    )
    .bind(&currency.code)
    .bind(&currency.name)
    .bind(&currency.symbol)
    .bind(currency.decimal_places)
    .execute(pool)
    .await
    .context("Failed to upsert currency")?;

    Ok(())
}

async fn get_by_code_mysql(pool: &MySqlPool, code: &str) -> Result<Option<Currency>> {
    let row = sqlx::query(
        "SELECT code, name, symbol, decimal_places FROM currencies WHERE code = ?",
    )
    .bind(code)
    .fetch_optional(pool)
    .await
    .context("Failed to get currency")?;

    Ok(row.map(|row| row_to_currency_mysql(&row)))
}

async fn list_mysql(pool: &MySqlPool) -> Result<Vec<Currency>> {
    let rows = sqlx::query("SELECT code, name, symbol, decimal_places FROM currencies ORDER BY code")
        .fetch_all(pool)
        .await
        .context("Failed to list currencies")?;

    Ok(rows.iter().map(row_to_currency_mysql).collect())
}

async fn count_mysql(pool: &MySqlPool) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) as count FROM currencies")
        .fetch_one(pool)
        .await
        .context("Failed to count currencies")?;

    Ok(row.get("count"))
}

fn row_to_currency_mysql(row: &sqlx::mysql::MySqlRow) -> Currency {
    Currency {
        code: row.get("code"),
        name: row.get("name"),
        symbol: row.get("symbol"),
        decimal_places: row.get("decimal_places"),
    }
}
