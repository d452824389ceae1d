//! Account repository
//!
//! Database operations for the chart of accounts. Account codes are unique
//! within an organization; accounts are deactivated rather than deleted so
//! posted journal lines keep a valid target.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Account, AccountType};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

/// Account repository trait
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Create a new account
    async fn create(&self, account: &Account) -> Result<Account>;

    /// Get an account by ID within an organization
    async fn get_by_id(&self, org_id: i64, id: i64) -> Result<Option<Account>>;

    /// Get an account by its code
    async fn get_by_code(&self, org_id: i64, code: &str) -> Result<Option<Account>>;

    /// List the full chart of accounts, ordered by code
    async fn list(&self, org_id: i64) -> Result<Vec<Account>>;

    /// Update name and active flag
    async fn update(&self, account: &Account) -> Result<Account>;

    /// Check if an account code exists within an organization
    async fn exists_by_code(&self, org_id: i64, code: &str) -> Result<bool>;
}

/// SQLx-based account repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxAccountRepository {
    pool: DynDatabasePool,
}

impl SqlxAccountRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn AccountRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl AccountRepository for SqlxAccountRepository {
    async fn create(&self, account: &Account) -> Result<Account> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_sqlite(self.pool.as_sqlite().unwrap(), account).await,
            DatabaseDriver::Mysql => create_mysql(self.pool.as_mysql().unwrap(), account).await,
        }
    }

    async fn get_by_id(&self, org_id: i64, id: i64) -> Result<Option<Account>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_by_id_sqlite(self.pool.as_sqlite().unwrap(), org_id, id).await
            }
            DatabaseDriver::Mysql => {
                get_by_id_mysql(self.pool.as_mysql().unwrap(), org_id, id).await
            }
        }
    }

    async fn get_by_code(&self, org_id: i64, code: &str) -> Result<Option<Account>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_by_code_sqlite(self.pool.as_sqlite().unwrap(), org_id, code).await
            }
            DatabaseDriver::Mysql => {
                get_by_code_mysql(self.pool.as_mysql().unwrap(), org_id, code).await
            }
        }
    }

    async fn list(&self, org_id: i64) -> Result<Vec<Account>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_sqlite(self.pool.as_sqlite().unwrap(), org_id).await,
            DatabaseDriver::Mysql => list_mysql(self.pool.as_mysql().unwrap(), org_id).await,
        }
    }

    async fn update(&self, account: &Account) -> Result<Account> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_sqlite(self.pool.as_sqlite().unwrap(), account).await,
            DatabaseDriver::Mysql => update_mysql(self.pool.as_mysql().unwrap(), account).await,
        }
    }

    async fn exists_by_code(&self, org_id: i64, code: &str) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                exists_by_code_sqlite(self.pool.as_sqlite().unwrap(), org_id, code).await
            }
            DatabaseDriver::Mysql => {
                exists_by_code_mysql(self.pool.as_mysql().unwrap(), org_id, code).await
            }
        }
    }
}

const ACCOUNT_COLUMNS: &str = "id, org_id, code, name, account_type, active, created_at";

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_sqlite(pool: &SqlitePool, account: &Account) -> Result<Account> {
    let now = Utc::now();

    let result = sqlx::query(
        "INSERT INTO accounts (org_id, code, name, account_type, active, created_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(account.org_id)
    .bind(&account.code)
    .bind(&account.name)
    .bind(account.account_type.to_string())
    .bind(account.active)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create account")?;

    let id = result.last_insert_rowid();
    get_by_id_sqlite(pool, account.org_id, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Account not found after insert"))
}

async fn get_by_id_sqlite(pool: &SqlitePool, org_id: i64, id: i64) -> Result<Option<Account>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM accounts WHERE org_id = ? AND id = ?",
        ACCOUNT_COLUMNS
    ))
    .bind(org_id)
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get account by ID")?;

    match row {
        Some(row) => Ok(Some(row_to_account_sqlite(&row)?)),
        None => Ok(None),
    }
}

async fn get_by_code_sqlite(pool: &SqlitePool, org_id: i64, code: &str) -> Result<Option<Account>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM accounts WHERE org_id = ? AND code = ?",
        ACCOUNT_COLUMNS
    ))
    .bind(org_id)
    .bind(code)
    .fetch_optional(pool)
    .await
    .context("Failed to get account by code")?;

    match row {
        Some(row) => Ok(Some(row_to_account_sqlite(&row)?)),
        None => Ok(None),
    }
}

async fn list_sqlite(pool: &SqlitePool, org_id: i64) -> Result<Vec<Account>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM accounts WHERE org_id = ? ORDER BY code",
        ACCOUNT_COLUMNS
    ))
    .bind(org_id)
    .fetch_all(pool)
    .await
    .context("Failed to list accounts")?;

    let mut accounts = Vec::new();
    for row in rows {
        accounts.push(row_to_account_sqlite(&row)?);
    }

    Ok(accounts)
}

async fn update_sqlite(pool: &SqlitePool, account: &Account) -> Result<Account> {
    sqlx::query("UPDATE accounts SET name = ?, active = ? WHERE org_id = ? AND id = ?")
        .bind(&account.name)
        .bind(account.active)
        .bind(account.org_id)
        .bind(account.id)
        .execute(pool)
        .await
        .context("Failed to update account")?;

    get_by_id_sqlite(pool, account.org_id, account.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Account not found after update"))
}

async fn exists_by_code_sqlite(pool: &SqlitePool, org_id: i64, code: &str) -> Result<bool> {
    let row = sqlx::query("SELECT COUNT(*) as count FROM accounts WHERE org_id = ? AND code = ?")
        .bind(org_id)
        .bind(code)
        .fetch_one(pool)
        .await
        .context("Failed to check account code existence")?;

    let count: i64 = row.get("count");
    Ok(count > 0)
}

fn row_to_account_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Account> {
    let account_type: String = row.get("account_type");

    Ok(Account {
        id: row.get("id"),
        org_id: row.get("org_id"),
        code: row.get("code"),
        name: row.get("name"),
        account_type: AccountType::from_str(&account_type)?,
        active: row.get("active"),
        created_at: row.get("created_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_mysql(pool: &MySqlPool, account: &Account) -> Result<Account> {
    let now = Utc::now();

    let result = sqlx::query(
        "INSERT INTO accounts (org_id, code, name, account_type, active, created_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(account.org_id)
    .bind(&account.code)
    .bind(&account.name)
    .bind(account.account_type.to_string())
    .bind(account.active)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create account")?;

    let id = result.last_insert_id() as i64;
    get_by_id_mysql(pool, account.org_id, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Account not found after insert"))
}

async fn get_by_id_mysql(pool: &MySqlPool, org_id: i64, id: i64) -> Result<Option<Account>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM accounts WHERE org_id = ? AND id = ?",
        ACCOUNT_COLUMNS
    ))
    .bind(org_id)
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get account by ID")?;

    match row {
        Some(row) => Ok(Some(row_to_account_mysql(&row)?)),
        None => Ok(None),
    }
}

async fn get_by_code_mysql(pool: &MySqlPool, org_id: i64, code: &str) -> Result<Option<Account>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM accounts WHERE org_id = ? AND code = ?",
        ACCOUNT_COLUMNS
    ))
    .bind(org_id)
    .bind(code)
    .fetch_optional(pool)
    .await
    .context("Failed to get account by code")?;

    match row {
        Some(row) => Ok(Some(row_to_account_mysql(&row)?)),
        None => Ok(None),
    }
}

async fn list_mysql(pool: &MySqlPool, org_id: i64) -> Result<Vec<Account>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM accounts WHERE org_id = ? ORDER BY code",
        ACCOUNT_COLUMNS
    ))
    .bind(org_id)
    .fetch_all(pool)
    .await
    .context("Failed to list accounts")?;

    let mut accounts = Vec::new();
    for row in rows {
        accounts.push(row_to_account_mysql(&row)?);
    }

    Ok(accounts)
}

async fn update_mysql(pool: &MySqlPool, account: &Account) -> Result<Account> {
    sqlx::query("UPDATE accounts SET name = ?, active = ? WHERE org_id = ? AND id = ?")
        .bind(&account.name)
        .bind(account.active)
        .bind(account.org_id)
        .bind(account.id)
        .execute(pool)
        .await
        .context("Failed to update account")?;

    get_by_id_mysql(pool, account.org_id, account.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Account not found after update"))
}

async fn exists_by_code_mysql(pool: &MySqlPool, org_id: i64, code: &str) -> Result<bool> {
    let row = sqlx::query("SELECT COUNT(*) as count FROM accounts WHERE org_id = ? AND code = ?")
        .bind(org_id)
        .bind(code)
        .fetch_one(pool)
        .await
        .context("Failed to check account code existence")?;

    let count: i64 = row.get("count");
    Ok(count > 0)
}

fn row_to_account_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Account> {
    let account_type: String = row.get("account_type");

    Ok(Account {
        id: row.get("id"),
        org_id: row.get("org_id"),
        code: row.get("code"),
        name: row.get("name"),
        account_type: AccountType::from_str(&account_type)?,
        active: row.get("active"),
        created_at: row.get("created_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> SqlxAccountRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        pool.execute("INSERT INTO organizations (name, slug) VALUES ('Test Org', 'test-org')")
            .await
            .unwrap();
        SqlxAccountRepository::new(pool)
    }

    #[tokio::test]
    async fn test_create_and_get_account() {
        let repo = setup_test_repo().await;
        let account = Account::new(1, "1000".into(), "Cash".into(), AccountType::Asset);
        let created = repo.create(&account).await.unwrap();

        assert!(created.id > 0);
        assert!(created.active);

        let found = repo.get_by_code(1, "1000").await.unwrap().unwrap();
        assert_eq!(found.name, "Cash");
        assert_eq!(found.account_type, AccountType::Asset);
    }

    #[tokio::test]
    async fn test_duplicate_code_rejected() {
        let repo = setup_test_repo().await;
        let account = Account::new(1, "1000".into(), "Cash".into(), AccountType::Asset);
        repo.create(&account).await.unwrap();

        assert!(repo.exists_by_code(1, "1000").await.unwrap());
        let dup = Account::new(1, "1000".into(), "Also cash".into(), AccountType::Asset);
        assert!(repo.create(&dup).await.is_err());
    }

    #[tokio::test]
    async fn test_list_is_ordered_by_code() {
        let repo = setup_test_repo().await;
        repo.create(&Account::new(1, "4000".into(), "Revenue".into(), AccountType::Income))
            .await
            .unwrap();
        repo.create(&Account::new(1, "1000".into(), "Cash".into(), AccountType::Asset))
            .await
            .unwrap();

        let accounts = repo.list(1).await.unwrap();
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].code, "1000");
        assert_eq!(accounts[1].code, "4000");
    }

    #[tokio::test]
    async fn test_deactivate_account() {
        let repo = setup_test_repo().await;
        let mut account = repo
            .create(&Account::new(1, "5000".into(), "Travel".into(), AccountType::Expense))
            .await
            .unwrap();

        account.active = false;
        let updated = repo.update(&account).await.unwrap();
        assert!(!updated.active);
    }
}
