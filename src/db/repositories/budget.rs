//! Budget repository
//!
//! Database operations for budgets. A budget's header and lines are written
//! together in one transaction so a half-created budget is never visible.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Budget, BudgetLine, BudgetLineInput};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// A budget together with its lines
#[derive(Debug, Clone, serde::Serialize)]
pub struct BudgetWithLines {
    pub budget: Budget,
    pub lines: Vec<BudgetLine>,
}

/// Budget repository trait
#[async_trait]
pub trait BudgetRepository: Send + Sync {
    /// Create a budget with its lines atomically
    async fn create(
        &self,
        org_id: i64,
        name: &str,
        period_id: i64,
        lines: &[BudgetLineInput],
    ) -> Result<BudgetWithLines>;

    /// Get a budget with its lines
    async fn get_with_lines(&self, org_id: i64, id: i64) -> Result<Option<BudgetWithLines>>;

    /// List budgets of an organization, optionally filtered by period
    async fn list(&self, org_id: i64, period_id: Option<i64>) -> Result<Vec<Budget>>;

    /// Rename a budget and replace its lines atomically
    async fn replace_lines(
        &self,
        org_id: i64,
        id: i64,
        name: &str,
        lines: &[BudgetLineInput],
    ) -> Result<BudgetWithLines>;

    /// Delete a budget (cascades to lines)
    async fn delete(&self, org_id: i64, id: i64) -> Result<()>;
}

/// SQLx-based budget repository implementation
pub struct SqlxBudgetRepository {
    pool: DynDatabasePool,
}

impl SqlxBudgetRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn BudgetRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl BudgetRepository for SqlxBudgetRepository {
    async fn create(
        &self,
        org_id: i64,
        name: &str,
        period_id: i64,
        lines: &[BudgetLineInput],
    ) -> Result<BudgetWithLines> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_sqlite(self.pool.as_sqlite().unwrap(), org_id, name, period_id, lines).await
            }
            DatabaseDriver::Mysql => {
                create_mysql(self.pool.as_mysql().unwrap(), org_id, name, period_id, lines).await
            }
        }
    }

    async fn get_with_lines(&self, org_id: i64, id: i64) -> Result<Option<BudgetWithLines>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_with_lines_sqlite(self.pool.as_sqlite().unwrap(), org_id, id).await
            }
            DatabaseDriver::Mysql => {
                get_with_lines_mysql(self.pool.as_mysql().unwrap(), org_id, id).await
            }
        }
    }

    async fn list(&self, org_id: i64, period_id: Option<i64>) -> Result<Vec<Budget>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_sqlite(self.pool.as_sqlite().unwrap(), org_id, period_id).await
            }
            DatabaseDriver::Mysql => {
                list_mysql(self.pool.as_mysql().unwrap(), org_id, period_id).await
            }
        }
    }

    async fn replace_lines(
        &self,
        org_id: i64,
        id: i64,
        name: &str,
        lines: &[BudgetLineInput],
    ) -> Result<BudgetWithLines> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                replace_lines_sqlite(self.pool.as_sqlite().unwrap(), org_id, id, name, lines).await
            }
            DatabaseDriver::Mysql => {
                replace_lines_mysql(self.pool.as_mysql().unwrap(), org_id, id, name, lines).await
            }
        }
    }

    async fn delete(&self, org_id: i64, id: i64) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                delete_sqlite(self.pool.as_sqlite().unwrap(), org_id, id).await
            }
            DatabaseDriver::Mysql => delete_mysql(self.pool.as_mysql().unwrap(), org_id, id).await,
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_sqlite(
    pool: &SqlitePool,
    org_id: i64,
    name: &str,
    period_id: i64,
    lines: &[BudgetLineInput],
) -> Result<BudgetWithLines> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let result = sqlx::query(
        "INSERT INTO budgets (org_id, name, period_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(org_id)
    .bind(name)
    .bind(period_id)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await
    .context("Failed to create budget")?;

    let budget_id = result.last_insert_rowid();

    let mut stored = Vec::with_capacity(lines.len());
    for line in lines {
        let line_result = sqlx::query(
            "INSERT INTO budget_lines (budget_id, account_id, amount) VALUES (?, ?, ?)",
        )
        .bind(budget_id)
        .bind(line.account_id)
        .bind(line.amount)
        .execute(&mut *tx)
        .await
        .context("Failed to create budget line")?;

        stored.push(BudgetLine {
            id: line_result.last_insert_rowid(),
            budget_id,
            account_id: line.account_id,
            amount: line.amount,
        });
    }

    tx.commit().await.context("Failed to commit budget")?;

    Ok(BudgetWithLines {
        budget: Budget {
            id: budget_id,
            org_id,
            name: name.to_string(),
            period_id,
            created_at: now,
            updated_at: now,
        },
        lines: stored,
    })
}

async fn get_with_lines_sqlite(
    pool: &SqlitePool,
    org_id: i64,
    id: i64,
) -> Result<Option<BudgetWithLines>> {
    let row = sqlx::query(
        "SELECT id, org_id, name, period_id, created_at, updated_at FROM budgets \
         WHERE org_id = ? AND id = ?",
    )
    .bind(org_id)
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get budget")?;

    let Some(row) = row else {
        return Ok(None);
    };
    let budget = row_to_budget_sqlite(&row);

    let line_rows = sqlx::query(
        "SELECT id, budget_id, account_id, amount FROM budget_lines WHERE budget_id = ? ORDER BY id",
    )
    .bind(id)
    .fetch_all(pool)
    .await
    .context("Failed to get budget lines")?;

    let lines = line_rows
        .iter()
        .map(|row| BudgetLine {
            id: row.get("id"),
            budget_id: row.get("budget_id"),
            account_id: row.get("account_id"),
            amount: row.get("amount"),
        })
        .collect();

    Ok(Some(BudgetWithLines { budget, lines }))
}

async fn list_sqlite(
    pool: &SqlitePool,
    org_id: i64,
    period_id: Option<i64>,
) -> Result<Vec<Budget>> {
    let rows = match period_id {
        Some(period_id) => {
            sqlx::query(
                "SELECT id, org_id, name, period_id, created_at, updated_at FROM budgets \
                 WHERE org_id = ? AND period_id = ? ORDER BY name",
            )
            .bind(org_id)
            .bind(period_id)
            .fetch_all(pool)
            .await
        }
        None => {
            sqlx::query(
                "SELECT id, org_id, name, period_id, created_at, updated_at FROM budgets \
                 WHERE org_id = ? ORDER BY name",
            )
            .bind(org_id)
            .fetch_all(pool)
            .await
        }
    }
    .context("Failed to list budgets")?;

    Ok(rows.iter().map(row_to_budget_sqlite).collect())
}

async fn replace_lines_sqlite(
    pool: &SqlitePool,
    org_id: i64,
    id: i64,
    name: &str,
    lines: &[BudgetLineInput],
) -> Result<BudgetWithLines> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let updated = sqlx::query(
        "UPDATE budgets SET name = ?, updated_at = ? WHERE org_id = ? AND id = ?",
    )
    .bind(name)
    .bind(Utc::now())
    .bind(org_id)
    .bind(id)
    .execute(&mut *tx)
    .await
    .context("Failed to update budget")?;

    if updated.rows_affected() == 0 {
        tx.rollback().await.ok();
        anyhow::bail!("Budget not found");
    }

    sqlx::query("DELETE FROM budget_lines WHERE budget_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to clear budget lines")?;

    for line in lines {
        sqlx::query("INSERT INTO budget_lines (budget_id, account_id, amount) VALUES (?, ?, ?)")
            .bind(id)
            .bind(line.account_id)
            .bind(line.amount)
            .execute(&mut *tx)
            .await
            .context("Failed to insert budget line")?;
    }

    tx.commit().await.context("Failed to commit budget update")?;

    get_with_lines_sqlite(pool, org_id, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Budget not found after update"))
}

async fn delete_sqlite(pool: &SqlitePool, org_id: i64, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM budgets WHERE org_id = ? AND id = ?")
        .bind(org_id)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete budget")?;

    Ok(())
}

fn row_to_budget_sqlite(row: &sqlx::sqlite::SqliteRow) -> Budget {
    Budget {
        id: row.get("id"),
        org_id: row.get("org_id"),
        name: row.get("name"),
        period_id: row.get("period_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_mysql(
    pool: &MySqlPool,
    org_id: i64,
    name: &str,
    period_id: i64,
    lines: &[BudgetLineInput],
) -> Result<BudgetWithLines> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let result = sqlx::query(
        "INSERT INTO budgets (org_id, name, period_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(org_id)
    .bind(name)
    .bind(period_id)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await
    .context("Failed to create budget")?;

    let budget_id = result.last_insert_id() as i64;

    let mut stored = Vec::with_capacity(lines.len());
    for line in lines {
        let line_result = sqlx::query(
            "INSERT INTO budget_lines (budget_id, account_id, amount) VALUES (?, ?, ?)",
        )
        .bind(budget_id)
        .bind(line.account_id)
        .bind(line.amount)
        .execute(&mut *tx)
        .await
        .context("Failed to create budget line")?;

        stored.push(BudgetLine {
            id: line_result.last_insert_id() as i64,
            budget_id,
            account_id: line.account_id,
            amount: line.amount,
        });
    }

    tx.commit().await.context("Failed to commit budget")?;

    Ok(BudgetWithLines {
        budget: Budget {
            id: budget_id,
            org_id,
            name: name.to_string(),
            period_id,
            created_at: now,
            updated_at: now,
        },
        lines: stored,
    })
}

async fn get_with_lines_mysql(
    pool: &MySqlPool,
    org_id: i64,
    id: i64,
) -> Result<Option<BudgetWithLines>> {
    let row = sqlx::query(
        "SELECT id, org_id, name, period_id, created_at, updated_at FROM budgets \
         WHERE org_id = ? AND id = ?",
    )
    .bind(org_id)
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get budget")?;

    let Some(row) = row else {
        return Ok(None);
    };
    let budget = row_to_budget_mysql(&row);

    let line_rows = sqlx::query(
        "SELECT id, budget_id, account_id, amount FROM budget_lines WHERE budget_id = ? ORDER BY id",
    )
    .bind(id)
    .fetch_all(pool)
    .await
    .context("Failed to get budget lines")?;

    let lines = line_rows
        .iter()
        .map(|row| BudgetLine {
            id: row.get("id"),
            budget_id: row.get("budget_id"),
            account_id: row.get("account_id"),
            amount: row.get("amount"),
        })
        .collect();

    Ok(Some(BudgetWithLines { budget, lines }))
}

async fn list_mysql(pool: &MySqlPool, org_id: i64, period_id: Option<i64>) -> Result<Vec<Budget>> {
    let rows = match period_id {
        Some(period_id) => {
            sqlx::query(
                "SELECT id, org_id, name, period_id, created_at, updated_at FROM budgets \
                 WHERE org_id = ? AND period_id = ? ORDER BY name",
            )
            .bind(org_id)
            .bind(period_id)
            .fetch_all(pool)
            .await
        }
        None => {
            sqlx::query(
                "SELECT id, org_id, name, period_id, created_at, updated_at FROM budgets \
                 WHERE org_id = ? ORDER BY name",
            )
            .bind(org_id)
            .fetch_all(pool)
            .await
        }
    }
    .context("Failed to list budgets")?;

    Ok(rows.iter().map(row_to_budget_mysql).collect())
}

async fn replace_lines_mysql(
    pool: &MySqlPool,
    org_id: i64,
    id: i64,
    name: &str,
    lines: &[BudgetLineInput],
) -> Result<BudgetWithLines> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let updated = sqlx::query(
        "UPDATE budgets SET name = ?, updated_at = ? WHERE org_id = ? AND id = ?",
    )
    .bind(name)
    .bind(Utc::now())
    .bind(org_id)
    .bind(id)
    .execute(&mut *tx)
    .await
    .context("Failed to update budget")?;

    if updated.rows_affected() == 0 {
        tx.rollback().await.ok();
        anyhow::bail!("Budget not found");
    }

    sqlx::query("DELETE FROM budget_lines WHERE budget_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to clear budget lines")?;

    for line in lines {
        sqlx::query("INSERT INTO budget_lines (budget_id, account_id, amount) VALUES (?, ?, ?)")
            .bind(id)
            .bind(line.account_id)
            .bind(line.amount)
            .execute(&mut *tx)
            .await
            .context("Failed to insert budget line")?;
    }

    tx.commit().await.context("Failed to commit budget update")?;

    get_with_lines_mysql(pool, org_id, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Budget not found after update"))
}

async fn delete_mysql(pool: &MySqlPool, org_id: i64, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM budgets WHERE org_id = ? AND id = ?")
        .bind(org_id)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete budget")?;

    Ok(())
}

fn row_to_budget_mysql(row: &sqlx::mysql::MySqlRow) -> Budget {
    Budget {
        id: row.get("id"),
        org_id: row.get("org_id"),
        name: row.get("name"),
        period_id: row.get("period_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> SqlxBudgetRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        pool.execute("INSERT INTO organizations (name, slug) VALUES ('Test Org', 'test-org')")
            .await
            .unwrap();
        pool.execute(
            "INSERT INTO accounts (org_id, code, name, account_type) VALUES (1, '5000', 'Travel', 'expense')",
        )
        .await
        .unwrap();
        pool.execute(
            "INSERT INTO accounts (org_id, code, name, account_type) VALUES (1, '5100', 'Office', 'expense')",
        )
        .await
        .unwrap();
        pool.execute(
            "INSERT INTO accounting_periods (org_id, name, start_date, end_date, locked) \
             VALUES (1, '2026-03', '2026-03-01', '2026-03-31', 0)",
        )
        .await
        .unwrap();
        SqlxBudgetRepository::new(pool)
    }

    fn line(account_id: i64, amount: f64) -> BudgetLineInput {
        BudgetLineInput { account_id, amount }
    }

    #[tokio::test]
    async fn test_create_budget_with_lines() {
        let repo = setup_test_repo().await;
        let created = repo
            .create(1, "Q1 spend", 1, &[line(1, 5000.0), line(2, 1200.0)])
            .await
            .expect("Failed to create budget");

        assert!(created.budget.id > 0);
        assert_eq!(created.lines.len(), 2);

        let reloaded = repo
            .get_with_lines(1, created.budget.id)
            .await
            .unwrap()
            .expect("Budget should exist");
        assert_eq!(reloaded.budget.name, "Q1 spend");
        assert_eq!(reloaded.lines.len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_account_line_rejected_and_rolled_back() {
        let repo = setup_test_repo().await;
        // Two lines for the same account violate the unique constraint;
        // neither the header nor the first line survive.
        let result = repo
            .create(1, "Broken", 1, &[line(1, 100.0), line(1, 200.0)])
            .await;
        assert!(result.is_err());

        let budgets = repo.list(1, None).await.unwrap();
        assert!(budgets.is_empty());
    }

    #[tokio::test]
    async fn test_replace_lines() {
        let repo = setup_test_repo().await;
        let created = repo
            .create(1, "Original", 1, &[line(1, 100.0)])
            .await
            .unwrap();

        let updated = repo
            .replace_lines(1, created.budget.id, "Renamed", &[line(2, 900.0)])
            .await
            .expect("Failed to replace lines");

        assert_eq!(updated.budget.name, "Renamed");
        assert_eq!(updated.lines.len(), 1);
        assert_eq!(updated.lines[0].account_id, 2);
        assert_eq!(updated.lines[0].amount, 900.0);
    }

    #[tokio::test]
    async fn test_delete_budget_cascades() {
        let repo = setup_test_repo().await;
        let created = repo.create(1, "Gone", 1, &[line(1, 10.0)]).await.unwrap();

        repo.delete(1, created.budget.id).await.unwrap();
        assert!(repo
            .get_with_lines(1, created.budget.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_list_by_period() {
        let repo = setup_test_repo().await;
        repo.create(1, "March", 1, &[line(1, 10.0)]).await.unwrap();

        assert_eq!(repo.list(1, Some(1)).await.unwrap().len(), 1);
        assert_eq!(repo.list(1, Some(999)).await.unwrap().len(), 0);
    }
}
