//! Budget service
//!
//! Business logic for budgets and the variance report. Budgets pin planned
//! amounts to accounts for one accounting period; the variance report
//! compares them against actual journal activity and projects a
//! straight-line forecast. Budgets never block postings.

use crate::cache::{Cache, CacheLayer};
use crate::db::repositories::budget::BudgetWithLines;
use crate::db::repositories::{
    AccountRepository, BudgetRepository, JournalRepository, PeriodRepository,
};
use crate::models::{AccountingPeriod, Budget, BudgetLineInput, CreateBudgetInput};
use anyhow::Context;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Cache TTL for variance reports (5 minutes; postings invalidate earlier)
const VARIANCE_CACHE_TTL_SECS: u64 = 300;

/// Cache key prefix, shared with the ledger's posting invalidation
const CACHE_KEY_VARIANCE: &str = "variance:";

/// Error types for budget service operations
#[derive(Debug, thiserror::Error)]
pub enum BudgetServiceError {
    /// Budget not found
    #[error("Budget not found: {0}")]
    NotFound(i64),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// One account's variance line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VarianceLine {
    pub account_id: i64,
    pub code: String,
    pub name: String,
    /// Planned amount
    pub budgeted: f64,
    /// Actual activity in the budget's period, signed by the account's
    /// normal balance side
    pub actual: f64,
    /// budgeted - actual; negative means the budget is exceeded
    pub variance: f64,
    /// Straight-line projection of the actual to the full period
    pub forecast: f64,
    /// Whether actuals already exceed the budgeted amount
    pub exceeded: bool,
}

/// Variance report for one budget
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VarianceReport {
    pub budget_id: i64,
    pub budget_name: String,
    pub period_id: i64,
    pub as_of: NaiveDate,
    pub lines: Vec<VarianceLine>,
    pub total_budgeted: f64,
    pub total_actual: f64,
    pub total_variance: f64,
}

/// Budget service
pub struct BudgetService {
    budgets: Arc<dyn BudgetRepository>,
    periods: Arc<dyn PeriodRepository>,
    accounts: Arc<dyn AccountRepository>,
    journal: Arc<dyn JournalRepository>,
    cache: Arc<Cache>,
}

impl BudgetService {
    pub fn new(
        budgets: Arc<dyn BudgetRepository>,
        periods: Arc<dyn PeriodRepository>,
        accounts: Arc<dyn AccountRepository>,
        journal: Arc<dyn JournalRepository>,
        cache: Arc<Cache>,
    ) -> Self {
        Self {
            budgets,
            periods,
            accounts,
            journal,
            cache,
        }
    }

    /// Create a budget with its lines
    pub async fn create(
        &self,
        org_id: i64,
        input: CreateBudgetInput,
    ) -> Result<BudgetWithLines, BudgetServiceError> {
        if input.name.trim().is_empty() {
            return Err(BudgetServiceError::ValidationError(
                "Budget name must not be empty".into(),
            ));
        }
        self.ensure_period(org_id, input.period_id).await?;
        self.validate_lines(org_id, &input.lines).await?;

        let created = self
            .budgets
            .create(org_id, input.name.trim(), input.period_id, &input.lines)
            .await
            .context("Failed to create budget")?;

        Ok(created)
    }

    /// Get a budget with its lines
    pub async fn get(&self, org_id: i64, id: i64) -> Result<BudgetWithLines, BudgetServiceError> {
        self.budgets
            .get_with_lines(org_id, id)
            .await
            .context("Failed to load budget")?
            .ok_or(BudgetServiceError::NotFound(id))
    }

    /// List budgets, optionally filtered by period
    pub async fn list(
        &self,
        org_id: i64,
        period_id: Option<i64>,
    ) -> Result<Vec<Budget>, BudgetServiceError> {
        Ok(self
            .budgets
            .list(org_id, period_id)
            .await
            .context("Failed to list budgets")?)
    }

    /// Rename a budget and replace its lines
    pub async fn update(
        &self,
        org_id: i64,
        id: i64,
        name: &str,
        lines: Vec<BudgetLineInput>,
    ) -> Result<BudgetWithLines, BudgetServiceError> {
        if name.trim().is_empty() {
            return Err(BudgetServiceError::ValidationError(
                "Budget name must not be empty".into(),
            ));
        }
        self.get(org_id, id).await?;
        self.validate_lines(org_id, &lines).await?;

        let updated = self
            .budgets
            .replace_lines(org_id, id, name.trim(), &lines)
            .await
            .context("Failed to update budget")?;

        self.invalidate_variance_cache(org_id, id).await;
        Ok(updated)
    }

    /// Delete a budget
    pub async fn delete(&self, org_id: i64, id: i64) -> Result<(), BudgetServiceError> {
        self.get(org_id, id).await?;
        self.budgets
            .delete(org_id, id)
            .await
            .context("Failed to delete budget")?;
        self.invalidate_variance_cache(org_id, id).await;
        Ok(())
    }

    /// Variance report: budgeted vs actual vs straight-line forecast.
    ///
    /// `as_of` defaults to today and drives the forecast's elapsed-time
    /// fraction. Reports are cached until the next posting or budget edit.
    pub async fn variance_report(
        &self,
        org_id: i64,
        budget_id: i64,
        as_of: Option<NaiveDate>,
    ) -> Result<VarianceReport, BudgetServiceError> {
        let as_of = as_of.unwrap_or_else(|| chrono::Utc::now().date_naive());

        let cache_key = format!("{}{}:{}:{}", CACHE_KEY_VARIANCE, org_id, budget_id, as_of);
        if let Ok(Some(cached)) = self.cache.get::<VarianceReport>(&cache_key).await {
            return Ok(cached);
        }

        let budget = self.get(org_id, budget_id).await?;
        let period = self.ensure_period(org_id, budget.budget.period_id).await?;

        let balances = self
            .journal
            .trial_balance(org_id, period.id)
            .await
            .context("Failed to load period activity")?;
        let activity: HashMap<i64, f64> = balances
            .iter()
            .map(|row| {
                let actual = if row.account_type.is_debit_normal() {
                    row.total_debit - row.total_credit
                } else {
                    row.total_credit - row.total_debit
                };
                (row.account_id, actual)
            })
            .collect();

        let accounts = self
            .accounts
            .list(org_id)
            .await
            .context("Failed to load accounts")?;
        let account_info: HashMap<i64, (&str, &str)> = accounts
            .iter()
            .map(|a| (a.id, (a.code.as_str(), a.name.as_str())))
            .collect();

        let elapsed = elapsed_fraction(&period, as_of);

        let mut lines = Vec::with_capacity(budget.lines.len());
        let mut total_budgeted = 0.0;
        let mut total_actual = 0.0;
        for line in &budget.lines {
            let actual = activity.get(&line.account_id).copied().unwrap_or(0.0);
            let (code, name) = account_info
                .get(&line.account_id)
                .copied()
                .unwrap_or(("?", "unknown account"));
            let forecast = if elapsed > 0.0 {
                actual / elapsed
            } else {
                actual
            };

            total_budgeted += line.amount;
            total_actual += actual;
            lines.push(VarianceLine {
                account_id: line.account_id,
                code: code.to_string(),
                name: name.to_string(),
                budgeted: line.amount,
                actual,
                variance: line.amount - actual,
                forecast,
                exceeded: actual > line.amount,
            });
        }

        let report = VarianceReport {
            budget_id,
            budget_name: budget.budget.name.clone(),
            period_id: period.id,
            as_of,
            total_budgeted,
            total_actual,
            total_variance: total_budgeted - total_actual,
            lines,
        };

        let _ = self
            .cache
            .set(
                &cache_key,
                &report,
                Duration::from_secs(VARIANCE_CACHE_TTL_SECS),
            )
            .await;

        Ok(report)
    }

    /// Count budgets (dashboard)
    pub async fn count(&self, org_id: i64) -> Result<i64, BudgetServiceError> {
        Ok(self.list(org_id, None).await?.len() as i64)
    }

    async fn ensure_period(
        &self,
        org_id: i64,
        period_id: i64,
    ) -> Result<AccountingPeriod, BudgetServiceError> {
        self.periods
            .get_by_id(org_id, period_id)
            .await
            .context("Failed to check period")?
            .ok_or_else(|| {
                BudgetServiceError::ValidationError(format!(
                    "Accounting period {} does not exist",
                    period_id
                ))
            })
    }

    async fn validate_lines(
        &self,
        org_id: i64,
        lines: &[BudgetLineInput],
    ) -> Result<(), BudgetServiceError> {
        if lines.is_empty() {
            return Err(BudgetServiceError::ValidationError(
                "A budget needs at least one line".into(),
            ));
        }

        let accounts = self
            .accounts
            .list(org_id)
            .await
            .context("Failed to load accounts")?;
        let known: std::collections::HashSet<i64> = accounts.iter().map(|a| a.id).collect();

        let mut seen = std::collections::HashSet::new();
        for line in lines {
            if !line.amount.is_finite() || line.amount < 0.0 {
                return Err(BudgetServiceError::ValidationError(
                    "Budget amounts must be non-negative numbers".into(),
                ));
            }
            if !known.contains(&line.account_id) {
                return Err(BudgetServiceError::ValidationError(format!(
                    "Account {} does not exist",
                    line.account_id
                )));
            }
            if !seen.insert(line.account_id) {
                return Err(BudgetServiceError::ValidationError(format!(
                    "Account {} appears twice in the budget",
                    line.account_id
                )));
            }
        }

        Ok(())
    }

    async fn invalidate_variance_cache(&self, org_id: i64, budget_id: i64) {
        let _ = self
            .cache
            .delete_pattern(&format!("{}{}:{}:*", CACHE_KEY_VARIANCE, org_id, budget_id))
            .await;
    }
}

/// Fraction of the period elapsed as of the given date, clamped to [0, 1].
/// Both period bounds are inclusive.
fn elapsed_fraction(period: &AccountingPeriod, as_of: NaiveDate) -> f64 {
    if as_of < period.start_date {
        return 0.0;
    }
    if as_of >= period.end_date {
        return 1.0;
    }

    let total_days = (period.end_date - period.start_date).num_days() + 1;
    let elapsed_days = (as_of - period.start_date).num_days() + 1;
    elapsed_days as f64 / total_days as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::db::repositories::{
        JournalRepository, SqlxAccountRepository, SqlxBudgetRepository, SqlxJournalRepository,
        SqlxPeriodRepository,
    };
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use crate::models::{JournalEntry, JournalLineInput};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn setup() -> (DynDatabasePool, BudgetService) {
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
            "INSERT INTO accounts (org_id, code, name, account_type) VALUES (1, '5000', 'Travel', 'expense')",
        )
        .await
        .unwrap();
        pool.execute(
            "INSERT INTO accounts (org_id, code, name, account_type) VALUES (1, '1000', 'Cash', 'asset')",
        )
        .await
        .unwrap();
        pool.execute(
            "INSERT INTO accounting_periods (org_id, name, start_date, end_date, locked) \
             VALUES (1, '2026-03', '2026-03-01', '2026-03-31', 0)",
        )
        .await
        .unwrap();

        let cache = Arc::new(Cache::Memory(MemoryCache::new()));
        let service = BudgetService::new(
            SqlxBudgetRepository::boxed(pool.clone()),
            SqlxPeriodRepository::boxed(pool.clone()),
            SqlxAccountRepository::boxed(pool.clone()),
            SqlxJournalRepository::boxed(pool.clone()),
            cache,
        );
        (pool, service)
    }

    /// Post a balanced travel expense: debit Travel (id 1), credit Cash (id 2)
    async fn post_expense(pool: &DynDatabasePool, amount: f64) {
        let repo = SqlxJournalRepository::new(pool.clone());
        let entry = JournalEntry {
            id: 0,
            org_id: 1,
            period_id: 1,
            entry_date: date(2026, 3, 10),
            memo: None,
            reference: None,
            posted_by: 1,
            created_at: chrono::Utc::now(),
        };
        repo.post(
            &entry,
            &[
                JournalLineInput {
                    account_id: 1,
                    debit: amount,
                    credit: 0.0,
                },
                JournalLineInput {
                    account_id: 2,
                    debit: 0.0,
                    credit: amount,
                },
            ],
        )
        .await
        .unwrap();
    }

    fn budget_input(amount: f64) -> CreateBudgetInput {
        CreateBudgetInput {
            name: "March travel".into(),
            period_id: 1,
            lines: vec![BudgetLineInput {
                account_id: 1,
                amount,
            }],
        }
    }

    #[tokio::test]
    async fn test_create_and_get_budget() {
        let (_pool, service) = setup().await;
        let created = service.create(1, budget_input(1000.0)).await.unwrap();

        let loaded = service.get(1, created.budget.id).await.unwrap();
        assert_eq!(loaded.budget.name, "March travel");
        assert_eq!(loaded.lines.len(), 1);
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_period() {
        let (_pool, service) = setup().await;
        let mut input = budget_input(1000.0);
        input.period_id = 99;
        let result = service.create(1, input).await;
        assert!(matches!(
            result,
            Err(BudgetServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_account_lines() {
        let (_pool, service) = setup().await;
        let mut input = budget_input(1000.0);
        input.lines.push(BudgetLineInput {
            account_id: 1,
            amount: 50.0,
        });
        let result = service.create(1, input).await;
        assert!(matches!(
            result,
            Err(BudgetServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_variance_with_no_activity() {
        let (_pool, service) = setup().await;
        let created = service.create(1, budget_input(1000.0)).await.unwrap();

        let report = service
            .variance_report(1, created.budget.id, Some(date(2026, 3, 31)))
            .await
            .unwrap();

        assert_eq!(report.lines.len(), 1);
        assert_eq!(report.lines[0].actual, 0.0);
        assert_eq!(report.lines[0].variance, 1000.0);
        assert!(!report.lines[0].exceeded);
    }

    #[tokio::test]
    async fn test_variance_reflects_actuals() {
        let (pool, service) = setup().await;
        let created = service.create(1, budget_input(1000.0)).await.unwrap();
        post_expense(&pool, 400.0).await;

        let report = service
            .variance_report(1, created.budget.id, Some(date(2026, 3, 31)))
            .await
            .unwrap();

        let line = &report.lines[0];
        assert_eq!(line.budgeted, 1000.0);
        assert_eq!(line.actual, 400.0);
        assert_eq!(line.variance, 600.0);
        // Period fully elapsed: forecast equals actual
        assert_eq!(line.forecast, 400.0);
        assert_eq!(report.total_actual, 400.0);
    }

    #[tokio::test]
    async fn test_variance_flags_exceeded_budget() {
        let (pool, service) = setup().await;
        let created = service.create(1, budget_input(300.0)).await.unwrap();
        post_expense(&pool, 400.0).await;

        let report = service
            .variance_report(1, created.budget.id, Some(date(2026, 3, 31)))
            .await
            .unwrap();

        assert!(report.lines[0].exceeded);
        assert!(report.lines[0].variance < 0.0);
    }

    #[tokio::test]
    async fn test_forecast_projects_partial_period() {
        let (pool, service) = setup().await;
        let created = service.create(1, budget_input(1000.0)).await.unwrap();
        post_expense(&pool, 400.0).await;

        // As of March 10th, ten of thirty-one days have elapsed
        let report = service
            .variance_report(1, created.budget.id, Some(date(2026, 3, 10)))
            .await
            .unwrap();

        let expected = 400.0 / (10.0 / 31.0);
        assert!((report.lines[0].forecast - expected).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_update_replaces_lines_and_invalidates_report() {
        let (_pool, service) = setup().await;
        let created = service.create(1, budget_input(1000.0)).await.unwrap();

        // Warm the cache
        service
            .variance_report(1, created.budget.id, Some(date(2026, 3, 31)))
            .await
            .unwrap();

        service
            .update(
                1,
                created.budget.id,
                "Adjusted",
                vec![BudgetLineInput {
                    account_id: 1,
                    amount: 500.0,
                }],
            )
            .await
            .unwrap();

        let report = service
            .variance_report(1, created.budget.id, Some(date(2026, 3, 31)))
            .await
            .unwrap();
        assert_eq!(report.budget_name, "Adjusted");
        assert_eq!(report.lines[0].budgeted, 500.0);
    }

    #[test]
    fn test_elapsed_fraction_bounds() {
        let period =
            AccountingPeriod::new(1, "2026-03".into(), date(2026, 3, 1), date(2026, 3, 31));

        assert_eq!(elapsed_fraction(&period, date(2026, 2, 28)), 0.0);
        assert_eq!(elapsed_fraction(&period, date(2026, 3, 31)), 1.0);
        assert_eq!(elapsed_fraction(&period, date(2026, 4, 15)), 1.0);

        let mid = elapsed_fraction(&period, date(2026, 3, 10));
        assert!((mid - 10.0 / 31.0).abs() < 1e-9);
    }
}
