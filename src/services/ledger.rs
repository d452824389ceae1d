//! Ledger service
//!
//! Business logic for the finance module: chart of accounts, accounting
//! periods, and the journal posting workflow.
//!
//! Posting a journal entry enforces, in order:
//! 1. line shape validation (at least two lines, non-negative finite
//!    amounts, one side per line, postable accounts)
//! 2. the accounting identity: total debits must equal total credits
//!    within [`BALANCE_TOLERANCE`](crate::models::journal::BALANCE_TOLERANCE)
//! 3. the locked-period rule: a locked period rejects postings regardless
//!    of balance
//! 4. atomic persistence through the repository's database transaction,
//!    wrapped in the bounded retry policy for transient lock conflicts
//!
//! The period lock is checked here for a fast client error and re-checked
//! inside the posting transaction, which is the authoritative check.

use crate::cache::{Cache, CacheLayer};
use crate::db::repositories::journal::{ActivityRow, PostError, TrialBalanceRow};
use crate::db::repositories::{AccountRepository, JournalRepository, PeriodRepository};
use crate::db::{is_transient_error, with_retry, RetryError, RetryPolicy};
use crate::models::journal::BALANCE_TOLERANCE;
use crate::models::{
    Account, AccountingPeriod, CreateAccountInput, CreatePeriodInput, EntryWithLines,
    JournalEntry, JournalEntryInput, ListParams, PagedResult, UpdateAccountInput,
};
use anyhow::Context;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Cache TTL for the chart of accounts (1 hour)
const ACCOUNTS_CACHE_TTL_SECS: u64 = 3600;

/// Cache TTL for trial balances (5 minutes; invalidated on every posting)
const TRIAL_BALANCE_CACHE_TTL_SECS: u64 = 300;

/// Cache key prefixes
const CACHE_KEY_ACCOUNTS: &str = "accounts:";
const CACHE_KEY_TRIAL_BALANCE: &str = "tb:";

/// Error types for ledger operations
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Debits and credits differ by more than the tolerance
    #[error("entry is not balanced (debits {debits:.2}, credits {credits:.2})")]
    NotBalanced { debits: f64, credits: f64 },

    /// The target accounting period is locked
    #[error("period is locked")]
    PeriodLocked,

    /// No accounting period covers the entry date
    #[error("no accounting period covers {0}")]
    NoPeriodForDate(chrono::NaiveDate),

    /// The named period does not exist
    #[error("Accounting period not found: {0}")]
    PeriodNotFound(i64),

    /// Account missing, inactive, or from another organization
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Requested record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Duplicate account code
    #[error("Account code already exists: {0}")]
    DuplicateCode(String),

    /// The posting transaction kept hitting transient conflicts
    #[error("posting failed after {attempts} attempts")]
    Contention { attempts: u32 },

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Ledger service
pub struct LedgerService {
    accounts: Arc<dyn AccountRepository>,
    periods: Arc<dyn PeriodRepository>,
    journal: Arc<dyn JournalRepository>,
    cache: Arc<Cache>,
    retry: RetryPolicy,
}

impl LedgerService {
    pub fn new(
        accounts: Arc<dyn AccountRepository>,
        periods: Arc<dyn PeriodRepository>,
        journal: Arc<dyn JournalRepository>,
        cache: Arc<Cache>,
    ) -> Self {
        Self {
            accounts,
            periods,
            journal,
            cache,
            retry: RetryPolicy::default(),
        }
    }

    /// Override the posting retry policy (used by tests)
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    // ========================================================================
    // Chart of accounts
    // ========================================================================

    /// Create an account
    pub async fn create_account(
        &self,
        org_id: i64,
        input: CreateAccountInput,
    ) -> Result<Account, LedgerError> {
        let code = input.code.trim().to_string();
        if code.is_empty() || code.len() > 20 {
            return Err(LedgerError::ValidationError(
                "Account code must be 1-20 characters".into(),
            ));
        }
        if input.name.trim().is_empty() {
            return Err(LedgerError::ValidationError(
                "Account name must not be empty".into(),
            ));
        }

        if self
            .accounts
            .exists_by_code(org_id, &code)
            .await
            .context("Failed to check account code")?
        {
            return Err(LedgerError::DuplicateCode(code));
        }

        let account = self
            .accounts
            .create(&Account::new(
                org_id,
                code,
                input.name.trim().to_string(),
                input.account_type,
            ))
            .await
            .context("Failed to create account")?;

        self.invalidate_accounts_cache(org_id).await;
        Ok(account)
    }

    /// List the chart of accounts (cached)
    pub async fn list_accounts(&self, org_id: i64) -> Result<Vec<Account>, LedgerError> {
        let cache_key = format!("{}{}", CACHE_KEY_ACCOUNTS, org_id);

        if let Ok(Some(cached)) = self.cache.get::<Vec<Account>>(&cache_key).await {
            return Ok(cached);
        }

        let accounts = self
            .accounts
            .list(org_id)
            .await
            .context("Failed to list accounts")?;

        let _ = self
            .cache
            .set(
                &cache_key,
                &accounts,
                Duration::from_secs(ACCOUNTS_CACHE_TTL_SECS),
            )
            .await;

        Ok(accounts)
    }

    /// Update an account's name or active flag
    pub async fn update_account(
        &self,
        org_id: i64,
        id: i64,
        input: UpdateAccountInput,
    ) -> Result<Account, LedgerError> {
        let mut account = self
            .accounts
            .get_by_id(org_id, id)
            .await
            .context("Failed to load account")?
            .ok_or_else(|| LedgerError::NotFound(format!("account {}", id)))?;

        if let Some(name) = input.name {
            if name.trim().is_empty() {
                return Err(LedgerError::ValidationError(
                    "Account name must not be empty".into(),
                ));
            }
            account.name = name.trim().to_string();
        }
        if let Some(active) = input.active {
            account.active = active;
        }

        let account = self
            .accounts
            .update(&account)
            .await
            .context("Failed to update account")?;

        self.invalidate_accounts_cache(org_id).await;
        Ok(account)
    }

    // ========================================================================
    // Accounting periods
    // ========================================================================

    /// Create an accounting period
    pub async fn create_period(
        &self,
        org_id: i64,
        input: CreatePeriodInput,
    ) -> Result<AccountingPeriod, LedgerError> {
        if input.name.trim().is_empty() {
            return Err(LedgerError::ValidationError(
                "Period name must not be empty".into(),
            ));
        }
        if input.end_date < input.start_date {
            return Err(LedgerError::ValidationError(
                "Period end date must not be before its start date".into(),
            ));
        }
        if self
            .periods
            .overlaps(org_id, input.start_date, input.end_date)
            .await
            .context("Failed to check period overlap")?
        {
            return Err(LedgerError::ValidationError(
                "Period overlaps an existing period".into(),
            ));
        }

        Ok(self
            .periods
            .create(&AccountingPeriod::new(
                org_id,
                input.name.trim().to_string(),
                input.start_date,
                input.end_date,
            ))
            .await
            .context("Failed to create period")?)
    }

    /// List periods, newest first
    pub async fn list_periods(&self, org_id: i64) -> Result<Vec<AccountingPeriod>, LedgerError> {
        Ok(self
            .periods
            .list(org_id)
            .await
            .context("Failed to list periods")?)
    }

    /// Get one period
    pub async fn get_period(
        &self,
        org_id: i64,
        id: i64,
    ) -> Result<AccountingPeriod, LedgerError> {
        self.periods
            .get_by_id(org_id, id)
            .await
            .context("Failed to load period")?
            .ok_or(LedgerError::PeriodNotFound(id))
    }

    /// Lock or unlock a period
    pub async fn set_period_locked(
        &self,
        org_id: i64,
        id: i64,
        locked: bool,
    ) -> Result<AccountingPeriod, LedgerError> {
        self.get_period(org_id, id).await?;
        self.periods
            .set_locked(org_id, id, locked)
            .await
            .context("Failed to update period lock")?;
        self.get_period(org_id, id).await
    }

    // ========================================================================
    // Journal posting
    // ========================================================================

    /// Post a journal entry.
    ///
    /// Rejections (unbalanced entry, locked period, bad lines) happen before
    /// any persistence. On success the header and all lines are stored as a
    /// single atomic unit; transient commit conflicts are retried under the
    /// service's retry policy, everything else fails on the first attempt.
    pub async fn post_entry(
        &self,
        org_id: i64,
        user_id: i64,
        input: JournalEntryInput,
    ) -> Result<EntryWithLines, LedgerError> {
        validate_lines(&input)?;
        self.validate_accounts(org_id, &input).await?;

        // Fast-path period check; the posting transaction re-checks
        let period = match input.period_id {
            Some(period_id) => self.get_period(org_id, period_id).await?,
            None => self
                .periods
                .find_for_date(org_id, input.entry_date)
                .await
                .context("Failed to resolve period")?
                .ok_or(LedgerError::NoPeriodForDate(input.entry_date))?,
        };
        if period.locked {
            return Err(LedgerError::PeriodLocked);
        }

        let entry = JournalEntry {
            id: 0,
            org_id,
            period_id: period.id,
            entry_date: input.entry_date,
            memo: input.memo.clone(),
            reference: input.reference.clone(),
            posted_by: user_id,
            created_at: Utc::now(),
        };

        let posted = with_retry(
            self.retry,
            |err: &PostError| matches!(err, PostError::Database(db) if is_transient_error(db)),
            || self.journal.post(&entry, &input.lines),
        )
        .await
        .map_err(|err| match err {
            RetryError::Exhausted {
                attempts,
                last_error,
            } => {
                tracing::error!(attempts, error = %last_error, "journal posting exhausted retries");
                LedgerError::Contention { attempts }
            }
            RetryError::Aborted(PostError::PeriodLocked) => LedgerError::PeriodLocked,
            RetryError::Aborted(PostError::PeriodMissing) => {
                LedgerError::PeriodNotFound(period.id)
            }
            RetryError::Aborted(PostError::Database(db)) => {
                LedgerError::InternalError(anyhow::Error::new(db).context("Posting failed"))
            }
        })?;

        self.invalidate_balance_cache(org_id).await;
        Ok(posted)
    }

    /// Get an entry with its lines
    pub async fn get_entry(&self, org_id: i64, id: i64) -> Result<EntryWithLines, LedgerError> {
        self.journal
            .get_entry(org_id, id)
            .await
            .context("Failed to load journal entry")?
            .ok_or_else(|| LedgerError::NotFound(format!("journal entry {}", id)))
    }

    /// List entry headers, optionally filtered by period
    pub async fn list_entries(
        &self,
        org_id: i64,
        params: &ListParams,
        period_id: Option<i64>,
    ) -> Result<PagedResult<JournalEntry>, LedgerError> {
        Ok(self
            .journal
            .list_entries(org_id, params, period_id)
            .await
            .context("Failed to list journal entries")?)
    }

    /// Trial balance for a period (cached until the next posting)
    pub async fn trial_balance(
        &self,
        org_id: i64,
        period_id: i64,
    ) -> Result<Vec<TrialBalanceRow>, LedgerError> {
        self.get_period(org_id, period_id).await?;

        let cache_key = format!("{}{}:{}", CACHE_KEY_TRIAL_BALANCE, org_id, period_id);
        if let Ok(Some(cached)) = self.cache.get::<Vec<TrialBalanceRow>>(&cache_key).await {
            return Ok(cached);
        }

        let balances = self
            .journal
            .trial_balance(org_id, period_id)
            .await
            .context("Failed to compute trial balance")?;

        let _ = self
            .cache
            .set(
                &cache_key,
                &balances,
                Duration::from_secs(TRIAL_BALANCE_CACHE_TTL_SECS),
            )
            .await;

        Ok(balances)
    }

    /// Activity of one account within a period
    pub async fn account_activity(
        &self,
        org_id: i64,
        account_id: i64,
        period_id: i64,
    ) -> Result<Vec<ActivityRow>, LedgerError> {
        self.get_period(org_id, period_id).await?;
        let exists = self
            .accounts
            .get_by_id(org_id, account_id)
            .await
            .context("Failed to check account")?
            .is_some();
        if !exists {
            return Err(LedgerError::NotFound(format!("account {}", account_id)));
        }

        Ok(self
            .journal
            .account_activity(org_id, account_id, period_id)
            .await
            .context("Failed to load account activity")?)
    }

    /// Count entries (dashboard)
    pub async fn count_entries(&self, org_id: i64) -> Result<i64, LedgerError> {
        Ok(self
            .journal
            .count_entries(org_id)
            .await
            .context("Failed to count journal entries")?)
    }

    async fn validate_accounts(
        &self,
        org_id: i64,
        input: &JournalEntryInput,
    ) -> Result<(), LedgerError> {
        let accounts = self
            .accounts
            .list(org_id)
            .await
            .context("Failed to load accounts")?;
        let by_id: HashMap<i64, &Account> = accounts.iter().map(|a| (a.id, a)).collect();

        for line in &input.lines {
            match by_id.get(&line.account_id) {
                None => {
                    return Err(LedgerError::ValidationError(format!(
                        "Account {} does not exist",
                        line.account_id
                    )));
                }
                Some(account) if !account.active => {
                    return Err(LedgerError::ValidationError(format!(
                        "Account {} is inactive",
                        account.code
                    )));
                }
                Some(_) => {}
            }
        }

        Ok(())
    }

    async fn invalidate_accounts_cache(&self, org_id: i64) {
        let _ = self
            .cache
            .delete(&format!("{}{}", CACHE_KEY_ACCOUNTS, org_id))
            .await;
    }

    async fn invalidate_balance_cache(&self, org_id: i64) {
        let _ = self
            .cache
            .delete_pattern(&format!("{}{}:*", CACHE_KEY_TRIAL_BALANCE, org_id))
            .await;
        let _ = self
            .cache
            .delete_pattern(&format!("variance:{}:*", org_id))
            .await;
    }
}

/// Validate the shape of a proposed entry and its balance.
///
/// Shape first, then the accounting identity, so a malformed entry never
/// reports itself as merely unbalanced.
fn validate_lines(input: &JournalEntryInput) -> Result<(), LedgerError> {
    if input.lines.len() < 2 {
        return Err(LedgerError::ValidationError(
            "A journal entry needs at least two lines".into(),
        ));
    }

    for (i, line) in input.lines.iter().enumerate() {
        if !line.debit.is_finite() || !line.credit.is_finite() {
            return Err(LedgerError::ValidationError(format!(
                "Line {}: amounts must be finite numbers",
                i + 1
            )));
        }
        if line.debit < 0.0 || line.credit < 0.0 {
            return Err(LedgerError::ValidationError(format!(
                "Line {}: amounts must not be negative",
                i + 1
            )));
        }
        if line.debit == 0.0 && line.credit == 0.0 {
            return Err(LedgerError::ValidationError(format!(
                "Line {}: either a debit or a credit is required",
                i + 1
            )));
        }
        if line.debit > 0.0 && line.credit > 0.0 {
            return Err(LedgerError::ValidationError(format!(
                "Line {}: a line cannot carry both a debit and a credit",
                i + 1
            )));
        }
    }

    let debits = input.total_debit();
    let credits = input.total_credit();
    if (debits - credits).abs() > BALANCE_TOLERANCE {
        return Err(LedgerError::NotBalanced { debits, credits });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::db::repositories::{
        JournalRepository, SqlxAccountRepository, SqlxJournalRepository, SqlxPeriodRepository,
    };
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use crate::models::{AccountType, JournalLineInput};
    use chrono::NaiveDate;

    async fn setup() -> (DynDatabasePool, LedgerService) {
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

        let cache = Arc::new(Cache::Memory(MemoryCache::new()));
        let service = LedgerService::new(
            SqlxAccountRepository::boxed(pool.clone()),
            SqlxPeriodRepository::boxed(pool.clone()),
            SqlxJournalRepository::boxed(pool.clone()),
            cache,
        );
        (pool, service)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn seed_finance(service: &LedgerService) -> (Account, Account, AccountingPeriod) {
        let cash = service
            .create_account(
                1,
                CreateAccountInput {
                    code: "1000".into(),
                    name: "Cash".into(),
                    account_type: AccountType::Asset,
                },
            )
            .await
            .unwrap();
        let revenue = service
            .create_account(
                1,
                CreateAccountInput {
                    code: "4000".into(),
                    name: "Revenue".into(),
                    account_type: AccountType::Income,
                },
            )
            .await
            .unwrap();
        let period = service
            .create_period(
                1,
                CreatePeriodInput {
                    name: "2026-03".into(),
                    start_date: date(2026, 3, 1),
                    end_date: date(2026, 3, 31),
                },
            )
            .await
            .unwrap();
        (cash, revenue, period)
    }

    fn entry(lines: Vec<JournalLineInput>) -> JournalEntryInput {
        JournalEntryInput {
            entry_date: date(2026, 3, 10),
            period_id: None,
            memo: Some("test".into()),
            reference: None,
            lines,
        }
    }

    fn line(account_id: i64, debit: f64, credit: f64) -> JournalLineInput {
        JournalLineInput {
            account_id,
            debit,
            credit,
        }
    }

    async fn line_count(pool: &DynDatabasePool) -> i64 {
        let repo = SqlxJournalRepository::new(pool.clone());
        repo.count_lines(1).await.unwrap()
    }

    #[tokio::test]
    async fn test_balanced_entry_is_accepted() {
        let (_pool, service) = setup().await;
        let (cash, revenue, period) = seed_finance(&service).await;

        let posted = service
            .post_entry(
                1,
                1,
                entry(vec![line(cash.id, 100.0, 0.0), line(revenue.id, 0.0, 100.0)]),
            )
            .await
            .expect("Balanced entry should post");

        assert_eq!(posted.entry.period_id, period.id);
        assert_eq!(posted.lines.len(), 2);
    }

    #[tokio::test]
    async fn test_unbalanced_entry_is_rejected_with_nothing_persisted() {
        let (pool, service) = setup().await;
        let (cash, revenue, _period) = seed_finance(&service).await;

        let result = service
            .post_entry(
                1,
                1,
                entry(vec![line(cash.id, 100.0, 0.0), line(revenue.id, 0.0, 99.0)]),
            )
            .await;

        match result {
            Err(LedgerError::NotBalanced { debits, credits }) => {
                assert_eq!(debits, 100.0);
                assert_eq!(credits, 99.0);
            }
            other => panic!("expected NotBalanced, got {:?}", other.map(|_| ())),
        }
        assert_eq!(line_count(&pool).await, 0);
    }

    #[tokio::test]
    async fn test_not_balanced_message() {
        let err = LedgerError::NotBalanced {
            debits: 100.0,
            credits: 99.0,
        };
        assert!(err.to_string().contains("not balanced"));
    }

    #[tokio::test]
    async fn test_balanced_entry_into_locked_period_is_rejected() {
        let (pool, service) = setup().await;
        let (cash, revenue, period) = seed_finance(&service).await;
        service.set_period_locked(1, period.id, true).await.unwrap();

        let result = service
            .post_entry(
                1,
                1,
                entry(vec![line(cash.id, 50.0, 0.0), line(revenue.id, 0.0, 50.0)]),
            )
            .await;

        match result {
            Err(LedgerError::PeriodLocked) => {
                assert!(LedgerError::PeriodLocked.to_string().contains("period is locked"));
            }
            other => panic!("expected PeriodLocked, got {:?}", other.map(|_| ())),
        }
        assert_eq!(line_count(&pool).await, 0);
    }

    #[tokio::test]
    async fn test_unlocked_period_accepts_after_unlock() {
        let (_pool, service) = setup().await;
        let (cash, revenue, period) = seed_finance(&service).await;

        service.set_period_locked(1, period.id, true).await.unwrap();
        service.set_period_locked(1, period.id, false).await.unwrap();

        let result = service
            .post_entry(
                1,
                1,
                entry(vec![line(cash.id, 50.0, 0.0), line(revenue.id, 0.0, 50.0)]),
            )
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_tolerance_boundary() {
        let (_pool, service) = setup().await;
        let (cash, revenue, _period) = seed_finance(&service).await;

        // Inside the tolerance: accepted (absorbs rounding noise)
        let ok = service
            .post_entry(
                1,
                1,
                entry(vec![line(cash.id, 100.005, 0.0), line(revenue.id, 0.0, 100.0)]),
            )
            .await;
        assert!(ok.is_ok());

        // Past it: rejected
        let not_ok = service
            .post_entry(
                1,
                1,
                entry(vec![line(cash.id, 100.02, 0.0), line(revenue.id, 0.0, 100.0)]),
            )
            .await;
        assert!(matches!(not_ok, Err(LedgerError::NotBalanced { .. })));
    }

    #[tokio::test]
    async fn test_entry_without_covering_period_is_rejected() {
        let (_pool, service) = setup().await;
        let (cash, revenue, _period) = seed_finance(&service).await;

        let mut input = entry(vec![line(cash.id, 10.0, 0.0), line(revenue.id, 0.0, 10.0)]);
        input.entry_date = date(2026, 7, 1);

        let result = service.post_entry(1, 1, input).await;
        assert!(matches!(result, Err(LedgerError::NoPeriodForDate(_))));
    }

    #[tokio::test]
    async fn test_unknown_account_is_rejected_before_persistence() {
        let (pool, service) = setup().await;
        let (cash, _revenue, _period) = seed_finance(&service).await;

        let result = service
            .post_entry(
                1,
                1,
                entry(vec![line(cash.id, 10.0, 0.0), line(999, 0.0, 10.0)]),
            )
            .await;
        assert!(matches!(result, Err(LedgerError::ValidationError(_))));
        assert_eq!(line_count(&pool).await, 0);
    }

    #[tokio::test]
    async fn test_inactive_account_is_rejected() {
        let (_pool, service) = setup().await;
        let (cash, revenue, _period) = seed_finance(&service).await;

        service
            .update_account(
                1,
                revenue.id,
                UpdateAccountInput {
                    name: None,
                    active: Some(false),
                },
            )
            .await
            .unwrap();

        let result = service
            .post_entry(
                1,
                1,
                entry(vec![line(cash.id, 10.0, 0.0), line(revenue.id, 0.0, 10.0)]),
            )
            .await;
        assert!(matches!(result, Err(LedgerError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_single_line_entry_is_rejected() {
        let (_pool, service) = setup().await;
        let (cash, _revenue, _period) = seed_finance(&service).await;

        let result = service
            .post_entry(1, 1, entry(vec![line(cash.id, 10.0, 0.0)]))
            .await;
        assert!(matches!(result, Err(LedgerError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_trial_balance_reflects_postings() {
        let (_pool, service) = setup().await;
        let (cash, revenue, period) = seed_finance(&service).await;

        service
            .post_entry(
                1,
                1,
                entry(vec![line(cash.id, 100.0, 0.0), line(revenue.id, 0.0, 100.0)]),
            )
            .await
            .unwrap();

        let first = service.trial_balance(1, period.id).await.unwrap();
        let cash_row = first.iter().find(|r| r.account_id == cash.id).unwrap();
        assert_eq!(cash_row.total_debit, 100.0);

        // A second posting must invalidate the cached balance
        service
            .post_entry(
                1,
                1,
                entry(vec![line(cash.id, 50.0, 0.0), line(revenue.id, 0.0, 50.0)]),
            )
            .await
            .unwrap();

        let second = service.trial_balance(1, period.id).await.unwrap();
        let cash_row = second.iter().find(|r| r.account_id == cash.id).unwrap();
        assert_eq!(cash_row.total_debit, 150.0);
    }

    #[tokio::test]
    async fn test_account_activity_with_running_totals_source() {
        let (_pool, service) = setup().await;
        let (cash, revenue, period) = seed_finance(&service).await;

        service
            .post_entry(
                1,
                1,
                entry(vec![line(cash.id, 100.0, 0.0), line(revenue.id, 0.0, 100.0)]),
            )
            .await
            .unwrap();

        let activity = service.account_activity(1, cash.id, period.id).await.unwrap();
        assert_eq!(activity.len(), 1);
        assert_eq!(activity[0].debit, 100.0);
    }

    #[tokio::test]
    async fn test_period_overlap_rejected() {
        let (_pool, service) = setup().await;
        seed_finance(&service).await;

        let result = service
            .create_period(
                1,
                CreatePeriodInput {
                    name: "overlapping".into(),
                    start_date: date(2026, 3, 15),
                    end_date: date(2026, 4, 15),
                },
            )
            .await;
        assert!(matches!(result, Err(LedgerError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_duplicate_account_code_rejected() {
        let (_pool, service) = setup().await;
        seed_finance(&service).await;

        let result = service
            .create_account(
                1,
                CreateAccountInput {
                    code: "1000".into(),
                    name: "Cash again".into(),
                    account_type: AccountType::Asset,
                },
            )
            .await;
        assert!(matches!(result, Err(LedgerError::DuplicateCode(_))));
    }

    mod validation_properties {
        use super::*;
        use proptest::prelude::*;

        /// Strategy for amounts with two decimal places, like user input
        fn amount_strategy() -> impl Strategy<Value = f64> {
            (0u64..=1_000_000).prop_map(|cents| cents as f64 / 100.0)
        }

        fn line_strategy() -> impl Strategy<Value = JournalLineInput> {
            (amount_strategy(), any::<bool>()).prop_map(|(amount, is_debit)| {
                // One side per line, never zero on both
                let amount = if amount == 0.0 { 0.01 } else { amount };
                if is_debit {
                    JournalLineInput {
                        account_id: 1,
                        debit: amount,
                        credit: 0.0,
                    }
                } else {
                    JournalLineInput {
                        account_id: 1,
                        debit: 0.0,
                        credit: amount,
                    }
                }
            })
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(256))]

            /// An entry whose debit/credit totals differ by more than the
            /// tolerance is always rejected; one within the tolerance is
            /// never rejected for imbalance.
            #[test]
            fn imbalance_beyond_tolerance_is_rejected(lines in prop::collection::vec(line_strategy(), 2..6)) {
                let input = JournalEntryInput {
                    entry_date: chrono::NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
                    period_id: None,
                    memo: None,
                    reference: None,
                    lines,
                };

                let imbalance = (input.total_debit() - input.total_credit()).abs();
                let result = validate_lines(&input);

                if imbalance > BALANCE_TOLERANCE {
                    let is_not_balanced = matches!(result, Err(LedgerError::NotBalanced { .. }));
                    prop_assert!(is_not_balanced);
                } else {
                    prop_assert!(result.is_ok());
                }
            }

            /// Negative amounts never pass validation, balanced or not.
            #[test]
            fn negative_amounts_are_rejected(amount in -1_000_000.0f64..-0.01) {
                let input = JournalEntryInput {
                    entry_date: chrono::NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
                    period_id: None,
                    memo: None,
                    reference: None,
                    lines: vec![
                        JournalLineInput { account_id: 1, debit: amount, credit: 0.0 },
                        JournalLineInput { account_id: 1, debit: 0.0, credit: amount },
                    ],
                };

                prop_assert!(matches!(
                    validate_lines(&input),
                    Err(LedgerError::ValidationError(_))
                ));
            }
        }
    }
}
