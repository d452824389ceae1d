//! Transaction retry support
//!
//! Journal postings run inside a database-native transaction. Under
//! concurrent load both SQLite and MySQL can refuse the commit with a
//! transient lock/serialization error; those commits are safe to retry.
//! This module provides the bounded retry policy used by the ledger:
//! a maximum attempt count with a linear backoff schedule, parameterized
//! over a predicate deciding which errors are retryable.
//!
//! Everything else fails on the first attempt. There is deliberately no
//! other retry/backoff machinery anywhere in the system.

use std::future::Future;
use std::time::Duration;

/// Bounded retry policy: at most `max_attempts` tries, sleeping
/// `attempt * backoff_step` between them.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff_step: Duration,
}

impl RetryPolicy {
    /// Create a policy with the given attempt budget and backoff step.
    ///
    /// `max_attempts` counts the first try, so `1` means "no retries".
    pub const fn new(max_attempts: u32, backoff_step: Duration) -> Self {
        Self {
            max_attempts,
            backoff_step,
        }
    }

    /// Total attempt budget
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay before the attempt following `attempt` (1-indexed)
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_step * attempt
    }
}

impl Default for RetryPolicy {
    /// The journal posting policy: 3 attempts, 100ms linear backoff.
    fn default() -> Self {
        Self::new(3, Duration::from_millis(100))
    }
}

/// Error returned by [`with_retry`]
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E>
where
    E: std::fmt::Display + std::fmt::Debug,
{
    /// Every attempt hit a retryable error; names the number of attempts made
    #[error("operation failed after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: E },
    /// A non-retryable error aborted the operation on its first occurrence
    #[error("{0}")]
    Aborted(E),
}

impl<E> RetryError<E>
where
    E: std::fmt::Display + std::fmt::Debug,
{
    /// The underlying error, whichever way the retry loop ended
    pub fn into_inner(self) -> E {
        match self {
            RetryError::Exhausted { last_error, .. } => last_error,
            RetryError::Aborted(e) => e,
        }
    }
}

/// Run `op` under the retry policy.
///
/// `op` is re-invoked only while `is_retryable` returns true for the error
/// and the attempt budget is not exhausted. The whole operation must be
/// safe to re-run from the top; for journal postings that holds because the
/// transaction rolls back before the error surfaces.
pub async fn with_retry<T, E, F, Fut>(
    policy: RetryPolicy,
    is_retryable: impl Fn(&E) -> bool,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display + std::fmt::Debug,
{
    let max_attempts = policy.max_attempts();
    let mut attempt = 1u32;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if is_retryable(&err) => {
                if attempt >= max_attempts {
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last_error: err,
                    });
                }
                let delay = policy.backoff(attempt);
                tracing::warn!(
                    attempt,
                    ?delay,
                    error = %err,
                    "transient database error, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(RetryError::Aborted(err)),
        }
    }
}

/// Classify a sqlx error as a transient lock/serialization conflict.
///
/// SQLite reports `SQLITE_BUSY` (5, extended 261/517) and `SQLITE_LOCKED`
/// (6); MySQL reports deadlocks as SQLSTATE 40001 (ER 1213) and lock wait
/// timeouts as ER 1205. Anything else is not retryable.
pub fn is_transient_error(err: &sqlx::Error) -> bool {
    let sqlx::Error::Database(db) = err else {
        return false;
    };

    if let Some(code) = db.code() {
        if matches!(code.as_ref(), "5" | "6" | "261" | "517" | "40001") {
            return true;
        }
    }

    let msg = db.message().to_lowercase();
    msg.contains("database is locked")
        || msg.contains("database table is locked")
        || msg.contains("deadlock found")
        || msg.contains("lock wait timeout")
}
