//! Accounting period model
//!
//! A period is a dated window postings fall into. A locked period rejects
//! further postings regardless of whether the entry balances.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Accounting period entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountingPeriod {
    /// Unique identifier
    pub id: i64,
    /// Owning organization
    pub org_id: i64,
    /// Display name, e.g. "2026-03" or "FY26 Q1"
    pub name: String,
    /// First day covered by this period (inclusive)
    pub start_date: NaiveDate,
    /// Last day covered by this period (inclusive)
    pub end_date: NaiveDate,
    /// Locked periods reject postings
    pub locked: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl AccountingPeriod {
    pub fn new(org_id: i64, name: String, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            id: 0, // Will be set by the database
            org_id,
            name,
            start_date,
            end_date,
            locked: false,
            created_at: Utc::now(),
        }
    }

    /// Check whether a date falls inside this period
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

/// Input for creating a new accounting period
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePeriodInput {
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_contains_is_inclusive() {
        let period =
            AccountingPeriod::new(1, "2026-03".into(), date(2026, 3, 1), date(2026, 3, 31));
        assert!(period.contains(date(2026, 3, 1)));
        assert!(period.contains(date(2026, 3, 31)));
        assert!(period.contains(date(2026, 3, 15)));
        assert!(!period.contains(date(2026, 2, 28)));
        assert!(!period.contains(date(2026, 4, 1)));
    }
}
