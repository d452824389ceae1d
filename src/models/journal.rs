//! Journal entry model
//!
//! A journal entry is a dated financial record composed of debit/credit
//! lines against accounts. Debits and credits must balance within a small
//! tolerance before an entry may be posted; the balancing rule itself lives
//! in `services::ledger`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Balance tolerance in currency units. Absorbs floating-point rounding in
/// submitted amounts; anything further apart than this is not balanced.
pub const BALANCE_TOLERANCE: f64 = 0.01;

/// Journal entry header
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Unique identifier
    pub id: i64,
    /// Owning organization
    pub org_id: i64,
    /// Accounting period the entry was posted into
    pub period_id: i64,
    /// Effective date of the entry
    pub entry_date: NaiveDate,
    /// Human-readable memo
    pub memo: Option<String>,
    /// External reference, e.g. an invoice number
    pub reference: Option<String>,
    /// User who posted the entry
    pub posted_by: i64,
    /// Posting timestamp
    pub created_at: DateTime<Utc>,
}

/// A single debit/credit line of a journal entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalLine {
    /// Unique identifier
    pub id: i64,
    /// Parent entry
    pub entry_id: i64,
    /// Target account
    pub account_id: i64,
    /// Debit amount in currency units (>= 0)
    pub debit: f64,
    /// Credit amount in currency units (>= 0)
    pub credit: f64,
    /// Line ordering within the entry
    pub position: i32,
}

/// A journal entry together with its lines
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryWithLines {
    pub entry: JournalEntry,
    pub lines: Vec<JournalLine>,
}

/// Proposed journal entry submitted for posting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntryInput {
    /// Effective date; also used to resolve the accounting period when no
    /// explicit period is given
    pub entry_date: NaiveDate,
    /// Explicit period override (optional)
    pub period_id: Option<i64>,
    pub memo: Option<String>,
    pub reference: Option<String>,
    /// Ordered debit/credit lines
    pub lines: Vec<JournalLineInput>,
}

/// A single proposed line
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct JournalLineInput {
    pub account_id: i64,
    /// Debit amount (>= 0)
    #[serde(default)]
    pub debit: f64,
    /// Credit amount (>= 0)
    #[serde(default)]
    pub credit: f64,
}

impl JournalEntryInput {
    /// Sum of all debit amounts
    pub fn total_debit(&self) -> f64 {
        self.lines.iter().map(|l| l.debit).sum()
    }

    /// Sum of all credit amounts
    pub fn total_credit(&self) -> f64 {
        self.lines.iter().map(|l| l.credit).sum()
    }

    /// Whether debits equal credits within [`BALANCE_TOLERANCE`]
    pub fn is_balanced(&self) -> bool {
        (self.total_debit() - self.total_credit()).abs() <= BALANCE_TOLERANCE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(lines: Vec<JournalLineInput>) -> JournalEntryInput {
        JournalEntryInput {
            entry_date: chrono::NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
            period_id: None,
            memo: None,
            reference: None,
            lines,
        }
    }

    fn line(debit: f64, credit: f64) -> JournalLineInput {
        JournalLineInput {
            account_id: 1,
            debit,
            credit,
        }
    }

    #[test]
    fn test_balanced_entry() {
        let e = entry(vec![line(100.0, 0.0), line(0.0, 100.0)]);
        assert!(e.is_balanced());
        assert_eq!(e.total_debit(), 100.0);
        assert_eq!(e.total_credit(), 100.0);
    }

    #[test]
    fn test_unbalanced_entry() {
        let e = entry(vec![line(100.0, 0.0), line(0.0, 99.0)]);
        assert!(!e.is_balanced());
    }

    #[test]
    fn test_tolerance_absorbs_rounding() {
        // Off by less than a cent: still balanced
        let e = entry(vec![line(10.005, 0.0), line(0.0, 10.0)]);
        assert!(e.is_balanced());

        // Off by more than a cent: not balanced
        let e = entry(vec![line(10.02, 0.0), line(0.0, 10.0)]);
        assert!(!e.is_balanced());
    }
}
