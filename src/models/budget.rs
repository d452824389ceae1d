//! Budget model
//!
//! A budget pins planned amounts to accounts for one accounting period.
//! Budgets are reporting-only: overruns show up in the variance report and
//! never block a posting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Budget header
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Budget {
    /// Unique identifier
    pub id: i64,
    /// Owning organization
    pub org_id: i64,
    /// Budget name
    pub name: String,
    /// Accounting period this budget covers
    pub period_id: i64,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

/// A budgeted amount for one account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetLine {
    /// Unique identifier
    pub id: i64,
    /// Parent budget
    pub budget_id: i64,
    /// Budgeted account
    pub account_id: i64,
    /// Budgeted amount in currency units
    pub amount: f64,
}

/// Input for creating a budget with its lines
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBudgetInput {
    pub name: String,
    pub period_id: i64,
    pub lines: Vec<BudgetLineInput>,
}

/// A single proposed budget line
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BudgetLineInput {
    pub account_id: i64,
    pub amount: f64,
}
