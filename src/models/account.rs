//! Account model (chart of accounts)
//!
//! Accounts are the postable targets of journal lines. The account type
//! determines its normal balance side: asset and expense accounts carry a
//! debit balance, liability/equity/income accounts a credit balance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Account entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier
    pub id: i64,
    /// Owning organization
    pub org_id: i64,
    /// Account code (unique within the organization, e.g. "1000")
    pub code: String,
    /// Account name
    pub name: String,
    /// Account classification
    pub account_type: AccountType,
    /// Inactive accounts reject new postings but keep their history
    pub active: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn new(org_id: i64, code: String, name: String, account_type: AccountType) -> Self {
        Self {
            id: 0, // Will be set by the database
            org_id,
            code,
            name,
            account_type,
            active: true,
            created_at: Utc::now(),
        }
    }
}

/// Account classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Asset,
    Liability,
    Equity,
    Income,
    Expense,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Asset => "asset",
            AccountType::Liability => "liability",
            AccountType::Equity => "equity",
            AccountType::Income => "income",
            AccountType::Expense => "expense",
        }
    }

    /// Whether the account's normal balance is on the debit side
    pub fn is_debit_normal(&self) -> bool {
        matches!(self, AccountType::Asset | AccountType::Expense)
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asset" => Ok(AccountType::Asset),
            "liability" => Ok(AccountType::Liability),
            "equity" => Ok(AccountType::Equity),
            "income" => Ok(AccountType::Income),
            "expense" => Ok(AccountType::Expense),
            _ => Err(anyhow::anyhow!("Invalid account type: {}", s)),
        }
    }
}

/// Input for creating a new account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAccountInput {
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
}

/// Input for updating an existing account
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAccountInput {
    pub name: Option<String>,
    pub active: Option<bool>,
}
