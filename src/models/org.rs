//! Organization model
//!
//! Every business entity in Atrium belongs to exactly one organization.
//! Registration creates the organization together with its first admin user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Organization (tenant) entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    /// Unique identifier
    pub id: i64,
    /// Display name
    pub name: String,
    /// URL-friendly slug (unique)
    pub slug: String,
    /// ISO 4217 code of the base currency
    pub currency_code: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Organization {
    pub fn new(name: String, slug: String, currency_code: String) -> Self {
        Self {
            id: 0, // Will be set by the database
            name,
            slug,
            currency_code,
            created_at: Utc::now(),
        }
    }
}
