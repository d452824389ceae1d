//! Contact model
//!
//! Contacts are the customers, vendors, and leads an organization does
//! business with. Projects reference a contact as their client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Contact entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    /// Unique identifier
    pub id: i64,
    /// Owning organization
    pub org_id: i64,
    /// Contact name
    pub name: String,
    /// Kind of relationship
    pub kind: ContactKind,
    /// Email address (optional)
    pub email: Option<String>,
    /// Phone number (optional)
    pub phone: Option<String>,
    /// Company name (optional)
    pub company: Option<String>,
    /// Free-form notes
    pub notes: Option<String>,
    /// Archived contacts are hidden from default listings
    pub archived: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Contact {
    pub fn new(org_id: i64, name: String, kind: ContactKind) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // Will be set by the database
            org_id,
            name,
            kind,
            email: None,
            phone: None,
            company: None,
            notes: None,
            archived: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Kind of business relationship a contact represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactKind {
    Customer,
    Vendor,
    Lead,
}

impl Default for ContactKind {
    fn default() -> Self {
        Self::Customer
    }
}

impl ContactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactKind::Customer => "customer",
            ContactKind::Vendor => "vendor",
            ContactKind::Lead => "lead",
        }
    }
}

impl fmt::Display for ContactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ContactKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "customer" => Ok(ContactKind::Customer),
            "vendor" => Ok(ContactKind::Vendor),
            "lead" => Ok(ContactKind::Lead),
            _ => Err(anyhow::anyhow!("Invalid contact kind: {}", s)),
        }
    }
}

/// Input for creating a new contact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateContactInput {
    pub name: String,
    #[serde(default)]
    pub kind: ContactKind,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub notes: Option<String>,
}

/// Input for updating an existing contact
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateContactInput {
    pub name: Option<String>,
    pub kind: Option<ContactKind>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub notes: Option<String>,
    pub archived: Option<bool>,
}

impl UpdateContactInput {
    /// Check if any field is set
    pub fn has_changes(&self) -> bool {
        self.name.is_some()
            || self.kind.is_some()
            || self.email.is_some()
            || self.phone.is_some()
            || self.company.is_some()
            || self.notes.is_some()
            || self.archived.is_some()
    }
}
