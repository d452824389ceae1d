//! Project model
//!
//! This module provides:
//! - `Project` entity representing a client engagement or internal effort
//! - `ProjectStatus` enum for lifecycle states
//! - Input types for creating and updating projects

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Project entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    /// Unique identifier
    pub id: i64,
    /// Owning organization
    pub org_id: i64,
    /// Short project code (unique within the organization)
    pub code: String,
    /// Project name
    pub name: String,
    /// Description
    pub description: Option<String>,
    /// Lifecycle status
    pub status: ProjectStatus,
    /// Client contact (optional)
    pub contact_id: Option<i64>,
    /// Planned start date
    pub start_date: Option<NaiveDate>,
    /// Planned completion date
    pub due_date: Option<NaiveDate>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn new(org_id: i64, code: String, name: String) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // Will be set by the database
            org_id,
            code,
            name,
            description: None,
            status: ProjectStatus::Planned,
            contact_id: None,
            start_date: None,
            due_date: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Project lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectStatus {
    Planned,
    Active,
    OnHold,
    Completed,
    Cancelled,
}

impl Default for ProjectStatus {
    fn default() -> Self {
        Self::Planned
    }
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Planned => "planned",
            ProjectStatus::Active => "active",
            ProjectStatus::OnHold => "on-hold",
            ProjectStatus::Completed => "completed",
            ProjectStatus::Cancelled => "cancelled",
        }
    }

    /// Whether a transition from `self` to `to` is allowed.
    ///
    /// Completed and cancelled projects are terminal except for reopening
    /// back to active.
    pub fn can_transition_to(&self, to: ProjectStatus) -> bool {
        use ProjectStatus::*;
        match (self, to) {
            (a, b) if *a == b => true,
            (Planned, Active) | (Planned, Cancelled) => true,
            (Active, OnHold) | (Active, Completed) | (Active, Cancelled) => true,
            (OnHold, Active) | (OnHold, Cancelled) => true,
            (Completed, Active) | (Cancelled, Active) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProjectStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "planned" => Ok(ProjectStatus::Planned),
            "active" => Ok(ProjectStatus::Active),
            "on-hold" | "on_hold" => Ok(ProjectStatus::OnHold),
            "completed" => Ok(ProjectStatus::Completed),
            "cancelled" => Ok(ProjectStatus::Cancelled),
            _ => Err(anyhow::anyhow!("Invalid project status: {}", s)),
        }
    }
}

/// Input for creating a new project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProjectInput {
    /// Short project code; generated from the name when empty
    #[serde(default)]
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub contact_id: Option<i64>,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
}

/// Input for updating an existing project
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProjectInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<ProjectStatus>,
    pub contact_id: Option<i64>,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
}

impl UpdateProjectInput {
    /// Check if any field is set
    pub fn has_changes(&self) -> bool {
        self.name.is_some()
            || self.description.is_some()
            || self.status.is_some()
            || self.contact_id.is_some()
            || self.start_date.is_some()
            || self.due_date.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            ProjectStatus::Planned,
            ProjectStatus::Active,
            ProjectStatus::OnHold,
            ProjectStatus::Completed,
            ProjectStatus::Cancelled,
        ] {
            let parsed: ProjectStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn test_transition_rules() {
        assert!(ProjectStatus::Planned.can_transition_to(ProjectStatus::Active));
        assert!(ProjectStatus::Active.can_transition_to(ProjectStatus::Completed));
        assert!(ProjectStatus::Completed.can_transition_to(ProjectStatus::Active));
        assert!(!ProjectStatus::Planned.can_transition_to(ProjectStatus::Completed));
        assert!(!ProjectStatus::Completed.can_transition_to(ProjectStatus::OnHold));
    }
}
