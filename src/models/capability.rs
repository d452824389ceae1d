//! Capability tags and role capability sets
//!
//! Authorization is expressed as a closed set of capability tags checked
//! against the capability set of the caller's role, rather than free-form
//! permission strings.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::UserRole;

/// A single authorizable action within the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// View the chart of accounts, journal entries, and reports
    FinanceView,
    /// Post journal entries
    FinancePost,
    /// Manage accounts and lock/unlock accounting periods
    FinanceClose,
    /// View budgets and variance reports
    BudgetsView,
    /// Create and edit budgets
    BudgetsManage,
    /// View projects and tasks
    ProjectsView,
    /// Create and edit projects and tasks
    ProjectsManage,
    /// View contacts
    ContactsView,
    /// Create and edit contacts
    ContactsManage,
    /// View and download shared files
    FilesView,
    /// Upload and delete shared files
    FilesManage,
    /// Create, update, and suspend users
    UsersManage,
    /// Access the admin dashboard, system stats, and backups
    AdminPanel,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::FinanceView => "finance_view",
            Capability::FinancePost => "finance_post",
            Capability::FinanceClose => "finance_close",
            Capability::BudgetsView => "budgets_view",
            Capability::BudgetsManage => "budgets_manage",
            Capability::ProjectsView => "projects_view",
            Capability::ProjectsManage => "projects_manage",
            Capability::ContactsView => "contacts_view",
            Capability::ContactsManage => "contacts_manage",
            Capability::FilesView => "files_view",
            Capability::FilesManage => "files_manage",
            Capability::UsersManage => "users_manage",
            Capability::AdminPanel => "admin_panel",
        };
        write!(f, "{}", name)
    }
}

impl UserRole {
    /// The capability set granted by this role.
    pub fn capabilities(&self) -> &'static [Capability] {
        use Capability::*;
        match self {
            UserRole::Admin => &[
                FinanceView,
                FinancePost,
                FinanceClose,
                BudgetsView,
                BudgetsManage,
                ProjectsView,
                ProjectsManage,
                ContactsView,
                ContactsManage,
                FilesView,
                FilesManage,
                UsersManage,
                AdminPanel,
            ],
            UserRole::Manager => &[
                FinanceView,
                BudgetsView,
                BudgetsManage,
                ProjectsView,
                ProjectsManage,
                ContactsView,
                ContactsManage,
                FilesView,
                FilesManage,
            ],
            UserRole::Accountant => &[
                FinanceView,
                FinancePost,
                FinanceClose,
                BudgetsView,
                BudgetsManage,
                ContactsView,
                FilesView,
            ],
            UserRole::Member => &[ProjectsView, ContactsView, FilesView],
        }
    }

    /// Check whether this role grants a capability.
    pub fn grants(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_grants_everything() {
        use Capability::*;
        for cap in [
            FinanceView,
            FinancePost,
            FinanceClose,
            BudgetsView,
            BudgetsManage,
            ProjectsView,
            ProjectsManage,
            ContactsView,
            ContactsManage,
            FilesView,
            FilesManage,
            UsersManage,
            AdminPanel,
        ] {
            assert!(UserRole::Admin.grants(cap), "admin should grant {}", cap);
        }
    }

    #[test]
    fn test_manager_cannot_post_journal_entries() {
        assert!(UserRole::Manager.grants(Capability::FinanceView));
        assert!(!UserRole::Manager.grants(Capability::FinancePost));
        assert!(!UserRole::Manager.grants(Capability::FinanceClose));
    }

    #[test]
    fn test_accountant_cannot_manage_projects() {
        assert!(UserRole::Accountant.grants(Capability::FinancePost));
        assert!(!UserRole::Accountant.grants(Capability::ProjectsView));
        assert!(!UserRole::Accountant.grants(Capability::ProjectsManage));
    }

    #[test]
    fn test_member_is_read_only() {
        assert!(UserRole::Member.grants(Capability::ProjectsView));
        assert!(!UserRole::Member.grants(Capability::ProjectsManage));
        assert!(!UserRole::Member.grants(Capability::UsersManage));
        assert!(!UserRole::Member.grants(Capability::AdminPanel));
    }
}
