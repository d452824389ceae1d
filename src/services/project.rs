//! Project service
//!
//! Business logic for project management:
//! - Create, read, update, delete projects
//! - Project code generation and uniqueness
//! - Status transition rules
//! - Date sanity checks

use crate::db::repositories::{ContactRepository, ProjectRepository};
use crate::models::{
    CreateProjectInput, ListParams, PagedResult, Project, ProjectStatus, UpdateProjectInput,
};
use anyhow::Context;
use std::sync::Arc;

/// Error types for project service operations
#[derive(Debug, thiserror::Error)]
pub enum ProjectServiceError {
    /// Project not found
    #[error("Project not found: {0}")]
    NotFound(i64),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Duplicate project code
    #[error("Project code already exists: {0}")]
    DuplicateCode(String),

    /// Illegal status transition
    #[error("Cannot move project from '{from}' to '{to}'")]
    InvalidTransition {
        from: ProjectStatus,
        to: ProjectStatus,
    },

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Project service
pub struct ProjectService {
    repo: Arc<dyn ProjectRepository>,
    contact_repo: Arc<dyn ContactRepository>,
}

impl ProjectService {
    pub fn new(repo: Arc<dyn ProjectRepository>, contact_repo: Arc<dyn ContactRepository>) -> Self {
        Self { repo, contact_repo }
    }

    /// Create a new project.
    ///
    /// An empty code is generated from the name; explicit codes are
    /// normalized to uppercase.
    pub async fn create(
        &self,
        org_id: i64,
        input: CreateProjectInput,
    ) -> Result<Project, ProjectServiceError> {
        if input.name.trim().is_empty() {
            return Err(ProjectServiceError::ValidationError(
                "Project name must not be empty".into(),
            ));
        }
        validate_dates(input.start_date, input.due_date)?;

        let code = if input.code.trim().is_empty() {
            generate_code(&input.name)
        } else {
            input.code.trim().to_uppercase()
        };
        if code.is_empty() || code.len() > 20 {
            return Err(ProjectServiceError::ValidationError(
                "Project code must be 1-20 characters".into(),
            ));
        }

        if self
            .repo
            .exists_by_code(org_id, &code)
            .await
            .context("Failed to check project code")?
        {
            return Err(ProjectServiceError::DuplicateCode(code));
        }

        if let Some(contact_id) = input.contact_id {
            self.ensure_contact(org_id, contact_id).await?;
        }

        let mut project = Project::new(org_id, code, input.name.trim().to_string());
        project.description = input.description;
        project.contact_id = input.contact_id;
        project.start_date = input.start_date;
        project.due_date = input.due_date;

        Ok(self
            .repo
            .create(&project)
            .await
            .context("Failed to create project")?)
    }

    /// Get a project by id
    pub async fn get(&self, org_id: i64, id: i64) -> Result<Project, ProjectServiceError> {
        self.repo
            .get_by_id(org_id, id)
            .await
            .context("Failed to load project")?
            .ok_or(ProjectServiceError::NotFound(id))
    }

    /// List projects with pagination, optionally filtered by status
    pub async fn list(
        &self,
        org_id: i64,
        params: &ListParams,
        status: Option<ProjectStatus>,
    ) -> Result<PagedResult<Project>, ProjectServiceError> {
        Ok(self
            .repo
            .list(org_id, params, status)
            .await
            .context("Failed to list projects")?)
    }

    /// Update a project, enforcing the status transition rules
    pub async fn update(
        &self,
        org_id: i64,
        id: i64,
        input: UpdateProjectInput,
    ) -> Result<Project, ProjectServiceError> {
        if !input.has_changes() {
            return self.get(org_id, id).await;
        }

        let mut project = self.get(org_id, id).await?;

        if let Some(status) = input.status {
            if !project.status.can_transition_to(status) {
                return Err(ProjectServiceError::InvalidTransition {
                    from: project.status,
                    to: status,
                });
            }
            project.status = status;
        }
        if let Some(name) = input.name {
            if name.trim().is_empty() {
                return Err(ProjectServiceError::ValidationError(
                    "Project name must not be empty".into(),
                ));
            }
            project.name = name.trim().to_string();
        }
        if let Some(description) = input.description {
            project.description = Some(description);
        }
        if let Some(contact_id) = input.contact_id {
            self.ensure_contact(org_id, contact_id).await?;
            project.contact_id = Some(contact_id);
        }
        if let Some(start_date) = input.start_date {
            project.start_date = Some(start_date);
        }
        if let Some(due_date) = input.due_date {
            project.due_date = Some(due_date);
        }
        validate_dates(project.start_date, project.due_date)?;

        Ok(self
            .repo
            .update(&project)
            .await
            .context("Failed to update project")?)
    }

    /// Delete a project and (via cascade) its tasks
    pub async fn delete(&self, org_id: i64, id: i64) -> Result<(), ProjectServiceError> {
        self.get(org_id, id).await?;
        Ok(self
            .repo
            .delete(org_id, id)
            .await
            .context("Failed to delete project")?)
    }

    /// Count projects, optionally by status (dashboard)
    pub async fn count(
        &self,
        org_id: i64,
        status: Option<ProjectStatus>,
    ) -> Result<i64, ProjectServiceError> {
        Ok(self
            .repo
            .count(org_id, status)
            .await
            .context("Failed to count projects")?)
    }

    async fn ensure_contact(
        &self,
        org_id: i64,
        contact_id: i64,
    ) -> Result<(), ProjectServiceError> {
        let exists = self
            .contact_repo
            .get_by_id(org_id, contact_id)
            .await
            .context("Failed to check contact")?
            .is_some();
        if !exists {
            return Err(ProjectServiceError::ValidationError(format!(
                "Contact {} does not exist",
                contact_id
            )));
        }
        Ok(())
    }
}

fn validate_dates(
    start: Option<chrono::NaiveDate>,
    due: Option<chrono::NaiveDate>,
) -> Result<(), ProjectServiceError> {
    if let (Some(start), Some(due)) = (start, due) {
        if due < start {
            return Err(ProjectServiceError::ValidationError(
                "Due date must not be before the start date".into(),
            ));
        }
    }
    Ok(())
}

/// Derive a short uppercase code from a project name, e.g.
/// "Website relaunch" -> "WR"
fn generate_code(name: &str) -> String {
    let initials: String = name
        .split_whitespace()
        .filter_map(|word| word.chars().find(|c| c.is_ascii_alphanumeric()))
        .map(|c| c.to_ascii_uppercase())
        .take(6)
        .collect();

    if initials.len() >= 2 {
        initials
    } else {
        name.chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_uppercase())
            .take(6)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxContactRepository, SqlxProjectRepository};
    use crate::db::{create_test_pool, migrations};
    use chrono::NaiveDate;

    async fn setup_service() -> ProjectService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        pool.execute("INSERT INTO organizations (name, slug) VALUES ('Test Org', 'test-org')")
            .await
            .unwrap();
        pool.execute(
            "INSERT INTO contacts (org_id, name, kind) VALUES (1, 'Globex', 'customer')",
        )
        .await
        .unwrap();
        ProjectService::new(
            SqlxProjectRepository::boxed(pool.clone()),
            SqlxContactRepository::boxed(pool),
        )
    }

    fn input(name: &str) -> CreateProjectInput {
        CreateProjectInput {
            code: String::new(),
            name: name.to_string(),
            description: None,
            contact_id: None,
            start_date: None,
            due_date: None,
        }
    }

    #[tokio::test]
    async fn test_create_generates_code_from_name() {
        let service = setup_service().await;
        let project = service.create(1, input("Website Relaunch")).await.unwrap();
        assert_eq!(project.code, "WR");
    }

    #[tokio::test]
    async fn test_create_normalizes_explicit_code() {
        let service = setup_service().await;
        let mut i = input("Some project");
        i.code = " prj-1 ".into();
        let project = service.create(1, i).await.unwrap();
        assert_eq!(project.code, "PRJ-1");
    }

    #[tokio::test]
    async fn test_duplicate_code_rejected() {
        let service = setup_service().await;
        let mut first = input("First");
        first.code = "PRJ-1".into();
        service.create(1, first).await.unwrap();

        let mut second = input("Second");
        second.code = "PRJ-1".into();
        let result = service.create(1, second).await;
        assert!(matches!(result, Err(ProjectServiceError::DuplicateCode(_))));
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_contact() {
        let service = setup_service().await;
        let mut i = input("Client work");
        i.contact_id = Some(999);
        let result = service.create(1, i).await;
        assert!(matches!(
            result,
            Err(ProjectServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_create_rejects_due_before_start() {
        let service = setup_service().await;
        let mut i = input("Dated");
        i.start_date = NaiveDate::from_ymd_opt(2026, 6, 1);
        i.due_date = NaiveDate::from_ymd_opt(2026, 5, 1);
        let result = service.create(1, i).await;
        assert!(matches!(
            result,
            Err(ProjectServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_status_transition_enforced() {
        let service = setup_service().await;
        let project = service.create(1, input("Transitions")).await.unwrap();

        // planned -> completed is not allowed
        let result = service
            .update(
                1,
                project.id,
                UpdateProjectInput {
                    status: Some(ProjectStatus::Completed),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(
            result,
            Err(ProjectServiceError::InvalidTransition { .. })
        ));

        // planned -> active -> completed is
        service
            .update(
                1,
                project.id,
                UpdateProjectInput {
                    status: Some(ProjectStatus::Active),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let done = service
            .update(
                1,
                project.id,
                UpdateProjectInput {
                    status: Some(ProjectStatus::Completed),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(done.status, ProjectStatus::Completed);
    }

    #[test]
    fn test_generate_code() {
        assert_eq!(generate_code("Website relaunch"), "WR");
        assert_eq!(generate_code("alpha beta gamma delta"), "ABGD");
        assert_eq!(generate_code("X"), "X");
    }
}
