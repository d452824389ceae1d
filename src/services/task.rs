//! Task service
//!
//! Business logic for tasks: validation, assignment checks, and listings
//! scoped to a project or an assignee.

use crate::db::repositories::{ProjectRepository, TaskRepository, UserRepository};
use crate::models::{
    CreateTaskInput, ListParams, PagedResult, Task, TaskStatus, UpdateTaskInput,
};
use anyhow::Context;
use std::sync::Arc;

/// Error types for task service operations
#[derive(Debug, thiserror::Error)]
pub enum TaskServiceError {
    /// Task not found
    #[error("Task not found: {0}")]
    NotFound(i64),

    /// Parent project not found
    #[error("Project not found: {0}")]
    ProjectNotFound(i64),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Task service
pub struct TaskService {
    repo: Arc<dyn TaskRepository>,
    project_repo: Arc<dyn ProjectRepository>,
    user_repo: Arc<dyn UserRepository>,
}

impl TaskService {
    pub fn new(
        repo: Arc<dyn TaskRepository>,
        project_repo: Arc<dyn ProjectRepository>,
        user_repo: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            repo,
            project_repo,
            user_repo,
        }
    }

    /// Create a task under a project
    pub async fn create(
        &self,
        org_id: i64,
        project_id: i64,
        input: CreateTaskInput,
    ) -> Result<Task, TaskServiceError> {
        if input.title.trim().is_empty() {
            return Err(TaskServiceError::ValidationError(
                "Task title must not be empty".into(),
            ));
        }

        self.ensure_project(org_id, project_id).await?;
        if let Some(assignee_id) = input.assignee_id {
            self.ensure_assignee(org_id, assignee_id).await?;
        }

        let mut task = Task::new(org_id, project_id, input.title.trim().to_string());
        task.description = input.description;
        task.priority = input.priority;
        task.assignee_id = input.assignee_id;
        task.due_date = input.due_date;

        Ok(self
            .repo
            .create(&task)
            .await
            .context("Failed to create task")?)
    }

    /// Get a task by id
    pub async fn get(&self, org_id: i64, id: i64) -> Result<Task, TaskServiceError> {
        self.repo
            .get_by_id(org_id, id)
            .await
            .context("Failed to load task")?
            .ok_or(TaskServiceError::NotFound(id))
    }

    /// List tasks of a project
    pub async fn list_by_project(
        &self,
        org_id: i64,
        project_id: i64,
        params: &ListParams,
        status: Option<TaskStatus>,
    ) -> Result<PagedResult<Task>, TaskServiceError> {
        self.ensure_project(org_id, project_id).await?;
        Ok(self
            .repo
            .list_by_project(org_id, project_id, params, status)
            .await
            .context("Failed to list tasks")?)
    }

    /// List open tasks assigned to a user
    pub async fn list_assigned(
        &self,
        org_id: i64,
        assignee_id: i64,
    ) -> Result<Vec<Task>, TaskServiceError> {
        Ok(self
            .repo
            .list_assigned(org_id, assignee_id)
            .await
            .context("Failed to list assigned tasks")?)
    }

    /// Update a task
    pub async fn update(
        &self,
        org_id: i64,
        id: i64,
        input: UpdateTaskInput,
    ) -> Result<Task, TaskServiceError> {
        if !input.has_changes() {
            return self.get(org_id, id).await;
        }

        let mut task = self.get(org_id, id).await?;

        if let Some(title) = input.title {
            if title.trim().is_empty() {
                return Err(TaskServiceError::ValidationError(
                    "Task title must not be empty".into(),
                ));
            }
            task.title = title.trim().to_string();
        }
        if let Some(description) = input.description {
            task.description = Some(description);
        }
        if let Some(status) = input.status {
            task.status = status;
        }
        if let Some(priority) = input.priority {
            task.priority = priority;
        }
        if let Some(assignee) = input.assignee_id {
            if let Some(assignee_id) = assignee {
                self.ensure_assignee(org_id, assignee_id).await?;
            }
            task.assignee_id = assignee;
        }
        if let Some(due_date) = input.due_date {
            task.due_date = Some(due_date);
        }

        Ok(self
            .repo
            .update(&task)
            .await
            .context("Failed to update task")?)
    }

    /// Count tasks of an organization (dashboard)
    pub async fn count(&self, org_id: i64) -> Result<i64, TaskServiceError> {
        Ok(self
            .repo
            .count_by_org(org_id)
            .await
            .context("Failed to count tasks")?)
    }

    /// Delete a task
    pub async fn delete(&self, org_id: i64, id: i64) -> Result<(), TaskServiceError> {
        self.get(org_id, id).await?;
        Ok(self
            .repo
            .delete(org_id, id)
            .await
            .context("Failed to delete task")?)
    }

    async fn ensure_project(&self, org_id: i64, project_id: i64) -> Result<(), TaskServiceError> {
        let exists = self
            .project_repo
            .get_by_id(org_id, project_id)
            .await
            .context("Failed to check project")?
            .is_some();
        if !exists {
            return Err(TaskServiceError::ProjectNotFound(project_id));
        }
        Ok(())
    }

    async fn ensure_assignee(&self, org_id: i64, assignee_id: i64) -> Result<(), TaskServiceError> {
        let valid = self
            .user_repo
            .get_by_id(assignee_id)
            .await
            .context("Failed to check assignee")?
            .map(|u| u.org_id == org_id)
            .unwrap_or(false);
        if !valid {
            return Err(TaskServiceError::ValidationError(format!(
                "Assignee {} does not exist in this organization",
                assignee_id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        SqlxProjectRepository, SqlxTaskRepository, SqlxUserRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::TaskPriority;

    async fn setup_service() -> TaskService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        pool.execute("INSERT INTO organizations (name, slug) VALUES ('Test Org', 'test-org')")
            .await
            .unwrap();
        pool.execute("INSERT INTO organizations (name, slug) VALUES ('Other Org', 'other-org')")
            .await
            .unwrap();
        pool.execute(
            "INSERT INTO users (org_id, username, email, password_hash, role) \
             VALUES (1, 'alice', 'alice@test', 'x', 'admin')",
        )
        .await
        .unwrap();
        pool.execute(
            "INSERT INTO users (org_id, username, email, password_hash, role) \
             VALUES (2, 'mallory', 'mallory@other', 'x', 'admin')",
        )
        .await
        .unwrap();
        pool.execute("INSERT INTO projects (org_id, code, name) VALUES (1, 'PRJ-1', 'Project')")
            .await
            .unwrap();
        TaskService::new(
            SqlxTaskRepository::boxed(pool.clone()),
            SqlxProjectRepository::boxed(pool.clone()),
            SqlxUserRepository::boxed(pool),
        )
    }

    fn input(title: &str) -> CreateTaskInput {
        CreateTaskInput {
            title: title.to_string(),
            description: None,
            priority: TaskPriority::Normal,
            assignee_id: None,
            due_date: None,
        }
    }

    #[tokio::test]
    async fn test_create_task() {
        let service = setup_service().await;
        let task = service.create(1, 1, input("Write spec")).await.unwrap();
        assert_eq!(task.title, "Write spec");
        assert_eq!(task.status, TaskStatus::Todo);
    }

    #[tokio::test]
    async fn test_create_in_missing_project_fails() {
        let service = setup_service().await;
        let result = service.create(1, 99, input("Orphan")).await;
        assert!(matches!(result, Err(TaskServiceError::ProjectNotFound(99))));
    }

    #[tokio::test]
    async fn test_assignee_must_be_in_same_org() {
        let service = setup_service().await;

        let mut cross_org = input("Assigned");
        cross_org.assignee_id = Some(2); // mallory is in another org
        let result = service.create(1, 1, cross_org).await;
        assert!(matches!(result, Err(TaskServiceError::ValidationError(_))));

        let mut ok = input("Assigned");
        ok.assignee_id = Some(1);
        assert!(service.create(1, 1, ok).await.is_ok());
    }

    #[tokio::test]
    async fn test_update_status_and_unassign() {
        let service = setup_service().await;
        let mut create = input("Movable");
        create.assignee_id = Some(1);
        let task = service.create(1, 1, create).await.unwrap();

        let updated = service
            .update(
                1,
                task.id,
                UpdateTaskInput {
                    status: Some(TaskStatus::InProgress),
                    assignee_id: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.status, TaskStatus::InProgress);
        assert!(updated.assignee_id.is_none());
    }

    #[tokio::test]
    async fn test_create_rejects_empty_title() {
        let service = setup_service().await;
        let result = service.create(1, 1, input("  ")).await;
        assert!(matches!(result, Err(TaskServiceError::ValidationError(_))));
    }
}
