//! Task repository
//!
//! Database operations for tasks. Tasks live under a project; "my tasks"
//! listings cut across projects by assignee.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{ListParams, PagedResult, Task, TaskPriority, TaskStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

/// Task repository trait
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Create a new task
    async fn create(&self, task: &Task) -> Result<Task>;

    /// Get a task by ID within an organization
    async fn get_by_id(&self, org_id: i64, id: i64) -> Result<Option<Task>>;

    /// List tasks of a project with pagination
    async fn list_by_project(
        &self,
        org_id: i64,
        project_id: i64,
        params: &ListParams,
        status: Option<TaskStatus>,
    ) -> Result<PagedResult<Task>>;

    /// List open tasks assigned to a user across all projects
    async fn list_assigned(&self, org_id: i64, assignee_id: i64) -> Result<Vec<Task>>;

    /// Update a task
    async fn update(&self, task: &Task) -> Result<Task>;

    /// Delete a task
    async fn delete(&self, org_id: i64, id: i64) -> Result<()>;

    /// Count tasks of an organization
    async fn count_by_org(&self, org_id: i64) -> Result<i64>;

    /// Count open (not done) tasks of a project
    async fn count_open_by_project(&self, org_id: i64, project_id: i64) -> Result<i64>;
}

/// SQLx-based task repository implementation
pub struct SqlxTaskRepository {
    pool: DynDatabasePool,
}

impl SqlxTaskRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TaskRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl TaskRepository for SqlxTaskRepository {
    async fn create(&self, task: &Task) -> Result<Task> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_sqlite(self.pool.as_sqlite().unwrap(), task).await,
            DatabaseDriver::Mysql => create_mysql(self.pool.as_mysql().unwrap(), task).await,
        }
    }

    async fn get_by_id(&self, org_id: i64, id: i64) -> Result<Option<Task>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_by_id_sqlite(self.pool.as_sqlite().unwrap(), org_id, id).await
            }
            DatabaseDriver::Mysql => {
                get_by_id_mysql(self.pool.as_mysql().unwrap(), org_id, id).await
            }
        }
    }

    async fn list_by_project(
        &self,
        org_id: i64,
        project_id: i64,
        params: &ListParams,
        status: Option<TaskStatus>,
    ) -> Result<PagedResult<Task>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_by_project_sqlite(
                    self.pool.as_sqlite().unwrap(),
                    org_id,
                    project_id,
                    params,
                    status,
                )
                .await
            }
            DatabaseDriver::Mysql => {
                list_by_project_mysql(
                    self.pool.as_mysql().unwrap(),
                    org_id,
                    project_id,
                    params,
                    status,
                )
                .await
            }
        }
    }

    async fn list_assigned(&self, org_id: i64, assignee_id: i64) -> Result<Vec<Task>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_assigned_sqlite(self.pool.as_sqlite().unwrap(), org_id, assignee_id).await
            }
            DatabaseDriver::Mysql => {
                list_assigned_mysql(self.pool.as_mysql().unwrap(), org_id, assignee_id).await
            }
        }
    }

    async fn update(&self, task: &Task) -> Result<Task> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_sqlite(self.pool.as_sqlite().unwrap(), task).await,
            DatabaseDriver::Mysql => update_mysql(self.pool.as_mysql().unwrap(), task).await,
        }
    }

    async fn delete(&self, org_id: i64, id: i64) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                delete_sqlite(self.pool.as_sqlite().unwrap(), org_id, id).await
            }
            DatabaseDriver::Mysql => delete_mysql(self.pool.as_mysql().unwrap(), org_id, id).await,
        }
    }

    async fn count_by_org(&self, org_id: i64) -> Result<i64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                count_by_org_sqlite(self.pool.as_sqlite().unwrap(), org_id).await
            }
            DatabaseDriver::Mysql => {
                count_by_org_mysql(self.pool.as_mysql().unwrap(), org_id).await
            }
        }
    }

    async fn count_open_by_project(&self, org_id: i64, project_id: i64) -> Result<i64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                count_open_sqlite(self.pool.as_sqlite().unwrap(), org_id, project_id).await
            }
            DatabaseDriver::Mysql => {
                count_open_mysql(self.pool.as_mysql().unwrap(), org_id, project_id).await
            }
        }
    }
}

const TASK_COLUMNS: &str = "id, org_id, project_id, title, description, status, priority, \
     assignee_id, due_date, created_at, updated_at";

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_sqlite(pool: &SqlitePool, task: &Task) -> Result<Task> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO tasks (org_id, project_id, title, description, status, priority, assignee_id, due_date, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(task.org_id)
    .bind(task.project_id)
    .bind(&task.title)
    .bind(&task.description)
    .bind(task.status.to_string())
    .bind(task.priority.to_string())
    .bind(task.assignee_id)
    .bind(task.due_date)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create task")?;

    let id = result.last_insert_rowid();
    get_by_id_sqlite(pool, task.org_id, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Task not found after insert"))
}

async fn get_by_id_sqlite(pool: &SqlitePool, org_id: i64, id: i64) -> Result<Option<Task>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM tasks WHERE org_id = ? AND id = ?",
        TASK_COLUMNS
    ))
    .bind(org_id)
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get task by ID")?;

    match row {
        Some(row) => Ok(Some(row_to_task_sqlite(&row)?)),
        None => Ok(None),
    }
}

async fn list_by_project_sqlite(
    pool: &SqlitePool,
    org_id: i64,
    project_id: i64,
    params: &ListParams,
    status: Option<TaskStatus>,
) -> Result<PagedResult<Task>> {
    let (total, rows) = match status {
        Some(status) => {
            let total: i64 = sqlx::query(
                "SELECT COUNT(*) as count FROM tasks WHERE org_id = ? AND project_id = ? AND status = ?",
            )
            .bind(org_id)
            .bind(project_id)
            .bind(status.to_string())
            .fetch_one(pool)
            .await
            .context("Failed to count tasks")?
            .get("count");

            let rows = sqlx::query(&format!(
                "SELECT {} FROM tasks WHERE org_id = ? AND project_id = ? AND status = ? \
                 ORDER BY due_date IS NULL, due_date, id LIMIT ? OFFSET ?",
                TASK_COLUMNS
            ))
            .bind(org_id)
            .bind(project_id)
            .bind(status.to_string())
            .bind(params.limit())
            .bind(params.offset())
            .fetch_all(pool)
            .await
            .context("Failed to list tasks")?;

            (total, rows)
        }
        None => {
            let total: i64 = sqlx::query(
                "SELECT COUNT(*) as count FROM tasks WHERE org_id = ? AND project_id = ?",
            )
            .bind(org_id)
            .bind(project_id)
            .fetch_one(pool)
            .await
            .context("Failed to count tasks")?
            .get("count");

            let rows = sqlx::query(&format!(
                "SELECT {} FROM tasks WHERE org_id = ? AND project_id = ? \
                 ORDER BY due_date IS NULL, due_date, id LIMIT ? OFFSET ?",
                TASK_COLUMNS
            ))
            .bind(org_id)
            .bind(project_id)
            .bind(params.limit())
            .bind(params.offset())
            .fetch_all(pool)
            .await
            .context("Failed to list tasks")?;

            (total, rows)
        }
    };

    let mut tasks = Vec::new();
    for row in rows {
        tasks.push(row_to_task_sqlite(&row)?);
    }

    Ok(PagedResult::new(tasks, total, params))
}

async fn list_assigned_sqlite(
    pool: &SqlitePool,
    org_id: i64,
    assignee_id: i64,
) -> Result<Vec<Task>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM tasks WHERE org_id = ? AND assignee_id = ? AND status != 'done' \
         ORDER BY due_date IS NULL, due_date, id",
        TASK_COLUMNS
    ))
    .bind(org_id)
    .bind(assignee_id)
    .fetch_all(pool)
    .await
    .context("Failed to list assigned tasks")?;

    let mut tasks = Vec::new();
    for row in rows {
        tasks.push(row_to_task_sqlite(&row)?);
    }

    Ok(tasks)
}

async fn update_sqlite(pool: &SqlitePool, task: &Task) -> Result<Task> {
    sqlx::query(
        r#"
        UPDATE tasks
        SET title = ?, description = ?, status = ?, priority = ?, assignee_id = ?, due_date = ?, updated_at = ?
        WHERE org_id = ? AND id = ?
        "#,
    )
    .bind(&task.title)
    .bind(&task.description)
    .bind(task.status.to_string())
    .bind(task.priority.to_string())
    .bind(task.assignee_id)
    .bind(task.due_date)
    .bind(Utc::now())
    .bind(task.org_id)
    .bind(task.id)
    .execute(pool)
    .await
    .context("Failed to update task")?;

    get_by_id_sqlite(pool, task.org_id, task.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Task not found after update"))
}

async fn delete_sqlite(pool: &SqlitePool, org_id: i64, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM tasks WHERE org_id = ? AND id = ?")
        .bind(org_id)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete task")?;

    Ok(())
}

async fn count_by_org_sqlite(pool: &SqlitePool, org_id: i64) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) as count FROM tasks WHERE org_id = ?")
        .bind(org_id)
        .fetch_one(pool)
        .await
        .context("Failed to count tasks")?;

    Ok(row.get("count"))
}

async fn count_open_sqlite(pool: &SqlitePool, org_id: i64, project_id: i64) -> Result<i64> {
    let row = sqlx::query(
        "SELECT COUNT(*) as count FROM tasks WHERE org_id = ? AND project_id = ? AND status != 'done'",
    )
    .bind(org_id)
    .bind(project_id)
    .fetch_one(pool)
    .await
    .context("Failed to count open tasks")?;

    Ok(row.get("count"))
}

fn row_to_task_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Task> {
    let status: String = row.get("status");
    let priority: String = row.get("priority");

    Ok(Task {
        id: row.get("id"),
        org_id: row.get("org_id"),
        project_id: row.get("project_id"),
        title: row.get("title"),
        description: row.get("description"),
        status: TaskStatus::from_str(&status)?,
        priority: TaskPriority::from_str(&priority)?,
        assignee_id: row.get("assignee_id"),
        due_date: row.get("due_date"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_mysql(pool: &MySqlPool, task: &Task) -> Result<Task> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO tasks (org_id, project_id, title, description, status, priority, assignee_id, due_date, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(task.org_id)
    .bind(task.project_id)
    .bind(&task.title)
    .bind(&task.description)
    .bind(task.status.to_string())
    .bind(task.priority.to_string())
    .bind(task.assignee_id)
    .bind(task.due_date)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create task")?;

    let id = result.last_insert_id() as i64;
    get_by_id_mysql(pool, task.org_id, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Task not found after insert"))
}

async fn get_by_id_mysql(pool: &MySqlPool, org_id: i64, id: i64) -> Result<Option<Task>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM tasks WHERE org_id = ? AND id = ?",
        TASK_COLUMNS
    ))
    .bind(org_id)
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get task by ID")?;

    match row {
        Some(row) => Ok(Some(row_to_task_mysql(&row)?)),
        None => Ok(None),
    }
}

async fn list_by_project_mysql(
    pool: &MySqlPool,
    org_id: i64,
    project_id: i64,
    params: &ListParams,
    status: Option<TaskStatus>,
) -> Result<PagedResult<Task>> {
    let (total, rows) = match status {
        Some(status) => {
            let total: i64 = sqlx::query(
                "SELECT COUNT(*) as count FROM tasks WHERE org_id = ? AND project_id = ? AND status = ?",
            )
            .bind(org_id)
            .bind(project_id)
            .bind(status.to_string())
            .fetch_one(pool)
            .await
            .context("Failed to count tasks")?
            .get("count");

            let rows = sqlx::query(&format!(
                "SELECT {} FROM tasks WHERE org_id = ? AND project_id = ? AND status = ? \
                 ORDER BY due_date IS NULL, due_date, id LIMIT ? OFFSET ?",
                TASK_COLUMNS
            ))
            .bind(org_id)
            .bind(project_id)
            .bind(status.to_string())
            .bind(params.limit())
            .bind(params.offset())
            .fetch_all(pool)
            .await
            .context("Failed to list tasks")?;

            (total, rows)
        }
        None => {
            let total: i64 = sqlx::query(
                "SELECT COUNT(*) as count FROM tasks WHERE org_id = ? AND project_id = ?",
            )
            .bind(org_id)
            .bind(project_id)
            .fetch_one(pool)
            .await
            .context("Failed to count tasks")?
            .get("count");

            let rows = sqlx::query(&format!(
                "SELECT {} FROM tasks WHERE org_id = ? AND project_id = ? \
                 ORDER BY due_date IS NULL, due_date, id LIMIT ? OFFSET ?",
                TASK_COLUMNS
            ))
            .bind(org_id)
            .bind(project_id)
            .bind(params.limit())
            .bind(params.offset())
            .fetch_all(pool)
            .await
            .context("Failed to list tasks")?;

            (total, rows)
        }
    };

    let mut tasks = Vec::new();
    for row in rows {
        tasks.push(row_to_task_mysql(&row)?);
    }

    Ok(PagedResult::new(tasks, total, params))
}

async fn list_assigned_mysql(
    pool: &MySqlPool,
    org_id: i64,
    assignee_id: i64,
) -> Result<Vec<Task>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM tasks WHERE org_id = ? AND assignee_id = ? AND status != 'done' \
         ORDER BY due_date IS NULL, due_date, id",
        TASK_COLUMNS
    ))
    .bind(org_id)
    .bind(assignee_id)
    .fetch_all(pool)
    .await
    .context("Failed to list assigned tasks")?;

    let mut tasks = Vec::new();
    for row in rows {
        tasks.push(row_to_task_mysql(&row)?);
    }

    Ok(tasks)
}

async fn update_mysql(pool: &MySqlPool, task: &Task) -> Result<Task> {
    sqlx::query(
        r#"
        UPDATE tasks
        SET title = ?, description = ?, status = ?, priority = ?, assignee_id = ?, due_date = ?, updated_at = ?
        WHERE org_id = ? AND id = ?
        "#,
    )
    .bind(&task.title)
    .bind(&task.description)
    .bind(task.status.to_string())
    .bind(task.priority.to_string())
    .bind(task.assignee_id)
    .bind(task.due_date)
    .bind(Utc::now())
    .bind(task.org_id)
    .bind(task.id)
    .execute(pool)
    .await
    .context("Failed to update task")?;

    get_by_id_mysql(pool, task.org_id, task.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Task not found after update"))
}

async fn delete_mysql(pool: &MySqlPool, org_id: i64, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM tasks WHERE org_id = ? AND id = ?")
        .bind(org_id)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete task")?;

    Ok(())
}

async fn count_by_org_mysql(pool: &MySqlPool, org_id: i64) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) as count FROM tasks WHERE org_id = ?")
        .bind(org_id)
        .fetch_one(pool)
        .await
        .context("Failed to count tasks")?;

    Ok(row.get("count"))
}

async fn count_open_mysql(pool: &MySqlPool, org_id: i64, project_id: i64) -> Result<i64> {
    let row = sqlx::query(
        "SELECT COUNT(*) as count FROM tasks WHERE org_id = ? AND project_id = ? AND status != 'done'",
    )
    .bind(org_id)
    .bind(project_id)
    .fetch_one(pool)
    .await
    .context("Failed to count open tasks")?;

    Ok(row.get("count"))
}

fn row_to_task_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Task> {
    let status: String = row.get("status");
    let priority: String = row.get("priority");

    Ok(Task {
        id: row.get("id"),
        org_id: row.get("org_id"),
        project_id: row.get("project_id"),
        title: row.get("title"),
        description: row.get("description"),
        status: TaskStatus::from_str(&status)?,
        priority: TaskPriority::from_str(&priority)?,
        assignee_id: row.get("assignee_id"),
        due_date: row.get("due_date"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}
