//! Project repository
//!
//! Database operations for projects, scoped by organization. Project codes
//! are unique within an organization.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{ListParams, PagedResult, Project, ProjectStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

/// Project repository trait
#[async_trait]
pub trait ProjectRepository: Send + Sync {
    /// Create a new project
    async fn create(&self, project: &Project) -> Result<Project>;

    /// Get a project by ID within an organization
    async fn get_by_id(&self, org_id: i64, id: i64) -> Result<Option<Project>>;

    /// Get a project by its code
    async fn get_by_code(&self, org_id: i64, code: &str) -> Result<Option<Project>>;

    /// List projects with pagination, optionally filtered by status
    async fn list(
        &self,
        org_id: i64,
        params: &ListParams,
        status: Option<ProjectStatus>,
    ) -> Result<PagedResult<Project>>;

    /// Update a project
    async fn update(&self, project: &Project) -> Result<Project>;

    /// Delete a project (cascades to its tasks)
    async fn delete(&self, org_id: i64, id: i64) -> Result<()>;

    /// Check if a project code exists within an organization
    async fn exists_by_code(&self, org_id: i64, code: &str) -> Result<bool>;

    /// Count projects of an organization, optionally by status
    async fn count(&self, org_id: i64, status: Option<ProjectStatus>) -> Result<i64>;
}

/// SQLx-based project repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxProjectRepository {
    pool: DynDatabasePool,
}

impl SqlxProjectRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ProjectRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ProjectRepository for SqlxProjectRepository {
    async fn create(&self, project: &Project) -> Result<Project> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_sqlite(self.pool.as_sqlite().unwrap(), project).await,
            DatabaseDriver::Mysql => create_mysql(self.pool.as_mysql().unwrap(), project).await,
        }
    }

    async fn get_by_id(&self, org_id: i64, id: i64) -> Result<Option<Project>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_by_id_sqlite(self.pool.as_sqlite().unwrap(), org_id, id).await
            }
            DatabaseDriver::Mysql => {
                get_by_id_mysql(self.pool.as_mysql().unwrap(), org_id, id).await
            }
        }
    }

    async fn get_by_code(&self, org_id: i64, code: &str) -> Result<Option<Project>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_by_code_sqlite(self.pool.as_sqlite().unwrap(), org_id, code).await
            }
            DatabaseDriver::Mysql => {
                get_by_code_mysql(self.pool.as_mysql().unwrap(), org_id, code).await
            }
        }
    }

    async fn list(
        &self,
        org_id: i64,
        params: &ListParams,
        status: Option<ProjectStatus>,
    ) -> Result<PagedResult<Project>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_sqlite(self.pool.as_sqlite().unwrap(), org_id, params, status).await
            }
            DatabaseDriver::Mysql => {
                list_mysql(self.pool.as_mysql().unwrap(), org_id, params, status).await
            }
        }
    }

    async fn update(&self, project: &Project) -> Result<Project> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_sqlite(self.pool.as_sqlite().unwrap(), project).await,
            DatabaseDriver::Mysql => update_mysql(self.pool.as_mysql().unwrap(), project).await,
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

    async fn exists_by_code(&self, org_id: i64, code: &str) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                exists_by_code_sqlite(self.pool.as_sqlite().unwrap(), org_id, code).await
            }
            DatabaseDriver::Mysql => {
                exists_by_code_mysql(self.pool.as_mysql().unwrap(), org_id, code).await
            }
        }
    }

    async fn count(&self, org_id: i64, status: Option<ProjectStatus>) -> Result<i64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                count_sqlite(self.pool.as_sqlite().unwrap(), org_id, status).await
            }
            DatabaseDriver::Mysql => {
                count_mysql(self.pool.as_mysql().unwrap(), org_id, status).await
            }
        }
    }
}

const PROJECT_COLUMNS: &str = "id, org_id, code, name, description, status, contact_id, \
     start_date, due_date, created_at, updated_at";

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_sqlite(pool: &SqlitePool, project: &Project) -> Result<Project> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO projects (org_id, code, name, description, status, contact_id, start_date, due_date, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(project.org_id)
    .bind(&project.code)
    .bind(&project.name)
    .bind(&project.description)
    .bind(project.status.to_string())
    .bind(project.contact_id)
    .bind(project.start_date)
    .bind(project.due_date)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create project")?;

    let id = result.last_insert_rowid();
    get_by_id_sqlite(pool, project.org_id, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Project not found after insert"))
}

async fn get_by_id_sqlite(pool: &SqlitePool, org_id: i64, id: i64) -> Result<Option<Project>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM projects WHERE org_id = ? AND id = ?",
        PROJECT_COLUMNS
    ))
    .bind(org_id)
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get project by ID")?;

    match row {
        Some(row) => Ok(Some(row_to_project_sqlite(&row)?)),
        None => Ok(None),
    }
}

async fn get_by_code_sqlite(pool: &SqlitePool, org_id: i64, code: &str) -> Result<Option<Project>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM projects WHERE org_id = ? AND code = ?",
        PROJECT_COLUMNS
    ))
    .bind(org_id)
    .bind(code)
    .fetch_optional(pool)
    .await
    .context("Failed to get project by code")?;

    match row {
        Some(row) => Ok(Some(row_to_project_sqlite(&row)?)),
        None => Ok(None),
    }
}

async fn list_sqlite(
    pool: &SqlitePool,
    org_id: i64,
    params: &ListParams,
    status: Option<ProjectStatus>,
) -> Result<PagedResult<Project>> {
    let total = count_sqlite(pool, org_id, status).await?;

    let rows = match status {
        Some(status) => {
            sqlx::query(&format!(
                "SELECT {} FROM projects WHERE org_id = ? AND status = ? ORDER BY code LIMIT ? OFFSET ?",
                PROJECT_COLUMNS
            ))
            .bind(org_id)
            .bind(status.to_string())
            .bind(params.limit())
            .bind(params.offset())
            .fetch_all(pool)
            .await
        }
        None => {
            sqlx::query(&format!(
                "SELECT {} FROM projects WHERE org_id = ? ORDER BY code LIMIT ? OFFSET ?",
                PROJECT_COLUMNS
            ))
            .bind(org_id)
            .bind(params.limit())
            .bind(params.offset())
            .fetch_all(pool)
            .await
        }
    }
    .context("Failed to list projects")?;

    let mut projects = Vec::new();
    for row in rows {
        projects.push(row_to_project_sqlite(&row)?);
    }

    Ok(PagedResult::new(projects, total, params))
}

async fn update_sqlite(pool: &SqlitePool, project: &Project) -> Result<Project> {
    sqlx::query(
        r#"
        UPDATE projects
        SET name = ?, description = ?, status = ?, contact_id = ?, start_date = ?, due_date = ?, updated_at = ?
        WHERE org_id = ? AND id = ?
        "#,
    )
    .bind(&project.name)
    .bind(&project.description)
    .bind(project.status.to_string())
    .bind(project.contact_id)
    .bind(project.start_date)
    .bind(project.due_date)
    .bind(Utc::now())
    .bind(project.org_id)
    .bind(project.id)
    .execute(pool)
    .await
    .context("Failed to update project")?;

    get_by_id_sqlite(pool, project.org_id, project.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Project not found after update"))
}

async fn delete_sqlite(pool: &SqlitePool, org_id: i64, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM projects WHERE org_id = ? AND id = ?")
        .bind(org_id)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete project")?;

    Ok(())
}

async fn exists_by_code_sqlite(pool: &SqlitePool, org_id: i64, code: &str) -> Result<bool> {
    let row = sqlx::query("SELECT COUNT(*) as count FROM projects WHERE org_id = ? AND code = ?")
        .bind(org_id)
        .bind(code)
        .fetch_one(pool)
        .await
        .context("Failed to check project code existence")?;

    let count: i64 = row.get("count");
    Ok(count > 0)
}

async fn count_sqlite(
    pool: &SqlitePool,
    org_id: i64,
    status: Option<ProjectStatus>,
) -> Result<i64> {
    let row = match status {
        Some(status) => {
            sqlx::query("SELECT COUNT(*) as count FROM projects WHERE org_id = ? AND status = ?")
                .bind(org_id)
                .bind(status.to_string())
                .fetch_one(pool)
                .await
        }
        None => {
            sqlx::query("SELECT COUNT(*) as count FROM projects WHERE org_id = ?")
                .bind(org_id)
                .fetch_one(pool)
                .await
        }
    }
    .context("Failed to count projects")?;

    Ok(row.get("count"))
}

fn row_to_project_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Project> {
    let status: String = row.get("status");

    Ok(Project {
        id: row.get("id"),
        org_id: row.get("org_id"),
        code: row.get("code"),
        name: row.get("name"),
        description: row.get("description"),
        status: ProjectStatus::from_str(&status)?,
        contact_id: row.get("contact_id"),
        start_date: row.get("start_date"),
        due_date: row.get("due_date"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_mysql(pool: &MySqlPool, project: &Project) -> Result<Project> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO projects (org_id, code, name, description, status, contact_id, start_date, due_date, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(project.org_id)
    .bind(&project.code)
    .bind(&project.name)
    .bind(&project.description)
    .bind(project.status.to_string())
    .bind(project.contact_id)
    .bind(project.start_date)
    .bind(project.due_date)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create project")?;

    let id = result.last_insert_id() as i64;
    get_by_id_mysql(pool, project.org_id, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Project not found after insert"))
}

async fn get_by_id_mysql(pool: &MySqlPool, org_id: i64, id: i64) -> Result<Option<Project>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM projects WHERE org_id = ? AND id = ?",
        PROJECT_COLUMNS
    ))
    .bind(org_id)
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get project by ID")?;

    match row {
        Some(row) => Ok(Some(row_to_project_mysql(&row)?)),
        None => Ok(None),
    }
}

async fn get_by_code_mysql(pool: &MySqlPool, org_id: i64, code: &str) -> Result<Option<Project>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM projects WHERE org_id = ? AND code = ?",
        PROJECT_COLUMNS
    ))
    .bind(org_id)
    .bind(code)
    .fetch_optional(pool)
    .await
    .context("Failed to get project by code")?;

    match row {
        Some(row) => Ok(Some(row_to_project_mysql(&row)?)),
        None => Ok(None),
    }
}

async fn list_mysql(
    pool: &MySqlPool,
    org_id: i64,
    params: &ListParams,
    status: Option<ProjectStatus>,
) -> Result<PagedResult<Project>> {
    let total = count_mysql(pool, org_id, status).await?;

    let rows = match status {
        Some(status) => {
            sqlx::query(&format!(
                "SELECT {} FROM projects WHERE org_id = ? AND status = ? ORDER BY code LIMIT ? OFFSET ?",
                PROJECT_COLUMNS
            ))
            .bind(org_id)
            .bind(status.to_string())
            .bind(params.limit())
            .bind(params.offset())
            .fetch_all(pool)
            .await
        }
        None => {
            sqlx::query(&format!(
                "SELECT {} FROM projects WHERE org_id = ? ORDER BY code LIMIT ? OFFSET ?",
                PROJECT_COLUMNS
            ))
            .bind(org_id)
            .bind(params.limit())
            .bind(params.offset())
            .fetch_all(pool)
            .await
        }
    }
    .context("Failed to list projects")?;

    let mut projects = Vec::new();
    for row in rows {
        projects.push(row_to_project_mysql(&row)?);
    }

    Ok(PagedResult::new(projects, total, params))
}

async fn update_mysql(pool: &MySqlPool, project: &Project) -> Result<Project> {
    sqlx::query(
        r#"
        UPDATE projects
        SET name = ?, description = ?, status = ?, contact_id = ?, start_date = ?, due_date = ?, updated_at = ?
        WHERE org_id = ? AND id = ?
        "#,
    )
    .bind(&project.name)
    .bind(&project.description)
    .bind(project.status.to_string())
    .bind(project.contact_id)
    .bind(project.start_date)
    .bind(project.due_date)
    .bind(Utc::now())
    .bind(project.org_id)
    .bind(project.id)
    .execute(pool)
    .await
    .context("Failed to update project")?;

    get_by_id_mysql(pool, project.org_id, project.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Project not found after update"))
}

async fn delete_mysql(pool: &MySqlPool, org_id: i64, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM projects WHERE org_id = ? AND id = ?")
        .bind(org_id)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete project")?;

    Ok(())
}

async fn exists_by_code_mysql(pool: &MySqlPool, org_id: i64, code: &str) -> Result<bool> {
    let row = sqlx::query("SELECT COUNT(*) as count FROM projects WHERE org_id = ? AND code = ?")
        .bind(org_id)
        .bind(code)
        .fetch_one(pool)
        .await
        .context("Failed to check project code existence")?;

    let count: i64 = row.get("count");
    Ok(count > 0)
}

async fn count_mysql(pool: &MySqlPool, org_id: i64, status: Option<ProjectStatus>) -> Result<i64> {
    let row = match status {
        Some(status) => {
            sqlx::query("SELECT COUNT(*) as count FROM projects WHERE org_id = ? AND status = ?")
                .bind(org_id)
                .bind(status.to_string())
                .fetch_one(pool)
                .await
        }
        None => {
            sqlx::query("SELECT COUNT(*) as count FROM projects WHERE org_id = ?")
                .bind(org_id)
                .fetch_one(pool)
                .await
        }
    }
    .context("Failed to count projects")?;

    Ok(row.get("count"))
}

fn row_to_project_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Project> {
    let status: String = row.get("status");

    Ok(Project {
        id: row.get("id"),
        org_id: row.get("org_id"),
        code: row.get("code"),
        name: row.get("name"),
        description: row.get("description"),
        status: ProjectStatus::from_str(&status)?,
        contact_id: row.get("contact_id"),
        start_date: row.get("start_date"),
        due_date: row.get("due_date"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> SqlxProjectRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        pool.execute("INSERT INTO organizations (name, slug) VALUES ('Test Org', 'test-org')")
            .await
            .unwrap();
        SqlxProjectRepository::new(pool)
    }

    fn project(code: &str, name: &str) -> Project {
        Project::new(1, code.to_string(), name.to_string())
    }

    #[tokio::test]
    async fn test_create_and_get_project() {
        let repo = setup_test_repo().await;
        let created = repo
            .create(&project("PRJ-1", "Website relaunch"))
            .await
            .expect("Failed to create project");

        assert!(created.id > 0);
        assert_eq!(created.status, ProjectStatus::Planned);

        let by_code = repo.get_by_code(1, "PRJ-1").await.unwrap().unwrap();
        assert_eq!(by_code.id, created.id);
    }

    #[tokio::test]
    async fn test_duplicate_code_rejected_within_org() {
        let repo = setup_test_repo().await;
        repo.create(&project("PRJ-1", "First")).await.unwrap();

        assert!(repo.exists_by_code(1, "PRJ-1").await.unwrap());
        assert!(repo.create(&project("PRJ-1", "Second")).await.is_err());
    }

    #[tokio::test]
    async fn test_list_filters_by_status() {
        let repo = setup_test_repo().await;
        let mut active = repo.create(&project("PRJ-1", "Active one")).await.unwrap();
        active.status = ProjectStatus::Active;
        repo.update(&active).await.unwrap();
        repo.create(&project("PRJ-2", "Still planned")).await.unwrap();

        let result = repo
            .list(1, &ListParams::default(), Some(ProjectStatus::Active))
            .await
            .unwrap();
        assert_eq!(result.total, 1);
        assert_eq!(result.items[0].code, "PRJ-1");

        let all = repo.list(1, &ListParams::default(), None).await.unwrap();
        assert_eq!(all.total, 2);
    }

    #[tokio::test]
    async fn test_update_project_dates() {
        let repo = setup_test_repo().await;
        let mut created = repo.create(&project("PRJ-1", "Dated")).await.unwrap();

        created.start_date = chrono::NaiveDate::from_ymd_opt(2026, 1, 15);
        created.due_date = chrono::NaiveDate::from_ymd_opt(2026, 6, 30);
        let updated = repo.update(&created).await.unwrap();

        assert_eq!(updated.start_date, created.start_date);
        assert_eq!(updated.due_date, created.due_date);
    }

    #[tokio::test]
    async fn test_delete_project() {
        let repo = setup_test_repo().await;
        let created = repo.create(&project("PRJ-1", "Doomed")).await.unwrap();

        repo.delete(1, created.id).await.unwrap();
        assert!(repo.get_by_id(1, created.id).await.unwrap().is_none());
        assert_eq!(repo.count(1, None).await.unwrap(), 0);
    }
}
