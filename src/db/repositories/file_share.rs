//! Shared file repository
//!
//! Metadata records for uploaded files. The bytes live on disk; deleting the
//! record is the caller's cue to unlink the stored file.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{FileShare, ListParams, PagedResult};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// File share repository trait
#[async_trait]
pub trait FileShareRepository: Send + Sync {
    /// Record an uploaded file
    async fn create(&self, file: &FileShare) -> Result<FileShare>;

    /// Get a file record by ID within an organization
    async fn get_by_id(&self, org_id: i64, id: i64) -> Result<Option<FileShare>>;

    /// List files of an organization, newest first
    async fn list(&self, org_id: i64, params: &ListParams) -> Result<PagedResult<FileShare>>;

    /// Delete a file record
    async fn delete(&self, org_id: i64, id: i64) -> Result<()>;

    /// Count files of an organization
    async fn count_by_org(&self, org_id: i64) -> Result<i64>;
}

/// SQLx-based file share repository implementation
pub struct SqlxFileShareRepository {
    pool: DynDatabasePool,
}

impl SqlxFileShareRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn FileShareRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl FileShareRepository for SqlxFileShareRepository {
    async fn create(&self, file: &FileShare) -> Result<FileShare> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_sqlite(self.pool.as_sqlite().unwrap(), file).await,
            DatabaseDriver::Mysql => create_mysql(self.pool.as_mysql().unwrap(), file).await,
        }
    }

    async fn get_by_id(&self, org_id: i64, id: i64) -> Result<Option<FileShare>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_by_id_sqlite(self.pool.as_sqlite().unwrap(), org_id, id).await
            }
            DatabaseDriver::Mysql => {
                get_by_id_mysql(self.pool.as_mysql().unwrap(), org_id, id).await
            }
        }
    }

    async fn list(&self, org_id: i64, params: &ListParams) -> Result<PagedResult<FileShare>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_sqlite(self.pool.as_sqlite().unwrap(), org_id, params).await
            }
            DatabaseDriver::Mysql => {
                list_mysql(self.pool.as_mysql().unwrap(), org_id, params).await
            }
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
}

const FILE_COLUMNS: &str =
    "id, org_id, filename, stored_name, content_type, size_bytes, uploaded_by, created_at";

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_sqlite(pool: &SqlitePool, file: &FileShare) -> Result<FileShare> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO file_shares (org_id, filename, stored_name, content_type, size_bytes, uploaded_by, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(file.org_id)
    .bind(&file.filename)
    .bind(&file.stored_name)
    .bind(&file.content_type)
    .bind(file.size_bytes)
    .bind(file.uploaded_by)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create file record")?;

    let id = result.last_insert_rowid();
    get_by_id_sqlite(pool, file.org_id, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("File record not found after insert"))
}

async fn get_by_id_sqlite(pool: &SqlitePool, org_id: i64, id: i64) -> Result<Option<FileShare>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM file_shares WHERE org_id = ? AND id = ?",
        FILE_COLUMNS
    ))
    .bind(org_id)
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get file record")?;

    Ok(row.map(|row| row_to_file_sqlite(&row)))
}

async fn list_sqlite(
    pool: &SqlitePool,
    org_id: i64,
    params: &ListParams,
) -> Result<PagedResult<FileShare>> {
    let total: i64 = sqlx::query("SELECT COUNT(*) as count FROM file_shares WHERE org_id = ?")
        .bind(org_id)
        .fetch_one(pool)
        .await
        .context("Failed to count files")?
        .get("count");

    let rows = sqlx::query(&format!(
        "SELECT {} FROM file_shares WHERE org_id = ? ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        FILE_COLUMNS
    ))
    .bind(org_id)
    .bind(params.limit())
    .bind(params.offset())
    .fetch_all(pool)
    .await
    .context("Failed to list files")?;

    let files = rows.iter().map(row_to_file_sqlite).collect();
    Ok(PagedResult::new(files, total, params))
}

async fn delete_sqlite(pool: &SqlitePool, org_id: i64, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM file_shares WHERE org_id = ? AND id = ?")
        .bind(org_id)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete file record")?;

    Ok(())
}

async fn count_by_org_sqlite(pool: &SqlitePool, org_id: i64) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) as count FROM file_shares WHERE org_id = ?")
        .bind(org_id)
        .fetch_one(pool)
        .await
        .context("Failed to count files")?;

    Ok(row.get("count"))
}

fn row_to_file_sqlite(row: &sqlx::sqlite::SqliteRow) -> FileShare {
    FileShare {
        id: row.get("id"),
        org_id: row.get("org_id"),
        filename: row.get("filename"),
        stored_name: row.get("stored_name"),
        content_type: row.get("content_type"),
        size_bytes: row.get("size_bytes"),
        uploaded_by: row.get("uploaded_by"),
        created_at: row.get("created_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_mysql(pool: &MySqlPool, file: &FileShare) -> Result<FileShare> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO file_shares (org_id, filename, stored_name, content_type, size_bytes, uploaded_by, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(file.org_id)
    .bind(&file.filename)
    .bind(&file.stored_name)
    .bind(&file.content_type)
    .bind(file.size_bytes)
    .bind(file.uploaded_by)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create file record")?;

    let id = result.last_insert_id() as i64;
    get_by_id_mysql(pool, file.org_id, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("File record not found after insert"))
}

async fn get_by_id_mysql(pool: &MySqlPool, org_id: i64, id: i64) -> Result<Option<FileShare>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM file_shares WHERE org_id = ? AND id = ?",
        FILE_COLUMNS
    ))
    .bind(org_id)
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get file record")?;

    Ok(row.map(|row| row_to_file_mysql(&row)))
}

async fn list_mysql(
    pool: &MySqlPool,
    org_id: i64,
    params: &ListParams,
) -> Result<PagedResult<FileShare>> {
    let total: i64 = sqlx::query("SELECT COUNT(*) as count FROM file_shares WHERE org_id = ?")
        .bind(org_id)
        .fetch_one(pool)
        .await
        .context("Failed to count files")?
        .get("count");

    let rows = sqlx::query(&format!(
        "SELECT {} FROM file_shares WHERE org_id = ? ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        FILE_COLUMNS
    ))
    .bind(org_id)
    .bind(params.limit())
    .bind(params.offset())
    .fetch_all(pool)
    .await
    .context("Failed to list files")?;

    let files = rows.iter().map(row_to_file_mysql).collect();
    Ok(PagedResult::new(files, total, params))
}

async fn delete_mysql(pool: &MySqlPool, org_id: i64, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM file_shares WHERE org_id = ? AND id = ?")
        .bind(org_id)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete file record")?;

    Ok(())
}

async fn count_by_org_mysql(pool: &MySqlPool, org_id: i64) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) as count FROM file_shares WHERE org_id = ?")
        .bind(org_id)
        .fetch_one(pool)
        .await
        .context("Failed to count files")?;

    Ok(row.get("count"))
}

fn row_to_file_mysql(row: &sqlx::mysql::MySqlRow) -> FileShare {
    FileShare {
        id: row.get("id"),
        org_id: row.get("org_id"),
        filename: row.get("filename"),
        stored_name: row.get("stored_name"),
        content_type: row.get("content_type"),
        size_bytes: row.get("size_bytes"),
        uploaded_by: row.get("uploaded_by"),
        created_at: row.get("created_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> SqlxFileShareRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        pool.execute("INSERT INTO organizations (name, slug) VALUES ('Test Org', 'test-org')")
            .await
            .unwrap();
        pool.execute(
            "INSERT INTO users (org_id, username, email, password_hash, role) \
             VALUES (1, 'alice', 'alice@test', 'x', 'admin')",
        )
        .await
        .unwrap();
        SqlxFileShareRepository::new(pool)
    }

    fn file(name: &str, stored: &str) -> FileShare {
        FileShare {
            id: 0,
            org_id: 1,
            filename: name.to_string(),
            stored_name: stored.to_string(),
            content_type: "application/pdf".to_string(),
            size_bytes: 1024,
            uploaded_by: 1,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_list_delete() {
        let repo = setup_test_repo().await;
        let created = repo.create(&file("report.pdf", "abc123.pdf")).await.unwrap();
        assert!(created.id > 0);

        let listed = repo.list(1, &ListParams::default()).await.unwrap();
        assert_eq!(listed.total, 1);
        assert_eq!(listed.items[0].filename, "report.pdf");

        repo.delete(1, created.id).await.unwrap();
        assert_eq!(repo.count_by_org(1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_stored_name_must_be_unique() {
        let repo = setup_test_repo().await;
        repo.create(&file("a.pdf", "same.pdf")).await.unwrap();
        assert!(repo.create(&file("b.pdf", "same.pdf")).await.is_err());
    }
}
