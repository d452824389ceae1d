//! Organization repository
//!
//! Database operations for organizations (tenants).

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::Organization;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Organization repository trait
#[async_trait]
pub trait OrganizationRepository: Send + Sync {
    /// Create a new organization
    async fn create(&self, org: &Organization) -> Result<Organization>;

    /// Get organization by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Organization>>;

    /// Get organization by slug
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Organization>>;

    /// Check if a slug is already taken
    async fn exists_by_slug(&self, slug: &str) -> Result<bool>;

    /// Update name and currency code
    async fn update(&self, org: &Organization) -> Result<Organization>;
}

/// SQLx-based organization repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxOrganizationRepository {
    pool: DynDatabasePool,
}

impl SqlxOrganizationRepository {
    /// Create a new SQLx organization repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn OrganizationRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl OrganizationRepository for SqlxOrganizationRepository {
    async fn create(&self, org: &Organization) -> Result<Organization> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_sqlite(self.pool.as_sqlite().unwrap(), org).await,
            DatabaseDriver::Mysql => create_mysql(self.pool.as_mysql().unwrap(), org).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Organization>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_by_id_sqlite(self.pool.as_sqlite().unwrap(), id).await,
            DatabaseDriver::Mysql => get_by_id_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Organization>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_by_slug_sqlite(self.pool.as_sqlite().unwrap(), slug).await
            }
            DatabaseDriver::Mysql => get_by_slug_mysql(self.pool.as_mysql().unwrap(), slug).await,
        }
    }

    async fn exists_by_slug(&self, slug: &str) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                exists_by_slug_sqlite(self.pool.as_sqlite().unwrap(), slug).await
            }
            DatabaseDriver::Mysql => {
                exists_by_slug_mysql(self.pool.as_mysql().unwrap(), slug).await
            }
        }
    }

    async fn update(&self, org: &Organization) -> Result<Organization> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_sqlite(self.pool.as_sqlite().unwrap(), org).await,
            DatabaseDriver::Mysql => update_mysql(self.pool.as_mysql().unwrap(), org).await,
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_sqlite(pool: &SqlitePool, org: &Organization) -> Result<Organization> {
    let now = Utc::now();

    let result = sqlx::query(
        "INSERT INTO organizations (name, slug, currency_code, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(&org.name)
    .bind(&org.slug)
    .bind(&org.currency_code)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create organization")?;

    Ok(Organization {
        id: result.last_insert_rowid(),
        name: org.name.clone(),
        slug: org.slug.clone(),
        currency_code: org.currency_code.clone(),
        created_at: now,
    })
}

async fn get_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Organization>> {
    let row = sqlx::query(
        "SELECT id, name, slug, currency_code, created_at FROM organizations WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get organization by ID")?;

    match row {
        Some(row) => Ok(Some(row_to_org_sqlite(&row)?)),
        None => Ok(None),
    }
}

async fn get_by_slug_sqlite(pool: &SqlitePool, slug: &str) -> Result<Option<Organization>> {
    let row = sqlx::query(
        "SELECT id, name, slug, currency_code, created_at FROM organizations WHERE slug = ?",
    )
    .bind(slug)
    .fetch_optional(pool)
    .await
    .context("Failed to get organization by slug")?;

    match row {
        Some(row) => Ok(Some(row_to_org_sqlite(&row)?)),
        None => Ok(None),
    }
}

async fn exists_by_slug_sqlite(pool: &SqlitePool, slug: &str) -> Result<bool> {
    let row = sqlx::query("SELECT COUNT(*) as count FROM organizations WHERE slug = ?")
        .bind(slug)
        .fetch_one(pool)
        .await
        .context("Failed to check organization slug existence")?;

    let count: i64 = row.get("count");
    Ok(count > 0)
}

async fn update_sqlite(pool: &SqlitePool, org: &Organization) -> Result<Organization> {
    sqlx::query("UPDATE organizations SET name = ?, currency_code = ? WHERE id = ?")
        .bind(&org.name)
        .bind(&org.currency_code)
        .bind(org.id)
        .execute(pool)
        .await
        .context("Failed to update organization")?;

    get_by_id_sqlite(pool, org.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Organization not found after update"))
}

fn row_to_org_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Organization> {
    Ok(Organization {
        id: row.get("id"),
        name: row.get("name"),
        slug: row.get("slug"),
        currency_code: row.get("currency_code"),
        created_at: row.get("created_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_mysql(pool: &MySqlPool, org: &Organization) -> Result<Organization> {
    let now = Utc::now();

    let result = sqlx::query(
        "INSERT INTO organizations (name, slug, currency_code, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(&org.name)
    .bind(&org.slug)
    .bind(&org.currency_code)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create organization")?;

    Ok(Organization {
        id: result.last_insert_id() as i64,
        name: org.name.clone(),
        slug: org.slug.clone(),
        currency_code: org.currency_code.clone(),
        created_at: now,
    })
}

async fn get_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Organization>> {
    let row = sqlx::query(
        "SELECT id, name, slug, currency_code, created_at FROM organizations WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get organization by ID")?;

    match row {
        Some(row) => Ok(Some(row_to_org_mysql(&row)?)),
        None => Ok(None),
    }
}

async fn get_by_slug_mysql(pool: &MySqlPool, slug: &str) -> Result<Option<Organization>> {
    let row = sqlx::query(
        "SELECT id, name, slug, currency_code, created_at FROM organizations WHERE slug = ?",
    )
    .bind(slug)
    .fetch_optional(pool)
    .await
    .context("Failed to get organization by slug")?;

    match row {
        Some(row) => Ok(Some(row_to_org_mysql(&row)?)),
        None => Ok(None),
    }
}

async fn exists_by_slug_mysql(pool: &MySqlPool, slug: &str) -> Result<bool> {
    let row = sqlx::query("SELECT COUNT(*) as count FROM organizations WHERE slug = ?")
        .bind(slug)
        .fetch_one(pool)
        .await
        .context("Failed to check organization slug existence")?;

    let count: i64 = row.get("count");
    Ok(count > 0)
}

async fn update_mysql(pool: &MySqlPool, org: &Organization) -> Result<Organization> {
    sqlx::query("UPDATE organizations SET name = ?, currency_code = ? WHERE id = ?")
        .bind(&org.name)
        .bind(&org.currency_code)
        .bind(org.id)
        .execute(pool)
        .await
        .context("Failed to update organization")?;

    get_by_id_mysql(pool, org.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Organization not found after update"))
}

fn row_to_org_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Organization> {
    Ok(Organization {
        id: row.get("id"),
        name: row.get("name"),
        slug: row.get("slug"),
        currency_code: row.get("currency_code"),
        created_at: row.get("created_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> SqlxOrganizationRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxOrganizationRepository::new(pool)
    }

    #[tokio::test]
    async fn test_create_and_get_organization() {
        let repo = setup_test_repo().await;
        let org = Organization::new("Acme Corp".into(), "acme".into(), "USD".into());

        let created = repo.create(&org).await.expect("Failed to create org");
        assert!(created.id > 0);

        let found = repo
            .get_by_slug("acme")
            .await
            .expect("Failed to get org")
            .expect("Org not found");
        assert_eq!(found.name, "Acme Corp");
        assert_eq!(found.currency_code, "USD");
    }

    #[tokio::test]
    async fn test_duplicate_slug_rejected() {
        let repo = setup_test_repo().await;
        let org = Organization::new("One".into(), "same".into(), "USD".into());
        repo.create(&org).await.expect("Failed to create org");

        assert!(repo.exists_by_slug("same").await.unwrap());

        let dup = Organization::new("Two".into(), "same".into(), "EUR".into());
        assert!(repo.create(&dup).await.is_err());
    }

    #[tokio::test]
    async fn test_update_organization() {
        let repo = setup_test_repo().await;
        let org = Organization::new("Before".into(), "org".into(), "USD".into());
        let mut created = repo.create(&org).await.expect("Failed to create org");

        created.name = "After".into();
        created.currency_code = "EUR".into();
        let updated = repo.update(&created).await.expect("Failed to update org");

        assert_eq!(updated.name, "After");
        assert_eq!(updated.currency_code, "EUR");
    }
}
