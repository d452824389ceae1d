//! Contact repository
//!
//! Database operations for contacts, scoped by organization. Listing
//! supports kind filtering, name/company search, and hides archived
//! contacts unless asked for.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Contact, ContactKind, ListParams, PagedResult};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

/// Filter options for contact listings
#[derive(Debug, Clone, Default)]
pub struct ContactFilter {
    /// Restrict to one kind
    pub kind: Option<ContactKind>,
    /// Case-insensitive substring match on name/company/email
    pub search: Option<String>,
    /// Include archived contacts
    pub include_archived: bool,
}

/// Contact repository trait
#[async_trait]
pub trait ContactRepository: Send + Sync {
    /// Create a new contact
    async fn create(&self, contact: &Contact) -> Result<Contact>;

    /// Get a contact by ID within an organization
    async fn get_by_id(&self, org_id: i64, id: i64) -> Result<Option<Contact>>;

    /// List contacts with pagination and filtering
    async fn list(
        &self,
        org_id: i64,
        params: &ListParams,
        filter: &ContactFilter,
    ) -> Result<PagedResult<Contact>>;

    /// Update a contact
    async fn update(&self, contact: &Contact) -> Result<Contact>;

    /// Delete a contact
    async fn delete(&self, org_id: i64, id: i64) -> Result<()>;

    /// Count all contacts of an organization
    async fn count_by_org(&self, org_id: i64) -> Result<i64>;
}

/// SQLx-based contact repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxContactRepository {
    pool: DynDatabasePool,
}

impl SqlxContactRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ContactRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ContactRepository for SqlxContactRepository {
    async fn create(&self, contact: &Contact) -> Result<Contact> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_sqlite(self.pool.as_sqlite().unwrap(), contact).await,
            DatabaseDriver::Mysql => create_mysql(self.pool.as_mysql().unwrap(), contact).await,
        }
    }

    async fn get_by_id(&self, org_id: i64, id: i64) -> Result<Option<Contact>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_by_id_sqlite(self.pool.as_sqlite().unwrap(), org_id, id).await
            }
            DatabaseDriver::Mysql => {
                get_by_id_mysql(self.pool.as_mysql().unwrap(), org_id, id).await
            }
        }
    }

    async fn list(
        &self,
        org_id: i64,
        params: &ListParams,
        filter: &ContactFilter,
    ) -> Result<PagedResult<Contact>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_sqlite(self.pool.as_sqlite().unwrap(), org_id, params, filter).await
            }
            DatabaseDriver::Mysql => {
                list_mysql(self.pool.as_mysql().unwrap(), org_id, params, filter).await
            }
        }
    }

    async fn update(&self, contact: &Contact) -> Result<Contact> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_sqlite(self.pool.as_sqlite().unwrap(), contact).await,
            DatabaseDriver::Mysql => update_mysql(self.pool.as_mysql().unwrap(), contact).await,
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

const CONTACT_COLUMNS: &str =
    "id, org_id, name, kind, email, phone, company, notes, archived, created_at, updated_at";

/// Build the WHERE clause shared by list and its count query.
/// Returns the SQL fragment and the positional string binds in order.
fn build_filter_clause(filter: &ContactFilter) -> (String, Vec<String>) {
    let mut clause = String::from("org_id = ?");
    let mut binds = Vec::new();

    if !filter.include_archived {
        clause.push_str(" AND archived = 0");
    }
    if let Some(kind) = filter.kind {
        clause.push_str(" AND kind = ?");
        binds.push(kind.to_string());
    }
    if let Some(ref search) = filter.search {
        clause.push_str(" AND (LOWER(name) LIKE ? OR LOWER(company) LIKE ? OR LOWER(email) LIKE ?)");
        let pattern = format!("%{}%", search.to_lowercase());
        binds.push(pattern.clone());
        binds.push(pattern.clone());
        binds.push(pattern);
    }

    (clause, binds)
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_sqlite(pool: &SqlitePool, contact: &Contact) -> Result<Contact> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO contacts (org_id, name, kind, email, phone, company, notes, archived, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(contact.org_id)
    .bind(&contact.name)
    .bind(contact.kind.to_string())
    .bind(&contact.email)
    .bind(&contact.phone)
    .bind(&contact.company)
    .bind(&contact.notes)
    .bind(contact.archived)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create contact")?;

    let id = result.last_insert_rowid();
    get_by_id_sqlite(pool, contact.org_id, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Contact not found after insert"))
}

async fn get_by_id_sqlite(pool: &SqlitePool, org_id: i64, id: i64) -> Result<Option<Contact>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM contacts WHERE org_id = ? AND id = ?",
        CONTACT_COLUMNS
    ))
    .bind(org_id)
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get contact by ID")?;

    match row {
        Some(row) => Ok(Some(row_to_contact_sqlite(&row)?)),
        None => Ok(None),
    }
}

async fn list_sqlite(
    pool: &SqlitePool,
    org_id: i64,
    params: &ListParams,
    filter: &ContactFilter,
) -> Result<PagedResult<Contact>> {
    let (clause, binds) = build_filter_clause(filter);

    let count_sql = format!("SELECT COUNT(*) as count FROM contacts WHERE {}", clause);
    let mut count_query = sqlx::query(&count_sql).bind(org_id);
    for bind in &binds {
        count_query = count_query.bind(bind);
    }
    let total: i64 = count_query
        .fetch_one(pool)
        .await
        .context("Failed to count contacts")?
        .get("count");

    let sql = format!(
        "SELECT {} FROM contacts WHERE {} ORDER BY name LIMIT ? OFFSET ?",
        CONTACT_COLUMNS, clause
    );
    let mut query = sqlx::query(&sql).bind(org_id);
    for bind in &binds {
        query = query.bind(bind);
    }
    let rows = query
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list contacts")?;

    let mut contacts = Vec::new();
    for row in rows {
        contacts.push(row_to_contact_sqlite(&row)?);
    }

    Ok(PagedResult::new(contacts, total, params))
}

async fn update_sqlite(pool: &SqlitePool, contact: &Contact) -> Result<Contact> {
    sqlx::query(
        r#"
        UPDATE contacts
        SET name = ?, kind = ?, email = ?, phone = ?, company = ?, notes = ?, archived = ?, updated_at = ?
        WHERE org_id = ? AND id = ?
        "#,
    )
    .bind(&contact.name)
    .bind(contact.kind.to_string())
    .bind(&contact.email)
    .bind(&contact.phone)
    .bind(&contact.company)
    .bind(&contact.notes)
    .bind(contact.archived)
    .bind(Utc::now())
    .bind(contact.org_id)
    .bind(contact.id)
    .execute(pool)
    .await
    .context("Failed to update contact")?;

    get_by_id_sqlite(pool, contact.org_id, contact.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Contact not found after update"))
}

async fn delete_sqlite(pool: &SqlitePool, org_id: i64, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM contacts WHERE org_id = ? AND id = ?")
        .bind(org_id)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete contact")?;

    Ok(())
}

async fn count_by_org_sqlite(pool: &SqlitePool, org_id: i64) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) as count FROM contacts WHERE org_id = ?")
        .bind(org_id)
        .fetch_one(pool)
        .await
        .context("Failed to count contacts")?;

    Ok(row.get("count"))
}

fn row_to_contact_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Contact> {
    let kind: String = row.get("kind");

    Ok(Contact {
        id: row.get("id"),
        org_id: row.get("org_id"),
        name: row.get("name"),
        kind: ContactKind::from_str(&kind)?,
        email: row.get("email"),
        phone: row.get("phone"),
        company: row.get("company"),
        notes: row.get("notes"),
        archived: row.get("archived"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_mysql(pool: &MySqlPool, contact: &Contact) -> Result<Contact> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO contacts (org_id, name, kind, email, phone, company, notes, archived, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(contact.org_id)
    .bind(&contact.name)
    .bind(contact.kind.to_string())
    .bind(&contact.email)
    .bind(&contact.phone)
    .bind(&contact.company)
    .bind(&contact.notes)
    .bind(contact.archived)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create contact")?;

    let id = result.last_insert_id() as i64;
    get_by_id_mysql(pool, contact.org_id, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Contact not found after insert"))
}

async fn get_by_id_mysql(pool: &MySqlPool, org_id: i64, id: i64) -> Result<Option<Contact>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM contacts WHERE org_id = ? AND id = ?",
        CONTACT_COLUMNS
    ))
    .bind(org_id)
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get contact by ID")?;

    match row {
        Some(row) => Ok(Some(row_to_contact_mysql(&row)?)),
        None => Ok(None),
    }
}

async fn list_mysql(
    pool: &MySqlPool,
    org_id: i64,
    params: &ListParams,
    filter: &ContactFilter,
) -> Result<PagedResult<Contact>> {
    let (clause, binds) = build_filter_clause(filter);

    let count_sql = format!("SELECT COUNT(*) as count FROM contacts WHERE {}", clause);
    let mut count_query = sqlx::query(&count_sql).bind(org_id);
    for bind in &binds {
        count_query = count_query.bind(bind);
    }
    let total: i64 = count_query
        .fetch_one(pool)
        .await
        .context("Failed to count contacts")?
        .get("count");

    let sql = format!(
        "SELECT {} FROM contacts WHERE {} ORDER BY name LIMIT ? OFFSET ?",
        CONTACT_COLUMNS, clause
    );
    let mut query = sqlx::query(&sql).bind(org_id);
    for bind in &binds {
        query = query.bind(bind);
    }
    let rows = query
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list contacts")?;

    let mut contacts = Vec::new();
    for row in rows {
        contacts.push(row_to_contact_mysql(&row)?);
    }

    Ok(PagedResult::new(contacts, total, params))
}

async fn update_mysql(pool: &MySqlPool, contact: &Contact) -> Result<Contact> {
    sqlx::query(
        r#"
        UPDATE contacts
        SET name = ?, kind = ?, email = ?, phone = ?, company = ?, notes = ?, archived = ?, updated_at = ?
        WHERE org_id = ? AND id = ?
        "#,
    )
    .bind(&contact.name)
    .bind(contact.kind.to_string())
    .bind(&contact.email)
    .bind(&contact.phone)
    .bind(&contact.company)
    .bind(&contact.notes)
    .bind(contact.archived)
    .bind(Utc::now())
    .bind(contact.org_id)
    .bind(contact.id)
    .execute(pool)
    .await
    .context("Failed to update contact")?;

    get_by_id_mysql(pool, contact.org_id, contact.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Contact not found after update"))
}

async fn delete_mysql(pool: &MySqlPool, org_id: i64, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM contacts WHERE org_id = ? AND id = ?")
        .bind(org_id)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete contact")?;

    Ok(())
}

async fn count_by_org_mysql(pool: &MySqlPool, org_id: i64) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) as count FROM contacts WHERE org_id = ?")
        .bind(org_id)
        .fetch_one(pool)
        .await
        .context("Failed to count contacts")?;

    Ok(row.get("count"))
}

fn row_to_contact_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Contact> {
    let kind: String = row.get("kind");

    Ok(Contact {
        id: row.get("id"),
        org_id: row.get("org_id"),
        name: row.get("name"),
        kind: ContactKind::from_str(&kind)?,
        email: row.get("email"),
        phone: row.get("phone"),
        company: row.get("company"),
        notes: row.get("notes"),
        archived: row.get("archived"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> SqlxContactRepository {
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
        SqlxContactRepository::new(pool)
    }

    fn contact(org_id: i64, name: &str, kind: ContactKind) -> Contact {
        let mut c = Contact::new(org_id, name.to_string(), kind);
        c.company = Some(format!("{} Ltd", name));
        c
    }

    #[tokio::test]
    async fn test_create_and_get_contact() {
        let repo = setup_test_repo().await;
        let created = repo
            .create(&contact(1, "Globex", ContactKind::Customer))
            .await
            .expect("Failed to create contact");

        assert!(created.id > 0);
        assert_eq!(created.kind, ContactKind::Customer);
        assert!(!created.archived);

        let found = repo.get_by_id(1, created.id).await.unwrap().unwrap();
        assert_eq!(found.name, "Globex");
    }

    #[tokio::test]
    async fn test_get_is_org_scoped() {
        let repo = setup_test_repo().await;
        let created = repo
            .create(&contact(1, "Initech", ContactKind::Vendor))
            .await
            .unwrap();

        // The same id from another organization looks like a miss
        assert!(repo.get_by_id(2, created.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_filters_by_kind() {
        let repo = setup_test_repo().await;
        repo.create(&contact(1, "A", ContactKind::Customer)).await.unwrap();
        repo.create(&contact(1, "B", ContactKind::Vendor)).await.unwrap();
        repo.create(&contact(1, "C", ContactKind::Vendor)).await.unwrap();

        let filter = ContactFilter {
            kind: Some(ContactKind::Vendor),
            ..Default::default()
        };
        let result = repo
            .list(1, &ListParams::default(), &filter)
            .await
            .expect("Failed to list");

        assert_eq!(result.total, 2);
        assert!(result.items.iter().all(|c| c.kind == ContactKind::Vendor));
    }

    #[tokio::test]
    async fn test_list_hides_archived_by_default() {
        let repo = setup_test_repo().await;
        let mut archived = repo
            .create(&contact(1, "Old", ContactKind::Lead))
            .await
            .unwrap();
        archived.archived = true;
        repo.update(&archived).await.unwrap();
        repo.create(&contact(1, "New", ContactKind::Lead)).await.unwrap();

        let visible = repo
            .list(1, &ListParams::default(), &ContactFilter::default())
            .await
            .unwrap();
        assert_eq!(visible.total, 1);
        assert_eq!(visible.items[0].name, "New");

        let all = repo
            .list(
                1,
                &ListParams::default(),
                &ContactFilter {
                    include_archived: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(all.total, 2);
    }

    #[tokio::test]
    async fn test_list_search_matches_company() {
        let repo = setup_test_repo().await;
        repo.create(&contact(1, "Alpha", ContactKind::Customer)).await.unwrap();
        repo.create(&contact(1, "Beta", ContactKind::Customer)).await.unwrap();

        let filter = ContactFilter {
            search: Some("alpha".to_string()),
            ..Default::default()
        };
        let result = repo.list(1, &ListParams::default(), &filter).await.unwrap();

        assert_eq!(result.total, 1);
        assert_eq!(result.items[0].name, "Alpha");
    }

    #[tokio::test]
    async fn test_list_pagination() {
        let repo = setup_test_repo().await;
        for i in 0..5 {
            repo.create(&contact(1, &format!("Contact {}", i), ContactKind::Customer))
                .await
                .unwrap();
        }

        let page = repo
            .list(1, &ListParams::new(2, 2), &ContactFilter::default())
            .await
            .unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total_pages(), 3);
    }

    #[tokio::test]
    async fn test_delete_contact() {
        let repo = setup_test_repo().await;
        let created = repo
            .create(&contact(1, "Gone", ContactKind::Lead))
            .await
            .unwrap();

        repo.delete(1, created.id).await.unwrap();
        assert!(repo.get_by_id(1, created.id).await.unwrap().is_none());
    }
}
