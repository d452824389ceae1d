//! Database migrations module
//!
//! This module provides code-based database migrations for the Atrium ERP
//! system. All migrations are embedded directly in Rust code as SQL strings,
//! supporting both SQLite and MySQL databases for single-binary deployment.
//!
//! # Architecture
//!
//! Each migration is defined as a `Migration` struct containing:
//! - `version`: Unique version number for ordering
//! - `name`: Human-readable migration name
//! - `up_sqlite`: SQL for SQLite database
//! - `up_mysql`: SQL for MySQL database
//!
//! Applied versions are recorded in the `_migrations` table so reruns are
//! no-ops.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};

use super::DynDatabasePool;
use crate::config::DatabaseDriver;

/// A database migration with SQL for both SQLite and MySQL
#[derive(Debug, Clone)]
pub struct Migration {
    /// Migration version number (must be unique and sequential)
    pub version: i32,
    /// Human-readable migration name
    pub name: &'static str,
    /// SQL statements for SQLite
    pub up_sqlite: &'static str,
    /// SQL statements for MySQL
    pub up_mysql: &'static str,
}

/// Migration record stored in the database
#[derive(Debug, Clone)]
pub struct MigrationRecord {
    /// Migration version number
    pub version: i64,
    /// Migration name/description
    pub name: String,
    /// When the migration was applied
    pub applied_at: DateTime<Utc>,
}

/// All migrations for the Atrium ERP system.
/// These are embedded in the binary for single-binary deployment.
pub const MIGRATIONS: &[Migration] = &[
    // Migration 1: organizations, users, and sessions
    Migration {
        version: 1,
        name: "create_orgs_users_sessions",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS organizations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name VARCHAR(200) NOT NULL,
                slug VARCHAR(100) NOT NULL UNIQUE,
                currency_code VARCHAR(3) NOT NULL DEFAULT 'USD',
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                org_id INTEGER NOT NULL,
                username VARCHAR(50) NOT NULL UNIQUE,
                email VARCHAR(255) NOT NULL UNIQUE,
                password_hash VARCHAR(255) NOT NULL,
                role VARCHAR(20) NOT NULL DEFAULT 'member',
                status VARCHAR(20) NOT NULL DEFAULT 'active',
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (org_id) REFERENCES organizations(id)
            );
            CREATE INDEX IF NOT EXISTS idx_users_org_id ON users(org_id);
            CREATE INDEX IF NOT EXISTS idx_users_username ON users(username);
            CREATE INDEX IF NOT EXISTS idx_users_email ON users(email);
            CREATE TABLE IF NOT EXISTS sessions (
                id VARCHAR(64) PRIMARY KEY,
                user_id INTEGER NOT NULL,
                expires_at TIMESTAMP NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_user_id ON sessions(user_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_expires_at ON sessions(expires_at);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS organizations (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                name VARCHAR(200) NOT NULL,
                slug VARCHAR(100) NOT NULL UNIQUE,
                currency_code VARCHAR(3) NOT NULL DEFAULT 'USD',
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS users (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                org_id BIGINT NOT NULL,
                username VARCHAR(50) NOT NULL UNIQUE,
                email VARCHAR(255) NOT NULL UNIQUE,
                password_hash VARCHAR(255) NOT NULL,
                role VARCHAR(20) NOT NULL DEFAULT 'member',
                status VARCHAR(20) NOT NULL DEFAULT 'active',
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
                FOREIGN KEY (org_id) REFERENCES organizations(id)
            );
            CREATE INDEX idx_users_org_id ON users(org_id);
            CREATE INDEX idx_users_username ON users(username);
            CREATE INDEX idx_users_email ON users(email);
            CREATE TABLE IF NOT EXISTS sessions (
                id VARCHAR(64) PRIMARY KEY,
                user_id BIGINT NOT NULL,
                expires_at TIMESTAMP NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_sessions_user_id ON sessions(user_id);
            CREATE INDEX idx_sessions_expires_at ON sessions(expires_at);
        "#,
    },
    // Migration 2: contacts
    Migration {
        version: 2,
        name: "create_contacts",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS contacts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                org_id INTEGER NOT NULL,
                name VARCHAR(200) NOT NULL,
                kind VARCHAR(20) NOT NULL DEFAULT 'customer',
                email VARCHAR(255),
                phone VARCHAR(50),
                company VARCHAR(200),
                notes TEXT,
                archived INTEGER NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (org_id) REFERENCES organizations(id)
            );
            CREATE INDEX IF NOT EXISTS idx_contacts_org_id ON contacts(org_id);
            CREATE INDEX IF NOT EXISTS idx_contacts_kind ON contacts(kind);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS contacts (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                org_id BIGINT NOT NULL,
                name VARCHAR(200) NOT NULL,
                kind VARCHAR(20) NOT NULL DEFAULT 'customer',
                email VARCHAR(255),
                phone VARCHAR(50),
                company VARCHAR(200),
                notes TEXT,
                archived TINYINT NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
                FOREIGN KEY (org_id) REFERENCES organizations(id)
            );
            CREATE INDEX idx_contacts_org_id ON contacts(org_id);
            CREATE INDEX idx_contacts_kind ON contacts(kind);
        "#,
    },
    // Migration 3: projects and tasks
    Migration {
        version: 3,
        name: "create_projects_tasks",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS projects (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                org_id INTEGER NOT NULL,
                code VARCHAR(20) NOT NULL,
                name VARCHAR(200) NOT NULL,
                description TEXT,
                status VARCHAR(20) NOT NULL DEFAULT 'planned',
                contact_id INTEGER,
                start_date DATE,
                due_date DATE,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (org_id) REFERENCES organizations(id),
                FOREIGN KEY (contact_id) REFERENCES contacts(id),
                UNIQUE (org_id, code)
            );
            CREATE INDEX IF NOT EXISTS idx_projects_org_id ON projects(org_id);
            CREATE INDEX IF NOT EXISTS idx_projects_status ON projects(status);
            CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                org_id INTEGER NOT NULL,
                project_id INTEGER NOT NULL,
                title VARCHAR(300) NOT NULL,
                description TEXT,
                status VARCHAR(20) NOT NULL DEFAULT 'todo',
                priority VARCHAR(20) NOT NULL DEFAULT 'normal',
                assignee_id INTEGER,
                due_date DATE,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (org_id) REFERENCES organizations(id),
                FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE,
                FOREIGN KEY (assignee_id) REFERENCES users(id)
            );
            CREATE INDEX IF NOT EXISTS idx_tasks_project_id ON tasks(project_id);
            CREATE INDEX IF NOT EXISTS idx_tasks_assignee_id ON tasks(assignee_id);
            CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS projects (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                org_id BIGINT NOT NULL,
                code VARCHAR(20) NOT NULL,
                name VARCHAR(200) NOT NULL,
                description TEXT,
                status VARCHAR(20) NOT NULL DEFAULT 'planned',
                contact_id BIGINT,
                start_date DATE,
                due_date DATE,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
                FOREIGN KEY (org_id) REFERENCES organizations(id),
                FOREIGN KEY (contact_id) REFERENCES contacts(id),
                UNIQUE KEY uq_projects_org_code (org_id, code)
            );
            CREATE INDEX idx_projects_org_id ON projects(org_id);
            CREATE INDEX idx_projects_status ON projects(status);
            CREATE TABLE IF NOT EXISTS tasks (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                org_id BIGINT NOT NULL,
                project_id BIGINT NOT NULL,
                title VARCHAR(300) NOT NULL,
                description TEXT,
                status VARCHAR(20) NOT NULL DEFAULT 'todo',
                priority VARCHAR(20) NOT NULL DEFAULT 'normal',
                assignee_id BIGINT,
                due_date DATE,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
                FOREIGN KEY (org_id) REFERENCES organizations(id),
                FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE,
                FOREIGN KEY (assignee_id) REFERENCES users(id)
            );
            CREATE INDEX idx_tasks_project_id ON tasks(project_id);
            CREATE INDEX idx_tasks_assignee_id ON tasks(assignee_id);
            CREATE INDEX idx_tasks_status ON tasks(status);
        "#,
    },
    // Migration 4: chart of accounts and accounting periods
    Migration {
        version: 4,
        name: "create_accounts_periods",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS accounts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                org_id INTEGER NOT NULL,
                code VARCHAR(20) NOT NULL,
                name VARCHAR(200) NOT NULL,
                account_type VARCHAR(20) NOT NULL,
                active INTEGER NOT NULL DEFAULT 1,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (org_id) REFERENCES organizations(id),
                UNIQUE (org_id, code)
            );
            CREATE INDEX IF NOT EXISTS idx_accounts_org_id ON accounts(org_id);
            CREATE TABLE IF NOT EXISTS accounting_periods (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                org_id INTEGER NOT NULL,
                name VARCHAR(100) NOT NULL,
                start_date DATE NOT NULL,
                end_date DATE NOT NULL,
                locked INTEGER NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (org_id) REFERENCES organizations(id)
            );
            CREATE INDEX IF NOT EXISTS idx_periods_org_id ON accounting_periods(org_id);
            CREATE INDEX IF NOT EXISTS idx_periods_dates ON accounting_periods(start_date, end_date);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS accounts (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                org_id BIGINT NOT NULL,
                code VARCHAR(20) NOT NULL,
                name VARCHAR(200) NOT NULL,
                account_type VARCHAR(20) NOT NULL,
                active TINYINT NOT NULL DEFAULT 1,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (org_id) REFERENCES organizations(id),
                UNIQUE KEY uq_accounts_org_code (org_id, code)
            );
            CREATE INDEX idx_accounts_org_id ON accounts(org_id);
            CREATE TABLE IF NOT EXISTS accounting_periods (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                org_id BIGINT NOT NULL,
                name VARCHAR(100) NOT NULL,
                start_date DATE NOT NULL,
                end_date DATE NOT NULL,
                locked TINYINT NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (org_id) REFERENCES organizations(id)
            );
            CREATE INDEX idx_periods_org_id ON accounting_periods(org_id);
            CREATE INDEX idx_periods_dates ON accounting_periods(start_date, end_date);
        "#,
    },
    // Migration 5: journal entries and lines
    Migration {
        version: 5,
        name: "create_journal",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS journal_entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                org_id INTEGER NOT NULL,
                period_id INTEGER NOT NULL,
                entry_date DATE NOT NULL,
                memo TEXT,
                reference VARCHAR(100),
                posted_by INTEGER NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (org_id) REFERENCES organizations(id),
                FOREIGN KEY (period_id) REFERENCES accounting_periods(id),
                FOREIGN KEY (posted_by) REFERENCES users(id)
            );
            CREATE INDEX IF NOT EXISTS idx_journal_entries_org_id ON journal_entries(org_id);
            CREATE INDEX IF NOT EXISTS idx_journal_entries_period_id ON journal_entries(period_id);
            CREATE INDEX IF NOT EXISTS idx_journal_entries_date ON journal_entries(entry_date);
            CREATE TABLE IF NOT EXISTS journal_lines (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                entry_id INTEGER NOT NULL,
                account_id INTEGER NOT NULL,
                debit REAL NOT NULL DEFAULT 0,
                credit REAL NOT NULL DEFAULT 0,
                position INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY (entry_id) REFERENCES journal_entries(id) ON DELETE CASCADE,
                FOREIGN KEY (account_id) REFERENCES accounts(id)
            );
            CREATE INDEX IF NOT EXISTS idx_journal_lines_entry_id ON journal_lines(entry_id);
            CREATE INDEX IF NOT EXISTS idx_journal_lines_account_id ON journal_lines(account_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS journal_entries (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                org_id BIGINT NOT NULL,
                period_id BIGINT NOT NULL,
                entry_date DATE NOT NULL,
                memo TEXT,
                reference VARCHAR(100),
                posted_by BIGINT NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (org_id) REFERENCES organizations(id),
                FOREIGN KEY (period_id) REFERENCES accounting_periods(id),
                FOREIGN KEY (posted_by) REFERENCES users(id)
            );
            CREATE INDEX idx_journal_entries_org_id ON journal_entries(org_id);
            CREATE INDEX idx_journal_entries_period_id ON journal_entries(period_id);
            CREATE INDEX idx_journal_entries_date ON journal_entries(entry_date);
            CREATE TABLE IF NOT EXISTS journal_lines (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                entry_id BIGINT NOT NULL,
                account_id BIGINT NOT NULL,
                debit DOUBLE NOT NULL DEFAULT 0,
                credit DOUBLE NOT NULL DEFAULT 0,
                position INT NOT NULL DEFAULT 0,
                FOREIGN KEY (entry_id) REFERENCES journal_entries(id) ON DELETE CASCADE,
                FOREIGN KEY (account_id) REFERENCES accounts(id)
            );
            CREATE INDEX idx_journal_lines_entry_id ON journal_lines(entry_id);
            CREATE INDEX idx_journal_lines_account_id ON journal_lines(account_id);
        "#,
    },
    // Migration 6: budgets
    Migration {
        version: 6,
        name: "create_budgets",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS budgets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                org_id INTEGER NOT NULL,
                name VARCHAR(200) NOT NULL,
                period_id INTEGER NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (org_id) REFERENCES organizations(id),
                FOREIGN KEY (period_id) REFERENCES accounting_periods(id)
            );
            CREATE INDEX IF NOT EXISTS idx_budgets_org_id ON budgets(org_id);
            CREATE TABLE IF NOT EXISTS budget_lines (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                budget_id INTEGER NOT NULL,
                account_id INTEGER NOT NULL,
                amount REAL NOT NULL DEFAULT 0,
                FOREIGN KEY (budget_id) REFERENCES budgets(id) ON DELETE CASCADE,
                FOREIGN KEY (account_id) REFERENCES accounts(id),
                UNIQUE (budget_id, account_id)
            );
            CREATE INDEX IF NOT EXISTS idx_budget_lines_budget_id ON budget_lines(budget_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS budgets (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                org_id BIGINT NOT NULL,
                name VARCHAR(200) NOT NULL,
                period_id BIGINT NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
                FOREIGN KEY (org_id) REFERENCES organizations(id),
                FOREIGN KEY (period_id) REFERENCES accounting_periods(id)
            );
            CREATE INDEX idx_budgets_org_id ON budgets(org_id);
            CREATE TABLE IF NOT EXISTS budget_lines (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                budget_id BIGINT NOT NULL,
                account_id BIGINT NOT NULL,
                amount DOUBLE NOT NULL DEFAULT 0,
                FOREIGN KEY (budget_id) REFERENCES budgets(id) ON DELETE CASCADE,
                FOREIGN KEY (account_id) REFERENCES accounts(id),
                UNIQUE KEY uq_budget_lines (budget_id, account_id)
            );
            CREATE INDEX idx_budget_lines_budget_id ON budget_lines(budget_id);
        "#,
    },
    // Migration 7: currency reference data table
    Migration {
        version: 7,
        name: "create_currencies",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS currencies (
                code VARCHAR(3) PRIMARY KEY,
                name VARCHAR(100) NOT NULL,
                symbol VARCHAR(8) NOT NULL,
                decimal_places INTEGER NOT NULL DEFAULT 2
            );
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS currencies (
                code VARCHAR(3) PRIMARY KEY,
                name VARCHAR(100) NOT NULL,
                symbol VARCHAR(8) NOT NULL,
                decimal_places INT NOT NULL DEFAULT 2
            );
        "#,
    },
    // Migration 8: shared files
    Migration {
        version: 8,
        name: "create_file_shares",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS file_shares (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                org_id INTEGER NOT NULL,
                filename VARCHAR(255) NOT NULL,
                stored_name VARCHAR(100) NOT NULL UNIQUE,
                content_type VARCHAR(100) NOT NULL,
                size_bytes INTEGER NOT NULL DEFAULT 0,
                uploaded_by INTEGER NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (org_id) REFERENCES organizations(id),
                FOREIGN KEY (uploaded_by) REFERENCES users(id)
            );
            CREATE INDEX IF NOT EXISTS idx_file_shares_org_id ON file_shares(org_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS file_shares (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                org_id BIGINT NOT NULL,
                filename VARCHAR(255) NOT NULL,
                stored_name VARCHAR(100) NOT NULL UNIQUE,
                content_type VARCHAR(100) NOT NULL,
                size_bytes BIGINT NOT NULL DEFAULT 0,
                uploaded_by BIGINT NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (org_id) REFERENCES organizations(id),
                FOREIGN KEY (uploaded_by) REFERENCES users(id)
            );
            CREATE INDEX idx_file_shares_org_id ON file_shares(org_id);
        "#,
    },
];

/// Run all pending migrations, returning how many were applied.
pub async fn run_migrations(pool: &DynDatabasePool) -> Result<usize> {
    // Create migrations table
    create_migrations_table(pool).await?;

    // Get applied migrations
    let applied = get_applied_migrations(pool).await?;
    let applied_versions: Vec<i32> = applied.iter().map(|m| m.version as i32).collect();

    let mut count = 0;

    for migration in MIGRATIONS {
        if !applied_versions.contains(&migration.version) {
            tracing::info!(
                "Applying migration {}: {}",
                migration.version,
                migration.name
            );
            apply_migration(pool, migration)
                .await
                .with_context(|| format!("Failed to apply migration: {}", migration.name))?;
            count += 1;
        }
    }

    if count > 0 {
        tracing::info!("Applied {} migration(s)", count);
    } else {
        tracing::debug!("No pending migrations");
    }

    Ok(count)
}

/// Create the migrations tracking table if it doesn't exist
async fn create_migrations_table(pool: &DynDatabasePool) -> Result<()> {
    let sql = match pool.driver() {
        DatabaseDriver::Sqlite => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#
        }
        DatabaseDriver::Mysql => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INT PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#
        }
    };

    pool.execute(sql).await?;
    Ok(())
}

/// Get list of already applied migrations
async fn get_applied_migrations(pool: &DynDatabasePool) -> Result<Vec<MigrationRecord>> {
    match pool.driver() {
        DatabaseDriver::Sqlite => get_applied_migrations_sqlite(pool.as_sqlite().unwrap()).await,
        DatabaseDriver::Mysql => get_applied_migrations_mysql(pool.as_mysql().unwrap()).await,
    }
}

async fn get_applied_migrations_sqlite(pool: &SqlitePool) -> Result<Vec<MigrationRecord>> {
    let rows = sqlx::query("SELECT version, name, applied_at FROM _migrations ORDER BY version")
        .fetch_all(pool)
        .await?;

    let mut records = Vec::new();
    for row in rows {
        records.push(MigrationRecord {
            version: row.get("version"),
            name: row.get("name"),
            applied_at: row.get("applied_at"),
        });
    }

    Ok(records)
}

async fn get_applied_migrations_mysql(pool: &MySqlPool) -> Result<Vec<MigrationRecord>> {
    let rows = sqlx::query("SELECT version, name, applied_at FROM _migrations ORDER BY version")
        .fetch_all(pool)
        .await?;

    let mut records = Vec::new();
    for row in rows {
        records.push(MigrationRecord {
            version: row.get("version"),
            name: row.get("name"),
            applied_at: row.get("applied_at"),
        });
    }

    Ok(records)
}

/// Apply a single migration
async fn apply_migration(pool: &DynDatabasePool, migration: &Migration) -> Result<()> {
    match pool.driver() {
        DatabaseDriver::Sqlite => {
            apply_migration_sqlite(pool.as_sqlite().unwrap(), migration).await
        }
        DatabaseDriver::Mysql => apply_migration_mysql(pool.as_mysql().unwrap(), migration).await,
    }
}

async fn apply_migration_sqlite(pool: &SqlitePool, migration: &Migration) -> Result<()> {
    // Execute migration SQL (may contain multiple statements)
    for statement in split_sql_statements(migration.up_sqlite) {
        let statement = statement.trim();
        if !statement.is_empty() {
            sqlx::query(statement)
                .execute(pool)
                .await
                .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
        }
    }

    // Record the migration
    sqlx::query("INSERT INTO _migrations (version, name) VALUES (?, ?)")
        .bind(migration.version)
        .bind(migration.name)
        .execute(pool)
        .await?;

    Ok(())
}

async fn apply_migration_mysql(pool: &MySqlPool, migration: &Migration) -> Result<()> {
    // Execute migration SQL (may contain multiple statements)
    for statement in split_sql_statements(migration.up_mysql) {
        let statement = statement.trim();
        if !statement.is_empty() {
            sqlx::query(statement)
                .execute(pool)
                .await
                .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
        }
    }

    // Record the migration
    sqlx::query("INSERT INTO _migrations (version, name) VALUES (?, ?)")
        .bind(migration.version)
        .bind(migration.name)
        .execute(pool)
        .await?;

    Ok(())
}

/// Truncate SQL for error messages
fn truncate_sql(sql: &str) -> String {
    if sql.len() > 100 {
        format!("{}...", &sql[..100])
    } else {
        sql.to_string()
    }
}

/// Split SQL into individual statements
fn split_sql_statements(sql: &str) -> Vec<&str> {
    sql.split(';')
        .map(str::trim)
        .filter(|stmt| !stmt.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    #[test]
    fn test_migration_versions_are_unique_and_ordered() {
        let mut last = 0;
        for migration in MIGRATIONS {
            assert!(
                migration.version > last,
                "migration versions must be strictly increasing"
            );
            last = migration.version;
        }
    }

    #[test]
    fn test_split_sql_statements() {
        let sql = "CREATE TABLE a (id INTEGER);\nCREATE INDEX idx ON a(id);\n";
        let statements = split_sql_statements(sql);
        assert_eq!(statements.len(), 2);
        assert!(statements[0].starts_with("CREATE TABLE"));
        assert!(statements[1].starts_with("CREATE INDEX"));
    }

    #[tokio::test]
    async fn test_run_migrations_applies_all() {
        let pool = create_test_pool().await.expect("Failed to create pool");
        let applied = run_migrations(&pool).await.expect("Migrations failed");
        assert_eq!(applied, MIGRATIONS.len());
    }

    #[tokio::test]
    async fn test_run_migrations_is_idempotent() {
        let pool = create_test_pool().await.expect("Failed to create pool");
        run_migrations(&pool).await.expect("First run failed");
        let second = run_migrations(&pool).await.expect("Second run failed");
        assert_eq!(second, 0);
    }

    #[tokio::test]
    async fn test_migrated_schema_accepts_inserts() {
        let pool = create_test_pool().await.expect("Failed to create pool");
        run_migrations(&pool).await.expect("Migrations failed");

        pool.execute("INSERT INTO organizations (name, slug) VALUES ('Acme', 'acme')")
            .await
            .expect("Insert org failed");
        pool.execute(
            "INSERT INTO users (org_id, username, email, password_hash, role) \
             VALUES (1, 'alice', 'alice@acme.test', 'x', 'admin')",
        )
        .await
        .expect("Insert user failed");
    }
}
