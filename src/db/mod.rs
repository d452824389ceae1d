//! Database layer
//!
//! This module provides database abstraction for the Atrium ERP system.
//! It supports:
//! - SQLite (default, for single-binary deployment)
//! - MySQL (for larger deployments)
//!
//! The database driver is selected based on configuration. Repositories
//! dispatch on the driver at runtime; all SQL lives in this module.
//!
//! Journal postings additionally go through [`tx`], which wraps the
//! database-native transaction in a bounded retry policy for transient
//! lock/serialization conflicts.

pub mod migrations;
pub mod pool;
pub mod repositories;
pub mod tx;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};
pub use tx::{is_transient_error, with_retry, RetryError, RetryPolicy};
