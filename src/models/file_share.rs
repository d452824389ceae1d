//! Shared file model
//!
//! Metadata for files uploaded to the organization's shared storage. The
//! file bytes themselves live on disk under the configured upload directory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Shared file entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileShare {
    /// Unique identifier
    pub id: i64,
    /// Owning organization
    pub org_id: i64,
    /// Original filename as uploaded
    pub filename: String,
    /// Name of the file on disk (UUID-based, never client-controlled)
    pub stored_name: String,
    /// MIME type as declared at upload
    pub content_type: String,
    /// Size in bytes
    pub size_bytes: i64,
    /// Uploading user
    pub uploaded_by: i64,
    /// Upload timestamp
    pub created_at: DateTime<Utc>,
}
