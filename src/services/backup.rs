//! Backup archive writing
//!
//! Shared by the admin backup endpoint and the `backup` CLI tool. Produces
//! a tar.gz archive containing the SQLite database file and the uploads
//! directory. MySQL deployments are out of scope; dump those server-side.

use anyhow::{Context, Result};
use chrono::Utc;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Resolve the on-disk SQLite file path from a configured database URL.
///
/// Returns `None` for in-memory databases, which have nothing to archive.
pub fn database_file_path(url: &str) -> Option<PathBuf> {
    if url == ":memory:" || url.starts_with("sqlite::memory:") {
        return None;
    }

    let path = url.strip_prefix("sqlite:").unwrap_or(url);
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return None;
    }

    Some(PathBuf::from(path))
}

/// Write `atrium-backup-<timestamp>.tar.gz` into `target_dir`, containing
/// the database file and, when present, the uploads directory.
///
/// Returns the path of the written archive.
pub fn write_backup_archive(
    db_path: &Path,
    uploads_dir: &Path,
    target_dir: &Path,
) -> Result<PathBuf> {
    if !db_path.exists() {
        anyhow::bail!("Database file does not exist: {}", db_path.display());
    }

    std::fs::create_dir_all(target_dir)
        .with_context(|| format!("Failed to create backup directory: {}", target_dir.display()))?;

    let timestamp = Utc::now().format("%Y%m%d-%H%M%S");
    let archive_path = target_dir.join(format!("atrium-backup-{}.tar.gz", timestamp));

    let file = File::create(&archive_path)
        .with_context(|| format!("Failed to create archive: {}", archive_path.display()))?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);

    builder
        .append_path_with_name(db_path, "database/atrium.db")
        .context("Failed to add database file to archive")?;

    if uploads_dir.is_dir() {
        builder
            .append_dir_all("uploads", uploads_dir)
            .context("Failed to add uploads directory to archive")?;
    }

    let encoder = builder
        .into_inner()
        .context("Failed to finalize archive")?;
    encoder.finish().context("Failed to flush archive")?;

    Ok(archive_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_file_path_variants() {
        assert_eq!(
            database_file_path("data/atrium.db"),
            Some(PathBuf::from("data/atrium.db"))
        );
        assert_eq!(
            database_file_path("sqlite:data/atrium.db?mode=rwc"),
            Some(PathBuf::from("data/atrium.db"))
        );
        assert_eq!(database_file_path(":memory:"), None);
        assert_eq!(database_file_path("sqlite::memory:"), None);
    }

    #[test]
    fn test_write_backup_archive() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        std::fs::write(&db_path, b"not a real database").unwrap();

        let uploads = dir.path().join("uploads");
        std::fs::create_dir_all(&uploads).unwrap();
        std::fs::write(uploads.join("file.pdf"), b"pdf bytes").unwrap();

        let target = dir.path().join("backups");
        let archive = write_backup_archive(&db_path, &uploads, &target).unwrap();

        assert!(archive.exists());
        assert!(archive
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("atrium-backup-"));
        assert!(std::fs::metadata(&archive).unwrap().len() > 0);
    }

    #[test]
    fn test_missing_database_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = write_backup_archive(
            &dir.path().join("missing.db"),
            &dir.path().join("uploads"),
            &dir.path().join("backups"),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_uploads_dir_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        std::fs::write(&db_path, b"db").unwrap();

        let archive = write_backup_archive(
            &db_path,
            &dir.path().join("no-such-dir"),
            &dir.path().join("backups"),
        )
        .unwrap();
        assert!(archive.exists());
    }
}
