//! backup - offline backup/export tool
//!
//! Writes backups/atrium-backup-<timestamp>.tar.gz containing the SQLite
//! database file and the uploads directory. Refuses MySQL deployments
//! (dump those server-side). Exits 1 on failure.
//!
//! Usage: backup [config.yml]

use std::path::Path;

use atrium::config::{Config, DatabaseDriver};
use atrium::services::backup::{database_file_path, write_backup_archive};

fn main() {
    if let Err(err) = run() {
        eprintln!("backup failed: {:#}", err);
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.yml".to_string());
    let config = Config::load_with_env(Path::new(&config_path))?;

    if config.database.driver != DatabaseDriver::Sqlite {
        anyhow::bail!("backup only supports SQLite deployments; use mysqldump for MySQL");
    }

    let db_path = database_file_path(&config.database.url)
        .ok_or_else(|| anyhow::anyhow!("no database file to back up (in-memory database)"))?;

    let archive = write_backup_archive(&db_path, &config.upload.path, Path::new("backups"))?;
    let size = std::fs::metadata(&archive).map(|m| m.len()).unwrap_or(0);

    println!("Wrote {} ({} bytes)", archive.display(), size);
    Ok(())
}
