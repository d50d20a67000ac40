//! # CLI Commands
//!
//! Offline counterparts of the HTTP endpoints, for operators working on the
//! host directly. Each command prints its result and returns an error for
//! the caller to report.

use crate::config::ServerConfig;
use bookvault_core::archive::{self, stamp};
use bookvault_core::checksum::file_checksum;
use bookvault_core::{BackupStatus, Result, VaultError, restore};
use chrono::Local;
use std::fs;
use std::path::Path;
use tracing::info;

/// Print the status of every configured database.
pub fn cmd_status(config: &ServerConfig, json: bool) -> Result<BackupStatus> {
    let status = config.databases.status();

    if json {
        let text = serde_json::to_string_pretty(&status)
            .map_err(|e| VaultError::Io(std::io::Error::other(e)))?;
        println!("{text}");
    } else {
        println!("Databases:");
        for db in &status.databases {
            let marker = if db.exists { "ok" } else { "MISSING" };
            println!("  [{marker:^7}] {} ({})", db.path, db.size_formatted);
        }
        println!("Total: {}", status.total_size_formatted);
    }

    Ok(status)
}

/// Write a backup archive of all databases to `output`.
///
/// Prints the archive size and checksum.
pub fn cmd_backup(config: &ServerConfig, output: &Path) -> Result<()> {
    let staging = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let backup = archive::create_backup(&config.databases, staging, Local::now().naive_local())?;
    if backup.path != output {
        fs::rename(&backup.path, output)?;
    }

    info!(output = %output.display(), size = backup.size, "Backup written");
    println!("Backup: {}", output.display());
    println!("Size: {} bytes", backup.size);
    println!("Checksum (md5): {}", backup.checksum);
    Ok(())
}

/// Restore databases from `archive_path`, snapshotting the current ones.
///
/// When `checksum` is given the archive must match it.
pub fn cmd_restore(config: &ServerConfig, archive_path: &Path, checksum: Option<&str>) -> Result<()> {
    restore::verify_upload(archive_path, checksum)?;
    let timestamp = stamp(Local::now().naive_local());
    let restored = restore::perform_restore(&config.databases, archive_path, &timestamp)?;

    info!(archive = %archive_path.display(), count = restored.len(), "Restore completed");
    println!("Restored {} database(s):", restored.len());
    for path in &restored {
        println!("  {}", config.databases.display_path(path));
    }
    Ok(())
}

/// Compare the checksum of `file` with `expected`.
pub fn cmd_verify(file: &Path, expected: &str) -> Result<()> {
    let calculated = file_checksum(file)?;
    if calculated.matches(expected) {
        println!("Verified: {}", file.display());
        Ok(())
    } else {
        Err(VaultError::ChecksumMismatch {
            expected: expected.to_string(),
            calculated: calculated.into_string(),
        })
    }
}
