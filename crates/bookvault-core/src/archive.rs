//! # Archive Module
//!
//! Backup archives are plain deflated zip files holding one entry per
//! database, named after the database's file name.
//!
//! Archives are written to a private partial file first and renamed into
//! place, so a reader never observes a half-written archive even when two
//! backups are requested within the same second.

use crate::checksum::{Checksum, file_checksum};
use crate::{DatabaseSet, Result, TIMESTAMP_FORMAT, VaultError};
use chrono::NaiveDateTime;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

static PARTIAL_SEQ: AtomicU64 = AtomicU64::new(0);

/// A backup archive written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupArchive {
    /// Full path of the archive.
    pub path: PathBuf,
    /// File name offered to the client.
    pub file_name: String,
    /// Archive size in bytes.
    pub size: u64,
    /// MD5 of the archive.
    pub checksum: Checksum,
}

/// Format a timestamp the way archive names and snapshots expect.
#[must_use]
pub fn stamp(now: NaiveDateTime) -> String {
    now.format(TIMESTAMP_FORMAT).to_string()
}

/// `books_db_backup_<timestamp>.zip`
#[must_use]
pub fn backup_file_name(now: NaiveDateTime) -> String {
    format!("books_db_backup_{}.zip", stamp(now))
}

/// Zip every database of `set` into `dir`.
///
/// All databases must exist.
pub fn create_backup(set: &DatabaseSet, dir: &Path, now: NaiveDateTime) -> Result<BackupArchive> {
    set.ensure_present()?;
    fs::create_dir_all(dir)?;

    let file_name = backup_file_name(now);
    let path = dir.join(&file_name);
    let partial = dir.join(format!(
        ".{}.{}-{}.partial",
        file_name,
        std::process::id(),
        PARTIAL_SEQ.fetch_add(1, Ordering::Relaxed)
    ));

    if let Err(e) = write_archive(set, &partial) {
        let _ = fs::remove_file(&partial);
        return Err(e);
    }
    fs::rename(&partial, &path)?;

    let size = fs::metadata(&path)?.len();
    let checksum = file_checksum(&path)?;

    Ok(BackupArchive {
        path,
        file_name,
        size,
        checksum,
    })
}

fn write_archive(set: &DatabaseSet, target: &Path) -> Result<()> {
    let mut zip = ZipWriter::new(BufWriter::new(File::create(target)?));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .large_file(true);

    for db in set.paths() {
        let name = DatabaseSet::archive_name(db)
            .ok_or_else(|| VaultError::DatabaseMissing(db.clone()))?;
        zip.start_file(name, options)?;
        let mut source = BufReader::new(File::open(db)?);
        io::copy(&mut source, &mut zip)?;
    }

    let mut out = zip.finish()?;
    io::Write::flush(&mut out)?;
    Ok(())
}

/// Check whether `path` parses as a zip archive.
#[must_use]
pub fn is_archive(path: &Path) -> bool {
    File::open(path)
        .map(|f| ZipArchive::new(BufReader::new(f)).is_ok())
        .unwrap_or(false)
}

/// Entry names of an archive, in archive order.
pub fn entry_names(path: &Path) -> Result<Vec<String>> {
    let archive = open_archive(path)?;
    Ok(archive.file_names().map(str::to_owned).collect())
}

/// Extract every database of `set` found in the archive at `zip_path`.
///
/// Entries are matched by file name; other entries are ignored. Each
/// database is written beside its destination and renamed over it.
/// Returns the restored paths, in set order.
pub fn restore_from(set: &DatabaseSet, zip_path: &Path) -> Result<Vec<PathBuf>> {
    let mut archive = open_archive(zip_path)?;
    let mut restored = Vec::new();

    for db in set.paths() {
        let Some(name) = DatabaseSet::archive_name(db) else {
            continue;
        };
        let mut entry = match archive.by_name(name) {
            Ok(entry) => entry,
            Err(zip::result::ZipError::FileNotFound) => continue,
            Err(e) => return Err(e.into()),
        };

        if let Some(parent) = db.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut staging = db.as_os_str().to_owned();
        staging.push(".restoring");
        let staging = PathBuf::from(staging);

        {
            let mut target = BufWriter::new(File::create(&staging)?);
            io::copy(&mut entry, &mut target)?;
            io::Write::flush(&mut target)?;
        }
        fs::rename(&staging, db)?;
        restored.push(db.clone());
    }

    if restored.is_empty() {
        return Err(VaultError::NoDatabasesInArchive);
    }
    Ok(restored)
}

fn open_archive(path: &Path) -> Result<ZipArchive<BufReader<File>>> {
    let file = File::open(path)?;
    ZipArchive::new(BufReader::new(file)).map_err(|e| match e {
        zip::result::ZipError::Io(io) => VaultError::Io(io),
        _ => VaultError::InvalidArchive,
    })
}

// =============================================================================
// TESTS
// =============================================================================
