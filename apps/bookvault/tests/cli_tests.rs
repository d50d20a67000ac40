//! Integration tests for the Bookvault CLI commands.
//!
//! Commands are called directly against a temporary service root.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use bookvault::bookvault_core::VaultError;
use bookvault::bookvault_core::checksum::file_checksum;
use bookvault::cli::{cmd_backup, cmd_restore, cmd_status, cmd_verify};
use bookvault::config::ServerConfig;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

fn setup() -> (TempDir, ServerConfig) {
    let root = tempfile::tempdir().unwrap();
    fs::create_dir_all(root.path().join("database")).unwrap();
    fs::write(root.path().join("database/books_data.db"), b"data rows").unwrap();
    fs::write(root.path().join("database/books_static.db"), b"static rows").unwrap();
    let config = ServerConfig::new(root.path());
    (root, config)
}

fn backup_into(config: &ServerConfig, dir: &Path) -> std::path::PathBuf {
    let output = dir.join("out/books.zip");
    fs::create_dir_all(output.parent().unwrap()).unwrap();
    cmd_backup(config, &output).unwrap();
    output
}

// =============================================================================
// STATUS TESTS
// =============================================================================

#[test]
fn test_status_lists_databases() {
    let (_root, config) = setup();

    let status = cmd_status(&config, false).unwrap();
    assert!(status.all_files_exist);
    assert_eq!(status.databases.len(), 2);
    assert_eq!(status.total_size_bytes, 20);
}

#[test]
fn test_status_json_with_missing_file() {
    let (root, config) = setup();
    fs::remove_file(root.path().join("database/books_data.db")).unwrap();

    let status = cmd_status(&config, true).unwrap();
    assert!(!status.all_files_exist);
    assert_eq!(status.total_size_bytes, 11);
}

#[test]
fn test_status_with_custom_databases() {
    let (root, config) = setup();
    fs::write(root.path().join("extra.db"), b"x").unwrap();
    let config = config.with_databases(&["extra.db"]);

    let status = cmd_status(&config, false).unwrap();
    assert_eq!(status.databases.len(), 1);
    assert_eq!(status.databases[0].path, "extra.db");
}

// =============================================================================
// BACKUP TESTS
// =============================================================================

#[test]
fn test_backup_writes_archive_at_output() {
    let (root, config) = setup();

    let output = backup_into(&config, root.path());
    assert!(output.is_file());

    let archive = zip::ZipArchive::new(fs::File::open(&output).unwrap()).unwrap();
    let mut names: Vec<_> = archive.file_names().map(str::to_owned).collect();
    names.sort();
    assert_eq!(names, vec!["books_data.db", "books_static.db"]);

    // Nothing but the requested file is left behind.
    let siblings = fs::read_dir(output.parent().unwrap()).unwrap().count();
    assert_eq!(siblings, 1);
}

#[test]
fn test_backup_fails_when_database_missing() {
    let (root, config) = setup();
    fs::remove_file(root.path().join("database/books_static.db")).unwrap();

    let output = root.path().join("books.zip");
    let err = cmd_backup(&config, &output).unwrap_err();
    assert!(matches!(err, VaultError::DatabaseMissing(_)));
    assert!(!output.exists());
}

// =============================================================================
// RESTORE TESTS
// =============================================================================

#[test]
fn test_restore_round_trip() {
    let (root, config) = setup();
    let output = backup_into(&config, root.path());

    fs::write(root.path().join("database/books_data.db"), b"broken").unwrap();
    let checksum = file_checksum(&output).unwrap();

    cmd_restore(&config, &output, Some(checksum.as_str())).unwrap();
    assert_eq!(
        fs::read(root.path().join("database/books_data.db")).unwrap(),
        b"data rows"
    );

    let snapshots = fs::read_dir(root.path().join("database"))
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".bak"))
        .count();
    assert_eq!(snapshots, 2);
}

#[test]
fn test_restore_rejects_wrong_checksum() {
    let (root, config) = setup();
    let output = backup_into(&config, root.path());
    fs::write(root.path().join("database/books_data.db"), b"current").unwrap();

    let err = cmd_restore(&config, &output, Some("ffff")).unwrap_err();
    assert!(matches!(err, VaultError::ChecksumMismatch { .. }));
    assert_eq!(
        fs::read(root.path().join("database/books_data.db")).unwrap(),
        b"current"
    );
}

#[test]
fn test_restore_rejects_non_archive() {
    let (root, config) = setup();
    let bogus = root.path().join("bogus.zip");
    fs::write(&bogus, b"not a zip").unwrap();

    let err = cmd_restore(&config, &bogus, None).unwrap_err();
    assert!(matches!(err, VaultError::InvalidArchive));
}

// =============================================================================
// VERIFY TESTS
// =============================================================================

#[test]
fn test_verify_matches_and_mismatches() {
    let (root, config) = setup();
    let output = backup_into(&config, root.path());
    let checksum = file_checksum(&output).unwrap();

    cmd_verify(&output, checksum.as_str()).unwrap();

    match cmd_verify(&output, "0000").unwrap_err() {
        VaultError::ChecksumMismatch {
            expected,
            calculated,
        } => {
            assert_eq!(expected, "0000");
            assert_eq!(calculated, checksum.as_str());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_verify_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = cmd_verify(&dir.path().join("absent.zip"), "abc").unwrap_err();
    assert!(matches!(err, VaultError::Io(_)));
}
