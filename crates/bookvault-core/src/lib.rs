//! # Bookvault Core
//!
//! The synchronous backup/restore engine behind the Bookvault server.
//!
//! This crate owns everything that touches the database files:
//! - Status reporting for the configured database set
//! - Zip archive creation and extraction
//! - MD5 checksums, HTTP byte ranges, human-readable sizes
//! - Chunked upload assembly and the restore operation registry
//!
//! It never performs network I/O and never reads the wall clock on its own.
//! Timestamps are passed in by the caller so that every operation is
//! reproducible in tests.

pub mod archive;
pub mod catalog;
pub mod checksum;
pub mod names;
pub mod operations;
pub mod range;
pub mod restore;
pub mod size;
pub mod upload;

mod error;

pub use catalog::{BackupStatus, DatabaseInfo, DatabaseSet};
pub use checksum::Checksum;
pub use error::{Result, VaultError};
pub use operations::{Operation, OperationKind, OperationRegistry, OperationStatus};
pub use range::ByteRange;
pub use size::format_size;

use std::time::Duration;

// =============================================================================
// CONSTANTS
// =============================================================================

/// Default database files, relative to the service root.
pub const DEFAULT_DATABASE_PATHS: [&str; 2] =
    ["database/books_data.db", "database/books_static.db"];

/// Default streaming chunk size for downloads (1 MiB).
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Block size used when hashing files.
pub const CHECKSUM_BLOCK_SIZE: usize = 4096;

/// How long a generated backup archive stays on disk.
pub const BACKUP_RETENTION: Duration = Duration::from_secs(600);

/// How long a finished restore operation stays queryable.
pub const OPERATION_RETENTION: Duration = Duration::from_secs(3600);

/// Directory for in-flight restore uploads, relative to the service root.
pub const UPLOADS_DIR: &str = "temp_uploads";

/// Directory for generated backup archives, relative to the service root.
pub const BACKUPS_DIR: &str = "temp_backups";

/// Timestamp layout shared by archive names and snapshot suffixes.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
