//! # Restore Module
//!
//! The steps that turn an uploaded archive into live databases.
//!
//! Registry bookkeeping stays with the caller; this module only touches the
//! filesystem.

use crate::checksum::verify_file;
use crate::{DatabaseSet, Result, VaultError, archive};
use std::path::{Path, PathBuf};

/// Check an upload against the checksum the client sent, if any.
///
/// On mismatch the error carries the client value as `expected` and the
/// digest of the received data as `calculated`.
pub fn verify_upload(path: &Path, client_checksum: Option<&str>) -> Result<()> {
    let Some(expected) = client_checksum.filter(|c| !c.is_empty()) else {
        return Ok(());
    };
    match verify_file(path, expected)? {
        Ok(()) => Ok(()),
        Err(calculated) => Err(VaultError::ChecksumMismatch {
            expected: expected.to_string(),
            calculated: calculated.into_string(),
        }),
    }
}

/// Restore the databases of `set` from `zip_path`.
///
/// The archive is validated first, then every existing database is copied
/// to `<db>.<timestamp>.bak`, then the archive entries are extracted.
pub fn perform_restore(set: &DatabaseSet, zip_path: &Path, timestamp: &str) -> Result<Vec<PathBuf>> {
    if !archive::is_archive(zip_path) {
        return Err(VaultError::InvalidArchive);
    }
    set.snapshot(timestamp)?;
    archive::restore_from(set, zip_path)
}
