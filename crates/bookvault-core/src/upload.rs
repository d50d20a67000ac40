//! # Upload Module
//!
//! On-disk layout of a restore upload session.
//!
//! Each session owns a directory under the uploads root:
//!
//! ```text
//! temp_uploads/<upload_id>/
//!     backup.zip      single-part upload
//!     chunk_0 .. N-1  multi-part upload pieces
//!     combined.zip    pieces concatenated in index order
//! ```
//!
//! Request bodies are written to a staging file in the uploads root as they
//! arrive and then moved into the session with [`place`].

use crate::{Result, VaultError};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// File name of a single-part upload.
pub const SINGLE_UPLOAD_NAME: &str = "backup.zip";

/// File name of the assembled multi-part upload.
pub const COMBINED_UPLOAD_NAME: &str = "combined.zip";

/// Path of chunk `index` inside a session directory.
#[must_use]
pub fn chunk_path(session_dir: &Path, index: u32) -> PathBuf {
    session_dir.join(format!("chunk_{index}"))
}

/// Path of a single-part upload inside a session directory.
#[must_use]
pub fn single_upload_path(session_dir: &Path) -> PathBuf {
    session_dir.join(SINGLE_UPLOAD_NAME)
}

/// Move a file received elsewhere under the uploads root to `target`,
/// creating the session directory if needed. An existing file at `target`
/// is replaced.
///
/// `staged` must be on the same filesystem as `target`.
pub fn place(staged: &Path, target: &Path) -> Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::rename(staged, target)?;
    Ok(())
}

/// Concatenate chunks `0..total` into `combined.zip`.
///
/// Fails with [`VaultError::MissingChunk`] on the first absent piece.
pub fn assemble_chunks(session_dir: &Path, total: u32) -> Result<PathBuf> {
    let combined = session_dir.join(COMBINED_UPLOAD_NAME);
    let mut out = BufWriter::new(File::create(&combined)?);

    for index in 0..total {
        let piece = chunk_path(session_dir, index);
        let mut source = match File::open(&piece) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                drop(out);
                let _ = fs::remove_file(&combined);
                return Err(VaultError::MissingChunk { index, total });
            }
            Err(e) => return Err(e.into()),
        };
        io::copy(&mut source, &mut out)?;
    }

    out.flush()?;
    Ok(combined)
}

/// Remove a session directory and everything in it.
///
/// A directory that is already gone is not an error.
pub fn discard_session(session_dir: &Path) -> Result<()> {
    match fs::remove_dir_all(session_dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn store(target: &Path, data: &[u8]) {
        let staged = target.with_file_name(".incoming");
        fs::create_dir_all(target.parent().unwrap()).unwrap();
        fs::write(&staged, data).unwrap();
        place(&staged, target).unwrap();
    }

    #[test]
    fn chunks_are_joined_in_index_order() {
        let dir = tempfile::tempdir().unwrap();
        let session = dir.path().join("abc");

        // Written out of order on purpose.
        store(&chunk_path(&session, 2), b"cc");
        store(&chunk_path(&session, 0), b"aa");
        store(&chunk_path(&session, 1), b"bb");

        let combined = assemble_chunks(&session, 3).unwrap();
        assert_eq!(combined, session.join("combined.zip"));
        assert_eq!(fs::read(&combined).unwrap(), b"aabbcc");
    }

    #[test]
    fn missing_chunk_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let session = dir.path().join("abc");
        store(&chunk_path(&session, 0), b"aa");
        store(&chunk_path(&session, 2), b"cc");

        let result = assemble_chunks(&session, 3);
        assert!(matches!(
            result,
            Err(VaultError::MissingChunk { index: 1, total: 3 })
        ));
        assert!(!session.join("combined.zip").exists());
    }

    #[test]
    fn place_creates_session_and_replaces_target() {
        let dir = tempfile::tempdir().unwrap();
        let staged = dir.path().join("incoming");
        let target = chunk_path(&dir.path().join("abc"), 0);

        fs::write(&staged, b"first").unwrap();
        place(&staged, &target).unwrap();
        assert!(!staged.exists());

        fs::write(&staged, b"second").unwrap();
        place(&staged, &target).unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"second");
    }

    #[test]
    fn discard_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let session = dir.path().join("abc");
        store(&single_upload_path(&session), b"zip");

        discard_session(&session).unwrap();
        assert!(!session.exists());
        discard_session(&session).unwrap();
    }
}
