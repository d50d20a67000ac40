//! # Catalog Module
//!
//! The set of database files a Bookvault instance protects.
//!
//! Every database is identified by its path; inside a backup archive it is
//! stored under its file name alone, so two databases in a set must not
//! share a file name.

use crate::{Result, VaultError, format_size};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Status of a single database file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseInfo {
    /// Path as configured.
    pub path: String,
    /// Whether the file is present.
    pub exists: bool,
    /// Size on disk, 0 when missing.
    pub size_bytes: u64,
    /// Human-readable size.
    pub size_formatted: String,
}

/// Aggregate status of the database set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupStatus {
    pub databases: Vec<DatabaseInfo>,
    pub total_size_bytes: u64,
    pub all_files_exist: bool,
    pub total_size_formatted: String,
}

/// An ordered set of database files.
///
/// Paths are kept fully resolved. When the set was built under a root,
/// reports show them relative to that root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseSet {
    paths: Vec<PathBuf>,
    root: Option<PathBuf>,
}

impl DatabaseSet {
    /// Create a set from explicit paths.
    #[must_use]
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths, root: None }
    }

    /// Resolve `paths` under `root`. Absolute paths are kept as they are.
    #[must_use]
    pub fn rooted<P: AsRef<Path>>(root: &Path, paths: &[P]) -> Self {
        Self {
            paths: paths.iter().map(|p| root.join(p)).collect(),
            root: Some(root.to_path_buf()),
        }
    }

    /// The default pair of book databases, resolved under `root`.
    #[must_use]
    pub fn defaults_in(root: &Path) -> Self {
        Self::rooted(root, &crate::DEFAULT_DATABASE_PATHS)
    }

    /// How `path` appears in reports: relative to the root when possible.
    #[must_use]
    pub fn display_path(&self, path: &Path) -> String {
        self.root
            .as_deref()
            .and_then(|root| path.strip_prefix(root).ok())
            .unwrap_or(path)
            .display()
            .to_string()
    }

    /// Configured paths, in order.
    #[must_use]
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Number of databases in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Check if the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Name a database is stored under inside an archive.
    #[must_use]
    pub fn archive_name(path: &Path) -> Option<&str> {
        path.file_name().and_then(|n| n.to_str())
    }

    /// Report existence and size of every database.
    pub fn status(&self) -> BackupStatus {
        let mut databases = Vec::with_capacity(self.paths.len());
        let mut total_size_bytes: u64 = 0;
        let mut all_files_exist = true;

        for path in &self.paths {
            let size = fs::metadata(path).ok().filter(|m| m.is_file()).map(|m| m.len());
            let info = match size {
                Some(size) => {
                    total_size_bytes = total_size_bytes.saturating_add(size);
                    DatabaseInfo {
                        path: self.display_path(path),
                        exists: true,
                        size_bytes: size,
                        size_formatted: format_size(size),
                    }
                }
                None => {
                    all_files_exist = false;
                    DatabaseInfo {
                        path: self.display_path(path),
                        exists: false,
                        size_bytes: 0,
                        size_formatted: format_size(0),
                    }
                }
            };
            databases.push(info);
        }

        BackupStatus {
            databases,
            total_size_bytes,
            all_files_exist,
            total_size_formatted: format_size(total_size_bytes),
        }
    }

    /// Fail on the first database that does not exist.
    pub fn ensure_present(&self) -> Result<()> {
        if self.paths.is_empty() {
            return Err(VaultError::NoDatabases);
        }
        match self.paths.iter().find(|p| !p.is_file()) {
            Some(missing) => Err(VaultError::DatabaseMissing(missing.clone())),
            None => Ok(()),
        }
    }

    /// Copy every existing database to `<path>.<timestamp>.bak`.
    ///
    /// Missing databases are skipped. Returns the snapshot paths written.
    pub fn snapshot(&self, timestamp: &str) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();
        for path in self.paths.iter().filter(|p| p.is_file()) {
            let mut name = path.as_os_str().to_owned();
            name.push(format!(".{timestamp}.bak"));
            let target = PathBuf::from(name);
            fs::copy(path, &target)?;
            written.push(target);
        }
        Ok(written)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn set_with(dir: &TempDir, contents: &[Option<&[u8]>]) -> DatabaseSet {
        let db_dir = dir.path().join("database");
        fs::create_dir_all(&db_dir).unwrap();
        let mut paths = Vec::new();
        for (i, content) in contents.iter().enumerate() {
            let path = db_dir.join(format!("db{i}.db"));
            if let Some(bytes) = content {
                fs::write(&path, bytes).unwrap();
            }
            paths.push(path);
        }
        DatabaseSet::new(paths)
    }

    #[test]
    fn defaults_resolve_under_root() {
        let set = DatabaseSet::defaults_in(Path::new("/srv"));
        assert_eq!(set.len(), 2);
        assert_eq!(set.paths()[0], Path::new("/srv/database/books_data.db"));
        assert_eq!(set.paths()[1], Path::new("/srv/database/books_static.db"));
    }

    #[test]
    fn status_all_present() {
        let dir = tempfile::tempdir().unwrap();
        let set = set_with(&dir, &[Some(&[0u8; 1024][..]), Some(&[0u8; 512][..])]);

        let status = set.status();
        assert!(status.all_files_exist);
        assert_eq!(status.total_size_bytes, 1536);
        assert_eq!(status.total_size_formatted, "1.50 KB");
        assert_eq!(status.databases[0].size_formatted, "1.00 KB");
        assert_eq!(status.databases[1].size_bytes, 512);
    }

    #[test]
    fn status_with_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let set = set_with(&dir, &[Some(&b"abc"[..]), None]);

        let status = set.status();
        assert!(!status.all_files_exist);
        assert!(!status.databases[1].exists);
        assert_eq!(status.databases[1].size_bytes, 0);
        assert_eq!(status.databases[1].size_formatted, "0 B");
        assert_eq!(status.total_size_bytes, 3);
    }

    #[test]
    fn ensure_present_names_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let set = set_with(&dir, &[Some(&b"abc"[..]), None]);

        match set.ensure_present() {
            Err(VaultError::DatabaseMissing(path)) => assert_eq!(path, set.paths()[1]),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn ensure_present_rejects_empty_set() {
        let set = DatabaseSet::new(Vec::new());
        assert!(matches!(set.ensure_present(), Err(VaultError::NoDatabases)));
    }

    #[test]
    fn snapshot_copies_existing_only() {
        let dir = tempfile::tempdir().unwrap();
        let set = set_with(&dir, &[Some(&b"first"[..]), None]);

        let written = set.snapshot("20240101_120000").unwrap();
        assert_eq!(written.len(), 1);
        assert!(written[0].ends_with("db0.db.20240101_120000.bak"));
        assert_eq!(fs::read(&written[0]).unwrap(), b"first");
    }

    #[test]
    fn reports_are_relative_to_root() {
        let dir = tempfile::tempdir().unwrap();
        let set = DatabaseSet::defaults_in(dir.path());

        let status = set.status();
        assert_eq!(status.databases[0].path, "database/books_data.db");
        assert_eq!(set.display_path(Path::new("/elsewhere/x.db")), "/elsewhere/x.db");
    }

    #[test]
    fn archive_name_is_basename() {
        assert_eq!(
            DatabaseSet::archive_name(Path::new("database/books_data.db")),
            Some("books_data.db")
        );
    }
}
