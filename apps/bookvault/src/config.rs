//! # Server Configuration
//!
//! Everything the server needs to know about its surroundings. All relative
//! paths are resolved against a single service root, which defaults to the
//! working directory.

use bookvault_core::{
    BACKUP_RETENTION, BACKUPS_DIR, DEFAULT_CHUNK_SIZE, DEFAULT_DATABASE_PATHS, DatabaseSet,
    OPERATION_RETENTION, UPLOADS_DIR,
};
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Port the service listens on unless told otherwise.
pub const DEFAULT_PORT: u16 = 5000;

/// Directory of static frontend files, relative to the root.
pub const DEFAULT_PUBLIC_DIR: &str = "public";

/// Largest accepted restore request body (1 GiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 1024 * 1024 * 1024;

/// Default bind address: all interfaces, port 5000.
#[must_use]
pub fn default_bind() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT))
}

/// Resolved server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub root: PathBuf,
    pub public_dir: PathBuf,
    pub databases: DatabaseSet,
    pub uploads_dir: PathBuf,
    pub backups_dir: PathBuf,
    pub default_chunk_size: usize,
    pub max_upload_bytes: usize,
    pub backup_retention: Duration,
    pub operation_retention: Duration,
}

impl ServerConfig {
    /// Defaults rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            bind: default_bind(),
            public_dir: root.join(DEFAULT_PUBLIC_DIR),
            databases: DatabaseSet::rooted(&root, &DEFAULT_DATABASE_PATHS),
            uploads_dir: root.join(UPLOADS_DIR),
            backups_dir: root.join(BACKUPS_DIR),
            default_chunk_size: DEFAULT_CHUNK_SIZE,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            backup_retention: BACKUP_RETENTION,
            operation_retention: OPERATION_RETENTION,
            root,
        }
    }

    /// Override the bind address.
    #[must_use]
    pub fn with_bind(mut self, bind: SocketAddr) -> Self {
        self.bind = bind;
        self
    }

    /// Override the database list. Relative paths resolve under the root.
    #[must_use]
    pub fn with_databases<P: AsRef<Path>>(mut self, paths: &[P]) -> Self {
        if !paths.is_empty() {
            self.databases = DatabaseSet::rooted(&self.root, paths);
        }
        self
    }

    /// Override the static files directory. Relative paths resolve under
    /// the root.
    #[must_use]
    pub fn with_public_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.public_dir = self.root.join(dir);
        self
    }

    /// Override the restore body limit.
    #[must_use]
    pub fn with_max_upload_bytes(mut self, limit: usize) -> Self {
        self.max_upload_bytes = limit;
        self
    }

    /// Override how long archives and finished operations are kept.
    #[must_use]
    pub fn with_retention(mut self, backups: Duration, operations: Duration) -> Self {
        self.backup_retention = backups;
        self.operation_retention = operations;
        self
    }

    /// `path` relative to the root when it lies under it, otherwise as is.
    #[must_use]
    pub fn relative(&self, path: &Path) -> PathBuf {
        path.strip_prefix(&self.root)
            .map_or_else(|_| path.to_path_buf(), Path::to_path_buf)
    }

    /// Create the working directories the server writes into.
    pub fn prepare(&self) -> io::Result<()> {
        for dir in [&self.public_dir, &self.uploads_dir, &self.backups_dir] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(".")
    }
}
