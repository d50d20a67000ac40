use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the backup/restore engine.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Filesystem operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Zip encoding or decoding failed.
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// A configured database file does not exist.
    #[error("Database file {} not found", .0.display())]
    DatabaseMissing(PathBuf),

    /// The set has no databases configured.
    #[error("No database files configured")]
    NoDatabases,

    /// The Range header could not be parsed.
    #[error("Invalid range header")]
    InvalidRange,

    /// The requested range starts past the end of the file.
    #[error("Range not satisfiable")]
    RangeNotSatisfiable,

    /// The uploaded file is not a zip archive.
    #[error("Invalid zip file")]
    InvalidArchive,

    /// The archive contains none of the configured databases.
    #[error("No valid database files found in the backup")]
    NoDatabasesInArchive,

    /// A chunk of a multi-part upload is missing at assembly time.
    #[error("Missing chunk {index} of {total}")]
    MissingChunk { index: u32, total: u32 },

    /// Client checksum does not match the received data.
    #[error("Checksum verification failed")]
    ChecksumMismatch { expected: String, calculated: String },

    /// The operation has left the state the request needs.
    #[error("Operation {id} is already {status}")]
    OperationClosed { id: String, status: String },

    /// No operation is registered under this id.
    #[error("Operation {0} not found")]
    UnknownOperation(String),
}

/// Result alias used across the core crate.
pub type Result<T> = std::result::Result<T, VaultError>;
