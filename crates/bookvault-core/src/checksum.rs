//! # Checksum Module
//!
//! MD5 digests used to verify backup downloads and restore uploads.
//!
//! Clients compute the same digest on their side and send it back as a hex
//! string, so the digest is exposed as lowercase hex.

use crate::{CHECKSUM_BLOCK_SIZE, Result};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// A lowercase hex MD5 digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checksum(String);

impl Checksum {
    /// The hex digest.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compare against a digest supplied by a client.
    ///
    /// Comparison is exact: clients are expected to send lowercase hex.
    #[must_use]
    pub fn matches(&self, other: &str) -> bool {
        self.0 == other
    }

    /// Consume into the hex string.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hash a file, reading it in fixed-size blocks.
pub fn file_checksum(path: &Path) -> Result<Checksum> {
    let mut file = File::open(path)?;
    let mut hasher = Md5::new();
    let mut block = [0u8; CHECKSUM_BLOCK_SIZE];
    loop {
        let read = file.read(&mut block)?;
        if read == 0 {
            break;
        }
        hasher.update(&block[..read]);
    }
    Ok(Checksum(hex::encode(hasher.finalize())))
}

/// Hash an in-memory buffer.
#[must_use]
pub fn bytes_checksum(data: &[u8]) -> Checksum {
    Checksum(hex::encode(Md5::digest(data)))
}

/// Hash `path` and compare with `expected`.
///
/// Returns the calculated checksum on mismatch so callers can report both.
pub fn verify_file(path: &Path, expected: &str) -> Result<std::result::Result<(), Checksum>> {
    let calculated = file_checksum(path)?;
    if calculated.matches(expected) {
        Ok(Ok(()))
    } else {
        Ok(Err(calculated))
    }
}

// =============================================================================
// TESTS
// =============================================================================
