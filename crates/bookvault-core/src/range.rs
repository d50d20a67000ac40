//! # Byte Ranges
//!
//! Resolution of `Range: bytes=<start>-<end>` headers against a file size,
//! for resumable backup downloads.
//!
//! Only the single-range form is supported. An empty start means 0 and an
//! empty end means the last byte, so `bytes=-500` selects bytes 0..=500
//! rather than the last 500 bytes.

use crate::{Result, VaultError};

/// An inclusive byte range inside a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    /// First byte offset.
    pub start: u64,
    /// Last byte offset (inclusive).
    pub end: u64,
}

impl ByteRange {
    /// The whole file. `file_size` must be non-zero.
    #[must_use]
    pub fn full(file_size: u64) -> Self {
        Self {
            start: 0,
            end: file_size.saturating_sub(1),
        }
    }

    /// Parse a Range header value and resolve it against `file_size`.
    ///
    /// Errors:
    /// - [`VaultError::InvalidRange`] if a bound is not an integer or
    ///   `end < start`
    /// - [`VaultError::RangeNotSatisfiable`] if `start >= file_size`
    ///
    /// An `end` past the last byte is clamped.
    pub fn parse(header: &str, file_size: u64) -> Result<Self> {
        let value = header.trim();
        let value = value.strip_prefix("bytes=").unwrap_or(value);
        let (start_text, end_text) = value.split_once('-').ok_or(VaultError::InvalidRange)?;

        let start = parse_bound(start_text)?.unwrap_or(0);
        let end = parse_bound(end_text)?;

        Self::resolve(start, end, file_size)
    }

    /// Resolve explicit bounds against `file_size`.
    pub fn resolve(start: u64, end: Option<u64>, file_size: u64) -> Result<Self> {
        if start >= file_size {
            return Err(VaultError::RangeNotSatisfiable);
        }
        let last = file_size - 1;
        let end = end.map_or(last, |e| e.min(last));
        if end < start {
            return Err(VaultError::InvalidRange);
        }
        Ok(Self { start, end })
    }

    /// Number of bytes covered, never zero.
    #[must_use]
    pub fn content_length(&self) -> u64 {
        self.end - self.start + 1
    }

    /// `Content-Range` header value for this range.
    #[must_use]
    pub fn content_range(&self, file_size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, file_size)
    }
}

fn parse_bound(text: &str) -> Result<Option<u64>> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    text.parse::<u64>()
        .map(Some)
        .map_err(|_| VaultError::InvalidRange)
}

// =============================================================================
// TESTS
// =============================================================================
