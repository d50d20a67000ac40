//! # Size Formatting
//!
//! Human-readable byte counts for status reports.
//!
//! Uses integer arithmetic only: the value is scaled to hundredths of the
//! chosen unit and rounded half up.

/// Units in ascending order, each 1024 times the previous.
const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Format a byte count as `"<value with two decimals> <unit>"`.
///
/// Zero is special-cased as `"0 B"`.
///
/// ```
/// use bookvault_core::format_size;
///
/// assert_eq!(format_size(0), "0 B");
/// assert_eq!(format_size(1536), "1.50 KB");
/// ```
#[must_use]
pub fn format_size(size_bytes: u64) -> String {
    if size_bytes == 0 {
        return String::from("0 B");
    }

    let bytes = u128::from(size_bytes);
    let mut unit = 0;
    let mut divisor: u128 = 1;
    while bytes >= divisor * 1024 && unit < UNITS.len() - 1 {
        divisor *= 1024;
        unit += 1;
    }

    let hundredths = (bytes * 100 + divisor / 2) / divisor;
    format!("{}.{:02} {}", hundredths / 100, hundredths % 100, UNITS[unit])
}

// =============================================================================
// TESTS
// =============================================================================
