//! Byte marker substitution
//!
//! Binary-safe find/replace of fixed byte sequences. Payloads are treated as
//! opaque bytes; nothing here assumes UTF-8.

use crate::types::{Result, SpliceError};
use memchr::memmem;

/// Replace every non-overlapping occurrence of `old_marker` with `new_marker`
///
/// The scan runs left to right and resumes after each inserted region, so
/// matches created by the replacement itself are never reprocessed.
///
/// # Returns
/// * `Result<usize>` - Number of substitutions, `Err(EmptyMarker)` for an empty `old_marker`
///
/// # Example
/// ```
/// use splice_hook::codec::replace_all;
///
/// let mut buffer = b"ab<m>cd".to_vec();
/// let count = replace_all(&mut buffer, b"<m>", b"").unwrap();
/// assert_eq!(count, 1);
/// assert_eq!(buffer, b"abcd");
/// ```
pub fn replace_all(buffer: &mut Vec<u8>, old_marker: &[u8], new_marker: &[u8]) -> Result<usize> {
    if old_marker.is_empty() {
        return Err(SpliceError::EmptyMarker);
    }
    if buffer.len() < old_marker.len() {
        return Ok(0);
    }

    let finder = memmem::Finder::new(old_marker);
    let mut output = Vec::with_capacity(buffer.len());
    let mut last = 0;
    let mut count = 0;

    // find_iter yields non-overlapping matches in the original buffer
    for start in finder.find_iter(buffer.as_slice()) {
        output.extend_from_slice(&buffer[last..start]);
        output.extend_from_slice(new_marker);
        last = start + old_marker.len();
        count += 1;
    }

    if count == 0 {
        return Ok(0);
    }

    output.extend_from_slice(&buffer[last..]);
    *buffer = output;
    Ok(count)
}

/// Remove every occurrence of `marker` from `buffer`
pub fn strip(buffer: &mut Vec<u8>, marker: &[u8]) -> Result<usize> {
    replace_all(buffer, marker, &[])
}

/// Count non-overlapping occurrences of `marker` in `haystack`
pub fn count(haystack: &[u8], marker: &[u8]) -> Result<usize> {
    if marker.is_empty() {
        return Err(SpliceError::EmptyMarker);
    }
    Ok(memmem::find_iter(haystack, marker).count())
}
