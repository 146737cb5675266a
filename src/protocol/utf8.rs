//! UTF-8 validation for text messages and close reasons.
//!
//! Text messages are validated once, after reassembly and after every
//! payload transform has run, so a code point split across fragments never
//! needs special handling here.

use crate::error::{Error, Result};

/// Validity oracle for a complete byte sequence.
#[inline]
#[must_use]
pub fn is_valid_utf8(data: &[u8]) -> bool {
    std::str::from_utf8(data).is_ok()
}

/// Validate and convert a reassembled text payload.
///
/// # Errors
///
/// Returns `Error::InvalidUtf8` if the data is not valid UTF-8.
pub fn validate_utf8(data: Vec<u8>) -> Result<String> {
    String::from_utf8(data).map_err(|_| Error::InvalidUtf8)
}
