//! Token estimation utilities.
//!
//! Uses a character-based heuristic: ~4 bytes per token, rounded up.
//! The same rule applies to file sizes at index time and to loaded text,
//! so an unchanged file costs the same before and after it is read.

/// Estimate the token count for a string.
///
/// Heuristic: 1 token ≈ 4 bytes. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

/// Estimate the token count of a file from its size.
pub fn estimate_tokens_from_bytes(bytes: u64) -> usize {
    usize::try_from(bytes.div_ceil(4)).unwrap_or(usize::MAX)
}
