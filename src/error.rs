//! Error taxonomy for the container substrate.
//!
//! Mirrors the coarse-grained error kinds named by the design: out-of-memory
//! is fatal-by-default and never represented as a `Result` (see
//! [`crate::alloc::set_oom_handler`]); duplicate/missing keys and rejected
//! resizes are ordinary, non-fatal outcomes; `split_args` syntax errors are
//! the sole [`SyntaxError`]-shaped failure.

use std::fmt;

/// Failure outcomes for [`crate::dict::Dict`] structural operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DictError {
    /// `add` was called with a key that is already present.
    KeyExists,
    /// `delete` / `delete_no_free` was called with a key that is absent.
    KeyMissing,
    /// `expand` / `resize` was rejected because a rehash is already in
    /// progress, or because the requested capacity is smaller than `used`.
    RehashBusy,
}

impl fmt::Display for DictError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            DictError::KeyExists => "key already exists in dictionary",
            DictError::KeyMissing => "key not found in dictionary",
            DictError::RehashBusy => "operation rejected while a rehash is in progress",
        };
        f.write_str(reason)
    }
}

impl std::error::Error for DictError {}

/// Failure outcomes for [`crate::sds::Sds`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdsError {
    /// `split_args` encountered an unterminated or malformed quoted token:
    /// a closing quote not followed by whitespace (or end of input), or an
    /// unbalanced quote.
    UnbalancedQuotes,
}

impl fmt::Display for SdsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SdsError::UnbalancedQuotes => {
                f.write_str("unbalanced quotes or missing whitespace after closing quote")
            }
        }
    }
}

impl std::error::Error for SdsError {}

/// Umbrella error for call sites that want a single `Result` type across
/// both the dictionary and the dynamic string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreError {
    Dict(DictError),
    Sds(SdsError),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::Dict(e) => fmt::Display::fmt(e, f),
            CoreError::Sds(e) => fmt::Display::fmt(e, f),
        }
    }
}

impl std::error::Error for CoreError {}

impl From<DictError> for CoreError {
    fn from(e: DictError) -> Self {
        CoreError::Dict(e)
    }
}

impl From<SdsError> for CoreError {
    fn from(e: SdsError) -> Self {
        CoreError::Sds(e)
    }
}
