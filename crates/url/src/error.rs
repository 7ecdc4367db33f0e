//! URL Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A URL error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for URL operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A canonicalization rule doesn't compile. Fix the rule table.
    #[display("invalid canonicalization pattern for {host}: {pattern}")]
    InvalidPattern {
        #[error(not(source))]
        host: String,
        #[error(not(source))]
        pattern: String,
    },
    /// The input can't be parsed as an absolute URL.
    #[display("invalid URL: {_0}")]
    InvalidUrl(#[error(not(source))] String),
    /// Rule tables could not be loaded.
    #[display("canonicalization rules unavailable")]
    Config,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
