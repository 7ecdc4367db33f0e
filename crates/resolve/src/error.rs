//! Resolver Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A resolver error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for resolver operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Nothing in the archive answers this request. Serve a 404.
    #[display("not found: {_0}")]
    NotFound(#[error(not(source))] String),
    /// A helper program could not be run or exited unsuccessfully.
    #[display("external process failed: {_0}")]
    ExternalProcess(#[error(not(source))] String),
    /// The index service failed to answer.
    #[display("index unavailable")]
    Index,
    /// A container record couldn't be parsed at the indexed position.
    #[display("malformed container record")]
    Format,
    /// A container name tried to escape the archive root.
    #[display("invalid path: {}", _0.display())]
    InvalidPath(#[error(not(source))] PathBuf),
    /// Rule or site configuration couldn't be loaded.
    #[display("configuration unavailable")]
    Config,
    #[display("I/O error")]
    Io,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Index | ErrorKind::Io)
    }
}
