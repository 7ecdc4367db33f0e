//! WARC Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A WARC error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for WARC operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The stream isn't a well-formed record at this position. Continuing
    /// would misalign every later read, so abandon the stream.
    #[display("malformed record: {_0}")]
    Format(#[error(not(source))] String),
    /// The operation isn't implemented for this kind of record.
    #[display("unsupported: {_0}")]
    Unsupported(#[error(not(source))] String),
    /// The body couldn't be de-chunked or decompressed.
    #[display("failed to decode record body")]
    Encoding,
    /// A target URI has no host to key an output file by.
    #[display("no host in target URI: {_0}")]
    InvalidTarget(#[error(not(source))] String),
    /// Site configuration couldn't be resolved for the record.
    #[display("site configuration unavailable")]
    Config,
    /// Reading, writing or locking a file failed.
    #[display("I/O error")]
    Io,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Io)
    }
}
