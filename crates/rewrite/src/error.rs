//! Rewrite Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use mirror_resolve::error::{Error as ResolveError, ErrorKind as ResolveErrorKind};
use mirror_warc::error::{Error as RecordError, ErrorKind as RecordErrorKind};

/// A rewrite error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for rewrite operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The record's body couldn't be read or decoded.
    #[display("record error: {_0}")]
    Record(RecordErrorKind),
    /// A secondary lookup failed.
    #[display("resolve error: {_0}")]
    Resolve(ResolveErrorKind),
    /// A media tool is missing or failed. Only the requested representation
    /// is affected.
    #[display("external process failed: {_0}")]
    ExternalProcess(#[error(not(source))] String),
    /// Site rules couldn't be resolved.
    #[display("site configuration unavailable")]
    Config,
}

impl ErrorKind {
    /// Convert a record error, preserving the warc crate's `Exn` frame as a
    /// child in this error tree.
    #[track_caller]
    pub fn record(err: RecordError) -> Error {
        let inner = (*err).clone();
        err.raise(ErrorKind::Record(inner))
    }

    /// Convert a resolver error, preserving its `Exn` frame.
    #[track_caller]
    pub fn resolve(err: ResolveError) -> Error {
        let inner = (*err).clone();
        err.raise(ErrorKind::Resolve(inner))
    }

    /// Whether the request should be answered with "not found".
    pub fn is_not_found(&self) -> bool {
        matches!(self, ErrorKind::Resolve(ResolveErrorKind::NotFound(_)))
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ErrorKind::Record(kind) => kind.is_retryable(),
            ErrorKind::Resolve(kind) => kind.is_retryable(),
            ErrorKind::ExternalProcess(_) | ErrorKind::Config => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_passes_through() {
        assert!(ErrorKind::Resolve(ResolveErrorKind::NotFound("x".into())).is_not_found());
        assert!(!ErrorKind::Resolve(ResolveErrorKind::Index).is_not_found());
        assert!(ErrorKind::Resolve(ResolveErrorKind::Index).is_retryable());
        assert!(!ErrorKind::ExternalProcess("ffmpeg".into()).is_retryable());
    }

    #[test]
    fn child_errors_keep_their_kind() {
        let child: ResolveError = exn::Exn::from(ResolveErrorKind::NotFound("https://x.test/".into()));
        let err = ErrorKind::resolve(child);
        assert!(err.is_not_found());
    }
}
