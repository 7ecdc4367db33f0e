//! Decoding Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A decoding error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for decoding operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Failed to initialize an encoder/decoder for the requested coding.
    Encoder,
    /// Payload is corrupt or does not match its declared coding. Don't retry
    /// with the same input.
    #[display("invalid or corrupted data")]
    InvalidData,
    /// The coding token is not one this crate understands.
    #[display("unsupported content coding: {_0}")]
    UnsupportedCoding(#[error(not(source))] String),
    /// The coding is understood but its feature flag is disabled.
    #[display("disabled content coding: {_0}")]
    DisabledCoding(#[error(not(source))] String),
    /// An I/O operation failed while writing decoded output.
    #[display("I/O error")]
    Io,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exn::ResultExt;

    #[test]
    fn error_kind_display() {
        assert_eq!(ErrorKind::InvalidData.to_string(), "invalid or corrupted data");
        assert_eq!(
            ErrorKind::UnsupportedCoding("compress".to_string()).to_string(),
            "unsupported content coding: compress"
        );
        assert_eq!(ErrorKind::DisabledCoding("xz".to_string()).to_string(), "disabled content coding: xz");
    }

    #[test]
    fn error_kind_retryable() {
        assert!(!ErrorKind::InvalidData.is_retryable());
        assert!(!ErrorKind::UnsupportedCoding("compress".to_string()).is_retryable());
        assert!(ErrorKind::Io.is_retryable());
    }

    #[test]
    fn error_from_io_result() {
        let result: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed"));
        let err: Result<()> = result.or_raise(|| ErrorKind::Io);
        assert_eq!(*err.unwrap_err(), ErrorKind::Io);
    }
}
