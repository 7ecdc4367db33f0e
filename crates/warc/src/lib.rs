//! WARC container records.
//!
//! - [`WarcReader`]: parses records one at a time from a buffered stream,
//!   including the HTTP response embedded in `response` and `revisit`
//!   records, and can merge consecutive records for the same URI
//! - [`ArchivedRecord`]: one parsed record with its single-owner [`Body`],
//!   decoding helpers and [`Provenance`]
//! - [`WarcWriter`]: serializes HTTP records, recomputing `Content-Length`
//!   and holding an exclusive file lock per record
//! - [`WriterPool`]: the shared set of open output files, keyed by host
//!
//! ```
//! use mirror_warc::WarcReader;
//!
//! let data = "WARC/1.0\r\nWARC-Type: metadata\r\nContent-Length: 4\r\n\r\nk: v\r\n\r\n";
//! let mut reader = WarcReader::new(data.as_bytes());
//! let mut record = reader.next_record().unwrap().unwrap();
//! assert_eq!(record.body_as_metadata().unwrap().get("k"), Some("v"));
//! assert!(reader.next_record().unwrap().is_none());
//! ```

mod body;
pub mod error;
mod headers;
mod pool;
mod reader;
mod record;
mod writer;

pub use crate::body::{Body, DEFAULT_SPOOL_THRESHOLD};
pub use crate::headers::Headers;
pub use crate::pool::{PooledWriter, WriterPool};
pub use crate::reader::{Records, WarcReader};
pub use crate::record::{
    ArchivedRecord, HTTP_RESPONSE_TYPES, HttpHead, IndexHints, Provenance, SUPPORTED_REVISIT_PROFILE,
};
pub use crate::writer::{RecordSink, WarcWriter};
