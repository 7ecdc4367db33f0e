//! Decoding of HTTP payloads as they are stored inside archive records.
//!
//! Captured responses keep the bytes exactly as the origin server sent them,
//! which means bodies are frequently still chunked and compressed. This crate
//! undoes both layers:
//!
//! - **Content codings** via the [`Encoding`] enum, detected from a
//!   `Content-Encoding` header ([`Encoding::from_header`])
//! - **Transfer coding** via [`ChunkedDecoder`], a [`Read`](std::io::Read)
//!   adapter for `Transfer-Encoding: chunked`
//! - **Sniffing** via [`PeekableReader`], used to look at the start of a
//!   decoded body before deciding how to serve it
//!
//! Gzip, deflate and bzip2 are always available. Brotli and Zstd are enabled
//! by default because browsers advertise them; XZ is opt-in.

mod chunked;
mod construct;
pub mod error;
mod ops;
mod peekable;
mod util;

pub use crate::chunked::ChunkedDecoder;
pub use crate::peekable::PeekableReader;

/// An HTTP content coding.
///
/// Variants gated behind feature flags (`brotli`, `xz`, `zstd`) are only
/// available when the corresponding feature is enabled. Defaults to
/// [`Identity`](Self::Identity).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// No transformation
    #[default]
    Identity,
    /// Brotli (`br`)
    #[cfg(feature = "brotli")]
    Brotli,
    /// Bzip2 (`bzip2`, `x-bzip2`)
    Bzip2,
    /// Zlib-wrapped deflate (`deflate`)
    Deflate,
    /// Gzip (`gzip`, `x-gzip`)
    Gzip,
    /// XZ/LZMA (`xz`)
    #[cfg(feature = "xz")]
    Xz,
    /// Zstd (`zstd`)
    #[cfg(feature = "zstd")]
    Zstd,
}
