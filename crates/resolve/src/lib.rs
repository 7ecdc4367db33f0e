//! Finding archived records.
//!
//! - [`FileResolver`]: maps a container name onto a file below the archive
//!   root, decompressing `.br` containers into a size-bounded cache
//! - [`IndexResolver`]: asks an [`IndexService`] for the captures of a URL
//!   and follows revisits and redirects to the record that answers it
//! - [`Decompressor`]: the external `brotli` tool, or in-process decoding
//!
//! Everything here blocks. The `mock` feature adds [`MemoryIndex`] for other
//! crates' tests.

mod decompress;
pub mod error;
mod files;
mod index;
#[cfg(any(test, feature = "mock"))]
mod memory;
mod path;
mod resolver;

pub use crate::decompress::{BuiltinBrotli, Decompressor, DecompressorHandle, ExternalBrotli, PreferExternal};
pub use crate::files::FileResolver;
pub use crate::index::{Constraint, Field, IndexHandle, IndexQuery, IndexService, Locator, Sort};
#[cfg(any(test, feature = "mock"))]
pub use crate::memory::MemoryIndex;
pub use crate::resolver::{IndexResolver, MAX_MATCHES, Resolution};
