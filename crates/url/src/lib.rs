//! URL canonicalization for archive lookups.
//!
//! [`Canonicalizer::canonicalize`] turns one URL into an ordered list of
//! equivalent URLs. The steps are, in order:
//!
//! 1. Scheme and slash cleanup, host lowercasing, percent-encoding of
//!    non-ASCII bytes
//! 2. Regex rule tiers from [`mirror_config::CanonicalTables`], global rules
//!    then host rules, repeated while a rule moves the URL to another host
//! 3. Fragment removal, media query removal, tracking parameter removal
//! 4. Trailing `/index.*` and `/` removal
//! 5. Media filetype expansion
//!
//! Each step can be switched with [`Flags`]. Canonicalization is
//! deterministic and idempotent for a fixed rule set.
//!
//! ```
//! use mirror_url::{Canonicalizer, Flags};
//!
//! let canonicalizer = Canonicalizer::empty();
//! let urls = canonicalizer.canonicalize("http://Example.com//a/index.html#top", Flags::NONE);
//! assert_eq!(urls, vec!["https://example.com/a".to_string()]);
//! ```

mod canonicalize;
mod consts;
pub mod error;
mod flags;
mod parts;

pub use crate::canonicalize::Canonicalizer;
pub use crate::flags::Flags;
pub use crate::parts::UrlParts;
