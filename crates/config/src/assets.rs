//! Built-in configuration files.
//!
//! Default site rules and canonicalization tables ship inside the binary via
//! [`rust-embed`](rust_embed) so a fresh install can replay without any
//! configuration on disk. User files are layered on top of these.

use crate::error::{ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use rust_embed::Embed;

#[derive(Embed)]
#[folder = "../../assets/config/"]
pub struct Builtins;
impl Builtins {
    /// Load a built-in file as UTF-8 text.
    pub fn text(name: impl AsRef<str>) -> Result<String> {
        let name = name.as_ref();
        let file = Self::get(name).ok_or_raise(|| ErrorKind::AssetNotFound(name.to_string()))?;
        String::from_utf8(file.data.into_owned()).or_raise(|| ErrorKind::Invalid(format!("builtin:{name}")))
    }

    pub fn exists(name: impl AsRef<str>) -> bool {
        Self::get(name.as_ref()).is_some()
    }
}
