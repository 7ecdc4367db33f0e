use crate::Encoding;
use std::fmt::{Display, Formatter, Result as FmtResult};

impl Display for Encoding {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

impl AsRef<str> for Encoding {
    fn as_ref(&self) -> &'static str {
        self.as_str()
    }
}

impl Encoding {
    /// The `Content-Encoding` token for this coding.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Encoding::Identity => "identity",
            #[cfg(feature = "brotli")]
            Encoding::Brotli => "br",
            Encoding::Bzip2 => "bzip2",
            Encoding::Deflate => "deflate",
            Encoding::Gzip => "gzip",
            #[cfg(feature = "xz")]
            Encoding::Xz => "xz",
            #[cfg(feature = "zstd")]
            Encoding::Zstd => "zstd",
        }
    }
}
