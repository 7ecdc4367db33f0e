use crate::Encoding;
use crate::error::{Error, ErrorKind, Result};
use std::str::FromStr;

impl FromStr for Encoding {
    type Err = Error;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "identity" | "none" => Ok(Encoding::Identity),
            #[cfg(feature = "brotli")]
            "br" | "brotli" => Ok(Encoding::Brotli),
            #[cfg(not(feature = "brotli"))]
            "br" | "brotli" => exn::bail!(ErrorKind::DisabledCoding(s.to_string())),
            "bzip2" | "x-bzip2" => Ok(Encoding::Bzip2),
            "deflate" => Ok(Encoding::Deflate),
            "gzip" | "x-gzip" => Ok(Encoding::Gzip),
            #[cfg(feature = "xz")]
            "xz" | "lzma" => Ok(Encoding::Xz),
            #[cfg(not(feature = "xz"))]
            "xz" | "lzma" => exn::bail!(ErrorKind::DisabledCoding(s.to_string())),
            #[cfg(feature = "zstd")]
            "zstd" => Ok(Encoding::Zstd),
            #[cfg(not(feature = "zstd"))]
            "zstd" => exn::bail!(ErrorKind::DisabledCoding(s.to_string())),
            _ => exn::bail!(ErrorKind::UnsupportedCoding(s.trim().to_string())),
        }
    }
}
impl Encoding {
    /// Parse a `Content-Encoding` header value into the list of codings, in
    /// the order the server applied them. `identity` entries are dropped.
    ///
    /// ```
    /// use mirror_encoding::Encoding;
    ///
    /// let codings = Encoding::from_header("gzip, deflate").unwrap();
    /// assert_eq!(codings, vec![Encoding::Gzip, Encoding::Deflate]);
    /// assert!(Encoding::from_header("identity").unwrap().is_empty());
    /// ```
    pub fn from_header(value: impl AsRef<str>) -> Result<Vec<Self>> {
        let mut codings = Vec::new();
        for token in value.as_ref().split(',').map(str::trim).filter(|t| !t.is_empty()) {
            match token.parse()? {
                Encoding::Identity => {},
                coding => codings.push(coding),
            }
        }
        Ok(codings)
    }
}

#[cfg(test)]
mod tests {
    use crate::Encoding;
    use crate::error::ErrorKind;
    use rstest::rstest;

    #[rstest]
    #[case("identity", Encoding::Identity)]
    #[case("gzip", Encoding::Gzip)]
    #[case("x-gzip", Encoding::Gzip)]
    #[case("GZIP", Encoding::Gzip)]
    #[case(" deflate ", Encoding::Deflate)]
    #[case("x-bzip2", Encoding::Bzip2)]
    #[cfg_attr(feature = "brotli", case("br", Encoding::Brotli))]
    #[cfg_attr(feature = "zstd", case("zstd", Encoding::Zstd))]
    #[cfg_attr(feature = "xz", case("xz", Encoding::Xz))]
    fn parses_coding_tokens(#[case] token: &str, #[case] expected: Encoding) {
        assert_eq!(token.parse::<Encoding>().unwrap(), expected);
    }

    #[test]
    fn rejects_unknown_coding() {
        let err = "compress".parse::<Encoding>().unwrap_err();
        assert_eq!(*err, ErrorKind::UnsupportedCoding("compress".to_string()));
    }

    #[rstest]
    #[case("", vec![])]
    #[case("gzip", vec![Encoding::Gzip])]
    #[case("identity, gzip", vec![Encoding::Gzip])]
    #[case("deflate,gzip", vec![Encoding::Deflate, Encoding::Gzip])]
    #[case("gzip,,", vec![Encoding::Gzip])]
    fn parses_header_lists(#[case] header: &str, #[case] expected: Vec<Encoding>) {
        assert_eq!(Encoding::from_header(header).unwrap(), expected);
    }

    #[test]
    fn header_with_unknown_token_fails() {
        assert!(Encoding::from_header("gzip, sdch").is_err());
    }
}
