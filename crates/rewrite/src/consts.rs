use regex::Regex;
use scraper::Selector;
use std::sync::LazyLock;

macro_rules! regex {
    ($name:ident, $regex:expr) => {
        pub(crate) static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($regex).unwrap());
    };
}

macro_rules! bytes_regex {
    ($name:ident, $regex:expr) => {
        pub(crate) static $name: LazyLock<regex::bytes::Regex> =
            LazyLock::new(|| regex::bytes::Regex::new($regex).unwrap());
    };
}

macro_rules! selector {
    ($name:ident, $css:expr) => {
        pub(crate) static $name: LazyLock<Selector> = LazyLock::new(|| Selector::parse($css).unwrap());
    };
}

/// Bytes sniffed when nothing declares a content type.
pub(crate) const SNIFF_LENGTH: usize = 1024;
bytes_regex!(HTML_SIGNATURE, r"(?i-u)^(?:\s|\xEF|\xBB|\xBF)*(?:<!--|<!DOCTYPE|<html|<head)");

// Link interceptor.
regex!(EXCESS_SLASHES, r"^(https?://)/*");

// HTML pass, before parsing.
regex!(BASE_HREF, r#"(?is)<base href="(.+?)">"#);
regex!(CONDITIONAL_COMMENT, r"(?is)<!--\[if[a-zA-Z0-9 ]+\]>.+?-->");
regex!(CONDITIONAL_ENDIF, r"(?is)<!-- ?<!\[endif\]-->");
regex!(NOSCRIPT_IN_HEAD, r"(?is)<noscript[^>]*>(.*?)</noscript>(.*?)</head>(.*?)<body([^>]*)>");
regex!(NOSCRIPT, r"(?is)<noscript[^>]*>(.*?)</noscript>");
regex!(SCRIPT, r"(?is)<script([^>]*)>(.*?)</script>");
regex!(SCRIPT_TYPE, r#"(?i)\btype\s*=\s*["']?([^"'\s>]+)"#);
regex!(HEAD_OPEN, r"(?i)<head(?:\s[^>]*)?>");
regex!(HEAD_CLOSE, r"(?i)</head\s*>");
regex!(HTML_OPEN, r"(?is)<html(.*?)>");
regex!(ESCAPED_DOCTYPE, r#"<!DOCTYPE HTML PUBLIC \\"(.+)\\">"#);

// HTML pass, on the parsed document.
regex!(META_REFRESH_URL, r"(?is)^(.*)url=([^ ;]+)(.*)$");
selector!(STYLE_ELEMENTS, "style");
selector!(SOCIAL_IMAGE, r#"meta[property="og:image"], meta[property="twitter:image"], meta[name="twitter:image"]"#);

// CSS pass.
regex!(CSS_URL, r#"(?is)url\((?:"(.+?)"|'(.+?)'|(.+?))\)"#);

// JavaScript pass.
regex!(BLOCK_COMMENT, r"(?s)/\*.*?\*/");
regex!(LINE_COMMENT, r"(?m)^\s*//.*$");
regex!(QUOTED_DIRECTORY, r#""(/?(?:[a-zA-Z0-9_\-]+/)+)"|'(/?(?:[a-zA-Z0-9_\-]+/)+)'"#);

/// Media types rewritten by the JavaScript pass.
pub(crate) const JAVASCRIPT_TYPES: &[&str] = &[
    "text/javascript",
    "application/javascript",
    "application/x-javascript",
    "application/ecmascript",
    "text/ecmascript",
];

/// Hosts the anywhere heuristic never rewrites.
pub(crate) const ANYWHERE_EXCLUDED_HOSTS: &[&str] = &["localhost", "youtube.com", "www.youtube.com"];
