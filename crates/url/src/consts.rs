use regex::Regex;
use std::sync::LazyLock;

macro_rules! regex {
    ($name:ident, $regex:expr) => {
        pub(crate) static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($regex).unwrap());
    };
}

regex!(SCHEME_PREFIX, r"^([a-zA-Z][a-zA-Z0-9+.\-]*):/*");
regex!(MEDIA_QUERY, r"(?i)\.(mp4|webm|jpe?g|png|gif|webp)\?.*$");
regex!(TRACKING_PARAMETER, r"(\?|&)(utm_.*?|jsessionid|PHPSESSID|sid|ASPSESSIONID.*?)($|&|=(.*?)(&|$))");
regex!(REPEATED_AMPERSANDS, r"&{2,}");
regex!(INDEX_FILE, r"/index\.[^/?]{1,5}(\?|$)");
regex!(TRAILING_SLASH, r"/(\?|$)");

/// Sibling extensions, searched in order; the first group holding the
/// extension wins.
pub(crate) const FILETYPE_GROUPS: &[&[&str]] = &[
    &["jpg", "jpeg", "gif", "png", "webp", "mp4", "webm"],
    &["mp4", "webm"],
];

/// Rounds before a URL (or its host) that keeps changing is given up on.
pub(crate) const MAX_RULE_PASSES: usize = 8;
