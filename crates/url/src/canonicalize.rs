use crate::consts::{
    FILETYPE_GROUPS, INDEX_FILE, MAX_RULE_PASSES, MEDIA_QUERY, REPEATED_AMPERSANDS, SCHEME_PREFIX,
    TRACKING_PARAMETER, TRAILING_SLASH,
};
use crate::error::{ErrorKind, Result};
use crate::flags::Flags;
use exn::ResultExt;
use mirror_config::{CanonicalTables, RuleTable};
use regex::Regex;
use std::collections::HashMap;
use std::fmt::Write;

type CompiledRules = HashMap<String, Vec<(Regex, String)>>;

/// Produces the ordered equivalence class of a URL.
///
/// Construct once from the rule tables and share; canonicalization itself
/// holds no state.
#[derive(Debug, Clone, Default)]
pub struct Canonicalizer {
    certain: CompiledRules,
    duplicate: CompiledRules,
    uncertain: CompiledRules,
}

impl Canonicalizer {
    pub fn new(tables: &CanonicalTables) -> Result<Self> {
        let canonicalizer = Self {
            certain: compile(&tables.certain)?,
            duplicate: compile(&tables.duplicate)?,
            uncertain: compile(&tables.uncertain)?,
        };
        tracing::debug!(
            certain = canonicalizer.certain.len(),
            duplicate = canonicalizer.duplicate.len(),
            uncertain = canonicalizer.uncertain.len(),
            "compiled canonicalization rules"
        );
        Ok(canonicalizer)
    }

    /// Canonicalizer over the built-in rule tables.
    pub fn builtin() -> Result<Self> {
        let tables = CanonicalTables::builtin().or_raise(|| ErrorKind::Config)?;
        Self::new(&tables)
    }

    /// Canonicalizer with no rewrite rules; only the structural steps run.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Every URL considered equivalent to `url`, most canonical first.
    ///
    /// Callers query in this order and the first hit wins, so the order is
    /// part of the contract. The list is never empty and holds no duplicates.
    #[tracing::instrument(level = "trace", skip(self), ret)]
    pub fn canonicalize(&self, url: &str, flags: Flags) -> Vec<String> {
        let mut url = clean_url(url, flags);
        // Stripping a trailing file or query can expose an ending a rule
        // anchors on, so rules and clean-ups repeat until neither changes.
        let mut settled = false;
        for _ in 0..MAX_RULE_PASSES {
            let next = self.normalize(&url, flags);
            if next == url {
                settled = true;
                break;
            }
            url = next;
        }
        if !settled {
            tracing::warn!(%url, "canonicalization did not settle");
        }
        if flags.contains(Flags::FILETYPE_EQUIVALENTS) {
            filetype_equivalents(url)
        } else {
            vec![url]
        }
    }

    /// The single most canonical form under default flags.
    pub fn canonical(&self, url: &str) -> String {
        self.canonicalize(url, Flags::NONE).into_iter().next().unwrap_or_default()
    }

    /// One round of rule tiers, query clean-up and trailing-file removal.
    fn normalize(&self, url: &str, flags: Flags) -> String {
        let url = self.apply_rules(url.to_string(), flags);
        let url = clean_query_string(&url, flags);
        match flags.contains(Flags::NO_TRAILING_SLASH) {
            true => url,
            false => clean_trailing_file(&url),
        }
    }

    fn apply_rules(&self, mut url: String, flags: Flags) -> String {
        let mut tiers = Vec::with_capacity(3);
        if flags.contains(Flags::DUPLICATES) {
            tiers.push(&self.duplicate);
        }
        if flags.contains(Flags::UNCERTAIN_DUPLICATES) {
            tiers.push(&self.uncertain);
        }
        if !flags.contains(Flags::NO_CERTAIN_DUPLICATES) {
            tiers.push(&self.certain);
        }
        if tiers.is_empty() {
            return url;
        }

        for _ in 0..MAX_RULE_PASSES {
            let host = host_of(&url).to_string();
            for tier in &tiers {
                url = apply(tier.get("*"), url);
            }
            for tier in &tiers {
                url = apply(tier.get(&host), url);
            }
            if host_of(&url) == host {
                return url;
            }
            tracing::trace!(from = %host, to = %host_of(&url), "rewrite changed host");
        }
        tracing::warn!(%url, "canonicalization rules did not settle on a host");
        url
    }
}

fn compile(table: &RuleTable) -> Result<CompiledRules> {
    table
        .iter()
        .map(|(host, rules)| {
            let compiled = rules
                .iter()
                .map(|(pattern, replacement)| {
                    let regex = Regex::new(pattern).or_raise(|| ErrorKind::InvalidPattern {
                        host: host.to_string(),
                        pattern: pattern.clone(),
                    })?;
                    Ok((regex, replacement.clone()))
                })
                .collect::<Result<Vec<_>>>()?;
            Ok((host.to_ascii_lowercase(), compiled))
        })
        .collect()
}

fn apply(rules: Option<&Vec<(Regex, String)>>, url: String) -> String {
    rules.into_iter().flatten().fold(url, |url, (regex, replacement)| {
        regex.replace_all(&url, replacement.as_str()).into_owned()
    })
}

/// Host portion of a `scheme://host/...` string, without credentials or port.
pub(crate) fn host_of(url: &str) -> &str {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let authority = &rest[..rest.find(['/', '?', '#']).unwrap_or(rest.len())];
    let host = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
    host.split_once(':').map_or(host, |(host, _)| host)
}

fn clean_url(url: &str, flags: Flags) -> String {
    let url = url.trim();
    let url = url.split_once('#').map_or(url, |(url, _)| url);
    let mut url = SCHEME_PREFIX
        .replace(url, |captures: &regex::Captures| {
            let scheme = captures[1].to_ascii_lowercase();
            if scheme == "http" && !flags.contains(Flags::NO_HTTPS_EXPANSION) {
                "https://".to_string()
            } else {
                format!("{scheme}://")
            }
        })
        .into_owned();

    let authority_start = url.find("://").map_or(0, |i| i + 3);
    let authority_end = url[authority_start..]
        .find(['/', '?', '#'])
        .map_or(url.len(), |i| authority_start + i);
    let authority = url[authority_start..authority_end].to_ascii_lowercase();
    url.replace_range(authority_start..authority_end, &authority);

    let collapsed = collapse_slashes(&url[authority_end..]);
    url.truncate(authority_end);
    url.push_str(&collapsed);
    percent_encode_high_bytes(&url)
}

/// Runs of `/` become one, except a `//` directly after `:` (embedded URLs).
fn collapse_slashes(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut run = 0;
    let mut after_colon = false;
    let mut previous = None;
    for c in path.chars() {
        if c == '/' {
            if run == 0 {
                after_colon = previous == Some(':');
            }
            run += 1;
            if run == 1 || (run == 2 && after_colon) {
                out.push(c);
            }
        } else {
            run = 0;
            out.push(c);
        }
        previous = Some(c);
    }
    out
}

fn percent_encode_high_bytes(url: &str) -> String {
    let mut out = String::with_capacity(url.len());
    for byte in url.bytes() {
        if byte >= 0x80 {
            // Writing to a String can't fail.
            let _ = write!(out, "%{byte:02X}");
        } else {
            out.push(byte as char);
        }
    }
    out
}

fn clean_query_string(url: &str, flags: Flags) -> String {
    let mut url = url.to_string();
    if !flags.contains(Flags::NO_IMAGE_QUERY_REMOVAL) {
        url = MEDIA_QUERY.replace(&url, ".$1").into_owned();
    }
    loop {
        let stripped = TRACKING_PARAMETER.replace_all(&url, "$1").into_owned();
        if stripped == url {
            break;
        }
        url = stripped;
    }
    url = REPEATED_AMPERSANDS.replace_all(&url, "&").into_owned();
    url = url.replace("?&", "?");
    while url.ends_with('&') || url.ends_with('?') {
        url.pop();
    }
    url
}

fn clean_trailing_file(url: &str) -> String {
    let mut url = url.to_string();
    loop {
        let cleaned = INDEX_FILE.replace(&url, "$1");
        let cleaned = TRAILING_SLASH.replace(&cleaned, "$1").into_owned();
        if cleaned == url || cleaned.ends_with(':') {
            return url;
        }
        url = cleaned;
    }
}

fn filetype_equivalents(url: String) -> Vec<String> {
    let path_end = url.find('?').unwrap_or(url.len());
    let Some(dot) = url[..path_end].rfind('.').filter(|&dot| !url[dot..path_end].contains('/')) else {
        return vec![url];
    };
    let extension = url[dot + 1..path_end].to_ascii_lowercase();
    let Some(group) = FILETYPE_GROUPS.iter().find(|group| group.contains(&extension.as_str())) else {
        return vec![url];
    };

    let mut variants = Vec::with_capacity(group.len());
    for sibling in group.iter().filter(|&&sibling| sibling != extension) {
        variants.push(format!("{}{}{}", &url[..=dot], sibling, &url[path_end..]));
    }
    variants.insert(0, url);
    variants
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn canonicalizer() -> Canonicalizer {
        Canonicalizer::builtin().unwrap()
    }

    #[test]
    fn golden_default_canonicalization() {
        let urls = canonicalizer().canonicalize("http://Example.com//a//b/index.html?utm_source=x&y=2#frag", Flags::NONE);
        assert_eq!(urls, vec!["https://example.com/a/b?y=2".to_string()]);
    }

    #[rstest]
    #[case("http://Example.com//a//b/index.html?utm_source=x&y=2#frag")]
    #[case("https://www.example.com/path/?PHPSESSID=abc&&q=1&")]
    #[case("HTTP://mobile.twitter.com:443/user/")]
    #[case("https://example.com/caf\u{e9}/index.php")]
    #[case("https://example.com/photo.JPG?w=100")]
    #[case("https://example.com/")]
    #[case("https://x.com/a.php/")]
    #[case("https://m.example.com/shop/index.aspx?sid=1")]
    fn canonicalization_is_idempotent(#[case] url: &str) {
        let canonicalizer = canonicalizer();
        for flags in [Flags::NONE, Flags::DUPLICATES | Flags::UNCERTAIN_DUPLICATES] {
            let once = canonicalizer.canonicalize(url, flags);
            let twice = canonicalizer.canonicalize(&once[0], flags);
            assert_eq!(once, twice, "{url} with {flags:?}");
        }
    }

    #[rstest]
    #[case("http://example.com/a", Flags::NONE, "https://example.com/a")]
    #[case("http://example.com/a", Flags::NO_HTTPS_EXPANSION, "http://example.com/a")]
    #[case("https:/example.com/a", Flags::NONE, "https://example.com/a")]
    #[case("https:///example.com/a", Flags::NONE, "https://example.com/a")]
    #[case("https://example.com/a?u=https://other.test//x", Flags::NONE, "https://example.com/a?u=https://other.test/x")]
    #[case("https://example.com/a/", Flags::NO_TRAILING_SLASH, "https://example.com/a/")]
    #[case("https://example.com/a/index.php", Flags::NO_TRAILING_SLASH, "https://example.com/a/index.php")]
    #[case("https://example.com/x.png?w=10", Flags::NONE, "https://example.com/x.png")]
    #[case("https://example.com/x.png?w=10", Flags::NO_IMAGE_QUERY_REMOVAL, "https://example.com/x.png?w=10")]
    #[case("https://example.com/p?a=1&sid=2&b=3", Flags::NONE, "https://example.com/p?a=1&b=3")]
    #[case("https://example.com/p?sidebar=1", Flags::NONE, "https://example.com/p?sidebar=1")]
    #[case("https://example.com/p?utm_a=1&utm_b=2", Flags::NONE, "https://example.com/p")]
    #[case("https://example.com/p?", Flags::NONE, "https://example.com/p")]
    #[case("https://example.com:443/p", Flags::NONE, "https://example.com/p")]
    #[case("https://example.com:443/p", Flags::NO_CERTAIN_DUPLICATES, "https://example.com:443/p")]
    fn structural_steps(#[case] input: &str, #[case] flags: Flags, #[case] expected: &str) {
        assert_eq!(canonicalizer().canonicalize(input, flags), vec![expected.to_string()]);
    }

    #[rstest]
    #[case("https://x.com/a.php/", "https://x.com/a")]
    #[case("https://x.com/a.php?utm_source=feed", "https://x.com/a")]
    #[case("https://x.com/a.jsp#top", "https://x.com/a")]
    fn rules_see_the_cleaned_ending(#[case] input: &str, #[case] expected: &str) {
        let urls = canonicalizer().canonicalize(input, Flags::DUPLICATES | Flags::UNCERTAIN_DUPLICATES);
        assert_eq!(urls, vec![expected.to_string()]);
    }

    #[test]
    fn fragments_are_dropped_before_rules_run() {
        let tables = CanonicalTables::from_toml_strs(r##""*" = [["#keep$", "/kept"]]"##, "", "").unwrap();
        let canonicalizer = Canonicalizer::new(&tables).unwrap();
        assert_eq!(canonicalizer.canonical("https://a.test/page#keep"), "https://a.test/page");
    }

    #[test]
    fn high_bytes_are_percent_encoded() {
        assert_eq!(canonicalizer().canonical("https://example.com/caf\u{e9}"), "https://example.com/caf%C3%A9");
    }

    #[test]
    fn filetype_equivalents_are_stable() {
        let urls = canonicalizer().canonicalize("https://x.com/img/photo.jpg", Flags::FILETYPE_EQUIVALENTS);
        let expected: Vec<_> = ["jpg", "jpeg", "gif", "png", "webp", "mp4", "webm"]
            .iter()
            .map(|ext| format!("https://x.com/img/photo.{ext}"))
            .collect();
        assert_eq!(urls, expected);
    }

    #[test]
    fn filetype_equivalents_keep_original_first() {
        let urls = canonicalizer().canonicalize("https://x.com/clip.webm", Flags::FILETYPE_EQUIVALENTS);
        assert_eq!(urls[0], "https://x.com/clip.webm");
        assert_eq!(urls.len(), 7);
        assert!(urls.contains(&"https://x.com/clip.jpg".to_string()));
    }

    #[rstest]
    #[case("https://x.com/page.html")]
    #[case("https://x.com/dir.jpg/page")]
    #[case("https://x.com/")]
    fn non_media_urls_are_not_expanded(#[case] url: &str) {
        assert_eq!(canonicalizer().canonicalize(url, Flags::FILETYPE_EQUIVALENTS).len(), 1);
    }

    #[test]
    fn host_rules_run_to_a_fixed_point() {
        let tables = CanonicalTables::from_toml_strs(
            r#"
                "a.test" = [["^https://a\\.test/", "https://b.test/"]]
                "b.test" = [["^https://b\\.test/", "https://c.test/"]]
            "#,
            "",
            "",
        )
        .unwrap();
        let canonicalizer = Canonicalizer::new(&tables).unwrap();
        assert_eq!(canonicalizer.canonical("https://a.test/page"), "https://c.test/page");
    }

    #[test]
    fn tiers_are_opt_in() {
        let canonicalizer = canonicalizer();
        assert_eq!(canonicalizer.canonical("https://www.example.com/a"), "https://www.example.com/a");
        assert_eq!(
            canonicalizer.canonicalize("https://www.example.com/a", Flags::DUPLICATES),
            vec!["https://example.com/a".to_string()]
        );
        assert_eq!(
            canonicalizer.canonicalize("https://m.example.com/a", Flags::UNCERTAIN_DUPLICATES),
            vec!["https://example.com/a".to_string()]
        );
        assert_eq!(canonicalizer.canonical("https://twitter.com/someone"), "https://x.com/someone");
    }

    #[test]
    fn invalid_rules_are_reported() {
        let tables = CanonicalTables::from_toml_strs(r#""*" = [["(unclosed", ""]]"#, "", "").unwrap();
        let err = Canonicalizer::new(&tables).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidPattern { host, .. } if host == "*"));
    }

    #[rstest]
    #[case("https://user@Host.test:8080/a", "Host.test")]
    #[case("https://host.test?q", "host.test")]
    #[case("host.test/a", "host.test")]
    fn host_extraction(#[case] url: &str, #[case] host: &str) {
        assert_eq!(host_of(url), host);
    }
}
