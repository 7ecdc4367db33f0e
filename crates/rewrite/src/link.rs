//! Turning archived links into replay links.

use crate::consts::{ANYWHERE_EXCLUDED_HOSTS, EXCESS_SLASHES};
use crate::context::Outlinks;
use crate::javascript;
use crate::representation::Representation;
use mirror_config::{SiteConfig, SiteConfigs};
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::Arc;
use url::Url;

/// Heuristic patterns built from a site's resource extensions.
pub(crate) struct SitePatterns {
    /// Absolute URLs in free text.
    pub(crate) anywhere: Option<Regex>,
    /// Bare paths ending in a known extension, anywhere in a script.
    pub(crate) suspect_file: Option<Regex>,
    /// Quoted paths ending in a known extension.
    pub(crate) suspect_string: Option<Regex>,
    /// Values that end like a resource or a directory.
    url_like: Option<Regex>,
}

impl SitePatterns {
    pub(crate) fn new(site: &SiteConfig) -> Self {
        let extensions = site
            .find_urls_with_extensions
            .iter()
            .map(|ext| ext.trim_start_matches('.'))
            .filter(|ext| !ext.is_empty())
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join("|");
        let ending = match extensions.is_empty() {
            true => "/".to_string(),
            false => format!(r"(?:/|\.(?:{extensions}))"),
        };

        let anywhere = match site.find_urls_anywhere {
            true => compile(&format!(
                r#"(?i)https?://[^ "'<>]*{ending}(?:\?[^"'&<>?= ]+(?:=[^"'&<>?= ]*)?(?:&[^"'&<>?= ]+(?:=[^"'&<>?= ]*)?)*)?"#
            )),
            false => None,
        };
        let (suspect_file, suspect_string) = match extensions.is_empty() {
            true => (None, None),
            false => {
                let file = format!(r"(?i)([a-zA-Z0-9_\-/]+\.(?:{extensions}))([^a-zA-Z0-9]|$)");
                let string = ["\"", "'"]
                    .map(|q| {
                        format!(
                            r"{q}([a-zA-Z0-9_\-/.]+\.(?:{extensions})(?:\?[^{q}&<>? ]+(?:=[^{q}&<>? ]*)?(?:&[^{q}&<>? ]+(?:=[^{q}&<>? ]*)?)*)?){q}"
                        )
                    })
                    .join("|");
                (compile(&file), compile(&format!("(?i){string}")))
            },
        };

        let url_like = compile(&format!(r"(?i){ending}$"));
        Self { anywhere, suspect_file, suspect_string, url_like }
    }
}

/// A site's redirect rules, compiled once and applied in order.
pub(crate) struct Redirects(Vec<(Regex, String)>);

impl Redirects {
    pub(crate) fn new(site: &SiteConfig) -> Self {
        let rules = site
            .redirects
            .iter()
            .filter_map(|redirect| match Regex::new(&redirect.find) {
                Ok(pattern) => Some((pattern, redirect.replace.clone())),
                Err(err) => {
                    tracing::warn!(pattern = %redirect.find, error = %err, "skipping invalid redirect rule");
                    None
                },
            })
            .collect();
        Self(rules)
    }

    pub(crate) fn apply(&self, url: String) -> String {
        self.0.iter().fold(url, |url, (pattern, replace)| pattern.replace_all(&url, replace.as_str()).into_owned())
    }
}

fn compile(pattern: &str) -> Option<Regex> {
    Regex::new(pattern)
        .inspect_err(|err| tracing::warn!(error = %err, "site extension list produced an invalid pattern"))
        .ok()
}

/// Rewrites every link found in one document, resolving it against the
/// document (or its `<base href>`) and recording what it resolved to.
pub struct LinkInterceptor<'a> {
    /// Replay host, with a trailing slash.
    host: String,
    sites: &'a SiteConfigs,
    site: Arc<SiteConfig>,
    patterns: Arc<SitePatterns>,
    /// Compiled redirect rules of each target host seen so far.
    redirects: HashMap<String, Redirects>,
    document: Option<Url>,
    base: Option<Url>,
    outlinks: Outlinks,
}

impl<'a> LinkInterceptor<'a> {
    pub fn new(host: &str, sites: &'a SiteConfigs, site: Arc<SiteConfig>, document: Option<&str>) -> Self {
        let patterns = Arc::new(SitePatterns::new(&site));
        Self {
            host: format!("{}/", host.trim_end_matches('/')),
            sites,
            site,
            patterns,
            redirects: HashMap::new(),
            document: document.and_then(|uri| Url::parse(uri).ok()),
            base: None,
            outlinks: Outlinks::default(),
        }
    }

    /// Resolve further links against `href` (itself resolved against the
    /// document) instead of the document URL.
    pub fn set_base(&mut self, href: &str) {
        let base = match &self.document {
            Some(document) => document.join(href),
            None => Url::parse(href),
        };
        match base {
            Ok(base) => self.base = Some(base),
            Err(err) => tracing::debug!(href, error = %err, "ignoring unusable base URL"),
        }
    }

    /// Rules for the page being rewritten.
    pub fn site(&self) -> Arc<SiteConfig> {
        Arc::clone(&self.site)
    }

    pub(crate) fn patterns(&self) -> Arc<SitePatterns> {
        Arc::clone(&self.patterns)
    }

    pub fn outlinks(&self) -> &Outlinks {
        &self.outlinks
    }

    pub fn into_outlinks(self) -> Outlinks {
        self.outlinks
    }

    /// The replay URL for `url`, as found in the document.
    ///
    /// `data:` URLs and bare fragments are returned unchanged, as are links
    /// already pointing at the replay host and anything that can't be
    /// resolved. `javascript:` URLs keep their scheme and have their body
    /// rewritten.
    pub fn format_url(&mut self, url: &str, hint: Representation) -> String {
        let trimmed = url.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || starts_with_ignore_case(trimmed, "data:") {
            return url.to_string();
        }
        if starts_with_ignore_case(trimmed, "javascript:") {
            return format!("javascript:{}", javascript::rewrite(&trimmed["javascript:".len()..], true, self));
        }
        let collapsed = EXCESS_SLASHES.replace(trimmed, "$1");
        if collapsed.starts_with(&self.host) {
            return url.to_string();
        }

        let resolved = match self.base.as_ref().or(self.document.as_ref()) {
            Some(base) => base.join(&collapsed),
            None => Url::parse(&collapsed),
        };
        let (host, resolved) = match resolved {
            Ok(resolved) => (resolved.host_str().unwrap_or_default().to_string(), String::from(resolved)),
            Err(err) => {
                tracing::debug!(url, error = %err, "leaving unresolvable link alone");
                return url.to_string();
            },
        };
        self.outlinks.push(resolved.clone());

        let site = self.sites.for_url(&resolved).unwrap_or_else(|err| {
            tracing::warn!(url = %resolved, error = %err, "site rules unavailable, using the page's");
            Arc::clone(&self.site)
        });
        if site.use_passthru {
            return url.to_string();
        }

        let target = self.redirects.entry(host).or_insert_with(|| Redirects::new(&site)).apply(resolved);

        match hint.prefix() {
            Some(prefix) => format!("{}_{prefix}/{target}", self.host),
            None => format!("{}{target}", self.host),
        }
    }

    /// Rewrite absolute URLs appearing anywhere in `text`, when the site
    /// asks for it.
    pub(crate) fn rewrite_anywhere(&mut self, text: &str) -> String {
        let patterns = self.patterns();
        let Some(anywhere) = patterns.anywhere.as_ref() else {
            return text.to_string();
        };
        anywhere
            .replace_all(text, |caps: &Captures| {
                let found = &caps[0];
                match is_excluded_host(found) {
                    true => found.to_string(),
                    false => self.format_url(found, Representation::None),
                }
            })
            .into_owned()
    }

    /// Whether an attribute value looks enough like a link to rewrite.
    pub(crate) fn is_url(&self, value: &str) -> bool {
        let value = value.trim();
        if value.is_empty() || value.starts_with(&self.host) {
            return false;
        }
        Url::parse(value).is_ok_and(|url| url.host_str().is_some())
            || self.patterns.url_like.as_ref().is_some_and(|url_like| url_like.is_match(value))
    }
}

fn is_excluded_host(url: &str) -> bool {
    Url::parse(url)
        .ok()
        .and_then(|url| url.host_str().map(str::to_ascii_lowercase))
        .is_some_and(|host| ANYWHERE_EXCLUDED_HOSTS.contains(&host.as_str()))
}

fn starts_with_ignore_case(value: &str, prefix: &str) -> bool {
    value.get(..prefix.len()).is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}
