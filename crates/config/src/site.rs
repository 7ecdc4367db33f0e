//! Per-site replay rules.
//!
//! Rules live in one TOML document with a `"*"` table plus one table per host.
//! The effective [`SiteConfig`] for a URL is the compiled defaults, overlaid
//! with `"*"`, overlaid with the table for the URL's host. Only keys a layer
//! actually sets are overridden, so a host table can flip a single flag.

use crate::assets::Builtins;
use crate::error::{ErrorKind, Result};
use crate::memo::Memo;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Format, Serialized, Toml};
use figment::value::Dict;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const GLOBAL_KEY: &str = "*";

/// Find/replace pair. `find` is literal in the replacement lists and a regex
/// in `redirects`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replacement {
    pub find: String,
    pub replace: String,
}

/// Set `attribute` to `value` on every element matching `selector`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeRule {
    pub selector: String,
    pub attribute: String,
    #[serde(default)]
    pub value: String,
}

/// Effective replay rules for one site.
///
/// Every flag gates one rewrite heuristic. Element targeting (`add_attributes`
/// and `delete_nodes`) uses CSS selectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Literal replacements on raw HTML before parsing.
    pub replacements_html_pre: Vec<Replacement>,
    /// Literal replacements on serialized HTML after rewriting.
    pub replacements_html_post: Vec<Replacement>,
    pub replacements_css_pre: Vec<Replacement>,
    pub replacements_css_post: Vec<Replacement>,
    pub replacements_javascript_pre: Vec<Replacement>,
    pub replacements_javascript_post: Vec<Replacement>,
    /// Strip scripts, unwrap `<noscript>`, drop inline handlers.
    pub deactivate_scripts: bool,
    pub javascript_strip_comments: bool,
    /// Rewrite absolute URLs found anywhere in HTML text and scripts.
    pub find_urls_anywhere: bool,
    /// Extensions that make a bare token look like a resource.
    pub find_urls_with_extensions: Vec<String>,
    pub find_urls_suspect_anywhere_in_javascript: bool,
    pub find_urls_suspect_anywhere_in_javascript_strings: bool,
    pub find_urls_suspect_directories_in_javascript_strings: bool,
    /// `background=` on `body`, `table`, `td` and `th`.
    pub find_urls_in_legacy_background_attributes: bool,
    pub find_urls_in_option_tags: bool,
    pub find_urls_in_all_html_attributes: bool,
    /// Extra lazy-loading attributes treated like `src`.
    pub find_urls_additional_src_attributes: Vec<String>,
    /// Leave links pointing at the live web.
    pub use_passthru: bool,
    /// Regex substitutions applied to resolved URLs before they are rewritten.
    pub redirects: Vec<Replacement>,
    pub add_attributes: Vec<AttributeRule>,
    pub delete_nodes: Vec<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            replacements_html_pre: Vec::new(),
            replacements_html_post: Vec::new(),
            replacements_css_pre: Vec::new(),
            replacements_css_post: Vec::new(),
            replacements_javascript_pre: Vec::new(),
            replacements_javascript_post: Vec::new(),
            deactivate_scripts: false,
            javascript_strip_comments: false,
            find_urls_anywhere: false,
            find_urls_with_extensions: ["jpg", "jpeg", "png", "gif", "webp", "css", "js", "mp4", "webm"]
                .map(String::from)
                .to_vec(),
            find_urls_suspect_anywhere_in_javascript: false,
            find_urls_suspect_anywhere_in_javascript_strings: false,
            find_urls_suspect_directories_in_javascript_strings: false,
            find_urls_in_legacy_background_attributes: true,
            find_urls_in_option_tags: false,
            find_urls_in_all_html_attributes: false,
            find_urls_additional_src_attributes: Vec::new(),
            use_passthru: false,
            redirects: Vec::new(),
            add_attributes: Vec::new(),
            delete_nodes: Vec::new(),
        }
    }
}

/// All site layers, with memoized per-host merges.
pub struct SiteConfigs {
    layers: HashMap<String, Dict>,
    merged: Memo<String, Arc<SiteConfig>>,
}

impl SiteConfigs {
    /// Built-in rules only.
    pub fn builtin() -> Result<Self> {
        Self::from_figment(Figment::from(Toml::string(&Builtins::text("sites.toml")?)), "builtin:sites.toml")
    }

    /// Built-in rules with a user file layered on top (if it exists).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Toml::string(&Builtins::text("sites.toml")?));
        let source = match path {
            Some(path) => {
                figment = figment.merge(Toml::file(path));
                path.display().to_string()
            },
            None => "builtin:sites.toml".to_string(),
        };
        Self::from_figment(figment, &source)
    }

    /// Rules from a TOML string, without the built-in layer.
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        Self::from_figment(Figment::from(Toml::string(toml)), "inline")
    }

    fn from_figment(figment: Figment, source: &str) -> Result<Self> {
        let layers: HashMap<String, Dict> = figment.extract().or_raise(|| ErrorKind::Invalid(source.to_string()))?;
        tracing::debug!(source, hosts = layers.len(), "loaded site rules");
        Ok(Self { layers, merged: Memo::new() })
    }

    /// Effective rules for `host` (`"*"` rules when the host has no table).
    pub fn for_host(&self, host: &str) -> Result<Arc<SiteConfig>> {
        let host = host.to_ascii_lowercase();
        self.merged.try_get_or_populate(host.clone(), Duration::ZERO, || {
            let mut figment = Figment::from(Serialized::defaults(SiteConfig::default()));
            for key in [GLOBAL_KEY, host.as_str()] {
                if let Some(layer) = self.layers.get(key) {
                    figment = figment.merge(Serialized::defaults(layer.clone()));
                }
            }
            let config: SiteConfig = figment.extract().or_raise(|| ErrorKind::Invalid(format!("site rules for {host}")))?;
            Ok(Arc::new(config))
        })
    }

    /// Effective rules for the host of `url`. Unparseable URLs get the
    /// global rules.
    pub fn for_url(&self, url: &str) -> Result<Arc<SiteConfig>> {
        let host = url::Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_string));
        self.for_host(host.as_deref().unwrap_or(GLOBAL_KEY))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const RULES: &str = r#"
        ["*"]
        deactivate_scripts = false
        find_urls_with_extensions = ["png"]
        replacements_html_pre = [{ find = "a", replace = "b" }]

        ["news.example.com"]
        deactivate_scripts = true
        delete_nodes = ["div.ad"]
        add_attributes = [{ selector = "img", attribute = "loading", value = "eager" }]
    "#;

    #[test]
    fn host_layer_overrides_global_layer() {
        let sites = SiteConfigs::from_toml_str(RULES).unwrap();
        let config = sites.for_host("news.example.com").unwrap();
        assert!(config.deactivate_scripts);
        assert_eq!(config.find_urls_with_extensions, vec!["png".to_string()]);
        assert_eq!(config.delete_nodes, vec!["div.ad".to_string()]);
        assert_eq!(config.add_attributes[0].value, "eager");
        assert_eq!(config.replacements_html_pre[0].replace, "b");
    }

    #[test]
    fn unknown_host_gets_global_layer_over_defaults() {
        let sites = SiteConfigs::from_toml_str(RULES).unwrap();
        let config = sites.for_host("other.example.com").unwrap();
        assert!(!config.deactivate_scripts);
        assert!(config.find_urls_in_legacy_background_attributes);
        assert!(config.delete_nodes.is_empty());
    }

    #[test]
    fn lookup_by_url_uses_host() {
        let sites = SiteConfigs::from_toml_str(RULES).unwrap();
        assert!(sites.for_url("https://NEWS.example.com/story?id=1").unwrap().deactivate_scripts);
        assert!(!sites.for_url("not a url").unwrap().deactivate_scripts);
    }

    #[test]
    fn merges_are_memoized() {
        let sites = SiteConfigs::from_toml_str(RULES).unwrap();
        let first = sites.for_host("news.example.com").unwrap();
        let second = sites.for_host("news.example.com").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn wrong_types_are_rejected() {
        let sites = SiteConfigs::from_toml_str("[\"bad.example\"]\ndeactivate_scripts = \"maybe\"").unwrap();
        assert!(sites.for_host("bad.example").is_err());
    }

    #[test]
    fn user_file_layers_over_builtins() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[\"web.archive.org\"]\nuse_passthru = false\n[\"*\"]\nfind_urls_anywhere = true").unwrap();
        let sites = SiteConfigs::load(Some(file.path())).unwrap();
        assert!(!sites.for_host("web.archive.org").unwrap().use_passthru);
        assert!(sites.for_host("example.com").unwrap().find_urls_anywhere);
        // Keys the user file doesn't mention keep their builtin values.
        assert!(sites.for_host("example.com").unwrap().find_urls_with_extensions.contains(&"woff2".to_string()));
    }

    #[test]
    fn builtin_rules_parse() {
        let sites = SiteConfigs::builtin().unwrap();
        assert!(sites.for_host("web.archive.org").unwrap().use_passthru);
        assert!(!sites.for_host("example.com").unwrap().use_passthru);
    }
}
