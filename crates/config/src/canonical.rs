//! URL canonicalization rule tables.
//!
//! Each tier is a TOML document mapping a host (or `"*"`) to an ordered list
//! of `[pattern, replacement]` pairs. Patterns use `regex` crate syntax and
//! replacements use `$1`-style group references.

use crate::assets::Builtins;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Format, Toml};
use std::collections::HashMap;
use std::path::Path;

/// One ordered `[pattern, replacement]` pair.
pub type Rule = (String, String);

/// Rules for one tier, keyed by host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleTable {
    rules: HashMap<String, Vec<Rule>>,
}

impl RuleTable {
    pub fn new(rules: HashMap<String, Vec<Rule>>) -> Self {
        Self { rules }
    }

    /// Rules that apply to every host.
    pub fn global(&self) -> &[Rule] {
        self.for_host("*")
    }

    pub fn for_host(&self, host: &str) -> &[Rule] {
        self.rules.get(host).map(Vec::as_slice).unwrap_or_default()
    }

    /// Every `(host, rules)` pair in the table.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Rule])> {
        self.rules.iter().map(|(host, rules)| (host.as_str(), rules.as_slice()))
    }
}

/// The three canonicalization tiers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalTables {
    /// Always applied unless suppressed.
    pub certain: RuleTable,
    /// Opt-in: rewrites that usually point at the same resource.
    pub duplicate: RuleTable,
    /// Opt-in: rewrites that might point at the same resource.
    pub uncertain: RuleTable,
}

const CERTAIN_FILE: &str = "canonical-certain.toml";
const DUPLICATE_FILE: &str = "canonical.toml";
const UNCERTAIN_FILE: &str = "canonical-uncertain.toml";

impl CanonicalTables {
    /// Built-in tables only.
    pub fn builtin() -> Result<Self> {
        Self::load(None)
    }

    /// Built-in tables, with same-named files in `directory` layered on top.
    /// A user file replaces the built-in rule list for every host it names.
    pub fn load(directory: Option<&Path>) -> Result<Self> {
        Ok(Self {
            certain: load_tier(CERTAIN_FILE, directory)?,
            duplicate: load_tier(DUPLICATE_FILE, directory)?,
            uncertain: load_tier(UNCERTAIN_FILE, directory)?,
        })
    }

    /// Tables from literal TOML strings, without the built-in layer.
    pub fn from_toml_strs(certain: &str, duplicate: &str, uncertain: &str) -> Result<Self> {
        Ok(Self {
            certain: extract(Figment::from(Toml::string(certain)), "inline:certain")?,
            duplicate: extract(Figment::from(Toml::string(duplicate)), "inline:duplicate")?,
            uncertain: extract(Figment::from(Toml::string(uncertain)), "inline:uncertain")?,
        })
    }
}

fn load_tier(name: &str, directory: Option<&Path>) -> Result<RuleTable> {
    let mut figment = Figment::from(Toml::string(&Builtins::text(name)?));
    if let Some(directory) = directory {
        figment = figment.merge(Toml::file(directory.join(name)));
    }
    extract(figment, name)
}

fn extract(figment: Figment, source: &str) -> Result<RuleTable> {
    let rules: HashMap<String, Vec<Rule>> = figment.extract().or_raise(|| ErrorKind::Invalid(source.to_string()))?;
    tracing::debug!(source, hosts = rules.len(), "loaded canonicalization rules");
    Ok(RuleTable::new(rules))
}
