use crate::representation::Representation;
use std::collections::HashSet;

/// Absolute URLs discovered while rewriting, in the order first seen.
///
/// Duplicates are detected on the exact resolved string; two spellings of
/// the same resource are both kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outlinks {
    ordered: Vec<String>,
    seen: HashSet<String>,
}

impl Outlinks {
    /// Returns `false` if the URL was already recorded.
    pub fn push(&mut self, url: impl Into<String>) -> bool {
        let url = url.into();
        if self.seen.contains(&url) {
            return false;
        }
        self.seen.insert(url.clone());
        self.ordered.push(url);
        true
    }

    pub fn as_slice(&self) -> &[String] {
        &self.ordered
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    pub fn into_vec(self) -> Vec<String> {
        self.ordered
    }
}

impl FromIterator<String> for Outlinks {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        let mut outlinks = Outlinks::default();
        for url in iter {
            outlinks.push(url);
        }
        outlinks
    }
}

/// Per-request rewrite state.
#[derive(Debug, Clone, Default)]
pub struct RewriteContext {
    pub representation: Representation,
    /// Resolve relative links against this instead of the record's URI.
    pub base_override: Option<String>,
    /// Nested renders above this one.
    pub depth: usize,
}

impl RewriteContext {
    pub fn new(representation: Representation) -> Self {
        Self { representation, ..Self::default() }
    }

    /// Context for a render started from this one.
    pub(crate) fn nested(&self, representation: Representation) -> Self {
        Self { representation, base_override: None, depth: self.depth + 1 }
    }
}
