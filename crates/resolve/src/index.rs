//! The external index, as seen by the resolver.
//!
//! The index itself lives elsewhere. This module holds the lightweight
//! [`Locator`] it returns and a small boolean query model the resolver builds
//! lookups from. Implementations of [`IndexService`] translate [`IndexQuery`]
//! into whatever the backing store speaks.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Where one capture lives and what the index knows about it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Locator {
    /// Index document identifier.
    pub id: String,
    /// Container name, or the file itself for local captures.
    pub source_file: String,
    /// Byte offset of the record in the uncompressed container.
    pub position: u64,
    pub warc_type: Option<String>,
    /// HTTP status of the embedded response.
    pub status: Option<u16>,
    /// Subset of the embedded response's headers.
    pub headers: BTreeMap<String, String>,
    /// Stored as a plain file rather than in a container.
    pub local_file: bool,
    /// Digest of the response body.
    pub content_hash: Option<String>,
    /// For revisits, the digest of the capture they repeat.
    pub revisit_of: Option<String>,
    pub url: String,
    pub fully_canonicalized_url: Option<String>,
    pub content_type: Option<String>,
    /// Final path segment of `url`.
    pub basename: String,
    /// Host labels of `url`.
    pub tlds: Vec<String>,
    /// Images the capture links to, most relevant first.
    pub image: Vec<String>,
    /// Videos the capture links to, most relevant first.
    pub video: Vec<String>,
    /// Capture time, Unix seconds.
    pub captured_at: i64,
    /// Time the capture was indexed, Unix seconds.
    pub ingested_at: i64,
}

impl Locator {
    /// A header of the embedded response, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find(|(key, _)| key.eq_ignore_ascii_case(name)).map(|(_, value)| value.as_str())
    }

    pub fn is_revisit(&self) -> bool {
        self.warc_type.as_deref() == Some("revisit")
    }

    pub fn is_redirect(&self) -> bool {
        self.status.is_some_and(|status| (300..400).contains(&status))
    }

    /// Newest capture first, ties broken by newest ingest.
    pub(crate) fn newest_first(a: &Locator, b: &Locator) -> std::cmp::Ordering {
        (b.captured_at, b.ingested_at).cmp(&(a.captured_at, a.ingested_at))
    }
}

/// Queryable locator fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Id,
    WarcType,
    Status,
    Url,
    FullyCanonicalizedUrl,
    LocalFile,
    ContentHash,
    Basename,
    Tlds,
}

impl Field {
    /// Whether `locator` holds exactly `value` in this field. List fields
    /// match when any element does.
    fn holds(&self, locator: &Locator, value: &str) -> bool {
        match self {
            Field::Id => locator.id == value,
            Field::WarcType => locator.warc_type.as_deref() == Some(value),
            Field::Status => locator.status.is_some_and(|status| status.to_string() == value),
            Field::Url => locator.url == value,
            Field::FullyCanonicalizedUrl => locator.fully_canonicalized_url.as_deref() == Some(value),
            Field::LocalFile => locator.local_file.to_string() == value,
            Field::ContentHash => locator.content_hash.as_deref() == Some(value),
            Field::Basename => locator.basename == value,
            Field::Tlds => locator.tlds.iter().any(|label| label == value),
        }
    }
}

/// A boolean filter over locators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    /// The field equals the value.
    Term(Field, String),
    /// The field equals any of the values.
    Terms(Field, Vec<String>),
    /// Every constraint holds.
    Must(Vec<Constraint>),
    /// At least one constraint holds.
    Should(Vec<Constraint>),
    MustNot(Box<Constraint>),
}

impl Constraint {
    pub fn term(field: Field, value: impl ToString) -> Self {
        Constraint::Term(field, value.to_string())
    }

    pub fn terms(field: Field, values: impl IntoIterator<Item = impl ToString>) -> Self {
        Constraint::Terms(field, values.into_iter().map(|v| v.to_string()).collect())
    }

    pub fn must_not(constraint: Constraint) -> Self {
        Constraint::MustNot(Box::new(constraint))
    }

    /// Evaluate against one locator. Reference semantics for
    /// [`IndexService`] implementations.
    pub fn matches(&self, locator: &Locator) -> bool {
        match self {
            Constraint::Term(field, value) => field.holds(locator, value),
            Constraint::Terms(field, values) => values.iter().any(|value| field.holds(locator, value)),
            Constraint::Must(all) => all.iter().all(|c| c.matches(locator)),
            Constraint::Should(any) => any.iter().any(|c| c.matches(locator)),
            Constraint::MustNot(inner) => !inner.matches(locator),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Sort {
    /// Capture date then ingest time, both descending.
    #[default]
    Newest,
    /// Capture date ascending.
    Oldest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexQuery {
    pub constraint: Constraint,
    pub sort: Sort,
    pub limit: usize,
}

impl IndexQuery {
    pub fn new(constraint: Constraint) -> Self {
        Self { constraint, sort: Sort::Newest, limit: 10 }
    }

    pub fn sorted(mut self, sort: Sort) -> Self {
        self.sort = sort;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// A searchable index of captures.
///
/// Calls block. Implementations must be safe to share between threads.
pub trait IndexService: Send + Sync {
    /// Locators matching the query, ordered by its sort, at most `limit`.
    fn search(&self, query: &IndexQuery) -> Result<Vec<Locator>>;
}

pub type IndexHandle = Arc<dyn IndexService>;
