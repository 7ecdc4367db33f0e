//! In-memory index for testing.

use crate::error::Result;
use crate::index::{IndexQuery, IndexService, Locator, Sort};
use std::sync::{PoisonError, RwLock};

/// In-memory [`IndexService`] for testing.
///
/// Locators are kept in a `Vec` behind a [`RwLock`] and filtered with
/// [`Constraint::matches`](crate::Constraint::matches), so queries behave
/// the way the resolver expects from a real index without one running.
///
/// # Examples
///
/// ```
/// # #[cfg(feature = "mock")]
/// # {
/// use mirror_resolve::{Constraint, Field, IndexQuery, IndexService, Locator, MemoryIndex};
///
/// let index = MemoryIndex::with_locators([Locator { id: "a".into(), ..Locator::default() }]);
/// let found = index.search(&IndexQuery::new(Constraint::term(Field::Id, "a"))).unwrap();
/// assert_eq!(found.len(), 1);
/// # }
/// ```
#[derive(Default)]
pub struct MemoryIndex {
    locators: RwLock<Vec<Locator>>,
}

impl MemoryIndex {
    /// Panics if two locators share an id. If test setup is wrong, then the
    /// test should not pass.
    pub fn with_locators(locators: impl IntoIterator<Item = Locator>) -> Self {
        let index = Self::default();
        for locator in locators {
            index.insert(locator);
        }
        index
    }

    pub fn insert(&self, locator: Locator) {
        let mut locators = self.locators.write().unwrap_or_else(PoisonError::into_inner);
        if locators.iter().any(|existing| existing.id == locator.id) {
            panic!("MemoryIndex::insert: duplicate locator id {}", locator.id);
        }
        locators.push(locator);
    }

    pub fn len(&self) -> usize {
        self.locators.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl IndexService for MemoryIndex {
    fn search(&self, query: &IndexQuery) -> Result<Vec<Locator>> {
        let locators = self.locators.read().unwrap_or_else(PoisonError::into_inner);
        let mut found: Vec<Locator> = locators.iter().filter(|l| query.constraint.matches(l)).cloned().collect();
        match query.sort {
            Sort::Newest => found.sort_by(Locator::newest_first),
            Sort::Oldest => found.sort_by_key(|l| (l.captured_at, l.ingested_at)),
        }
        found.truncate(query.limit);
        Ok(found)
    }
}
