//! Process-local memoization.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

struct Entry<V> {
    value: V,
    expires: Option<Instant>,
}

impl<V> Entry<V> {
    fn is_live(&self, now: Instant) -> bool {
        self.expires.is_none_or(|at| now < at)
    }
}

/// A keyed cache of computed values.
///
/// A `ttl` of [`Duration::ZERO`] keeps the value for the lifetime of the
/// process. Two callers racing on the same missing key both run their
/// producer; the later insert wins. Producers must be deterministic for that
/// to be harmless.
///
/// ```
/// use std::time::Duration;
/// use mirror_config::Memo;
///
/// let memo: Memo<&str, usize> = Memo::new();
/// let first = memo.get_or_populate("answer", Duration::ZERO, || 42);
/// let second = memo.get_or_populate("answer", Duration::ZERO, || unreachable!());
/// assert_eq!(first, second);
/// ```
pub struct Memo<K, V> {
    entries: RwLock<HashMap<K, Entry<V>>>,
}

impl<K: Eq + Hash, V: Clone> Memo<K, V> {
    pub fn new() -> Self {
        Self { entries: RwLock::new(HashMap::new()) }
    }

    /// Returns the cached value if present and not expired.
    pub fn get(&self, key: &K) -> Option<V> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(key).filter(|e| e.is_live(Instant::now())).map(|e| e.value.clone())
    }

    pub fn insert(&self, key: K, value: V, ttl: Duration) {
        let expires = (!ttl.is_zero()).then(|| Instant::now() + ttl);
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key, Entry { value, expires });
    }

    pub fn get_or_populate(&self, key: K, ttl: Duration, producer: impl FnOnce() -> V) -> V {
        if let Some(value) = self.get(&key) {
            return value;
        }
        let value = producer();
        self.insert(key, value.clone(), ttl);
        value
    }

    /// Like [`get_or_populate`](Self::get_or_populate), but failures are
    /// returned to the caller and never cached.
    pub fn try_get_or_populate<E>(
        &self,
        key: K,
        ttl: Duration,
        producer: impl FnOnce() -> Result<V, E>,
    ) -> Result<V, E> {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }
        let value = producer()?;
        self.insert(key, value.clone(), ttl);
        Ok(value)
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key).map(|e| e.value)
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: Eq + Hash, V: Clone> Default for Memo<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
