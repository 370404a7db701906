//! Unbounded key/value cache.
//!
//! A plain map behind one read/write lock, with no eviction. Each operation
//! is memory safe on its own, but nothing is atomic across operations: a
//! `contains_key` followed by a `get` may observe a concurrent `remove` in
//! between. Callers sharing one instance across threads coordinate compound
//! sequences themselves.

use crate::traits::CacheManager;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::Hash;

/// Unbounded cache without eviction.
#[derive(Debug)]
pub struct UnboundedCache<K, V> {
    entries: RwLock<HashMap<K, V>>,
}

impl<K, V> Default for UnboundedCache<K, V> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> UnboundedCache<K, V> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<K, V> CacheManager<K, V> for UnboundedCache<K, V>
where
    K: Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    fn contains_key(&self, key: &K) -> bool {
        self.entries.read().contains_key(key)
    }

    fn get(&self, key: &K) -> Option<V> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: K, value: V) {
        self.entries.write().insert(key, value);
    }

    fn remove(&self, key: &K) -> Option<V> {
        self.entries.write().remove(key)
    }

    fn clear(&self) {
        self.entries.write().clear();
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }
}
