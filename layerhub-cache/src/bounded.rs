//! Bounded cache with least-recently-accessed eviction.
//!
//! Capacity is measured by a size function (1 per entry unless overridden).
//! Both `get` and `set` count as an access. Eviction runs synchronously inside
//! `set` until the total size is back under capacity. All operations take one
//! internal lock, so a single instance can be shared freely across threads.

use crate::traits::{CacheManager, CacheStats};
use layerhub_core::CacheError;
use lru::LruCache;
use parking_lot::Mutex;
use std::fmt;
use std::hash::Hash;

/// Measures the weight of one entry against the cache capacity.
pub type SizeFn<K, V> = Box<dyn Fn(&K, &V) -> usize + Send + Sync>;

struct LruState<K: Hash + Eq, V> {
    entries: LruCache<K, (V, usize)>,
    total_size: usize,
    stats: CacheStats,
}

/// Bounded LRU cache manager.
pub struct LruCacheManager<K: Hash + Eq, V> {
    state: Mutex<LruState<K, V>>,
    capacity: usize,
    size_of: SizeFn<K, V>,
}

impl<K: Hash + Eq, V> LruCacheManager<K, V> {
    /// Create a cache holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Result<Self, CacheError> {
        Self::with_size_fn(capacity, |_, _| 1)
    }

    /// Create a cache whose capacity is measured by `size_of`.
    pub fn with_size_fn(
        capacity: usize,
        size_of: impl Fn(&K, &V) -> usize + Send + Sync + 'static,
    ) -> Result<Self, CacheError> {
        if capacity == 0 {
            return Err(CacheError::ZeroCapacity);
        }
        Ok(Self {
            state: Mutex::new(LruState {
                entries: LruCache::unbounded(),
                total_size: 0,
                stats: CacheStats::default(),
            }),
            capacity,
            size_of: Box::new(size_of),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Sum of entry sizes currently held.
    pub fn total_size(&self) -> usize {
        self.state.lock().total_size
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        CacheStats {
            entry_count: state.entries.len() as u64,
            total_size: state.total_size as u64,
            ..state.stats.clone()
        }
    }
}

impl<K, V> CacheManager<K, V> for LruCacheManager<K, V>
where
    K: Hash + Eq + Send + Sync,
    V: Clone + Send + Sync,
{
    fn contains_key(&self, key: &K) -> bool {
        self.state.lock().entries.contains(key)
    }

    fn get(&self, key: &K) -> Option<V> {
        let mut state = self.state.lock();
        let found = state.entries.get(key).map(|(value, _)| value.clone());
        if found.is_some() {
            state.stats.hits += 1;
        } else {
            state.stats.misses += 1;
        }
        found
    }

    fn set(&self, key: K, value: V) {
        let size = (self.size_of)(&key, &value);
        let mut state = self.state.lock();

        if let Some((_, old_size)) = state.entries.put(key, (value, size)) {
            state.total_size -= old_size;
        }
        state.total_size += size;

        let mut evicted = 0u64;
        while state.total_size > self.capacity {
            match state.entries.pop_lru() {
                Some((_, (_, entry_size))) => {
                    state.total_size -= entry_size;
                    evicted += 1;
                }
                None => break,
            }
        }

        if evicted > 0 {
            state.stats.evictions += evicted;
            tracing::debug!(
                evicted,
                total_size = state.total_size,
                capacity = self.capacity,
                "Evicted least recently used cache entries"
            );
        }
    }

    fn remove(&self, key: &K) -> Option<V> {
        let mut state = self.state.lock();
        let (value, size) = state.entries.pop(key)?;
        state.total_size -= size;
        Some(value)
    }

    fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.total_size = 0;
    }

    fn len(&self) -> usize {
        self.state.lock().entries.len()
    }
}

impl<K: Hash + Eq, V> fmt::Debug for LruCacheManager<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("LruCacheManager")
            .field("capacity", &self.capacity)
            .field("entries", &state.entries.len())
            .field("total_size", &state.total_size)
            .finish()
    }
}
