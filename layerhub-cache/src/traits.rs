//! Cache manager trait and usage statistics.
//!
//! A cache manager is a keyed store that can also present itself as a
//! [`SyncAccess`](layerhub_core::SyncAccess) bound to one key, so it can sit
//! in a hub as the fastest tier.

use crate::access::KeyAccess;
use layerhub_core::{AccessId, DEFAULT_CACHE_ACCESS_ID};
use std::hash::Hash;
use std::sync::Arc;

/// Keyed store shared between hubs and application code.
///
/// All operations take `&self` so a manager can be shared behind an `Arc`
/// and bound into several key accesses at once.
pub trait CacheManager<K, V>: Send + Sync {
    fn contains_key(&self, key: &K) -> bool;

    fn get(&self, key: &K) -> Option<V>;

    fn set(&self, key: K, value: V);

    /// Remove an entry, returning its value if it was present.
    fn remove(&self, key: &K) -> Option<V>;

    fn clear(&self);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Binding of a shared cache to a single key, producing a sync access.
pub trait CreateAccess<K, V> {
    /// Bind `key` under the default cache access id.
    fn create_access(&self, key: K) -> KeyAccess<K, V> {
        self.create_access_with_id(key, DEFAULT_CACHE_ACCESS_ID)
    }

    fn create_access_with_id(&self, key: K, id: AccessId) -> KeyAccess<K, V>;
}

impl<K, V, C> CreateAccess<K, V> for Arc<C>
where
    C: CacheManager<K, V> + 'static,
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn create_access_with_id(&self, key: K, id: AccessId) -> KeyAccess<K, V> {
        let cache: Arc<dyn CacheManager<K, V>> = self.clone();
        KeyAccess::new(cache, key, id)
    }
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of `get` calls that found an entry.
    pub hits: u64,
    /// Number of `get` calls that found nothing.
    pub misses: u64,
    /// Number of entries currently in cache.
    pub entry_count: u64,
    /// Sum of entry sizes as measured by the size function.
    pub total_size: u64,
    /// Number of evictions due to capacity.
    pub evictions: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
