//! Sync access bound to one key of a shared cache.

use crate::traits::CacheManager;
use layerhub_core::{AccessId, AccessResult, SyncAccess};
use std::fmt;
use std::sync::Arc;

/// Presents one cache entry as the synchronous tier of a hub.
///
/// `get` yields the entry as data or unavailable, `import_data` overwrites it.
/// Closing does nothing: the cache outlives any hub bound to it.
pub struct KeyAccess<K, V> {
    cache: Arc<dyn CacheManager<K, V>>,
    key: K,
    id: AccessId,
}

impl<K, V> KeyAccess<K, V> {
    pub fn new(cache: Arc<dyn CacheManager<K, V>>, key: K, id: AccessId) -> Self {
        Self { cache, key, id }
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn cache(&self) -> &Arc<dyn CacheManager<K, V>> {
        &self.cache
    }
}

impl<K, V> SyncAccess<V> for KeyAccess<K, V>
where
    K: Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    fn id(&self) -> AccessId {
        self.id
    }

    fn get(&self) -> AccessResult<V> {
        AccessResult::from_result(self.cache.get(&self.key))
    }

    fn import_data(&self, data: &V) {
        self.cache.set(self.key.clone(), data.clone());
    }
}

impl<K: fmt::Debug, V> fmt::Debug for KeyAccess<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyAccess")
            .field("id", &self.id)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}
