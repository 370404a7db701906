//! Named cache instances shared across an application.
//!
//! Hubs built for the same logical dataset usually want the same cache.
//! The registry hands out one `Arc` per name and type pair, creating it on
//! first request. Asking for an existing name with different key or value
//! types is an error rather than a silent second instance.

use crate::access::KeyAccess;
use crate::bounded::LruCacheManager;
use crate::traits::{CacheManager, CreateAccess};
use crate::unbounded::UnboundedCache;
use layerhub_core::{CacheError, CacheSettings, HubResult};
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

type AnyCache = Arc<dyn Any + Send + Sync>;

/// Registry of named caches.
#[derive(Clone)]
pub struct CacheRegistry {
    caches: Arc<Mutex<HashMap<String, AnyCache>>>,
    settings: CacheSettings,
}

impl CacheRegistry {
    pub fn new() -> Self {
        Self {
            caches: Arc::new(Mutex::new(HashMap::new())),
            settings: CacheSettings::default(),
        }
    }

    /// Create a registry with explicit settings.
    pub fn with_settings(settings: CacheSettings) -> HubResult<Self> {
        settings.validate()?;
        Ok(Self {
            caches: Arc::new(Mutex::new(HashMap::new())),
            settings,
        })
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    /// Bind `key` of `cache` as a sync access under the configured
    /// `cache_access_id`.
    pub fn create_access<K, V, C>(&self, cache: &Arc<C>, key: K) -> KeyAccess<K, V>
    where
        C: CacheManager<K, V> + 'static,
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        cache.create_access_with_id(key, self.settings.cache_access_id)
    }

    /// Unbounded cache registered under `name`.
    pub fn unbounded<K, V>(&self, name: &str) -> HubResult<Arc<UnboundedCache<K, V>>>
    where
        K: Eq + Hash + Send + Sync + 'static,
        V: Send + Sync + 'static,
    {
        self.get_or_insert(name, || Ok(UnboundedCache::new()))
    }

    /// Bounded cache registered under `name`.
    ///
    /// `capacity` only applies when the cache is created; it falls back to
    /// the registry's default capacity.
    pub fn lru<K, V>(
        &self,
        name: &str,
        capacity: Option<usize>,
    ) -> HubResult<Arc<LruCacheManager<K, V>>>
    where
        K: Eq + Hash + Send + Sync + 'static,
        V: Send + Sync + 'static,
    {
        let capacity = capacity.unwrap_or(self.settings.default_capacity);
        self.get_or_insert(name, || LruCacheManager::new(capacity))
    }

    /// Forget the cache under `name`. Existing handles stay usable.
    pub fn remove(&self, name: &str) -> bool {
        self.caches.lock().remove(name).is_some()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.caches.lock().keys().cloned().collect();
        names.sort();
        names
    }

    fn get_or_insert<C>(
        &self,
        name: &str,
        create: impl FnOnce() -> Result<C, CacheError>,
    ) -> HubResult<Arc<C>>
    where
        C: Send + Sync + 'static,
    {
        let mut caches = self.caches.lock();
        if let Some(existing) = caches.get(name) {
            return existing.clone().downcast::<C>().map_err(|_| {
                CacheError::TypeMismatch {
                    name: name.to_string(),
                }
                .into()
            });
        }

        let cache = Arc::new(create()?);
        caches.insert(name.to_string(), cache.clone());
        tracing::debug!(cache = %name, "Registered cache");
        Ok(cache)
    }
}

impl Default for CacheRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CacheRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheRegistry")
            .field("names", &self.names())
            .field("settings", &self.settings)
            .finish()
    }
}
