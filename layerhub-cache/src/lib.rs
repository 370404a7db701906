//! layerhub Cache - Cache Managers
//!
//! Keyed stores that double as the synchronous tier of a hub. A shared cache
//! is bound to one key through [`CreateAccess`], which yields a
//! [`KeyAccess`] implementing [`layerhub_core::SyncAccess`].
//!
//! # Managers
//!
//! - [`UnboundedCache`]: plain map, no eviction
//! - [`LruCacheManager`]: bounded, evicts the least recently accessed entries
//!
//! [`CacheRegistry`] hands out named instances so hubs over the same dataset
//! share one cache.

pub mod access;
pub mod bounded;
pub mod registry;
pub mod traits;
pub mod unbounded;

pub use access::KeyAccess;
pub use bounded::{LruCacheManager, SizeFn};
pub use registry::CacheRegistry;
pub use traits::{CacheManager, CacheStats, CreateAccess};
pub use unbounded::UnboundedCache;
