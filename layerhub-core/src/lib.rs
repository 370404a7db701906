//! layerhub Core - Access Types
//!
//! Data types shared by every layerhub crate: the tri-state access result,
//! error kinds, the access capability traits and the cancellation tokens that
//! let a hub ignore stale answers. This crate contains no orchestration logic.
//!
//! # Key Types
//!
//! - [`AccessResult`]: data, unavailable, or error
//! - [`SyncAccess`] / [`AsyncAccess`]: the two tier capabilities
//! - [`AccessCallback`]: one-shot completion handle for async reads
//! - [`CancellationSource`] / [`CancellationToken`]: per-cycle invalidation

pub mod access;
pub mod cancel;
pub mod config;
pub mod error;
pub mod result;

pub use access::{AccessCallback, AccessId, AsyncAccess, SyncAccess};
pub use cancel::{CancellationSource, CancellationToken};
pub use config::{CacheSettings, DEFAULT_CACHE_ACCESS_ID};
pub use error::{CacheError, ConfigError, HubResult, LayerHubError};
pub use result::{AccessError, AccessResult, ErrorKind, ErrorKindParseError, ErrorTag};
