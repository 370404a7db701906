//! layerhub Hub - Tiered Fetch Orchestration
//!
//! A [`Hub`] owns one optional sync tier (usually a cache) and an ordered
//! list of async tiers of increasing authority. Fetching returns the fastest
//! answer first and reconciles with slower tiers in the background, writing
//! fresher values back into the faster tiers.
//!
//! # Architecture
//!
//! ```text
//! fetch() ──→ Cycle (strategy) ──→ AsyncAccess::get(callback) × n
//!                                        │
//!            listeners ←── backport ←── verdict ←── callback (any thread)
//! ```
//!
//! - [`FetchStrategy::Parallel`] queries every tier at once and only accepts
//!   results of strictly increasing authority.
//! - [`FetchStrategy::Serial`] queries one tier at a time until its
//!   [`DataValidator`] reports a final result.
//! - [`HubObserver`] adds dispatch routing, late-subscriber replay and
//!   result filters on top of a hub.

pub mod config;
pub mod dispatch;
pub mod event;
pub mod hub;
pub mod observer;
pub mod spawned;
pub mod strategy;

pub use config::HubConfig;
pub use dispatch::{Dispatcher, InlineDispatcher, Task, TokioDispatcher};
pub use event::{FetchStatus, HubEvent, Listener, ListenerId, Snapshot};
pub use hub::Hub;
pub use observer::{suppress_errors, suppress_unavailable, CloseMode, HubObserver, ResultFilter};
pub use spawned::{AsyncFetcher, SpawnedAccess};
pub use strategy::{DataValidator, FetchStrategy};

// Re-export the core vocabulary so most users need a single dependency.
pub use layerhub_core::{
    AccessCallback, AccessError, AccessId, AccessResult, AsyncAccess, ErrorKind, HubResult,
    LayerHubError, SyncAccess,
};
