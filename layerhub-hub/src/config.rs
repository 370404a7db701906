//! Hub wiring.

use crate::strategy::FetchStrategy;
use layerhub_core::{AccessId, AsyncAccess, ConfigError, HubResult, SyncAccess};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Everything a hub is built from. The tier set is fixed once the hub exists.
pub struct HubConfig<V> {
    /// Name used in logs and configuration errors
    pub name: String,
    /// Fastest tier, answered on the caller's thread
    pub sync_access: Option<Arc<dyn SyncAccess<V>>>,
    /// Async tiers in ascending authority
    pub async_accesses: Vec<Arc<dyn AsyncAccess<V>>>,
    pub strategy: FetchStrategy<V>,
}

impl<V> HubConfig<V> {
    pub fn new(name: impl Into<String>, strategy: FetchStrategy<V>) -> Self {
        Self {
            name: name.into(),
            sync_access: None,
            async_accesses: Vec::new(),
            strategy,
        }
    }

    pub fn with_sync_access(mut self, access: Arc<dyn SyncAccess<V>>) -> Self {
        self.sync_access = Some(access);
        self
    }

    /// Append an async tier above every tier added so far.
    pub fn with_async_access(mut self, access: Arc<dyn AsyncAccess<V>>) -> Self {
        self.async_accesses.push(access);
        self
    }

    /// Reject tier sets a hub cannot run.
    pub fn validate(&self) -> HubResult<()> {
        if self.sync_access.is_none() && self.async_accesses.is_empty() {
            return Err(ConfigError::NoAccesses {
                hub: self.name.clone(),
            }
            .into());
        }

        let mut seen = HashSet::new();
        let ids = self
            .sync_access
            .iter()
            .map(|a| a.id())
            .chain(self.async_accesses.iter().map(|a| a.id()));
        for id in ids {
            if !seen.insert(id) {
                return Err(ConfigError::DuplicateAccessId {
                    hub: self.name.clone(),
                    id,
                }
                .into());
            }
        }

        Ok(())
    }

    /// Limit used by a plain `fetch()`: the most authoritative tier.
    pub fn default_limit(&self) -> Option<AccessId> {
        self.async_accesses
            .last()
            .map(|a| a.id())
            .or_else(|| self.sync_access.as_ref().map(|a| a.id()))
    }
}

impl<V> fmt::Debug for HubConfig<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HubConfig")
            .field("name", &self.name)
            .field("sync_access", &self.sync_access.as_ref().map(|a| a.id()))
            .field(
                "async_accesses",
                &self.async_accesses.iter().map(|a| a.id()).collect::<Vec<_>>(),
            )
            .field("strategy", &self.strategy)
            .finish()
    }
}
