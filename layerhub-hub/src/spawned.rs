//! Async access backed by a future on a tokio runtime.
//!
//! Most remote tiers are naturally `async fn`s. [`SpawnedAccess`] adapts an
//! [`AsyncFetcher`] to the callback-based [`AsyncAccess`] capability: every
//! `get` spawns one task that awaits the fetcher and completes the callback.
//! Tasks are never aborted; a result arriving after its cycle ended is
//! dropped by the callback's token.

use async_trait::async_trait;
use layerhub_core::{AccessCallback, AccessId, AccessResult, AsyncAccess};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::trace;

/// A source that produces its value asynchronously.
#[async_trait]
pub trait AsyncFetcher<V>: Send + Sync {
    async fn fetch(&self) -> AccessResult<V>;

    /// Best-effort write of a fresher value into this source.
    fn import_data(&self, _data: &V) {}
}

/// [`AsyncAccess`] that runs an [`AsyncFetcher`] on a runtime handle.
pub struct SpawnedAccess<V, F> {
    id: AccessId,
    fetcher: Arc<F>,
    handle: Handle,
    closed: AtomicBool,
    _value: PhantomData<fn() -> V>,
}

impl<V, F> SpawnedAccess<V, F>
where
    V: Send + 'static,
    F: AsyncFetcher<V> + 'static,
{
    pub fn new(id: AccessId, fetcher: F, handle: Handle) -> Self {
        Self {
            id,
            fetcher: Arc::new(fetcher),
            handle,
            closed: AtomicBool::new(false),
            _value: PhantomData,
        }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }
}

impl<V, F> AsyncAccess<V> for SpawnedAccess<V, F>
where
    V: Send + 'static,
    F: AsyncFetcher<V> + 'static,
{
    fn id(&self) -> AccessId {
        self.id
    }

    fn get(&self, callback: AccessCallback<V>) {
        if self.closed.load(Ordering::Acquire) || callback.is_cancelled() {
            trace!(access = %self.id, "Skipping fetch for a closed access or finished cycle");
            return;
        }

        let fetcher = self.fetcher.clone();
        self.handle.spawn(async move {
            let result = fetcher.fetch().await;
            callback.complete(result);
        });
    }

    fn import_data(&self, data: &V) {
        self.fetcher.import_data(data);
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}
