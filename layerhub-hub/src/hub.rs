//! The hub: one fixed tier set, at most one fetch cycle at a time.
//!
//! # Lifecycle
//!
//! ```text
//! new() ──→ Idle ──fetch()──→ Fetching ──cycle closes──→ Idle
//!            │                    │
//!            └──────close()───────┴──→ Closed (terminal)
//! ```
//!
//! # Serialization
//!
//! Every transition, backport write and listener delivery of one hub runs
//! under a single re-entrant gate, so async results completing on several
//! threads are handled one at a time. Events are queued and drained by the
//! outermost delivering frame: a listener that calls back into the hub never
//! sees events out of order. The state mutex is never held while a listener
//! or an access runs.

use crate::config::HubConfig;
use crate::event::{FetchStatus, HubEvent, Listener, ListenerId, Snapshot};
use crate::strategy::{Cycle, FetchStrategy, StartPlan, Then, Verdict};
use layerhub_core::{
    AccessCallback, AccessError, AccessId, AccessResult, AsyncAccess, CancellationSource,
    CancellationToken, ConfigError, HubResult, SyncAccess,
};
use parking_lot::{Mutex, ReentrantMutex};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace, warn};
use uuid::Uuid;

enum Pending<V> {
    Event(HubEvent<V>),
    ClearListeners,
}

struct HubState<V> {
    fetching: bool,
    closed: bool,
    listeners: Vec<(ListenerId, Listener<V>)>,
    next_listener: u64,
    cycle: Option<Cycle<V>>,
    cancel: CancellationSource,
    pending: VecDeque<Pending<V>>,
    draining: bool,
}

struct HubInner<V> {
    id: Uuid,
    name: String,
    sync_access: Option<Arc<dyn SyncAccess<V>>>,
    async_accesses: Arc<[Arc<dyn AsyncAccess<V>>]>,
    strategy: FetchStrategy<V>,
    default_limit: AccessId,
    gate: ReentrantMutex<()>,
    state: Mutex<HubState<V>>,
}

#[derive(Debug, Clone, Copy)]
enum Producer {
    Sync,
    Async(usize),
}

/// Resets the draining flag even if a listener panics.
struct DrainGuard<'a, V> {
    state: &'a Mutex<HubState<V>>,
}

impl<V> Drop for DrainGuard<'_, V> {
    fn drop(&mut self) {
        self.state.lock().draining = false;
    }
}

/// Returns the hub to idle when a listener or an access panics mid-cycle.
///
/// Queued events of the abandoned cycle are discarded and no
/// `FetchFinished` is delivered for it.
struct AbandonOnPanic<'a, V> {
    inner: &'a HubInner<V>,
    token: &'a CancellationToken,
}

impl<V> Drop for AbandonOnPanic<'_, V> {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            return;
        }
        let mut state = self.inner.state.lock();
        if !self.token.is_current() || !state.fetching {
            return;
        }
        state.cancel.invalidate();
        state.cycle = None;
        state.fetching = false;
        state
            .pending
            .retain(|item| matches!(item, Pending::ClearListeners));
        warn!(
            hub = %self.inner.name,
            epoch = self.token.epoch(),
            "Fetch cycle abandoned after a panic"
        );
    }
}

/// Tiered data access orchestrator.
///
/// Cheap to clone; clones share the same hub. Async callbacks hold only a
/// weak reference, so dropping every handle also drops late results.
pub struct Hub<V> {
    inner: Arc<HubInner<V>>,
}

impl<V> Clone for Hub<V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<V> Hub<V> {
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Ids of every tier, sync first, then async in ascending authority.
    pub fn access_ids(&self) -> Vec<AccessId> {
        self.inner
            .sync_access
            .iter()
            .map(|a| a.id())
            .chain(self.inner.async_accesses.iter().map(|a| a.id()))
            .collect()
    }

    pub fn is_fetching(&self) -> bool {
        self.inner.state.lock().fetching
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut state = self.inner.state.lock();
        let before = state.listeners.len();
        state.listeners.retain(|(listener_id, _)| *listener_id != id);
        state.listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.inner.state.lock().listeners.len()
    }
}

impl<V: Clone + Send + Sync + 'static> Hub<V> {
    /// Build a hub from a validated configuration.
    pub fn new(config: HubConfig<V>) -> HubResult<Self> {
        config.validate()?;
        let default_limit = config.default_limit().ok_or_else(|| ConfigError::NoAccesses {
            hub: config.name.clone(),
        })?;

        let HubConfig {
            name,
            sync_access,
            async_accesses,
            strategy,
        } = config;

        let inner = HubInner {
            id: Uuid::now_v7(),
            name,
            sync_access,
            async_accesses: async_accesses.into(),
            strategy,
            default_limit,
            gate: ReentrantMutex::new(()),
            state: Mutex::new(HubState {
                fetching: false,
                closed: false,
                listeners: Vec::new(),
                next_listener: 0,
                cycle: None,
                cancel: CancellationSource::new(),
                pending: VecDeque::new(),
                draining: false,
            }),
        };

        debug!(
            hub = %inner.name,
            hub_id = %inner.id,
            strategy = inner.strategy.name(),
            has_sync = inner.sync_access.is_some(),
            async_accesses = inner.async_accesses.len(),
            "Hub created"
        );

        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Fetch up to the most authoritative tier.
    pub fn fetch(&self) -> FetchStatus {
        self.fetch_until(self.inner.default_limit)
    }

    /// Start a cycle that queries no tier above `limit`.
    ///
    /// Never blocks. Results arrive through listeners. While a cycle is
    /// running this is a no-op returning [`FetchStatus::InProgress`].
    pub fn fetch_until(&self, limit: AccessId) -> FetchStatus {
        let inner = &self.inner;
        let _gate = inner.gate.lock();

        let token = {
            let mut state = inner.state.lock();
            if state.closed {
                drop(state);
                self.reject_closed("fetch");
                return FetchStatus::Closed;
            }
            if state.fetching {
                trace!(hub = %inner.name, "Fetch ignored, cycle already running");
                return FetchStatus::InProgress;
            }
            state.fetching = true;
            state.cancel.mint()
        };
        let _abandon = AbandonOnPanic {
            inner,
            token: &token,
        };

        debug!(
            hub = %inner.name,
            limit = %limit,
            epoch = token.epoch(),
            "Fetch cycle started"
        );
        self.emit(HubEvent::FetchStarted);

        // A listener may have closed the hub already.
        if !token.is_current() {
            return FetchStatus::Started;
        }

        let (cycle, plan) = Cycle::start(
            &inner.strategy,
            token.clone(),
            inner.sync_access.as_deref(),
            inner.async_accesses.clone(),
            limit,
        );

        match plan {
            StartPlan::NotFound(error) => {
                warn!(hub = %inner.name, limit = %limit, "Fetch limit matches no access");
                self.emit(HubEvent::Result(AccessResult::from_error(error)));
                self.finish_cycle(&token);
            }
            StartPlan::Finish(result) => {
                if let Some(result) = result {
                    self.deliver(result, Producer::Sync);
                }
                self.finish_cycle(&token);
            }
            StartPlan::Query {
                sync_result,
                launch,
            } => {
                inner.state.lock().cycle = Some(cycle);
                if let Some(result) = sync_result {
                    self.deliver(result, Producer::Sync);
                }
                for index in launch {
                    if !token.is_current() {
                        break;
                    }
                    self.launch(&token, index);
                }
            }
        }

        FetchStatus::Started
    }

    /// Read the sync tier together with the fetching flag.
    ///
    /// Returns `None` on a closed hub; the closed error is dispatched
    /// instead. A hub without a sync tier reports unavailable.
    pub fn current(&self) -> Option<Snapshot<V>> {
        let _gate = self.inner.gate.lock();
        let snapshot = self.peek();
        if snapshot.is_none() {
            self.reject_closed("current");
        }
        snapshot
    }

    /// Seed every tier with `data`, sync first then async in authority order.
    ///
    /// Returns `false` without touching any tier when the hub is closed.
    pub fn import_data(&self, data: &V) -> bool {
        let inner = &self.inner;
        let _gate = inner.gate.lock();
        if inner.state.lock().closed {
            self.reject_closed("import_data");
            return false;
        }

        if let Some(sync) = &inner.sync_access {
            sync.import_data(data);
        }
        for access in inner.async_accesses.iter() {
            access.import_data(data);
        }
        true
    }

    /// Register a listener. Returns `None` if the hub is closed.
    pub fn add_listener(
        &self,
        listener: impl Fn(&HubEvent<V>) + Send + Sync + 'static,
    ) -> Option<ListenerId> {
        let mut state = self.inner.state.lock();
        if state.closed {
            return None;
        }
        state.next_listener += 1;
        let id = ListenerId(state.next_listener);
        state.listeners.push((id, Arc::new(listener)));
        Some(id)
    }

    /// Close the hub and every tier. Idempotent.
    ///
    /// A running cycle is cancelled and its `FetchFinished` is still
    /// delivered before listeners are dropped.
    pub fn close(&self) {
        let inner = &self.inner;
        let _gate = inner.gate.lock();

        let was_fetching = {
            let mut state = inner.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            state.cancel.invalidate();
            state.cycle = None;
            std::mem::replace(&mut state.fetching, false)
        };

        if was_fetching {
            self.emit(HubEvent::FetchFinished);
        }

        if let Some(sync) = &inner.sync_access {
            sync.close();
        }
        for access in inner.async_accesses.iter() {
            access.close();
        }

        self.enqueue(Pending::ClearListeners);
        debug!(hub = %inner.name, was_fetching, "Hub closed");
    }

    /// Run `f` while holding this hub's delivery gate.
    pub(crate) fn with_gate<R>(&self, f: impl FnOnce() -> R) -> R {
        let _gate = self.inner.gate.lock();
        f()
    }

    /// Snapshot without side effects. `None` when closed.
    pub(crate) fn peek(&self) -> Option<Snapshot<V>> {
        let inner = &self.inner;
        let _gate = inner.gate.lock();
        let fetching = {
            let state = inner.state.lock();
            if state.closed {
                return None;
            }
            state.fetching
        };
        let result = match &inner.sync_access {
            Some(sync) => sync.get(),
            None => AccessResult::unavailable(),
        };
        Some(Snapshot { result, fetching })
    }

    fn launch(&self, token: &CancellationToken, index: usize) {
        let Some(access) = self.inner.async_accesses.get(index).cloned() else {
            return;
        };

        let hub = Arc::downgrade(&self.inner);
        let cycle_token = token.clone();
        let callback = AccessCallback::new(token.clone(), move |result| {
            if let Some(inner) = hub.upgrade() {
                Hub { inner }.on_async_result(&cycle_token, index, result);
            }
        });

        trace!(hub = %self.inner.name, access = %access.id(), index, "Querying access");
        access.get(callback);
    }

    fn on_async_result(&self, token: &CancellationToken, index: usize, result: AccessResult<V>) {
        let inner = &self.inner;
        let _gate = inner.gate.lock();

        if !token.is_current() {
            trace!(hub = %inner.name, index, "Dropping result from a finished cycle");
            return;
        }
        let _abandon = AbandonOnPanic { inner, token };

        let verdict = {
            let mut state = inner.state.lock();
            match state.cycle.as_mut() {
                Some(cycle) if cycle.token().same_cycle(token) => cycle.on_result(index, &result),
                _ => return,
            }
        };

        match verdict {
            Verdict::Drop => {
                trace!(hub = %inner.name, index, "Dropping lower authority result");
            }
            Verdict::Accept(then) => {
                self.deliver(result, Producer::Async(index));
                match then {
                    Then::Close => self.finish_cycle(token),
                    Then::Wait => {}
                    Then::Query(next) => {
                        if token.is_current() {
                            self.launch(token, next);
                        }
                    }
                }
            }
        }
    }

    /// Backport, then dispatch.
    fn deliver(&self, result: AccessResult<V>, producer: Producer) {
        if let (Producer::Async(index), Some(data)) = (producer, result.data()) {
            self.backport(data, index);
        }
        self.emit(HubEvent::Result(result));
    }

    /// Write `data` into the sync tier and every async tier below `producer`.
    fn backport(&self, data: &V, producer: usize) {
        let inner = &self.inner;
        if let Some(sync) = &inner.sync_access {
            sync.import_data(data);
        }
        for access in inner.async_accesses.iter().take(producer) {
            access.import_data(data);
        }
        trace!(hub = %inner.name, producer, "Backported result");
    }

    fn finish_cycle(&self, token: &CancellationToken) {
        let inner = &self.inner;
        {
            let mut state = inner.state.lock();
            if !token.is_current() || !state.fetching {
                return;
            }
            state.cancel.invalidate();
            state.cycle = None;
            state.fetching = false;
        }
        debug!(hub = %inner.name, epoch = token.epoch(), "Fetch cycle finished");
        self.emit(HubEvent::FetchFinished);
    }

    fn reject_closed(&self, operation: &'static str) {
        warn!(hub = %self.inner.name, operation, "Operation on a closed hub");
        self.emit(HubEvent::Result(AccessResult::from_error(closed_error(
            &self.inner.name,
        ))));
    }

    fn emit(&self, event: HubEvent<V>) {
        self.enqueue(Pending::Event(event));
    }

    fn enqueue(&self, item: Pending<V>) {
        let inner = &self.inner;
        {
            let mut state = inner.state.lock();
            state.pending.push_back(item);
            if state.draining {
                return;
            }
            state.draining = true;
        }

        let _guard = DrainGuard {
            state: &inner.state,
        };
        loop {
            let (event, listeners) = {
                let mut state = inner.state.lock();
                match state.pending.pop_front() {
                    Some(Pending::Event(event)) => {
                        let listeners: Vec<Listener<V>> =
                            state.listeners.iter().map(|(_, l)| l.clone()).collect();
                        (event, listeners)
                    }
                    Some(Pending::ClearListeners) => {
                        state.listeners.clear();
                        continue;
                    }
                    None => break,
                }
            };
            for listener in &listeners {
                listener(&event);
            }
        }
    }
}

/// Error delivered for operations on a closed hub.
pub(crate) fn closed_error(hub: &str) -> AccessError {
    AccessError::invalid_state(format!("hub {} is closed", hub))
}

impl<V> fmt::Debug for Hub<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Hub")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("strategy", &self.inner.strategy)
            .field("fetching", &state.fetching)
            .field("closed", &state.closed)
            .field("listeners", &state.listeners.len())
            .finish()
    }
}
