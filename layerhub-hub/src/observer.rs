//! Observer facade over a hub.
//!
//! A [`HubObserver`] keeps its own listener set, separate from the hub's. It
//! adds three things on top of plain hub listeners:
//!
//! - routing: every delivery goes through a [`Dispatcher`]
//! - late-subscriber replay: a listener added while the hub is fetching first
//!   receives `FetchStarted` and the current sync result
//! - filters: predicates that hide selected results from this facade only,
//!   without affecting the hub or its backporting

use crate::dispatch::{Dispatcher, InlineDispatcher};
use crate::event::{FetchStatus, HubEvent, Listener, ListenerId, Snapshot};
use crate::hub::{closed_error, Hub};
use layerhub_core::{AccessId, AccessResult};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Returns `true` to suppress a result.
pub type ResultFilter<V> = Arc<dyn Fn(&AccessResult<V>) -> bool + Send + Sync>;

/// Filter hiding results that carry neither data nor an error.
pub fn suppress_unavailable<V>() -> ResultFilter<V> {
    Arc::new(|result: &AccessResult<V>| result.is_unavailable())
}

/// Filter hiding error results.
pub fn suppress_errors<V>() -> ResultFilter<V> {
    Arc::new(|result: &AccessResult<V>| result.is_error())
}

/// How far [`HubObserver::close`] reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseMode {
    /// Detach this facade only
    Shallow,
    /// Detach and close the hub as well
    Full,
}

struct ObserverState<V> {
    closed: bool,
    listeners: Vec<(ListenerId, Listener<V>)>,
    next_listener: u64,
    filters: Vec<ResultFilter<V>>,
    hub_listener: Option<ListenerId>,
}

struct Shared<V> {
    state: Mutex<ObserverState<V>>,
    dispatcher: Arc<dyn Dispatcher>,
}

impl<V: Clone + Send + Sync + 'static> Shared<V> {
    fn suppressed(&self, event: &HubEvent<V>) -> bool {
        let Some(result) = event.result() else {
            return false;
        };
        self.state.lock().filters.iter().any(|filter| filter(result))
    }

    /// Deliver to the listeners registered right now.
    fn relay(&self, event: HubEvent<V>) {
        if self.suppressed(&event) {
            return;
        }
        let listeners: Vec<Listener<V>> = {
            let state = self.state.lock();
            if state.closed {
                return;
            }
            state.listeners.iter().map(|(_, l)| l.clone()).collect()
        };
        self.send(listeners, vec![event]);
    }

    fn send(&self, listeners: Vec<Listener<V>>, events: Vec<HubEvent<V>>) {
        if listeners.is_empty() || events.is_empty() {
            return;
        }
        self.dispatcher.dispatch(Box::new(move || {
            for event in &events {
                for listener in &listeners {
                    listener(event);
                }
            }
        }));
    }
}

/// Listener facade with dispatch routing, replay and filtering.
///
/// Dropping an observer detaches it from the hub like
/// [`CloseMode::Shallow`].
pub struct HubObserver<V> {
    hub: Hub<V>,
    shared: Arc<Shared<V>>,
}

impl<V: Clone + Send + Sync + 'static> HubObserver<V> {
    /// Observe `hub`, running listeners on the delivering thread.
    pub fn new(hub: &Hub<V>) -> Self {
        Self::with_dispatcher(hub, Arc::new(InlineDispatcher))
    }

    pub fn with_dispatcher(hub: &Hub<V>, dispatcher: Arc<dyn Dispatcher>) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(ObserverState {
                closed: false,
                listeners: Vec::new(),
                next_listener: 0,
                filters: Vec::new(),
                hub_listener: None,
            }),
            dispatcher,
        });

        let relay = Arc::downgrade(&shared);
        let hub_listener = hub.add_listener(move |event: &HubEvent<V>| {
            if let Some(shared) = relay.upgrade() {
                shared.relay(event.clone());
            }
        });
        shared.state.lock().hub_listener = hub_listener;

        Self {
            hub: hub.clone(),
            shared,
        }
    }

    pub fn hub(&self) -> &Hub<V> {
        &self.hub
    }

    /// Add a filter. Results any filter returns `true` for are not delivered.
    pub fn add_filter(&self, filter: ResultFilter<V>) {
        self.shared.state.lock().filters.push(filter);
    }

    /// Register a listener, replaying the running cycle if there is one.
    ///
    /// Returns `None` once this facade is closed.
    pub fn add_listener(
        &self,
        listener: impl Fn(&HubEvent<V>) + Send + Sync + 'static,
    ) -> Option<ListenerId> {
        let listener: Listener<V> = Arc::new(listener);

        // Holding the gate keeps hub deliveries from slipping in between the
        // replay and the registration.
        self.hub.with_gate(|| {
            let replay = match self.hub.peek() {
                Some(Snapshot {
                    result,
                    fetching: true,
                }) => vec![HubEvent::FetchStarted, HubEvent::Result(result)],
                _ => Vec::new(),
            };
            let replay: Vec<HubEvent<V>> = replay
                .into_iter()
                .filter(|event| !self.shared.suppressed(event))
                .collect();

            let id = {
                let mut state = self.shared.state.lock();
                if state.closed {
                    return None;
                }
                state.next_listener += 1;
                ListenerId(state.next_listener)
            };

            if !replay.is_empty() {
                debug!(
                    hub = %self.hub.name(),
                    listener = %id,
                    "Replaying running fetch to late listener"
                );
            }
            self.shared.send(vec![listener.clone()], replay);

            self.shared.state.lock().listeners.push((id, listener));
            Some(id)
        })
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut state = self.shared.state.lock();
        let before = state.listeners.len();
        state.listeners.retain(|(listener_id, _)| *listener_id != id);
        state.listeners.len() != before
    }

    pub fn fetch(&self) -> FetchStatus {
        let status = self.hub.fetch();
        self.report_closed(status == FetchStatus::Closed);
        status
    }

    pub fn fetch_until(&self, limit: AccessId) -> FetchStatus {
        let status = self.hub.fetch_until(limit);
        self.report_closed(status == FetchStatus::Closed);
        status
    }

    pub fn current(&self) -> Option<Snapshot<V>> {
        let snapshot = self.hub.current();
        self.report_closed(snapshot.is_none());
        snapshot
    }

    pub fn import_data(&self, data: &V) -> bool {
        let imported = self.hub.import_data(data);
        self.report_closed(!imported);
        imported
    }

    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }

    /// Detach from the hub; with [`CloseMode::Full`] also close it.
    pub fn close(&self, mode: CloseMode) {
        self.detach();
        if mode == CloseMode::Full {
            self.hub.close();
        }
        debug!(hub = %self.hub.name(), ?mode, "Observer closed");
    }

    /// The hub's listeners are gone once it closes, so this facade delivers
    /// the closed error to its own listeners itself.
    fn report_closed(&self, closed: bool) {
        if closed {
            let error = closed_error(self.hub.name());
            self.shared
                .relay(HubEvent::Result(AccessResult::from_error(error)));
        }
    }
}

impl<V> HubObserver<V> {
    /// Stop relaying and remove this facade's listener from the hub.
    fn detach(&self) {
        let hub_listener = {
            let mut state = self.shared.state.lock();
            if !state.closed {
                state.closed = true;
                state.listeners.clear();
            }
            state.hub_listener.take()
        };
        if let Some(id) = hub_listener {
            self.hub.remove_listener(id);
        }
    }
}

impl<V> Drop for HubObserver<V> {
    fn drop(&mut self) {
        self.detach();
    }
}

impl<V> fmt::Debug for HubObserver<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("HubObserver")
            .field("closed", &state.closed)
            .field("listeners", &state.listeners.len())
            .field("filters", &state.filters.len())
            .finish_non_exhaustive()
    }
}
