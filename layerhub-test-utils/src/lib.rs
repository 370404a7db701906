//! layerhub Test Utilities
//!
//! Centralized test infrastructure for the layerhub workspace:
//! - Mock accesses whose completion the test controls
//! - An event recorder listener
//! - Proptest generators for results and completion orders
//! - Fixtures for common tier layouts
//! - Custom assertions for results and cycle event sequences

pub use layerhub_cache::{CacheManager, CreateAccess, LruCacheManager, UnboundedCache};
pub use layerhub_core::{
    AccessCallback, AccessError, AccessId, AccessResult, AsyncAccess, ErrorKind, SyncAccess,
};
pub use layerhub_hub::{
    DataValidator, FetchStatus, FetchStrategy, Hub, HubConfig, HubEvent, HubObserver,
};

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a log subscriber for tests. Safe to call from every test.
///
/// Honors `RUST_LOG`; defaults to debug output for the layerhub crates.
pub fn init_test_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("layerhub_hub=debug,layerhub_cache=debug,info"));

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

// ============================================================================
// MOCK ACCESSES
// ============================================================================

/// Sync tier holding one value, counting reads and imports.
pub struct MockSyncAccess<V> {
    id: AccessId,
    current: Mutex<AccessResult<V>>,
    imported: Mutex<Vec<V>>,
    gets: AtomicUsize,
    closed: AtomicBool,
}

impl<V: Clone> MockSyncAccess<V> {
    /// Empty tier: reads are unavailable until something is imported.
    pub fn new(id: i64) -> Arc<Self> {
        Self::with_result(id, AccessResult::unavailable())
    }

    pub fn with_data(id: i64, data: V) -> Arc<Self> {
        Self::with_result(id, AccessResult::from_data(data))
    }

    pub fn with_result(id: i64, result: AccessResult<V>) -> Arc<Self> {
        Arc::new(Self {
            id: AccessId::new(id),
            current: Mutex::new(result),
            imported: Mutex::new(Vec::new()),
            gets: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        })
    }

    pub fn imported(&self) -> Vec<V> {
        self.imported.lock().clone()
    }

    pub fn import_count(&self) -> usize {
        self.imported.lock().len()
    }

    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl<V: Clone + Send + Sync> SyncAccess<V> for MockSyncAccess<V> {
    fn id(&self) -> AccessId {
        self.id
    }

    fn get(&self) -> AccessResult<V> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.current.lock().clone()
    }

    fn import_data(&self, data: &V) {
        self.imported.lock().push(data.clone());
        *self.current.lock() = AccessResult::from_data(data.clone());
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Async tier that parks every callback until the test completes it.
///
/// Lets a test drive any completion order across several tiers.
pub struct ManualAsyncAccess<V: 'static> {
    id: AccessId,
    pending: Mutex<VecDeque<AccessCallback<V>>>,
    imported: Mutex<Vec<V>>,
    queries: AtomicUsize,
    closed: AtomicBool,
}

impl<V: Clone + 'static> ManualAsyncAccess<V> {
    pub fn new(id: i64) -> Arc<Self> {
        Arc::new(Self {
            id: AccessId::new(id),
            pending: Mutex::new(VecDeque::new()),
            imported: Mutex::new(Vec::new()),
            queries: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        })
    }

    /// Complete the oldest outstanding query. Returns `false` if none is
    /// outstanding. The callback itself ignores results for finished cycles.
    pub fn complete(&self, result: AccessResult<V>) -> bool {
        let callback = self.pending.lock().pop_front();
        match callback {
            Some(callback) => {
                callback.complete(result);
                true
            }
            None => false,
        }
    }

    pub fn complete_data(&self, data: V) -> bool {
        self.complete(AccessResult::from_data(data))
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn imported(&self) -> Vec<V> {
        self.imported.lock().clone()
    }

    pub fn import_count(&self) -> usize {
        self.imported.lock().len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl<V: Clone + Send + Sync + 'static> AsyncAccess<V> for ManualAsyncAccess<V> {
    fn id(&self) -> AccessId {
        self.id
    }

    fn get(&self, callback: AccessCallback<V>) {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.pending.lock().push_back(callback);
    }

    fn import_data(&self, data: &V) {
        self.imported.lock().push(data.clone());
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Async tier that answers inside `get`, on the caller's thread.
pub struct ImmediateAsyncAccess<V> {
    id: AccessId,
    result: AccessResult<V>,
    imported: Mutex<Vec<V>>,
    queries: AtomicUsize,
}

impl<V: Clone> ImmediateAsyncAccess<V> {
    pub fn new(id: i64, result: AccessResult<V>) -> Arc<Self> {
        Arc::new(Self {
            id: AccessId::new(id),
            result,
            imported: Mutex::new(Vec::new()),
            queries: AtomicUsize::new(0),
        })
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn import_count(&self) -> usize {
        self.imported.lock().len()
    }
}

impl<V: Clone + Send + Sync + 'static> AsyncAccess<V> for ImmediateAsyncAccess<V> {
    fn id(&self) -> AccessId {
        self.id
    }

    fn get(&self, callback: AccessCallback<V>) {
        self.queries.fetch_add(1, Ordering::SeqCst);
        callback.complete(self.result.clone());
    }

    fn import_data(&self, data: &V) {
        self.imported.lock().push(data.clone());
    }
}

// ============================================================================
// EVENT RECORDER
// ============================================================================

/// Collects every event a hub or observer delivers.
pub struct EventRecorder<V> {
    events: Arc<Mutex<Vec<HubEvent<V>>>>,
}

impl<V> Clone for EventRecorder<V> {
    fn clone(&self) -> Self {
        Self {
            events: self.events.clone(),
        }
    }
}

impl<V> Default for EventRecorder<V> {
    fn default() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<V: Clone + fmt::Debug + Send + Sync + 'static> EventRecorder<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// A listener closure appending to this recorder.
    pub fn listener(&self) -> impl Fn(&HubEvent<V>) + Send + Sync + 'static {
        let events = self.events.clone();
        move |event: &HubEvent<V>| events.lock().push(event.clone())
    }

    /// Record everything `hub` delivers from now on.
    pub fn attach(hub: &Hub<V>) -> Self {
        let recorder = Self::new();
        hub.add_listener(recorder.listener());
        recorder
    }

    pub fn events(&self) -> Vec<HubEvent<V>> {
        self.events.lock().clone()
    }

    /// Results only, in delivery order.
    pub fn results(&self) -> Vec<AccessResult<V>> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| event.result().cloned())
            .collect()
    }

    /// Compact labels such as `started`, `data:7`, `error:DATA_ACCESS`.
    pub fn labels(&self) -> Vec<String> {
        self.events.lock().iter().map(label).collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

/// Compact label of one event.
pub fn label<V: fmt::Debug>(event: &HubEvent<V>) -> String {
    match event {
        HubEvent::FetchStarted => "started".to_string(),
        HubEvent::FetchFinished => "finished".to_string(),
        HubEvent::Result(AccessResult::Data(value)) => format!("data:{:?}", value),
        HubEvent::Result(AccessResult::Unavailable) => "unavailable".to_string(),
        HubEvent::Result(AccessResult::Error(error)) => format!("error:{}", error.kind()),
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for layerhub types.

    use super::*;
    use proptest::prelude::*;

    pub fn arb_error_kind() -> impl Strategy<Value = ErrorKind> {
        prop_oneof![
            Just(ErrorKind::Undefined),
            Just(ErrorKind::DataAccess),
            Just(ErrorKind::DataAccessNotFound),
            Just(ErrorKind::InvalidState),
        ]
    }

    pub fn arb_access_error() -> impl Strategy<Value = AccessError> {
        (arb_error_kind(), "[a-z ]{0,24}")
            .prop_map(|(kind, message)| AccessError::new(kind, message))
    }

    /// Any of the three result shapes.
    pub fn arb_access_result() -> impl Strategy<Value = AccessResult<u32>> {
        prop_oneof![
            any::<u32>().prop_map(AccessResult::from_data),
            Just(AccessResult::unavailable()),
            arb_access_error().prop_map(AccessResult::from_error),
        ]
    }

    /// A permutation of `0..n`, used as a completion order.
    pub fn arb_completion_order(n: usize) -> impl Strategy<Value = Vec<usize>> {
        Just((0..n).collect::<Vec<_>>()).prop_shuffle()
    }

    /// Between 1 and `max` strictly increasing access ids, all above 0.
    pub fn arb_access_ids(max: usize) -> impl Strategy<Value = Vec<i64>> {
        prop::collection::btree_set(1i64..1000, 1..=max).prop_map(|ids| ids.into_iter().collect())
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built tier layouts for common hub scenarios.

    use super::*;

    /// Id of the sync tier in every fixture.
    pub const SYNC_ID: i64 = 0;

    /// A hub over one mock sync tier and manually completed async tiers.
    pub struct TieredHub {
        pub hub: Hub<u32>,
        pub sync: Arc<MockSyncAccess<u32>>,
        pub remotes: Vec<Arc<ManualAsyncAccess<u32>>>,
        pub recorder: EventRecorder<u32>,
    }

    impl TieredHub {
        pub fn build(strategy: FetchStrategy<u32>, async_ids: &[i64]) -> Self {
            let sync = MockSyncAccess::<u32>::new(SYNC_ID);
            let remotes: Vec<_> = async_ids
                .iter()
                .map(|id| ManualAsyncAccess::<u32>::new(*id))
                .collect();

            let mut config =
                HubConfig::<u32>::new("fixture", strategy).with_sync_access(sync.clone());
            for remote in &remotes {
                config = config.with_async_access(remote.clone());
            }

            let hub = match Hub::new(config) {
                Ok(hub) => hub,
                Err(err) => panic!("fixture hub rejected: {}", err),
            };
            let recorder = EventRecorder::attach(&hub);

            Self {
                hub,
                sync,
                remotes,
                recorder,
            }
        }

        pub fn remote(&self, index: usize) -> &Arc<ManualAsyncAccess<u32>> {
            &self.remotes[index]
        }
    }

    /// Parallel hub with async tiers `1..=n`.
    pub fn parallel_hub(n: usize) -> TieredHub {
        let ids: Vec<i64> = (1..=n as i64).collect();
        TieredHub::build(FetchStrategy::Parallel, &ids)
    }

    /// Serial hub with async tiers `10, 20, ..` and the given validator.
    pub fn serial_hub(n: usize, validator: DataValidator<u32>) -> TieredHub {
        let ids: Vec<i64> = (1..=n as i64).map(|i| i * 10).collect();
        TieredHub::build(FetchStrategy::Serial(validator), &ids)
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for results and delivered event sequences.

    use super::*;

    #[track_caller]
    pub fn assert_data<V: PartialEq + fmt::Debug>(result: &AccessResult<V>, expected: &V) {
        match result {
            AccessResult::Data(value) => assert_eq!(value, expected, "Wrong data"),
            other => panic!("Expected data {:?}, got: {:?}", expected, other),
        }
    }

    #[track_caller]
    pub fn assert_unavailable<V: fmt::Debug>(result: &AccessResult<V>) {
        assert!(result.is_unavailable(), "Expected unavailable, got: {:?}", result);
    }

    #[track_caller]
    pub fn assert_error_kind<V: fmt::Debug>(result: &AccessResult<V>, kind: ErrorKind) {
        match result.error() {
            Some(error) => assert_eq!(error.kind(), kind, "Wrong error kind: {}", error),
            None => panic!("Expected {} error, got: {:?}", kind, result),
        }
    }

    /// Assert `events` is zero or more complete cycles: each one
    /// `FetchStarted`, any results, then `FetchFinished`. A trailing cycle
    /// may still be open when `allow_open` is set.
    #[track_caller]
    pub fn assert_cycle_shape<V: fmt::Debug>(events: &[HubEvent<V>], allow_open: bool) {
        let mut open = false;
        for (position, event) in events.iter().enumerate() {
            match event {
                HubEvent::FetchStarted => {
                    assert!(!open, "Second FetchStarted at {} inside a cycle", position);
                    open = true;
                }
                HubEvent::Result(_) => {
                    assert!(open, "Result at {} outside a cycle", position);
                }
                HubEvent::FetchFinished => {
                    assert!(open, "FetchFinished at {} without FetchStarted", position);
                    open = false;
                }
            }
        }
        assert!(allow_open || !open, "Last cycle never finished: {:?}", events);
    }
}

// ============================================================================
// TESTS
// ============================================================================
