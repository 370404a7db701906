//! Hub Lifecycle and Backporting Tests
//!
//! Covers the Idle → Fetching → Idle cycle, limit resolution, write-back of
//! authoritative results into faster tiers, the closed state, and ordering
//! under concurrent completions.

use layerhub_hub::ListenerId;
use layerhub_test_utils::assertions::{assert_cycle_shape, assert_error_kind};
use layerhub_test_utils::fixtures::{parallel_hub, TieredHub, SYNC_ID};
use layerhub_test_utils::*;
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

// ============================================================================
// LIFECYCLE
// ============================================================================

#[test]
fn fetching_flag_goes_idle_fetching_idle() {
    init_test_tracing();
    let tiered = parallel_hub(1);
    assert!(!tiered.hub.is_fetching());

    assert_eq!(tiered.hub.fetch(), FetchStatus::Started);
    assert!(tiered.hub.is_fetching());
    assert_eq!(tiered.hub.fetch(), FetchStatus::InProgress);
    assert_eq!(tiered.remote(0).query_count(), 1);

    tiered.remote(0).complete_data(1);
    assert!(!tiered.hub.is_fetching());
    assert_eq!(tiered.recorder.labels(), vec!["started", "data:1", "finished"]);
}

#[test]
fn unknown_limit_dispatches_not_found_and_queries_nothing() {
    let tiered = parallel_hub(2);
    tiered.hub.fetch_until(AccessId::new(77));

    let results = tiered.recorder.results();
    assert_eq!(results.len(), 1);
    assert_error_kind(&results[0], ErrorKind::DataAccessNotFound);
    assert_eq!(tiered.sync.get_count(), 0);
    for remote in &tiered.remotes {
        assert_eq!(remote.query_count(), 0);
    }
    assert!(!tiered.hub.is_fetching());
    assert_cycle_shape(&tiered.recorder.events(), false);
}

#[test]
fn sync_limit_reads_only_the_sync_tier() {
    let tiered = parallel_hub(2);
    tiered.sync.import_data(&4);
    tiered.hub.fetch_until(AccessId::new(SYNC_ID));

    assert_eq!(tiered.recorder.labels(), vec!["started", "data:4", "finished"]);
    assert_eq!(tiered.remote(0).query_count(), 0);
}

#[test]
fn current_tags_sync_value_with_fetching_flag() {
    let tiered = parallel_hub(1);
    tiered.sync.import_data(&2);

    let idle = tiered.hub.current().unwrap();
    assert_eq!(idle.result.data(), Some(&2));
    assert!(!idle.fetching);

    tiered.hub.fetch();
    assert!(tiered.hub.current().unwrap().fetching);
}

#[test]
fn import_data_reaches_every_tier_in_order() {
    let tiered = parallel_hub(2);
    assert!(tiered.hub.import_data(&6));

    assert_eq!(tiered.sync.imported(), vec![6]);
    assert_eq!(tiered.remote(0).imported(), vec![6]);
    assert_eq!(tiered.remote(1).imported(), vec![6]);
    assert!(tiered.recorder.is_empty());
}

#[test]
fn removed_listener_stops_receiving() {
    let tiered = parallel_hub(1);
    let extra = EventRecorder::<u32>::new();
    let id = tiered.hub.add_listener(extra.listener()).unwrap();

    assert!(tiered.hub.remove_listener(id));
    assert!(!tiered.hub.remove_listener(id));
    tiered.hub.fetch();
    assert!(extra.is_empty());
    assert_eq!(tiered.recorder.len(), 1);
}

#[test]
fn listener_removed_during_dispatch_still_gets_the_current_event() {
    let tiered = parallel_hub(2);
    let hub = tiered.hub.clone();
    let victim_id: Arc<Mutex<Option<ListenerId>>> = Arc::new(Mutex::new(None));
    let late = EventRecorder::<u32>::new();

    let target = victim_id.clone();
    let late_listener = Arc::new(Mutex::new(Some(late.listener())));
    tiered.hub.add_listener(move |event| {
        if matches!(event, HubEvent::FetchStarted) {
            if let Some(id) = target.lock().take() {
                hub.remove_listener(id);
            }
            if let Some(listener) = late_listener.lock().take() {
                hub.add_listener(listener);
            }
        }
    });
    let victim = EventRecorder::<u32>::new();
    *victim_id.lock() = tiered.hub.add_listener(victim.listener());

    tiered.hub.fetch();
    tiered.remote(0).complete_data(1);
    tiered.remote(1).complete_data(2);

    // Dispatch runs over the listeners registered when the event was queued.
    assert_eq!(victim.labels(), vec!["started"]);
    assert_eq!(late.labels(), vec!["data:1", "data:2", "finished"]);
    assert_eq!(
        tiered.recorder.labels(),
        vec!["started", "data:1", "data:2", "finished"]
    );
}

#[test]
fn panicking_listener_does_not_wedge_the_hub() {
    let tiered = parallel_hub(1);
    let armed = Arc::new(AtomicBool::new(true));
    let trigger = armed.clone();
    tiered.hub.add_listener(move |event| {
        if event.result().is_some() && trigger.swap(false, Ordering::SeqCst) {
            panic!("listener failure");
        }
    });

    tiered.hub.fetch();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        tiered.remote(0).complete_data(1);
    }));
    assert!(outcome.is_err());
    assert!(!tiered.hub.is_fetching());

    assert_eq!(tiered.hub.fetch(), FetchStatus::Started);
    assert_eq!(tiered.remote(0).query_count(), 2);
    tiered.remote(0).complete_data(2);
    assert!(!tiered.hub.is_fetching());

    let labels = tiered.recorder.labels();
    assert_eq!(&labels[labels.len() - 3..], &["started", "data:2", "finished"]);
}

#[test]
fn access_ids_list_sync_then_async() {
    let tiered = TieredHub::build(FetchStrategy::Parallel, &[5, 9]);
    assert_eq!(
        tiered.hub.access_ids(),
        vec![AccessId::new(SYNC_ID), AccessId::new(5), AccessId::new(9)]
    );
}

// ============================================================================
// BACKPORTING
// ============================================================================

#[test]
fn authoritative_result_backports_into_every_faster_tier() {
    let tiered = parallel_hub(2);
    tiered.hub.fetch();
    tiered.remote(1).complete_data(9);

    assert_eq!(tiered.sync.import_count(), 1);
    assert_eq!(tiered.remote(0).import_count(), 1);
    assert_eq!(tiered.remote(1).import_count(), 0);
    assert_eq!(tiered.remote(0).imported(), vec![9]);
}

#[test]
fn lower_tier_result_backports_only_into_sync() {
    let tiered = parallel_hub(2);
    tiered.hub.fetch_until(AccessId::new(1));
    tiered.remote(0).complete_data(3);

    assert_eq!(tiered.sync.import_count(), 1);
    assert_eq!(tiered.remote(0).import_count(), 0);
    assert_eq!(tiered.remote(1).import_count(), 0);
}

#[test]
fn misses_and_errors_never_backport() {
    let tiered = parallel_hub(3);
    tiered.hub.fetch();
    tiered.remote(0).complete(AccessResult::unavailable());
    tiered
        .remote(1)
        .complete(AccessResult::from_error(AccessError::data_access("down")));
    tiered.remote(2).complete(AccessResult::unavailable());

    assert_eq!(tiered.sync.import_count(), 0);
    assert_eq!(tiered.remote(0).import_count(), 0);
    assert_eq!(tiered.remote(1).import_count(), 0);
}

#[test]
fn backport_is_visible_to_listeners() {
    let tiered = parallel_hub(1);
    let hub = tiered.hub.clone();
    let seen = Arc::new(Mutex::new(None));
    let sink = seen.clone();
    tiered.hub.add_listener(move |event| {
        if event.result().is_some() {
            *sink.lock() = hub.current().and_then(|s| s.result.into_data());
        }
    });

    tiered.hub.fetch();
    tiered.remote(0).complete_data(11);
    assert_eq!(*seen.lock(), Some(11));
    tiered.hub.close();
}

// ============================================================================
// CLOSED STATE
// ============================================================================

#[test]
fn closed_hub_rejects_everything_and_closes_tiers() {
    let tiered = parallel_hub(2);
    tiered.hub.close();

    assert!(tiered.hub.is_closed());
    assert!(tiered.sync.is_closed());
    assert!(tiered.remotes.iter().all(|r| r.is_closed()));

    assert_eq!(tiered.hub.fetch(), FetchStatus::Closed);
    assert!(!tiered.hub.import_data(&1));
    assert!(tiered.hub.current().is_none());
    assert!(tiered.hub.add_listener(|_| {}).is_none());

    assert_eq!(tiered.sync.import_count(), 0);
    assert_eq!(tiered.sync.get_count(), 0);
    assert!(tiered.remotes.iter().all(|r| r.query_count() == 0));
    assert!(tiered.recorder.is_empty());
}

#[test]
fn close_is_idempotent() {
    let tiered = parallel_hub(1);
    tiered.hub.fetch();
    tiered.hub.close();
    tiered.hub.close();

    assert_eq!(tiered.recorder.labels(), vec!["started", "finished"]);
}

#[test]
fn results_after_close_are_dropped_silently() {
    let tiered = parallel_hub(1);
    tiered.hub.fetch();
    tiered.hub.close();
    tiered.remote(0).complete_data(5);

    assert_eq!(tiered.sync.import_count(), 0);
    assert_eq!(tiered.recorder.labels(), vec!["started", "finished"]);
}

#[test]
fn listener_can_close_hub_mid_cycle() {
    let tiered = parallel_hub(2);
    let hub = tiered.hub.clone();
    tiered.hub.add_listener(move |event| {
        if event.result().is_some() {
            hub.close();
        }
    });

    tiered.hub.fetch();
    tiered.remote(0).complete_data(1);
    tiered.remote(1).complete_data(2);

    assert_eq!(tiered.recorder.labels(), vec!["started", "data:1", "finished"]);
    assert!(tiered.hub.is_closed());
}

#[test]
fn config_errors_are_rejected_at_construction() {
    let empty = Hub::new(HubConfig::<u32>::new("empty", FetchStrategy::Parallel));
    assert!(matches!(
        empty,
        Err(layerhub_core::LayerHubError::Config(
            layerhub_core::ConfigError::NoAccesses { .. }
        ))
    ));

    let duplicate = HubConfig::<u32>::new("dup", FetchStrategy::Parallel)
        .with_async_access(ManualAsyncAccess::<u32>::new(1))
        .with_async_access(ManualAsyncAccess::<u32>::new(1));
    assert!(Hub::new(duplicate).is_err());
}

// ============================================================================
// CONCURRENCY
// ============================================================================

#[test]
fn concurrent_completions_keep_delivery_ordered() {
    for _ in 0..20 {
        let tiered = TieredHub::build(FetchStrategy::Parallel, &[1, 2, 3, 4, 5, 6, 7, 8]);
        tiered.hub.fetch();

        let handles: Vec<_> = tiered
            .remotes
            .iter()
            .cloned()
            .enumerate()
            .map(|(index, remote)| thread::spawn(move || remote.complete_data(index as u32)))
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let events = tiered.recorder.events();
        assert_cycle_shape(&events, false);
        let delivered: Vec<u32> = tiered
            .recorder
            .results()
            .into_iter()
            .filter_map(|r| r.into_data())
            .collect();
        assert!(delivered.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(delivered.last(), Some(&7));
        assert!(!tiered.hub.is_fetching());
    }
}
