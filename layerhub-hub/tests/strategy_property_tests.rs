//! Property-Based Tests for Fetch Strategies
//!
//! **Parallel acceptance**: within one cycle a result is delivered only if
//! its tier is strictly more authoritative than every result delivered
//! before it. The cycle closes once the most authoritative queried tier
//! answers.
//!
//! **Serial chaining**: tiers are queried one at a time; every answer is
//! delivered and the chain stops at the first final answer.

use layerhub_test_utils::assertions::{assert_cycle_shape, assert_data, assert_unavailable};
use layerhub_test_utils::fixtures::{parallel_hub, serial_hub};
use layerhub_test_utils::generators::arb_completion_order;
use layerhub_test_utils::*;
use proptest::prelude::*;

// ============================================================================
// PARALLEL
// ============================================================================

#[test]
fn parallel_most_authoritative_first_drops_the_rest() {
    let tiered = parallel_hub(3);
    tiered.hub.fetch();

    // C, then A, then B.
    tiered.remote(2).complete_data(3);
    tiered.remote(0).complete_data(1);
    tiered.remote(1).complete_data(2);

    assert_eq!(tiered.recorder.labels(), vec!["started", "data:3", "finished"]);
    assert!(!tiered.hub.is_fetching());
}

#[test]
fn parallel_in_order_delivers_every_result() {
    let tiered = parallel_hub(3);
    tiered.hub.fetch();

    tiered.remote(0).complete_data(1);
    assert!(tiered.hub.is_fetching());
    tiered.remote(1).complete(AccessResult::unavailable());
    tiered.remote(2).complete_data(3);

    assert_eq!(
        tiered.recorder.labels(),
        vec!["started", "data:1", "unavailable", "data:3", "finished"]
    );
}

#[test]
fn parallel_fans_out_without_waiting() {
    let tiered = parallel_hub(4);
    tiered.hub.fetch();
    for remote in &tiered.remotes {
        assert_eq!(remote.query_count(), 1);
    }
}

#[test]
fn parallel_limit_bounds_the_fan_out() {
    let tiered = parallel_hub(3);
    tiered.hub.fetch_until(AccessId::new(2));

    assert_eq!(tiered.remote(0).query_count(), 1);
    assert_eq!(tiered.remote(1).query_count(), 1);
    assert_eq!(tiered.remote(2).query_count(), 0);

    tiered.remote(1).complete_data(2);
    assert!(!tiered.hub.is_fetching());
    tiered.remote(0).complete_data(1);
    assert_eq!(tiered.recorder.labels(), vec!["started", "data:2", "finished"]);
}

#[test]
fn parallel_error_does_not_abort_siblings() {
    let tiered = parallel_hub(2);
    tiered.hub.fetch();

    tiered
        .remote(0)
        .complete(AccessResult::from_error(AccessError::data_access("timeout")));
    assert!(tiered.hub.is_fetching());
    tiered.remote(1).complete_data(8);

    let results = tiered.recorder.results();
    assert_eq!(results.len(), 2);
    assert!(results[0].is_error());
    assert_data(&results[1], &8);
}

#[test]
fn parallel_stale_cycle_results_are_ignored() {
    let tiered = parallel_hub(2);
    tiered.hub.fetch();
    tiered.remote(1).complete_data(2);

    // A's callback from the first cycle is still parked.
    tiered.hub.fetch();
    tiered.remote(0).complete_data(99);

    let labels = tiered.recorder.labels();
    assert_eq!(labels, vec!["started", "data:2", "finished", "started"]);
    assert!(tiered.hub.is_fetching());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Any completion order delivers strictly increasing tiers and exactly
    /// one complete cycle.
    #[test]
    fn prop_parallel_any_order_is_monotonic(order in arb_completion_order(5)) {
        let tiered = parallel_hub(5);
        tiered.hub.fetch();
        for index in &order {
            tiered.remote(*index).complete_data(*index as u32);
        }

        let events = tiered.recorder.events();
        assert_cycle_shape(&events, false);

        let delivered: Vec<u32> = tiered
            .recorder
            .results()
            .into_iter()
            .filter_map(|r| r.into_data())
            .collect();
        prop_assert!(delivered.windows(2).all(|w| w[0] < w[1]));
        prop_assert_eq!(delivered.last().copied(), Some(4));
        prop_assert!(!tiered.hub.is_fetching());
    }
}

// ============================================================================
// SERIAL
// ============================================================================

#[test]
fn serial_stops_at_first_data() {
    let first = ManualAsyncAccess::<u32>::new(10);
    let second = ManualAsyncAccess::<u32>::new(20);
    let third = ManualAsyncAccess::<u32>::new(30);
    let strategy = FetchStrategy::Serial(DataValidator::FinalWhenData);
    let config = HubConfig::<u32>::new("serial", strategy)
        .with_async_access(first.clone())
        .with_async_access(second.clone())
        .with_async_access(third.clone());
    let hub = Hub::new(config).unwrap();
    let recorder = EventRecorder::attach(&hub);

    hub.fetch();
    assert_eq!((first.query_count(), second.query_count()), (1, 0));
    first.complete(AccessResult::unavailable());
    assert_eq!(second.query_count(), 1);
    second.complete_data(42);

    let results = recorder.results();
    assert_eq!(results.len(), 2);
    assert_unavailable(&results[0]);
    assert_data(&results[1], &42);
    assert_eq!(third.query_count(), 0);
    assert!(!hub.is_fetching());
}

#[test]
fn serial_sync_data_can_end_the_cycle() {
    let tiered = serial_hub(2, DataValidator::FinalWhenData);
    tiered.sync.import_data(&5);

    tiered.hub.fetch();
    assert_eq!(tiered.recorder.labels(), vec!["started", "data:5", "finished"]);
    assert_eq!(tiered.remote(0).query_count(), 0);
}

#[test]
fn serial_sync_miss_continues_to_async() {
    let tiered = serial_hub(2, DataValidator::FinalWhenData);
    tiered.hub.fetch();
    assert_eq!(tiered.recorder.labels(), vec!["started", "unavailable"]);
    assert_eq!(tiered.remote(0).query_count(), 1);
}

#[test]
fn serial_always_final_queries_nothing_past_sync() {
    let tiered = serial_hub(2, DataValidator::AlwaysFinal);
    tiered.hub.fetch();
    assert_eq!(tiered.recorder.labels(), vec!["started", "unavailable", "finished"]);
    assert_eq!(tiered.remote(0).query_count(), 0);
}

#[test]
fn serial_exhausted_chain_closes_after_last_tier() {
    let tiered = serial_hub(3, DataValidator::FinalWhenData);
    tiered.hub.fetch();
    for index in 0..3 {
        assert!(tiered.remote(index).complete(AccessResult::unavailable()));
    }

    assert_eq!(
        tiered.recorder.labels(),
        vec!["started", "unavailable", "unavailable", "unavailable", "unavailable", "finished"]
    );
}

#[test]
fn serial_limit_stops_the_chain() {
    let tiered = serial_hub(3, DataValidator::FinalWhenData);
    tiered.hub.fetch_until(AccessId::new(20));
    tiered.remote(0).complete(AccessResult::unavailable());
    tiered.remote(1).complete(AccessResult::unavailable());

    assert_eq!(tiered.remote(2).query_count(), 0);
    assert!(!tiered.hub.is_fetching());
}

#[test]
fn serial_final_when_data_or_error_stops_on_error() {
    let tiered = serial_hub(2, DataValidator::FinalWhenDataOrError);
    tiered.hub.fetch();
    tiered
        .remote(0)
        .complete(AccessResult::from_error(AccessError::data_access("refused")));

    assert_eq!(tiered.remote(1).query_count(), 0);
    assert_eq!(
        tiered.recorder.labels(),
        vec!["started", "unavailable", "error:DATA_ACCESS", "finished"]
    );
}
