//! Fetch strategies and the per-cycle acceptance state machine.
//!
//! A [`FetchStrategy`] decides which async accesses a cycle queries and which
//! of their answers reach listeners. The decision logic lives in [`Cycle`],
//! which performs no I/O and no locking: the hub asks it for a start plan,
//! feeds it every result that arrives through a current token, and executes
//! the verdicts it returns.
//!
//! ```text
//! Parallel:  launch 0..=limit at once ──→ accept iff index > last accepted
//! Serial:    launch 0 ──→ result ──→ validator final? ──no──→ launch next
//!                                         │
//!                                        yes ──→ close
//! ```

use layerhub_core::{
    AccessError, AccessId, AccessResult, AsyncAccess, CancellationToken, SyncAccess,
};
use std::fmt;
use std::sync::Arc;

/// Predicate used by a serial cycle to decide whether a result ends it.
pub enum DataValidator<V> {
    /// Every result is final
    AlwaysFinal,
    /// Final only when the result carries data
    FinalWhenData,
    /// Final when the result carries data or an error
    FinalWhenDataOrError,
    /// Caller-supplied predicate
    Custom(Arc<dyn Fn(&AccessResult<V>, AccessId) -> bool + Send + Sync>),
}

impl<V> DataValidator<V> {
    pub fn custom(f: impl Fn(&AccessResult<V>, AccessId) -> bool + Send + Sync + 'static) -> Self {
        DataValidator::Custom(Arc::new(f))
    }

    pub fn is_final(&self, result: &AccessResult<V>, access: AccessId) -> bool {
        match self {
            DataValidator::AlwaysFinal => true,
            DataValidator::FinalWhenData => result.has_data(),
            DataValidator::FinalWhenDataOrError => result.has_data() || result.is_error(),
            DataValidator::Custom(f) => f(result, access),
        }
    }
}

impl<V> Clone for DataValidator<V> {
    fn clone(&self) -> Self {
        match self {
            DataValidator::AlwaysFinal => DataValidator::AlwaysFinal,
            DataValidator::FinalWhenData => DataValidator::FinalWhenData,
            DataValidator::FinalWhenDataOrError => DataValidator::FinalWhenDataOrError,
            DataValidator::Custom(f) => DataValidator::Custom(f.clone()),
        }
    }
}

impl<V> fmt::Debug for DataValidator<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataValidator::AlwaysFinal => f.write_str("AlwaysFinal"),
            DataValidator::FinalWhenData => f.write_str("FinalWhenData"),
            DataValidator::FinalWhenDataOrError => f.write_str("FinalWhenDataOrError"),
            DataValidator::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// How a hub queries its async accesses.
pub enum FetchStrategy<V> {
    /// Launch every access up to the limit at once; accept results only in
    /// strictly increasing authority.
    Parallel,
    /// Query one access at a time until the validator reports a final result.
    Serial(DataValidator<V>),
}

impl<V> FetchStrategy<V> {
    pub fn name(&self) -> &'static str {
        match self {
            FetchStrategy::Parallel => "parallel",
            FetchStrategy::Serial(_) => "serial",
        }
    }
}

impl<V> Default for FetchStrategy<V> {
    fn default() -> Self {
        FetchStrategy::Parallel
    }
}

impl<V> Clone for FetchStrategy<V> {
    fn clone(&self) -> Self {
        match self {
            FetchStrategy::Parallel => FetchStrategy::Parallel,
            FetchStrategy::Serial(validator) => FetchStrategy::Serial(validator.clone()),
        }
    }
}

impl<V> fmt::Debug for FetchStrategy<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchStrategy::Parallel => f.write_str("Parallel"),
            FetchStrategy::Serial(validator) => f.debug_tuple("Serial").field(validator).finish(),
        }
    }
}

// ============================================================================
// CYCLE STATE MACHINE
// ============================================================================

/// What the hub does right after a cycle starts.
pub(crate) enum StartPlan<V> {
    /// The limit id matches no access. Nothing is queried.
    NotFound(AccessError),
    /// The cycle is already over. Dispatch the sync result, if any, and close.
    Finish(Option<AccessResult<V>>),
    /// Dispatch the sync result, if any, then launch these async indices.
    Query {
        sync_result: Option<AccessResult<V>>,
        launch: Vec<usize>,
    },
}

/// What follows an accepted result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Then {
    Close,
    Wait,
    Query(usize),
}

/// Decision for one async result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Verdict {
    /// Stale or out of order. Not dispatched.
    Drop,
    Accept(Then),
}

/// State of one fetch cycle.
pub(crate) struct Cycle<V> {
    strategy: FetchStrategy<V>,
    token: CancellationToken,
    accesses: Arc<[Arc<dyn AsyncAccess<V>>]>,
    limit_index: usize,
    last_accepted: Option<usize>,
}

impl<V> Cycle<V> {
    /// Resolve `limit` and decide the first step of a cycle.
    ///
    /// The sync access is read at most once. Parallel only reads it when the
    /// limit names it.
    pub(crate) fn start(
        strategy: &FetchStrategy<V>,
        token: CancellationToken,
        sync: Option<&dyn SyncAccess<V>>,
        accesses: Arc<[Arc<dyn AsyncAccess<V>>]>,
        limit: AccessId,
    ) -> (Self, StartPlan<V>) {
        let sync_is_limit = sync.map(|s| s.id() == limit).unwrap_or(false);
        let limit_index = accesses.iter().position(|a| a.id() == limit);

        let cycle = Cycle {
            strategy: strategy.clone(),
            token,
            limit_index: limit_index.unwrap_or(0),
            accesses,
            last_accepted: None,
        };

        if !sync_is_limit && limit_index.is_none() {
            let error = AccessError::not_found(format!("no access with id {}", limit));
            return (cycle, StartPlan::NotFound(error));
        }

        let plan = match (&cycle.strategy, sync) {
            (FetchStrategy::Parallel, Some(sync)) if sync_is_limit => {
                StartPlan::Finish(Some(sync.get()))
            }
            (FetchStrategy::Parallel, _) => StartPlan::Query {
                sync_result: None,
                launch: (0..=cycle.limit_index).collect(),
            },
            (FetchStrategy::Serial(validator), Some(sync)) => {
                let result = sync.get();
                if sync_is_limit || validator.is_final(&result, sync.id()) {
                    StartPlan::Finish(Some(result))
                } else {
                    StartPlan::Query {
                        sync_result: Some(result),
                        launch: vec![0],
                    }
                }
            }
            (FetchStrategy::Serial(_), None) => StartPlan::Query {
                sync_result: None,
                launch: vec![0],
            },
        };

        (cycle, plan)
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Judge a result produced by the async access at `index`.
    pub(crate) fn on_result(&mut self, index: usize, result: &AccessResult<V>) -> Verdict {
        let last_index = self.accesses.len().saturating_sub(1);

        match &self.strategy {
            FetchStrategy::Parallel => {
                if self.last_accepted.map(|last| index <= last).unwrap_or(false) {
                    return Verdict::Drop;
                }
                self.last_accepted = Some(index);
                if index == self.limit_index || index == last_index {
                    Verdict::Accept(Then::Close)
                } else {
                    Verdict::Accept(Then::Wait)
                }
            }
            FetchStrategy::Serial(validator) => {
                self.last_accepted = Some(index);
                let final_result = match self.accesses.get(index) {
                    Some(access) => validator.is_final(result, access.id()),
                    None => true,
                };
                if index >= last_index || index == self.limit_index || final_result {
                    Verdict::Accept(Then::Close)
                } else {
                    Verdict::Accept(Then::Query(index + 1))
                }
            }
        }
    }
}
