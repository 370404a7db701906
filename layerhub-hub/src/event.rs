//! Listener events and the small value types returned by hub operations.

use layerhub_core::AccessResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// One event in a hub's delivery sequence.
///
/// Per cycle a listener sees exactly one `FetchStarted`, zero or more
/// `Result`s, then exactly one `FetchFinished`.
#[derive(Debug, Clone)]
pub enum HubEvent<V> {
    FetchStarted,
    Result(AccessResult<V>),
    FetchFinished,
}

impl<V> HubEvent<V> {
    pub fn result(&self) -> Option<&AccessResult<V>> {
        match self {
            HubEvent::Result(result) => Some(result),
            _ => None,
        }
    }

    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            HubEvent::FetchStarted => "fetch_started",
            HubEvent::Result(_) => "result",
            HubEvent::FetchFinished => "fetch_finished",
        }
    }
}

/// A registered event handler.
pub type Listener<V> = Arc<dyn Fn(&HubEvent<V>) + Send + Sync>;

/// Handle returned when registering a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListenerId(pub u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

/// Outcome of a fetch request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStatus {
    /// A new cycle was started
    Started,
    /// A cycle is already running; nothing was started or queued
    InProgress,
    /// The hub is closed
    Closed,
}

/// Sync tier value together with the fetching flag at the time it was read.
#[derive(Debug, Clone)]
pub struct Snapshot<V> {
    pub result: AccessResult<V>,
    pub fetching: bool,
}
