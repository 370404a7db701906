//! Access capabilities: the boundary between a hub and the tiers it reads.
//!
//! Concrete tiers (network clients, persisted stores, caches) live outside the
//! core. They implement [`SyncAccess`] when they can answer on the caller's
//! thread, or [`AsyncAccess`] when the answer arrives later via an
//! [`AccessCallback`] that may be completed on any thread.

use crate::cancel::CancellationToken;
use crate::result::AccessResult;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an access. Unique within one hub's tier set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessId(pub i64);

impl AccessId {
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl From<i64> for AccessId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for AccessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "access#{}", self.0)
    }
}

/// A tier that answers immediately on the caller's thread.
pub trait SyncAccess<V>: Send + Sync {
    fn id(&self) -> AccessId;

    /// Current value of this tier.
    fn get(&self) -> AccessResult<V>;

    /// Best-effort write. Not guaranteed to affect subsequent reads.
    fn import_data(&self, _data: &V) {}

    fn close(&self) {}
}

/// A tier that answers through a callback, possibly from another thread.
///
/// For a given `get` call the callback is completed at most once (it is
/// consumed by [`AccessCallback::complete`]). It need not be completed at all;
/// the hub then stays fetching, as no timeout is applied.
pub trait AsyncAccess<V>: Send + Sync {
    fn id(&self) -> AccessId;

    /// Start a read. Must not block; the answer goes through `callback`.
    fn get(&self, callback: AccessCallback<V>);

    /// Best-effort write. Not guaranteed to affect subsequent reads.
    fn import_data(&self, _data: &V) {}

    fn close(&self) {}
}

/// One-shot completion handle for an [`AsyncAccess::get`] call.
///
/// Completing through an invalidated token is a silent no-op.
pub struct AccessCallback<V: 'static> {
    token: CancellationToken,
    sink: Box<dyn FnOnce(AccessResult<V>) + Send + 'static>,
}

impl<V: 'static> AccessCallback<V> {
    pub fn new(
        token: CancellationToken,
        sink: impl FnOnce(AccessResult<V>) + Send + 'static,
    ) -> Self {
        Self {
            token,
            sink: Box::new(sink),
        }
    }

    /// Deliver the result of the read.
    pub fn complete(self, result: AccessResult<V>) {
        if self.token.is_current() {
            (self.sink)(result);
        }
    }

    /// True once the cycle that issued this read has moved on. Sources may
    /// use it to skip work whose result would be ignored.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl<V: 'static> fmt::Debug for AccessCallback<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessCallback")
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}
