//! Per-cycle cancellation tokens.
//!
//! A [`CancellationSource`] owns an epoch counter. Every fetch cycle mints a
//! [`CancellationToken`] that refers to (but does not own) that counter and
//! remembers the epoch it was minted at. Advancing the epoch invalidates every
//! outstanding token at once. Sources are never interrupted; results that come
//! back through an invalidated token are simply ignored.
//!
//! ```text
//! mint() ──→ token(epoch = n) ── is_current() == true
//!    │
//! invalidate() ──→ epoch = n + 1 ── token.is_current() == false
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Owner of the epoch counter. Held by the strategy state of one hub.
#[derive(Debug, Default)]
pub struct CancellationSource {
    epoch: Arc<AtomicU64>,
}

impl CancellationSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invalidate every previously minted token and return a fresh one.
    pub fn mint(&self) -> CancellationToken {
        let epoch = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        CancellationToken {
            epoch,
            source: Arc::downgrade(&self.epoch),
        }
    }

    /// Invalidate every outstanding token.
    pub fn invalidate(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
    }

    /// Current epoch, mostly useful in logs.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }
}

/// Handle for one fetch cycle.
///
/// The token is current while its source is alive and has not moved past the
/// epoch the token was minted at.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    epoch: u64,
    source: Weak<AtomicU64>,
}

impl CancellationToken {
    /// A token that was never current. Callbacks built on it are no-ops.
    pub fn detached() -> Self {
        Self {
            epoch: 0,
            source: Weak::new(),
        }
    }

    pub fn is_current(&self) -> bool {
        self.source
            .upgrade()
            .map(|epoch| epoch.load(Ordering::Acquire) == self.epoch)
            .unwrap_or(false)
    }

    pub fn is_cancelled(&self) -> bool {
        !self.is_current()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Two tokens belong to the same cycle.
    pub fn same_cycle(&self, other: &CancellationToken) -> bool {
        self.epoch == other.epoch && Weak::ptr_eq(&self.source, &other.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minted_token_is_current() {
        let source = CancellationSource::new();
        let token = source.mint();
        assert!(token.is_current());
        assert_eq!(token.epoch(), source.epoch());
    }

    #[test]
    fn test_mint_invalidates_previous() {
        let source = CancellationSource::new();
        let first = source.mint();
        let second = source.mint();
        assert!(first.is_cancelled());
        assert!(second.is_current());
        assert!(!first.same_cycle(&second));
    }

    #[test]
    fn test_invalidate() {
        let source = CancellationSource::new();
        let token = source.mint();
        let copy = token.clone();
        source.invalidate();
        assert!(token.is_cancelled());
        assert!(copy.is_cancelled());
        assert!(token.same_cycle(&copy));
    }

    #[test]
    fn test_dropped_source_cancels_token() {
        let source = CancellationSource::new();
        let token = source.mint();
        drop(source);
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_detached_token_never_current() {
        assert!(CancellationToken::detached().is_cancelled());
    }
}
