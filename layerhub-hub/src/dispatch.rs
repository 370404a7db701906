//! Execution context hook for observer deliveries.
//!
//! A [`Dispatcher`] decides where observer listeners run. Tasks handed to one
//! dispatcher must run in the order they were dispatched.

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::warn;

/// A unit of listener work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

pub trait Dispatcher: Send + Sync {
    fn dispatch(&self, task: Task);
}

/// Runs every task immediately on the delivering thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineDispatcher;

impl Dispatcher for InlineDispatcher {
    fn dispatch(&self, task: Task) {
        task();
    }
}

/// Runs tasks on a tokio runtime, one at a time, in dispatch order.
///
/// A single drain task owns the receiving end of an unbounded channel. It
/// exits once every clone of the dispatcher is dropped.
#[derive(Debug, Clone)]
pub struct TokioDispatcher {
    tx: mpsc::UnboundedSender<Task>,
}

impl TokioDispatcher {
    pub fn new(handle: &Handle) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Task>();
        handle.spawn(async move {
            while let Some(task) = rx.recv().await {
                task();
            }
        });
        Self { tx }
    }

    /// Dispatcher on the runtime of the calling context, if there is one.
    pub fn from_current() -> Option<Self> {
        Handle::try_current().ok().map(|handle| Self::new(&handle))
    }
}

impl Dispatcher for TokioDispatcher {
    fn dispatch(&self, task: Task) {
        if self.tx.send(task).is_err() {
            warn!("Dispatcher runtime has shut down, dropping listener task");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::sync::oneshot;

    #[test]
    fn test_inline_runs_immediately() {
        let hit = Arc::new(Mutex::new(false));
        let flag = hit.clone();
        InlineDispatcher.dispatch(Box::new(move || *flag.lock().unwrap() = true));
        assert!(*hit.lock().unwrap());
    }

    #[tokio::test]
    async fn test_tokio_dispatcher_preserves_order() {
        let dispatcher = TokioDispatcher::new(&Handle::current());
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..50 {
            let seen = seen.clone();
            dispatcher.dispatch(Box::new(move || seen.lock().unwrap().push(i)));
        }

        let (done_tx, done_rx) = oneshot::channel();
        dispatcher.dispatch(Box::new(move || {
            let _ = done_tx.send(());
        }));
        done_rx.await.unwrap();

        assert_eq!(*seen.lock().unwrap(), (0..50).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_from_current_inside_runtime() {
        assert!(TokioDispatcher::from_current().is_some());
    }

    #[test]
    fn test_from_current_outside_runtime() {
        assert!(TokioDispatcher::from_current().is_none());
    }
}
