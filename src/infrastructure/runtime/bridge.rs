//! Runtime bridge - lets blocking callers run async operations
//!
//! A bridge built outside any tokio runtime owns a current-thread runtime and
//! drives operations on it directly when called from the constructing thread.
//! Every other call (from inside a runtime, or from another thread) is handed to
//! the dispatch pool, whose workers each own a private runtime.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use thiserror::Error;
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::{debug, trace};

use crate::infrastructure::runtime::context::in_async_context;
use crate::infrastructure::runtime::owned::OwnedRuntime;
use crate::infrastructure::runtime::worker::{DispatchPool, PendingCall};

/// Conditions raised by the bridge itself, never by the operation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// The caller stopped waiting; the operation keeps running
    #[error("operation did not finish within {0:?}")]
    Timeout(Duration),
    #[error("bridge has been shut down")]
    ShutDown,
    /// A dispatch worker tried to wait on its own pool
    #[error("bridge called from one of its own dispatch workers")]
    Reentrant,
    #[error("dispatch worker dropped the operation without a result")]
    WorkerLost,
    #[error("failed to start runtime: {0}")]
    Runtime(String),
}

/// Bridge between blocking callers and cooperative async operations
pub struct RuntimeBridge {
    owned: Option<OwnedRuntime>,
    pool: DispatchPool,
    closed: AtomicBool,
}

impl RuntimeBridge {
    /// Bridge with a single dispatch worker
    pub fn new() -> Result<Self, BridgeError> {
        Self::with_workers(1)
    }

    /// Bridge with `workers` dispatch threads (at least one)
    pub fn with_workers(workers: usize) -> Result<Self, BridgeError> {
        let owned = if in_async_context() {
            None
        } else {
            Some(OwnedRuntime::new()?)
        };
        let pool = DispatchPool::new(workers)?;
        debug!(
            owns_runtime = owned.is_some(),
            workers = pool.size(),
            "runtime bridge created"
        );
        Ok(Self {
            owned,
            pool,
            closed: AtomicBool::new(false),
        })
    }

    /// Whether construction happened outside a runtime, creating an owned one
    pub fn owns_runtime(&self) -> bool {
        self.owned.is_some()
    }

    pub fn worker_count(&self) -> usize {
        self.pool.size()
    }

    /// Run `operation` to completion and return its result, blocking the caller
    ///
    /// The operation's own error is returned as is. `timeout` bounds the wait on
    /// the dispatch path only; expiry yields `BridgeError::Timeout` without
    /// cancelling the operation. On the owned-runtime path it is not applied.
    pub fn run<F, Fut, T, E>(&self, operation: F, timeout: Option<Duration>) -> Result<T, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>>,
        T: Send + 'static,
        E: From<BridgeError> + Send + 'static,
    {
        if self.closed.load(Ordering::Acquire) {
            return Err(BridgeError::ShutDown.into());
        }

        if let Some(owned) = self.owned.as_ref().filter(|owned| owned.usable_here()) {
            if let Some(limit) = timeout {
                trace!(?limit, "timeout not applied on owned runtime");
            }
            return owned.run_to_completion(operation);
        }

        if self.pool.is_worker_thread() {
            return Err(BridgeError::Reentrant.into());
        }
        let pending = self.pool.submit(operation)?;
        wait_blocking(pending, timeout)
    }

    /// Stop the dispatch pool after its queued operations finish
    ///
    /// Idempotent, and every caller blocks until in-flight pool operations are
    /// done, including one racing another thread's shutdown. Also runs on drop.
    pub fn shutdown(&self) {
        let first = !self.closed.swap(true, Ordering::AcqRel);
        self.pool.shutdown();
        if first {
            debug!("runtime bridge shut down");
        }
    }
}

impl Drop for RuntimeBridge {
    fn drop(&mut self) {
        self.shutdown();
        if let Some(owned) = self.owned.take() {
            owned.shutdown();
        }
    }
}

fn wait_blocking<T, E>(pending: PendingCall<T, E>, timeout: Option<Duration>) -> Result<T, E>
where
    E: From<BridgeError>,
{
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(|| pending.wait(timeout))
        }
        _ => pending.wait(timeout),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owned_path_runs_on_calling_thread() {
        let bridge = RuntimeBridge::new().expect("bridge");
        assert!(bridge.owns_runtime());

        let caller = std::thread::current().id();
        let ran_on = bridge
            .run(|| async { Ok::<_, BridgeError>(std::thread::current().id()) }, None)
            .expect("run");
        assert_eq!(ran_on, caller);
    }

    #[test]
    fn test_owned_path_ignores_timeout() {
        let bridge = RuntimeBridge::new().expect("bridge");
        let value = bridge.run(
            || async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok::<_, BridgeError>(7)
            },
            Some(Duration::from_millis(1)),
        );
        assert_eq!(value, Ok(7));
    }

    #[test]
    fn test_nested_run_inside_owned_runtime_uses_pool() {
        let bridge = std::sync::Arc::new(RuntimeBridge::new().expect("bridge"));
        let inner = std::sync::Arc::clone(&bridge);
        let caller = std::thread::current().id();

        let nested_thread = bridge
            .run(
                move || async move {
                    inner.run(|| async { Ok::<_, BridgeError>(std::thread::current().id()) }, None)
                },
                None,
            )
            .expect("run");
        assert_ne!(nested_thread, caller);
    }

    #[test]
    fn test_reentrant_call_from_worker_is_rejected() {
        let bridge = std::sync::Arc::new(RuntimeBridge::new().expect("bridge"));
        let inner = std::sync::Arc::clone(&bridge);

        let handle = std::thread::spawn(move || {
            let nested = std::sync::Arc::clone(&inner);
            inner.run(
                move || async move { nested.run(|| async { Ok::<_, BridgeError>(()) }, None) },
                None,
            )
        });
        let result = handle.join().expect("thread");
        assert_eq!(result, Err(BridgeError::Reentrant));
    }
}
