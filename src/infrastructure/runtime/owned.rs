//! Runtime owned by the thread that constructed the bridge

use std::future::Future;
use std::thread::{self, ThreadId};

use tokio::runtime::{Builder, Runtime};

use crate::infrastructure::runtime::bridge::BridgeError;
use crate::infrastructure::runtime::context::{in_async_context, ExecutorGuard, ExecutorId};

pub(crate) struct OwnedRuntime {
    runtime: Runtime,
    owner: ThreadId,
    executor: ExecutorId,
}

impl OwnedRuntime {
    pub(crate) fn new() -> Result<Self, BridgeError> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|err| BridgeError::Runtime(err.to_string()))?;
        Ok(Self {
            runtime,
            owner: thread::current().id(),
            executor: ExecutorId::next(),
        })
    }

    /// Owner thread, and not already inside a runtime
    pub(crate) fn usable_here(&self) -> bool {
        thread::current().id() == self.owner && !in_async_context()
    }

    /// Drive `operation` to completion on the calling thread
    ///
    /// The closure itself is called inside the runtime. Callers go through
    /// `usable_here` first, so this never re-enters a running loop.
    pub(crate) fn run_to_completion<F, Fut>(&self, operation: F) -> Fut::Output
    where
        F: FnOnce() -> Fut,
        Fut: Future,
    {
        let _executor = ExecutorGuard::enter(self.executor);
        self.runtime.block_on(async move { operation().await })
    }

    pub(crate) fn shutdown(self) {
        self.runtime.shutdown_background();
    }
}
