//! Execution context detection and executor identity

use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::runtime::Handle;

static NEXT_EXECUTOR_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT_EXECUTOR: Cell<Option<ExecutorId>> = const { Cell::new(None) };
}

/// Identity of one cooperative loop driven by a bridge
///
/// Unique for the whole process, so loops of different bridges never compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExecutorId(u64);

impl ExecutorId {
    pub(crate) fn next() -> Self {
        Self(NEXT_EXECUTOR_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Returns true when the calling thread is inside a tokio runtime context
///
/// Any thread with a current handle counts: threads inside `block_on` or a
/// task, but also threads holding a `Runtime::enter` guard and blocking-pool
/// threads. Bridges built there route every call to the dispatch pool.
pub fn in_async_context() -> bool {
    Handle::try_current().is_ok()
}

/// Executor driving the calling code, if it runs inside a bridge operation
pub fn current_executor() -> Option<ExecutorId> {
    CURRENT_EXECUTOR.with(Cell::get)
}

/// Marks the current thread as driven by `id` until dropped
pub(crate) struct ExecutorGuard {
    previous: Option<ExecutorId>,
}

impl ExecutorGuard {
    pub(crate) fn enter(id: ExecutorId) -> Self {
        let previous = CURRENT_EXECUTOR.with(|cell| cell.replace(Some(id)));
        Self { previous }
    }
}

impl Drop for ExecutorGuard {
    fn drop(&mut self) {
        CURRENT_EXECUTOR.with(|cell| cell.set(self.previous));
    }
}
