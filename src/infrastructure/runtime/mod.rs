//! Runtime infrastructure - bridge from blocking callers to tokio

mod bridge;
mod context;
mod owned;
mod worker;

pub use bridge::{BridgeError, RuntimeBridge};
pub use context::{current_executor, in_async_context, ExecutorId};
pub use worker::{DispatchPool, PendingCall};
