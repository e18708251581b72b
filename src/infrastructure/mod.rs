//! Infrastructure layer - External service integrations
//!
//! This layer contains:
//! - Tokio runtime bridge for blocking callers
//! - JSON-RPC over WebSocket transport

pub mod jsonrpc;
pub mod runtime;
