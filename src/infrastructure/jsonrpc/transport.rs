//! Transport abstraction
//!
//! Session and API code only see these traits, so tests can swap the
//! WebSocket transport for an in-memory one.

use serde_json::Value;

use crate::error::Result;

/// One open JSON-RPC connection
#[async_trait::async_trait]
pub trait RpcTransport: Send + Sync + 'static {
    /// Send `method` with `params` and wait for the matching response
    ///
    /// JSON-RPC error objects come back as `Error::Api`.
    async fn call(&self, method: &str, params: Value) -> Result<Value>;

    /// False once the connection has been closed or has failed
    fn is_connected(&self) -> bool;

    /// Endpoint display name
    fn endpoint(&self) -> String;
}

/// Opens transports to a server URL
#[async_trait::async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, url: &str) -> Result<Box<dyn RpcTransport>>;
}
