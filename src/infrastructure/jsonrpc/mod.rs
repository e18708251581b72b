//! JSON-RPC infrastructure - message shapes and WebSocket transport

mod transport;
pub(crate) mod types;
mod websocket;

pub use transport::{Connector, RpcTransport};
pub use types::{Request, Response, RpcError};
pub use websocket::{WsConnector, WsTransport};
