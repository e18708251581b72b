//! JSON-RPC over a persistent WebSocket
//!
//! Requests are written one at a time under the stream lock; the reader skips
//! server notifications until the response carrying the request id arrives.

use std::sync::atomic::{AtomicBool, Ordering};

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::infrastructure::jsonrpc::transport::{Connector, RpcTransport};
use crate::infrastructure::jsonrpc::types::{Request, Response};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens `ws://` and `wss://` connections
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait::async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn RpcTransport>> {
        let (stream, response) = connect_async(url)
            .await
            .map_err(|err| Error::Transport(format!("connect {url}: {err}")))?;
        debug!(url, status = %response.status(), "websocket connected");
        Ok(Box::new(WsTransport {
            endpoint: url.to_string(),
            stream: Mutex::new(stream),
            connected: AtomicBool::new(true),
        }))
    }
}

pub struct WsTransport {
    endpoint: String,
    stream: Mutex<WsStream>,
    connected: AtomicBool,
}

impl WsTransport {
    fn mark_closed(&self) {
        if self.connected.swap(false, Ordering::AcqRel) {
            debug!(endpoint = %self.endpoint, "websocket closed");
        }
    }

    async fn read_response(&self, stream: &mut WsStream, id: &str) -> Result<Value> {
        loop {
            let Some(message) = stream.next().await else {
                self.mark_closed();
                return Err(Error::Disconnected);
            };
            let message = message.map_err(|err| {
                self.mark_closed();
                Error::Transport(err.to_string())
            })?;

            match message {
                Message::Text(text) => {
                    let value: Value = serde_json::from_str(&text)?;
                    if value.get("id").and_then(Value::as_str) == Some(id) {
                        let response: Response = serde_json::from_value(value)?;
                        return response.into_result();
                    }
                    let method = value.get("method").and_then(Value::as_str).unwrap_or("-");
                    trace!(method, "skipping unrelated message");
                }
                Message::Close(frame) => {
                    warn!(?frame, "server closed websocket");
                    self.mark_closed();
                    return Err(Error::Disconnected);
                }
                _ => {}
            }
        }
    }
}

#[async_trait::async_trait]
impl RpcTransport for WsTransport {
    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let request = Request::new(method, params);
        let mut stream = self.stream.lock().await;
        if !self.is_connected() {
            return Err(Error::Disconnected);
        }

        trace!(method, id = %request.id, "sending request");
        if let Err(err) = stream.send(Message::Text(request.to_value().to_string())).await {
            self.mark_closed();
            return Err(Error::Transport(err.to_string()));
        }
        self.read_response(&mut stream, &request.id).await
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn endpoint(&self) -> String {
        self.endpoint.clone()
    }
}
