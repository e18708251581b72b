//! Cached authenticated connection

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::Result;
use crate::infrastructure::jsonrpc::{Connector, RpcTransport};
use crate::infrastructure::runtime::{current_executor, ExecutorId};

/// Connects and authenticates lazily, then reuses the connection
///
/// A connection is registered with the I/O driver of the loop that opened it,
/// so one is cached per executor. It is reused while it reports itself
/// connected.
pub(crate) struct SessionCache {
    connector: Arc<dyn Connector>,
    server_url: String,
    username: String,
    password: String,
    sessions: Mutex<HashMap<Option<ExecutorId>, Arc<dyn RpcTransport>>>,
}

impl SessionCache {
    pub(crate) fn new(
        connector: Arc<dyn Connector>,
        server_url: String,
        username: String,
        password: String,
    ) -> Self {
        Self {
            connector,
            server_url,
            username,
            password,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Authenticated transport for the calling executor, opening one when needed
    pub(crate) async fn transport(&self) -> Result<Arc<dyn RpcTransport>> {
        let mut sessions = self.sessions.lock().await;
        let executor = current_executor();

        if let Some(transport) = sessions.get(&executor).cloned() {
            if transport.is_connected() {
                return Ok(transport);
            }
            debug!(?executor, "cached connection closed, reconnecting");
            sessions.remove(&executor);
        }

        let transport: Arc<dyn RpcTransport> =
            Arc::from(self.connector.connect(&self.server_url).await?);
        transport
            .call(
                "authenticateWithPassword",
                json!({ "username": self.username, "password": self.password }),
            )
            .await?;
        info!(endpoint = %transport.endpoint(), user = %self.username, ?executor, "authenticated");

        sessions.insert(executor, Arc::clone(&transport));
        Ok(transport)
    }
}
