//! Async OpenEMS backend API

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::client::session::SessionCache;
use crate::config::ClientSettings;
use crate::domain::{ComponentConfig, ConfigProperty, Edge, EdgeConfig, TimeSeries, TimeseriesQuery};
use crate::error::Result;
use crate::infrastructure::jsonrpc::types::{edge_rpc_params, edge_rpc_result};
use crate::infrastructure::jsonrpc::{Connector, Request, RpcTransport};

/// Component that answers `componentJsonApi` requests about other components
const COMPONENT_MANAGER: &str = "_componentManager";

#[derive(Debug, Deserialize)]
struct EdgePage {
    #[serde(default)]
    edges: Vec<Edge>,
}

/// Async API; cheap to clone, clones share one cached session
#[derive(Clone)]
pub struct EmsApi {
    inner: Arc<Inner>,
}

struct Inner {
    session: SessionCache,
    timezone: String,
    page_size: usize,
}

impl EmsApi {
    pub fn new(settings: &ClientSettings, connector: Arc<dyn Connector>) -> Self {
        let session = SessionCache::new(
            connector,
            settings.server_url.clone(),
            settings.username.clone(),
            settings.password.clone(),
        );
        Self {
            inner: Arc::new(Inner {
                session,
                timezone: settings.timezone.clone(),
                page_size: settings.page_size.max(1),
            }),
        }
    }

    /// Authenticated connection, reused while it stays connected
    pub async fn login(&self) -> Result<Arc<dyn RpcTransport>> {
        self.inner.session.transport().await
    }

    /// All edges visible to the user, fetched page by page
    pub async fn get_edges(&self) -> Result<Vec<Edge>> {
        let server = self.login().await?;
        let limit = self.inner.page_size;
        let mut edges = Vec::new();

        for page in 0u32.. {
            let result = server
                .call(
                    "getEdges",
                    json!({ "page": page, "limit": limit, "searchParams": {} }),
                )
                .await?;
            let batch: EdgePage = serde_json::from_value(result)?;
            let received = batch.edges.len();
            edges.extend(batch.edges);
            debug!(page, received, "edges page");
            if received < limit {
                break;
            }
        }
        Ok(edges)
    }

    /// Send `method` to an edge through `edgeRpc` and return `payload.result`
    pub async fn edge_rpc(&self, edge_id: &str, method: &str, params: Value) -> Result<Value> {
        let server = self.login().await?;
        let request = Request::new(method, params);
        let response = server
            .call("edgeRpc", edge_rpc_params(edge_id, &request))
            .await?;
        edge_rpc_result(response)
    }

    pub async fn get_edge_config(&self, edge_id: &str) -> Result<EdgeConfig> {
        let result = self.edge_rpc(edge_id, "getEdgeConfig", json!({})).await?;
        Ok(serde_json::from_value(result)?)
    }

    pub async fn get_channels_of_component(&self, edge_id: &str, component_id: &str) -> Result<Value> {
        let inner = Request::new("getChannelsOfComponent", json!({ "componentId": component_id }));
        self.edge_rpc(
            edge_id,
            "componentJsonApi",
            json!({ "componentId": COMPONENT_MANAGER, "payload": inner.to_value() }),
        )
        .await
    }

    pub async fn query_historic_timeseries_data(
        &self,
        edge_id: &str,
        query: &TimeseriesQuery,
    ) -> Result<TimeSeries> {
        let params = query.to_params(&self.inner.timezone);
        let result = self
            .edge_rpc(edge_id, "queryHistoricTimeseriesData", Value::Object(params))
            .await?;
        TimeSeries::from_result(&result)
    }

    /// Historic data up to now joined with the component's forecast after now
    pub async fn query_futuristic_timeseries_data(
        &self,
        edge_id: &str,
        query: &TimeseriesQuery,
        component_id: &str,
    ) -> Result<TimeSeries> {
        let mut params = query.to_params(&self.inner.timezone);
        params.insert("componentId".into(), json!(component_id));
        let result = self
            .edge_rpc(edge_id, "queryFuturisticTimeseriesData", Value::Object(params))
            .await?;
        TimeSeries::from_result(&result)
    }

    pub async fn update_component_config(
        &self,
        edge_id: &str,
        component_id: &str,
        properties: &[ConfigProperty],
    ) -> Result<Value> {
        self.edge_rpc(
            edge_id,
            "updateComponentConfig",
            json!({ "componentId": component_id, "properties": properties }),
        )
        .await
    }

    pub async fn get_meter_list(&self, edge_id: &str) -> Result<BTreeMap<String, ComponentConfig>> {
        Ok(self.get_edge_config(edge_id).await?.meters())
    }

    pub async fn get_pvinverter_list(&self, edge_id: &str) -> Result<BTreeMap<String, ComponentConfig>> {
        Ok(self.get_edge_config(edge_id).await?.pv_inverters())
    }
}
