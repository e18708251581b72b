//! Blocking OpenEMS client
//!
//! Every method wraps the matching [`EmsApi`] call in a closure and hands it to
//! the runtime bridge, so it can be called from plain threads and from inside a
//! tokio runtime alike.

mod api;
mod session;

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use serde_json::Value;

use crate::config::ClientSettings;
use crate::domain::{ComponentConfig, ConfigProperty, Edge, EdgeConfig, TimeSeries, TimeseriesQuery};
use crate::error::Result;
use crate::infrastructure::jsonrpc::{Connector, WsConnector};
use crate::infrastructure::runtime::RuntimeBridge;

pub use api::EmsApi;

pub struct OpenEmsClient {
    api: EmsApi,
    settings: ClientSettings,
    bridge: RuntimeBridge,
}

impl OpenEmsClient {
    /// Client speaking JSON-RPC over WebSocket
    pub fn new(settings: ClientSettings) -> Result<Self> {
        Self::with_connector(settings, Arc::new(WsConnector))
    }

    pub fn with_connector(settings: ClientSettings, connector: Arc<dyn Connector>) -> Result<Self> {
        let bridge = RuntimeBridge::with_workers(settings.workers)?;
        let api = EmsApi::new(&settings, connector);
        Ok(Self {
            api,
            settings,
            bridge,
        })
    }

    /// The async API behind this client
    pub fn api(&self) -> &EmsApi {
        &self.api
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    pub fn bridge(&self) -> &RuntimeBridge {
        &self.bridge
    }

    fn call<F, Fut, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(EmsApi) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>>,
        T: Send + 'static,
    {
        let api = self.api.clone();
        self.bridge.run(move || f(api), self.settings.timeout)
    }

    /// Connect and authenticate now instead of on the first call
    pub fn login(&self) -> Result<()> {
        self.call(|api| async move { api.login().await.map(|_| ()) })
    }

    pub fn get_edges(&self) -> Result<Vec<Edge>> {
        self.call(|api| async move { api.get_edges().await })
    }

    pub fn get_edge_config(&self, edge_id: &str) -> Result<EdgeConfig> {
        let edge_id = edge_id.to_string();
        self.call(move |api| async move { api.get_edge_config(&edge_id).await })
    }

    pub fn get_channels_of_component(&self, edge_id: &str, component_id: &str) -> Result<Value> {
        let edge_id = edge_id.to_string();
        let component_id = component_id.to_string();
        self.call(move |api| async move {
            api.get_channels_of_component(&edge_id, &component_id).await
        })
    }

    pub fn query_historic_timeseries_data(
        &self,
        edge_id: &str,
        query: TimeseriesQuery,
    ) -> Result<TimeSeries> {
        let edge_id = edge_id.to_string();
        self.call(move |api| async move {
            api.query_historic_timeseries_data(&edge_id, &query).await
        })
    }

    pub fn query_futuristic_timeseries_data(
        &self,
        edge_id: &str,
        query: TimeseriesQuery,
        component_id: &str,
    ) -> Result<TimeSeries> {
        let edge_id = edge_id.to_string();
        let component_id = component_id.to_string();
        self.call(move |api| async move {
            api.query_futuristic_timeseries_data(&edge_id, &query, &component_id)
                .await
        })
    }

    pub fn update_component_config(
        &self,
        edge_id: &str,
        component_id: &str,
        properties: Vec<ConfigProperty>,
    ) -> Result<Value> {
        let edge_id = edge_id.to_string();
        let component_id = component_id.to_string();
        self.call(move |api| async move {
            api.update_component_config(&edge_id, &component_id, &properties)
                .await
        })
    }

    /// Update a single property
    pub fn update_component_config_from_name_value(
        &self,
        edge_id: &str,
        component_id: &str,
        name: &str,
        value: impl Into<Value>,
    ) -> Result<Value> {
        self.update_component_config(edge_id, component_id, vec![ConfigProperty::new(name, value)])
    }

    /// Components whose factory id starts with `Meter`
    pub fn get_meter_list(&self, edge_id: &str) -> Result<BTreeMap<String, ComponentConfig>> {
        Ok(self.get_edge_config(edge_id)?.meters())
    }

    /// Components whose factory id starts with `PVInverter`
    pub fn get_pvinverter_list(&self, edge_id: &str) -> Result<BTreeMap<String, ComponentConfig>> {
        Ok(self.get_edge_config(edge_id)?.pv_inverters())
    }

    /// Wait for in-flight calls, then stop the bridge
    pub fn close(self) {
        self.bridge.shutdown();
    }
}
