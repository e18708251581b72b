//! Edges and their component configuration

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Factory prefix of meter components (`Meter.Socomec.Threephase`, ...)
pub const METER_FACTORY: &str = "Meter";
/// Factory prefix of PV inverter components
pub const PV_INVERTER_FACTORY: &str = "PVInverter";

/// An edge device as listed by `getEdges`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default, rename = "isOnline")]
    pub is_online: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Result of `getEdgeConfig`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeConfig {
    #[serde(default)]
    pub components: BTreeMap<String, ComponentConfig>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentConfig {
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default, rename = "factoryId")]
    pub factory_id: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ComponentConfig {
    /// Factory id up to the first `.`
    pub fn factory_prefix(&self) -> &str {
        self.factory_id
            .split('.')
            .next()
            .unwrap_or(self.factory_id.as_str())
    }
}

impl EdgeConfig {
    /// Components whose factory prefix equals `prefix`
    pub fn components_with_prefix(&self, prefix: &str) -> BTreeMap<String, ComponentConfig> {
        self.components
            .iter()
            .filter(|(_, component)| component.factory_prefix() == prefix)
            .map(|(id, component)| (id.clone(), component.clone()))
            .collect()
    }

    pub fn meters(&self) -> BTreeMap<String, ComponentConfig> {
        self.components_with_prefix(METER_FACTORY)
    }

    pub fn pv_inverters(&self) -> BTreeMap<String, ComponentConfig> {
        self.components_with_prefix(PV_INVERTER_FACTORY)
    }
}

/// One `{name, value}` entry of `updateComponentConfig`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigProperty {
    pub name: String,
    pub value: Value,
}

impl ConfigProperty {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_config() -> EdgeConfig {
        serde_json::from_value(json!({
            "components": {
                "meter0": { "alias": "Grid", "factoryId": "Meter.Socomec.Threephase", "properties": { "enabled": true } },
                "meter1": { "factoryId": "Meter" },
                "pvInverter0": { "factoryId": "PVInverter.SunSpec", "properties": {} },
                "_sum": { "factoryId": "Core.Sum" },
                "ctrlMeterish0": { "factoryId": "Controller.Meter" }
            },
            "factories": {}
        }))
        .unwrap()
    }

    #[test]
    fn test_meters_filtered_by_prefix() {
        let meters = sample_config().meters();
        let ids: Vec<_> = meters.keys().map(String::as_str).collect();
        assert_eq!(ids, vec!["meter0", "meter1"]);
        assert_eq!(meters["meter0"].alias.as_deref(), Some("Grid"));
    }

    #[test]
    fn test_pv_inverters_filtered_by_prefix() {
        let inverters = sample_config().pv_inverters();
        assert_eq!(inverters.len(), 1);
        assert!(inverters.contains_key("pvInverter0"));
    }

    #[test]
    fn test_unknown_fields_are_kept() {
        let config = sample_config();
        assert!(config.extra.contains_key("factories"));
    }

    #[test]
    fn test_config_property_serializes_as_name_value() {
        let property = ConfigProperty::new("enabled", false);
        assert_eq!(
            serde_json::to_value(&property).unwrap(),
            json!({ "name": "enabled", "value": false })
        );
    }
}
