//! Experimental settings
//!
//! Nothing here is covered by compatibility guarantees. Producers only see
//! this through `RenderContext::with_experimental`.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Experimental {
    #[serde(rename = "webapp", skip_serializing_if = "Option::is_none")]
    pub web_app: Option<WebAppConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub common: Option<CommonConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telemetry: Option<TelemetryConfig>,
    /// Raw patches deep-merged into matching rendered objects
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub overrides: Vec<ObjectPatch>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WebAppConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ProxyConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerConfig {
    /// Deprecated in favour of `containerRegistry.privateBaseImageAllowList`
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub default_base_image_registry_whitelist: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProxyConfig {
    /// Deprecated in favour of `components.proxy.service.serviceType`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CommonConfig {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub pod_config: BTreeMap<String, PodConfig>,
    /// Deprecated, pod security policies are gone from Kubernetes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_pod_security_policies: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PodConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TelemetryConfig {
    pub data: TelemetryData,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TelemetryData {
    pub platform: String,
}

/// Patch targeting rendered objects by apiVersion, kind and name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ObjectPatch {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub patch: JsonValue,
}
