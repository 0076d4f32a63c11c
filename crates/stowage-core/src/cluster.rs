//! Cluster access used by cluster validation and pre-deploy provisioning

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::error::{CoreError, Result};

/// Node labels workloads are scheduled against
pub const AFFINITY_LABEL_META: &str = "stowage.io/workload_meta";
pub const AFFINITY_LABEL_IDE: &str = "stowage.io/workload_ide";
pub const AFFINITY_LABEL_WORKSPACE_SERVICES: &str = "stowage.io/workload_workspace_services";
pub const AFFINITY_LABEL_WORKSPACE_REGULAR: &str = "stowage.io/workload_workspace_regular";
pub const AFFINITY_LABEL_WORKSPACE_HEADLESS: &str = "stowage.io/workload_workspace_headless";

pub const AFFINITY_LABELS: &[&str] = &[
    AFFINITY_LABEL_META,
    AFFINITY_LABEL_IDE,
    AFFINITY_LABEL_WORKSPACE_SERVICES,
    AFFINITY_LABEL_WORKSPACE_REGULAR,
    AFFINITY_LABEL_WORKSPACE_HEADLESS,
];

/// Decoded secret data
pub type SecretData = BTreeMap<String, Vec<u8>>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeInfo {
    pub name: String,
    pub labels: BTreeMap<String, String>,
}

/// The subset of cluster operations the engine needs before rendering
#[async_trait]
pub trait ClusterAccess: Send + Sync {
    /// Fetch a secret, `None` if it does not exist
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<SecretData>>;

    async fn create_secret(&self, namespace: &str, name: &str, data: SecretData) -> Result<()>;

    async fn list_nodes(&self) -> Result<Vec<NodeInfo>>;

    /// Server git version, e.g. `v1.31.2`
    async fn server_version(&self) -> Result<String>;

    async fn namespace_exists(&self, namespace: &str) -> Result<bool>;
}

#[derive(Debug, Default)]
struct MockState {
    secrets: BTreeMap<(String, String), SecretData>,
    unreachable_secrets: Vec<String>,
    nodes: Vec<NodeInfo>,
    version: Option<String>,
    namespaces: Vec<String>,
}

/// In-memory cluster for testing
#[derive(Debug, Clone, Default)]
pub struct MockCluster {
    state: Arc<RwLock<MockState>>,
}

impl MockCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(self, namespace: &str, name: &str, keys: &[&str]) -> Self {
        if let Ok(mut state) = self.state.write() {
            let data = keys
                .iter()
                .map(|k| (k.to_string(), b"value".to_vec()))
                .collect();
            state
                .secrets
                .insert((namespace.to_string(), name.to_string()), data);
        }
        self
    }

    /// Make every lookup of this secret fail
    pub fn with_unreachable_secret(self, name: &str) -> Self {
        if let Ok(mut state) = self.state.write() {
            state.unreachable_secrets.push(name.to_string());
        }
        self
    }

    pub fn with_node(self, name: &str, labels: &[&str]) -> Self {
        if let Ok(mut state) = self.state.write() {
            state.nodes.push(NodeInfo {
                name: name.to_string(),
                labels: labels
                    .iter()
                    .map(|l| (l.to_string(), "true".to_string()))
                    .collect(),
            });
        }
        self
    }

    pub fn with_version(self, version: &str) -> Self {
        if let Ok(mut state) = self.state.write() {
            state.version = Some(version.to_string());
        }
        self
    }

    pub fn with_namespace(self, namespace: &str) -> Self {
        if let Ok(mut state) = self.state.write() {
            state.namespaces.push(namespace.to_string());
        }
        self
    }

    /// Inspect a stored secret
    pub fn secret(&self, namespace: &str, name: &str) -> Option<SecretData> {
        self.state
            .read()
            .ok()?
            .secrets
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }
}

fn poisoned<T>(_: T) -> CoreError {
    CoreError::Cluster("mock cluster lock poisoned".to_string())
}

#[async_trait]
impl ClusterAccess for MockCluster {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<SecretData>> {
        let state = self.state.read().map_err(poisoned)?;
        if state.unreachable_secrets.iter().any(|s| s == name) {
            return Err(CoreError::Cluster(format!("secrets \"{}\" is forbidden", name)));
        }
        Ok(state
            .secrets
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn create_secret(&self, namespace: &str, name: &str, data: SecretData) -> Result<()> {
        let mut state = self.state.write().map_err(poisoned)?;
        let key = (namespace.to_string(), name.to_string());
        if state.secrets.contains_key(&key) {
            return Err(CoreError::Cluster(format!(
                "secrets \"{}\" already exists",
                name
            )));
        }
        state.secrets.insert(key, data);
        Ok(())
    }

    async fn list_nodes(&self) -> Result<Vec<NodeInfo>> {
        Ok(self.state.read().map_err(poisoned)?.nodes.clone())
    }

    async fn server_version(&self) -> Result<String> {
        self.state
            .read()
            .map_err(poisoned)?
            .version
            .clone()
            .ok_or_else(|| CoreError::Cluster("server version unavailable".to_string()))
    }

    async fn namespace_exists(&self, namespace: &str) -> Result<bool> {
        Ok(self
            .state
            .read()
            .map_err(poisoned)?
            .namespaces
            .iter()
            .any(|n| n == namespace))
    }
}
