//! Live cluster access for validation and pre-deploy provisioning

use async_trait::async_trait;
use k8s_openapi::ByteString;
use k8s_openapi::api::core::v1::{Namespace, Node, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Client;
use kube::api::{Api, ListParams, PostParams};
use std::collections::BTreeMap;

use stowage_core::{ClusterAccess, CoreError, NodeInfo, SecretData};

use crate::error::KubeError;

fn cluster_error(e: kube::Error) -> CoreError {
    KubeError::Api(e).into()
}

/// [`ClusterAccess`] backed by a kube client
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect using in-cluster config or the local kubeconfig
    pub async fn connect() -> crate::error::Result<Self> {
        Ok(Self::new(Client::try_default().await?))
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

/// Secret data, with `stringData` filling keys `data` lacks
pub(crate) fn secret_data(secret: Secret) -> SecretData {
    let mut data: SecretData = secret
        .data
        .unwrap_or_default()
        .into_iter()
        .map(|(k, v)| (k, v.0))
        .collect();
    for (key, value) in secret.string_data.unwrap_or_default() {
        data.entry(key).or_insert_with(|| value.into_bytes());
    }
    data
}

#[async_trait]
impl ClusterAccess for KubeCluster {
    async fn get_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> stowage_core::Result<Option<SecretData>> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let secret = api.get_opt(name).await.map_err(cluster_error)?;
        Ok(secret.map(secret_data))
    }

    async fn create_secret(
        &self,
        namespace: &str,
        name: &str,
        data: SecretData,
    ) -> stowage_core::Result<()> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let secret = Secret {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                labels: Some(BTreeMap::from([(
                    "app".to_string(),
                    stowage_engine::APP_NAME.to_string(),
                )])),
                ..Default::default()
            },
            data: Some(
                data.into_iter()
                    .map(|(k, v)| (k, ByteString(v)))
                    .collect(),
            ),
            type_: Some("Opaque".to_string()),
            ..Default::default()
        };
        api.create(&PostParams::default(), &secret)
            .await
            .map_err(cluster_error)?;
        Ok(())
    }

    async fn list_nodes(&self) -> stowage_core::Result<Vec<NodeInfo>> {
        let api: Api<Node> = Api::all(self.client.clone());
        let nodes = api
            .list(&ListParams::default())
            .await
            .map_err(cluster_error)?;
        Ok(nodes
            .items
            .into_iter()
            .map(|node| NodeInfo {
                name: node.metadata.name.unwrap_or_default(),
                labels: node.metadata.labels.unwrap_or_default(),
            })
            .collect())
    }

    async fn server_version(&self) -> stowage_core::Result<String> {
        let info = self
            .client
            .apiserver_version()
            .await
            .map_err(cluster_error)?;
        Ok(info.git_version)
    }

    async fn namespace_exists(&self, namespace: &str) -> stowage_core::Result<bool> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        Ok(api
            .get_opt(namespace)
            .await
            .map_err(cluster_error)?
            .is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_data_merges_string_data() {
        let secret = Secret {
            data: Some(BTreeMap::from([(
                "password".to_string(),
                ByteString(b"s3cret".to_vec()),
            )])),
            string_data: Some(BTreeMap::from([
                ("username".to_string(), "stowage".to_string()),
                ("password".to_string(), "ignored".to_string()),
            ])),
            ..Default::default()
        };
        let data = secret_data(secret);
        assert_eq!(data["password"], b"s3cret".to_vec());
        assert_eq!(data["username"], b"stowage".to_vec());
    }

    #[test]
    fn test_empty_secret() {
        assert!(secret_data(Secret::default()).is_empty());
    }
}
