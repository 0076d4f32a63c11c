//! The v1 installation config layout

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::experimental::Experimental;
use crate::config::VersionedDocument;

pub const API_VERSION: &str = "v1";

pub const DEFAULT_REPOSITORY: &str = "ghcr.io/stowage-dev/stowage";
pub const DEFAULT_CERTIFICATE_NAME: &str = "https-certificates";
pub const DEFAULT_REGION: &str = "local";
pub const DEFAULT_SHORTNAME: &str = "default";
pub const DEFAULT_OPEN_VSX_URL: &str = "https://open-vsx.org";
pub const DEFAULT_MAX_LIFETIME: &str = "36h";
pub const DEFAULT_CONTAINERD_RUNTIME_DIR: &str = "/var/lib/containerd/io.containerd.runtime.v2.task/k8s.io";
pub const DEFAULT_CONTAINERD_SOCKET_DIR: &str = "/run/containerd";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    pub api_version: String,
    pub kind: InstallationKind,
    pub domain: String,
    pub metadata: Metadata,
    pub repository: String,
    pub observability: Observability,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub image_pull_secrets: Vec<ObjectRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drop_image_repo: Option<bool>,

    pub certificate: ObjectRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_proxy: Option<ObjectRef>,
    #[serde(rename = "customCACert", skip_serializing_if = "Option::is_none")]
    pub custom_ca_cert: Option<ObjectRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<ObjectRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssh_gateway_host_key: Option<ObjectRef>,

    pub database: Database,
    pub object_storage: ObjectStorage,
    pub container_registry: ContainerRegistry,
    pub workspace: Workspace,

    #[serde(rename = "openVSX")]
    pub open_vsx: OpenVsx,
    pub block_new_users: BlockNewUsers,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub auth_providers: Vec<ObjectRef>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub customization: Option<Vec<Customization>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<Components>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental: Option<Experimental>,
}

impl VersionedDocument for Config {
    const API_VERSION: &'static str = API_VERSION;
}

/// Which slice of the system an installation runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstallationKind {
    #[default]
    Full,
    Meta,
    Workspace,
}

impl InstallationKind {
    pub fn includes_meta(self) -> bool {
        matches!(self, Self::Full | Self::Meta)
    }

    pub fn includes_workspace(self) -> bool {
        matches!(self, Self::Full | Self::Workspace)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Metadata {
    pub region: String,
    pub shortname: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Observability {
    pub log_level: LogLevel,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectRefKind {
    #[default]
    Secret,
}

/// Reference to a cluster object holding sensitive data
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ObjectRef {
    pub kind: ObjectRefKind,
    pub name: String,
}

impl ObjectRef {
    pub fn secret(name: impl Into<String>) -> Self {
        Self {
            kind: ObjectRefKind::Secret,
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Database {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_cluster: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external: Option<DatabaseExternal>,
    #[serde(rename = "cloudSQL", skip_serializing_if = "Option::is_none")]
    pub cloud_sql: Option<DatabaseCloudSql>,
    /// Secret holding in-cluster database credentials
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<ObjectRef>,
}

impl Database {
    pub fn is_in_cluster(&self) -> bool {
        self.in_cluster.unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DatabaseExternal {
    pub certificate: ObjectRef,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DatabaseCloudSql {
    pub service_account: ObjectRef,
    pub instance: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ObjectStorage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_cluster: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s3: Option<ObjectStorageS3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloud_storage: Option<ObjectStorageCloudStorage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub azure: Option<ObjectStorageAzure>,
    /// Deprecated, no longer read
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum_backup_count: Option<i32>,
}

impl ObjectStorage {
    pub fn is_in_cluster(&self) -> bool {
        self.in_cluster.unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ObjectStorageS3 {
    pub endpoint: String,
    pub bucket_name: String,
    pub credentials: ObjectRef,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ObjectStorageCloudStorage {
    pub service_account: ObjectRef,
    pub project: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ObjectStorageAzure {
    pub credentials: ObjectRef,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContainerRegistry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_cluster: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external: Option<ContainerRegistryExternal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s3storage: Option<S3Storage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub private_base_image_allow_list: Vec<String>,
}

impl ContainerRegistry {
    pub fn is_in_cluster(&self) -> bool {
        self.in_cluster.unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContainerRegistryExternal {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate: Option<ObjectRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct S3Storage {
    pub bucket: String,
    pub region: String,
    pub endpoint: String,
    pub certificate: ObjectRef,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Workspace {
    pub runtime: WorkspaceRuntime,
    pub max_lifetime: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FsShiftMethod {
    #[default]
    Fuse,
    Shiftfs,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WorkspaceRuntime {
    pub fs_shift_method: FsShiftMethod,
    pub containerd_runtime_dir: String,
    pub containerd_socket_dir: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OpenVsx {
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BlockNewUsers {
    pub enabled: bool,
    /// Email domains still allowed to sign up
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub passlist: Vec<String>,
}

/// Labels and annotations merged into matching rendered objects.
/// `*` in any field matches everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Customization {
    pub api_version: String,
    pub kind: String,
    pub metadata: CustomizationMetadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CustomizationMetadata {
    pub name: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Components {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ProxyComponent>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProxyComponent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<ComponentTypeService>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ComponentTypeService {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_type: Option<String>,
}

impl Config {
    /// Proxy service type requested under `components`
    pub fn proxy_service_type(&self) -> Option<&str> {
        self.components
            .as_ref()?
            .proxy
            .as_ref()?
            .service
            .as_ref()?
            .service_type
            .as_deref()
    }

    /// Fill required-but-omittable fields, never overwriting what is set
    pub fn apply_defaults(&mut self) {
        self.api_version = API_VERSION.to_string();

        if self.repository.is_empty() {
            self.repository = DEFAULT_REPOSITORY.to_string();
        }
        if self.certificate.name.is_empty() {
            self.certificate = ObjectRef::secret(DEFAULT_CERTIFICATE_NAME);
        }
        if self.metadata.region.is_empty() {
            self.metadata.region = DEFAULT_REGION.to_string();
        }
        if self.metadata.shortname.is_empty() {
            self.metadata.shortname = DEFAULT_SHORTNAME.to_string();
        }

        let db = &mut self.database;
        if db.in_cluster.is_none() && db.external.is_none() && db.cloud_sql.is_none() {
            db.in_cluster = Some(true);
        }

        let storage = &mut self.object_storage;
        if storage.in_cluster.is_none()
            && storage.s3.is_none()
            && storage.cloud_storage.is_none()
            && storage.azure.is_none()
        {
            storage.in_cluster = Some(true);
        }

        let registry = &mut self.container_registry;
        if registry.in_cluster.is_none() && registry.external.is_none() {
            registry.in_cluster = Some(true);
        }

        let runtime = &mut self.workspace.runtime;
        if runtime.containerd_runtime_dir.is_empty() {
            runtime.containerd_runtime_dir = DEFAULT_CONTAINERD_RUNTIME_DIR.to_string();
        }
        if runtime.containerd_socket_dir.is_empty() {
            runtime.containerd_socket_dir = DEFAULT_CONTAINERD_SOCKET_DIR.to_string();
        }
        if self.workspace.max_lifetime.is_empty() {
            self.workspace.max_lifetime = DEFAULT_MAX_LIFETIME.to_string();
        }

        if self.open_vsx.url.is_empty() {
            self.open_vsx.url = DEFAULT_OPEN_VSX_URL.to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_document;

    #[test]
    fn test_defaults_fill_only_unset_fields() {
        let mut cfg = Config {
            repository: "registry.example.com/stowage".into(),
            database: Database {
                in_cluster: Some(false),
                external: Some(DatabaseExternal {
                    certificate: ObjectRef::secret("db-cert"),
                }),
                ..Default::default()
            },
            ..Default::default()
        };

        cfg.apply_defaults();

        assert_eq!(cfg.api_version, "v1");
        assert_eq!(cfg.repository, "registry.example.com/stowage");
        assert_eq!(cfg.certificate.name, DEFAULT_CERTIFICATE_NAME);
        assert_eq!(cfg.database.in_cluster, Some(false));
        assert_eq!(cfg.object_storage.in_cluster, Some(true));
        assert_eq!(cfg.container_registry.in_cluster, Some(true));
        assert_eq!(cfg.open_vsx.url, DEFAULT_OPEN_VSX_URL);
        assert_eq!(cfg.workspace.max_lifetime, "36h");
    }

    #[test]
    fn test_defaults_do_not_claim_configured_backends() {
        let mut cfg = Config::default();
        cfg.object_storage.s3 = Some(ObjectStorageS3::default());
        cfg.apply_defaults();
        assert_eq!(cfg.object_storage.in_cluster, None);
    }

    #[test]
    fn test_parse_camel_case_layout() {
        let raw = br#"
apiVersion: v1
kind: Meta
domain: stowage.example.com
customCACert:
  kind: secret
  name: ca
database:
  inCluster: false
  cloudSQL:
    instance: project:region:db
    serviceAccount:
      kind: secret
      name: sa
openVSX:
  url: https://vsx.example.com
components:
  proxy:
    service:
      serviceType: ClusterIP
"#;
        let cfg: Config = parse_document(raw, true).unwrap();
        assert_eq!(cfg.kind, InstallationKind::Meta);
        assert_eq!(cfg.custom_ca_cert, Some(ObjectRef::secret("ca")));
        assert_eq!(cfg.proxy_service_type(), Some("ClusterIP"));
        assert_eq!(cfg.open_vsx.url, "https://vsx.example.com");
        assert_eq!(cfg.database.cloud_sql.unwrap().instance, "project:region:db");
    }

    #[test]
    fn test_strict_rejects_misspelled_keys_with_empty_values() {
        let raw = b"apiVersion: v1\ndomain: stowage.example.com\ndomian: \"\"\nworkspace:\n  bogusKnob: {}\n";
        match parse_document::<Config>(raw, true).unwrap_err() {
            crate::error::CoreError::UnknownFields { fields } => {
                assert_eq!(fields, vec!["domian".to_string(), "workspace.bogusKnob".to_string()])
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_non_utf8_domain_is_rejected() {
        let raw = b"apiVersion: v1\ndomain: stowage\xff.example.com\n";
        assert!(matches!(
            parse_document::<Config>(raw, true),
            Err(crate::error::CoreError::Encoding(_))
        ));
    }

    #[test]
    fn test_proxy_service_type_chain() {
        let mut cfg = Config::default();
        assert_eq!(cfg.proxy_service_type(), None);
        cfg.components = Some(Components {
            proxy: Some(ProxyComponent { service: None }),
        });
        assert_eq!(cfg.proxy_service_type(), None);
        cfg.components = Some(Components {
            proxy: Some(ProxyComponent {
                service: Some(ComponentTypeService {
                    service_type: Some("ClusterIP".into()),
                }),
            }),
        });
        assert_eq!(cfg.proxy_service_type(), Some("ClusterIP"));
    }

    #[test]
    fn test_installation_kind_gates() {
        assert!(InstallationKind::Full.includes_meta());
        assert!(InstallationKind::Full.includes_workspace());
        assert!(!InstallationKind::Meta.includes_workspace());
        assert!(!InstallationKind::Workspace.includes_meta());
    }
}
