//! Legacy config layout
//!
//! `v1alpha1` predates the split of TLS and registry settings. It can still be
//! loaded and is migrated forward to `v1` on read.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{ConfigDocument, VersionedDocument, downcast_mut, parse_document};
use crate::error::Result;
use crate::version::ConfigVersion;
use crate::versions::v1;
use crate::versions::v1::{
    ContainerRegistry, ContainerRegistryExternal, Database, InstallationKind, Metadata,
    ObjectRef, ObjectStorage, Observability, Workspace,
};

pub const API_VERSION: &str = "v1alpha1";

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

    /// Renamed `certificate` in v1
    pub tls: ObjectRef,

    pub database: Database,

    /// Renamed `objectStorage` in v1
    pub storage: ObjectStorage,

    pub registry: Registry,
    pub workspace: Workspace,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<ObjectRef>,
}

impl VersionedDocument for Config {
    const API_VERSION: &'static str = API_VERSION;
}

/// Flat registry settings, an empty `url` means in-cluster
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Registry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_cluster: Option<bool>,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate: Option<ObjectRef>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub base_image_whitelist: Vec<String>,
}

impl Registry {
    fn into_v1(self) -> ContainerRegistry {
        let external = !self.url.is_empty();
        ContainerRegistry {
            in_cluster: Some(!external && self.in_cluster.unwrap_or(true)),
            external: external.then(|| ContainerRegistryExternal {
                url: self.url,
                certificate: self.certificate,
            }),
            s3storage: None,
            private_base_image_allow_list: self.base_image_whitelist,
        }
    }
}

/// Migrate a legacy document onto a defaulted `v1` document
pub fn migrate_to_v1(old: &Config, new: &mut v1::Config) -> Result<()> {
    new.kind = old.kind;
    new.domain = old.domain.clone();
    new.observability = old.observability.clone();
    new.image_pull_secrets = old.image_pull_secrets.clone();
    new.license = old.license.clone();
    new.workspace = old.workspace.clone();

    if !old.metadata.region.is_empty() {
        new.metadata.region = old.metadata.region.clone();
    }
    if !old.metadata.shortname.is_empty() {
        new.metadata.shortname = old.metadata.shortname.clone();
    }
    if !old.repository.is_empty() {
        new.repository = old.repository.clone();
    }
    if !old.tls.name.is_empty() {
        new.certificate = old.tls.clone();
    }

    // Backends are replaced wholesale so defaults on `new` never leave two
    // branches configured.
    new.database = old.database.clone();
    new.object_storage = old.storage.clone();
    new.container_registry = old.registry.clone().into_v1();

    Ok(())
}

/// The `v1alpha1` config version
#[derive(Debug, Clone, Copy, Default)]
pub struct Version;

#[async_trait]
impl ConfigVersion for Version {
    fn id(&self) -> &'static str {
        API_VERSION
    }

    fn factory(&self) -> Box<dyn ConfigDocument> {
        Box::new(Config {
            api_version: API_VERSION.to_string(),
            ..Default::default()
        })
    }

    fn load(&self, raw: &[u8], strict: bool) -> Result<Box<dyn ConfigDocument>> {
        Ok(Box::new(parse_document::<Config>(raw, strict)?))
    }

    fn defaults(&self, cfg: &mut dyn ConfigDocument) -> Result<()> {
        let cfg = downcast_mut::<Config>(cfg)?;
        cfg.api_version = API_VERSION.to_string();
        if cfg.repository.is_empty() {
            cfg.repository = v1::DEFAULT_REPOSITORY.to_string();
        }
        if cfg.tls.name.is_empty() {
            cfg.tls = ObjectRef::secret(v1::DEFAULT_CERTIFICATE_NAME);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::downcast_ref;
    use crate::envvars::EnvSource;
    use crate::error::CoreError;
    use crate::versions::v1::ObjectStorageS3;
    use std::collections::BTreeMap;

    const LEGACY: &str = r#"
apiVersion: v1alpha1
kind: Meta
domain: stowage.example.com
tls:
  kind: secret
  name: legacy-tls
storage:
  s3:
    endpoint: s3.example.com
    bucketName: stowage
    credentials:
      kind: secret
      name: s3
registry:
  url: registry.example.com
  baseImageWhitelist: [docker.io]
"#;

    fn defaulted_v1() -> v1::Config {
        let mut cfg = v1::Config::default();
        cfg.apply_defaults();
        cfg
    }

    #[test]
    fn test_load_legacy_layout() {
        let doc = Version.load(LEGACY.as_bytes(), true).unwrap();
        let cfg = downcast_ref::<Config>(doc.as_ref()).unwrap();
        assert_eq!(cfg.tls.name, "legacy-tls");
        assert_eq!(cfg.registry.url, "registry.example.com");
    }

    #[test]
    fn test_migrate_renames_and_splits_registry() {
        let old = parse_document::<Config>(LEGACY.as_bytes(), true).unwrap();
        let mut new = defaulted_v1();

        migrate_to_v1(&old, &mut new).unwrap();

        assert_eq!(new.kind, InstallationKind::Meta);
        assert_eq!(new.certificate, ObjectRef::secret("legacy-tls"));
        assert_eq!(new.object_storage.in_cluster, None);
        assert_eq!(
            new.object_storage.s3,
            Some(ObjectStorageS3 {
                endpoint: "s3.example.com".into(),
                bucket_name: "stowage".into(),
                credentials: ObjectRef::secret("s3"),
            })
        );
        assert_eq!(new.container_registry.in_cluster, Some(false));
        assert_eq!(
            new.container_registry.external.as_ref().unwrap().url,
            "registry.example.com"
        );
        assert_eq!(new.container_registry.private_base_image_allow_list, vec!["docker.io"]);
    }

    #[test]
    fn test_migrate_keeps_defaults_for_empty_fields() {
        let mut old = Config::default();
        Version.defaults(&mut old).unwrap();
        let mut new = defaulted_v1();

        migrate_to_v1(&old, &mut new).unwrap();
        new.apply_defaults();

        assert_eq!(new.repository, v1::DEFAULT_REPOSITORY);
        assert_eq!(new.metadata.region, v1::DEFAULT_REGION);
        assert_eq!(new.container_registry.in_cluster, Some(true));
        assert!(new.container_registry.external.is_none());
        assert_eq!(new.database.in_cluster, Some(true));
    }

    #[test]
    fn test_envvars_unsupported() {
        let env: BTreeMap<String, String> = BTreeMap::new();
        let mut doc = Version.factory();
        let err = Version
            .build_from_envvars(doc.as_mut(), &env as &dyn EnvSource)
            .unwrap_err();
        assert!(matches!(err, CoreError::Unsupported { .. }));
    }
}
