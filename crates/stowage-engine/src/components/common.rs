//! Helpers shared by the reference producers

use k8s_openapi::api::core::v1::{
    Affinity, Container, EnvVar, EnvVarSource, LocalObjectReference, NodeAffinity,
    NodeSelector, NodeSelectorRequirement, NodeSelectorTerm, Pod, PodSpec, SecretKeySelector,
    ServiceAccount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use std::collections::BTreeMap;

use stowage_core::versions::v1::{DB_CREDENTIALS_SECRET, LogLevel};

use crate::context::RenderContext;
use crate::error::Result;
use crate::objects::Object;

pub use stowage_core::cluster::{AFFINITY_LABEL_META, AFFINITY_LABEL_WORKSPACE_SERVICES};

pub const DATABASE_HOST: &str = "mysql";
pub const DATABASE_PORT: i32 = 3306;
pub const CLOUD_SQL_PROXY: &str = "cloudsqlproxy";

/// Repository of images not built by this project
pub const THIRD_PARTY_REPO: &str = "docker.io";

pub fn metadata(ctx: &RenderContext, component: &str, name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(ctx.namespace().to_string()),
        labels: Some(ctx.labels(component)),
        ..Default::default()
    }
}

/// Metadata for cluster-scoped objects
pub fn cluster_metadata(ctx: &RenderContext, component: &str, name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        labels: Some(ctx.labels(component)),
        ..Default::default()
    }
}

pub fn selector(ctx: &RenderContext, component: &str) -> LabelSelector {
    LabelSelector {
        match_labels: Some(ctx.labels(component)),
        ..Default::default()
    }
}

/// Pods are pinned to nodes carrying `label`
pub fn node_affinity(label: &str) -> Affinity {
    Affinity {
        node_affinity: Some(NodeAffinity {
            required_during_scheduling_ignored_during_execution: Some(NodeSelector {
                node_selector_terms: vec![NodeSelectorTerm {
                    match_expressions: Some(vec![NodeSelectorRequirement {
                        key: label.to_string(),
                        operator: "Exists".to_string(),
                        ..Default::default()
                    }]),
                    ..Default::default()
                }],
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn service_account(ctx: &RenderContext, component: &str) -> Result<Object> {
    Object::new(&ServiceAccount {
        metadata: metadata(ctx, component, component),
        image_pull_secrets: image_pull_secrets(ctx),
        ..Default::default()
    })
}

pub fn image_pull_secrets(ctx: &RenderContext) -> Option<Vec<LocalObjectReference>> {
    let secrets = &ctx.config().image_pull_secrets;
    if secrets.is_empty() {
        return None;
    }
    Some(
        secrets
            .iter()
            .map(|s| LocalObjectReference {
                name: s.name.clone(),
            })
            .collect(),
    )
}

pub fn env(name: &str, value: impl Into<String>) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.into()),
        ..Default::default()
    }
}

pub fn secret_env(name: &str, secret: &str, key: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value_from: Some(EnvVarSource {
            secret_key_ref: Some(SecretKeySelector {
                name: secret.to_string(),
                key: key.to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Environment every first-party container receives
pub fn default_env(ctx: &RenderContext) -> Vec<EnvVar> {
    let cfg = ctx.config();
    let log_level = match cfg.observability.log_level {
        LogLevel::Trace => "trace",
        LogLevel::Debug => "debug",
        LogLevel::Info => "info",
        LogLevel::Warning => "warning",
        LogLevel::Error => "error",
    };

    let mut vars = vec![
        env("STOWAGE_DOMAIN", cfg.domain.clone()),
        env("STOWAGE_REGION", cfg.metadata.region.clone()),
        env("STOWAGE_INSTALLATION", cfg.metadata.shortname.clone()),
        env("LOG_LEVEL", log_level),
    ];
    if let Some(proxy) = &cfg.http_proxy {
        for key in ["HTTP_PROXY", "HTTPS_PROXY", "NO_PROXY"] {
            vars.push(secret_env(key, &proxy.name, key));
        }
    }
    vars
}

/// Connection settings for whichever database backend is configured
pub fn database_env(ctx: &RenderContext) -> Vec<EnvVar> {
    let db = &ctx.config().database;
    let credentials = db
        .credentials
        .as_ref()
        .map(|c| c.name.as_str())
        .unwrap_or(DB_CREDENTIALS_SECRET);

    if let Some(external) = &db.external {
        let secret = &external.certificate.name;
        return vec![
            secret_env("DB_HOST", secret, "host"),
            secret_env("DB_PORT", secret, "port"),
            secret_env("DB_USERNAME", secret, "username"),
            secret_env("DB_PASSWORD", secret, "password"),
            secret_env("DB_ENCRYPTION_KEYS", secret, "encryptionKeys"),
        ];
    }

    let host = if db.cloud_sql.is_some() {
        CLOUD_SQL_PROXY
    } else {
        DATABASE_HOST
    };
    vec![
        env("DB_HOST", host),
        env("DB_PORT", DATABASE_PORT.to_string()),
        secret_env("DB_USERNAME", credentials, "username"),
        secret_env("DB_PASSWORD", credentials, "password"),
    ]
}

/// Name of the active database backend
pub fn database_type(ctx: &RenderContext) -> &'static str {
    let db = &ctx.config().database;
    if db.external.is_some() {
        "external"
    } else if db.cloud_sql.is_some() {
        "cloudsql"
    } else {
        "incluster"
    }
}

/// A pod that exists only to be hashed: its content changes whenever the
/// database backend changes
pub fn database_type_pod(ctx: &RenderContext) -> Result<Object> {
    Object::new(&Pod {
        spec: Some(PodSpec {
            containers: vec![Container {
                name: "database-type".to_string(),
                env: Some(vec![env("DATABASE_TYPE", database_type(ctx))]),
                ..Default::default()
            }],
            ..Default::default()
        }),
        ..Default::default()
    })
}

pub fn annotations(entries: &[(&str, String)]) -> Option<BTreeMap<String, String>> {
    if entries.is_empty() {
        return None;
    }
    Some(
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::VersionManifest;
    use stowage_core::versions::v1::{Config, DatabaseExternal, ObjectRef};

    fn ctx(mutate: impl FnOnce(&mut Config)) -> RenderContext {
        let mut cfg = Config {
            domain: "stowage.example.com".into(),
            ..Default::default()
        };
        mutate(&mut cfg);
        cfg.apply_defaults();
        RenderContext::new(cfg, VersionManifest::default(), "stowage")
    }

    #[test]
    fn test_in_cluster_database_env() {
        let ctx = ctx(|_| {});
        let vars = database_env(&ctx);
        assert_eq!(vars[0].value.as_deref(), Some("mysql"));
        let password = vars.iter().find(|v| v.name == "DB_PASSWORD").unwrap();
        let secret = password.value_from.as_ref().unwrap().secret_key_ref.as_ref().unwrap();
        assert_eq!(secret.name, DB_CREDENTIALS_SECRET);
        assert_eq!(database_type(&ctx), "incluster");
    }

    #[test]
    fn test_external_database_env() {
        let ctx = ctx(|cfg| {
            cfg.database.external = Some(DatabaseExternal {
                certificate: ObjectRef::secret("database"),
            });
        });
        let vars = database_env(&ctx);
        assert!(vars.iter().all(|v| v.value.is_none()));
        assert_eq!(database_type(&ctx), "external");
    }

    #[test]
    fn test_database_type_pod_changes_with_backend() {
        let a = database_type_pod(&ctx(|_| {})).unwrap();
        let b = database_type_pod(&ctx(|cfg| {
            cfg.database.external = Some(DatabaseExternal::default());
        }))
        .unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_proxy_env_from_secret() {
        let ctx = ctx(|cfg| cfg.http_proxy = Some(ObjectRef::secret("proxy")));
        let vars = default_env(&ctx);
        assert!(vars.iter().any(|v| v.name == "NO_PROXY"));
    }
}
