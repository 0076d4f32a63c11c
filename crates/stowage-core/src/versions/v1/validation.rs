//! v1 field predicates and cluster checks

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value as JsonValue;

use super::config::Config;
use crate::schema::StructValidator;
use crate::validation::ClusterCheck;

static FQDN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?$")
        .expect("valid regex")
});

pub fn register_predicates(validator: &mut StructValidator) {
    validator.register("fqdn", |v| match v.as_str() {
        Some(s) if FQDN.is_match(s) => Ok(()),
        _ => Err("must be a fully qualified domain name".to_string()),
    });
    validator.register("abs_path", |v| match v.as_str() {
        Some(s) if s.starts_with('/') => Ok(()),
        _ => Err("must be an absolute path".to_string()),
    });
    validator.register("url", |v| match v.as_str() {
        Some(s) if s.starts_with("https://") || s.starts_with("http://") => Ok(()),
        _ => Err("must be an http(s) URL".to_string()),
    });
    validator.register("database_backend", |v| {
        exactly_one(v, &["external", "cloudSQL"], "inCluster, external, cloudSQL")
    });
    validator.register("object_storage_backend", |v| {
        exactly_one(
            v,
            &["s3", "cloudStorage", "azure"],
            "inCluster, s3, cloudStorage, azure",
        )
    });
    validator.register("registry_backend", |v| {
        exactly_one(v, &["external"], "inCluster, external")?;
        if v.get("s3storage").is_some_and(|s| !s.is_null()) && !in_cluster(v) {
            return Err("s3storage requires an in-cluster registry".to_string());
        }
        Ok(())
    });
}

fn in_cluster(v: &JsonValue) -> bool {
    v.get("inCluster").and_then(JsonValue::as_bool).unwrap_or(false)
}

/// `inCluster: true` and the listed keys are mutually exclusive backends
fn exactly_one(v: &JsonValue, keys: &[&str], names: &str) -> Result<(), String> {
    let configured = keys
        .iter()
        .filter(|k| v.get(**k).is_some_and(|x| !x.is_null()))
        .count()
        + usize::from(in_cluster(v));
    if configured == 1 {
        Ok(())
    } else {
        Err(format!(
            "exactly one of {} must be configured, found {}",
            names, configured
        ))
    }
}

/// Secrets the cluster must hold for this config
pub fn cluster_checks(cfg: &Config) -> Vec<ClusterCheck> {
    let mut checks = vec![ClusterCheck::secret_keys(
        "https certificates",
        &cfg.certificate.name,
        &["tls.crt", "tls.key"],
    )];

    if let Some(ca) = &cfg.custom_ca_cert {
        checks.push(ClusterCheck::secret_keys("custom CA", &ca.name, &["ca.crt"]));
    }
    if let Some(license) = &cfg.license {
        checks.push(ClusterCheck::secret_keys(
            "license",
            &license.name,
            &["license", "type"],
        ));
    }

    let db = &cfg.database;
    if let Some(cloud_sql) = &db.cloud_sql {
        checks.push(ClusterCheck::secret_keys(
            "database cloudsql",
            &cloud_sql.service_account.name,
            &["credentials.json", "encryptionKeys", "password", "username"],
        ));
    }
    if let Some(external) = &db.external {
        checks.push(ClusterCheck::secret_keys(
            "database external",
            &external.certificate.name,
            &["encryptionKeys", "host", "password", "port", "username"],
        ));
    }

    let storage = &cfg.object_storage;
    if let Some(s3) = &storage.s3 {
        checks.push(ClusterCheck::secret_keys(
            "object storage s3",
            &s3.credentials.name,
            &["accessKeyId", "secretAccessKey"],
        ));
    }
    if let Some(gcs) = &storage.cloud_storage {
        checks.push(ClusterCheck::secret_keys(
            "object storage cloud storage",
            &gcs.service_account.name,
            &["service-account.json"],
        ));
    }
    if let Some(azure) = &storage.azure {
        checks.push(ClusterCheck::secret_keys(
            "object storage azure",
            &azure.credentials.name,
            &["accountName", "accountKey"],
        ));
    }

    let registry = &cfg.container_registry;
    if let Some(cert) = registry.external.as_ref().and_then(|e| e.certificate.as_ref()) {
        checks.push(ClusterCheck::secret_keys(
            "container registry",
            &cert.name,
            &[".dockerconfigjson"],
        ));
    }
    if let Some(s3) = &registry.s3storage {
        checks.push(ClusterCheck::secret_keys(
            "container registry s3 storage",
            &s3.certificate.name,
            &["s3AccessKey", "s3SecretKey"],
        ));
    }

    checks
}
