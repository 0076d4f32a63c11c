//! Rebuild a v1 config from environment variables
//!
//! The variable names are a public contract. Every subtree the environment
//! controls is reset before one branch is filled in, so running the build
//! twice, or over two different starting configs, yields the same result.
//! `CONFIG_PATCH_FILE` is the exception: it is merged last and may change
//! anything.

use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use super::config::{
    BlockNewUsers, ComponentTypeService, Components, Config, ContainerRegistryExternal,
    DEFAULT_OPEN_VSX_URL, DEFAULT_REGION, DEFAULT_REPOSITORY, DatabaseCloudSql, DatabaseExternal,
    ObjectRef, ObjectStorageAzure, ObjectStorageCloudStorage, ObjectStorageS3, OpenVsx,
    ProxyComponent, S3Storage,
};
use super::experimental::{Experimental, TelemetryConfig};
use crate::config::ConfigDocument;
use crate::envvars::{EnvSource, flag, list, string, string_or};
use crate::error::{CoreError, Result};

/// Secret created by the internal CA for self-signed installs
pub const SELF_SIGNED_CA_SECRET: &str = "ca-issuer-ca";

/// Environment variables understood by [`build_from_envvars`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigEnvvars {
    pub advanced_mode_enabled: bool,
    pub component_proxy_service_type: Option<String>,
    pub config_patch: Option<String>,
    pub customization_patch: Option<String>,
    pub db_cloud_sql_enabled: bool,
    pub db_cloud_sql_instance: String,
    pub db_cloud_sql_service_account_name: String,
    pub db_external_certificate_name: String,
    pub db_in_cluster_enabled: bool,
    pub domain: String,
    pub distribution: Option<String>,
    pub image_pull_secret_name: String,
    pub license_name: Option<String>,
    pub local_registry_address: String,
    pub local_registry_enabled: bool,
    pub local_registry_host: String,
    pub open_vsx_url: Option<String>,
    pub registry_docker_config_enabled: bool,
    pub registry_docker_config: String,
    pub registry_in_cluster_enabled: bool,
    pub registry_in_cluster_storage_type: String,
    pub registry_in_cluster_storage_s3_bucket_name: String,
    pub registry_in_cluster_storage_s3_cert_name: String,
    pub registry_in_cluster_storage_s3_endpoint: String,
    pub registry_in_cluster_storage_s3_region: String,
    pub registry_external_cert_name: Option<String>,
    pub registry_external_url: String,
    pub ssh_gateway_enabled: bool,
    pub ssh_gateway_host_key_name: String,
    pub storage_provider: String,
    pub storage_region: String,
    pub storage_azure_creds_name: String,
    pub storage_gcp_project_name: String,
    pub storage_gcp_service_account_name: String,
    pub storage_s3_bucket: String,
    pub storage_s3_creds_name: String,
    pub storage_s3_endpoint: String,
    pub tls_self_signed_enabled: bool,
    pub tls_cert_manager_enabled: bool,
    pub tls_custom_ca_cert_enabled: bool,
    pub tls_custom_ca_cert_creds_name: String,
    pub user_management_block_enabled: bool,
    pub user_management_block_passlist: Vec<String>,
}

impl ConfigEnvvars {
    pub fn from_env(env: &dyn EnvSource) -> Self {
        let s = |key: &str| string(env, key).unwrap_or_default();
        Self {
            advanced_mode_enabled: flag(env, "ADVANCED_MODE_ENABLED"),
            component_proxy_service_type: string(env, "COMPONENT_PROXY_SERVICE_SERVICETYPE"),
            config_patch: string(env, "CONFIG_PATCH_FILE"),
            customization_patch: string(env, "CUSTOMIZATION_PATCH_FILE"),
            db_cloud_sql_enabled: flag(env, "DB_CLOUDSQL_ENABLED"),
            db_cloud_sql_instance: s("DB_CLOUDSQL_INSTANCE"),
            db_cloud_sql_service_account_name: s("DB_CLOUDSQL_SERVICE_ACCOUNT_NAME"),
            db_external_certificate_name: s("DB_EXTERNAL_CERTIFICATE_NAME"),
            db_in_cluster_enabled: flag(env, "DB_INCLUSTER_ENABLED"),
            domain: s("DOMAIN"),
            distribution: string(env, "DISTRIBUTION"),
            image_pull_secret_name: s("IMAGE_PULL_SECRET_NAME"),
            license_name: string(env, "LICENSE_NAME"),
            local_registry_address: s("LOCAL_REGISTRY_ADDRESS"),
            local_registry_enabled: flag(env, "HAS_LOCAL_REGISTRY"),
            local_registry_host: s("LOCAL_REGISTRY_HOST"),
            open_vsx_url: string(env, "OPEN_VSX_URL"),
            registry_docker_config_enabled: flag(env, "REG_DOCKER_CONFIG_ENABLED"),
            registry_docker_config: s("REG_DOCKER_CONFIG_JSON"),
            registry_in_cluster_enabled: flag(env, "REG_INCLUSTER_ENABLED"),
            registry_in_cluster_storage_type: s("REG_INCLUSTER_STORAGE"),
            registry_in_cluster_storage_s3_bucket_name: s("REG_INCLUSTER_STORAGE_S3_BUCKETNAME"),
            registry_in_cluster_storage_s3_cert_name: s(
                "REG_INCLUSTER_STORAGE_S3_CERTIFICATE_NAME",
            ),
            registry_in_cluster_storage_s3_endpoint: s("REG_INCLUSTER_STORAGE_S3_ENDPOINT"),
            registry_in_cluster_storage_s3_region: s("REG_INCLUSTER_STORAGE_S3_REGION"),
            registry_external_cert_name: string(env, "REG_EXTERNAL_CERTIFICATE_NAME"),
            registry_external_url: s("REG_URL"),
            ssh_gateway_enabled: flag(env, "SSH_GATEWAY"),
            ssh_gateway_host_key_name: s("SSH_GATEWAY_HOST_KEY_NAME"),
            storage_provider: string_or(env, "STORE_PROVIDER", "incluster"),
            storage_region: s("STORE_REGION"),
            storage_azure_creds_name: s("STORE_AZURE_CREDENTIALS_NAME"),
            storage_gcp_project_name: s("STORE_GCP_PROJECT"),
            storage_gcp_service_account_name: s("STORE_GCP_SERVICE_ACCOUNT_NAME"),
            storage_s3_bucket: s("STORE_S3_BUCKET"),
            storage_s3_creds_name: s("STORE_S3_CREDENTIALS_NAME"),
            storage_s3_endpoint: s("STORE_S3_ENDPOINT"),
            tls_self_signed_enabled: flag(env, "TLS_SELF_SIGNED_ENABLED"),
            tls_cert_manager_enabled: flag(env, "CERT_MANAGER_ENABLED"),
            tls_custom_ca_cert_enabled: flag(env, "TLS_CUSTOM_CA_CRT_ENABLED"),
            tls_custom_ca_cert_creds_name: s("TLS_CUSTOM_CA_CRT_CREDENTIALS_NAME"),
            user_management_block_enabled: flag(env, "USER_MANAGEMENT_BLOCK_ENABLED"),
            user_management_block_passlist: list(env, "USER_MANAGEMENT_BLOCK_PASSLIST"),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct DockerConfig {
    #[serde(default)]
    auths: BTreeMap<String, JsonValue>,
}

#[derive(Debug, Default, Deserialize)]
struct CustomizationPatch {
    #[serde(default)]
    customization: Option<Vec<super::config::Customization>>,
}

/// Rebuild every environment-controlled part of `cfg`
pub fn build_from_envvars(cfg: &mut Config, env: &dyn EnvSource) -> Result<()> {
    let vars = ConfigEnvvars::from_env(env);
    debug!(?vars, "detected envvars");

    cfg.domain = vars.domain.clone();
    cfg.license = vars.license_name.as_deref().map(ObjectRef::secret);
    cfg.open_vsx = OpenVsx {
        url: vars
            .open_vsx_url
            .clone()
            .unwrap_or_else(|| DEFAULT_OPEN_VSX_URL.to_string()),
    };

    apply_database(cfg, &vars);
    apply_registry(cfg, &vars)?;
    apply_object_storage(cfg, &vars)?;

    cfg.ssh_gateway_host_key = vars
        .ssh_gateway_enabled
        .then(|| ObjectRef::secret(&vars.ssh_gateway_host_key_name));

    cfg.custom_ca_cert = if vars.tls_self_signed_enabled {
        info!("using the internal CA for a self-signed certificate");
        Some(ObjectRef::secret(SELF_SIGNED_CA_SECRET))
    } else if !vars.tls_cert_manager_enabled && vars.tls_custom_ca_cert_enabled {
        Some(ObjectRef::secret(&vars.tls_custom_ca_cert_creds_name))
    } else {
        None
    };

    cfg.block_new_users = BlockNewUsers::default();
    if vars.user_management_block_enabled {
        cfg.block_new_users.enabled = true;
        cfg.block_new_users.passlist = vars.user_management_block_passlist.clone();
    }

    apply_advanced(cfg, &vars)?;

    if let Some(platform) = &vars.distribution {
        let experimental = cfg.experimental.get_or_insert_with(Experimental::default);
        experimental
            .telemetry
            .get_or_insert_with(TelemetryConfig::default)
            .data
            .platform = platform.clone();
    }

    if let Some(patch) = &vars.config_patch {
        warn!("applying CONFIG_PATCH_FILE, this may overwrite any setting");
        let patch: JsonValue = serde_yaml::from_str(patch)?;
        cfg.apply_patch(&patch)?;
    }

    Ok(())
}

fn apply_database(cfg: &mut Config, vars: &ConfigEnvvars) {
    let db = &mut cfg.database;
    db.in_cluster = Some(vars.db_in_cluster_enabled);
    db.cloud_sql = None;
    db.external = None;
    db.credentials = None;

    if vars.db_in_cluster_enabled {
        return;
    }
    if vars.db_cloud_sql_enabled {
        info!("configuring cloud sql proxy for the database");
        db.cloud_sql = Some(DatabaseCloudSql {
            instance: vars.db_cloud_sql_instance.clone(),
            service_account: ObjectRef::secret(&vars.db_cloud_sql_service_account_name),
        });
    } else {
        info!("configuring external database");
        db.external = Some(DatabaseExternal {
            certificate: ObjectRef::secret(&vars.db_external_certificate_name),
        });
    }
}

fn apply_registry(cfg: &mut Config, vars: &ConfigEnvvars) -> Result<()> {
    cfg.repository = DEFAULT_REPOSITORY.to_string();
    cfg.image_pull_secrets = Vec::new();
    cfg.drop_image_repo = Some(false);

    let registry = &mut cfg.container_registry;
    registry.private_base_image_allow_list = Vec::new();

    if vars.local_registry_enabled {
        info!("configuring mirrored registry for an airgapped installation");
        cfg.repository = vars.local_registry_address.clone();
        cfg.image_pull_secrets = vec![ObjectRef::secret(&vars.image_pull_secret_name)];
        cfg.drop_image_repo = Some(true);
        registry
            .private_base_image_allow_list
            .push(vars.local_registry_host.clone());
    }

    if vars.registry_docker_config_enabled {
        let docker: DockerConfig = serde_yaml::from_str(&vars.registry_docker_config)
            .map_err(|e| CoreError::Envvar {
                message: format!("REG_DOCKER_CONFIG_JSON is not a docker config: {}", e),
            })?;
        registry
            .private_base_image_allow_list
            .extend(docker.auths.into_keys());
    }

    if !registry.private_base_image_allow_list.is_empty() {
        registry
            .private_base_image_allow_list
            .push("docker.io".to_string());
    }

    registry.in_cluster = Some(vars.registry_in_cluster_enabled);
    registry.external = None;
    registry.s3storage = None;

    if !vars.registry_in_cluster_enabled {
        info!("configuring external container registry");
        registry.external = Some(ContainerRegistryExternal {
            url: vars.registry_external_url.clone(),
            certificate: vars
                .registry_external_cert_name
                .as_deref()
                .map(ObjectRef::secret),
        });
    } else if vars.registry_in_cluster_storage_type == "s3" {
        info!("configuring s3 storage for the in-cluster registry");
        registry.s3storage = Some(S3Storage {
            region: vars.registry_in_cluster_storage_s3_region.clone(),
            endpoint: vars.registry_in_cluster_storage_s3_endpoint.clone(),
            bucket: vars.registry_in_cluster_storage_s3_bucket_name.clone(),
            certificate: ObjectRef::secret(&vars.registry_in_cluster_storage_s3_cert_name),
        });
    }

    Ok(())
}

fn apply_object_storage(cfg: &mut Config, vars: &ConfigEnvvars) -> Result<()> {
    let storage = &mut cfg.object_storage;
    storage.in_cluster = Some(true);
    storage.azure = None;
    storage.cloud_storage = None;
    storage.s3 = None;
    cfg.metadata.region = DEFAULT_REGION.to_string();

    let provider = vars.storage_provider.as_str();
    info!(provider, "configuring object storage");
    if provider == "incluster" {
        return Ok(());
    }

    cfg.metadata.region = vars.storage_region.clone();
    storage.in_cluster = Some(false);

    match provider {
        "azure" => {
            storage.azure = Some(ObjectStorageAzure {
                credentials: ObjectRef::secret(&vars.storage_azure_creds_name),
            });
        }
        "gcp" => {
            storage.cloud_storage = Some(ObjectStorageCloudStorage {
                project: vars.storage_gcp_project_name.clone(),
                service_account: ObjectRef::secret(&vars.storage_gcp_service_account_name),
            });
        }
        "s3" => {
            storage.s3 = Some(ObjectStorageS3 {
                endpoint: vars.storage_s3_endpoint.clone(),
                bucket_name: vars.storage_s3_bucket.clone(),
                credentials: ObjectRef::secret(&vars.storage_s3_creds_name),
            });
        }
        other => {
            return Err(CoreError::Envvar {
                message: format!("unknown storage provider: {}", other),
            });
        }
    }

    Ok(())
}

fn apply_advanced(cfg: &mut Config, vars: &ConfigEnvvars) -> Result<()> {
    cfg.components = None;
    cfg.customization = None;

    if !vars.advanced_mode_enabled {
        return Ok(());
    }

    if let Some(service_type) = &vars.component_proxy_service_type {
        info!(%service_type, "applying proxy service type");
        cfg.components = Some(Components {
            proxy: Some(ProxyComponent {
                service: Some(ComponentTypeService {
                    service_type: Some(service_type.clone()),
                }),
            }),
        });
    }

    if let Some(raw) = &vars.customization_patch {
        let patch: CustomizationPatch = serde_yaml::from_str(raw)?;
        match &patch.customization {
            Some(entries) => info!(count = entries.len(), "applying customization"),
            None => info!("customization patch has no entries"),
        }
        cfg.customization = patch.customization;
    }

    Ok(())
}
