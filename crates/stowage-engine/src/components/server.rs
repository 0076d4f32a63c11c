//! API server: configuration, service and deployment

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    ConfigMap, ConfigMapVolumeSource, Container, ContainerPort, PodSpec, PodTemplateSpec,
    SecretVolumeSource, Service, ServicePort, ServiceSpec, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use serde::Serialize;
use std::collections::BTreeMap;

use super::common::{
    AFFINITY_LABEL_META, annotations, database_env, database_type_pod, default_env, env,
    image_pull_secrets, metadata, node_affinity, selector, service_account,
};
use crate::context::RenderContext;
use crate::error::Result;
use crate::hash::{CHECKSUM_CONFIG_ANNOTATION, object_hash};
use crate::objects::Object;

pub const COMPONENT: &str = "server";
pub const CONFIG_KEY: &str = "config.json";
pub const PORT: i32 = 3000;

/// Runtime settings the server reads from its mounted config
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ServerSettings<'a> {
    domain: &'a str,
    installation_shortname: &'a str,
    stage: &'a str,
    open_vsx_url: &'a str,
    workspace_max_lifetime: &'a str,
    block_new_users: BlockNewUsersSettings<'a>,
    default_base_image_registry_allow_list: &'a [String],
    auth_provider_configs: Vec<String>,
    license_file: Option<&'static str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BlockNewUsersSettings<'a> {
    enabled: bool,
    passlist: &'a [String],
}

const AUTH_PROVIDERS_DIR: &str = "/etc/server/auth-providers";
const LICENSE_PATH: &str = "/etc/server/license/license";

fn settings(ctx: &RenderContext) -> Result<String> {
    let cfg = ctx.config();
    let settings = ServerSettings {
        domain: &cfg.domain,
        installation_shortname: &cfg.metadata.shortname,
        stage: "production",
        open_vsx_url: &cfg.open_vsx.url,
        workspace_max_lifetime: &cfg.workspace.max_lifetime,
        block_new_users: BlockNewUsersSettings {
            enabled: cfg.block_new_users.enabled,
            passlist: &cfg.block_new_users.passlist,
        },
        default_base_image_registry_allow_list: &cfg
            .container_registry
            .private_base_image_allow_list,
        auth_provider_configs: cfg
            .auth_providers
            .iter()
            .map(|p| format!("{}/{}/provider", AUTH_PROVIDERS_DIR, p.name))
            .collect(),
        license_file: cfg.license.as_ref().map(|_| LICENSE_PATH),
    };
    Ok(serde_json::to_string_pretty(&settings)?)
}

/// The server's ConfigMap on its own, for hashing and emission
pub fn config_map(ctx: &RenderContext) -> Result<Vec<Object>> {
    Ok(vec![Object::new(&ConfigMap {
        metadata: metadata(ctx, COMPONENT, COMPONENT),
        data: Some(BTreeMap::from([(CONFIG_KEY.to_string(), settings(ctx)?)])),
        ..Default::default()
    })?])
}

fn service(ctx: &RenderContext) -> Result<Object> {
    Object::new(&Service {
        metadata: metadata(ctx, COMPONENT, COMPONENT),
        spec: Some(ServiceSpec {
            type_: Some("ClusterIP".to_string()),
            selector: Some(ctx.labels(COMPONENT)),
            ports: Some(vec![ServicePort {
                name: Some("http".to_string()),
                port: PORT,
                target_port: Some(IntOrString::Int(PORT)),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    })
}

fn secret_volume(name: &str, secret: &str) -> Volume {
    Volume {
        name: name.to_string(),
        secret: Some(SecretVolumeSource {
            secret_name: Some(secret.to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn mount(name: &str, path: String) -> VolumeMount {
    VolumeMount {
        name: name.to_string(),
        mount_path: path,
        read_only: Some(true),
        ..Default::default()
    }
}

fn deployment(ctx: &RenderContext) -> Result<Object> {
    let cfg = ctx.config();

    // Roll the pods whenever the config or the database backend changes
    let checksum = object_hash(config_map(ctx).and_then(|mut objs| {
        objs.push(database_type_pod(ctx)?);
        Ok(objs)
    }))?;

    let mut volumes = vec![Volume {
        name: "config".to_string(),
        config_map: Some(ConfigMapVolumeSource {
            name: COMPONENT.to_string(),
            ..Default::default()
        }),
        ..Default::default()
    }];
    let mut mounts = vec![mount("config", "/etc/server/config".to_string())];

    for (i, provider) in cfg.auth_providers.iter().enumerate() {
        let name = format!("auth-provider-{}", i);
        volumes.push(secret_volume(&name, &provider.name));
        mounts.push(mount(
            &name,
            format!("{}/{}", AUTH_PROVIDERS_DIR, provider.name),
        ));
    }
    if let Some(license) = &cfg.license {
        volumes.push(secret_volume("license", &license.name));
        mounts.push(mount("license", "/etc/server/license".to_string()));
    }

    let mut vars = default_env(ctx);
    vars.extend(database_env(ctx));
    vars.push(env(
        "CONFIG_PATH",
        format!("/etc/server/config/{}", CONFIG_KEY),
    ));

    let container = Container {
        name: COMPONENT.to_string(),
        image: Some(ctx.component_image(COMPONENT)),
        env: Some(vars),
        ports: Some(vec![ContainerPort {
            name: Some("http".to_string()),
            container_port: PORT,
            ..Default::default()
        }]),
        volume_mounts: Some(mounts),
        ..Default::default()
    };

    Object::new(&Deployment {
        metadata: metadata(ctx, COMPONENT, COMPONENT),
        spec: Some(DeploymentSpec {
            replicas: Some(ctx.replicas(COMPONENT)),
            selector: selector(ctx, COMPONENT),
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(ctx.labels(COMPONENT)),
                    annotations: annotations(&[(CHECKSUM_CONFIG_ANNOTATION, checksum)]),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    service_account_name: Some(COMPONENT.to_string()),
                    affinity: Some(node_affinity(AFFINITY_LABEL_META)),
                    image_pull_secrets: image_pull_secrets(ctx),
                    containers: vec![container],
                    volumes: Some(volumes),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    })
}

pub fn objects(ctx: &RenderContext) -> Result<Vec<Object>> {
    if !ctx.config().kind.includes_meta() {
        return Ok(Vec::new());
    }

    let mut objs = vec![service_account(ctx, COMPONENT)?];
    objs.extend(config_map(ctx)?);
    objs.push(service(ctx)?);
    objs.push(deployment(ctx)?);
    Ok(objs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::VersionManifest;
    use stowage_core::versions::v1::{Config, DatabaseExternal, ObjectRef};

    fn config() -> Config {
        let mut cfg = Config {
            domain: "stowage.example.com".into(),
            ..Default::default()
        };
        cfg.apply_defaults();
        cfg
    }

    fn checksum(cfg: Config) -> String {
        let ctx = RenderContext::new(cfg, VersionManifest::default(), "stowage");
        let objs = objects(&ctx).unwrap();
        let deploy = objs.iter().find(|o| o.kind() == "Deployment").unwrap();
        deploy.value()["spec"]["template"]["metadata"]["annotations"]
            [CHECKSUM_CONFIG_ANNOTATION]
            .as_str()
            .unwrap()
            .to_string()
    }

    #[test]
    fn test_checksum_is_stable() {
        assert_eq!(checksum(config()), checksum(config()));
    }

    #[test]
    fn test_checksum_follows_config() {
        let mut changed = config();
        changed.block_new_users.enabled = true;
        assert_ne!(checksum(config()), checksum(changed));
    }

    #[test]
    fn test_checksum_follows_database_type() {
        let mut external = config();
        external.database.in_cluster = None;
        external.database.external = Some(DatabaseExternal {
            certificate: ObjectRef::secret("database"),
        });
        assert_ne!(checksum(config()), checksum(external));
    }

    #[test]
    fn test_settings_list_auth_providers() {
        let mut cfg = config();
        cfg.auth_providers = vec![ObjectRef::secret("github")];
        cfg.license = Some(ObjectRef::secret("license"));
        let ctx = RenderContext::new(cfg, VersionManifest::default(), "stowage");
        let json: serde_json::Value = serde_json::from_str(&settings(&ctx).unwrap()).unwrap();
        assert_eq!(
            json["authProviderConfigs"][0],
            "/etc/server/auth-providers/github/provider"
        );
        assert_eq!(json["licenseFile"], LICENSE_PATH);
    }
}
