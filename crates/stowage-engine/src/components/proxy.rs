//! Public entry point: TLS termination and routing to the server

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    ConfigMap, ConfigMapVolumeSource, Container, ContainerPort, PodSpec, PodTemplateSpec,
    SecretVolumeSource, Service, ServicePort, ServiceSpec, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use std::collections::BTreeMap;

use super::common::{
    AFFINITY_LABEL_META, default_env, image_pull_secrets, metadata, node_affinity, selector,
    service_account,
};
use crate::context::RenderContext;
use crate::error::Result;
use crate::hash::{CHECKSUM_CONFIG_ANNOTATION, object_hash};
use crate::objects::Object;

pub const COMPONENT: &str = "proxy";
pub const DEFAULT_SERVICE_TYPE: &str = "LoadBalancer";

const HTTP_PORT: i32 = 80;
const HTTPS_PORT: i32 = 443;
const SERVER_PORT: i32 = 3000;

fn config_map(ctx: &RenderContext) -> Result<Object> {
    let domain = &ctx.config().domain;
    let caddyfile = format!(
        "{domain} {{\n  tls /etc/proxy/tls/tls.crt /etc/proxy/tls/tls.key\n  reverse_proxy server.{ns}.svc.cluster.local:{port}\n}}\n",
        domain = domain,
        ns = ctx.namespace(),
        port = SERVER_PORT,
    );
    Object::new(&ConfigMap {
        metadata: metadata(ctx, COMPONENT, COMPONENT),
        data: Some(BTreeMap::from([("Caddyfile".to_string(), caddyfile)])),
        ..Default::default()
    })
}

fn service(ctx: &RenderContext) -> Result<Object> {
    let service_type = ctx
        .config()
        .proxy_service_type()
        .unwrap_or(DEFAULT_SERVICE_TYPE);

    let port = |name: &str, port: i32| ServicePort {
        name: Some(name.to_string()),
        port,
        target_port: Some(IntOrString::Int(port)),
        ..Default::default()
    };

    Object::new(&Service {
        metadata: metadata(ctx, COMPONENT, COMPONENT),
        spec: Some(ServiceSpec {
            type_: Some(service_type.to_string()),
            selector: Some(ctx.labels(COMPONENT)),
            ports: Some(vec![port("http", HTTP_PORT), port("https", HTTPS_PORT)]),
            ..Default::default()
        }),
        ..Default::default()
    })
}

fn deployment(ctx: &RenderContext, config: &Object) -> Result<Object> {
    let checksum = object_hash(Ok(vec![config.clone()]))?;
    let volume_mount = |name: &str, path: &str| VolumeMount {
        name: name.to_string(),
        mount_path: path.to_string(),
        read_only: Some(true),
        ..Default::default()
    };

    let container = Container {
        name: COMPONENT.to_string(),
        image: Some(ctx.component_image(COMPONENT)),
        env: Some(default_env(ctx)),
        ports: Some(vec![
            ContainerPort {
                name: Some("http".to_string()),
                container_port: HTTP_PORT,
                ..Default::default()
            },
            ContainerPort {
                name: Some("https".to_string()),
                container_port: HTTPS_PORT,
                ..Default::default()
            },
        ]),
        volume_mounts: Some(vec![
            volume_mount("config", "/etc/proxy"),
            volume_mount("tls", "/etc/proxy/tls"),
        ]),
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
                    annotations: Some(BTreeMap::from([(
                        CHECKSUM_CONFIG_ANNOTATION.to_string(),
                        checksum,
                    )])),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    service_account_name: Some(COMPONENT.to_string()),
                    affinity: Some(node_affinity(AFFINITY_LABEL_META)),
                    image_pull_secrets: image_pull_secrets(ctx),
                    containers: vec![container],
                    volumes: Some(vec![
                        Volume {
                            name: "config".to_string(),
                            config_map: Some(ConfigMapVolumeSource {
                                name: COMPONENT.to_string(),
                                ..Default::default()
                            }),
                            ..Default::default()
                        },
                        Volume {
                            name: "tls".to_string(),
                            secret: Some(SecretVolumeSource {
                                secret_name: Some(ctx.config().certificate.name.clone()),
                                ..Default::default()
                            }),
                            ..Default::default()
                        },
                    ]),
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

    let config = config_map(ctx)?;
    let deployment = deployment(ctx, &config)?;
    Ok(vec![
        service_account(ctx, COMPONENT)?,
        config,
        service(ctx)?,
        deployment,
    ])
}
