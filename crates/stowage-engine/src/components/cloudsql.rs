//! Cloud SQL proxy, only rendered when the database lives in Cloud SQL

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, PodSpec, PodTemplateSpec, SecretVolumeSource, Service,
    ServicePort, ServiceSpec, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use super::common::{
    AFFINITY_LABEL_META, CLOUD_SQL_PROXY, DATABASE_PORT, image_pull_secrets, metadata,
    node_affinity, selector,
};
use crate::context::RenderContext;
use crate::error::Result;
use crate::objects::Object;

const IMAGE_REPO: &str = "gcr.io/cloudsql-docker";
const IMAGE_NAME: &str = "gce-proxy";
const IMAGE_TAG: &str = "1.33.2";

pub fn objects(ctx: &RenderContext) -> Result<Vec<Object>> {
    let cfg = ctx.config();
    let Some(cloud_sql) = cfg.database.cloud_sql.as_ref() else {
        return Ok(Vec::new());
    };
    if !cfg.kind.includes_meta() {
        return Ok(Vec::new());
    }

    let container = Container {
        name: CLOUD_SQL_PROXY.to_string(),
        image: Some(ctx.image_name(IMAGE_REPO, IMAGE_NAME, IMAGE_TAG)),
        command: Some(vec![
            "/cloud_sql_proxy".to_string(),
            "-dir=/cloudsql".to_string(),
            format!("-instances={}=tcp:0.0.0.0:{}", cloud_sql.instance, DATABASE_PORT),
            "-credential_file=/credentials/credentials.json".to_string(),
        ]),
        ports: Some(vec![ContainerPort {
            container_port: DATABASE_PORT,
            ..Default::default()
        }]),
        volume_mounts: Some(vec![VolumeMount {
            name: "credentials".to_string(),
            mount_path: "/credentials".to_string(),
            read_only: Some(true),
            ..Default::default()
        }]),
        ..Default::default()
    };

    let deployment = Deployment {
        metadata: metadata(ctx, CLOUD_SQL_PROXY, CLOUD_SQL_PROXY),
        spec: Some(DeploymentSpec {
            replicas: Some(ctx.replicas(CLOUD_SQL_PROXY)),
            selector: selector(ctx, CLOUD_SQL_PROXY),
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(ctx.labels(CLOUD_SQL_PROXY)),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    affinity: Some(node_affinity(AFFINITY_LABEL_META)),
                    image_pull_secrets: image_pull_secrets(ctx),
                    containers: vec![container],
                    volumes: Some(vec![Volume {
                        name: "credentials".to_string(),
                        secret: Some(SecretVolumeSource {
                            secret_name: Some(cloud_sql.service_account.name.clone()),
                            ..Default::default()
                        }),
                        ..Default::default()
                    }]),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    };

    let service = Service {
        metadata: metadata(ctx, CLOUD_SQL_PROXY, CLOUD_SQL_PROXY),
        spec: Some(ServiceSpec {
            selector: Some(ctx.labels(CLOUD_SQL_PROXY)),
            ports: Some(vec![ServicePort {
                name: Some("mysql".to_string()),
                port: DATABASE_PORT,
                target_port: Some(IntOrString::Int(DATABASE_PORT)),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    };

    Ok(vec![Object::new(&service)?, Object::new(&deployment)?])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::VersionManifest;
    use stowage_core::versions::v1::{Config, DatabaseCloudSql, ObjectRef};

    fn ctx(cloud_sql: Option<DatabaseCloudSql>) -> RenderContext {
        let mut cfg = Config {
            domain: "stowage.example.com".into(),
            ..Default::default()
        };
        cfg.database.cloud_sql = cloud_sql;
        cfg.apply_defaults();
        RenderContext::new(cfg, VersionManifest::default(), "stowage")
    }

    #[test]
    fn test_not_applicable_without_cloud_sql() {
        assert!(objects(&ctx(None)).unwrap().is_empty());
    }

    #[test]
    fn test_proxy_for_instance() {
        let objs = objects(&ctx(Some(DatabaseCloudSql {
            service_account: ObjectRef::secret("cloudsql-sa"),
            instance: "proj:region:db".into(),
        })))
        .unwrap();
        assert_eq!(objs.len(), 2);
        let command = &objs[1].value()["spec"]["template"]["spec"]["containers"][0]["command"];
        assert_eq!(command[2], "-instances=proj:region:db=tcp:0.0.0.0:3306");
        assert_eq!(
            objs[1].value()["spec"]["template"]["spec"]["containers"][0]["image"],
            "gcr.io/cloudsql-docker/gce-proxy:1.33.2"
        );
    }
}
