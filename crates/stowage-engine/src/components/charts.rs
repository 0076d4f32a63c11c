//! In-cluster dependencies rendered from bundled charts

use minijinja::context;

use super::common::{DATABASE_HOST, DATABASE_PORT, THIRD_PARTY_REPO};
use crate::chart::Chart;
use crate::context::RenderContext;
use crate::error::Result;

use stowage_core::versions::v1::DB_CREDENTIALS_SECRET;

pub const MYSQL: Chart = Chart::new("mysql", include_str!("../../charts/mysql.yaml.j2"));
pub const MINIO: Chart = Chart::new("minio", include_str!("../../charts/minio.yaml.j2"));
pub const REGISTRY: Chart = Chart::new("registry", include_str!("../../charts/registry.yaml.j2"));

const STORAGE_SIZE: &str = "8Gi";

pub fn mysql(ctx: &RenderContext) -> Result<Vec<String>> {
    let cfg = ctx.config();
    if !cfg.kind.includes_meta() || !cfg.database.is_in_cluster() {
        return Ok(Vec::new());
    }

    let credentials = cfg
        .database
        .credentials
        .as_ref()
        .map(|c| c.name.clone())
        .unwrap_or_else(|| DB_CREDENTIALS_SECRET.to_string());

    MYSQL.render(context! {
        namespace => ctx.namespace(),
        labels => ctx.labels(DATABASE_HOST),
        image => ctx.image_name(THIRD_PARTY_REPO, "library/mysql", "8.0.33"),
        port => DATABASE_PORT,
        credentials => credentials,
        storage_size => STORAGE_SIZE,
    })
}

pub fn minio(ctx: &RenderContext) -> Result<Vec<String>> {
    let cfg = ctx.config();
    if !cfg.kind.includes_meta() || !cfg.object_storage.is_in_cluster() {
        return Ok(Vec::new());
    }

    MINIO.render(context! {
        namespace => ctx.namespace(),
        labels => ctx.labels("minio"),
        image => ctx.image_name(THIRD_PARTY_REPO, "bitnami/minio", "2023.9.30"),
        port => 9000,
        generated => ctx.generated(),
        region => cfg.metadata.region.as_str(),
        storage_size => STORAGE_SIZE,
    })
}

pub fn registry(ctx: &RenderContext) -> Result<Vec<String>> {
    let cfg = ctx.config();
    if !cfg.kind.includes_workspace() || !cfg.container_registry.is_in_cluster() {
        return Ok(Vec::new());
    }

    REGISTRY.render(context! {
        namespace => ctx.namespace(),
        labels => ctx.labels("registry"),
        image => ctx.image_name(THIRD_PARTY_REPO, "library/registry", "2.8.3"),
        port => 5000,
        generated => ctx.generated(),
        s3 => cfg.container_registry.s3storage.as_ref(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{GeneratedValues, VersionManifest};
    use crate::objects::materialize;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use stowage_core::versions::v1::{Config, ObjectRef, S3Storage};

    fn ctx(mutate: impl FnOnce(&mut Config)) -> RenderContext {
        let mut cfg = Config {
            domain: "stowage.example.com".into(),
            ..Default::default()
        };
        mutate(&mut cfg);
        cfg.apply_defaults();
        RenderContext::with_generated(
            cfg,
            VersionManifest::default(),
            "stowage",
            GeneratedValues::generate(&mut StdRng::seed_from_u64(7)),
        )
    }

    #[test]
    fn test_mysql_chart() {
        let objs = materialize(&mysql(&ctx(|_| {})).unwrap()).unwrap();
        let kinds: Vec<_> = objs.iter().map(|o| o.kind.as_str()).collect();
        assert_eq!(kinds, vec!["Service", "StatefulSet"]);
        let sts = objs[1].value().unwrap();
        assert_eq!(
            sts["spec"]["template"]["spec"]["containers"][0]["image"],
            "docker.io/library/mysql:8.0.33"
        );
        assert_eq!(
            sts["spec"]["template"]["spec"]["containers"][0]["env"][1]["valueFrom"]
                ["secretKeyRef"]["name"],
            DB_CREDENTIALS_SECRET
        );
        assert_eq!(sts["metadata"]["labels"]["component"], "mysql");
    }

    #[test]
    fn test_minio_uses_generated_keys() {
        let ctx = ctx(|_| {});
        let objs = materialize(&minio(&ctx).unwrap()).unwrap();
        let secret = objs[0].value().unwrap();
        assert_eq!(
            secret["data"]["root-user"],
            crate::filters::b64encode(ctx.generated().storage_access_key.clone())
        );
    }

    #[test]
    fn test_registry_storage_backends() {
        let fs = materialize(&registry(&ctx(|_| {})).unwrap()).unwrap();
        let deploy = fs[2].value().unwrap();
        assert!(deploy["spec"]["template"]["spec"]["volumes"].is_array());

        let s3 = materialize(
            &registry(&ctx(|cfg| {
                cfg.container_registry.s3storage = Some(S3Storage {
                    bucket: "images".into(),
                    region: "eu-west-1".into(),
                    endpoint: "s3.amazonaws.com".into(),
                    certificate: ObjectRef::secret("s3-creds"),
                });
            }))
            .unwrap(),
        )
        .unwrap();
        let deploy = s3[2].value().unwrap();
        let env = deploy["spec"]["template"]["spec"]["containers"][0]["env"]
            .as_array()
            .unwrap();
        assert!(env.iter().any(|e| e["value"] == "images"));
        assert!(deploy["spec"]["template"]["spec"]["volumes"].is_null());
    }

    #[test]
    fn test_charts_skip_external_backends() {
        let ctx = ctx(|cfg| {
            cfg.database.external = Some(Default::default());
            cfg.object_storage.s3 = Some(Default::default());
            cfg.container_registry.external = Some(Default::default());
        });
        assert!(mysql(&ctx).unwrap().is_empty());
        assert!(minio(&ctx).unwrap().is_empty());
        assert!(registry(&ctx).unwrap().is_empty());
    }
}
