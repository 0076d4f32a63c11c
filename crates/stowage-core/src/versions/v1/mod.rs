//! Current config version

mod config;
mod deprecated;
mod envvars;
pub mod experimental;
mod validation;

pub use config::*;
pub use deprecated::deprecated_fields;
pub use envvars::{ConfigEnvvars, SELF_SIGNED_CA_SECRET, build_from_envvars};
pub use validation::cluster_checks;

use async_trait::async_trait;
use tracing::info;

use crate::cluster::{ClusterAccess, SecretData};
use crate::config::{ConfigDocument, downcast_mut, downcast_ref, parse_document};
use crate::deprecation::{DeprecationReport, reconcile};
use crate::envvars::EnvSource;
use crate::error::Result;
use crate::schema::{Schema, StructValidator};
use crate::secrets::{SecretCharset, random_string};
use crate::validation::ClusterCheck;
use crate::version::ConfigVersion;

pub(crate) const SCHEMA: &str = include_str!("schema.yaml");

/// Secret provisioned for the in-cluster database
pub const DB_CREDENTIALS_SECRET: &str = "db-credentials";

/// The `v1` config version
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
        downcast_mut::<Config>(cfg)?.apply_defaults();
        Ok(())
    }

    fn schema(&self) -> Result<Option<Schema>> {
        Schema::from_simple_schema(SCHEMA).map(Some)
    }

    fn load_validation_funcs(&self, validator: &mut StructValidator) {
        validation::register_predicates(validator);
    }

    fn check_deprecated(&self, cfg: &mut dyn ConfigDocument) -> Result<DeprecationReport> {
        Ok(reconcile(downcast_mut::<Config>(cfg)?, &deprecated_fields()))
    }

    fn build_from_envvars(&self, cfg: &mut dyn ConfigDocument, env: &dyn EnvSource) -> Result<()> {
        build_from_envvars(downcast_mut::<Config>(cfg)?, env)
    }

    fn cluster_validation(&self, cfg: &dyn ConfigDocument) -> Result<Vec<ClusterCheck>> {
        Ok(cluster_checks(downcast_ref::<Config>(cfg)?))
    }

    async fn pre_deploy(
        &self,
        cfg: &mut dyn ConfigDocument,
        cluster: &dyn ClusterAccess,
        namespace: &str,
    ) -> Result<()> {
        let cfg = downcast_mut::<Config>(cfg)?;
        if !cfg.database.is_in_cluster() || cfg.database.credentials.is_some() {
            return Ok(());
        }

        if cluster
            .get_secret(namespace, DB_CREDENTIALS_SECRET)
            .await?
            .is_none()
        {
            info!(namespace, secret = DB_CREDENTIALS_SECRET, "creating database credentials");
            let password = random_string(&mut rand::rng(), 32, SecretCharset::Alphanumeric);
            let mut data = SecretData::new();
            data.insert("username".to_string(), b"stowage".to_vec());
            data.insert("password".to_string(), password.into_bytes());
            cluster
                .create_secret(namespace, DB_CREDENTIALS_SECRET, data)
                .await?;
        }

        cfg.database.credentials = Some(ObjectRef::secret(DB_CREDENTIALS_SECRET));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::MockCluster;

    fn in_cluster_config() -> Box<dyn ConfigDocument> {
        let mut cfg = Version.factory();
        Version.defaults(cfg.as_mut()).unwrap();
        cfg
    }

    #[test]
    fn test_factory_carries_api_version() {
        let cfg = Version.factory();
        assert_eq!(cfg.api_version(), "v1");
        assert_eq!(downcast_ref::<Config>(cfg.as_ref()).unwrap().api_version, "v1");
    }

    #[test]
    fn test_schema_parses() {
        let schema = Version.schema().unwrap().unwrap();
        assert!(!schema.validation_tags().is_empty());
    }

    #[tokio::test]
    async fn test_pre_deploy_provisions_db_credentials() {
        let cluster = MockCluster::new();
        let mut cfg = in_cluster_config();

        Version
            .pre_deploy(cfg.as_mut(), &cluster, "stowage")
            .await
            .unwrap();

        let secret = cluster.secret("stowage", DB_CREDENTIALS_SECRET).unwrap();
        assert_eq!(secret["password"].len(), 32);
        let cfg = downcast_ref::<Config>(cfg.as_ref()).unwrap();
        assert_eq!(
            cfg.database.credentials,
            Some(ObjectRef::secret(DB_CREDENTIALS_SECRET))
        );
    }

    #[tokio::test]
    async fn test_pre_deploy_reuses_existing_secret() {
        let cluster =
            MockCluster::new().with_secret("stowage", DB_CREDENTIALS_SECRET, &["password"]);
        let mut cfg = in_cluster_config();

        Version
            .pre_deploy(cfg.as_mut(), &cluster, "stowage")
            .await
            .unwrap();

        let secret = cluster.secret("stowage", DB_CREDENTIALS_SECRET).unwrap();
        assert_eq!(secret["password"], b"value".to_vec());
    }

    #[tokio::test]
    async fn test_pre_deploy_skips_external_database() {
        let cluster = MockCluster::new();
        let mut cfg = in_cluster_config();
        downcast_mut::<Config>(cfg.as_mut()).unwrap().database = Database {
            in_cluster: Some(false),
            external: Some(DatabaseExternal::default()),
            ..Default::default()
        };

        Version
            .pre_deploy(cfg.as_mut(), &cluster, "stowage")
            .await
            .unwrap();
        assert!(cluster.secret("stowage", DB_CREDENTIALS_SECRET).is_none());
    }

    #[test]
    fn test_wrong_document_type() {
        let mut other = crate::versions::v1alpha1::Version.factory();
        assert!(Version.defaults(other.as_mut()).is_err());
    }
}
