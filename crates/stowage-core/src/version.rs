//! The per-version config contract

use async_trait::async_trait;

use crate::cluster::ClusterAccess;
use crate::config::ConfigDocument;
use crate::deprecation::DeprecationReport;
use crate::envvars::EnvSource;
use crate::error::{CoreError, Result};
use crate::schema::{Schema, StructValidator};
use crate::validation::ClusterCheck;

/// One schema version of the installation config.
///
/// Implementations receive documents as `dyn ConfigDocument` and downcast to
/// their own layout; handing a document of another version is an
/// `InvalidType` error.
#[async_trait]
pub trait ConfigVersion: Send + Sync {
    /// The `apiVersion` this implementation handles
    fn id(&self) -> &'static str;

    /// A zero-valued document of this version
    fn factory(&self) -> Box<dyn ConfigDocument>;

    /// Parse raw bytes, rejecting unknown fields when `strict`
    fn load(&self, raw: &[u8], strict: bool) -> Result<Box<dyn ConfigDocument>>;

    /// Fill required-but-omittable fields in place
    fn defaults(&self, _cfg: &mut dyn ConfigDocument) -> Result<()> {
        Ok(())
    }

    /// Declarative field schema, `None` accepts any document
    fn schema(&self) -> Result<Option<Schema>> {
        Ok(None)
    }

    /// Register custom predicates referenced by the schema's tags
    fn load_validation_funcs(&self, _validator: &mut StructValidator) {}

    fn check_deprecated(&self, _cfg: &mut dyn ConfigDocument) -> Result<DeprecationReport> {
        Ok(DeprecationReport::default())
    }

    /// Rebuild the document from environment state
    fn build_from_envvars(
        &self,
        _cfg: &mut dyn ConfigDocument,
        _env: &dyn EnvSource,
    ) -> Result<()> {
        Err(CoreError::Unsupported {
            operation: "build-from-envvars".to_string(),
            version: self.id().to_string(),
        })
    }

    /// Cluster checks this document needs on top of the default ones
    fn cluster_validation(&self, _cfg: &dyn ConfigDocument) -> Result<Vec<ClusterCheck>> {
        Ok(Vec::new())
    }

    /// Prepare the cluster before rendering, may update `cfg` to reference
    /// what it created
    async fn pre_deploy(
        &self,
        _cfg: &mut dyn ConfigDocument,
        _cluster: &dyn ClusterAccess,
        _namespace: &str,
    ) -> Result<()> {
        Ok(())
    }
}
