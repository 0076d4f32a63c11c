//! Config loading
//!
//! Turns raw bytes of any known version into a defaulted document of the
//! current version: detect `apiVersion`, reconcile deprecated fields, default,
//! migrate forward, default again.

use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::cluster::ClusterAccess;
use crate::config::{ConfigDocument, decode_utf8};
use crate::envvars::EnvSource;
use crate::error::{CoreError, Result};
use crate::migration::MigrationGraph;
use crate::registry::VersionRegistry;
use crate::schema::{StructValidator, ValidationResult};
use crate::validation::{ClusterCheck, default_cluster_checks};

/// A document normalised to the current version
#[derive(Debug)]
pub struct LoadedConfig {
    /// The `apiVersion` found in the raw input
    pub source_version: String,
    pub document: Box<dyn ConfigDocument>,
    /// Deprecated fields in use, keyed by rule
    pub deprecation_warnings: BTreeMap<String, JsonValue>,
}

impl LoadedConfig {
    pub fn was_migrated(&self) -> bool {
        self.source_version != self.document.api_version()
    }
}

pub struct ConfigLoader {
    registry: VersionRegistry,
    migrations: MigrationGraph,
}

impl ConfigLoader {
    pub fn new(registry: VersionRegistry, migrations: MigrationGraph) -> Self {
        Self {
            registry,
            migrations,
        }
    }

    /// Loader for every shipped version
    pub fn builtin() -> Result<Self> {
        Ok(Self::new(
            VersionRegistry::builtin()?,
            MigrationGraph::builtin()?,
        ))
    }

    pub fn registry(&self) -> &VersionRegistry {
        &self.registry
    }

    pub fn migrations(&self) -> &MigrationGraph {
        &self.migrations
    }

    /// Read `apiVersion` without committing to a layout
    pub fn detect_version(raw: &[u8]) -> Result<String> {
        let value: serde_yaml::Value = serde_yaml::from_str(decode_utf8(raw)?)?;
        value
            .get("apiVersion")
            .and_then(serde_yaml::Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| CoreError::MissingField {
                field: "apiVersion".to_string(),
            })
    }

    /// Parse, reconcile and normalise raw config bytes
    pub fn load(&self, raw: &[u8], strict: bool) -> Result<LoadedConfig> {
        let source_version = Self::detect_version(raw)?;
        let version = self.registry.resolve(&source_version)?;
        let current = self.registry.current()?;

        let mut document = version.load(raw, strict)?;

        let deprecation_warnings = version.check_deprecated(document.as_mut())?.into_result()?;
        for (key, value) in &deprecation_warnings {
            warn!(field = %key, value = %value, "deprecated config field in use");
        }

        version.defaults(document.as_mut())?;

        if source_version != current.id() {
            let route = self.migrations.route(&source_version, current.id())?;
            debug!(route = %route.join(" -> "), "config needs migration");
            document = self
                .migrations
                .migrate(&self.registry, &source_version, current.id(), document)?;
            current.defaults(document.as_mut())?;
        }

        Ok(LoadedConfig {
            source_version,
            document,
            deprecation_warnings,
        })
    }

    /// A defaulted document of the current version
    pub fn init_config(&self) -> Result<Box<dyn ConfigDocument>> {
        let current = self.registry.current()?;
        let mut document = current.factory();
        current.defaults(document.as_mut())?;
        Ok(document)
    }

    /// Structural validator for one version, predicates registered
    pub fn validator_for(&self, version: &str) -> Result<StructValidator> {
        let version = self.registry.resolve(version)?;
        let mut validator = match version.schema()? {
            Some(schema) => StructValidator::new(&schema)?,
            None => StructValidator::permissive()?,
        };
        version.load_validation_funcs(&mut validator);
        Ok(validator)
    }

    pub fn validate(&self, document: &dyn ConfigDocument) -> Result<ValidationResult> {
        let validator = self.validator_for(document.api_version())?;
        Ok(validator.validate(&document.to_json()?))
    }

    /// Fail with `ValidationFailed` unless the document is structurally valid
    pub fn ensure_valid(&self, document: &dyn ConfigDocument) -> Result<()> {
        self.validate(document)?.into_result()
    }

    pub fn build_from_envvars(
        &self,
        document: &mut dyn ConfigDocument,
        env: &dyn EnvSource,
    ) -> Result<()> {
        self.registry
            .resolve(document.api_version())?
            .build_from_envvars(document, env)
    }

    /// Default checks followed by the ones the document asks for
    pub fn cluster_checks(&self, document: &dyn ConfigDocument) -> Result<Vec<ClusterCheck>> {
        let mut checks = default_cluster_checks();
        checks.extend(
            self.registry
                .resolve(document.api_version())?
                .cluster_validation(document)?,
        );
        Ok(checks)
    }

    pub async fn pre_deploy(
        &self,
        document: &mut dyn ConfigDocument,
        cluster: &dyn ClusterAccess,
        namespace: &str,
    ) -> Result<()> {
        self.registry
            .resolve(document.api_version())?
            .pre_deploy(document, cluster, namespace)
            .await
    }
}
