//! Stowage Core - versioned installation config
//!
//! This crate owns everything that happens before rendering:
//! - `ConfigVersion` / `VersionRegistry`: one implementation per schema version
//! - `MigrationGraph`: forward migration between versions
//! - `deprecation`: reconciling deprecated fields without losing data
//! - `envvars`: rebuilding a config from environment state
//! - `schema` / `validation`: structural and cluster validation
//! - `ConfigLoader`: raw bytes to a defaulted document of the current version

pub mod cluster;
pub mod config;
pub mod deprecation;
pub mod envvars;
pub mod error;
pub mod loader;
pub mod migration;
pub mod registry;
pub mod schema;
pub mod secrets;
pub mod validation;
pub mod values;
pub mod version;
pub mod versions;

pub use cluster::{ClusterAccess, MockCluster, NodeInfo, SecretData};
pub use config::{ConfigDocument, VersionedDocument, downcast_mut, downcast_ref, parse_document};
pub use deprecation::{DeprecatedField, DeprecationReport, reconcile};
pub use envvars::{EnvSource, ProcessEnv};
pub use error::{CoreError, Result, ValidationErrorInfo};
pub use loader::{ConfigLoader, LoadedConfig};
pub use migration::MigrationGraph;
pub use registry::VersionRegistry;
pub use schema::{Schema, SimpleProperty, SimpleSchema, SimpleType, StructValidator, ValidationResult};
pub use secrets::{SecretCharset, random_string};
pub use validation::{
    CheckKind, ClusterCheck, ValidationItem, ValidationReport, ValidationStatus,
    default_cluster_checks, run_cluster_checks,
};
pub use values::deep_merge;
pub use version::ConfigVersion;
