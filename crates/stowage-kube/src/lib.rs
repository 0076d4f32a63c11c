//! Stowage Kube - Kubernetes integration for Stowage
//!
//! This crate provides:
//! - **Apply**: Server-Side Apply of rendered objects in dependency order,
//!   resolved through cached discovery and bounded by per-object timeouts
//! - **Cluster access**: a `ClusterAccess` implementation over a live cluster
//!   for cluster validation and pre-deploy provisioning

pub mod apply;
pub mod cluster;
pub mod error;

pub use apply::{ApplyResult, Applier, DEFAULT_TIMEOUT, FIELD_MANAGER};
pub use cluster::KubeCluster;
pub use error::{KubeError, Result};
