//! Stowage Engine - from a loaded config to ordered manifests
//!
//! This crate provides:
//! - `RenderContext`: config, image versions and per-render generated secrets
//! - `Producer` / `compose`: independently authored producers composed in order
//! - `object_hash`: change detection for pod template annotations
//! - `materialize`, `inventory`, `sort_by_dependency`, overrides and the
//!   manifest stream
//! - MiniJinja charts with human-readable errors for in-cluster dependencies

pub mod chart;
pub mod components;
pub mod compose;
pub mod context;
pub mod error;
pub mod filters;
pub mod hash;
pub mod inventory;
pub mod objects;
pub mod overrides;
pub mod pipeline;
pub mod sort;
pub mod stream;

/// Value of the `app` label on every rendered object
pub const APP_NAME: &str = "stowage";

pub use chart::Chart;
pub use compose::{Composite, Producer, compose, helm_compose, producer};
pub use context::{GeneratedValues, RenderContext, VersionManifest};
pub use error::{ChartError, EngineError, Result};
pub use hash::{CHECKSUM_CONFIG_ANNOTATION, object_hash};
pub use inventory::{INVENTORY_KEY, INVENTORY_NAME, InventoryEntry, inventory, read_inventory};
pub use objects::{Object, RenderedObject, materialize, split_documents, to_manifests};
pub use overrides::{ObjectOverride, apply_overrides, overrides_for};
pub use pipeline::{Pipeline, RenderOptions, RenderOutput, render_context};
pub use sort::{DependencyTier, sort_by_dependency};
pub use stream::{split_stream, to_stream};
