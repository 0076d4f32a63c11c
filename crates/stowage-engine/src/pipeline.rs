//! Render pipeline
//!
//! Config bytes in, ordered objects out:
//! load -> validate -> context -> producers -> materialize -> inventory
//! -> sort -> overrides.

use tracing::{debug, info};

use stowage_core::versions::v1::Config;
use stowage_core::{ConfigDocument, ConfigLoader, LoadedConfig, ValidationResult, downcast_ref};

use crate::components;
use crate::compose::Producer;
use crate::context::{GeneratedValues, RenderContext, VersionManifest};
use crate::error::Result;
use crate::inventory::inventory;
use crate::objects::{RenderedObject, materialize, to_manifests};
use crate::overrides::{apply_overrides, overrides_for};
use crate::sort::sort_by_dependency;
use crate::stream::to_stream;

/// Options for one render
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub namespace: String,
    pub version_manifest: VersionManifest,
    /// Skip structural validation
    pub skip_validation: bool,
    /// Reject unknown config fields
    pub strict: bool,
    /// Use these instead of generating fresh secrets
    pub generated: Option<GeneratedValues>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            version_manifest: VersionManifest::default(),
            skip_validation: false,
            strict: false,
            generated: None,
        }
    }
}

/// Sorted objects ready to emit or apply
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOutput {
    pub objects: Vec<RenderedObject>,
}

impl RenderOutput {
    pub fn to_stream(&self) -> String {
        to_stream(&self.objects)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

pub struct Pipeline {
    loader: ConfigLoader,
}

impl Pipeline {
    pub fn new(loader: ConfigLoader) -> Self {
        Self { loader }
    }

    /// Pipeline over every shipped config version
    pub fn builtin() -> Result<Self> {
        Ok(Self::new(ConfigLoader::builtin()?))
    }

    pub fn loader(&self) -> &ConfigLoader {
        &self.loader
    }

    pub fn load(&self, raw: &[u8], strict: bool) -> Result<LoadedConfig> {
        Ok(self.loader.load(raw, strict)?)
    }

    pub fn validate(&self, document: &dyn ConfigDocument) -> Result<ValidationResult> {
        Ok(self.loader.validate(document)?)
    }

    /// Load, validate and render raw config bytes
    pub fn render(&self, raw: &[u8], options: &RenderOptions) -> Result<RenderOutput> {
        let loaded = self.load(raw, options.strict)?;
        if loaded.was_migrated() {
            info!(from = %loaded.source_version, to = loaded.document.api_version(), "migrated config");
        }
        self.render_document(loaded.document.as_ref(), options)
    }

    /// Render an already loaded document of the current version
    pub fn render_document(
        &self,
        document: &dyn ConfigDocument,
        options: &RenderOptions,
    ) -> Result<RenderOutput> {
        if options.skip_validation {
            debug!("structural validation skipped");
        } else {
            self.loader.ensure_valid(document)?;
        }

        let config = downcast_ref::<Config>(document)?.clone();
        let ctx = match &options.generated {
            Some(generated) => RenderContext::with_generated(
                config,
                options.version_manifest.clone(),
                &options.namespace,
                generated.clone(),
            ),
            None => RenderContext::new(
                config,
                options.version_manifest.clone(),
                &options.namespace,
            ),
        };
        render_context(&ctx)
    }
}

/// Run every stage after context construction
pub fn render_context(ctx: &RenderContext) -> Result<RenderOutput> {
    let objects = components::objects().produce(ctx)?;
    let mut manifests = to_manifests(&objects)?;
    manifests.extend(components::charts().produce(ctx)?);

    let mut rendered = materialize(&manifests)?;
    rendered.push(inventory(&rendered, ctx.namespace())?);

    let mut sorted = sort_by_dependency(rendered);
    apply_overrides(&overrides_for(ctx)?, &mut sorted)?;

    info!(objects = sorted.len(), namespace = ctx.namespace(), "rendered installation");
    Ok(RenderOutput { objects: sorted })
}
