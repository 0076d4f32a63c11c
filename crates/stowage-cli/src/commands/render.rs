//! Render command - print the manifest stream for a config

use console::style;
use std::path::Path;

use stowage_engine::{RenderOptions, RenderOutput};

use crate::commands::{load_config, load_version_manifest, pipeline, write_output};
use crate::error::Result;

pub struct RenderArgs<'a> {
    pub config: &'a Path,
    pub namespace: &'a str,
    pub version_manifest: Option<&'a Path>,
    pub no_validation: bool,
    pub strict: bool,
    pub output: Option<&'a Path>,
}

pub fn run(args: &RenderArgs<'_>) -> Result<()> {
    let output = render(args)?;
    eprintln!(
        "{} Rendered {} objects for namespace {}",
        style("✓").green().bold(),
        output.len(),
        style(args.namespace).cyan()
    );
    write_output(&output.to_stream(), args.output)
}

pub fn render(args: &RenderArgs<'_>) -> Result<RenderOutput> {
    let pipeline = pipeline()?;
    let loaded = load_config(&pipeline, args.config, args.strict)?;
    let options = RenderOptions {
        namespace: args.namespace.to_string(),
        version_manifest: load_version_manifest(args.version_manifest)?,
        skip_validation: args.no_validation,
        strict: args.strict,
        generated: None,
    };
    Ok(pipeline.render_document(loaded.document.as_ref(), &options)?)
}
