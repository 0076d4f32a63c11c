//! Build-from-envvars command - reconstruct a config from the environment

use std::path::Path;

use stowage_core::{EnvSource, ProcessEnv};

use crate::commands::{load_config, pipeline, write_output};
use crate::error::Result;

/// Start from `config` when given, a defaulted config otherwise
pub fn run(config: Option<&Path>, output: Option<&Path>) -> Result<()> {
    let yaml = build(config, &ProcessEnv)?;
    write_output(&yaml, output)
}

pub fn build(config: Option<&Path>, env: &dyn EnvSource) -> Result<String> {
    let pipeline = pipeline()?;
    let mut document = match config {
        Some(path) => load_config(&pipeline, path, false)?.document,
        None => pipeline.loader().init_config()?,
    };
    pipeline
        .loader()
        .build_from_envvars(document.as_mut(), env)?;
    Ok(document.to_yaml()?)
}
