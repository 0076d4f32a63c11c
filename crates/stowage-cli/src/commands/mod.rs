//! CLI commands

pub mod apply;
pub mod envvars;
pub mod init;
pub mod migrate;
pub mod render;
pub mod validate;

use console::style;
use std::io::Read;
use std::path::Path;
use tracing::debug;

use stowage_core::LoadedConfig;
use stowage_engine::{Pipeline, VersionManifest};

use crate::error::{CliError, Result};

/// Read config bytes from a file, `-` reads stdin
pub fn read_config(path: &Path) -> Result<Vec<u8>> {
    if path == Path::new("-") {
        let mut raw = Vec::new();
        std::io::stdin().read_to_end(&mut raw)?;
        return Ok(raw);
    }
    std::fs::read(path).map_err(|e| CliError::io_at(path, e))
}

/// Read and load a config, reporting deprecated fields on stderr
pub fn load_config(pipeline: &Pipeline, path: &Path, strict: bool) -> Result<LoadedConfig> {
    let raw = read_config(path)?;
    let loaded = pipeline.load(&raw, strict)?;

    for (field, value) in &loaded.deprecation_warnings {
        eprintln!(
            "{} Deprecated field {} in use (value: {})",
            style("⚠").yellow(),
            style(field).cyan(),
            value
        );
    }
    if loaded.was_migrated() {
        debug!(
            from = %loaded.source_version,
            to = loaded.document.api_version(),
            "config migrated"
        );
    }
    Ok(loaded)
}

/// Version manifest from a YAML file, every component at `latest` otherwise
pub fn load_version_manifest(path: Option<&Path>) -> Result<VersionManifest> {
    let Some(path) = path else {
        return Ok(VersionManifest::default());
    };
    let raw = std::fs::read_to_string(path).map_err(|e| CliError::io_at(path, e))?;
    serde_yaml::from_str(&raw).map_err(|e| {
        CliError::config_with_help(
            format!("invalid version manifest {}: {}", path.display(), e),
            "Expected `version:` and optional `components: {name: {version: ...}}`",
        )
    })
}

/// Write to a file, or stdout when no path is given
pub fn write_output(content: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, content).map_err(|e| CliError::io_at(path, e))?;
            eprintln!(
                "{} Wrote {}",
                style("✓").green().bold(),
                style(path.display()).cyan()
            );
        }
        None => print!("{}", content),
    }
    Ok(())
}

pub fn pipeline() -> Result<Pipeline> {
    Pipeline::builtin().map_err(CliError::from)
}
