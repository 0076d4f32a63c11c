//! Migrate command - rewrite a config at the current version

use console::style;
use std::path::Path;

use crate::commands::{load_config, pipeline, write_output};
use crate::error::Result;

pub fn run(config: &Path, output: Option<&Path>) -> Result<()> {
    let pipeline = pipeline()?;
    let loaded = load_config(&pipeline, config, false)?;

    if loaded.was_migrated() {
        eprintln!(
            "{} Migrated {} -> {}",
            style("→").blue().bold(),
            style(&loaded.source_version).yellow(),
            style(loaded.document.api_version()).green()
        );
    } else {
        eprintln!(
            "{} Already at {}",
            style("✓").green().bold(),
            style(loaded.document.api_version()).green()
        );
    }

    write_output(&loaded.document.to_yaml()?, output)
}
