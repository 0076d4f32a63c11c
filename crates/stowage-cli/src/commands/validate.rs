//! Validate commands - structural config checks and live cluster checks

use console::style;
use std::path::Path;

use stowage_core::{
    CoreError, ValidationReport, ValidationStatus, default_cluster_checks, run_cluster_checks,
};
use stowage_engine::EngineError;
use stowage_kube::KubeCluster;

use crate::commands::{pipeline, read_config};
use crate::error::{CliError, Result};

/// Validate a config file without touching a cluster
pub fn config(path: &Path, strict: bool, json: bool) -> Result<()> {
    let report = config_report(path, strict)?;
    finish(&report, json, "config")
}

pub fn config_report(path: &Path, strict: bool) -> Result<ValidationReport> {
    let pipeline = pipeline()?;
    let raw = read_config(path)?;

    let mut report = ValidationReport::default();
    let loaded = match pipeline.load(&raw, strict) {
        Ok(loaded) => loaded,
        Err(EngineError::Config(
            err @ (CoreError::UnknownFields { .. } | CoreError::DeprecationConflict { .. }),
        )) => {
            report.error(err.to_string());
            return Ok(report);
        }
        Err(err) => return Err(err.into()),
    };

    for field in loaded.deprecation_warnings.keys() {
        report.warning(format!("deprecated field {} is in use", field));
    }
    let result = pipeline.validate(loaded.document.as_ref())?;
    report.merge(ValidationReport::from_structural(&result));
    Ok(report)
}

/// Run cluster checks, the config's own when one is given
pub async fn cluster(path: Option<&Path>, namespace: &str, json: bool) -> Result<()> {
    let checks = match path {
        Some(path) => {
            let pipeline = pipeline()?;
            let loaded = pipeline.load(&read_config(path)?, false)?;
            pipeline.loader().cluster_checks(loaded.document.as_ref())?
        }
        None => default_cluster_checks(),
    };

    if !json {
        println!(
            "{} Running {} cluster checks in namespace {}",
            style("→").blue().bold(),
            checks.len(),
            style(namespace).cyan()
        );
    }

    let cluster = KubeCluster::connect().await?;
    let report = run_cluster_checks(&checks, &cluster, namespace).await;
    finish(&report, json, "cluster")
}

/// Print findings, failing when any is an error
pub fn finish(report: &ValidationReport, json: bool, subject: &str) -> Result<()> {
    if json {
        let out = serde_json::to_string_pretty(report)
            .map_err(|e| CliError::internal(e.to_string()))?;
        println!("{}", out);
    } else {
        print_report(report);
    }

    if report.is_error() {
        let errors = report
            .items
            .iter()
            .filter(|i| i.severity == ValidationStatus::Error)
            .count();
        return Err(CliError::validation(format!(
            "{} validation found {} error(s)",
            subject, errors
        )));
    }

    if !json {
        println!();
        println!("{} Validation passed!", style("✓").green().bold());
    }
    Ok(())
}

pub fn print_report(report: &ValidationReport) {
    for item in &report.items {
        match item.severity {
            ValidationStatus::Error => {
                println!("  {} {}", style("✗").red(), item.message);
            }
            ValidationStatus::Warning => {
                println!("  {} {}", style("⚠").yellow(), item.message);
            }
            ValidationStatus::Ok => {
                println!("  {} {}", style("✓").green(), style(&item.message).dim());
            }
        }
    }
}
