//! Apply command - validate, render and server-side apply an installation

use console::style;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use stowage_core::run_cluster_checks;
use stowage_engine::RenderOptions;
use stowage_kube::{Applier, KubeCluster};

use crate::commands::validate::print_report;
use crate::commands::{load_config, load_version_manifest, pipeline};
use crate::error::{CliError, Result};

pub struct ApplyArgs<'a> {
    pub config: &'a Path,
    pub namespace: &'a str,
    pub version_manifest: Option<&'a Path>,
    pub strict: bool,
    pub timeout: Duration,
    pub skip_cluster_checks: bool,
}

pub async fn run(args: &ApplyArgs<'_>) -> Result<()> {
    let pipeline = pipeline()?;
    let mut loaded = load_config(&pipeline, args.config, args.strict)?;
    pipeline.loader().ensure_valid(loaded.document.as_ref())?;
    let version_manifest = load_version_manifest(args.version_manifest)?;

    println!(
        "{} Installing {} into namespace {}",
        style("→").blue().bold(),
        style(&version_manifest.version).yellow(),
        style(args.namespace).cyan()
    );

    let cluster = KubeCluster::connect().await?;

    if args.skip_cluster_checks {
        println!("{} Skipping cluster checks", style("⚠").yellow());
    } else {
        let checks = pipeline.loader().cluster_checks(loaded.document.as_ref())?;
        let report = run_cluster_checks(&checks, &cluster, args.namespace).await;
        if report.is_error() {
            print_report(&report);
            return Err(CliError::Validation {
                message: "cluster is not ready for this installation".to_string(),
                help: Some("Run `stowage validate cluster` for the full report".to_string()),
            });
        }
    }

    // Provisions missing secrets and may rewrite the config to reference them
    pipeline
        .loader()
        .pre_deploy(loaded.document.as_mut(), &cluster, args.namespace)
        .await?;

    let options = RenderOptions {
        namespace: args.namespace.to_string(),
        version_manifest,
        // validated above, pre_deploy only adds references
        skip_validation: true,
        strict: args.strict,
        generated: None,
    };
    let output = pipeline.render_document(loaded.document.as_ref(), &options)?;

    let mut applier = Applier::new(cluster.client().clone(), args.namespace).await?;
    let total = output.len();
    let results = applier.apply_all(&output.objects, args.timeout).await?;

    for result in &results {
        println!(
            "  {} {}/{} {}",
            style("✓").green(),
            result.api_version,
            result.kind,
            result.name
        );
    }
    info!(applied = results.len(), total, "apply finished");

    println!();
    println!(
        "{} Applied {} objects",
        style("✓").green().bold(),
        style(results.len()).cyan()
    );
    Ok(())
}
