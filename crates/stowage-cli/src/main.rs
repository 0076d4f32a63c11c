//! Stowage CLI - render, validate and apply installations

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod commands;
mod error;
mod exit_codes;

use error::Result;

#[derive(Parser)]
#[command(name = "stowage")]
#[command(version)]
#[command(about = "Render, validate and apply Stowage installations", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a defaulted config of the current version
    Init {
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Render the manifest stream for a config
    Render {
        /// Config file, `-` for stdin
        #[arg(short, long)]
        config: PathBuf,

        /// Install namespace
        #[arg(short, long, env = "STOWAGE_NAMESPACE", default_value = "default")]
        namespace: String,

        /// Image versions as YAML
        #[arg(long)]
        version_manifest: Option<PathBuf>,

        /// Skip structural validation
        #[arg(long)]
        no_validation: bool,

        /// Reject unknown config fields
        #[arg(long)]
        strict: bool,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate a config or a cluster
    Validate {
        #[command(subcommand)]
        target: ValidateTarget,
    },

    /// Validate, render and apply to the current cluster
    Apply {
        /// Config file, `-` for stdin
        #[arg(short, long)]
        config: PathBuf,

        /// Install namespace
        #[arg(short, long, env = "STOWAGE_NAMESPACE", default_value = "default")]
        namespace: String,

        /// Image versions as YAML
        #[arg(long)]
        version_manifest: Option<PathBuf>,

        /// Reject unknown config fields
        #[arg(long)]
        strict: bool,

        /// Per-object apply timeout in seconds
        #[arg(long, default_value_t = stowage_kube::DEFAULT_TIMEOUT.as_secs())]
        timeout: u64,

        /// Apply even if cluster checks fail
        #[arg(long)]
        skip_cluster_checks: bool,
    },

    /// Rewrite a config at the current version
    Migrate {
        /// Config file, `-` for stdin
        #[arg(short, long)]
        config: PathBuf,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Rebuild a config from environment variables
    BuildFromEnvvars {
        /// Starting config, a defaulted one otherwise
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ValidateTarget {
    /// Structural checks on a config file
    Config {
        /// Config file, `-` for stdin
        #[arg(short, long)]
        config: PathBuf,

        /// Reject unknown config fields
        #[arg(long)]
        strict: bool,

        /// Output validation results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check the current cluster can host an installation
    Cluster {
        /// Config whose requirements to check
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Install namespace
        #[arg(short, long, env = "STOWAGE_NAMESPACE", default_value = "default")]
        namespace: String,

        /// Output validation results as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();
}

async fn dispatch(command: Commands) -> Result<()> {
    match command {
        Commands::Init { output } => commands::init::run(output.as_deref()),

        Commands::Render {
            config,
            namespace,
            version_manifest,
            no_validation,
            strict,
            output,
        } => commands::render::run(&commands::render::RenderArgs {
            config: &config,
            namespace: &namespace,
            version_manifest: version_manifest.as_deref(),
            no_validation,
            strict,
            output: output.as_deref(),
        }),

        Commands::Validate { target } => match target {
            ValidateTarget::Config {
                config,
                strict,
                json,
            } => commands::validate::config(&config, strict, json),
            ValidateTarget::Cluster {
                config,
                namespace,
                json,
            } => commands::validate::cluster(config.as_deref(), &namespace, json).await,
        },

        Commands::Apply {
            config,
            namespace,
            version_manifest,
            strict,
            timeout,
            skip_cluster_checks,
        } => {
            commands::apply::run(&commands::apply::ApplyArgs {
                config: &config,
                namespace: &namespace,
                version_manifest: version_manifest.as_deref(),
                strict,
                timeout: Duration::from_secs(timeout),
                skip_cluster_checks,
            })
            .await
        }

        Commands::Migrate { config, output } => {
            commands::migrate::run(&config, output.as_deref())
        }

        Commands::BuildFromEnvvars { config, output } => {
            commands::envvars::run(config.as_deref(), output.as_deref())
        }
    }
}

#[tokio::main]
async fn main() {
    miette::set_panic_hook();

    let cli = Cli::parse();
    init_tracing(cli.debug);

    if let Err(err) = dispatch(cli.command).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}
