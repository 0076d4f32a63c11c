//! CLI error types with exit code handling
//!
//! Every command returns [`CliError`]; `main` prints it as a miette report and
//! exits with [`CliError::exit_code`].

use miette::Diagnostic;
use thiserror::Error;

use stowage_core::CoreError;
use stowage_engine::{ChartError, EngineError};
use stowage_kube::KubeError;

use crate::exit_codes;

#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// Structural or cluster validation failed
    #[error("Validation failed: {message}")]
    #[diagnostic(code(stowage::cli::validation))]
    Validation {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// A producer or chart failed
    #[error("Render failed: {message}")]
    #[diagnostic(code(stowage::cli::render))]
    Render {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Config could not be read, migrated or reconstructed
    #[error("Config error: {message}")]
    #[diagnostic(code(stowage::cli::config))]
    Config {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Talking to the cluster failed
    #[error("Cluster error: {message}")]
    #[diagnostic(code(stowage::cli::cluster))]
    Cluster {
        message: String,
        #[help]
        help: Option<String>,
    },

    #[error("IO error: {message}")]
    #[diagnostic(code(stowage::cli::io))]
    Io { message: String },

    #[error("Internal error: {message}")]
    #[diagnostic(code(stowage::cli::internal))]
    Internal { message: String },
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Validation { .. } => exit_codes::VALIDATION_ERROR,
            CliError::Render { .. } => exit_codes::RENDER_ERROR,
            CliError::Config { .. } => exit_codes::CONFIG_ERROR,
            CliError::Cluster { .. } => exit_codes::ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Internal { .. } => exit_codes::ERROR,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            help: None,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: None,
        }
    }

    pub fn config_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    pub fn cluster(message: impl Into<String>) -> Self {
        Self::Cluster {
            message: message.into(),
            help: None,
        }
    }

    /// IO error naming the file involved
    pub fn io_at(path: &std::path::Path, err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{}: {}", path.display(), err),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ValidationFailed { errors } => CliError::Validation {
                message: format!("config has {} error(s)", errors.len()),
                help: Some(
                    errors
                        .iter()
                        .map(|e| format!("- {}", e))
                        .collect::<Vec<_>>()
                        .join("\n"),
                ),
            },
            CoreError::DeprecationConflict { .. } | CoreError::UnknownFields { .. } => {
                CliError::validation(err.to_string())
            }
            CoreError::UnknownVersion { .. } => CliError::config_with_help(
                err.to_string(),
                "Set `apiVersion` to one of the known versions",
            ),
            CoreError::Cluster(message) => CliError::cluster(message),
            CoreError::Io(e) => CliError::from(e),
            other => CliError::config(other.to_string()),
        }
    }
}

/// Innermost chart error behind any producer nesting
fn chart_error(err: &EngineError) -> Option<&ChartError> {
    match err {
        EngineError::Chart(chart) => Some(chart),
        EngineError::Producer { source, .. } => chart_error(source),
        _ => None,
    }
}

impl From<EngineError> for CliError {
    fn from(err: EngineError) -> Self {
        if let EngineError::Config(core) = err {
            return core.into();
        }
        match chart_error(&err) {
            Some(chart) => CliError::Render {
                message: format!(
                    "chart '{}': {}",
                    err.failing_producer().unwrap_or("<unknown>"),
                    chart.message
                ),
                help: chart.suggestion.clone(),
            },
            None => CliError::Render {
                message: err.to_string(),
                help: None,
            },
        }
    }
}

impl From<KubeError> for CliError {
    fn from(err: KubeError) -> Self {
        let help = match &err {
            KubeError::UnknownResourceType { .. } => {
                Some("Install the CRD providing this type before applying".to_string())
            }
            KubeError::Timeout(_) => Some("Raise the timeout with --timeout".to_string()),
            _ => None,
        };
        CliError::Cluster {
            message: err.to_string(),
            help,
        }
    }
}

pub type Result<T> = std::result::Result<T, CliError>;
