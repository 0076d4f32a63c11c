//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Unknown config version '{version}' (known: {})", known.join(", "))]
    UnknownVersion { version: String, known: Vec<String> },

    #[error("Config version '{version}' is already registered")]
    DuplicateVersion { version: String },

    #[error("Migration {from} -> {to} is already registered")]
    DuplicateMigration { from: String, to: String },

    #[error("No migration path from '{from}' to '{to}'")]
    NoMigrationPath { from: String, to: String },

    #[error("Migration {from} -> {to} failed: {message}")]
    MigrationFailed {
        from: String,
        to: String,
        message: String,
    },

    #[error("Deprecated fields conflict with their replacements: {}", conflicts.join("; "))]
    DeprecationConflict { conflicts: Vec<String> },

    #[error("Config validation failed with {} error(s)", errors.len())]
    ValidationFailed { errors: Vec<ValidationErrorInfo> },

    #[error("Config has unexpected type, expected {expected}")]
    InvalidType { expected: String },

    #[error("Unknown fields in config: {}", fields.join(", "))]
    UnknownFields { fields: Vec<String> },

    #[error("Operation '{operation}' is not supported by config version '{version}'")]
    Unsupported { operation: String, version: String },

    #[error("Environment error: {message}")]
    Envvar { message: String },

    #[error("Invalid schema: {message}")]
    InvalidSchema { message: String },

    #[error("Cluster access failed: {0}")]
    Cluster(String),

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Config is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Detailed validation error info
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrorInfo {
    /// JSON pointer to the offending field, `(root)` for the document itself
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for ValidationErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
