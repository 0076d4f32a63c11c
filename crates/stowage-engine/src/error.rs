//! Engine error types

use miette::{Diagnostic, NamedSource, SourceSpan};
use stowage_core::CoreError;
use thiserror::Error;

/// Main engine error type
#[derive(Error, Debug)]
pub enum EngineError {
    /// A named producer failed, `source` is its own error unchanged
    #[error("producer '{name}' failed: {source}")]
    Producer {
        name: String,
        #[source]
        source: Box<EngineError>,
    },

    #[error("malformed manifest ({excerpt}): {message}")]
    MalformedManifest { message: String, excerpt: String },

    #[error("chart error")]
    Chart(#[from] ChartError),

    #[error("override '{name}' failed: {message}")]
    Override { name: String, message: String },

    #[error(transparent)]
    Config(#[from] CoreError),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    /// Malformed manifest error identifying the offending content
    pub fn malformed(content: &str, message: impl Into<String>) -> Self {
        Self::MalformedManifest {
            message: message.into(),
            excerpt: excerpt(content),
        }
    }

    /// Name of the innermost producer that failed, if any
    pub fn failing_producer(&self) -> Option<&str> {
        match self {
            Self::Producer { name, source } => source.failing_producer().or(Some(name.as_str())),
            _ => None,
        }
    }
}

/// First meaningful line of a manifest, shortened
fn excerpt(content: &str) -> String {
    let line = content
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with('#') && *l != "---")
        .unwrap_or("<empty>");
    if line.chars().count() > 60 {
        format!("{}...", line.chars().take(57).collect::<String>())
    } else {
        line.to_string()
    }
}

/// Chart rendering error with source information
#[derive(Error, Debug, Diagnostic, Clone)]
#[error("{message}")]
#[diagnostic(code(stowage::chart::render))]
pub struct ChartError {
    pub message: String,

    #[source_code]
    pub src: NamedSource<String>,

    #[label("error occurred here")]
    pub span: Option<SourceSpan>,

    #[help]
    pub suggestion: Option<String>,
}

impl ChartError {
    /// Create a chart error from a MiniJinja error
    pub fn from_minijinja(err: minijinja::Error, chart: &str, source: &str) -> Self {
        let span = err.line().and_then(|line| calculate_span(source, line));
        let suggestion = match err.kind() {
            minijinja::ErrorKind::UndefinedError => Some(
                "Check the chart only uses values its producer passes in.".to_string(),
            ),
            minijinja::ErrorKind::UnknownFilter => {
                Some(format!("Available filters: {}", crate::filters::FILTERS.join(", ")))
            }
            _ => None,
        };

        Self {
            message: err.to_string(),
            src: NamedSource::new(chart, source.to_string()),
            span,
            suggestion,
        }
    }

    /// Create a simple error without source mapping
    pub fn simple(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            src: NamedSource::new("<unknown>", String::new()),
            span: None,
            suggestion: None,
        }
    }
}

/// Calculate the source span for a given line number
fn calculate_span(source: &str, line_num: usize) -> Option<SourceSpan> {
    let mut offset = 0;

    for (idx, line) in source.lines().enumerate() {
        if idx + 1 == line_num {
            return Some(SourceSpan::new(offset.into(), line.len()));
        }
        offset += line.len() + 1;
    }

    None
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excerpt_skips_comments() {
        let err = EngineError::malformed("---\n# header\nkind: [broken\n", "bad");
        assert_eq!(err.to_string(), "malformed manifest (kind: [broken): bad");
    }

    #[test]
    fn test_excerpt_truncates() {
        let long = format!("name: {}", "x".repeat(100));
        match EngineError::malformed(&long, "bad") {
            EngineError::MalformedManifest { excerpt, .. } => {
                assert_eq!(excerpt.chars().count(), 60);
                assert!(excerpt.ends_with("..."));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_failing_producer_is_innermost() {
        let err = EngineError::Producer {
            name: "components".into(),
            source: Box::new(EngineError::Producer {
                name: "server".into(),
                source: Box::new(EngineError::malformed("x", "bad")),
            }),
        };
        assert_eq!(err.failing_producer(), Some("server"));
    }

    #[test]
    fn test_calculate_span() {
        let span = calculate_span("a: 1\nbb: 2\n", 2).unwrap();
        assert_eq!(span.offset(), 5);
        assert_eq!(span.len(), 5);
        assert!(calculate_span("a: 1", 3).is_none());
    }

    #[test]
    fn test_chart_error_simple() {
        let err = ChartError::simple("boom");
        assert_eq!(err.message, "boom");
        assert!(err.suggestion.is_none());
    }
}
