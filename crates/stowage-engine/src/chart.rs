//! Bundled charts rendered with MiniJinja
//!
//! A chart is a multi-document YAML template. Rendering yields one string per
//! document, ready for materialisation.

use minijinja::{Environment, UndefinedBehavior, Value};
use tracing::debug;

use crate::error::{ChartError, Result};
use crate::filters;
use crate::objects::split_documents;

/// A named chart template compiled into the binary
#[derive(Debug, Clone, Copy)]
pub struct Chart {
    pub name: &'static str,
    pub source: &'static str,
}

impl Chart {
    pub const fn new(name: &'static str, source: &'static str) -> Self {
        Self { name, source }
    }

    fn environment(&self) -> std::result::Result<Environment<'static>, ChartError> {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_trim_blocks(true);
        filters::register(&mut env);
        env.add_template(self.name, self.source)
            .map_err(|e| ChartError::from_minijinja(e, self.name, self.source))?;
        Ok(env)
    }

    /// Render the whole template as text
    pub fn render_text(&self, vars: Value) -> Result<String> {
        let env = self.environment()?;
        let template = env
            .get_template(self.name)
            .map_err(|e| ChartError::from_minijinja(e, self.name, self.source))?;
        let text = template
            .render(vars)
            .map_err(|e| ChartError::from_minijinja(e, self.name, self.source))?;
        Ok(text)
    }

    /// Render and split into one manifest per document
    pub fn render(&self, vars: Value) -> Result<Vec<String>> {
        let documents = split_documents(&self.render_text(vars)?);
        debug!(chart = self.name, documents = documents.len(), "rendered chart");
        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use minijinja::context;

    const DEMO: Chart = Chart::new(
        "demo",
        "---\napiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: {{ name }}\ndata:\n  secret: {{ secret | b64encode | quote }}\n{% if extra %}\n---\napiVersion: v1\nkind: Service\nmetadata:\n  name: {{ name }}\n{% endif %}\n",
    );

    #[test]
    fn test_render_splits_documents() {
        let docs = DEMO
            .render(context! { name => "demo", secret => "s", extra => true })
            .unwrap();
        assert_eq!(docs.len(), 2);
        assert!(docs[0].contains("secret: \"cw==\""));
        assert!(docs[1].contains("kind: Service"));
    }

    #[test]
    fn test_conditional_document() {
        let docs = DEMO
            .render(context! { name => "demo", secret => "s", extra => false })
            .unwrap();
        assert_eq!(docs.len(), 1);
    }

    #[test]
    fn test_undefined_variable_is_an_error() {
        let err = DEMO.render(context! { name => "demo" }).unwrap_err();
        match err {
            EngineError::Chart(chart) => assert!(chart.span.is_some()),
            other => panic!("unexpected error: {other}"),
        }
    }
}
