//! Cluster objects and their rendered form

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{EngineError, Result};

/// A typed cluster object erased to its JSON form.
///
/// Producers build `k8s-openapi` structs and wrap them with [`Object::new`];
/// the resource's `apiVersion` and `kind` are carried in the value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Object(JsonValue);

impl Object {
    pub fn new<K>(resource: &K) -> Result<Self>
    where
        K: k8s_openapi::Resource + Serialize,
    {
        Ok(Self(serde_json::to_value(resource)?))
    }

    pub fn from_value(value: JsonValue) -> Self {
        Self(value)
    }

    pub fn api_version(&self) -> &str {
        self.0["apiVersion"].as_str().unwrap_or_default()
    }

    pub fn kind(&self) -> &str {
        self.0["kind"].as_str().unwrap_or_default()
    }

    pub fn name(&self) -> &str {
        self.0["metadata"]["name"].as_str().unwrap_or_default()
    }

    pub fn value(&self) -> &JsonValue {
        &self.0
    }

    pub fn into_value(self) -> JsonValue {
        self.0
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.0)?)
    }
}

/// One manifest parsed far enough to be identified and ordered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedObject {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    /// The manifest text as it will be emitted
    pub content: String,
}

impl RenderedObject {
    /// Identify a manifest, `None` when it holds no object at all
    pub fn parse(content: &str) -> Result<Option<Self>> {
        if is_blank(content) {
            return Ok(None);
        }

        let value: JsonValue = serde_yaml::from_str(content)
            .map_err(|e| EngineError::malformed(content, e.to_string()))?;
        if value.is_null() {
            return Ok(None);
        }
        if !value.is_object() {
            return Err(EngineError::malformed(content, "manifest is not a mapping"));
        }

        let field = |key: &str| -> Result<String> {
            match value[key].as_str() {
                Some(v) if !v.is_empty() => Ok(v.to_string()),
                _ => Err(EngineError::malformed(content, format!("missing {}", key))),
            }
        };

        Ok(Some(Self {
            api_version: field("apiVersion")?,
            kind: field("kind")?,
            name: value["metadata"]["name"]
                .as_str()
                .unwrap_or_default()
                .to_string(),
            content: content.trim_end().to_string(),
        }))
    }

    /// Re-read the manifest body
    pub fn value(&self) -> Result<JsonValue> {
        serde_yaml::from_str(&self.content)
            .map_err(|e| EngineError::malformed(&self.content, e.to_string()))
    }

    /// Replace the body, keeping identity fields in sync
    pub fn set_value(&mut self, value: &JsonValue) -> Result<()> {
        self.content = serde_yaml::to_string(value)?.trim_end().to_string();
        Ok(())
    }

    /// `apiVersion/kind name`, used in logs and stream headers
    pub fn display_name(&self) -> String {
        format!("{}/{} {}", self.api_version, self.kind, self.name)
    }
}

fn is_blank(content: &str) -> bool {
    content
        .lines()
        .map(str::trim)
        .all(|l| l.is_empty() || l.starts_with('#') || l == "---")
}

/// Text following a `---` separator, `None` for ordinary lines
fn separator_remainder(line: &str) -> Option<&str> {
    if line.trim_end() == "---" {
        Some("")
    } else {
        line.strip_prefix("--- ")
    }
}

/// Split chart text on YAML document separators
pub fn split_documents(text: &str) -> Vec<String> {
    let mut documents = Vec::new();
    let mut current = String::new();

    for line in text.lines() {
        if let Some(rest) = separator_remainder(line) {
            if !is_blank(&current) {
                documents.push(std::mem::take(&mut current));
            }
            current.clear();
            // `--- !!map` or `--- {a: 1}` start the next document inline
            if !rest.trim().is_empty() {
                current.push_str(rest);
                current.push('\n');
            }
            continue;
        }
        current.push_str(line);
        current.push('\n');
    }
    if !is_blank(&current) {
        documents.push(current);
    }

    documents
}

/// Serialize typed objects into manifests
pub fn to_manifests(objects: &[Object]) -> Result<Vec<String>> {
    objects.iter().map(Object::to_yaml).collect()
}

/// Parse every manifest, skipping empty ones
pub fn materialize<S: AsRef<str>>(manifests: &[S]) -> Result<Vec<RenderedObject>> {
    let mut objects = Vec::with_capacity(manifests.len());
    for manifest in manifests {
        if let Some(object) = RenderedObject::parse(manifest.as_ref())? {
            objects.push(object);
        }
    }
    Ok(objects)
}
