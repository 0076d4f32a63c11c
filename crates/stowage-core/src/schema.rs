//! Structural validation for config documents
//!
//! Each config version ships a schema in either format:
//! - Standard JSON Schema
//! - Simplified Stowage schema format (more intuitive for YAML users)
//!
//! The simplified format can additionally tag properties with named custom
//! predicates (`validate: [fqdn]`), which versions register on the
//! [`StructValidator`] through `ConfigVersion::load_validation_funcs`.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

use crate::error::{CoreError, Result, ValidationErrorInfo};

/// Simplified schema type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum SimpleType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
    Any,
}

/// Simplified schema definition for a single property
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimpleProperty {
    /// Type of the property
    #[serde(rename = "type")]
    pub prop_type: SimpleType,

    /// Description for documentation
    #[serde(default)]
    pub description: Option<String>,

    /// Whether this property is required
    #[serde(default)]
    pub required: bool,

    /// Allowed values (enum constraint)
    #[serde(default)]
    pub enum_values: Option<Vec<JsonValue>>,

    /// Pattern for string validation (regex)
    #[serde(default)]
    pub pattern: Option<String>,

    /// Minimum value for numbers
    #[serde(default)]
    pub min: Option<f64>,

    /// Maximum value for numbers
    #[serde(default)]
    pub max: Option<f64>,

    /// Minimum length for strings
    #[serde(default)]
    pub min_length: Option<usize>,

    /// Nested properties for objects
    #[serde(default)]
    pub properties: Option<BTreeMap<String, SimpleProperty>>,

    /// Item schema for arrays
    #[serde(default)]
    pub items: Option<Box<SimpleProperty>>,

    /// Named custom predicates run against this property's value
    #[serde(default)]
    pub validate: Vec<String>,
}

/// Root schema definition in simplified format
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimpleSchema {
    /// Schema format identifier
    #[serde(default = "default_schema_version")]
    pub schema_version: String,

    /// Optional schema title
    #[serde(default)]
    pub title: Option<String>,

    /// Property definitions
    pub properties: BTreeMap<String, SimpleProperty>,
}

fn default_schema_version() -> String {
    "stowage/v1".to_string()
}

/// Unified schema that handles both formats
#[derive(Debug, Clone)]
pub enum Schema {
    /// Standard JSON Schema
    JsonSchema(JsonValue),
    /// Simplified Stowage schema
    SimpleSchema(SimpleSchema),
}

impl Schema {
    /// Load from JSON Schema string
    pub fn from_json_schema(json: &str) -> Result<Self> {
        let value: JsonValue = serde_json::from_str(json)?;
        Ok(Schema::JsonSchema(value))
    }

    /// Load from simplified schema YAML string
    pub fn from_simple_schema(yaml: &str) -> Result<Self> {
        let simple: SimpleSchema = serde_yaml::from_str(yaml)?;
        Ok(Schema::SimpleSchema(simple))
    }

    /// Convert to JSON Schema for validation
    pub fn to_json_schema(&self) -> JsonValue {
        match self {
            Schema::JsonSchema(v) => v.clone(),
            Schema::SimpleSchema(s) => convert_simple_to_json_schema(s),
        }
    }

    /// Custom predicate tags keyed by the JSON pointer they apply to
    pub fn validation_tags(&self) -> Vec<(String, String)> {
        let mut tags = Vec::new();
        if let Schema::SimpleSchema(s) = self {
            collect_tags(&s.properties, "", &mut tags);
        }
        tags
    }
}

fn collect_tags(
    props: &BTreeMap<String, SimpleProperty>,
    prefix: &str,
    tags: &mut Vec<(String, String)>,
) {
    for (name, prop) in props {
        let pointer = format!("{}/{}", prefix, name);
        for tag in &prop.validate {
            tags.push((pointer.clone(), tag.clone()));
        }
        if let Some(nested) = &prop.properties {
            collect_tags(nested, &pointer, tags);
        }
    }
}

/// Convert simplified schema to JSON Schema
fn convert_simple_to_json_schema(simple: &SimpleSchema) -> JsonValue {
    let mut schema = serde_json::Map::new();

    schema.insert(
        "$schema".into(),
        JsonValue::String("http://json-schema.org/draft-07/schema#".into()),
    );
    schema.insert("type".into(), JsonValue::String("object".into()));

    if let Some(title) = &simple.title {
        schema.insert("title".into(), JsonValue::String(title.clone()));
    }

    let (properties, required) = convert_simple_properties(&simple.properties);
    schema.insert("properties".into(), properties);

    if !required.is_empty() {
        schema.insert(
            "required".into(),
            JsonValue::Array(required.into_iter().map(JsonValue::String).collect()),
        );
    }

    JsonValue::Object(schema)
}

fn convert_simple_properties(props: &BTreeMap<String, SimpleProperty>) -> (JsonValue, Vec<String>) {
    let mut json_props = serde_json::Map::new();
    let mut required = Vec::new();

    for (name, prop) in props {
        json_props.insert(name.clone(), convert_simple_property(prop));
        if prop.required {
            required.push(name.clone());
        }
    }

    (JsonValue::Object(json_props), required)
}

fn convert_simple_property(prop: &SimpleProperty) -> JsonValue {
    let mut json = serde_json::Map::new();

    let type_str = match prop.prop_type {
        SimpleType::String => "string",
        SimpleType::Number => "number",
        SimpleType::Integer => "integer",
        SimpleType::Boolean => "boolean",
        SimpleType::Array => "array",
        SimpleType::Object => "object",
        // JSON Schema has no "any", omit type
        SimpleType::Any => return JsonValue::Object(json),
    };
    json.insert("type".into(), JsonValue::String(type_str.into()));

    if let Some(desc) = &prop.description {
        json.insert("description".into(), JsonValue::String(desc.clone()));
    }
    if let Some(enum_vals) = &prop.enum_values {
        json.insert("enum".into(), JsonValue::Array(enum_vals.clone()));
    }
    if let Some(pattern) = &prop.pattern {
        json.insert("pattern".into(), JsonValue::String(pattern.clone()));
    }
    if let Some(min) = prop.min {
        json.insert("minimum".into(), JsonValue::from(min));
    }
    if let Some(max) = prop.max {
        json.insert("maximum".into(), JsonValue::from(max));
    }
    if let Some(min_len) = prop.min_length {
        json.insert("minLength".into(), JsonValue::from(min_len));
    }

    if let Some(nested_props) = &prop.properties {
        let (nested_json, nested_required) = convert_simple_properties(nested_props);
        json.insert("properties".into(), nested_json);
        if !nested_required.is_empty() {
            json.insert(
                "required".into(),
                JsonValue::Array(nested_required.into_iter().map(JsonValue::String).collect()),
            );
        }
    }

    if let Some(items) = &prop.items {
        json.insert("items".into(), convert_simple_property(items));
    }

    JsonValue::Object(json)
}

/// Result of structural validation
#[derive(Debug)]
pub struct ValidationResult {
    /// Whether the document is valid
    pub is_valid: bool,
    /// Validation errors
    pub errors: Vec<ValidationErrorInfo>,
}

impl ValidationResult {
    /// Create a successful validation result
    pub fn success() -> Self {
        Self {
            is_valid: true,
            errors: vec![],
        }
    }

    /// Create a failed validation result with errors
    pub fn failure(errors: Vec<ValidationErrorInfo>) -> Self {
        Self {
            is_valid: false,
            errors,
        }
    }

    /// Valid exactly when `errors` is empty
    pub fn from_errors(errors: Vec<ValidationErrorInfo>) -> Self {
        if errors.is_empty() {
            Self::success()
        } else {
            Self::failure(errors)
        }
    }

    /// Convert into an error when invalid
    pub fn into_result(self) -> Result<()> {
        if self.is_valid {
            Ok(())
        } else {
            Err(CoreError::ValidationFailed {
                errors: self.errors,
            })
        }
    }
}

/// A named custom predicate
pub type Predicate = Box<dyn Fn(&JsonValue) -> std::result::Result<(), String> + Send + Sync>;

/// Validator combining a compiled JSON Schema with tag-driven predicates
pub struct StructValidator {
    compiled: jsonschema::Validator,
    tags: Vec<(String, String)>,
    predicates: BTreeMap<String, Predicate>,
}

impl StructValidator {
    /// Create a new validator from a schema
    pub fn new(schema: &Schema) -> Result<Self> {
        let json_schema = schema.to_json_schema();
        let compiled =
            jsonschema::validator_for(&json_schema).map_err(|e| CoreError::InvalidSchema {
                message: format!("Invalid schema: {}", e),
            })?;

        Ok(Self {
            compiled,
            tags: schema.validation_tags(),
            predicates: BTreeMap::new(),
        })
    }

    /// A validator that accepts any document
    pub fn permissive() -> Result<Self> {
        Self::new(&Schema::JsonSchema(JsonValue::Object(Default::default())))
    }

    /// Register a predicate for a tag, replacing any previous one
    pub fn register<F>(&mut self, tag: &str, predicate: F)
    where
        F: Fn(&JsonValue) -> std::result::Result<(), String> + Send + Sync + 'static,
    {
        self.predicates.insert(tag.to_string(), Box::new(predicate));
    }

    pub fn has_predicate(&self, tag: &str) -> bool {
        self.predicates.contains_key(tag)
    }

    /// Validate a document against the schema and every tagged predicate
    pub fn validate(&self, document: &JsonValue) -> ValidationResult {
        let mut errors: Vec<ValidationErrorInfo> = self
            .compiled
            .iter_errors(document)
            .map(|e| {
                let path = e.instance_path.to_string();
                ValidationErrorInfo {
                    path: if path.is_empty() {
                        "(root)".to_string()
                    } else {
                        path
                    },
                    message: format_validation_error(&e),
                }
            })
            .collect();

        for (pointer, tag) in &self.tags {
            let Some(value) = document.pointer(pointer) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            match self.predicates.get(tag) {
                Some(predicate) => {
                    if let Err(message) = predicate(value) {
                        errors.push(ValidationErrorInfo {
                            path: pointer.clone(),
                            message: format!("{} ({})", message, tag),
                        });
                    }
                }
                None => errors.push(ValidationErrorInfo {
                    path: pointer.clone(),
                    message: format!("unknown validation tag '{}'", tag),
                }),
            }
        }

        ValidationResult::from_errors(errors)
    }
}

/// Format a validation error into a user-friendly message
fn format_validation_error(error: &jsonschema::ValidationError) -> String {
    error.to_string().replace('"', "'")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SCHEMA: &str = r#"
schemaVersion: stowage/v1
title: Test Schema
properties:
  domain:
    type: string
    required: true
    validate: [fqdn]
  replicas:
    type: integer
    min: 0
    max: 10
  storage:
    type: object
    properties:
      path:
        type: string
        validate: [abs_path]
"#;

    fn validator() -> StructValidator {
        let schema = Schema::from_simple_schema(SCHEMA).unwrap();
        let mut validator = StructValidator::new(&schema).unwrap();
        validator.register("fqdn", |v| match v.as_str() {
            Some(s) if s.contains('.') => Ok(()),
            _ => Err("must be a domain name".into()),
        });
        validator.register("abs_path", |v| match v.as_str() {
            Some(s) if s.starts_with('/') => Ok(()),
            _ => Err("must be an absolute path".into()),
        });
        validator
    }

    #[test]
    fn test_simple_to_json_schema_conversion() {
        let schema = Schema::from_simple_schema(SCHEMA).unwrap();
        let json_schema = schema.to_json_schema();

        let obj = json_schema.as_object().unwrap();
        assert_eq!(obj.get("type"), Some(&JsonValue::String("object".into())));
        let required = obj.get("required").unwrap().as_array().unwrap();
        assert!(required.contains(&JsonValue::String("domain".into())));
        assert!(!obj["properties"]["domain"].as_object().unwrap().contains_key("validate"));
    }

    #[test]
    fn test_validation_tags_are_pointers() {
        let schema = Schema::from_simple_schema(SCHEMA).unwrap();
        assert_eq!(
            schema.validation_tags(),
            vec![
                ("/domain".to_string(), "fqdn".to_string()),
                ("/storage/path".to_string(), "abs_path".to_string()),
            ]
        );
    }

    #[test]
    fn test_validation_success() {
        let result = validator().validate(&json!({
            "domain": "example.com",
            "replicas": 5,
            "storage": {"path": "/data"}
        }));
        assert!(result.is_valid, "{:?}", result.errors);
    }

    #[test]
    fn test_schema_and_predicate_errors_are_combined() {
        let result = validator().validate(&json!({
            "domain": "localhost",
            "replicas": "many",
            "storage": {"path": "data"}
        }));
        assert!(!result.is_valid);
        let paths: Vec<_> = result.errors.iter().map(|e| e.path.as_str()).collect();
        assert!(paths.contains(&"/replicas"));
        assert!(paths.contains(&"/domain"));
        assert!(paths.contains(&"/storage/path"));
    }

    #[test]
    fn test_missing_required_reports_root() {
        let result = validator().validate(&json!({}));
        assert!(!result.is_valid);
        assert_eq!(result.errors[0].path, "(root)");
    }

    #[test]
    fn test_unregistered_tag_is_an_error() {
        let schema = Schema::from_simple_schema(SCHEMA).unwrap();
        let validator = StructValidator::new(&schema).unwrap();
        let result = validator.validate(&json!({"domain": "example.com"}));
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].message.contains("unknown validation tag"));
    }

    #[test]
    fn test_permissive_accepts_anything() {
        let validator = StructValidator::permissive().unwrap();
        assert!(validator.validate(&json!({"x": [1, 2]})).is_valid);
    }
}
