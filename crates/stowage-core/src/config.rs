//! Versioned config documents
//!
//! Every schema version is a plain serde struct implementing [`VersionedDocument`].
//! The rest of the system handles them as `Box<dyn ConfigDocument>` and only
//! downcasts where the concrete layout matters.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::any::Any;
use std::fmt::Debug;

use crate::error::{CoreError, Result};
use crate::values::deep_merge;

/// A typed config document for one schema version
pub trait VersionedDocument:
    Serialize + DeserializeOwned + Default + Debug + Send + Sync + 'static
{
    /// The `apiVersion` string this layout is registered under
    const API_VERSION: &'static str;
}

/// Object-safe view over any [`VersionedDocument`]
pub trait ConfigDocument: Any + Debug + Send + Sync {
    fn api_version(&self) -> &'static str;

    fn to_json(&self) -> Result<JsonValue>;

    fn to_yaml(&self) -> Result<String>;

    /// Deep-merge a raw patch over the document and re-read it
    fn apply_patch(&mut self, patch: &JsonValue) -> Result<()>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: VersionedDocument> ConfigDocument for T {
    fn api_version(&self) -> &'static str {
        T::API_VERSION
    }

    fn to_json(&self) -> Result<JsonValue> {
        Ok(serde_json::to_value(self)?)
    }

    fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    fn apply_patch(&mut self, patch: &JsonValue) -> Result<()> {
        let mut merged = serde_json::to_value(&*self)?;
        deep_merge(&mut merged, patch);
        *self = serde_json::from_value(merged)?;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Borrow a document as its concrete layout
pub fn downcast_ref<T: VersionedDocument>(doc: &dyn ConfigDocument) -> Result<&T> {
    doc.as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| CoreError::InvalidType {
            expected: T::API_VERSION.to_string(),
        })
}

/// Mutably borrow a document as its concrete layout
pub fn downcast_mut<T: VersionedDocument>(doc: &mut dyn ConfigDocument) -> Result<&mut T> {
    doc.as_any_mut()
        .downcast_mut::<T>()
        .ok_or_else(|| CoreError::InvalidType {
            expected: T::API_VERSION.to_string(),
        })
}

/// Config bytes as text, invalid UTF-8 is an error rather than replaced
pub fn decode_utf8(raw: &[u8]) -> Result<&str> {
    Ok(std::str::from_utf8(raw)?)
}

/// Parse raw YAML into a typed document.
///
/// In strict mode every key the target type does not consume is reported as
/// unknown, whatever its value.
pub fn parse_document<T: VersionedDocument>(raw: &[u8], strict: bool) -> Result<T> {
    let text = decode_utf8(raw)?;
    if text.trim().is_empty() {
        return Ok(T::default());
    }

    if !strict {
        return Ok(serde_yaml::from_str(text)?);
    }

    let mut unknown = Vec::new();
    let doc: T = serde_ignored::deserialize(serde_yaml::Deserializer::from_str(text), |path| {
        unknown.push(field_path(&path))
    })?;
    if !unknown.is_empty() {
        unknown.sort();
        return Err(CoreError::UnknownFields { fields: unknown });
    }
    Ok(doc)
}

/// `a.b[0].c` style path, skipping `Option` and newtype wrappers
fn field_path(path: &serde_ignored::Path<'_>) -> String {
    match path {
        serde_ignored::Path::Root => String::new(),
        serde_ignored::Path::Seq { parent, index } => {
            format!("{}[{}]", field_path(parent), index)
        }
        serde_ignored::Path::Map { parent, key } => {
            let parent = field_path(parent);
            if parent.is_empty() {
                key.clone()
            } else {
                format!("{}.{}", parent, key)
            }
        }
        serde_ignored::Path::Some { parent }
        | serde_ignored::Path::NewtypeStruct { parent }
        | serde_ignored::Path::NewtypeVariant { parent } => field_path(parent),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
    #[serde(default, rename_all = "camelCase")]
    struct Toy {
        api_version: String,
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        nested: Option<ToyNested>,
    }

    #[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
    #[serde(default)]
    struct ToyNested {
        enabled: bool,
    }

    impl VersionedDocument for Toy {
        const API_VERSION: &'static str = "toy";
    }

    #[test]
    fn test_parse_lenient_ignores_unknown() {
        let raw = b"apiVersion: toy\nname: demo\nbogus: 1\n";
        let doc: Toy = parse_document(raw, false).unwrap();
        assert_eq!(doc.name, "demo");
    }

    #[test]
    fn test_parse_strict_reports_unknown_paths() {
        let raw = b"apiVersion: toy\nbogus: 1\nnested:\n  enabled: true\n  extra: x\n";
        let err = parse_document::<Toy>(raw, true).unwrap_err();
        match err {
            CoreError::UnknownFields { fields } => {
                assert_eq!(fields, vec!["bogus".to_string(), "nested.extra".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_strict_ignores_null_values() {
        let raw = b"apiVersion: toy\nnested: null\n";
        let doc: Toy = parse_document(raw, true).unwrap();
        assert!(doc.nested.is_none());
    }

    #[test]
    fn test_parse_strict_reports_blank_unknown_values() {
        let raw = b"apiVersion: toy\nnmae: \"\"\nnested:\n  extra: {}\nlist: []\nnothing: null\n";
        match parse_document::<Toy>(raw, true).unwrap_err() {
            CoreError::UnknownFields { fields } => assert_eq!(
                fields,
                vec![
                    "list".to_string(),
                    "nested.extra".to_string(),
                    "nmae".to_string(),
                    "nothing".to_string(),
                ]
            ),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_rejects_invalid_utf8() {
        let raw = b"apiVersion: toy\nname: demo\xff\n";
        for strict in [true, false] {
            let err = parse_document::<Toy>(raw, strict).unwrap_err();
            assert!(matches!(err, CoreError::Encoding(_)), "{err}");
        }
    }

    #[test]
    fn test_empty_input_is_default() {
        let doc: Toy = parse_document(b"  \n", true).unwrap();
        assert_eq!(doc, Toy::default());
    }

    #[test]
    fn test_downcast() {
        let mut boxed: Box<dyn ConfigDocument> = Box::new(Toy::default());
        assert_eq!(boxed.api_version(), "toy");
        downcast_mut::<Toy>(boxed.as_mut()).unwrap().name = "x".into();
        assert_eq!(downcast_ref::<Toy>(boxed.as_ref()).unwrap().name, "x");
    }

    #[test]
    fn test_apply_patch_deep_merges() {
        let mut doc = Toy {
            name: "a".into(),
            ..Default::default()
        };
        doc.apply_patch(&serde_json::json!({"nested": {"enabled": true}}))
            .unwrap();
        assert_eq!(doc.name, "a");
        assert_eq!(doc.nested, Some(ToyNested { enabled: true }));
    }
}
