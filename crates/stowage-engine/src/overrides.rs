//! Post-sort override stage
//!
//! Overrides rewrite sorted objects in place. They may change content but
//! never the order.

use regex::Regex;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use tracing::debug;

use stowage_core::deep_merge;
use stowage_core::versions::v1::Customization;
use stowage_core::versions::v1::experimental::ObjectPatch;

use crate::context::RenderContext;
use crate::error::{EngineError, Result};
use crate::objects::RenderedObject;

pub trait ObjectOverride {
    fn name(&self) -> &str;

    fn apply(&self, objects: &mut [RenderedObject]) -> Result<()>;
}

/// Overrides configured for this render, in application order
pub fn overrides_for(ctx: &RenderContext) -> Result<Vec<Box<dyn ObjectOverride>>> {
    Ok(vec![
        Box::new(CustomizationOverride::from_context(ctx)?),
        Box::new(ExperimentalPatchOverride::from_context(ctx)),
    ])
}

/// Run every override over the sorted objects
pub fn apply_overrides(
    overrides: &[Box<dyn ObjectOverride>],
    objects: &mut [RenderedObject],
) -> Result<()> {
    for stage in overrides {
        debug!(stage = stage.name(), "applying override");
        stage.apply(objects)?;
    }
    Ok(())
}

/// `*` matches any run of characters, everything else is literal
fn wildcard(pattern: &str) -> Result<Regex> {
    let escaped = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    Regex::new(&format!("^{}$", escaped)).map_err(|e| EngineError::Override {
        name: "customization".to_string(),
        message: format!("invalid pattern '{}': {}", pattern, e),
    })
}

struct CustomizationRule {
    api_version: Regex,
    kind: Regex,
    name: Regex,
    labels: BTreeMap<String, String>,
    annotations: BTreeMap<String, String>,
}

impl CustomizationRule {
    fn new(c: &Customization) -> Result<Self> {
        let pattern = |s: &str| if s.is_empty() { wildcard("*") } else { wildcard(s) };
        Ok(Self {
            api_version: pattern(&c.api_version)?,
            kind: pattern(&c.kind)?,
            name: pattern(&c.metadata.name)?,
            labels: c.metadata.labels.clone(),
            annotations: c.metadata.annotations.clone(),
        })
    }

    fn matches(&self, object: &RenderedObject) -> bool {
        self.api_version.is_match(&object.api_version)
            && self.kind.is_match(&object.kind)
            && self.name.is_match(&object.name)
    }
}

/// Labels and annotations from the config's `customization` list.
///
/// Keys already set on an object are kept, so selectors stay intact. Pod
/// templates of workloads receive the same metadata.
pub struct CustomizationOverride {
    rules: Vec<CustomizationRule>,
}

impl CustomizationOverride {
    pub fn new(customizations: &[Customization]) -> Result<Self> {
        Ok(Self {
            rules: customizations
                .iter()
                .map(CustomizationRule::new)
                .collect::<Result<_>>()?,
        })
    }

    pub fn from_context(ctx: &RenderContext) -> Result<Self> {
        Self::new(ctx.config().customization.as_deref().unwrap_or_default())
    }
}

fn merge_missing(target: &mut JsonValue, entries: &BTreeMap<String, String>) {
    if entries.is_empty() {
        return;
    }
    if !target.is_object() {
        *target = JsonValue::Object(Default::default());
    }
    if let Some(map) = target.as_object_mut() {
        for (key, value) in entries {
            map.entry(key.clone())
                .or_insert_with(|| JsonValue::String(value.clone()));
        }
    }
}

fn customize_metadata(metadata: &mut JsonValue, rule: &CustomizationRule) {
    if !metadata.is_object() {
        *metadata = JsonValue::Object(Default::default());
    }
    merge_missing(&mut metadata["labels"], &rule.labels);
    merge_missing(&mut metadata["annotations"], &rule.annotations);
}

impl ObjectOverride for CustomizationOverride {
    fn name(&self) -> &str {
        "customization"
    }

    fn apply(&self, objects: &mut [RenderedObject]) -> Result<()> {
        if self.rules.is_empty() {
            return Ok(());
        }

        for object in objects.iter_mut() {
            let rules: Vec<&CustomizationRule> =
                self.rules.iter().filter(|r| r.matches(object)).collect();
            if rules.is_empty() {
                continue;
            }

            let mut value = object.value()?;
            let has_pod_template = value["spec"]["template"].is_object();
            for rule in rules {
                customize_metadata(&mut value["metadata"], rule);
                if has_pod_template {
                    customize_metadata(&mut value["spec"]["template"]["metadata"], rule);
                }
            }
            object.set_value(&value)?;
        }
        Ok(())
    }
}

/// Raw patches from `experimental.overrides`, deep-merged into matching
/// objects
pub struct ExperimentalPatchOverride {
    patches: Vec<ObjectPatch>,
}

impl ExperimentalPatchOverride {
    pub fn new(patches: Vec<ObjectPatch>) -> Self {
        Self { patches }
    }

    pub fn from_context(ctx: &RenderContext) -> Self {
        Self::new(
            ctx.with_experimental(|exp| Some(exp.overrides.clone()))
                .unwrap_or_default(),
        )
    }

    fn matches(patch: &ObjectPatch, object: &RenderedObject) -> bool {
        (patch.api_version.is_empty() || patch.api_version == object.api_version)
            && patch.kind == object.kind
            && patch.name == object.name
    }
}

impl ObjectOverride for ExperimentalPatchOverride {
    fn name(&self) -> &str {
        "experimental-patches"
    }

    fn apply(&self, objects: &mut [RenderedObject]) -> Result<()> {
        for patch in &self.patches {
            if !patch.patch.is_object() {
                return Err(EngineError::Override {
                    name: self.name().to_string(),
                    message: format!("patch for {} {} is not a mapping", patch.kind, patch.name),
                });
            }

            let mut matched = false;
            for object in objects.iter_mut().filter(|o| Self::matches(patch, o)) {
                let mut value = object.value()?;
                deep_merge(&mut value, &patch.patch);
                object.set_value(&value)?;
                matched = true;
            }
            if !matched {
                debug!(kind = %patch.kind, name = %patch.name, "override matched no object");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::materialize;
    use serde_json::json;
    use stowage_core::versions::v1::CustomizationMetadata;

    fn objects() -> Vec<RenderedObject> {
        materialize(&[
            "apiVersion: v1\nkind: Service\nmetadata:\n  name: proxy\n  labels:\n    app: stowage\n",
            "apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: server\nspec:\n  template:\n    metadata:\n      labels:\n        component: server\n",
        ])
        .unwrap()
    }

    fn customization(kind: &str, name: &str) -> Customization {
        Customization {
            api_version: "*".into(),
            kind: kind.into(),
            metadata: CustomizationMetadata {
                name: name.into(),
                labels: BTreeMap::from([
                    ("team".to_string(), "infra".to_string()),
                    ("app".to_string(), "overridden".to_string()),
                ]),
                annotations: BTreeMap::from([("owner".to_string(), "ops".to_string())]),
            },
        }
    }

    #[test]
    fn test_wildcard() {
        let re = wildcard("ser*").unwrap();
        assert!(re.is_match("server"));
        assert!(!re.is_match("proxy"));
        assert!(wildcard("a.b").unwrap().is_match("a.b"));
        assert!(!wildcard("a.b").unwrap().is_match("axb"));
    }

    #[test]
    fn test_customization_adds_missing_metadata() {
        let mut objs = objects();
        let stage = CustomizationOverride::new(&[customization("*", "*")]).unwrap();
        stage.apply(&mut objs).unwrap();

        let svc = objs[0].value().unwrap();
        assert_eq!(svc["metadata"]["labels"]["team"], json!("infra"));
        assert_eq!(svc["metadata"]["labels"]["app"], json!("stowage"));
        assert_eq!(svc["metadata"]["annotations"]["owner"], json!("ops"));

        let deploy = objs[1].value().unwrap();
        assert_eq!(deploy["spec"]["template"]["metadata"]["labels"]["team"], json!("infra"));
        assert_eq!(
            deploy["spec"]["template"]["metadata"]["labels"]["component"],
            json!("server")
        );
    }

    #[test]
    fn test_customization_respects_kind_and_name() {
        let mut objs = objects();
        let stage = CustomizationOverride::new(&[customization("Deployment", "serv*")]).unwrap();
        stage.apply(&mut objs).unwrap();

        assert!(objs[0].value().unwrap()["metadata"]["labels"]["team"].is_null());
        assert_eq!(
            objs[1].value().unwrap()["metadata"]["labels"]["team"],
            json!("infra")
        );
    }

    #[test]
    fn test_experimental_patch() {
        let mut objs = objects();
        let before = objs.iter().map(|o| o.display_name()).collect::<Vec<_>>();
        let stage = ExperimentalPatchOverride::new(vec![ObjectPatch {
            api_version: String::new(),
            kind: "Deployment".into(),
            name: "server".into(),
            patch: json!({"spec": {"replicas": 3}}),
        }]);
        stage.apply(&mut objs).unwrap();

        let after = objs.iter().map(|o| o.display_name()).collect::<Vec<_>>();
        assert_eq!(before, after);
        let deploy = objs[1].value().unwrap();
        assert_eq!(deploy["spec"]["replicas"], json!(3));
        assert_eq!(
            deploy["spec"]["template"]["metadata"]["labels"]["component"],
            json!("server")
        );
    }

    #[test]
    fn test_experimental_patch_must_be_mapping() {
        let mut objs = objects();
        let stage = ExperimentalPatchOverride::new(vec![ObjectPatch {
            kind: "Service".into(),
            name: "proxy".into(),
            patch: json!([1, 2]),
            ..Default::default()
        }]);
        assert!(matches!(
            stage.apply(&mut objs),
            Err(EngineError::Override { .. })
        ));
    }
}
