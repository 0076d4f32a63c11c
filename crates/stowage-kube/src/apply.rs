//! Server-side apply of rendered objects
//!
//! Objects are applied one by one, in the order given, using Server-Side
//! Apply with a constant field manager. Resource types are resolved through
//! cached discovery so no compile-time type knowledge is needed.

use kube::{
    Client,
    api::{Api, DynamicObject, Patch, PatchParams},
    core::GroupVersionKind,
    discovery::{ApiCapabilities, ApiResource, Discovery, Scope},
};
use std::time::Duration;
use tracing::{debug, info};

use stowage_engine::RenderedObject;

use crate::error::{KubeError, Result};

/// Field manager name for Server-Side Apply
pub const FIELD_MANAGER: &str = "stowage";

/// Per-object timeout when none is given
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of applying a single object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyResult {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    /// `None` for cluster-scoped objects
    pub namespace: Option<String>,
}

/// An object resolved against discovery, ready to patch
#[derive(Debug, Clone)]
struct ResolvedObject {
    obj: DynamicObject,
    api_resource: ApiResource,
}

pub struct Applier {
    client: Client,
    discovery: Discovery,
    /// Namespace for namespaced objects that do not set one
    namespace: String,
}

impl Applier {
    /// Create an applier, running discovery once
    pub async fn new(client: Client, namespace: &str) -> Result<Self> {
        let discovery = Discovery::new(client.clone()).run().await?;
        Ok(Self::with_discovery(client, discovery, namespace))
    }

    /// Create from an existing client and discovery (for reuse)
    pub fn with_discovery(client: Client, discovery: Discovery, namespace: &str) -> Self {
        Self {
            client,
            discovery,
            namespace: namespace.to_string(),
        }
    }

    /// Refresh the discovery cache, needed after new CRDs are established
    pub async fn refresh_discovery(&mut self) -> Result<()> {
        self.discovery = Discovery::new(self.client.clone()).run().await?;
        Ok(())
    }

    fn resolve(&self, object: &RenderedObject) -> Result<ResolvedObject> {
        resolve_with(object, &self.namespace, |gvk| self.discovery.resolve_gvk(gvk))
    }

    fn api_for(&self, resolved: &ResolvedObject) -> Api<DynamicObject> {
        match &resolved.obj.metadata.namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &resolved.api_resource),
            None => Api::all_with(self.client.clone(), &resolved.api_resource),
        }
    }

    /// Apply one object, bounded by `timeout`
    pub async fn apply(&self, object: &RenderedObject, timeout: Duration) -> Result<ApplyResult> {
        let resolved = self.resolve(object)?;
        let api = self.api_for(&resolved);

        let mut params = PatchParams::apply(FIELD_MANAGER);
        params.force = true; // Take ownership of fields

        debug!(object = %object.display_name(), "applying");
        bounded(
            timeout,
            api.patch(&object.name, &params, &Patch::Apply(&resolved.obj)),
        )
        .await?;

        Ok(ApplyResult {
            api_version: object.api_version.clone(),
            kind: object.kind.clone(),
            name: object.name.clone(),
            namespace: resolved.obj.metadata.namespace.clone(),
        })
    }

    /// Apply every object in order, stopping at the first failure.
    ///
    /// Discovery is refreshed once when a type is unknown after a CRD has
    /// been applied in the same run.
    pub async fn apply_all(
        &mut self,
        objects: &[RenderedObject],
        timeout: Duration,
    ) -> Result<Vec<ApplyResult>> {
        apply_sequence(self, objects, timeout).await
    }
}

/// One apply call plus the discovery refresh the sequence may ask for
trait ApplyStep {
    async fn apply_one(&self, object: &RenderedObject, timeout: Duration) -> Result<ApplyResult>;

    async fn refresh(&mut self) -> Result<()>;
}

impl ApplyStep for Applier {
    async fn apply_one(&self, object: &RenderedObject, timeout: Duration) -> Result<ApplyResult> {
        self.apply(object, timeout).await
    }

    async fn refresh(&mut self) -> Result<()> {
        self.refresh_discovery().await
    }
}

async fn apply_sequence<S: ApplyStep>(
    step: &mut S,
    objects: &[RenderedObject],
    timeout: Duration,
) -> Result<Vec<ApplyResult>> {
    let total = objects.len();
    let mut results = Vec::with_capacity(total);
    let mut crds_applied = false;

    for (index, object) in objects.iter().enumerate() {
        let mut outcome = step.apply_one(object, timeout).await;
        if crds_applied && matches!(outcome, Err(KubeError::UnknownResourceType { .. })) {
            debug!(object = %object.display_name(), "refreshing discovery");
            step.refresh().await?;
            crds_applied = false;
            outcome = step.apply_one(object, timeout).await;
        }

        let result = outcome.map_err(|e| KubeError::ClusterApplyFailed {
            resource: object.display_name(),
            index: index + 1,
            total,
            source: Box::new(e),
        })?;
        crds_applied |= is_crd(&object.kind);
        results.push(result);
    }

    info!(objects = results.len(), "applied");
    Ok(results)
}

/// Resolve the type first, then decode the body and settle its namespace
fn resolve_with<F>(object: &RenderedObject, default_namespace: &str, lookup: F) -> Result<ResolvedObject>
where
    F: FnOnce(&GroupVersionKind) -> Option<(ApiResource, ApiCapabilities)>,
{
    let gvk = gvk_from_parts(&object.api_version, &object.kind);
    let (api_resource, capabilities) =
        lookup(&gvk).ok_or_else(|| KubeError::UnknownResourceType {
            api_version: object.api_version.clone(),
            kind: object.kind.clone(),
        })?;

    let mut obj = decode(object)?;
    obj.metadata.namespace = target_namespace(
        &capabilities.scope,
        obj.metadata.namespace.as_deref(),
        default_namespace,
    );

    Ok(ResolvedObject { obj, api_resource })
}

/// Namespace to apply into: namespaced objects default to the install
/// namespace, cluster-scoped objects have none
fn target_namespace(scope: &Scope, object_ns: Option<&str>, default: &str) -> Option<String> {
    match scope {
        Scope::Namespaced => Some(object_ns.unwrap_or(default).to_string()),
        Scope::Cluster => None,
    }
}

/// Run an API call, mapping an elapsed deadline to [`KubeError::Timeout`]
async fn bounded<T, F>(timeout: Duration, call: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, kube::Error>>,
{
    tokio::time::timeout(timeout, call)
        .await
        .map_err(|_| KubeError::Timeout(timeout))?
        .map_err(KubeError::from)
}

pub fn is_crd(kind: &str) -> bool {
    kind == "CustomResourceDefinition"
}

/// Decode a rendered object into a `DynamicObject`
fn decode(object: &RenderedObject) -> Result<DynamicObject> {
    serde_yaml::from_str(&object.content).map_err(|e| KubeError::MalformedManifest {
        resource: object.display_name(),
        message: e.to_string(),
    })
}

/// Split an apiVersion/kind pair into a GroupVersionKind
///
/// - "apps/v1" -> group="apps", version="v1"
/// - "v1" -> group="", version="v1" (core API)
fn gvk_from_parts(api_version: &str, kind: &str) -> GroupVersionKind {
    let (group, version) = match api_version.rsplit_once('/') {
        Some((g, v)) => (g.to_string(), v.to_string()),
        None => (String::new(), api_version.to_string()),
    };

    GroupVersionKind {
        group,
        version,
        kind: kind.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stowage_engine::materialize;

    fn object(api_version: &str, kind: &str, name: &str) -> RenderedObject {
        RenderedObject {
            api_version: api_version.into(),
            kind: kind.into(),
            name: name.into(),
            content: format!("apiVersion: {api_version}\nkind: {kind}\nmetadata:\n  name: {name}\n"),
        }
    }

    /// Applies everything except objects named `broken`; custom `Widget`s
    /// are unknown until discovery is refreshed
    #[derive(Default)]
    struct Scripted {
        refreshed: usize,
    }

    impl ApplyStep for Scripted {
        async fn apply_one(&self, object: &RenderedObject, timeout: Duration) -> Result<ApplyResult> {
            if object.name == "broken" {
                return Err(KubeError::Timeout(timeout));
            }
            if object.kind == "Widget" && self.refreshed == 0 {
                return Err(KubeError::UnknownResourceType {
                    api_version: object.api_version.clone(),
                    kind: object.kind.clone(),
                });
            }
            Ok(ApplyResult {
                api_version: object.api_version.clone(),
                kind: object.kind.clone(),
                name: object.name.clone(),
                namespace: None,
            })
        }

        async fn refresh(&mut self) -> Result<()> {
            self.refreshed += 1;
            Ok(())
        }
    }

    #[test]
    fn test_gvk_from_parts() {
        let gvk = gvk_from_parts("apps/v1", "Deployment");
        assert_eq!(gvk.group, "apps");
        assert_eq!(gvk.version, "v1");
        assert_eq!(gvk.kind, "Deployment");

        let gvk_core = gvk_from_parts("v1", "ConfigMap");
        assert_eq!(gvk_core.group, "");
        assert_eq!(gvk_core.version, "v1");
    }

    #[test]
    fn test_gvk_from_parts_dotted_group() {
        let gvk = gvk_from_parts("rbac.authorization.k8s.io/v1", "ClusterRole");
        assert_eq!(gvk.group, "rbac.authorization.k8s.io");
        assert_eq!(gvk.version, "v1");
    }

    #[test]
    fn test_target_namespace() {
        assert_eq!(
            target_namespace(&Scope::Namespaced, None, "stowage").as_deref(),
            Some("stowage")
        );
        assert_eq!(
            target_namespace(&Scope::Namespaced, Some("other"), "stowage").as_deref(),
            Some("other")
        );
        assert_eq!(target_namespace(&Scope::Cluster, Some("other"), "stowage"), None);
        assert_eq!(target_namespace(&Scope::Cluster, None, "stowage"), None);
    }

    #[tokio::test]
    async fn test_bounded_maps_elapsed_deadline() {
        let timeout = Duration::from_millis(10);
        let err = bounded(timeout, std::future::pending::<std::result::Result<(), kube::Error>>())
            .await
            .unwrap_err();
        assert!(matches!(err, KubeError::Timeout(t) if t == timeout));

        let ok = bounded(timeout, async { Ok::<_, kube::Error>(7) }).await.unwrap();
        assert_eq!(ok, 7);
    }

    #[tokio::test]
    async fn test_sequence_failure_carries_position() {
        let objects = vec![
            object("v1", "ServiceAccount", "server"),
            object("v1", "ConfigMap", "server"),
            object("v1", "ConfigMap", "broken"),
            object("apps/v1", "Deployment", "server"),
        ];
        let mut step = Scripted::default();
        let err = apply_sequence(&mut step, &objects, DEFAULT_TIMEOUT)
            .await
            .unwrap_err();
        match err {
            KubeError::ClusterApplyFailed {
                resource,
                index,
                total,
                source,
            } => {
                assert_eq!(resource, "v1/ConfigMap broken");
                assert_eq!(index, 3);
                assert_eq!(total, 4);
                assert!(matches!(*source, KubeError::Timeout(_)));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_sequence_refreshes_discovery_after_crd() {
        let objects = vec![
            object("apiextensions.k8s.io/v1", "CustomResourceDefinition", "widgets.example.com"),
            object("example.com/v1", "Widget", "first"),
            object("example.com/v1", "Widget", "second"),
        ];
        let mut step = Scripted::default();
        let results = apply_sequence(&mut step, &objects, DEFAULT_TIMEOUT)
            .await
            .unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(step.refreshed, 1);
    }

    #[tokio::test]
    async fn test_sequence_unknown_type_without_crd_fails() {
        let objects = vec![object("example.com/v1", "Widget", "first")];
        let mut step = Scripted::default();
        let err = apply_sequence(&mut step, &objects, DEFAULT_TIMEOUT)
            .await
            .unwrap_err();
        assert_eq!(step.refreshed, 0);
        match err {
            KubeError::ClusterApplyFailed { index, source, .. } => {
                assert_eq!(index, 1);
                assert!(matches!(*source, KubeError::UnknownResourceType { .. }));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_type_reported_before_body_is_decoded() {
        let mut widget = object("example.com/v1", "Widget", "first");
        widget.content = "apiVersion: example.com/v1\nkind: Widget\nmetadata: [1, 2]\n".into();
        match resolve_with(&widget, "stowage", |_| None) {
            Err(KubeError::UnknownResourceType { api_version, kind }) => {
                assert_eq!(api_version, "example.com/v1");
                assert_eq!(kind, "Widget");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_decode() {
        let objects = materialize(&[
            "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: server\ndata:\n  a: b\n",
        ])
        .unwrap();
        let obj = decode(&objects[0]).unwrap();
        assert_eq!(obj.metadata.name.as_deref(), Some("server"));
        assert_eq!(obj.types.unwrap().kind, "ConfigMap");
        assert_eq!(obj.data["data"]["a"], "b");
    }

    #[test]
    fn test_decode_malformed() {
        let object = RenderedObject {
            api_version: "v1".into(),
            kind: "ConfigMap".into(),
            name: "broken".into(),
            content: "apiVersion: v1\nkind: ConfigMap\nmetadata: [1, 2]\n".into(),
        };
        match decode(&object) {
            Err(KubeError::MalformedManifest { resource, .. }) => {
                assert_eq!(resource, "v1/ConfigMap broken")
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_is_crd() {
        assert!(is_crd("CustomResourceDefinition"));
        assert!(!is_crd("Deployment"));
    }
}
