//! Forward-only migrations between config versions

use std::collections::{BTreeMap, VecDeque};
use tracing::{debug, info};

use crate::config::{ConfigDocument, VersionedDocument, downcast_mut, downcast_ref};
use crate::error::{CoreError, Result};
use crate::registry::VersionRegistry;
use crate::versions::{v1, v1alpha1};

type MigrationFn =
    Box<dyn Fn(&dyn ConfigDocument, &mut dyn ConfigDocument) -> Result<()> + Send + Sync>;

struct MigrationEdge {
    from: String,
    to: String,
    apply: MigrationFn,
}

/// Directed graph of migration edges
#[derive(Default)]
pub struct MigrationGraph {
    edges: Vec<MigrationEdge>,
}

impl MigrationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every edge shipped with this build
    pub fn builtin() -> Result<Self> {
        let mut graph = Self::new();
        graph.add_typed_migration::<v1alpha1::Config, v1::Config>(v1alpha1::migrate_to_v1)?;
        Ok(graph)
    }

    /// Register one edge. The destination handed to `apply` has already
    /// been through `factory()` and `defaults()`.
    pub fn add_migration<F>(&mut self, from: &str, to: &str, apply: F) -> Result<()>
    where
        F: Fn(&dyn ConfigDocument, &mut dyn ConfigDocument) -> Result<()> + Send + Sync + 'static,
    {
        if self.edges.iter().any(|e| e.from == from && e.to == to) {
            return Err(CoreError::DuplicateMigration {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        self.edges.push(MigrationEdge {
            from: from.to_string(),
            to: to.to_string(),
            apply: Box::new(apply),
        });
        Ok(())
    }

    /// Register an edge between two concrete layouts
    pub fn add_typed_migration<O, N>(&mut self, apply: fn(&O, &mut N) -> Result<()>) -> Result<()>
    where
        O: VersionedDocument,
        N: VersionedDocument,
    {
        self.add_migration(O::API_VERSION, N::API_VERSION, move |old, new| {
            apply(downcast_ref::<O>(old)?, downcast_mut::<N>(new)?)
        })
    }

    /// Breadth-first path of edge indices, edges tried in insertion order
    fn path(&self, from: &str, to: &str) -> Option<Vec<usize>> {
        if from == to {
            return Some(Vec::new());
        }

        let mut previous: BTreeMap<&str, usize> = BTreeMap::new();
        let mut queue = VecDeque::from([from]);

        while let Some(node) = queue.pop_front() {
            for (idx, edge) in self.edges.iter().enumerate() {
                if edge.from != node || edge.to == from || previous.contains_key(edge.to.as_str()) {
                    continue;
                }
                previous.insert(edge.to.as_str(), idx);
                if edge.to == to {
                    let mut path = vec![idx];
                    let mut cursor = self.edges[idx].from.as_str();
                    while cursor != from {
                        let step = previous.get(cursor).copied()?;
                        path.push(step);
                        cursor = self.edges[step].from.as_str();
                    }
                    path.reverse();
                    return Some(path);
                }
                queue.push_back(edge.to.as_str());
            }
        }

        None
    }

    pub fn has_path(&self, from: &str, to: &str) -> bool {
        self.path(from, to).is_some()
    }

    /// The version ids a document passes through on its way to `to`
    pub fn route(&self, from: &str, to: &str) -> Result<Vec<String>> {
        let path = self.path(from, to).ok_or_else(|| CoreError::NoMigrationPath {
            from: from.to_string(),
            to: to.to_string(),
        })?;
        let mut route = vec![from.to_string()];
        route.extend(path.iter().map(|&idx| self.edges[idx].to.clone()));
        Ok(route)
    }

    /// Migrate `old` from version `from` up to version `to`
    pub fn migrate(
        &self,
        registry: &VersionRegistry,
        from: &str,
        to: &str,
        old: Box<dyn ConfigDocument>,
    ) -> Result<Box<dyn ConfigDocument>> {
        registry.resolve(from)?;
        registry.resolve(to)?;

        let path = self.path(from, to).ok_or_else(|| CoreError::NoMigrationPath {
            from: from.to_string(),
            to: to.to_string(),
        })?;

        let mut current = old;
        for idx in path {
            let edge = &self.edges[idx];
            debug!(from = %edge.from, to = %edge.to, "applying config migration");

            let target = registry.resolve(&edge.to)?;
            let mut next = target.factory();
            target.defaults(next.as_mut())?;
            (edge.apply)(current.as_ref(), next.as_mut()).map_err(|e| {
                CoreError::MigrationFailed {
                    from: edge.from.clone(),
                    to: edge.to.clone(),
                    message: e.to_string(),
                }
            })?;
            current = next;
        }

        info!(from, to, "migrated config");
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_document;
    use crate::version::ConfigVersion;
    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct V0 {
        name: String,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct V1 {
        title: String,
        replicas: u32,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct V2 {
        title: String,
        replicas: u32,
        history: Vec<String>,
    }

    impl VersionedDocument for V0 {
        const API_VERSION: &'static str = "v0";
    }
    impl VersionedDocument for V1 {
        const API_VERSION: &'static str = "v1";
    }
    impl VersionedDocument for V2 {
        const API_VERSION: &'static str = "v2";
    }

    struct Toy<T>(std::marker::PhantomData<T>);

    #[async_trait]
    impl<T: VersionedDocument> ConfigVersion for Toy<T> {
        fn id(&self) -> &'static str {
            T::API_VERSION
        }

        fn factory(&self) -> Box<dyn ConfigDocument> {
            Box::new(T::default())
        }

        fn load(&self, raw: &[u8], strict: bool) -> Result<Box<dyn ConfigDocument>> {
            Ok(Box::new(parse_document::<T>(raw, strict)?))
        }

        fn defaults(&self, cfg: &mut dyn ConfigDocument) -> Result<()> {
            if let Some(v1) = cfg.as_any_mut().downcast_mut::<V1>() {
                v1.replicas = 1;
            }
            Ok(())
        }
    }

    fn toy<T: VersionedDocument>() -> Toy<T> {
        Toy(std::marker::PhantomData)
    }

    fn setup() -> (VersionRegistry, MigrationGraph) {
        let mut registry = VersionRegistry::new("v2");
        registry.add_version(toy::<V0>()).unwrap();
        registry.add_version(toy::<V1>()).unwrap();
        registry.add_version(toy::<V2>()).unwrap();

        let mut graph = MigrationGraph::new();
        graph
            .add_typed_migration::<V0, V1>(|old, new| {
                new.title = old.name.clone();
                Ok(())
            })
            .unwrap();
        graph
            .add_typed_migration::<V1, V2>(|old, new| {
                new.title = old.title.to_uppercase();
                new.replicas = old.replicas;
                new.history.push("v1".into());
                Ok(())
            })
            .unwrap();
        (registry, graph)
    }

    #[test]
    fn test_migrations_compose() {
        let (registry, graph) = setup();
        let old: Box<dyn ConfigDocument> = Box::new(V0 { name: "demo".into() });

        let migrated = graph.migrate(&registry, "v0", "v2", old).unwrap();
        let v2 = downcast_ref::<V2>(migrated.as_ref()).unwrap();

        assert_eq!(v2.title, "DEMO");
        // replicas came from v1 defaults on the intermediate document
        assert_eq!(v2.replicas, 1);
        assert_eq!(v2.history, vec!["v1"]);
    }

    #[test]
    fn test_every_version_reaches_current() {
        let (registry, graph) = setup();
        for id in registry.ids() {
            assert!(graph.has_path(&id, "v2"), "{id} cannot reach v2");
        }
        assert_eq!(graph.route("v0", "v2").unwrap(), vec!["v0", "v1", "v2"]);
    }

    #[test]
    fn test_no_backwards_path() {
        let (registry, graph) = setup();
        let doc: Box<dyn ConfigDocument> = Box::new(V2::default());
        let err = graph.migrate(&registry, "v2", "v0", doc).err().unwrap();
        assert!(matches!(err, CoreError::NoMigrationPath { .. }));
    }

    #[test]
    fn test_unknown_version() {
        let (registry, graph) = setup();
        let doc: Box<dyn ConfigDocument> = Box::new(V0::default());
        let err = graph.migrate(&registry, "v9", "v2", doc).err().unwrap();
        assert!(matches!(err, CoreError::UnknownVersion { .. }));
    }

    #[test]
    fn test_failing_edge_names_versions() {
        let mut registry = VersionRegistry::new("v1");
        registry.add_version(toy::<V0>()).unwrap();
        registry.add_version(toy::<V1>()).unwrap();
        let mut graph = MigrationGraph::new();
        graph
            .add_migration("v0", "v1", |_, _| {
                Err(CoreError::MissingField {
                    field: "name".into(),
                })
            })
            .unwrap();

        let doc: Box<dyn ConfigDocument> = Box::new(V0::default());
        let err = graph.migrate(&registry, "v0", "v1", doc).err().unwrap();
        match err {
            CoreError::MigrationFailed { from, to, message } => {
                assert_eq!((from.as_str(), to.as_str()), ("v0", "v1"));
                assert!(message.contains("name"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_duplicate_edge_rejected() {
        let (_, mut graph) = setup();
        let err = graph.add_migration("v0", "v1", |_, _| Ok(())).unwrap_err();
        assert!(matches!(err, CoreError::DuplicateMigration { .. }));
    }

    #[test]
    fn test_builtin_graph_reaches_v1() {
        let graph = MigrationGraph::builtin().unwrap();
        assert!(graph.has_path(v1alpha1::API_VERSION, v1::API_VERSION));
    }
}
