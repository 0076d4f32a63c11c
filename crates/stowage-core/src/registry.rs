//! Registry of known config versions

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{CoreError, Result};
use crate::version::ConfigVersion;
use crate::versions::{v1, v1alpha1};

pub struct VersionRegistry {
    versions: BTreeMap<String, Arc<dyn ConfigVersion>>,
    current: String,
}

impl VersionRegistry {
    /// An empty registry whose latest version is `current`
    pub fn new(current: impl Into<String>) -> Self {
        Self {
            versions: BTreeMap::new(),
            current: current.into(),
        }
    }

    /// Every version this build understands, `v1` being current
    pub fn builtin() -> Result<Self> {
        let mut registry = Self::new(v1::API_VERSION);
        registry.add_version(v1alpha1::Version)?;
        registry.add_version(v1::Version)?;
        Ok(registry)
    }

    pub fn add_version(&mut self, version: impl ConfigVersion + 'static) -> Result<()> {
        let id = version.id().to_string();
        if self.versions.contains_key(&id) {
            return Err(CoreError::DuplicateVersion { version: id });
        }
        self.versions.insert(id, Arc::new(version));
        Ok(())
    }

    pub fn resolve(&self, id: &str) -> Result<Arc<dyn ConfigVersion>> {
        self.versions
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::UnknownVersion {
                version: id.to_string(),
                known: self.ids(),
            })
    }

    pub fn current_id(&self) -> &str {
        &self.current
    }

    pub fn current(&self) -> Result<Arc<dyn ConfigVersion>> {
        self.resolve(&self.current)
    }

    pub fn ids(&self) -> Vec<String> {
        self.versions.keys().cloned().collect()
    }
}
