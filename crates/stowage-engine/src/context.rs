//! Render context handed to every producer

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use stowage_core::versions::v1::Config;
use stowage_core::versions::v1::experimental::Experimental;
use stowage_core::{SecretCharset, random_string};

/// Fallback tag when a component has no pinned version
pub const DEFAULT_VERSION: &str = "latest";

/// Image tags per component
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VersionManifest {
    pub version: String,
    pub components: BTreeMap<String, ComponentVersion>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentVersion {
    pub version: String,
}

impl Default for VersionManifest {
    fn default() -> Self {
        Self {
            version: DEFAULT_VERSION.to_string(),
            components: BTreeMap::new(),
        }
    }
}

impl VersionManifest {
    /// Every component at the same tag
    pub fn uniform(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            components: BTreeMap::new(),
        }
    }

    pub fn with_component(mut self, name: &str, version: &str) -> Self {
        self.components.insert(
            name.to_string(),
            ComponentVersion {
                version: version.to_string(),
            },
        );
        self
    }

    /// Pinned version of a component, the release version otherwise
    pub fn component_version(&self, name: &str) -> &str {
        self.components
            .get(name)
            .map(|c| c.version.as_str())
            .filter(|v| !v.is_empty())
            .unwrap_or(&self.version)
    }
}

/// Secrets generated once per render and shared by every producer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedValues {
    pub storage_access_key: String,
    pub storage_secret_key: String,
    pub registry_username: String,
    pub registry_password: String,
    pub message_bus_password: String,
}

impl GeneratedValues {
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut cookie_safe =
            |len: usize| random_string(&mut *rng, len, SecretCharset::CookieSafe);
        Self {
            storage_access_key: cookie_safe(20),
            storage_secret_key: cookie_safe(40),
            registry_username: cookie_safe(20),
            registry_password: cookie_safe(20),
            message_bus_password: cookie_safe(20),
        }
    }
}

/// Everything a producer may read.
///
/// The experimental section is moved out of the config on construction and is
/// only reachable through [`RenderContext::with_experimental`].
#[derive(Debug, Clone)]
pub struct RenderContext {
    config: Config,
    version_manifest: VersionManifest,
    namespace: String,
    generated: GeneratedValues,
    experimental: Option<Experimental>,
}

impl RenderContext {
    pub fn new(config: Config, version_manifest: VersionManifest, namespace: &str) -> Self {
        let generated = GeneratedValues::generate(&mut rand::rng());
        Self::with_generated(config, version_manifest, namespace, generated)
    }

    /// Build a context around pre-computed values, for reproducible renders
    pub fn with_generated(
        mut config: Config,
        version_manifest: VersionManifest,
        namespace: &str,
        generated: GeneratedValues,
    ) -> Self {
        let experimental = config.experimental.take();
        Self {
            config,
            version_manifest,
            namespace: namespace.to_string(),
            generated,
            experimental,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn version_manifest(&self) -> &VersionManifest {
        &self.version_manifest
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn generated(&self) -> &GeneratedValues {
        &self.generated
    }

    /// Read experimental settings, `None` when there are none
    pub fn with_experimental<'a, T>(
        &'a self,
        f: impl FnOnce(&'a Experimental) -> Option<T>,
    ) -> Option<T> {
        self.experimental.as_ref().and_then(f)
    }

    /// `repo/name:tag`, or `name:tag` rooted at the configured repository
    /// when `dropImageRepo` is set
    pub fn image_name(&self, repo: &str, name: &str, tag: &str) -> String {
        let drop_repo = self.config.drop_image_repo.unwrap_or(false);
        let repo = if drop_repo {
            self.config.repository.as_str()
        } else {
            repo
        };
        let name = if drop_repo {
            name.rsplit('/').next().unwrap_or(name)
        } else {
            name
        };

        let repo = repo.trim_end_matches('/');
        if repo.is_empty() {
            format!("{}:{}", name, tag)
        } else {
            format!("{}/{}:{}", repo, name, tag)
        }
    }

    /// Image of a first-party component at its pinned version
    pub fn component_image(&self, component: &str) -> String {
        self.image_name(
            &self.config.repository,
            component,
            self.version_manifest.component_version(component),
        )
    }

    /// Replica count, overridable through `experimental.common.podConfig`
    pub fn replicas(&self, component: &str) -> i32 {
        self.with_experimental(|exp| {
            exp.common
                .as_ref()?
                .pod_config
                .get(component)?
                .replicas
        })
        .unwrap_or(1)
    }

    /// Labels every object of a component carries
    pub fn labels(&self, component: &str) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("app".to_string(), crate::APP_NAME.to_string()),
            ("component".to_string(), component.to_string()),
        ])
    }
}
