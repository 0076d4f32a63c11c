//! Validation reports and cluster checks

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cluster::{AFFINITY_LABELS, ClusterAccess};
use crate::schema::ValidationResult;

/// Minimum Kubernetes version the rendered manifests target
pub const MINIMUM_KUBERNETES_VERSION: &str = "1.21.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    Ok,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationItem {
    pub message: String,
    #[serde(rename = "type")]
    pub severity: ValidationStatus,
}

/// Aggregated findings, status is the worst severity seen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub status: ValidationStatus,
    pub items: Vec<ValidationItem>,
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self {
            status: ValidationStatus::Ok,
            items: Vec::new(),
        }
    }
}

impl ValidationReport {
    pub fn push(&mut self, severity: ValidationStatus, message: impl Into<String>) {
        self.status = self.status.max(severity);
        self.items.push(ValidationItem {
            message: message.into(),
            severity,
        });
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.push(ValidationStatus::Warning, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(ValidationStatus::Error, message);
    }

    pub fn merge(&mut self, other: ValidationReport) {
        for item in other.items {
            self.push(item.severity, item.message);
        }
    }

    /// Structural errors become error items
    pub fn from_structural(result: &ValidationResult) -> Self {
        let mut report = Self::default();
        for err in &result.errors {
            report.error(err.to_string());
        }
        report
    }

    pub fn is_error(&self) -> bool {
        self.status == ValidationStatus::Error
    }
}

/// One named cluster check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterCheck {
    pub name: String,
    pub kind: CheckKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckKind {
    /// A secret exists in the install namespace and carries every key
    SecretKeys {
        secret: String,
        required_keys: Vec<String>,
    },
    /// Some node carries each label
    AffinityLabels { labels: Vec<String> },
    /// The API server is at least this version
    MinimumKubernetesVersion { version: String },
    /// The install namespace already exists
    NamespaceExists,
}

impl ClusterCheck {
    pub fn secret_keys(name: &str, secret: &str, keys: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            kind: CheckKind::SecretKeys {
                secret: secret.to_string(),
                required_keys: keys.iter().map(|k| k.to_string()).collect(),
            },
        }
    }
}

/// Checks every version runs regardless of config
pub fn default_cluster_checks() -> Vec<ClusterCheck> {
    vec![
        ClusterCheck {
            name: "minimum kubernetes version".to_string(),
            kind: CheckKind::MinimumKubernetesVersion {
                version: MINIMUM_KUBERNETES_VERSION.to_string(),
            },
        },
        ClusterCheck {
            name: "affinity labels".to_string(),
            kind: CheckKind::AffinityLabels {
                labels: AFFINITY_LABELS.iter().map(|l| l.to_string()).collect(),
            },
        },
        ClusterCheck {
            name: "namespace".to_string(),
            kind: CheckKind::NamespaceExists,
        },
    ]
}

/// Run every check, collecting findings instead of failing
pub async fn run_cluster_checks(
    checks: &[ClusterCheck],
    cluster: &dyn ClusterAccess,
    namespace: &str,
) -> ValidationReport {
    let mut report = ValidationReport::default();
    for check in checks {
        debug!(check = %check.name, "running cluster check");
        run_check(check, cluster, namespace, &mut report).await;
    }
    report
}

async fn run_check(
    check: &ClusterCheck,
    cluster: &dyn ClusterAccess,
    namespace: &str,
    report: &mut ValidationReport,
) {
    match &check.kind {
        CheckKind::SecretKeys {
            secret,
            required_keys,
        } => match cluster.get_secret(namespace, secret).await {
            Ok(Some(data)) => {
                for key in required_keys {
                    if !data.contains_key(key) {
                        report.error(format!(
                            "{}: secret {} has no required key {}",
                            check.name, secret, key
                        ));
                    }
                }
            }
            Ok(None) => report.error(format!(
                "{}: secret {} not found in namespace {}",
                check.name, secret, namespace
            )),
            Err(e) => report.error(format!("{}: {}", check.name, e)),
        },
        CheckKind::AffinityLabels { labels } => match cluster.list_nodes().await {
            Ok(nodes) => {
                for label in labels {
                    if !nodes.iter().any(|n| n.labels.contains_key(label)) {
                        report.error(format!("{}: no node has label {}", check.name, label));
                    }
                }
            }
            Err(e) => report.error(format!("{}: {}", check.name, e)),
        },
        CheckKind::MinimumKubernetesVersion { version } => {
            let server = match cluster.server_version().await {
                Ok(v) => v,
                Err(e) => {
                    report.error(format!("{}: {}", check.name, e));
                    return;
                }
            };
            match (parse_kube_version(&server), parse_kube_version(version)) {
                (Some(actual), Some(required)) if actual < required => report.error(format!(
                    "{}: server version {} is below {}",
                    check.name, server, version
                )),
                (Some(_), Some(_)) => {}
                _ => report.warning(format!(
                    "{}: cannot compare server version {} with {}",
                    check.name, server, version
                )),
            }
        }
        CheckKind::NamespaceExists => match cluster.namespace_exists(namespace).await {
            Ok(true) => {}
            Ok(false) => report.warning(format!(
                "{}: namespace {} does not exist yet",
                check.name, namespace
            )),
            Err(e) => report.error(format!("{}: {}", check.name, e)),
        },
    }
}

/// Parse `v1.31.2-gke.100` style versions down to (major, minor, patch)
fn parse_kube_version(raw: &str) -> Option<(u64, u64, u64)> {
    let trimmed = raw.trim().trim_start_matches('v');
    let core = trimmed.split(['-', '+']).next().unwrap_or(trimmed);
    let version = semver::Version::parse(core).ok()?;
    Some((version.major, version.minor, version.patch))
}
