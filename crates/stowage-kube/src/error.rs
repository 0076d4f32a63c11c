//! Error types for stowage-kube

use thiserror::Error;

/// Result type for stowage-kube operations
pub type Result<T> = std::result::Result<T, KubeError>;

/// Errors that can occur while talking to a cluster
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KubeError {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Api(#[from] kube::Error),

    /// Discovery knows no resource for this apiVersion/kind
    #[error("unknown resource type: {api_version}/{kind}\nHint: install the CRD that defines it, or check the apiVersion")]
    UnknownResourceType { api_version: String, kind: String },

    /// A manifest could not be decoded into an object
    #[error("malformed manifest {resource}: {message}")]
    MalformedManifest { resource: String, message: String },

    /// Applying one manifest of a sequence failed
    #[error("failed to apply {resource} ({index} of {total}): {source}")]
    ClusterApplyFailed {
        resource: String,
        index: usize,
        total: usize,
        #[source]
        source: Box<KubeError>,
    },

    /// Timeout
    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl KubeError {
    /// The manifest a failed sequence stopped at
    pub fn failed_resource(&self) -> Option<&str> {
        match self {
            KubeError::ClusterApplyFailed { resource, .. } => Some(resource),
            _ => None,
        }
    }
}

impl From<KubeError> for stowage_core::CoreError {
    fn from(e: KubeError) -> Self {
        stowage_core::CoreError::Cluster(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_apply_failure_names_resource() {
        let err = KubeError::ClusterApplyFailed {
            resource: "apps/v1/Deployment server".to_string(),
            index: 3,
            total: 9,
            source: Box::new(KubeError::Timeout(Duration::from_secs(30))),
        };
        assert_eq!(err.failed_resource(), Some("apps/v1/Deployment server"));
        let msg = err.to_string();
        assert!(msg.contains("3 of 9"));
        assert!(msg.contains("timed out after 30s"));
    }

    #[test]
    fn test_unknown_resource_type_message() {
        let err = KubeError::UnknownResourceType {
            api_version: "cert-manager.io/v1".to_string(),
            kind: "Certificate".to_string(),
        };
        assert!(err.to_string().starts_with("unknown resource type: cert-manager.io/v1/Certificate"));
        assert_eq!(err.failed_resource(), None);
    }
}
