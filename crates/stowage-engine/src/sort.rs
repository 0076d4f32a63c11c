//! Dependency ordering of rendered objects

use crate::objects::RenderedObject;

/// Apply tier for a resource kind.
///
/// Objects are applied from the lowest tier up so CRDs, namespaces and
/// permissions exist before anything that needs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DependencyTier {
    /// CustomResourceDefinition
    Crd = 0,
    Namespace = 1,
    /// ResourceQuota, LimitRange, PodSecurityPolicy
    NamespaceConfig = 2,
    /// ClusterRole, ClusterRoleBinding
    ClusterRbac = 10,
    /// Role, RoleBinding, ServiceAccount
    NamespacedRbac = 11,
    /// ConfigMap, Secret
    Config = 20,
    /// PersistentVolume, PersistentVolumeClaim, StorageClass
    Storage = 21,
    /// NetworkPolicy, Service, Endpoints, Ingress
    Network = 30,
    /// HorizontalPodAutoscaler, PodDisruptionBudget
    Policy = 32,
    /// Anything not listed
    Default = 35,
    /// Deployment, StatefulSet, DaemonSet, ReplicaSet, Pod, Job, CronJob
    Workload = 40,
}

impl DependencyTier {
    pub fn from_kind(kind: &str) -> Self {
        match kind {
            "CustomResourceDefinition" => Self::Crd,
            "Namespace" => Self::Namespace,
            "ResourceQuota" | "LimitRange" | "PodSecurityPolicy" => Self::NamespaceConfig,
            "ClusterRole" | "ClusterRoleBinding" => Self::ClusterRbac,
            "Role" | "RoleBinding" | "ServiceAccount" => Self::NamespacedRbac,
            "ConfigMap" | "Secret" => Self::Config,
            "PersistentVolume" | "PersistentVolumeClaim" | "StorageClass" => Self::Storage,
            "NetworkPolicy" | "Service" | "Endpoints" | "Ingress" | "IngressClass" => Self::Network,
            "HorizontalPodAutoscaler" | "PodDisruptionBudget" => Self::Policy,
            "Deployment" | "StatefulSet" | "DaemonSet" | "ReplicaSet" | "Pod" | "Job"
            | "CronJob" => Self::Workload,
            _ => Self::Default,
        }
    }
}

/// Order objects by tier, then kind, name, apiVersion and content.
///
/// The ordering is total so the result does not depend on input order.
pub fn sort_by_dependency(mut objects: Vec<RenderedObject>) -> Vec<RenderedObject> {
    objects.sort_by(|a, b| {
        DependencyTier::from_kind(&a.kind)
            .cmp(&DependencyTier::from_kind(&b.kind))
            .then_with(|| a.kind.cmp(&b.kind))
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.api_version.cmp(&b.api_version))
            .then_with(|| a.content.cmp(&b.content))
    });
    objects
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obj(api_version: &str, kind: &str, name: &str) -> RenderedObject {
        RenderedObject {
            api_version: api_version.into(),
            kind: kind.into(),
            name: name.into(),
            content: format!("kind: {}\nname: {}", kind, name),
        }
    }

    fn fixture() -> Vec<RenderedObject> {
        vec![
            obj("apps/v1", "Deployment", "server"),
            obj("v1", "Service", "proxy"),
            obj("cert-manager.io/v1", "Certificate", "https"),
            obj("v1", "ConfigMap", "server"),
            obj("rbac.authorization.k8s.io/v1", "ClusterRole", "stowage"),
            obj("v1", "ServiceAccount", "server"),
            obj("apiextensions.k8s.io/v1", "CustomResourceDefinition", "things"),
            obj("policy/v1", "PodDisruptionBudget", "server"),
            obj("v1", "Namespace", "stowage"),
            obj("v1", "Secret", "db"),
            obj("batch/v1", "Job", "migrations"),
        ]
    }

    #[test]
    fn test_tier_order() {
        let kinds: Vec<String> = sort_by_dependency(fixture())
            .into_iter()
            .map(|o| o.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                "CustomResourceDefinition",
                "Namespace",
                "ClusterRole",
                "ServiceAccount",
                "ConfigMap",
                "Secret",
                "Service",
                "PodDisruptionBudget",
                "Certificate",
                "Deployment",
                "Job",
            ]
        );
    }

    #[test]
    fn test_deterministic_under_shuffle() {
        let expected = sort_by_dependency(fixture());
        let mut reversed = fixture();
        reversed.reverse();
        assert_eq!(sort_by_dependency(reversed), expected);

        let mut rotated = fixture();
        rotated.rotate_left(4);
        assert_eq!(sort_by_dependency(rotated), expected);
    }

    #[test]
    fn test_unknown_kind_sits_before_workloads() {
        assert!(DependencyTier::from_kind("Issuer") < DependencyTier::Workload);
        assert!(DependencyTier::from_kind("Issuer") > DependencyTier::Network);
    }

    #[test]
    fn test_ties_broken_by_name_then_api_version() {
        let sorted = sort_by_dependency(vec![
            obj("v2", "ConfigMap", "b"),
            obj("v1", "ConfigMap", "b"),
            obj("v1", "ConfigMap", "a"),
        ]);
        let ids: Vec<_> = sorted
            .iter()
            .map(|o| format!("{}/{}", o.api_version, o.name))
            .collect();
        assert_eq!(ids, vec!["v1/a", "v1/b", "v2/b"]);
    }
}
