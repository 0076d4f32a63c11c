//! Cluster and namespaced permissions for meta components

use k8s_openapi::api::rbac::v1::{
    ClusterRole, ClusterRoleBinding, PolicyRule, Role, RoleBinding, RoleRef, Subject,
};

use super::common::{cluster_metadata, metadata};
use crate::context::RenderContext;
use crate::error::Result;
use crate::objects::Object;

pub const COMPONENT: &str = "rbac";

/// Components bound to the namespaced role
const SUBJECTS: &[&str] = &["server", "proxy"];

fn rule(api_groups: &[&str], resources: &[&str], verbs: &[&str]) -> PolicyRule {
    let strings = |items: &[&str]| Some(items.iter().map(|s| s.to_string()).collect());
    PolicyRule {
        api_groups: strings(api_groups),
        resources: strings(resources),
        verbs: verbs.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    }
}

fn subject(ctx: &RenderContext, name: &str) -> Subject {
    Subject {
        kind: "ServiceAccount".to_string(),
        name: name.to_string(),
        namespace: Some(ctx.namespace().to_string()),
        ..Default::default()
    }
}

/// Role name scoped to the namespace so installations do not collide
fn cluster_role_name(ctx: &RenderContext) -> String {
    format!("{}-{}", crate::APP_NAME, ctx.namespace())
}

pub fn objects(ctx: &RenderContext) -> Result<Vec<Object>> {
    if !ctx.config().kind.includes_meta() {
        return Ok(Vec::new());
    }

    let cluster_role = ClusterRole {
        metadata: cluster_metadata(ctx, COMPONENT, &cluster_role_name(ctx)),
        rules: Some(vec![rule(&[""], &["nodes"], &["get", "list", "watch"])]),
        ..Default::default()
    };

    let cluster_binding = ClusterRoleBinding {
        metadata: cluster_metadata(ctx, COMPONENT, &cluster_role_name(ctx)),
        role_ref: RoleRef {
            api_group: "rbac.authorization.k8s.io".to_string(),
            kind: "ClusterRole".to_string(),
            name: cluster_role_name(ctx),
        },
        subjects: Some(vec![subject(ctx, "server")]),
    };

    let role = Role {
        metadata: metadata(ctx, COMPONENT, crate::APP_NAME),
        rules: Some(vec![
            rule(&[""], &["configmaps", "secrets"], &["get", "list", "watch"]),
            rule(&[""], &["pods", "services"], &["get", "list", "watch"]),
        ]),
    };

    let binding = RoleBinding {
        metadata: metadata(ctx, COMPONENT, crate::APP_NAME),
        role_ref: RoleRef {
            api_group: "rbac.authorization.k8s.io".to_string(),
            kind: "Role".to_string(),
            name: crate::APP_NAME.to_string(),
        },
        subjects: Some(SUBJECTS.iter().map(|s| subject(ctx, s)).collect()),
    };

    Ok(vec![
        Object::new(&cluster_role)?,
        Object::new(&cluster_binding)?,
        Object::new(&role)?,
        Object::new(&binding)?,
    ])
}
