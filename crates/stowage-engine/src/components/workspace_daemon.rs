//! Per-node daemon on workspace nodes

use k8s_openapi::api::apps::v1::{DaemonSet, DaemonSetSpec};
use k8s_openapi::api::core::v1::{
    Container, HostPathVolumeSource, PodSpec, PodTemplateSpec, SecurityContext, Volume,
    VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use stowage_core::versions::v1::FsShiftMethod;

use super::common::{
    AFFINITY_LABEL_WORKSPACE_SERVICES, default_env, env, image_pull_secrets, metadata, node_affinity,
    selector, service_account,
};
use crate::context::RenderContext;
use crate::error::Result;
use crate::objects::Object;

pub const COMPONENT: &str = "ws-daemon";

fn host_path(name: &str, path: &str, mount_path: &str) -> (Volume, VolumeMount) {
    (
        Volume {
            name: name.to_string(),
            host_path: Some(HostPathVolumeSource {
                path: path.to_string(),
                type_: Some("Directory".to_string()),
            }),
            ..Default::default()
        },
        VolumeMount {
            name: name.to_string(),
            mount_path: mount_path.to_string(),
            ..Default::default()
        },
    )
}

pub fn objects(ctx: &RenderContext) -> Result<Vec<Object>> {
    let cfg = ctx.config();
    if !cfg.kind.includes_workspace() {
        return Ok(Vec::new());
    }

    let runtime = &cfg.workspace.runtime;
    let fs_shift = match runtime.fs_shift_method {
        FsShiftMethod::Fuse => "fuse",
        FsShiftMethod::Shiftfs => "shiftfs",
    };

    let (volumes, mounts): (Vec<_>, Vec<_>) = [
        host_path("containerd-runtime", &runtime.containerd_runtime_dir, "/mnt/node0"),
        host_path("containerd-socket", &runtime.containerd_socket_dir, "/mnt/containerd"),
    ]
    .into_iter()
    .unzip();

    let mut vars = default_env(ctx);
    vars.push(env("FS_SHIFT_METHOD", fs_shift));
    vars.push(env("WORKSPACE_MAX_LIFETIME", cfg.workspace.max_lifetime.clone()));

    let container = Container {
        name: COMPONENT.to_string(),
        image: Some(ctx.component_image(COMPONENT)),
        env: Some(vars),
        volume_mounts: Some(mounts),
        security_context: Some(SecurityContext {
            privileged: Some(true),
            ..Default::default()
        }),
        ..Default::default()
    };

    let daemon_set = DaemonSet {
        metadata: metadata(ctx, COMPONENT, COMPONENT),
        spec: Some(DaemonSetSpec {
            selector: selector(ctx, COMPONENT),
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(ctx.labels(COMPONENT)),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    service_account_name: Some(COMPONENT.to_string()),
                    affinity: Some(node_affinity(AFFINITY_LABEL_WORKSPACE_SERVICES)),
                    image_pull_secrets: image_pull_secrets(ctx),
                    host_pid: Some(true),
                    containers: vec![container],
                    volumes: Some(volumes),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    };

    Ok(vec![
        service_account(ctx, COMPONENT)?,
        Object::new(&daemon_set)?,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::VersionManifest;
    use stowage_core::versions::v1::{Config, InstallationKind};

    fn ctx(kind: InstallationKind) -> RenderContext {
        let mut cfg = Config {
            domain: "stowage.example.com".into(),
            kind,
            ..Default::default()
        };
        cfg.workspace.runtime.fs_shift_method = FsShiftMethod::Shiftfs;
        cfg.apply_defaults();
        RenderContext::new(cfg, VersionManifest::default(), "stowage")
    }

    #[test]
    fn test_meta_installation_has_no_daemon() {
        assert!(objects(&ctx(InstallationKind::Meta)).unwrap().is_empty());
    }

    #[test]
    fn test_runtime_paths() {
        let objs = objects(&ctx(InstallationKind::Workspace)).unwrap();
        let spec = &objs[1].value()["spec"]["template"]["spec"];
        assert_eq!(
            spec["volumes"][1]["hostPath"]["path"],
            stowage_core::versions::v1::DEFAULT_CONTAINERD_SOCKET_DIR
        );
        let vars = spec["containers"][0]["env"].as_array().unwrap();
        assert!(
            vars.iter()
                .any(|v| v["name"] == "FS_SHIFT_METHOD" && v["value"] == "shiftfs")
        );
    }
}
