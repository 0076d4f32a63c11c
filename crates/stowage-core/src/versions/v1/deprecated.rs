//! Deprecated v1 fields

use serde_json::{Value as JsonValue, json};

use super::config::{ComponentTypeService, Components, Config, ProxyComponent};
use crate::deprecation::DeprecatedField;

pub fn deprecated_fields() -> Vec<DeprecatedField<Config>> {
    vec![
        DeprecatedField {
            key: "objectStorage.maximumBackupCount",
            selector: |cfg: &Config| cfg.object_storage.maximum_backup_count.map(|v| json!(v)),
            map_value: None,
        },
        DeprecatedField {
            key: "experimental.common.usePodSecurityPolicies",
            selector: |cfg: &Config| {
                cfg.experimental
                    .as_ref()?
                    .common
                    .as_ref()?
                    .use_pod_security_policies
                    .map(JsonValue::Bool)
            },
            map_value: None,
        },
        DeprecatedField {
            key: "experimental.webapp.server.defaultBaseImageRegistryWhitelist",
            selector: |cfg: &Config| {
                let list = &cfg
                    .experimental
                    .as_ref()?
                    .web_app
                    .as_ref()?
                    .server
                    .as_ref()?
                    .default_base_image_registry_whitelist;
                (!list.is_empty()).then(|| json!(list))
            },
            map_value: Some(|cfg: &mut Config| {
                if !cfg.container_registry.private_base_image_allow_list.is_empty() {
                    return Err(
                        "containerRegistry.privateBaseImageAllowList is also set".to_string()
                    );
                }
                let Some(server) = cfg
                    .experimental
                    .as_mut()
                    .and_then(|e| e.web_app.as_mut())
                    .and_then(|w| w.server.as_mut())
                else {
                    return Ok(());
                };
                cfg.container_registry.private_base_image_allow_list =
                    std::mem::take(&mut server.default_base_image_registry_whitelist);
                Ok(())
            }),
        },
        DeprecatedField {
            key: "experimental.webapp.proxy.serviceType",
            selector: |cfg: &Config| {
                cfg.experimental
                    .as_ref()?
                    .web_app
                    .as_ref()?
                    .proxy
                    .as_ref()?
                    .service_type
                    .as_ref()
                    .map(|v| json!(v))
            },
            map_value: Some(|cfg: &mut Config| {
                if cfg.proxy_service_type().is_some() {
                    return Err("components.proxy.service.serviceType is also set".to_string());
                }
                let service_type = cfg
                    .experimental
                    .as_mut()
                    .and_then(|e| e.web_app.as_mut())
                    .and_then(|w| w.proxy.as_mut())
                    .and_then(|p| p.service_type.take());

                let components = cfg.components.get_or_insert_with(Components::default);
                let proxy = components.proxy.get_or_insert_with(ProxyComponent::default);
                let service = proxy
                    .service
                    .get_or_insert_with(ComponentTypeService::default);
                service.service_type = service_type;
                Ok(())
            }),
        },
    ]
}
