//! Installation inventory
//!
//! A ConfigMap listing every object an installation owns, so a later run or
//! an uninstall can find them without re-rendering.

use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{EngineError, Result};
use crate::objects::{Object, RenderedObject};

pub const INVENTORY_NAME: &str = "stowage-app";
pub const INVENTORY_KEY: &str = "app.yaml";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryEntry {
    pub api_version: String,
    pub kind: String,
    pub name: String,
}

/// Build the inventory ConfigMap for `objects`.
///
/// Entries are sorted and the inventory never lists itself.
pub fn inventory(objects: &[RenderedObject], namespace: &str) -> Result<RenderedObject> {
    let mut entries: Vec<InventoryEntry> = objects
        .iter()
        .filter(|o| !is_inventory(o))
        .map(|o| InventoryEntry {
            api_version: o.api_version.clone(),
            kind: o.kind.clone(),
            name: o.name.clone(),
        })
        .collect();
    entries.sort();
    entries.dedup();

    let config_map = ConfigMap {
        metadata: ObjectMeta {
            name: Some(INVENTORY_NAME.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(BTreeMap::from([(
                "app".to_string(),
                crate::APP_NAME.to_string(),
            )])),
            ..Default::default()
        },
        data: Some(BTreeMap::from([(
            INVENTORY_KEY.to_string(),
            serde_yaml::to_string(&entries)?,
        )])),
        ..Default::default()
    };

    let content = Object::new(&config_map)?.to_yaml()?;
    RenderedObject::parse(&content)?
        .ok_or_else(|| EngineError::malformed(&content, "empty inventory"))
}

/// Read the entries back out of an inventory ConfigMap
pub fn read_inventory(object: &RenderedObject) -> Result<Vec<InventoryEntry>> {
    let value = object.value()?;
    let data = value["data"][INVENTORY_KEY].as_str().unwrap_or_default();
    if data.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_yaml::from_str(data)?)
}

pub fn is_inventory(object: &RenderedObject) -> bool {
    object.kind == "ConfigMap" && object.name == INVENTORY_NAME
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::materialize;

    fn objects() -> Vec<RenderedObject> {
        materialize(&[
            "apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: server\n",
            "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: server\n",
        ])
        .unwrap()
    }

    #[test]
    fn test_inventory_lists_objects_sorted() {
        let inv = inventory(&objects(), "stowage").unwrap();
        assert_eq!(inv.kind, "ConfigMap");
        assert_eq!(inv.name, INVENTORY_NAME);

        let entries = read_inventory(&inv).unwrap();
        let kinds: Vec<_> = entries.iter().map(|e| e.kind.as_str()).collect();
        assert_eq!(kinds, vec!["ConfigMap", "Deployment"]);
    }

    #[test]
    fn test_inventory_excludes_itself() {
        let mut objs = objects();
        objs.push(inventory(&objs, "stowage").unwrap());
        let inv = inventory(&objs, "stowage").unwrap();
        assert_eq!(read_inventory(&inv).unwrap().len(), 2);
    }

    #[test]
    fn test_empty_inventory() {
        let inv = inventory(&[], "stowage").unwrap();
        assert!(read_inventory(&inv).unwrap().is_empty());
    }
}
