//! JSON value helpers with deep merge support

use serde_json::Value as JsonValue;

/// Deep merge `overlay` into `base`
///
/// Rules:
/// - Scalars: overlay replaces base
/// - Objects: recursive merge
/// - Arrays: overlay replaces base (not appended)
pub fn deep_merge(base: &mut JsonValue, overlay: &JsonValue) {
    match (base, overlay) {
        (JsonValue::Object(base_map), JsonValue::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => {
                        base_map.insert(key.clone(), overlay_value.clone());
                    }
                }
            }
        }
        (base, overlay) => {
            *base = overlay.clone();
        }
    }
}

/// Get a nested value by dotted path (e.g. `metadata.labels`)
pub fn get_path<'a>(value: &'a JsonValue, path: &str) -> Option<&'a JsonValue> {
    path.split('.')
        .filter(|p| !p.is_empty())
        .try_fold(value, |current, key| current.as_object()?.get(key))
}
