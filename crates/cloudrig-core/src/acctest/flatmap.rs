//! Flattened attribute paths
//!
//! Nested attributes are addressed with dotted paths: `volume.#` is the
//! length of a list, `tags.%` the size of a map, `volume.0.name` a field of a
//! list element and `connection_properties.USERNAME` a map entry.

use crate::state::ResourceState;
use serde_json::Value;
use std::collections::BTreeMap;

/// Flatten a resource's attributes; `id` is always present.
pub fn flatten_state(state: &ResourceState) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for (key, value) in &state.attributes {
        flatten_value(key, value, &mut out);
    }
    out.entry("id".to_string()).or_insert_with(|| state.id.clone());
    out
}

pub fn flatten_value(prefix: &str, value: &Value, out: &mut BTreeMap<String, String>) {
    match value {
        Value::Null => {}
        Value::Bool(b) => {
            out.insert(prefix.to_string(), b.to_string());
        }
        Value::Number(n) => {
            out.insert(prefix.to_string(), n.to_string());
        }
        Value::String(s) => {
            out.insert(prefix.to_string(), s.clone());
        }
        Value::Array(items) => {
            out.insert(format!("{prefix}.#"), items.len().to_string());
            for (i, item) in items.iter().enumerate() {
                flatten_value(&format!("{prefix}.{i}"), item, out);
            }
        }
        Value::Object(map) => {
            out.insert(format!("{prefix}.%"), map.len().to_string());
            for (key, item) in map {
                flatten_value(&format!("{prefix}.{key}"), item, out);
            }
        }
    }
}

/// Whether `path` names a collection size (`x.#` or `x.%`).
pub fn is_count_path(path: &str) -> bool {
    path.ends_with(".#") || path.ends_with(".%")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flatten_nested_blocks() {
        let state = ResourceState::new("family", "aws_ecs_task_definition").with_attributes(json!({
            "family": "family",
            "revision": 3,
            "tags": {"Name": "x", "env": "test"},
            "volume": [
                {"name": "db", "host_path": "/data", "efs_volume_configuration": []},
            ],
            "network_mode": null,
        }));

        let flat = flatten_state(&state);
        assert_eq!(flat["id"], "family");
        assert_eq!(flat["revision"], "3");
        assert_eq!(flat["tags.%"], "2");
        assert_eq!(flat["tags.env"], "test");
        assert_eq!(flat["volume.#"], "1");
        assert_eq!(flat["volume.0.name"], "db");
        assert_eq!(flat["volume.0.efs_volume_configuration.#"], "0");
        assert!(!flat.contains_key("network_mode"));
    }

    #[test]
    fn test_is_count_path() {
        assert!(is_count_path("tags.%"));
        assert!(is_count_path("volume.#"));
        assert!(!is_count_path("volume.0.name"));
    }
}
