// ── JSON flattening ──
//
// Writes a nested JSON document into the state tree: objects become
// channels, scalars become states, arrays of objects become indexed
// channels (`01`, `02`, ...) and arrays of scalars are stored whole as a
// JSON string.

use serde_json::Value;

use super::{ObjectSpec, StateStore, StateType};

#[derive(Debug, Clone, Default)]
pub struct FlattenOptions {
    /// Always key array elements by position, even when
    /// `preferred_array_name` would match.
    pub force_index: bool,
    /// Field whose value names an array element instead of its index.
    pub preferred_array_name: Option<String>,
    /// Name of the channel created at the root prefix.
    pub channel_name: Option<String>,
}

/// Flatten `value` under `prefix`. Returns the number of states written.
pub fn flatten_into(
    store: &dyn StateStore,
    prefix: &str,
    value: &Value,
    options: &FlattenOptions,
) -> usize {
    let root_name = options
        .channel_name
        .clone()
        .unwrap_or_else(|| last_segment(prefix).to_owned());

    match value {
        Value::Object(map) => {
            store.ensure_object(prefix, ObjectSpec::channel(root_name));
            map.iter()
                .map(|(key, child)| {
                    let key = sanitize_key(key);
                    write_node(store, &join(prefix, &key), &key, child, options)
                })
                .sum()
        }
        other => write_node(store, prefix, &root_name, other, options),
    }
}

fn write_node(
    store: &dyn StateStore,
    id: &str,
    name: &str,
    value: &Value,
    options: &FlattenOptions,
) -> usize {
    match value {
        Value::Object(map) => {
            store.ensure_object(id, ObjectSpec::channel(name));
            map.iter()
                .map(|(key, child)| {
                    let key = sanitize_key(key);
                    write_node(store, &join(id, &key), &key, child, options)
                })
                .sum()
        }
        Value::Array(items) if !items.is_empty() && items.iter().all(Value::is_object) => {
            store.ensure_object(id, ObjectSpec::channel(name));
            items
                .iter()
                .enumerate()
                .map(|(index, item)| {
                    let key = element_key(item, index, options);
                    write_node(store, &join(id, &key), &key, item, options)
                })
                .sum()
        }
        Value::Array(_) => {
            // Scalar (or empty) arrays are kept whole.
            let text = Value::String(value.to_string());
            store.ensure_object(id, ObjectSpec::state(name, StateType::String));
            store.set_state(id, text, true);
            1
        }
        leaf => {
            store.ensure_object(id, ObjectSpec::state(name, StateType::of(leaf)));
            store.set_state(id, leaf.clone(), true);
            1
        }
    }
}

fn element_key(item: &Value, index: usize, options: &FlattenOptions) -> String {
    if !options.force_index {
        if let Some(field) = options.preferred_array_name.as_deref() {
            match item.get(field) {
                Some(Value::String(s)) if !s.is_empty() => return sanitize_key(s),
                Some(Value::Number(n)) => return sanitize_key(&n.to_string()),
                _ => {}
            }
        }
    }
    format!("{:02}", index + 1)
}

/// Replace every character outside `[A-Za-z0-9_-]` with `_`.
pub fn sanitize_key(key: &str) -> String {
    if key.is_empty() {
        return "_".to_owned();
    }
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_owned()
    } else {
        format!("{prefix}.{key}")
    }
}

fn last_segment(id: &str) -> &str {
    id.rsplit('.').next().unwrap_or(id)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, ObjectKind};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn flatten(value: &Value, options: &FlattenOptions) -> (MemoryStore, usize) {
        let store = MemoryStore::new();
        let written = flatten_into(&store, "p1.graph", value, options);
        (store, written)
    }

    #[test]
    fn nested_objects_and_indexed_arrays() {
        let doc = json!({
            "connection": { "patientId": "p1", "glucoseMeasurement": { "Value": 104 } },
            "graphData": [
                { "Value": 100, "isHigh": false },
                { "Value": 110, "isHigh": false }
            ],
            "activeSensors": []
        });
        let options = FlattenOptions {
            force_index: true,
            channel_name: Some("Graph data of the device".into()),
            ..FlattenOptions::default()
        };

        let (store, written) = flatten(&doc, &options);

        let expected: BTreeMap<String, Value> = [
            ("p1.graph.activeSensors", json!("[]")),
            ("p1.graph.connection.glucoseMeasurement.Value", json!(104)),
            ("p1.graph.connection.patientId", json!("p1")),
            ("p1.graph.graphData.01.Value", json!(100)),
            ("p1.graph.graphData.01.isHigh", json!(false)),
            ("p1.graph.graphData.02.Value", json!(110)),
            ("p1.graph.graphData.02.isHigh", json!(false)),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v))
        .collect();

        assert_eq!(store.states_under("p1.graph"), expected);
        assert_eq!(written, expected.len());

        let root = store.get_object("p1.graph").unwrap();
        assert_eq!(root.kind, ObjectKind::Channel);
        assert_eq!(root.common.name, "Graph data of the device");
        assert_eq!(
            store.get_object("p1.graph.graphData.02").unwrap().kind,
            ObjectKind::Channel
        );
        assert_eq!(
            store
                .get_object("p1.graph.graphData.01.Value")
                .unwrap()
                .common
                .value_type,
            Some(StateType::Number)
        );
    }

    #[test]
    fn preferred_name_applies_without_force_index() {
        let doc = json!({ "sensors": [ { "sn": "0AB", "a": 1 }, { "a": 2 } ] });
        let options = FlattenOptions {
            preferred_array_name: Some("sn".into()),
            ..FlattenOptions::default()
        };

        let (store, _) = flatten(&doc, &options);
        let states = store.states_under("p1.graph.sensors");

        assert!(states.contains_key("p1.graph.sensors.0AB.a"));
        assert!(states.contains_key("p1.graph.sensors.02.a"));
    }

    #[test]
    fn force_index_overrides_preferred_name() {
        let doc = json!({ "sensors": [ { "sn": "0AB" } ] });
        let options = FlattenOptions {
            force_index: true,
            preferred_array_name: Some("sn".into()),
            ..FlattenOptions::default()
        };

        let (store, _) = flatten(&doc, &options);
        assert!(store.get_state("p1.graph.sensors.01.sn").is_some());
    }

    #[test]
    fn keys_are_sanitized() {
        assert_eq!(sanitize_key("a.b c"), "a_b_c");
        assert_eq!(sanitize_key("Value_in-mg"), "Value_in-mg");
        assert_eq!(sanitize_key(""), "_");

        let (store, _) = flatten(&json!({ "x.y": 1 }), &FlattenOptions::default());
        assert_eq!(store.get_state("p1.graph.x_y").unwrap().val, json!(1));
    }

    #[test]
    fn scalar_root_is_a_single_state() {
        let (store, written) = flatten(&json!("raw"), &FlattenOptions::default());
        assert_eq!(written, 1);
        assert_eq!(store.get_state("p1.graph").unwrap().val, json!("raw"));
    }
}
