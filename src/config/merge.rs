//! Deep merge of configuration trees.
//!
//! Tables merge key by key; anything else in the overlay (scalars, lists)
//! replaces the base value whole. Lists are never concatenated.

use serde_json::{Map, Value};

/// Merge `overlay` on top of `base`.
///
/// - Tables are merged recursively: overlay keys win
/// - Lists and scalars from the overlay replace the base value
/// - A `null` in the overlay means "not specified" and keeps the base value
///
/// # Example
/// ```
/// use serde_json::json;
/// use confyg_api::config::deep_merge;
///
/// let base = json!({
///     "server": { "port": 8080, "env": "dev" },
///     "server_cors": ["a", "b"]
/// });
/// let overlay = json!({
///     "server": { "port": 9090 },
///     "server_cors": ["c"]
/// });
/// let merged = deep_merge(base, overlay);
/// assert_eq!(merged, json!({
///     "server": { "port": 9090, "env": "dev" },
///     "server_cors": ["c"]
/// }));
/// ```
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_table), Value::Object(overlay_table)) => {
            for (key, overlay_value) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value,
                };
                base_table.insert(key, merged);
            }
            Value::Object(base_table)
        }
        (base, Value::Null) => base,
        (_, overlay) => overlay,
    }
}

/// Lowercase every table key, recursively.
///
/// Document keys are case-insensitive; `Server.Port` and `server.port`
/// address the same field.
pub(crate) fn lowercase_keys(value: Value) -> Value {
    match value {
        Value::Object(table) => {
            let mut lowered = Map::with_capacity(table.len());
            for (key, inner) in table {
                let key = key.to_ascii_lowercase();
                let inner = lowercase_keys(inner);
                let merged = match lowered.remove(&key) {
                    Some(existing) => deep_merge(existing, inner),
                    None => inner,
                };
                lowered.insert(key, merged);
            }
            Value::Object(lowered)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(lowercase_keys).collect()),
        other => other,
    }
}

/// Dot-joined paths of every non-table value in the tree.
///
/// Lists count as leaves. Empty tables produce no path.
pub(crate) fn leaf_paths(tree: &Value) -> Vec<String> {
    let mut out = Vec::new();
    collect_leaves(tree, &mut String::new(), &mut out);
    out
}

fn collect_leaves(node: &Value, prefix: &mut String, out: &mut Vec<String>) {
    match node {
        Value::Object(table) => {
            for (key, child) in table {
                let len = prefix.len();
                if !prefix.is_empty() {
                    prefix.push('.');
                }
                prefix.push_str(key);
                collect_leaves(child, prefix, out);
                prefix.truncate(len);
            }
        }
        _ if !prefix.is_empty() => out.push(prefix.clone()),
        _ => {}
    }
}
