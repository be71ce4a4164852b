//! Dot-delimited addresses into a nested configuration tree.

use serde_json::{Map, Value};
use std::fmt;

/// Path delimiter inside a key path.
pub const DELIMITER: char = '.';

/// A dot-delimited key such as `server.cors.allow_origins`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyPath<'a>(&'a str);

impl<'a> KeyPath<'a> {
    pub fn new(path: &'a str) -> Self {
        debug_assert!(is_well_formed(path), "malformed key path: {path}");
        Self(path)
    }

    pub fn as_str(&self) -> &'a str {
        self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &'a str> {
        self.0.split(DELIMITER)
    }

    /// Environment variable carrying an override for this key.
    ///
    /// `database.max_open_conns` with prefix `APP` becomes
    /// `APP_DATABASE_MAX_OPEN_CONNS`.
    pub fn env_var(&self, prefix: &str) -> String {
        let key = self.0.to_ascii_uppercase().replace(DELIMITER, "_");
        if prefix.is_empty() {
            key
        } else {
            format!("{}_{}", prefix.to_ascii_uppercase(), key)
        }
    }

    /// Value at this path, if every segment exists.
    pub fn lookup<'v>(&self, tree: &'v Value) -> Option<&'v Value> {
        self.segments()
            .try_fold(tree, |node, segment| node.as_object()?.get(segment))
    }

    /// Set the value at this path, creating intermediate tables.
    ///
    /// A non-table value sitting where a table is needed is replaced.
    pub fn set(&self, tree: &mut Value, value: Value) {
        let mut node = tree;
        let mut segments = self.segments().peekable();
        while let Some(segment) = segments.next() {
            if !node.is_object() {
                *node = Value::Object(Map::new());
            }
            let Some(table) = node.as_object_mut() else {
                return;
            };
            if segments.peek().is_none() {
                table.insert(segment.to_string(), value);
                return;
            }
            node = table
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
        }
    }
}

impl fmt::Display for KeyPath<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

fn is_well_formed(path: &str) -> bool {
    !path.is_empty()
        && path.split(DELIMITER).all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_env_var_name() {
        let key = KeyPath::new("database.max_open_conns");
        assert_eq!(key.env_var("APP"), "APP_DATABASE_MAX_OPEN_CONNS");
        assert_eq!(KeyPath::new("log.level").env_var("app"), "APP_LOG_LEVEL");
        assert_eq!(KeyPath::new("server.port").env_var(""), "SERVER_PORT");
    }

    #[test]
    fn test_lookup_nested() {
        let tree = json!({"server": {"cors": {"allow_origins": ["a"]}, "port": 1}});
        assert_eq!(
            KeyPath::new("server.cors.allow_origins").lookup(&tree),
            Some(&json!(["a"]))
        );
        assert_eq!(KeyPath::new("server.port").lookup(&tree), Some(&json!(1)));
        assert_eq!(KeyPath::new("server.env").lookup(&tree), None);
        assert_eq!(KeyPath::new("server.port.inner").lookup(&tree), None);
    }

    #[test]
    fn test_set_creates_tables() {
        let mut tree = json!({});
        KeyPath::new("security.rate_limit.rps").set(&mut tree, json!("50"));
        assert_eq!(tree, json!({"security": {"rate_limit": {"rps": "50"}}}));
    }

    #[test]
    fn test_set_replaces_scalar_parent() {
        let mut tree = json!({"server": 5, "log": {"json": true}});
        KeyPath::new("server.port").set(&mut tree, json!("9000"));
        assert_eq!(
            tree,
            json!({"server": {"port": "9000"}, "log": {"json": true}})
        );
    }

    #[test]
    fn test_set_keeps_siblings() {
        let mut tree = json!({"log": {"level": "info", "json": false}});
        KeyPath::new("log.level").set(&mut tree, json!("debug"));
        assert_eq!(tree, json!({"log": {"level": "debug", "json": false}}));
    }

    #[test]
    fn test_well_formed() {
        assert!(is_well_formed("server.port"));
        assert!(is_well_formed("security.rate_limit.rps"));
        assert!(!is_well_formed(""));
        assert!(!is_well_formed("server..port"));
        assert!(!is_well_formed("Server.Port"));
    }
}
