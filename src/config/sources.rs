//! Configuration sources: documents on disk and the process environment.

use super::merge::lowercase_keys;
use crate::error::{ConfigError, ConfigResult};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Where a resolved value came from, lowest to highest precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConfigSource {
    /// Built-in default (no source set the key).
    Default = 0,
    /// The base document.
    Base = 1,
    /// The environment-specific overlay document.
    Overlay = 2,
    /// A prefixed environment variable.
    Environment = 3,
}

impl ConfigSource {
    /// Precedence rank; a higher rank overwrites a lower one.
    pub fn rank(self) -> u8 {
        self as u8
    }
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::Base => write!(f, "base"),
            ConfigSource::Overlay => write!(f, "overlay"),
            ConfigSource::Environment => write!(f, "environment"),
        }
    }
}

/// Structured-data formats a document may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Yaml,
    Json,
    Toml,
}

impl Format {
    /// Extensions tried for overlay discovery, in order.
    const EXTENSIONS: [&'static str; 4] = ["yaml", "yml", "json", "toml"];

    /// Format implied by a file extension. Files without one are YAML.
    pub fn from_path(path: &Path) -> Option<Self> {
        let Some(ext) = path.extension() else {
            return Some(Format::Yaml);
        };
        match ext.to_str()?.to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Some(Format::Yaml),
            "json" => Some(Format::Json),
            "toml" => Some(Format::Toml),
            _ => None,
        }
    }

    fn parse(self, content: &str) -> Result<Value, String> {
        match self {
            Format::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
            Format::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
            Format::Toml => toml::from_str(content).map_err(|e| e.to_string()),
        }
    }
}

/// Read and parse a document into a table tree with lowercased keys.
///
/// An empty document is an empty table. A document whose root is not a
/// table is rejected.
pub fn load_document(path: &Path) -> ConfigResult<Value> {
    if path.as_os_str().is_empty() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ConfigError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    let format = Format::from_path(path).ok_or_else(|| {
        ConfigError::parse(path, "unsupported format (expected yaml, yml, json or toml)")
    })?;

    if content.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }

    match format.parse(&content) {
        Ok(Value::Object(table)) => Ok(lowercase_keys(Value::Object(table))),
        Ok(Value::Null) => Ok(Value::Object(Map::new())),
        Ok(_) => Err(ConfigError::parse(path, "document root must be a table")),
        Err(message) => Err(ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        }),
    }
}

/// Candidate overlay files for `environment`, most preferred first.
///
/// `conf/confyg.yaml` with `staging` yields `conf/confyg.staging.yaml`, then
/// the same stem with every other supported extension.
pub fn overlay_candidates(base_path: &Path, environment: &str) -> Vec<PathBuf> {
    let dir = base_path.parent().unwrap_or(Path::new(""));
    let stem = base_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let own_ext = base_path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase());

    let mut exts: Vec<String> = Vec::with_capacity(Format::EXTENSIONS.len() + 1);
    if let Some(ext) = own_ext {
        exts.push(ext);
    }
    for ext in Format::EXTENSIONS {
        if !exts.iter().any(|e| e == ext) {
            exts.push(ext.to_string());
        }
    }

    exts.into_iter()
        .map(|ext| dir.join(format!("{stem}.{environment}.{ext}")))
        .collect()
}

/// First overlay candidate that exists as a file.
pub fn find_overlay(base_path: &Path, environment: &str) -> Option<PathBuf> {
    overlay_candidates(base_path, environment)
        .into_iter()
        .find(|candidate| candidate.is_file())
}

/// Read access to environment variables.
///
/// The resolver reads the process environment by default; tests hand it a
/// map instead of mutating global state.
pub trait EnvSource {
    fn var(&self, name: &str) -> Option<String>;
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_source_precedence_order() {
        assert!(ConfigSource::Default < ConfigSource::Base);
        assert!(ConfigSource::Base < ConfigSource::Overlay);
        assert!(ConfigSource::Overlay < ConfigSource::Environment);
        assert_eq!(ConfigSource::Default.rank(), 0);
        assert_eq!(ConfigSource::Environment.rank(), 3);
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(Format::from_path(Path::new("a/confyg.yaml")), Some(Format::Yaml));
        assert_eq!(Format::from_path(Path::new("a/confyg.YML")), Some(Format::Yaml));
        assert_eq!(Format::from_path(Path::new("confyg.json")), Some(Format::Json));
        assert_eq!(Format::from_path(Path::new("confyg.toml")), Some(Format::Toml));
        assert_eq!(Format::from_path(Path::new("confyg")), Some(Format::Yaml));
        assert_eq!(Format::from_path(Path::new("confyg.ini")), None);
    }

    #[test]
    fn test_overlay_candidates_prefer_base_extension() {
        let candidates = overlay_candidates(Path::new("/app/conf/confyg.json"), "staging");
        assert_eq!(candidates[0], PathBuf::from("/app/conf/confyg.staging.json"));
        assert_eq!(candidates[1], PathBuf::from("/app/conf/confyg.staging.yaml"));
        assert_eq!(candidates.len(), 4);
    }

    #[test]
    fn test_find_overlay_other_extension() {
        let temp = TempDir::new().unwrap();
        let base = temp.path().join("confyg.yaml");
        std::fs::write(&base, "server:\n  port: 1\n").unwrap();
        let overlay = temp.path().join("confyg.prod.toml");
        std::fs::write(&overlay, "[server]\nport = 2\n").unwrap();

        assert_eq!(find_overlay(&base, "prod"), Some(overlay));
        assert_eq!(find_overlay(&base, "staging"), None);
    }

    #[test]
    fn test_load_document_formats_agree() {
        let temp = TempDir::new().unwrap();
        let yaml = temp.path().join("c.yaml");
        let json = temp.path().join("c.json");
        let toml = temp.path().join("c.toml");
        std::fs::write(&yaml, "Server:\n  Port: 8080\n").unwrap();
        std::fs::write(&json, r#"{"server": {"port": 8080}}"#).unwrap();
        std::fs::write(&toml, "[server]\nport = 8080\n").unwrap();

        let expected = json!({"server": {"port": 8080}});
        assert_eq!(load_document(&yaml).unwrap(), expected);
        assert_eq!(load_document(&json).unwrap(), expected);
        assert_eq!(load_document(&toml).unwrap(), expected);
    }

    #[test]
    fn test_load_document_missing_and_empty_path() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("nope.yaml");
        assert!(matches!(
            load_document(&missing),
            Err(ConfigError::NotFound { .. })
        ));
        assert!(matches!(
            load_document(Path::new("")),
            Err(ConfigError::NotFound { .. })
        ));
    }

    #[test]
    fn test_load_document_unreadable_path_is_io_error() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("confyg.yaml");
        std::fs::create_dir(&dir).unwrap();

        match load_document(&dir) {
            Err(ConfigError::Io { path, .. }) => assert_eq!(path, dir),
            other => panic!("expected Io error, got {other:?}"),
        }
    }

    #[test]
    fn test_load_document_rejects_scalar_root() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("c.yaml");
        std::fs::write(&path, "just a string\n").unwrap();
        assert!(matches!(load_document(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_load_document_empty_is_empty_table() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("c.yaml");
        std::fs::write(&path, "\n# nothing here\n").unwrap();
        assert_eq!(load_document(&path).unwrap(), json!({}));
    }

    #[test]
    fn test_map_env_source() {
        let mut env = HashMap::new();
        env.insert("APP_LOG_LEVEL".to_string(), "debug".to_string());
        assert_eq!(env.var("APP_LOG_LEVEL").as_deref(), Some("debug"));
        assert_eq!(env.var("APP_LOG_JSON"), None);
    }
}
