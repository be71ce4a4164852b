//! Layered configuration resolution.
//!
//! Base document, then the environment overlay (best-effort), then prefixed
//! environment variables, then a field-by-field decode into [`Config`].

use super::fields::{self, Field};
use super::keypath::KeyPath;
use super::merge::{deep_merge, leaf_paths};
use super::sources::{self, ConfigSource, EnvSource, ProcessEnv};
use super::types::Config;
use crate::error::ConfigResult;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Prefix for environment overrides (`APP_SERVER_PORT`, ...).
pub const DEFAULT_ENV_PREFIX: &str = "APP";

/// Resolves one [`Config`] from a base document, an optional overlay and
/// the environment.
pub struct ConfigResolver {
    base_path: PathBuf,
    environment: String,
    env_prefix: String,
    env: Box<dyn EnvSource>,
}

impl std::fmt::Debug for ConfigResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigResolver")
            .field("base_path", &self.base_path)
            .field("environment", &self.environment)
            .field("env_prefix", &self.env_prefix)
            .finish_non_exhaustive()
    }
}

impl ConfigResolver {
    /// Resolver for `base_path`. An empty `environment` means no overlay.
    pub fn new(base_path: impl Into<PathBuf>, environment: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            environment: environment.into(),
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
            env: Box::new(ProcessEnv),
        }
    }

    /// Read overrides from `env` instead of the process environment.
    pub fn with_env_source(mut self, env: impl EnvSource + 'static) -> Self {
        self.env = Box::new(env);
        self
    }

    /// Use a different variable prefix. An empty prefix means bare names.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Resolve the configuration.
    pub fn resolve(&self) -> ConfigResult<Config> {
        self.resolve_with_report().map(|resolution| resolution.config)
    }

    /// Resolve the configuration and describe how each value was chosen.
    pub fn resolve_with_report(&self) -> ConfigResult<Resolution> {
        let base = sources::load_document(&self.base_path)?;
        let mut report = ResolutionReport::new(&self.base_path);
        let mut tree = base.clone();

        let overlay = self.merge_overlay(&mut tree, &mut report);

        let table = fields::table();
        for field in &table {
            let key = KeyPath::new(field.path);
            let var = key.env_var(&self.env_prefix);
            let source = match self.env.var(&var).filter(|value| !value.is_empty()) {
                Some(value) => {
                    key.set(&mut tree, Value::String(value));
                    report.applied_env.push(var);
                    ConfigSource::Environment
                }
                None if is_set(key, overlay.as_ref()) => ConfigSource::Overlay,
                None if is_set(key, Some(&base)) => ConfigSource::Base,
                None => ConfigSource::Default,
            };
            report.origins.insert(field.path, source);
        }

        let known: HashSet<&str> = table.iter().map(|f| f.path).collect();
        report.ignored_keys = leaf_paths(&tree)
            .into_iter()
            .filter(|path| !known.contains(path.as_str()))
            .collect();

        let mut config = Config::default();
        for field in &table {
            if let Some(raw) = KeyPath::new(field.path).lookup(&tree).filter(|v| !v.is_null()) {
                field.apply(&mut config, raw, &mut report.warnings)?;
            }
        }

        debug!(
            base = %report.base_path.display(),
            overlay = ?report.overlay_path,
            env_overrides = report.applied_env.len(),
            "Configuration resolved"
        );

        Ok(Resolution {
            config,
            report,
            fields: table,
        })
    }

    /// Merge the overlay for `self.environment` into `tree`, if one exists
    /// and parses. Returns the overlay document that was merged.
    fn merge_overlay(&self, tree: &mut Value, report: &mut ResolutionReport) -> Option<Value> {
        let environment = self.environment.trim();
        if environment.is_empty() {
            return None;
        }

        let Some(path) = sources::find_overlay(&self.base_path, environment) else {
            debug!(environment, "No overlay document found");
            return None;
        };

        match sources::load_document(&path) {
            Ok(overlay) => {
                let base = std::mem::take(tree);
                *tree = deep_merge(base, overlay.clone());
                report.overlay_path = Some(path);
                Some(overlay)
            }
            Err(e) => {
                report
                    .warnings
                    .push(format!("ignoring overlay {}: {}", path.display(), e));
                None
            }
        }
    }
}

fn is_set(key: KeyPath<'_>, doc: Option<&Value>) -> bool {
    doc.and_then(|doc| key.lookup(doc))
        .is_some_and(|value| !value.is_null())
}

/// Resolve `base_path` with the overlay for `environment` and `APP_*`
/// overrides from the process environment.
pub fn resolve(base_path: impl AsRef<Path>, environment: &str) -> ConfigResult<Config> {
    ConfigResolver::new(base_path.as_ref(), environment).resolve()
}

/// How a resolution went: which documents were used and where each value
/// came from.
#[derive(Debug, Clone, Default)]
pub struct ResolutionReport {
    pub base_path: PathBuf,
    /// Overlay document that was merged, if any.
    pub overlay_path: Option<PathBuf>,
    /// Names of environment variables that overrode a value.
    pub applied_env: Vec<String>,
    /// Non-fatal problems: skipped overlay, unrecognized log level.
    pub warnings: Vec<String>,
    /// Document keys that map to no field.
    pub ignored_keys: Vec<String>,
    origins: BTreeMap<&'static str, ConfigSource>,
}

impl ResolutionReport {
    fn new(base_path: &Path) -> Self {
        Self {
            base_path: base_path.to_path_buf(),
            ..Default::default()
        }
    }

    /// Highest-precedence source that set `key`.
    pub fn source_of(&self, key: &str) -> ConfigSource {
        self.origins.get(key).copied().unwrap_or(ConfigSource::Default)
    }
}

/// A resolved configuration together with its report.
pub struct Resolution {
    pub config: Config,
    pub report: ResolutionReport,
    fields: Vec<Field>,
}

impl std::fmt::Debug for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolution")
            .field("config", &self.config)
            .field("report", &self.report)
            .finish_non_exhaustive()
    }
}

impl Resolution {
    /// One `key = value  # source` line per field, secrets redacted.
    pub fn render(&self) -> String {
        let width = self.fields.iter().map(|f| f.path.len()).max().unwrap_or(0);
        let mut out = String::new();
        for field in &self.fields {
            let source = self.report.source_of(field.path);
            let _ = writeln!(
                out,
                "{:<width$} = {}  # {}",
                field.path,
                field.render(&self.config),
                source,
            );
        }
        out
    }
}
