//! The field table: one entry per leaf of [`Config`].
//!
//! Each entry pairs a key path with a coercion+setter and a renderer. The
//! decoder walks this table instead of introspecting the struct, so the
//! mapping from document keys to fields is spelled out in one place.

use super::coerce;
use super::types::{Config, LogLevel, Secret};
use crate::error::ConfigResult;
use serde_json::Value;
use std::time::Duration;

type Apply = fn(&mut Config, &str, &Value, &mut Vec<String>) -> ConfigResult<()>;
type Render = fn(&Config) -> String;

/// One leaf of the schema.
pub struct Field {
    pub path: &'static str,
    apply: Apply,
    render: Render,
}

impl Field {
    fn new(path: &'static str, apply: Apply, render: Render) -> Self {
        Self {
            path,
            apply,
            render,
        }
    }

    /// Coerce `raw` and store it in `config`. Non-fatal oddities are pushed
    /// onto `warnings`.
    pub fn apply(&self, config: &mut Config, raw: &Value, warnings: &mut Vec<String>) -> ConfigResult<()> {
        (self.apply)(config, self.path, raw, warnings)
    }

    /// Display form of the field's current value. Secrets are redacted.
    pub fn render(&self, config: &Config) -> String {
        (self.render)(config)
    }
}

fn show_duration(d: Duration) -> String {
    if d.is_zero() {
        "0s".to_string()
    } else {
        humantime::format_duration(d).to_string()
    }
}

fn show_list(items: &[String]) -> String {
    format!("[{}]", items.join(", "))
}

/// Build the table. Order is the order keys are listed and reported.
pub fn table() -> Vec<Field> {
    vec![
        Field::new(
            "server.port",
            |c, k, v, _| {
                c.server.port = coerce::port(k, v)?;
                Ok(())
            },
            |c| c.server.port.to_string(),
        ),
        Field::new(
            "server.env",
            |c, k, v, _| {
                c.server.env = coerce::string(k, v)?;
                Ok(())
            },
            |c| c.server.env.clone(),
        ),
        Field::new(
            "server.read_timeout",
            |c, k, v, _| {
                c.server.read_timeout = coerce::duration(k, v)?;
                Ok(())
            },
            |c| show_duration(c.server.read_timeout),
        ),
        Field::new(
            "server.write_timeout",
            |c, k, v, _| {
                c.server.write_timeout = coerce::duration(k, v)?;
                Ok(())
            },
            |c| show_duration(c.server.write_timeout),
        ),
        Field::new(
            "server.cors.allow_origins",
            |c, k, v, _| {
                c.server.cors.allow_origins = coerce::string_list(k, v)?;
                Ok(())
            },
            |c| show_list(&c.server.cors.allow_origins),
        ),
        Field::new(
            "server.cors.allow_methods",
            |c, k, v, _| {
                c.server.cors.allow_methods = coerce::string_list(k, v)?;
                Ok(())
            },
            |c| show_list(&c.server.cors.allow_methods),
        ),
        Field::new(
            "server.cors.allow_headers",
            |c, k, v, _| {
                c.server.cors.allow_headers = coerce::string_list(k, v)?;
                Ok(())
            },
            |c| show_list(&c.server.cors.allow_headers),
        ),
        Field::new(
            "server.cors.allow_credentials",
            |c, k, v, _| {
                c.server.cors.allow_credentials = coerce::boolean(k, v)?;
                Ok(())
            },
            |c| c.server.cors.allow_credentials.to_string(),
        ),
        Field::new(
            "log.level",
            |c, k, v, warnings| {
                let level = coerce::string(k, v).ok().and_then(|raw| LogLevel::parse(&raw));
                c.log.level = level.unwrap_or_else(|| {
                    warnings.push(format!(
                        "unrecognized {k} {v}, falling back to {}",
                        LogLevel::default()
                    ));
                    LogLevel::default()
                });
                Ok(())
            },
            |c| c.log.level.to_string(),
        ),
        Field::new(
            "log.json",
            |c, k, v, _| {
                c.log.json = coerce::boolean(k, v)?;
                Ok(())
            },
            |c| c.log.json.to_string(),
        ),
        Field::new(
            "jwt.secret",
            |c, k, v, _| {
                c.jwt.secret = Secret::new(coerce::string(k, v)?);
                Ok(())
            },
            |c| c.jwt.secret.to_string(),
        ),
        Field::new(
            "jwt.access_ttl",
            |c, k, v, _| {
                c.jwt.access_ttl = coerce::duration(k, v)?;
                Ok(())
            },
            |c| show_duration(c.jwt.access_ttl),
        ),
        Field::new(
            "jwt.refresh_ttl",
            |c, k, v, _| {
                c.jwt.refresh_ttl = coerce::duration(k, v)?;
                Ok(())
            },
            |c| show_duration(c.jwt.refresh_ttl),
        ),
        Field::new(
            "database.driver",
            |c, k, v, _| {
                c.database.driver = coerce::string(k, v)?;
                Ok(())
            },
            |c| c.database.driver.clone(),
        ),
        Field::new(
            "database.dsn",
            |c, k, v, _| {
                c.database.dsn = Secret::new(coerce::string(k, v)?);
                Ok(())
            },
            |c| c.database.dsn.to_string(),
        ),
        Field::new(
            "database.max_open_conns",
            |c, k, v, _| {
                c.database.max_open_conns = coerce::unsigned(k, v)?;
                Ok(())
            },
            |c| c.database.max_open_conns.to_string(),
        ),
        Field::new(
            "database.max_idle_conns",
            |c, k, v, _| {
                c.database.max_idle_conns = coerce::unsigned(k, v)?;
                Ok(())
            },
            |c| c.database.max_idle_conns.to_string(),
        ),
        Field::new(
            "database.conn_max_lifetime",
            |c, k, v, _| {
                c.database.conn_max_lifetime = coerce::duration(k, v)?;
                Ok(())
            },
            |c| show_duration(c.database.conn_max_lifetime),
        ),
        Field::new(
            "security.rate_limit.enabled",
            |c, k, v, _| {
                c.security.rate_limit.enabled = coerce::boolean(k, v)?;
                Ok(())
            },
            |c| c.security.rate_limit.enabled.to_string(),
        ),
        Field::new(
            "security.rate_limit.rps",
            |c, k, v, _| {
                c.security.rate_limit.rps = coerce::unsigned(k, v)?;
                Ok(())
            },
            |c| c.security.rate_limit.rps.to_string(),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::keypath::KeyPath;
    use serde_json::json;
    use std::collections::HashSet;

    #[test]
    fn test_paths_are_unique() {
        let fields = table();
        let unique: HashSet<_> = fields.iter().map(|f| f.path).collect();
        assert_eq!(unique.len(), fields.len());
    }

    #[test]
    fn test_every_field_has_distinct_env_var() {
        let fields = table();
        let vars: HashSet<_> = fields
            .iter()
            .map(|f| KeyPath::new(f.path).env_var("APP"))
            .collect();
        assert_eq!(vars.len(), fields.len());
        assert!(vars.contains("APP_SECURITY_RATE_LIMIT_RPS"));
        assert!(vars.contains("APP_SERVER_CORS_ALLOW_ORIGINS"));
    }

    #[test]
    fn test_unknown_log_level_warns_and_defaults() {
        let fields = table();
        let field = fields.iter().find(|f| f.path == "log.level").unwrap();
        let mut config = Config::default();
        config.log.level = LogLevel::Error;
        let mut warnings = Vec::new();
        field.apply(&mut config, &json!("LOUD"), &mut warnings).unwrap();
        assert_eq!(config.log.level, LogLevel::Info);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("LOUD"));
    }

    #[test]
    fn test_non_scalar_log_level_warns_and_defaults() {
        let fields = table();
        let field = fields.iter().find(|f| f.path == "log.level").unwrap();
        let mut config = Config::default();
        config.log.level = LogLevel::Warn;
        let mut warnings = Vec::new();
        field
            .apply(&mut config, &json!(["debug"]), &mut warnings)
            .unwrap();
        assert_eq!(config.log.level, LogLevel::Info);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("debug"));
    }

    #[test]
    fn test_render_redacts_secrets() {
        let fields = table();
        let mut config = Config::default();
        config.jwt.secret = Secret::new("s3cr3t");
        let secret = fields.iter().find(|f| f.path == "jwt.secret").unwrap();
        assert_eq!(secret.render(&config), "<redacted>");
        let lifetime = fields
            .iter()
            .find(|f| f.path == "database.conn_max_lifetime")
            .unwrap();
        assert_eq!(lifetime.render(&config), "1h");
    }
}
