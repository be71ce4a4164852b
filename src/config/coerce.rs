//! Coercion of raw tree values into typed field values.
//!
//! Files carry native YAML/JSON/TOML types; environment overrides are always
//! strings. Every function here accepts both forms.

use crate::error::{ConfigError, ConfigResult};
use serde_json::Value;
use std::time::Duration;

/// Render a raw value for error messages.
fn describe(value: &Value) -> String {
    match value {
        Value::String(s) => format!("{s:?}"),
        other => other.to_string(),
    }
}

/// Base-10 integer from a number or numeric string.
pub fn integer(key: &str, value: &Value) -> ConfigResult<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| ConfigError::mismatch(key, "an integer", describe(value))),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| ConfigError::mismatch(key, "an integer", describe(value))),
        _ => Err(ConfigError::mismatch(key, "an integer", describe(value))),
    }
}

/// Non-negative integer that fits in `u32`.
pub fn unsigned(key: &str, value: &Value) -> ConfigResult<u32> {
    let n = integer(key, value)?;
    u32::try_from(n).map_err(|_| ConfigError::mismatch(key, "a non-negative integer", n.to_string()))
}

/// TCP port, 1 through 65535.
pub fn port(key: &str, value: &Value) -> ConfigResult<u16> {
    let n = integer(key, value)?;
    match u16::try_from(n) {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(ConfigError::mismatch(key, "a port in 1..=65535", n.to_string())),
    }
}

/// Boolean from a native bool or one of the canonical textual forms.
pub fn boolean(key: &str, value: &Value) -> ConfigResult<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) => match s.trim() {
            "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
            "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
            _ => Err(ConfigError::mismatch(key, "a boolean", describe(value))),
        },
        _ => Err(ConfigError::mismatch(key, "a boolean", describe(value))),
    }
}

/// Time span from a compact literal (`30s`, `5m`, `1h30m`, `250ms`).
///
/// Bare integers, native or textual, are whole seconds; `"0"` is zero.
pub fn duration(key: &str, value: &Value) -> ConfigResult<Duration> {
    const EXPECTED: &str = "a duration such as \"30s\" or \"5m\"";
    match value {
        Value::Number(n) => n
            .as_u64()
            .map(Duration::from_secs)
            .ok_or_else(|| ConfigError::mismatch(key, EXPECTED, describe(value))),
        Value::String(s) => {
            let literal = s.trim();
            if let Ok(secs) = literal.parse::<u64>() {
                return Ok(Duration::from_secs(secs));
            }
            humantime::parse_duration(literal)
                .map_err(|_| ConfigError::mismatch(key, EXPECTED, describe(value)))
        }
        _ => Err(ConfigError::mismatch(key, EXPECTED, describe(value))),
    }
}

/// Free-form string. Numbers and booleans are rendered to text.
pub fn string(key: &str, value: &Value) -> ConfigResult<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(ConfigError::mismatch(key, "a string", describe(value))),
    }
}

/// List of strings from a sequence, or from a comma-separated string.
///
/// Items are trimmed; empty items are dropped.
pub fn string_list(key: &str, value: &Value) -> ConfigResult<Vec<String>> {
    let items = match value {
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Array(_) | Value::Object(_) | Value::Null => {
                    Err(ConfigError::mismatch(key, "a list of strings", describe(value)))
                }
                scalar => string(key, scalar),
            })
            .collect::<ConfigResult<Vec<_>>>()?,
        Value::String(s) => s.split(',').map(str::to_string).collect(),
        _ => return Err(ConfigError::mismatch(key, "a list of strings", describe(value))),
    };

    Ok(items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect())
}
