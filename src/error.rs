//! Structured error types for configuration resolution and persistence.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal failure while resolving the service configuration.
///
/// Resolution stops at the first of these; non-fatal conditions (missing or
/// malformed overlay, unknown log level) never surface here.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The base document does not exist (or no path was given).
    #[error("config file not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// The base document exists but could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document is malformed or in an unsupported format.
    #[error("parse error in {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    /// A raw value could not be coerced into the field's type.
    #[error("invalid value for `{key}`: expected {expected}, got {found}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: String,
    },
}

impl ConfigError {
    pub(crate) fn parse(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        Self::Parse {
            path: path.into(),
            message: err.to_string(),
        }
    }

    pub(crate) fn mismatch(key: impl Into<String>, expected: &'static str, found: impl Into<String>) -> Self {
        Self::TypeMismatch {
            key: key.into(),
            expected,
            found: found.into(),
        }
    }
}

/// Failure opening or using the connection pool.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("unsupported database driver `{0}` (supported: sqlite)")]
    UnsupportedDriver(String),

    #[error("database.dsn is empty")]
    MissingDsn,

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("connection pool is closed")]
    Closed,

    #[error("database worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// Result type for resolution.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_not_found_display_names_path() {
        let e = ConfigError::NotFound {
            path: PathBuf::from("/app/conf/confyg.yaml"),
        };
        assert_eq!(e.to_string(), "config file not found: /app/conf/confyg.yaml");
    }

    #[test]
    fn test_type_mismatch_display() {
        let e = ConfigError::mismatch("database.max_open_conns", "an integer", "\"abc\"");
        let msg = e.to_string();
        assert!(msg.contains("database.max_open_conns"));
        assert!(msg.contains("an integer"));
        assert!(msg.contains("abc"));
    }

    #[test]
    fn test_io_error_keeps_source() {
        let e = ConfigError::Io {
            path: PathBuf::from("x.yaml"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(e.source().is_some());
    }

    #[test]
    fn test_db_error_from_sqlite() {
        let e: DbError = rusqlite::Error::InvalidQuery.into();
        assert!(e.to_string().starts_with("sqlite error"));
    }
}
