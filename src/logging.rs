//! Logger construction from the resolved `log` settings.
//!
//! Logging starts only after configuration is resolved, so resolution itself
//! cannot log; its warnings are carried in the report and emitted here.

use crate::config::{LogConfig, LogLevel, ResolutionReport};
use anyhow::Result;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Convert a configured level to a tracing level.
pub fn log_level_to_tracing(level: LogLevel) -> Level {
    match level {
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Info => Level::INFO,
        LogLevel::Warn => Level::WARN,
        LogLevel::Error => Level::ERROR,
    }
}

/// Install the global subscriber: JSON lines when `log.json` is set,
/// human-readable output otherwise. Both write to stderr.
pub fn init(config: &LogConfig) -> Result<()> {
    let level = log_level_to_tracing(config.level);
    if config.json {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_writer(std::io::stderr)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_writer(std::io::stderr)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }
    Ok(())
}

/// Emit what resolution decided, now that a subscriber exists.
pub fn log_resolution(report: &ResolutionReport) {
    for warning in &report.warnings {
        warn!("{}", warning);
    }
    if !report.ignored_keys.is_empty() {
        warn!(keys = ?report.ignored_keys, "Ignoring unknown configuration keys");
    }
    info!(
        base = %report.base_path.display(),
        overlay = ?report.overlay_path,
        env_overrides = ?report.applied_env,
        "Configuration loaded"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_to_tracing() {
        assert_eq!(log_level_to_tracing(LogLevel::Debug), Level::DEBUG);
        assert_eq!(log_level_to_tracing(LogLevel::Info), Level::INFO);
        assert_eq!(log_level_to_tracing(LogLevel::Warn), Level::WARN);
        assert_eq!(log_level_to_tracing(LogLevel::Error), Level::ERROR);
    }

    #[test]
    fn test_level_order_matches_tracing() {
        // tracing orders more verbose levels as greater
        assert!(log_level_to_tracing(LogLevel::Debug) > log_level_to_tracing(LogLevel::Error));
        assert!(LogLevel::Debug < LogLevel::Error);
    }

    #[test]
    fn test_init_twice_fails_second_time() {
        let config = LogConfig::default();
        let first = init(&config);
        let second = init(&config);
        // Another test may have installed a subscriber first.
        assert!(first.is_ok() || second.is_err());
        assert!(second.is_err());
    }
}
