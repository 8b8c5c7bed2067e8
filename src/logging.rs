//! Logging setup
//!
//! Rolling file output. JSON mode writes the file only; text mode also
//! echoes to stdout. `RUST_LOG`, when set, replaces the configured filter.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::AppConfig;

/// Unknown values fall back to a single never-rotated file
fn rotation_from(name: &str) -> Rotation {
    match name {
        "minutely" => Rotation::MINUTELY,
        "hourly" => Rotation::HOURLY,
        "daily" => Rotation::DAILY,
        _ => Rotation::NEVER,
    }
}

/// Default filter: configured level, with sqlx's per-statement logs held to warn
fn default_filter(config: &AppConfig) -> String {
    format!("{},sqlx=warn", config.log_level)
}

/// Text mode only; JSON goes to the file alone
fn echo_to_stdout(config: &AppConfig) -> bool {
    !config.use_json
}

/// Install the global subscriber. Keep the guard alive for the whole run,
/// dropping it flushes the file writer.
pub fn init_logging(config: &AppConfig) -> WorkerGuard {
    let file_appender = RollingFileAppender::new(
        rotation_from(&config.rotation),
        &config.log_dir,
        &config.log_file,
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(config)));
    let registry = tracing_subscriber::registry().with(filter);

    if echo_to_stdout(config) {
        let file_layer = fmt::layer()
            .with_target(false)
            .with_writer(non_blocking)
            .with_ansi(false);
        let stdout_layer = fmt::layer().with_target(false).with_ansi(true);
        registry.with(file_layer).with(stdout_layer).init();
    } else {
        let file_layer = fmt::layer()
            .json()
            .with_current_span(false)
            .with_target(true)
            .with_writer(non_blocking)
            .with_ansi(false);
        registry.with(file_layer).init();
    }

    guard
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_from() {
        assert_eq!(rotation_from("hourly"), Rotation::HOURLY);
        assert_eq!(rotation_from("daily"), Rotation::DAILY);
        assert_eq!(rotation_from("never"), Rotation::NEVER);
        assert_eq!(rotation_from("weekly"), Rotation::NEVER);
    }

    #[test]
    fn test_default_filter_quiets_sqlx() {
        let config = AppConfig::from_yaml(
            "log_level: debug\nlog_dir: ./logs\nlog_file: c.log\nuse_json: true\nrotation: daily\n",
        )
        .unwrap();
        assert_eq!(default_filter(&config), "debug,sqlx=warn");
        assert!(EnvFilter::try_new(default_filter(&config)).is_ok());
    }

    #[test]
    fn test_json_mode_writes_file_only() {
        let base = "log_level: info\nlog_dir: ./logs\nlog_file: c.log\nrotation: daily\n";
        let json = AppConfig::from_yaml(&format!("{}use_json: true\n", base)).unwrap();
        let text = AppConfig::from_yaml(&format!("{}use_json: false\n", base)).unwrap();
        assert!(!echo_to_stdout(&json));
        assert!(echo_to_stdout(&text));
    }
}
