//! Structured logging for the command-line tool.
//!
//! Logs go to stderr so that command output on stdout stays parseable.

use tracing_subscriber::EnvFilter;

use crate::config::Config;

fn filter_from_config(config: &Config) -> EnvFilter {
    EnvFilter::new(config.log_level.as_filter_str())
}

/// Initialise the logging subsystem based on configuration.
///
/// Log level precedence (highest to lowest):
///
/// 1. CLI `--log-level`
/// 2. `SQLRE_LOG_LEVEL`
/// 3. Default configuration value
///
/// If a global subscriber is already set the call is a no-op.
pub fn init_logging(config: &Config) {
    let filter = filter_from_config(config);

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .finish();

    // First subscriber wins
    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn init_logging_is_idempotent() {
        let config = Config::default();
        init_logging(&config);
        init_logging(&config);
    }

    #[test]
    fn filter_uses_config_log_level() {
        let config = Config::default().with_log_level(LogLevel::Debug);
        assert_eq!(filter_from_config(&config).to_string(), "debug");
    }
}
