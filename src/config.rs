//! Runtime configuration parsed from environment variables.
//!
//! All settings can be overridden via environment variables prefixed with
//! `SQLRE_`, and CLI flags take precedence over both.

use std::env;
use std::str::FromStr;

use thiserror::Error;

use crate::core::{GroupPolicy, DEFAULT_CAPACITY};

/// Errors raised while reading configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Log level enumeration matching tracing crate levels.
///
/// Defaults to `Warn` so library consumers see nothing unless asked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    #[default]
    Warn,
    Error,
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(ConfigError::InvalidConfig(format!(
                "unknown log level '{s}', expected one of: trace, debug, info, warn, error"
            ))),
        }
    }
}

impl LogLevel {
    /// Convert to a tracing filter directive string.
    #[must_use]
    pub fn as_filter_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Session configuration.
///
/// # Environment Variables
///
/// - `SQLRE_CACHE_SIZE`: number of compiled patterns kept per session
/// - `SQLRE_ALL_GROUPS`: when true, unfiltered table scans emit every group
/// - `SQLRE_LOG_LEVEL`: trace, debug, info, warn or error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub cache_capacity: usize,
    pub group_policy: GroupPolicy,
    pub log_level: LogLevel,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CAPACITY,
            group_policy: GroupPolicy::default(),
            log_level: LogLevel::default(),
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidConfig` if a variable holds an invalid
    /// value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(val) = lookup("SQLRE_CACHE_SIZE") {
            config.cache_capacity = match val.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::InvalidConfig(format!(
                        "invalid cache size '{val}', expected a positive integer"
                    )))
                }
            };
        }

        if let Some(val) = lookup("SQLRE_ALL_GROUPS") {
            config.group_policy = if parse_flag(&val)? {
                GroupPolicy::AllGroups
            } else {
                GroupPolicy::WholeMatch
            };
        }

        if let Some(val) = lookup("SQLRE_LOG_LEVEL") {
            config.log_level = val.parse()?;
        }

        Ok(config)
    }

    /// Apply optional overrides, typically from CLI flags.
    #[must_use]
    pub fn apply_overrides(
        mut self,
        cache_capacity: Option<usize>,
        all_groups: bool,
        log_level: Option<LogLevel>,
    ) -> Self {
        if let Some(n) = cache_capacity {
            self.cache_capacity = n.max(1);
        }
        if all_groups {
            self.group_policy = GroupPolicy::AllGroups;
        }
        if let Some(level) = log_level {
            self.log_level = level;
        }
        self
    }

    #[must_use]
    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }
}

fn parse_flag(val: &str) -> Result<bool, ConfigError> {
    match val.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidConfig(format!(
            "invalid flag '{val}', expected true or false"
        ))),
    }
}
