//! Runtime configuration from `SPENDLOG_*` environment variables.
//!
//! | Variable                     | Default            |
//! |------------------------------|--------------------|
//! | `SPENDLOG_DB_PATH`           | in-memory database |
//! | `SPENDLOG_LOG_LEVEL`         | build default      |
//! | `SPENDLOG_LOG_DIR`           | logging disabled   |
//! | `SPENDLOG_DEFAULT_PAGE_SIZE` | 10                 |
//! | `SPENDLOG_MAX_PAGE_SIZE`     | 1000               |
//!
//! Empty values count as unset.

use crate::logging::{init_logging, LogLevel, LoggingError};
use crate::query::page::{PageLimits, MAX_PAGE_SIZE};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const ENV_DB_PATH: &str = "SPENDLOG_DB_PATH";
pub const ENV_LOG_LEVEL: &str = "SPENDLOG_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "SPENDLOG_LOG_DIR";
pub const ENV_DEFAULT_PAGE_SIZE: &str = "SPENDLOG_DEFAULT_PAGE_SIZE";
pub const ENV_MAX_PAGE_SIZE: &str = "SPENDLOG_MAX_PAGE_SIZE";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { key, value, reason } => {
                write!(f, "invalid {key}=`{value}`: {reason}")
            }
        }
    }
}

impl Error for ConfigError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    /// Database file; `None` opens an in-memory database.
    pub db_path: Option<PathBuf>,
    pub log_level: LogLevel,
    /// Log directory; `None` leaves logging uninitialized.
    pub log_dir: Option<PathBuf>,
    pub page_limits: PageLimits,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            log_level: LogLevel::build_default(),
            log_dir: None,
            page_limits: PageLimits::default(),
        }
    }
}

impl CoreConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mut config = Self::default();
        config.db_path = read(ENV_DB_PATH).map(PathBuf::from);
        config.log_dir = read(ENV_LOG_DIR).map(PathBuf::from);
        if let Some(raw) = read(ENV_LOG_LEVEL) {
            config.log_level = LogLevel::parse(&raw).map_err(|err| ConfigError::InvalidValue {
                key: ENV_LOG_LEVEL,
                value: raw.clone(),
                reason: err.to_string(),
            })?;
        }

        let max_limit = match read(ENV_MAX_PAGE_SIZE) {
            Some(raw) => parse_page_size(ENV_MAX_PAGE_SIZE, &raw, MAX_PAGE_SIZE)?,
            None => config.page_limits.max_limit,
        };
        let default_limit = match read(ENV_DEFAULT_PAGE_SIZE) {
            Some(raw) => parse_page_size(ENV_DEFAULT_PAGE_SIZE, &raw, max_limit)?,
            None => config.page_limits.default_limit.min(max_limit),
        };
        config.page_limits = PageLimits {
            default_limit,
            max_limit,
        };
        Ok(config)
    }

    /// Starts file logging when a log directory is configured.
    ///
    /// Returns whether logging is active afterwards.
    pub fn init_logging(&self) -> Result<bool, LoggingError> {
        match &self.log_dir {
            Some(dir) => init_logging(self.log_level, dir).map(|()| true),
            None => Ok(false),
        }
    }
}

fn parse_page_size(key: &'static str, raw: &str, max: u32) -> Result<u32, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidValue {
        key,
        value: raw.to_string(),
        reason,
    };
    let size = raw
        .parse::<u32>()
        .map_err(|err| invalid(err.to_string()))?;
    if size == 0 {
        return Err(invalid("must be greater than zero".to_string()));
    }
    if size > max {
        return Err(invalid(format!("must not exceed {max}")));
    }
    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, CoreConfig, ENV_DEFAULT_PAGE_SIZE, ENV_LOG_LEVEL, ENV_MAX_PAGE_SIZE};
    use crate::logging::LogLevel;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect::<HashMap<_, _>>();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let config = CoreConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, CoreConfig::default());
        assert_eq!(config.page_limits.default_limit, 10);
        assert_eq!(config.page_limits.max_limit, 1000);
    }

    #[test]
    fn values_are_read_and_trimmed() {
        let config = CoreConfig::from_lookup(lookup(&[
            ("SPENDLOG_DB_PATH", " /tmp/spend.db "),
            (ENV_LOG_LEVEL, "WARN"),
            (ENV_MAX_PAGE_SIZE, "200"),
            (ENV_DEFAULT_PAGE_SIZE, "25"),
            ("SPENDLOG_LOG_DIR", ""),
        ]))
        .unwrap();
        assert_eq!(config.db_path, Some(PathBuf::from("/tmp/spend.db")));
        assert_eq!(config.log_level, LogLevel::Warn);
        assert_eq!(config.log_dir, None);
        assert_eq!(config.page_limits.max_limit, 200);
        assert_eq!(config.page_limits.default_limit, 25);
    }

    #[test]
    fn page_sizes_are_validated() {
        let err = CoreConfig::from_lookup(lookup(&[(ENV_MAX_PAGE_SIZE, "5000")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: ENV_MAX_PAGE_SIZE,
                ..
            }
        ));

        let err = CoreConfig::from_lookup(lookup(&[
            (ENV_MAX_PAGE_SIZE, "20"),
            (ENV_DEFAULT_PAGE_SIZE, "50"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: ENV_DEFAULT_PAGE_SIZE,
                ..
            }
        ));

        let config = CoreConfig::from_lookup(lookup(&[(ENV_MAX_PAGE_SIZE, "5")])).unwrap();
        assert_eq!(config.page_limits.default_limit, 5);
    }

    #[test]
    fn unknown_log_level_is_rejected() {
        let err = CoreConfig::from_lookup(lookup(&[(ENV_LOG_LEVEL, "loud")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: ENV_LOG_LEVEL,
                ..
            }
        ));
    }
}
