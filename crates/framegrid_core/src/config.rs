//! Environment-driven runtime configuration.
//!
//! Blank variables count as unset.

use crate::logging::{default_log_level, LoggingConfig};
use crate::transfer::export::{ExportOptions, DEFAULT_OBJECT_SLOTS};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const DB_PATH_ENV: &str = "FRAMEGRID_DB_PATH";
pub const LOG_LEVEL_ENV: &str = "FRAMEGRID_LOG_LEVEL";
pub const LOG_DIR_ENV: &str = "FRAMEGRID_LOG_DIR";
pub const EXPORT_SLOTS_ENV: &str = "FRAMEGRID_EXPORT_SLOTS";

const DEFAULT_DB_FILE_NAME: &str = "framegrid.sqlite3";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue {
        variable: &'static str,
        value: String,
        expected: &'static str,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue {
                variable,
                value,
                expected,
            } => write!(f, "{variable}=`{value}` is invalid; expected {expected}"),
        }
    }
}

impl Error for ConfigError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub db_path: PathBuf,
    pub log_level: String,
    pub log_dir: Option<PathBuf>,
    pub object_slots: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: std::env::temp_dir().join(DEFAULT_DB_FILE_NAME),
            log_level: default_log_level().to_string(),
            log_dir: None,
            object_slots: DEFAULT_OBJECT_SLOTS,
        }
    }
}

impl CoreConfig {
    /// Reads the `FRAMEGRID_*` process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolves configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let value = |name: &str| {
            lookup(name)
                .map(|raw| raw.trim().to_string())
                .filter(|trimmed| !trimmed.is_empty())
        };

        let mut config = Self::default();
        if let Some(path) = value(DB_PATH_ENV) {
            config.db_path = PathBuf::from(path);
        }
        if let Some(level) = value(LOG_LEVEL_ENV) {
            config.log_level = level;
        }
        config.log_dir = value(LOG_DIR_ENV).map(PathBuf::from);
        if let Some(raw) = value(EXPORT_SLOTS_ENV) {
            config.object_slots = match raw.parse::<usize>() {
                Ok(slots) if slots > 0 => slots,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        variable: EXPORT_SLOTS_ENV,
                        value: raw,
                        expected: "a positive integer",
                    })
                }
            };
        }
        Ok(config)
    }

    pub fn logging(&self) -> LoggingConfig {
        LoggingConfig {
            level: self.log_level.clone(),
            log_dir: self.log_dir.clone(),
        }
    }

    pub fn export_options(&self) -> ExportOptions {
        ExportOptions {
            object_slots: self.object_slots,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, CoreConfig, DB_PATH_ENV, EXPORT_SLOTS_ENV, LOG_DIR_ENV};
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn config_from(vars: &[(&str, &str)]) -> Result<CoreConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        CoreConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn empty_environment_uses_defaults() {
        assert_eq!(config_from(&[]).unwrap(), CoreConfig::default());
        assert_eq!(CoreConfig::default().export_options().object_slots, 5);
    }

    #[test]
    fn variables_override_defaults_and_blank_means_unset() {
        let config = config_from(&[
            (DB_PATH_ENV, " /data/grid.sqlite3 "),
            (LOG_DIR_ENV, "   "),
            (EXPORT_SLOTS_ENV, "8"),
        ])
        .unwrap();
        assert_eq!(config.db_path, PathBuf::from("/data/grid.sqlite3"));
        assert_eq!(config.log_dir, None);
        assert_eq!(config.object_slots, 8);
    }

    #[test]
    fn zero_or_non_numeric_slots_are_rejected() {
        for raw in ["0", "five"] {
            assert!(matches!(
                config_from(&[(EXPORT_SLOTS_ENV, raw)]),
                Err(ConfigError::InvalidValue { variable, .. }) if variable == EXPORT_SLOTS_ENV
            ));
        }
    }
}
