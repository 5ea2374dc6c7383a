//! core::config
//!
//! Configuration schema and loading.
//!
//! # Precedence
//!
//! The store configuration is resolved in this order (first match wins):
//! 1. An explicit file path
//! 2. `$ARCSTATE_CONFIG` if set
//! 3. Default values
//!
//! Missing fields in a file take their defaults; unknown fields are an error.
//! A `$ARCSTATE_CONFIG` naming a file that does not exist falls back to the
//! defaults and is reported in [`ConfigLoadResult::warnings`].
//!
//! # Example
//!
//! ```no_run
//! use arcade_state::core::config::Config;
//! use std::path::Path;
//!
//! let result = Config::load(Some(Path::new("arcstate.toml"))).unwrap();
//! println!("history size: {}", result.config.store.max_history_size);
//! ```

pub mod schema;

pub use schema::StoreConfig;

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "ARCSTATE_CONFIG";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Result of loading configuration.
#[derive(Debug)]
pub struct ConfigLoadResult {
    /// The loaded configuration.
    pub config: Config,
    /// Problems that did not stop loading.
    pub warnings: Vec<String>,
}

/// Loaded configuration and where it came from.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Store settings
    pub store: StoreConfig,
    /// Path to the config file (if one was loaded)
    source: Option<PathBuf>,
}

impl Config {
    /// Load configuration.
    ///
    /// An explicit path must exist. The environment path is used only when
    /// the file exists; otherwise defaults apply and a warning is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file cannot be read, parsed, or validated.
    pub fn load(path: Option<&Path>) -> Result<ConfigLoadResult, ConfigError> {
        let env_path = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        Self::load_from(path, env_path)
    }

    fn load_from(
        path: Option<&Path>,
        env_path: Option<PathBuf>,
    ) -> Result<ConfigLoadResult, ConfigError> {
        let mut warnings = Vec::new();
        let source = match (path, env_path) {
            (Some(p), _) => Some(p.to_path_buf()),
            (None, Some(p)) if p.exists() => Some(p),
            (None, Some(p)) => {
                warnings.push(format!(
                    "${CONFIG_ENV} points to '{}', which does not exist; using defaults",
                    p.display()
                ));
                None
            }
            (None, None) => None,
        };

        let store = match &source {
            Some(p) => Self::read_store_config(p)?,
            None => StoreConfig::default(),
        };
        store.validate()?;

        Ok(ConfigLoadResult {
            config: Config { store, source },
            warnings,
        })
    }

    /// Parse a store config file.
    pub fn read_store_config(path: &Path) -> Result<StoreConfig, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse_store_config(&content, path)
    }

    fn parse_store_config(content: &str, path: &Path) -> Result<StoreConfig, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// The file the configuration was loaded from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(&self.store).map_err(|e| ConfigError::InvalidValue(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn explicit_file_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_history_size = 7\nenable_events = false").unwrap();

        let result = Config::load(Some(file.path())).unwrap();
        assert_eq!(result.config.store.max_history_size, 7);
        assert!(!result.config.store.enable_events);
        assert_eq!(result.config.source(), Some(file.path()));
    }

    #[test]
    fn explicit_file_wins_over_environment() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "retry_attempts = 4").unwrap();

        let result =
            Config::load_from(Some(file.path()), Some(PathBuf::from("/missing/env.toml"))).unwrap();
        assert_eq!(result.config.store.retry_attempts, 4);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn environment_file_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "enable_history = false").unwrap();

        let result = Config::load_from(None, Some(file.path().to_path_buf())).unwrap();
        assert!(!result.config.store.enable_history);
        assert_eq!(result.config.source(), Some(file.path()));
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn missing_environment_file_warns_and_uses_defaults() {
        let result = Config::load_from(None, Some(PathBuf::from("/missing/env.toml"))).unwrap();
        assert_eq!(result.config.store, StoreConfig::default());
        assert_eq!(result.config.source(), None);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("/missing/env.toml"));
    }

    #[test]
    fn no_sources_means_defaults() {
        let result = Config::load_from(None, None).unwrap();
        assert_eq!(result.config.store, StoreConfig::default());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn missing_explicit_file_is_error() {
        let result = Config::load(Some(Path::new("/definitely/not/here.toml")));
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn parse_error_names_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_history_size = \"lots\"").unwrap();

        let err = Config::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
        assert!(err.to_string().contains("failed to parse config file"));
    }

    #[test]
    fn invalid_value_rejected_on_load() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_history_size = 0").unwrap();

        let err = Config::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));
    }

    #[test]
    fn toml_rendering_round_trips() {
        let config = Config::default();
        let text = config.to_toml().unwrap();
        let parsed: StoreConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config.store);
    }
}
