//! core::config::schema
//!
//! Store configuration schema.
//!
//! # Validation
//!
//! Values are validated after parsing so that a loaded config can always
//! build a working store (e.g., history capacity must be at least one).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Store configuration.
///
/// Every field is optional in the file; missing fields take the defaults
/// documented below.
///
/// # Example
///
/// ```toml
/// enable_history = true
/// max_history_size = 50
/// default_timeout_ms = 5000
/// retry_attempts = 2
/// retry_delay_ms = 250
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Record undo/redo history (default: true)
    pub enable_history: bool,

    /// Maximum number of history snapshots (default: 100)
    pub max_history_size: usize,

    /// Emit store events to the configured sink (default: true)
    pub enable_events: bool,

    /// Trace every write at debug level (default: false)
    pub enable_debug: bool,

    /// Timeout applied to async operations without their own; 0 disables (default: 30000)
    pub default_timeout_ms: u64,

    /// Retries for failed async factories (default: 0)
    pub retry_attempts: u32,

    /// Delay between retries (default: 1000)
    pub retry_delay_ms: u64,

    /// Estimate memory footprint (default: true)
    pub enable_memory_tracking: bool,

    /// Keep operation counters and latency statistics (default: true)
    pub enable_performance_tracking: bool,

    /// Minimum interval between memory re-estimates (default: 1000)
    pub memory_update_threshold_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            enable_history: true,
            max_history_size: 100,
            enable_events: true,
            enable_debug: false,
            default_timeout_ms: 30_000,
            retry_attempts: 0,
            retry_delay_ms: 1_000,
            enable_memory_tracking: true,
            enable_performance_tracking: true,
            memory_update_threshold_ms: 1_000,
        }
    }
}

impl StoreConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_history_size == 0 {
            return Err(ConfigError::InvalidValue(
                "max_history_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// The default async timeout, if enabled.
    pub fn default_timeout(&self) -> Option<Duration> {
        (self.default_timeout_ms > 0).then(|| Duration::from_millis(self.default_timeout_ms))
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn memory_update_threshold(&self) -> Duration {
        Duration::from_millis(self.memory_update_threshold_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = StoreConfig::default();
        assert!(config.enable_history);
        assert_eq!(config.max_history_size, 100);
        assert!(config.enable_events);
        assert!(!config.enable_debug);
        assert_eq!(config.default_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.retry_attempts, 0);
        assert_eq!(config.retry_delay(), Duration::from_secs(1));
        assert!(config.enable_memory_tracking);
        assert!(config.enable_performance_tracking);
        assert_eq!(config.memory_update_threshold(), Duration::from_secs(1));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: StoreConfig = toml::from_str("max_history_size = 3\nretry_attempts = 2").unwrap();
        assert_eq!(config.max_history_size, 3);
        assert_eq!(config.retry_attempts, 2);
        assert!(config.enable_history);
    }

    #[test]
    fn unknown_fields_rejected() {
        let result: Result<StoreConfig, _> = toml::from_str("history = true");
        assert!(result.is_err());
    }

    #[test]
    fn zero_history_size_invalid() {
        let config = StoreConfig {
            max_history_size: 0,
            ..StoreConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_timeout_disables_default() {
        let config = StoreConfig {
            default_timeout_ms: 0,
            ..StoreConfig::default()
        };
        assert_eq!(config.default_timeout(), None);
    }
}
