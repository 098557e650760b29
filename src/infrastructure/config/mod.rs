//! Configuration loading with hierarchical merging.

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::AgentConfig;

/// Configuration error types.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid max_concurrent_tasks: {0}. Must be between 1 and 32")]
    InvalidMaxConcurrentTasks(usize),

    #[error("Invalid failure_threshold: {0}. Cannot be 0")]
    InvalidFailureThreshold(u32),

    #[error("Invalid half_open_success_threshold: {0}. Cannot be 0")]
    InvalidHalfOpenSuccessThreshold(u32),

    #[error("Invalid backoff_base_ms: {0}. Cannot be 0")]
    InvalidBackoffBase(u64),

    #[error("Invalid poll_interval_secs: {0}. Cannot be 0")]
    InvalidPollInterval(u64),

    #[error("Invalid task_timeout_secs: {0}. Cannot be 0")]
    InvalidTaskTimeout(u64),

    #[error("Coordinator base_url cannot be empty")]
    EmptyBaseUrl,

    #[error("Agent id cannot be empty")]
    EmptyAgentId,

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),
}

/// Configuration loader with hierarchical merging.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .forager/config.yaml (project config)
    /// 3. .forager/local.yaml (local overrides, optional)
    /// 4. Environment variables (FORAGER_* prefix, highest priority)
    pub fn load() -> Result<AgentConfig> {
        let config: AgentConfig = Figment::new()
            .merge(Serialized::defaults(AgentConfig::default()))
            .merge(Yaml::file(".forager/config.yaml"))
            .merge(Yaml::file(".forager/local.yaml"))
            .merge(Env::prefixed("FORAGER_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, still honoring env vars.
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<AgentConfig> {
        let config: AgentConfig = Figment::new()
            .merge(Serialized::defaults(AgentConfig::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("FORAGER_").split("__"))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading.
    pub fn validate(config: &AgentConfig) -> Result<(), ConfigError> {
        if config.agent_id.is_empty() {
            return Err(ConfigError::EmptyAgentId);
        }

        if config.coordinator.base_url.is_empty() {
            return Err(ConfigError::EmptyBaseUrl);
        }

        let max_concurrent = config.runtime.max_concurrent_tasks;
        if max_concurrent == 0 || max_concurrent > 32 {
            return Err(ConfigError::InvalidMaxConcurrentTasks(max_concurrent));
        }

        if config.runtime.poll_interval_secs == 0 {
            return Err(ConfigError::InvalidPollInterval(
                config.runtime.poll_interval_secs,
            ));
        }

        if config.runtime.task_timeout_secs == 0 {
            return Err(ConfigError::InvalidTaskTimeout(
                config.runtime.task_timeout_secs,
            ));
        }

        if config.retry.backoff_base_ms == 0 {
            return Err(ConfigError::InvalidBackoffBase(config.retry.backoff_base_ms));
        }

        if config.breaker.failure_threshold == 0 {
            return Err(ConfigError::InvalidFailureThreshold(
                config.breaker.failure_threshold,
            ));
        }

        if config.breaker.half_open_success_threshold == 0 {
            return Err(ConfigError::InvalidHalfOpenSuccessThreshold(
                config.breaker.half_open_success_threshold,
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AgentConfig::default();
        ConfigLoader::validate(&config).expect("default config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
agent_id: forager-test
runtime:
  poll_interval_secs: 15
  max_concurrent_tasks: 4
retry:
  max_retries: 5
  backoff_base_ms: 2000
breaker:
  failure_threshold: 7
";

        let config: AgentConfig = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert_eq!(config.agent_id, "forager-test");
        assert_eq!(config.runtime.poll_interval_secs, 15);
        assert_eq!(config.runtime.max_concurrent_tasks, 4);
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.backoff_base_ms, 2000);
        assert_eq!(config.breaker.failure_threshold, 7);
        // Untouched sections keep their defaults.
        assert_eq!(config.runtime.task_timeout_secs, 300);
        assert_eq!(config.breaker.reset_timeout_secs, 30);

        ConfigLoader::validate(&config).expect("parsed config should be valid");
    }

    #[test]
    fn test_validate_zero_concurrency() {
        let mut config = AgentConfig::default();
        config.runtime.max_concurrent_tasks = 0;

        let result = ConfigLoader::validate(&config);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InvalidMaxConcurrentTasks(0)
        ));
    }

    #[test]
    fn test_validate_excessive_concurrency() {
        let mut config = AgentConfig::default();
        config.runtime.max_concurrent_tasks = 33;

        let result = ConfigLoader::validate(&config);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InvalidMaxConcurrentTasks(33)
        ));
    }

    #[test]
    fn test_validate_empty_base_url() {
        let mut config = AgentConfig::default();
        config.coordinator.base_url = String::new();

        let result = ConfigLoader::validate(&config);
        assert!(matches!(result.unwrap_err(), ConfigError::EmptyBaseUrl));
    }

    #[test]
    fn test_validate_zero_failure_threshold() {
        let mut config = AgentConfig::default();
        config.breaker.failure_threshold = 0;

        let result = ConfigLoader::validate(&config);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InvalidFailureThreshold(0)
        ));
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = AgentConfig::default();
        config.logging.level = "verbose".to_string();

        let result = ConfigLoader::validate(&config);
        match result.unwrap_err() {
            ConfigError::InvalidLogLevel(level) => assert_eq!(level, "verbose"),
            other => panic!("expected InvalidLogLevel, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_invalid_log_format() {
        let mut config = AgentConfig::default();
        config.logging.format = "xml".to_string();

        let result = ConfigLoader::validate(&config);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InvalidLogFormat(_)
        ));
    }

    #[test]
    fn test_hierarchical_merging() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut base_file = NamedTempFile::new().unwrap();
        writeln!(
            base_file,
            "runtime:\n  poll_interval_secs: 20\n  max_concurrent_tasks: 2"
        )
        .unwrap();
        base_file.flush().unwrap();

        let mut override_file = NamedTempFile::new().unwrap();
        writeln!(override_file, "runtime:\n  poll_interval_secs: 5").unwrap();
        override_file.flush().unwrap();

        let config: AgentConfig = Figment::new()
            .merge(Serialized::defaults(AgentConfig::default()))
            .merge(Yaml::file(base_file.path()))
            .merge(Yaml::file(override_file.path()))
            .extract()
            .unwrap();

        assert_eq!(config.runtime.poll_interval_secs, 5, "override should win");
        assert_eq!(
            config.runtime.max_concurrent_tasks, 2,
            "base value should persist when not overridden"
        );
    }
}
