use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration structure for the forager agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AgentConfig {
    /// Stable identifier this agent registers under.
    #[serde(default = "default_agent_id")]
    pub agent_id: String,

    /// Coordinator endpoint configuration.
    #[serde(default)]
    pub coordinator: CoordinatorConfig,

    /// Control loop configuration.
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Retry policy configuration.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Circuit breaker configuration for coordinator calls.
    #[serde(default)]
    pub breaker: BreakerConfig,

    /// Health reporting configuration.
    #[serde(default)]
    pub health: HealthConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_agent_id() -> String {
    format!("forager-{}", uuid::Uuid::new_v4())
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            agent_id: default_agent_id(),
            coordinator: CoordinatorConfig::default(),
            runtime: RuntimeConfig::default(),
            retry: RetryConfig::default(),
            breaker: BreakerConfig::default(),
            health: HealthConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Coordinator endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CoordinatorConfig {
    /// Base URL of the coordinator API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token attached to every coordinator call.
    #[serde(default)]
    pub token: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

const fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: String::new(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl CoordinatorConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Control loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RuntimeConfig {
    /// Seconds between coordinator polls (also polled immediately after
    /// each task completion).
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Ceiling on concurrently executing tasks.
    #[serde(default = "default_max_concurrent_tasks")]
    pub max_concurrent_tasks: usize,

    /// Hard wall-clock timeout per task execution, in seconds.
    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: u64,

    /// Grace period for in-flight tasks on shutdown, in seconds.
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

const fn default_poll_interval_secs() -> u64 {
    60
}

const fn default_max_concurrent_tasks() -> usize {
    1
}

const fn default_task_timeout_secs() -> u64 {
    300
}

const fn default_shutdown_grace_secs() -> u64 {
    5
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            max_concurrent_tasks: default_max_concurrent_tasks(),
            task_timeout_secs: default_task_timeout_secs(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

impl RuntimeConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

/// Retry policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryConfig {
    /// Maximum number of retry attempts per task.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Linear backoff base in milliseconds; attempt `n` waits `base * n`.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_backoff_base_ms() -> u64 {
    5_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BreakerConfig {
    /// Consecutive failures in CLOSED before the circuit opens.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Seconds the circuit stays open before allowing a trial call.
    #[serde(default = "default_reset_timeout_secs")]
    pub reset_timeout_secs: u64,

    /// Consecutive successes in HALF_OPEN required to close the circuit.
    #[serde(default = "default_half_open_success_threshold")]
    pub half_open_success_threshold: u32,
}

const fn default_failure_threshold() -> u32 {
    3
}

const fn default_reset_timeout_secs() -> u64 {
    30
}

const fn default_half_open_success_threshold() -> u32 {
    2
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            reset_timeout_secs: default_reset_timeout_secs(),
            half_open_success_threshold: default_half_open_success_threshold(),
        }
    }
}

impl BreakerConfig {
    pub fn reset_timeout(&self) -> Duration {
        Duration::from_secs(self.reset_timeout_secs)
    }
}

/// Health reporting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct HealthConfig {
    /// Seconds between heartbeats.
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
}

const fn default_heartbeat_interval_secs() -> u64 {
    10
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
        }
    }
}

impl HealthConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = AgentConfig::default();
        assert_eq!(config.runtime.poll_interval_secs, 60);
        assert_eq!(config.runtime.max_concurrent_tasks, 1);
        assert_eq!(config.runtime.task_timeout_secs, 300);
        assert_eq!(config.runtime.shutdown_grace_secs, 5);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.breaker.failure_threshold, 3);
        assert_eq!(config.breaker.reset_timeout_secs, 30);
        assert_eq!(config.breaker.half_open_success_threshold, 2);
        assert_eq!(config.health.heartbeat_interval_secs, 10);
    }

    #[test]
    fn test_agent_id_is_unique_per_default() {
        let a = AgentConfig::default();
        let b = AgentConfig::default();
        assert_ne!(a.agent_id, b.agent_id);
        assert!(a.agent_id.starts_with("forager-"));
    }

    #[test]
    fn test_duration_accessors() {
        let config = AgentConfig::default();
        assert_eq!(config.runtime.poll_interval(), Duration::from_secs(60));
        assert_eq!(config.breaker.reset_timeout(), Duration::from_secs(30));
        assert_eq!(
            config.health.heartbeat_interval(),
            Duration::from_secs(10)
        );
    }
}
