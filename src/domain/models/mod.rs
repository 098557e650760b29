//! Domain models.

pub mod agent;
pub mod config;
pub mod task;

pub use agent::{
    AgentHealth, AgentStatus, Capability, Heartbeat, MetricsSnapshot, ResourceSnapshot,
};
pub use config::{
    AgentConfig, BreakerConfig, CoordinatorConfig, HealthConfig, LoggingConfig, RetryConfig,
    RuntimeConfig,
};
pub use task::{QueueEntry, Task, TaskKind, TaskOutcome};
