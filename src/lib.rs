//! Forager - fault-tolerant task-distribution agent.
//!
//! A forager is one autonomous worker process that registers with a remote
//! coordinator, polls it for units of work, executes each unit inside an
//! isolated disposable sandbox, and reports results back under bounded
//! concurrency, retry, and failure-isolation policies.
//!
//! # Architecture
//!
//! The crate follows hexagonal architecture:
//!
//! - **Domain Layer** (`domain`): models, error taxonomy, and port traits
//! - **Service Layer** (`services`): the distribution core — queue,
//!   breaker, retry policy, dispatcher, control loop, health reporting
//! - **Infrastructure Layer** (`infrastructure`): HTTP coordinator client,
//!   scratch sandboxes, configuration loading
//! - **CLI Layer** (`cli`): command-line interface

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience.
pub use domain::errors::{CoordinatorError, SandboxError, TaskError};
pub use domain::models::{
    AgentConfig, AgentHealth, AgentStatus, Capability, Heartbeat, QueueEntry, Task, TaskKind,
    TaskOutcome,
};
pub use domain::ports::{Coordinator, CredentialStore, Credentials, Sandbox, SandboxFactory, TaskHandler};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use infrastructure::coordinator::HttpCoordinator;
pub use infrastructure::sandbox::ScratchSandboxFactory;
pub use services::{
    AgentRuntime, BreakerError, CircuitBreaker, CircuitState, ExecutionDispatcher, HealthReporter,
    Metrics, MetricsSnapshot, RetryPolicy, TaskQueue,
};
