//! Agent identity, health, and heartbeat models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::models::TaskKind;

/// Observable lifecycle status of an agent process.
///
/// Purely observational for the coordinator, except during shutdown where
/// `Draining` gates the runtime's poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Polling and executing normally.
    Healthy,
    /// Shutdown requested; finishing in-flight work, no new polls.
    Draining,
    /// Control loop has exited.
    Stopped,
    /// Coordinator rejected our credentials; polling halted.
    Unauthenticated,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
            Self::Unauthenticated => "unauthenticated",
        }
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `(domain, kind)` pair this agent can execute, advertised at
/// registration time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Capability {
    pub domain: String,
    pub kind: TaskKind,
}

impl Capability {
    pub fn new(domain: impl Into<String>, kind: TaskKind) -> Self {
        Self {
            domain: domain.into(),
            kind,
        }
    }
}

/// Point-in-time resource usage of the agent process.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    /// System-wide CPU usage percentage (0.0-100.0).
    pub cpu_percent: f32,
    /// Resident memory of this process in MB.
    pub memory_mb: u64,
}

/// Health report produced by the heartbeat loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentHealth {
    pub status: AgentStatus,
    pub last_heartbeat_at: DateTime<Utc>,
    pub active_task_count: usize,
    pub resources: ResourceSnapshot,
}

/// Serializable copy of the agent's monotonically accumulating counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    pub tasks_retried: u64,
    pub polls: u64,
    pub avg_latency_ms: f64,
}

/// Full heartbeat payload sent to the coordinator boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heartbeat {
    pub agent_id: String,
    pub health: AgentHealth,
    pub metrics: MetricsSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_as_str() {
        assert_eq!(AgentStatus::Healthy.as_str(), "healthy");
        assert_eq!(AgentStatus::Draining.as_str(), "draining");
        assert_eq!(AgentStatus::Stopped.as_str(), "stopped");
        assert_eq!(AgentStatus::Unauthenticated.as_str(), "unauthenticated");
    }

    #[test]
    fn test_capability_serializes_kind_snake_case() {
        let cap = Capability::new("boardx", TaskKind::Detail);
        let json = serde_json::to_value(&cap).unwrap();
        assert_eq!(json["kind"], "detail");
    }
}
