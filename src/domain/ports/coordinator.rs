//! Coordinator boundary port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::CoordinatorError;
use crate::domain::models::{Capability, Heartbeat, Task, TaskOutcome};

/// Bearer-style credential attached to every coordinator call.
///
/// Held by the runtime so it can be cleared on an authentication failure;
/// the Debug impl never prints the token itself.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    token: String,
}

impl Credentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials").field("token", &"***").finish()
    }
}

/// Shared credential slot for one agent process.
///
/// The runtime clears it when the coordinator rejects authentication; every
/// caller re-reads it per call, so a cleared slot stops all outbound
/// traffic.
#[derive(Debug, Default)]
pub struct CredentialStore {
    inner: std::sync::RwLock<Option<Credentials>>,
}

impl CredentialStore {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            inner: std::sync::RwLock::new(Some(credentials)),
        }
    }

    pub fn get(&self) -> Option<Credentials> {
        self.inner.read().map(|guard| guard.clone()).unwrap_or(None)
    }

    pub fn clear(&self) {
        if let Ok(mut guard) = self.inner.write() {
            *guard = None;
        }
    }
}

/// Port for the remote service that issues tasks and receives results.
///
/// Implementations must be safe to call concurrently; the runtime funnels
/// every call through a shared circuit breaker.
#[async_trait]
pub trait Coordinator: Send + Sync {
    /// One-time handshake before polling begins.
    async fn register(
        &self,
        agent_id: &str,
        capabilities: &[Capability],
        credentials: &Credentials,
    ) -> Result<(), CoordinatorError>;

    /// Fetch newly issued tasks. An empty list is a normal outcome.
    async fn poll_tasks(
        &self,
        agent_id: &str,
        credentials: &Credentials,
    ) -> Result<Vec<Task>, CoordinatorError>;

    /// Report a completed task. Idempotent on the coordinator side.
    async fn report_success(
        &self,
        task_id: Uuid,
        outcome: &TaskOutcome,
        credentials: &Credentials,
    ) -> Result<(), CoordinatorError>;

    /// Report a permanently failed task. Sent only after retries are
    /// exhausted or the failure is terminal.
    async fn report_failure(
        &self,
        task_id: Uuid,
        reason: &str,
        credentials: &Credentials,
    ) -> Result<(), CoordinatorError>;

    /// Deliver a liveness/metrics heartbeat.
    async fn send_heartbeat(
        &self,
        heartbeat: &Heartbeat,
        credentials: &Credentials,
    ) -> Result<(), CoordinatorError>;
}
