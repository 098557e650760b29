//! Common test utilities for integration tests.
//!
//! Provides an in-memory coordinator, scripted task handlers, and a
//! harness that wires a full agent runtime against them.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use forager::domain::errors::{CoordinatorError, TaskError};
use forager::domain::models::{
    AgentConfig, AgentStatus, Capability, Heartbeat, Task, TaskKind, TaskOutcome,
};
use forager::domain::ports::{
    Coordinator, CredentialStore, Credentials, Sandbox, TaskHandler,
};
use forager::infrastructure::sandbox::ScratchSandboxFactory;
use forager::services::{AgentRuntime, CircuitBreaker, ExecutionDispatcher, Metrics};

#[derive(Default)]
struct MockState {
    batches: VecDeque<Vec<Task>>,
    successes: Vec<(Uuid, TaskOutcome)>,
    failures: Vec<(Uuid, String)>,
    heartbeats: Vec<Heartbeat>,
    registrations: Vec<String>,
    reject_auth: bool,
    poll_error: Option<CoordinatorError>,
}

/// In-memory coordinator double that records every boundary interaction.
#[derive(Default)]
pub struct MockCoordinator {
    state: Mutex<MockState>,
    polls: AtomicU32,
}

impl MockCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a batch of tasks to hand out on the next poll.
    pub fn push_batch(&self, tasks: Vec<Task>) {
        self.state.lock().unwrap().batches.push_back(tasks);
    }

    /// Make every subsequent poll/report answer 401-equivalent.
    pub fn reject_auth(&self) {
        self.state.lock().unwrap().reject_auth = true;
    }

    /// Make every subsequent poll fail with the given error.
    pub fn set_poll_error(&self, error: Option<CoordinatorError>) {
        self.state.lock().unwrap().poll_error = error;
    }

    pub fn poll_count(&self) -> u32 {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn registrations(&self) -> Vec<String> {
        self.state.lock().unwrap().registrations.clone()
    }

    pub fn successes(&self) -> Vec<(Uuid, TaskOutcome)> {
        self.state.lock().unwrap().successes.clone()
    }

    pub fn failures(&self) -> Vec<(Uuid, String)> {
        self.state.lock().unwrap().failures.clone()
    }

    pub fn heartbeats(&self) -> Vec<Heartbeat> {
        self.state.lock().unwrap().heartbeats.clone()
    }
}

#[async_trait]
impl Coordinator for MockCoordinator {
    async fn register(
        &self,
        agent_id: &str,
        _capabilities: &[Capability],
        _credentials: &Credentials,
    ) -> Result<(), CoordinatorError> {
        self.state
            .lock()
            .unwrap()
            .registrations
            .push(agent_id.to_string());
        Ok(())
    }

    async fn poll_tasks(
        &self,
        _agent_id: &str,
        _credentials: &Credentials,
    ) -> Result<Vec<Task>, CoordinatorError> {
        let mut state = self.state.lock().unwrap();
        if state.reject_auth {
            return Err(CoordinatorError::Unauthenticated);
        }
        if let Some(error) = &state.poll_error {
            self.polls.fetch_add(1, Ordering::SeqCst);
            return Err(error.clone());
        }
        self.polls.fetch_add(1, Ordering::SeqCst);
        Ok(state.batches.pop_front().unwrap_or_default())
    }

    async fn report_success(
        &self,
        task_id: Uuid,
        outcome: &TaskOutcome,
        _credentials: &Credentials,
    ) -> Result<(), CoordinatorError> {
        let mut state = self.state.lock().unwrap();
        if state.reject_auth {
            return Err(CoordinatorError::Unauthenticated);
        }
        state.successes.push((task_id, outcome.clone()));
        Ok(())
    }

    async fn report_failure(
        &self,
        task_id: Uuid,
        reason: &str,
        _credentials: &Credentials,
    ) -> Result<(), CoordinatorError> {
        let mut state = self.state.lock().unwrap();
        if state.reject_auth {
            return Err(CoordinatorError::Unauthenticated);
        }
        state.failures.push((task_id, reason.to_string()));
        Ok(())
    }

    async fn send_heartbeat(
        &self,
        heartbeat: &Heartbeat,
        _credentials: &Credentials,
    ) -> Result<(), CoordinatorError> {
        let mut state = self.state.lock().unwrap();
        if state.reject_auth {
            return Err(CoordinatorError::Unauthenticated);
        }
        state.heartbeats.push(heartbeat.clone());
        Ok(())
    }
}

/// Handler that sleeps, then succeeds, tracking call and concurrency
/// gauges.
pub struct GaugeHandler {
    pub delay: Duration,
    pub calls: Arc<AtomicU32>,
    concurrent: Arc<AtomicUsize>,
    pub max_concurrent: Arc<AtomicUsize>,
}

impl GaugeHandler {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            calls: Arc::new(AtomicU32::new(0)),
            concurrent: Arc::new(AtomicUsize::new(0)),
            max_concurrent: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl TaskHandler for GaugeHandler {
    async fn run(
        &self,
        _sandbox: &dyn Sandbox,
        _parameters: Value,
    ) -> Result<TaskOutcome, TaskError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.concurrent.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.concurrent.fetch_sub(1, Ordering::SeqCst);
        Ok(TaskOutcome::Nothing)
    }
}

/// Handler that fails with a retryable error for the first `fail_times`
/// calls, then succeeds.
pub struct FlakyHandler {
    pub fail_times: u32,
    pub calls: Arc<AtomicU32>,
}

impl FlakyHandler {
    pub fn new(fail_times: u32) -> Self {
        Self {
            fail_times,
            calls: Arc::new(AtomicU32::new(0)),
        }
    }
}

#[async_trait]
impl TaskHandler for FlakyHandler {
    async fn run(
        &self,
        _sandbox: &dyn Sandbox,
        _parameters: Value,
    ) -> Result<TaskOutcome, TaskError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.fail_times {
            Err(TaskError::Network("connection reset".to_string()))
        } else {
            Ok(TaskOutcome::Nothing)
        }
    }
}

/// Handler that always fails with a retryable error.
pub struct AlwaysFailingHandler {
    pub calls: Arc<AtomicU32>,
}

impl AlwaysFailingHandler {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(AtomicU32::new(0)),
        }
    }
}

#[async_trait]
impl TaskHandler for AlwaysFailingHandler {
    async fn run(
        &self,
        _sandbox: &dyn Sandbox,
        _parameters: Value,
    ) -> Result<TaskOutcome, TaskError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(TaskError::Remote("upstream 503".to_string()))
    }
}

/// Handler that fails terminally on every call.
pub struct NotApplicableHandler {
    pub calls: Arc<AtomicU32>,
}

impl NotApplicableHandler {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(AtomicU32::new(0)),
        }
    }
}

#[async_trait]
impl TaskHandler for NotApplicableHandler {
    async fn run(
        &self,
        _sandbox: &dyn Sandbox,
        _parameters: Value,
    ) -> Result<TaskOutcome, TaskError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(TaskError::NotApplicable("already submitted".to_string()))
    }
}

/// A running agent runtime wired against a mock coordinator.
pub struct TestAgent {
    pub coordinator: Arc<MockCoordinator>,
    pub metrics: Arc<Metrics>,
    pub status_rx: watch::Receiver<AgentStatus>,
    pub shutdown_tx: broadcast::Sender<()>,
    pub handle: JoinHandle<anyhow::Result<()>>,
}

impl TestAgent {
    /// Signal shutdown and wait for the control loop to exit.
    pub async fn shutdown(self) -> anyhow::Result<()> {
        let _ = self.shutdown_tx.send(());
        self.handle.await?
    }
}

/// Config tuned for fast tests: 1s polls, 20ms retry backoff.
pub fn fast_config() -> AgentConfig {
    let mut config = AgentConfig::default();
    config.agent_id = "forager-test".to_string();
    config.runtime.poll_interval_secs = 1;
    config.runtime.task_timeout_secs = 30;
    config.runtime.shutdown_grace_secs = 2;
    config.retry.backoff_base_ms = 20;
    config
}

/// Spawn a runtime against the given coordinator and handler table.
pub fn spawn_agent(
    config: AgentConfig,
    coordinator: Arc<MockCoordinator>,
    handlers: Vec<(&str, TaskKind, Arc<dyn TaskHandler>)>,
) -> TestAgent {
    let metrics = Arc::new(Metrics::new());
    let credentials = Arc::new(CredentialStore::new(Credentials::new("test-token")));
    let breaker = Arc::new(CircuitBreaker::new(config.breaker.clone()));

    let mut dispatcher = ExecutionDispatcher::new(
        Arc::new(ScratchSandboxFactory::new()),
        config.runtime.task_timeout(),
    );
    for (domain, kind, handler) in handlers {
        dispatcher.register(domain, kind, handler);
    }

    let runtime = AgentRuntime::new(
        config,
        Arc::clone(&coordinator) as Arc<dyn Coordinator>,
        breaker,
        Arc::new(dispatcher),
        Arc::clone(&metrics),
        credentials,
    );
    let status_rx = runtime.subscribe_status();
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let handle = tokio::spawn(runtime.run(shutdown_rx));

    TestAgent {
        coordinator,
        metrics,
        status_rx,
        shutdown_tx,
        handle,
    }
}

/// Poll the predicate every 10ms until it returns true or the timeout is
/// reached.
pub async fn wait_for<F>(mut predicate: F, timeout: Duration) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    predicate()
}
