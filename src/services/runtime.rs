//! Agent control loop.
//!
//! One `AgentRuntime` owns its queue, breaker, dispatcher, and metrics; all
//! mutation goes through the loop in `run`. The loop yields only at the
//! coordinator calls, sandboxed executions, and retry timers. Concurrency
//! is cooperative: the `max_concurrent_tasks` ceiling bounds in-flight
//! executions, not OS threads.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domain::errors::{CoordinatorError, TaskError};
use crate::domain::models::{AgentConfig, AgentStatus, QueueEntry, Task, TaskOutcome};
use crate::domain::ports::{Coordinator, CredentialStore};
use crate::services::circuit_breaker::{BreakerError, CircuitBreaker};
use crate::services::dispatcher::ExecutionDispatcher;
use crate::services::metrics::Metrics;
use crate::services::retry::RetryPolicy;
use crate::services::task_queue::TaskQueue;

/// Messages feeding back into the control loop.
enum RuntimeEvent {
    Finished {
        task: Task,
        started_at: DateTime<Utc>,
        result: Result<TaskOutcome, TaskError>,
    },
    RetryDue(Task),
}

/// A result that could not be delivered while the coordinator was
/// unreachable; re-flushed on later poll cycles.
enum PendingReport {
    Success { task_id: Uuid, outcome: TaskOutcome },
    Failure { task_id: Uuid, reason: String },
}

/// The per-agent control loop: polls the coordinator, feeds the queue,
/// dispatches under the concurrency ceiling, and reports outcomes.
pub struct AgentRuntime {
    config: AgentConfig,
    coordinator: Arc<dyn Coordinator>,
    breaker: Arc<CircuitBreaker>,
    dispatcher: Arc<ExecutionDispatcher>,
    retry_policy: RetryPolicy,
    queue: TaskQueue,
    metrics: Arc<Metrics>,
    credentials: Arc<CredentialStore>,
    status_tx: watch::Sender<AgentStatus>,
    active_count: Arc<AtomicUsize>,
    events_tx: mpsc::UnboundedSender<RuntimeEvent>,
    events_rx: Option<mpsc::UnboundedReceiver<RuntimeEvent>>,
    running: HashMap<Uuid, JoinHandle<()>>,
    pending_reports: Vec<PendingReport>,
    polling_halted: bool,
}

impl AgentRuntime {
    pub fn new(
        config: AgentConfig,
        coordinator: Arc<dyn Coordinator>,
        breaker: Arc<CircuitBreaker>,
        dispatcher: Arc<ExecutionDispatcher>,
        metrics: Arc<Metrics>,
        credentials: Arc<CredentialStore>,
    ) -> Self {
        let retry_policy = RetryPolicy::new(config.retry.clone());
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (status_tx, _) = watch::channel(AgentStatus::Healthy);
        Self {
            config,
            coordinator,
            breaker,
            dispatcher,
            retry_policy,
            queue: TaskQueue::new(),
            metrics,
            credentials,
            status_tx,
            active_count: Arc::new(AtomicUsize::new(0)),
            events_tx,
            events_rx: Some(events_rx),
            running: HashMap::new(),
            pending_reports: Vec::new(),
            polling_halted: false,
        }
    }

    /// Watch the agent's observable status.
    pub fn subscribe_status(&self) -> watch::Receiver<AgentStatus> {
        self.status_tx.subscribe()
    }

    /// Shared in-flight execution counter, read by the health reporter.
    pub fn active_tasks(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.active_count)
    }

    /// Run the control loop until a shutdown signal arrives.
    ///
    /// The loop polls on a fixed interval and immediately after each task
    /// completion, keeping the concurrency ceiling saturated without
    /// waiting out the interval.
    pub async fn run(mut self, mut shutdown_rx: broadcast::Receiver<()>) -> anyhow::Result<()> {
        let mut events_rx = self
            .events_rx
            .take()
            .context("runtime control loop already started")?;

        self.register().await?;

        let mut poll_timer = tokio::time::interval(self.config.runtime.poll_interval());
        poll_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!(
            agent_id = %self.config.agent_id,
            poll_interval_secs = self.config.runtime.poll_interval_secs,
            max_concurrent = self.config.runtime.max_concurrent_tasks,
            "agent runtime started"
        );

        loop {
            tokio::select! {
                // First tick fires immediately, giving the startup poll.
                _ = poll_timer.tick() => {
                    self.flush_pending_reports().await;
                    self.poll_and_enqueue().await;
                    self.fill_slots();
                }
                Some(event) = events_rx.recv() => match event {
                    RuntimeEvent::Finished { task, started_at, result } => {
                        self.handle_finished(task, started_at, result).await;
                        // Edge-triggered: a freed slot asks for work now.
                        self.poll_and_enqueue().await;
                        self.fill_slots();
                    }
                    RuntimeEvent::RetryDue(task) => {
                        debug!(task_id = %task.id, attempts = task.attempts, "retry backoff elapsed, requeueing");
                        self.queue.requeue(task);
                        self.fill_slots();
                    }
                },
                _ = shutdown_rx.recv() => {
                    info!("shutdown signal received");
                    self.drain(&mut events_rx).await;
                    break;
                }
            }
        }

        self.status_tx.send_replace(AgentStatus::Stopped);
        info!("agent runtime stopped");
        Ok(())
    }

    async fn register(&mut self) -> anyhow::Result<()> {
        let Some(creds) = self.credentials.get() else {
            self.status_tx.send_replace(AgentStatus::Unauthenticated);
            anyhow::bail!("no coordinator credentials configured");
        };
        let capabilities = self.dispatcher.capabilities();
        let coordinator = Arc::clone(&self.coordinator);
        let breaker = Arc::clone(&self.breaker);
        let agent_id = self.config.agent_id.clone();

        let result = breaker
            .execute(|| coordinator.register(&agent_id, &capabilities, &creds))
            .await;
        match result {
            Ok(()) => {
                info!(
                    agent_id = %agent_id,
                    capabilities = capabilities.len(),
                    "registered with coordinator"
                );
                Ok(())
            }
            Err(BreakerError::Inner(CoordinatorError::Unauthenticated)) => {
                self.on_unauthenticated();
                anyhow::bail!("coordinator rejected credentials during registration")
            }
            Err(e) => Err(anyhow::anyhow!("registration failed: {e}")),
        }
    }

    /// Ask the coordinator for new tasks and enqueue them.
    ///
    /// An open circuit is not an error: the cycle is skipped and nothing is
    /// charged against any task's retry budget.
    async fn poll_and_enqueue(&mut self) {
        if self.polling_halted {
            return;
        }
        let Some(creds) = self.credentials.get() else {
            self.on_unauthenticated();
            return;
        };
        let coordinator = Arc::clone(&self.coordinator);
        let breaker = Arc::clone(&self.breaker);
        let agent_id = self.config.agent_id.clone();

        let result = breaker
            .execute(|| coordinator.poll_tasks(&agent_id, &creds))
            .await;
        match result {
            Ok(tasks) => {
                self.metrics.record_poll();
                let mut accepted = 0usize;
                for task in tasks {
                    if self.queue.enqueue(task) {
                        accepted += 1;
                    }
                }
                if accepted > 0 {
                    debug!(accepted, queued = self.queue.size(), "enqueued polled tasks");
                }
            }
            Err(BreakerError::Open { retry_after }) => {
                debug!(
                    retry_after_secs = retry_after.as_secs(),
                    "coordinator circuit open, skipping poll cycle"
                );
            }
            Err(BreakerError::Inner(CoordinatorError::Unauthenticated)) => {
                self.on_unauthenticated();
            }
            Err(BreakerError::Inner(e)) => {
                warn!(error = %e, "task poll failed");
            }
        }
    }

    /// Dispatch queued tasks until the ceiling is reached or the queue is
    /// empty.
    fn fill_slots(&mut self) {
        while self.active_count.load(Ordering::SeqCst) < self.config.runtime.max_concurrent_tasks {
            let Some(mut entry) = self.queue.dequeue_next() else {
                break;
            };
            entry.start();
            self.spawn_execution(entry);
        }
    }

    fn spawn_execution(&mut self, entry: QueueEntry) {
        let task = entry.task;
        let started_at = entry.started_at.unwrap_or_else(Utc::now);
        let task_id = task.id;
        let dispatcher = Arc::clone(&self.dispatcher);
        let events_tx = self.events_tx.clone();

        self.active_count.fetch_add(1, Ordering::SeqCst);
        info!(
            task_id = %task.id,
            domain = %task.domain,
            kind = %task.kind,
            attempt = task.attempts + 1,
            "executing task"
        );

        let handle = tokio::spawn(async move {
            let result = dispatcher.dispatch(&task).await;
            let _ = events_tx.send(RuntimeEvent::Finished {
                task,
                started_at,
                result,
            });
        });
        self.running.insert(task_id, handle);
    }

    async fn handle_finished(
        &mut self,
        task: Task,
        started_at: DateTime<Utc>,
        result: Result<TaskOutcome, TaskError>,
    ) {
        self.active_count.fetch_sub(1, Ordering::SeqCst);
        self.running.remove(&task.id);

        match result {
            Ok(outcome) => {
                let latency = (Utc::now() - started_at).to_std().unwrap_or_default();
                self.metrics.record_completion(latency);
                info!(
                    task_id = %task.id,
                    latency_ms = latency.as_millis() as u64,
                    "task completed"
                );
                self.queue.release(task.id);
                self.report_success(task.id, outcome).await;
            }
            Err(err) if self.retry_policy.should_retry(&task, &err) => {
                let mut retry = task;
                retry.attempts += 1;
                self.metrics.record_retry();
                let delay = self.retry_policy.backoff_delay(retry.attempts);
                warn!(
                    task_id = %retry.id,
                    attempts = retry.attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "task failed, retry scheduled"
                );
                self.schedule_retry(retry, delay);
            }
            Err(err) => {
                self.metrics.record_failure();
                warn!(
                    task_id = %task.id,
                    attempts = task.attempts,
                    error = %err,
                    "task failed permanently"
                );
                self.queue.release(task.id);
                self.report_failure(task.id, err.to_string()).await;
            }
        }
    }

    /// Re-enqueue after the backoff window without blocking the loop.
    fn schedule_retry(&self, task: Task, delay: Duration) {
        let events_tx = self.events_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events_tx.send(RuntimeEvent::RetryDue(task));
        });
    }

    async fn report_success(&mut self, task_id: Uuid, outcome: TaskOutcome) {
        let Some(creds) = self.credentials.get() else {
            warn!(task_id = %task_id, "dropping success report, no credentials");
            return;
        };
        let coordinator = Arc::clone(&self.coordinator);
        let breaker = Arc::clone(&self.breaker);
        let result = breaker
            .execute(|| coordinator.report_success(task_id, &outcome, &creds))
            .await;
        match result {
            Ok(()) => {}
            Err(BreakerError::Open { .. }) => {
                debug!(task_id = %task_id, "circuit open, parking success report");
                self.pending_reports
                    .push(PendingReport::Success { task_id, outcome });
            }
            Err(BreakerError::Inner(CoordinatorError::Unauthenticated)) => {
                self.on_unauthenticated();
            }
            Err(BreakerError::Inner(e)) if e.is_retryable() => {
                warn!(task_id = %task_id, error = %e, "success report failed, parking for retry");
                self.pending_reports
                    .push(PendingReport::Success { task_id, outcome });
            }
            Err(BreakerError::Inner(e)) => {
                error!(task_id = %task_id, error = %e, "dropping success report");
            }
        }
    }

    async fn report_failure(&mut self, task_id: Uuid, reason: String) {
        let Some(creds) = self.credentials.get() else {
            warn!(task_id = %task_id, "dropping failure report, no credentials");
            return;
        };
        let coordinator = Arc::clone(&self.coordinator);
        let breaker = Arc::clone(&self.breaker);
        let result = breaker
            .execute(|| coordinator.report_failure(task_id, &reason, &creds))
            .await;
        match result {
            Ok(()) => {}
            Err(BreakerError::Open { .. }) => {
                debug!(task_id = %task_id, "circuit open, parking failure report");
                self.pending_reports
                    .push(PendingReport::Failure { task_id, reason });
            }
            Err(BreakerError::Inner(CoordinatorError::Unauthenticated)) => {
                self.on_unauthenticated();
            }
            Err(BreakerError::Inner(e)) if e.is_retryable() => {
                warn!(task_id = %task_id, error = %e, "failure report failed, parking for retry");
                self.pending_reports
                    .push(PendingReport::Failure { task_id, reason });
            }
            Err(BreakerError::Inner(e)) => {
                error!(task_id = %task_id, error = %e, "dropping failure report");
            }
        }
    }

    async fn flush_pending_reports(&mut self) {
        if self.pending_reports.is_empty() {
            return;
        }
        let reports = std::mem::take(&mut self.pending_reports);
        debug!(count = reports.len(), "flushing parked reports");
        for report in reports {
            match report {
                PendingReport::Success { task_id, outcome } => {
                    self.report_success(task_id, outcome).await;
                }
                PendingReport::Failure { task_id, reason } => {
                    self.report_failure(task_id, reason).await;
                }
            }
        }
    }

    /// Authentication loss is fatal for polling: clear credentials, stop
    /// asking for work, and surface the status instead of retrying.
    fn on_unauthenticated(&mut self) {
        if self.polling_halted && *self.status_tx.borrow() == AgentStatus::Unauthenticated {
            return;
        }
        error!("coordinator rejected credentials, halting polls");
        self.credentials.clear();
        self.polling_halted = true;
        self.pending_reports.clear();
        self.status_tx.send_replace(AgentStatus::Unauthenticated);
    }

    /// Bounded shutdown: stop polling, give in-flight tasks the grace
    /// period, then tear down whatever is left and report it failed.
    async fn drain(&mut self, events_rx: &mut mpsc::UnboundedReceiver<RuntimeEvent>) {
        self.status_tx.send_replace(AgentStatus::Draining);
        let grace = self.config.runtime.shutdown_grace();
        info!(
            active = self.active_count.load(Ordering::SeqCst),
            queued = self.queue.size(),
            grace_secs = grace.as_secs(),
            "draining"
        );

        let deadline = tokio::time::Instant::now() + grace;
        while self.active_count.load(Ordering::SeqCst) > 0 {
            match tokio::time::timeout_at(deadline, events_rx.recv()).await {
                Ok(Some(RuntimeEvent::Finished {
                    task,
                    started_at,
                    result,
                })) => {
                    self.handle_finished(task, started_at, result).await;
                }
                Ok(Some(RuntimeEvent::RetryDue(task))) => {
                    // No further attempts will run; hand the task back.
                    self.metrics.record_failure();
                    self.queue.release(task.id);
                    self.report_failure(task.id, "agent shut down before retry".to_string())
                        .await;
                }
                Ok(None) => break,
                Err(_) => break,
            }
        }

        // Collect completions that raced the deadline before force-abort.
        while let Ok(event) = events_rx.try_recv() {
            if let RuntimeEvent::Finished {
                task,
                started_at,
                result,
            } = event
            {
                self.handle_finished(task, started_at, result).await;
            }
        }

        let leftovers: Vec<Uuid> = self.running.keys().copied().collect();
        for task_id in leftovers {
            if let Some(handle) = self.running.remove(&task_id) {
                handle.abort();
            }
            self.active_count.fetch_sub(1, Ordering::SeqCst);
            self.metrics.record_failure();
            self.queue.release(task_id);
            warn!(task_id = %task_id, "task aborted by shutdown");
            self.report_failure(task_id, "aborted by agent shutdown".to_string())
                .await;
        }

        self.flush_pending_reports().await;
    }
}
