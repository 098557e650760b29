//! Execution dispatcher: routes tasks to registered handlers inside
//! disposable sandboxes.
//!
//! Each dispatch allocates a fresh sandbox, runs the handler on a spawned
//! task under a hard wall-clock timeout, and tears the sandbox down on
//! every exit path: success, handler error, panic, timeout, and
//! cancellation of the dispatch itself.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::AbortHandle;
use tracing::{debug, warn};

use crate::domain::errors::TaskError;
use crate::domain::models::{Capability, Task, TaskKind, TaskOutcome};
use crate::domain::ports::{SandboxFactory, TaskHandler};

/// Aborts the wrapped handler task when the dispatch future is dropped
/// mid-flight (e.g. forced teardown during shutdown), so the handler cannot
/// outlive its sandbox.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Maps `(domain, kind)` to a handler and enforces one isolated execution
/// per dispatch.
pub struct ExecutionDispatcher {
    handlers: HashMap<(String, TaskKind), Arc<dyn TaskHandler>>,
    sandboxes: Arc<dyn SandboxFactory>,
    task_timeout: Duration,
}

impl ExecutionDispatcher {
    pub fn new(sandboxes: Arc<dyn SandboxFactory>, task_timeout: Duration) -> Self {
        Self {
            handlers: HashMap::new(),
            sandboxes,
            task_timeout,
        }
    }

    /// Register a handler for a `(domain, kind)` pair, replacing any
    /// previous registration.
    pub fn register(
        &mut self,
        domain: impl Into<String>,
        kind: TaskKind,
        handler: Arc<dyn TaskHandler>,
    ) {
        self.handlers.insert((domain.into(), kind), handler);
    }

    pub fn supports(&self, domain: &str, kind: TaskKind) -> bool {
        self.handlers.contains_key(&(domain.to_string(), kind))
    }

    /// Everything this dispatcher can execute, advertised at registration.
    pub fn capabilities(&self) -> Vec<Capability> {
        let mut caps: Vec<Capability> = self
            .handlers
            .keys()
            .map(|(domain, kind)| Capability::new(domain.clone(), *kind))
            .collect();
        caps.sort_by(|a, b| (&a.domain, a.kind.as_str()).cmp(&(&b.domain, b.kind.as_str())));
        caps
    }

    /// Execute one task to a structured outcome.
    ///
    /// Unknown `(domain, kind)` is a terminal `Unsupported` error; handler
    /// panics and timeouts are converted to retryable failures here and
    /// never escape to the control loop.
    pub async fn dispatch(&self, task: &Task) -> Result<TaskOutcome, TaskError> {
        let key = (task.domain.clone(), task.kind);
        let handler = self
            .handlers
            .get(&key)
            .cloned()
            .ok_or_else(|| TaskError::Unsupported {
                domain: task.domain.clone(),
                kind: task.kind.as_str().to_string(),
            })?;

        let sandbox = self
            .sandboxes
            .create(task.id)
            .await
            .map_err(|e| TaskError::Sandbox(e.to_string()))?;

        debug!(
            task_id = %task.id,
            domain = %task.domain,
            kind = %task.kind,
            sandbox_id = %sandbox.id(),
            "dispatching task"
        );

        let parameters = task.parameters.clone();
        let handler_sandbox = Arc::clone(&sandbox);
        let mut join = tokio::spawn(async move {
            handler.run(handler_sandbox.as_ref(), parameters).await
        });
        let _abort_guard = AbortOnDrop(join.abort_handle());

        let result = tokio::select! {
            joined = &mut join => match joined {
                Ok(outcome) => outcome,
                Err(join_err) if join_err.is_panic() => {
                    warn!(task_id = %task.id, "handler panicked");
                    Err(TaskError::HandlerPanic(join_err.to_string()))
                }
                Err(join_err) => Err(TaskError::Sandbox(format!(
                    "handler task cancelled: {join_err}"
                ))),
            },
            () = tokio::time::sleep(self.task_timeout) => {
                join.abort();
                warn!(
                    task_id = %task.id,
                    timeout_secs = self.task_timeout.as_secs(),
                    "task exceeded wall-clock timeout, aborting"
                );
                Err(TaskError::Timeout {
                    seconds: self.task_timeout.as_secs(),
                })
            }
        };

        if let Err(e) = sandbox.teardown().await {
            warn!(sandbox_id = %sandbox.id(), error = %e, "sandbox teardown failed");
        }

        result
    }
}
