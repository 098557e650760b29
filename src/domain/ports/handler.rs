//! Task handler and sandbox ports.

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use uuid::Uuid;

use crate::domain::errors::{SandboxError, TaskError};
use crate::domain::models::TaskOutcome;

/// An isolated, disposable environment a single task executes in.
///
/// The dispatcher allocates one per dispatch and tears it down on every
/// exit path; handlers may scribble freely inside `workdir`.
#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Unique id of this sandbox instance.
    fn id(&self) -> Uuid;

    /// Scratch directory private to this execution.
    fn workdir(&self) -> &Path;

    /// Release the sandbox's resources. Idempotent.
    async fn teardown(&self) -> Result<(), SandboxError>;
}

/// Port for allocating sandboxes.
#[async_trait]
pub trait SandboxFactory: Send + Sync {
    async fn create(&self, task_id: Uuid) -> Result<std::sync::Arc<dyn Sandbox>, SandboxError>;
}

/// A registered executor for one `(domain, kind)` pair.
///
/// Handlers are pure with respect to the dispatcher: they receive the task
/// parameters and a sandbox, and return a structured outcome. They must not
/// touch dispatcher or queue state.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn run(&self, sandbox: &dyn Sandbox, parameters: Value)
        -> Result<TaskOutcome, TaskError>;
}
