//! Built-in probe handlers.
//!
//! The `probe` domain echoes task parameters back as structured outcomes.
//! It exists for smoke runs and tests; real target domains register their
//! own handlers through the dispatcher's table.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::domain::errors::TaskError;
use crate::domain::models::{TaskKind, TaskOutcome};
use crate::domain::ports::{Sandbox, TaskHandler};
use crate::services::dispatcher::ExecutionDispatcher;

/// Echoes search parameters back as a single-record result set.
pub struct ProbeSearchHandler;

#[async_trait]
impl TaskHandler for ProbeSearchHandler {
    async fn run(
        &self,
        _sandbox: &dyn Sandbox,
        parameters: Value,
    ) -> Result<TaskOutcome, TaskError> {
        Ok(TaskOutcome::records(vec![json!({ "echo": parameters })]))
    }
}

/// Requires a `record_id` parameter and echoes it as a detail record.
pub struct ProbeDetailHandler;

#[async_trait]
impl TaskHandler for ProbeDetailHandler {
    async fn run(
        &self,
        _sandbox: &dyn Sandbox,
        parameters: Value,
    ) -> Result<TaskOutcome, TaskError> {
        let record_id = parameters
            .get("record_id")
            .and_then(Value::as_str)
            .ok_or_else(|| TaskError::InvalidParameters("record_id is required".to_string()))?;
        Ok(TaskOutcome::records(vec![
            json!({ "record_id": record_id }),
        ]))
    }
}

/// Produces a synthetic submission receipt.
pub struct ProbeSubmitHandler;

#[async_trait]
impl TaskHandler for ProbeSubmitHandler {
    async fn run(
        &self,
        sandbox: &dyn Sandbox,
        _parameters: Value,
    ) -> Result<TaskOutcome, TaskError> {
        Ok(TaskOutcome::receipt(format!("probe-{}", sandbox.id())))
    }
}

/// Register the probe handler set on a dispatcher.
pub fn register_probe_handlers(dispatcher: &mut ExecutionDispatcher) {
    dispatcher.register("probe", TaskKind::Search, Arc::new(ProbeSearchHandler));
    dispatcher.register("probe", TaskKind::Detail, Arc::new(ProbeDetailHandler));
    dispatcher.register("probe", TaskKind::Submit, Arc::new(ProbeSubmitHandler));
}
