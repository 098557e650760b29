//! Task domain model.
//!
//! Tasks are discrete units of work issued by the coordinator and executed
//! by an agent inside a disposable sandbox.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// The operation a task asks the agent to perform against its target domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Enumerate candidate records on the target.
    Search,
    /// Fetch the full detail of a single record.
    Detail,
    /// Submit a prepared payload to the target.
    Submit,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Detail => "detail",
            Self::Submit => "submit",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "search" => Some(Self::Search),
            "detail" => Some(Self::Detail),
            "submit" => Some(Self::Submit),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of work issued by the coordinator.
///
/// Immutable once issued except for `attempts`, which the agent increments
/// on each failed execution while a retry budget remains. The agent holds a
/// working copy; the coordinator owns the record of truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique task identifier, assigned by the coordinator.
    pub id: Uuid,

    /// Which external target this task runs against (e.g. a platform name).
    pub domain: String,

    /// The operation to perform.
    pub kind: TaskKind,

    /// Opaque key/value payload specific to the kind.
    #[serde(default)]
    pub parameters: Value,

    /// Number of failed execution attempts so far.
    #[serde(default)]
    pub attempts: u32,

    /// When the coordinator issued the task.
    pub issued_at: DateTime<Utc>,
}

impl Task {
    /// Create a new task. Used by tests and embedders; production tasks
    /// arrive from the coordinator already populated.
    pub fn new(domain: impl Into<String>, kind: TaskKind, parameters: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            domain: domain.into(),
            kind,
            parameters,
            attempts: 0,
            issued_at: Utc::now(),
        }
    }

    /// Builder method to set a specific ID (useful for testing).
    #[must_use]
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }
}

/// Structured result of a successful task execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum TaskOutcome {
    /// Records extracted from the target (search/detail results).
    Records { records: Vec<Value> },
    /// Receipt for a completed submission.
    Receipt {
        reference: String,
        submitted_at: DateTime<Utc>,
    },
    /// The handler ran to completion with nothing to report.
    Nothing,
}

impl TaskOutcome {
    pub fn records(records: Vec<Value>) -> Self {
        Self::Records { records }
    }

    pub fn receipt(reference: impl Into<String>) -> Self {
        Self::Receipt {
            reference: reference.into(),
            submitted_at: Utc::now(),
        }
    }
}

/// A task plus local scheduling metadata while it sits in an agent's queue.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub task: Task,
    pub enqueued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
}

impl QueueEntry {
    pub fn new(task: Task) -> Self {
        Self {
            task,
            enqueued_at: Utc::now(),
            started_at: None,
        }
    }

    /// Mark the entry as handed to the dispatcher.
    pub fn start(&mut self) {
        self.started_at = Some(Utc::now());
    }
}
