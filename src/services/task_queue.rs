//! Local task queue for a single agent runtime.
//!
//! FIFO among pending entries, deduplicating by task id. The dedup set
//! tracks both queued and in-flight tasks so a duplicate delivery from the
//! coordinator is a no-op until the task reaches a terminal state and is
//! released.

use std::collections::{HashSet, VecDeque};
use uuid::Uuid;

use crate::domain::models::{QueueEntry, Task};

/// Ordered, deduplicating collection of pending work, owned exclusively by
/// one `AgentRuntime`. Never shared across agents.
#[derive(Debug, Default)]
pub struct TaskQueue {
    entries: VecDeque<QueueEntry>,
    /// Ids of tasks that are queued or executing. Cleared via `release`.
    tracked: HashSet<Uuid>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task to the back of the queue.
    ///
    /// Returns false (and changes nothing) when the id is already queued or
    /// executing.
    pub fn enqueue(&mut self, task: Task) -> bool {
        if !self.tracked.insert(task.id) {
            return false;
        }
        self.entries.push_back(QueueEntry::new(task));
        true
    }

    /// Re-enqueue a task whose previous attempt failed. The id is still
    /// tracked from its original enqueue, so this bypasses the dedup check.
    pub fn requeue(&mut self, task: Task) {
        debug_assert!(self.tracked.contains(&task.id));
        self.tracked.insert(task.id);
        self.entries.push_back(QueueEntry::new(task));
    }

    /// Pop the next task in FIFO order. Never blocks; the entry's id stays
    /// tracked until `release` is called.
    pub fn dequeue_next(&mut self) -> Option<QueueEntry> {
        self.entries.pop_front()
    }

    /// Forget a task id once it reached a terminal state, allowing the
    /// coordinator to reissue it later.
    pub fn release(&mut self, id: Uuid) {
        self.tracked.remove(&id);
    }

    /// Number of tasks enqueued but not yet dispatched.
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the id is queued or executing.
    pub fn contains(&self, id: Uuid) -> bool {
        self.tracked.contains(&id)
    }
}
