//! Change notifications emitted by the task registry.
//!
//! Every applied registry mutation is broadcast as a [`TaskEvent`] so a
//! presentation layer can re-render without polling the registry.

use imagegen_core::status::TaskStatus;
use imagegen_core::task::Task;
use imagegen_core::types::TaskId;
use serde::Serialize;

/// A registry change.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskEvent {
    /// A task was submitted and recorded as `PENDING`.
    Inserted { task: Task },

    /// A task changed status.
    Updated {
        task: Task,
        /// Status before this update.
        previous: TaskStatus,
    },

    /// A task was deleted.
    Removed { task_id: TaskId },
}

impl TaskEvent {
    pub fn task_id(&self) -> &str {
        match self {
            TaskEvent::Inserted { task } | TaskEvent::Updated { task, .. } => &task.id,
            TaskEvent::Removed { task_id } => task_id,
        }
    }
}
