//! Task status state machine.
//!
//! Each variant's discriminant is its position along the lifecycle
//! `Pending -> Processing -> {Completed | Failed}`; the two terminal
//! states share the last rank.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle status of a tracked generation task.
#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Submitted, not yet picked up by the remote service.
    Pending = 1,
    /// The remote service reported the job as running.
    Processing = 2,
    /// The remote service produced an image.
    Completed = 3,
    /// The job failed remotely or could not be polled.
    Failed = 4,
}

impl TaskStatus {
    /// Position along the lifecycle. Terminal states share one rank.
    pub fn rank(self) -> u8 {
        match self {
            TaskStatus::Pending => 0,
            TaskStatus::Processing => 1,
            TaskStatus::Completed | TaskStatus::Failed => 2,
        }
    }

    /// `Completed` and `Failed` admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Whether moving from `self` to `next` is a forward transition.
    ///
    /// Staying in the same status is not a transition and returns `false`.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Processing => "PROCESSING",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}
