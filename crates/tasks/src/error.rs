use imagegen_client::api::ApiError;
use imagegen_core::error::CoreError;
use imagegen_core::status::TaskStatus;
use imagegen_core::types::TaskId;

/// Misuse of the task registry.
///
/// None of these occur under correct orchestration; they are surfaced
/// loudly rather than swallowed.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Task {0} already exists or was issued before")]
    DuplicateTask(TaskId),

    #[error("Task {0} not found")]
    NotFound(TaskId),

    #[error("Task {task_id} must be inserted as PENDING, got {status}")]
    NotPending { task_id: TaskId, status: TaskStatus },

    #[error("Task {task_id} is not a fresh record: {reason}")]
    InvalidRecord { task_id: TaskId, reason: String },

    #[error("Task {task_id} cannot move from {from} to {to}")]
    InvalidTransition {
        task_id: TaskId,
        from: TaskStatus,
        to: TaskStatus,
    },

    #[error("Invalid patch for task {task_id}: {reason}")]
    InvalidPatch { task_id: TaskId, reason: String },

    /// The writing poller was detached before its update landed.
    #[error("Poller for task {0} is detached")]
    Detached(TaskId),
}

/// Failure of a job submission. No task record exists afterwards.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("Invalid submission: {0}")]
    Validation(#[from] CoreError),

    #[error("Job submission failed: {0}")]
    Submission(#[source] ApiError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The orchestrator is shutting down and no longer starts pollers.
    #[error("Orchestrator is shutting down")]
    ShuttingDown,
}

/// Failure to handle a presentation command.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Submit(#[from] SubmitError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Task {task_id} has no image yet (status {status})")]
    ImageNotReady { task_id: TaskId, status: TaskStatus },
}
