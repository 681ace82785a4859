//! Per-task status polling.
//!
//! A [`Poller`] repeatedly fetches the remote status of one task at a
//! fixed interval and applies each observation to the registry until the
//! task is terminal, removed, or its token is cancelled. Requests for a
//! task never overlap: each fetch finishes (or times out) before the next
//! wait starts.
//!
//! Fetch errors are contained here. After `max_fetch_failures`
//! consecutive failures the task is recorded as `FAILED` with no image.

use std::sync::Arc;
use std::time::Duration;

use imagegen_client::backend::JobBackend;
use imagegen_client::messages::FetchResponse;
use imagegen_core::status::TaskStatus;
use imagegen_core::task::TaskPatch;
use imagegen_core::types::TaskId;
use tokio_util::sync::CancellationToken;

use crate::error::RegistryError;
use crate::registry::TaskRegistry;

/// Default delay between two fetches of the same task.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Default upper bound for one status fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of consecutive fetch failures that fail a task.
pub const DEFAULT_MAX_FETCH_FAILURES: u32 = 1;

/// Tunable parameters for a poller.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Delay before each fetch.
    pub interval: Duration,
    /// Upper bound for one fetch; elapsing counts as a fetch failure.
    pub fetch_timeout: Duration,
    /// Consecutive fetch failures after which the task is marked `FAILED`.
    /// Values below 1 behave as 1.
    pub max_fetch_failures: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            max_fetch_failures: DEFAULT_MAX_FETCH_FAILURES,
        }
    }
}

/// Why a poller stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollExit {
    /// The task reached this terminal status.
    Terminal(TaskStatus),
    /// The task record was removed from the registry.
    Removed,
    /// The poller was detached or shut down.
    Detached,
}

/// Polling loop for a single task.
pub struct Poller {
    task_id: TaskId,
    registry: Arc<TaskRegistry>,
    backend: Arc<dyn JobBackend>,
    config: PollerConfig,
    cancel: CancellationToken,
}

impl Poller {
    /// Create a poller. `cancel` must be the token attached to `task_id`
    /// in the registry.
    pub fn new(
        task_id: TaskId,
        registry: Arc<TaskRegistry>,
        backend: Arc<dyn JobBackend>,
        config: PollerConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            task_id,
            registry,
            backend,
            config,
            cancel,
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Run until the task is terminal, removed or detached.
    pub async fn run(self) -> PollExit {
        let max_failures = self.config.max_fetch_failures.max(1);
        let mut failures = 0u32;

        tracing::debug!(
            task_id = %self.task_id,
            interval_ms = self.config.interval.as_millis() as u64,
            "Poller started",
        );

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return self.exit(PollExit::Detached),
                _ = tokio::time::sleep(self.config.interval) => {}
            }

            let fetched = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return self.exit(PollExit::Detached),
                result = tokio::time::timeout(
                    self.config.fetch_timeout,
                    self.backend.fetch_status(&self.task_id),
                ) => result,
            };

            let patch = match fetched {
                Ok(Ok(response)) => {
                    failures = 0;
                    match observation_patch(&self.task_id, &response) {
                        Some(patch) => patch,
                        None => continue,
                    }
                }
                Ok(Err(e)) => {
                    failures += 1;
                    tracing::warn!(
                        task_id = %self.task_id,
                        error = %e,
                        failures,
                        "Status fetch failed",
                    );
                    if failures < max_failures {
                        continue;
                    }
                    TaskPatch::failed()
                }
                Err(_) => {
                    failures += 1;
                    tracing::warn!(
                        task_id = %self.task_id,
                        timeout_ms = self.config.fetch_timeout.as_millis() as u64,
                        failures,
                        "Status fetch timed out",
                    );
                    if failures < max_failures {
                        continue;
                    }
                    TaskPatch::failed()
                }
            };

            match self
                .registry
                .update_attached(&self.task_id, &self.cancel, patch)
                .await
            {
                Ok(outcome) => {
                    let status = outcome.task().status;
                    if status.is_terminal() {
                        return self.exit(PollExit::Terminal(status));
                    }
                }
                Err(RegistryError::NotFound(_)) => return self.exit(PollExit::Removed),
                Err(RegistryError::Detached(_)) => return self.exit(PollExit::Detached),
                Err(RegistryError::InvalidTransition { from, .. }) if from.is_terminal() => {
                    return self.exit(PollExit::Terminal(from));
                }
                Err(e) => {
                    tracing::error!(task_id = %self.task_id, error = %e, "Rejected status update");
                }
            }
        }
    }

    fn exit(&self, reason: PollExit) -> PollExit {
        tracing::debug!(task_id = %self.task_id, ?reason, "Poller stopped");
        reason
    }
}

/// Translate a remote status observation into a registry patch.
///
/// Returns `None` when the observation cannot change the record: the job
/// is still pending, or the status is unrecognised. A success without an
/// image URL is recorded as a failure, since a completed task must carry
/// its image.
pub fn observation_patch(task_id: &str, response: &FetchResponse) -> Option<TaskPatch> {
    match response.status.task_status() {
        None => {
            tracing::warn!(task_id, raw = %response.raw, "Unrecognised remote status");
            None
        }
        Some(TaskStatus::Pending) => None,
        Some(TaskStatus::Processing) => Some(TaskPatch::processing()),
        Some(TaskStatus::Completed) => match response.image_url() {
            Some(url) => Some(TaskPatch::completed(url)),
            None => {
                tracing::warn!(task_id, raw = %response.raw, "Job succeeded without an image");
                Some(TaskPatch::failed())
            }
        },
        Some(TaskStatus::Failed) => Some(TaskPatch::failed()),
    }
}
