//! Job submission and poller lifecycle.
//!
//! [`SubmissionOrchestrator`] turns a parameter set into a tracked task:
//! it validates the request, runs the [`Preprocessor`], submits the job,
//! records a `PENDING` task and attaches a [`Poller`] to it. It also owns
//! the poller lifecycle (`attach` / `detach` / `remove` / `shutdown`) and
//! handles presentation [`Command`]s.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use imagegen_client::api::ApiError;
use imagegen_client::backend::JobBackend;
use imagegen_core::catalog::{DisplayNameResolver, ModelCatalog};
use imagegen_core::commands::{Command, CommandOutcome};
use imagegen_core::status::TaskStatus;
use imagegen_core::task::{GenerationParams, Task};
use imagegen_core::types::TaskId;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::error::{CommandError, RegistryError, SubmitError};
use crate::poller::{PollExit, Poller, PollerConfig};
use crate::preprocessor::Preprocessor;
use crate::registry::TaskRegistry;

/// How long [`SubmissionOrchestrator::shutdown`] waits for each poller.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Default upper bound for one job submission.
pub const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Submits jobs and manages one poller per active task.
///
/// Shares its [`TaskRegistry`] with readers; every task-state mutation
/// still goes through the registry.
pub struct SubmissionOrchestrator {
    registry: Arc<TaskRegistry>,
    backend: Arc<dyn JobBackend>,
    preprocessor: Preprocessor,
    display_names: Arc<dyn DisplayNameResolver>,
    poller_config: PollerConfig,
    submit_timeout: Duration,
    /// Running poller tasks indexed by task id. Locked before the registry
    /// whenever both are needed.
    pollers: Mutex<HashMap<TaskId, JoinHandle<PollExit>>>,
    /// Master cancellation token, cancelled during shutdown.
    cancel: CancellationToken,
}

impl SubmissionOrchestrator {
    pub fn new(
        registry: Arc<TaskRegistry>,
        backend: Arc<dyn JobBackend>,
        preprocessor: Preprocessor,
        poller_config: PollerConfig,
    ) -> Self {
        Self {
            registry,
            backend,
            preprocessor,
            display_names: Arc::new(ModelCatalog::new()),
            poller_config,
            submit_timeout: DEFAULT_SUBMIT_TIMEOUT,
            pollers: Mutex::new(HashMap::new()),
            cancel: CancellationToken::new(),
        }
    }

    /// Use `resolver` for task display names instead of the raw model id.
    pub fn with_display_names(mut self, resolver: Arc<dyn DisplayNameResolver>) -> Self {
        self.display_names = resolver;
        self
    }

    /// Fail a submission that gets no answer within `timeout`.
    pub fn with_submit_timeout(mut self, timeout: Duration) -> Self {
        self.submit_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    /// Submit a generation job and start tracking it.
    ///
    /// On any error no task record is created. The stored task keeps the
    /// caller's params, even when the submitted prompt was translated.
    /// Once [`shutdown`](Self::shutdown) has started, submissions are refused.
    pub async fn submit_job(&self, params: GenerationParams) -> Result<Task, SubmitError> {
        if self.cancel.is_cancelled() {
            return Err(SubmitError::ShuttingDown);
        }
        params.validate()?;

        let prepared = self.preprocessor.prepare(&params).await;

        let response = tokio::time::timeout(self.submit_timeout, self.backend.submit(&prepared))
            .await
            .unwrap_or(Err(ApiError::Timeout(self.submit_timeout)))
            .map_err(|e| {
                tracing::error!(model = %params.model, error = %e, "Job submission failed");
                SubmitError::Submission(e)
            })?;

        let display_name = self.display_names.display_name(&params);
        let task = Task::pending(response.task_id, params, display_name, Utc::now());
        let task = self.registry.insert(task).await?;

        if !self.attach(&task.id).await? {
            // Shutdown began while the job was in flight; nothing will poll it.
            self.registry.remove(&task.id).await;
            tracing::warn!(task_id = %task.id, "Job submitted during shutdown, record dropped");
            return Err(SubmitError::ShuttingDown);
        }

        tracing::info!(
            task_id = %task.id,
            model = %task.params.model,
            "Job submitted",
        );
        Ok(task)
    }

    /// Start polling `task_id`, replacing any poller already attached.
    ///
    /// Returns `false` when the task is already terminal or the
    /// orchestrator is shutting down.
    pub async fn attach(&self, task_id: &str) -> Result<bool, RegistryError> {
        // Held until the handle is stored, so the registry's token and the
        // stored handle always belong to the same poller.
        let mut pollers = self.pollers.lock().await;
        if self.cancel.is_cancelled() {
            return Ok(false);
        }

        let token = self.cancel.child_token();
        if !self.registry.attach(task_id, token.clone()).await? {
            return Ok(false);
        }

        let poller = Poller::new(
            task_id.to_string(),
            Arc::clone(&self.registry),
            Arc::clone(&self.backend),
            self.poller_config.clone(),
            token,
        );
        let span = tracing::info_span!("poller", task_id = %task_id);
        let handle = tokio::spawn(poller.run().instrument(span));

        pollers.retain(|_, h| !h.is_finished());
        pollers.insert(task_id.to_string(), handle);
        Ok(true)
    }

    /// Stop polling `task_id` without touching its record.
    ///
    /// Returns whether a poller was attached.
    pub async fn detach(&self, task_id: &str) -> bool {
        let mut pollers = self.pollers.lock().await;
        let detached = self.registry.detach(task_id).await;
        pollers.remove(task_id);
        if detached {
            tracing::info!(task_id, "Poller detached");
        }
        detached
    }

    /// Delete a task and stop its poller. Idempotent.
    pub async fn remove(&self, task_id: &str) -> bool {
        let mut pollers = self.pollers.lock().await;
        let removed = self.registry.remove(task_id).await;
        pollers.remove(task_id);
        removed
    }

    /// Image URL of a completed task.
    pub async fn select_image(&self, task_id: &str) -> Result<String, CommandError> {
        let task = self.registry.get(task_id).await?;
        match (task.status, task.image) {
            (TaskStatus::Completed, Some(image)) => Ok(image),
            (status, _) => Err(CommandError::ImageNotReady {
                task_id: task.id,
                status,
            }),
        }
    }

    /// Dispatch a presentation command.
    pub async fn handle(&self, command: Command) -> Result<CommandOutcome, CommandError> {
        match command {
            Command::Submit { params } => {
                let task = self.submit_job(params).await?;
                Ok(CommandOutcome::Submitted { task })
            }
            Command::Remove { task_id } => {
                let existed = self.remove(&task_id).await;
                Ok(CommandOutcome::Removed { task_id, existed })
            }
            Command::SelectImage { task_id } => {
                let image = self.select_image(&task_id).await?;
                Ok(CommandOutcome::ImageSelected { task_id, image })
            }
        }
    }

    /// Number of pollers still running.
    pub async fn active_pollers(&self) -> usize {
        self.pollers
            .lock()
            .await
            .values()
            .filter(|h| !h.is_finished())
            .count()
    }

    /// Wait for every running poller to stop on its own.
    ///
    /// Returns how each poller exited, keyed by task id.
    pub async fn join_all(&self) -> HashMap<TaskId, PollExit> {
        let handles: Vec<(TaskId, JoinHandle<PollExit>)> =
            self.pollers.lock().await.drain().collect();

        let mut exits = HashMap::with_capacity(handles.len());
        for (task_id, handle) in handles {
            match handle.await {
                Ok(exit) => {
                    exits.insert(task_id, exit);
                }
                Err(e) => {
                    tracing::error!(task_id = %task_id, error = %e, "Poller task panicked");
                }
            }
        }
        exits
    }

    /// Stop all pollers.
    ///
    /// Cancels the master token, then waits up to 5 seconds per poller for
    /// a clean exit. Task records are left as they are.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down task orchestrator");
        self.cancel.cancel();

        let mut pollers = self.pollers.lock().await;
        for (task_id, handle) in pollers.drain() {
            tracing::debug!(task_id = %task_id, "Stopping poller");
            let _ = tokio::time::timeout(SHUTDOWN_TIMEOUT, handle).await;
        }

        tracing::info!("Task orchestrator shut down complete");
    }
}
