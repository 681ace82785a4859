//! In-memory task registry.
//!
//! [`TaskRegistry`] is the single owner of every [`Task`] record. All
//! mutations go through it, and each one runs to completion under one
//! write guard, so readers never observe a half-applied update.
//!
//! The registry also holds the cancellation token of the poller attached
//! to each task. Removing or detaching a task cancels that token, and
//! guarded updates check it under the same lock as the mutation itself.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use imagegen_core::status::TaskStatus;
use imagegen_core::task::{Task, TaskPatch};
use imagegen_core::types::{TaskId, Timestamp};
use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;

use crate::error::RegistryError;
use crate::events::TaskEvent;

/// Broadcast channel capacity for registry events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Result of an accepted [`TaskRegistry::update`].
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    /// The record changed; carries the new record.
    Applied(Task),
    /// The patch was already reflected; the record is untouched.
    Unchanged(Task),
}

impl UpdateOutcome {
    pub fn task(&self) -> &Task {
        match self {
            UpdateOutcome::Applied(task) | UpdateOutcome::Unchanged(task) => task,
        }
    }

    pub fn into_task(self) -> Task {
        match self {
            UpdateOutcome::Applied(task) | UpdateOutcome::Unchanged(task) => task,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, UpdateOutcome::Applied(_))
    }
}

/// Bookkeeping for one record.
struct Entry {
    task: Task,
    /// Token of the attached poller, if any.
    poller: Option<CancellationToken>,
}

#[derive(Default)]
struct RegistryState {
    /// Insertion order of live ids.
    order: Vec<TaskId>,
    entries: HashMap<TaskId, Entry>,
    /// Every id ever inserted, so removed ids are never reused.
    issued: HashSet<TaskId>,
}

/// Ordered, thread-safe collection of task records.
///
/// Designed to be wrapped in `Arc` and shared between the orchestrator,
/// the pollers and any readers.
pub struct TaskRegistry {
    state: RwLock<RegistryState>,
    event_tx: broadcast::Sender<TaskEvent>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            state: RwLock::new(RegistryState::default()),
            event_tx,
        }
    }

    /// Subscribe to registry change events.
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.event_tx.subscribe()
    }

    /// Add a new `PENDING` record.
    ///
    /// The record must not carry an image or a finish time yet. Fails with
    /// [`RegistryError::DuplicateTask`] if the id is present or was used by
    /// a task removed earlier.
    pub async fn insert(&self, task: Task) -> Result<Task, RegistryError> {
        if task.status != TaskStatus::Pending {
            return Err(RegistryError::NotPending {
                task_id: task.id,
                status: task.status,
            });
        }
        let stale = match (&task.image, &task.finish_at) {
            (Some(_), _) => Some("a pending task cannot have an image"),
            (None, Some(_)) => Some("a pending task cannot have a finish time"),
            (None, None) => None,
        };
        if let Some(reason) = stale {
            return Err(RegistryError::InvalidRecord {
                task_id: task.id,
                reason: reason.to_string(),
            });
        }

        let mut state = self.state.write().await;
        if !state.issued.insert(task.id.clone()) {
            return Err(RegistryError::DuplicateTask(task.id));
        }
        state.order.push(task.id.clone());
        state.entries.insert(
            task.id.clone(),
            Entry {
                task: task.clone(),
                poller: None,
            },
        );

        tracing::debug!(task_id = %task.id, "Task recorded");
        self.publish(TaskEvent::Inserted { task: task.clone() });
        Ok(task)
    }

    /// Apply a status observation to one record.
    ///
    /// Re-applying the status a task already has is a no-op and returns
    /// [`UpdateOutcome::Unchanged`]. Backward transitions and transitions
    /// out of a terminal state are rejected.
    pub async fn update(&self, task_id: &str, patch: TaskPatch) -> Result<UpdateOutcome, RegistryError> {
        let mut state = self.state.write().await;
        self.apply_locked(&mut state, task_id, patch)
    }

    /// Apply an update on behalf of a poller, only if it is still attached.
    ///
    /// The token check and the mutation happen under one write guard, so
    /// once [`remove`](Self::remove) or [`detach`](Self::detach) returns,
    /// the poller holding `token` can no longer write.
    pub async fn update_attached(
        &self,
        task_id: &str,
        token: &CancellationToken,
        patch: TaskPatch,
    ) -> Result<UpdateOutcome, RegistryError> {
        let mut state = self.state.write().await;
        if token.is_cancelled() {
            return Err(RegistryError::Detached(task_id.to_string()));
        }
        self.apply_locked(&mut state, task_id, patch)
    }

    /// Delete a record and stop its poller. Returns `false` if it was
    /// already gone.
    pub async fn remove(&self, task_id: &str) -> bool {
        let mut state = self.state.write().await;
        let Some(entry) = state.entries.remove(task_id) else {
            return false;
        };
        state.order.retain(|id| id.as_str() != task_id);
        if let Some(token) = entry.poller {
            token.cancel();
        }

        tracing::info!(task_id, status = %entry.task.status, "Task removed");
        self.publish(TaskEvent::Removed {
            task_id: task_id.to_string(),
        });
        true
    }

    /// Current record for `task_id`.
    pub async fn get(&self, task_id: &str) -> Result<Task, RegistryError> {
        self.state
            .read()
            .await
            .entries
            .get(task_id)
            .map(|entry| entry.task.clone())
            .ok_or_else(|| RegistryError::NotFound(task_id.to_string()))
    }

    /// Snapshot of all records in insertion order.
    pub async fn list(&self) -> Vec<Task> {
        let state = self.state.read().await;
        state
            .order
            .iter()
            .filter_map(|id| state.entries.get(id))
            .map(|entry| entry.task.clone())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.entries.is_empty()
    }

    /// Register `token` as the poller of `task_id`.
    ///
    /// A previously attached poller is cancelled. Returns `false` without
    /// attaching when the task is already terminal.
    pub async fn attach(&self, task_id: &str, token: CancellationToken) -> Result<bool, RegistryError> {
        let mut state = self.state.write().await;
        let entry = state
            .entries
            .get_mut(task_id)
            .ok_or_else(|| RegistryError::NotFound(task_id.to_string()))?;

        if entry.task.is_terminal() {
            return Ok(false);
        }
        if let Some(previous) = entry.poller.replace(token) {
            previous.cancel();
        }
        Ok(true)
    }

    /// Cancel and forget the poller of `task_id`. Returns whether one was
    /// attached.
    pub async fn detach(&self, task_id: &str) -> bool {
        let mut state = self.state.write().await;
        match state.entries.get_mut(task_id).and_then(|e| e.poller.take()) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Whether a live poller is attached to `task_id`.
    pub async fn is_attached(&self, task_id: &str) -> bool {
        self.state
            .read()
            .await
            .entries
            .get(task_id)
            .and_then(|e| e.poller.as_ref())
            .is_some_and(|token| !token.is_cancelled())
    }

    // ---- private helpers ----

    fn apply_locked(
        &self,
        state: &mut RegistryState,
        task_id: &str,
        patch: TaskPatch,
    ) -> Result<UpdateOutcome, RegistryError> {
        let entry = state
            .entries
            .get_mut(task_id)
            .ok_or_else(|| RegistryError::NotFound(task_id.to_string()))?;

        let previous = entry.task.status;
        let changed = apply_patch(&mut entry.task, patch, Utc::now())?;
        if !changed {
            return Ok(UpdateOutcome::Unchanged(entry.task.clone()));
        }

        if entry.task.is_terminal() {
            // Nothing left to poll.
            entry.poller = None;
        }

        let task = entry.task.clone();
        tracing::info!(
            task_id,
            from = %previous,
            to = %task.status,
            "Task status updated",
        );
        self.publish(TaskEvent::Updated {
            task: task.clone(),
            previous,
        });
        Ok(UpdateOutcome::Applied(task))
    }

    fn publish(&self, event: TaskEvent) {
        // Ignore the SendError; it only means there are zero receivers.
        let _ = self.event_tx.send(event);
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply `patch` to `task`, enforcing the status state machine.
///
/// Returns `Ok(false)` when the task already has the patched status.
pub fn apply_patch(task: &mut Task, patch: TaskPatch, now: Timestamp) -> Result<bool, RegistryError> {
    let invalid = |reason: &str| RegistryError::InvalidPatch {
        task_id: task.id.clone(),
        reason: reason.to_string(),
    };

    match (patch.status, patch.image.is_some()) {
        (TaskStatus::Completed, false) => return Err(invalid("COMPLETED requires an image")),
        (status, true) if status != TaskStatus::Completed => {
            return Err(invalid("an image requires status COMPLETED"))
        }
        _ => {}
    }
    if patch.finish_at.is_some() && !patch.status.is_terminal() {
        return Err(invalid("finish time requires a terminal status"));
    }

    if patch.status == task.status {
        return Ok(false);
    }
    if !task.status.can_transition_to(patch.status) {
        return Err(RegistryError::InvalidTransition {
            task_id: task.id.clone(),
            from: task.status,
            to: patch.status,
        });
    }

    task.status = patch.status;
    task.image = patch.image;
    if task.status.is_terminal() {
        task.finish_at = Some(patch.finish_at.unwrap_or(now));
    }
    Ok(true)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use imagegen_core::task::GenerationParams;

    use super::*;

    fn pending(id: &str) -> Task {
        Task::pending(
            id,
            GenerationParams::new("m1").with_prompt("a cat"),
            "Model One",
            Utc::now(),
        )
    }

    #[test]
    fn apply_patch_sets_finish_time_on_terminal() {
        let mut task = pending("t1");
        let now = Utc::now();

        assert!(apply_patch(&mut task, TaskPatch::completed("https://x/1.png"), now).unwrap());
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.image.as_deref(), Some("https://x/1.png"));
        assert_eq!(task.finish_at, Some(now));
        assert!(task.invariants_hold());
    }

    #[test]
    fn apply_patch_prefers_explicit_finish_time() {
        let mut task = pending("t1");
        let at = Utc::now() - chrono::Duration::seconds(30);

        apply_patch(&mut task, TaskPatch::failed().with_finish_at(at), Utc::now()).unwrap();
        assert_eq!(task.finish_at, Some(at));
    }

    #[test]
    fn apply_patch_processing_leaves_finish_unset() {
        let mut task = pending("t1");
        apply_patch(&mut task, TaskPatch::processing(), Utc::now()).unwrap();
        assert_eq!(task.status, TaskStatus::Processing);
        assert!(task.finish_at.is_none());
        assert!(task.invariants_hold());
    }

    #[test]
    fn apply_patch_rejects_image_without_completed() {
        let mut task = pending("t1");
        let patch = TaskPatch {
            status: TaskStatus::Processing,
            image: Some("https://x/1.png".into()),
            finish_at: None,
        };
        assert_matches!(
            apply_patch(&mut task, patch, Utc::now()),
            Err(RegistryError::InvalidPatch { .. })
        );
        assert_eq!(task.status, TaskStatus::Pending);
    }

    #[test]
    fn apply_patch_rejects_completed_without_image() {
        let mut task = pending("t1");
        assert_matches!(
            apply_patch(&mut task, TaskPatch::status(TaskStatus::Completed), Utc::now()),
            Err(RegistryError::InvalidPatch { .. })
        );
    }

    #[test]
    fn apply_patch_rejects_finish_time_on_non_terminal() {
        let mut task = pending("t1");
        let patch = TaskPatch::processing().with_finish_at(Utc::now());
        assert_matches!(
            apply_patch(&mut task, patch, Utc::now()),
            Err(RegistryError::InvalidPatch { .. })
        );
    }

    #[test]
    fn apply_patch_rejects_backward_transition() {
        let mut task = pending("t1");
        apply_patch(&mut task, TaskPatch::processing(), Utc::now()).unwrap();
        assert_matches!(
            apply_patch(&mut task, TaskPatch::status(TaskStatus::Pending), Utc::now()),
            Err(RegistryError::InvalidTransition {
                from: TaskStatus::Processing,
                to: TaskStatus::Pending,
                ..
            })
        );
    }

    #[test]
    fn apply_patch_same_terminal_status_is_noop() {
        let mut task = pending("t1");
        apply_patch(&mut task, TaskPatch::completed("https://x/1.png"), Utc::now()).unwrap();
        let before = task.clone();

        let changed =
            apply_patch(&mut task, TaskPatch::completed("https://x/other.png"), Utc::now()).unwrap();
        assert!(!changed);
        assert_eq!(task, before);
    }

    #[test]
    fn apply_patch_rejects_leaving_terminal_state() {
        let mut task = pending("t1");
        apply_patch(&mut task, TaskPatch::failed(), Utc::now()).unwrap();
        assert_matches!(
            apply_patch(&mut task, TaskPatch::completed("https://x/1.png"), Utc::now()),
            Err(RegistryError::InvalidTransition {
                from: TaskStatus::Failed,
                to: TaskStatus::Completed,
                ..
            })
        );
        assert!(task.image.is_none());
    }

    #[tokio::test]
    async fn remove_cancels_attached_token() {
        let registry = TaskRegistry::new();
        registry.insert(pending("t1")).await.unwrap();
        let token = CancellationToken::new();
        assert!(registry.attach("t1", token.clone()).await.unwrap());
        assert!(registry.is_attached("t1").await);

        assert!(registry.remove("t1").await);
        assert!(token.is_cancelled());
        assert!(!registry.remove("t1").await);
    }

    #[tokio::test]
    async fn reattach_cancels_previous_token() {
        let registry = TaskRegistry::new();
        registry.insert(pending("t1")).await.unwrap();
        let first = CancellationToken::new();
        let second = CancellationToken::new();

        registry.attach("t1", first.clone()).await.unwrap();
        registry.attach("t1", second.clone()).await.unwrap();

        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
    }

    #[tokio::test]
    async fn attach_to_terminal_task_is_refused() {
        let registry = TaskRegistry::new();
        registry.insert(pending("t1")).await.unwrap();
        registry.update("t1", TaskPatch::failed()).await.unwrap();

        assert!(!registry.attach("t1", CancellationToken::new()).await.unwrap());
        assert!(!registry.is_attached("t1").await);
    }

    #[tokio::test]
    async fn terminal_update_releases_poller_slot() {
        let registry = TaskRegistry::new();
        registry.insert(pending("t1")).await.unwrap();
        let token = CancellationToken::new();
        registry.attach("t1", token.clone()).await.unwrap();

        registry
            .update_attached("t1", &token, TaskPatch::completed("https://x/1.png"))
            .await
            .unwrap();

        assert!(!registry.is_attached("t1").await);
        assert!(!registry.detach("t1").await);
    }
}
