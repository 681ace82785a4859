//! Commands issued by a presentation layer to the task engine.
//!
//! Presentation never mutates task state directly; it sends one of these
//! and receives a [`CommandOutcome`].

use serde::{Deserialize, Serialize};

use crate::task::{GenerationParams, Task};
use crate::types::TaskId;

/// A user intent addressed to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Submit a new generation job.
    Submit { params: GenerationParams },
    /// Delete a task and stop its polling.
    Remove { task_id: TaskId },
    /// Pick the result image of a completed task.
    SelectImage { task_id: TaskId },
}

/// Result of a successfully handled [`Command`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommandOutcome {
    Submitted { task: Task },
    /// `existed` is `false` when the task was already gone.
    Removed { task_id: TaskId, existed: bool },
    ImageSelected { task_id: TaskId, image: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_use_tagged_json() {
        let json = r#"{"type":"remove","task_id":"abc"}"#;
        let cmd: Command = serde_json::from_str(json).unwrap();
        assert_eq!(
            cmd,
            Command::Remove {
                task_id: "abc".to_string()
            }
        );

        let json = r#"{"type":"submit","params":{"model":"m1","prompt":"a cat","seed":7}}"#;
        let cmd: Command = serde_json::from_str(json).unwrap();
        match cmd {
            Command::Submit { params } => {
                assert_eq!(params.model, "m1");
                assert_eq!(params.prompt.as_deref(), Some("a cat"));
                assert_eq!(params.options["seed"], 7);
            }
            other => panic!("Expected Submit, got {other:?}"),
        }
    }
}
