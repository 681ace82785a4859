//! Task records, submission parameters and status patches.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::status::TaskStatus;
use crate::types::{TaskId, Timestamp};

/// Option key carrying a reference image for image-to-image models.
///
/// A reference image stands in for the prompt during validation.
pub const OPTION_IMAGE: &str = "image";

// ---------------------------------------------------------------------------
// GenerationParams
// ---------------------------------------------------------------------------

/// Parameters of one generation request, exactly as the caller supplied them.
///
/// Model-specific options (size, seed, style, ...) are kept free-form and
/// flattened into the request body next to `model` and `prompt`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Remote model identifier, e.g. `"flux-schnell"`.
    pub model: String,

    /// Prompt text. Some models accept a reference image instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,

    /// Model-specific options.
    #[serde(flatten)]
    pub options: serde_json::Map<String, serde_json::Value>,
}

impl GenerationParams {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: None,
            options: serde_json::Map::new(),
        }
    }

    /// Set the prompt text.
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    /// Set a model-specific option.
    pub fn with_option(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }

    /// The prompt, if present and not blank.
    pub fn prompt_text(&self) -> Option<&str> {
        self.prompt.as_deref().filter(|p| !p.trim().is_empty())
    }

    /// Check the fields every submission needs.
    ///
    /// A non-blank model is required, plus either a non-blank prompt or
    /// an [`OPTION_IMAGE`] option.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.model.trim().is_empty() {
            return Err(CoreError::Validation("Model must not be empty".to_string()));
        }
        let has_image = self
            .options
            .get(OPTION_IMAGE)
            .is_some_and(|v| !v.is_null() && v.as_str() != Some(""));
        if self.prompt_text().is_none() && !has_image {
            return Err(CoreError::Validation(format!(
                "A prompt or an '{OPTION_IMAGE}' option is required for model '{}'",
                self.model
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// Client-side record tracking one submitted generation job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub status: TaskStatus,
    /// Submission parameters as supplied by the caller, never mutated.
    pub params: GenerationParams,
    /// Human-readable label for the selected model.
    pub display_name: String,
    /// Result image URL, present only once `Completed`.
    pub image: Option<String>,
    pub created_at: Timestamp,
    /// Set once, when the task enters a terminal state.
    pub finish_at: Option<Timestamp>,
}

impl Task {
    /// A freshly submitted task in the `Pending` state.
    pub fn pending(
        id: impl Into<TaskId>,
        params: GenerationParams,
        display_name: impl Into<String>,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id: id.into(),
            status: TaskStatus::Pending,
            params,
            display_name: display_name.into(),
            image: None,
            created_at,
            finish_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// `image` is set iff completed, `finish_at` is set iff terminal.
    pub fn invariants_hold(&self) -> bool {
        self.image.is_some() == (self.status == TaskStatus::Completed)
            && self.finish_at.is_some() == self.status.is_terminal()
    }
}

// ---------------------------------------------------------------------------
// TaskPatch
// ---------------------------------------------------------------------------

/// A status observation to apply to a task record.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskPatch {
    pub status: TaskStatus,
    pub image: Option<String>,
    /// Explicit finish time; defaults to now when entering a terminal state.
    pub finish_at: Option<Timestamp>,
}

impl TaskPatch {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status,
            image: None,
            finish_at: None,
        }
    }

    pub fn processing() -> Self {
        Self::status(TaskStatus::Processing)
    }

    pub fn completed(image: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Completed,
            image: Some(image.into()),
            finish_at: None,
        }
    }

    pub fn failed() -> Self {
        Self::status(TaskStatus::Failed)
    }

    pub fn with_finish_at(mut self, at: Timestamp) -> Self {
        self.finish_at = Some(at);
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::Utc;
    use serde_json::json;

    use super::*;

    #[test]
    fn params_flatten_options_into_body() {
        let params = GenerationParams::new("flux-schnell")
            .with_prompt("a cat")
            .with_option("image_size", json!({"width": 512, "height": 512}));

        let body = serde_json::to_value(&params).unwrap();
        assert_eq!(body["model"], "flux-schnell");
        assert_eq!(body["prompt"], "a cat");
        assert_eq!(body["image_size"]["width"], 512);
    }

    #[test]
    fn params_without_prompt_omit_the_field() {
        let body = serde_json::to_value(GenerationParams::new("m1")).unwrap();
        assert!(body.get("prompt").is_none());
    }

    #[test]
    fn validate_accepts_model_and_prompt() {
        assert!(GenerationParams::new("m1").with_prompt("a cat").validate().is_ok());
    }

    #[test]
    fn validate_accepts_reference_image_instead_of_prompt() {
        let params =
            GenerationParams::new("m1").with_option(OPTION_IMAGE, json!("https://x/ref.png"));
        assert!(params.validate().is_ok());
    }

    #[test]
    fn validate_rejects_blank_model() {
        let err = GenerationParams::new("  ").with_prompt("a cat").validate();
        assert_matches!(err, Err(CoreError::Validation(_)));
    }

    #[test]
    fn validate_rejects_missing_or_blank_prompt() {
        assert_matches!(
            GenerationParams::new("m1").validate(),
            Err(CoreError::Validation(_))
        );
        assert_matches!(
            GenerationParams::new("m1").with_prompt("   ").validate(),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn pending_task_satisfies_invariants() {
        let task = Task::pending("t1", GenerationParams::new("m1"), "Model One", Utc::now());
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.invariants_hold());
        assert!(!task.is_terminal());
    }

    #[test]
    fn completed_without_image_breaks_invariants() {
        let mut task = Task::pending("t1", GenerationParams::new("m1"), "Model One", Utc::now());
        task.status = TaskStatus::Completed;
        task.finish_at = Some(Utc::now());
        assert!(!task.invariants_hold());
    }
}
