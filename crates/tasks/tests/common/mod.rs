//! Scripted fakes for the remote job and translation services.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use imagegen_client::api::ApiError;
use imagegen_client::backend::{JobBackend, Translator};
use imagegen_client::messages::{FetchResponse, RemoteStatus, SubmitResponse};
use imagegen_core::task::GenerationParams;
use imagegen_tasks::poller::PollerConfig;
use serde_json::json;

/// Poller settings fast enough for tests.
pub fn fast_config() -> PollerConfig {
    PollerConfig {
        interval: Duration::from_millis(10),
        fetch_timeout: Duration::from_secs(2),
        max_fetch_failures: 1,
    }
}

// ---------------------------------------------------------------------------
// Fetch script
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Reply {
    Status(serde_json::Value),
    Error,
}

/// One scripted answer of the status endpoint.
#[derive(Debug, Clone)]
pub struct Step {
    delay: Duration,
    reply: Reply,
}

impl Step {
    pub fn status(task_id: &str, status: &str) -> Self {
        Self {
            delay: Duration::ZERO,
            reply: Reply::Status(json!({"task_id": task_id, "status": status})),
        }
    }

    pub fn succeeded(task_id: &str, url: &str) -> Self {
        Self {
            delay: Duration::ZERO,
            reply: Reply::Status(json!({
                "task_id": task_id,
                "status": "succeeded",
                "output": url,
            })),
        }
    }

    pub fn error() -> Self {
        Self {
            delay: Duration::ZERO,
            reply: Reply::Error,
        }
    }

    /// Answer only after `delay`.
    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

// ---------------------------------------------------------------------------
// FakeBackend
// ---------------------------------------------------------------------------

/// Job backend answering from per-task scripts.
///
/// Each fetch consumes the next step of the task's script; the last step
/// repeats forever. Tasks without a script always fail to fetch.
#[derive(Default)]
pub struct FakeBackend {
    ids: Mutex<VecDeque<String>>,
    reject_submissions: bool,
    submit_delay: Duration,
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    submitted: Mutex<Vec<GenerationParams>>,
    fetches: Mutex<HashMap<String, usize>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend whose submit endpoint always fails.
    pub fn rejecting() -> Self {
        Self {
            reject_submissions: true,
            ..Self::default()
        }
    }

    /// Hand out these ids, in order, to submitted jobs.
    pub fn with_ids(self, ids: &[&str]) -> Self {
        self.ids
            .lock()
            .unwrap()
            .extend(ids.iter().map(|id| id.to_string()));
        self
    }

    /// Answer submissions only after `delay`.
    pub fn with_submit_delay(mut self, delay: Duration) -> Self {
        self.submit_delay = delay;
        self
    }

    pub fn with_script(self, task_id: &str, steps: Vec<Step>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(task_id.to_string(), steps.into());
        self
    }

    pub fn submitted(&self) -> Vec<GenerationParams> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn fetch_count(&self, task_id: &str) -> usize {
        self.fetches
            .lock()
            .unwrap()
            .get(task_id)
            .copied()
            .unwrap_or(0)
    }

    fn next_step(&self, task_id: &str) -> Step {
        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(task_id) {
            Some(steps) if steps.len() > 1 => steps.pop_front().unwrap(),
            Some(steps) => steps.front().cloned().unwrap_or_else(Step::error),
            None => Step::error(),
        }
    }
}

#[async_trait]
impl JobBackend for FakeBackend {
    async fn submit(&self, params: &GenerationParams) -> Result<SubmitResponse, ApiError> {
        self.submitted.lock().unwrap().push(params.clone());
        if !self.submit_delay.is_zero() {
            tokio::time::sleep(self.submit_delay).await;
        }
        if self.reject_submissions {
            return Err(ApiError::Api {
                status: 503,
                body: "service unavailable".to_string(),
            });
        }
        let task_id = self
            .ids
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        Ok(SubmitResponse {
            task_id,
            status: RemoteStatus::Pending,
        })
    }

    async fn fetch_status(&self, task_id: &str) -> Result<FetchResponse, ApiError> {
        *self
            .fetches
            .lock()
            .unwrap()
            .entry(task_id.to_string())
            .or_default() += 1;

        let step = self.next_step(task_id);
        if !step.delay.is_zero() {
            tokio::time::sleep(step.delay).await;
        }
        match step.reply {
            Reply::Status(value) => Ok(FetchResponse::from_value(value)?),
            Reply::Error => Err(ApiError::Api {
                status: 500,
                body: "internal error".to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// FakeTranslator
// ---------------------------------------------------------------------------

/// Translator answering every request with a fixed result.
pub struct FakeTranslator {
    answer: Option<String>,
    hang: bool,
    calls: Mutex<usize>,
}

impl FakeTranslator {
    pub fn answering(text: &str) -> Arc<Self> {
        Arc::new(Self {
            answer: Some(text.to_string()),
            hang: false,
            calls: Mutex::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            answer: None,
            hang: false,
            calls: Mutex::new(0),
        })
    }

    /// A translator that never answers.
    pub fn hanging() -> Arc<Self> {
        Arc::new(Self {
            answer: None,
            hang: true,
            calls: Mutex::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl Translator for FakeTranslator {
    async fn translate(&self, _text: &str, _target_language: &str) -> Result<String, ApiError> {
        *self.calls.lock().unwrap() += 1;
        if self.hang {
            std::future::pending::<()>().await;
        }
        self.answer.clone().ok_or_else(|| ApiError::Api {
            status: 429,
            body: "quota exceeded".to_string(),
        })
    }
}
