//! Seams between the task engine and the remote services.
//!
//! The engine depends on these traits rather than on [`ImageGenApi`]
//! directly, so it can run against any implementation.

use async_trait::async_trait;
use imagegen_core::task::GenerationParams;

use crate::api::{ApiError, ImageGenApi};
use crate::messages::{FetchResponse, SubmitResponse};

/// Remote job submission and status retrieval.
#[async_trait]
pub trait JobBackend: Send + Sync {
    async fn submit(&self, params: &GenerationParams) -> Result<SubmitResponse, ApiError>;

    async fn fetch_status(&self, task_id: &str) -> Result<FetchResponse, ApiError>;
}

/// Remote text translation.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String, ApiError>;
}

#[async_trait]
impl JobBackend for ImageGenApi {
    async fn submit(&self, params: &GenerationParams) -> Result<SubmitResponse, ApiError> {
        self.submit_job(params).await
    }

    async fn fetch_status(&self, task_id: &str) -> Result<FetchResponse, ApiError> {
        self.fetch_job_status(task_id).await
    }
}

#[async_trait]
impl Translator for ImageGenApi {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String, ApiError> {
        ImageGenApi::translate(self, text, target_language).await
    }
}
