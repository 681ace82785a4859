//! REST API client for the remote generation and translation endpoints.
//!
//! Wraps job submission, job status retrieval and prompt translation
//! using [`reqwest`]. Every call is a single request; nothing is retried.

use std::time::Duration;

use imagegen_core::task::GenerationParams;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};

use crate::config::{ClientConfig, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::messages::{FetchResponse, SubmitResponse, TranslateRequest, TranslateResponse};

/// Job submission endpoint; `run_async` makes the service return at once.
pub const SUBMIT_PATH: &str = "302/v2/image/generate?run_async=true";

/// Job status endpoint, `{task_id}` is substituted.
pub const FETCH_PATH: &str = "302/v2/image/fetch/{task_id}";

/// Translation endpoint.
pub const TRANSLATE_PATH: &str = "v1/chat/completions";

/// HTTP client for the remote image-generation service.
#[derive(Debug, Clone)]
pub struct ImageGenApi {
    client: reqwest::Client,
    api_url: String,
}

/// Errors from the REST API layer.
///
/// All variants are transport failures from the caller's point of view.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service returned a non-2xx status code.
    #[error("Image API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The response body did not have the expected shape.
    #[error("Unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// A caller-side deadline elapsed before the call returned.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The client could not be built from its configuration.
    #[error("Invalid client configuration: {0}")]
    InvalidConfig(String),
}

impl ImageGenApi {
    /// Create a client with default settings and the default request
    /// timeout.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `https://api.302.ai`.
    pub fn new(api_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to a client without request timeout");
                reqwest::Client::new()
            });
        Self::with_client(client, api_url)
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    ///
    /// The client's own timeout settings apply unchanged.
    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        Self { client, api_url }
    }

    /// Build a client carrying the configured timeout and bearer key.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = &config.api_key {
            let value = HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|e| ApiError::InvalidConfig(format!("API key is not a valid header: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self::with_client(client, config.api_url.clone()))
    }

    /// Base URL this client talks to.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Submit a generation job.
    ///
    /// Sends `POST /302/v2/image/generate?run_async=true` with the params as
    /// the JSON body. Returns the server-assigned job id and initial status.
    pub async fn submit_job(&self, params: &GenerationParams) -> Result<SubmitResponse, ApiError> {
        let response = self
            .client
            .post(self.url(SUBMIT_PATH))
            .json(params)
            .send()
            .await?;

        let body = Self::parse_response::<SubmitResponse>(response).await?;
        tracing::debug!(task_id = %body.task_id, status = ?body.status, "Job submitted");
        Ok(body)
    }

    /// Retrieve the current status of a job.
    ///
    /// Sends `GET /302/v2/image/fetch/{task_id}`.
    pub async fn fetch_job_status(&self, task_id: &str) -> Result<FetchResponse, ApiError> {
        let response = self
            .client
            .get(self.url(&FETCH_PATH.replace("{task_id}", task_id)))
            .send()
            .await?;

        let raw = Self::parse_response::<serde_json::Value>(response).await?;
        Ok(FetchResponse::from_value(raw)?)
    }

    /// Translate a text into the target language.
    ///
    /// Sends `POST /v1/chat/completions` with a `deepl-<target>` model.
    pub async fn translate(&self, text: &str, target_language: &str) -> Result<String, ApiError> {
        let response = self
            .client
            .post(self.url(TRANSLATE_PATH))
            .json(&TranslateRequest::new(text, target_language))
            .send()
            .await?;

        let body = Self::parse_response::<TranslateResponse>(response).await?;
        Ok(body.output)
    }

    // ---- private helpers ----

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_url, path)
    }

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or an [`ApiError::Api`] containing
    /// the status and body text on failure.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ApiError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let response = Self::ensure_success(response).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice::<T>(&bytes)?)
    }
}
