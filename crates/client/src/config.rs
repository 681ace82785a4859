use std::time::Duration;

use imagegen_core::error::CoreError;

/// Default remote base URL.
pub const DEFAULT_API_URL: &str = "https://api.302.ai";

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Connection settings for the remote services.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base HTTP URL (default: `https://api.302.ai`).
    pub api_url: String,
    /// Bearer key sent with every request, if set.
    pub api_key: Option<String>,
    /// Upper bound for one request, including reading the body.
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                         | Default              |
    /// |---------------------------------|----------------------|
    /// | `IMAGEGEN_API_URL`              | `https://api.302.ai` |
    /// | `IMAGEGEN_API_KEY`              | unset                |
    /// | `IMAGEGEN_REQUEST_TIMEOUT_SECS` | `30`                 |
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_url = lookup("IMAGEGEN_API_URL")
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let api_key = lookup("IMAGEGEN_API_KEY")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let request_timeout_secs = match lookup("IMAGEGEN_REQUEST_TIMEOUT_SECS") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                CoreError::Config(format!(
                    "IMAGEGEN_REQUEST_TIMEOUT_SECS must be a valid u64, got '{raw}'"
                ))
            })?,
            None => DEFAULT_REQUEST_TIMEOUT_SECS,
        };
        if request_timeout_secs == 0 {
            return Err(CoreError::Config(
                "IMAGEGEN_REQUEST_TIMEOUT_SECS must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            api_url,
            api_key,
            request_timeout: Duration::from_secs(request_timeout_secs),
        })
    }
}
