/// Errors raised while checking requests and settings, before any remote
/// call is made.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A submission is missing a required field.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// An environment variable holds an unusable value.
    #[error("Configuration error: {0}")]
    Config(String),
}
