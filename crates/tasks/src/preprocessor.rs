//! Prompt preprocessing before job submission.
//!
//! Prompts not written in the target language are translated through the
//! remote translation service. Translation is best-effort: if it fails
//! or does not answer in time, the job is submitted with the original
//! prompt.

use std::sync::Arc;
use std::time::Duration;

use imagegen_client::backend::Translator;
use imagegen_core::language::{EnglishDetector, LanguageDetector, LANG_ENGLISH};
use imagegen_core::task::GenerationParams;

/// Default upper bound for one translation call.
pub const DEFAULT_TRANSLATE_TIMEOUT: Duration = Duration::from_secs(30);

/// Decides whether a submission's prompt needs translating, and does it.
#[derive(Clone)]
pub struct Preprocessor {
    translator: Option<Arc<dyn Translator>>,
    detector: Arc<dyn LanguageDetector>,
    target_language: String,
    timeout: Duration,
}

impl Preprocessor {
    /// Translate non-English prompts to English through `translator`.
    pub fn new(translator: Arc<dyn Translator>) -> Self {
        Self {
            translator: Some(translator),
            detector: Arc::new(EnglishDetector),
            target_language: LANG_ENGLISH.to_string(),
            timeout: DEFAULT_TRANSLATE_TIMEOUT,
        }
    }

    /// A preprocessor that passes every submission through untouched.
    pub fn disabled() -> Self {
        Self {
            translator: None,
            detector: Arc::new(EnglishDetector),
            target_language: LANG_ENGLISH.to_string(),
            timeout: DEFAULT_TRANSLATE_TIMEOUT,
        }
    }

    pub fn with_target_language(mut self, language: impl Into<String>) -> Self {
        self.target_language = language.into();
        self
    }

    /// Give up on a translation after `timeout` and keep the original prompt.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_detector(mut self, detector: Arc<dyn LanguageDetector>) -> Self {
        self.detector = detector;
        self
    }

    pub fn target_language(&self) -> &str {
        &self.target_language
    }

    /// Return the params to submit for `params`.
    ///
    /// The prompt is replaced by its translation only when it is present,
    /// not already in the target language, and the translation succeeds
    /// with a non-blank result. Every other field is copied unchanged.
    pub async fn prepare(&self, params: &GenerationParams) -> GenerationParams {
        let Some(translator) = &self.translator else {
            return params.clone();
        };
        let Some(prompt) = params.prompt_text() else {
            return params.clone();
        };
        if self.detector.is_language(prompt, &self.target_language) {
            return params.clone();
        }

        let translation =
            tokio::time::timeout(self.timeout, translator.translate(prompt, &self.target_language)).await;
        match translation {
            Err(_) => {
                tracing::warn!(
                    model = %params.model,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Translation timed out, keeping original prompt",
                );
                params.clone()
            }
            Ok(Ok(translated)) if !translated.trim().is_empty() => {
                tracing::debug!(
                    model = %params.model,
                    target = %self.target_language,
                    "Prompt translated",
                );
                let mut prepared = params.clone();
                prepared.prompt = Some(translated);
                prepared
            }
            Ok(Ok(_)) => {
                tracing::warn!(model = %params.model, "Translation returned empty text, keeping original prompt");
                params.clone()
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    model = %params.model,
                    error = %e,
                    "Translation failed, keeping original prompt",
                );
                params.clone()
            }
        }
    }
}
