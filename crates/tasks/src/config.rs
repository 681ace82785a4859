use std::time::Duration;

use imagegen_core::error::CoreError;
use imagegen_core::language::LANG_ENGLISH;

use crate::orchestrator::DEFAULT_SUBMIT_TIMEOUT;
use crate::poller::{PollerConfig, DEFAULT_FETCH_TIMEOUT, DEFAULT_MAX_FETCH_FAILURES, DEFAULT_POLL_INTERVAL};
use crate::preprocessor::DEFAULT_TRANSLATE_TIMEOUT;

/// Engine settings: polling cadence and prompt translation.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub poller: PollerConfig,
    /// Language prompts are translated into (default: `en`).
    pub target_language: String,
    /// Whether prompts are translated at all (default: `true`).
    pub translate_prompts: bool,
    /// Upper bound for one translation call (default: 30 s).
    pub translate_timeout: Duration,
    /// Upper bound for one job submission (default: 30 s).
    pub submit_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poller: PollerConfig::default(),
            target_language: LANG_ENGLISH.to_string(),
            translate_prompts: true,
            translate_timeout: DEFAULT_TRANSLATE_TIMEOUT,
            submit_timeout: DEFAULT_SUBMIT_TIMEOUT,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                           | Default |
    /// |-----------------------------------|---------|
    /// | `IMAGEGEN_POLL_INTERVAL_SECS`     | `3`     |
    /// | `IMAGEGEN_FETCH_TIMEOUT_SECS`     | `30`    |
    /// | `IMAGEGEN_MAX_FETCH_FAILURES`     | `1`     |
    /// | `IMAGEGEN_TARGET_LANGUAGE`        | `en`    |
    /// | `IMAGEGEN_TRANSLATE_PROMPTS`      | `true`  |
    /// | `IMAGEGEN_TRANSLATE_TIMEOUT_SECS` | `30`    |
    /// | `IMAGEGEN_SUBMIT_TIMEOUT_SECS`    | `30`    |
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let interval = parse_secs(&lookup, "IMAGEGEN_POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL)?;
        let fetch_timeout = parse_secs(&lookup, "IMAGEGEN_FETCH_TIMEOUT_SECS", DEFAULT_FETCH_TIMEOUT)?;
        let translate_timeout =
            parse_secs(&lookup, "IMAGEGEN_TRANSLATE_TIMEOUT_SECS", DEFAULT_TRANSLATE_TIMEOUT)?;
        let submit_timeout = parse_secs(&lookup, "IMAGEGEN_SUBMIT_TIMEOUT_SECS", DEFAULT_SUBMIT_TIMEOUT)?;

        let max_fetch_failures = match lookup("IMAGEGEN_MAX_FETCH_FAILURES") {
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(n) if n >= 1 => n,
                _ => {
                    return Err(CoreError::Config(format!(
                        "IMAGEGEN_MAX_FETCH_FAILURES must be a positive integer, got '{raw}'"
                    )))
                }
            },
            None => DEFAULT_MAX_FETCH_FAILURES,
        };

        let target_language = lookup("IMAGEGEN_TARGET_LANGUAGE")
            .map(|v| v.trim().to_ascii_lowercase())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| LANG_ENGLISH.to_string());

        let translate_prompts = match lookup("IMAGEGEN_TRANSLATE_PROMPTS") {
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(CoreError::Config(format!(
                        "IMAGEGEN_TRANSLATE_PROMPTS must be a boolean, got '{raw}'"
                    )))
                }
            },
            None => true,
        };

        Ok(Self {
            poller: PollerConfig {
                interval,
                fetch_timeout,
                max_fetch_failures,
            },
            target_language,
            translate_prompts,
            translate_timeout,
            submit_timeout,
        })
    }
}

fn parse_secs<F>(lookup: &F, key: &str, default: Duration) -> Result<Duration, CoreError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => match raw.trim().parse::<f64>() {
            Ok(secs) if secs.is_finite() && secs > 0.0 => Ok(Duration::from_secs_f64(secs)),
            _ => Err(CoreError::Config(format!(
                "{key} must be a positive number of seconds, got '{raw}'"
            ))),
        },
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = EngineConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.poller.interval, Duration::from_secs(3));
        assert_eq!(config.poller.fetch_timeout, Duration::from_secs(30));
        assert_eq!(config.poller.max_fetch_failures, 1);
        assert_eq!(config.target_language, "en");
        assert!(config.translate_prompts);
        assert_eq!(config.translate_timeout, Duration::from_secs(30));
        assert_eq!(config.submit_timeout, Duration::from_secs(30));
    }

    #[test]
    fn reads_overrides() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("IMAGEGEN_POLL_INTERVAL_SECS", "0.5"),
            ("IMAGEGEN_FETCH_TIMEOUT_SECS", "10"),
            ("IMAGEGEN_MAX_FETCH_FAILURES", "3"),
            ("IMAGEGEN_TARGET_LANGUAGE", "DE"),
            ("IMAGEGEN_TRANSLATE_PROMPTS", "off"),
            ("IMAGEGEN_TRANSLATE_TIMEOUT_SECS", "2"),
            ("IMAGEGEN_SUBMIT_TIMEOUT_SECS", "7.5"),
        ]))
        .unwrap();
        assert_eq!(config.poller.interval, Duration::from_millis(500));
        assert_eq!(config.poller.fetch_timeout, Duration::from_secs(10));
        assert_eq!(config.poller.max_fetch_failures, 3);
        assert_eq!(config.target_language, "de");
        assert!(!config.translate_prompts);
        assert_eq!(config.translate_timeout, Duration::from_secs(2));
        assert_eq!(config.submit_timeout, Duration::from_millis(7500));
    }

    #[test]
    fn rejects_bad_values() {
        for (key, value) in [
            ("IMAGEGEN_POLL_INTERVAL_SECS", "0"),
            ("IMAGEGEN_POLL_INTERVAL_SECS", "fast"),
            ("IMAGEGEN_MAX_FETCH_FAILURES", "0"),
            ("IMAGEGEN_TRANSLATE_PROMPTS", "maybe"),
            ("IMAGEGEN_TRANSLATE_TIMEOUT_SECS", "-1"),
            ("IMAGEGEN_SUBMIT_TIMEOUT_SECS", "never"),
        ] {
            assert_matches!(
                EngineConfig::from_lookup(lookup(&[(key, value)])),
                Err(CoreError::Config(_)),
                "{key}={value} should be rejected"
            );
        }
    }
}
