//! Pipeline configuration with environment-aware defaults
//!
//! Configuration is resolved once, at construction time, and injected into
//! the pipeline. Nothing re-reads the environment per call, so tests can
//! substitute endpoints deterministically.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default address of the sandbox execution service.
pub const DEFAULT_SANDBOX_URL: &str = "http://localhost:8080";

/// Environment variable overriding the sandbox endpoint, honored only by
/// [`PipelineConfig::from_env`].
pub const SANDBOX_URL_ENV: &str = "CRUCIBLE_SANDBOX_URL";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Address the generated program is POSTed to.
    #[serde(default = "default_sandbox_endpoint")]
    pub sandbox_endpoint: String,
    /// Per-request timeout applied to both the model and the sandbox call.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Retry a transient transport failure (connect/timeout) at most once.
    #[serde(default = "default_retry_transient")]
    pub retry_transient: bool,
}

fn default_sandbox_endpoint() -> String {
    DEFAULT_SANDBOX_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_retry_transient() -> bool {
    true
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sandbox_endpoint: default_sandbox_endpoint(),
            request_timeout_secs: default_request_timeout_secs(),
            retry_transient: default_retry_transient(),
        }
    }
}

impl PipelineConfig {
    /// Build a config from defaults plus the process environment, read once.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var(SANDBOX_URL_ENV) {
            if !url.trim().is_empty() {
                config.sandbox_endpoint = url;
            }
        }
        config
    }

    pub fn with_sandbox_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.sandbox_endpoint = endpoint.into();
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.sandbox_endpoint, DEFAULT_SANDBOX_URL);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert!(config.retry_transient);
    }

    #[test]
    #[serial]
    fn test_from_env_honors_override() {
        std::env::set_var(SANDBOX_URL_ENV, "http://sandbox.internal:9000");
        let config = PipelineConfig::from_env();
        assert_eq!(config.sandbox_endpoint, "http://sandbox.internal:9000");
        std::env::remove_var(SANDBOX_URL_ENV);
    }

    #[test]
    #[serial]
    fn test_from_env_ignores_blank_override() {
        std::env::set_var(SANDBOX_URL_ENV, "  ");
        let config = PipelineConfig::from_env();
        assert_eq!(config.sandbox_endpoint, DEFAULT_SANDBOX_URL);
        std::env::remove_var(SANDBOX_URL_ENV);
    }

    #[test]
    fn test_deserializes_with_partial_fields() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"sandbox_endpoint": "http://127.0.0.1:1234"}"#).unwrap();
        assert_eq!(config.sandbox_endpoint, "http://127.0.0.1:1234");
        assert_eq!(config.request_timeout_secs, 30);
    }
}
