//! API boundary configuration.
//!
//! A single base URL for the backend plus per-operation timeouts, read from
//! environment variables with local-development defaults.

use std::env;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const GENERATE_TIMEOUT_SECS: u64 = 90;

/// Configuration for the backend REST boundary.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL of the backend API, without a trailing slash.
    pub base_url: String,
    /// Timeout for ordinary request/response calls.
    pub default_timeout: Duration,
    /// Timeout for calls that run AI generation server-side
    /// (message and intent exchanges).
    pub generate_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            default_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            generate_timeout: Duration::from_secs(GENERATE_TIMEOUT_SECS),
        }
    }
}

impl ApiConfig {
    /// Loads configuration from environment variables.
    ///
    /// `CAREBOT_API_URL` overrides the base URL; `CAREBOT_TIMEOUT_SECS` and
    /// `CAREBOT_GENERATE_TIMEOUT_SECS` override the timeouts. Anything unset
    /// falls back to the local development defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: env::var("CAREBOT_API_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            default_timeout: env_timeout("CAREBOT_TIMEOUT_SECS", defaults.default_timeout),
            generate_timeout: env_timeout(
                "CAREBOT_GENERATE_TIMEOUT_SECS",
                defaults.generate_timeout,
            ),
        }
    }

    /// Overrides the base URL after construction.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let url: String = base_url.into();
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    /// Overrides the default timeout after construction.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }
}

fn env_timeout(var: &str, fallback: Duration) -> Duration {
    env::var(var)
        .ok()
        .and_then(|raw| raw.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(fallback)
}
