use std::time::Duration;

use anyhow::{Context, Result};

/// Fallback when `BACKEND_URL` is unset — matches the local backend dev port.
pub const DEFAULT_BASE_URL: &str = "http://localhost:3001";

/// Inter-poll delay while a generation is `PENDING`.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2500);
/// Hard ceiling on total polling time. Hitting it is a soft timeout: the job
/// keeps running server-side and can be reopened by `generationId` later.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(75);

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Backend base URL, no trailing slash. All endpoint paths are relative to it.
    pub base_url: String,
    /// Per-request timeout applied to the underlying HTTP client.
    pub request_timeout: Duration,
    pub poll_interval: Duration,
    pub poll_timeout: Duration,
}

impl Config {
    /// Loads configuration from the environment (`BACKEND_URL`,
    /// `POLL_INTERVAL_MS`, `POLL_TIMEOUT_MS`), reading `.env` if present.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let base_url = std::env::var("BACKEND_URL")
            .ok()
            .map(|raw| normalize_base_url(&raw))
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Ok(Config {
            base_url,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            poll_interval: duration_from_env("POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL)?,
            poll_timeout: duration_from_env("POLL_TIMEOUT_MS", DEFAULT_POLL_TIMEOUT)?,
        })
    }

    /// Builds a config pointing at `base_url` with default timings.
    pub fn new(base_url: impl Into<String>) -> Self {
        Config {
            base_url: normalize_base_url(&base_url.into()),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::new(DEFAULT_BASE_URL)
    }
}

fn duration_from_env(key: &str, default: Duration) -> Result<Duration> {
    match std::env::var(key) {
        Ok(raw) => {
            let millis: u64 = raw
                .trim()
                .parse()
                .with_context(|| format!("'{key}' must be a number of milliseconds"))?;
            Ok(Duration::from_millis(millis))
        }
        Err(_) => Ok(default),
    }
}

/// Trims whitespace and any trailing slash so `base_url + path` composes cleanly.
fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_trailing_slash() {
        assert_eq!(
            normalize_base_url("https://api.inkfolio.app/"),
            "https://api.inkfolio.app"
        );
    }

    #[test]
    fn test_normalize_trims_whitespace() {
        assert_eq!(
            normalize_base_url("  http://localhost:3001  "),
            "http://localhost:3001"
        );
    }

    #[test]
    fn test_new_normalizes_base_url() {
        let config = Config::new("http://localhost:3001///");
        assert_eq!(config.base_url, "http://localhost:3001");
    }

    #[test]
    fn test_default_timings() {
        let config = Config::default();
        assert_eq!(config.poll_interval, Duration::from_millis(2500));
        assert_eq!(config.poll_timeout, Duration::from_secs(75));
    }
}
