//! Client configuration.
//!
//! Built once from environment variables and handed to the
//! [`ChatChannel`](crate::ChatChannel) and
//! [`ConversationsApi`](crate::ConversationsApi).

use std::time::Duration;

/// Default backend base URL.
pub const DEFAULT_API_URL: &str = "http://localhost:8080";

/// Reconnect attempts allowed before the channel reports a terminal error.
pub const MAX_RETRIES: u32 = 5;

/// Delay before the first reconnect attempt; doubled on every attempt.
pub const BASE_DELAY_MS: u64 = 1000;

// ---------------------------------------------------------------------------
// RetryPolicy
// ---------------------------------------------------------------------------

/// Exponential backoff applied when the conversation socket drops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retry budget.
    pub max_retries: u32,
    /// Delay before retry number zero.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            base_delay: Duration::from_millis(BASE_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    /// Delay before the reconnect scheduled when `retry_count` retries have
    /// already been used: `base_delay * 2^retry_count`.
    pub fn delay_for(&self, retry_count: u32) -> Duration {
        let factor = 2u32.checked_pow(retry_count).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

// ---------------------------------------------------------------------------
// ChatConfig
// ---------------------------------------------------------------------------

/// Configuration shared by the real-time channel and the REST client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    /// Backend base URL (`http://` or `https://`).
    pub api_url: String,
    /// Reconnect policy of the real-time channel.
    pub retry: RetryPolicy,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

impl ChatConfig {
    /// Configuration for the given backend with the default retry policy.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            retry: RetryPolicy::default(),
        }
    }

    /// Build the configuration from environment variables.
    ///
    /// | Variable                     | Default                 |
    /// |------------------------------|-------------------------|
    /// | `VACANCE_API_URL`            | `http://localhost:8080` |
    /// | `VACANCE_CHAT_MAX_RETRIES`   | `5`                     |
    /// | `VACANCE_CHAT_BASE_DELAY_MS` | `1000`                  |
    pub fn from_env() -> Self {
        let api_url =
            std::env::var("VACANCE_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());

        let max_retries = std::env::var("VACANCE_CHAT_MAX_RETRIES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(MAX_RETRIES);

        let base_delay_ms = std::env::var("VACANCE_CHAT_BASE_DELAY_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(BASE_DELAY_MS);

        Self {
            api_url,
            retry: RetryPolicy {
                max_retries,
                base_delay: Duration::from_millis(base_delay_ms),
            },
        }
    }
}
