//! Bounded retry with a fixed delay
//!
//! Used by the track attachment path: attaching an inbound track can fail
//! while the publication metadata is still in flight, so the attempt is
//! repeated a few times before giving up.
//!
//! ## Usage
//!
//! ```rust
//! use a3s_room::retry::{with_retry, RetryConfig};
//!
//! # async fn example() {
//! let config = RetryConfig::default(); // 5 retries, 200ms apart
//! let result: Result<u32, String> =
//!     with_retry(&config, |_err| true, |_attempt| async { Ok(7) }).await;
//! assert_eq!(result, Ok(7));
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Configuration for fixed-delay retries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (0 = no retries)
    pub max_retries: u32,
    /// Delay between attempts in milliseconds
    pub delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            delay_ms: 200,
        }
    }
}

impl RetryConfig {
    /// Create a retry config with no retries (disabled)
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Total number of attempts including the first one
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// Execute an async operation, retrying failures accepted by `is_retryable`.
///
/// `operation` receives the 0-indexed attempt number and is called afresh on
/// every attempt, so it must re-resolve anything that may have changed in
/// between. Non-retryable errors are returned immediately; once retries are
/// exhausted the last error is returned.
pub async fn with_retry<T, E, F, Fut, P>(
    config: &RetryConfig,
    is_retryable: P,
    mut operation: F,
) -> std::result::Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    P: Fn(&E) -> bool,
    E: Display,
{
    let mut attempt = 0;
    loop {
        match operation(attempt).await {
            Ok(value) => {
                if attempt > 0 {
                    tracing::debug!(retries = attempt, "Operation succeeded after retries");
                }
                return Ok(value);
            }
            Err(err) if is_retryable(&err) && attempt < config.max_retries => {
                tracing::debug!(
                    attempt = attempt + 1,
                    max_attempts = config.max_attempts(),
                    delay_ms = config.delay_ms,
                    error = %err,
                    "Retryable failure, retrying"
                );
                tokio::time::sleep(config.delay()).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
