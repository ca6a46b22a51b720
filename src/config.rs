//! Room configuration
//!
//! `RoomOptions` can be built in code or parsed from JSON; every field has a
//! default, so partial documents are accepted.

use crate::error::{RoomError, Result};
use crate::retry::RetryConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Options controlling a room session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoomOptions {
    /// Retry policy for attaching inbound tracks to their publication
    pub attach_retry: RetryConfig,

    /// Handlers running longer than this are reported (not cancelled)
    pub slow_event_warning_ms: u64,

    /// Initial value of the local track-subscription permission
    pub all_participants_allowed: bool,
}

impl Default for RoomOptions {
    fn default() -> Self {
        Self {
            attach_retry: RetryConfig::default(),
            slow_event_warning_ms: 10_000,
            all_participants_allowed: true,
        }
    }
}

impl RoomOptions {
    /// Parse options from a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        let options: RoomOptions = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    /// Set the attach retry policy
    pub fn with_attach_retry(mut self, retry: RetryConfig) -> Self {
        self.attach_retry = retry;
        self
    }

    pub fn slow_event_warning(&self) -> Duration {
        Duration::from_millis(self.slow_event_warning_ms)
    }

    /// Reject values that would make the event loop misbehave
    pub fn validate(&self) -> Result<()> {
        if self.slow_event_warning_ms == 0 {
            return Err(RoomError::Config(
                "slowEventWarningMs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_options_default() {
        let options = RoomOptions::default();
        assert_eq!(options.attach_retry, RetryConfig::default());
        assert_eq!(options.slow_event_warning(), Duration::from_secs(10));
        assert!(options.all_participants_allowed);
    }

    #[test]
    fn test_room_options_from_json_partial() {
        let options =
            RoomOptions::from_json(r#"{"attachRetry":{"maxRetries":2,"delayMs":50}}"#).unwrap();
        assert_eq!(options.attach_retry.max_retries, 2);
        assert_eq!(options.attach_retry.delay_ms, 50);
        assert_eq!(options.slow_event_warning_ms, 10_000);
    }

    #[test]
    fn test_room_options_from_json_empty() {
        let options = RoomOptions::from_json("{}").unwrap();
        assert_eq!(options, RoomOptions::default());
    }

    #[test]
    fn test_room_options_from_json_invalid() {
        assert!(matches!(
            RoomOptions::from_json("not json"),
            Err(RoomError::Serialization(_))
        ));
        assert!(matches!(
            RoomOptions::from_json(r#"{"slowEventWarningMs":0}"#),
            Err(RoomError::Config(_))
        ));
    }

    #[test]
    fn test_with_attach_retry() {
        let options = RoomOptions::default().with_attach_retry(RetryConfig::disabled());
        assert_eq!(options.attach_retry.max_retries, 0);
    }
}
