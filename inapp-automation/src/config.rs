//! Runtime configuration.

use std::time::Duration;

/// Remote payload type carrying in-app messages.
pub const DEFAULT_PAYLOAD_TYPE: &str = "in_app_messages";

/// Configuration for the automation runtime.
#[derive(Debug, Clone)]
pub struct AutomationConfig {
    /// Cooldown after a message finishes before the next may display.
    /// Overridden by a persisted value when one exists.
    pub display_interval: Duration,
    /// First backoff for retried pipeline stages.
    pub initial_backoff: Duration,
    /// Backoff ceiling for retried pipeline stages.
    pub max_backoff: Duration,
    /// Remote-data payload type to subscribe to.
    pub payload_type: String,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            display_interval: Duration::from_secs(30),
            initial_backoff: Duration::from_secs(30),
            max_backoff: Duration::from_secs(120),
            payload_type: DEFAULT_PAYLOAD_TYPE.to_string(),
        }
    }
}
