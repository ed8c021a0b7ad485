//! Analytics events produced around a display.

use inapp_types::time::now_millis;
use inapp_types::{Message, MessageSource, Resolution};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InAppEventKind {
    /// The message was put on screen.
    Display,
    /// The message left the screen.
    Resolution {
        resolution: Resolution,
        display_time_ms: u64,
    },
    /// A display was cut short before it could resolve, e.g. by a restart.
    Interrupted,
}

/// An analytics event for one schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InAppEvent {
    #[serde(flatten)]
    pub kind: InAppEventKind,
    pub schedule_id: String,
    pub source: MessageSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaigns: Option<Value>,
    /// Epoch millis.
    pub occurred_at: i64,
}

impl InAppEvent {
    fn new(kind: InAppEventKind, schedule_id: &str, source: MessageSource) -> Self {
        Self {
            kind,
            schedule_id: schedule_id.to_string(),
            source,
            campaigns: None,
            occurred_at: now_millis(),
        }
    }

    fn for_message(kind: InAppEventKind, schedule_id: &str, message: &Message) -> Self {
        Self {
            campaigns: message.campaigns().cloned(),
            ..Self::new(kind, schedule_id, message.source())
        }
    }

    #[must_use]
    pub fn display(schedule_id: &str, message: &Message) -> Self {
        Self::for_message(InAppEventKind::Display, schedule_id, message)
    }

    #[must_use]
    pub fn resolution(
        schedule_id: &str,
        message: &Message,
        resolution: Resolution,
        display_time_ms: u64,
    ) -> Self {
        Self::for_message(
            InAppEventKind::Resolution {
                resolution,
                display_time_ms,
            },
            schedule_id,
            message,
        )
    }

    #[must_use]
    pub fn interrupted(schedule_id: &str, source: MessageSource) -> Self {
        Self::new(InAppEventKind::Interrupted, schedule_id, source)
    }
}

/// Receives analytics events.
pub trait EventSink: Send + Sync {
    fn record(&self, event: InAppEvent);
}
