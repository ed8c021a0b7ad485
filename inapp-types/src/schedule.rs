//! Schedules, creation requests and edits.
//!
//! Schedules are owned by the trigger engine. The automation core only reads
//! them, creates them from [`ScheduleInfo`] requests, and changes them through
//! [`ScheduleEdits`].

use crate::message::Message;
use crate::time::{UNSET_TIME, parse_iso8601};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Maximum number of triggers on a single schedule.
pub const MAX_TRIGGERS: usize = 10;

const MILLIS_PER_SECOND: u64 = 1_000;
const MILLIS_PER_DAY: u64 = 86_400_000;

/// Opaque schedule metadata.
///
/// Used to remember which remote payload produced a schedule. Compared only
/// by equality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(Value);

impl Metadata {
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Metadata holding an empty JSON object.
    #[must_use]
    pub fn empty() -> Self {
        Self(Value::Object(serde_json::Map::new()))
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

impl Default for Metadata {
    fn default() -> Self {
        Self::empty()
    }
}

/// An event condition that fires a schedule once its goal is reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    /// Trigger type, e.g. `app_init`, `foreground`, `custom_event_count`.
    #[serde(rename = "type")]
    pub trigger_type: String,
    pub goal: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicate: Option<Value>,
}

impl Trigger {
    #[must_use]
    pub fn new(trigger_type: impl Into<String>, goal: f64) -> Self {
        Self {
            trigger_type: trigger_type.into(),
            goal,
            predicate: None,
        }
    }
}

/// Application state a delayed schedule waits for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppState {
    #[default]
    Any,
    Foreground,
    Background,
}

/// Conditions checked between triggering and execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleDelay {
    #[serde(default)]
    pub seconds: u64,
    #[serde(default)]
    pub app_state: AppState,
    #[serde(rename = "screen", default, skip_serializing_if = "Vec::is_empty")]
    pub screens: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cancellation_triggers: Vec<Trigger>,
}

/// Request to create a schedule for a message.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleInfo {
    pub message: Message,
    pub triggers: Vec<Trigger>,
    pub delay: Option<ScheduleDelay>,
    /// Number of executions before the schedule finishes.
    pub limit: u32,
    pub priority: i32,
    /// Epoch millis, or [`UNSET_TIME`].
    pub start: i64,
    /// Epoch millis, or [`UNSET_TIME`].
    pub end: i64,
    pub edit_grace_period_ms: Option<u64>,
    pub interval_ms: Option<u64>,
}

impl ScheduleInfo {
    /// Creates a request with a single execution, no window and no delay.
    #[must_use]
    pub fn new(message: Message, triggers: Vec<Trigger>) -> Self {
        Self {
            message,
            triggers,
            delay: None,
            limit: 1,
            priority: 0,
            start: UNSET_TIME,
            end: UNSET_TIME,
            edit_grace_period_ms: None,
            interval_ms: None,
        }
    }

    /// Checks trigger count and window ordering.
    pub fn validate(&self) -> Result<()> {
        if self.triggers.is_empty() {
            return Err(Error::InvalidSchedule("must contain at least 1 trigger".into()));
        }
        if self.triggers.len() > MAX_TRIGGERS {
            return Err(Error::InvalidSchedule(format!(
                "no more than {MAX_TRIGGERS} triggers allowed"
            )));
        }
        if self.start != UNSET_TIME && self.end != UNSET_TIME && self.start > self.end {
            return Err(Error::InvalidSchedule("start must be on or before end".into()));
        }
        Ok(())
    }

    /// Parses a schedule request from a remote catalog item.
    ///
    /// `start` and `end` are ISO 8601 strings, `edit_grace_period` is in days
    /// and `interval` in seconds. Unknown keys are ignored.
    pub fn from_json(value: &Value) -> Result<Self> {
        let json: ScheduleJson = serde_json::from_value(value.clone())?;
        let message = json
            .message
            .ok_or_else(|| Error::InvalidSchedule("missing message".into()))?;

        let info = Self {
            message,
            triggers: json.triggers.unwrap_or_default(),
            delay: json.delay,
            limit: json.limit.unwrap_or(1),
            priority: json.priority.unwrap_or(0),
            start: parse_optional_time(json.start.as_deref())?.unwrap_or(UNSET_TIME),
            end: parse_optional_time(json.end.as_deref())?.unwrap_or(UNSET_TIME),
            edit_grace_period_ms: scale_millis(
                json.edit_grace_period,
                MILLIS_PER_DAY,
                "edit_grace_period",
            )?,
            interval_ms: scale_millis(json.interval, MILLIS_PER_SECOND, "interval")?,
        };
        info.validate()?;
        Ok(info)
    }
}

/// Partial update of a schedule. `None` leaves a field unchanged.
///
/// Setting `start` or `end` to [`UNSET_TIME`] clears the bound.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScheduleEdits {
    pub message: Option<Message>,
    pub limit: Option<u32>,
    pub priority: Option<i32>,
    pub start: Option<i64>,
    pub end: Option<i64>,
    pub edit_grace_period_ms: Option<u64>,
    pub interval_ms: Option<u64>,
    pub metadata: Option<Metadata>,
}

impl ScheduleEdits {
    /// Parses edits from a remote catalog item using the same keys as
    /// [`ScheduleInfo::from_json`]. Absent keys produce `None`.
    pub fn from_json(value: &Value) -> Result<Self> {
        let json: ScheduleJson = serde_json::from_value(value.clone())?;

        Ok(Self {
            message: json.message,
            limit: json.limit,
            priority: json.priority,
            start: parse_optional_time(json.start.as_deref())?,
            end: parse_optional_time(json.end.as_deref())?,
            edit_grace_period_ms: scale_millis(
                json.edit_grace_period,
                MILLIS_PER_DAY,
                "edit_grace_period",
            )?,
            interval_ms: scale_millis(json.interval, MILLIS_PER_SECOND, "interval")?,
            metadata: None,
        })
    }

    /// Returns true if the edits change nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A schedule as stored by the trigger engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    pub id: String,
    /// Schedules are grouped by message id.
    pub group: Option<String>,
    pub metadata: Metadata,
    pub message: Message,
    pub triggers: Vec<Trigger>,
    pub delay: Option<ScheduleDelay>,
    pub limit: u32,
    pub priority: i32,
    pub start: i64,
    pub end: i64,
    pub edit_grace_period_ms: Option<u64>,
    pub interval_ms: Option<u64>,
}

impl Schedule {
    /// Builds a stored schedule from a creation request.
    #[must_use]
    pub fn from_info(id: impl Into<String>, info: ScheduleInfo, metadata: Metadata) -> Self {
        Self {
            id: id.into(),
            group: Some(info.message.id().to_string()),
            metadata,
            message: info.message,
            triggers: info.triggers,
            delay: info.delay,
            limit: info.limit,
            priority: info.priority,
            start: info.start,
            end: info.end,
            edit_grace_period_ms: info.edit_grace_period_ms,
            interval_ms: info.interval_ms,
        }
    }

    /// Applies edits in place.
    pub fn apply_edits(&mut self, edits: &ScheduleEdits) {
        if let Some(message) = &edits.message {
            self.message = message.clone();
        }
        if let Some(limit) = edits.limit {
            self.limit = limit;
        }
        if let Some(priority) = edits.priority {
            self.priority = priority;
        }
        if let Some(start) = edits.start {
            self.start = start;
        }
        if let Some(end) = edits.end {
            self.end = end;
        }
        if let Some(grace) = edits.edit_grace_period_ms {
            self.edit_grace_period_ms = Some(grace);
        }
        if let Some(interval) = edits.interval_ms {
            self.interval_ms = Some(interval);
        }
        if let Some(metadata) = &edits.metadata {
            self.metadata = metadata.clone();
        }
    }
}

// ── JSON shape ───────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ScheduleJson {
    #[serde(default)]
    message: Option<Message>,
    #[serde(default)]
    triggers: Option<Vec<Trigger>>,
    #[serde(default)]
    delay: Option<ScheduleDelay>,
    #[serde(default)]
    limit: Option<u32>,
    #[serde(default)]
    priority: Option<i32>,
    #[serde(default)]
    start: Option<String>,
    #[serde(default)]
    end: Option<String>,
    #[serde(default)]
    edit_grace_period: Option<u64>,
    #[serde(default)]
    interval: Option<u64>,
}

fn parse_optional_time(value: Option<&str>) -> Result<Option<i64>> {
    value.map(parse_iso8601).transpose()
}

fn scale_millis(value: Option<u64>, factor: u64, field: &str) -> Result<Option<u64>> {
    value
        .map(|v| {
            v.checked_mul(factor)
                .ok_or_else(|| Error::InvalidSchedule(format!("{field} out of range")))
        })
        .transpose()
}
