//! Core type definitions for in-app message automation.
//!
//! This crate defines the immutable data model shared by the evaluator and
//! the automation runtime:
//! - In-app messages and their renderer-specific display content
//! - Audience targeting conditions and tag selectors
//! - Schedules, schedule creation requests and partial edits
//! - Display resolutions reported by renderers
//!
//! Everything here is plain data with JSON (de)serialization. Behavior that
//! needs device state or collaborators lives in `inapp-audience` and
//! `inapp-automation`.

mod audience;
mod message;
mod resolution;
mod schedule;
mod selector;
pub mod time;

pub use audience::{Audience, MissBehavior, VersionPredicate};
pub use message::{
    DisplayBehavior, DisplayContent, DisplayType, Message, MessageSource, MAX_MESSAGE_ID_LENGTH,
};
pub use resolution::{ButtonBehavior, Resolution};
pub use schedule::{
    AppState, Metadata, Schedule, ScheduleDelay, ScheduleEdits, ScheduleInfo, Trigger,
    MAX_TRIGGERS,
};
pub use selector::{TagGroups, TagSelector};
pub use time::UNSET_TIME;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or parsing automation types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("invalid tag selector: {0}")]
    InvalidSelector(String),

    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("invalid version constraint: {0}")]
    InvalidVersion(String),
}
