//! Error types for the automation runtime.

use thiserror::Error;

/// Result type for automation operations.
pub type AutomationResult<T> = Result<T, AutomationError>;

/// Errors that can occur in automation operations.
#[derive(Debug, Error)]
pub enum AutomationError {
    /// The trigger engine rejected or failed an operation.
    #[error("engine error: {0}")]
    Engine(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A message, schedule or selector failed validation.
    #[error("invalid data: {0}")]
    Invalid(#[from] inapp_types::Error),

    /// The renderer could not be created.
    #[error("adapter error: {0}")]
    Adapter(String),

    /// The renderer failed to display a prepared message.
    #[error("display error: {0}")]
    Display(String),

    /// Remote tag groups could not be fetched.
    #[error("tag group fetch failed: {0}")]
    TagGroups(String),

    /// Schedule not found.
    #[error("schedule not found: {0}")]
    ScheduleNotFound(String),
}
