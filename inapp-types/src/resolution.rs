//! How a displayed message was dismissed.

use serde::{Deserialize, Serialize};

/// Behavior attached to a message button.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ButtonBehavior {
    #[default]
    Dismiss,
    /// Dismisses the message and cancels its schedule.
    Cancel,
}

/// Reported by the renderer when a message leaves the screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Resolution {
    ButtonClick {
        button_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        button_description: Option<String>,
        #[serde(default)]
        behavior: ButtonBehavior,
    },
    MessageClick,
    UserDismissed,
    TimedOut,
}

impl Resolution {
    /// Button click resolution with the default dismiss behavior.
    #[must_use]
    pub fn button_click(button_id: impl Into<String>) -> Self {
        Self::ButtonClick {
            button_id: button_id.into(),
            button_description: None,
            behavior: ButtonBehavior::Dismiss,
        }
    }

    /// Returns true if the resolution should cancel the schedule.
    pub fn cancels_schedule(&self) -> bool {
        matches!(
            self,
            Self::ButtonClick {
                behavior: ButtonBehavior::Cancel,
                ..
            }
        )
    }
}
