//! Audience targeting conditions.

use crate::selector::TagSelector;
use serde::{Deserialize, Serialize};

/// What happens to a schedule whose audience does not match at display time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissBehavior {
    /// Cancel the schedule.
    Cancel,
    /// Skip this execution without counting it against the limit.
    Skip,
    /// Skip this execution and count it against the limit.
    #[default]
    Penalize,
}

/// Condition on the application version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionPredicate {
    /// Inclusive bounds on the numeric version code. Either side may be open.
    VersionCode {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        at_least: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        at_most: Option<i64>,
    },
    /// Constraint on the version name: `1.2`, `1.2.+`, `[1.0,2.0)`, `[3.1,)`.
    VersionMatches(String),
}

/// Targeting conditions for a message. Unset fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Audience {
    /// Only applied when a schedule is created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_user: Option<bool>,

    #[serde(
        rename = "notification_opt_in",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub notifications_opt_in: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_opt_in: Option<bool>,

    /// Language tags such as `en`, `en-US` or `pt_BR`.
    #[serde(rename = "locale", default, skip_serializing_if = "Vec::is_empty")]
    pub language_tags: Vec<String>,

    /// Base64 encoded, truncated SHA-256 digests of channel identifiers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub test_devices: Vec<String>,

    #[serde(rename = "app_version", default, skip_serializing_if = "Option::is_none")]
    pub version: Option<VersionPredicate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<TagSelector>,

    #[serde(default)]
    pub miss_behavior: MissBehavior,
}

impl Audience {
    /// Returns true if evaluating this audience requires remote tag groups.
    pub fn requires_tag_groups(&self) -> bool {
        self.tags
            .as_ref()
            .is_some_and(TagSelector::contains_tag_groups)
    }
}
