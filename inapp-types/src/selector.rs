//! Tag selectors.
//!
//! A selector is a boolean expression over the device's local tags and
//! remotely fetched tag groups:
//!
//! ```json
//! { "and": [ { "tag": "vip" }, { "not": { "tag": "churned", "group": "crm" } } ] }
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Tags keyed by tag group name.
pub type TagGroups = BTreeMap<String, BTreeSet<String>>;

/// Recursive boolean expression over tags.
///
/// `And` and `Or` always hold at least one child; the constructors and the
/// JSON parser reject empty lists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "SelectorJson", into = "SelectorJson")]
pub enum TagSelector {
    /// Matches a single tag. Without a group the tag is looked up in the
    /// device's local tags, otherwise in the named tag group.
    Tag { tag: String, group: Option<String> },
    /// All children must match.
    And(Vec<TagSelector>),
    /// At least one child must match.
    Or(Vec<TagSelector>),
    /// Inverts the child.
    Not(Box<TagSelector>),
}

impl TagSelector {
    /// Selector matching a local device tag.
    #[must_use]
    pub fn tag(tag: impl Into<String>) -> Self {
        Self::Tag {
            tag: tag.into(),
            group: None,
        }
    }

    /// Selector matching a tag inside a remote tag group.
    #[must_use]
    pub fn group_tag(tag: impl Into<String>, group: impl Into<String>) -> Self {
        Self::Tag {
            tag: tag.into(),
            group: Some(group.into()),
        }
    }

    /// Conjunction of one or more selectors.
    pub fn and(selectors: Vec<TagSelector>) -> Result<Self> {
        if selectors.is_empty() {
            return Err(Error::InvalidSelector("expected 1 or more selectors".into()));
        }
        Ok(Self::And(selectors))
    }

    /// Disjunction of one or more selectors.
    pub fn or(selectors: Vec<TagSelector>) -> Result<Self> {
        if selectors.is_empty() {
            return Err(Error::InvalidSelector("expected 1 or more selectors".into()));
        }
        Ok(Self::Or(selectors))
    }

    /// Negation of a selector.
    #[allow(clippy::should_implement_trait)]
    #[must_use]
    pub fn not(selector: TagSelector) -> Self {
        Self::Not(Box::new(selector))
    }

    /// Evaluates the selector.
    ///
    /// Tag groups missing from `tag_groups` are treated as empty.
    pub fn apply(&self, tags: &BTreeSet<String>, tag_groups: &TagGroups) -> bool {
        match self {
            Self::Tag { tag, group: None } => tags.contains(tag),
            Self::Tag {
                tag,
                group: Some(group),
            } => tag_groups
                .get(group)
                .is_some_and(|group_tags| group_tags.contains(tag)),
            Self::And(children) => children.iter().all(|c| c.apply(tags, tag_groups)),
            Self::Or(children) => children.iter().any(|c| c.apply(tags, tag_groups)),
            Self::Not(child) => !child.apply(tags, tag_groups),
        }
    }

    /// Returns true if any leaf references a remote tag group.
    pub fn contains_tag_groups(&self) -> bool {
        match self {
            Self::Tag { group, .. } => group.is_some(),
            Self::And(children) | Self::Or(children) => {
                children.iter().any(TagSelector::contains_tag_groups)
            }
            Self::Not(child) => child.contains_tag_groups(),
        }
    }

    /// Collects every group tag referenced by the selector.
    pub fn tag_groups(&self) -> TagGroups {
        let mut groups = TagGroups::new();
        self.collect_tag_groups(&mut groups);
        groups
    }

    fn collect_tag_groups(&self, groups: &mut TagGroups) {
        match self {
            Self::Tag {
                tag,
                group: Some(group),
            } => {
                groups.entry(group.clone()).or_default().insert(tag.clone());
            }
            Self::Tag { group: None, .. } => {}
            Self::And(children) | Self::Or(children) => {
                for child in children {
                    child.collect_tag_groups(groups);
                }
            }
            Self::Not(child) => child.collect_tag_groups(groups),
        }
    }
}

// ── JSON shape ───────────────────────────────────────────────────

#[derive(Debug, Default, Serialize, Deserialize)]
struct SelectorJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    and: Option<Vec<TagSelector>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    or: Option<Vec<TagSelector>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    not: Option<Box<TagSelector>>,
}

impl TryFrom<SelectorJson> for TagSelector {
    type Error = Error;

    fn try_from(json: SelectorJson) -> Result<Self> {
        if let Some(tag) = json.tag {
            return Ok(Self::Tag {
                tag,
                group: json.group,
            });
        }
        if let Some(children) = json.and {
            return Self::and(children);
        }
        if let Some(children) = json.or {
            return Self::or(children);
        }
        if let Some(child) = json.not {
            return Ok(Self::Not(child));
        }
        Err(Error::InvalidSelector(
            "expected one of tag, and, or, not".into(),
        ))
    }
}

impl From<TagSelector> for SelectorJson {
    fn from(selector: TagSelector) -> Self {
        match selector {
            TagSelector::Tag { tag, group } => Self {
                tag: Some(tag),
                group,
                ..Default::default()
            },
            TagSelector::And(children) => Self {
                and: Some(children),
                ..Default::default()
            },
            TagSelector::Or(children) => Self {
                or: Some(children),
                ..Default::default()
            },
            TagSelector::Not(child) => Self {
                not: Some(child),
                ..Default::default()
            },
        }
    }
}
