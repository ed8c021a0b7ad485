//! In-app messages.
//!
//! A message is immutable once built. Renderer-specific content is carried
//! as opaque JSON tagged with its display type; the core never looks inside.

use crate::audience::Audience;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Maximum length of a message identifier.
pub const MAX_MESSAGE_ID_LENGTH: usize = 100;

/// Renderer family for a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayType {
    Banner,
    Custom,
    Fullscreen,
    Modal,
    Html,
    Layout,
}

impl DisplayType {
    /// Wire name of the display type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Banner => "banner",
            Self::Custom => "custom",
            Self::Fullscreen => "fullscreen",
            Self::Modal => "modal",
            Self::Html => "html",
            Self::Layout => "layout",
        }
    }
}

impl fmt::Display for DisplayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Renderer-specific display content.
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayContent {
    Banner(Value),
    Custom(Value),
    Fullscreen(Value),
    Modal(Value),
    Html(Value),
    Layout(Value),
}

impl DisplayContent {
    /// Wraps raw content for the given display type.
    #[must_use]
    pub fn new(display_type: DisplayType, content: Value) -> Self {
        match display_type {
            DisplayType::Banner => Self::Banner(content),
            DisplayType::Custom => Self::Custom(content),
            DisplayType::Fullscreen => Self::Fullscreen(content),
            DisplayType::Modal => Self::Modal(content),
            DisplayType::Html => Self::Html(content),
            DisplayType::Layout => Self::Layout(content),
        }
    }

    pub fn display_type(&self) -> DisplayType {
        match self {
            Self::Banner(_) => DisplayType::Banner,
            Self::Custom(_) => DisplayType::Custom,
            Self::Fullscreen(_) => DisplayType::Fullscreen,
            Self::Modal(_) => DisplayType::Modal,
            Self::Html(_) => DisplayType::Html,
            Self::Layout(_) => DisplayType::Layout,
        }
    }

    pub fn content(&self) -> &Value {
        match self {
            Self::Banner(v)
            | Self::Custom(v)
            | Self::Fullscreen(v)
            | Self::Modal(v)
            | Self::Html(v)
            | Self::Layout(v) => v,
        }
    }
}

/// Where a message came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageSource {
    LegacyPush,
    RemoteData,
    #[default]
    AppDefined,
}

/// How the message interacts with display coordination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayBehavior {
    /// One message at a time with a cooldown between displays.
    #[default]
    Default,
    /// Display as soon as the renderer is ready.
    Immediate,
}

/// An in-app message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MessageJson", into = "MessageJson")]
pub struct Message {
    id: String,
    display_content: DisplayContent,
    audience: Option<Audience>,
    actions: BTreeMap<String, Value>,
    source: MessageSource,
    campaigns: Option<Value>,
    reporting_enabled: bool,
    display_behavior: DisplayBehavior,
    extras: Map<String, Value>,
    rendered_locale: Option<Value>,
}

impl Message {
    /// Creates a message with default settings.
    ///
    /// Fails if the identifier is empty or longer than
    /// [`MAX_MESSAGE_ID_LENGTH`] characters.
    pub fn new(id: impl Into<String>, display_content: DisplayContent) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(Error::InvalidMessage("missing message id".into()));
        }
        if id.chars().count() > MAX_MESSAGE_ID_LENGTH {
            return Err(Error::InvalidMessage(format!(
                "message id exceeds {MAX_MESSAGE_ID_LENGTH} characters"
            )));
        }

        Ok(Self {
            id,
            display_content,
            audience: None,
            actions: BTreeMap::new(),
            source: MessageSource::default(),
            campaigns: None,
            reporting_enabled: true,
            display_behavior: DisplayBehavior::default(),
            extras: Map::new(),
            rendered_locale: None,
        })
    }

    /// Parses a message from its JSON representation.
    pub fn from_json(value: &Value) -> Result<Self> {
        Ok(serde_json::from_value(value.clone())?)
    }

    /// Serializes the message to JSON.
    pub fn to_json(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    #[must_use]
    pub fn with_audience(mut self, audience: Audience) -> Self {
        self.audience = Some(audience);
        self
    }

    #[must_use]
    pub fn with_actions(mut self, actions: BTreeMap<String, Value>) -> Self {
        self.actions = actions;
        self
    }

    #[must_use]
    pub fn with_source(mut self, source: MessageSource) -> Self {
        self.source = source;
        self
    }

    #[must_use]
    pub fn with_campaigns(mut self, campaigns: Value) -> Self {
        self.campaigns = Some(campaigns);
        self
    }

    #[must_use]
    pub fn with_reporting_enabled(mut self, enabled: bool) -> Self {
        self.reporting_enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_display_behavior(mut self, behavior: DisplayBehavior) -> Self {
        self.display_behavior = behavior;
        self
    }

    #[must_use]
    pub fn with_extras(mut self, extras: Map<String, Value>) -> Self {
        self.extras = extras;
        self
    }

    #[must_use]
    pub fn with_rendered_locale(mut self, locale: Value) -> Self {
        self.rendered_locale = Some(locale);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn display_content(&self) -> &DisplayContent {
        &self.display_content
    }

    pub fn display_type(&self) -> DisplayType {
        self.display_content.display_type()
    }

    pub fn audience(&self) -> Option<&Audience> {
        self.audience.as_ref()
    }

    pub fn actions(&self) -> &BTreeMap<String, Value> {
        &self.actions
    }

    pub fn source(&self) -> MessageSource {
        self.source
    }

    /// Campaign info. Only remote-data messages carry campaigns.
    pub fn campaigns(&self) -> Option<&Value> {
        self.campaigns
            .as_ref()
            .filter(|_| self.source == MessageSource::RemoteData)
    }

    pub fn is_reporting_enabled(&self) -> bool {
        self.reporting_enabled
    }

    pub fn display_behavior(&self) -> DisplayBehavior {
        self.display_behavior
    }

    pub fn extras(&self) -> &Map<String, Value> {
        &self.extras
    }

    pub fn rendered_locale(&self) -> Option<&Value> {
        self.rendered_locale.as_ref()
    }
}

// ── JSON shape ───────────────────────────────────────────────────

fn default_true() -> bool {
    true
}

fn is_true(value: &bool) -> bool {
    *value
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MessageJson {
    message_id: String,
    display_type: DisplayType,
    display: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    audience: Option<Audience>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    actions: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    extra: Map<String, Value>,
    #[serde(default)]
    source: MessageSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    campaigns: Option<Value>,
    #[serde(default)]
    display_behavior: DisplayBehavior,
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    reporting_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rendered_locale: Option<Value>,
}

impl TryFrom<MessageJson> for Message {
    type Error = Error;

    fn try_from(json: MessageJson) -> Result<Self> {
        let mut message = Message::new(
            json.message_id,
            DisplayContent::new(json.display_type, json.display),
        )?
        .with_actions(json.actions)
        .with_extras(json.extra)
        .with_source(json.source)
        .with_display_behavior(json.display_behavior)
        .with_reporting_enabled(json.reporting_enabled);

        message.audience = json.audience;
        message.rendered_locale = json.rendered_locale;
        if json.source == MessageSource::RemoteData {
            message.campaigns = json.campaigns;
        }
        Ok(message)
    }
}

impl From<Message> for MessageJson {
    fn from(message: Message) -> Self {
        let campaigns = message.campaigns().cloned();
        let display_type = message.display_type();
        let display = match message.display_content {
            DisplayContent::Banner(v)
            | DisplayContent::Custom(v)
            | DisplayContent::Fullscreen(v)
            | DisplayContent::Modal(v)
            | DisplayContent::Html(v)
            | DisplayContent::Layout(v) => v,
        };

        Self {
            message_id: message.id,
            display_type,
            display,
            audience: message.audience,
            actions: message.actions,
            extra: message.extras,
            source: message.source,
            campaigns,
            display_behavior: message.display_behavior,
            reporting_enabled: message.reporting_enabled,
            rendered_locale: message.rendered_locale,
        }
    }
}
