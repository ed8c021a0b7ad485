//! Device and platform collaborators.

use crate::assets::AssetManager;
use crate::engine::AutomationEngine;
use crate::error::AutomationResult;
use crate::events::EventSink;
use crate::store::DataStore;
use async_trait::async_trait;
use inapp_audience::DeviceState;
use inapp_types::TagGroups;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Fetches remote tag groups for audience checks.
#[async_trait]
pub trait TagGroupProvider: Send + Sync {
    /// Returns the device's tags for the requested groups. Groups missing
    /// from the result are treated as empty.
    async fn get_tags(&self, requested: &TagGroups) -> AutomationResult<TagGroups>;
}

/// Supplies the current device state.
pub trait DeviceStateProvider: Send + Sync {
    fn device_state(&self) -> DeviceState;
}

/// Runs message actions when a display finishes.
pub trait ActionRunner: Send + Sync {
    fn run_actions(&self, actions: &BTreeMap<String, Value>);
}

/// Everything the runtime talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub engine: Arc<dyn AutomationEngine>,
    pub store: Arc<dyn DataStore>,
    pub assets: Arc<dyn AssetManager>,
    pub tag_groups: Arc<dyn TagGroupProvider>,
    pub device: Arc<dyn DeviceStateProvider>,
    pub events: Arc<dyn EventSink>,
    pub actions: Arc<dyn ActionRunner>,
}
