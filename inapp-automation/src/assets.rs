//! Asset caching collaborator.

use crate::adapter::PrepareStatus;
use async_trait::async_trait;
use inapp_types::Message;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Locally cached files for one schedule, keyed by remote URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assets {
    schedule_id: String,
    files: BTreeMap<String, PathBuf>,
}

impl Assets {
    #[must_use]
    pub fn new(schedule_id: impl Into<String>) -> Self {
        Self {
            schedule_id: schedule_id.into(),
            files: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_file(mut self, url: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.files.insert(url.into(), path.into());
        self
    }

    pub fn schedule_id(&self) -> &str {
        &self.schedule_id
    }

    /// Local path for a cached URL.
    pub fn file(&self, url: &str) -> Option<&Path> {
        self.files.get(url).map(PathBuf::as_path)
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Downloads and releases message assets.
#[async_trait]
pub trait AssetManager: Send + Sync {
    /// A schedule was created; assets may be prefetched.
    async fn on_schedule(&self, schedule_id: &str, message: &Message);

    /// Makes the message's assets available before display.
    async fn on_prepare(&self, schedule_id: &str, message: &Message) -> PrepareStatus;

    /// The display attempt ended; per-display assets may be released.
    async fn on_display_finished(&self, schedule_id: &str, message: &Message);

    /// The schedule will not run again; everything may be released.
    async fn on_schedule_finished(&self, schedule_id: &str);

    /// Assets prepared for the schedule.
    async fn assets(&self, schedule_id: &str) -> Option<Assets>;
}
