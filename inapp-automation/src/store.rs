//! Key-value persistence.
//!
//! The runtime persists a handful of small values: the remote payload
//! watermark, the message-to-schedule map, the new-user cutoff and the
//! enabled, paused and display interval settings. Any store that can hold
//! JSON values under string keys will do.

use crate::error::AutomationResult;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Keys written by the runtime.
pub mod keys {
    pub const LAST_PAYLOAD_TIMESTAMP: &str = "inapp.remote_data.last_payload_timestamp";
    pub const LAST_PAYLOAD_METADATA: &str = "inapp.remote_data.last_payload_metadata";
    pub const SCHEDULED_MESSAGES: &str = "inapp.remote_data.scheduled_messages";
    pub const NEW_USER_CUTOFF_TIME: &str = "inapp.remote_data.new_user_cutoff_time";
    pub const ENABLED: &str = "inapp.automation.enabled";
    pub const PAUSED: &str = "inapp.automation.paused";
    pub const DISPLAY_INTERVAL_MS: &str = "inapp.manager.display_interval_ms";
}

/// A persistent JSON key-value store.
pub trait DataStore: Send + Sync {
    /// Reads a value.
    fn get(&self, key: &str) -> Option<Value>;

    /// Writes a value, replacing any previous one.
    fn put(&self, key: &str, value: Value) -> AutomationResult<()>;

    /// Removes a value.
    fn remove(&self, key: &str) -> AutomationResult<()>;

    /// Returns true if a value is stored under the key.
    fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Reads an integer, falling back to `default` when absent or mistyped.
    fn get_i64(&self, key: &str, default: i64) -> i64 {
        self.get(key).and_then(|v| v.as_i64()).unwrap_or(default)
    }

    /// Reads a boolean, falling back to `default` when absent or mistyped.
    fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get(key).and_then(|v| v.as_bool()).unwrap_or(default)
    }
}

/// In-memory store. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryDataStore {
    values: RwLock<HashMap<String, Value>>,
}

impl MemoryDataStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl DataStore for MemoryDataStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn put(&self, key: &str, value: Value) -> AutomationResult<()> {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> AutomationResult<()> {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}
