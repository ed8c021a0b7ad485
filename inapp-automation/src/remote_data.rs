//! Remote catalog reconciliation.
//!
//! The remote-data feed delivers versioned listings of in-app messages:
//!
//! ```json
//! { "in_app_messages": [
//!     { "created": "2024-01-01T00:00:00", "last_updated": "2024-01-02T00:00:00",
//!       "message": { "message_id": "promo", ... }, "triggers": [ ... ] } ] }
//! ```
//!
//! Each payload is diffed against the schedules it produced earlier using a
//! persisted `(timestamp, metadata)` watermark:
//! - items created after the watermark become new schedules, subject to the
//!   scheduling-time audience check and the new-user cutoff
//! - older items that changed become edits of their existing schedule
//! - known messages missing from the listing are soft cancelled by closing
//!   their window at the payload timestamp
//!
//! The watermark only moves once a payload has been fully applied.

use crate::engine::AutomationEngine;
use crate::error::AutomationResult;
use crate::listeners::ListenerRegistry;
use crate::store::{keys, DataStore};
use futures::stream::BoxStream;
use inapp_audience::{matches_for_scheduling, DeviceState};
use inapp_types::time::{now_millis, parse_iso8601};
use inapp_types::{Metadata, ScheduleEdits, ScheduleInfo, UNSET_TIME};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

const MESSAGES_KEY: &str = "in_app_messages";
const CREATED_KEY: &str = "created";
const UPDATED_KEY: &str = "last_updated";

/// A versioned listing delivered by the remote-data feed.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteDataPayload {
    pub payload_type: String,
    /// Epoch millis of the listing's last modification.
    pub timestamp: i64,
    pub metadata: Metadata,
    pub data: Value,
}

/// The remote-data feed.
pub trait RemoteDataAccess: Send + Sync {
    /// Payloads of one type, in delivery order. Upstream drops payloads
    /// whose `(timestamp, metadata)` did not change.
    fn payloads(&self, payload_type: &str) -> BoxStream<'static, RemoteDataPayload>;

    /// Returns true if `metadata` describes the current remote-data state.
    fn is_metadata_current(&self, metadata: &Metadata) -> bool;
}

/// Notified after every fully processed payload.
pub trait SchedulesUpdatedListener: Send + Sync {
    fn on_schedules_updated(&self);
}

/// Reconciles remote payloads into schedule changes.
pub struct RemoteDataObserver {
    store: Arc<dyn DataStore>,
    updates: watch::Sender<u64>,
    listeners: ListenerRegistry<dyn SchedulesUpdatedListener>,
}

impl RemoteDataObserver {
    #[must_use]
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        let (updates, _) = watch::channel(0);
        Self {
            store,
            updates,
            listeners: ListenerRegistry::new(),
        }
    }

    // ── Persisted state ──────────────────────────────────────────

    /// Timestamp of the last processed payload, or [`UNSET_TIME`].
    pub fn last_payload_timestamp(&self) -> i64 {
        self.store.get_i64(keys::LAST_PAYLOAD_TIMESTAMP, UNSET_TIME)
    }

    /// Metadata of the last processed payload. Empty before the first one.
    pub fn last_payload_metadata(&self) -> Metadata {
        self.store
            .get(keys::LAST_PAYLOAD_METADATA)
            .map(Metadata::new)
            .unwrap_or_default()
    }

    /// Schedules created before this time (epoch millis) count as new users.
    pub fn new_user_cutoff_time(&self) -> i64 {
        self.store.get_i64(keys::NEW_USER_CUTOFF_TIME, UNSET_TIME)
    }

    pub fn set_new_user_cutoff_time(&self, time: i64) -> AutomationResult<()> {
        self.store.put(keys::NEW_USER_CUTOFF_TIME, time.into())
    }

    /// Initializes the new-user cutoff once.
    ///
    /// A device without a channel has never registered, so messages created
    /// up to now may target it as a new user. A registered device gets a
    /// cutoff of zero.
    pub fn init_new_user_cutoff(&self, has_channel: bool) -> AutomationResult<()> {
        if self.new_user_cutoff_time() != UNSET_TIME {
            return Ok(());
        }
        let cutoff = if has_channel { 0 } else { now_millis() };
        debug!("Initializing new user cutoff to {}", cutoff);
        self.set_new_user_cutoff_time(cutoff)
    }

    /// Message id to schedule id for every schedule this observer created.
    pub fn scheduled_messages(&self) -> BTreeMap<String, String> {
        self.store
            .get(keys::SCHEDULED_MESSAGES)
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_default()
    }

    // ── Notifications ────────────────────────────────────────────

    /// Receiver whose value changes after every delivered payload,
    /// including one that repeats the last processed payload.
    pub fn subscribe_updates(&self) -> watch::Receiver<u64> {
        self.updates.subscribe()
    }

    pub fn add_listener(&self, listener: Arc<dyn SchedulesUpdatedListener>) {
        self.listeners.add(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn SchedulesUpdatedListener>) -> bool {
        self.listeners.remove(listener)
    }

    fn notify_schedules_updated(&self) {
        self.updates.send_modify(|generation| *generation += 1);
        for listener in self.listeners.snapshot() {
            listener.on_schedules_updated();
        }
    }

    // ── Reconciliation ───────────────────────────────────────────

    /// Applies one payload.
    ///
    /// Item-level problems are logged and skip the item. Engine failures
    /// abort the payload without moving the watermark, so the next payload
    /// is diffed against the same baseline.
    pub async fn process_payload(
        &self,
        payload: &RemoteDataPayload,
        engine: &dyn AutomationEngine,
        device: &DeviceState,
    ) -> AutomationResult<()> {
        let last_update = self.last_payload_timestamp();
        let metadata_current = payload.metadata == self.last_payload_metadata();

        if metadata_current && payload.timestamp == last_update {
            debug!("Payload {} already processed", payload.timestamp);
            self.updates.send_modify(|generation| *generation += 1);
            return Ok(());
        }

        let cutoff = self.new_user_cutoff_time();
        let mut scheduled = self.scheduled_messages();
        let mut incoming = HashSet::new();
        let mut new_infos = Vec::new();
        let mut edits = Vec::new();

        let items = payload
            .data
            .get(MESSAGES_KEY)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        for item in items {
            let (created, updated) = match (item_time(item, CREATED_KEY), item_time(item, UPDATED_KEY)) {
                (Ok(created), Ok(updated)) => (created, updated),
                (Err(e), _) | (_, Err(e)) => {
                    error!("Failed to parse in-app message timestamps: {}", e);
                    continue;
                }
            };

            let Some(message_id) = item
                .pointer("/message/message_id")
                .and_then(Value::as_str)
                .filter(|id| !id.is_empty())
            else {
                error!("Missing in-app message id: {}", item);
                continue;
            };
            incoming.insert(message_id.to_string());

            if metadata_current && updated <= last_update {
                continue;
            }

            let item = &with_remote_source(item);
            if created > last_update {
                match ScheduleInfo::from_json(item) {
                    Ok(info) => {
                        let allow_new_user = created <= cutoff;
                        if matches_for_scheduling(info.message.audience(), device, allow_new_user) {
                            debug!("New in-app message {}", message_id);
                            new_infos.push(info);
                        } else {
                            debug!("In-app message {} not eligible for this device", message_id);
                        }
                    }
                    Err(e) => error!("Failed to parse in-app message {}: {}", message_id, e),
                }
            } else if let Some(schedule_id) =
                resolve_schedule_id(engine, &mut scheduled, message_id).await?
            {
                match ScheduleEdits::from_json(item) {
                    Ok(mut item_edits) => {
                        item_edits.metadata = Some(payload.metadata.clone());
                        // A soft cancel closed the window; reopen it unless the item sets one.
                        item_edits.end.get_or_insert(UNSET_TIME);
                        edits.push((schedule_id, item_edits));
                    }
                    Err(e) => error!("Failed to parse in-app message edits {}: {}", message_id, e),
                }
            }
        }

        if !new_infos.is_empty() {
            let created = engine
                .schedule(new_infos, payload.metadata.clone())
                .await?;
            for schedule in created {
                info!("Scheduled in-app message {} as {}", schedule.message.id(), schedule.id);
                scheduled.insert(schedule.message.id().to_string(), schedule.id);
            }
        }

        for (schedule_id, item_edits) in edits {
            self.apply_edits(engine, &mut scheduled, &schedule_id, item_edits)
                .await;
        }

        let removed: Vec<(String, String)> = scheduled
            .iter()
            .filter(|(message_id, _)| !incoming.contains(message_id.as_str()))
            .map(|(message_id, schedule_id)| (message_id.clone(), schedule_id.clone()))
            .collect();
        for (message_id, schedule_id) in removed {
            info!("Ending in-app message {} no longer in the listing", message_id);
            let cancel = ScheduleEdits {
                start: Some(payload.timestamp),
                end: Some(payload.timestamp),
                metadata: Some(payload.metadata.clone()),
                ..Default::default()
            };
            self.apply_edits(engine, &mut scheduled, &schedule_id, cancel)
                .await;
        }

        self.store
            .put(keys::SCHEDULED_MESSAGES, serde_json::to_value(&scheduled)?)?;
        self.store
            .put(keys::LAST_PAYLOAD_TIMESTAMP, payload.timestamp.into())?;
        self.store.put(
            keys::LAST_PAYLOAD_METADATA,
            payload.metadata.as_value().clone(),
        )?;

        self.notify_schedules_updated();
        Ok(())
    }

    /// Edits a schedule, forgetting it if the engine no longer has it.
    async fn apply_edits(
        &self,
        engine: &dyn AutomationEngine,
        scheduled: &mut BTreeMap<String, String>,
        schedule_id: &str,
        edits: ScheduleEdits,
    ) {
        match engine.edit_schedule(schedule_id, edits).await {
            Ok(Some(_)) => debug!("Updated in-app schedule {}", schedule_id),
            Ok(None) => {
                debug!("Schedule {} no longer exists", schedule_id);
                scheduled.retain(|_, id| id != schedule_id);
            }
            Err(e) => warn!("Failed to edit schedule {}: {}", schedule_id, e),
        }
    }
}

/// Catalog messages omit their source; stamp it before parsing.
fn with_remote_source(item: &Value) -> Value {
    let mut item = item.clone();
    if let Some(message) = item.get_mut("message").and_then(Value::as_object_mut) {
        message.insert("source".to_string(), Value::from("remote-data"));
    }
    item
}

fn item_time(item: &Value, key: &str) -> inapp_types::Result<i64> {
    let value = item
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| inapp_types::Error::InvalidTimestamp(format!("missing {key}")))?;
    parse_iso8601(value)
}

/// Finds the schedule for a message, consulting the engine when the
/// persisted map has no entry.
async fn resolve_schedule_id(
    engine: &dyn AutomationEngine,
    scheduled: &mut BTreeMap<String, String>,
    message_id: &str,
) -> AutomationResult<Option<String>> {
    if let Some(schedule_id) = scheduled.get(message_id) {
        return Ok(Some(schedule_id.clone()));
    }

    let schedules = engine.get_schedules(Some(message_id)).await?;
    match schedules.as_slice() {
        [] => Ok(None),
        [schedule] => {
            scheduled.insert(message_id.to_string(), schedule.id.clone());
            Ok(Some(schedule.id.clone()))
        }
        _ => {
            error!(
                "Found {} schedules for in-app message {}, skipping",
                schedules.len(),
                message_id
            );
            Ok(None)
        }
    }
}
