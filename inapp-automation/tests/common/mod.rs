//! Shared mock collaborators for the automation tests.

#![allow(dead_code)]

use async_trait::async_trait;
use futures::channel::mpsc;
use futures::stream::{self, BoxStream, StreamExt};
use inapp_audience::DeviceState;
use inapp_automation::{
    ActionRunner, AdapterFactory, AssetManager, Assets, AutomationConfig, AutomationEngine,
    AutomationError, AutomationResult, Collaborators, DeviceStateProvider, DisplayAdapter,
    DisplayHandler, EventSink, InAppEvent, InAppMessageListener, InAppMessageManager,
    MemoryDataStore, PrepareStatus, RemoteDataAccess, RemoteDataPayload, TagGroupProvider,
};
use inapp_types::{
    DisplayContent, DisplayType, Message, Metadata, Resolution, Schedule, ScheduleEdits,
    ScheduleInfo, TagGroups, Trigger,
};
use serde_json::{json, Value};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn test_config() -> AutomationConfig {
    AutomationConfig {
        display_interval: Duration::from_secs(30),
        initial_backoff: Duration::from_secs(1),
        max_backoff: Duration::from_secs(4),
        ..Default::default()
    }
}

pub fn make_message(id: &str) -> Message {
    Message::new(id, DisplayContent::Custom(json!({ "key": id }))).unwrap()
}

pub fn make_info(message: Message) -> ScheduleInfo {
    ScheduleInfo::new(message, vec![Trigger::new("foreground", 1.0)])
}

pub fn make_schedule(id: &str, message: Message) -> Schedule {
    Schedule::from_info(id, make_info(message), Metadata::empty())
}

pub fn make_device() -> DeviceState {
    DeviceState {
        notifications_opted_in: true,
        location_opted_in: false,
        locales: vec!["en-US".into()],
        app_version_code: 10,
        app_version_name: Some("2.0.0".into()),
        tags: ["local".to_string()].into_iter().collect(),
        channel_id: Some("channel-id".into()),
    }
}

// ── Engine ───────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockEngine {
    schedules: Mutex<BTreeMap<String, Schedule>>,
    next_id: AtomicUsize,
    created: Mutex<Vec<Schedule>>,
    edits: Mutex<Vec<(String, ScheduleEdits)>>,
    cancelled: Mutex<Vec<String>>,
    paused: Mutex<Option<bool>>,
    pub check_pending_calls: AtomicUsize,
    pub fail_schedule: AtomicBool,
}

impl MockEngine {
    pub fn insert(&self, schedule: Schedule) {
        self.schedules
            .lock()
            .unwrap()
            .insert(schedule.id.clone(), schedule);
    }

    pub fn stored(&self, id: &str) -> Option<Schedule> {
        self.schedules.lock().unwrap().get(id).cloned()
    }

    pub fn created(&self) -> Vec<Schedule> {
        self.created.lock().unwrap().clone()
    }

    pub fn edits(&self) -> Vec<(String, ScheduleEdits)> {
        self.edits.lock().unwrap().clone()
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.cancelled.lock().unwrap().clone()
    }

    pub fn paused(&self) -> Option<bool> {
        *self.paused.lock().unwrap()
    }

    pub fn check_pending_calls(&self) -> usize {
        self.check_pending_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AutomationEngine for MockEngine {
    async fn schedule(
        &self,
        infos: Vec<ScheduleInfo>,
        metadata: Metadata,
    ) -> AutomationResult<Vec<Schedule>> {
        if self.fail_schedule.load(Ordering::SeqCst) {
            return Err(AutomationError::Engine("schedule rejected".into()));
        }
        let mut created = Vec::new();
        for info in infos {
            let id = format!("schedule-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
            let schedule = Schedule::from_info(id, info, metadata.clone());
            self.insert(schedule.clone());
            created.push(schedule);
        }
        self.created.lock().unwrap().extend(created.iter().cloned());
        Ok(created)
    }

    async fn edit_schedule(
        &self,
        schedule_id: &str,
        edits: ScheduleEdits,
    ) -> AutomationResult<Option<Schedule>> {
        self.edits
            .lock()
            .unwrap()
            .push((schedule_id.to_string(), edits.clone()));
        let mut schedules = self.schedules.lock().unwrap();
        Ok(schedules.get_mut(schedule_id).map(|schedule| {
            schedule.apply_edits(&edits);
            schedule.clone()
        }))
    }

    async fn cancel_schedules(&self, schedule_ids: &[String]) -> AutomationResult<()> {
        let mut schedules = self.schedules.lock().unwrap();
        for id in schedule_ids {
            schedules.remove(id);
            self.cancelled.lock().unwrap().push(id.clone());
        }
        Ok(())
    }

    async fn cancel_group(&self, group: &str) -> AutomationResult<()> {
        let mut schedules = self.schedules.lock().unwrap();
        let ids: Vec<String> = schedules
            .values()
            .filter(|s| s.group.as_deref() == Some(group))
            .map(|s| s.id.clone())
            .collect();
        for id in ids {
            schedules.remove(&id);
            self.cancelled.lock().unwrap().push(id);
        }
        Ok(())
    }

    async fn get_schedules(&self, group: Option<&str>) -> AutomationResult<Vec<Schedule>> {
        Ok(self
            .schedules
            .lock()
            .unwrap()
            .values()
            .filter(|s| group.is_none() || s.group.as_deref() == group)
            .cloned()
            .collect())
    }

    async fn get_schedule(&self, schedule_id: &str) -> AutomationResult<Option<Schedule>> {
        Ok(self.stored(schedule_id))
    }

    fn set_paused(&self, paused: bool) {
        *self.paused.lock().unwrap() = Some(paused);
    }

    fn check_pending_schedules(&self) {
        self.check_pending_calls.fetch_add(1, Ordering::SeqCst);
    }
}

// ── Renderer ─────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockAdapter {
    prepare_results: Mutex<VecDeque<PrepareStatus>>,
    pub prepare_calls: AtomicUsize,
    pub not_ready: AtomicBool,
    pub fail_display: AtomicBool,
    pub display_calls: AtomicUsize,
    pub finish_calls: AtomicUsize,
    handler: Mutex<Option<DisplayHandler>>,
    assets: Mutex<Vec<Option<Assets>>>,
}

impl MockAdapter {
    /// Results returned by the next prepare calls. `Ok` once exhausted.
    pub fn queue_prepare(&self, results: impl IntoIterator<Item = PrepareStatus>) {
        self.prepare_results.lock().unwrap().extend(results);
    }

    pub fn set_ready(&self, ready: bool) {
        self.not_ready.store(!ready, Ordering::SeqCst);
    }

    pub fn handler(&self) -> DisplayHandler {
        self.handler.lock().unwrap().clone().expect("message not displayed")
    }

    pub fn prepared_assets(&self) -> Vec<Option<Assets>> {
        self.assets.lock().unwrap().clone()
    }

    pub fn prepare_calls(&self) -> usize {
        self.prepare_calls.load(Ordering::SeqCst)
    }

    pub fn finish_calls(&self) -> usize {
        self.finish_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DisplayAdapter for MockAdapter {
    async fn prepare(&self, assets: Option<Assets>) -> PrepareStatus {
        self.prepare_calls.fetch_add(1, Ordering::SeqCst);
        self.assets.lock().unwrap().push(assets);
        self.prepare_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(PrepareStatus::Ok)
    }

    fn is_ready(&self) -> bool {
        !self.not_ready.load(Ordering::SeqCst)
    }

    async fn display(&self, handler: DisplayHandler) -> AutomationResult<()> {
        self.display_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_display.load(Ordering::SeqCst) {
            return Err(AutomationError::Display("surface unavailable".into()));
        }
        *self.handler.lock().unwrap() = Some(handler);
        Ok(())
    }

    async fn on_finish(&self) {
        self.finish_calls.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct MockAdapterFactory {
    pub adapter: Arc<MockAdapter>,
    pub fail: AtomicBool,
    messages: Mutex<Vec<Message>>,
}

impl MockAdapterFactory {
    pub fn new(adapter: Arc<MockAdapter>) -> Self {
        Self {
            adapter,
            fail: AtomicBool::new(false),
            messages: Mutex::new(Vec::new()),
        }
    }

    /// Messages adapters were created for.
    pub fn messages(&self) -> Vec<Message> {
        self.messages.lock().unwrap().clone()
    }
}

impl AdapterFactory for MockAdapterFactory {
    fn create_adapter(&self, message: &Message) -> AutomationResult<Arc<dyn DisplayAdapter>> {
        self.messages.lock().unwrap().push(message.clone());
        if self.fail.load(Ordering::SeqCst) {
            return Err(AutomationError::Adapter("unsupported content".into()));
        }
        Ok(Arc::clone(&self.adapter) as Arc<dyn DisplayAdapter>)
    }
}

// ── Assets ───────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockAssets {
    prepare_results: Mutex<VecDeque<PrepareStatus>>,
    calls: Mutex<Vec<String>>,
}

impl MockAssets {
    /// Results returned by the next prepare calls. `Ok` once exhausted.
    pub fn queue_prepare(&self, results: impl IntoIterator<Item = PrepareStatus>) {
        self.prepare_results.lock().unwrap().extend(results);
    }

    /// Calls as `name:schedule_id`, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.split(':').next() == Some(name))
            .count()
    }

    fn record(&self, name: &str, schedule_id: &str) {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{name}:{schedule_id}"));
    }
}

#[async_trait]
impl AssetManager for MockAssets {
    async fn on_schedule(&self, schedule_id: &str, _message: &Message) {
        self.record("schedule", schedule_id);
    }

    async fn on_prepare(&self, schedule_id: &str, _message: &Message) -> PrepareStatus {
        self.record("prepare", schedule_id);
        self.prepare_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(PrepareStatus::Ok)
    }

    async fn on_display_finished(&self, schedule_id: &str, _message: &Message) {
        self.record("display_finished", schedule_id);
    }

    async fn on_schedule_finished(&self, schedule_id: &str) {
        self.record("schedule_finished", schedule_id);
    }

    async fn assets(&self, schedule_id: &str) -> Option<Assets> {
        Some(Assets::new(schedule_id).with_file("https://cdn.example/image.png", "/cache/image.png"))
    }
}

// ── Device ───────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockTagGroups {
    groups: Mutex<TagGroups>,
    failures: AtomicUsize,
    pub calls: AtomicUsize,
    requested: Mutex<Vec<TagGroups>>,
}

impl MockTagGroups {
    pub fn set_groups(&self, groups: TagGroups) {
        *self.groups.lock().unwrap() = groups;
    }

    /// Fails the next `count` fetches.
    pub fn fail_next(&self, count: usize) {
        self.failures.store(count, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requested(&self) -> Vec<TagGroups> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl TagGroupProvider for MockTagGroups {
    async fn get_tags(&self, requested: &TagGroups) -> AutomationResult<TagGroups> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requested.lock().unwrap().push(requested.clone());
        let failures = self.failures.load(Ordering::SeqCst);
        if failures > 0 {
            self.failures.store(failures - 1, Ordering::SeqCst);
            return Err(AutomationError::TagGroups("offline".into()));
        }
        Ok(self.groups.lock().unwrap().clone())
    }
}

pub struct FixedDevice {
    state: Mutex<DeviceState>,
}

impl FixedDevice {
    pub fn new(state: DeviceState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn set(&self, state: DeviceState) {
        *self.state.lock().unwrap() = state;
    }
}

impl DeviceStateProvider for FixedDevice {
    fn device_state(&self) -> DeviceState {
        self.state.lock().unwrap().clone()
    }
}

// ── Recorders ────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingEvents {
    events: Mutex<Vec<InAppEvent>>,
}

impl RecordingEvents {
    pub fn events(&self) -> Vec<InAppEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventSink for RecordingEvents {
    fn record(&self, event: InAppEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[derive(Default)]
pub struct RecordingActions {
    runs: Mutex<Vec<BTreeMap<String, Value>>>,
}

impl RecordingActions {
    pub fn runs(&self) -> Vec<BTreeMap<String, Value>> {
        self.runs.lock().unwrap().clone()
    }
}

impl ActionRunner for RecordingActions {
    fn run_actions(&self, actions: &BTreeMap<String, Value>) {
        self.runs.lock().unwrap().push(actions.clone());
    }
}

#[derive(Default)]
pub struct RecordingListener {
    displayed: Mutex<Vec<String>>,
    finished: Mutex<Vec<(String, Resolution)>>,
}

impl RecordingListener {
    pub fn displayed(&self) -> Vec<String> {
        self.displayed.lock().unwrap().clone()
    }

    pub fn finished(&self) -> Vec<(String, Resolution)> {
        self.finished.lock().unwrap().clone()
    }
}

impl InAppMessageListener for RecordingListener {
    fn on_message_displayed(&self, schedule_id: &str, _message: &Message) {
        self.displayed.lock().unwrap().push(schedule_id.to_string());
    }

    fn on_message_finished(&self, schedule_id: &str, _message: &Message, resolution: &Resolution) {
        self.finished
            .lock()
            .unwrap()
            .push((schedule_id.to_string(), resolution.clone()));
    }
}

// ── Remote data ──────────────────────────────────────────────────

pub struct MockRemoteData {
    sender: mpsc::UnboundedSender<RemoteDataPayload>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<RemoteDataPayload>>>,
    current: Mutex<Metadata>,
    requested_types: Mutex<Vec<String>>,
}

impl MockRemoteData {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded();
        Self {
            sender,
            receiver: Mutex::new(Some(receiver)),
            current: Mutex::new(Metadata::empty()),
            requested_types: Mutex::new(Vec::new()),
        }
    }

    /// Metadata that `is_metadata_current` accepts.
    pub fn set_current(&self, metadata: Metadata) {
        *self.current.lock().unwrap() = metadata;
    }

    pub fn send(&self, payload: RemoteDataPayload) {
        self.sender.unbounded_send(payload).unwrap();
    }

    pub fn requested_types(&self) -> Vec<String> {
        self.requested_types.lock().unwrap().clone()
    }
}

impl RemoteDataAccess for MockRemoteData {
    fn payloads(&self, payload_type: &str) -> BoxStream<'static, RemoteDataPayload> {
        self.requested_types
            .lock()
            .unwrap()
            .push(payload_type.to_string());
        match self.receiver.lock().unwrap().take() {
            Some(receiver) => receiver.boxed(),
            None => stream::empty().boxed(),
        }
    }

    fn is_metadata_current(&self, metadata: &Metadata) -> bool {
        *self.current.lock().unwrap() == *metadata
    }
}

pub fn make_payload(timestamp: i64, metadata: Value, items: Vec<Value>) -> RemoteDataPayload {
    RemoteDataPayload {
        payload_type: "in_app_messages".into(),
        timestamp,
        metadata: Metadata::new(metadata),
        data: json!({ "in_app_messages": items }),
    }
}

/// Remote catalog item for a custom message.
pub fn make_item(message_id: &str, created: &str, updated: &str) -> Value {
    json!({
        "created": created,
        "last_updated": updated,
        "message": {
            "message_id": message_id,
            "display_type": "custom",
            "display": { "key": message_id }
        },
        "triggers": [ { "type": "app_init", "goal": 1.0 } ]
    })
}

// ── Harness ──────────────────────────────────────────────────────

pub struct Harness {
    pub engine: Arc<MockEngine>,
    pub store: Arc<MemoryDataStore>,
    pub assets: Arc<MockAssets>,
    pub tag_groups: Arc<MockTagGroups>,
    pub device: Arc<FixedDevice>,
    pub events: Arc<RecordingEvents>,
    pub actions: Arc<RecordingActions>,
    pub adapter: Arc<MockAdapter>,
    pub factory: Arc<MockAdapterFactory>,
}

impl Harness {
    pub fn new() -> Self {
        init_tracing();
        let adapter = Arc::new(MockAdapter::default());
        Self {
            engine: Arc::new(MockEngine::default()),
            store: Arc::new(MemoryDataStore::new()),
            assets: Arc::new(MockAssets::default()),
            tag_groups: Arc::new(MockTagGroups::default()),
            device: Arc::new(FixedDevice::new(make_device())),
            events: Arc::new(RecordingEvents::default()),
            actions: Arc::new(RecordingActions::default()),
            factory: Arc::new(MockAdapterFactory::new(Arc::clone(&adapter))),
            adapter,
        }
    }

    pub fn services(&self) -> Collaborators {
        Collaborators {
            engine: self.engine.clone(),
            store: self.store.clone(),
            assets: self.assets.clone(),
            tag_groups: self.tag_groups.clone(),
            device: self.device.clone(),
            events: self.events.clone(),
            actions: self.actions.clone(),
        }
    }

    /// A ready manager with the mock factory registered for custom messages.
    pub fn manager(&self) -> InAppMessageManager {
        let manager = InAppMessageManager::new(&test_config(), self.services());
        manager.set_adapter_factory(DisplayType::Custom, self.factory.clone());
        manager.on_ready();
        manager
    }
}
