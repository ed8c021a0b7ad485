//! In-app message manager.
//!
//! Prepares triggered schedules for display and drives them through
//! display and finish. Preparation runs as a chain of retryable stages on
//! the [`RetryingExecutor`]:
//!
//! 1. **Audience**: fetch tag groups if needed, evaluate the audience
//! 2. **Assets**: ask the asset manager to make assets available
//! 3. **Adapter**: let the renderer prepare, then store the wrapper
//!
//! A stored wrapper is what the readiness poll, execute and finish calls
//! operate on. The wrapper map lock is never held across an await.

use crate::adapter::{AdapterFactory, AdapterWrapper, PrepareStatus};
use crate::config::AutomationConfig;
use crate::display::{
    DefaultDisplayCoordinator, DisplayCoordinator, ImmediateDisplayCoordinator, ReadyCallback,
};
use crate::error::AutomationResult;
use crate::events::InAppEvent;
use crate::executor::{OperationResult, RetryingExecutor};
use crate::listeners::{InAppMessageListener, ListenerRegistry};
use crate::services::Collaborators;
use crate::store::keys;
use inapp_types::{
    DisplayBehavior, DisplayType, Message, MessageSource, MissBehavior, Resolution, Schedule,
    TagSelector,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, error, info, trace, warn};

/// Rewrites a message before assets are cached and before display.
pub type MessageExtender = Arc<dyn Fn(Message) -> Message + Send + Sync>;

/// Picks a coordinator for a message. `None` falls back to the one chosen
/// by the message's display behavior.
pub type CoordinatorSelector =
    Arc<dyn Fn(&Message) -> Option<Arc<dyn DisplayCoordinator>> + Send + Sync>;

/// Outcome of preparing a schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrepareResult {
    /// Prepared; the engine may poll readiness.
    Continue,
    /// Skip this execution without counting it.
    Skip,
    /// Skip this execution and count it against the limit.
    Penalize,
    /// Cancel the schedule.
    Cancel,
    /// The schedule is stale; reload it and try again.
    Invalidate,
}

/// Outcome of a readiness poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyResult {
    Continue,
    NotReady,
    /// Drop the prepared state and prepare again.
    Invalidate,
}

impl From<MissBehavior> for PrepareResult {
    fn from(behavior: MissBehavior) -> Self {
        match behavior {
            MissBehavior::Cancel => Self::Cancel,
            MissBehavior::Skip => Self::Skip,
            MissBehavior::Penalize => Self::Penalize,
        }
    }
}

pub(crate) struct ManagerInner {
    services: Collaborators,
    executor: RetryingExecutor,
    default_coordinator: Arc<DefaultDisplayCoordinator>,
    immediate_coordinator: Arc<ImmediateDisplayCoordinator>,
    factories: RwLock<HashMap<DisplayType, Arc<dyn AdapterFactory>>>,
    wrappers: RwLock<HashMap<String, Arc<AdapterWrapper>>>,
    execution_callbacks: Mutex<HashMap<String, oneshot::Sender<()>>>,
    extender: RwLock<Option<MessageExtender>>,
    coordinator_selector: RwLock<Option<CoordinatorSelector>>,
    listeners: ListenerRegistry<dyn InAppMessageListener>,
}

/// Prepares, displays and finishes in-app messages.
#[derive(Clone)]
pub struct InAppMessageManager {
    inner: Arc<ManagerInner>,
}

impl InAppMessageManager {
    /// Creates a manager. Preparation stays paused until [`on_ready`].
    ///
    /// [`on_ready`]: InAppMessageManager::on_ready
    #[must_use]
    pub fn new(config: &AutomationConfig, services: Collaborators) -> Self {
        let interval_ms = services.store.get_i64(
            keys::DISPLAY_INTERVAL_MS,
            i64::try_from(config.display_interval.as_millis()).unwrap_or(i64::MAX),
        );
        let interval = Duration::from_millis(u64::try_from(interval_ms).unwrap_or(0));

        let executor = RetryingExecutor::from_config(config);
        executor.set_paused(true);

        Self {
            inner: Arc::new(ManagerInner {
                services,
                executor,
                default_coordinator: Arc::new(DefaultDisplayCoordinator::new(interval)),
                immediate_coordinator: Arc::new(ImmediateDisplayCoordinator),
                factories: RwLock::new(HashMap::new()),
                wrappers: RwLock::new(HashMap::new()),
                execution_callbacks: Mutex::new(HashMap::new()),
                extender: RwLock::new(None),
                coordinator_selector: RwLock::new(None),
                listeners: ListenerRegistry::new(),
            }),
        }
    }

    /// Starts processing preparation stages.
    pub fn on_ready(&self) {
        self.inner.executor.set_paused(false);
    }

    // ── Configuration ────────────────────────────────────────────

    /// Registers the adapter factory for a display type.
    pub fn set_adapter_factory(&self, display_type: DisplayType, factory: Arc<dyn AdapterFactory>) {
        write(&self.inner.factories).insert(display_type, factory);
    }

    pub fn remove_adapter_factory(&self, display_type: DisplayType) {
        write(&self.inner.factories).remove(&display_type);
    }

    pub fn set_message_extender(&self, extender: Option<MessageExtender>) {
        *write(&self.inner.extender) = extender;
    }

    pub fn set_coordinator_selector(&self, selector: Option<CoordinatorSelector>) {
        *write(&self.inner.coordinator_selector) = selector;
    }

    /// Sets and persists the default coordinator's cooldown.
    pub fn set_display_interval(&self, interval: Duration) -> AutomationResult<()> {
        let millis = i64::try_from(interval.as_millis()).unwrap_or(i64::MAX);
        self.inner
            .services
            .store
            .put(keys::DISPLAY_INTERVAL_MS, millis.into())?;
        self.inner.default_coordinator.set_display_interval(interval);
        Ok(())
    }

    pub fn display_interval(&self) -> Duration {
        self.inner.default_coordinator.display_interval()
    }

    pub fn default_coordinator(&self) -> &Arc<DefaultDisplayCoordinator> {
        &self.inner.default_coordinator
    }

    pub fn add_listener(&self, listener: Arc<dyn InAppMessageListener>) {
        self.inner.listeners.add(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn InAppMessageListener>) -> bool {
        self.inner.listeners.remove(listener)
    }

    // ── Schedule lifecycle ───────────────────────────────────────

    /// A schedule was created; lets the asset manager prefetch.
    pub async fn on_new_schedule(&self, schedule_id: &str, message: &Message) {
        let message = self.inner.extend_message(message.clone());
        self.inner
            .services
            .assets
            .on_schedule(schedule_id, &message)
            .await;
    }

    /// A schedule finished for good; releases its assets.
    pub async fn on_schedule_finished(&self, schedule_id: &str) {
        self.inner
            .services
            .assets
            .on_schedule_finished(schedule_id)
            .await;
    }

    // ── Prepare ──────────────────────────────────────────────────

    /// Runs the preparation pipeline for a triggered schedule.
    pub async fn on_prepare(&self, schedule: &Schedule) -> PrepareResult {
        let inner = &*self.inner;
        let Some(wrapper) = inner.create_wrapper(&schedule.id, &schedule.message) else {
            return PrepareResult::Penalize;
        };
        let wrapper = &wrapper;

        if let Some(result) = inner
            .executor
            .execute(move || inner.check_audience(wrapper))
            .await
        {
            return result;
        }

        if let Some(result) = inner
            .executor
            .execute(move || inner.prepare_assets(wrapper))
            .await
        {
            return result;
        }

        if let Some(result) = inner
            .executor
            .execute(move || inner.prepare_adapter(wrapper))
            .await
        {
            return result;
        }

        PrepareResult::Continue
    }

    // ── Readiness ────────────────────────────────────────────────

    /// Polls whether a prepared schedule can display now.
    pub fn on_check_execution_readiness(&self, schedule_id: &str) -> ReadyResult {
        let Some(wrapper) = self.inner.wrapper(schedule_id) else {
            error!("Missing adapter for schedule {}", schedule_id);
            return ReadyResult::Invalidate;
        };

        if wrapper.is_ready() {
            ReadyResult::Continue
        } else {
            trace!("Schedule {} not ready", schedule_id);
            ReadyResult::NotReady
        }
    }

    /// Drops prepared state for a schedule that is no longer valid.
    pub async fn on_execution_invalidated(&self, schedule_id: &str) {
        let Some(wrapper) = self.inner.remove_wrapper(schedule_id) else {
            return;
        };
        debug!("Execution invalidated for schedule {}", schedule_id);
        wrapper.display_cancelled();
        self.inner
            .services
            .assets
            .on_display_finished(schedule_id, wrapper.message())
            .await;
    }

    /// Records that a display was cut short without a resolution.
    ///
    /// Without a message the schedule is assumed to come from remote data.
    pub fn on_execution_interrupted(&self, schedule_id: &str, message: Option<&Message>) {
        let source = match message {
            Some(message) if !message.is_reporting_enabled() => return,
            Some(message) => message.source(),
            None => MessageSource::RemoteData,
        };
        self.inner
            .services
            .events
            .record(InAppEvent::interrupted(schedule_id, source));
    }

    // ── Execute ──────────────────────────────────────────────────

    /// Displays a prepared schedule.
    ///
    /// The returned receiver resolves when the execution is over: after the
    /// message finishes, or right away if nothing could be displayed.
    pub async fn on_execute(&self, schedule_id: &str) -> oneshot::Receiver<()> {
        let (finished_tx, finished_rx) = oneshot::channel();

        let Some(wrapper) = self.inner.wrapper(schedule_id) else {
            error!("Missing adapter for schedule {}", schedule_id);
            let _ = finished_tx.send(());
            return finished_rx;
        };

        lock(&self.inner.execution_callbacks).insert(schedule_id.to_string(), finished_tx);

        let handler = DisplayHandler {
            schedule_id: schedule_id.to_string(),
            manager: Arc::downgrade(&self.inner),
        };

        if let Err(e) = wrapper.display(handler).await {
            error!("Failed to display in-app message for schedule {}: {}", schedule_id, e);
            self.inner.remove_wrapper(schedule_id);
            self.inner.call_execution_finished(schedule_id);
            wrapper.display_finished();
            wrapper.adapter_finished().await;
            return finished_rx;
        }

        if wrapper.message().is_reporting_enabled() {
            self.inner
                .services
                .events
                .record(InAppEvent::display(schedule_id, wrapper.message()));
        }

        for listener in self.inner.listeners.snapshot() {
            listener.on_message_displayed(schedule_id, wrapper.message());
        }

        debug!("Message displayed for schedule {}", schedule_id);
        finished_rx
    }

    /// Finishes a display. Usually reached through [`DisplayHandler::finished`].
    pub async fn finish(&self, schedule_id: &str, resolution: Resolution, display_time: Duration) {
        self.inner.finish(schedule_id, resolution, display_time).await;
    }

    /// Returns true if the schedule's message is currently displaying.
    pub fn is_display_allowed(&self, schedule_id: &str) -> bool {
        self.inner.is_display_allowed(schedule_id)
    }

    /// Returns true if a prepared wrapper is stored for the schedule.
    pub fn is_prepared(&self, schedule_id: &str) -> bool {
        self.inner.wrapper(schedule_id).is_some()
    }
}

impl ManagerInner {
    fn wrapper(&self, schedule_id: &str) -> Option<Arc<AdapterWrapper>> {
        read(&self.wrappers).get(schedule_id).cloned()
    }

    fn remove_wrapper(&self, schedule_id: &str) -> Option<Arc<AdapterWrapper>> {
        write(&self.wrappers).remove(schedule_id)
    }

    fn extend_message(&self, message: Message) -> Message {
        let extender = read(&self.extender).clone();
        match extender {
            Some(extender) => extender(message),
            None => message,
        }
    }

    fn ready_callback(&self) -> ReadyCallback {
        let engine = Arc::clone(&self.services.engine);
        Arc::new(move || engine.check_pending_schedules())
    }

    fn create_wrapper(&self, schedule_id: &str, message: &Message) -> Option<Arc<AdapterWrapper>> {
        let message = self.extend_message(message.clone());

        let factory = read(&self.factories).get(&message.display_type()).cloned();
        let Some(factory) = factory else {
            debug!(
                "No display adapter for message type {}, unable to process schedule {}",
                message.display_type(),
                schedule_id
            );
            return None;
        };

        let adapter = match factory.create_adapter(&message) {
            Ok(adapter) => adapter,
            Err(e) => {
                error!("Failed to create in-app message adapter for schedule {}: {}", schedule_id, e);
                return None;
            }
        };

        let selector = read(&self.coordinator_selector).clone();
        let coordinator = selector
            .and_then(|select| select(&message))
            .unwrap_or_else(|| match message.display_behavior() {
                DisplayBehavior::Immediate => {
                    Arc::clone(&self.immediate_coordinator) as Arc<dyn DisplayCoordinator>
                }
                DisplayBehavior::Default => {
                    Arc::clone(&self.default_coordinator) as Arc<dyn DisplayCoordinator>
                }
            });
        coordinator.set_ready_callback(Some(self.ready_callback()));

        Some(Arc::new(AdapterWrapper::new(
            schedule_id,
            message,
            adapter,
            coordinator,
        )))
    }

    async fn check_audience(&self, wrapper: &AdapterWrapper) -> OperationResult<PrepareResult> {
        let schedule_id = wrapper.schedule_id();
        let Some(audience) = wrapper.message().audience() else {
            return OperationResult::Finished;
        };

        let tag_groups = if audience.requires_tag_groups() {
            let requested = audience
                .tags
                .as_ref()
                .map(TagSelector::tag_groups)
                .unwrap_or_default();
            match self.services.tag_groups.get_tags(&requested).await {
                Ok(groups) => Some(groups),
                Err(e) => {
                    warn!("Failed to fetch tag groups for schedule {}: {}", schedule_id, e);
                    return OperationResult::Retry;
                }
            }
        } else {
            None
        };

        let device = self.services.device.device_state();
        if inapp_audience::matches(Some(audience), &device, tag_groups.as_ref()) {
            return OperationResult::Finished;
        }

        info!(
            "Audience conditions not met for schedule {}, miss behavior {:?}",
            schedule_id, audience.miss_behavior
        );
        OperationResult::Cancel(audience.miss_behavior.into())
    }

    async fn prepare_assets(&self, wrapper: &AdapterWrapper) -> OperationResult<PrepareResult> {
        let schedule_id = wrapper.schedule_id();
        match self
            .services
            .assets
            .on_prepare(schedule_id, wrapper.message())
            .await
        {
            PrepareStatus::Ok => {
                debug!("Assets prepared for schedule {}", schedule_id);
                OperationResult::Finished
            }
            PrepareStatus::Retry => {
                debug!("Assets failed to prepare for schedule {}, will retry", schedule_id);
                OperationResult::Retry
            }
            PrepareStatus::Cancel => {
                debug!("Assets failed to prepare, cancelling display for schedule {}", schedule_id);
                self.services
                    .assets
                    .on_display_finished(schedule_id, wrapper.message())
                    .await;
                OperationResult::Cancel(PrepareResult::Cancel)
            }
        }
    }

    async fn prepare_adapter(
        &self,
        wrapper: &Arc<AdapterWrapper>,
    ) -> OperationResult<PrepareResult> {
        let schedule_id = wrapper.schedule_id();
        let assets = self.services.assets.assets(schedule_id).await;
        match wrapper.prepare(assets).await {
            PrepareStatus::Ok => {
                debug!("Adapter prepared schedule {}", schedule_id);
                write(&self.wrappers).insert(schedule_id.to_string(), Arc::clone(wrapper));
                OperationResult::Finished
            }
            PrepareStatus::Retry => {
                debug!("Adapter failed to prepare schedule {}, will retry", schedule_id);
                OperationResult::Retry
            }
            PrepareStatus::Cancel => {
                debug!("Adapter failed to prepare, cancelling display for schedule {}", schedule_id);
                OperationResult::Cancel(PrepareResult::Cancel)
            }
        }
    }

    fn call_execution_finished(&self, schedule_id: &str) {
        if let Some(callback) = lock(&self.execution_callbacks).remove(schedule_id) {
            let _ = callback.send(());
        }
    }

    fn is_display_allowed(&self, schedule_id: &str) -> bool {
        self.wrapper(schedule_id)
            .is_some_and(|wrapper| wrapper.is_displayed())
    }

    async fn finish(&self, schedule_id: &str, resolution: Resolution, display_time: Duration) {
        let Some(wrapper) = self.remove_wrapper(schedule_id) else {
            debug!("Ignoring finish for schedule {} with no display", schedule_id);
            return;
        };
        let message = wrapper.message();
        debug!("Message finished for schedule {}", schedule_id);

        if message.is_reporting_enabled() {
            let display_ms = u64::try_from(display_time.as_millis()).unwrap_or(u64::MAX);
            self.services.events.record(InAppEvent::resolution(
                schedule_id,
                message,
                resolution.clone(),
                display_ms,
            ));
        }

        self.services.actions.run_actions(message.actions());

        for listener in self.listeners.snapshot() {
            listener.on_message_finished(schedule_id, message, &resolution);
        }

        self.call_execution_finished(schedule_id);
        wrapper.display_finished();
        wrapper.adapter_finished().await;
        self.services
            .assets
            .on_display_finished(schedule_id, message)
            .await;

        if resolution.cancels_schedule() {
            info!("Cancelling schedule {} from button behavior", schedule_id);
            if let Err(e) = self
                .services
                .engine
                .cancel_schedules(&[schedule_id.to_string()])
                .await
            {
                warn!("Failed to cancel schedule {}: {}", schedule_id, e);
            }
        }
    }
}

// ── Display handler ──────────────────────────────────────────────

/// Given to a renderer for the duration of one display.
#[derive(Debug, Clone)]
pub struct DisplayHandler {
    schedule_id: String,
    manager: Weak<ManagerInner>,
}

impl DisplayHandler {
    pub fn schedule_id(&self) -> &str {
        &self.schedule_id
    }

    /// Reports that the message left the screen.
    pub async fn finished(&self, resolution: Resolution, display_time: Duration) {
        if let Some(manager) = self.manager.upgrade() {
            manager
                .finish(&self.schedule_id, resolution, display_time)
                .await;
        }
    }

    /// Returns true while the message is the one being displayed.
    pub fn is_display_allowed(&self) -> bool {
        self.manager
            .upgrade()
            .is_some_and(|manager| manager.is_display_allowed(&self.schedule_id))
    }

    /// Asks the coordinator to let the message onto a display surface.
    pub fn request_display_lock(&self) -> bool {
        self.manager
            .upgrade()
            .and_then(|manager| manager.wrapper(&self.schedule_id))
            .is_some_and(|wrapper| wrapper.coordinator().on_allow_display(wrapper.message()))
    }

    /// Reports that the surface showing the message went away.
    pub fn surface_destroyed(&self, changing_configuration: bool) {
        if let Some(wrapper) = self
            .manager
            .upgrade()
            .and_then(|manager| manager.wrapper(&self.schedule_id))
        {
            wrapper
                .coordinator()
                .on_surface_destroyed(wrapper.message(), changing_configuration);
        }
    }
}

// ── Lock helpers ─────────────────────────────────────────────────

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
