//! Entry point wiring the manager, the remote data observer and the engine.

use crate::config::AutomationConfig;
use crate::error::{AutomationError, AutomationResult};
use crate::manager::{InAppMessageManager, PrepareResult, ReadyResult};
use crate::remote_data::{RemoteDataAccess, RemoteDataObserver, RemoteDataPayload};
use crate::services::Collaborators;
use crate::store::keys;
use futures::StreamExt;
use inapp_types::{
    Message, MessageSource, Metadata, Schedule, ScheduleEdits, ScheduleInfo, TagGroups,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

struct AutomationInner {
    config: AutomationConfig,
    services: Collaborators,
    manager: InAppMessageManager,
    observer: Arc<RemoteDataObserver>,
    remote_data: Arc<dyn RemoteDataAccess>,
    shutdown: watch::Sender<bool>,
    subscription: Mutex<Option<JoinHandle<()>>>,
}

/// In-app automation runtime.
///
/// The trigger engine calls [`on_prepare_schedule`],
/// [`on_check_execution_readiness`] and [`on_execute_triggered_schedule`];
/// the app uses the scheduling and flag methods.
///
/// [`on_prepare_schedule`]: InAppAutomation::on_prepare_schedule
/// [`on_check_execution_readiness`]: InAppAutomation::on_check_execution_readiness
/// [`on_execute_triggered_schedule`]: InAppAutomation::on_execute_triggered_schedule
#[derive(Clone)]
pub struct InAppAutomation {
    inner: Arc<AutomationInner>,
}

impl InAppAutomation {
    #[must_use]
    pub fn new(
        config: AutomationConfig,
        services: Collaborators,
        remote_data: Arc<dyn RemoteDataAccess>,
    ) -> Self {
        let manager = InAppMessageManager::new(&config, services.clone());
        let observer = Arc::new(RemoteDataObserver::new(Arc::clone(&services.store)));
        let (shutdown, _) = watch::channel(false);

        Self {
            inner: Arc::new(AutomationInner {
                config,
                services,
                manager,
                observer,
                remote_data,
                shutdown,
                subscription: Mutex::new(None),
            }),
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Subscribes to remote data and starts preparing schedules.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) -> AutomationResult<()> {
        let inner = &self.inner;
        let device = inner.services.device.device_state();
        inner
            .observer
            .init_new_user_cutoff(device.channel_id.is_some())?;
        inner.update_engine_pause_state();

        {
            let mut subscription = lock(&inner.subscription);
            if subscription.is_none() {
                inner.shutdown.send_replace(false);
                *subscription = Some(inner.spawn_subscription());
            }
        }

        inner.manager.on_ready();
        inner.services.engine.check_pending_schedules();
        info!("In-app automation started");
        Ok(())
    }

    /// Stops the remote data subscription and releases staleness waiters.
    pub fn stop(&self) {
        self.inner.shutdown.send_replace(true);
        if let Some(task) = lock(&self.inner.subscription).take() {
            task.abort();
        }
        info!("In-app automation stopped");
    }

    // ── Engine call-ins ──────────────────────────────────────────

    /// Prepares a triggered schedule.
    ///
    /// A remote schedule whose metadata is no longer current is
    /// invalidated. When the observer has not yet caught up with remote
    /// data, the call waits for the next processed payload first so the
    /// engine reloads an up-to-date schedule.
    pub async fn on_prepare_schedule(&self, schedule: &Schedule) -> PrepareResult {
        let inner = &self.inner;
        if !inner.is_schedule_stale(schedule) {
            return inner.manager.on_prepare(schedule).await;
        }

        let mut updates = inner.observer.subscribe_updates();
        let mut shutdown = inner.shutdown.subscribe();
        let observer_current = inner
            .remote_data
            .is_metadata_current(&inner.observer.last_payload_metadata());
        let stopped = *shutdown.borrow_and_update();

        if !observer_current && !stopped {
            debug!("Schedule {} is stale, waiting for remote data", schedule.id);
            tokio::select! {
                _ = updates.changed() => {}
                _ = shutdown.changed() => {}
            }
        }

        debug!("Invalidating stale schedule {}", schedule.id);
        PrepareResult::Invalidate
    }

    /// Polls whether a prepared schedule can display now.
    pub async fn on_check_execution_readiness(&self, schedule: &Schedule) -> ReadyResult {
        let inner = &self.inner;
        if self.is_paused() {
            return ReadyResult::NotReady;
        }

        if inner.is_schedule_stale(schedule) {
            debug!("Schedule {} became stale after preparing", schedule.id);
            inner.manager.on_execution_invalidated(&schedule.id).await;
            return ReadyResult::Invalidate;
        }

        inner.manager.on_check_execution_readiness(&schedule.id)
    }

    /// Displays a prepared schedule. The receiver resolves when the
    /// execution is over.
    pub async fn on_execute_triggered_schedule(&self, schedule_id: &str) -> oneshot::Receiver<()> {
        self.inner.manager.on_execute(schedule_id).await
    }

    /// A display was interrupted, e.g. by the app being killed.
    pub fn on_execution_interrupted(&self, schedule: &Schedule) {
        self.inner
            .manager
            .on_execution_interrupted(&schedule.id, Some(&schedule.message));
    }

    pub async fn on_new_schedule(&self, schedule: &Schedule) {
        self.inner
            .manager
            .on_new_schedule(&schedule.id, &schedule.message)
            .await;
    }

    pub async fn on_schedule_finished(&self, schedule_id: &str) {
        self.inner.manager.on_schedule_finished(schedule_id).await;
    }

    // ── Flags ────────────────────────────────────────────────────

    /// Pauses or resumes displays. Resuming asks the engine to re-poll.
    pub fn set_paused(&self, paused: bool) -> AutomationResult<()> {
        let was_paused = self.is_paused();
        self.inner.services.store.put(keys::PAUSED, paused.into())?;
        if was_paused && !paused {
            self.inner.services.engine.check_pending_schedules();
        }
        Ok(())
    }

    pub fn is_paused(&self) -> bool {
        self.inner.services.store.get_bool(keys::PAUSED, false)
    }

    /// Enables or disables trigger processing in the engine.
    pub fn set_enabled(&self, enabled: bool) -> AutomationResult<()> {
        self.inner.services.store.put(keys::ENABLED, enabled.into())?;
        self.inner.update_engine_pause_state();
        Ok(())
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_enabled()
    }

    // ── Scheduling ───────────────────────────────────────────────

    /// Schedules an app-defined message.
    pub async fn schedule_message(&self, info: ScheduleInfo) -> AutomationResult<Schedule> {
        let message_id = info.message.id().to_string();
        self.schedule_messages(vec![info])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                AutomationError::Engine(format!("no schedule created for message {message_id}"))
            })
    }

    pub async fn schedule_messages(
        &self,
        infos: Vec<ScheduleInfo>,
    ) -> AutomationResult<Vec<Schedule>> {
        for info in &infos {
            info.validate()?;
        }
        self.inner
            .services
            .engine
            .schedule(infos, Metadata::empty())
            .await
    }

    pub async fn cancel_schedule(&self, schedule_id: &str) -> AutomationResult<()> {
        self.inner
            .services
            .engine
            .cancel_schedules(&[schedule_id.to_string()])
            .await
    }

    /// Cancels every schedule for a message.
    pub async fn cancel_message(&self, message_id: &str) -> AutomationResult<()> {
        self.inner.services.engine.cancel_group(message_id).await
    }

    /// Returns all schedules, or those for one message.
    pub async fn get_schedules(&self, message_id: Option<&str>) -> AutomationResult<Vec<Schedule>> {
        self.inner.services.engine.get_schedules(message_id).await
    }

    pub async fn get_schedule(&self, schedule_id: &str) -> AutomationResult<Option<Schedule>> {
        self.inner.services.engine.get_schedule(schedule_id).await
    }

    pub async fn edit_schedule(
        &self,
        schedule_id: &str,
        edits: ScheduleEdits,
    ) -> AutomationResult<Schedule> {
        self.inner
            .services
            .engine
            .edit_schedule(schedule_id, edits)
            .await?
            .ok_or_else(|| AutomationError::ScheduleNotFound(schedule_id.to_string()))
    }

    /// Tag groups referenced by the audiences of all schedules, for
    /// prefetching.
    pub async fn requested_tag_groups(&self) -> AutomationResult<TagGroups> {
        let schedules = self.inner.services.engine.get_schedules(None).await?;
        let mut requested = TagGroups::new();
        for selector in schedules
            .iter()
            .filter_map(|schedule| schedule.message.audience())
            .filter_map(|audience| audience.tags.as_ref())
        {
            for (group, tags) in selector.tag_groups() {
                requested.entry(group).or_default().extend(tags);
            }
        }
        Ok(requested)
    }

    // ── Accessors ────────────────────────────────────────────────

    pub fn manager(&self) -> &InAppMessageManager {
        &self.inner.manager
    }

    pub fn observer(&self) -> &Arc<RemoteDataObserver> {
        &self.inner.observer
    }

    pub fn config(&self) -> &AutomationConfig {
        &self.inner.config
    }
}

impl AutomationInner {
    fn is_enabled(&self) -> bool {
        self.services.store.get_bool(keys::ENABLED, true)
    }

    fn update_engine_pause_state(&self) {
        self.services.engine.set_paused(!self.is_enabled());
    }

    fn is_schedule_stale(&self, schedule: &Schedule) -> bool {
        is_remote(&schedule.message) && !self.remote_data.is_metadata_current(&schedule.metadata)
    }

    /// Feeds remote payloads to the observer until stopped.
    fn spawn_subscription(&self) -> JoinHandle<()> {
        let observer = Arc::clone(&self.observer);
        let services = self.services.clone();
        let mut payloads = self.remote_data.payloads(&self.config.payload_type);
        let mut shutdown = self.shutdown.subscribe();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        let stopped = changed.is_err() || *shutdown.borrow();
                        if stopped {
                            break;
                        }
                    }
                    payload = payloads.next() => {
                        let Some(payload) = payload else {
                            debug!("Remote data stream ended");
                            break;
                        };
                        process_payload(&observer, &services, &payload).await;
                    }
                }
            }
        })
    }
}

impl Drop for AutomationInner {
    fn drop(&mut self) {
        if let Some(task) = lock(&self.subscription).take() {
            task.abort();
        }
    }
}

async fn process_payload(
    observer: &RemoteDataObserver,
    services: &Collaborators,
    payload: &RemoteDataPayload,
) {
    let device = services.device.device_state();
    if let Err(e) = observer
        .process_payload(payload, &*services.engine, &device)
        .await
    {
        error!("Failed to process in-app remote data {}: {}", payload.timestamp, e);
    }
}

fn is_remote(message: &Message) -> bool {
    message.source() == MessageSource::RemoteData
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
