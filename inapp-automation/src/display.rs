//! Display coordination.
//!
//! A coordinator answers "may this message take the screen now?". The
//! default coordinator lets one message display at a time and holds a
//! cooldown after each one; the immediate coordinator never blocks.

use inapp_types::Message;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Upper bound for a cooldown whose deadline is not representable.
const MAX_COOLDOWN: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Invoked when a coordinator may have become ready.
pub type ReadyCallback = Arc<dyn Fn() + Send + Sync>;

/// Mutual-exclusion policy for displaying messages.
pub trait DisplayCoordinator: Send + Sync {
    /// Returns true if `message` may start displaying.
    ///
    /// `is_redisplay` is set when the message is already on screen and is
    /// being shown again, e.g. after a configuration change. A coordinator
    /// that admits one message at a time holds its slot for `message` from
    /// the first ready answer until the display starts or is cancelled.
    fn is_ready(&self, message: &Message, is_redisplay: bool) -> bool;

    /// The message started displaying.
    fn on_display_started(&self, message: &Message);

    /// The renderer asks to put the message on a display surface.
    fn on_allow_display(&self, message: &Message) -> bool;

    /// The message finished displaying.
    fn on_display_finished(&self, message: &Message);

    /// The message was found ready but will not display.
    fn on_display_cancelled(&self, _message: &Message) {}

    /// The surface showing the message went away.
    fn on_surface_destroyed(&self, _message: &Message, _changing_configuration: bool) {}

    /// Sets the callback used to announce readiness changes.
    fn set_ready_callback(&self, callback: Option<ReadyCallback>);
}

// ── Default coordinator ──────────────────────────────────────────

struct CoordinatorState {
    /// Id of the message holding the screen.
    locked: Option<String>,
    /// Id of the message that was found ready and has not started yet.
    reserved: Option<String>,
    cooldown_until: Option<Instant>,
    interval: Duration,
    cooldown_task: Option<JoinHandle<()>>,
    ready_callback: Option<ReadyCallback>,
}

/// One message at a time, followed by a cooldown.
pub struct DefaultDisplayCoordinator {
    state: Arc<Mutex<CoordinatorState>>,
}

impl DefaultDisplayCoordinator {
    /// Creates a coordinator with the given cooldown.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(CoordinatorState {
                locked: None,
                reserved: None,
                cooldown_until: None,
                interval,
                cooldown_task: None,
                ready_callback: None,
            })),
        }
    }

    /// Changes the cooldown used after the next release.
    pub fn set_display_interval(&self, interval: Duration) {
        self.lock().interval = interval;
    }

    pub fn display_interval(&self) -> Duration {
        self.lock().interval
    }

    /// Id of the message currently holding the screen.
    pub fn locked_message_id(&self) -> Option<String> {
        self.lock().locked.clone()
    }

    /// Id of the message the next display slot is held for.
    pub fn reserved_message_id(&self) -> Option<String> {
        self.lock().reserved.clone()
    }

    fn lock(&self) -> MutexGuard<'_, CoordinatorState> {
        lock_state(&self.state)
    }

    /// Releases the lock and starts the cooldown. The ready callback fires
    /// once the cooldown elapses.
    fn release(&self, state: &mut CoordinatorState) {
        state.locked = None;
        let now = Instant::now();
        let until = now
            .checked_add(state.interval)
            .unwrap_or_else(|| now + MAX_COOLDOWN);
        state.cooldown_until = Some(until);

        if let Some(task) = state.cooldown_task.take() {
            task.abort();
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let shared = Arc::clone(&self.state);
                state.cooldown_task = Some(handle.spawn(async move {
                    tokio::time::sleep_until(until).await;
                    let callback = {
                        let mut state = lock_state(&shared);
                        state.cooldown_task = None;
                        state.ready_callback.clone()
                    };
                    if let Some(callback) = callback {
                        callback();
                    }
                }));
            }
            Err(_) => warn!("No runtime available to announce the end of the display cooldown"),
        }
    }
}

impl Default for DefaultDisplayCoordinator {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl Drop for DefaultDisplayCoordinator {
    fn drop(&mut self) {
        if let Some(task) = self.lock().cooldown_task.take() {
            task.abort();
        }
    }
}

impl DisplayCoordinator for DefaultDisplayCoordinator {
    fn is_ready(&self, message: &Message, is_redisplay: bool) -> bool {
        let mut state = self.lock();
        if state.locked.is_some() {
            return false;
        }
        if let Some(reserved) = state.reserved.as_deref() {
            return reserved == message.id();
        }
        if is_redisplay {
            return true;
        }

        let ready = state
            .cooldown_until
            .is_none_or(|until| Instant::now() >= until);
        if ready {
            debug!("Display slot reserved for message {}", message.id());
            state.reserved = Some(message.id().to_string());
        }
        ready
    }

    fn on_display_started(&self, message: &Message) {
        let mut state = self.lock();
        debug!("Display lock taken by message {}", message.id());
        if state.reserved.as_deref() == Some(message.id()) {
            state.reserved = None;
        }
        state.locked = Some(message.id().to_string());
        state.cooldown_until = None;
    }

    fn on_allow_display(&self, message: &Message) -> bool {
        let mut state = self.lock();
        match state.locked.as_deref() {
            None => {
                if state
                    .reserved
                    .as_deref()
                    .is_some_and(|reserved| reserved != message.id())
                {
                    return false;
                }
                state.reserved = None;
                state.locked = Some(message.id().to_string());
                true
            }
            Some(current) => current == message.id(),
        }
    }

    fn on_display_finished(&self, message: &Message) {
        let mut state = self.lock();
        if state.locked.as_deref() != Some(message.id()) {
            debug!(
                "Ignoring display finished for message {} that does not hold the lock",
                message.id()
            );
            drop(state);
            self.on_display_cancelled(message);
            return;
        }
        debug!("Display lock released by message {}", message.id());
        self.release(&mut state);
    }

    fn on_display_cancelled(&self, message: &Message) {
        let callback = {
            let mut state = self.lock();
            if state.reserved.as_deref() != Some(message.id()) {
                return;
            }
            debug!("Display slot released by message {}", message.id());
            state.reserved = None;
            state.ready_callback.clone()
        };
        if let Some(callback) = callback {
            callback();
        }
    }

    fn on_surface_destroyed(&self, message: &Message, changing_configuration: bool) {
        if changing_configuration {
            return;
        }
        let mut state = self.lock();
        if state.locked.as_deref() == Some(message.id()) {
            debug!("Display surface destroyed for message {}", message.id());
            self.release(&mut state);
        }
    }

    fn set_ready_callback(&self, callback: Option<ReadyCallback>) {
        self.lock().ready_callback = callback;
    }
}

fn lock_state(state: &Mutex<CoordinatorState>) -> MutexGuard<'_, CoordinatorState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Immediate coordinator ────────────────────────────────────────

/// Never blocks a display.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImmediateDisplayCoordinator;

impl DisplayCoordinator for ImmediateDisplayCoordinator {
    fn is_ready(&self, _message: &Message, _is_redisplay: bool) -> bool {
        true
    }

    fn on_display_started(&self, _message: &Message) {}

    fn on_allow_display(&self, _message: &Message) -> bool {
        true
    }

    fn on_display_finished(&self, _message: &Message) {}

    fn set_ready_callback(&self, _callback: Option<ReadyCallback>) {}
}
