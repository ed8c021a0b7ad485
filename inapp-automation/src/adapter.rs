//! Renderer adapters and the wrapper binding one to a schedule.

use crate::assets::Assets;
use crate::display::DisplayCoordinator;
use crate::error::AutomationResult;
use crate::manager::DisplayHandler;
use async_trait::async_trait;
use inapp_types::Message;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Result of a preparation step on a collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrepareStatus {
    Ok,
    /// Transient failure; try again later.
    Retry,
    /// Permanent failure; give up on this display.
    Cancel,
}

/// Renders one message.
#[async_trait]
pub trait DisplayAdapter: Send + Sync {
    /// Loads whatever the renderer needs before it can display.
    async fn prepare(&self, assets: Option<Assets>) -> PrepareStatus;

    /// Returns true if the renderer can display right now.
    fn is_ready(&self) -> bool;

    /// Puts the message on screen. The renderer reports the outcome through
    /// `handler` once the message is dismissed.
    async fn display(&self, handler: DisplayHandler) -> AutomationResult<()>;

    /// Releases renderer resources after the display ended.
    async fn on_finish(&self);
}

/// Builds adapters for one display type.
pub trait AdapterFactory: Send + Sync {
    fn create_adapter(&self, message: &Message) -> AutomationResult<Arc<dyn DisplayAdapter>>;
}

/// Binds a schedule to its renderer and display coordinator.
pub struct AdapterWrapper {
    schedule_id: String,
    message: Message,
    adapter: Arc<dyn DisplayAdapter>,
    coordinator: Arc<dyn DisplayCoordinator>,
    displayed: AtomicBool,
}

impl AdapterWrapper {
    #[must_use]
    pub fn new(
        schedule_id: impl Into<String>,
        message: Message,
        adapter: Arc<dyn DisplayAdapter>,
        coordinator: Arc<dyn DisplayCoordinator>,
    ) -> Self {
        Self {
            schedule_id: schedule_id.into(),
            message,
            adapter,
            coordinator,
            displayed: AtomicBool::new(false),
        }
    }

    pub fn schedule_id(&self) -> &str {
        &self.schedule_id
    }

    /// The message as extended for this display.
    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn coordinator(&self) -> &Arc<dyn DisplayCoordinator> {
        &self.coordinator
    }

    /// Returns true once `display` has been called.
    pub fn is_displayed(&self) -> bool {
        self.displayed.load(Ordering::Acquire)
    }

    pub async fn prepare(&self, assets: Option<Assets>) -> PrepareStatus {
        self.adapter.prepare(assets).await
    }

    /// Both the renderer and the coordinator must be ready.
    pub fn is_ready(&self) -> bool {
        self.adapter.is_ready() && self.coordinator.is_ready(&self.message, self.is_displayed())
    }

    pub async fn display(&self, handler: DisplayHandler) -> AutomationResult<()> {
        self.displayed.store(true, Ordering::Release);
        self.coordinator.on_display_started(&self.message);
        self.adapter.display(handler).await
    }

    /// Releases the coordinator lock.
    pub fn display_finished(&self) {
        self.coordinator.on_display_finished(&self.message);
    }

    /// Gives up a display slot held since the last ready check.
    pub fn display_cancelled(&self) {
        self.coordinator.on_display_cancelled(&self.message);
    }

    /// Lets the renderer clean up.
    pub async fn adapter_finished(&self) {
        self.adapter.on_finish().await;
    }
}

impl fmt::Debug for AdapterWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterWrapper")
            .field("schedule_id", &self.schedule_id)
            .field("message_id", &self.message.id())
            .field("displayed", &self.is_displayed())
            .finish()
    }
}
