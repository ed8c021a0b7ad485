//! In-app message automation runtime.
//!
//! Decides when a triggered message may render, keeps local schedules in
//! step with a remotely delivered catalog, and serializes rendering so only
//! one message holds the screen at a time.
//!
//! # Architecture
//!
//! The trigger engine owns schedules and calls in at three points: prepare,
//! readiness poll and execute. [`InAppAutomation`] receives those calls,
//! rejects stale remote schedules, and hands the rest to the
//! [`InAppMessageManager`].
//!
//! ## Components
//!
//! - **Manager**: runs the prepare pipeline (audience, assets, adapter) and
//!   keeps one [`AdapterWrapper`] per prepared schedule
//! - **Display coordinators**: decide whether a message may take the screen
//! - **Retrying executor**: owns backoff for pipeline stages
//! - **Remote data observer**: reconciles catalog payloads into schedule
//!   creates, edits and soft cancels
//!
//! ## Schedule lifecycle
//!
//! 1. **Prepare**: staleness guard, audience check, asset and adapter prep
//! 2. **Ready poll**: adapter and coordinator readiness
//! 3. **Execute**: display through the adapter
//! 4. **Finish**: resolution reported through the [`DisplayHandler`]

pub mod adapter;
pub mod assets;
mod automation;
mod config;
pub mod display;
pub mod engine;
mod error;
pub mod events;
pub mod executor;
pub mod listeners;
mod manager;
pub mod remote_data;
pub mod services;
pub mod store;

pub use adapter::{AdapterFactory, AdapterWrapper, DisplayAdapter, PrepareStatus};
pub use assets::{AssetManager, Assets};
pub use automation::InAppAutomation;
pub use config::AutomationConfig;
pub use display::{
    DefaultDisplayCoordinator, DisplayCoordinator, ImmediateDisplayCoordinator, ReadyCallback,
};
pub use engine::AutomationEngine;
pub use error::{AutomationError, AutomationResult};
pub use events::{EventSink, InAppEvent, InAppEventKind};
pub use executor::{OperationResult, RetryingExecutor};
pub use listeners::{InAppMessageListener, ListenerRegistry};
pub use manager::{
    CoordinatorSelector, DisplayHandler, InAppMessageManager, MessageExtender, PrepareResult,
    ReadyResult,
};
pub use remote_data::{
    RemoteDataAccess, RemoteDataObserver, RemoteDataPayload, SchedulesUpdatedListener,
};
pub use services::{ActionRunner, Collaborators, DeviceStateProvider, TagGroupProvider};
pub use store::{DataStore, MemoryDataStore};
