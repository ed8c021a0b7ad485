//! The trigger engine that owns schedules.
//!
//! The engine persists schedules, matches triggers, enforces windows and
//! limits, and calls back into [`InAppAutomation`](crate::InAppAutomation)
//! to prepare, poll and execute them. This crate only consumes it.

use crate::error::AutomationResult;
use async_trait::async_trait;
use inapp_types::{Metadata, Schedule, ScheduleEdits, ScheduleInfo};

/// Schedule storage and trigger matching.
#[async_trait]
pub trait AutomationEngine: Send + Sync {
    /// Creates schedules, stamping each with `metadata`.
    async fn schedule(
        &self,
        infos: Vec<ScheduleInfo>,
        metadata: Metadata,
    ) -> AutomationResult<Vec<Schedule>>;

    /// Applies edits. Returns `None` if the schedule does not exist.
    async fn edit_schedule(
        &self,
        schedule_id: &str,
        edits: ScheduleEdits,
    ) -> AutomationResult<Option<Schedule>>;

    /// Cancels schedules by id. Unknown ids are ignored.
    async fn cancel_schedules(&self, schedule_ids: &[String]) -> AutomationResult<()>;

    /// Cancels every schedule in a group.
    async fn cancel_group(&self, group: &str) -> AutomationResult<()>;

    /// Returns all schedules, or those in one group.
    async fn get_schedules(&self, group: Option<&str>) -> AutomationResult<Vec<Schedule>>;

    /// Returns a single schedule.
    async fn get_schedule(&self, schedule_id: &str) -> AutomationResult<Option<Schedule>>;

    /// Stops or resumes trigger processing.
    fn set_paused(&self, paused: bool);

    /// Asks the engine to re-poll schedules waiting on readiness.
    fn check_pending_schedules(&self);
}
