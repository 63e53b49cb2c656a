//! Fire-and-forget task lifecycle notifications.
//!
//! Write paths emit one event per lifecycle change. Delivery is best-effort:
//! the store logs a notifier failure and moves on, so a broken notifier can
//! never fail a write.

use crate::types::{Status, Task};
use eyre::Result;

/// A task lifecycle event.
#[derive(Debug, Clone)]
pub enum TaskEvent {
    Created { task: Task },
    StatusChanged { task_id: String, old_status: Status, new_status: Status },
    Deleted { task_id: String },
    Overdue { task: Task },
}

impl TaskEvent {
    /// Stable event name, as logged and consumed downstream.
    pub fn kind(&self) -> &'static str {
        match self {
            TaskEvent::Created { .. } => "TASK_CREATED",
            TaskEvent::StatusChanged { .. } => "TASK_STATUS_CHANGED",
            TaskEvent::Deleted { .. } => "TASK_DELETED",
            TaskEvent::Overdue { .. } => "TASK_OVERDUE",
        }
    }
}

/// Receives lifecycle events. Implementations must not block the write path;
/// errors are logged by the caller and never propagated.
pub trait Notifier: Send + Sync {
    fn notify(&self, event: &TaskEvent) -> Result<()>;
}

/// Default notifier: records each event in the log.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, event: &TaskEvent) -> Result<()> {
        match event {
            TaskEvent::Created { task } => {
                log::info!("{}: {} ({})", event.kind(), task.title, task.id);
            }
            TaskEvent::StatusChanged { task_id, old_status, new_status } => {
                log::info!("{}: {} {} -> {}", event.kind(), task_id, old_status, new_status);
            }
            TaskEvent::Deleted { task_id } => {
                log::info!("{}: {}", event.kind(), task_id);
            }
            TaskEvent::Overdue { task } => {
                log::warn!(
                    "{}: {} ({}) was due {}",
                    event.kind(),
                    task.title,
                    task.id,
                    task.due_at.to_rfc3339()
                );
            }
        }
        Ok(())
    }
}

/// Notifier that drops every event, for embedders that do not want
/// lifecycle log lines.
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _event: &TaskEvent) -> Result<()> {
        Ok(())
    }
}
