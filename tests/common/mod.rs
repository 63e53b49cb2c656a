//! Shared test infrastructure for Tether integration tests.
//!
//! Provides TestEnv helper for consistent test setup/teardown.

#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tempfile::TempDir;
use tether::{Clock, ManualClock, NewTask, Status, Store, Task, TaskPatch};

/// Test environment with automatic cleanup and a controllable clock.
pub struct TestEnv {
    pub temp_dir: TempDir,
    pub clock: Arc<ManualClock>,
    pub store: Store,
}

impl TestEnv {
    /// Create a new test environment with an initialized store and a
    /// clock frozen at construction time.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = Store::init(temp_dir.path())
            .expect("Failed to init store")
            .with_clock(clock.clone() as Arc<dyn Clock>);
        Self { temp_dir, clock, store }
    }

    /// Current instant on the test clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Move the test clock forward.
    pub fn advance(&self, duration: Duration) {
        self.clock.advance(duration);
    }

    /// Create a task starting now, due in one day.
    pub fn create_task(&self, title: &str) -> Task {
        self.create_task_due(title, self.now() + Duration::days(1))
    }

    /// Create a task with an explicit due time, starting one day earlier.
    pub fn create_task_due(&self, title: &str, due: DateTime<Utc>) -> Task {
        self.store
            .create(NewTask {
                title: title.to_string(),
                description: None,
                priority: None,
                start_at: due - Duration::days(1),
                due_at: due,
                depends_on: vec![],
            })
            .expect("Failed to create task")
    }

    /// Create a task that depends on the given tasks.
    pub fn create_task_depending_on(&self, title: &str, deps: &[&Task]) -> Task {
        self.store
            .create(NewTask {
                title: title.to_string(),
                description: None,
                priority: None,
                start_at: self.now(),
                due_at: self.now() + Duration::days(1),
                depends_on: deps.iter().map(|t| t.id.clone()).collect(),
            })
            .expect("Failed to create task")
    }

    /// Set a task's status through the normal update path.
    pub fn set_status(&self, task: &Task, status: Status) -> Task {
        self.store
            .update(&task.id, TaskPatch { status: Some(status), ..Default::default() })
            .expect("Failed to set status")
    }

    /// Complete a task.
    pub fn complete(&self, task: &Task) -> Task {
        self.set_status(task, Status::Completed)
    }

    /// Reload a task from the store.
    pub fn reload(&self, task: &Task) -> Task {
        self.store
            .get(&task.id)
            .expect("Failed to get task")
            .expect("Task disappeared")
    }

    /// Statuses recorded in a task's history, oldest first.
    pub fn history_statuses(&self, task: &Task) -> Vec<Status> {
        self.reload(task).history.iter().map(|h| h.status).collect()
    }

    /// Assert that a task may move to in_progress.
    pub fn assert_can_start(&self, task: &Task) {
        assert!(
            self.store.can_start(&task.id).expect("Failed to check gate"),
            "Expected task {} to be startable, but it wasn't",
            task.id
        );
    }

    /// Assert that a task may NOT move to in_progress.
    pub fn assert_cannot_start(&self, task: &Task) {
        assert!(
            !self.store.can_start(&task.id).expect("Failed to check gate"),
            "Expected task {} to be gated, but it was startable",
            task.id
        );
    }

    /// Get all tasks count.
    pub fn total_count(&self) -> usize {
        self.store.list(None).expect("Failed to list tasks").len()
    }

    /// Get tasks by status.
    pub fn count_by_status(&self, status: Status) -> usize {
        self.store.list(Some(status)).expect("Failed to list tasks").len()
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}
