//! High-level store API: the dependency-gated state machine over storage,
//! with cached list reads and lifecycle notifications.

use crate::cache::TtlCache;
use crate::clock::{Clock, SystemClock};
use crate::id::generate_id;
use crate::notify::{LogNotifier, Notifier, TaskEvent};
use crate::storage::Storage;
use crate::types::{DependencySummary, HistoryEntry, NewTask, Status, Task, TaskPatch, ValidationError};
use chrono::{DateTime, Utc};
use eyre::{Context, Result};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

/// Cached list reads live this long unless a write invalidates them first.
const LIST_TTL_SECONDS: i64 = 300;

/// Key prefix shared by every cached task-list variant; cleared as a whole
/// on any write.
const LIST_PREFIX: &str = "tasks:";

/// Errors that can occur during store operations.
#[derive(Debug)]
pub enum StoreError {
    /// Task (or dependency reference) not found.
    TaskNotFound(String),
    /// Dependency gate not satisfied for moving to in_progress.
    IllegalTransition { id: String, blocked_on: Vec<String> },
    /// Due time precedes start time.
    InvalidRange { start: DateTime<Utc>, due: DateTime<Utc> },
    /// Deletion blocked by tasks that depend on this one.
    Conflict { id: String, dependents: i64 },
    /// A task cannot depend on itself.
    SelfDependency(String),
    /// Adding this dependency would create a cycle.
    DependencyCycle { id: String, dep: String },
    /// Field bounds violated.
    Validation(ValidationError),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::TaskNotFound(id) => write!(f, "task not found: {}", id),
            StoreError::IllegalTransition { id, blocked_on } => {
                write!(
                    f,
                    "cannot move {} to in_progress: incomplete dependencies: {}",
                    id,
                    blocked_on.join(", ")
                )
            }
            StoreError::InvalidRange { start, due } => {
                write!(
                    f,
                    "due time {} is before start time {}",
                    due.to_rfc3339(),
                    start.to_rfc3339()
                )
            }
            StoreError::Conflict { id, dependents } => {
                write!(f, "cannot delete {}: {} task(s) depend on it", id, dependents)
            }
            StoreError::SelfDependency(id) => write!(f, "task {} cannot depend on itself", id),
            StoreError::DependencyCycle { id, dep } => {
                write!(f, "dependency {} would create a cycle for task {}", dep, id)
            }
            StoreError::Validation(e) => write!(f, "validation error: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}

/// The main Tether store.
pub struct Store {
    storage: Storage,
    cache: TtlCache<Vec<Task>>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

impl Store {
    /// Initialize a new store in the given directory.
    pub fn init(root: &Path) -> Result<Self> {
        Ok(Self::assemble(Storage::init(root)?))
    }

    /// Open an existing store.
    pub fn open(root: &Path) -> Result<Self> {
        Ok(Self::assemble(Storage::open(root)?))
    }

    fn assemble(storage: Storage) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Self {
            cache: TtlCache::new(clock.clone()),
            storage,
            clock,
            notifier: Arc::new(LogNotifier),
        }
    }

    /// Replace the time source. Rebuilds the cache against the new clock,
    /// so use at construction time.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.cache = TtlCache::new(clock.clone());
        self.clock = clock;
        self
    }

    /// Replace the event notifier.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Current instant per the store's clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Create a new task. Status is always `pending` and history is seeded
    /// with that entry; dependency ids must reference existing tasks.
    pub fn create(&self, new: NewTask) -> Result<Task> {
        new.validate().map_err(|e| eyre::eyre!(StoreError::Validation(e)))?;

        if new.due_at < new.start_at {
            return Err(eyre::eyre!(StoreError::InvalidRange {
                start: new.start_at,
                due: new.due_at,
            }));
        }

        // A task being created cannot be the target of any edge yet, so
        // only existence is checked here; self/cycle checks apply on update.
        let depends_on = self.resolve_deps(None, &new.depends_on)?;

        let now = self.clock.now();
        let task = Task {
            id: generate_id(&new.title, now),
            title: new.title.trim().to_string(),
            description: new.description,
            status: Status::Pending,
            priority: new.priority.unwrap_or_default(),
            start_at: new.start_at,
            due_at: new.due_at,
            depends_on,
            history: vec![HistoryEntry { status: Status::Pending, at: now }],
            created_at: now,
            updated_at: now,
        };

        self.storage.insert_task(&task).context("Failed to persist task")?;
        self.cache.clear_by_prefix(LIST_PREFIX);
        self.emit(TaskEvent::Created { task: task.clone() });

        Ok(task)
    }

    /// Get a task by ID, with dependency summaries resolved.
    pub fn get(&self, id: &str) -> Result<Option<Task>> {
        self.storage.get_task(id)
    }

    /// List tasks with optional status filter. Reads through the cache;
    /// each filter variant is cached under its own key.
    pub fn list(&self, status_filter: Option<Status>) -> Result<Vec<Task>> {
        let key = match status_filter {
            Some(status) => format!("tasks:list:{}", status),
            None => "tasks:list:all".to_string(),
        };

        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached);
        }

        let tasks = self.storage.list_tasks(status_filter)?;
        self.cache.set(&key, tasks.clone(), LIST_TTL_SECONDS);
        Ok(tasks)
    }

    /// List tasks by priority (high, medium, low), then ascending due time.
    /// Reads through the cache.
    pub fn list_by_priority(&self) -> Result<Vec<Task>> {
        let key = "tasks:priority";

        if let Some(cached) = self.cache.get(key) {
            return Ok(cached);
        }

        let tasks = self.storage.list_by_priority()?;
        self.cache.set(key, tasks.clone(), LIST_TTL_SECONDS);
        Ok(tasks)
    }

    /// Tasks past their due time and not completed, including those already
    /// marked overdue. Not cached: the result depends on `now`.
    pub fn list_overdue(&self, now: DateTime<Utc>) -> Result<Vec<Task>> {
        self.storage.list_overdue(&now)
    }

    /// Whether a task may move to `in_progress`: true iff it has no direct
    /// dependencies or every direct dependency is completed. Only this one
    /// level is consulted; dependencies of dependencies are not walked.
    pub fn can_start(&self, id: &str) -> Result<bool> {
        let task = self
            .storage
            .get_task(id)?
            .ok_or_else(|| eyre::eyre!(StoreError::TaskNotFound(id.to_string())))?;
        Ok(incomplete_deps(&task).is_empty())
    }

    /// Apply a partial update. Moving to `in_progress` is gated on the
    /// dependency set stored before the patch; any other status value is
    /// applied as given. A status change appends exactly one history entry.
    pub fn update(&self, id: &str, patch: TaskPatch) -> Result<Task> {
        patch.validate().map_err(|e| eyre::eyre!(StoreError::Validation(e)))?;

        let current = self
            .storage
            .get_task(id)?
            .ok_or_else(|| eyre::eyre!(StoreError::TaskNotFound(id.to_string())))?;

        if patch.status == Some(Status::InProgress) {
            let blocked_on = incomplete_deps(&current);
            if !blocked_on.is_empty() {
                return Err(eyre::eyre!(StoreError::IllegalTransition {
                    id: id.to_string(),
                    blocked_on,
                }));
            }
        }

        // Whenever either bound is touched, validate the effective pair:
        // the patched value where present, the stored one otherwise.
        if patch.start_at.is_some() || patch.due_at.is_some() {
            let start = patch.start_at.unwrap_or(current.start_at);
            let due = patch.due_at.unwrap_or(current.due_at);
            if due < start {
                return Err(eyre::eyre!(StoreError::InvalidRange { start, due }));
            }
        }

        let depends_on = match &patch.depends_on {
            Some(ids) => self.resolve_deps(Some(id), ids)?,
            None => current.depends_on.clone(),
        };

        let now = self.clock.now();
        let old_status = current.status;
        let new_status = patch.status.unwrap_or(old_status);

        let mut task = Task {
            id: current.id,
            title: patch
                .title
                .map(|t| t.trim().to_string())
                .unwrap_or(current.title),
            description: patch.description.or(current.description),
            status: new_status,
            priority: patch.priority.unwrap_or(current.priority),
            start_at: patch.start_at.unwrap_or(current.start_at),
            due_at: patch.due_at.unwrap_or(current.due_at),
            depends_on,
            history: current.history,
            created_at: current.created_at,
            updated_at: now,
        };

        if !self.storage.update_task(&task).context("Failed to persist update")? {
            return Err(eyre::eyre!(StoreError::TaskNotFound(id.to_string())));
        }

        if new_status != old_status {
            self.storage.append_history(&task.id, new_status, &now)?;
            task.history.push(HistoryEntry { status: new_status, at: now });
            self.emit(TaskEvent::StatusChanged {
                task_id: task.id.clone(),
                old_status,
                new_status,
            });
        }

        self.cache.clear_by_prefix(LIST_PREFIX);
        Ok(task)
    }

    /// Whether a task may be deleted: true iff no other task depends on it.
    pub fn can_delete(&self, id: &str) -> Result<bool> {
        Ok(self.storage.count_dependents(id)? == 0)
    }

    /// Delete a task. Blocked while any other task lists it as a
    /// dependency; deletion never cascades.
    pub fn delete(&self, id: &str) -> Result<()> {
        if !self.storage.task_exists(id)? {
            return Err(eyre::eyre!(StoreError::TaskNotFound(id.to_string())));
        }

        let dependents = self.storage.count_dependents(id)?;
        if dependents > 0 {
            return Err(eyre::eyre!(StoreError::Conflict {
                id: id.to_string(),
                dependents,
            }));
        }

        self.storage.delete_task(id).context("Failed to delete task")?;
        self.cache.clear_by_prefix(LIST_PREFIX);
        self.emit(TaskEvent::Deleted { task_id: id.to_string() });

        Ok(())
    }

    /// Transition every task due before `now` (and neither completed nor
    /// already overdue) to `overdue`, appending history. Returns the
    /// affected tasks ordered by due time. This bypasses the dependency
    /// gate: overdue marks failure, not forward progress. Idempotent for a
    /// fixed `now`.
    pub fn mark_overdue(&self, now: DateTime<Utc>) -> Result<Vec<Task>> {
        let candidates = self.storage.list_overdue_candidates(&now)?;

        let mut marked = Vec::with_capacity(candidates.len());
        for mut task in candidates {
            task.status = Status::Overdue;
            task.updated_at = now;
            if !self.storage.update_task(&task).context("Failed to persist overdue status")? {
                // Deleted between scan and write; nothing to mark.
                continue;
            }
            self.storage.append_history(&task.id, Status::Overdue, &now)?;
            task.history.push(HistoryEntry { status: Status::Overdue, at: now });
            marked.push(task);
        }

        if !marked.is_empty() {
            self.cache.clear_by_prefix(LIST_PREFIX);
        }

        Ok(marked)
    }

    /// Emit a lifecycle event. Best-effort: a notifier failure is logged
    /// and never fails the write that produced it.
    pub(crate) fn emit(&self, event: TaskEvent) {
        if let Err(e) = self.notifier.notify(&event) {
            log::warn!("{} notification failed: {}", event.kind(), e);
        }
    }

    /// Check and resolve a dependency id list into display summaries.
    /// Duplicates are dropped; every id must reference an existing task.
    /// With `task_id` present (updates), self-references and cycles are
    /// rejected as well.
    fn resolve_deps(&self, task_id: Option<&str>, dep_ids: &[String]) -> Result<Vec<DependencySummary>> {
        let mut seen = HashSet::new();
        let mut summaries = Vec::new();

        for dep_id in dep_ids {
            if !seen.insert(dep_id.as_str()) {
                continue;
            }

            if let Some(task_id) = task_id {
                if dep_id == task_id {
                    return Err(eyre::eyre!(StoreError::SelfDependency(task_id.to_string())));
                }
            }

            let dep = self
                .storage
                .get_task(dep_id)?
                .ok_or_else(|| eyre::eyre!(StoreError::TaskNotFound(dep_id.clone())))?;

            if let Some(task_id) = task_id {
                if self.would_create_cycle(task_id, dep_id)? {
                    return Err(eyre::eyre!(StoreError::DependencyCycle {
                        id: task_id.to_string(),
                        dep: dep_id.clone(),
                    }));
                }
            }

            summaries.push(DependencySummary {
                id: dep.id,
                title: dep.title,
                status: dep.status,
            });
        }

        Ok(summaries)
    }

    /// Check if depending on `dep_id` would create a cycle.
    fn would_create_cycle(&self, task_id: &str, dep_id: &str) -> Result<bool> {
        // DFS from the new dependency; if it already reaches this task,
        // the edge would close a loop.
        let mut visited = HashSet::new();
        let mut stack = vec![dep_id.to_string()];

        while let Some(node) = stack.pop() {
            if node == task_id {
                return Ok(true);
            }
            if visited.insert(node.clone()) {
                stack.extend(self.storage.direct_dep_ids(&node)?);
            }
        }

        Ok(false)
    }
}

/// Direct dependencies not yet completed, by id.
fn incomplete_deps(task: &Task) -> Vec<String> {
    task.depends_on
        .iter()
        .filter(|dep| dep.status != Status::Completed)
        .map(|dep| dep.id.clone())
        .collect()
}
