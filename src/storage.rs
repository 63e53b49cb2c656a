//! SQLite repository for tasks, dependency edges, and status history.

use crate::types::{DependencySummary, HistoryEntry, Priority, Status, Task};
use chrono::{DateTime, Utc};
use eyre::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Storage directory name.
const TETHER_DIR: &str = ".tether";

/// SQLite database file.
const DB_FILE: &str = "tether.db";

/// Storage handle for reading/writing tether data.
pub struct Storage {
    db: Connection,
}

impl Storage {
    /// Initialize storage in the given directory.
    pub fn init(root: &Path) -> Result<Self> {
        let tether_dir = root.join(TETHER_DIR);
        fs::create_dir_all(&tether_dir).context("Failed to create .tether directory")?;

        let db = connect(&tether_dir.join(DB_FILE))?;
        let storage = Self { db };
        storage.init_schema()?;
        Ok(storage)
    }

    /// Open existing storage.
    pub fn open(root: &Path) -> Result<Self> {
        let tether_dir = root.join(TETHER_DIR);
        if !tether_dir.exists() {
            eyre::bail!("No .tether directory found. Run 'tt init' first.");
        }

        let db = connect(&tether_dir.join(DB_FILE))?;
        let storage = Self { db };
        storage.init_schema()?;
        Ok(storage)
    }

    /// Initialize SQLite schema.
    fn init_schema(&self) -> Result<()> {
        self.db
            .execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS tasks (
                    id TEXT PRIMARY KEY,
                    title TEXT NOT NULL,
                    description TEXT,
                    status TEXT NOT NULL CHECK (status IN ('pending', 'in_progress', 'completed', 'overdue')),
                    priority TEXT NOT NULL CHECK (priority IN ('low', 'medium', 'high')),
                    start_at TEXT NOT NULL,
                    due_at TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_tasks_due ON tasks(due_at);

                CREATE TABLE IF NOT EXISTS task_deps (
                    task_id TEXT NOT NULL,
                    depends_on TEXT NOT NULL,
                    PRIMARY KEY (task_id, depends_on)
                );
                CREATE INDEX IF NOT EXISTS idx_deps_on ON task_deps(depends_on);

                CREATE TABLE IF NOT EXISTS task_history (
                    task_id TEXT NOT NULL,
                    seq INTEGER NOT NULL,
                    status TEXT NOT NULL CHECK (status IN ('pending', 'in_progress', 'completed', 'overdue')),
                    at TEXT NOT NULL,
                    PRIMARY KEY (task_id, seq)
                );
            "#,
            )
            .context("Failed to initialize schema")?;

        Ok(())
    }

    /// Insert a task with its dependency edges and history rows. Only the
    /// ids of `depends_on` are persisted; summaries are re-resolved on load.
    pub fn insert_task(&self, task: &Task) -> Result<()> {
        self.db
            .execute(
                r#"
                INSERT INTO tasks (id, title, description, status, priority, start_at, due_at, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
                params![
                    task.id,
                    task.title,
                    task.description,
                    task.status.as_str(),
                    task.priority.as_str(),
                    task.start_at.to_rfc3339(),
                    task.due_at.to_rfc3339(),
                    task.created_at.to_rfc3339(),
                    task.updated_at.to_rfc3339(),
                ],
            )
            .context("Failed to insert task")?;

        self.replace_deps(&task.id, task.dependency_ids())?;

        for (seq, entry) in task.history.iter().enumerate() {
            self.db.execute(
                "INSERT INTO task_history (task_id, seq, status, at) VALUES (?, ?, ?, ?)",
                params![task.id, seq as i64, entry.status.as_str(), entry.at.to_rfc3339()],
            )?;
        }

        Ok(())
    }

    /// Get a task by ID, with dependency summaries and history attached.
    pub fn get_task(&self, id: &str) -> Result<Option<Task>> {
        let mut stmt = self.db.prepare(
            r#"
            SELECT id, title, description, status, priority, start_at, due_at, created_at, updated_at
            FROM tasks WHERE id = ?
            "#,
        )?;

        let task = stmt.query_row(params![id], Self::row_to_task).optional()?;

        match task {
            Some(mut task) => {
                task.depends_on = self.load_deps(id)?;
                task.history = self.load_history(id)?;
                Ok(Some(task))
            }
            None => Ok(None),
        }
    }

    /// List all tasks with optional status filter, oldest created first.
    pub fn list_tasks(&self, status_filter: Option<Status>) -> Result<Vec<Task>> {
        let sql = match status_filter {
            Some(_) => {
                r#"
                SELECT id, title, description, status, priority, start_at, due_at, created_at, updated_at
                FROM tasks WHERE status = ?
                ORDER BY created_at ASC, id ASC
                "#
            }
            None => {
                r#"
                SELECT id, title, description, status, priority, start_at, due_at, created_at, updated_at
                FROM tasks
                ORDER BY created_at ASC, id ASC
                "#
            }
        };

        let mut stmt = self.db.prepare(sql)?;
        let rows = match status_filter {
            Some(status) => stmt.query_map(params![status.as_str()], Self::row_to_task)?,
            None => stmt.query_map([], Self::row_to_task)?,
        };

        let tasks: Vec<Task> = rows.filter_map(|r| r.ok()).collect();
        self.attach_details(tasks)
    }

    /// List all tasks ordered by priority (high, medium, low), then by
    /// ascending due time.
    pub fn list_by_priority(&self) -> Result<Vec<Task>> {
        let mut stmt = self.db.prepare(
            r#"
            SELECT id, title, description, status, priority, start_at, due_at, created_at, updated_at
            FROM tasks
            ORDER BY CASE priority WHEN 'high' THEN 0 WHEN 'medium' THEN 1 ELSE 2 END, due_at ASC
            "#,
        )?;

        let tasks: Vec<Task> = stmt.query_map([], Self::row_to_task)?.filter_map(|r| r.ok()).collect();
        self.attach_details(tasks)
    }

    /// Tasks eligible for overdue marking: due before `now` and neither
    /// completed nor already overdue. Ordered by due time ascending.
    pub fn list_overdue_candidates(&self, now: &DateTime<Utc>) -> Result<Vec<Task>> {
        let mut stmt = self.db.prepare(
            r#"
            SELECT id, title, description, status, priority, start_at, due_at, created_at, updated_at
            FROM tasks
            WHERE due_at < ? AND status NOT IN ('completed', 'overdue')
            ORDER BY due_at ASC
            "#,
        )?;

        let tasks: Vec<Task> = stmt
            .query_map(params![now.to_rfc3339()], Self::row_to_task)?
            .filter_map(|r| r.ok())
            .collect();
        self.attach_details(tasks)
    }

    /// Tasks past their due time that are not completed. Unlike the marking
    /// query this includes tasks already marked overdue.
    pub fn list_overdue(&self, now: &DateTime<Utc>) -> Result<Vec<Task>> {
        let mut stmt = self.db.prepare(
            r#"
            SELECT id, title, description, status, priority, start_at, due_at, created_at, updated_at
            FROM tasks
            WHERE due_at < ? AND status != 'completed'
            ORDER BY due_at ASC
            "#,
        )?;

        let tasks: Vec<Task> = stmt
            .query_map(params![now.to_rfc3339()], Self::row_to_task)?
            .filter_map(|r| r.ok())
            .collect();
        self.attach_details(tasks)
    }

    /// Persist a task's current field values and dependency set. History is
    /// written separately through `append_history`. Returns false when no
    /// such task exists.
    pub fn update_task(&self, task: &Task) -> Result<bool> {
        let rows = self
            .db
            .execute(
                r#"
                UPDATE tasks
                SET title = ?, description = ?, status = ?, priority = ?, start_at = ?, due_at = ?, updated_at = ?
                WHERE id = ?
                "#,
                params![
                    task.title,
                    task.description,
                    task.status.as_str(),
                    task.priority.as_str(),
                    task.start_at.to_rfc3339(),
                    task.due_at.to_rfc3339(),
                    task.updated_at.to_rfc3339(),
                    task.id,
                ],
            )
            .context("Failed to update task")?;

        if rows == 0 {
            return Ok(false);
        }

        self.replace_deps(&task.id, task.dependency_ids())?;
        Ok(true)
    }

    /// Append one history entry after the task's existing ones.
    pub fn append_history(&self, id: &str, status: Status, at: &DateTime<Utc>) -> Result<()> {
        self.db
            .execute(
                r#"
                INSERT INTO task_history (task_id, seq, status, at)
                VALUES (?1, (SELECT COALESCE(MAX(seq) + 1, 0) FROM task_history WHERE task_id = ?1), ?2, ?3)
                "#,
                params![id, status.as_str(), at.to_rfc3339()],
            )
            .context("Failed to append history")?;
        Ok(())
    }

    /// Remove a task with its edges and history. Returns false when no such
    /// task exists.
    pub fn delete_task(&self, id: &str) -> Result<bool> {
        self.db
            .execute("DELETE FROM task_deps WHERE task_id = ?", params![id])?;
        self.db
            .execute("DELETE FROM task_history WHERE task_id = ?", params![id])?;
        let rows = self
            .db
            .execute("DELETE FROM tasks WHERE id = ?", params![id])
            .context("Failed to delete task")?;
        Ok(rows > 0)
    }

    /// Number of tasks whose dependency set includes `id`.
    pub fn count_dependents(&self, id: &str) -> Result<i64> {
        let count: i64 = self.db.query_row(
            "SELECT COUNT(*) FROM task_deps WHERE depends_on = ?",
            params![id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Whether a task row exists.
    pub fn task_exists(&self, id: &str) -> Result<bool> {
        let count: i64 = self.db.query_row(
            "SELECT COUNT(*) FROM tasks WHERE id = ?",
            params![id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Direct dependency ids of a task, without summary resolution.
    pub fn direct_dep_ids(&self, id: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .db
            .prepare("SELECT depends_on FROM task_deps WHERE task_id = ?")?;
        let ids: Vec<String> = stmt
            .query_map(params![id], |row| row.get(0))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(ids)
    }

    /// Replace the dependency edge set of a task.
    fn replace_deps<'a>(&self, id: &str, deps: impl Iterator<Item = &'a str>) -> Result<()> {
        self.db
            .execute("DELETE FROM task_deps WHERE task_id = ?", params![id])?;
        for dep in deps {
            self.db.execute(
                "INSERT OR IGNORE INTO task_deps (task_id, depends_on) VALUES (?, ?)",
                params![id, dep],
            )?;
        }
        Ok(())
    }

    /// Resolve a task's dependencies to (id, title, status) summaries.
    fn load_deps(&self, id: &str) -> Result<Vec<DependencySummary>> {
        let mut stmt = self.db.prepare(
            r#"
            SELECT d.depends_on, t.title, t.status
            FROM task_deps d
            JOIN tasks t ON t.id = d.depends_on
            WHERE d.task_id = ?
            ORDER BY d.depends_on
            "#,
        )?;

        let deps: Vec<DependencySummary> = stmt
            .query_map(params![id], |row| {
                let status_str: String = row.get(2)?;
                Ok(DependencySummary {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    status: status_str.parse().unwrap_or(Status::Pending),
                })
            })?
            .filter_map(|r| r.ok())
            .collect();

        Ok(deps)
    }

    /// Load a task's status timeline, oldest first.
    fn load_history(&self, id: &str) -> Result<Vec<HistoryEntry>> {
        let mut stmt = self
            .db
            .prepare("SELECT status, at FROM task_history WHERE task_id = ? ORDER BY seq ASC")?;

        let history: Vec<HistoryEntry> = stmt
            .query_map(params![id], |row| {
                let status_str: String = row.get(0)?;
                let at_str: String = row.get(1)?;
                Ok(HistoryEntry {
                    status: status_str.parse().unwrap_or(Status::Pending),
                    at: parse_ts(&at_str),
                })
            })?
            .filter_map(|r| r.ok())
            .collect();

        Ok(history)
    }

    /// Fill dependency summaries and history for each listed task.
    fn attach_details(&self, mut tasks: Vec<Task>) -> Result<Vec<Task>> {
        for task in &mut tasks {
            task.depends_on = self.load_deps(&task.id)?;
            task.history = self.load_history(&task.id)?;
        }
        Ok(tasks)
    }

    /// Convert a database row to a Task. Dependencies and history are
    /// attached afterwards.
    fn row_to_task(row: &rusqlite::Row) -> rusqlite::Result<Task> {
        let status_str: String = row.get(3)?;
        let priority_str: String = row.get(4)?;
        let start_at_str: String = row.get(5)?;
        let due_at_str: String = row.get(6)?;
        let created_at_str: String = row.get(7)?;
        let updated_at_str: String = row.get(8)?;

        Ok(Task {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            status: status_str.parse().unwrap_or(Status::Pending),
            priority: priority_str.parse().unwrap_or(Priority::Medium),
            start_at: parse_ts(&start_at_str),
            due_at: parse_ts(&due_at_str),
            depends_on: vec![],
            history: vec![],
            created_at: parse_ts(&created_at_str),
            updated_at: parse_ts(&updated_at_str),
        })
    }
}

/// Open a connection with WAL and a busy timeout, so the daemon and the
/// sweeper can write the same file without tripping over each other.
fn connect(db_path: &Path) -> Result<Connection> {
    let db = Connection::open(db_path).context("Failed to open SQLite database")?;
    db.busy_timeout(Duration::from_secs(5))
        .context("Failed to set busy timeout")?;
    let _mode: String = db
        .query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))
        .context("Failed to enable WAL")?;
    Ok(db)
}

/// Parse a stored RFC 3339 timestamp, falling back to now on corruption.
fn parse_ts(s: &str) -> DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
