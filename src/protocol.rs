//! IPC protocol types for daemon communication.

use crate::types::{Priority, Status, Task};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Request sent from client to daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    /// Create a new task.
    Create {
        title: String,
        description: Option<String>,
        priority: Option<Priority>,
        start_at: DateTime<Utc>,
        due_at: DateTime<Utc>,
        depends_on: Vec<String>,
    },

    /// Update an existing task.
    Update {
        id: String,
        title: Option<String>,
        description: Option<String>,
        status: Option<Status>,
        priority: Option<Priority>,
        start_at: Option<DateTime<Utc>>,
        due_at: Option<DateTime<Utc>>,
        depends_on: Option<Vec<String>>,
    },

    /// Get a task by ID.
    Get { id: String },

    /// List tasks with optional status filter.
    List { status: Option<Status> },

    /// List tasks by priority, then ascending due time.
    Priority,

    /// List tasks past their due time and not completed.
    Overdue,

    /// Delete a task.
    Delete { id: String },

    /// Run an overdue sweep now.
    Sweep,

    /// Shutdown the daemon.
    Shutdown,

    /// Ping to check if daemon is alive.
    Ping,
}

/// Response sent from daemon to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    /// Single task response.
    Task { task: Task },

    /// Multiple tasks response.
    Tasks { tasks: Vec<Task> },

    /// Task not found.
    NotFound { id: String },

    /// Task was deleted.
    Deleted { id: String },

    /// Sweep finished; how many tasks it marked overdue.
    Swept { count: usize },

    /// Pong response to ping.
    Pong,

    /// Daemon is shutting down.
    ShuttingDown,

    /// Error response.
    Error { message: String },
}

impl Response {
    /// Create an error response.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}
