//! Tether: a dependency-aware task tracker library.
//!
//! Tether keeps tasks in SQLite with a cached read path, gates forward
//! progress on task dependencies, and sweeps tasks past their due time
//! into `overdue` on a fixed cadence.
//!
//! # Example
//!
//! ```no_run
//! use tether::{NewTask, Status, Store, TaskPatch};
//! use chrono::{Duration, Utc};
//! use std::path::Path;
//!
//! // Initialize a new store
//! let store = Store::init(Path::new(".")).unwrap();
//!
//! // Create two tasks, the second depending on the first
//! let now = Utc::now();
//! let build = store.create(NewTask {
//!     title: "Build the image".to_string(),
//!     description: None,
//!     priority: None,
//!     start_at: now,
//!     due_at: now + Duration::days(1),
//!     depends_on: vec![],
//! }).unwrap();
//! let deploy = store.create(NewTask {
//!     title: "Deploy to staging".to_string(),
//!     description: None,
//!     priority: None,
//!     start_at: now,
//!     due_at: now + Duration::days(2),
//!     depends_on: vec![build.id.clone()],
//! }).unwrap();
//!
//! // Deploy cannot start until the build completes
//! assert!(!store.can_start(&deploy.id).unwrap());
//! store.update(&build.id, TaskPatch {
//!     status: Some(Status::Completed),
//!     ..Default::default()
//! }).unwrap();
//! assert!(store.can_start(&deploy.id).unwrap());
//! ```

mod cache;
mod clock;
mod id;
mod storage;
mod store;
mod types;

pub mod client;
pub mod daemon;
pub mod notify;
pub mod protocol;
pub mod sweep;

// Re-export public API
pub use cache::TtlCache;
pub use clock::{Clock, ManualClock, SystemClock};
pub use client::Client;
pub use daemon::{Daemon, DaemonConfig, is_daemon_running, start_daemon};
pub use notify::{LogNotifier, Notifier, NullNotifier, TaskEvent};
pub use protocol::{Request, Response};
pub use store::{Store, StoreError};
pub use sweep::{Sweeper, sweep_once};
pub use types::{
    DependencySummary, HistoryEntry, NewTask, Priority, Status, Task, TaskPatch, ValidationError,
};
