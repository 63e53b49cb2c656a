//! Client for connecting to the tether daemon.

use crate::daemon::{DaemonConfig, is_daemon_running, start_daemon};
use crate::protocol::{Request, Response};
use crate::types::{NewTask, Status, Task, TaskPatch};
use eyre::{Context, Result, bail};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Client for communicating with the tether daemon.
pub struct Client {
    root: PathBuf,
    stream: UnixStream,
}

impl Client {
    /// Connect to the daemon, optionally auto-starting it if not running.
    pub fn connect(root: &Path, auto_start: bool) -> Result<Self> {
        let config = DaemonConfig::new(root);
        let socket_path = config.socket_path();

        let stream = match UnixStream::connect(&socket_path) {
            Ok(stream) => stream,
            Err(_) if auto_start => {
                if !is_daemon_running(root) {
                    start_daemon(root).context("Failed to auto-start daemon")?;
                }
                // Covers both the fresh start and a daemon that is alive
                // but had not bound its socket when we first tried
                Self::await_socket(&socket_path)?
            }
            Err(e) => {
                bail!("Failed to connect to daemon: {}. Is it running?", e);
            }
        };

        stream
            .set_read_timeout(Some(Duration::from_secs(30)))
            .context("Failed to set read timeout")?;

        Ok(Self {
            root: root.to_path_buf(),
            stream,
        })
    }

    /// Poll the socket until the daemon answers or the budget runs out.
    fn await_socket(socket_path: &Path) -> Result<UnixStream> {
        for _ in 0..20 {
            std::thread::sleep(Duration::from_millis(50));
            if let Ok(stream) = UnixStream::connect(socket_path) {
                return Ok(stream);
            }
        }
        bail!("Daemon failed to start in time")
    }

    /// Get the store root path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Send a request and receive a response.
    fn request(&mut self, request: Request) -> Result<Response> {
        let request_json = serde_json::to_string(&request)?;
        writeln!(self.stream, "{}", request_json)?;
        self.stream.flush()?;

        let mut reader = BufReader::new(&self.stream);
        let mut response_line = String::new();
        reader.read_line(&mut response_line)?;

        let response: Response = serde_json::from_str(&response_line)?;
        Ok(response)
    }

    /// Create a new task.
    pub fn create(&mut self, new: NewTask) -> Result<Task> {
        let response = self.request(Request::Create {
            title: new.title,
            description: new.description,
            priority: new.priority,
            start_at: new.start_at,
            due_at: new.due_at,
            depends_on: new.depends_on,
        })?;

        match response {
            Response::Task { task } => Ok(task),
            Response::Error { message } => bail!("{}", message),
            other => bail!("Unexpected response: {:?}", other),
        }
    }

    /// Update an existing task.
    pub fn update(&mut self, id: &str, patch: TaskPatch) -> Result<Task> {
        let response = self.request(Request::Update {
            id: id.to_string(),
            title: patch.title,
            description: patch.description,
            status: patch.status,
            priority: patch.priority,
            start_at: patch.start_at,
            due_at: patch.due_at,
            depends_on: patch.depends_on,
        })?;

        match response {
            Response::Task { task } => Ok(task),
            Response::Error { message } => bail!("{}", message),
            other => bail!("Unexpected response: {:?}", other),
        }
    }

    /// Get a task by ID.
    pub fn get(&mut self, id: &str) -> Result<Option<Task>> {
        let response = self.request(Request::Get { id: id.to_string() })?;

        match response {
            Response::Task { task } => Ok(Some(task)),
            Response::NotFound { .. } => Ok(None),
            Response::Error { message } => bail!("{}", message),
            other => bail!("Unexpected response: {:?}", other),
        }
    }

    /// List tasks with optional status filter.
    pub fn list(&mut self, status: Option<Status>) -> Result<Vec<Task>> {
        let response = self.request(Request::List { status })?;

        match response {
            Response::Tasks { tasks } => Ok(tasks),
            Response::Error { message } => bail!("{}", message),
            other => bail!("Unexpected response: {:?}", other),
        }
    }

    /// List tasks by priority, then ascending due time.
    pub fn priority(&mut self) -> Result<Vec<Task>> {
        let response = self.request(Request::Priority)?;

        match response {
            Response::Tasks { tasks } => Ok(tasks),
            Response::Error { message } => bail!("{}", message),
            other => bail!("Unexpected response: {:?}", other),
        }
    }

    /// List tasks past their due time and not completed.
    pub fn overdue(&mut self) -> Result<Vec<Task>> {
        let response = self.request(Request::Overdue)?;

        match response {
            Response::Tasks { tasks } => Ok(tasks),
            Response::Error { message } => bail!("{}", message),
            other => bail!("Unexpected response: {:?}", other),
        }
    }

    /// Delete a task.
    pub fn delete(&mut self, id: &str) -> Result<()> {
        let response = self.request(Request::Delete { id: id.to_string() })?;

        match response {
            Response::Deleted { .. } => Ok(()),
            Response::Error { message } => bail!("{}", message),
            other => bail!("Unexpected response: {:?}", other),
        }
    }

    /// Run an overdue sweep now.
    pub fn sweep(&mut self) -> Result<usize> {
        let response = self.request(Request::Sweep)?;

        match response {
            Response::Swept { count } => Ok(count),
            Response::Error { message } => bail!("{}", message),
            other => bail!("Unexpected response: {:?}", other),
        }
    }

    /// Shutdown the daemon.
    pub fn shutdown(&mut self) -> Result<()> {
        let response = self.request(Request::Shutdown)?;

        match response {
            Response::ShuttingDown => Ok(()),
            Response::Error { message } => bail!("{}", message),
            other => bail!("Unexpected response: {:?}", other),
        }
    }

    /// Ping the daemon.
    pub fn ping(&mut self) -> Result<()> {
        let response = self.request(Request::Ping)?;

        match response {
            Response::Pong => Ok(()),
            Response::Error { message } => bail!("{}", message),
            other => bail!("Unexpected response: {:?}", other),
        }
    }
}
