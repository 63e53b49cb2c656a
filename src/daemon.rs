//! Background daemon serving the tether store over a Unix socket.
//!
//! The daemon provides:
//! - A single store owner (requests are handled one at a time)
//! - A shared read cache that survives across CLI invocations
//! - The periodic overdue sweeper

use crate::protocol::{Request, Response};
use crate::store::Store;
use crate::sweep::{self, DEFAULT_SWEEP_INTERVAL_SECS, Sweeper};
use crate::types::{NewTask, TaskPatch};
use eyre::{Context, Result};
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

/// Socket file name within the .tether directory.
const SOCKET_FILE: &str = "daemon.sock";

/// PID file name within the .tether directory.
const PID_FILE: &str = "daemon.pid";

/// Configuration for the daemon.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Root directory containing .tether
    pub root: PathBuf,

    /// Interval between overdue sweeps
    pub sweep_interval: Duration,
}

impl DaemonConfig {
    /// Create config with default settings.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
        }
    }

    /// Get the socket path.
    pub fn socket_path(&self) -> PathBuf {
        self.root.join(".tether").join(SOCKET_FILE)
    }

    /// Get the PID file path.
    pub fn pid_path(&self) -> PathBuf {
        self.root.join(".tether").join(PID_FILE)
    }
}

/// The tether daemon.
pub struct Daemon {
    config: DaemonConfig,
    store: Store,
    shutdown: Arc<AtomicBool>,
}

impl Daemon {
    /// Create a new daemon instance.
    pub fn new(config: DaemonConfig) -> Result<Self> {
        let store = Store::open(&config.root).context("Failed to open store")?;

        Ok(Self {
            config,
            store,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Get a shutdown handle that can be used to signal shutdown.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Run the daemon (blocking).
    pub async fn run(&mut self) -> Result<()> {
        // Clean up any stale socket
        let socket_path = self.config.socket_path();
        if socket_path.exists() {
            fs::remove_file(&socket_path).ok();
        }

        // Write PID file
        let pid_path = self.config.pid_path();
        fs::write(&pid_path, std::process::id().to_string()).context("Failed to write PID file")?;

        // Create Unix socket listener
        let listener = UnixListener::bind(&socket_path).context("Failed to bind to Unix socket")?;
        listener
            .set_nonblocking(true)
            .context("Failed to set socket to non-blocking")?;

        log::info!("Daemon listening on {:?}", socket_path);

        // Create channel for client requests
        let (tx, mut rx) = mpsc::channel::<(Request, mpsc::Sender<Response>)>(100);

        // Spawn connection acceptor task
        let shutdown_flag = Arc::clone(&self.shutdown);
        let tx_clone = tx.clone();
        tokio::spawn(async move {
            Self::accept_connections(listener, tx_clone, shutdown_flag).await;
        });

        // The sweeper runs on its own task with its own store handle, so a
        // sweep never stalls request handling
        let sweeper_store =
            Store::open(&self.config.root).context("Failed to open store for sweeper")?;
        let sweeper = tokio::spawn(Sweeper::new(sweeper_store, self.config.sweep_interval).run());

        // Main loop: requests are handled one at a time, so the store
        // stays single-owner
        while let Some((request, response_tx)) = rx.recv().await {
            let response = self.handle_request(request);
            let _ = response_tx.send(response).await;

            if self.shutdown.load(Ordering::Relaxed) {
                log::info!("Daemon shutting down");
                break;
            }
        }

        // Cleanup
        sweeper.abort();
        fs::remove_file(&socket_path).ok();
        fs::remove_file(&pid_path).ok();

        Ok(())
    }

    /// Accept connections in a background task. The listener is
    /// nonblocking so the loop can keep checking the shutdown flag.
    async fn accept_connections(
        listener: UnixListener,
        tx: mpsc::Sender<(Request, mpsc::Sender<Response>)>,
        shutdown: Arc<AtomicBool>,
    ) {
        while !shutdown.load(Ordering::Relaxed) {
            match listener.accept() {
                Ok((stream, _)) => {
                    let conn_tx = tx.clone();
                    tokio::spawn(async move {
                        if let Err(e) = Self::handle_connection(stream, conn_tx).await {
                            log::warn!("Connection error: {}", e);
                        }
                    });
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
                Err(e) => {
                    log::error!("Accept error: {}", e);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }

    /// Handle a single client connection: one JSON request per line, one
    /// JSON response per line, until the client hangs up.
    async fn handle_connection(stream: UnixStream, tx: mpsc::Sender<(Request, mpsc::Sender<Response>)>) -> Result<()> {
        // The accept loop needs a nonblocking listener, but reads on an
        // accepted connection should block until a full line arrives
        stream.set_nonblocking(false)?;

        let reader = BufReader::new(stream.try_clone()?);
        let mut writer = stream;

        for line in reader.lines() {
            let line = line.context("Failed to read line")?;
            if line.is_empty() {
                continue;
            }

            let request: Request = serde_json::from_str(&line).context("Failed to parse request")?;
            let is_shutdown = matches!(request, Request::Shutdown);

            let (resp_tx, mut resp_rx) = mpsc::channel(1);
            tx.send((request, resp_tx))
                .await
                .context("Failed to send request to daemon")?;

            let Some(response) = resp_rx.recv().await else {
                // Main loop dropped the request unanswered; it is exiting
                break;
            };
            writeln!(writer, "{}", serde_json::to_string(&response)?)?;
            writer.flush()?;

            if is_shutdown {
                break;
            }
        }

        Ok(())
    }

    /// Handle a single request.
    fn handle_request(&self, request: Request) -> Response {
        match request {
            Request::Create {
                title,
                description,
                priority,
                start_at,
                due_at,
                depends_on,
            } => {
                let new = NewTask {
                    title,
                    description,
                    priority,
                    start_at,
                    due_at,
                    depends_on,
                };
                match self.store.create(new) {
                    Ok(task) => Response::Task { task },
                    Err(e) => Response::error(e.to_string()),
                }
            }

            Request::Update {
                id,
                title,
                description,
                status,
                priority,
                start_at,
                due_at,
                depends_on,
            } => {
                let patch = TaskPatch {
                    title,
                    description,
                    status,
                    priority,
                    start_at,
                    due_at,
                    depends_on,
                };
                match self.store.update(&id, patch) {
                    Ok(task) => Response::Task { task },
                    Err(e) => Response::error(e.to_string()),
                }
            }

            Request::Get { id } => match self.store.get(&id) {
                Ok(Some(task)) => Response::Task { task },
                Ok(None) => Response::NotFound { id },
                Err(e) => Response::error(e.to_string()),
            },

            Request::List { status } => match self.store.list(status) {
                Ok(tasks) => Response::Tasks { tasks },
                Err(e) => Response::error(e.to_string()),
            },

            Request::Priority => match self.store.list_by_priority() {
                Ok(tasks) => Response::Tasks { tasks },
                Err(e) => Response::error(e.to_string()),
            },

            Request::Overdue => match self.store.list_overdue(self.store.now()) {
                Ok(tasks) => Response::Tasks { tasks },
                Err(e) => Response::error(e.to_string()),
            },

            Request::Delete { id } => match self.store.delete(&id) {
                Ok(()) => Response::Deleted { id },
                Err(e) => Response::error(e.to_string()),
            },

            Request::Sweep => match sweep::sweep_once(&self.store) {
                Ok(count) => Response::Swept { count },
                Err(e) => Response::error(e.to_string()),
            },

            Request::Shutdown => {
                self.shutdown.store(true, Ordering::Relaxed);
                Response::ShuttingDown
            }

            Request::Ping => Response::Pong,
        }
    }
}

/// Check if a daemon is running for the given store path.
pub fn is_daemon_running(root: &Path) -> bool {
    let config = DaemonConfig::new(root);
    let socket_path = config.socket_path();
    let pid_path = config.pid_path();

    if !socket_path.exists() {
        return false;
    }

    let alive = fs::read_to_string(&pid_path)
        .ok()
        .and_then(|s| s.trim().parse::<i32>().ok())
        .is_some_and(pid_alive);

    if !alive {
        // Leftovers from a daemon that died without cleaning up
        fs::remove_file(&socket_path).ok();
        fs::remove_file(&pid_path).ok();
    }

    alive
}

/// Signal 0 probes for process existence without delivering anything.
fn pid_alive(pid: i32) -> bool {
    unsafe { libc::kill(pid, 0) == 0 }
}

/// Start the daemon as a background process.
pub fn start_daemon(root: &Path) -> Result<()> {
    use std::process::Command;

    // Get the path to the current executable
    let exe = std::env::current_exe().context("Failed to get current executable")?;

    // Start daemon in background
    Command::new(exe)
        .args(["--dir", root.to_str().unwrap_or("."), "daemon"])
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .context("Failed to spawn daemon process")?;

    // Wait a bit for daemon to start
    std::thread::sleep(Duration::from_millis(100));

    Ok(())
}
