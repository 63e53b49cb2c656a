//! Tether CLI - A dependency-aware task tracker with an overdue sweeper.

use chrono::{DateTime, Utc};
use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tether::{
    Client, Daemon, DaemonConfig, NewTask, Priority, Status, Store, Task, TaskPatch,
    is_daemon_running, sweep_once,
};

mod cli;

use cli::{Cli, Command};

fn setup_logging() -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tether")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("tether.log");

    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

fn get_store_dir(cli: &Cli) -> PathBuf {
    cli.dir
        .clone()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

fn format_status(status: &Status) -> ColoredString {
    match status {
        Status::Pending => "pending".yellow(),
        Status::InProgress => "in_progress".blue(),
        Status::Completed => "completed".green(),
        Status::Overdue => "overdue".red(),
    }
}

fn format_priority(priority: &Priority) -> ColoredString {
    match priority {
        Priority::High => "high".red(),
        Priority::Medium => "medium".yellow(),
        Priority::Low => "low".dimmed(),
    }
}

fn parse_time(value: &str) -> Result<DateTime<Utc>> {
    let parsed = DateTime::parse_from_rfc3339(value).map_err(|e| {
        eyre::eyre!("Invalid time '{}': {} (expected RFC 3339, e.g. 2025-07-01T09:00:00Z)", value, e)
    })?;
    Ok(parsed.with_timezone(&Utc))
}

fn parse_status(value: &str) -> Result<Status> {
    value.parse::<Status>().map_err(|e| eyre::eyre!(e))
}

fn parse_priority(value: &str) -> Result<Priority> {
    value.parse::<Priority>().map_err(|e| eyre::eyre!(e))
}

fn print_task_line(task: &Task) {
    let deps = if task.depends_on.is_empty() {
        String::new()
    } else {
        format!(" deps[{}]", task.depends_on.iter().map(|d| d.id.as_str()).collect::<Vec<_>>().join(", "))
    };
    println!(
        "{} {} {} {} due {}{}{}",
        format_status(&task.status),
        task.id.cyan(),
        format_priority(&task.priority),
        task.title,
        task.due_at.format("%Y-%m-%d %H:%M").to_string().dimmed(),
        deps.dimmed(),
        task.description
            .as_ref()
            .map(|d| format!("\n    {}", d.dimmed()))
            .unwrap_or_default()
    );
}

fn run(cli: Cli) -> Result<()> {
    let store_dir = get_store_dir(&cli);

    match cli.command {
        Command::Init => {
            Store::init(&store_dir).context("Failed to initialize tether store")?;
            println!("{} Initialized tether store in {}", "✓".green(), store_dir.display());
        }

        Command::Add {
            title,
            priority,
            start,
            due,
            depends_on,
            description,
        } => {
            let store = Store::open(&store_dir).context("Failed to open store")?;

            let start_at = match start.as_deref() {
                Some(s) => parse_time(s)?,
                None => Utc::now(),
            };
            let due_at = match due.as_deref() {
                Some(s) => parse_time(s)?,
                None => start_at + chrono::Duration::days(1),
            };

            let task = store.create(NewTask {
                title,
                description,
                priority: Some(parse_priority(&priority)?),
                start_at,
                due_at,
                depends_on: depends_on.unwrap_or_default(),
            })?;

            println!(
                "{} Created: {} {} due {}",
                "✓".green(),
                task.id.cyan(),
                task.title,
                task.due_at.format("%Y-%m-%d %H:%M")
            );
        }

        Command::List { status } => {
            let store = Store::open(&store_dir).context("Failed to open store")?;
            let status_filter = match status.as_deref() {
                Some(s) => Some(parse_status(s)?),
                None => None,
            };

            let tasks = store.list(status_filter).context("Failed to list tasks")?;

            if tasks.is_empty() {
                println!("{}", "No tasks found".dimmed());
            } else {
                for task in tasks {
                    print_task_line(&task);
                }
            }
        }

        Command::Show { id } => {
            let store = Store::open(&store_dir).context("Failed to open store")?;
            let task = store.get(&id).context("Failed to get task")?;

            match task {
                Some(task) => {
                    println!("{}: {}", "ID".bold(), task.id.cyan());
                    println!("{}: {}", "Title".bold(), task.title);
                    println!("{}: {}", "Status".bold(), format_status(&task.status));
                    println!("{}: {}", "Priority".bold(), format_priority(&task.priority));
                    if let Some(desc) = &task.description {
                        println!("{}: {}", "Description".bold(), desc);
                    }
                    println!("{}: {}", "Start".bold(), task.start_at.to_rfc3339());
                    println!("{}: {}", "Due".bold(), task.due_at.to_rfc3339());
                    println!("{}: {}", "Created".bold(), task.created_at.to_rfc3339());
                    println!("{}: {}", "Updated".bold(), task.updated_at.to_rfc3339());
                    if !task.depends_on.is_empty() {
                        println!("{}:", "Depends on".bold());
                        for dep in &task.depends_on {
                            println!("  {} {} {}", dep.id.cyan(), format_status(&dep.status), dep.title);
                        }
                    }
                    println!("{}:", "History".bold());
                    for entry in &task.history {
                        println!(
                            "  {} {}",
                            entry.at.format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
                            format_status(&entry.status)
                        );
                    }
                }
                None => {
                    eprintln!("{} Task not found: {}", "✗".red(), id);
                    std::process::exit(1);
                }
            }
        }

        Command::Update {
            id,
            title,
            description,
            status,
            priority,
            start,
            due,
            depends_on,
        } => {
            let store = Store::open(&store_dir).context("Failed to open store")?;

            let patch = TaskPatch {
                title,
                description,
                status: status.as_deref().map(parse_status).transpose()?,
                priority: priority.as_deref().map(parse_priority).transpose()?,
                start_at: start.as_deref().map(parse_time).transpose()?,
                due_at: due.as_deref().map(parse_time).transpose()?,
                depends_on,
            };

            if patch.is_empty() {
                eprintln!("{} Nothing to update: pass at least one field", "✗".red());
                std::process::exit(1);
            }

            let task = store.update(&id, patch)?;
            println!(
                "{} Updated: {} {} ({})",
                "✓".green(),
                task.id.cyan(),
                task.title,
                format_status(&task.status)
            );
        }

        Command::Start { id } => {
            let store = Store::open(&store_dir).context("Failed to open store")?;
            let task = store.update(
                &id,
                TaskPatch { status: Some(Status::InProgress), ..Default::default() },
            )?;

            println!("{} Started: {} {}", "→".blue(), task.id.cyan(), task.title);
        }

        Command::Done { id } => {
            let store = Store::open(&store_dir).context("Failed to open store")?;
            let task = store.update(
                &id,
                TaskPatch { status: Some(Status::Completed), ..Default::default() },
            )?;

            println!("{} Completed: {} {}", "✓".green(), task.id.cyan(), task.title);
        }

        Command::Rm { id } => {
            let store = Store::open(&store_dir).context("Failed to open store")?;
            store.delete(&id)?;

            println!("{} Deleted: {}", "✓".green(), id.cyan());
        }

        Command::Priority => {
            let store = Store::open(&store_dir).context("Failed to open store")?;
            let tasks = store.list_by_priority().context("Failed to list tasks")?;

            if tasks.is_empty() {
                println!("{}", "No tasks found".dimmed());
            } else {
                for task in tasks {
                    print_task_line(&task);
                }
            }
        }

        Command::Overdue => {
            let store = Store::open(&store_dir).context("Failed to open store")?;
            let tasks = store.list_overdue(store.now()).context("Failed to list overdue tasks")?;

            if tasks.is_empty() {
                println!("{}", "Nothing past due".dimmed());
            } else {
                println!("{} {} task(s) past due:", "⚠".red(), tasks.len());
                for task in tasks {
                    print_task_line(&task);
                }
            }
        }

        Command::Sweep => {
            let store = Store::open(&store_dir).context("Failed to open store")?;
            let count = sweep_once(&store)?;

            if count == 0 {
                println!("{}", "Nothing past due".dimmed());
            } else {
                println!("{} Marked {} task(s) overdue", "✓".green(), count);
            }
        }

        Command::Daemon { sweep_interval } => {
            println!("{} Starting daemon for {}", "→".blue(), store_dir.display());

            let mut config = DaemonConfig::new(&store_dir);
            config.sweep_interval = Duration::from_secs(sweep_interval);
            let mut daemon = Daemon::new(config).context("Failed to create daemon")?;

            // Run daemon in async runtime
            let rt = tokio::runtime::Runtime::new().context("Failed to create runtime")?;
            rt.block_on(async { daemon.run().await }).context("Daemon error")?;
        }

        Command::DaemonStop => {
            if !is_daemon_running(&store_dir) {
                println!("{} Daemon is not running", "✗".red());
                std::process::exit(1);
            }

            let mut client = Client::connect(&store_dir, false).context("Failed to connect to daemon")?;
            client.shutdown().context("Failed to shutdown daemon")?;
            println!("{} Daemon stopped", "✓".green());
        }

        Command::DaemonStatus => {
            if is_daemon_running(&store_dir) {
                println!("{} Daemon is running", "✓".green());

                // Try to ping
                if let Ok(mut client) = Client::connect(&store_dir, false)
                    && client.ping().is_ok()
                {
                    println!("  {} Responding to requests", "✓".green());
                }
            } else {
                println!("{} Daemon is not running", "✗".red());
            }
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    setup_logging().context("Failed to setup logging")?;

    let cli = Cli::parse();
    info!("Command: {:?}", std::env::args().collect::<Vec<_>>());

    if let Err(e) = run(cli) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}
