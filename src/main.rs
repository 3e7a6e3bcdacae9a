//! Taskboard - operator binary
//!
//! Exercises the sync and workflow library against the in-memory backends.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;
use taskboard_sync::sync::{log_channel_errors, presets};
use taskboard_sync::workflow::{
    CreateTaskRequest, DependencyScheduler, GanttTaskData, Project, TaskId, TaskPatch, TaskStatus,
};
use taskboard_sync::{Config, DashboardState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "taskboard")]
#[command(about = "Task board sync and scheduling tools")]
struct Cli {
    /// Path to config.yaml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a burst of writes and report the invalidations that fired
    Simulate {
        /// Tasks created on the board before the burst
        #[arg(short, long, default_value = "3")]
        tasks: usize,

        /// Status updates in the burst
        #[arg(short, long, default_value = "20")]
        burst: usize,

        /// Gap between writes in the burst, in milliseconds
        #[arg(short, long, default_value = "10")]
        spacing_ms: u64,
    },

    /// Compute a Gantt schedule from a YAML or JSON task list
    Schedule {
        /// File with a `tasks` list of {name, start_date, duration_days, depends_on}
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,taskboard_sync=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::from_yaml_and_env(cli.config.as_deref())?;

    match cli.command {
        Commands::Simulate {
            tasks,
            burst,
            spacing_ms,
        } => run_simulate(config, tasks, burst, Duration::from_millis(spacing_ms)).await,
        Commands::Schedule { file } => run_schedule(&file),
    }
}

#[derive(Debug, Serialize)]
struct SimulationReport {
    writes: usize,
    invalidations: BTreeMap<String, usize>,
}

async fn run_simulate(config: Config, tasks: usize, burst: usize, spacing: Duration) -> Result<()> {
    let settle = config.debounce.max(config.dashboard_debounce) * 2;
    let state = DashboardState::in_memory(config, log_channel_errors());
    let mut signals = state.cache.subscribe();

    let project = Project::new("Simulation");
    state.store.create_project(&project).await?;
    state.open_board(project.id).await?;
    state.open_dashboard().await;

    let mut writes = 1;
    let mut created = Vec::with_capacity(tasks);
    for i in 0..tasks {
        let task = state
            .workflow
            .create_task(CreateTaskRequest::new(project.id, format!("Task {}", i + 1)))
            .await?;
        created.push(task.id);
        writes += 1;
    }
    tokio::time::sleep(settle).await;

    let statuses = TaskStatus::ALL;
    for (i, task_id) in created.iter().cycle().take(burst).enumerate() {
        state
            .workflow
            .update_task(*task_id, &TaskPatch::status(statuses[i % statuses.len()]))
            .await?;
        writes += 1;
        tokio::time::sleep(spacing).await;
    }
    tokio::time::sleep(settle).await;

    let mut invalidations: BTreeMap<String, usize> = BTreeMap::new();
    while let Ok(signal) = signals.try_recv() {
        *invalidations.entry(signal.key.to_string()).or_default() += 1;
    }

    let report = SimulationReport {
        writes,
        invalidations,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    tracing::info!(
        board = %presets::board_key(project.id),
        "Simulation complete"
    );
    state.logout().await;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct ScheduleFile {
    tasks: Vec<ScheduleTask>,
}

#[derive(Debug, Deserialize)]
struct ScheduleTask {
    name: String,
    start_date: Option<NaiveDate>,
    duration_days: Option<u32>,
    #[serde(default)]
    depends_on: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ScheduledTask {
    name: String,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    derived: bool,
}

/// Stable id per task name
fn task_id(name: &str) -> TaskId {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
}

fn run_schedule(path: &Path) -> Result<()> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    // YAML is a superset of JSON
    let file: ScheduleFile = serde_yaml::from_str(&contents)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    let names: HashMap<TaskId, String> = file
        .tasks
        .iter()
        .map(|t| (task_id(&t.name), t.name.clone()))
        .collect();

    let rows = file.tasks.iter().map(|t| GanttTaskData {
        task_id: task_id(&t.name),
        start_date: t.start_date,
        duration_days: t.duration_days,
        dependencies: t.depends_on.iter().map(|d| task_id(d)).collect(),
    });
    let schedule = DependencyScheduler::new(rows).schedule();

    for id in &schedule.cycles {
        let name = names.get(id).map(String::as_str).unwrap_or("?");
        tracing::warn!(task = %name, "Dependency cycle");
    }

    let order: HashMap<&str, usize> = file
        .tasks
        .iter()
        .enumerate()
        .map(|(i, t)| (t.name.as_str(), i))
        .collect();
    let mut scheduled: Vec<ScheduledTask> = schedule
        .entries
        .into_iter()
        .filter_map(|entry| {
            names.get(&entry.task_id).map(|name| ScheduledTask {
                name: name.clone(),
                start_date: entry.start_date,
                end_date: entry.end_date,
                derived: entry.derived,
            })
        })
        .collect();
    scheduled.sort_by_key(|t| order.get(t.name.as_str()).copied().unwrap_or(usize::MAX));

    println!("{}", serde_json::to_string_pretty(&scheduled)?);
    Ok(())
}
