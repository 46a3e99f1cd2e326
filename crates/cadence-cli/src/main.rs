use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{CommandFactory, Parser, Subcommand};
use serde_json::json;
use tracing::info;

use cadence_core::config::{load_tuning, Tuning};
use cadence_core::deadline::check_deadlines;
use cadence_core::history::{calculate_velocity, HistoryStore, RunActivity};
use cadence_core::lock::RunLock;
use cadence_core::model::{Goal, Item};
use cadence_core::predict::predict_deliveries;
use cadence_core::rollup::{propagate_to_goals, propagate_to_projects};

#[derive(Parser)]
#[command(name = "cadence", version, about = "Weighted progress rollups and delivery predictions")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full pipeline: rollups, alerts, snapshot, predictions
    Run {
        /// JSON file with the task/project list
        #[arg(long)]
        items: PathBuf,
        /// JSON file with the goal list
        #[arg(long)]
        goals: PathBuf,
        /// Comma-separated ids completed during this run
        #[arg(long)]
        completed: Option<String>,
        /// Comma-separated ids started during this run
        #[arg(long)]
        started: Option<String>,
        /// Commits observed during this run
        #[arg(long, default_value_t = 0)]
        commits: u64,
        /// Tasks created during this run
        #[arg(long, default_value_t = 0)]
        created: u64,
        /// What triggered this run (cron, hook, manual)
        #[arg(long, default_value = "cron")]
        source: String,
        /// Velocity history document
        #[arg(long, default_value = "velocity_history.json")]
        history: PathBuf,
        /// Optional tuning file (TOML)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print velocity metrics for a trailing window
    Velocity {
        #[arg(long, default_value = "velocity_history.json")]
        history: PathBuf,
        #[arg(long, default_value_t = 14)]
        days: i64,
    },
    /// Print version information
    Version,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Some(Command::Run {
            items,
            goals,
            completed,
            started,
            commits,
            created,
            source,
            history,
            config,
        }) => run_pipeline(
            &items, &goals, completed, started, commits, created, &source, &history, config,
        ),
        Some(Command::Velocity { history, days }) => {
            let store = HistoryStore::new(history);
            let velocity = calculate_velocity(&store.load(), days, Utc::now());
            println!("{}", serde_json::to_string_pretty(&velocity)?);
            Ok(())
        }
        Some(Command::Version) => {
            println!("cadence {}", cadence_core::version());
            Ok(())
        }
        None => {
            Cli::command().print_help()?;
            println!();
            Ok(())
        }
    }
}

fn id_set(raw: Option<String>) -> HashSet<String> {
    raw.map(|s| {
        s.split(',')
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

fn load_entities<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> Result<Vec<T>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading {} from {}", what, path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {} from {}", what, path.display()))
}

#[allow(clippy::too_many_arguments)]
fn run_pipeline(
    items_path: &Path,
    goals_path: &Path,
    completed: Option<String>,
    started: Option<String>,
    commits: u64,
    created: u64,
    source: &str,
    history_path: &Path,
    config: Option<PathBuf>,
) -> Result<()> {
    let lock_path = PathBuf::from(format!("{}.lock", history_path.display()));
    let Some(_lock) = RunLock::try_acquire(&lock_path)? else {
        // Another run owns the history file; bail out cleanly, do not queue.
        info!("another run holds the lock, skipping");
        println!("{}", serde_json::to_string_pretty(&json!({"skipped": "locked"}))?);
        return Ok(());
    };

    let tuning = match config {
        Some(path) => load_tuning(&path)?,
        None => Tuning::default(),
    };

    let items: Vec<Item> = load_entities(items_path, "items")?;
    let goals: Vec<Goal> = load_entities(goals_path, "goals")?;
    let completed_ids = id_set(completed);
    let started_ids = id_set(started);
    info!(
        items = items.len(),
        goals = goals.len(),
        completed = completed_ids.len(),
        started = started_ids.len(),
        "pipeline start"
    );

    let now = Utc::now();
    let today = now.date_naive();

    let project_updates = propagate_to_projects(&items, &completed_ids, &started_ids, &tuning);
    info!(count = project_updates.len(), "project updates");

    let goal_updates = propagate_to_goals(&items, &goals, &project_updates, &tuning);
    info!(count = goal_updates.len(), "goal updates");

    let deadline_alerts = check_deadlines(&items, &goals, today, &tuning);
    info!(count = deadline_alerts.len(), "deadline alerts");

    let store = HistoryStore::new(history_path);
    let mut history = store.load();
    history.record(
        &RunActivity {
            source,
            commits,
            completed_ids: &completed_ids,
            started_ids: &started_ids,
            created_count: created,
        },
        &items,
        &goals,
        now,
    );
    store.save(&mut history, tuning.retention_days, now)?;
    info!(runs = history.runs.len(), "velocity snapshot saved");

    let velocity = calculate_velocity(&history, 14, now);
    let predictions =
        predict_deliveries(&history, &items, &goals, &completed_ids, today, now, &tuning);
    info!(count = predictions.len(), "predictions");

    let report = json!({
        "source": source,
        "commits": commits,
        "project_updates": project_updates,
        "goal_updates": goal_updates,
        "deadline_alerts": deadline_alerts,
        "velocity": velocity,
        "predictions": predictions,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
