use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::lock::write_atomic;
use crate::model::{parse_timestamp, Goal, GoalStatus, Item, Status};

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("History IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to serialize history: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub tasks_done: u64,
    #[serde(default)]
    pub tasks_total: u64,
    #[serde(default)]
    pub progress: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalSnapshot {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub target_date: Option<String>,
    #[serde(default)]
    pub status: GoalStatus,
}

/// One persisted record per pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub timestamp: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub commits: u64,
    #[serde(default)]
    pub tasks_completed: u64,
    #[serde(default)]
    pub tasks_started: u64,
    #[serde(default)]
    pub tasks_created: u64,
    #[serde(default)]
    pub total_active_tasks: u64,
    #[serde(default)]
    pub project_snapshots: BTreeMap<String, ProjectSnapshot>,
    #[serde(default)]
    pub goal_snapshots: BTreeMap<String, GoalSnapshot>,
}

impl RunSnapshot {
    pub fn recorded_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.timestamp)
    }
}

/// Append-only sequence of run snapshots, persisted as one JSON document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VelocityHistory {
    #[serde(default)]
    pub runs: Vec<RunSnapshot>,
}

/// What actually happened during this run, for the snapshot record.
pub struct RunActivity<'a> {
    pub source: &'a str,
    pub commits: u64,
    pub completed_ids: &'a HashSet<String>,
    pub started_ids: &'a HashSet<String>,
    pub created_count: u64,
}

impl VelocityHistory {
    /// Append one snapshot capturing the current shape of every open
    /// project and every goal, independent of whether this run detected
    /// any changes.
    pub fn record(
        &mut self,
        activity: &RunActivity<'_>,
        items: &[Item],
        goals: &[Goal],
        now: DateTime<Utc>,
    ) {
        let mut project_snapshots = BTreeMap::new();
        for project in items.iter().filter(|i| i.is_project()) {
            if project.status.is_terminal() {
                continue;
            }
            let children: Vec<&Item> = items
                .iter()
                .filter(|c| !c.is_project() && c.upstream.contains(&project.id))
                .collect();
            let total = children.len() as u64;
            let done = children
                .iter()
                .filter(|c| {
                    c.status == Status::Complete || activity.completed_ids.contains(&c.id)
                })
                .count() as u64;
            project_snapshots.insert(
                project.id.clone(),
                ProjectSnapshot {
                    name: project.name.clone(),
                    status: project.status,
                    tasks_done: done,
                    tasks_total: total,
                    progress: if total > 0 {
                        done as f64 / total as f64
                    } else {
                        0.0
                    },
                },
            );
        }

        let mut goal_snapshots = BTreeMap::new();
        for goal in goals {
            goal_snapshots.insert(
                goal.id.clone(),
                GoalSnapshot {
                    name: goal.name.clone(),
                    progress: goal.progress,
                    target_date: goal.target_date.clone(),
                    status: goal.status,
                },
            );
        }

        self.runs.push(RunSnapshot {
            timestamp: now.to_rfc3339(),
            source: activity.source.to_string(),
            commits: activity.commits,
            tasks_completed: activity.completed_ids.len() as u64,
            tasks_started: activity.started_ids.len() as u64,
            tasks_created: activity.created_count,
            total_active_tasks: items.iter().filter(|i| !i.is_project()).count() as u64,
            project_snapshots,
            goal_snapshots,
        });
    }

    /// Runs inside the trailing window, oldest order preserved. Snapshots
    /// without a parseable timestamp never qualify.
    pub fn runs_within(&self, days: i64, now: DateTime<Utc>) -> Vec<&RunSnapshot> {
        let cutoff = now - Duration::days(days);
        self.runs
            .iter()
            .filter(|r| r.recorded_at().map(|t| t > cutoff).unwrap_or(false))
            .collect()
    }

    /// Drop everything older than the retention window, measured against
    /// the clock at save time.
    pub fn trim(&mut self, retention_days: i64, now: DateTime<Utc>) {
        let cutoff = now - Duration::days(retention_days);
        self.runs
            .retain(|r| r.recorded_at().map(|t| t > cutoff).unwrap_or(false));
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Velocity {
    pub tasks_per_day: f64,
    pub commits_per_day: f64,
    pub data_points: usize,
    pub days_covered: f64,
}

/// Completion and commit rates over the trailing window.
///
/// The denominator is the real elapsed time between the earliest and latest
/// retained run, floored at one day, so sparse data cannot inflate the rate.
pub fn calculate_velocity(history: &VelocityHistory, days: i64, now: DateTime<Utc>) -> Velocity {
    let recent = history.runs_within(days, now);
    if recent.is_empty() {
        return Velocity::default();
    }

    let total_tasks: u64 = recent.iter().map(|r| r.tasks_completed).sum();
    let total_commits: u64 = recent.iter().map(|r| r.commits).sum();

    let stamps: Vec<DateTime<Utc>> = recent.iter().filter_map(|r| r.recorded_at()).collect();
    let days_covered = match (stamps.iter().min(), stamps.iter().max()) {
        (Some(first), Some(last)) => {
            ((*last - *first).num_seconds() as f64 / 86_400.0).max(1.0)
        }
        _ => days as f64,
    };

    Velocity {
        tasks_per_day: total_tasks as f64 / days_covered,
        commits_per_day: total_commits as f64 / days_covered,
        data_points: recent.len(),
        days_covered: (days_covered * 10.0).round() / 10.0,
    }
}

/// Handle on the persisted history document; pure value in, pure value out,
/// so the propagation and prediction logic stays testable without the
/// filesystem.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        HistoryStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing or corrupt documents yield an empty history. The store is
    /// best-effort trend data, not a system of record; the right recovery
    /// is to start fresh.
    pub fn load(&self) -> VelocityHistory {
        match fs::read_to_string(&self.path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_default(),
            Err(_) => VelocityHistory::default(),
        }
    }

    /// Trim to the retention window, then rewrite the whole document
    /// atomically.
    pub fn save(
        &self,
        history: &mut VelocityHistory,
        retention_days: i64,
        now: DateTime<Utc>,
    ) -> Result<(), HistoryError> {
        history.trim(retention_days, now);
        let raw = serde_json::to_vec_pretty(history)?;
        write_atomic(&self.path, &raw)?;
        Ok(())
    }
}
