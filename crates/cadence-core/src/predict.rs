use std::collections::HashSet;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::config::Tuning;
use crate::history::{calculate_velocity, Velocity, VelocityHistory};
use crate::model::{Goal, Item, Status};

/// Velocity window candidates, preferred order: densest recent signal
/// first, degrading gracefully to wider windows.
const WINDOW_PREFERENCES: [(i64, usize, &str); 3] = [(14, 3, "14j"), (7, 2, "7j"), (30, 2, "30j")];

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionKind {
    Project,
    Goal,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum PredictionStatus {
    #[serde(rename = "EN AVANCE")]
    Ahead,
    #[serde(rename = "SERRE")]
    Tight,
    #[serde(rename = "EN RETARD")]
    Late,
    #[serde(rename = "BLOQUE")]
    Blocked,
    #[serde(rename = "PAS DE DEADLINE")]
    NoDeadline,
    #[serde(rename = "PAS ASSEZ DE DONNEES")]
    NotEnoughData,
}

#[derive(Debug, Clone, Serialize)]
pub struct Prediction {
    pub name: String,
    pub kind: PredictionKind,
    pub status: PredictionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub done: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tasks_per_day: Option<f64>,
    /// Current progress as a percentage, goals only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_per_day: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_needed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predicted_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub velocity_window: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline_source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_left: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_over: Option<f64>,
}

impl Prediction {
    fn new(name: &str, kind: PredictionKind, status: PredictionStatus) -> Self {
        Prediction {
            name: name.to_string(),
            kind,
            status,
            done: None,
            remaining: None,
            total: None,
            tasks_per_day: None,
            progress: None,
            progress_per_day: None,
            days_needed: None,
            predicted_date: None,
            velocity_window: None,
            deadline: None,
            deadline_source: None,
            days_left: None,
            days_over: None,
        }
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Advance `today` by a fractional day count, or `None` when the result falls
/// outside the representable calendar (tiny velocities push it out by eons).
fn project_forward(today: NaiveDate, days: f64) -> Option<NaiveDate> {
    Duration::try_days(days as i64).and_then(|d| today.checked_add_signed(d))
}

/// Pick the best-supported velocity window, or `None` when no window has
/// enough data points. No window means no predictions: insufficient history
/// is explicitly not guessed around.
pub fn select_velocity(
    history: &VelocityHistory,
    now: DateTime<Utc>,
) -> Option<(Velocity, &'static str)> {
    for (days, min_points, label) in WINDOW_PREFERENCES {
        let v = calculate_velocity(history, days, now);
        if v.data_points >= min_points {
            return Some((v, label));
        }
    }
    None
}

/// Linear delivery projections for open projects and goals against recent
/// velocity.
pub fn predict_deliveries(
    history: &VelocityHistory,
    items: &[Item],
    goals: &[Goal],
    completed_ids: &HashSet<String>,
    today: NaiveDate,
    now: DateTime<Utc>,
    tuning: &Tuning,
) -> Vec<Prediction> {
    let Some((velocity, window_label)) = select_velocity(history, now) else {
        return Vec::new();
    };
    let tasks_per_day = velocity.tasks_per_day;

    let mut predictions = Vec::new();

    for project in items.iter().filter(|i| i.is_project()) {
        if project.status.is_terminal() {
            continue;
        }
        let children: Vec<&Item> = items
            .iter()
            .filter(|c| !c.is_project() && c.upstream.contains(&project.id))
            .collect();
        if children.is_empty() {
            continue;
        }

        let total = children.len() as u64;
        let remaining = children
            .iter()
            .filter(|c| c.status != Status::Complete && !completed_ids.contains(&c.id))
            .count() as u64;
        if remaining == 0 {
            continue;
        }

        // Effective deadline: the project's own due date, tightened (never
        // relaxed) by the earliest target among goals it contributes to.
        let mut deadline = project.due();
        let mut deadline_source = deadline.map(|_| "project".to_string());
        for goal in goals {
            if !project.goals.contains(&goal.id) {
                continue;
            }
            if let Some(target) = goal.target() {
                if deadline.map(|d| target < d).unwrap_or(true) {
                    deadline = Some(target);
                    deadline_source = Some(goal.name.clone());
                }
            }
        }

        let mut pred = Prediction::new(&project.name, PredictionKind::Project, PredictionStatus::NoDeadline);
        pred.done = Some(total - remaining);
        pred.remaining = Some(remaining);
        pred.total = Some(total);
        pred.tasks_per_day = Some(round2(tasks_per_day));
        pred.velocity_window = Some(window_label);

        let days_needed = if tasks_per_day > 0.0 {
            Some(remaining as f64 / tasks_per_day)
        } else {
            None
        };
        if let Some(needed) = days_needed {
            pred.days_needed = Some(round1(needed));
            if let Some(predicted) = project_forward(today, needed) {
                pred.predicted_date = Some(predicted.to_string());
            }
        }

        if let Some(deadline) = deadline {
            let days_left = (deadline - today).num_days();
            pred.deadline = Some(deadline.to_string());
            pred.deadline_source = deadline_source;
            pred.days_left = Some(days_left);
            match days_needed {
                Some(needed) => {
                    let margin = days_left as f64 - needed;
                    pred.status = if margin >= tuning.project_margin_days {
                        PredictionStatus::Ahead
                    } else if margin >= 0.0 {
                        PredictionStatus::Tight
                    } else {
                        pred.days_over = Some(round1(margin.abs()));
                        PredictionStatus::Late
                    };
                }
                None => pred.status = PredictionStatus::Blocked,
            }
        }

        predictions.push(pred);
    }

    for goal in goals {
        if goal.status.is_terminal() {
            continue;
        }
        let Some(deadline) = goal.target() else {
            continue;
        };
        let remaining_progress = 1.0 - goal.progress;
        if remaining_progress <= 0.0 {
            continue;
        }
        let days_left = (deadline - today).num_days();
        if days_left <= 0 {
            // Already surfaced by deadline alerts.
            continue;
        }

        let pv = goal_progress_velocity(history, &goal.id, tuning.goal_velocity_window_days, now);

        let mut pred = Prediction::new(&goal.name, PredictionKind::Goal, PredictionStatus::NotEnoughData);
        pred.progress = Some(round1(goal.progress * 100.0));
        pred.progress_per_day = Some(round2(pv * 100.0));
        pred.deadline = Some(deadline.to_string());
        pred.days_left = Some(days_left);

        // A velocity so small the finish date is not representable carries no
        // usable signal; the prediction stays at NotEnoughData.
        if pv > 0.0 {
            let days_to_100 = remaining_progress / pv;
            if let Some(predicted) = project_forward(today, days_to_100) {
                let margin = days_left as f64 - days_to_100;
                pred.days_needed = Some(round1(days_to_100));
                pred.predicted_date = Some(predicted.to_string());
                pred.status = if margin >= tuning.goal_margin_days {
                    PredictionStatus::Ahead
                } else if margin >= 0.0 {
                    PredictionStatus::Tight
                } else {
                    pred.days_over = Some(round1(margin.abs()));
                    PredictionStatus::Late
                };
            }
        }

        predictions.push(pred);
    }

    predictions
}

/// How fast a goal's recorded progress is moving, per day, over the window.
///
/// Requires two history points at least 0.1 day apart; a non-positive delta
/// reports 0 (a regression is stalled, never negative velocity).
pub fn goal_progress_velocity(
    history: &VelocityHistory,
    goal_id: &str,
    days: i64,
    now: DateTime<Utc>,
) -> f64 {
    let mut points: Vec<(DateTime<Utc>, f64)> = history
        .runs_within(days, now)
        .iter()
        .filter_map(|run| {
            let at = run.recorded_at()?;
            let snapshot = run.goal_snapshots.get(goal_id)?;
            Some((at, snapshot.progress))
        })
        .collect();

    if points.len() < 2 {
        return 0.0;
    }
    points.sort_by_key(|(at, _)| *at);

    let (first_at, first_progress) = points[0];
    let (last_at, last_progress) = points[points.len() - 1];
    let elapsed_days = (last_at - first_at).num_seconds() as f64 / 86_400.0;
    if elapsed_days < 0.1 {
        return 0.0;
    }
    let delta = last_progress - first_progress;
    if delta <= 0.0 {
        return 0.0;
    }
    delta / elapsed_days
}
