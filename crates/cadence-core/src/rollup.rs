use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::config::Tuning;
use crate::model::{Goal, Item, Status};
use crate::weight::item_weight;

/// Intent to move a project's status/progress, derived from its children.
/// The caller is responsible for writing it back to the external store.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectUpdate {
    pub id: String,
    pub name: String,
    pub old_status: Status,
    pub new_status: Status,
    pub progress: f64,
    pub completed: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct GoalUpdate {
    pub id: String,
    pub name: String,
    pub old_progress: f64,
    pub new_progress: f64,
    /// Weight totals truncated to integers for display, not literal counts.
    pub completed_items: u64,
    pub total_items: u64,
}

/// Roll weighted child completions up into project status and progress.
///
/// Children earn full credit when completed (this run or already
/// `Complete`), partial credit when in progress. Projects with nothing to
/// report (no status change, zero progress) are skipped.
pub fn propagate_to_projects(
    items: &[Item],
    completed_ids: &HashSet<String>,
    started_ids: &HashSet<String>,
    tuning: &Tuning,
) -> Vec<ProjectUpdate> {
    let by_id: HashMap<&str, &Item> = items.iter().map(|i| (i.id.as_str(), i)).collect();
    let project_ids: HashSet<&str> = items
        .iter()
        .filter(|i| i.is_project())
        .map(|i| i.id.as_str())
        .collect();

    let mut children: HashMap<&str, Vec<&str>> = HashMap::new();
    for item in items.iter().filter(|i| !i.is_project()) {
        // First known project reference wins: rollup treats upstream as a
        // tree, not a graph.
        if let Some(parent) = item
            .upstream
            .iter()
            .find(|p| project_ids.contains(p.as_str()))
        {
            children
                .entry(parent.as_str())
                .or_default()
                .push(item.id.as_str());
        }
    }

    let mut updates = Vec::new();
    for project in items.iter().filter(|i| i.is_project()) {
        let Some(child_ids) = children.get(project.id.as_str()) else {
            continue;
        };

        let mut total_weight = 0.0;
        let mut completed_weight = 0.0;
        let mut in_progress_weight = 0.0;
        let mut completed_count = 0;
        let mut in_progress_count = 0;

        for cid in child_ids {
            let Some(child) = by_id.get(cid) else {
                continue;
            };
            let w = item_weight(child);
            total_weight += w;

            if completed_ids.contains(*cid) || child.status == Status::Complete {
                completed_weight += w;
                completed_count += 1;
            } else if started_ids.contains(*cid) || child.status == Status::InProgress {
                in_progress_weight += w * tuning.in_progress_credit;
                in_progress_count += 1;
            }
        }

        let total = child_ids.len();
        let progress = if total_weight > 0.0 {
            (completed_weight + in_progress_weight) / total_weight
        } else {
            0.0
        };

        let old_status = project.status;
        let new_status = if completed_count == total {
            Status::Complete
        } else if completed_count > 0 || in_progress_count > 0 {
            Status::InProgress
        } else {
            old_status
        };

        if new_status != old_status || progress > 0.0 {
            updates.push(ProjectUpdate {
                id: project.id.clone(),
                name: project.name.clone(),
                old_status,
                new_status,
                progress,
                completed: completed_count,
                total,
            });
        }
    }

    updates
}

/// Roll weighted task/project completions up into goal progress.
///
/// Goal progress only ever moves forward: a computed value below the stored
/// one is ignored, and movement inside the deadband is not worth emitting.
pub fn propagate_to_goals(
    items: &[Item],
    goals: &[Goal],
    project_updates: &[ProjectUpdate],
    tuning: &Tuning,
) -> Vec<GoalUpdate> {
    let by_id: HashMap<&str, &Item> = items.iter().map(|i| (i.id.as_str(), i)).collect();
    let goal_ids: HashSet<&str> = goals.iter().map(|g| g.id.as_str()).collect();
    let update_map: HashMap<&str, &ProjectUpdate> = project_updates
        .iter()
        .map(|u| (u.id.as_str(), u))
        .collect();

    let mut contributors: HashMap<&str, Vec<&str>> = HashMap::new();
    for item in items {
        for gid in &item.goals {
            if goal_ids.contains(gid.as_str()) {
                contributors
                    .entry(gid.as_str())
                    .or_default()
                    .push(item.id.as_str());
            }
        }
    }

    let mut updates = Vec::new();
    for goal in goals {
        let Some(child_ids) = contributors.get(goal.id.as_str()) else {
            continue;
        };

        let mut total_weight = 0.0;
        let mut completed_weight = 0.0;

        for cid in child_ids {
            let Some(item) = by_id.get(cid) else {
                continue;
            };
            let w = item_weight(item);
            total_weight += w;

            let completed_via_rollup = update_map
                .get(cid)
                .map(|u| u.new_status == Status::Complete)
                .unwrap_or(false);
            if completed_via_rollup || item.status == Status::Complete {
                completed_weight += w;
            }
        }

        let calculated = if total_weight > 0.0 {
            completed_weight / total_weight
        } else {
            0.0
        };
        let old_progress = goal.progress;
        let new_progress = calculated.max(old_progress);

        if new_progress - old_progress > tuning.goal_deadband {
            updates.push(GoalUpdate {
                id: goal.id.clone(),
                name: goal.name.clone(),
                old_progress,
                new_progress,
                completed_items: completed_weight as u64,
                total_items: total_weight as u64,
            });
        }
    }

    updates
}
