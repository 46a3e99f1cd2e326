use chrono::NaiveDate;
use serde::Serialize;

use crate::config::Tuning;
use crate::model::{Goal, Item};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertType {
    Overdue,
    Soon,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Task,
    Goal,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeadlineAlert {
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub kind: AlertKind,
    pub name: String,
    /// Days overdue, or days remaining for a "soon" alert.
    pub days: i64,
}

/// Scan items and goals for missed or imminent deadlines.
///
/// Terminal entries are skipped, as are entries without a parseable date
/// (best effort, a malformed date never alerts). Goals get a wider "soon"
/// threshold than tasks: goal deadlines are coarser.
pub fn check_deadlines(
    items: &[Item],
    goals: &[Goal],
    today: NaiveDate,
    tuning: &Tuning,
) -> Vec<DeadlineAlert> {
    let mut alerts = Vec::new();

    for item in items {
        if item.status.is_terminal() {
            continue;
        }
        let Some(due) = item.due() else {
            continue;
        };
        let days_left = (due - today).num_days();
        if days_left < 0 {
            alerts.push(DeadlineAlert {
                alert_type: AlertType::Overdue,
                kind: AlertKind::Task,
                name: item.name.clone(),
                days: days_left.abs(),
            });
        } else if days_left <= tuning.task_soon_days {
            alerts.push(DeadlineAlert {
                alert_type: AlertType::Soon,
                kind: AlertKind::Task,
                name: item.name.clone(),
                days: days_left,
            });
        }
    }

    for goal in goals {
        if goal.status.is_terminal() {
            continue;
        }
        let Some(target) = goal.target() else {
            continue;
        };
        let days_left = (target - today).num_days();
        if days_left < 0 {
            alerts.push(DeadlineAlert {
                alert_type: AlertType::Overdue,
                kind: AlertKind::Goal,
                name: goal.name.clone(),
                days: days_left.abs(),
            });
        } else if days_left <= tuning.goal_soon_days {
            alerts.push(DeadlineAlert {
                alert_type: AlertType::Soon,
                kind: AlertKind::Goal,
                name: goal.name.clone(),
                days: days_left,
            });
        }
    }

    alerts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GoalStatus, ItemKind, Status};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("date")
    }

    fn task(name: &str, status: Status, due: Option<&str>) -> Item {
        Item {
            id: name.to_lowercase(),
            name: name.to_string(),
            kind: ItemKind::Task,
            status,
            priority: None,
            difficulty: None,
            revenue_impact: None,
            due_date: due.map(|s| s.to_string()),
            completed_on: None,
            upstream: vec![],
            goals: vec![],
        }
    }

    fn goal(name: &str, status: GoalStatus, target: Option<&str>) -> Goal {
        Goal {
            id: name.to_lowercase(),
            name: name.to_string(),
            status,
            progress: 0.0,
            target_date: target.map(|s| s.to_string()),
        }
    }

    #[test]
    fn overdue_task_alerts_unless_complete() {
        let today = day(2025, 6, 10);
        let tasks = vec![task("Late", Status::InProgress, Some("2025-06-09"))];
        let alerts = check_deadlines(&tasks, &[], today, &Tuning::default());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::Overdue);
        assert_eq!(alerts[0].kind, AlertKind::Task);
        assert_eq!(alerts[0].days, 1);

        let done = vec![task("Late", Status::Complete, Some("2025-06-09"))];
        assert!(check_deadlines(&done, &[], today, &Tuning::default()).is_empty());
    }

    #[test]
    fn soon_thresholds_differ_for_tasks_and_goals() {
        let today = day(2025, 6, 10);
        let tasks = vec![
            task("T2", Status::Backlog, Some("2025-06-12")),
            task("T3", Status::Backlog, Some("2025-06-13")),
        ];
        let goals = vec![
            goal("G3", GoalStatus::Active, Some("2025-06-13")),
            goal("G4", GoalStatus::Active, Some("2025-06-14")),
        ];
        let alerts = check_deadlines(&tasks, &goals, today, &Tuning::default());
        // Tasks alert within 2 days, goals within 3.
        let names: Vec<&str> = alerts.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["T2", "G3"]);
        assert!(alerts.iter().all(|a| a.alert_type == AlertType::Soon));
    }

    #[test]
    fn malformed_or_missing_dates_never_alert() {
        let today = day(2025, 6, 10);
        let tasks = vec![
            task("NoDue", Status::Backlog, None),
            task("BadDue", Status::Backlog, Some("next tuesday")),
        ];
        let goals = vec![goal("BadTarget", GoalStatus::Active, Some("soonish"))];
        assert!(check_deadlines(&tasks, &goals, today, &Tuning::default()).is_empty());
    }

    #[test]
    fn terminal_goals_are_skipped() {
        let today = day(2025, 6, 10);
        let goals = vec![
            goal("Done", GoalStatus::Achieved, Some("2025-06-01")),
            goal("Dropped", GoalStatus::Abandoned, Some("2025-06-01")),
            goal("Open", GoalStatus::Active, Some("2025-06-01")),
        ];
        let alerts = check_deadlines(&[], &goals, today, &Tuning::default());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].name, "Open");
        assert_eq!(alerts[0].days, 9);
    }

    #[test]
    fn alerting_is_idempotent() {
        let today = day(2025, 6, 10);
        let tasks = vec![task("Late", Status::Blocked, Some("2025-06-01"))];
        let goals = vec![goal("Soon", GoalStatus::Active, Some("2025-06-12"))];
        let first = check_deadlines(&tasks, &goals, today, &Tuning::default());
        let second = check_deadlines(&tasks, &goals, today, &Tuning::default());
        assert_eq!(
            serde_json::to_string(&first).expect("json"),
            serde_json::to_string(&second).expect("json")
        );
    }
}
