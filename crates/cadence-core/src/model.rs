use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Lifecycle status of a task or project, canonicalized at the ingestion
/// boundary. Unknown strings resolve to `Backlog` rather than failing.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Backlog,
    #[serde(rename = "Ready To Start")]
    ReadyToStart,
    #[serde(rename = "In Progress")]
    InProgress,
    Blocked,
    Complete,
    Archive,
}

impl Status {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "Ready To Start" => Status::ReadyToStart,
            "In Progress" => Status::InProgress,
            "Blocked" => Status::Blocked,
            "Complete" => Status::Complete,
            "Archive" => Status::Archive,
            _ => Status::Backlog,
        }
    }

    /// Complete and Archive items are excluded from alerts and predictions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Complete | Status::Archive)
    }
}

impl Default for Status {
    fn default() -> Self {
        Status::Backlog
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "Critical" => Some(Priority::Critical),
            "High" => Some(Priority::High),
            "Medium" => Some(Priority::Medium),
            "Low" => Some(Priority::Low),
            _ => None,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    #[serde(rename = "1 - Easy")]
    Easy,
    #[serde(rename = "2 - Moderate")]
    Moderate,
    #[serde(rename = "3 - Hard")]
    Hard,
}

impl Difficulty {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "1 - Easy" | "Easy" => Some(Difficulty::Easy),
            "2 - Moderate" | "Moderate" => Some(Difficulty::Moderate),
            "3 - Hard" | "Hard" => Some(Difficulty::Hard),
            _ => None,
        }
    }
}

/// Revenue impact arrives as a free-form string with an emoji prefix
/// (e.g. "💰 Direct"). The last whitespace token carries the label; anything
/// unrecognized counts as `None`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RevenueImpact {
    Direct,
    Indirect,
    None,
}

impl RevenueImpact {
    pub fn parse(raw: &str) -> Self {
        match raw.split_whitespace().next_back() {
            Some("Direct") => RevenueImpact::Direct,
            Some("Indirect") => RevenueImpact::Indirect,
            _ => RevenueImpact::None,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemKind {
    Task,
    Project,
}

impl Default for ItemKind {
    fn default() -> Self {
        ItemKind::Task
    }
}

/// A task or project record as fetched from the external store.
///
/// Dates are carried as RFC3339 strings and parsed lazily; a malformed date
/// behaves like a missing one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: ItemKind,
    #[serde(default, deserialize_with = "de_status")]
    pub status: Status,
    #[serde(default, deserialize_with = "de_priority")]
    pub priority: Option<Priority>,
    #[serde(default, deserialize_with = "de_difficulty")]
    pub difficulty: Option<Difficulty>,
    #[serde(default, deserialize_with = "de_revenue")]
    pub revenue_impact: Option<RevenueImpact>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub completed_on: Option<String>,
    /// Parent project ids. For rollup purposes only the first known project
    /// reference matters (tree, not graph).
    #[serde(default)]
    pub upstream: Vec<String>,
    /// Goal ids this item contributes to directly.
    #[serde(default)]
    pub goals: Vec<String>,
}

impl Item {
    pub fn is_project(&self) -> bool {
        self.kind == ItemKind::Project
    }

    pub fn due(&self) -> Option<NaiveDate> {
        self.due_date.as_deref().and_then(parse_date)
    }
}

/// Goal statuses come with decorative emoji prefixes ("✅ Achieved"); only
/// the trailing token is meaningful.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GoalStatus {
    Active,
    Achieved,
    Abandoned,
}

impl GoalStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.split_whitespace().next_back() {
            Some("Achieved") => GoalStatus::Achieved,
            Some("Abandoned") => GoalStatus::Abandoned,
            _ => GoalStatus::Active,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, GoalStatus::Achieved | GoalStatus::Abandoned)
    }
}

impl Default for GoalStatus {
    fn default() -> Self {
        GoalStatus::Active
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "de_goal_status")]
    pub status: GoalStatus,
    /// Completion fraction in [0, 1]; never decreased by rollup output.
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub target_date: Option<String>,
}

impl Goal {
    pub fn target(&self) -> Option<NaiveDate> {
        self.target_date.as_deref().and_then(parse_date)
    }
}

/// Best-effort date parsing: RFC3339 timestamps (including trailing "Z") or
/// a bare `YYYY-MM-DD`. Anything else is `None`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.date_naive());
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").ok()
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn de_status<'de, D: Deserializer<'de>>(de: D) -> Result<Status, D::Error> {
    let raw: Option<String> = Option::deserialize(de)?;
    Ok(raw.as_deref().map(Status::parse).unwrap_or_default())
}

fn de_priority<'de, D: Deserializer<'de>>(de: D) -> Result<Option<Priority>, D::Error> {
    let raw: Option<String> = Option::deserialize(de)?;
    Ok(raw.as_deref().and_then(Priority::parse))
}

fn de_difficulty<'de, D: Deserializer<'de>>(de: D) -> Result<Option<Difficulty>, D::Error> {
    let raw: Option<String> = Option::deserialize(de)?;
    Ok(raw.as_deref().and_then(Difficulty::parse))
}

fn de_revenue<'de, D: Deserializer<'de>>(de: D) -> Result<Option<RevenueImpact>, D::Error> {
    let raw: Option<String> = Option::deserialize(de)?;
    Ok(raw
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(RevenueImpact::parse))
}

fn de_goal_status<'de, D: Deserializer<'de>>(de: D) -> Result<GoalStatus, D::Error> {
    let raw: Option<String> = Option::deserialize(de)?;
    Ok(raw.as_deref().map(GoalStatus::parse).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parse_falls_back_to_backlog() {
        assert_eq!(Status::parse("In Progress"), Status::InProgress);
        assert_eq!(Status::parse("Ready To Start"), Status::ReadyToStart);
        assert_eq!(Status::parse("something else"), Status::Backlog);
        assert_eq!(Status::parse(""), Status::Backlog);
    }

    #[test]
    fn revenue_impact_strips_emoji_prefix() {
        assert_eq!(RevenueImpact::parse("💰 Direct"), RevenueImpact::Direct);
        assert_eq!(RevenueImpact::parse("📈 Indirect"), RevenueImpact::Indirect);
        assert_eq!(RevenueImpact::parse("None"), RevenueImpact::None);
        assert_eq!(RevenueImpact::parse("🤷 Who Knows"), RevenueImpact::None);
    }

    #[test]
    fn goal_status_strips_emoji_prefix() {
        assert_eq!(GoalStatus::parse("✅ Achieved"), GoalStatus::Achieved);
        assert_eq!(GoalStatus::parse("❌ Abandoned"), GoalStatus::Abandoned);
        assert_eq!(GoalStatus::parse("🎯 On Track"), GoalStatus::Active);
    }

    #[test]
    fn parse_date_accepts_rfc3339_and_bare_dates() {
        let expected = NaiveDate::from_ymd_opt(2025, 6, 1).expect("date");
        assert_eq!(parse_date("2025-06-01"), Some(expected));
        assert_eq!(parse_date("2025-06-01T10:30:00Z"), Some(expected));
        assert_eq!(parse_date("2025-06-01T10:30:00+02:00"), Some(expected));
        assert_eq!(parse_date("not a date"), None);
    }

    #[test]
    fn item_deserializes_with_lenient_fields() {
        let raw = r#"{
            "id": "t1",
            "name": "Ship it",
            "type": "Task",
            "status": "Totally Unknown",
            "priority": "Nope",
            "difficulty": "2 - Moderate",
            "revenue_impact": "💰 Direct",
            "upstream": ["p1"],
            "goals": []
        }"#;
        let item: Item = serde_json::from_str(raw).expect("item");
        assert_eq!(item.status, Status::Backlog);
        assert_eq!(item.priority, None);
        assert_eq!(item.difficulty, Some(Difficulty::Moderate));
        assert_eq!(item.revenue_impact, Some(RevenueImpact::Direct));
        assert_eq!(item.upstream, vec!["p1"]);
    }

    #[test]
    fn goal_deserializes_with_defaults() {
        let goal: Goal = serde_json::from_str(r#"{"id": "g1"}"#).expect("goal");
        assert_eq!(goal.status, GoalStatus::Active);
        assert_eq!(goal.progress, 0.0);
        assert!(goal.target().is_none());
    }
}
