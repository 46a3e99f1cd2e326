use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Tuning knobs for rollup, alerting, and prediction.
///
/// The defaults reproduce the historical behavior; none of these constants
/// has a documented derivation, so they are kept adjustable rather than
/// baked in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Tuning {
    /// Fraction of an in-progress child's weight credited to its project.
    pub in_progress_credit: f64,
    /// Minimum goal progress delta (fraction) worth emitting an update for.
    pub goal_deadband: f64,
    /// Margin (days) separating an ahead-of-schedule project from a tight one.
    pub project_margin_days: f64,
    /// Margin (days) separating an ahead-of-schedule goal from a tight one.
    pub goal_margin_days: f64,
    /// Task due dates within this many days raise a "soon" alert.
    pub task_soon_days: i64,
    /// Goal target dates within this many days raise a "soon" alert.
    pub goal_soon_days: i64,
    /// History runs older than this many days are dropped on save.
    pub retention_days: i64,
    /// Window (days) for goal progress velocity.
    pub goal_velocity_window_days: i64,
}

impl Default for Tuning {
    fn default() -> Self {
        Tuning {
            in_progress_credit: 0.5,
            goal_deadband: 0.01,
            project_margin_days: 3.0,
            goal_margin_days: 7.0,
            task_soon_days: 2,
            goal_soon_days: 3,
            retention_days: 90,
            goal_velocity_window_days: 14,
        }
    }
}

/// Load tuning from a TOML file. A missing file means defaults; a present
/// but unreadable or malformed file is an error the caller should surface.
pub fn load_tuning(path: &Path) -> Result<Tuning, ConfigError> {
    if !path.exists() {
        return Ok(Tuning::default());
    }
    let raw = fs::read_to_string(path)?;
    let tuning: Tuning = toml::from_str(&raw)?;
    Ok(tuning)
}
