use crate::model::{Difficulty, Item, Priority, RevenueImpact};

const PRIORITY_UNSET: f64 = 1.5;
const DIFFICULTY_UNSET: f64 = 1.5;

fn priority_weight(priority: Option<Priority>) -> f64 {
    match priority {
        Some(Priority::Critical) => 4.0,
        Some(Priority::High) => 3.0,
        Some(Priority::Medium) => 2.0,
        Some(Priority::Low) => 1.0,
        None => PRIORITY_UNSET,
    }
}

fn difficulty_weight(difficulty: Option<Difficulty>) -> f64 {
    match difficulty {
        Some(Difficulty::Hard) => 3.0,
        Some(Difficulty::Moderate) => 2.0,
        Some(Difficulty::Easy) => 1.0,
        None => DIFFICULTY_UNSET,
    }
}

fn revenue_weight(revenue: Option<RevenueImpact>) -> f64 {
    match revenue {
        Some(RevenueImpact::Direct) => 2.0,
        Some(RevenueImpact::Indirect) => 1.5,
        Some(RevenueImpact::None) | None => 1.0,
    }
}

/// Combined importance weight for an item.
///
/// Priority and revenue scale linearly; difficulty goes in under a square
/// root so a hard task counts more without dominating its project's rollup.
/// Missing fields fall back to neutral defaults, so the result is always
/// strictly positive.
pub fn item_weight(item: &Item) -> f64 {
    priority_weight(item.priority)
        * difficulty_weight(item.difficulty).sqrt()
        * revenue_weight(item.revenue_impact)
}
