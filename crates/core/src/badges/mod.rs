//! Badge catalog and the pure criteria evaluator.

mod catalog;
mod evaluator;

pub use catalog::{BadgeCatalog, CatalogError};
pub use evaluator::{
    BadgeEvidence, BadgeOverview, BadgeProgress, EarnedBadgeView, RULE_ADVANCED_SESSION,
    RULE_DISTINCT_LANGUAGES, evaluate, newly_eligible, percentage, progress_for,
};
