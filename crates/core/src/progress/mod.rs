//! Derived learning metrics: score extraction, trends, streaks and the
//! per-user aggregate.

pub mod aggregate;
pub mod scores;
pub mod streak;
pub mod summary;
pub mod trend;

pub use aggregate::{SessionPerformance, build_metrics, session_performances};
pub use scores::ScoreSeries;
pub use summary::{completion_summary, session_detail};
