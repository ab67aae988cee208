use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Direction of a score series over time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improving,
    #[default]
    Stable,
    Declining,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TrendSummary {
    pub pronunciation: Trend,
    pub grammar: Trend,
    pub overall: Trend,
}

/// Consecutive-practice-day streaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StreakInfo {
    pub current: u32,
    pub longest: u32,
    /// When the current streak began; `None` without completed sessions.
    pub current_start: Option<DateTime<Utc>>,
}

/// Derived, non-persisted learning metrics for one user.
///
/// Always recomputable from session and turn rows. Values are kept at full
/// precision; use [`ProgressMetrics::rounded`] at the presentation boundary.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProgressMetrics {
    pub total_sessions: u32,
    pub completed_sessions: u32,
    pub total_turns: u32,
    pub completed_turns: u32,
    /// Completed sessions as a percentage of all sessions.
    pub completion_rate: f64,
    pub average_pronunciation: f64,
    pub average_grammar: f64,
    /// Completed sessions per elapsed week.
    pub learning_velocity: f64,
    pub streak: StreakInfo,
    pub trends: TrendSummary,
    /// Share of the five most recent sessions that were completed (0..=1).
    pub recent_completion_rate: f64,
    pub sessions_by_language: BTreeMap<String, u32>,
    pub favorite_language: Option<String>,
    pub sessions_last_7_days: u32,
    pub sessions_last_30_days: u32,
    pub total_learning_minutes: f64,
    pub average_session_minutes: f64,
}

impl ProgressMetrics {
    /// The all-zero snapshot served when computation fails.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Copy with every fractional value rounded to one decimal place.
    #[must_use]
    pub fn rounded(&self) -> Self {
        Self {
            completion_rate: round1(self.completion_rate),
            average_pronunciation: round1(self.average_pronunciation),
            average_grammar: round1(self.average_grammar),
            learning_velocity: round1(self.learning_velocity),
            recent_completion_rate: round1(self.recent_completion_rate),
            total_learning_minutes: round1(self.total_learning_minutes),
            average_session_minutes: round1(self.average_session_minutes),
            ..self.clone()
        }
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_snapshot_is_all_zero() {
        let m = ProgressMetrics::empty();
        assert_eq!(m.total_sessions, 0);
        assert_eq!(m.completion_rate, 0.0);
        assert_eq!(m.streak.current_start, None);
        assert_eq!(m.trends.overall, Trend::Stable);
        assert!(m.favorite_language.is_none());
    }

    #[test]
    fn rounding_happens_only_on_request() {
        let m = ProgressMetrics {
            completion_rate: 66.666_666,
            learning_velocity: 1.25,
            total_learning_minutes: 12.349,
            ..ProgressMetrics::default()
        };
        let r = m.rounded();
        assert_eq!(r.completion_rate, 66.7);
        assert_eq!(r.learning_velocity, 1.3);
        assert_eq!(r.total_learning_minutes, 12.3);
        assert_eq!(m.completion_rate, 66.666_666);
    }

    #[test]
    fn trend_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Trend::Improving).unwrap(), "\"improving\"");
    }
}
