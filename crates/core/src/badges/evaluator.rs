use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::badges::catalog::BadgeCatalog;
use crate::model::{
    BadgeDefinition, BadgeId, CriteriaKind, Difficulty, EarnedBadge, ProgressMetrics,
};
use crate::progress::SessionPerformance;

/// Special-criteria rule: number of languages with a completed session.
pub const RULE_DISTINCT_LANGUAGES: &str = "distinct_languages";
/// Special-criteria rule: at least one completed advanced session.
pub const RULE_ADVANCED_SESSION: &str = "advanced_session";

/// What the evaluator looks at for one user.
#[derive(Debug, Clone, Copy)]
pub struct BadgeEvidence<'a> {
    pub metrics: &'a ProgressMetrics,
    /// Completed sessions, oldest completion first.
    pub history: &'a [SessionPerformance],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BadgeProgress {
    pub badge_id: BadgeId,
    pub current: f64,
    pub required: f64,
    pub percentage: u8,
}

impl BadgeProgress {
    #[must_use]
    pub fn new(badge_id: BadgeId, current: f64, required: f64) -> Self {
        Self {
            percentage: percentage(current, required),
            badge_id,
            current,
            required,
        }
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.current >= self.required
    }
}

/// An earned badge decorated with its catalog definition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EarnedBadgeView {
    pub badge: BadgeDefinition,
    pub awarded_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct BadgeOverview {
    pub earned: Vec<EarnedBadgeView>,
    pub available: Vec<BadgeDefinition>,
    pub progress: Vec<BadgeProgress>,
}

/// `min(100, round(current / required * 100))`; a non-positive requirement
/// counts as met.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn percentage(current: f64, required: f64) -> u8 {
    if required <= 0.0 {
        return 100;
    }
    let pct = (current / required * 100.0).round();
    if pct.is_nan() {
        return 0;
    }
    pct.clamp(0.0, 100.0) as u8
}

/// Progress of one definition against the evidence.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn progress_for(definition: &BadgeDefinition, evidence: &BadgeEvidence<'_>) -> BadgeProgress {
    let criteria = &definition.criteria;
    let threshold = criteria.threshold;
    let history = evidence.history;

    let (current, required) = match &criteria.kind {
        CriteriaKind::SessionCount => (f64::from(evidence.metrics.total_sessions), threshold),
        CriteriaKind::StreakDays => (f64::from(evidence.metrics.streak.longest), threshold),
        CriteriaKind::PronunciationScore => (
            any_reaches(history.iter().map(|p| p.average_pronunciation), threshold),
            1.0,
        ),
        CriteriaKind::GrammarScore => (
            any_reaches(history.iter().map(|p| p.average_grammar), threshold),
            1.0,
        ),
        CriteriaKind::PerformanceConsistency => {
            let required = criteria.condition_u32("sessions").unwrap_or(1).max(1);
            let run = history
                .iter()
                .rev()
                .take_while(|p| p.combined_score().is_some_and(|s| s >= threshold))
                .count()
                .min(required as usize);
            (run as f64, f64::from(required))
        }
        CriteriaKind::Special => match criteria.condition_str("rule") {
            Some(RULE_DISTINCT_LANGUAGES) => {
                let languages: BTreeSet<&str> =
                    history.iter().map(|p| p.target_language.as_str()).collect();
                (languages.len() as f64, threshold)
            }
            Some(RULE_ADVANCED_SESSION) => (
                if history.iter().any(|p| p.difficulty == Difficulty::Advanced) {
                    1.0
                } else {
                    0.0
                },
                1.0,
            ),
            _ => (0.0, 1.0),
        },
        CriteriaKind::Other(_) => (0.0, 1.0),
    };

    BadgeProgress::new(definition.id.clone(), current, required)
}

/// Splits the catalog into earned and available badges and, when evidence
/// is present, computes progress for every available badge.
///
/// Earned ids that are no longer in the catalog are skipped.
#[must_use]
pub fn evaluate(
    catalog: &BadgeCatalog,
    earned: &[EarnedBadge],
    evidence: Option<&BadgeEvidence<'_>>,
) -> BadgeOverview {
    let earned_ids: HashSet<&BadgeId> = earned.iter().map(|e| &e.badge_id).collect();

    let earned_views = earned
        .iter()
        .filter_map(|e| {
            catalog.get(&e.badge_id).map(|badge| EarnedBadgeView {
                badge: badge.clone(),
                awarded_at: e.awarded_at,
                data: e.data.clone(),
            })
        })
        .collect();

    let available: Vec<BadgeDefinition> = catalog
        .iter()
        .filter(|b| !earned_ids.contains(&b.id))
        .cloned()
        .collect();

    let progress = evidence
        .map(|ev| available.iter().map(|b| progress_for(b, ev)).collect())
        .unwrap_or_default();

    BadgeOverview {
        earned: earned_views,
        available,
        progress,
    }
}

/// Progress of every not-yet-earned badge whose requirement is met.
#[must_use]
pub fn newly_eligible(
    catalog: &BadgeCatalog,
    earned: &[EarnedBadge],
    evidence: &BadgeEvidence<'_>,
) -> Vec<BadgeProgress> {
    let earned_ids: HashSet<&BadgeId> = earned.iter().map(|e| &e.badge_id).collect();
    catalog
        .iter()
        .filter(|b| !earned_ids.contains(&b.id))
        .map(|b| progress_for(b, evidence))
        .filter(BadgeProgress::is_complete)
        .collect()
}

fn any_reaches(scores: impl Iterator<Item = Option<f64>>, threshold: f64) -> f64 {
    if scores.flatten().any(|s| s >= threshold) {
        1.0
    } else {
        0.0
    }
}
