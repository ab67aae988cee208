use std::collections::HashSet;

use serde_json::json;
use thiserror::Error;

use crate::model::{
    BadgeCategory, BadgeCriteria, BadgeDefinition, BadgeId, BadgeRarity, CriteriaKind,
};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("invalid badge catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("duplicate badge id in catalog: {0}")]
    DuplicateId(BadgeId),
}

/// Immutable list of badge definitions, loaded once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct BadgeCatalog {
    badges: Vec<BadgeDefinition>,
}

impl BadgeCatalog {
    /// Builds a catalog from definitions, keeping their order.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::DuplicateId` if two entries share an id.
    pub fn new(badges: Vec<BadgeDefinition>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::new();
        for badge in &badges {
            if !seen.insert(badge.id.clone()) {
                return Err(CatalogError::DuplicateId(badge.id.clone()));
            }
        }
        Ok(Self { badges })
    }

    /// Parses a JSON array of definitions.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` for malformed JSON or duplicate ids.
    pub fn from_json(raw: &str) -> Result<Self, CatalogError> {
        let badges: Vec<BadgeDefinition> = serde_json::from_str(raw)?;
        Self::new(badges)
    }

    /// The catalog shipped with the app.
    #[must_use]
    pub fn builtin() -> Self {
        use BadgeCategory::{Milestone, Performance, Special, Streak};
        use BadgeRarity::{Common, Epic, Legendary, Rare};
        use CriteriaKind as K;

        let badges = vec![
            def(
                "first_session",
                "First Steps",
                "Start your first practice session",
                Milestone,
                Common,
                BadgeCriteria::new(K::SessionCount, 1.0),
            ),
            def(
                "getting_started",
                "Getting Started",
                "Practice in 5 sessions",
                Milestone,
                Common,
                BadgeCriteria::new(K::SessionCount, 5.0),
            ),
            def(
                "committed_learner",
                "Committed Learner",
                "Practice in 25 sessions",
                Milestone,
                Rare,
                BadgeCriteria::new(K::SessionCount, 25.0),
            ),
            def(
                "dedicated_scholar",
                "Dedicated Scholar",
                "Practice in 100 sessions",
                Milestone,
                Epic,
                BadgeCriteria::new(K::SessionCount, 100.0),
            ),
            def(
                "three_day_streak",
                "On a Roll",
                "Complete sessions 3 days in a row",
                Streak,
                Common,
                BadgeCriteria::new(K::StreakDays, 3.0),
            ),
            def(
                "week_warrior",
                "Week Warrior",
                "Complete sessions 7 days in a row",
                Streak,
                Rare,
                BadgeCriteria::new(K::StreakDays, 7.0),
            ),
            def(
                "month_master",
                "Month Master",
                "Complete sessions 30 days in a row",
                Streak,
                Legendary,
                BadgeCriteria::new(K::StreakDays, 30.0),
            ),
            def(
                "pronunciation_pro",
                "Pronunciation Pro",
                "Average 90+ pronunciation in a completed session",
                Performance,
                Rare,
                BadgeCriteria::new(K::PronunciationScore, 90.0),
            ),
            def(
                "grammar_guru",
                "Grammar Guru",
                "Average 90+ grammar in a completed session",
                Performance,
                Rare,
                BadgeCriteria::new(K::GrammarScore, 90.0),
            ),
            def(
                "consistent_performer",
                "Consistent Performer",
                "Score 80+ in 5 completed sessions in a row",
                Performance,
                Epic,
                BadgeCriteria::new(K::PerformanceConsistency, 80.0)
                    .with_conditions(json!({ "sessions": 5 })),
            ),
            def(
                "polyglot",
                "Polyglot",
                "Complete sessions in 3 different languages",
                Special,
                Epic,
                BadgeCriteria::new(K::Special, 3.0)
                    .with_conditions(json!({ "rule": "distinct_languages" })),
            ),
            def(
                "advanced_explorer",
                "Advanced Explorer",
                "Complete an advanced session",
                Special,
                Rare,
                BadgeCriteria::new(K::Special, 1.0)
                    .with_conditions(json!({ "rule": "advanced_session" })),
            ),
        ];
        Self { badges }
    }

    #[must_use]
    pub fn get(&self, id: &BadgeId) -> Option<&BadgeDefinition> {
        self.badges.iter().find(|b| &b.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BadgeDefinition> {
        self.badges.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.badges.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.badges.is_empty()
    }
}

impl Default for BadgeCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

fn def(
    id: &str,
    name: &str,
    description: &str,
    category: BadgeCategory,
    rarity: BadgeRarity,
    criteria: BadgeCriteria,
) -> BadgeDefinition {
    BadgeDefinition {
        id: BadgeId::from(id),
        name: name.to_string(),
        description: description.to_string(),
        category,
        rarity,
        criteria,
    }
}
