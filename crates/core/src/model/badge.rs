use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::ids::{BadgeId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeCategory {
    Milestone,
    Streak,
    Performance,
    Special,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeRarity {
    Common,
    Rare,
    Epic,
    Legendary,
}

/// What a badge measures. Unknown kinds are kept verbatim so catalogs from
/// newer releases still load; they never progress and are never awarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CriteriaKind {
    SessionCount,
    StreakDays,
    PronunciationScore,
    GrammarScore,
    PerformanceConsistency,
    Special,
    Other(String),
}

impl CriteriaKind {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            CriteriaKind::SessionCount => "session_count",
            CriteriaKind::StreakDays => "streak_days",
            CriteriaKind::PronunciationScore => "pronunciation_score",
            CriteriaKind::GrammarScore => "grammar_score",
            CriteriaKind::PerformanceConsistency => "performance_consistency",
            CriteriaKind::Special => "special",
            CriteriaKind::Other(kind) => kind,
        }
    }
}

impl From<String> for CriteriaKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "session_count" => Self::SessionCount,
            "streak_days" => Self::StreakDays,
            "pronunciation_score" => Self::PronunciationScore,
            "grammar_score" => Self::GrammarScore,
            "performance_consistency" => Self::PerformanceConsistency,
            "special" => Self::Special,
            _ => Self::Other(value),
        }
    }
}

impl From<CriteriaKind> for String {
    fn from(value: CriteriaKind) -> Self {
        value.as_str().to_string()
    }
}

/// Typed criteria descriptor: kind, numeric threshold, optional conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BadgeCriteria {
    pub kind: CriteriaKind,
    pub threshold: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Value>,
}

impl BadgeCriteria {
    #[must_use]
    pub fn new(kind: CriteriaKind, threshold: f64) -> Self {
        Self {
            kind,
            threshold,
            conditions: None,
        }
    }

    #[must_use]
    pub fn with_conditions(mut self, conditions: Value) -> Self {
        self.conditions = Some(conditions);
        self
    }

    /// Reads an unsigned integer condition, e.g. `{"sessions": 5}`.
    #[must_use]
    pub fn condition_u32(&self, key: &str) -> Option<u32> {
        self.conditions
            .as_ref()?
            .get(key)?
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
    }

    #[must_use]
    pub fn condition_str(&self, key: &str) -> Option<&str> {
        self.conditions.as_ref()?.get(key)?.as_str()
    }
}

/// Static catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BadgeDefinition {
    pub id: BadgeId,
    pub name: String,
    pub description: String,
    pub category: BadgeCategory,
    pub rarity: BadgeRarity,
    pub criteria: BadgeCriteria,
}

/// A badge a user holds. At most one per `(user_id, badge_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarnedBadge {
    pub user_id: UserId,
    pub badge_id: BadgeId,
    pub awarded_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}
