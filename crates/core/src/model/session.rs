use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::model::ids::{SessionId, UserId};
use crate::model::metrics::Trend;

//
// ─── DIFFICULTY ────────────────────────────────────────────────────────────────
//

/// Difficulty tier chosen when a session is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beginner" => Ok(Self::Beginner),
            "intermediate" => Ok(Self::Intermediate),
            "advanced" => Ok(Self::Advanced),
            _ => Err(ValidationError::UnknownDifficulty { raw: s.to_string() }),
        }
    }
}

//
// ─── LIFECYCLE STATE ───────────────────────────────────────────────────────────
//

/// Lifecycle state, derived from the session timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No `started_at` yet.
    Created,
    InProgress,
    /// `ended_at` is set; terminal.
    Completed,
}

//
// ─── DRAFT ─────────────────────────────────────────────────────────────────────
//

/// Caller input for creating a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDraft {
    pub target_language: String,
    pub difficulty: Difficulty,
}

impl SessionDraft {
    #[must_use]
    pub fn new(target_language: impl Into<String>, difficulty: Difficulty) -> Self {
        Self {
            target_language: target_language.into(),
            difficulty,
        }
    }

    /// Validate the draft and stamp it as started at `now`.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidLanguage` if the language code is malformed.
    pub fn validate(self, user_id: UserId, now: DateTime<Utc>) -> Result<NewSession, ValidationError> {
        let target_language = normalize_language(&self.target_language)?;
        Ok(NewSession {
            user_id,
            target_language,
            difficulty: self.difficulty,
            created_at: now,
            started_at: Some(now),
        })
    }
}

/// Normalizes an ISO-639 style code (`ES`, `pt-br`) to `es`, `pt-BR`.
///
/// # Errors
///
/// Returns `ValidationError::InvalidLanguage` for anything else.
pub fn normalize_language(raw: &str) -> Result<String, ValidationError> {
    let invalid = || ValidationError::InvalidLanguage {
        raw: raw.to_string(),
    };
    let trimmed = raw.trim();
    let mut parts = trimmed.split(['-', '_']);
    let primary = parts.next().unwrap_or_default();
    if !(2..=3).contains(&primary.len()) || !primary.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(invalid());
    }

    let mut code = primary.to_ascii_lowercase();
    if let Some(region) = parts.next() {
        if !(2..=4).contains(&region.len()) || !region.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(invalid());
        }
        code.push('-');
        code.push_str(&region.to_ascii_uppercase());
    }
    if parts.next().is_some() {
        return Err(invalid());
    }
    Ok(code)
}

/// A validated session that has not been assigned a storage id yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSession {
    pub user_id: UserId,
    pub target_language: String,
    pub difficulty: Difficulty,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
}

impl NewSession {
    #[must_use]
    pub fn assign_id(self, id: SessionId) -> Session {
        Session {
            id,
            user_id: self.user_id,
            target_language: self.target_language,
            difficulty: self.difficulty,
            created_at: self.created_at,
            started_at: self.started_at,
            ended_at: None,
            total_turns: 0,
            completed_turns: 0,
            progress: None,
        }
    }
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// One practice run by a user in one target language.
///
/// `completed_turns <= total_turns` always holds; `ended_at` is written once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub user_id: UserId,
    pub target_language: String,
    pub difficulty: Difficulty,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub total_turns: u32,
    pub completed_turns: u32,
    pub progress: Option<SessionProgress>,
}

impl Session {
    #[must_use]
    pub fn state(&self) -> SessionState {
        match (self.started_at, self.ended_at) {
            (_, Some(_)) => SessionState::Completed,
            (Some(_), None) => SessionState::InProgress,
            (None, None) => SessionState::Created,
        }
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.ended_at.is_some()
    }

    /// Wall-clock minutes between start and end, when both are known.
    #[must_use]
    pub fn duration_minutes(&self) -> Option<f64> {
        match (self.started_at, self.ended_at) {
            (Some(start), Some(end)) => Some(crate::time::minutes_between(start, end)),
            _ => None,
        }
    }
}

//
// ─── PROGRESS SNAPSHOT ─────────────────────────────────────────────────────────
//

/// Summary embedded in the session row at completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionProgress {
    pub completion_rate: f64,
    pub average_pronunciation: Option<f64>,
    pub average_grammar: Option<f64>,
    pub duration_minutes: f64,
    pub completed_turns: u32,
    pub total_turns: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<SessionDetailMetrics>,
}

/// Per-turn breakdown attached after completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDetailMetrics {
    pub pronunciation_scores: Vec<f64>,
    pub grammar_scores: Vec<f64>,
    pub pronunciation_trend: Trend,
    pub grammar_trend: Trend,
    pub attempted_turns: u32,
}
