use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationError;
use crate::model::ids::{SessionId, TurnId};

//
// ─── FEEDBACK ──────────────────────────────────────────────────────────────────
//

/// Structured feedback produced by the speech/grammar providers.
///
/// The payload is kept as-is; only `overall_score` is interpreted, and a
/// missing or non-numeric score simply reads as `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Feedback(Value);

impl Feedback {
    #[must_use]
    pub fn new(raw: Value) -> Self {
        Self(raw)
    }

    /// Feedback carrying only an overall score.
    #[must_use]
    pub fn scored(overall_score: f64) -> Self {
        Self(serde_json::json!({ "overall_score": overall_score }))
    }

    #[must_use]
    pub fn overall_score(&self) -> Option<f64> {
        self.0
            .as_object()?
            .get("overall_score")?
            .as_f64()
            .filter(|score| score.is_finite())
    }

    #[must_use]
    pub fn raw(&self) -> &Value {
        &self.0
    }
}

//
// ─── DRAFT ─────────────────────────────────────────────────────────────────────
//

/// Caller input for creating a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnDraft {
    /// Session id as carried in the request payload.
    pub session_id: SessionId,
    pub turn_number: u32,
    pub target_text: String,
    pub meaning: Option<String>,
}

impl TurnDraft {
    /// Validate the draft against the session id taken from the request context.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::SessionMismatch` if the payload names another session,
    /// `ValidationError::InvalidTurnNumber` for turn number 0, and
    /// `ValidationError::EmptyTargetText` for a blank sentence.
    pub fn validate(
        self,
        context: SessionId,
        now: DateTime<Utc>,
    ) -> Result<NewTurn, ValidationError> {
        if self.session_id != context {
            return Err(ValidationError::SessionMismatch {
                context,
                payload: self.session_id,
            });
        }
        if self.turn_number == 0 {
            return Err(ValidationError::InvalidTurnNumber);
        }
        let target_text = self.target_text.trim().to_string();
        if target_text.is_empty() {
            return Err(ValidationError::EmptyTargetText);
        }
        let meaning = self
            .meaning
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty());

        Ok(NewTurn {
            session_id: context,
            turn_number: self.turn_number,
            target_text,
            meaning,
            created_at: now,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTurn {
    pub session_id: SessionId,
    pub turn_number: u32,
    pub target_text: String,
    pub meaning: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewTurn {
    #[must_use]
    pub fn assign_id(self, id: TurnId) -> Turn {
        Turn {
            id,
            session_id: self.session_id,
            turn_number: self.turn_number,
            target_text: self.target_text,
            meaning: self.meaning,
            transcript: None,
            pronunciation: None,
            grammar: None,
            completed: false,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}

//
// ─── TURN ──────────────────────────────────────────────────────────────────────
//

/// One sentence-level exchange within a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub id: TurnId,
    pub session_id: SessionId,
    pub turn_number: u32,
    pub target_text: String,
    pub meaning: Option<String>,
    pub transcript: Option<String>,
    pub pronunciation: Option<Feedback>,
    pub grammar: Option<Feedback>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// How a patch moved the `completed` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionChange {
    Unchanged,
    /// `pending -> done`
    Completed,
    /// `done -> pending`
    Reopened,
}

impl CompletionChange {
    /// Delta to apply to the owning session's `completed_turns`.
    #[must_use]
    pub fn counter_delta(self) -> i32 {
        match self {
            CompletionChange::Unchanged => 0,
            CompletionChange::Completed => 1,
            CompletionChange::Reopened => -1,
        }
    }
}

/// Partial update of a turn; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnPatch {
    pub transcript: Option<String>,
    pub pronunciation: Option<Feedback>,
    pub grammar: Option<Feedback>,
    pub completed: Option<bool>,
}

impl TurnPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transcript.is_none()
            && self.pronunciation.is_none()
            && self.grammar.is_none()
            && self.completed.is_none()
    }

    /// Apply the patch in place and report the completion transition.
    pub fn apply(self, turn: &mut Turn, now: DateTime<Utc>) -> CompletionChange {
        if let Some(transcript) = self.transcript {
            turn.transcript = Some(transcript);
        }
        if let Some(feedback) = self.pronunciation {
            turn.pronunciation = Some(feedback);
        }
        if let Some(feedback) = self.grammar {
            turn.grammar = Some(feedback);
        }

        let change = match self.completed {
            Some(true) if !turn.completed => CompletionChange::Completed,
            Some(false) if turn.completed => CompletionChange::Reopened,
            _ => CompletionChange::Unchanged,
        };
        if let Some(completed) = self.completed {
            turn.completed = completed;
        }
        turn.updated_at = now;
        change
    }
}
