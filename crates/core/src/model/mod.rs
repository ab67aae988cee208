mod badge;
mod ids;
mod metrics;
mod session;
mod settings;
mod turn;

pub use ids::{BadgeId, ParseIdError, SessionId, TurnId, UserId};

pub use badge::{
    BadgeCategory, BadgeCriteria, BadgeDefinition, BadgeRarity, CriteriaKind, EarnedBadge,
};
pub use metrics::{ProgressMetrics, StreakInfo, Trend, TrendSummary};
pub use session::{
    Difficulty, NewSession, Session, SessionDetailMetrics, SessionDraft, SessionProgress,
    SessionState, normalize_language,
};
pub use settings::{EngineSettings, SettingsError};
pub use turn::{CompletionChange, Feedback, NewTurn, Turn, TurnDraft, TurnPatch};
