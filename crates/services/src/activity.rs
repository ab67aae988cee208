use lingo_core::model::{Session, SessionId, Turn, UserId};
use storage::repository::{SessionRepository, StorageError, TurnRepository};

/// Everything a user has practised: all sessions in any state plus their turns.
#[derive(Debug, Clone, Default)]
pub struct Activity {
    pub sessions: Vec<Session>,
    pub turns: Vec<Turn>,
}

/// Reads a user's sessions and then the turns belonging to them.
///
/// # Errors
///
/// Returns `StorageError` if either read fails.
pub async fn load_activity(
    sessions: &dyn SessionRepository,
    turns: &dyn TurnRepository,
    user: &UserId,
) -> Result<Activity, StorageError> {
    let sessions = sessions.list_sessions_for_user(user).await?;
    let ids: Vec<SessionId> = sessions.iter().map(|s| s.id).collect();
    let turns = turns.list_turns_for_sessions(&ids).await?;
    Ok(Activity { sessions, turns })
}
