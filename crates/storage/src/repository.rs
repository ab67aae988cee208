use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lingo_core::model::{
    BadgeId, EarnedBadge, NewSession, NewTurn, Session, SessionId, SessionProgress, Turn, TurnId,
    UserId,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Fields written in one update when a session completes.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionCompletion {
    pub ended_at: DateTime<Utc>,
    pub completed_turns: u32,
    pub progress: SessionProgress,
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Insert a new session and return it with its assigned id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the session cannot be stored.
    async fn insert_session(&self, session: &NewSession) -> Result<Session, StorageError>;

    /// Fetch a session by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_session(&self, id: SessionId) -> Result<Session, StorageError>;

    /// All sessions of a user in any state, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn list_sessions_for_user(&self, user: &UserId) -> Result<Vec<Session>, StorageError>;

    /// One page of a user's sessions, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn list_sessions_page(
        &self,
        user: &UserId,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<Session>, StorageError>;

    /// Write `ended_at`, the final counter and the progress snapshot, only if
    /// the session has not ended yet.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if `ended_at` is already set and
    /// `StorageError::NotFound` if the session does not exist.
    async fn complete_session(
        &self,
        id: SessionId,
        completion: &SessionCompletion,
    ) -> Result<Session, StorageError>;

    /// Replace the progress snapshot of a session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the session does not exist.
    async fn update_progress(
        &self,
        id: SessionId,
        progress: &SessionProgress,
    ) -> Result<(), StorageError>;

    /// Atomically add `delta` to `completed_turns`, clamped to `[0, total_turns]`;
    /// returns the new value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the session does not exist.
    async fn adjust_completed_turns(&self, id: SessionId, delta: i32)
    -> Result<u32, StorageError>;
}

#[async_trait]
pub trait TurnRepository: Send + Sync {
    /// Insert a new turn and return it with its assigned id.
    ///
    /// In the same write the owning session's `total_turns` becomes
    /// `max(total_turns, turn_number)`. Either both changes land or neither does.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the session already has a turn with
    /// this number and `StorageError::NotFound` if the session does not exist.
    async fn insert_turn(&self, turn: &NewTurn) -> Result<Turn, StorageError>;

    /// Fetch a turn by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_turn(&self, id: TurnId) -> Result<Turn, StorageError>;

    /// Turns of one session ordered by turn number.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn list_turns(&self, session_id: SessionId) -> Result<Vec<Turn>, StorageError>;

    /// Turns of several sessions, ordered by session then turn number.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn list_turns_for_sessions(
        &self,
        session_ids: &[SessionId],
    ) -> Result<Vec<Turn>, StorageError>;

    /// Persist the mutable fields of a turn and return the stored row.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the turn does not exist.
    async fn update_turn(&self, turn: &Turn) -> Result<Turn, StorageError>;
}

#[async_trait]
pub trait BadgeRepository: Send + Sync {
    /// Badges held by a user, oldest award first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn list_earned(&self, user: &UserId) -> Result<Vec<EarnedBadge>, StorageError>;

    /// Insert the badge unless the user already holds it.
    ///
    /// Returns `true` when a row was written.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    async fn award_badge(&self, badge: &EarnedBadge) -> Result<bool, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    sessions: Arc<Mutex<HashMap<SessionId, Session>>>,
    turns: Arc<Mutex<HashMap<TurnId, Turn>>>,
    earned: Arc<Mutex<HashMap<(UserId, BadgeId), EarnedBadge>>>,
    next_session_id: Arc<AtomicU64>,
    next_turn_id: Arc<AtomicU64>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StorageError> {
    mutex
        .lock()
        .map_err(|e| StorageError::Connection(e.to_string()))
}

fn next_id(counter: &AtomicU64) -> u64 {
    counter.fetch_add(1, Ordering::Relaxed) + 1
}

#[async_trait]
impl SessionRepository for InMemoryRepository {
    async fn insert_session(&self, session: &NewSession) -> Result<Session, StorageError> {
        let id = SessionId::new(next_id(&self.next_session_id));
        let stored = session.clone().assign_id(id);
        lock(&self.sessions)?.insert(id, stored.clone());
        Ok(stored)
    }

    async fn get_session(&self, id: SessionId) -> Result<Session, StorageError> {
        lock(&self.sessions)?
            .get(&id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn list_sessions_for_user(&self, user: &UserId) -> Result<Vec<Session>, StorageError> {
        let guard = lock(&self.sessions)?;
        let mut out: Vec<Session> = guard
            .values()
            .filter(|s| &s.user_id == user)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(out)
    }

    async fn list_sessions_page(
        &self,
        user: &UserId,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<Session>, StorageError> {
        let mut all = self.list_sessions_for_user(user).await?;
        all.reverse();
        Ok(all
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn complete_session(
        &self,
        id: SessionId,
        completion: &SessionCompletion,
    ) -> Result<Session, StorageError> {
        let mut guard = lock(&self.sessions)?;
        let session = guard.get_mut(&id).ok_or(StorageError::NotFound)?;
        if session.ended_at.is_some() {
            return Err(StorageError::Conflict);
        }
        session.ended_at = Some(completion.ended_at);
        session.completed_turns = completion.completed_turns.min(session.total_turns);
        session.progress = Some(completion.progress.clone());
        Ok(session.clone())
    }

    async fn update_progress(
        &self,
        id: SessionId,
        progress: &SessionProgress,
    ) -> Result<(), StorageError> {
        let mut guard = lock(&self.sessions)?;
        let session = guard.get_mut(&id).ok_or(StorageError::NotFound)?;
        session.progress = Some(progress.clone());
        Ok(())
    }

    async fn adjust_completed_turns(
        &self,
        id: SessionId,
        delta: i32,
    ) -> Result<u32, StorageError> {
        let mut guard = lock(&self.sessions)?;
        let session = guard.get_mut(&id).ok_or(StorageError::NotFound)?;
        let adjusted = i64::from(session.completed_turns) + i64::from(delta);
        let clamped = adjusted.clamp(0, i64::from(session.total_turns));
        session.completed_turns = u32::try_from(clamped).unwrap_or(session.total_turns);
        Ok(session.completed_turns)
    }
}

#[async_trait]
impl TurnRepository for InMemoryRepository {
    async fn insert_turn(&self, turn: &NewTurn) -> Result<Turn, StorageError> {
        // sessions before turns, held together for the whole write
        let mut sessions = lock(&self.sessions)?;
        let mut turns = lock(&self.turns)?;
        let session = sessions
            .get_mut(&turn.session_id)
            .ok_or(StorageError::NotFound)?;
        if turns
            .values()
            .any(|t| t.session_id == turn.session_id && t.turn_number == turn.turn_number)
        {
            return Err(StorageError::Conflict);
        }
        let id = TurnId::new(next_id(&self.next_turn_id));
        let stored = turn.clone().assign_id(id);
        turns.insert(id, stored.clone());
        session.total_turns = session.total_turns.max(turn.turn_number);
        Ok(stored)
    }

    async fn get_turn(&self, id: TurnId) -> Result<Turn, StorageError> {
        lock(&self.turns)?
            .get(&id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn list_turns(&self, session_id: SessionId) -> Result<Vec<Turn>, StorageError> {
        self.list_turns_for_sessions(&[session_id]).await
    }

    async fn list_turns_for_sessions(
        &self,
        session_ids: &[SessionId],
    ) -> Result<Vec<Turn>, StorageError> {
        let guard = lock(&self.turns)?;
        let mut out: Vec<Turn> = guard
            .values()
            .filter(|t| session_ids.contains(&t.session_id))
            .cloned()
            .collect();
        out.sort_by_key(|t| (t.session_id, t.turn_number));
        Ok(out)
    }

    async fn update_turn(&self, turn: &Turn) -> Result<Turn, StorageError> {
        let mut guard = lock(&self.turns)?;
        let stored = guard.get_mut(&turn.id).ok_or(StorageError::NotFound)?;
        stored.transcript.clone_from(&turn.transcript);
        stored.pronunciation.clone_from(&turn.pronunciation);
        stored.grammar.clone_from(&turn.grammar);
        stored.completed = turn.completed;
        stored.updated_at = turn.updated_at;
        Ok(stored.clone())
    }
}

#[async_trait]
impl BadgeRepository for InMemoryRepository {
    async fn list_earned(&self, user: &UserId) -> Result<Vec<EarnedBadge>, StorageError> {
        let guard = lock(&self.earned)?;
        let mut out: Vec<EarnedBadge> = guard
            .values()
            .filter(|b| &b.user_id == user)
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            a.awarded_at
                .cmp(&b.awarded_at)
                .then_with(|| a.badge_id.cmp(&b.badge_id))
        });
        Ok(out)
    }

    async fn award_badge(&self, badge: &EarnedBadge) -> Result<bool, StorageError> {
        let mut guard = lock(&self.earned)?;
        let key = (badge.user_id.clone(), badge.badge_id.clone());
        if guard.contains_key(&key) {
            return Ok(false);
        }
        guard.insert(key, badge.clone());
        Ok(true)
    }
}

/// Aggregates the engine repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub sessions: Arc<dyn SessionRepository>,
    pub turns: Arc<dyn TurnRepository>,
    pub badges: Arc<dyn BadgeRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let sessions: Arc<dyn SessionRepository> = Arc::new(repo.clone());
        let turns: Arc<dyn TurnRepository> = Arc::new(repo.clone());
        let badges: Arc<dyn BadgeRepository> = Arc::new(repo);
        Self {
            sessions,
            turns,
            badges,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lingo_core::model::{Difficulty, SessionDraft, TurnDraft};
    use lingo_core::time::fixed_now;

    fn user() -> UserId {
        UserId::new("learner-1").unwrap()
    }

    fn draft_session() -> NewSession {
        SessionDraft::new("es", Difficulty::Beginner)
            .validate(user(), fixed_now())
            .unwrap()
    }

    fn draft_turn(session_id: SessionId, number: u32) -> NewTurn {
        TurnDraft {
            session_id,
            turn_number: number,
            target_text: "Hola".into(),
            meaning: Some("Hello".into()),
        }
        .validate(session_id, fixed_now())
        .unwrap()
    }

    fn progress() -> SessionProgress {
        SessionProgress {
            completion_rate: 100.0,
            average_pronunciation: None,
            average_grammar: None,
            duration_minutes: 3.0,
            completed_turns: 1,
            total_turns: 1,
            detail: None,
        }
    }

    async fn total_turns(repo: &InMemoryRepository, id: SessionId) -> u32 {
        repo.get_session(id).await.unwrap().total_turns
    }

    #[tokio::test]
    async fn counters_are_maintained_atomically() {
        let repo = InMemoryRepository::new();
        let session = repo.insert_session(&draft_session()).await.unwrap();
        assert_eq!(session.id, SessionId::new(1));

        repo.insert_turn(&draft_turn(session.id, 3)).await.unwrap();
        assert_eq!(total_turns(&repo, session.id).await, 3);
        repo.insert_turn(&draft_turn(session.id, 2)).await.unwrap();
        assert_eq!(total_turns(&repo, session.id).await, 3);

        assert_eq!(repo.adjust_completed_turns(session.id, -1).await.unwrap(), 0);
        for _ in 0..5 {
            repo.adjust_completed_turns(session.id, 1).await.unwrap();
        }
        assert_eq!(repo.get_session(session.id).await.unwrap().completed_turns, 3);
    }

    #[tokio::test]
    async fn duplicate_turn_number_conflicts() {
        let repo = InMemoryRepository::new();
        let session = repo.insert_session(&draft_session()).await.unwrap();
        repo.insert_turn(&draft_turn(session.id, 2)).await.unwrap();
        repo.insert_turn(&draft_turn(session.id, 1)).await.unwrap();

        let err = repo.insert_turn(&draft_turn(session.id, 2)).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
        assert_eq!(total_turns(&repo, session.id).await, 2);

        let numbers: Vec<u32> = repo
            .list_turns(session.id)
            .await
            .unwrap()
            .iter()
            .map(|t| t.turn_number)
            .collect();
        assert_eq!(numbers, vec![1, 2]);
    }

    #[tokio::test]
    async fn turn_for_missing_session_leaves_nothing_behind() {
        let repo = InMemoryRepository::new();
        let err = repo
            .insert_turn(&draft_turn(SessionId::new(7), 1))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
        assert!(repo.list_turns(SessionId::new(7)).await.unwrap().is_empty());

        let session = repo.insert_session(&draft_session()).await.unwrap();
        let turn = repo.insert_turn(&draft_turn(session.id, 1)).await.unwrap();
        assert_eq!(turn.session_id, session.id);
        assert_eq!(total_turns(&repo, session.id).await, 1);
    }

    #[tokio::test]
    async fn completion_is_written_once() {
        let repo = InMemoryRepository::new();
        let session = repo.insert_session(&draft_session()).await.unwrap();
        repo.insert_turn(&draft_turn(session.id, 1)).await.unwrap();
        let completion = SessionCompletion {
            ended_at: fixed_now(),
            completed_turns: 1,
            progress: progress(),
        };

        let done = repo.complete_session(session.id, &completion).await.unwrap();
        assert_eq!(done.ended_at, Some(fixed_now()));
        assert_eq!(done.completed_turns, 1);

        let again = SessionCompletion {
            ended_at: fixed_now() + chrono::Duration::hours(1),
            ..completion
        };
        let err = repo.complete_session(session.id, &again).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
        assert_eq!(
            repo.get_session(session.id).await.unwrap().ended_at,
            Some(fixed_now())
        );
    }

    #[tokio::test]
    async fn award_badge_is_insert_if_absent() {
        let repo = InMemoryRepository::new();
        let badge = EarnedBadge {
            user_id: user(),
            badge_id: BadgeId::from("first_session"),
            awarded_at: fixed_now(),
            data: None,
        };
        assert!(repo.award_badge(&badge).await.unwrap());
        assert!(!repo.award_badge(&badge).await.unwrap());
        assert_eq!(repo.list_earned(&user()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn pages_are_newest_first() {
        let repo = InMemoryRepository::new();
        for _ in 0..3 {
            repo.insert_session(&draft_session()).await.unwrap();
        }
        let page = repo.list_sessions_page(&user(), 1, 5).await.unwrap();
        let ids: Vec<u64> = page.iter().map(|s| s.id.value()).collect();
        assert_eq!(ids, vec![2, 1]);
    }
}
