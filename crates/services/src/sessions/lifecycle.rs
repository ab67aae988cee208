use std::sync::Arc;

use lingo_core::ValidationError;
use lingo_core::model::{
    EngineSettings, Session, SessionDraft, SessionId, SessionProgress, Turn, TurnDraft, TurnId,
    TurnPatch, UserId,
};
use lingo_core::progress::{completion_summary, session_detail};
use serde::Serialize;
use storage::repository::{SessionCompletion, SessionRepository, StorageError, TurnRepository};
use tracing::{info, warn};

use crate::Clock;
use crate::badge_service::BadgeService;
use crate::error::{InvalidState, SessionError};
use crate::progress::ProgressService;

/// Response of a successful completion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletedSession {
    pub session: Session,
    pub summary: SessionProgress,
}

/// A session together with its turns in turn order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionDetail {
    pub session: Session,
    pub turns: Vec<Turn>,
}

/// Services notified after a user's data changes.
#[derive(Clone)]
struct Followups {
    progress: ProgressService,
    badges: BadgeService,
}

/// Drives sessions and turns through their lifecycle and keeps the session
/// counters in step with the turns.
#[derive(Clone)]
pub struct SessionLifecycleService {
    clock: Clock,
    settings: EngineSettings,
    sessions: Arc<dyn SessionRepository>,
    turns: Arc<dyn TurnRepository>,
    followups: Option<Followups>,
}

impl SessionLifecycleService {
    #[must_use]
    pub fn new(
        clock: Clock,
        settings: EngineSettings,
        sessions: Arc<dyn SessionRepository>,
        turns: Arc<dyn TurnRepository>,
    ) -> Self {
        Self {
            clock,
            settings,
            sessions,
            turns,
            followups: None,
        }
    }

    /// Invalidate cached progress after every mutation and award badges
    /// after every completion.
    #[must_use]
    pub fn with_followups(mut self, progress: ProgressService, badges: BadgeService) -> Self {
        self.followups = Some(Followups { progress, badges });
        self
    }

    /// Start a new session for `user`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Validation` for a malformed language code and
    /// `SessionError::Storage` if the insert fails.
    pub async fn create_session(
        &self,
        user: &UserId,
        draft: SessionDraft,
    ) -> Result<Session, SessionError> {
        let new_session = draft.validate(user.clone(), self.clock.now())?;
        let session = self.sessions.insert_session(&new_session).await?;
        info!(user = %user, session = %session.id, language = %session.target_language, "session created");
        self.invalidate(user);
        Ok(session)
    }

    /// Add a turn to an open session. The store raises `total_turns` to at
    /// least the new turn number in the same write.
    ///
    /// # Errors
    ///
    /// - `SessionError::NotFound` if the session is missing or owned by someone else.
    /// - `SessionError::InvalidState` if the session is completed.
    /// - `SessionError::Validation` for a mismatched session id, turn number 0,
    ///   empty text, or a turn number already taken.
    /// - `SessionError::Storage` for store failures.
    pub async fn create_turn(
        &self,
        user: &UserId,
        session_id: SessionId,
        draft: TurnDraft,
    ) -> Result<Turn, SessionError> {
        let session = self.owned_session(user, session_id).await?;
        if session.is_completed() {
            return Err(InvalidState::AlreadyCompleted.into());
        }

        let new_turn = draft.validate(session_id, self.clock.now())?;
        let turn = match self.turns.insert_turn(&new_turn).await {
            Ok(turn) => turn,
            Err(StorageError::Conflict) => {
                return Err(ValidationError::DuplicateTurnNumber {
                    turn_number: new_turn.turn_number,
                }
                .into());
            }
            Err(err) => return Err(err.into()),
        };

        info!(session = %session_id, turn = turn.turn_number, "turn created");
        self.invalidate(user);
        Ok(turn)
    }

    /// Apply a partial update to a turn.
    ///
    /// A change of the `completed` flag moves the session's
    /// `completed_turns` by one. That counter write is best-effort: a failure
    /// is logged and the updated turn is still returned.
    ///
    /// # Errors
    ///
    /// - `SessionError::NotFound` if the session or turn is missing, owned by
    ///   someone else, or the turn belongs to another session.
    /// - `SessionError::InvalidState` if the session is completed.
    /// - `SessionError::Storage` if the turn write fails.
    pub async fn update_turn(
        &self,
        user: &UserId,
        session_id: SessionId,
        turn_id: TurnId,
        patch: TurnPatch,
    ) -> Result<Turn, SessionError> {
        let session = self.owned_session(user, session_id).await?;
        if session.is_completed() {
            return Err(InvalidState::AlreadyCompleted.into());
        }
        let mut turn = self.turns.get_turn(turn_id).await?;
        if turn.session_id != session_id {
            return Err(SessionError::NotFound);
        }

        let change = patch.apply(&mut turn, self.clock.now());
        let turn = self.turns.update_turn(&turn).await?;

        let delta = change.counter_delta();
        if delta != 0 {
            if let Err(err) = self.sessions.adjust_completed_turns(session_id, delta).await {
                warn!(session = %session_id, delta, error = %err, "completed turn counter not updated");
            }
        }
        self.invalidate(user);
        Ok(turn)
    }

    /// Close a session and write its final summary.
    ///
    /// After the write, the per-turn detail is attached to the stored
    /// snapshot, eligible badges are awarded and cached progress is dropped.
    /// None of those steps can fail the completion.
    ///
    /// # Errors
    ///
    /// - `SessionError::NotFound` if the session is missing or owned by someone else.
    /// - `SessionError::InvalidState` if it already ended or has fewer turns
    ///   than the configured minimum. Nothing is written in that case.
    /// - `SessionError::Storage` if reading turns or the completion write fails.
    pub async fn complete_session(
        &self,
        user: &UserId,
        session_id: SessionId,
    ) -> Result<CompletedSession, SessionError> {
        let session = self.owned_session(user, session_id).await?;
        if session.is_completed() {
            return Err(InvalidState::AlreadyCompleted.into());
        }
        let minimum = self.settings.min_turns_to_complete();
        if session.total_turns < minimum {
            return Err(InvalidState::TooFewTurns {
                total: session.total_turns,
                minimum,
            }
            .into());
        }

        let now = self.clock.now();
        let turns = self.turns.list_turns(session_id).await?;
        let summary = completion_summary(&session, &turns, now);
        let completion = SessionCompletion {
            ended_at: now,
            completed_turns: summary.completed_turns,
            progress: summary.clone(),
        };
        let session = match self.sessions.complete_session(session_id, &completion).await {
            Ok(session) => session,
            Err(StorageError::Conflict) => return Err(InvalidState::AlreadyCompleted.into()),
            Err(err) => return Err(err.into()),
        };
        info!(
            user = %user,
            session = %session_id,
            completed = summary.completed_turns,
            total = summary.total_turns,
            "session completed"
        );

        self.after_completion(user, &summary, &turns, session_id).await;
        Ok(CompletedSession { session, summary })
    }

    async fn after_completion(
        &self,
        user: &UserId,
        summary: &SessionProgress,
        turns: &[Turn],
        session_id: SessionId,
    ) {
        let refreshed = SessionProgress {
            detail: Some(session_detail(turns)),
            ..summary.clone()
        };
        if let Err(err) = self.sessions.update_progress(session_id, &refreshed).await {
            warn!(session = %session_id, error = %err, "session detail refresh failed");
        }

        if let Some(followups) = &self.followups {
            if let Err(err) = followups.badges.award_eligible(user).await {
                warn!(user = %user, error = %err, "badge award after completion failed");
            }
            followups.progress.invalidate(user);
        }
    }

    /// A session and its turns.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotFound` if the session is missing or owned by
    /// someone else, and `SessionError::Storage` for read failures.
    pub async fn get_session(
        &self,
        user: &UserId,
        session_id: SessionId,
    ) -> Result<SessionDetail, SessionError> {
        let session = self.owned_session(user, session_id).await?;
        let turns = self.turns.list_turns(session_id).await?;
        Ok(SessionDetail { session, turns })
    }

    /// One page of the user's sessions, newest first.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` for read failures.
    pub async fn list_sessions(
        &self,
        user: &UserId,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<Session>, SessionError> {
        Ok(self.sessions.list_sessions_page(user, offset, limit).await?)
    }

    async fn owned_session(
        &self,
        user: &UserId,
        session_id: SessionId,
    ) -> Result<Session, SessionError> {
        let session = self.sessions.get_session(session_id).await?;
        if &session.user_id != user {
            return Err(SessionError::NotFound);
        }
        Ok(session)
    }

    fn invalidate(&self, user: &UserId) {
        if let Some(followups) = &self.followups {
            followups.progress.invalidate(user);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use lingo_core::badges::BadgeCatalog;
    use lingo_core::model::{Difficulty, EarnedBadge, Feedback, NewSession, NewTurn, SessionState};
    use lingo_core::time::fixed_now;
    use std::sync::atomic::{AtomicBool, Ordering};
    use storage::repository::{BadgeRepository, InMemoryRepository};

    fn user() -> UserId {
        UserId::new("learner").unwrap()
    }

    fn lifecycle(repo: &InMemoryRepository) -> SessionLifecycleService {
        SessionLifecycleService::new(
            Clock::fixed(fixed_now()),
            EngineSettings::default(),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
        )
    }

    fn with_followups(repo: &InMemoryRepository) -> (SessionLifecycleService, ProgressService) {
        let clock = Clock::fixed(fixed_now());
        let progress = ProgressService::new(
            clock.clone(),
            &EngineSettings::default(),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
        );
        let badges = BadgeService::new(
            clock,
            Arc::new(BadgeCatalog::builtin()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
        );
        let svc = lifecycle(repo).with_followups(progress.clone(), badges);
        (svc, progress)
    }

    fn turn(session_id: SessionId, turn_number: u32) -> TurnDraft {
        TurnDraft {
            session_id,
            turn_number,
            target_text: format!("Frase {turn_number}"),
            meaning: None,
        }
    }

    fn done(score: f64) -> TurnPatch {
        TurnPatch {
            transcript: Some("frase".into()),
            pronunciation: Some(Feedback::scored(score)),
            grammar: None,
            completed: Some(true),
        }
    }

    async fn completed_turns(repo: &InMemoryRepository, id: SessionId) -> u32 {
        repo.get_session(id).await.unwrap().completed_turns
    }

    async fn open_session(svc: &SessionLifecycleService) -> Session {
        svc.create_session(&user(), SessionDraft::new("es", Difficulty::Beginner))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn completing_without_turns_is_refused() {
        let repo = InMemoryRepository::new();
        let svc = lifecycle(&repo);
        let session = open_session(&svc).await;

        let err = svc.complete_session(&user(), session.id).await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::InvalidState(InvalidState::TooFewTurns { total: 0, minimum: 1 })
        ));
        let stored = repo.get_session(session.id).await.unwrap();
        assert_eq!(stored.state(), SessionState::InProgress);
    }

    #[tokio::test]
    async fn completing_twice_fails_without_mutation() {
        let repo = InMemoryRepository::new();
        let svc = lifecycle(&repo);
        let session = open_session(&svc).await;
        let t = svc.create_turn(&user(), session.id, turn(session.id, 1)).await.unwrap();
        svc.update_turn(&user(), session.id, t.id, done(80.0)).await.unwrap();

        let completed = svc.complete_session(&user(), session.id).await.unwrap();
        assert_eq!(completed.summary.completion_rate, 100.0);
        assert_eq!(completed.summary.average_pronunciation, Some(80.0));
        assert_eq!(completed.summary.average_grammar, None);
        let before = repo.get_session(session.id).await.unwrap();
        assert!(before.progress.as_ref().unwrap().detail.is_some());

        let err = svc.complete_session(&user(), session.id).await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::InvalidState(InvalidState::AlreadyCompleted)
        ));
        assert_eq!(repo.get_session(session.id).await.unwrap(), before);

        let late = svc.create_turn(&user(), session.id, turn(session.id, 2)).await;
        assert!(matches!(late, Err(SessionError::InvalidState(_))));
    }

    #[tokio::test]
    async fn turn_for_other_session_is_a_validation_error() {
        let repo = InMemoryRepository::new();
        let svc = lifecycle(&repo);
        let session = open_session(&svc).await;

        let err = svc
            .create_turn(&user(), session.id, turn(SessionId::new(999), 1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::Validation(ValidationError::SessionMismatch { .. })
        ));
        assert!(repo.list_turns(session.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn total_turns_tracks_the_highest_turn_number() {
        let repo = InMemoryRepository::new();
        let svc = lifecycle(&repo);
        let session = open_session(&svc).await;

        for n in [3, 1, 2] {
            svc.create_turn(&user(), session.id, turn(session.id, n)).await.unwrap();
        }
        assert_eq!(repo.get_session(session.id).await.unwrap().total_turns, 3);

        let dup = svc.create_turn(&user(), session.id, turn(session.id, 2)).await;
        assert!(matches!(
            dup,
            Err(SessionError::Validation(ValidationError::DuplicateTurnNumber { turn_number: 2 }))
        ));
    }

    #[tokio::test]
    async fn toggling_completion_restores_the_counter() {
        let repo = InMemoryRepository::new();
        let svc = lifecycle(&repo);
        let session = open_session(&svc).await;
        let first = svc.create_turn(&user(), session.id, turn(session.id, 1)).await.unwrap();
        let second = svc.create_turn(&user(), session.id, turn(session.id, 2)).await.unwrap();
        svc.update_turn(&user(), session.id, first.id, done(70.0)).await.unwrap();
        assert_eq!(completed_turns(&repo, session.id).await, 1);

        let reopen = TurnPatch {
            completed: Some(false),
            ..TurnPatch::default()
        };
        svc.update_turn(&user(), session.id, second.id, reopen.clone()).await.unwrap();
        assert_eq!(completed_turns(&repo, session.id).await, 1);

        svc.update_turn(&user(), session.id, first.id, reopen).await.unwrap();
        assert_eq!(completed_turns(&repo, session.id).await, 0);
        svc.update_turn(&user(), session.id, first.id, done(70.0)).await.unwrap();
        assert_eq!(completed_turns(&repo, session.id).await, 1);
        svc.update_turn(&user(), session.id, first.id, done(75.0)).await.unwrap();
        assert_eq!(completed_turns(&repo, session.id).await, 1);
    }

    #[tokio::test]
    async fn other_users_cannot_see_or_touch_a_session() {
        let repo = InMemoryRepository::new();
        let svc = lifecycle(&repo);
        let session = open_session(&svc).await;
        let t = svc.create_turn(&user(), session.id, turn(session.id, 1)).await.unwrap();
        let intruder = UserId::new("someone-else").unwrap();

        assert!(matches!(
            svc.get_session(&intruder, session.id).await,
            Err(SessionError::NotFound)
        ));
        assert!(matches!(
            svc.update_turn(&intruder, session.id, t.id, done(50.0)).await,
            Err(SessionError::NotFound)
        ));
        assert!(matches!(
            svc.complete_session(&user(), SessionId::new(404)).await,
            Err(SessionError::NotFound)
        ));

        let other = open_session(&svc).await;
        assert!(matches!(
            svc.update_turn(&user(), other.id, t.id, done(50.0)).await,
            Err(SessionError::NotFound)
        ));
    }

    #[tokio::test]
    async fn completion_awards_badges_once_and_refreshes_progress() {
        let repo = InMemoryRepository::new();
        let (svc, progress) = with_followups(&repo);

        let before = progress.compute_progress(&user()).await;
        assert_eq!(before.total_sessions, 0);

        let session = open_session(&svc).await;
        let t = svc.create_turn(&user(), session.id, turn(session.id, 1)).await.unwrap();
        svc.update_turn(&user(), session.id, t.id, done(92.0)).await.unwrap();
        svc.complete_session(&user(), session.id).await.unwrap();

        let after = progress.compute_progress(&user()).await;
        assert_eq!(after.completed_sessions, 1);

        let earned = repo.list_earned(&user()).await.unwrap();
        let ids: Vec<&str> = earned.iter().map(|b| b.badge_id.as_str()).collect();
        assert!(ids.contains(&"first_session"));
        assert!(ids.contains(&"pronunciation_pro"));

        let second = open_session(&svc).await;
        let t = svc.create_turn(&user(), second.id, turn(second.id, 1)).await.unwrap();
        svc.update_turn(&user(), second.id, t.id, done(60.0)).await.unwrap();
        svc.complete_session(&user(), second.id).await.unwrap();
        let again = repo.list_earned(&user()).await.unwrap();
        assert_eq!(
            again.iter().filter(|b| b.badge_id.as_str() == "first_session").count(),
            1
        );
    }

    #[tokio::test]
    async fn history_page_is_newest_first() {
        let repo = InMemoryRepository::new();
        let svc = lifecycle(&repo);
        let first = open_session(&svc).await;
        let second = open_session(&svc).await;

        let page = svc.list_sessions(&user(), 0, 10).await.unwrap();
        let ids: Vec<SessionId> = page.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);

        let detail = svc.get_session(&user(), first.id).await.unwrap();
        assert!(detail.turns.is_empty());
    }

    /// In-memory store whose individual writes can be switched to fail.
    #[derive(Default)]
    struct FlakyStore {
        inner: InMemoryRepository,
        fail_turn_insert: AtomicBool,
        fail_adjust: AtomicBool,
        fail_progress: AtomicBool,
        fail_badges: AtomicBool,
    }

    fn down(flag: &AtomicBool) -> Result<(), StorageError> {
        if flag.load(Ordering::SeqCst) {
            return Err(StorageError::Connection("down".into()));
        }
        Ok(())
    }

    #[async_trait]
    impl SessionRepository for FlakyStore {
        async fn insert_session(&self, session: &NewSession) -> Result<Session, StorageError> {
            self.inner.insert_session(session).await
        }
        async fn get_session(&self, id: SessionId) -> Result<Session, StorageError> {
            self.inner.get_session(id).await
        }
        async fn list_sessions_for_user(&self, user: &UserId) -> Result<Vec<Session>, StorageError> {
            self.inner.list_sessions_for_user(user).await
        }
        async fn list_sessions_page(
            &self,
            user: &UserId,
            offset: u32,
            limit: u32,
        ) -> Result<Vec<Session>, StorageError> {
            self.inner.list_sessions_page(user, offset, limit).await
        }
        async fn complete_session(
            &self,
            id: SessionId,
            completion: &SessionCompletion,
        ) -> Result<Session, StorageError> {
            self.inner.complete_session(id, completion).await
        }
        async fn update_progress(
            &self,
            id: SessionId,
            progress: &SessionProgress,
        ) -> Result<(), StorageError> {
            down(&self.fail_progress)?;
            self.inner.update_progress(id, progress).await
        }
        async fn adjust_completed_turns(&self, id: SessionId, d: i32) -> Result<u32, StorageError> {
            down(&self.fail_adjust)?;
            self.inner.adjust_completed_turns(id, d).await
        }
    }

    #[async_trait]
    impl TurnRepository for FlakyStore {
        async fn insert_turn(&self, turn: &NewTurn) -> Result<Turn, StorageError> {
            down(&self.fail_turn_insert)?;
            self.inner.insert_turn(turn).await
        }
        async fn get_turn(&self, id: TurnId) -> Result<Turn, StorageError> {
            self.inner.get_turn(id).await
        }
        async fn list_turns(&self, session_id: SessionId) -> Result<Vec<Turn>, StorageError> {
            self.inner.list_turns(session_id).await
        }
        async fn list_turns_for_sessions(
            &self,
            session_ids: &[SessionId],
        ) -> Result<Vec<Turn>, StorageError> {
            self.inner.list_turns_for_sessions(session_ids).await
        }
        async fn update_turn(&self, turn: &Turn) -> Result<Turn, StorageError> {
            self.inner.update_turn(turn).await
        }
    }

    #[async_trait]
    impl BadgeRepository for FlakyStore {
        async fn list_earned(&self, user: &UserId) -> Result<Vec<EarnedBadge>, StorageError> {
            down(&self.fail_badges)?;
            self.inner.list_earned(user).await
        }
        async fn award_badge(&self, badge: &EarnedBadge) -> Result<bool, StorageError> {
            down(&self.fail_badges)?;
            self.inner.award_badge(badge).await
        }
    }

    fn flaky_lifecycle(store: &Arc<FlakyStore>) -> (SessionLifecycleService, ProgressService) {
        let clock = Clock::fixed(fixed_now());
        let sessions: Arc<dyn SessionRepository> = store.clone();
        let turns: Arc<dyn TurnRepository> = store.clone();
        let badge_store: Arc<dyn BadgeRepository> = store.clone();
        let progress = ProgressService::new(
            clock.clone(),
            &EngineSettings::default(),
            Arc::clone(&sessions),
            Arc::clone(&turns),
        );
        let badges = BadgeService::new(
            clock.clone(),
            Arc::new(BadgeCatalog::builtin()),
            Arc::clone(&sessions),
            Arc::clone(&turns),
            badge_store,
        );
        let svc = SessionLifecycleService::new(clock, EngineSettings::default(), sessions, turns)
            .with_followups(progress.clone(), badges);
        (svc, progress)
    }

    #[tokio::test]
    async fn failed_turn_write_can_be_retried() {
        let store = Arc::new(FlakyStore::default());
        let (svc, _) = flaky_lifecycle(&store);
        let session = open_session(&svc).await;

        store.fail_turn_insert.store(true, Ordering::SeqCst);
        let err = svc
            .create_turn(&user(), session.id, turn(session.id, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Storage(StorageError::Connection(_))));
        assert!(store.inner.list_turns(session.id).await.unwrap().is_empty());
        assert_eq!(store.inner.get_session(session.id).await.unwrap().total_turns, 0);

        store.fail_turn_insert.store(false, Ordering::SeqCst);
        let created = svc
            .create_turn(&user(), session.id, turn(session.id, 1))
            .await
            .unwrap();
        assert_eq!(created.turn_number, 1);
        assert_eq!(store.inner.get_session(session.id).await.unwrap().total_turns, 1);
        svc.complete_session(&user(), session.id).await.unwrap();
    }

    #[tokio::test]
    async fn counter_failure_still_saves_the_turn() {
        let store = Arc::new(FlakyStore::default());
        let (svc, _) = flaky_lifecycle(&store);
        let session = open_session(&svc).await;
        let t = svc.create_turn(&user(), session.id, turn(session.id, 1)).await.unwrap();

        store.fail_adjust.store(true, Ordering::SeqCst);
        let updated = svc
            .update_turn(&user(), session.id, t.id, done(88.0))
            .await
            .unwrap();
        assert!(updated.completed);

        let stored = store.inner.get_turn(t.id).await.unwrap();
        assert!(stored.completed);
        assert_eq!(
            stored.pronunciation.as_ref().and_then(Feedback::overall_score),
            Some(88.0)
        );
        assert_eq!(store.inner.get_session(session.id).await.unwrap().completed_turns, 0);
    }

    #[tokio::test]
    async fn completion_survives_a_failed_detail_refresh() {
        let store = Arc::new(FlakyStore::default());
        let (svc, progress) = flaky_lifecycle(&store);
        let session = open_session(&svc).await;
        let t = svc.create_turn(&user(), session.id, turn(session.id, 1)).await.unwrap();
        svc.update_turn(&user(), session.id, t.id, done(90.0)).await.unwrap();
        assert_eq!(progress.compute_progress(&user()).await.completed_sessions, 0);

        store.fail_progress.store(true, Ordering::SeqCst);
        let completed = svc.complete_session(&user(), session.id).await.unwrap();
        assert_eq!(completed.session.ended_at, Some(fixed_now()));

        let stored = store.inner.get_session(session.id).await.unwrap();
        assert_eq!(stored.state(), SessionState::Completed);
        assert!(stored.progress.unwrap().detail.is_none());
        assert!(!store.inner.list_earned(&user()).await.unwrap().is_empty());
        assert_eq!(progress.compute_progress(&user()).await.completed_sessions, 1);
    }

    #[tokio::test]
    async fn completion_survives_a_failed_badge_award() {
        let store = Arc::new(FlakyStore::default());
        let (svc, progress) = flaky_lifecycle(&store);
        let session = open_session(&svc).await;
        let t = svc.create_turn(&user(), session.id, turn(session.id, 1)).await.unwrap();
        svc.update_turn(&user(), session.id, t.id, done(90.0)).await.unwrap();

        store.fail_badges.store(true, Ordering::SeqCst);
        svc.complete_session(&user(), session.id).await.unwrap();

        let stored = store.inner.get_session(session.id).await.unwrap();
        assert_eq!(stored.state(), SessionState::Completed);
        assert!(stored.progress.unwrap().detail.is_some());
        assert!(store.inner.list_earned(&user()).await.unwrap().is_empty());
        assert_eq!(progress.compute_progress(&user()).await.completed_sessions, 1);
    }
}
