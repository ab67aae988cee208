use std::sync::Arc;

use lingo_core::badges::{BadgeCatalog, BadgeOverview, EarnedBadgeView};
use lingo_core::model::{
    EngineSettings, ProgressMetrics, Session, SessionDraft, SessionId, Turn, TurnDraft, TurnId,
    TurnPatch, UserId,
};
use storage::repository::Storage;

use crate::Clock;
use crate::badge_service::BadgeService;
use crate::error::{AppServicesError, BadgeError, SessionError};
use crate::progress::ProgressService;
use crate::sessions::{CompletedSession, SessionDetail, SessionLifecycleService};

/// The engine facade: every operation the transport layer needs, wired to
/// one store, one clock and one badge catalog.
#[derive(Clone)]
pub struct AppServices {
    progress: Arc<ProgressService>,
    badges: Arc<BadgeService>,
    lifecycle: Arc<SessionLifecycleService>,
}

impl AppServices {
    #[must_use]
    pub fn new(
        storage: &Storage,
        clock: Clock,
        settings: EngineSettings,
        catalog: BadgeCatalog,
    ) -> Self {
        let progress = ProgressService::new(
            clock.clone(),
            &settings,
            Arc::clone(&storage.sessions),
            Arc::clone(&storage.turns),
        );
        let badges = BadgeService::new(
            clock.clone(),
            Arc::new(catalog),
            Arc::clone(&storage.sessions),
            Arc::clone(&storage.turns),
            Arc::clone(&storage.badges),
        );
        let lifecycle = SessionLifecycleService::new(
            clock,
            settings,
            Arc::clone(&storage.sessions),
            Arc::clone(&storage.turns),
        )
        .with_followups(progress.clone(), badges.clone());

        Self {
            progress: Arc::new(progress),
            badges: Arc::new(badges),
            lifecycle: Arc::new(lifecycle),
        }
    }

    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the database cannot be opened or migrated.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        settings: EngineSettings,
        catalog: BadgeCatalog,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::new(&storage, clock, settings, catalog))
    }

    /// Progress metrics for `user`; never fails, see
    /// [`ProgressService::compute_progress`].
    pub async fn compute_progress(&self, user: &UserId) -> Arc<ProgressMetrics> {
        self.progress.compute_progress(user).await
    }

    /// # Errors
    ///
    /// Returns `BadgeError` if the earned badges cannot be read.
    pub async fn list_badges(&self, user: &UserId) -> Result<BadgeOverview, BadgeError> {
        self.badges.list_badges(user).await
    }

    pub async fn recent_badges(&self, user: &UserId, limit: usize) -> Vec<EarnedBadgeView> {
        self.badges.recent_badges(user, limit).await
    }

    /// # Errors
    ///
    /// See [`SessionLifecycleService::create_session`].
    pub async fn create_session(
        &self,
        user: &UserId,
        draft: SessionDraft,
    ) -> Result<Session, SessionError> {
        self.lifecycle.create_session(user, draft).await
    }

    /// # Errors
    ///
    /// See [`SessionLifecycleService::create_turn`].
    pub async fn create_turn(
        &self,
        user: &UserId,
        session_id: SessionId,
        draft: TurnDraft,
    ) -> Result<Turn, SessionError> {
        self.lifecycle.create_turn(user, session_id, draft).await
    }

    /// # Errors
    ///
    /// See [`SessionLifecycleService::update_turn`].
    pub async fn update_turn(
        &self,
        user: &UserId,
        session_id: SessionId,
        turn_id: TurnId,
        patch: TurnPatch,
    ) -> Result<Turn, SessionError> {
        self.lifecycle
            .update_turn(user, session_id, turn_id, patch)
            .await
    }

    /// # Errors
    ///
    /// See [`SessionLifecycleService::complete_session`].
    pub async fn complete_session(
        &self,
        user: &UserId,
        session_id: SessionId,
    ) -> Result<CompletedSession, SessionError> {
        self.lifecycle.complete_session(user, session_id).await
    }

    /// # Errors
    ///
    /// See [`SessionLifecycleService::get_session`].
    pub async fn get_session(
        &self,
        user: &UserId,
        session_id: SessionId,
    ) -> Result<SessionDetail, SessionError> {
        self.lifecycle.get_session(user, session_id).await
    }

    /// # Errors
    ///
    /// See [`SessionLifecycleService::list_sessions`].
    pub async fn list_sessions(
        &self,
        user: &UserId,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<Session>, SessionError> {
        self.lifecycle.list_sessions(user, offset, limit).await
    }

    pub fn invalidate_progress_cache(&self, user: &UserId) {
        self.progress.invalidate(user);
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn badges(&self) -> Arc<BadgeService> {
        Arc::clone(&self.badges)
    }

    #[must_use]
    pub fn lifecycle(&self) -> Arc<SessionLifecycleService> {
        Arc::clone(&self.lifecycle)
    }
}
