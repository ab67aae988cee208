use std::sync::Arc;

use lingo_core::model::{EngineSettings, ProgressMetrics, UserId};
use lingo_core::progress::build_metrics;
use storage::repository::{SessionRepository, TurnRepository};
use tracing::warn;

use super::cache::ProgressCache;
use crate::Clock;
use crate::activity::load_activity;
use crate::error::ProgressError;

/// Serves per-user progress metrics through the result cache.
#[derive(Clone)]
pub struct ProgressService {
    clock: Clock,
    cache: Arc<ProgressCache>,
    sessions: Arc<dyn SessionRepository>,
    turns: Arc<dyn TurnRepository>,
}

impl ProgressService {
    #[must_use]
    pub fn new(
        clock: Clock,
        settings: &EngineSettings,
        sessions: Arc<dyn SessionRepository>,
        turns: Arc<dyn TurnRepository>,
    ) -> Self {
        Self {
            clock,
            cache: Arc::new(ProgressCache::new(settings)),
            sessions,
            turns,
        }
    }

    /// Share an existing cache instead of the one built from settings.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<ProgressCache>) -> Self {
        self.cache = cache;
        self
    }

    #[must_use]
    pub fn cache(&self) -> &ProgressCache {
        &self.cache
    }

    /// Cached metrics if fresh, otherwise recompute from storage and cache.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if sessions or turns cannot be read.
    pub async fn try_compute_progress(
        &self,
        user: &UserId,
    ) -> Result<Arc<ProgressMetrics>, ProgressError> {
        let now = self.clock.now();
        if let Some(hit) = self.cache.get(user, now) {
            return Ok(hit);
        }

        let activity = load_activity(self.sessions.as_ref(), self.turns.as_ref(), user).await?;
        let metrics = Arc::new(build_metrics(&activity.sessions, &activity.turns, now));
        self.cache.insert(user.clone(), Arc::clone(&metrics), now);
        Ok(metrics)
    }

    /// Like [`Self::try_compute_progress`], but a failure yields the all-zero
    /// snapshot. The fallback is never cached.
    pub async fn compute_progress(&self, user: &UserId) -> Arc<ProgressMetrics> {
        match self.try_compute_progress(user).await {
            Ok(metrics) => metrics,
            Err(err) => {
                warn!(user = %user, error = %err, "progress computation failed; serving empty metrics");
                Arc::new(ProgressMetrics::empty())
            }
        }
    }

    /// Forget the cached metrics for `user` so the next read recomputes.
    pub fn invalidate(&self, user: &UserId) -> bool {
        self.cache.invalidate(user)
    }
}
