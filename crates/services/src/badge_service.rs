use std::sync::Arc;

use lingo_core::badges::{
    BadgeCatalog, BadgeEvidence, BadgeOverview, EarnedBadgeView, evaluate, newly_eligible,
};
use lingo_core::model::{BadgeId, EarnedBadge, UserId};
use lingo_core::progress::{build_metrics, session_performances};
use serde_json::json;
use storage::repository::{BadgeRepository, SessionRepository, TurnRepository};
use tracing::{info, warn};

use crate::Clock;
use crate::activity::{Activity, load_activity};
use crate::error::BadgeError;

/// Badge display and evaluate-then-award for one catalog.
#[derive(Clone)]
pub struct BadgeService {
    clock: Clock,
    catalog: Arc<BadgeCatalog>,
    sessions: Arc<dyn SessionRepository>,
    turns: Arc<dyn TurnRepository>,
    badges: Arc<dyn BadgeRepository>,
}

impl BadgeService {
    #[must_use]
    pub fn new(
        clock: Clock,
        catalog: Arc<BadgeCatalog>,
        sessions: Arc<dyn SessionRepository>,
        turns: Arc<dyn TurnRepository>,
        badges: Arc<dyn BadgeRepository>,
    ) -> Self {
        Self {
            clock,
            catalog,
            sessions,
            turns,
            badges,
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &BadgeCatalog {
        &self.catalog
    }

    /// Earned badges, the rest of the catalog, and progress toward each
    /// available badge.
    ///
    /// If the session history cannot be read the overview is still returned,
    /// with an empty progress list.
    ///
    /// # Errors
    ///
    /// Returns `BadgeError::Storage` if the earned badges cannot be read.
    pub async fn list_badges(&self, user: &UserId) -> Result<BadgeOverview, BadgeError> {
        let earned = self.badges.list_earned(user).await?;

        match load_activity(self.sessions.as_ref(), self.turns.as_ref(), user).await {
            Ok(activity) => {
                let now = self.clock.now();
                let metrics = build_metrics(&activity.sessions, &activity.turns, now);
                let history = session_performances(&activity.sessions, &activity.turns);
                let evidence = BadgeEvidence {
                    metrics: &metrics,
                    history: &history,
                };
                Ok(evaluate(&self.catalog, &earned, Some(&evidence)))
            }
            Err(err) => {
                warn!(user = %user, error = %err, "badge progress unavailable");
                Ok(evaluate(&self.catalog, &earned, None))
            }
        }
    }

    /// Award every badge whose requirement the user now meets.
    ///
    /// Already-held badges are never written again. Returns the ids awarded by
    /// this call.
    ///
    /// # Errors
    ///
    /// Returns `BadgeError::Storage` if reading history or writing an award fails.
    pub async fn award_eligible(&self, user: &UserId) -> Result<Vec<BadgeId>, BadgeError> {
        let earned = self.badges.list_earned(user).await?;
        let Activity { sessions, turns } =
            load_activity(self.sessions.as_ref(), self.turns.as_ref(), user).await?;

        let now = self.clock.now();
        let metrics = build_metrics(&sessions, &turns, now);
        let history = session_performances(&sessions, &turns);
        let evidence = BadgeEvidence {
            metrics: &metrics,
            history: &history,
        };

        let mut awarded = Vec::new();
        for progress in newly_eligible(&self.catalog, &earned, &evidence) {
            let badge = EarnedBadge {
                user_id: user.clone(),
                badge_id: progress.badge_id.clone(),
                awarded_at: now,
                data: Some(json!({
                    "current": progress.current,
                    "required": progress.required,
                })),
            };
            if self.badges.award_badge(&badge).await? {
                info!(user = %user, badge = %badge.badge_id, "badge awarded");
                awarded.push(badge.badge_id);
            }
        }
        Ok(awarded)
    }

    /// Up to `limit` most recently awarded badges, newest first.
    ///
    /// A storage failure is logged and yields an empty list.
    pub async fn recent_badges(&self, user: &UserId, limit: usize) -> Vec<EarnedBadgeView> {
        let earned = match self.badges.list_earned(user).await {
            Ok(earned) => earned,
            Err(err) => {
                warn!(user = %user, error = %err, "recent badge lookup failed");
                return Vec::new();
            }
        };
        let mut views = evaluate(&self.catalog, &earned, None).earned;
        views.reverse();
        views.truncate(limit);
        views
    }
}
