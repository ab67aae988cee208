//! Builds the per-user [`ProgressMetrics`] snapshot from raw rows.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Utc};

use crate::model::{
    Difficulty, ProgressMetrics, Session, SessionId, TrendSummary, Turn,
};
use crate::progress::scores::{ScoreSeries, mean_opt};
use crate::progress::{streak, trend};
use crate::time::weeks_between;

/// Completed-session view used by badge criteria that scan history.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionPerformance {
    pub session_id: SessionId,
    pub target_language: String,
    pub difficulty: Difficulty,
    pub ended_at: DateTime<Utc>,
    pub average_pronunciation: Option<f64>,
    pub average_grammar: Option<f64>,
}

impl SessionPerformance {
    /// Mean of whichever averages are present.
    #[must_use]
    pub fn combined_score(&self) -> Option<f64> {
        let scores: Vec<f64> = [self.average_pronunciation, self.average_grammar]
            .into_iter()
            .flatten()
            .collect();
        mean_opt(&scores)
    }
}

/// Computes the full metrics snapshot.
///
/// Pure: the same rows and `now` always produce the same value. Turns whose
/// session is not in `sessions` are ignored.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn build_metrics(sessions: &[Session], turns: &[Turn], now: DateTime<Utc>) -> ProgressMetrics {
    let ordered = chronological_turns(sessions, turns);
    let total_sessions = count(sessions.len());
    let completed: Vec<&Session> = sessions.iter().filter(|s| s.is_completed()).collect();
    let completed_sessions = count(completed.len());

    let total_turns = count(ordered.len());
    let completed_turns = count(ordered.iter().filter(|t| t.completed).count());

    let completion_rate = if total_sessions == 0 {
        0.0
    } else {
        f64::from(completed_sessions) / f64::from(total_sessions) * 100.0
    };

    let scores = ScoreSeries::from_turns(ordered.iter().copied());
    let pronunciation = trend::classify(&scores.pronunciation);
    let grammar = trend::classify(&scores.grammar);
    let recent = trend::recent_completion(sessions);

    let (sessions_by_language, favorite_language) = language_breakdown(sessions);
    let (total_learning_minutes, timed_sessions) = sessions
        .iter()
        .filter_map(Session::duration_minutes)
        .fold((0.0, 0_usize), |(sum, n), minutes| (sum + minutes, n + 1));

    ProgressMetrics {
        total_sessions,
        completed_sessions,
        total_turns,
        completed_turns,
        completion_rate,
        average_pronunciation: scores.average_pronunciation(),
        average_grammar: scores.average_grammar(),
        learning_velocity: learning_velocity(&completed),
        streak: streak::calculate(sessions),
        trends: TrendSummary {
            pronunciation,
            grammar,
            overall: trend::overall(pronunciation, grammar, recent),
        },
        recent_completion_rate: recent.unwrap_or(0.0),
        sessions_by_language,
        favorite_language,
        sessions_last_7_days: ended_since(&completed, now - Duration::days(7)),
        sessions_last_30_days: ended_since(&completed, now - Duration::days(30)),
        total_learning_minutes,
        average_session_minutes: if timed_sessions == 0 {
            0.0
        } else {
            total_learning_minutes / timed_sessions as f64
        },
    }
}

/// Completed sessions with their score averages, oldest completion first.
#[must_use]
pub fn session_performances(sessions: &[Session], turns: &[Turn]) -> Vec<SessionPerformance> {
    let mut by_session: HashMap<SessionId, Vec<&Turn>> = HashMap::new();
    for turn in turns {
        by_session.entry(turn.session_id).or_default().push(turn);
    }

    let mut out: Vec<SessionPerformance> = sessions
        .iter()
        .filter_map(|session| {
            let ended_at = session.ended_at?;
            let mut own = by_session.remove(&session.id).unwrap_or_default();
            own.sort_by_key(|t| t.turn_number);
            let scores = ScoreSeries::from_turns(own);
            Some(SessionPerformance {
                session_id: session.id,
                target_language: session.target_language.clone(),
                difficulty: session.difficulty,
                ended_at,
                average_pronunciation: mean_opt(&scores.pronunciation),
                average_grammar: mean_opt(&scores.grammar),
            })
        })
        .collect();
    out.sort_by(|a, b| a.ended_at.cmp(&b.ended_at).then(a.session_id.cmp(&b.session_id)));
    out
}

/// Turns ordered by session creation, then turn number.
fn chronological_turns<'a>(sessions: &[Session], turns: &'a [Turn]) -> Vec<&'a Turn> {
    let order: HashMap<SessionId, (DateTime<Utc>, SessionId)> = sessions
        .iter()
        .map(|s| (s.id, (s.created_at, s.id)))
        .collect();
    let mut ordered: Vec<(&(DateTime<Utc>, SessionId), &Turn)> = turns
        .iter()
        .filter_map(|t| order.get(&t.session_id).map(|key| (key, t)))
        .collect();
    ordered.sort_by(|(ka, a), (kb, b)| ka.cmp(kb).then(a.turn_number.cmp(&b.turn_number)));
    ordered.into_iter().map(|(_, t)| t).collect()
}

fn learning_velocity(completed: &[&Session]) -> f64 {
    let mut ends = completed.iter().filter_map(|s| s.ended_at);
    let Some(first) = ends.next() else {
        return 0.0;
    };
    let (earliest, latest) = ends.fold((first, first), |(lo, hi), t| (lo.min(t), hi.max(t)));
    let weeks = weeks_between(earliest, latest).max(1.0);
    f64::from(count(completed.len())) / weeks
}

/// Session counts per language and the most practised one (ties: smallest code).
fn language_breakdown(sessions: &[Session]) -> (BTreeMap<String, u32>, Option<String>) {
    let mut counts: BTreeMap<String, u32> = BTreeMap::new();
    for session in sessions {
        *counts.entry(session.target_language.clone()).or_default() += 1;
    }
    let mut favorite: Option<(&String, u32)> = None;
    for (language, &n) in &counts {
        if favorite.is_none_or(|(_, best)| n > best) {
            favorite = Some((language, n));
        }
    }
    let favorite = favorite.map(|(language, _)| language.clone());
    (counts, favorite)
}

fn ended_since(completed: &[&Session], since: DateTime<Utc>) -> u32 {
    count(
        completed
            .iter()
            .filter(|s| s.ended_at.is_some_and(|t| t >= since))
            .count(),
    )
}

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}
