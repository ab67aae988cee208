use chrono::{DateTime, Utc};

use crate::model::{Session, SessionDetailMetrics, SessionProgress, Turn};
use crate::progress::scores::{ScoreSeries, mean_opt};
use crate::progress::trend;
use crate::time::minutes_between;

/// Snapshot written into the session row when it completes at `now`.
#[must_use]
pub fn completion_summary(session: &Session, turns: &[Turn], now: DateTime<Utc>) -> SessionProgress {
    let completed_turns = u32::try_from(turns.iter().filter(|t| t.completed).count())
        .unwrap_or(u32::MAX)
        .min(session.total_turns);
    let completion_rate = if session.total_turns == 0 {
        0.0
    } else {
        f64::from(completed_turns) / f64::from(session.total_turns) * 100.0
    };
    let scores = ScoreSeries::from_turns(turns);

    SessionProgress {
        completion_rate,
        average_pronunciation: mean_opt(&scores.pronunciation),
        average_grammar: mean_opt(&scores.grammar),
        duration_minutes: session
            .started_at
            .map_or(0.0, |start| minutes_between(start, now)),
        completed_turns,
        total_turns: session.total_turns,
        detail: None,
    }
}

/// Per-turn breakdown of one session, in turn order.
#[must_use]
pub fn session_detail(turns: &[Turn]) -> SessionDetailMetrics {
    let mut ordered: Vec<&Turn> = turns.iter().collect();
    ordered.sort_by_key(|t| t.turn_number);
    let attempted_turns = u32::try_from(ordered.iter().filter(|t| t.transcript.is_some()).count())
        .unwrap_or(u32::MAX);
    let scores = ScoreSeries::from_turns(ordered);

    SessionDetailMetrics {
        pronunciation_trend: trend::classify(&scores.pronunciation),
        grammar_trend: trend::classify(&scores.grammar),
        pronunciation_scores: scores.pronunciation,
        grammar_scores: scores.grammar,
        attempted_turns,
    }
}
