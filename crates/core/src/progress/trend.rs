use crate::model::{Session, Trend};
use crate::progress::scores::mean;

/// Series shorter than this are reported as `Stable`.
pub const MIN_TREND_POINTS: usize = 4;

/// Mean difference between halves needed to call a direction.
pub const TREND_THRESHOLD: f64 = 2.0;

/// Number of most recent sessions considered for the overall trend gate.
pub const RECENT_WINDOW: usize = 5;

/// Classifies a chronological score series by comparing the means of its halves.
///
/// The split point is `len / 2`, so for odd lengths the later half is longer.
#[must_use]
pub fn classify(scores: &[f64]) -> Trend {
    if scores.len() < MIN_TREND_POINTS {
        return Trend::Stable;
    }
    let (first, second) = scores.split_at(scores.len() / 2);
    let diff = mean(second) - mean(first);
    if diff > TREND_THRESHOLD {
        Trend::Improving
    } else if diff < -TREND_THRESHOLD {
        Trend::Declining
    } else {
        Trend::Stable
    }
}

/// Combines the pronunciation and grammar trends.
///
/// `recent_completion` is the completed share of the last five sessions, or
/// `None` with fewer than five sessions. A strong recent window (> 80%)
/// promotes to improving when either series improves; otherwise any
/// improving series wins, both declining loses, anything else is stable.
#[must_use]
pub fn overall(pronunciation: Trend, grammar: Trend, recent_completion: Option<f64>) -> Trend {
    let either_improving = pronunciation == Trend::Improving || grammar == Trend::Improving;
    let both_declining = pronunciation == Trend::Declining && grammar == Trend::Declining;

    match recent_completion {
        Some(rate) if rate > 0.8 && either_improving => Trend::Improving,
        _ if either_improving => Trend::Improving,
        _ if both_declining => Trend::Declining,
        _ => Trend::Stable,
    }
}

/// Completed share of the five most recently created sessions.
///
/// Returns `None` when fewer than five sessions exist.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn recent_completion(sessions: &[Session]) -> Option<f64> {
    if sessions.len() < RECENT_WINDOW {
        return None;
    }
    let mut recent: Vec<&Session> = sessions.iter().collect();
    recent.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    let completed = recent
        .iter()
        .take(RECENT_WINDOW)
        .filter(|s| s.is_completed())
        .count();
    Some(completed as f64 / RECENT_WINDOW as f64)
}
