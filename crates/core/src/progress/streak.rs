use chrono::{DateTime, Utc};

use crate::model::{Session, StreakInfo};
use crate::time::{utc_day, whole_days_between};

/// Streaks over the completion times of the given sessions.
///
/// Sessions without `ended_at` are ignored.
#[must_use]
pub fn calculate(sessions: &[Session]) -> StreakInfo {
    from_completions(sessions.iter().filter_map(|s| s.ended_at))
}

/// Streaks over raw completion timestamps (any order).
///
/// Two neighbouring completions continue a run when they are at most one
/// whole day apart (floored). A second completion on the same UTC date keeps
/// the run alive without lengthening it. The current streak is the run that
/// ends at the latest completion.
pub fn from_completions(times: impl IntoIterator<Item = DateTime<Utc>>) -> StreakInfo {
    let mut times: Vec<DateTime<Utc>> = times.into_iter().collect();
    if times.is_empty() {
        return StreakInfo::default();
    }
    times.sort_unstable();

    let mut run = 1_u32;
    let mut run_start = times[0];
    let mut longest = 1_u32;

    for pair in times.windows(2) {
        let (prev, next) = (pair[0], pair[1]);
        if whole_days_between(prev, next) <= 1 {
            if utc_day(prev) != utc_day(next) {
                run = run.saturating_add(1);
            }
        } else {
            run = 1;
            run_start = next;
        }
        longest = longest.max(run);
    }

    StreakInfo {
        current: run,
        longest,
        current_start: Some(run_start),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use chrono::Duration;

    fn day(n: i64) -> DateTime<Utc> {
        fixed_now() + Duration::days(n)
    }

    #[test]
    fn no_completions_means_no_streak() {
        let info = from_completions(Vec::new());
        assert_eq!(info, StreakInfo::default());
        assert_eq!(info.current_start, None);
    }

    #[test]
    fn three_consecutive_days() {
        let info = from_completions([day(3), day(1), day(2)]);
        assert_eq!(info.current, 3);
        assert_eq!(info.longest, 3);
        assert_eq!(info.current_start, Some(day(1)));
    }

    #[test]
    fn gap_resets_current_but_keeps_longest() {
        let info = from_completions([day(1), day(2), day(3), day(6)]);
        assert_eq!(info.current, 1);
        assert_eq!(info.longest, 3);
        assert_eq!(info.current_start, Some(day(6)));
    }

    #[test]
    fn same_day_sessions_count_once() {
        let info = from_completions([day(1), day(1) + Duration::minutes(30), day(2)]);
        assert_eq!(info.current, 2);
        assert_eq!(info.longest, 2);
    }

    #[test]
    fn ignores_unfinished_sessions() {
        use crate::model::{Difficulty, SessionDraft, SessionId, UserId};
        let user = UserId::new("u").unwrap();
        let mut done = SessionDraft::new("es", Difficulty::Beginner)
            .validate(user.clone(), day(0))
            .unwrap()
            .assign_id(SessionId::new(1));
        done.ended_at = Some(day(0));
        let open = SessionDraft::new("es", Difficulty::Beginner)
            .validate(user, day(1))
            .unwrap()
            .assign_id(SessionId::new(2));

        let info = calculate(&[done, open]);
        assert_eq!(info.current, 1);
        assert_eq!(info.longest, 1);
    }
}
