use chrono::Duration;
use lingo_core::badges::BadgeCatalog;
use lingo_core::model::{
    Difficulty, EngineSettings, Feedback, SessionDraft, SessionId, Trend, TurnDraft, TurnPatch,
    UserId,
};
use lingo_core::time::fixed_now;
use serde_json::json;
use services::{AppServices, Clock, InvalidState, SessionError};
use storage::repository::Storage;

fn learner() -> UserId {
    UserId::new("learner-42").unwrap()
}

fn draft(session_id: SessionId, turn_number: u32, text: &str) -> TurnDraft {
    TurnDraft {
        session_id,
        turn_number,
        target_text: text.to_string(),
        meaning: Some("practice".into()),
    }
}

fn attempt(pronunciation: f64, grammar: f64) -> TurnPatch {
    TurnPatch {
        transcript: Some("heard".into()),
        pronunciation: Some(Feedback::new(json!({
            "overall_score": pronunciation,
            "phonemes": [{ "p": "o", "score": pronunciation }],
        }))),
        grammar: Some(Feedback::new(json!({
            "overall_score": grammar,
            "corrections": [],
        }))),
        completed: Some(true),
    }
}

async fn practice_day(engine: &AppServices, language: &str, score: f64) -> SessionId {
    let user = learner();
    let session = engine
        .create_session(&user, SessionDraft::new(language, Difficulty::Intermediate))
        .await
        .unwrap();
    for (n, text) in [(1, "Buenos días"), (2, "¿Dónde está la estación?")] {
        let turn = engine
            .create_turn(&user, session.id, draft(session.id, n, text))
            .await
            .unwrap();
        engine
            .update_turn(&user, session.id, turn.id, attempt(score, score - 10.0))
            .await
            .unwrap();
    }
    let completed = engine.complete_session(&user, session.id).await.unwrap();
    assert_eq!(completed.summary.completed_turns, 2);
    assert_eq!(completed.summary.total_turns, 2);
    session.id
}

#[tokio::test]
async fn three_days_of_practice_build_a_streak() {
    let storage = Storage::in_memory();
    let clock = Clock::manual(fixed_now());
    let mut driver = clock.clone();
    let engine = AppServices::new(
        &storage,
        clock,
        EngineSettings::default(),
        BadgeCatalog::builtin(),
    );
    let user = learner();

    for day in 0..3_u32 {
        if day > 0 {
            driver.advance(Duration::days(1));
        }
        practice_day(&engine, "es", 80.0 + f64::from(day) * 5.0).await;
    }

    let metrics = engine.compute_progress(&user).await;
    assert_eq!(metrics.total_sessions, 3);
    assert_eq!(metrics.completed_sessions, 3);
    assert_eq!(metrics.total_turns, 6);
    assert_eq!(metrics.completed_turns, 6);
    assert_eq!(metrics.completion_rate, 100.0);
    assert_eq!(metrics.streak.current, 3);
    assert_eq!(metrics.streak.longest, 3);
    assert_eq!(metrics.favorite_language.as_deref(), Some("es"));
    assert_eq!(metrics.trends.pronunciation, Trend::Improving);

    let again = engine.compute_progress(&user).await;
    assert_eq!(*again, *metrics);

    let overview = engine.list_badges(&user).await.unwrap();
    let earned: Vec<&str> = overview.earned.iter().map(|v| v.badge.id.as_str()).collect();
    assert!(earned.contains(&"first_session"));
    assert!(earned.contains(&"three_day_streak"));
    assert!(earned.contains(&"pronunciation_pro"));
    assert!(!earned.contains(&"week_warrior"));

    let week = overview
        .progress
        .iter()
        .find(|p| p.badge_id.as_str() == "week_warrior")
        .unwrap();
    assert_eq!(week.percentage, 43);

    let recent = engine.recent_badges(&user, 1).await;
    assert_eq!(recent.len(), 1);
}

#[tokio::test]
async fn mutations_refresh_cached_progress() {
    let storage = Storage::in_memory();
    let engine = AppServices::new(
        &storage,
        Clock::fixed(fixed_now()),
        EngineSettings::default(),
        BadgeCatalog::builtin(),
    );
    let user = learner();

    let empty = engine.compute_progress(&user).await;
    assert_eq!(empty.total_sessions, 0);
    assert_eq!(empty.completion_rate, 0.0);

    let session = engine
        .create_session(&user, SessionDraft::new("FR", Difficulty::Beginner))
        .await
        .unwrap();
    assert_eq!(session.target_language, "fr");

    let metrics = engine.compute_progress(&user).await;
    assert_eq!(metrics.total_sessions, 1);
    assert_eq!(metrics.completed_sessions, 0);

    let err = engine.complete_session(&user, session.id).await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::InvalidState(InvalidState::TooFewTurns { .. })
    ));

    engine.invalidate_progress_cache(&user);
    let page = engine.list_sessions(&user, 0, 5).await.unwrap();
    assert_eq!(page.len(), 1);
}

#[tokio::test]
async fn completed_session_detail_carries_turn_breakdown() {
    let storage = Storage::in_memory();
    let engine = AppServices::new(
        &storage,
        Clock::fixed(fixed_now()),
        EngineSettings::default(),
        BadgeCatalog::builtin(),
    );
    let user = learner();
    let id = practice_day(&engine, "de", 70.0).await;

    let detail = engine.get_session(&user, id).await.unwrap();
    assert_eq!(detail.turns.len(), 2);
    assert!(detail.session.ended_at.is_some());
    let progress = detail.session.progress.unwrap();
    assert_eq!(progress.average_pronunciation, Some(70.0));
    assert_eq!(progress.average_grammar, Some(60.0));
    let breakdown = progress.detail.unwrap();
    assert_eq!(breakdown.pronunciation_scores, vec![70.0, 70.0]);
    assert_eq!(breakdown.attempted_turns, 2);
}
