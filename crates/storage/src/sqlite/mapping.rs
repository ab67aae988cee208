use lingo_core::model::{
    BadgeId, Difficulty, EarnedBadge, Feedback, Session, SessionId, SessionProgress, Turn, TurnId,
    UserId,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::Row;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

/// Unique-constraint violations become `Conflict`; anything else is a connection error.
pub(crate) fn conflict_or_conn(e: sqlx::Error) -> StorageError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Conflict,
        _ => conn(e),
    }
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn session_id_from_i64(v: i64) -> Result<SessionId, StorageError> {
    Ok(SessionId::new(i64_to_u64("session_id", v)?))
}

pub(crate) fn turn_id_from_i64(v: i64) -> Result<TurnId, StorageError> {
    Ok(TurnId::new(i64_to_u64("turn_id", v)?))
}

/// JSON text column encoding for structured payloads.
pub(crate) fn to_json<T: Serialize>(value: &T) -> Result<String, StorageError> {
    serde_json::to_string(value).map_err(ser)
}

pub(crate) fn opt_to_json<T: Serialize>(value: Option<&T>) -> Result<Option<String>, StorageError> {
    value.map(to_json).transpose()
}

fn opt_from_json<T: DeserializeOwned>(raw: Option<String>) -> Result<Option<T>, StorageError> {
    raw.map(|s| serde_json::from_str(&s).map_err(ser))
        .transpose()
}

pub(crate) fn map_session_row(row: &sqlx::sqlite::SqliteRow) -> Result<Session, StorageError> {
    let difficulty: String = row.try_get("difficulty").map_err(ser)?;
    let progress: Option<SessionProgress> =
        opt_from_json(row.try_get::<Option<String>, _>("progress").map_err(ser)?)?;

    Ok(Session {
        id: session_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        user_id: UserId::new(row.try_get::<String, _>("user_id").map_err(ser)?).map_err(ser)?,
        target_language: row.try_get("target_language").map_err(ser)?,
        difficulty: difficulty.parse::<Difficulty>().map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
        started_at: row.try_get("started_at").map_err(ser)?,
        ended_at: row.try_get("ended_at").map_err(ser)?,
        total_turns: u32_from_i64(
            "total_turns",
            row.try_get::<i64, _>("total_turns").map_err(ser)?,
        )?,
        completed_turns: u32_from_i64(
            "completed_turns",
            row.try_get::<i64, _>("completed_turns").map_err(ser)?,
        )?,
        progress,
    })
}

pub(crate) fn map_turn_row(row: &sqlx::sqlite::SqliteRow) -> Result<Turn, StorageError> {
    let pronunciation: Option<Feedback> =
        opt_from_json(row.try_get::<Option<String>, _>("pronunciation").map_err(ser)?)?;
    let grammar: Option<Feedback> =
        opt_from_json(row.try_get::<Option<String>, _>("grammar").map_err(ser)?)?;

    Ok(Turn {
        id: turn_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        session_id: session_id_from_i64(row.try_get::<i64, _>("session_id").map_err(ser)?)?,
        turn_number: u32_from_i64(
            "turn_number",
            row.try_get::<i64, _>("turn_number").map_err(ser)?,
        )?,
        target_text: row.try_get("target_text").map_err(ser)?,
        meaning: row.try_get("meaning").map_err(ser)?,
        transcript: row.try_get("transcript").map_err(ser)?,
        pronunciation,
        grammar,
        completed: row.try_get("completed").map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
        updated_at: row.try_get("updated_at").map_err(ser)?,
    })
}

pub(crate) fn map_earned_row(row: &sqlx::sqlite::SqliteRow) -> Result<EarnedBadge, StorageError> {
    Ok(EarnedBadge {
        user_id: UserId::new(row.try_get::<String, _>("user_id").map_err(ser)?).map_err(ser)?,
        badge_id: BadgeId::new(row.try_get::<String, _>("badge_id").map_err(ser)?),
        awarded_at: row.try_get("awarded_at").map_err(ser)?,
        data: opt_from_json(row.try_get::<Option<String>, _>("data").map_err(ser)?)?,
    })
}
