use lingo_core::model::{NewSession, Session, SessionId, SessionProgress, UserId};

use super::SqliteRepository;
use super::mapping::{conn, id_i64, map_session_row, to_json, u32_from_i64};
use crate::repository::{SessionCompletion, SessionRepository, StorageError};

const SESSION_COLUMNS: &str = r"
    id, user_id, target_language, difficulty, created_at, started_at, ended_at,
    total_turns, completed_turns, progress
";

impl SqliteRepository {
    async fn fetch_session(&self, id: i64) -> Result<Option<Session>, StorageError> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1");
        sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?
            .map(|row| map_session_row(&row))
            .transpose()
    }

    async fn fetch_counter(&self, id: i64, column: &'static str) -> Result<u32, StorageError> {
        let sql = format!("SELECT {column} FROM sessions WHERE id = ?1");
        let value = sqlx::query_scalar::<_, i64>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?
            .ok_or(StorageError::NotFound)?;
        u32_from_i64(column, value)
    }
}

#[async_trait::async_trait]
impl SessionRepository for SqliteRepository {
    async fn insert_session(&self, session: &NewSession) -> Result<Session, StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;

        sqlx::query(
            r"
                INSERT INTO users (id, created_at)
                VALUES (?1, ?2)
                ON CONFLICT(id) DO NOTHING
            ",
        )
        .bind(session.user_id.as_str())
        .bind(session.created_at)
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        let res = sqlx::query(
            r"
                INSERT INTO sessions (
                    user_id, target_language, difficulty, created_at, started_at,
                    total_turns, completed_turns
                )
                VALUES (?1, ?2, ?3, ?4, ?5, 0, 0)
            ",
        )
        .bind(session.user_id.as_str())
        .bind(session.target_language.as_str())
        .bind(session.difficulty.as_str())
        .bind(session.created_at)
        .bind(session.started_at)
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        tx.commit().await.map_err(conn)?;

        let id = u64::try_from(res.last_insert_rowid())
            .map_err(|_| StorageError::Serialization("session_id sign overflow".into()))?;
        Ok(session.clone().assign_id(SessionId::new(id)))
    }

    async fn get_session(&self, id: SessionId) -> Result<Session, StorageError> {
        self.fetch_session(id_i64("session_id", id.value())?)
            .await?
            .ok_or(StorageError::NotFound)
    }

    async fn list_sessions_for_user(&self, user: &UserId) -> Result<Vec<Session>, StorageError> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE user_id = ?1 ORDER BY created_at ASC, id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(user.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_session_row(&row)?);
        }
        Ok(out)
    }

    async fn list_sessions_page(
        &self,
        user: &UserId,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<Session>, StorageError> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE user_id = ?1 \
             ORDER BY created_at DESC, id DESC LIMIT ?2 OFFSET ?3"
        );
        let rows = sqlx::query(&sql)
            .bind(user.as_str())
            .bind(i64::from(limit))
            .bind(i64::from(offset))
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_session_row(&row)?);
        }
        Ok(out)
    }

    async fn complete_session(
        &self,
        id: SessionId,
        completion: &SessionCompletion,
    ) -> Result<Session, StorageError> {
        let session_id = id_i64("session_id", id.value())?;

        let result = sqlx::query(
            r"
                UPDATE sessions
                SET ended_at = ?1,
                    completed_turns = MIN(?2, total_turns),
                    progress = ?3
                WHERE id = ?4 AND ended_at IS NULL
            ",
        )
        .bind(completion.ended_at)
        .bind(i64::from(completion.completed_turns))
        .bind(to_json(&completion.progress)?)
        .bind(session_id)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        let stored = self.fetch_session(session_id).await?;
        match (result.rows_affected(), stored) {
            (_, None) => Err(StorageError::NotFound),
            (0, Some(_)) => Err(StorageError::Conflict),
            (_, Some(session)) => Ok(session),
        }
    }

    async fn update_progress(
        &self,
        id: SessionId,
        progress: &SessionProgress,
    ) -> Result<(), StorageError> {
        let result = sqlx::query("UPDATE sessions SET progress = ?1 WHERE id = ?2")
            .bind(to_json(progress)?)
            .bind(id_i64("session_id", id.value())?)
            .execute(&self.pool)
            .await
            .map_err(conn)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn adjust_completed_turns(
        &self,
        id: SessionId,
        delta: i32,
    ) -> Result<u32, StorageError> {
        let session_id = id_i64("session_id", id.value())?;
        let result = sqlx::query(
            r"
                UPDATE sessions
                SET completed_turns = MAX(0, MIN(total_turns, completed_turns + ?1))
                WHERE id = ?2
            ",
        )
        .bind(i64::from(delta))
        .bind(session_id)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        self.fetch_counter(session_id, "completed_turns").await
    }
}
