use lingo_core::model::{NewTurn, SessionId, Turn, TurnId};

use super::SqliteRepository;
use super::mapping::{conflict_or_conn, conn, id_i64, map_turn_row, opt_to_json};
use crate::repository::{StorageError, TurnRepository};

/// Stays well under `SQLITE_MAX_VARIABLE_NUMBER` on every build.
const MAX_BOUND_IDS: usize = 500;

const TURN_COLUMNS: &str = r"
    id, session_id, turn_number, target_text, meaning, transcript,
    pronunciation, grammar, completed, created_at, updated_at
";

#[async_trait::async_trait]
impl TurnRepository for SqliteRepository {
    async fn insert_turn(&self, turn: &NewTurn) -> Result<Turn, StorageError> {
        let session_id = id_i64("session_id", turn.session_id.value())?;
        let mut tx = self.pool.begin().await.map_err(conn)?;

        let raised = sqlx::query(
            "UPDATE sessions SET total_turns = MAX(total_turns, ?1) WHERE id = ?2",
        )
        .bind(i64::from(turn.turn_number))
        .bind(session_id)
        .execute(&mut *tx)
        .await
        .map_err(conn)?;
        if raised.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }

        let res = sqlx::query(
            r"
                INSERT INTO learning_turns (
                    session_id, turn_number, target_text, meaning,
                    completed, created_at, updated_at
                )
                VALUES (?1, ?2, ?3, ?4, 0, ?5, ?5)
            ",
        )
        .bind(session_id)
        .bind(i64::from(turn.turn_number))
        .bind(turn.target_text.as_str())
        .bind(turn.meaning.as_deref())
        .bind(turn.created_at)
        .execute(&mut *tx)
        .await
        .map_err(conflict_or_conn)?;

        let id = u64::try_from(res.last_insert_rowid())
            .map_err(|_| StorageError::Serialization("turn_id sign overflow".into()))?;
        tx.commit().await.map_err(conn)?;
        Ok(turn.clone().assign_id(TurnId::new(id)))
    }

    async fn get_turn(&self, id: TurnId) -> Result<Turn, StorageError> {
        let sql = format!("SELECT {TURN_COLUMNS} FROM learning_turns WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id_i64("turn_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?
            .ok_or(StorageError::NotFound)?;

        map_turn_row(&row)
    }

    async fn list_turns(&self, session_id: SessionId) -> Result<Vec<Turn>, StorageError> {
        self.list_turns_for_sessions(&[session_id]).await
    }

    async fn list_turns_for_sessions(
        &self,
        session_ids: &[SessionId],
    ) -> Result<Vec<Turn>, StorageError> {
        if session_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut out = Vec::new();
        for chunk in session_ids.chunks(MAX_BOUND_IDS) {
            let placeholders = (1..=chunk.len())
                .map(|i| format!("?{i}"))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                "SELECT {TURN_COLUMNS} FROM learning_turns WHERE session_id IN ({placeholders})"
            );

            let mut query = sqlx::query(&sql);
            for session_id in chunk {
                query = query.bind(id_i64("session_id", session_id.value())?);
            }

            for row in query.fetch_all(&self.pool).await.map_err(conn)? {
                out.push(map_turn_row(&row)?);
            }
        }
        out.sort_by_key(|t| (t.session_id, t.turn_number));
        Ok(out)
    }

    async fn update_turn(&self, turn: &Turn) -> Result<Turn, StorageError> {
        let turn_id = id_i64("turn_id", turn.id.value())?;
        let result = sqlx::query(
            r"
                UPDATE learning_turns
                SET transcript = ?1,
                    pronunciation = ?2,
                    grammar = ?3,
                    completed = ?4,
                    updated_at = ?5
                WHERE id = ?6
            ",
        )
        .bind(turn.transcript.as_deref())
        .bind(opt_to_json(turn.pronunciation.as_ref())?)
        .bind(opt_to_json(turn.grammar.as_ref())?)
        .bind(turn.completed)
        .bind(turn.updated_at)
        .bind(turn_id)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        self.get_turn(turn.id).await
    }
}
