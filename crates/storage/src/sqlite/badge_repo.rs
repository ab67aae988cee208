use lingo_core::model::{EarnedBadge, UserId};

use super::SqliteRepository;
use super::mapping::{conn, map_earned_row, opt_to_json};
use crate::repository::{BadgeRepository, StorageError};

#[async_trait::async_trait]
impl BadgeRepository for SqliteRepository {
    async fn list_earned(&self, user: &UserId) -> Result<Vec<EarnedBadge>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT user_id, badge_id, awarded_at, data
                FROM earned_badges
                WHERE user_id = ?1
                ORDER BY awarded_at ASC, badge_id ASC
            ",
        )
        .bind(user.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_earned_row(&row)?);
        }
        Ok(out)
    }

    async fn award_badge(&self, badge: &EarnedBadge) -> Result<bool, StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;

        sqlx::query(
            r"
                INSERT INTO users (id, created_at)
                VALUES (?1, ?2)
                ON CONFLICT(id) DO NOTHING
            ",
        )
        .bind(badge.user_id.as_str())
        .bind(badge.awarded_at)
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        let result = sqlx::query(
            r"
                INSERT INTO earned_badges (user_id, badge_id, awarded_at, data)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(user_id, badge_id) DO NOTHING
            ",
        )
        .bind(badge.user_id.as_str())
        .bind(badge.badge_id.as_str())
        .bind(badge.awarded_at)
        .bind(opt_to_json(badge.data.as_ref())?)
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        tx.commit().await.map_err(conn)?;
        Ok(result.rows_affected() == 1)
    }
}
