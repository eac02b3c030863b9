use chrono::{DateTime, Utc};
use learn_core::model::{LessonId, ProgressRecord, UserId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, map_progress_row, ser};
use crate::changes::Change;
use crate::repository::{ProgressRepository, StorageError};

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn get_progress(
        &self,
        user: UserId,
        lesson: LessonId,
    ) -> Result<Option<ProgressRecord>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT user_id, lesson_id, completion_percentage, quiz_score, completed_at, updated_at
            FROM progress
            WHERE user_id = ?1 AND lesson_id = ?2
            ",
        )
        .bind(user.to_string())
        .bind(lesson.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_progress_row).transpose()
    }

    async fn upsert_progress(&self, record: &ProgressRecord) -> Result<(), StorageError> {
        // MAX keeps a stale writer from lowering a newer percentage.
        sqlx::query(
            r"
            INSERT INTO progress (user_id, lesson_id, completion_percentage, quiz_score, completed_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(user_id, lesson_id) DO UPDATE SET
                completion_percentage = MAX(progress.completion_percentage, excluded.completion_percentage),
                quiz_score = excluded.quiz_score,
                completed_at = COALESCE(progress.completed_at, excluded.completed_at),
                updated_at = excluded.updated_at
            ",
        )
        .bind(record.user_id().to_string())
        .bind(record.lesson_id().to_string())
        .bind(i64::from(record.completion_percentage()))
        .bind(record.quiz_score().map(i64::from))
        .bind(record.completed_at())
        .bind(record.updated_at())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        self.changes.publish(Change::Progress(record.user_id()));
        Ok(())
    }

    async fn list_progress_for_user(
        &self,
        user: UserId,
    ) -> Result<Vec<ProgressRecord>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT user_id, lesson_id, completion_percentage, quiz_score, completed_at, updated_at
            FROM progress
            WHERE user_id = ?1
            ORDER BY updated_at DESC, lesson_id ASC
            ",
        )
        .bind(user.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_progress_row).collect()
    }

    async fn record_video_view(
        &self,
        user: UserId,
        lesson: LessonId,
        video_url: &str,
        watched_at: DateTime<Utc>,
    ) -> Result<u32, StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;

        sqlx::query(
            r"
            INSERT INTO video_views (user_id, lesson_id, video_url, watched_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(user_id, lesson_id, video_url) DO NOTHING
            ",
        )
        .bind(user.to_string())
        .bind(lesson.to_string())
        .bind(video_url)
        .bind(watched_at)
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        let row = sqlx::query(
            r"
            SELECT COUNT(*) AS watched
            FROM video_views
            WHERE user_id = ?1 AND lesson_id = ?2
            ",
        )
        .bind(user.to_string())
        .bind(lesson.to_string())
        .fetch_one(&mut *tx)
        .await
        .map_err(conn)?;

        tx.commit().await.map_err(conn)?;

        let watched: i64 = row.try_get("watched").map_err(ser)?;
        u32::try_from(watched).map_err(|_| StorageError::Serialization("view count".into()))
    }
}
