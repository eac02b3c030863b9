use learn_core::model::{DiscussionPost, LessonId};

use super::SqliteRepository;
use super::mapping::{conn, map_post_row};
use crate::changes::Change;
use crate::repository::{DiscussionRepository, StorageError};

#[async_trait::async_trait]
impl DiscussionRepository for SqliteRepository {
    async fn insert_post(&self, post: &DiscussionPost) -> Result<(), StorageError> {
        let result = sqlx::query(
            r"
            INSERT INTO discussion_posts (id, lesson_id, user_id, parent_id, content, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(post.id().to_string())
        .bind(post.lesson_id().to_string())
        .bind(post.user_id().to_string())
        .bind(post.parent_id().map(|p| p.to_string()))
        .bind(post.content())
        .bind(post.created_at())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {}
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                return Err(StorageError::Conflict);
            }
            Err(sqlx::Error::Database(db)) if db.is_foreign_key_violation() => {
                return Err(StorageError::NotFound);
            }
            Err(e) => return Err(conn(e)),
        }

        self.changes.publish(Change::Discussion(post.lesson_id()));
        Ok(())
    }

    async fn list_posts(
        &self,
        lesson: LessonId,
        top_level_only: bool,
    ) -> Result<Vec<DiscussionPost>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, lesson_id, user_id, parent_id, content, created_at
            FROM discussion_posts
            WHERE lesson_id = ?1 AND (?2 = 0 OR parent_id IS NULL)
            ORDER BY created_at DESC, id ASC
            ",
        )
        .bind(lesson.to_string())
        .bind(top_level_only)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_post_row).collect()
    }
}
